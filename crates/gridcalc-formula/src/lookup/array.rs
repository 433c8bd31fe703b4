use super::{LookupArguments, LookupDirection, LookupError, LookupNavigator, LookupSource};
use crate::value::FormulaValue;
use gridcalc_core::CellError;

/// Navigator over literal lookup data.
///
/// Vertical lookups step one element at a time. Horizontal lookups over
/// literal data have a single position.
#[derive(Debug)]
pub struct ArrayLookupNavigator<'a> {
    data: &'a [FormulaValue],
    direction: LookupDirection,
    lookup_index: usize,
    position: usize,
}

impl<'a> ArrayLookupNavigator<'a> {
    pub fn new(
        direction: LookupDirection,
        args: &'a LookupArguments,
    ) -> Result<Self, LookupError> {
        let LookupSource::Array(data) = args.source() else {
            return Err(LookupError::Contract(
                "array navigator needs an array source".into(),
            ));
        };
        if args.lookup_index() >= extent(data) {
            return Err(LookupError::Cell(CellError::Ref));
        }
        Ok(Self {
            data,
            direction,
            lookup_index: args.lookup_index(),
            position: 0,
        })
    }

    fn current(&self) -> Option<&FormulaValue> {
        self.data.get(self.position)
    }
}

/// Size of the return dimension: row width for row data, element count
/// otherwise
fn extent(data: &[FormulaValue]) -> usize {
    match data.first() {
        Some(FormulaValue::Array(rows)) => rows.first().map_or(0, Vec::len),
        _ => data.len(),
    }
}

fn row_item(element: &FormulaValue, index: usize) -> FormulaValue {
    match element {
        FormulaValue::Array(rows) => rows
            .first()
            .and_then(|row| row.get(index))
            .cloned()
            .unwrap_or(FormulaValue::Error(CellError::Ref)),
        other => other.clone(),
    }
}

impl LookupNavigator for ArrayLookupNavigator<'_> {
    fn current_value(&self) -> FormulaValue {
        self.current()
            .map(|element| row_item(element, 0))
            .unwrap_or_default()
    }

    fn lookup_value(&self) -> FormulaValue {
        match self.current() {
            Some(element @ FormulaValue::Array(_)) => row_item(element, self.lookup_index),
            Some(_) if self.direction == LookupDirection::Horizontal => self
                .data
                .get(self.lookup_index)
                .cloned()
                .unwrap_or_default(),
            Some(element) => element.clone(),
            None => FormulaValue::Empty,
        }
    }

    fn move_next(&mut self) -> bool {
        if self.direction == LookupDirection::Horizontal || self.position + 1 >= self.data.len() {
            return false;
        }
        self.position += 1;
        true
    }

    fn index(&self) -> usize {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::LookupArguments;
    use pretty_assertions::assert_eq;

    fn row(values: &[f64]) -> FormulaValue {
        FormulaValue::Array(vec![values.iter().map(|&n| n.into()).collect()])
    }

    fn args(data: Vec<FormulaValue>, lookup_index: usize) -> LookupArguments {
        LookupArguments::new(1.0.into(), lookup_index, LookupSource::Array(data), false).unwrap()
    }

    #[test]
    fn test_lookup_index_outside_data_is_ref() {
        let args = args(vec![1.0.into(), 2.0.into(), 3.0.into()], 5);
        assert_eq!(
            ArrayLookupNavigator::new(LookupDirection::Vertical, &args).unwrap_err(),
            LookupError::Cell(CellError::Ref)
        );
    }

    #[test]
    fn test_vertical_walks_every_row() {
        let args = args(
            vec![
                row(&[1.0, 10.0]),
                row(&[2.0, 20.0]),
                row(&[3.0, 30.0]),
                row(&[4.0, 40.0]),
            ],
            1,
        );
        let mut nav = ArrayLookupNavigator::new(LookupDirection::Vertical, &args).unwrap();
        assert_eq!(nav.current_value(), FormulaValue::Number(1.0));
        assert!(nav.move_next());
        assert!(nav.move_next());
        assert!(nav.move_next());
        assert!(!nav.move_next());
        assert_eq!(nav.index(), 3);
        assert_eq!(nav.current_value(), FormulaValue::Number(4.0));
        assert_eq!(nav.lookup_value(), FormulaValue::Number(40.0));
    }

    #[test]
    fn test_horizontal_does_not_step() {
        let args = args(vec![1.0.into(), 2.0.into()], 1);
        let mut nav = ArrayLookupNavigator::new(LookupDirection::Horizontal, &args).unwrap();
        assert!(!nav.move_next());
        assert_eq!(nav.index(), 0);
        assert_eq!(nav.lookup_value(), FormulaValue::Number(2.0));
    }

    #[test]
    fn test_range_source_is_contract_violation() {
        use gridcalc_core::RangeAddress;
        let args = LookupArguments::new(
            1.0.into(),
            0,
            LookupSource::Range(RangeAddress::single(0, 0, 0)),
            false,
        )
        .unwrap();
        assert!(matches!(
            ArrayLookupNavigator::new(LookupDirection::Vertical, &args),
            Err(LookupError::Contract(_))
        ));
    }
}
