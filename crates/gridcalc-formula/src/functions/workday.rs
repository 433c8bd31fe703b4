//! Business-day arithmetic
//!
//! [`WorkdayCalculator`] walks the calendar one day at a time, counting only
//! days that are neither weekend days nor holidays. `WORKDAY` and
//! `NETWORKDAYS` use the Saturday/Sunday weekend; their `.INTL` variants take
//! a weekend code or a seven-character mask.

use super::date::{date_argument, serial_value};
use super::{cell_result, first_error};
use crate::error::FormulaResult;
use crate::evaluator::EvaluationContext;
use crate::value::FormulaValue;
use ahash::AHashSet;
use chrono::{Datelike, NaiveDate};
use gridcalc_core::CellError;

/// Days of the week that are not worked, Monday first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Weekend([bool; 7]);

impl Weekend {
    pub const SATURDAY_SUNDAY: Weekend = Weekend([false, false, false, false, false, true, true]);

    /// Weekend for a `WORKDAY.INTL` code: 1 to 7 are two-day weekends
    /// starting Saturday, Sunday, ... Friday; 11 to 17 are single days
    /// Sunday, Monday, ... Saturday
    pub fn from_code(code: i64) -> Option<Weekend> {
        let mut days = [false; 7];
        match code {
            1..=7 => {
                let first = ((code + 4) % 7) as usize;
                days[first] = true;
                days[(first + 1) % 7] = true;
            }
            11..=17 => days[(code - 12).rem_euclid(7) as usize] = true,
            _ => return None,
        }
        Some(Weekend(days))
    }

    /// Weekend from a mask such as `"0000011"`, Monday first, `1` marking a
    /// day off. A week without working days is rejected.
    pub fn from_mask(mask: &str) -> Option<Weekend> {
        if !lazy_regex::regex_is_match!("^[01]{7}$", mask) || mask == "1111111" {
            return None;
        }
        let mut days = [false; 7];
        for (day, flag) in days.iter_mut().zip(mask.bytes()) {
            *day = flag == b'1';
        }
        Some(Weekend(days))
    }

    pub fn is_weekend(&self, date: NaiveDate) -> bool {
        self.0[date.weekday().num_days_from_monday() as usize]
    }
}

impl Default for Weekend {
    fn default() -> Self {
        Weekend::SATURDAY_SUNDAY
    }
}

/// First and last dates any date system can express
fn calendar_bounds() -> Option<(NaiveDate, NaiveDate)> {
    Some((
        NaiveDate::from_ymd_opt(1900, 1, 1)?,
        NaiveDate::from_ymd_opt(9999, 12, 31)?,
    ))
}

/// Which way the calendar was walked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkdayDirection {
    Forward,
    Backward,
}

/// Outcome of a workday calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkdayCalculatorResult {
    pub number_of_workdays: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub direction: WorkdayDirection,
}

/// Steps through the calendar skipping weekends and holidays
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkdayCalculator {
    weekend: Weekend,
}

impl WorkdayCalculator {
    /// Calculator with a Saturday/Sunday weekend
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weekend(weekend: Weekend) -> Self {
        Self { weekend }
    }

    fn is_workday(&self, date: NaiveDate, holidays: &AHashSet<NaiveDate>) -> bool {
        !self.weekend.is_weekend(date) && !holidays.contains(&date)
    }

    /// Date `workdays` business days away from `start`; negative counts walk
    /// backwards. `None` when the walk leaves 1900-01-01 through 9999-12-31.
    pub fn calculate_workday(
        &self,
        start: NaiveDate,
        workdays: i64,
        holidays: &[NaiveDate],
    ) -> Option<WorkdayCalculatorResult> {
        let holidays: AHashSet<NaiveDate> = holidays.iter().copied().collect();
        let direction = if workdays < 0 {
            WorkdayDirection::Backward
        } else {
            WorkdayDirection::Forward
        };

        let (first, last) = calendar_bounds()?;
        let room = match direction {
            WorkdayDirection::Forward => (last - start).num_days(),
            WorkdayDirection::Backward => (start - first).num_days(),
        };
        let mut remaining = workdays.unsigned_abs();
        // Every workday takes at least one calendar day
        if remaining > u64::try_from(room).ok()? {
            return None;
        }

        let mut date = start;
        while remaining > 0 {
            date = match direction {
                WorkdayDirection::Forward => date.succ_opt()?,
                WorkdayDirection::Backward => date.pred_opt()?,
            };
            if date < first || date > last {
                return None;
            }
            if self.is_workday(date, &holidays) {
                remaining -= 1;
            }
        }

        Some(WorkdayCalculatorResult {
            number_of_workdays: workdays.saturating_abs(),
            start_date: start,
            end_date: date,
            direction,
        })
    }

    /// Business days from `start` to `end`, both included. The count is
    /// never negative; `direction` is `Backward` when `end` is earlier.
    pub fn calculate_number_of_workdays(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        holidays: &[NaiveDate],
    ) -> WorkdayCalculatorResult {
        let holidays: AHashSet<NaiveDate> = holidays.iter().copied().collect();
        let (from, to, direction) = if end < start {
            (end, start, WorkdayDirection::Backward)
        } else {
            (start, end, WorkdayDirection::Forward)
        };

        let count = from
            .iter_days()
            .take_while(|date| *date <= to)
            .filter(|date| self.is_workday(*date, &holidays))
            .count();

        WorkdayCalculatorResult {
            number_of_workdays: count as i64,
            start_date: start,
            end_date: end,
            direction,
        }
    }
}

/// Holiday dates from an optional operand; blanks are skipped
fn holidays(
    args: &[FormulaValue],
    index: usize,
    ctx: &EvaluationContext,
) -> Result<Vec<NaiveDate>, CellError> {
    let Some(value) = args.get(index) else {
        return Ok(Vec::new());
    };
    if let Some(FormulaValue::Error(e)) = first_error(std::slice::from_ref(value)) {
        return Err(e);
    }
    let mut dates = Vec::new();
    for item in value.flatten() {
        match item {
            FormulaValue::Empty => {}
            FormulaValue::Number(n) => dates.push(
                ctx.date_system()
                    .date_from_serial(*n)
                    .ok_or(CellError::Num)?,
            ),
            _ => return Err(CellError::Value),
        }
    }
    Ok(dates)
}

/// Weekend operand of the `.INTL` functions: a code or a mask
fn weekend_argument(args: &[FormulaValue], index: usize) -> Result<Weekend, CellError> {
    match args.get(index).map(FormulaValue::scalar) {
        None | Some(FormulaValue::Empty) => Ok(Weekend::SATURDAY_SUNDAY),
        Some(FormulaValue::String(mask)) => Weekend::from_mask(&mask).ok_or(CellError::Value),
        Some(FormulaValue::Error(e)) => Err(e),
        Some(other) => {
            let code = other.to_number()?.trunc() as i64;
            Weekend::from_code(code).ok_or(CellError::Num)
        }
    }
}

fn workday(
    args: &[FormulaValue],
    ctx: &EvaluationContext,
    weekend: Weekend,
    holiday_index: usize,
) -> Result<FormulaValue, CellError> {
    let start = date_argument(args, 0, ctx)?;
    let days = args
        .get(1)
        .map_or(Ok(0.0), FormulaValue::to_number)?
        .trunc() as i64;
    let holidays = holidays(args, holiday_index, ctx)?;
    let result = WorkdayCalculator::with_weekend(weekend)
        .calculate_workday(start, days, &holidays)
        .ok_or(CellError::Num)?;
    serial_value(result.end_date, ctx)
}

fn networkdays(
    args: &[FormulaValue],
    ctx: &EvaluationContext,
    weekend: Weekend,
    holiday_index: usize,
) -> Result<FormulaValue, CellError> {
    let start = date_argument(args, 0, ctx)?;
    let end = date_argument(args, 1, ctx)?;
    let holidays = holidays(args, holiday_index, ctx)?;
    let result =
        WorkdayCalculator::with_weekend(weekend).calculate_number_of_workdays(start, end, &holidays);
    let count = match result.direction {
        WorkdayDirection::Forward => result.number_of_workdays,
        WorkdayDirection::Backward => -result.number_of_workdays,
    };
    Ok(FormulaValue::Number(count as f64))
}

/// WORKDAY(start_date, days, [holidays])
pub fn fn_workday(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(workday(args, ctx, Weekend::SATURDAY_SUNDAY, 2))
}

/// WORKDAY.INTL(start_date, days, [weekend], [holidays])
pub fn fn_workday_intl(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(weekend_argument(args, 2).and_then(|weekend| workday(args, ctx, weekend, 3)))
}

/// NETWORKDAYS(start_date, end_date, [holidays])
pub fn fn_networkdays(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(networkdays(args, ctx, Weekend::SATURDAY_SUNDAY, 2))
}

/// NETWORKDAYS.INTL(start_date, end_date, [weekend], [holidays])
pub fn fn_networkdays_intl(
    args: &[FormulaValue],
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    cell_result(weekend_argument(args, 2).and_then(|weekend| networkdays(args, ctx, weekend, 3)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate;
    use crate::parser::parse_formula;
    use pretty_assertions::assert_eq;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn eval(formula: &str) -> FormulaValue {
        let ast = parse_formula(formula).unwrap();
        evaluate(&ast, &EvaluationContext::simple()).unwrap()
    }

    #[test]
    fn test_monday_plus_five_is_next_monday() {
        let calc = WorkdayCalculator::new();
        let result = calc.calculate_workday(ymd(2024, 1, 1), 5, &[]).unwrap();
        assert_eq!(result.end_date, ymd(2024, 1, 8));
        assert_eq!(result.number_of_workdays, 5);
        assert_eq!(result.direction, WorkdayDirection::Forward);
    }

    #[test]
    fn test_zero_workdays_returns_start() {
        let calc = WorkdayCalculator::new();
        let result = calc.calculate_workday(ymd(2024, 1, 6), 0, &[]).unwrap();
        assert_eq!(result.end_date, ymd(2024, 1, 6));
        assert_eq!(result.number_of_workdays, 0);
    }

    #[test]
    fn test_backward_and_holidays() {
        let calc = WorkdayCalculator::new();
        let back = calc.calculate_workday(ymd(2024, 1, 8), -1, &[]).unwrap();
        assert_eq!(back.end_date, ymd(2024, 1, 5));
        assert_eq!(back.direction, WorkdayDirection::Backward);
        assert_eq!(back.number_of_workdays, 1);

        let skipped = calc
            .calculate_workday(ymd(2024, 1, 1), 1, &[ymd(2024, 1, 2)])
            .unwrap();
        assert_eq!(skipped.end_date, ymd(2024, 1, 3));
    }

    #[test]
    fn test_walk_stops_at_calendar_edges() {
        let calc = WorkdayCalculator::new();
        assert_eq!(calc.calculate_workday(ymd(9999, 12, 31), 1, &[]), None);
        assert_eq!(calc.calculate_workday(ymd(1900, 1, 1), -1, &[]), None);
        assert_eq!(calc.calculate_workday(ymd(2024, 1, 1), i64::MAX, &[]), None);
        assert_eq!(calc.calculate_workday(ymd(2024, 1, 1), i64::MIN, &[]), None);

        // A single working day per week still reaches the last Friday
        let fridays = WorkdayCalculator::with_weekend(Weekend::from_mask("1111011").unwrap());
        let result = fridays.calculate_workday(ymd(9999, 12, 24), 1, &[]).unwrap();
        assert_eq!(result.end_date, ymd(9999, 12, 31));
        assert_eq!(fridays.calculate_workday(ymd(9999, 12, 24), 2, &[]), None);
    }

    #[test]
    fn test_number_of_workdays() {
        let calc = WorkdayCalculator::new();
        let week = calc.calculate_number_of_workdays(ymd(2024, 1, 1), ymd(2024, 1, 7), &[]);
        assert_eq!(week.number_of_workdays, 5);
        assert_eq!(week.direction, WorkdayDirection::Forward);

        let reversed = calc.calculate_number_of_workdays(ymd(2024, 1, 7), ymd(2024, 1, 1), &[]);
        assert_eq!(reversed.number_of_workdays, 5);
        assert_eq!(reversed.direction, WorkdayDirection::Backward);

        let same_day = calc.calculate_number_of_workdays(ymd(2024, 1, 6), ymd(2024, 1, 6), &[]);
        assert_eq!(same_day.number_of_workdays, 0);
    }

    #[test]
    fn test_weekend_presets() {
        assert_eq!(Weekend::from_code(1), Some(Weekend::SATURDAY_SUNDAY));
        assert_eq!(Weekend::from_mask("0000011"), Some(Weekend::SATURDAY_SUNDAY));
        assert_eq!(
            Weekend::from_code(2),
            Weekend::from_mask("1000001")
        );
        assert_eq!(Weekend::from_code(11), Weekend::from_mask("0000001"));
        assert_eq!(Weekend::from_code(17), Weekend::from_mask("0000010"));
        assert_eq!(Weekend::from_code(8), None);
        assert_eq!(Weekend::from_mask("1111111"), None);
        assert_eq!(Weekend::from_mask("00011"), None);
        assert_eq!(Weekend::from_mask("abcdefg"), None);
    }

    #[test]
    fn test_workday_functions() {
        // 45292 is Monday 2024-01-01
        assert_eq!(eval("=WORKDAY(45292,5)"), FormulaValue::Number(45299.0));
        assert_eq!(eval("=WORKDAY(45292,1,45293)"), FormulaValue::Number(45294.0));
        assert_eq!(eval("=WORKDAY(45292,1,{45293,45294})"), FormulaValue::Number(45295.0));
        assert_eq!(eval("=WORKDAY(45299,-5)"), FormulaValue::Number(45292.0));
        assert_eq!(eval("=WORKDAY(-1,5)"), FormulaValue::Error(CellError::Num));
        assert_eq!(eval("=WORKDAY(45292,1,\"x\")"), FormulaValue::Error(CellError::Value));
    }

    #[test]
    fn test_workday_out_of_calendar() {
        // 2958465 is Friday 9999-12-31
        assert_eq!(eval("=WORKDAY(2958464,1)"), FormulaValue::Number(2958465.0));
        assert_eq!(eval("=WORKDAY(2958465,1)"), FormulaValue::Error(CellError::Num));
        assert_eq!(eval("=WORKDAY(1E15,1)"), FormulaValue::Error(CellError::Num));
        assert_eq!(eval("=WORKDAY(45292,1E9)"), FormulaValue::Error(CellError::Num));
        assert_eq!(eval("=WORKDAY(45292,-1E300)"), FormulaValue::Error(CellError::Num));
        assert_eq!(eval("=WORKDAY(2,-5)"), FormulaValue::Error(CellError::Num));
        assert_eq!(eval("=NETWORKDAYS(45292,2958466)"), FormulaValue::Error(CellError::Num));
        assert_eq!(eval("=NETWORKDAYS(-1,45292)"), FormulaValue::Error(CellError::Num));
    }

    #[test]
    fn test_networkdays_functions() {
        assert_eq!(eval("=NETWORKDAYS(45292,45299)"), FormulaValue::Number(6.0));
        assert_eq!(eval("=NETWORKDAYS(45299,45292)"), FormulaValue::Number(-6.0));
        assert_eq!(eval("=NETWORKDAYS(45292,45299,45293)"), FormulaValue::Number(5.0));
        assert_eq!(
            eval("=NETWORKDAYS.INTL(45292,45298,\"0000001\")"),
            FormulaValue::Number(6.0)
        );
    }

    #[test]
    fn test_intl_weekends() {
        assert_eq!(eval("=WORKDAY.INTL(45292,1,11)"), FormulaValue::Number(45293.0));
        // Friday plus one with a Friday/Saturday weekend lands on Sunday
        assert_eq!(eval("=WORKDAY.INTL(45296,1,7)"), FormulaValue::Number(45298.0));
        assert_eq!(eval("=WORKDAY.INTL(45292,1,99)"), FormulaValue::Error(CellError::Num));
        assert_eq!(eval("=WORKDAY.INTL(45292,1,\"11\")"), FormulaValue::Error(CellError::Value));
        assert_eq!(
            eval("=WORKDAY.INTL(45292,1,\"0000011\",45293)"),
            FormulaValue::Number(45294.0)
        );
    }
}
