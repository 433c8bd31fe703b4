use super::range_index::RangeIndex;
use super::scan::{scan_references, References};
use super::FormulaCell;
use crate::error::{FormulaError, FormulaResult};
use crate::provider::DataProvider;
use ahash::AHashMap;
use gridcalc_core::CellId;
use log::{debug, warn};
use std::collections::VecDeque;

/// Formula cells in calculation order
#[derive(Debug, Default)]
pub struct DependencyChain {
    cells: Vec<FormulaCell>,
    positions: AHashMap<CellId, usize>,
    /// Positions each cell reads, ascending
    precedents: Vec<Vec<usize>>,
    /// Positions reading each cell, ascending
    dependents: Vec<Vec<usize>>,
    references: Vec<References>,
    circular: Vec<bool>,
    next_seq: usize,
}

/// Traversal state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Unvisited,
    InProgress,
    Done,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    node: usize,
    next_edge: usize,
}

/// Depth-first walk over precedent edges that records finishing order and
/// marks strongly connected groups
struct Traversal<'a> {
    precedents: &'a [Vec<usize>],
    state: Vec<NodeState>,
    discovery: Vec<usize>,
    lowlink: Vec<usize>,
    stack: Vec<usize>,
    on_stack: Vec<bool>,
    counter: usize,
    postorder: Vec<usize>,
    circular: Vec<bool>,
}

impl<'a> Traversal<'a> {
    fn new(precedents: &'a [Vec<usize>]) -> Self {
        let n = precedents.len();
        Self {
            precedents,
            state: vec![NodeState::Unvisited; n],
            discovery: vec![0; n],
            lowlink: vec![0; n],
            stack: Vec::new(),
            on_stack: vec![false; n],
            counter: 0,
            postorder: Vec::with_capacity(n),
            circular: vec![false; n],
        }
    }

    fn run(mut self) -> (Vec<usize>, Vec<bool>) {
        for root in 0..self.precedents.len() {
            if self.state[root] == NodeState::Unvisited {
                self.visit(root);
            }
        }
        (self.postorder, self.circular)
    }

    fn enter(&mut self, node: usize) {
        self.state[node] = NodeState::InProgress;
        self.discovery[node] = self.counter;
        self.lowlink[node] = self.counter;
        self.counter += 1;
        self.stack.push(node);
        self.on_stack[node] = true;
    }

    fn visit(&mut self, root: usize) {
        let mut frames = vec![Frame {
            node: root,
            next_edge: 0,
        }];
        self.enter(root);

        while let Some(frame) = frames.last_mut() {
            let node = frame.node;
            if let Some(&next) = self.precedents[node].get(frame.next_edge) {
                frame.next_edge += 1;
                match self.state[next] {
                    NodeState::Unvisited => {
                        self.enter(next);
                        frames.push(Frame {
                            node: next,
                            next_edge: 0,
                        });
                    }
                    NodeState::InProgress | NodeState::Done if self.on_stack[next] => {
                        self.lowlink[node] = self.lowlink[node].min(self.discovery[next]);
                    }
                    _ => {}
                }
                continue;
            }

            frames.pop();
            self.state[node] = NodeState::Done;
            self.postorder.push(node);
            if let Some(parent) = frames.last() {
                self.lowlink[parent.node] = self.lowlink[parent.node].min(self.lowlink[node]);
            }
            if self.lowlink[node] == self.discovery[node] {
                self.close_group(node);
            }
        }
    }

    /// Pop the group rooted at `root`; groups of several cells and cells
    /// reading themselves are circular
    fn close_group(&mut self, root: usize) {
        let mut members = Vec::new();
        while let Some(member) = self.stack.pop() {
            self.on_stack[member] = false;
            members.push(member);
            if member == root {
                break;
            }
        }
        if members.len() > 1 || self.precedents[root].binary_search(&root).is_ok() {
            for member in members {
                self.circular[member] = true;
            }
        }
    }
}

impl DependencyChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cell and return its position.
    ///
    /// A cell that is already registered is a contract violation and leaves
    /// the chain unchanged.
    pub fn add(&mut self, mut cell: FormulaCell) -> FormulaResult<usize> {
        let id = cell.id();
        if self.positions.contains_key(&id) {
            return Err(FormulaError::Contract(format!(
                "cell {} is already in the dependency chain",
                id
            )));
        }
        let position = self.cells.len();
        cell.index = position;
        cell.seq = self.next_seq;
        self.next_seq += 1;
        self.positions.insert(id, position);
        self.cells.push(cell);
        Ok(position)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&FormulaCell> {
        self.cells.get(position)
    }

    pub fn position(&self, id: CellId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Cells in chain order
    pub fn cells(&self) -> &[FormulaCell] {
        &self.cells
    }

    /// Positions the cell at `position` reads
    pub fn precedents_of(&self, position: usize) -> &[usize] {
        self.precedents.get(position).map_or(&[], Vec::as_slice)
    }

    /// Positions that read the cell at `position`
    pub fn dependents_of(&self, position: usize) -> &[usize] {
        self.dependents.get(position).map_or(&[], Vec::as_slice)
    }

    pub fn is_circular(&self, position: usize) -> bool {
        self.circular.get(position).copied().unwrap_or(false)
    }

    pub fn is_volatile(&self, position: usize) -> bool {
        self.references.get(position).is_some_and(|r| r.volatile)
    }

    /// Positions of cells caught in a cycle, ascending
    pub fn circular_cells(&self) -> Vec<usize> {
        (0..self.cells.len()).filter(|&p| self.is_circular(p)).collect()
    }

    /// Positions of cells calling a volatile function, ascending
    pub fn volatile_cells(&self) -> Vec<usize> {
        (0..self.cells.len()).filter(|&p| self.is_volatile(p)).collect()
    }

    /// Derive the edges from each cell's tokens and reorder the chain so
    /// position is calculation order.
    ///
    /// The result depends only on the registered cells, their registration
    /// order and the provider's names, so rebuilding gives the same order.
    pub fn build_calc_order(&mut self, provider: &dyn DataProvider) {
        self.cells.sort_by_key(|cell| cell.seq);

        let mut index = RangeIndex::default();
        for (position, cell) in self.cells.iter().enumerate() {
            index.insert(cell.sheet, cell.row, cell.col, position);
        }

        let references: Vec<References> = self
            .cells
            .iter()
            .map(|cell| scan_references(&cell.tokens, cell.sheet, provider))
            .collect();
        let precedents: Vec<Vec<usize>> = references
            .iter()
            .map(|refs| {
                let mut targets = Vec::new();
                for (sheet, address) in &refs.cells {
                    targets.extend(index.get(*sheet, address.row, address.col));
                }
                for (sheet, range) in &refs.ranges {
                    index.extend_with_range(*sheet, *range, &mut targets);
                }
                targets.sort_unstable();
                targets.dedup();
                targets
            })
            .collect();

        let (postorder, circular) = Traversal::new(&precedents).run();
        let order: Vec<usize> = postorder
            .iter()
            .copied()
            .filter(|&node| !circular[node])
            .chain((0..self.cells.len()).filter(|&node| circular[node]))
            .collect();

        self.apply_order(&order, references, &precedents, &circular);

        let circular_count = self.circular.iter().filter(|c| **c).count();
        if circular_count > 0 {
            warn!(
                "{} formula cells are part of circular references",
                circular_count
            );
        }
        debug!(
            "built calculation order for {} formula cells ({} volatile)",
            self.cells.len(),
            self.volatile_cells().len()
        );
    }

    /// Permute every per-cell table so that `order[i]` moves to position `i`
    fn apply_order(
        &mut self,
        order: &[usize],
        references: Vec<References>,
        precedents: &[Vec<usize>],
        circular: &[bool],
    ) {
        let mut new_position = vec![0; order.len()];
        for (position, &old) in order.iter().enumerate() {
            new_position[old] = position;
        }

        let mut slots: Vec<Option<FormulaCell>> = self.cells.drain(..).map(Some).collect();
        let mut reference_slots: Vec<Option<References>> = references.into_iter().map(Some).collect();
        let mut cells = Vec::with_capacity(order.len());
        let mut ordered_references = Vec::with_capacity(order.len());
        for &old in order {
            if let (Some(cell), Some(refs)) = (slots[old].take(), reference_slots[old].take()) {
                cells.push(cell);
                ordered_references.push(refs);
            }
        }

        self.precedents = order
            .iter()
            .map(|&old| {
                let mut targets: Vec<usize> =
                    precedents[old].iter().map(|&p| new_position[p]).collect();
                targets.sort_unstable();
                targets
            })
            .collect();
        self.dependents = vec![Vec::new(); order.len()];
        for (position, targets) in self.precedents.iter().enumerate() {
            for &target in targets {
                self.dependents[target].push(position);
            }
        }
        self.circular = order.iter().map(|&old| circular[old]).collect();

        self.positions.clear();
        for (position, cell) in cells.iter_mut().enumerate() {
            cell.index = position;
            self.positions.insert(cell.id(), position);
        }
        self.cells = cells;
        self.references = ordered_references;
    }

    /// Positions to recalculate after the cells `changed` were edited, in
    /// calculation order.
    ///
    /// Covers formula cells reading a changed cell, changed formula cells
    /// themselves, every volatile cell, and everything downstream of those.
    pub fn recalc_order_for(&self, changed: &[CellId]) -> Vec<usize> {
        self.recalc_order(changed, true)
    }

    /// [`recalc_order_for`](Self::recalc_order_for), with volatile cells
    /// seeded only when `include_volatile` is set
    pub fn recalc_order(&self, changed: &[CellId], include_volatile: bool) -> Vec<usize> {
        let mut dirty = vec![false; self.cells.len()];
        let mut queue = VecDeque::new();

        for position in 0..self.cells.len() {
            let seeded = (include_volatile && self.is_volatile(position))
                || self.references.get(position).is_some_and(|refs| {
                    changed
                        .iter()
                        .any(|id| refs.reads(id.sheet(), id.row(), id.col()))
                });
            if seeded {
                dirty[position] = true;
                queue.push_back(position);
            }
        }
        for id in changed {
            if let Some(position) = self.position(*id) {
                if !dirty[position] {
                    dirty[position] = true;
                    queue.push_back(position);
                }
            }
        }

        while let Some(position) = queue.pop_front() {
            for &dependent in self.dependents_of(position) {
                if !dirty[dependent] {
                    dirty[dependent] = true;
                    queue.push_back(dependent);
                }
            }
        }

        (0..self.cells.len()).filter(|&p| dirty[p]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_core::Workbook;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn chain_for(wb: &Workbook) -> DependencyChain {
        let mut chain = DependencyChain::new();
        for sheet in 0..wb.sheet_count() {
            for (row, col, formula) in wb.formula_cells(sheet) {
                chain
                    .add(FormulaCell::from_formula(sheet, row, col, &formula).unwrap())
                    .unwrap();
            }
        }
        chain.build_calc_order(wb);
        chain
    }

    fn addresses(chain: &DependencyChain) -> Vec<String> {
        chain
            .cells()
            .iter()
            .map(|c| gridcalc_core::CellAddress::new(c.row, c.col).to_a1_string())
            .collect()
    }

    #[test]
    fn test_add_rejects_duplicates() {
        let mut chain = DependencyChain::new();
        assert_eq!(chain.add(FormulaCell::from_formula(0, 0, 0, "=1").unwrap()), Ok(0));
        assert_eq!(chain.add(FormulaCell::from_formula(0, 0, 1, "=2").unwrap()), Ok(1));
        let duplicate = chain.add(FormulaCell::from_formula(0, 0, 0, "=3").unwrap());
        assert!(matches!(duplicate, Err(FormulaError::Contract(_))));
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.position(CellId::new(0, 0, 1).unwrap()), Some(1));
    }

    #[test]
    fn test_out_of_bounds_cell() {
        assert!(matches!(
            FormulaCell::from_formula(0, 2_000_000, 0, "=1"),
            Err(FormulaError::InvalidReference(_))
        ));
    }

    #[test]
    fn test_linear_chain_order() {
        let wb = Workbook::new();
        let mut chain = DependencyChain::new();
        // Registered in reverse so the order has to be derived
        for (col, formula) in [(2, "=B1+1"), (1, "=A1+1"), (0, "=10")] {
            chain
                .add(FormulaCell::from_formula(0, 0, col, formula).unwrap())
                .unwrap();
        }
        chain.build_calc_order(&wb);

        assert_eq!(addresses(&chain), vec!["A1", "B1", "C1"]);
        assert!(chain.circular_cells().is_empty());
        for (position, cell) in chain.cells().iter().enumerate() {
            assert_eq!(cell.index, position);
        }

        chain.build_calc_order(&wb);
        assert_eq!(addresses(&chain), vec!["A1", "B1", "C1"]);
    }

    #[test]
    fn test_range_and_name_edges() {
        let mut wb = Workbook::new();
        wb.define_name("Inputs", "Sheet1!A1:A3").unwrap();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_formula("B1", "=SUM(A1:A3)").unwrap();
        ws.set_cell_formula("C1", "=SUM(Inputs)*2").unwrap();
        ws.set_cell_formula("A2", "=5").unwrap();

        let chain = chain_for(&wb);
        let a2 = chain.position(CellId::new(0, 1, 0).unwrap()).unwrap();
        let b1 = chain.position(CellId::new(0, 0, 1).unwrap()).unwrap();
        let c1 = chain.position(CellId::new(0, 0, 2).unwrap()).unwrap();
        assert!(a2 < b1);
        assert!(a2 < c1);
        assert_eq!(chain.precedents_of(c1), &[a2]);
        assert_eq!(chain.dependents_of(a2).len(), 2);
    }

    #[test]
    fn test_self_reference_is_circular() {
        let mut wb = Workbook::new();
        wb.worksheet_mut(0)
            .unwrap()
            .set_cell_formula("A1", "=A1")
            .unwrap();
        let chain = chain_for(&wb);
        assert_eq!(chain.circular_cells(), vec![0]);
    }

    #[test]
    fn test_cycles_move_to_the_end() {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_formula("A1", "=B1").unwrap();
        ws.set_cell_formula("B1", "=A1").unwrap();
        ws.set_cell_formula("C1", "=1").unwrap();
        ws.set_cell_formula("D1", "=C1+1").unwrap();

        let chain = chain_for(&wb);
        assert_eq!(addresses(&chain), vec!["C1", "D1", "A1", "B1"]);
        assert_eq!(chain.circular_cells(), vec![2, 3]);
    }

    #[test]
    fn test_recalc_order_includes_volatile_and_dependents() {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value("A1", 1.0).unwrap();
        ws.set_cell_formula("B1", "=A1*2").unwrap();
        ws.set_cell_formula("C1", "=B1+1").unwrap();
        ws.set_cell_formula("D1", "=NOW()").unwrap();
        ws.set_cell_formula("E1", "=D1").unwrap();
        ws.set_cell_formula("F1", "=7").unwrap();

        let chain = chain_for(&wb);
        assert_eq!(chain.volatile_cells().len(), 1);

        let order = chain.recalc_order_for(&[CellId::new(0, 0, 0).unwrap()]);
        let names: Vec<String> = order
            .iter()
            .map(|&p| {
                let c = chain.get(p).unwrap();
                gridcalc_core::CellAddress::new(c.row, c.col).to_a1_string()
            })
            .collect();
        assert_eq!(names, vec!["B1", "C1", "D1", "E1"]);

        let without_volatile = chain.recalc_order(&[CellId::new(0, 0, 0).unwrap()], false);
        assert_eq!(without_volatile, vec![0, 1]);
    }

    proptest! {
        #[test]
        fn prop_precedents_come_first(
            refs in proptest::collection::vec(proptest::collection::vec(0u32..12, 0..4), 1..12)
        ) {
            let mut wb = Workbook::new();
            let ws = wb.worksheet_mut(0).unwrap();
            for (row, targets) in refs.iter().enumerate() {
                let mut formula = String::from("=0");
                for target in targets {
                    formula.push_str(&format!("+A{}", target + 1));
                }
                ws.set_cell_formula_at(row as u32, 0, &formula).unwrap();
            }

            let mut chain = chain_for(&wb);
            let first: Vec<CellId> = chain.cells().iter().map(|c| c.id()).collect();
            for position in 0..chain.len() {
                prop_assert_eq!(chain.get(position).unwrap().index, position);
                if chain.is_circular(position) {
                    continue;
                }
                for &precedent in chain.precedents_of(position) {
                    if !chain.is_circular(precedent) {
                        prop_assert!(chain.get(precedent).unwrap().index < position);
                    }
                }
            }

            chain.build_calc_order(&wb);
            let second: Vec<CellId> = chain.cells().iter().map(|c| c.id()).collect();
            prop_assert_eq!(first, second);
        }
    }
}
