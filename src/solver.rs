use std::cmp::Reverse;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::{PackError, Result};
use crate::ledger::BinLedger;
use crate::render;
use crate::types::{PackingResult, SearchLimits, Strategy, group_by_bin};

/// How often the deadline is polled, in search nodes.
const DEADLINE_POLL_INTERVAL: u64 = 1024;

pub struct Solver {
    stock_length: u32,
    lengths: Vec<u32>,
    limits: SearchLimits,
}

impl Solver {
    pub fn new(stock_length: u32, lengths: Vec<u32>) -> Self {
        Self {
            stock_length,
            lengths,
            limits: SearchLimits::unbounded(),
        }
    }

    pub fn with_limits(mut self, limits: SearchLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn solve(&self, strategy: Strategy) -> Result<PackingResult> {
        match strategy {
            Strategy::Exact => self.solve_exact(),
            Strategy::Greedy => self.solve_greedy(),
        }
    }

    /// Runs the branch-and-bound search. The result is optimal unless a
    /// search limit was hit, in which case `optimal` is false.
    pub fn solve_exact(&self) -> Result<PackingResult> {
        self.solve_with_progress(|_| {})
    }

    /// Like [`Solver::solve_exact`], calling `on_improvement` with a view of
    /// the search state every time a better complete packing is found.
    pub fn solve_with_progress<F>(&self, mut on_improvement: F) -> Result<PackingResult>
    where
        F: FnMut(&SearchSnapshot<'_>),
    {
        self.validate()?;
        let pieces = SortedPieces::new(&self.lengths);
        let lower_bound = lower_bound(pieces.total(), self.stock_length);
        let started = Instant::now();

        let search = ExactSearch {
            lengths: &pieces.lengths,
            suffix: &pieces.suffix,
            stock_length: self.stock_length,
            lower_bound,
            node_budget: self.limits.node_budget,
            deadline: self.limits.time_limit.map(|limit| started + limit),
        };
        let mut state = SearchState::new(self.stock_length, pieces.len());
        search.run(&mut state, &mut on_improvement);
        debug_assert_eq!(state.ledger.open_count(), 0);
        debug_assert!(state.current.iter().all(Option::is_none));

        let SearchState {
            best, nodes, stop, ..
        } = state;
        let best = match best {
            Some(best) => best,
            None => {
                warn!(
                    nodes,
                    "search limit hit before any complete packing, using first-fit decreasing"
                );
                first_fit_decreasing(&pieces.lengths, self.stock_length)
            }
        };
        let optimal = match stop {
            Some(StopReason::BudgetExceeded) => best.bins <= lower_bound,
            _ => true,
        };
        if !optimal {
            warn!(
                bins = best.bins,
                lower_bound,
                nodes,
                "search limit exceeded, packing may not be optimal"
            );
        }

        let result = self.project(&pieces, best, optimal, nodes);
        info!(
            strategy = %Strategy::Exact,
            pieces = result.lengths.len(),
            bins = result.bins_used,
            waste = result.waste,
            nodes,
            optimal,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "packing finished"
        );
        Ok(result)
    }

    /// First-Fit Decreasing: one pass, no backtracking.
    pub fn solve_greedy(&self) -> Result<PackingResult> {
        self.validate()?;
        let pieces = SortedPieces::new(&self.lengths);
        let best = first_fit_decreasing(&pieces.lengths, self.stock_length);
        let optimal = best.bins <= lower_bound(pieces.total(), self.stock_length);

        let result = self.project(&pieces, best, optimal, 0);
        info!(
            strategy = %Strategy::Greedy,
            pieces = result.lengths.len(),
            bins = result.bins_used,
            waste = result.waste,
            optimal,
            "packing finished"
        );
        Ok(result)
    }

    /// Rejects bad input before any search state is allocated. A piece
    /// longer than the stock is reported even if other pieces are invalid.
    fn validate(&self) -> Result<()> {
        if self.stock_length == 0 {
            return Err(PackError::InvalidStockLength);
        }
        if self.lengths.is_empty() {
            return Err(PackError::NoPieces);
        }
        if let Some((index, &length)) = self
            .lengths
            .iter()
            .enumerate()
            .find(|&(_, &len)| len > self.stock_length)
        {
            return Err(PackError::Infeasible {
                index,
                length,
                stock_length: self.stock_length,
            });
        }
        if let Some(index) = self.lengths.iter().position(|&len| len == 0) {
            return Err(PackError::InvalidPieceLength { index });
        }
        Ok(())
    }

    /// Maps an assignment over the sorted view back to the caller's order.
    fn project(
        &self,
        pieces: &SortedPieces,
        best: Incumbent,
        optimal: bool,
        nodes: u64,
    ) -> PackingResult {
        let mut assignments = vec![0; pieces.len()];
        for (&original, &bin) in pieces.order.iter().zip(&best.assignment) {
            assignments[original] = bin;
        }

        PackingResult {
            stock_length: self.stock_length,
            bins_used: best.bins,
            waste: best.waste,
            assignments,
            lengths: self.lengths.clone(),
            optimal,
            nodes,
        }
    }
}

/// Indices of `lengths` ordered longest first. Equal lengths keep their
/// input order.
pub fn descending_order(lengths: &[u32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..lengths.len()).collect();
    order.sort_by_key(|&i| Reverse(lengths[i]));
    order
}

/// Fewest bins any packing of `total` length can use.
fn lower_bound(total: u64, stock_length: u32) -> usize {
    total.div_ceil(stock_length as u64) as usize
}

/// The pieces in search order along with the way back to input order.
struct SortedPieces {
    order: Vec<usize>,
    lengths: Vec<u32>,
    /// `suffix[i]` is the summed length of `lengths[i..]`.
    suffix: Vec<u64>,
}

impl SortedPieces {
    fn new(input: &[u32]) -> Self {
        let order = descending_order(input);
        let lengths: Vec<u32> = order.iter().map(|&i| input[i]).collect();

        let mut suffix = vec![0u64; lengths.len() + 1];
        for i in (0..lengths.len()).rev() {
            suffix[i] = suffix[i + 1] + lengths[i] as u64;
        }

        Self {
            order,
            lengths,
            suffix,
        }
    }

    fn len(&self) -> usize {
        self.lengths.len()
    }

    fn total(&self) -> u64 {
        self.suffix[0]
    }
}

/// A complete packing over the sorted pieces.
#[derive(Debug, Clone)]
struct Incumbent {
    bins: usize,
    waste: u64,
    assignment: Vec<usize>,
}

fn first_fit_decreasing(lengths: &[u32], stock_length: u32) -> Incumbent {
    let mut ledger = BinLedger::with_capacity(stock_length, lengths.len());
    let assignment = lengths
        .iter()
        .map(|&length| match ledger.first_fit(length) {
            Some(bin) => {
                ledger.insert(bin, length);
                bin
            }
            None => ledger.open(length),
        })
        .collect();

    Incumbent {
        bins: ledger.open_count(),
        waste: ledger.waste(),
        assignment,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    /// The incumbent meets the lower bound, nothing can beat it.
    LowerBoundReached,
    BudgetExceeded,
}

/// Mutable state threaded through one exact search.
struct SearchState {
    ledger: BinLedger,
    current: Vec<Option<usize>>,
    best: Option<Incumbent>,
    nodes: u64,
    stop: Option<StopReason>,
}

impl SearchState {
    fn new(stock_length: u32, pieces: usize) -> Self {
        Self {
            ledger: BinLedger::with_capacity(stock_length, pieces),
            current: vec![None; pieces],
            best: None,
            nodes: 0,
            stop: None,
        }
    }

    fn best_bins(&self) -> usize {
        self.best.as_ref().map_or(usize::MAX, |best| best.bins)
    }

    fn apply(&mut self, pos: usize, step: Step, length: u32) {
        let bin = match step {
            Step::Into(bin) => {
                self.ledger.insert(bin, length);
                bin
            }
            Step::Fresh => self.ledger.open(length),
        };
        self.current[pos] = Some(bin);
    }

    /// Reverts a matching [`SearchState::apply`].
    fn undo(&mut self, pos: usize, step: Step, length: u32) {
        self.current[pos] = None;
        match step {
            Step::Into(bin) => self.ledger.remove(bin, length),
            Step::Fresh => self.ledger.close(length),
        }
    }

    /// Takes the current complete packing if it has strictly less waste
    /// than the incumbent. Ties keep the earlier packing.
    fn record_leaf(&mut self) -> bool {
        let waste = self.ledger.waste();
        if self.best.as_ref().is_some_and(|best| waste >= best.waste) {
            return false;
        }
        self.best = Some(Incumbent {
            bins: self.ledger.open_count(),
            waste,
            assignment: self.current.iter().flatten().copied().collect(),
        });
        true
    }

    fn snapshot<'a>(&'a self, lengths: &'a [u32]) -> SearchSnapshot<'a> {
        SearchSnapshot {
            lengths,
            assignment: &self.current,
            remaining: self.ledger.remaining(),
            stock_length: self.ledger.stock_length(),
        }
    }
}

/// Where a piece goes: an already open bin, or a newly opened one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Into(usize),
    Fresh,
}

/// One level of the search stack. `placed` is the step taken for piece
/// `pos` whose subtree is being explored; it is undone before the next
/// step is tried or the frame is popped.
struct Frame {
    pos: usize,
    next_bin: usize,
    fresh_tried: bool,
    placed: Option<Step>,
}

impl Frame {
    fn new(pos: usize) -> Self {
        Self {
            pos,
            next_bin: 0,
            fresh_tried: false,
            placed: None,
        }
    }
}

/// Read-only view of a search in progress, over the pieces in search order.
#[derive(Debug, Clone, Copy)]
pub struct SearchSnapshot<'a> {
    lengths: &'a [u32],
    assignment: &'a [Option<usize>],
    remaining: &'a [u32],
    stock_length: u32,
}

impl SearchSnapshot<'_> {
    /// Piece lengths, longest first.
    pub fn lengths(&self) -> &[u32] {
        self.lengths
    }

    /// Bin of each piece in [`SearchSnapshot::lengths`], `None` if not yet placed.
    pub fn assignment(&self) -> &[Option<usize>] {
        self.assignment
    }

    pub fn bins_open(&self) -> usize {
        self.remaining.len()
    }

    /// Free length left on each open bin.
    pub fn remaining(&self) -> &[u32] {
        self.remaining
    }

    pub fn stock_length(&self) -> u32 {
        self.stock_length
    }

    /// Placed piece lengths grouped per open bin.
    pub fn stocks(&self) -> Vec<Vec<u32>> {
        group_by_bin(
            self.bins_open(),
            self.lengths,
            self.assignment.iter().copied(),
        )
    }
}

/// Inputs of the exact search that stay fixed while it runs.
struct ExactSearch<'p> {
    lengths: &'p [u32],
    suffix: &'p [u64],
    stock_length: u32,
    lower_bound: usize,
    node_budget: Option<u64>,
    deadline: Option<Instant>,
}

impl ExactSearch<'_> {
    /// Depth-first search over every placement, on an explicit stack so
    /// the depth is bounded by memory rather than the thread stack. Each
    /// piece tries the open bins in ordinal order, then one new bin.
    fn run(
        &self,
        state: &mut SearchState,
        on_improvement: &mut dyn FnMut(&SearchSnapshot<'_>),
    ) {
        let mut stack = Vec::with_capacity(self.lengths.len() + 1);
        if self.enter(state, 0, on_improvement) {
            stack.push(Frame::new(0));
        }

        while let Some(frame) = stack.last_mut() {
            let length = self.lengths[frame.pos];
            if let Some(step) = frame.placed.take() {
                state.undo(frame.pos, step, length);
            }
            let next = match state.stop {
                Some(_) => None,
                None => self.next_step(state, frame, length),
            };
            let Some(step) = next else {
                stack.pop();
                continue;
            };

            let pos = frame.pos;
            frame.placed = Some(step);
            state.apply(pos, step, length);
            if self.enter(state, pos + 1, on_improvement) {
                stack.push(Frame::new(pos + 1));
            }
        }
    }

    /// Counts a node for piece `pos` and reports whether it should be
    /// branched on. Complete packings are recorded here.
    fn enter(
        &self,
        state: &mut SearchState,
        pos: usize,
        on_improvement: &mut dyn FnMut(&SearchSnapshot<'_>),
    ) -> bool {
        if state.stop.is_some() {
            return false;
        }
        if self.out_of_budget(state) {
            state.stop = Some(StopReason::BudgetExceeded);
            return false;
        }
        state.nodes += 1;

        if pos == self.lengths.len() {
            if state.record_leaf() {
                let snapshot = state.snapshot(self.lengths);
                debug!(
                    bins = snapshot.bins_open(),
                    waste = state.ledger.waste(),
                    nodes = state.nodes,
                    "new best packing\n{}",
                    render::render_assignments(&snapshot.stocks())
                );
                on_improvement(&snapshot);
                if state.best_bins() <= self.lower_bound {
                    state.stop = Some(StopReason::LowerBoundReached);
                }
            }
            return false;
        }

        // Equal bin count means equal waste, so only strictly fewer bins
        // can improve on the incumbent.
        let best = state.best_bins();
        let open = state.ledger.open_count();
        if open >= best {
            return false;
        }
        let overflow = self.suffix[pos].saturating_sub(state.ledger.waste());
        open + (overflow.div_ceil(self.stock_length as u64) as usize) < best
    }

    fn next_step(&self, state: &SearchState, frame: &mut Frame, length: u32) -> Option<Step> {
        let remaining = state.ledger.remaining();
        while frame.next_bin < remaining.len() {
            let bin = frame.next_bin;
            frame.next_bin += 1;
            // Bins with equal free length root mirrored subtrees.
            if remaining[bin] >= length && !remaining[..bin].contains(&remaining[bin]) {
                return Some(Step::Into(bin));
            }
        }
        if !frame.fresh_tried {
            frame.fresh_tried = true;
            if remaining.len() + 1 < state.best_bins() {
                return Some(Step::Fresh);
            }
        }
        None
    }

    fn out_of_budget(&self, state: &SearchState) -> bool {
        if self.node_budget.is_some_and(|budget| state.nodes >= budget) {
            return true;
        }
        match self.deadline {
            Some(deadline) if state.nodes % DEADLINE_POLL_INTERVAL == 0 => {
                Instant::now() >= deadline
            }
            _ => false,
        }
    }
}
