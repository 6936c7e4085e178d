use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A requested cut length together with how many copies are needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Demand {
    pub length: u32,
    pub qty: u32,
}

impl Demand {
    pub fn new(length: u32, qty: u32) -> Self {
        Self { length, qty }
    }
}

impl std::fmt::Display for Demand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.qty == 1 {
            write!(f, "{}", self.length)
        } else {
            write!(f, "{}:{}", self.length, self.qty)
        }
    }
}

/// Expands demands into one entry per physical piece, keeping demand order.
pub fn expand_demands(demands: &[Demand]) -> Vec<u32> {
    demands
        .iter()
        .flat_map(|d| std::iter::repeat_n(d.length, d.qty as usize))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Branch-and-bound search over every assignment.
    #[default]
    Exact,
    /// First-Fit Decreasing, single pass.
    Greedy,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Exact => f.write_str("exact"),
            Strategy::Greedy => f.write_str("greedy"),
        }
    }
}

/// Bounds on how much work the exact search may do before settling for
/// its best-so-far answer. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchLimits {
    pub node_budget: Option<u64>,
    pub time_limit: Option<Duration>,
}

impl SearchLimits {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_node_budget(mut self, nodes: u64) -> Self {
        self.node_budget = Some(nodes);
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }
}

/// Outcome of one packing run.
///
/// `assignments[i]` is the 0-based stock ordinal that piece `i` (in the
/// caller's original order) is cut from, and `lengths[i]` is that piece's
/// length, so a presentation layer can regroup pieces per stock without
/// re-running any optimization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackingResult {
    pub stock_length: u32,
    pub bins_used: usize,
    pub waste: u64,
    pub assignments: Vec<usize>,
    pub lengths: Vec<u32>,
    /// True when the bin count is proven minimal. False after a search
    /// limit cut the exact search short, or for a greedy result that did
    /// not reach the lower bound.
    pub optimal: bool,
    /// Search nodes visited. Zero for the greedy packer.
    pub nodes: u64,
}

impl PackingResult {
    /// Piece lengths grouped per stock, longest first within a stock.
    pub fn stocks(&self) -> Vec<Vec<u32>> {
        group_by_bin(self.bins_used, &self.lengths, self.assignments.iter().map(|&b| Some(b)))
    }

    /// Used length of every stock, in stock order.
    pub fn bin_loads(&self) -> Vec<u64> {
        let mut loads = vec![0u64; self.bins_used];
        for (&bin, &len) in self.assignments.iter().zip(&self.lengths) {
            loads[bin] += len as u64;
        }
        loads
    }

    pub fn total_length(&self) -> u64 {
        self.lengths.iter().map(|&l| l as u64).sum()
    }

    pub fn waste_percent(&self) -> f64 {
        let total = self.stock_length as u64 * self.bins_used as u64;
        if total == 0 {
            return 0.0;
        }
        self.waste as f64 / total as f64 * 100.0
    }
}

/// Groups `lengths` by their bin. Unassigned pieces (`None`) are skipped.
pub(crate) fn group_by_bin(
    bins: usize,
    lengths: &[u32],
    assignment: impl Iterator<Item = Option<usize>>,
) -> Vec<Vec<u32>> {
    let mut stocks = vec![Vec::new(); bins];
    for (bin, &len) in assignment.zip(lengths) {
        if let Some(bin) = bin.filter(|&b| b < bins) {
            stocks[bin].push(len);
        }
    }
    for stock in &mut stocks {
        stock.sort_by(|a, b| b.cmp(a));
    }
    stocks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PackingResult {
        PackingResult {
            stock_length: 200,
            bins_used: 2,
            waste: 70,
            assignments: vec![1, 1, 0, 1, 0],
            lengths: vec![50, 75, 100, 25, 80],
            optimal: true,
            nodes: 12,
        }
    }

    #[test]
    fn test_expand_demands_keeps_order() {
        let pieces = expand_demands(&[Demand::new(60, 2), Demand::new(35, 1), Demand::new(10, 0)]);
        assert_eq!(pieces, vec![60, 60, 35]);
    }

    #[test]
    fn test_stocks_grouped_descending() {
        assert_eq!(sample().stocks(), vec![vec![100, 80], vec![75, 50, 25]]);
    }

    #[test]
    fn test_bin_loads() {
        assert_eq!(sample().bin_loads(), vec![180, 150]);
        assert_eq!(sample().total_length(), 330);
    }

    #[test]
    fn test_waste_percent() {
        assert!((sample().waste_percent() - 17.5).abs() < 1e-9);

        let empty = PackingResult {
            bins_used: 0,
            waste: 0,
            assignments: vec![],
            lengths: vec![],
            ..sample()
        };
        assert_eq!(empty.waste_percent(), 0.0);
    }

    #[test]
    fn test_json_output() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["stock_length"], 200);
        assert_eq!(value["bins_used"], 2);
        assert_eq!(value["waste"], 70);
        assert_eq!(value["assignments"], serde_json::json!([1, 1, 0, 1, 0]));
        assert_eq!(value["lengths"], serde_json::json!([50, 75, 100, 25, 80]));
        assert_eq!(value["optimal"], true);
        assert_eq!(value["nodes"], 12);
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(serde_json::to_string(&Strategy::Greedy).unwrap(), "\"greedy\"");
        assert_eq!(
            serde_json::from_str::<Strategy>("\"exact\"").unwrap(),
            Strategy::Exact
        );
    }

    #[test]
    fn test_demand_display() {
        assert_eq!(Demand::new(60, 1).to_string(), "60");
        assert_eq!(Demand::new(60, 4).to_string(), "60:4");
    }
}
