use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;
use tracing::{info, warn};

use super::stats::ItemStatsTable;

pub const DEFAULT_CADENCE: u64 = 15;

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RankedItem {
    pub item: String,
    pub score: i64,
}

/// Full ranking captured at a cumulative judgment count.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RankingSnapshot {
    pub sequence: u64,
    pub ranking: Vec<RankedItem>,
}

impl RankingSnapshot {
    pub fn capture(sequence: u64, table: &ItemStatsTable) -> Self {
        let ranking = table
            .ranking()
            .into_iter()
            .map(|(item, stats)| RankedItem {
                item: item.to_string(),
                score: stats.score,
            })
            .collect();
        Self { sequence, ranking }
    }

    /// Zero-based rank of every item in this snapshot.
    pub fn positions(&self) -> HashMap<&str, usize> {
        self.ranking
            .iter()
            .enumerate()
            .map(|(rank, entry)| (entry.item.as_str(), rank))
            .collect()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct VariabilityPoint {
    pub judgments: u64,
    pub variability: f64,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SnapshotTaken {
    pub sequence: u64,
    pub variability: Option<f64>,
}

/// Captures the ranking every `cadence` judgments and tracks `1 - rho` between captures.
#[derive(Clone, Debug)]
pub struct RankingSnapshotter {
    cadence: u64,
    history: Vec<RankingSnapshot>,
    series: Vec<VariabilityPoint>,
}

impl Default for RankingSnapshotter {
    fn default() -> Self {
        Self::new(DEFAULT_CADENCE)
    }
}

impl RankingSnapshotter {
    pub fn new(cadence: u64) -> Self {
        Self {
            cadence: cadence.max(1),
            history: Vec::new(),
            series: Vec::new(),
        }
    }

    pub fn cadence(&self) -> u64 {
        self.cadence
    }

    #[cfg(test)]
    pub fn history(&self) -> &[RankingSnapshot] {
        &self.history
    }

    pub fn latest(&self) -> Option<&RankingSnapshot> {
        self.history.last()
    }

    pub fn series(&self) -> &[VariabilityPoint] {
        &self.series
    }

    /// Replaces the history with previously persisted snapshots and rebuilds the series.
    pub fn restore(&mut self, mut snapshots: Vec<RankingSnapshot>, candidates: &[String]) {
        snapshots.sort_by_key(|snapshot| snapshot.sequence);
        snapshots.dedup_by_key(|snapshot| snapshot.sequence);

        self.history.clear();
        self.series.clear();
        for snapshot in snapshots {
            self.record(snapshot, candidates);
        }
    }

    /// A capture is due at positive multiples of the cadence not yet recorded.
    pub fn is_due(&self, total_judgments: u64) -> bool {
        if total_judgments == 0 || total_judgments % self.cadence != 0 {
            return false;
        }
        self.history
            .last()
            .is_none_or(|latest| total_judgments > latest.sequence)
    }

    pub fn maybe_snapshot(
        &mut self,
        total_judgments: u64,
        table: &ItemStatsTable,
        candidates: &[String],
    ) -> Option<SnapshotTaken> {
        if !self.is_due(total_judgments) {
            return None;
        }

        let snapshot = RankingSnapshot::capture(total_judgments, table);
        let variability = self.record(snapshot, candidates);
        Some(SnapshotTaken {
            sequence: total_judgments,
            variability,
        })
    }

    fn record(&mut self, snapshot: RankingSnapshot, candidates: &[String]) -> Option<f64> {
        let variability = self
            .history
            .last()
            .and_then(|previous| rank_variability(&snapshot, previous, candidates));

        match variability {
            Some(value) => {
                info!(
                    judgments = snapshot.sequence,
                    variability = value,
                    "ranking variability updated"
                );
                self.series.push(VariabilityPoint {
                    judgments: snapshot.sequence,
                    variability: value,
                });
            }
            None if !self.history.is_empty() => {
                warn!(
                    judgments = snapshot.sequence,
                    "rank correlation undefined for consecutive snapshots"
                );
            }
            None => {}
        }

        self.history.push(snapshot);
        variability
    }
}

/// `1 - rho` over the candidate set; items missing from a snapshot take the worst rank.
pub fn rank_variability(
    current: &RankingSnapshot,
    previous: &RankingSnapshot,
    candidates: &[String],
) -> Option<f64> {
    let missing = candidates.len() as f64;
    let current_ranks = current.positions();
    let previous_ranks = previous.positions();

    let lookup = |ranks: &HashMap<&str, usize>, item: &str| {
        ranks.get(item).map_or(missing, |&rank| rank as f64)
    };
    let (xs, ys): (Vec<f64>, Vec<f64>) = candidates
        .iter()
        .map(|item| {
            (
                lookup(&current_ranks, item.as_str()),
                lookup(&previous_ranks, item.as_str()),
            )
        })
        .unzip();

    spearman_rho(&xs, &ys).map(|rho| 1.0 - rho)
}

/// Spearman's rank correlation with average ranks for ties.
///
/// Undefined (`None`) for fewer than two observations, mismatched lengths, or a
/// constant sequence.
pub fn spearman_rho(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    pearson(&average_ranks(xs), &average_ranks(ys)).map(|rho| rho.clamp(-1.0, 1.0))
}

fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order = (0..values.len()).collect::<Vec<_>>();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end share the mean of 1-based ranks start+1..=end
        let shared = (start + end + 1) as f64 / 2.0;
        for &slot in &order[start..end] {
            ranks[slot] = shared;
        }
        start = end;
    }
    ranks
}

fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut variance_x = 0.0;
    let mut variance_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        covariance += dx * dy;
        variance_x += dx * dx;
        variance_y += dy * dy;
    }

    if variance_x == 0.0 || variance_y == 0.0 {
        return None;
    }
    Some(covariance / (variance_x * variance_y).sqrt())
}
