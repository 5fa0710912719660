use std::collections::HashSet;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::error::EngineError;
use super::ledger::{ComparisonEntry, ComparisonLedger};
use super::selector::PairSelector;
use super::snapshot::{RankingSnapshot, RankingSnapshotter, SnapshotTaken, VariabilityPoint};
use super::stats::{GlobalCounters, ItemStatsTable, Judgment};
use super::store::PersistenceStore;

/// Result of one judgment. The in-memory state has always advanced; `save_error`
/// carries a persistence failure that [`Session::save`] can retry.
#[derive(Debug)]
pub struct JudgeOutcome {
    pub snapshot: Option<SnapshotTaken>,
    pub save_error: Option<anyhow::Error>,
}

/// Exclusive owner of the stats table, ledger, counters and snapshot history for
/// one judging session.
pub struct Session<S> {
    candidates: Vec<String>,
    table: ItemStatsTable,
    counters: GlobalCounters,
    ledger: ComparisonLedger,
    snapshotter: RankingSnapshotter,
    unsaved_snapshots: Vec<RankingSnapshot>,
    selector: S,
    store: PersistenceStore,
}

impl<S: PairSelector> Session<S> {
    /// Restores persisted stats and snapshots for `candidates` and draws the first pair.
    pub fn open(
        candidates: Vec<String>,
        store: PersistenceStore,
        selector: S,
        cadence: u64,
    ) -> Result<Self> {
        let candidates = distinct_candidates(candidates);
        if candidates.len() < 2 {
            return Err(EngineError::InsufficientItems {
                found: candidates.len(),
            }
            .into());
        }

        let (table, counters) = store.load(&candidates)?;
        let mut snapshotter = RankingSnapshotter::new(cadence);
        let persisted = store
            .load_snapshots()
            .context("failed to restore ranking snapshots")?;
        if !persisted.is_empty() {
            info!(snapshots = persisted.len(), "restored ranking snapshot history");
        }
        snapshotter.restore(persisted, &candidates);

        let mut session = Self {
            candidates,
            table,
            counters,
            ledger: ComparisonLedger::new(),
            snapshotter,
            unsaved_snapshots: Vec::new(),
            selector,
            store,
        };
        session.advance()?;

        info!(
            items = session.candidates.len(),
            total_judgments = session.counters.total_judgments,
            cadence = session.snapshotter.cadence(),
            "session opened"
        );
        Ok(session)
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn stats(&self) -> &ItemStatsTable {
        &self.table
    }

    pub fn total_judgments(&self) -> u64 {
        self.counters.total_judgments
    }

    pub fn ledger(&self) -> &ComparisonLedger {
        &self.ledger
    }

    pub fn current_entry(&self) -> Option<&ComparisonEntry> {
        self.ledger.current()
    }

    pub fn current_pair(&self) -> Option<(&str, &str)> {
        self.ledger
            .current()
            .map(|entry| (entry.item_a(), entry.item_b()))
    }

    pub fn series(&self) -> &[VariabilityPoint] {
        self.snapshotter.series()
    }

    pub fn latest_snapshot(&self) -> Option<&RankingSnapshot> {
        self.snapshotter.latest()
    }

    pub fn store(&self) -> &PersistenceStore {
        &self.store
    }

    /// False only on the newest entry while it is still unjudged.
    pub fn can_advance(&self) -> bool {
        !self.ledger.is_at_newest()
            || self
                .ledger
                .current()
                .is_some_and(|entry| entry.judgment().is_some())
    }

    pub fn advance(&mut self) -> Result<usize> {
        let index = self
            .ledger
            .advance(&mut self.selector, &self.candidates)?;
        debug!(index, entries = self.ledger.len(), "advanced");
        Ok(index)
    }

    pub fn retreat(&mut self) -> bool {
        self.ledger.retreat()
    }

    /// Records `decision` on the displayed pair, moves to the next pair, and
    /// persists stats plus any snapshot that came due.
    pub fn judge(&mut self, decision: Judgment) -> Result<JudgeOutcome> {
        self.ledger.judge(
            &mut self.table,
            &mut self.counters,
            &mut self.selector,
            &self.candidates,
            decision,
        )?;
        let total = self.counters.total_judgments;
        debug!(judgment = decision.as_str(), total_judgments = total, "judgment applied");

        let snapshot = self
            .snapshotter
            .maybe_snapshot(total, &self.table, &self.candidates);
        if snapshot.is_some() {
            if let Some(latest) = self.snapshotter.latest() {
                self.unsaved_snapshots.push(latest.clone());
            }
        }

        let save_error = self.save().err();
        if let Some(err) = &save_error {
            warn!(error = %err, "failed to persist session state; in-memory state kept");
        }

        Ok(JudgeOutcome {
            snapshot,
            save_error,
        })
    }

    /// Writes the stats file, any snapshots not yet on disk, and the stability series.
    pub fn save(&mut self) -> Result<()> {
        self.store.save(&self.table, &self.counters)?;

        while let Some(snapshot) = self.unsaved_snapshots.first() {
            match self.store.save_snapshot(snapshot) {
                Ok(_) => {}
                Err(err)
                    if matches!(
                        err.downcast_ref::<EngineError>(),
                        Some(EngineError::SnapshotExists { .. })
                    ) =>
                {
                    warn!(error = %err, "keeping the snapshot already on disk");
                }
                Err(err) => return Err(err),
            }
            self.unsaved_snapshots.remove(0);
        }

        if !self.snapshotter.series().is_empty() {
            self.store.save_series(self.snapshotter.series())?;
        }
        Ok(())
    }
}

/// Drops repeated keys, keeping first-seen order, so a pair always names two items.
fn distinct_candidates(candidates: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(candidates.len());
    let mut distinct = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if seen.insert(candidate.clone()) {
            distinct.push(candidate);
        } else {
            warn!(item = %candidate, "duplicate candidate ignored");
        }
    }
    distinct
}
