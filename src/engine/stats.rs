use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use super::error::EngineError;
use super::ledger::ComparisonEntry;

/// Outcome of a single comparison, relative to the entry's `(item_a, item_b)` order.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Judgment {
    AMore,
    BMore,
    Equal,
}

impl Judgment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AMore => "a_more",
            Self::BMore => "b_more",
            Self::Equal => "equal",
        }
    }

    /// Per-item deltas for `(item_a, item_b)`; sample counts are handled separately.
    fn effects(self) -> (StatsDelta, StatsDelta) {
        match self {
            Self::AMore => (StatsDelta::WIN, StatsDelta::LOSS),
            Self::BMore => (StatsDelta::LOSS, StatsDelta::WIN),
            Self::Equal => (StatsDelta::DRAW, StatsDelta::DRAW),
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct StatsDelta {
    score: i64,
    wins: u32,
    losses: u32,
    draws: u32,
}

impl StatsDelta {
    const WIN: Self = Self {
        score: 2,
        wins: 1,
        losses: 0,
        draws: 0,
    };
    const LOSS: Self = Self {
        score: 0,
        wins: 0,
        losses: 1,
        draws: 0,
    };
    const DRAW: Self = Self {
        score: 1,
        wins: 0,
        losses: 0,
        draws: 1,
    };
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ItemStats {
    pub score: i64,
    pub samples: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

impl ItemStats {
    pub fn is_consistent(&self) -> bool {
        u64::from(self.samples)
            == u64::from(self.wins) + u64::from(self.losses) + u64::from(self.draws)
    }

    fn add(&mut self, delta: StatsDelta) {
        self.score += delta.score;
        self.wins += delta.wins;
        self.losses += delta.losses;
        self.draws += delta.draws;
        self.samples += 1;
    }

    fn subtracted(&self, delta: StatsDelta) -> Option<Self> {
        Some(Self {
            score: self.score - delta.score,
            samples: self.samples.checked_sub(1)?,
            wins: self.wins.checked_sub(delta.wins)?,
            losses: self.losses.checked_sub(delta.losses)?,
            draws: self.draws.checked_sub(delta.draws)?,
        })
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct GlobalCounters {
    pub total_judgments: u64,
}

/// Per-item aggregation state, keyed by item name and kept in candidate order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ItemStatsTable {
    order: Vec<String>,
    index: HashMap<String, usize>,
    stats: Vec<ItemStats>,
}

impl ItemStatsTable {
    pub fn new<I, K>(candidates: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let mut table = Self::default();
        for key in candidates {
            let key = key.into();
            if table.index.contains_key(&key) {
                continue;
            }
            table.index.insert(key.clone(), table.order.len());
            table.order.push(key);
            table.stats.push(ItemStats::default());
        }
        table
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&ItemStats> {
        self.index.get(key).map(|&slot| &self.stats[slot])
    }

    /// Items in candidate order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ItemStats)> {
        self.order
            .iter()
            .map(String::as_str)
            .zip(self.stats.iter())
    }

    /// Items by descending score; ties keep candidate order.
    pub fn ranking(&self) -> Vec<(&str, &ItemStats)> {
        let mut ranked = self.iter().collect::<Vec<_>>();
        ranked.sort_by(|a, b| b.1.score.cmp(&a.1.score));
        ranked
    }

    pub fn total_wins(&self) -> u64 {
        self.stats.iter().map(|value| u64::from(value.wins)).sum()
    }

    pub fn total_losses(&self) -> u64 {
        self.stats.iter().map(|value| u64::from(value.losses)).sum()
    }

    /// Seeds an item's counters from persisted state. Unknown keys are rejected.
    pub(super) fn restore(&mut self, key: &str, stats: ItemStats) -> bool {
        match self.index.get(key) {
            Some(&slot) => {
                self.stats[slot] = stats;
                true
            }
            None => false,
        }
    }

    /// Records `judgment` on `entry`, first reversing whatever judgment the entry already held.
    pub fn apply(
        &mut self,
        counters: &mut GlobalCounters,
        entry: &mut ComparisonEntry,
        judgment: Judgment,
    ) -> Result<(), EngineError> {
        let (slot_a, slot_b) = self.slots(entry)?;

        if entry.judgment().is_some() {
            self.undo(counters, entry);
        }
        entry.set_judgment(judgment);

        let (delta_a, delta_b) = judgment.effects();
        self.stats[slot_a].add(delta_a);
        self.stats[slot_b].add(delta_b);
        counters.total_judgments += 1;

        Ok(())
    }

    /// Reverses the effect of the judgment currently stored on `entry`.
    ///
    /// Leaves `entry` untouched. An unset entry is a no-op, and so is an entry whose
    /// reversal would drive any counter negative: the table is left as it was and the
    /// mismatch is logged. Returns whether anything was reversed.
    pub fn undo(&mut self, counters: &mut GlobalCounters, entry: &ComparisonEntry) -> bool {
        let Some(previous) = entry.judgment() else {
            return false;
        };

        let Ok((slot_a, slot_b)) = self.slots(entry) else {
            warn!(
                item_a = %entry.item_a(),
                item_b = %entry.item_b(),
                "undo skipped: entry references an unknown item"
            );
            return false;
        };

        let (delta_a, delta_b) = previous.effects();
        let reverted = (
            self.stats[slot_a].subtracted(delta_a),
            self.stats[slot_b].subtracted(delta_b),
            counters.total_judgments.checked_sub(1),
        );
        let (Some(stats_a), Some(stats_b), Some(total)) = reverted else {
            warn!(
                item_a = %entry.item_a(),
                item_b = %entry.item_b(),
                judgment = previous.as_str(),
                "undo skipped: stored judgment does not match recorded counters"
            );
            return false;
        };

        self.stats[slot_a] = stats_a;
        self.stats[slot_b] = stats_b;
        counters.total_judgments = total;
        true
    }

    fn slots(&self, entry: &ComparisonEntry) -> Result<(usize, usize), EngineError> {
        let lookup = |key: &str| {
            self.index
                .get(key)
                .copied()
                .ok_or_else(|| EngineError::UnknownItem {
                    item: key.to_string(),
                })
        };
        Ok((lookup(entry.item_a())?, lookup(entry.item_b())?))
    }
}
