use super::error::EngineError;
use super::selector::PairSelector;
use super::stats::{GlobalCounters, ItemStatsTable, Judgment};

/// One pairing shown to the judge.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ComparisonEntry {
    item_a: String,
    item_b: String,
    judgment: Option<Judgment>,
}

impl ComparisonEntry {
    pub fn new(item_a: impl Into<String>, item_b: impl Into<String>) -> Self {
        Self {
            item_a: item_a.into(),
            item_b: item_b.into(),
            judgment: None,
        }
    }

    pub fn item_a(&self) -> &str {
        &self.item_a
    }

    pub fn item_b(&self) -> &str {
        &self.item_b
    }

    pub fn judgment(&self) -> Option<Judgment> {
        self.judgment
    }

    pub(super) fn set_judgment(&mut self, judgment: Judgment) {
        self.judgment = Some(judgment);
    }
}

/// Append-only comparison history with a cursor on the displayed entry.
#[derive(Clone, Debug, Default)]
pub struct ComparisonLedger {
    entries: Vec<ComparisonEntry>,
    cursor: Option<usize>,
}

impl ComparisonLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[ComparisonEntry] {
        &self.entries
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&ComparisonEntry> {
        self.cursor.map(|index| &self.entries[index])
    }

    pub fn is_at_newest(&self) -> bool {
        match self.cursor {
            Some(index) => index + 1 == self.entries.len(),
            None => true,
        }
    }

    /// Steps forward through history, drawing a new pair once the newest entry is passed.
    pub fn advance<S>(
        &mut self,
        selector: &mut S,
        candidates: &[String],
    ) -> Result<usize, EngineError>
    where
        S: PairSelector + ?Sized,
    {
        let next = match self.cursor {
            Some(index) if index + 1 < self.entries.len() => index + 1,
            _ => {
                let (item_a, item_b) = selector.next_pair(candidates)?;
                self.entries.push(ComparisonEntry::new(item_a, item_b));
                self.entries.len() - 1
            }
        };
        self.cursor = Some(next);
        Ok(next)
    }

    /// Steps back one entry; returns `false` at the start of history.
    pub fn retreat(&mut self) -> bool {
        match self.cursor {
            Some(index) if index > 0 => {
                self.cursor = Some(index - 1);
                true
            }
            _ => false,
        }
    }

    /// Applies `decision` to the displayed entry and moves on to the next one.
    pub fn judge<S>(
        &mut self,
        table: &mut ItemStatsTable,
        counters: &mut GlobalCounters,
        selector: &mut S,
        candidates: &[String],
        decision: Judgment,
    ) -> Result<usize, EngineError>
    where
        S: PairSelector + ?Sized,
    {
        let index = self.cursor.ok_or(EngineError::NoCurrentComparison)?;
        table.apply(counters, &mut self.entries[index], decision)?;
        self.advance(selector, candidates)
    }
}
