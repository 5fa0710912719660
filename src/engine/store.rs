use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, info, warn};

use super::error::EngineError;
use super::snapshot::{RankedItem, RankingSnapshot, VariabilityPoint};
use super::stats::{GlobalCounters, ItemStats, ItemStatsTable};
use crate::util::{write_atomic, write_json_pretty};

pub const STATS_FILE_NAME: &str = "sorted_crater_images.txt";
pub const SNAPSHOT_DIR_NAME: &str = "ranking_snapshots";
pub const STABILITY_FILE_NAME: &str = "ranking_stability.json";

const TOTAL_HEADER: &str = "Total Button Presses:";
pub(super) const STATS_LINE_PATTERN: &str =
    r"^(.+?) - Score: (-?\d+) - Samples: (\d+) - Wins: (\d+) - Losses: (\d+) - Draws: (\d+)$";
const SNAPSHOT_FILE_PATTERN: &str = r"^ranking_snapshot_(\d+)\.txt$";

/// Durable home of the stats file, the snapshot directory and the stability series.
#[derive(Clone, Debug)]
pub struct PersistenceStore {
    results_dir: PathBuf,
}

impl PersistenceStore {
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
        }
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    pub fn stats_path(&self) -> PathBuf {
        self.results_dir.join(STATS_FILE_NAME)
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.results_dir.join(SNAPSHOT_DIR_NAME)
    }

    pub fn snapshot_path(&self, sequence: u64) -> PathBuf {
        self.snapshot_dir()
            .join(format!("ranking_snapshot_{sequence}.txt"))
    }

    pub fn stability_path(&self) -> PathBuf {
        self.results_dir.join(STABILITY_FILE_NAME)
    }

    /// Loads persisted stats for `candidates`; a missing file yields an all-zero table.
    pub fn load(&self, candidates: &[String]) -> Result<(ItemStatsTable, GlobalCounters)> {
        let mut table = ItemStatsTable::new(candidates.iter().cloned());
        let mut counters = GlobalCounters::default();
        let path = self.stats_path();

        if !path.exists() {
            info!(path = %path.display(), "no existing stats found; starting fresh");
            return Ok((table, counters));
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let pattern = Regex::new(STATS_LINE_PATTERN).context("failed to compile stats line regex")?;

        let mut restored = 0_usize;
        for (line_number, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(value) = line.strip_prefix(TOTAL_HEADER) {
                match value.trim().parse::<u64>() {
                    Ok(total) => counters.total_judgments = total,
                    Err(err) => warn!(
                        line = line_number + 1,
                        error = %err,
                        "skipping malformed judgment counter"
                    ),
                }
                continue;
            }

            let Some((item, stats)) = parse_stats_line(&pattern, line) else {
                warn!(line = line_number + 1, content = %line, "skipping malformed stats line");
                continue;
            };

            if !stats.is_consistent() {
                warn!(
                    line = line_number + 1,
                    item = %item,
                    "skipping stats line whose samples disagree with wins, losses and draws"
                );
                continue;
            }

            if table.restore(&item, stats) {
                restored += 1;
            } else {
                warn!(item = %item, "stats recorded for an item outside the candidate set; dropping");
            }
        }

        info!(
            path = %path.display(),
            restored,
            total_judgments = counters.total_judgments,
            "loaded existing stats"
        );
        Ok((table, counters))
    }

    /// Items whose persisted line parses but breaks `samples == wins + losses + draws`.
    /// [`Self::load`] drops these lines, so this is the only place they surface.
    pub fn inconsistent_items(&self) -> Result<Vec<String>> {
        let path = self.stats_path();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let pattern = Regex::new(STATS_LINE_PATTERN).context("failed to compile stats line regex")?;

        Ok(raw
            .lines()
            .filter_map(|line| parse_stats_line(&pattern, line.trim()))
            .filter(|(_, stats)| !stats.is_consistent())
            .map(|(item, _)| item)
            .collect())
    }

    /// Rewrites the stats file in full, ranked by descending score.
    pub fn save(&self, table: &ItemStatsTable, counters: &GlobalCounters) -> Result<()> {
        let path = self.stats_path();
        write_atomic(&path, render_stats(table, counters).as_bytes())?;
        debug!(path = %path.display(), "saved stats");
        Ok(())
    }

    /// Writes one snapshot file; an existing file for the same sequence is never replaced.
    pub fn save_snapshot(&self, snapshot: &RankingSnapshot) -> Result<PathBuf> {
        let path = self.snapshot_path(snapshot.sequence);
        if path.exists() {
            return Err(EngineError::SnapshotExists { path }.into());
        }

        write_atomic(&path, render_snapshot(snapshot).as_bytes())?;
        info!(
            path = %path.display(),
            judgments = snapshot.sequence,
            "saved ranking snapshot"
        );
        Ok(path)
    }

    /// Reads every snapshot file in sequence order, skipping malformed lines.
    pub fn load_snapshots(&self) -> Result<Vec<RankingSnapshot>> {
        let dir = self.snapshot_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let pattern =
            Regex::new(SNAPSHOT_FILE_PATTERN).context("failed to compile snapshot filename regex")?;
        let entries =
            fs::read_dir(&dir).with_context(|| format!("failed to read {}", dir.display()))?;

        let mut snapshots = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("failed to iterate {}", dir.display()))?;
            let path = entry.path();
            let Some(sequence) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| pattern.captures(name))
                .and_then(|captures| captures.get(1))
                .and_then(|value| value.as_str().parse::<u64>().ok())
            else {
                continue;
            };

            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            snapshots.push(RankingSnapshot {
                sequence,
                ranking: parse_snapshot(&path, &raw),
            });
        }

        snapshots.sort_by_key(|snapshot| snapshot.sequence);
        Ok(snapshots)
    }

    pub fn save_series(&self, series: &[VariabilityPoint]) -> Result<()> {
        write_json_pretty(&self.stability_path(), &series)
    }
}

pub(super) fn parse_stats_line(pattern: &Regex, line: &str) -> Option<(String, ItemStats)> {
    let captures = pattern.captures(line)?;
    let field = |index: usize| captures.get(index).map(|value| value.as_str());

    let stats = ItemStats {
        score: field(2)?.parse().ok()?,
        samples: field(3)?.parse().ok()?,
        wins: field(4)?.parse().ok()?,
        losses: field(5)?.parse().ok()?,
        draws: field(6)?.parse().ok()?,
    };
    Some((field(1)?.to_string(), stats))
}

pub(super) fn render_stats(table: &ItemStatsTable, counters: &GlobalCounters) -> String {
    let mut out = format!("{TOTAL_HEADER} {}\n\n", counters.total_judgments);
    for (item, stats) in table.ranking() {
        let _ = writeln!(
            out,
            "{item} - Score: {} - Samples: {} - Wins: {} - Losses: {} - Draws: {}",
            stats.score, stats.samples, stats.wins, stats.losses, stats.draws
        );
    }
    out
}

fn render_snapshot(snapshot: &RankingSnapshot) -> String {
    let mut out = String::new();
    for (rank, entry) in snapshot.ranking.iter().enumerate() {
        let _ = writeln!(out, "{},{},{}", rank + 1, entry.item, entry.score);
    }
    out
}

/// Parses `<rank>,<item>,<score>` lines; item names may themselves contain commas.
pub(super) fn parse_snapshot(path: &Path, raw: &str) -> Vec<RankedItem> {
    let mut rows = Vec::new();
    for (line_number, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parsed = line.split_once(',').and_then(|(rank, rest)| {
            let (item, score) = rest.rsplit_once(',')?;
            let rank = rank.trim().parse::<usize>().ok()?;
            let score = score.trim().parse::<i64>().ok()?;
            (!item.is_empty()).then(|| {
                (
                    rank,
                    RankedItem {
                        item: item.to_string(),
                        score,
                    },
                )
            })
        });

        match parsed {
            Some(row) => rows.push(row),
            None => warn!(
                path = %path.display(),
                line = line_number + 1,
                content = %line,
                "skipping malformed snapshot line"
            ),
        }
    }

    rows.sort_by_key(|(rank, _)| *rank);
    rows.into_iter().map(|(_, item)| item).collect()
}
