use anyhow::Result;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::inventory;
use crate::engine::{ItemStatsTable, PersistenceStore};
use crate::model::{RankedStats, StatusReport};

pub fn run(args: StatusArgs) -> Result<()> {
    let candidates = inventory::load_candidates(&args.source)?;
    let store = PersistenceStore::new(args.source.results_dir());

    info!(results_dir = %store.results_dir().display(), "status requested");

    if !store.stats_path().exists() {
        warn!(path = %store.stats_path().display(), "stats file missing");
    }

    let (table, counters) = store.load(&candidates)?;
    let snapshots = store.load_snapshots()?;
    let inconsistent_items = store.inconsistent_items()?;
    let report = build_report(
        &store,
        &table,
        counters.total_judgments,
        snapshots.len(),
        inconsistent_items,
        args.limit,
    );

    for item in &report.inconsistent_items {
        warn!(item = %item, "persisted samples disagree with wins, losses and draws");
    }
    if report.total_wins != report.total_losses {
        warn!(
            wins = report.total_wins,
            losses = report.total_losses,
            "total wins and losses differ"
        );
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    info!(
        candidates = report.candidate_count,
        total_judgments = report.total_judgments,
        snapshots = report.snapshot_count,
        "loaded stats"
    );
    for entry in &report.top {
        info!(
            rank = entry.rank,
            item = %entry.item,
            score = entry.stats.score,
            samples = entry.stats.samples,
            wins = entry.stats.wins,
            losses = entry.stats.losses,
            draws = entry.stats.draws,
            "ranking"
        );
    }

    Ok(())
}

fn build_report(
    store: &PersistenceStore,
    table: &ItemStatsTable,
    total_judgments: u64,
    snapshot_count: usize,
    inconsistent_items: Vec<String>,
    limit: usize,
) -> StatusReport {
    let top = table
        .ranking()
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(index, (item, stats))| RankedStats {
            rank: index + 1,
            item: item.to_string(),
            stats: *stats,
        })
        .collect();

    StatusReport {
        stats_path: store.stats_path().display().to_string(),
        candidate_count: table.len(),
        total_judgments,
        total_wins: table.total_wins(),
        total_losses: table.total_losses(),
        inconsistent_items,
        snapshot_count,
        top,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::build_report;
    use crate::engine::PersistenceStore;

    #[test]
    fn build_report_ranks_persisted_stats_and_checks_conservation() {
        let dir = TempDir::new().expect("create temp dir");
        let store = PersistenceStore::new(dir.path());
        fs::write(
            store.stats_path(),
            "Total Button Presses: 2\n\n\
             a.jpg - Score: 3 - Samples: 2 - Wins: 1 - Losses: 0 - Draws: 1\n\
             c.jpg - Score: 1 - Samples: 1 - Wins: 0 - Losses: 0 - Draws: 1\n\
             b.jpg - Score: 0 - Samples: 1 - Wins: 0 - Losses: 1 - Draws: 0\n",
        )
        .expect("write stats fixture");

        let candidates = vec!["a.jpg".to_string(), "b.jpg".to_string(), "c.jpg".to_string()];
        let (table, counters) = store.load(&candidates).expect("load stats");
        let inconsistent = store.inconsistent_items().expect("scan stats");
        let report = build_report(&store, &table, counters.total_judgments, 0, inconsistent, 2);

        assert_eq!(report.total_judgments, 2);
        assert_eq!(report.total_wins, report.total_losses);
        assert!(report.inconsistent_items.is_empty());
        assert_eq!(report.top.len(), 2);
        assert_eq!(report.top[0].item, "a.jpg");
        assert_eq!(report.top[1].item, "c.jpg");
        assert_eq!(report.top[1].rank, 2);
    }

    #[test]
    fn inconsistent_persisted_lines_are_reported_even_though_load_drops_them() {
        let dir = TempDir::new().expect("create temp dir");
        let store = PersistenceStore::new(dir.path());
        fs::write(
            store.stats_path(),
            "Total Button Presses: 1\n\n\
             a.jpg - Score: 2 - Samples: 1 - Wins: 1 - Losses: 0 - Draws: 0\n\
             b.jpg - Score: 0 - Samples: 4 - Wins: 0 - Losses: 1 - Draws: 0\n",
        )
        .expect("write stats fixture");

        let candidates = vec!["a.jpg".to_string(), "b.jpg".to_string()];
        let (table, counters) = store.load(&candidates).expect("load stats");
        let inconsistent = store.inconsistent_items().expect("scan stats");
        let report = build_report(&store, &table, counters.total_judgments, 0, inconsistent, 10);

        assert_eq!(report.inconsistent_items, vec!["b.jpg".to_string()]);
        assert_eq!(report.top.len(), 2);
        assert_eq!(report.top[1].item, "b.jpg");
        assert_eq!(report.top[1].stats.samples, 0);
    }
}
