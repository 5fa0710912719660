use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::cli::StabilityArgs;
use crate::commands::inventory;
use crate::engine::{PersistenceStore, RankingSnapshot, RankingSnapshotter};
use crate::model::StabilityReport;

pub fn run(args: StabilityArgs) -> Result<()> {
    let store = PersistenceStore::new(args.source.results_dir());
    let snapshots = store.load_snapshots()?;
    if snapshots.is_empty() {
        bail!("no ranking snapshots found in {}", store.snapshot_dir().display());
    }

    let candidates = match inventory::load_candidates(&args.source) {
        Ok(candidates) if !candidates.is_empty() => candidates,
        Ok(_) => snapshot_items(&snapshots),
        Err(err) => {
            warn!(error = %err, "candidate set unavailable; using items seen in snapshots");
            snapshot_items(&snapshots)
        }
    };

    let report = build_report(&store, snapshots, candidates);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    info!(
        snapshots = report.snapshot_sequences.len(),
        candidates = report.candidate_count,
        "recomputed ranking stability"
    );
    for point in &report.series {
        info!(
            judgments = point.judgments,
            variability = point.variability,
            "variability"
        );
    }

    Ok(())
}

fn build_report(
    store: &PersistenceStore,
    snapshots: Vec<RankingSnapshot>,
    candidates: Vec<String>,
) -> StabilityReport {
    let snapshot_sequences = snapshots.iter().map(|snapshot| snapshot.sequence).collect();

    let mut snapshotter = RankingSnapshotter::default();
    snapshotter.restore(snapshots, &candidates);

    StabilityReport {
        snapshot_dir: store.snapshot_dir().display().to_string(),
        candidate_count: candidates.len(),
        snapshot_sequences,
        series: snapshotter.series().to_vec(),
        latest_ranking: snapshotter
            .latest()
            .map(|snapshot| snapshot.ranking.clone())
            .unwrap_or_default(),
    }
}

/// Items in order of first appearance across snapshots.
fn snapshot_items(snapshots: &[RankingSnapshot]) -> Vec<String> {
    let mut items = Vec::new();
    for snapshot in snapshots {
        for entry in &snapshot.ranking {
            if !items.contains(&entry.item) {
                items.push(entry.item.clone());
            }
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::{build_report, snapshot_items};
    use crate::engine::PersistenceStore;

    #[test]
    fn build_report_recomputes_series_from_snapshot_files() {
        let dir = TempDir::new().expect("create temp dir");
        let store = PersistenceStore::new(dir.path());
        fs::create_dir_all(store.snapshot_dir()).expect("create snapshot dir");
        fs::write(store.snapshot_path(15), "1,a.jpg,4\n2,b.jpg,2\n3,c.jpg,0\n")
            .expect("write first snapshot");
        fs::write(store.snapshot_path(30), "1,c.jpg,6\n2,b.jpg,4\n3,a.jpg,2\n")
            .expect("write second snapshot");
        fs::write(store.snapshot_path(45), "1,c.jpg,8\nnot a row\n2,b.jpg,6\n3,a.jpg,4\n")
            .expect("write third snapshot");

        let snapshots = store.load_snapshots().expect("load snapshots");
        let candidates = snapshot_items(&snapshots);
        assert_eq!(candidates, vec!["a.jpg", "b.jpg", "c.jpg"]);

        let report = build_report(&store, snapshots, candidates);
        assert_eq!(report.snapshot_sequences, vec![15, 30, 45]);
        assert_eq!(report.series.len(), 2);
        assert_eq!(report.series[0].judgments, 30);
        assert!((report.series[0].variability - 2.0).abs() < 1e-9);
        assert_eq!(report.series[1].judgments, 45);
        assert!(report.series[1].variability.abs() < 1e-9);
        assert_eq!(report.latest_ranking[0].item, "c.jpg");
        assert_eq!(report.latest_ranking.len(), 3);
    }
}
