use serde::{Deserialize, Serialize};

use crate::engine::{ItemStats, RankedItem, VariabilityPoint};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemEntry {
    pub name: String,
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_directory: String,
    pub item_count: usize,
    pub items: Vec<ItemEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedStats {
    pub rank: usize,
    pub item: String,
    #[serde(flatten)]
    pub stats: ItemStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub stats_path: String,
    pub candidate_count: usize,
    pub total_judgments: u64,
    pub total_wins: u64,
    pub total_losses: u64,
    pub inconsistent_items: Vec<String>,
    pub snapshot_count: usize,
    pub top: Vec<RankedStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StabilityReport {
    pub snapshot_dir: String,
    pub candidate_count: usize,
    pub snapshot_sequences: Vec<u64>,
    pub series: Vec<VariabilityPoint>,
    pub latest_ranking: Vec<RankedItem>,
}
