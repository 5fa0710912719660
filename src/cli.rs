use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::engine::DEFAULT_CADENCE;

#[derive(Parser, Debug)]
#[command(
    name = "craterank",
    version,
    about = "Pairwise degradation judging with ranking stability tracking"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Inventory(InventoryArgs),
    Session(SessionArgs),
    Status(StatusArgs),
    Stability(StabilityArgs),
}

/// Where candidate items live and where results are written.
#[derive(Args, Debug, Clone)]
pub struct ItemSourceArgs {
    #[arg(long, default_value = "600_images")]
    pub image_dir: PathBuf,

    /// Defaults to `<image-dir>/results`.
    #[arg(long)]
    pub results_dir: Option<PathBuf>,

    /// Defaults to `<results-dir>/manifests/item_inventory.json`.
    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long = "extension", default_value = "jpg")]
    pub extensions: Vec<String>,
}

impl ItemSourceArgs {
    pub fn results_dir(&self) -> PathBuf {
        self.results_dir
            .clone()
            .unwrap_or_else(|| self.image_dir.join("results"))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.manifest_path.clone().unwrap_or_else(|| {
            self.results_dir()
                .join("manifests")
                .join("item_inventory.json")
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[command(flatten)]
    pub source: ItemSourceArgs,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    #[command(flatten)]
    pub source: ItemSourceArgs,

    /// Fixes the pair sequence for reproducible sessions.
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long, default_value_t = DEFAULT_CADENCE, value_parser = clap::value_parser!(u64).range(1..))]
    pub cadence: u64,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub source: ItemSourceArgs,

    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StabilityArgs {
    #[command(flatten)]
    pub source: ItemSourceArgs,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}
