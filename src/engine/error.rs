use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("need at least two candidate items to form a pair, found {found}")]
    InsufficientItems { found: usize },

    #[error("item is not part of the candidate set: {item}")]
    UnknownItem { item: String },

    #[error("no comparison is currently displayed")]
    NoCurrentComparison,

    #[error("ranking snapshot already recorded: {path}")]
    SnapshotExists { path: PathBuf },
}
