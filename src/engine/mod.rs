mod error;
mod ledger;
mod selector;
mod session;
mod snapshot;
mod stats;
mod store;

pub use selector::{PairSelector, RandomPairSelector};
pub use session::Session;
pub use snapshot::{
    DEFAULT_CADENCE, RankedItem, RankingSnapshot, RankingSnapshotter, VariabilityPoint,
};
pub use stats::{ItemStats, ItemStatsTable, Judgment};
pub use store::PersistenceStore;
