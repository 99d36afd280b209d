pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::bootstrap::{bootstrap_workspace, BootstrapResult};
pub use application::cloud_sync::{CloudSyncService, PUSH_QUIET_PERIOD};
pub use application::store::{
    BlockEdit, ItemPatch, NewBlock, NewItem, NewReminder, NowProvider, ReminderPatch, SetAllInput,
    TaskStore,
};
pub use domain::derived::{BoardStatus, DerivedView};
pub use domain::models::{Block, BlockId, BoardSnapshot, Item, Reminder};
pub use infrastructure::error::InfraError;
pub use infrastructure::remote_store::{
    CloudSession, InMemoryRemoteStore, RemoteStore, SupabaseConfig, SupabaseRemoteStore,
};
pub use infrastructure::snapshot_repository::{
    InMemorySnapshotRepository, SnapshotRepository, SqliteSnapshotRepository,
};
