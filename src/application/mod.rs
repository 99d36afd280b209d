pub mod bootstrap;
pub mod cloud_sync;
pub mod debounce;
pub mod delivery;
pub mod store;
