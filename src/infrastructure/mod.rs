pub mod error;
pub mod remote_store;
pub mod row_mapper;
pub mod snapshot_repository;
pub mod storage;
