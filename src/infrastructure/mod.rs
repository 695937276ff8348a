// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod file_store;
pub mod http_response;
pub mod http_snapshot_store;
pub mod memory_store;
