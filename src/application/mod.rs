// Application layer - Use cases over report widgets
pub mod auto_height;
pub mod data_cache;
pub mod persistence;
pub mod report_registry;
pub mod snapshot_store;
pub mod widget_cache;
pub mod widget_manager;
