pub mod config;
pub mod console;
pub mod limits;
pub mod manager;
pub mod model;
pub mod observability;
pub mod store;
pub mod wal;
