//! HTTP API handlers for the works service

pub mod import;
pub mod search;
pub mod works;

pub use import::import_routes;
pub use search::search_routes;
pub use works::work_routes;
