//! Training-program progression engine: program state, calendar merge,
//! overload suggestions and personal-record tracking over pluggable stores.

pub mod catalog;
pub mod db;
pub mod error;
pub mod models;
pub mod overload;
pub mod progression;
pub mod records;
pub mod schedule;
pub mod storage;
pub mod types;
pub mod utils;
