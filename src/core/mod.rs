pub mod config;
pub mod decision_maker;
pub mod enricher;
pub mod error;
pub mod models;
