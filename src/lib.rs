pub mod config;
pub mod error;
pub mod ledger;
pub mod render;
pub mod solver;
pub mod types;
