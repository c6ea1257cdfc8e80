pub mod config;
pub mod monitor;
pub mod output;
pub mod stats;
