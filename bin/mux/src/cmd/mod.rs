pub mod boost;
pub mod config;
