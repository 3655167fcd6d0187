pub mod config;
pub mod error;
pub mod match_kind;
pub mod models;
pub mod resolver;
pub mod stats;
