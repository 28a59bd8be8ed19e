pub mod admin;
pub mod charts;
pub mod config;
pub mod error;
pub mod graphql;
pub mod match_filter;
pub mod metrics;
pub mod player_stats;
pub mod ratings;
pub mod source;
pub mod squad;
pub mod types;
pub mod utils;
pub mod web;
