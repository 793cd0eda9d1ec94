pub mod aggregator;
pub mod cache;
pub mod config;
pub mod errors;
pub mod extract;
pub mod fallback;
pub mod models;
pub mod normalize;
pub mod providers;
pub mod proxy;
pub mod utils;
pub mod web;
