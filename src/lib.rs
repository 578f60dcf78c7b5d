pub mod aggregator;
pub mod amounts;
pub mod api;
pub mod budget;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod error;
pub mod links;
pub mod metadata;
pub mod mint;
pub mod mirror;
pub mod models;
pub mod parser;
pub mod pools;
pub mod state;
pub mod supply;
pub mod trade;
pub mod usernames;
pub mod wallet;
pub mod whitelist;

pub use error::{Error, Result};
pub use state::Services;
