//! Evolves populations of weighted indicator-gene trading strategies
//! against historical market data, persisting every generation in SQLite.

pub mod app;
pub mod config;
pub mod data;
pub mod engines;
pub mod error;
pub mod genes;
pub mod population;
pub mod store;
pub mod types;

pub use app::App;
pub use error::{MarketDnaError, Result};
