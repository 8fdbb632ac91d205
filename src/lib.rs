pub mod aggregator;
pub mod cache;
pub mod calendar;
pub mod collector;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod pipeline;
pub mod source;
pub mod stats;
pub mod store;

pub use error::{Error, Result};
