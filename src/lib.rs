pub mod auth;
pub mod config;
pub mod error;
pub mod import;
pub mod storage;
pub mod utils;
pub mod web;

pub use config::Config;
pub use error::{ImportError, Result};
