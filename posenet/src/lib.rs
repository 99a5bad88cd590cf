pub mod artifact;
pub mod config;
pub mod dataset;
pub mod error;
pub mod history;
pub mod network;

pub use error::{DataError, Error, Result};
