pub mod cli;
pub mod color;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod extract;
pub mod identity;
mod metrics;
pub mod rank;
pub mod scan;
mod server;
pub mod store;
pub mod utils;

pub use config::Opts;
pub use engine::{ImageSearch, ImageSearchBuilder};
pub use error::{Error, ExtractionError};
