mod color;
mod delete;
mod rename;
mod scan;
mod search;
pub mod server;
mod status;

pub use color::*;
pub use delete::*;
pub use rename::*;
pub use scan::*;
pub use search::*;
pub use server::*;
pub use status::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}
