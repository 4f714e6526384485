pub mod codec;
mod error;
pub mod event;
pub mod metrics;
pub mod mysql;
pub mod options;

pub use error::{Error, Result};
