pub mod config;
pub mod core;
pub mod error;
pub mod hal;
pub mod observability;
pub mod scan;
pub mod store;
pub mod visualization;

pub use error::{QcError, Result};
