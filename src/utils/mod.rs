//! Utils Module
pub mod logging;
pub mod truncate;

pub use logging::{init_logging, LogTarget};
pub use truncate::{ellipsize, truncate_chars};
