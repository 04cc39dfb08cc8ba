//! Safety Module
//!
//! Guards on free text before it is sent to the scoring model.

mod filter;
mod guard;

pub use filter::{ContentFilter, FilterResult};
pub use guard::{GuardError, InputGuard};
