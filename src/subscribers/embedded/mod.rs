//! # Built-in subscribers
//!
//! - [`LogWriter`]: mirrors pushed events to `tracing`.

mod log;

pub use log::LogWriter;
