//! Native value representations
//!
//! This module provides the types written into native data slots and the
//! large-object argument type.

mod lob;
mod timestamp;

pub use lob::Lob;
pub use timestamp::Timestamp;
