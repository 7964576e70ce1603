//! Core types for toolstream.

pub mod assessment;
pub mod generation;
pub mod message;
pub mod segment;
pub mod stream;
pub mod usage;

pub use assessment::*;
pub use generation::*;
pub use message::*;
pub use segment::*;
pub use stream::*;
pub use usage::*;
