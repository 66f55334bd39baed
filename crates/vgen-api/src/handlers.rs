//! Request handlers.

pub mod context;
pub mod health;
pub mod merge;
pub mod video;

pub use context::*;
pub use health::*;
pub use merge::*;
pub use video::*;
