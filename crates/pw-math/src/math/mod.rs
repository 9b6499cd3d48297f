//! Core math modules.

pub mod round;
pub mod stats;
