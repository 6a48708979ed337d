//! Data models for the school tracker.

mod school;
mod wiki;

pub use school::*;
pub use wiki::*;
