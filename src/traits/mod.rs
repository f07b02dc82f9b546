//! Core traits for the container.

mod dispose;
mod locator;

pub use dispose::Dispose;
pub use locator::{Locator, LocatorCore};
