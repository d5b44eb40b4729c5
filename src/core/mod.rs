//! COURIER Protocol - Core
//!
//! Constants, error types, and the traits at the crate's seams.

pub mod constants;
mod error;
mod traits;

pub use constants::*;
pub use error::*;
pub use traits::*;
