//! Relay server: listeners, accept loops, and connection registries.

mod registry;
mod relay;

pub use registry::*;
pub use relay::*;
