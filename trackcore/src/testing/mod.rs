//! Testing utilities for order tracking.
//!
//! Enabled with the `testing` feature.
//!
//! - [`generators`]: `proptest` strategies for statuses and identifiers
//! - [`builders`]: fluent builder for [`crate::NewOrder`]
//! - [`fixtures`]: a controllable clock and recording/failing dispatchers
//! - [`assertions`]: checks for timeline invariants
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use trackcore::testing::prelude::*;
//!
//! let clock = FixedClock::at_millis(1_717_232_400_000);
//! let dispatcher = RecordingDispatcher::new();
//! let order = NewOrderBuilder::new().item("sku-1", "Mug", "12.50", 2).build();
//! ```

pub mod assertions;
pub mod builders;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use super::assertions::*;
    pub use super::builders::*;
    pub use super::fixtures::*;
    pub use super::generators::*;
}
