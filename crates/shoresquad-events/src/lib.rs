//! Cleanup events for ShoreSquad
//!
//! The event catalog, time-window filters, and joining with a capacity check.

pub mod catalog;
pub mod error;
pub mod filter;
pub mod types;

pub use catalog::{EventCatalog, ShareMessage};
pub use error::EventError;
pub use filter::EventFilter;
pub use types::*;
