//! Service layer between the routes and the stores.

pub mod artifacts;
pub mod builds;
pub mod catalog;
