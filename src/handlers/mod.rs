//! HTTP handlers, one module per route family.
//!
//! Authorization happens in the route layer before any handler runs; handlers
//! receive the resolved `Caller` as an extension when they need it.

pub mod cases;
pub mod dashboard;
pub mod files;
pub mod interventions;
pub mod meetings;
pub mod sessions;
pub mod students;
pub mod system;
pub mod users;
