//! Domain types and shared services for the attendance report.
//!
//! Holds the entity model (identities, records, clusters), the roster and
//! identity-resolution seam, the error taxonomy, CLI settings, and small
//! statistics helpers used by report assembly.

pub mod error;
pub mod models;
pub mod roster;
pub mod settings;
pub mod stats;
