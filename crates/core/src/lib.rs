//! plauder-core – Gemeinsame Typen
//!
//! Dieses Crate stellt die Bausteine bereit, die von allen anderen
//! Plauder-Crates gemeinsam genutzt werden.

pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use types::{zeitstempel_jetzt, ConnectionId};
