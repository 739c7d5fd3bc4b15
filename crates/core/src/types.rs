//! Gemeinsame Identifikationstypen fuer Plauder
//!
//! IDs verwenden das Newtype-Pattern, damit Verbindungs-IDs nicht mit
//! beliebigen Zahlen verwechselt werden koennen.

use serde::{Deserialize, Serialize};

/// Eindeutige ID einer Transport-Verbindung
///
/// Wird vom Reactor beim Annehmen vergeben und nie wiederverwendet,
/// solange der Server laeuft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub usize);

impl ConnectionId {
    /// Gibt den inneren Zahlenwert zurueck
    pub fn inner(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Aktueller Unix-Zeitstempel in Sekunden (mit Nachkommastellen)
///
/// Format des `time`-Felds im Wire-Protokoll.
pub fn zeitstempel_jetzt() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
