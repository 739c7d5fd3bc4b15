//! Fehlertypen fuer den Wire-Codec

use thiserror::Error;

/// Fehler beim Kodieren oder Dekodieren eines Frames
#[derive(Debug, Error)]
pub enum FrameError {
    /// IO-Fehler des darunterliegenden Streams
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Frame ueberschreitet die konfigurierte Maximalgroesse
    #[error("Frame zu gross: {groesse} Bytes (Maximum: {maximum} Bytes)")]
    ZuGross { groesse: usize, maximum: usize },

    /// Frame ist abgeschnitten
    #[error("Frame unvollstaendig: {vorhanden} von {erwartet} Bytes")]
    Unvollstaendig { erwartet: usize, vorhanden: usize },

    /// Nutzlast ist kein JSON-Objekt
    #[error("Fehlerhafter Frame: {0}")]
    Fehlerhaft(String),

    /// Gueltiges JSON-Objekt, aber unbekannte Aktion oder fehlendes Pflichtfeld
    #[error("Ungueltiger Frame: {0}")]
    Ungueltig(String),
}

impl FrameError {
    /// Gibt true zurueck wenn die Verbindung nach diesem Fehler nicht mehr
    /// synchron ist und geschlossen werden muss.
    ///
    /// Nur `Ungueltig` laesst die Verbindung offen (Antwort 400).
    pub fn ist_protokollfehler(&self) -> bool {
        !matches!(self, Self::Ungueltig(_))
    }
}

/// Result-Typ fuer den Wire-Codec
pub type FrameResult<T> = Result<T, FrameError>;
