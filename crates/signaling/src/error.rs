//! Fehlertypen fuer den Signaling-Service

use plauder_auth::AuthError;
use plauder_db::StoreError;
use plauder_protocol::FrameError;
use thiserror::Error;

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (Socket, Poll)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Frame konnte nicht kodiert oder dekodiert werden
    #[error("Frame-Fehler: {0}")]
    Frame(#[from] FrameError),

    /// Authentifizierungsfehler
    #[error("Authentifizierungsfehler: {0}")]
    Auth(#[from] AuthError),

    /// Fehler des Benutzerspeichers
    #[error("Speicherfehler: {0}")]
    Store(#[from] StoreError),

    /// Protokollfehler (falscher Zustand)
    #[error("Protokollfehler: {0}")]
    Protokoll(String),
}

impl SignalingError {
    /// Erstellt einen Protokollfehler
    pub fn protokoll(msg: impl Into<String>) -> Self {
        Self::Protokoll(msg.into())
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;
