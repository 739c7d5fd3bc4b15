//! Fehlertypen fuer die Authentifizierung

use thiserror::Error;

/// Alle moeglichen Fehler im Challenge-Response-Ablauf
#[derive(Debug, Error)]
pub enum AuthError {
    // --- Anmeldung ---
    #[error("Benutzername bereits vergeben: {0}")]
    BenutzernameVergeben(String),

    #[error("Benutzer nicht registriert: {0}")]
    BenutzerUnbekannt(String),

    #[error("Digest stimmt nicht ueberein")]
    FalschesPasswort,

    #[error("Challenge abgelaufen")]
    ChallengeAbgelaufen,

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl AuthError {
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Text der 400-Antwort an den Client
    pub fn antworttext(&self) -> &'static str {
        match self {
            Self::BenutzernameVergeben(_) => "username taken",
            Self::BenutzerUnbekannt(_) => "user not registered",
            Self::FalschesPasswort | Self::Intern(_) => "bad password",
            Self::ChallengeAbgelaufen => "authentication timeout",
        }
    }
}

/// Result-Alias fuer die Authentifizierung
pub type AuthResult<T> = Result<T, AuthError>;
