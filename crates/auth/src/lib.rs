//! plauder-auth – Challenge-Response-Authentifizierung
//!
//! Dieses Crate implementiert:
//! - Nonce-Erzeugung aus dem OS-Zufallsgenerator
//! - Keyed Digest `HMAC-MD5(secret, nonce)` (Wire-kompatibel zu bestehenden Clients)
//! - Konstantzeit-Pruefung der Client-Antwort
//! - `PendingChallenge` mit Ausstellungszeitpunkt fuer Timeouts

pub mod challenge;
pub mod error;

// Bequeme Re-Exporte
pub use challenge::{
    digest_berechnen, digest_base64, digest_pruefen, nonce_erzeugen, EingeloesteChallenge,
    PendingChallenge, NONCE_BYTES,
};
pub use error::{AuthError, AuthResult};
