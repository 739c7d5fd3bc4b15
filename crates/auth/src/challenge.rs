//! Challenge-Response mit HMAC-MD5
//!
//! Der Server schickt eine zufaellige Nonce (hex-kodiert), der Client
//! antwortet mit `base64(HMAC-MD5(secret, nonce))`. Das Secret selbst geht
//! nie ueber die Leitung, die Nonce wird genau einmal verwendet.
//!
//! HMAC-MD5 ist schwach, bleibt aber fuer die Kompatibilitaet mit
//! bestehenden Clients das Wire-Format. Ein Wechsel braucht eine neue
//! Protokollversion.

use std::time::{Duration, Instant};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use md5::Md5;
use rand::{rngs::OsRng, RngCore};

use crate::error::{AuthError, AuthResult};

type HmacMd5 = Hmac<Md5>;

/// Anzahl Zufallsbytes pro Nonce (hex-kodiert doppelt so viele Zeichen)
pub const NONCE_BYTES: usize = 64;

// ---------------------------------------------------------------------------
// Freie Funktionen
// ---------------------------------------------------------------------------

/// Erzeugt eine neue Nonce aus dem OS-CSPRNG, hex-kodiert
pub fn nonce_erzeugen() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn mac_fuer(secret: &[u8], nonce: &str) -> AuthResult<HmacMd5> {
    let mut mac = HmacMd5::new_from_slice(secret)
        .map_err(|e| AuthError::intern(format!("HMAC-Schluessel ungueltig: {e}")))?;
    mac.update(nonce.as_bytes());
    Ok(mac)
}

/// Berechnet `HMAC-MD5(secret, nonce)` ueber die ASCII-Bytes der Nonce
pub fn digest_berechnen(secret: &[u8], nonce: &str) -> AuthResult<Vec<u8>> {
    Ok(mac_fuer(secret, nonce)?.finalize().into_bytes().to_vec())
}

/// Digest in der Form, in der ihn der Client im `data`-Feld schickt
pub fn digest_base64(secret: &[u8], nonce: &str) -> AuthResult<String> {
    Ok(STANDARD.encode(digest_berechnen(secret, nonce)?))
}

/// Prueft eine base64-kodierte Client-Antwort in konstanter Zeit
///
/// Nicht dekodierbares base64 zaehlt als falscher Digest.
pub fn digest_pruefen(secret: &[u8], nonce: &str, antwort_base64: &str) -> AuthResult<()> {
    let antwort = STANDARD
        .decode(antwort_base64.trim())
        .map_err(|_| AuthError::FalschesPasswort)?;

    mac_fuer(secret, nonce)?
        .verify_slice(&antwort)
        .map_err(|_| AuthError::FalschesPasswort)
}

// ---------------------------------------------------------------------------
// PendingChallenge
// ---------------------------------------------------------------------------

/// Offene Challenge zwischen Ausstellung und der einen konsumierenden Antwort
#[derive(Clone)]
pub struct PendingChallenge {
    /// Angefragter Anzeigename
    pub name: String,
    /// Ausgestellte Nonce (hex)
    pub nonce: String,
    /// Im Presence-Frame angegebener oeffentlicher Schluessel
    pub pubkey: Option<String>,
    /// Zeitpunkt der Ausstellung
    pub ausgestellt: Instant,
    secret: Vec<u8>,
}

impl PendingChallenge {
    /// Stellt eine neue Challenge fuer `name` aus
    pub fn ausstellen(name: impl Into<String>, secret: Vec<u8>, pubkey: Option<String>) -> Self {
        Self {
            name: name.into(),
            nonce: nonce_erzeugen(),
            pubkey,
            ausgestellt: Instant::now(),
            secret,
        }
    }

    /// Verbraucht die Challenge und prueft die Antwort des Clients
    pub fn einloesen(self, antwort_base64: &str) -> AuthResult<EingeloesteChallenge> {
        digest_pruefen(&self.secret, &self.nonce, antwort_base64)?;
        tracing::trace!(user = %self.name, "Challenge-Antwort korrekt");
        Ok(EingeloesteChallenge {
            name: self.name,
            pubkey: self.pubkey,
        })
    }

    /// Gibt `true` zurueck wenn die Challenge aelter als `timeout` ist
    pub fn ist_abgelaufen(&self, timeout: Duration, jetzt: Instant) -> bool {
        jetzt.saturating_duration_since(self.ausgestellt) > timeout
    }
}

impl std::fmt::Debug for PendingChallenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingChallenge")
            .field("name", &self.name)
            .field("nonce", &self.nonce)
            .field("pubkey", &self.pubkey)
            .field("ausgestellt", &self.ausgestellt)
            .finish_non_exhaustive()
    }
}

/// Ergebnis einer erfolgreich eingeloesten Challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EingeloesteChallenge {
    pub name: String,
    pub pubkey: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
