//! Datenmodelle des Benutzerspeichers
//!
//! Diese Typen sind reine Datenuebertragungsobjekte; das Secret wird im
//! Snapshot hex-kodiert abgelegt.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Benutzer
// ---------------------------------------------------------------------------

/// Registrierter Benutzer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenutzerRecord {
    pub name: String,
    /// Schluessel fuer den Challenge-Digest
    #[serde(with = "hex_bytes")]
    pub secret: Vec<u8>,
    #[serde(default)]
    pub pubkey: Option<String>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

/// Aktuell angemeldeter Benutzer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AktiverBenutzer {
    pub name: String,
    pub ip: IpAddr,
    pub port: u16,
    pub angemeldet_am: DateTime<Utc>,
}

/// Eintrag der Login-Historie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginEintrag {
    pub name: String,
    pub ip: IpAddr,
    pub port: u16,
    pub zeitpunkt: DateTime<Utc>,
}

/// Nachrichtenstatistik eines Benutzers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nachrichtenzaehler {
    pub gesendet: u64,
    pub empfangen: u64,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        hex::decode(text).map_err(serde::de::Error::custom)
    }
}
