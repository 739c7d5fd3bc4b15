//! Frame-Modell des Chatprotokolls
//!
//! Ein Frame ist ein JSON-Objekt. Client-Anfragen tragen ein `action`-Feld,
//! Server-Antworten (und die Challenge-Antwort des Clients) ein
//! `response`-Feld mit numerischem Code.
//!
//! ## Design
//! - Tagged Enum ueber `action` fuer typsichere Anfragen
//! - Pflichtfelder sind nicht-optionale Felder: fehlt eines, scheitert die
//!   Deserialisierung und die Anfrage wird als ungueltig abgelehnt
//! - `time` ist ueberall optional; eigene Frames setzen es immer

use plauder_core::zeitstempel_jetzt;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Antwort-Codes
// ---------------------------------------------------------------------------

/// Numerische Antwort-Codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Antwortcode {
    /// 200 – Bestaetigung
    Ok,
    /// 202 – Liste folgt in `data_list`
    Liste,
    /// 205 – Kontakt-/Benutzerliste hat sich geaendert
    ListenGeaendert,
    /// 400 – Fehler, Text in `error`
    FehlerhafteAnfrage,
    /// 511 – Challenge bzw. Challenge-Antwort, Inhalt in `data`
    Authentifizierung,
}

impl Antwortcode {
    /// Gibt den numerischen Wert zurueck
    pub fn als_zahl(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Liste => 202,
            Self::ListenGeaendert => 205,
            Self::FehlerhafteAnfrage => 400,
            Self::Authentifizierung => 511,
        }
    }
}

impl From<Antwortcode> for u16 {
    fn from(code: Antwortcode) -> Self {
        code.als_zahl()
    }
}

impl TryFrom<u16> for Antwortcode {
    type Error = String;

    fn try_from(wert: u16) -> Result<Self, Self::Error> {
        match wert {
            200 => Ok(Self::Ok),
            202 => Ok(Self::Liste),
            205 => Ok(Self::ListenGeaendert),
            400 => Ok(Self::FehlerhafteAnfrage),
            511 => Ok(Self::Authentifizierung),
            andere => Err(format!("unbekannter Antwort-Code {andere}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Anfragen (action)
// ---------------------------------------------------------------------------

/// Identitaet im Presence-Frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Benutzerangabe {
    pub account_name: String,
    /// Oeffentlicher Schluessel des Clients (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pubkey: Option<String>,
}

/// Alle Client-Anfragen, unterschieden ueber das `action`-Feld
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Aktion {
    /// Anmeldung, startet den Challenge-Response-Ablauf
    Presence {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time: Option<f64>,
        user: Benutzerangabe,
    },

    /// Punkt-zu-Punkt-Nachricht
    Message {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time: Option<f64>,
        from: String,
        to: String,
        mess_text: String,
    },

    /// Client verabschiedet sich
    Exit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time: Option<f64>,
        account_name: String,
    },

    /// Kontaktliste abrufen
    GetContacts {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time: Option<f64>,
        user: String,
    },

    /// Kontakt `account_name` zur Liste von `user` hinzufuegen
    #[serde(rename = "add")]
    AddContact {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time: Option<f64>,
        user: String,
        account_name: String,
    },

    /// Kontakt `account_name` aus der Liste von `user` entfernen
    #[serde(rename = "remove")]
    RemoveContact {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time: Option<f64>,
        user: String,
        account_name: String,
    },

    /// Liste aller bekannten Benutzer
    #[serde(rename = "get_users")]
    UsersRequest {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time: Option<f64>,
        account_name: String,
    },

    /// Oeffentlichen Schluessel von `account_name` abrufen
    #[serde(rename = "public_key")]
    PublicKeyRequest {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time: Option<f64>,
        account_name: String,
    },
}

impl Aktion {
    /// Name, in dessen Auftrag die Anfrage gestellt wird
    ///
    /// `None` bei Presence (noch keine Sitzung) und bei der Schluesselabfrage,
    /// die sich auf einen fremden Account bezieht.
    pub fn absender(&self) -> Option<&str> {
        match self {
            Self::Presence { .. } | Self::PublicKeyRequest { .. } => None,
            Self::Message { from, .. } => Some(from.as_str()),
            Self::Exit { account_name, .. } | Self::UsersRequest { account_name, .. } => {
                Some(account_name.as_str())
            }
            Self::GetContacts { user, .. }
            | Self::AddContact { user, .. }
            | Self::RemoveContact { user, .. } => Some(user.as_str()),
        }
    }
}

// ---------------------------------------------------------------------------
// Antworten (response)
// ---------------------------------------------------------------------------

/// Antwort-Frame mit Code und optionalen Nutzdaten
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Antwort {
    pub response: Antwortcode,
    /// Nonce, Digest oder oeffentlicher Schluessel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Listen-Nutzlast bei 202
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_list: Option<Vec<String>>,
    /// Fehlertext bei 400
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Antwort {
    fn leer(response: Antwortcode) -> Self {
        Self {
            response,
            data: None,
            data_list: None,
            error: None,
        }
    }

    /// 200
    pub fn ok() -> Self {
        Self::leer(Antwortcode::Ok)
    }

    /// 202 mit Liste
    pub fn liste(eintraege: Vec<String>) -> Self {
        Self {
            data_list: Some(eintraege),
            ..Self::leer(Antwortcode::Liste)
        }
    }

    /// 205
    pub fn listen_geaendert() -> Self {
        Self::leer(Antwortcode::ListenGeaendert)
    }

    /// 400 mit Fehlertext
    pub fn fehler(text: impl Into<String>) -> Self {
        Self {
            error: Some(text.into()),
            ..Self::leer(Antwortcode::FehlerhafteAnfrage)
        }
    }

    /// 511 mit Nutzdaten (Nonce, Digest oder Schluessel)
    pub fn authentifizierung(daten: impl Into<String>) -> Self {
        Self {
            data: Some(daten.into()),
            ..Self::leer(Antwortcode::Authentifizierung)
        }
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// Ein vollstaendiger Protokoll-Frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Frame {
    Aktion(Aktion),
    Antwort(Antwort),
}

impl Frame {
    /// Presence-Frame fuer `name`
    pub fn presence(name: impl Into<String>, pubkey: Option<String>) -> Self {
        Self::Aktion(Aktion::Presence {
            time: Some(zeitstempel_jetzt()),
            user: Benutzerangabe {
                account_name: name.into(),
                pubkey,
            },
        })
    }

    /// Nachricht von `von` an `an`
    pub fn nachricht(
        von: impl Into<String>,
        an: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::Aktion(Aktion::Message {
            time: Some(zeitstempel_jetzt()),
            from: von.into(),
            to: an.into(),
            mess_text: text.into(),
        })
    }

    /// Exit-Frame fuer `name`
    pub fn exit(name: impl Into<String>) -> Self {
        Self::Aktion(Aktion::Exit {
            time: Some(zeitstempel_jetzt()),
            account_name: name.into(),
        })
    }

    /// Challenge-Antwort des Clients mit base64-kodiertem Digest
    pub fn auth_antwort(digest_base64: impl Into<String>) -> Self {
        Self::Antwort(Antwort::authentifizierung(digest_base64))
    }

    /// Gibt den Antwort-Code zurueck, falls es sich um eine Antwort handelt
    pub fn antwortcode(&self) -> Option<Antwortcode> {
        match self {
            Self::Antwort(antwort) => Some(antwort.response),
            Self::Aktion(_) => None,
        }
    }

    /// Name der Aktion fuer Logging
    pub fn bezeichnung(&self) -> &'static str {
        match self {
            Self::Aktion(Aktion::Presence { .. }) => "presence",
            Self::Aktion(Aktion::Message { .. }) => "message",
            Self::Aktion(Aktion::Exit { .. }) => "exit",
            Self::Aktion(Aktion::GetContacts { .. }) => "get_contacts",
            Self::Aktion(Aktion::AddContact { .. }) => "add",
            Self::Aktion(Aktion::RemoveContact { .. }) => "remove",
            Self::Aktion(Aktion::UsersRequest { .. }) => "get_users",
            Self::Aktion(Aktion::PublicKeyRequest { .. }) => "public_key",
            Self::Antwort(_) => "response",
        }
    }
}

impl From<Antwort> for Frame {
    fn from(antwort: Antwort) -> Self {
        Self::Antwort(antwort)
    }
}

impl From<Aktion> for Frame {
    fn from(aktion: Aktion) -> Self {
        Self::Aktion(aktion)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
