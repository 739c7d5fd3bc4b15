//! Handler fuer alle Client-Anfragen
//!
//! Jeder Handler arbeitet synchron auf dem `SignalingState` der
//! Steuerschleife. Fehler des Benutzerspeichers werden an den Dispatcher
//! zurueckgegeben und dort zu einer 400-Antwort.

pub mod auth_handler;
pub mod contact_handler;
pub mod message_handler;

/// Generische Ablehnung (unbekannte Aktion, fehlendes Feld, falscher Absender)
pub const BAD_REQUEST: &str = "bad request";

/// Anfrage vor abgeschlossener Anmeldung
pub const MUST_AUTHENTICATE: &str = "must authenticate first";

/// Empfaenger ist nicht angemeldet bzw. nicht erreichbar
pub const USER_NOT_REGISTERED: &str = "user not registered";

/// Kein oeffentlicher Schluessel hinterlegt
pub const PUBLIC_KEY_MISSING: &str = "public key missing";
