//! Repository-Trait fuer den Benutzerspeicher
//!
//! Das Trait entkoppelt die Steuerschleife von der konkreten
//! Speicher-Implementierung. Alle Methoden sind synchron, weil sie direkt aus
//! der Steuerschleife aufgerufen werden.

use std::net::IpAddr;

use crate::error::StoreResult;
use crate::models::{AktiverBenutzer, LoginEintrag, Nachrichtenzaehler};

/// Schmale Schnittstelle zum Benutzer-, Kontakt- und Statistikbestand
pub trait UserStore: Send + Sync {
    /// Ist `name` ein registrierter Benutzer?
    fn check_user(&self, name: &str) -> StoreResult<bool>;

    /// Schluessel fuer den Challenge-Digest von `name`
    fn get_password_secret(&self, name: &str) -> StoreResult<Vec<u8>>;

    /// Gespeicherter oeffentlicher Schluessel von `name`
    fn get_public_key(&self, name: &str) -> StoreResult<Option<String>>;

    /// Vermerkt eine erfolgreiche Anmeldung
    fn login(&self, name: &str, ip: IpAddr, port: u16, pubkey: Option<&str>) -> StoreResult<()>;

    /// Vermerkt eine Abmeldung
    fn logout(&self, name: &str) -> StoreResult<()>;

    fn get_contacts(&self, name: &str) -> StoreResult<Vec<String>>;

    fn add_contact(&self, name: &str, contact: &str) -> StoreResult<()>;

    fn remove_contact(&self, name: &str, contact: &str) -> StoreResult<()>;

    /// Alle bekannten Benutzer
    fn list_users(&self) -> StoreResult<Vec<String>>;

    /// Zaehlt eine Nachricht von `from` an `to`
    fn record_message(&self, from: &str, to: &str) -> StoreResult<()>;

    // --- Verwaltung ---

    /// Legt einen Benutzer an, `Eindeutigkeit` wenn der Name existiert
    fn register_user(&self, name: &str, secret: &[u8]) -> StoreResult<()>;

    fn remove_user(&self, name: &str) -> StoreResult<()>;

    fn active_users(&self) -> StoreResult<Vec<AktiverBenutzer>>;

    /// Login-Historie, gefiltert auf `name` falls angegeben
    fn login_history(&self, name: Option<&str>) -> StoreResult<Vec<LoginEintrag>>;

    fn message_counts(&self, name: &str) -> StoreResult<Nachrichtenzaehler>;
}
