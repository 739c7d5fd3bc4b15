//! In-Memory-Implementierung des Benutzerspeichers
//!
//! Der Bestand liegt hinter einem `parking_lot::RwLock`; Klone teilen sich
//! denselben Bestand. Benutzer, Kontakte und Zaehler koennen als
//! JSON-Snapshot gesichert werden, aktive Sitzungen und Login-Historie nicht.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    net::IpAddr,
    path::Path,
    sync::Arc,
};

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::models::{AktiverBenutzer, BenutzerRecord, LoginEintrag, Nachrichtenzaehler};
use crate::repository::UserStore;

/// Persistierbarer Teil des Bestands
#[derive(Debug, Default, Serialize, Deserialize)]
struct Schnappschuss {
    #[serde(default)]
    benutzer: BTreeMap<String, BenutzerRecord>,
    #[serde(default)]
    kontakte: BTreeMap<String, BTreeSet<String>>,
    #[serde(default)]
    zaehler: BTreeMap<String, Nachrichtenzaehler>,
}

#[derive(Debug, Default)]
struct Bestand {
    daten: Schnappschuss,
    aktiv: BTreeMap<String, AktiverBenutzer>,
    historie: Vec<LoginEintrag>,
}

/// Thread-sicherer In-Memory-Benutzerspeicher
#[derive(Debug, Clone, Default)]
pub struct MemoryUserStore {
    inner: Arc<RwLock<Bestand>>,
}

impl MemoryUserStore {
    /// Erstellt einen leeren Speicher
    pub fn neu() -> Self {
        Self::default()
    }

    /// Laedt einen Snapshot; fehlt die Datei, wird ein leerer Speicher erstellt
    pub fn laden(pfad: impl AsRef<Path>) -> StoreResult<Self> {
        let pfad = pfad.as_ref();
        if !pfad.exists() {
            tracing::info!(pfad = %pfad.display(), "Kein Snapshot gefunden, starte mit leerem Bestand");
            return Ok(Self::neu());
        }

        let inhalt = fs::read_to_string(pfad)?;
        let daten: Schnappschuss = serde_json::from_str(&inhalt)?;
        tracing::info!(
            pfad = %pfad.display(),
            benutzer = daten.benutzer.len(),
            "Snapshot geladen"
        );

        Ok(Self {
            inner: Arc::new(RwLock::new(Bestand {
                daten,
                ..Bestand::default()
            })),
        })
    }

    /// Schreibt den persistierbaren Bestand als JSON
    ///
    /// Es wird zuerst in eine temporaere Datei geschrieben und dann umbenannt,
    /// damit ein Abbruch keinen halben Snapshot hinterlaesst.
    pub fn speichern(&self, pfad: impl AsRef<Path>) -> StoreResult<()> {
        let pfad = pfad.as_ref();
        let json = {
            let bestand = self.inner.read();
            serde_json::to_string_pretty(&bestand.daten)?
        };

        if let Some(verzeichnis) = pfad.parent() {
            if !verzeichnis.as_os_str().is_empty() {
                fs::create_dir_all(verzeichnis)?;
            }
        }

        let temp = pfad.with_extension("tmp");
        fs::write(&temp, json)?;
        fs::rename(&temp, pfad)?;

        tracing::info!(pfad = %pfad.display(), "Snapshot gespeichert");
        Ok(())
    }

    /// Legt einen Benutzer an oder aktualisiert Secret und Schluessel
    pub fn benutzer_setzen(&self, name: &str, secret: &[u8], pubkey: Option<String>) {
        let mut bestand = self.inner.write();
        let eintrag = bestand
            .daten
            .benutzer
            .entry(name.to_string())
            .or_insert_with(|| BenutzerRecord {
                name: name.to_string(),
                secret: Vec::new(),
                pubkey: None,
                last_login: None,
            });
        eintrag.secret = secret.to_vec();
        if pubkey.is_some() {
            eintrag.pubkey = pubkey;
        }
    }
}

fn name_pruefen(name: &str) -> StoreResult<()> {
    if name.trim().is_empty() {
        return Err(StoreError::UngueltigeDaten("leerer Benutzername".into()));
    }
    Ok(())
}

impl UserStore for MemoryUserStore {
    fn check_user(&self, name: &str) -> StoreResult<bool> {
        Ok(self.inner.read().daten.benutzer.contains_key(name))
    }

    fn get_password_secret(&self, name: &str) -> StoreResult<Vec<u8>> {
        self.inner
            .read()
            .daten
            .benutzer
            .get(name)
            .map(|b| b.secret.clone())
            .ok_or_else(|| StoreError::nicht_gefunden(format!("Benutzer {name}")))
    }

    fn get_public_key(&self, name: &str) -> StoreResult<Option<String>> {
        Ok(self
            .inner
            .read()
            .daten
            .benutzer
            .get(name)
            .and_then(|b| b.pubkey.clone()))
    }

    fn login(&self, name: &str, ip: IpAddr, port: u16, pubkey: Option<&str>) -> StoreResult<()> {
        let jetzt = Utc::now();
        let mut bestand = self.inner.write();

        let benutzer = bestand
            .daten
            .benutzer
            .get_mut(name)
            .ok_or_else(|| StoreError::nicht_gefunden(format!("Benutzer {name}")))?;
        benutzer.last_login = Some(jetzt);
        if let Some(key) = pubkey {
            benutzer.pubkey = Some(key.to_string());
        }

        bestand.aktiv.insert(
            name.to_string(),
            AktiverBenutzer {
                name: name.to_string(),
                ip,
                port,
                angemeldet_am: jetzt,
            },
        );
        bestand.historie.push(LoginEintrag {
            name: name.to_string(),
            ip,
            port,
            zeitpunkt: jetzt,
        });
        Ok(())
    }

    fn logout(&self, name: &str) -> StoreResult<()> {
        self.inner.write().aktiv.remove(name);
        Ok(())
    }

    fn get_contacts(&self, name: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .inner
            .read()
            .daten
            .kontakte
            .get(name)
            .map(|k| k.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn add_contact(&self, name: &str, contact: &str) -> StoreResult<()> {
        let mut bestand = self.inner.write();
        let daten = &mut bestand.daten;
        if !daten.benutzer.contains_key(name) || !daten.benutzer.contains_key(contact) {
            tracing::debug!(user = %name, kontakt = %contact, "Kontakt unbekannt, ignoriert");
            return Ok(());
        }
        daten
            .kontakte
            .entry(name.to_string())
            .or_default()
            .insert(contact.to_string());
        Ok(())
    }

    fn remove_contact(&self, name: &str, contact: &str) -> StoreResult<()> {
        let mut bestand = self.inner.write();
        if let Some(kontakte) = bestand.daten.kontakte.get_mut(name) {
            kontakte.remove(contact);
        }
        Ok(())
    }

    fn list_users(&self) -> StoreResult<Vec<String>> {
        Ok(self.inner.read().daten.benutzer.keys().cloned().collect())
    }

    fn record_message(&self, from: &str, to: &str) -> StoreResult<()> {
        let mut bestand = self.inner.write();
        let daten = &mut bestand.daten;
        if daten.benutzer.contains_key(from) {
            daten.zaehler.entry(from.to_string()).or_default().gesendet += 1;
        }
        if daten.benutzer.contains_key(to) {
            daten.zaehler.entry(to.to_string()).or_default().empfangen += 1;
        }
        Ok(())
    }

    fn register_user(&self, name: &str, secret: &[u8]) -> StoreResult<()> {
        name_pruefen(name)?;
        let mut bestand = self.inner.write();
        if bestand.daten.benutzer.contains_key(name) {
            return Err(StoreError::Eindeutigkeit(format!("Benutzer {name}")));
        }
        bestand.daten.benutzer.insert(
            name.to_string(),
            BenutzerRecord {
                name: name.to_string(),
                secret: secret.to_vec(),
                pubkey: None,
                last_login: None,
            },
        );
        tracing::info!(user = %name, "Benutzer registriert");
        Ok(())
    }

    fn remove_user(&self, name: &str) -> StoreResult<()> {
        let mut bestand = self.inner.write();
        if bestand.daten.benutzer.remove(name).is_none() {
            return Err(StoreError::nicht_gefunden(format!("Benutzer {name}")));
        }
        bestand.daten.kontakte.remove(name);
        for kontakte in bestand.daten.kontakte.values_mut() {
            kontakte.remove(name);
        }
        bestand.daten.zaehler.remove(name);
        bestand.aktiv.remove(name);
        tracing::info!(user = %name, "Benutzer entfernt");
        Ok(())
    }

    fn active_users(&self) -> StoreResult<Vec<AktiverBenutzer>> {
        Ok(self.inner.read().aktiv.values().cloned().collect())
    }

    fn login_history(&self, name: Option<&str>) -> StoreResult<Vec<LoginEintrag>> {
        Ok(self
            .inner
            .read()
            .historie
            .iter()
            .filter(|e| name.map_or(true, |n| e.name == n))
            .cloned()
            .collect())
    }

    fn message_counts(&self, name: &str) -> StoreResult<Nachrichtenzaehler> {
        Ok(self
            .inner
            .read()
            .daten
            .zaehler
            .get(name)
            .copied()
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const LOKAL: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    fn store_mit(namen: &[&str]) -> MemoryUserStore {
        let store = MemoryUserStore::neu();
        for name in namen {
            store
                .register_user(name, format!("{name}-secret").as_bytes())
                .unwrap();
        }
        store
    }

    #[test]
    fn registrieren_und_pruefen() {
        let store = store_mit(&["alice"]);
        assert!(store.check_user("alice").unwrap());
        assert!(!store.check_user("bob").unwrap());
        assert_eq!(store.get_password_secret("alice").unwrap(), b"alice-secret");
    }

    #[test]
    fn doppelte_registrierung_ist_eindeutigkeitsfehler() {
        let store = store_mit(&["alice"]);
        let fehler = store.register_user("alice", b"x").unwrap_err();
        assert!(fehler.ist_eindeutigkeit());
    }

    #[test]
    fn leerer_name_wird_abgelehnt() {
        let store = MemoryUserStore::neu();
        assert!(matches!(
            store.register_user("  ", b"x"),
            Err(StoreError::UngueltigeDaten(_))
        ));
    }

    #[test]
    fn secret_unbekannter_benutzer() {
        let store = MemoryUserStore::neu();
        assert!(matches!(
            store.get_password_secret("niemand"),
            Err(StoreError::NichtGefunden(_))
        ));
    }

    #[test]
    fn login_setzt_aktiv_historie_und_schluessel() {
        let store = store_mit(&["alice"]);
        store.login("alice", LOKAL, 50000, Some("PUB")).unwrap();

        let aktiv = store.active_users().unwrap();
        assert_eq!(aktiv.len(), 1);
        assert_eq!(aktiv[0].port, 50000);
        assert_eq!(store.get_public_key("alice").unwrap().as_deref(), Some("PUB"));
        assert_eq!(store.login_history(Some("alice")).unwrap().len(), 1);

        store.logout("alice").unwrap();
        assert!(store.active_users().unwrap().is_empty());
        // Historie bleibt
        assert_eq!(store.login_history(None).unwrap().len(), 1);
    }

    #[test]
    fn login_ohne_schluessel_behaelt_alten() {
        let store = store_mit(&["alice"]);
        store.login("alice", LOKAL, 1, Some("ALT")).unwrap();
        store.login("alice", LOKAL, 2, None).unwrap();
        assert_eq!(store.get_public_key("alice").unwrap().as_deref(), Some("ALT"));
    }

    #[test]
    fn login_unbekannter_benutzer_ist_fehler() {
        let store = MemoryUserStore::neu();
        assert!(store.login("bob", LOKAL, 1, None).is_err());
    }

    #[test]
    fn kontakte_hinzufuegen_ist_idempotent() {
        let store = store_mit(&["alice", "bob", "carol"]);
        store.add_contact("alice", "bob").unwrap();
        store.add_contact("alice", "bob").unwrap();
        store.add_contact("alice", "carol").unwrap();
        assert_eq!(store.get_contacts("alice").unwrap(), vec!["bob", "carol"]);

        store.remove_contact("alice", "bob").unwrap();
        assert_eq!(store.get_contacts("alice").unwrap(), vec!["carol"]);
    }

    #[test]
    fn unbekannter_kontakt_wird_ignoriert() {
        let store = store_mit(&["alice"]);
        store.add_contact("alice", "geist").unwrap();
        assert!(store.get_contacts("alice").unwrap().is_empty());
    }

    #[test]
    fn nachrichten_nur_fuer_bekannte_zaehlen() {
        let store = store_mit(&["alice", "bob"]);
        store.record_message("alice", "bob").unwrap();
        store.record_message("alice", "geist").unwrap();

        assert_eq!(
            store.message_counts("alice").unwrap(),
            Nachrichtenzaehler {
                gesendet: 2,
                empfangen: 0
            }
        );
        assert_eq!(store.message_counts("bob").unwrap().empfangen, 1);
        assert_eq!(store.message_counts("geist").unwrap(), Nachrichtenzaehler::default());
    }

    #[test]
    fn benutzer_entfernen_raeumt_kontakte_auf() {
        let store = store_mit(&["alice", "bob"]);
        store.add_contact("alice", "bob").unwrap();
        store.remove_user("bob").unwrap();

        assert!(store.get_contacts("alice").unwrap().is_empty());
        assert_eq!(store.list_users().unwrap(), vec!["alice"]);
        assert!(store.remove_user("bob").is_err());
    }

    #[test]
    fn snapshot_speichern_und_laden() {
        let verzeichnis = tempfile::tempdir().unwrap();
        let pfad = verzeichnis.path().join("bestand.json");

        let store = store_mit(&["alice", "bob"]);
        store.add_contact("alice", "bob").unwrap();
        store.record_message("alice", "bob").unwrap();
        store.login("alice", LOKAL, 1, None).unwrap();
        store.speichern(&pfad).unwrap();

        let geladen = MemoryUserStore::laden(&pfad).unwrap();
        assert_eq!(geladen.list_users().unwrap(), vec!["alice", "bob"]);
        assert_eq!(geladen.get_contacts("alice").unwrap(), vec!["bob"]);
        assert_eq!(geladen.message_counts("alice").unwrap().gesendet, 1);
        assert_eq!(geladen.get_password_secret("bob").unwrap(), b"bob-secret");
        // Aktive Sitzungen werden nicht persistiert
        assert!(geladen.active_users().unwrap().is_empty());
    }

    #[test]
    fn fehlender_snapshot_ergibt_leeren_bestand() {
        let verzeichnis = tempfile::tempdir().unwrap();
        let store = MemoryUserStore::laden(verzeichnis.path().join("fehlt.json")).unwrap();
        assert!(store.list_users().unwrap().is_empty());
    }

    #[test]
    fn kaputter_snapshot_ist_json_fehler() {
        let verzeichnis = tempfile::tempdir().unwrap();
        let pfad = verzeichnis.path().join("kaputt.json");
        fs::write(&pfad, "{ nicht json").unwrap();
        assert!(matches!(
            MemoryUserStore::laden(&pfad),
            Err(StoreError::Json(_))
        ));
    }

    #[test]
    fn klone_teilen_den_bestand() {
        let store = MemoryUserStore::neu();
        let klon = store.clone();
        store.benutzer_setzen("alice", b"s", Some("K".into()));
        assert!(klon.check_user("alice").unwrap());
        assert_eq!(klon.get_public_key("alice").unwrap().as_deref(), Some("K"));
    }
}
