//! Session-Registry – Wer ist unter welchem Namen angemeldet
//!
//! Bijektive Abbildung Name <-> Verbindung: hoechstens eine Verbindung pro
//! Name und hoechstens ein Name pro Verbindung. Geschrieben wird nur aus der
//! Steuerschleife; andere Threads lesen ueber [`GeteilteRegistry`] unter
//! demselben Mutex.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use plauder_core::ConnectionId;

/// Registry, geteilt zwischen Steuerschleife und `ServerHandle`
pub type GeteilteRegistry = Arc<Mutex<SessionRegistry>>;

/// Fehler beim Binden eines Namens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindeFehler {
    /// Der Name gehoert bereits einer anderen Verbindung
    NameVergeben(ConnectionId),
    /// Die Verbindung hat bereits einen Namen
    VerbindungGebunden,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    nach_name: HashMap<String, ConnectionId>,
    nach_verbindung: HashMap<ConnectionId, String>,
}

impl SessionRegistry {
    pub fn neu() -> Self {
        Self::default()
    }

    pub fn geteilt() -> GeteilteRegistry {
        Arc::new(Mutex::new(Self::neu()))
    }

    /// Bindet `name` an `id`, wenn beide Seiten noch frei sind
    pub fn binden(&mut self, name: &str, id: ConnectionId) -> Result<(), BindeFehler> {
        if let Some(&besitzer) = self.nach_name.get(name) {
            return Err(BindeFehler::NameVergeben(besitzer));
        }
        if self.nach_verbindung.contains_key(&id) {
            return Err(BindeFehler::VerbindungGebunden);
        }
        self.nach_name.insert(name.to_string(), id);
        self.nach_verbindung.insert(id, name.to_string());
        Ok(())
    }

    pub fn verbindung_von(&self, name: &str) -> Option<ConnectionId> {
        self.nach_name.get(name).copied()
    }

    pub fn name_von(&self, id: ConnectionId) -> Option<&str> {
        self.nach_verbindung.get(&id).map(String::as_str)
    }

    pub fn ist_vergeben(&self, name: &str) -> bool {
        self.nach_name.contains_key(name)
    }

    /// Entfernt den Eintrag von `id` und gibt den freigewordenen Namen zurueck
    pub fn entfernen_verbindung(&mut self, id: ConnectionId) -> Option<String> {
        let name = self.nach_verbindung.remove(&id)?;
        self.nach_name.remove(&name);
        Some(name)
    }

    /// Alle angemeldeten Namen, sortiert
    pub fn namen(&self) -> Vec<String> {
        let mut namen: Vec<_> = self.nach_name.keys().cloned().collect();
        namen.sort();
        namen
    }

    /// Alle gebundenen Verbindungen, sortiert
    pub fn verbindungen(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.nach_verbindung.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.nach_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nach_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binden_und_nachschlagen() {
        let mut reg = SessionRegistry::neu();
        reg.binden("alice", ConnectionId(1)).unwrap();

        assert_eq!(reg.verbindung_von("alice"), Some(ConnectionId(1)));
        assert_eq!(reg.name_von(ConnectionId(1)), Some("alice"));
        assert!(reg.ist_vergeben("alice"));
    }

    #[test]
    fn name_nur_einmal_vergeben() {
        let mut reg = SessionRegistry::neu();
        reg.binden("alice", ConnectionId(1)).unwrap();
        assert_eq!(
            reg.binden("alice", ConnectionId(2)),
            Err(BindeFehler::NameVergeben(ConnectionId(1)))
        );
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn verbindung_nur_ein_name() {
        let mut reg = SessionRegistry::neu();
        reg.binden("alice", ConnectionId(1)).unwrap();
        assert_eq!(
            reg.binden("bob", ConnectionId(1)),
            Err(BindeFehler::VerbindungGebunden)
        );
        assert!(!reg.ist_vergeben("bob"));
    }

    #[test]
    fn entfernen_gibt_name_frei() {
        let mut reg = SessionRegistry::neu();
        reg.binden("alice", ConnectionId(1)).unwrap();

        assert_eq!(reg.entfernen_verbindung(ConnectionId(1)).as_deref(), Some("alice"));
        assert_eq!(reg.entfernen_verbindung(ConnectionId(1)), None);
        assert!(reg.is_empty());

        // Name ist wieder frei
        reg.binden("alice", ConnectionId(2)).unwrap();
    }

    #[test]
    fn namen_sortiert() {
        let mut reg = SessionRegistry::neu();
        reg.binden("carol", ConnectionId(3)).unwrap();
        reg.binden("alice", ConnectionId(1)).unwrap();
        assert_eq!(reg.namen(), vec!["alice", "carol"]);
        assert_eq!(reg.verbindungen(), vec![ConnectionId(1), ConnectionId(3)]);
    }
}
