//! Verbindungsmenge – Buchhaltung aller offenen Verbindungen
//!
//! Jede angenommene Verbindung bekommt einen Eintrag mit Peer-Adresse,
//! letzter Aktivitaet, Authentifizierungszustand und Eingangspuffer fuer
//! unvollstaendige Frames.
//!
//! ## State Machine
//! ```text
//! Unauthentifiziert -> HerausforderungGesendet -> Authentifiziert
//!         |                     |
//!         +------ Abbau --------+
//! ```

use std::{
    collections::HashMap,
    net::SocketAddr,
    time::{Duration, Instant},
};

use bytes::BytesMut;
use plauder_auth::PendingChallenge;
use plauder_core::ConnectionId;

// ---------------------------------------------------------------------------
// Verbindungszustand
// ---------------------------------------------------------------------------

/// Authentifizierungszustand einer Verbindung
#[derive(Debug, Clone)]
pub enum AuthZustand {
    /// Verbunden, noch keine Presence
    Unauthentifiziert,
    /// Challenge ausgestellt, naechster Frame muss die Antwort sein
    HerausforderungGesendet(PendingChallenge),
    /// Erfolgreich angemeldet unter diesem Namen
    Authentifiziert(String),
}

/// Eine offene Verbindung
#[derive(Debug)]
pub struct Verbindung {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    pub zuletzt_aktiv: Instant,
    pub zustand: AuthZustand,
    /// Bytes eines noch unvollstaendigen Frames
    pub eingang: BytesMut,
}

impl Verbindung {
    pub fn neu(id: ConnectionId, peer: SocketAddr) -> Self {
        Self {
            id,
            peer,
            zuletzt_aktiv: Instant::now(),
            zustand: AuthZustand::Unauthentifiziert,
            eingang: BytesMut::new(),
        }
    }

    /// Laeuft die ausgestellte Challenge laenger als `timeout`?
    pub fn challenge_abgelaufen(&self, timeout: Duration, jetzt: Instant) -> bool {
        match &self.zustand {
            AuthZustand::HerausforderungGesendet(c) => c.ist_abgelaufen(timeout, jetzt),
            _ => false,
        }
    }

    pub fn ist_untaetig(&self, timeout: Duration, jetzt: Instant) -> bool {
        jetzt.saturating_duration_since(self.zuletzt_aktiv) > timeout
    }
}

// ---------------------------------------------------------------------------
// ConnectionSet
// ---------------------------------------------------------------------------

/// Alle offenen Verbindungen, indiziert nach `ConnectionId`
#[derive(Debug, Default)]
pub struct ConnectionSet {
    verbindungen: HashMap<ConnectionId, Verbindung>,
}

impl ConnectionSet {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Nimmt eine neue Verbindung auf; eine vorhandene ID wird ersetzt
    pub fn einfuegen(&mut self, id: ConnectionId, peer: SocketAddr) {
        self.verbindungen.insert(id, Verbindung::neu(id, peer));
    }

    pub fn entfernen(&mut self, id: ConnectionId) -> Option<Verbindung> {
        self.verbindungen.remove(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Verbindung> {
        self.verbindungen.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Verbindung> {
        self.verbindungen.get_mut(&id)
    }

    pub fn enthaelt(&self, id: ConnectionId) -> bool {
        self.verbindungen.contains_key(&id)
    }

    /// Alle IDs, aufsteigend sortiert
    pub fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.verbindungen.keys().copied().collect();
        ids.sort();
        ids
    }

    /// IDs, auf die `filter` zutrifft
    pub fn ids_wo(&self, mut filter: impl FnMut(&Verbindung) -> bool) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self
            .verbindungen
            .values()
            .filter(|v| filter(v))
            .map(|v| v.id)
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.verbindungen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verbindungen.is_empty()
    }
}
