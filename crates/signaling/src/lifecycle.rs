//! Verbindungsabbau
//!
//! `abbauen` ist der einzige Weg, eine Verbindung zu entfernen. Reihenfolge:
//! Registry-Eintrag loeschen, aus der Verbindungsmenge nehmen, Transport
//! schliessen. Alles passiert synchron in der Steuerschleife, kein anderer
//! Code sieht einen Zwischenzustand. Wiederholte Aufrufe sind wirkungslos.

use plauder_core::ConnectionId;
use plauder_db::UserStore;

use crate::reactor::Reactor;
use crate::server_state::SignalingState;

impl<R: Reactor, S: UserStore> SignalingState<R, S> {
    /// Baut die Verbindung `id` vollstaendig ab
    ///
    /// Gibt `true` zurueck, wenn tatsaechlich etwas abgebaut wurde.
    pub fn abbauen(&mut self, id: ConnectionId, grund: &str) -> bool {
        let name = self.registry.lock().entfernen_verbindung(id);
        let verbindung = self.verbindungen.entfernen(id);

        if name.is_none() && verbindung.is_none() {
            return false;
        }
        self.reactor.schliessen(id);

        match (&name, &verbindung) {
            (Some(name), Some(v)) => {
                tracing::info!(verbindung = %id, peer = %v.peer, user = %name, grund, "Verbindung abgebaut");
            }
            (None, Some(v)) => {
                tracing::info!(verbindung = %id, peer = %v.peer, grund, "Verbindung abgebaut");
            }
            _ => {
                tracing::warn!(verbindung = %id, grund, "Registry-Eintrag ohne Verbindung entfernt");
            }
        }

        if let Some(name) = name {
            if let Err(e) = self.store.logout(&name) {
                tracing::warn!(user = %name, fehler = %e, "Abmeldung im Speicher fehlgeschlagen");
            }
        }
        true
    }

    /// Baut alle Verbindungen ab (Shutdown)
    pub fn alle_abbauen(&mut self, grund: &str) -> usize {
        let mut anzahl = 0;
        for id in self.verbindungen.ids() {
            if self.abbauen(id, grund) {
                anzahl += 1;
            }
        }
        // Registry-Eintraege ohne Verbindung duerfen nicht ueberleben
        let rest = self.registry.lock().verbindungen();
        for id in rest {
            if self.abbauen(id, grund) {
                anzahl += 1;
            }
        }
        anzahl
    }
}
