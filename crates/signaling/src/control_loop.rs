//! Steuerschleife – Ein Thread, alle Verbindungen
//!
//! Jeder Tick:
//! 1. Steuerbefehle anderer Threads abarbeiten (Listen-Benachrichtigung, Stopp)
//! 2. Einmal begrenzt pollen: neue Verbindungen, lesbare, fehlerhafte
//! 3. Fehlerhafte Verbindungen abbauen
//! 4. Lesbare Verbindungen lesen und alle vollstaendigen Frames dispatchen
//! 5. Abgelaufene Challenges und untaetige Verbindungen abbauen
//!
//! Registry und Verbindungsmenge werden nur hier veraendert. Andere Threads
//! sprechen die Schleife ueber [`ServerHandle`] an.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Instant,
};

use crossbeam_channel::{Receiver, Sender};
use plauder_core::ConnectionId;
use plauder_db::UserStore;
use plauder_protocol::Antwort;

use crate::dispatcher;
use crate::error::SignalingResult;
use crate::handlers::auth_handler;
use crate::reactor::{Lesestatus, Reactor};
use crate::registry::{GeteilteRegistry, SessionRegistry};
use crate::server_state::{SignalingConfig, SignalingState};

// ---------------------------------------------------------------------------
// Steuerbefehle
// ---------------------------------------------------------------------------

/// Befehle anderer Threads an die Steuerschleife
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteuerBefehl {
    /// 205 an alle angemeldeten Verbindungen
    ListenAktualisieren,
    /// Schleife nach diesem Tick beenden
    Stoppen,
}

// ---------------------------------------------------------------------------
// ServerHandle
// ---------------------------------------------------------------------------

/// Verwaltungszugriff auf eine laufende Steuerschleife
///
/// Clone teilt denselben Zustand und darf an andere Threads gegeben werden.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    laeuft: Arc<AtomicBool>,
    befehle: Sender<SteuerBefehl>,
    registry: GeteilteRegistry,
    anzahl: Arc<AtomicUsize>,
}

impl ServerHandle {
    /// Beendet die Schleife spaetestens nach dem laufenden Tick
    pub fn stop(&self) {
        self.laeuft.store(false, Ordering::SeqCst);
        let _ = self.befehle.send(SteuerBefehl::Stoppen);
    }

    /// Schickt allen angemeldeten Clients ein 205
    pub fn notify_lists_changed(&self) {
        if self.befehle.send(SteuerBefehl::ListenAktualisieren).is_err() {
            tracing::debug!("Steuerschleife beendet, Listen-Benachrichtigung verworfen");
        }
    }

    /// Namen aller angemeldeten Benutzer
    pub fn online_users(&self) -> Vec<String> {
        self.registry.lock().namen()
    }

    /// Anzahl offener Verbindungen (Stand: Ende des letzten Ticks)
    pub fn connection_count(&self) -> usize {
        self.anzahl.load(Ordering::SeqCst)
    }

    pub fn laeuft(&self) -> bool {
        self.laeuft.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// ControlLoop
// ---------------------------------------------------------------------------

/// Die Steuerschleife mit exklusivem Besitz am Zustand
pub struct ControlLoop<R: Reactor, S: UserStore> {
    state: SignalingState<R, S>,
    laeuft: Arc<AtomicBool>,
    befehle_tx: Sender<SteuerBefehl>,
    befehle_rx: Receiver<SteuerBefehl>,
    anzahl: Arc<AtomicUsize>,
}

impl<R: Reactor, S: UserStore> ControlLoop<R, S> {
    /// Erstellt eine neue, laufbereite Steuerschleife
    pub fn neu(reactor: R, store: S, config: SignalingConfig) -> Self {
        let (befehle_tx, befehle_rx) = crossbeam_channel::unbounded();
        Self {
            state: SignalingState::neu(reactor, store, SessionRegistry::geteilt(), config),
            laeuft: Arc::new(AtomicBool::new(true)),
            befehle_tx,
            befehle_rx,
            anzahl: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Handle fuer andere Threads
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            laeuft: Arc::clone(&self.laeuft),
            befehle: self.befehle_tx.clone(),
            registry: Arc::clone(&self.state.registry),
            anzahl: Arc::clone(&self.anzahl),
        }
    }

    pub fn registry(&self) -> &GeteilteRegistry {
        &self.state.registry
    }

    pub fn verbindungen_anzahl(&self) -> usize {
        self.state.verbindungen.len()
    }

    /// Laeuft, bis `ServerHandle::stop` aufgerufen wird
    ///
    /// Danach werden alle Verbindungen abgebaut. Nur ein Fehler des Polls
    /// selbst beendet die Schleife vorzeitig.
    pub fn run(&mut self) -> SignalingResult<()> {
        tracing::info!("Steuerschleife gestartet");

        let ergebnis = loop {
            if !self.laeuft.load(Ordering::SeqCst) {
                break Ok(());
            }
            if let Err(e) = self.tick() {
                tracing::error!(fehler = %e, "Steuerschleife abgebrochen");
                break Err(e);
            }
        };

        self.herunterfahren();
        tracing::info!("Steuerschleife beendet");
        ergebnis
    }

    /// Eine Iteration der Schleife
    pub fn tick(&mut self) -> SignalingResult<()> {
        self.befehle_abarbeiten();
        if !self.laeuft.load(Ordering::SeqCst) {
            return Ok(());
        }

        let bereitschaft = self.state.reactor.abfragen(self.state.config.tick)?;

        for (id, peer) in bereitschaft.neu {
            if self.state.verbindungen.len() >= self.state.config.max_verbindungen {
                tracing::warn!(
                    peer = %peer,
                    max = self.state.config.max_verbindungen,
                    "Server voll – Verbindung abgelehnt"
                );
                self.state.reactor.schliessen(id);
                continue;
            }
            tracing::info!(verbindung = %id, peer = %peer, "Verbindung angenommen");
            self.state.verbindungen.einfuegen(id, peer);
        }

        for id in bereitschaft.fehler {
            self.state.abbauen(id, "Transportfehler");
        }

        for id in bereitschaft.lesbar {
            self.lesen(id);
        }

        let jetzt = Instant::now();
        auth_handler::abgelaufene_challenges(&mut self.state, jetzt);
        self.untaetige_trennen(jetzt);

        self.anzahl.store(self.state.verbindungen.len(), Ordering::SeqCst);
        Ok(())
    }

    /// Baut alle Verbindungen ab
    pub fn herunterfahren(&mut self) {
        let anzahl = self.state.alle_abbauen("Server wird beendet");
        self.anzahl.store(0, Ordering::SeqCst);
        if anzahl > 0 {
            tracing::info!(anzahl, "Verbindungen beim Herunterfahren getrennt");
        }
    }

    fn befehle_abarbeiten(&mut self) {
        while let Ok(befehl) = self.befehle_rx.try_recv() {
            match befehl {
                SteuerBefehl::ListenAktualisieren => {
                    let ziele = self.state.registry.lock().verbindungen();
                    tracing::debug!(anzahl = ziele.len(), "Listen-Aenderung wird verteilt");
                    for id in ziele {
                        self.state.antworten(id, Antwort::listen_geaendert());
                    }
                }
                SteuerBefehl::Stoppen => {
                    self.laeuft.store(false, Ordering::SeqCst);
                }
            }
        }
    }

    /// Liest alles Verfuegbare von `id` und verarbeitet jeden vollstaendigen Frame
    fn lesen(&mut self, id: ConnectionId) {
        let state = &mut self.state;

        let Some(verbindung) = state.verbindungen.get_mut(id) else {
            return;
        };
        let status = match state.reactor.empfangen(id, &mut verbindung.eingang) {
            Ok(status) => status,
            Err(e) => {
                tracing::debug!(verbindung = %id, fehler = %e, "Lesen fehlgeschlagen");
                state.abbauen(id, "Lesefehler");
                return;
            }
        };
        verbindung.zuletzt_aktiv = Instant::now();

        loop {
            let Some(verbindung) = state.verbindungen.get_mut(id) else {
                return;
            };
            match state.codec.decode_mit_nutzlast(&mut verbindung.eingang) {
                Ok(Some(empfangen)) => dispatcher::dispatch(state, id, empfangen),
                Ok(None) => break,
                Err(e) if !e.ist_protokollfehler() => dispatcher::ungueltig(state, id, &e),
                Err(e) => {
                    tracing::warn!(verbindung = %id, fehler = %e, "Protokollfehler");
                    state.abbauen(id, "Protokollfehler");
                    return;
                }
            }
        }

        if status == Lesestatus::Geschlossen {
            state.abbauen(id, "Gegenstelle hat geschlossen");
        }
    }

    fn untaetige_trennen(&mut self, jetzt: Instant) {
        let Some(timeout) = self.state.config.idle_timeout else {
            return;
        };
        for id in self
            .state
            .verbindungen
            .ids_wo(|v| v.ist_untaetig(timeout, jetzt))
        {
            self.state.abbauen(id, "Zeitueberschreitung");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
