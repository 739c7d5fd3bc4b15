//! Zustand der Steuerschleife
//!
//! `SignalingState` buendelt alles, was Handler fuer eine Anfrage brauchen:
//! Reactor, Verbindungsmenge, Registry, Benutzerspeicher und Codec. Er wird
//! ausschliesslich von der Steuerschleife veraendert; nur die Registry wird
//! ueber einen Mutex mit anderen Threads geteilt.

use std::time::Duration;

use plauder_core::ConnectionId;
use plauder_db::UserStore;
use plauder_protocol::{wire, Antwort, Frame, FrameCodec};

use crate::connection::ConnectionSet;
use crate::error::SignalingResult;
use crate::reactor::Reactor;
use crate::registry::GeteilteRegistry;

/// Standard-Wartezeit pro Poll
pub const STANDARD_TICK: Duration = Duration::from_millis(200);

/// Standard-Gueltigkeit einer Challenge
pub const STANDARD_CHALLENGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Standard-Grenze fuer ausstehende Ausgaben pro Verbindung (64 KiB)
pub const STANDARD_MAX_AUSSTEHEND: usize = 64 * 1024;

/// Standard-Obergrenze gleichzeitiger Verbindungen
pub const STANDARD_MAX_VERBINDUNGEN: usize = 512;

/// Konfiguration fuer die Steuerschleife
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Maximale Frame-Groesse in Bytes (ohne Laengen-Feld)
    pub max_frame_size: usize,
    /// Maximale Wartezeit eines Polls
    pub tick: Duration,
    /// Wie lange eine Challenge beantwortet werden kann
    pub challenge_timeout: Duration,
    /// Verbindungen ohne Eingang werden danach getrennt (None = nie)
    pub idle_timeout: Option<Duration>,
    /// Grenze fuer den Ausgangspuffer pro Verbindung
    pub max_pending_output: usize,
    /// Weitere Verbindungen werden sofort wieder geschlossen
    pub max_verbindungen: usize,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            max_frame_size: wire::DEFAULT_MAX_FRAME_SIZE,
            tick: STANDARD_TICK,
            challenge_timeout: STANDARD_CHALLENGE_TIMEOUT,
            idle_timeout: None,
            max_pending_output: STANDARD_MAX_AUSSTEHEND,
            max_verbindungen: STANDARD_MAX_VERBINDUNGEN,
        }
    }
}

/// Zustand der Steuerschleife, exklusiv in ihrer Hand
pub struct SignalingState<R: Reactor, S: UserStore> {
    pub config: SignalingConfig,
    pub reactor: R,
    pub verbindungen: ConnectionSet,
    pub registry: GeteilteRegistry,
    pub store: S,
    pub codec: FrameCodec,
}

impl<R: Reactor, S: UserStore> SignalingState<R, S> {
    pub fn neu(reactor: R, store: S, registry: GeteilteRegistry, config: SignalingConfig) -> Self {
        let codec = FrameCodec::with_max_size(config.max_frame_size);
        Self {
            config,
            reactor,
            verbindungen: ConnectionSet::neu(),
            registry,
            store,
            codec,
        }
    }

    /// Kodiert `frame` und uebergibt ihn dem Reactor
    ///
    /// Ein zu grosser Frame gilt wie ein Sendefehler als Transportfehler.
    pub fn senden(&mut self, id: ConnectionId, frame: &Frame) -> SignalingResult<()> {
        let bytes = wire::encode(frame, self.codec.max_frame_size())?;
        self.reactor.senden(id, &bytes)?;
        Ok(())
    }

    /// Uebergibt eine empfangene Nutzlast unveraendert an `id`
    pub fn senden_roh(&mut self, id: ConnectionId, nutzlast: &[u8]) -> SignalingResult<()> {
        let bytes = wire::rahmen(nutzlast, self.codec.max_frame_size())?;
        self.reactor.senden(id, &bytes)?;
        Ok(())
    }

    /// Sendet eine Antwort; bei Fehlern wird die Verbindung abgebaut
    ///
    /// Gibt `false` zurueck, wenn die Verbindung danach nicht mehr existiert.
    pub fn antworten(&mut self, id: ConnectionId, antwort: Antwort) -> bool {
        match self.senden(id, &Frame::Antwort(antwort)) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(verbindung = %id, fehler = %e, "Antwort konnte nicht gesendet werden");
                self.abbauen(id, "Senden fehlgeschlagen");
                false
            }
        }
    }

    /// 400 mit `text`, Verbindung bleibt offen
    pub fn fehler_antworten(&mut self, id: ConnectionId, text: &str) -> bool {
        self.antworten(id, Antwort::fehler(text))
    }

    /// 400 mit `text`, danach Abbau
    pub fn ablehnen(&mut self, id: ConnectionId, text: &str) {
        self.antworten(id, Antwort::fehler(text));
        self.abbauen(id, text);
    }

    /// Verbindung, unter der `name` angemeldet ist
    pub fn verbindung_von(&self, name: &str) -> Option<ConnectionId> {
        self.registry.lock().verbindung_von(name)
    }
}
