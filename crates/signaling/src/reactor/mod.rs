//! Readiness-Multiplexer
//!
//! Die Steuerschleife spricht das Netzwerk nur ueber das [`Reactor`]-Trait an.
//! [`MioReactor`] ist die echte Implementierung auf `mio::Poll`,
//! [`FakeReactor`] ein deterministischer Ersatz fuer Routing-Tests.

use std::{io, net::SocketAddr, time::Duration};

use bytes::BytesMut;
use plauder_core::ConnectionId;

pub mod fake;
pub mod mio_reactor;

pub use fake::{FakeNetz, FakeReactor};
pub use mio_reactor::MioReactor;

/// Ergebnis einer Abfrage: was ist seit dem letzten Tick passiert
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Bereitschaft {
    /// Neu angenommene Verbindungen
    pub neu: Vec<(ConnectionId, SocketAddr)>,
    /// Verbindungen mit lesbaren Daten (oder geschlossener Gegenseite)
    pub lesbar: Vec<ConnectionId>,
    /// Verbindungen mit Transportfehler
    pub fehler: Vec<ConnectionId>,
}

impl Bereitschaft {
    pub fn ist_leer(&self) -> bool {
        self.neu.is_empty() && self.lesbar.is_empty() && self.fehler.is_empty()
    }
}

/// Zustand des Lesekanals nach `empfangen`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lesestatus {
    Offen,
    /// Gegenseite hat geschlossen (EOF)
    Geschlossen,
}

/// Transport-Abstraktion fuer die Steuerschleife
pub trait Reactor {
    /// Wartet hoechstens `warte` auf Ereignisse
    ///
    /// Annehmen neuer Verbindungen und das Leeren ausstehender Ausgaben
    /// passieren innerhalb dieses Aufrufs.
    fn abfragen(&mut self, warte: Duration) -> io::Result<Bereitschaft>;

    /// Liest alle verfuegbaren Bytes von `id` in `puffer`
    fn empfangen(&mut self, id: ConnectionId, puffer: &mut BytesMut) -> io::Result<Lesestatus>;

    /// Reiht `daten` zum Senden ein und versucht sofort zu schreiben
    fn senden(&mut self, id: ConnectionId, daten: &[u8]) -> io::Result<()>;

    /// Schliesst den Transport; unbekannte IDs werden ignoriert
    fn schliessen(&mut self, id: ConnectionId);
}
