//! Deterministischer Reactor ohne Sockets
//!
//! [`FakeReactor`] gehoert der Steuerschleife, [`FakeNetz`] dem Test. Beide
//! teilen denselben Zustand: der Test "verbindet" Clients, speist Frames ein
//! und liest mit, was der Server an jede Verbindung geschickt hat.

use std::{
    collections::{BTreeMap, BTreeSet},
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use plauder_core::ConnectionId;
use plauder_protocol::{wire, Frame, FrameCodec};
use tokio_util::codec::Decoder;

use super::{Bereitschaft, Lesestatus, Reactor};

#[derive(Debug, Default)]
struct FakeVerbindung {
    eingang: BytesMut,
    ausgang: BytesMut,
    eof: bool,
    geschlossen: bool,
    senden_scheitert: bool,
}

#[derive(Debug, Default)]
struct FakeZustand {
    naechste_id: usize,
    neu: Vec<(ConnectionId, SocketAddr)>,
    lesbar: BTreeSet<ConnectionId>,
    fehler: BTreeSet<ConnectionId>,
    verbindungen: BTreeMap<ConnectionId, FakeVerbindung>,
}

/// Reactor-Seite fuer die Steuerschleife
#[derive(Debug, Clone)]
pub struct FakeReactor {
    zustand: Arc<Mutex<FakeZustand>>,
}

/// Test-Seite: Verbindungen steuern und Ausgaben pruefen
#[derive(Debug, Clone)]
pub struct FakeNetz {
    zustand: Arc<Mutex<FakeZustand>>,
}

impl FakeReactor {
    /// Erstellt Reactor und zugehoeriges Test-Netz
    pub fn neu() -> (Self, FakeNetz) {
        let zustand = Arc::new(Mutex::new(FakeZustand {
            naechste_id: 1,
            ..FakeZustand::default()
        }));
        (
            Self {
                zustand: Arc::clone(&zustand),
            },
            FakeNetz { zustand },
        )
    }
}

impl FakeNetz {
    /// Meldet eine neue Verbindung an, sichtbar ab dem naechsten Tick
    pub fn verbinden(&self) -> ConnectionId {
        let mut z = self.zustand.lock();
        let id = ConnectionId(z.naechste_id);
        z.naechste_id += 1;

        let peer = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 40000 + id.inner() as u16);
        z.neu.push((id, peer));
        z.verbindungen.insert(id, FakeVerbindung::default());
        id
    }

    /// Kodiert `frame` und legt ihn in den Eingang von `id`
    pub fn einspeisen(&self, id: ConnectionId, frame: &Frame) {
        let bytes = wire::encode(frame, usize::MAX).unwrap_or_default();
        self.einspeisen_roh(id, &bytes);
    }

    /// Legt rohe Bytes in den Eingang von `id`
    pub fn einspeisen_roh(&self, id: ConnectionId, bytes: &[u8]) {
        let mut z = self.zustand.lock();
        if let Some(v) = z.verbindungen.get_mut(&id) {
            v.eingang.extend_from_slice(bytes);
            z.lesbar.insert(id);
        }
    }

    /// Gegenseite schliesst die Verbindung (EOF beim naechsten Lesen)
    pub fn auflegen(&self, id: ConnectionId) {
        let mut z = self.zustand.lock();
        if let Some(v) = z.verbindungen.get_mut(&id) {
            v.eof = true;
            z.lesbar.insert(id);
        }
    }

    /// Meldet einen Transportfehler fuer `id`
    pub fn fehler_melden(&self, id: ConnectionId) {
        self.zustand.lock().fehler.insert(id);
    }

    /// Alle weiteren Sendeversuche an `id` scheitern
    pub fn senden_scheitert(&self, id: ConnectionId) {
        if let Some(v) = self.zustand.lock().verbindungen.get_mut(&id) {
            v.senden_scheitert = true;
        }
    }

    /// Dekodiert und entnimmt alles, was der Server an `id` geschickt hat
    pub fn ausgang(&self, id: ConnectionId) -> Vec<Frame> {
        let mut z = self.zustand.lock();
        let Some(v) = z.verbindungen.get_mut(&id) else {
            return Vec::new();
        };

        let mut codec = FrameCodec::with_max_size(usize::MAX);
        let mut frames = Vec::new();
        while let Ok(Some(frame)) = codec.decode(&mut v.ausgang) {
            frames.push(frame);
        }
        frames
    }

    /// Entnimmt die rohen JSON-Nutzlasten aller Frames an `id`
    pub fn ausgang_roh(&self, id: ConnectionId) -> Vec<Bytes> {
        let mut z = self.zustand.lock();
        let Some(v) = z.verbindungen.get_mut(&id) else {
            return Vec::new();
        };

        let mut codec = FrameCodec::with_max_size(usize::MAX);
        let mut nutzlasten = Vec::new();
        while let Ok(Some(empfangen)) = codec.decode_mit_nutzlast(&mut v.ausgang) {
            nutzlasten.push(empfangen.nutzlast);
        }
        nutzlasten
    }

    /// Hat der Server den Transport von `id` geschlossen?
    pub fn ist_geschlossen(&self, id: ConnectionId) -> bool {
        self.zustand
            .lock()
            .verbindungen
            .get(&id)
            .map_or(true, |v| v.geschlossen)
    }
}

impl Reactor for FakeReactor {
    fn abfragen(&mut self, _warte: Duration) -> io::Result<Bereitschaft> {
        let mut z = self.zustand.lock();
        let neu = std::mem::take(&mut z.neu);
        let lesbar = std::mem::take(&mut z.lesbar).into_iter().collect();
        let fehler = std::mem::take(&mut z.fehler).into_iter().collect();
        Ok(Bereitschaft { neu, lesbar, fehler })
    }

    fn empfangen(&mut self, id: ConnectionId, puffer: &mut BytesMut) -> io::Result<Lesestatus> {
        let mut z = self.zustand.lock();
        let v = z
            .verbindungen
            .get_mut(&id)
            .filter(|v| !v.geschlossen)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;

        puffer.extend_from_slice(&v.eingang.split());
        Ok(if v.eof {
            Lesestatus::Geschlossen
        } else {
            Lesestatus::Offen
        })
    }

    fn senden(&mut self, id: ConnectionId, daten: &[u8]) -> io::Result<()> {
        let mut z = self.zustand.lock();
        let v = z
            .verbindungen
            .get_mut(&id)
            .filter(|v| !v.geschlossen)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;

        if v.senden_scheitert {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        v.ausgang.extend_from_slice(daten);
        Ok(())
    }

    fn schliessen(&mut self, id: ConnectionId) {
        if let Some(v) = self.zustand.lock().verbindungen.get_mut(&id) {
            v.geschlossen = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plauder_protocol::Aktion;

    #[test]
    fn neue_verbindung_erscheint_genau_einmal() {
        let (mut reactor, netz) = FakeReactor::neu();
        let id = netz.verbinden();

        let b = reactor.abfragen(Duration::ZERO).unwrap();
        assert_eq!(b.neu.len(), 1);
        assert_eq!(b.neu[0].0, id);
        assert!(reactor.abfragen(Duration::ZERO).unwrap().ist_leer());
    }

    #[test]
    fn eingespeiste_frames_sind_lesbar() {
        let (mut reactor, netz) = FakeReactor::neu();
        let id = netz.verbinden();
        netz.einspeisen(id, &Frame::exit("alice"));

        let b = reactor.abfragen(Duration::ZERO).unwrap();
        assert_eq!(b.lesbar, vec![id]);

        let mut puffer = BytesMut::new();
        assert_eq!(reactor.empfangen(id, &mut puffer).unwrap(), Lesestatus::Offen);
        match FrameCodec::new().decode(&mut puffer).unwrap() {
            Some(Frame::Aktion(Aktion::Exit { account_name, .. })) => {
                assert_eq!(account_name, "alice")
            }
            andere => panic!("Exit erwartet, war {andere:?}"),
        }
    }

    #[test]
    fn gesendete_frames_kommen_im_ausgang_an() {
        let (mut reactor, netz) = FakeReactor::neu();
        let id = netz.verbinden();
        let bytes = wire::encode(&Frame::exit("bob"), 4096).unwrap();
        reactor.senden(id, &bytes).unwrap();

        assert_eq!(netz.ausgang(id).len(), 1);
        assert!(netz.ausgang(id).is_empty());
    }

    #[test]
    fn geschlossene_verbindung_lehnt_senden_ab() {
        let (mut reactor, netz) = FakeReactor::neu();
        let id = netz.verbinden();
        reactor.schliessen(id);
        assert!(netz.ist_geschlossen(id));
        assert!(reactor.senden(id, b"x").is_err());
    }
}
