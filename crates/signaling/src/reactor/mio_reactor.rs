//! Reactor auf Basis von `mio::Poll`
//!
//! Ein einziger Poll-Aufruf pro Tick liefert Annahme-, Lese-, Schreib- und
//! Fehlerbereitschaft. mio meldet kantengesteuert, deshalb werden Annehmen,
//! Lesen und Schreiben jeweils bis `WouldBlock` wiederholt.
//!
//! Lesen ist pro Aufruf auf ein kleines Vielfaches der Frame-Groesse
//! begrenzt. Bricht `empfangen` an der Grenze ab, meldet der naechste
//! `abfragen` die Verbindung erneut als lesbar, auch ohne neues Ereignis.

use std::{
    collections::{HashMap, HashSet},
    io::{self, Read, Write},
    net::{Shutdown, SocketAddr},
    time::Duration,
};

use bytes::{Buf, BytesMut};
use mio::{
    net::{TcpListener, TcpStream},
    Events, Interest, Poll, Token,
};
use plauder_core::ConnectionId;
use plauder_protocol::wire;

use super::{Bereitschaft, Lesestatus, Reactor};

/// Token des Listeners, Verbindungen beginnen bei 1
const LISTENER: Token = Token(0);

/// Kapazitaet des Event-Puffers pro Poll
const EVENT_KAPAZITAET: usize = 1024;

/// Groesse des Lesepuffers pro `read`-Aufruf
const LESE_BLOCK: usize = 4096;

/// Lesegrenze pro `empfangen` als Vielfaches der maximalen Frame-Groesse
pub const LESE_FAKTOR: usize = 4;

struct MioVerbindung {
    stream: TcpStream,
    ausgang: BytesMut,
}

impl MioVerbindung {
    /// Schreibt so viel wie moeglich aus dem Ausgangspuffer
    fn leeren(&mut self) -> io::Result<()> {
        while !self.ausgang.is_empty() {
            match self.stream.write(&self.ausgang) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => self.ausgang.advance(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// TCP-Reactor fuer den Produktivbetrieb
pub struct MioReactor {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    verbindungen: HashMap<Token, MioVerbindung>,
    naechster_token: usize,
    max_ausstehend: usize,
    max_lesen: usize,
    /// An der Lesegrenze abgebrochen, beim naechsten Tick erneut lesbar
    nachlesen: HashSet<Token>,
}

impl MioReactor {
    /// Bindet den Listener an `adresse`
    ///
    /// `max_ausstehend` begrenzt den Ausgangspuffer pro Verbindung.
    pub fn binden(adresse: SocketAddr, max_ausstehend: usize) -> io::Result<Self> {
        let poll = Poll::new()?;
        let mut listener = TcpListener::bind(adresse)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;

        tracing::info!(adresse = %listener.local_addr()?, "Listener gebunden");

        Ok(Self {
            poll,
            events: Events::with_capacity(EVENT_KAPAZITAET),
            listener,
            verbindungen: HashMap::new(),
            naechster_token: 1,
            max_ausstehend,
            max_lesen: LESE_FAKTOR * wire::DEFAULT_MAX_FRAME_SIZE,
            nachlesen: HashSet::new(),
        })
    }

    /// Setzt die Lesegrenze passend zu `max_frame_size`
    pub fn mit_frame_groesse(mut self, max_frame_size: usize) -> Self {
        self.max_lesen = max_frame_size.saturating_mul(LESE_FAKTOR).max(LESE_BLOCK);
        self
    }

    /// Tatsaechlich gebundene Adresse (relevant bei Port 0)
    pub fn lokale_adresse(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    fn annehmen(&mut self, neu: &mut Vec<(ConnectionId, SocketAddr)>) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, peer)) => {
                    let token = Token(self.naechster_token);
                    self.naechster_token += 1;

                    if let Err(e) = self.poll.registry().register(
                        &mut stream,
                        token,
                        Interest::READABLE | Interest::WRITABLE,
                    ) {
                        tracing::warn!(peer = %peer, fehler = %e, "Registrierung fehlgeschlagen");
                        continue;
                    }
                    let _ = stream.set_nodelay(true);

                    self.verbindungen.insert(
                        token,
                        MioVerbindung {
                            stream,
                            ausgang: BytesMut::new(),
                        },
                    );
                    neu.push((ConnectionId(token.0), peer));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!(fehler = %e, "Annehmen fehlgeschlagen");
                    break;
                }
            }
        }
    }
}

impl Reactor for MioReactor {
    fn abfragen(&mut self, warte: Duration) -> io::Result<Bereitschaft> {
        let mut bereitschaft = Bereitschaft::default();

        // Liegen noch ungelesene Daten bereit, wird nicht gewartet
        let warte = if self.nachlesen.is_empty() {
            warte
        } else {
            Duration::ZERO
        };
        match self.poll.poll(&mut self.events, Some(warte)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(bereitschaft),
            Err(e) => return Err(e),
        }

        let ereignisse: Vec<_> = self
            .events
            .iter()
            .map(|e| {
                (
                    e.token(),
                    e.is_readable() || e.is_read_closed(),
                    e.is_writable(),
                    e.is_error(),
                )
            })
            .collect();

        for (token, lesbar, schreibbar, fehler) in ereignisse {
            if token == LISTENER {
                self.annehmen(&mut bereitschaft.neu);
                continue;
            }

            let id = ConnectionId(token.0);
            let Some(verbindung) = self.verbindungen.get_mut(&token) else {
                continue;
            };

            if fehler {
                bereitschaft.fehler.push(id);
                continue;
            }
            if schreibbar {
                if let Err(e) = verbindung.leeren() {
                    tracing::debug!(verbindung = %id, fehler = %e, "Schreiben fehlgeschlagen");
                    bereitschaft.fehler.push(id);
                    continue;
                }
            }
            if lesbar {
                bereitschaft.lesbar.push(id);
            }
        }

        for token in self.nachlesen.drain() {
            let id = ConnectionId(token.0);
            if !self.verbindungen.contains_key(&token)
                || bereitschaft.lesbar.contains(&id)
                || bereitschaft.fehler.contains(&id)
            {
                continue;
            }
            bereitschaft.lesbar.push(id);
        }

        Ok(bereitschaft)
    }

    fn empfangen(&mut self, id: ConnectionId, puffer: &mut BytesMut) -> io::Result<Lesestatus> {
        let token = Token(id.inner());
        let verbindung = self
            .verbindungen
            .get_mut(&token)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;

        let mut block = [0u8; LESE_BLOCK];
        let mut gelesen = 0;
        loop {
            if gelesen >= self.max_lesen {
                tracing::trace!(verbindung = %id, gelesen, "Lesegrenze erreicht");
                self.nachlesen.insert(token);
                return Ok(Lesestatus::Offen);
            }
            let rest = (self.max_lesen - gelesen).min(LESE_BLOCK);
            match verbindung.stream.read(&mut block[..rest]) {
                Ok(0) => return Ok(Lesestatus::Geschlossen),
                Ok(n) => {
                    puffer.extend_from_slice(&block[..n]);
                    gelesen += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Lesestatus::Offen),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn senden(&mut self, id: ConnectionId, daten: &[u8]) -> io::Result<()> {
        let verbindung = self
            .verbindungen
            .get_mut(&Token(id.inner()))
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;

        verbindung.ausgang.extend_from_slice(daten);
        verbindung.leeren()?;

        if verbindung.ausgang.len() > self.max_ausstehend {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!(
                    "Ausgangspuffer voll: {} Bytes (Maximum: {})",
                    verbindung.ausgang.len(),
                    self.max_ausstehend
                ),
            ));
        }
        Ok(())
    }

    fn schliessen(&mut self, id: ConnectionId) {
        let token = Token(id.inner());
        self.nachlesen.remove(&token);
        let Some(mut verbindung) = self.verbindungen.remove(&token) else {
            return;
        };

        // Letzter Versuch, eine ausstehende Antwort loszuwerden
        let _ = verbindung.leeren();
        let _ = self.poll.registry().deregister(&mut verbindung.stream);
        let _ = verbindung.stream.shutdown(Shutdown::Both);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
