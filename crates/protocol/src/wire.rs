//! Wire-Format fuer TCP-Verbindungen
//!
//! Frame-basiertes Protokoll: Length(u32 big-endian) + JSON-Objekt.
//!
//! ## Frame-Format
//!
//! ```text
//! +--------+--------+--------+--------+----...----+
//! | Laenge (u32 BE) | 4 Bytes        | Payload    |
//! +--------+--------+--------+--------+----...----+
//! ```
//!
//! Die Laenge gibt die Anzahl der Payload-Bytes an (ohne die 4 Laengen-Bytes).
//! Die maximale Frame-Groesse ist konfigurierbar (Standard: 4 KiB).
//!
//! ## Dekodierung in zwei Stufen
//! 1. Bytes -> JSON-Objekt. Scheitert das, ist der Stream nicht mehr
//!    synchron (`FrameError::Fehlerhaft`, `ZuGross`, `Unvollstaendig`).
//! 2. JSON-Objekt -> `Frame`. Scheitert das, ist nur dieser eine Frame
//!    ungueltig (`FrameError::Ungueltig`), die Bytes sind bereits verbraucht.
//!
//! Serverseitig liefert [`FrameCodec::decode_mit_nutzlast`] zusaetzlich die
//! unveraenderte Nutzlast, damit Nachrichten byte-genau weitergereicht
//! werden koennen ([`rahmen`]).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{FrameError, FrameResult};
use crate::frame::Frame;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Frame-Groesse (4 KiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 4 * 1024;

/// Kleinste erlaubte Konfiguration fuer die maximale Frame-Groesse
pub const MIN_MAX_FRAME_SIZE: usize = 1024;

/// Groesse des Laengen-Felds in Bytes
pub const LENGTH_FIELD_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// Freie Funktionen
// ---------------------------------------------------------------------------

/// Kodiert einen Frame inklusive Laengen-Feld
///
/// Scheitert mit `ZuGross`, wenn die JSON-Nutzlast `max_frame_size`
/// ueberschreitet.
pub fn encode(frame: &Frame, max_frame_size: usize) -> FrameResult<Bytes> {
    let json = serde_json::to_vec(frame)
        .map_err(|e| FrameError::Fehlerhaft(format!("JSON-Serialisierung fehlgeschlagen: {e}")))?;
    rahmen(&json, max_frame_size)
}

/// Setzt das Laengen-Feld vor eine bereits serialisierte Nutzlast
pub fn rahmen(nutzlast: &[u8], max_frame_size: usize) -> FrameResult<Bytes> {
    if nutzlast.len() > max_frame_size {
        return Err(FrameError::ZuGross {
            groesse: nutzlast.len(),
            maximum: max_frame_size,
        });
    }

    let mut dst = BytesMut::with_capacity(LENGTH_FIELD_SIZE + nutzlast.len());
    dst.put_u32(nutzlast.len() as u32);
    dst.put_slice(nutzlast);
    Ok(dst.freeze())
}

/// Dekodiert genau einen vollstaendigen Frame
///
/// Abgeschnittene Eingaben, ueberzaehlige Bytes und zu grosse Frames sind
/// Protokollfehler.
pub fn decode(bytes: &[u8], max_frame_size: usize) -> FrameResult<Frame> {
    if bytes.len() < LENGTH_FIELD_SIZE {
        return Err(FrameError::Unvollstaendig {
            erwartet: LENGTH_FIELD_SIZE,
            vorhanden: bytes.len(),
        });
    }

    let length = laenge_lesen(bytes, max_frame_size)?;
    let total_size = LENGTH_FIELD_SIZE + length;

    if bytes.len() < total_size {
        return Err(FrameError::Unvollstaendig {
            erwartet: total_size,
            vorhanden: bytes.len(),
        });
    }
    if bytes.len() > total_size {
        return Err(FrameError::Fehlerhaft(format!(
            "{} ueberzaehlige Bytes nach dem Frame",
            bytes.len() - total_size
        )));
    }

    nutzlast_dekodieren(&bytes[LENGTH_FIELD_SIZE..])
}

/// Liest das Laengen-Feld und prueft es gegen die Maximalgroesse
fn laenge_lesen(bytes: &[u8], max_frame_size: usize) -> FrameResult<usize> {
    let length = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    if length > max_frame_size {
        return Err(FrameError::ZuGross {
            groesse: length,
            maximum: max_frame_size,
        });
    }
    Ok(length)
}

/// Stufe 1 und 2 der Dekodierung fuer eine vollstaendige Nutzlast
fn nutzlast_dekodieren(payload: &[u8]) -> FrameResult<Frame> {
    let wert: serde_json::Value = serde_json::from_slice(payload)
        .map_err(|e| FrameError::Fehlerhaft(format!("kein gueltiges JSON: {e}")))?;

    if !wert.is_object() {
        return Err(FrameError::Fehlerhaft("Nutzlast ist kein JSON-Objekt".into()));
    }

    serde_json::from_value(wert).map_err(|e| FrameError::Ungueltig(e.to_string()))
}

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// Dekodierter Frame samt der JSON-Nutzlast, aus der er stammt
#[derive(Debug, Clone, PartialEq)]
pub struct EmpfangenerFrame {
    pub frame: Frame,
    /// Nutzlast ohne Laengen-Feld, exakt wie empfangen
    pub nutzlast: Bytes,
}

/// tokio-util Codec fuer frame-basierte Verbindungen
///
/// Wird serverseitig direkt auf dem Eingangspuffer einer Verbindung
/// verwendet und clientseitig mit `tokio_util::codec::Framed`.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    /// Maximale erlaubte Frame-Groesse in Bytes
    max_frame_size: usize,
}

impl FrameCodec {
    /// Erstellt einen neuen `FrameCodec` mit Standard-Limits
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Erstellt einen `FrameCodec` mit benutzerdefinierter maximaler Frame-Groesse
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Gibt die konfigurierte maximale Frame-Groesse zurueck
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Wie [`Decoder::decode`], behaelt aber die rohe Nutzlast
    pub fn decode_mit_nutzlast(
        &mut self,
        src: &mut BytesMut,
    ) -> FrameResult<Option<EmpfangenerFrame>> {
        // Warte auf mindestens 4 Bytes fuer das Laengen-Feld
        if src.len() < LENGTH_FIELD_SIZE {
            return Ok(None);
        }

        // Zu grosse Frames sofort ablehnen, nicht erst auf die Nutzlast warten
        let length = laenge_lesen(src, self.max_frame_size)?;

        let total_size = LENGTH_FIELD_SIZE + length;
        if src.len() < total_size {
            src.reserve(total_size - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_FIELD_SIZE);
        let nutzlast = src.split_to(length).freeze();
        let frame = nutzlast_dekodieren(&nutzlast)?;
        Ok(Some(EmpfangenerFrame { frame, nutzlast }))
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(self.decode_mit_nutzlast(src)?.map(|e| e.frame))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => {
                let erwartet = if src.len() < LENGTH_FIELD_SIZE {
                    LENGTH_FIELD_SIZE
                } else {
                    LENGTH_FIELD_SIZE + laenge_lesen(src, self.max_frame_size)?
                };
                Err(FrameError::Unvollstaendig {
                    erwartet,
                    vorhanden: src.len(),
                })
            }
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let bytes = encode(&item, self.max_frame_size)?;
        dst.extend_from_slice(&bytes);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
