//! Message-Dispatcher – Routet Frames an die richtigen Handler
//!
//! ## Zustandspruefung
//! - Nach ausgestellter Challenge verbraucht der naechste Frame die Challenge,
//!   egal was er enthaelt
//! - Vor der Anmeldung ist nur `presence` erlaubt, alles andere wird mit
//!   "must authenticate first" beantwortet
//! - Nach der Anmeldung muss der in der Anfrage genannte Absender der an
//!   diese Verbindung gebundene Name sein

use bytes::Bytes;
use plauder_core::ConnectionId;
use plauder_db::UserStore;
use plauder_protocol::{Aktion, EmpfangenerFrame, Frame, FrameError};

use crate::connection::AuthZustand;
use crate::error::SignalingResult;
use crate::handlers::{
    auth_handler, contact_handler, message_handler, BAD_REQUEST, MUST_AUTHENTICATE,
};
use crate::reactor::Reactor;
use crate::server_state::SignalingState;

/// Grobe Zustandsklasse einer Verbindung fuer das Routing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Unauthentifiziert,
    Herausgefordert,
    Authentifiziert,
}

fn phase<R: Reactor, S: UserStore>(
    state: &SignalingState<R, S>,
    id: ConnectionId,
) -> Option<Phase> {
    state.verbindungen.get(id).map(|v| match v.zustand {
        AuthZustand::Unauthentifiziert => Phase::Unauthentifiziert,
        AuthZustand::HerausforderungGesendet(_) => Phase::Herausgefordert,
        AuthZustand::Authentifiziert(_) => Phase::Authentifiziert,
    })
}

/// Verarbeitet einen vollstaendig dekodierten Frame von `id`
pub fn dispatch<R: Reactor, S: UserStore>(
    state: &mut SignalingState<R, S>,
    id: ConnectionId,
    empfangen: EmpfangenerFrame,
) {
    let EmpfangenerFrame { frame, nutzlast } = empfangen;
    let Some(phase) = phase(state, id) else {
        return;
    };
    tracing::trace!(verbindung = %id, aktion = frame.bezeichnung(), "Frame empfangen");

    let ergebnis = match (phase, frame) {
        (Phase::Herausgefordert, frame) => {
            auth_handler::handle_challenge_antwort(state, id, Some(frame))
        }
        (_, Frame::Aktion(Aktion::Presence { user, .. })) => {
            auth_handler::handle_presence(state, id, user)
        }
        (Phase::Unauthentifiziert, _) => {
            state.fehler_antworten(id, MUST_AUTHENTICATE);
            Ok(())
        }
        (Phase::Authentifiziert, Frame::Antwort(antwort)) => {
            tracing::debug!(verbindung = %id, code = antwort.response.als_zahl(), "Unerwartete Antwort vom Client");
            state.fehler_antworten(id, BAD_REQUEST);
            Ok(())
        }
        (Phase::Authentifiziert, Frame::Aktion(aktion)) => {
            aktion_verarbeiten(state, id, aktion, nutzlast)
        }
    };

    if let Err(e) = ergebnis {
        tracing::error!(verbindung = %id, fehler = %e, "Anfrage fehlgeschlagen");
        state.fehler_antworten(id, BAD_REQUEST);
    }
}

/// Verarbeitet einen Frame, der nicht in ein gueltiges Frame-Modell passte
///
/// Gueltiges JSON, aber unbekannte Aktion oder fehlendes Pflichtfeld.
pub fn ungueltig<R: Reactor, S: UserStore>(
    state: &mut SignalingState<R, S>,
    id: ConnectionId,
    fehler: &FrameError,
) {
    let Some(phase) = phase(state, id) else {
        return;
    };
    tracing::debug!(verbindung = %id, fehler = %fehler, "Ungueltiger Frame");

    if phase == Phase::Herausgefordert {
        if let Err(e) = auth_handler::handle_challenge_antwort(state, id, None) {
            tracing::error!(verbindung = %id, fehler = %e, "Challenge-Abbruch fehlgeschlagen");
        }
        return;
    }
    state.fehler_antworten(id, BAD_REQUEST);
}

/// Anfragen einer angemeldeten Verbindung
fn aktion_verarbeiten<R: Reactor, S: UserStore>(
    state: &mut SignalingState<R, S>,
    id: ConnectionId,
    aktion: Aktion,
    nutzlast: Bytes,
) -> SignalingResult<()> {
    if let Some(absender) = aktion.absender() {
        if state.verbindung_von(absender) != Some(id) {
            tracing::warn!(verbindung = %id, absender = %absender, "Absender passt nicht zur Sitzung");
            state.fehler_antworten(id, BAD_REQUEST);
            return Ok(());
        }
    }

    match aktion {
        Aktion::Presence { .. } => {
            state.fehler_antworten(id, BAD_REQUEST);
            Ok(())
        }
        Aktion::Message { .. } => message_handler::handle_message(state, id, aktion, &nutzlast),
        Aktion::Exit { .. } => {
            auth_handler::handle_exit(state, id);
            Ok(())
        }
        Aktion::GetContacts { user, .. } => contact_handler::handle_get_contacts(state, id, &user),
        Aktion::AddContact {
            user, account_name, ..
        } => contact_handler::handle_add_contact(state, id, &user, &account_name),
        Aktion::RemoveContact {
            user, account_name, ..
        } => contact_handler::handle_remove_contact(state, id, &user, &account_name),
        Aktion::UsersRequest { .. } => contact_handler::handle_users(state, id),
        Aktion::PublicKeyRequest { account_name, .. } => {
            contact_handler::handle_public_key(state, id, &account_name)
        }
    }
}
