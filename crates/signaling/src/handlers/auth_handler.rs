//! Auth-Handler – Presence, Challenge-Antwort, Exit
//!
//! Ablauf pro Verbindung:
//! 1. `presence` fuer einen bekannten, freien Namen -> 511 mit Nonce
//! 2. naechster Frame muss `{response: 511, data: <digest>}` sein
//! 3. Digest korrekt -> Name binden, 200, Login im Speicher vermerken
//!
//! Jede Abweichung in Schritt 1 oder 2 fuehrt zu einer 400-Antwort und zum
//! Abbau der Verbindung.

use std::time::Instant;

use plauder_auth::{AuthError, PendingChallenge};
use plauder_core::ConnectionId;
use plauder_db::UserStore;
use plauder_protocol::{Antwort, Antwortcode, Benutzerangabe, Frame};

use crate::connection::AuthZustand;
use crate::error::SignalingResult;
use crate::handlers::BAD_REQUEST;
use crate::reactor::Reactor;
use crate::registry::BindeFehler;
use crate::server_state::SignalingState;

/// Verarbeitet eine Presence-Anfrage
///
/// Stellt bei Erfolg eine Challenge aus und versetzt die Verbindung in den
/// Zustand `HerausforderungGesendet`.
pub fn handle_presence<R: Reactor, S: UserStore>(
    state: &mut SignalingState<R, S>,
    id: ConnectionId,
    benutzer: Benutzerangabe,
) -> SignalingResult<()> {
    match state.verbindungen.get(id).map(|v| &v.zustand) {
        None => return Ok(()),
        Some(AuthZustand::Unauthentifiziert) => {}
        Some(_) => {
            state.fehler_antworten(id, BAD_REQUEST);
            return Ok(());
        }
    }

    let name = benutzer.account_name;

    if state.registry.lock().ist_vergeben(&name) {
        tracing::warn!(verbindung = %id, user = %name, "Name bereits angemeldet");
        state.ablehnen(id, AuthError::BenutzernameVergeben(name).antworttext());
        return Ok(());
    }

    if !state.store.check_user(&name)? {
        tracing::warn!(verbindung = %id, user = %name, "Unbekannter Benutzer");
        state.ablehnen(id, AuthError::BenutzerUnbekannt(name).antworttext());
        return Ok(());
    }

    let secret = state.store.get_password_secret(&name)?;
    let challenge = PendingChallenge::ausstellen(name, secret, benutzer.pubkey);
    let nonce = challenge.nonce.clone();

    tracing::debug!(verbindung = %id, user = %challenge.name, "Challenge ausgestellt");
    if let Some(v) = state.verbindungen.get_mut(id) {
        v.zustand = AuthZustand::HerausforderungGesendet(challenge);
    }
    state.antworten(id, Antwort::authentifizierung(nonce));
    Ok(())
}

/// Verarbeitet den Frame, der auf eine ausgestellte Challenge folgt
///
/// Die Challenge wird in jedem Fall verbraucht.
pub fn handle_challenge_antwort<R: Reactor, S: UserStore>(
    state: &mut SignalingState<R, S>,
    id: ConnectionId,
    frame: Option<Frame>,
) -> SignalingResult<()> {
    let Some(v) = state.verbindungen.get_mut(id) else {
        return Ok(());
    };
    let peer = v.peer;
    let challenge = match std::mem::replace(&mut v.zustand, AuthZustand::Unauthentifiziert) {
        AuthZustand::HerausforderungGesendet(challenge) => challenge,
        anderer => {
            v.zustand = anderer;
            return Ok(());
        }
    };

    let digest = match frame {
        Some(Frame::Antwort(Antwort {
            response: Antwortcode::Authentifizierung,
            data: Some(digest),
            ..
        })) => digest,
        _ => {
            tracing::warn!(verbindung = %id, user = %challenge.name, "Keine gueltige Challenge-Antwort");
            state.ablehnen(id, AuthError::FalschesPasswort.antworttext());
            return Ok(());
        }
    };

    let name = challenge.name.clone();
    let eingeloest = match challenge.einloesen(&digest) {
        Ok(eingeloest) => eingeloest,
        Err(e) => {
            tracing::warn!(verbindung = %id, user = %name, fehler = %e, "Anmeldung abgelehnt");
            state.ablehnen(id, e.antworttext());
            return Ok(());
        }
    };

    // Zwischen Challenge und Antwort kann eine andere Verbindung den Namen gebunden haben
    let gebunden = state.registry.lock().binden(&name, id);
    match gebunden {
        Ok(()) => {}
        Err(BindeFehler::NameVergeben(besitzer)) => {
            tracing::warn!(verbindung = %id, besitzer = %besitzer, user = %name, "Name inzwischen vergeben");
            state.ablehnen(id, AuthError::BenutzernameVergeben(name).antworttext());
            return Ok(());
        }
        Err(BindeFehler::VerbindungGebunden) => {
            state.ablehnen(id, BAD_REQUEST);
            return Ok(());
        }
    }

    if let Some(v) = state.verbindungen.get_mut(id) {
        v.zustand = AuthZustand::Authentifiziert(name.clone());
    }
    tracing::info!(verbindung = %id, peer = %peer, user = %name, "Benutzer angemeldet");

    if !state.antworten(id, Antwort::ok()) {
        return Ok(());
    }

    if let Err(e) = state
        .store
        .login(&name, peer.ip(), peer.port(), eingeloest.pubkey.as_deref())
    {
        tracing::warn!(user = %name, fehler = %e, "Login konnte nicht vermerkt werden");
    }
    Ok(())
}

/// Verarbeitet ein Exit; die Sitzung ist bereits geprueft
pub fn handle_exit<R: Reactor, S: UserStore>(state: &mut SignalingState<R, S>, id: ConnectionId) {
    state.abbauen(id, "Exit");
}

/// Baut Verbindungen ab, deren Challenge nicht rechtzeitig beantwortet wurde
pub fn abgelaufene_challenges<R: Reactor, S: UserStore>(
    state: &mut SignalingState<R, S>,
    jetzt: Instant,
) {
    let timeout = state.config.challenge_timeout;
    for id in state
        .verbindungen
        .ids_wo(|v| v.challenge_abgelaufen(timeout, jetzt))
    {
        tracing::info!(verbindung = %id, "Challenge abgelaufen");
        state.ablehnen(id, AuthError::ChallengeAbgelaufen.antworttext());
    }
}
