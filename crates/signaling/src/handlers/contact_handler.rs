//! Kontakt-Handler – Kontaktliste, Benutzerliste, oeffentliche Schluessel

use plauder_core::ConnectionId;
use plauder_db::UserStore;
use plauder_protocol::Antwort;

use crate::error::SignalingResult;
use crate::handlers::PUBLIC_KEY_MISSING;
use crate::reactor::Reactor;
use crate::server_state::SignalingState;

/// `get_contacts` -> 202 mit Kontaktliste
pub fn handle_get_contacts<R: Reactor, S: UserStore>(
    state: &mut SignalingState<R, S>,
    id: ConnectionId,
    user: &str,
) -> SignalingResult<()> {
    let kontakte = state.store.get_contacts(user)?;
    state.antworten(id, Antwort::liste(kontakte));
    Ok(())
}

/// `add` -> 200
pub fn handle_add_contact<R: Reactor, S: UserStore>(
    state: &mut SignalingState<R, S>,
    id: ConnectionId,
    user: &str,
    kontakt: &str,
) -> SignalingResult<()> {
    state.store.add_contact(user, kontakt)?;
    tracing::debug!(user = %user, kontakt = %kontakt, "Kontakt hinzugefuegt");
    state.antworten(id, Antwort::ok());
    Ok(())
}

/// `remove` -> 200
pub fn handle_remove_contact<R: Reactor, S: UserStore>(
    state: &mut SignalingState<R, S>,
    id: ConnectionId,
    user: &str,
    kontakt: &str,
) -> SignalingResult<()> {
    state.store.remove_contact(user, kontakt)?;
    tracing::debug!(user = %user, kontakt = %kontakt, "Kontakt entfernt");
    state.antworten(id, Antwort::ok());
    Ok(())
}

/// `get_users` -> 202 mit allen bekannten Benutzern
pub fn handle_users<R: Reactor, S: UserStore>(
    state: &mut SignalingState<R, S>,
    id: ConnectionId,
) -> SignalingResult<()> {
    let benutzer = state.store.list_users()?;
    state.antworten(id, Antwort::liste(benutzer));
    Ok(())
}

/// `public_key` -> 511 mit Schluessel oder 400
pub fn handle_public_key<R: Reactor, S: UserStore>(
    state: &mut SignalingState<R, S>,
    id: ConnectionId,
    account_name: &str,
) -> SignalingResult<()> {
    match state.store.get_public_key(account_name)? {
        Some(schluessel) => {
            state.antworten(id, Antwort::authentifizierung(schluessel));
        }
        None => {
            state.fehler_antworten(id, PUBLIC_KEY_MISSING);
        }
    }
    Ok(())
}
