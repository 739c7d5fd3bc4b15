//! Message-Handler – Punkt-zu-Punkt-Weiterleitung
//!
//! Ist der Empfaenger angemeldet, wird die Nachricht im Speicher gezaehlt und
//! byte-genau so weitergereicht, wie sie empfangen wurde. Zustellung ist
//! best effort: kein Puffern, kein erneuter Versuch.

use plauder_core::ConnectionId;
use plauder_db::UserStore;
use plauder_protocol::{Aktion, Antwort};

use crate::error::{SignalingError, SignalingResult};
use crate::handlers::USER_NOT_REGISTERED;
use crate::reactor::Reactor;
use crate::server_state::SignalingState;

/// Leitet eine Nachricht weiter; der Absender ist bereits geprueft
///
/// `nutzlast` ist die empfangene JSON-Nutzlast von `nachricht`.
pub fn handle_message<R: Reactor, S: UserStore>(
    state: &mut SignalingState<R, S>,
    id: ConnectionId,
    nachricht: Aktion,
    nutzlast: &[u8],
) -> SignalingResult<()> {
    let Aktion::Message { from: von, to: an, .. } = nachricht else {
        return Err(SignalingError::protokoll("keine Nachricht"));
    };

    let Some(ziel) = state.verbindung_von(&an) else {
        tracing::debug!(von = %von, an = %an, "Empfaenger nicht angemeldet");
        state.fehler_antworten(id, USER_NOT_REGISTERED);
        return Ok(());
    };

    // Gezaehlt wird nur, was an einen angemeldeten Empfaenger geht
    state.store.record_message(&von, &an)?;

    match state.senden_roh(ziel, nutzlast) {
        Ok(()) => {
            tracing::debug!(von = %von, an = %an, "Nachricht weitergeleitet");
            state.antworten(id, Antwort::ok());
        }
        Err(e) => {
            tracing::warn!(von = %von, an = %an, fehler = %e, "Weiterleitung fehlgeschlagen");
            state.abbauen(ziel, "Weiterleitung fehlgeschlagen");
            // Absender an sich selbst: Verbindung ist dann bereits weg
            if ziel != id {
                state.fehler_antworten(id, USER_NOT_REGISTERED);
            }
        }
    }
    Ok(())
}
