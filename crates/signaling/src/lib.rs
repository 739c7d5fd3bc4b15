//! plauder-signaling – Verbindungs-Multiplexer des Chat-Servers
//!
//! Dieser Crate verwaltet alle Client-Verbindungen in einer einzigen
//! Steuerschleife: Readiness-Polling, Challenge-Response-Anmeldung,
//! Session-Registry und Weiterleitung von Punkt-zu-Punkt-Nachrichten.
//!
//! ## Architektur
//!
//! ```text
//! Reactor (MioReactor | FakeReactor)
//!     |  neu / lesbar / fehler
//!     v
//! ControlLoop (ein Thread)
//!     |  FrameCodec -> Frame
//!     v
//! Dispatcher
//!     |
//!     +-- AuthHandler     (Presence, Challenge-Antwort, Exit)
//!     +-- MessageHandler  (Weiterleitung)
//!     +-- ContactHandler  (Kontakte, Benutzer, Schluessel)
//!
//! SessionRegistry – Name <-> Verbindung, geteilt mit ServerHandle
//! Lifecycle       – einziger Weg zum Abbau einer Verbindung
//! ```

pub mod connection;
pub mod control_loop;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod reactor;
pub mod registry;
pub mod server_state;

// Bequeme Re-Exporte
pub use connection::{AuthZustand, ConnectionSet, Verbindung};
pub use control_loop::{ControlLoop, ServerHandle, SteuerBefehl};
pub use error::{SignalingError, SignalingResult};
pub use reactor::{Bereitschaft, FakeNetz, FakeReactor, Lesestatus, MioReactor, Reactor};
pub use registry::{GeteilteRegistry, SessionRegistry};
pub use server_state::{SignalingConfig, SignalingState};
