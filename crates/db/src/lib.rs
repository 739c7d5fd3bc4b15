//! plauder-db – Benutzer- und Kontaktspeicher
//!
//! Der Chat-Kern spricht den Speicher nur ueber das schmale
//! [`UserStore`]-Trait an. Mitgeliefert wird eine In-Memory-Implementierung,
//! deren Bestand optional als JSON-Snapshot auf die Platte geschrieben und
//! beim Start wieder geladen wird.

pub mod error;
pub mod memory;
pub mod models;
pub mod repository;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryUserStore;
pub use models::{AktiverBenutzer, BenutzerRecord, LoginEintrag, Nachrichtenzaehler};
pub use repository::UserStore;
