//! plauder-protocol – Netzwerkprotokoll-Definitionen
//!
//! Dieses Crate definiert die Frames, die zwischen Client und Server
//! ausgetauscht werden, sowie den laengenpraefixierten JSON-Codec.

pub mod error;
pub mod frame;
pub mod wire;

pub use error::{FrameError, FrameResult};
pub use frame::{Aktion, Antwort, Antwortcode, Benutzerangabe, Frame};
pub use wire::{EmpfangenerFrame, FrameCodec};
