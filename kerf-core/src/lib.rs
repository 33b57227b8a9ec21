//! # kerf-core
//!
//! Document core of the Kerf text subsystem: text entities with styled
//! runs, a single caret/selection, dirty tracking, and the binary command
//! surface the host drives the store through.
//!
//! ## Architecture
//!
//! ```text
//! host command buffer ──▸ command::apply_commands ──▸ TextStore
//!                                                       │ dirty ids
//!                                                       ▼
//!                                          layout engine (kerf-layout)
//! ```
//!
//! - **`store`** — entities, content, caret/selection, dirty set.
//! - **`runs`** — style runs and the insert/delete adjustment algebra.
//! - **`command`** — little-endian opcode decoder (0x20–0x25).
//! - **`event`** — engine events drained by the host per frame.
//! - **`utf8`** — byte-offset boundary helpers and a tolerant decoder.

pub mod command;
pub mod event;
pub mod runs;
pub mod store;
pub mod utf8;

// Re-exports for ergonomic use.
pub use command::{apply_commands, CommandError};
pub use event::EngineEvent;
pub use runs::{StyleFlags, StyleRun};
pub use store::{
    BoxMode, CaretState, LayoutBounds, TextAlign, TextEntity, TextHeader, TextId, TextStore,
};
