//! Engine events surfaced to the host after command application.

use crate::store::TextId;

/// Events the host drains once per frame (or per command batch).
///
/// `HistoryChanged` is reserved for the host's undo integration; the core
/// never emits it itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    DocChanged,
    EntityCreated(TextId),
    EntityChanged(TextId),
    EntityDeleted(TextId),
    SelectionChanged(TextId),
    HistoryChanged,
}
