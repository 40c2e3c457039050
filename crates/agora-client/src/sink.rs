//! Where surfaced content goes while a run is streaming.

use agora_core::types::Metadata;

use crate::event::StreamEvent;

/// Receives content as soon as the reconciler surfaces it.
///
/// Calls happen inline in the stream pull loop and must not block.
pub trait StreamSink: Send {
    /// A token fragment, to be shown without a line break.
    fn on_token(&mut self, fragment: &str);

    /// A complete message text (from an update or a result container).
    fn on_message(&mut self, text: &str);

    /// Metadata carrying the backend marker was captured.
    fn on_metadata(&mut self, _metadata: &Metadata) {}

    /// Every raw event, before any rule runs.
    fn on_event(&mut self, _event: &StreamEvent) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StreamSink for NullSink {
    fn on_token(&mut self, _fragment: &str) {}
    fn on_message(&mut self, _text: &str) {}
}
