//! Display id reconciliation.
//!
//! The host shows the in-flight answer under a local id until the backend
//! assigns `message.id`. From the first frame that carries it, the host entry
//! is renamed and every later callback of the turn uses the canonical id.

use chatkit_core::document::Document;

/// The id the host should switch to, if the document names a different one.
pub fn reconcile(document: &Document, display_id: &str) -> Option<String> {
    document
        .message_id()
        .filter(|id| !id.is_empty() && *id != display_id)
        .map(str::to_string)
}
