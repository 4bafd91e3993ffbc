//! Event sink for session progress.

use fprint_protocol::SessionEvent;
use tokio::sync::mpsc;
use tracing::debug;

/// Destination for [`SessionEvent`]s.
///
/// Sending never blocks and never fails the session: events emitted after
/// the receiver is gone are dropped.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
	tx: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl EventSink {
	/// Creates a sink and the receiver that observes it.
	pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
		let (tx, rx) = mpsc::unbounded_channel();
		(Self { tx: Some(tx) }, rx)
	}

	/// A sink that only logs.
	pub fn discard() -> Self {
		Self::default()
	}

	pub fn emit(&self, event: SessionEvent) {
		debug!(target = "fprint.session", device = %event.device(), ?event, "session event");
		if let Some(tx) = &self.tx {
			let _ = tx.send(event);
		}
	}
}
