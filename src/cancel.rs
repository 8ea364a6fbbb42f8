use std::sync::Arc;

use tokio::sync::watch;

/// A shared cancellation flag.
///
/// Used for actor interruption and for shutting an async scope down. Firing
/// is sticky until [`reset`](CancelToken::reset).
#[derive(Clone, Debug)]
pub(crate) struct CancelToken {
	state: Arc<watch::Sender<bool>>,
}

impl CancelToken {
	pub fn new() -> Self {
		CancelToken {
			state: Arc::new(watch::Sender::new(false)),
		}
	}

	pub fn cancel(&self) {
		self.state.send_replace(true);
	}

	pub fn reset(&self) {
		self.state.send_replace(false);
	}

	pub fn is_cancelled(&self) -> bool {
		*self.state.borrow()
	}

	pub async fn cancelled(&self) {
		let mut recv = self.state.subscribe();
		if recv.wait_for(|cancelled| *cancelled).await.is_err() {
			// a closed channel must not look like a cancellation
			std::future::pending::<()>().await;
		}
	}
}
