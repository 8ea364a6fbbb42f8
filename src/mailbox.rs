use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::signal::SignalMessage;

/// A unit of work applied to a behavior.
///
/// The `Err` arm carries the failure that aborts the current message and
/// terminates the actor.
pub type Message<B> = Box<dyn FnOnce(&mut B) -> anyhow::Result<()> + Send + 'static>;

/// Element of an actor's queue: a user message or a signal.
pub(crate) enum Post<B> {
	User(Message<B>),
	Signal(SignalMessage),
}

/// Unbounded FIFO owned by one actor. Any task may post; only the actor's
/// own task takes.
pub(crate) struct Mailbox<B> {
	tx: mpsc::UnboundedSender<Post<B>>,
	rx: Mutex<Option<mpsc::UnboundedReceiver<Post<B>>>>,
}

impl<B> Mailbox<B> {
	pub fn new() -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		Mailbox {
			tx,
			rx: Mutex::new(Some(rx)),
		}
	}

	/// Never blocks. Returns false when the consuming task has exited and
	/// the message was discarded.
	pub fn post(&self, post: Post<B>) -> bool {
		self.tx.send(post).is_ok()
	}

	/// Hands the receiving end to the actor task. Yields `None` on any call
	/// after the first.
	pub fn take_receiver(&self) -> Option<MailboxReceiver<B>> {
		self.rx.lock().take().map(|rx| MailboxReceiver { rx })
	}
}

pub(crate) struct MailboxReceiver<B> {
	rx: mpsc::UnboundedReceiver<Post<B>>,
}

impl<B> MailboxReceiver<B> {
	pub async fn take(&mut self) -> Post<B> {
		match self.rx.recv().await {
			Some(post) => post,
			// the owning actor keeps a sender alive for its whole lifetime
			None => unreachable!("mailbox closed while the actor is running"),
		}
	}

	/// Discards everything queued so far. Restart path only.
	pub fn clear(&mut self) {
		while self.rx.try_recv().is_ok() {}
	}
}
