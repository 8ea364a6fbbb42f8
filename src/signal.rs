use futures::future::BoxFuture;
use tokio::sync::oneshot;

use crate::context::HandlerContext;

/// A termination event delivered to an actor's signal handlers.
#[derive(Debug)]
pub enum Signal {
	/// Requested termination.
	Shutdown,
	/// Termination caused by a failed message, a panic, or an interruption
	/// of the actor task.
	Panic(anyhow::Error),
}

/// Code invoked when an actor terminates.
///
/// Handlers run on the terminating actor's task, in registration order. An
/// `Err` is logged and suppressed so that one failing handler cannot block
/// the rest of the chain.
///
/// The trait is implemented for every matching closure:
///
/// ```ignore
/// actor.on_signal(move |_signal: &Signal, context: HandlerContext| {
///     let child = child.clone();
///     async move { context.signal(&child, Signal::Shutdown).await?; Ok(()) }.boxed()
/// })?;
/// ```
pub trait SignalHandler: Send + Sync + 'static {
	fn handle(&self, signal: &Signal, context: HandlerContext) -> BoxFuture<'static, anyhow::Result<()>>;
}

impl<F> SignalHandler for F
where
	F: Fn(&Signal, HandlerContext) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync + 'static,
{
	fn handle(&self, signal: &Signal, context: HandlerContext) -> BoxFuture<'static, anyhow::Result<()>> {
		self(signal, context)
	}
}

/// Mailbox entry that terminates the loop. Carries the completion side of a
/// synchronous `signal` call.
pub(crate) struct SignalMessage {
	pub signal: Signal,
	done: Option<oneshot::Sender<()>>,
}

impl SignalMessage {
	/// Fire-and-forget form used by [`Context::shutdown`](crate::Context::shutdown).
	pub fn detached(signal: Signal) -> Self {
		SignalMessage { signal, done: None }
	}

	/// Synchronous form used by [`HandlerContext::signal`](crate::HandlerContext::signal);
	/// the paired receiver resolves once the target's handlers have run.
	pub fn synchronous(signal: Signal) -> (Self, oneshot::Receiver<()>) {
		let (tx, rx) = oneshot::channel();
		(
			SignalMessage {
				signal,
				done: Some(tx),
			},
			rx,
		)
	}

	pub fn done(&mut self) {
		if let Some(done) = self.done.take() {
			let _ = done.send(());
		}
	}
}
