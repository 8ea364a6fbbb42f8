use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use futures::Stream;
use tokio::sync::mpsc;

use crate::ident::TaskIdent;
use crate::outcome::TaskResult;
use crate::task::AsyncTask;

/// Finite sequence of task outcomes in completion order.
///
/// Yields exactly as many elements as there were unconsumed tasks when the
/// stream was created, in the order the tasks finished. Consuming it
/// advances the scope's completion queue; the stream is not restartable.
pub struct ResultStream<R, E> {
	owner: TaskIdent,
	completions: mpsc::UnboundedReceiver<AsyncTask<R, E>>,
	remaining: usize,
}

impl<R, E> ResultStream<R, E> {
	pub(crate) fn new(
		owner: TaskIdent,
		completions: mpsc::UnboundedReceiver<AsyncTask<R, E>>,
		remaining: usize,
	) -> Self {
		ResultStream {
			owner,
			completions,
			remaining,
		}
	}

	fn check_owner(&self) {
		assert!(
			self.owner.matches(&TaskIdent::current()),
			"results consumed off the owning task"
		);
	}
}

impl<R, E> Stream for ResultStream<R, E>
where
	R: Clone,
	E: Clone,
{
	type Item = TaskResult<R, E>;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let this = self.get_mut();
		this.check_owner();
		if this.remaining == 0 {
			return Poll::Ready(None);
		}
		match this.completions.poll_recv(cx) {
			Poll::Ready(Some(task)) => {
				this.remaining -= 1;
				Poll::Ready(Some(task.result()))
			}
			// the scope holds the sending side for as long as it lives
			Poll::Ready(None) => Poll::Ready(None),
			Poll::Pending => Poll::Pending,
		}
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		self.check_owner();
		(self.remaining, Some(self.remaining))
	}
}
