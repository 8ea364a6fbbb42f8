use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::cancel::CancelToken;
use crate::error::ScopeError;
use crate::error::panic_message;
use crate::ident::TaskIdent;
use crate::outcome::TaskResult;
use crate::stream::ResultStream;
use crate::task::AsyncTask;

/// A bounded group of concurrent computations.
///
/// Computations forked into the scope finish inside it: dropping the scope
/// (or calling [`close`](AsyncScope::close)) cancels whatever is still in
/// flight. Outcomes are observed through the returned [`AsyncTask`] handles
/// after [`await_all`](AsyncScope::await_all), or through the
/// completion-ordered stream of [`await_results`](AsyncScope::await_results).
///
/// Most operations are restricted to the task that created the scope and
/// fail with [`ScopeError::WrongThread`] elsewhere.
pub struct AsyncScope<R, E> {
	owner: TaskIdent,
	token: CancelToken,
	tasks: JoinSet<()>,
	forked: Vec<AsyncTask<R, E>>,
	completions_tx: mpsc::UnboundedSender<AsyncTask<R, E>>,
	completions: Option<mpsc::UnboundedReceiver<AsyncTask<R, E>>>,
	outstanding: usize,
	closed: bool,
}

impl<R, E> AsyncScope<R, E> {
	/// Creates a scope owned by the current task.
	pub fn new() -> Self {
		let (completions_tx, completions) = mpsc::unbounded_channel();
		AsyncScope {
			owner: TaskIdent::current(),
			token: CancelToken::new(),
			tasks: JoinSet::new(),
			forked: Vec::new(),
			completions_tx,
			completions: Some(completions),
			outstanding: 0,
			closed: false,
		}
	}

	fn check_owner(&self) -> Result<(), ScopeError> {
		if self.owner.matches(&TaskIdent::current()) {
			Ok(())
		} else {
			Err(ScopeError::WrongThread)
		}
	}

	fn make_stream(&mut self) -> ResultStream<R, E> {
		let completions = match self.completions.take() {
			Some(completions) => completions,
			// results were consumed already; mirror the drained queue
			None => mpsc::unbounded_channel().1,
		};
		let remaining = std::mem::take(&mut self.outstanding);
		ResultStream::new(self.owner, completions, remaining)
	}

	/// Shuts the scope down: cancels the in-flight computations and resolves
	/// their handles as cancelled. Idempotent; also run on drop.
	pub fn close(&mut self) {
		if self.closed {
			return;
		}
		self.closed = true;
		self.token.cancel();
		self.tasks.abort_all();
		for task in &self.forked {
			task.complete(TaskResult::Cancelled);
		}
	}
}

impl<R, E> AsyncScope<R, E>
where
	R: Send + Sync + 'static,
	E: Send + Sync + 'static,
{
	/// Forks a computation into the scope.
	///
	/// The returned handle resolves to `Success` or `Failed` when the
	/// computation finishes, or to `Cancelled` when the scope shuts down
	/// first.
	///
	/// # Panics
	///
	/// Panics if the scope has already been shut down.
	pub fn fork<F>(&mut self, computation: F) -> AsyncTask<R, E>
	where
		F: Future<Output = Result<R, E>> + Send + 'static,
	{
		assert!(!self.closed, "scope is already shut down");
		let task = AsyncTask::new();
		let handle = task.clone();
		let token = self.token.clone();
		let completions = self.completions_tx.clone();
		self.tasks.spawn(async move {
			let outcome = tokio::select! {
				result = AssertUnwindSafe(computation).catch_unwind() => match result {
					Ok(Ok(value)) => TaskResult::Success(value),
					Ok(Err(error)) => TaskResult::failed(error),
					Err(panic) => {
						tracing::error!("computation panicked: {}", panic_message(&*panic));
						TaskResult::Cancelled
					}
				},
				_ = token.cancelled() => TaskResult::Cancelled,
			};
			handle.complete(outcome);
			let _ = completions.send(handle);
		});
		self.outstanding += 1;
		self.forked.push(task.clone());
		task
	}

	/// Waits until every forked computation has finished, then shuts the
	/// scope's task group down. Outcomes stay available on the handles.
	pub async fn await_all(&mut self) -> Result<(), ScopeError> {
		self.check_owner()?;
		while self.tasks.join_next().await.is_some() {}
		self.token.cancel();
		self.closed = true;
		Ok(())
	}

	/// Hands the completion-ordered stream of outcomes to `mapper`, then
	/// shuts the scope down and waits for stragglers.
	///
	/// The stream is finite: it ends after yielding one outcome per task
	/// forked so far.
	pub async fn await_results<V, F, Fut>(&mut self, mapper: F) -> Result<V, ScopeError>
	where
		R: Clone,
		E: Clone,
		F: FnOnce(ResultStream<R, E>) -> Fut,
		Fut: Future<Output = V>,
	{
		self.check_owner()?;
		let value = mapper(self.make_stream()).await;
		self.token.cancel();
		while self.tasks.join_next().await.is_some() {}
		self.closed = true;
		Ok(value)
	}

	/// Waits for the first successful computation, cancelling the rest.
	///
	/// Fails with [`ScopeError::NoSuccess`] when every computation failed or
	/// was cancelled.
	pub async fn await_first(&mut self) -> Result<R, ScopeError>
	where
		R: Clone,
		E: Clone,
	{
		self.check_owner()?;
		let mut stream = self.make_stream();
		let mut winner = None;
		while let Some(outcome) = stream.next().await {
			if let TaskResult::Success(value) = outcome {
				winner = Some(value);
				break;
			}
		}
		self.token.cancel();
		while self.tasks.join_next().await.is_some() {}
		self.closed = true;
		winner.ok_or(ScopeError::NoSuccess)
	}
}

impl<R, E> Drop for AsyncScope<R, E> {
	fn drop(&mut self) {
		self.close();
	}
}
