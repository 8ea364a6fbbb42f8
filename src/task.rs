use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::TaskError;
use crate::outcome::TaskResult;

/// Handle to one computation forked in an [`AsyncScope`](crate::AsyncScope).
///
/// The handle resolves exactly once, to a [`TaskResult`]; value-producing
/// accessors clone the stored outcome out. Individual tasks cannot be
/// cancelled, only the scope as a whole can.
pub struct AsyncTask<R, E> {
	cell: Arc<TaskCell<R, E>>,
}

struct TaskCell<R, E> {
	outcome: OnceLock<TaskResult<R, E>>,
	done: watch::Sender<bool>,
}

impl<R, E> Clone for AsyncTask<R, E> {
	fn clone(&self) -> Self {
		AsyncTask {
			cell: self.cell.clone(),
		}
	}
}

impl<R, E> AsyncTask<R, E> {
	pub(crate) fn new() -> Self {
		AsyncTask {
			cell: Arc::new(TaskCell {
				outcome: OnceLock::new(),
				done: watch::Sender::new(false),
			}),
		}
	}

	/// First resolution wins; later ones are ignored.
	pub(crate) fn complete(&self, outcome: TaskResult<R, E>) {
		if self.cell.outcome.set(outcome).is_ok() {
			self.cell.done.send_replace(true);
		}
	}

	/// True once the computation has resolved to any outcome.
	pub fn is_done(&self) -> bool {
		self.cell.outcome.get().is_some()
	}

	/// Consults the stored outcome, not any substrate state.
	pub fn is_cancelled(&self) -> bool {
		matches!(self.cell.outcome.get(), Some(TaskResult::Cancelled))
	}

	async fn wait(&self) {
		let mut done = self.cell.done.subscribe();
		// the sender lives in the cell this handle holds
		let _ = done.wait_for(|done| *done).await;
	}

	/// Cancellation of individual tasks is not supported; shut the scope
	/// down instead.
	///
	/// # Panics
	///
	/// Always.
	pub fn cancel(&self) {
		panic!("cancel is not supported, close the scope instead");
	}
}

impl<R, E> AsyncTask<R, E>
where
	R: Clone,
	E: Clone,
{
	/// Waits for completion and returns the value or the failure.
	pub async fn get(&self) -> Result<R, TaskError<E>> {
		self.wait().await;
		self.outcome_now()
	}

	/// [`get`](AsyncTask::get) bounded by `timeout`. A timeout does not
	/// cancel the computation.
	pub async fn get_timeout(&self, timeout: Duration) -> Result<R, TaskError<E>> {
		match tokio::time::timeout(timeout, self.wait()).await {
			Ok(()) => self.outcome_now(),
			Err(_) => Err(TaskError::Timeout),
		}
	}

	/// Snapshot of the outcome of a completed computation.
	///
	/// # Panics
	///
	/// Panics if the computation has not completed.
	pub fn result(&self) -> TaskResult<R, E> {
		match self.cell.outcome.get() {
			Some(outcome) => outcome.clone(),
			None => panic!("task has not completed"),
		}
	}

	/// Value or failure of a completed computation.
	///
	/// # Panics
	///
	/// Panics if the computation has not completed.
	pub fn get_now(&self) -> Result<R, TaskError<E>> {
		assert!(self.is_done(), "task has not completed");
		self.outcome_now()
	}

	fn outcome_now(&self) -> Result<R, TaskError<E>> {
		match self.cell.outcome.get() {
			Some(TaskResult::Success(value)) => Ok(value.clone()),
			Some(TaskResult::Failed { error, .. }) => Err(TaskError::Failed(error.clone())),
			Some(TaskResult::Cancelled) => Err(TaskError::Cancelled),
			None => unreachable!("outcome is resolved before the waiters wake"),
		}
	}
}
