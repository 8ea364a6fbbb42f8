use crate::error::TaskError;

/// Tagged outcome of an asynchronous computation.
#[derive(Clone, Debug)]
pub enum TaskResult<R, E> {
	Success(R),
	Failed {
		error: E,
		/// Secondary failures folded into this one by [`merge`](TaskResult::merge).
		suppressed: Vec<E>,
	},
	Cancelled,
}

impl<R, E> TaskResult<R, E> {
	pub(crate) fn failed(error: E) -> Self {
		TaskResult::Failed {
			error,
			suppressed: Vec::new(),
		}
	}

	pub fn is_success(&self) -> bool {
		matches!(self, TaskResult::Success(_))
	}

	pub fn is_failed(&self) -> bool {
		matches!(self, TaskResult::Failed { .. })
	}

	pub fn is_cancelled(&self) -> bool {
		matches!(self, TaskResult::Cancelled)
	}

	/// The value, or the failure or cancellation as a [`TaskError`].
	pub fn get_now(self) -> Result<R, TaskError<E>> {
		match self {
			TaskResult::Success(value) => Ok(value),
			TaskResult::Failed { error, .. } => Err(TaskError::Failed(error)),
			TaskResult::Cancelled => Err(TaskError::Cancelled),
		}
	}

	/// Keeps a success, drops a failure or a cancellation.
	pub fn keep_only_success(self) -> Option<R> {
		match self {
			TaskResult::Success(value) => Some(value),
			TaskResult::Failed { .. } | TaskResult::Cancelled => None,
		}
	}

	/// Merges two outcomes when folding a set of them into one.
	///
	/// Two successes combine through `combine`; a success wins over anything
	/// else; a failure wins over a cancellation; two failures keep the first
	/// with the second recorded as suppressed.
	pub fn merge(self, other: Self, combine: impl FnOnce(R, R) -> R) -> Self {
		match (self, other) {
			(TaskResult::Cancelled, other) => other,
			(this, TaskResult::Cancelled) => this,
			(TaskResult::Success(a), TaskResult::Success(b)) => TaskResult::Success(combine(a, b)),
			(success @ TaskResult::Success(_), TaskResult::Failed { .. }) => success,
			(TaskResult::Failed { .. }, success @ TaskResult::Success(_)) => success,
			(
				TaskResult::Failed {
					error,
					mut suppressed,
				},
				TaskResult::Failed {
					error: second,
					suppressed: rest,
				},
			) => {
				suppressed.push(second);
				suppressed.extend(rest);
				TaskResult::Failed { error, suppressed }
			}
		}
	}
}
