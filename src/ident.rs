use std::thread::ThreadId;

use tokio::task;

/// Identity of the code path that constructed a gated object.
///
/// Tokio tasks migrate between worker threads, so the gate compares task ids
/// when both sides have one and falls back to thread ids for code running
/// outside any task (plain `block_on` bootstrap).
#[derive(Clone, Copy, Debug)]
pub(crate) struct TaskIdent {
	thread: ThreadId,
	task: Option<task::Id>,
}

impl TaskIdent {
	pub fn current() -> Self {
		TaskIdent {
			thread: std::thread::current().id(),
			task: task::try_id(),
		}
	}

	pub fn matches(&self, other: &TaskIdent) -> bool {
		match (self.task, other.task) {
			(Some(a), Some(b)) => a == b,
			(None, None) => self.thread == other.thread,
			_ => false,
		}
	}
}
