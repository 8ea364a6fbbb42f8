use std::any::Any;

use thiserror::Error;

/// Usage errors of the actor engine.
///
/// These surface immediately to the caller and are never caught by the
/// runtime itself.
#[derive(Error, Debug)]
pub enum ActorError {
	#[error("no current actor")]
	NoCurrentActor,

	#[error("{0} is not created by the current task")]
	NotOwner(String),

	#[error("{0} is already running or shut down")]
	NotCreated(String),

	#[error("{0} behavior is not defined")]
	BehaviorMissing(String),

	#[error("{0} behavior can only be set once")]
	BehaviorAlreadySet(String),

	#[error("{actor} does not allow behavior {requested}")]
	BehaviorMismatch {
		actor: String,
		requested: &'static str,
	},

	#[error("an actor can not signal itself")]
	SelfSignal,
}

/// Usage errors of an [`AsyncScope`](crate::AsyncScope).
#[derive(Error, Debug)]
pub enum ScopeError {
	#[error("scope is owned by another task")]
	WrongThread,

	#[error("no task completed successfully")]
	NoSuccess,
}

/// Failure of an [`AsyncTask`](crate::AsyncTask) accessor.
#[derive(Error, Debug)]
pub enum TaskError<E> {
	#[error("task failed")]
	Failed(E),

	#[error("task was cancelled")]
	Cancelled,

	#[error("task did not complete in time")]
	Timeout,
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> &str {
	if let Some(message) = panic.downcast_ref::<&str>() {
		message
	} else if let Some(message) = panic.downcast_ref::<String>() {
		message
	} else {
		"non-string panic payload"
	}
}
