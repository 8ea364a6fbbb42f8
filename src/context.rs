use std::any::type_name;
use std::sync::Arc;

use futures::FutureExt;

use crate::actor::Actor;
use crate::actor::ActorRef;
use crate::actor::ActorShared;
use crate::actor::CURRENT_ACTOR;
use crate::actor::ErasedActor;
use crate::error::ActorError;
use crate::ident::TaskIdent;
use crate::signal::Signal;
use crate::signal::SignalMessage;

/// Operations available to bootstrap code passed to [`run`](crate::run).
#[derive(Clone, Copy, Debug)]
pub struct StartContext(());

/// Operations available inside a behavior.
///
/// One stateless instance serves every actor; operations that depend on the
/// caller consult the task-local current-actor binding.
#[derive(Clone, Copy, Debug)]
pub struct Context(());

/// Operations available inside a signal handler.
#[derive(Clone, Copy, Debug)]
pub struct HandlerContext(());

fn current_actor() -> Result<ActorRef, ActorError> {
	CURRENT_ACTOR
		.try_with(|actor| actor.clone())
		.map_err(|_| ActorError::NoCurrentActor)
}

fn post_to<B, F>(actor: &Actor<B>, message: F)
where
	B: Send + 'static,
	F: FnOnce(&mut B) -> anyhow::Result<()> + Send + 'static,
{
	actor.post(Box::new(message));
}

impl StartContext {
	pub(crate) fn new() -> Self {
		StartContext(())
	}

	/// Appends a message to `actor`'s mailbox. Never blocks; messages to a
	/// terminated actor are discarded.
	pub fn post_to<B, F>(&self, actor: &Actor<B>, message: F)
	where
		B: Send + 'static,
		F: FnOnce(&mut B) -> anyhow::Result<()> + Send + 'static,
	{
		post_to(actor, message);
	}
}

impl Context {
	pub(crate) fn new() -> Self {
		Context(())
	}

	/// Appends a message to `actor`'s mailbox. Never blocks; messages to a
	/// terminated actor are discarded.
	pub fn post_to<B, F>(&self, actor: &Actor<B>, message: F)
	where
		B: Send + 'static,
		F: FnOnce(&mut B) -> anyhow::Result<()> + Send + 'static,
	{
		post_to(actor, message);
	}

	/// Returns the current actor, checked against the behavior type `B`.
	pub fn current_actor<B: Send + 'static>(&self) -> Result<Actor<B>, ActorError> {
		let current = current_actor()?;
		let name = current.name().to_string();
		match current.shared.downcast_arc::<ActorShared<B>>() {
			Ok(shared) => Ok(Actor::from_shared(shared)),
			Err(_) => Err(ActorError::BehaviorMismatch {
				actor: name,
				requested: type_name::<B>(),
			}),
		}
	}

	/// Hands back the failure that aborts the current message:
	///
	/// ```ignore
	/// return Err(context.panic(cause));
	/// ```
	pub fn panic(&self, cause: impl Into<anyhow::Error>) -> anyhow::Error {
		cause.into()
	}

	/// Starts `child` as a child of the current actor.
	///
	/// The child must have been created inside the current actor's behavior
	/// and must have a behavior of its own. The parent gains a signal
	/// handler that shuts the child down when the parent terminates, so
	/// children are shut down in spawn order.
	pub fn spawn<C: Send + 'static>(&self, child: &Actor<C>) -> Result<(), ActorError> {
		let current = current_actor()?;
		if !child.shared.owner().matches(&TaskIdent::current()) {
			return Err(ActorError::NotOwner(child.name().to_string()));
		}
		if !child.shared.has_behavior() {
			return Err(ActorError::BehaviorMissing(child.name().to_string()));
		}
		let target = ActorRef::from(child);
		current
			.shared
			.push_handler(Arc::new(move |_signal: &Signal, context: HandlerContext| {
				let target = target.clone();
				async move {
					context.signal_ref(&target, Signal::Shutdown).await?;
					anyhow::Ok(())
				}
				.boxed()
			}));
		child.shared.clone().start()?;
		Ok(())
	}

	/// Posts a shutdown signal to the current actor's own mailbox and
	/// returns immediately; queued messages ahead of it are still processed.
	pub fn shutdown(&self) -> Result<(), ActorError> {
		let current = current_actor()?;
		current
			.shared
			.push_signal(SignalMessage::detached(Signal::Shutdown));
		Ok(())
	}
}

impl HandlerContext {
	pub(crate) fn new() -> Self {
		HandlerContext(())
	}

	/// Appends a message to `actor`'s mailbox. Never blocks; messages to a
	/// terminated actor are discarded.
	pub fn post_to<B, F>(&self, actor: &Actor<B>, message: F)
	where
		B: Send + 'static,
		F: FnOnce(&mut B) -> anyhow::Result<()> + Send + 'static,
	{
		post_to(actor, message);
	}

	/// Asks the mailbox loop to discard pending messages and rebuild the
	/// behavior from its factory instead of terminating. The remainder of
	/// the handler chain is skipped.
	pub fn restart(&self) -> Result<(), ActorError> {
		current_actor()?.shared.request_restart();
		Ok(())
	}

	/// Sends `signal` to `actor` and waits until its signal handlers have
	/// finished running.
	///
	/// Fails when no current actor is bound or when `actor` is the current
	/// actor itself.
	pub async fn signal<B: Send + 'static>(
		&self,
		actor: &Actor<B>,
		signal: Signal,
	) -> Result<(), ActorError> {
		self.signal_ref(&ActorRef::from(actor), signal).await
	}

	pub(crate) async fn signal_ref(
		&self,
		actor: &ActorRef,
		signal: Signal,
	) -> Result<(), ActorError> {
		let current = current_actor()?;
		if current.same_actor(actor) {
			return Err(ActorError::SelfSignal);
		}
		let (message, done) = SignalMessage::synchronous(signal);
		if actor.shared.push_signal(message) {
			// a dropped sender means the target terminated before handling
			// the signal, so there is nothing left to wait for
			let _ = done.await;
		}
		Ok(())
	}
}
