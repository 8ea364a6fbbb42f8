use std::any::type_name;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;

use downcast_rs::DowncastSync;
use downcast_rs::impl_downcast;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::cancel::CancelToken;
use crate::context::Context;
use crate::context::HandlerContext;
use crate::context::StartContext;
use crate::error::ActorError;
use crate::error::panic_message;
use crate::ident::TaskIdent;
use crate::mailbox::Mailbox;
use crate::mailbox::MailboxReceiver;
use crate::mailbox::Message;
use crate::mailbox::Post;
use crate::signal::Signal;
use crate::signal::SignalHandler;
use crate::signal::SignalMessage;

static ACTOR_COUNTER: AtomicU64 = AtomicU64::new(1);

tokio::task_local! {
	pub(crate) static CURRENT_ACTOR: ActorRef;
}

/// State of an actor. Transitions are monotonic:
/// `Created → Running → Shutdown`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActorState {
	/// After construction, before start.
	Created,
	/// After being started by [`run`] or [`Context::spawn`].
	Running,
	/// After consuming a signal; terminal.
	Shutdown,
}

const CREATED: u8 = 0;
const RUNNING: u8 = 1;
const SHUTDOWN: u8 = 2;

/// Builds a fresh behavior instance; invoked on start and on every restart.
pub type BehaviorFactory<B> = Box<dyn Fn(Context) -> B + Send + Sync>;

pub(crate) struct ActorShared<B: Send + 'static> {
	name: String,
	owner: TaskIdent,
	state: AtomicU8,
	mailbox: Mailbox<B>,
	factory: OnceLock<BehaviorFactory<B>>,
	handlers: Mutex<Vec<Arc<dyn SignalHandler>>>,
	restart: AtomicBool,
	interrupt: CancelToken,
}

pub(crate) trait ErasedActor: DowncastSync {
	fn name(&self) -> &str;
	fn state(&self) -> ActorState;
	fn owner(&self) -> TaskIdent;
	fn has_behavior(&self) -> bool;
	fn push_signal(&self, message: SignalMessage) -> bool;
	fn push_handler(&self, handler: Arc<dyn SignalHandler>);
	fn request_restart(&self);
	fn start(self: Arc<Self>) -> Result<JoinHandle<()>, ActorError>;
}

impl_downcast!(sync ErasedActor);

impl<B: Send + 'static> ErasedActor for ActorShared<B> {
	fn name(&self) -> &str {
		&self.name
	}

	fn state(&self) -> ActorState {
		match self.state.load(Ordering::Acquire) {
			CREATED => ActorState::Created,
			RUNNING => ActorState::Running,
			_ => ActorState::Shutdown,
		}
	}

	fn owner(&self) -> TaskIdent {
		self.owner
	}

	fn has_behavior(&self) -> bool {
		self.factory.get().is_some()
	}

	fn push_signal(&self, message: SignalMessage) -> bool {
		self.mailbox.post(Post::Signal(message))
	}

	fn push_handler(&self, handler: Arc<dyn SignalHandler>) {
		self.handlers.lock().push(handler);
	}

	fn request_restart(&self) {
		self.restart.store(true, Ordering::Release);
	}

	fn start(self: Arc<Self>) -> Result<JoinHandle<()>, ActorError> {
		if self
			.state
			.compare_exchange(CREATED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
			.is_err()
		{
			return Err(ActorError::NotCreated(self.name.clone()));
		}
		// present until the first start, and the compare-exchange above
		// admits exactly one starter
		let receiver = self.mailbox.take_receiver().expect("first start");
		let current = ActorRef {
			shared: self.clone() as Arc<dyn ErasedActor>,
		};
		Ok(tokio::spawn(CURRENT_ACTOR.scope(
			current,
			mailbox_loop(self, receiver),
		)))
	}
}

/// Handle to an actor whose behavior implements `B`.
///
/// The handle is cheap to clone and share; configuration
/// ([`behavior`](Actor::behavior), [`on_signal`](Actor::on_signal)) is
/// restricted to the task that created the actor and to the time before it
/// starts.
pub struct Actor<B: Send + 'static> {
	pub(crate) shared: Arc<ActorShared<B>>,
}

impl<B: Send + 'static> Clone for Actor<B> {
	fn clone(&self) -> Self {
		Actor {
			shared: self.shared.clone(),
		}
	}
}

impl<B: Send + 'static> Actor<B> {
	/// Creates an actor named after the behavior type plus a process-wide
	/// counter.
	pub fn new() -> Self {
		let short = type_name::<B>().rsplit("::").next().unwrap_or("actor");
		Self::named(format!(
			"{}{}",
			short,
			ACTOR_COUNTER.fetch_add(1, Ordering::Relaxed)
		))
	}

	/// Creates an actor with an explicit name. The name is only used for
	/// diagnostics.
	pub fn named(name: impl Into<String>) -> Self {
		Actor {
			shared: Arc::new(ActorShared {
				name: name.into(),
				owner: TaskIdent::current(),
				state: AtomicU8::new(CREATED),
				mailbox: Mailbox::new(),
				factory: OnceLock::new(),
				handlers: Mutex::new(Vec::new()),
				restart: AtomicBool::new(false),
				interrupt: CancelToken::new(),
			}),
		}
	}

	pub fn name(&self) -> &str {
		&self.shared.name
	}

	pub fn state(&self) -> ActorState {
		ErasedActor::state(&*self.shared)
	}

	/// Sets the behavior factory.
	///
	/// Fails off the owning task, once the actor has started, or when the
	/// factory is already set.
	pub fn behavior<F>(&self, factory: F) -> Result<&Self, ActorError>
	where
		F: Fn(Context) -> B + Send + Sync + 'static,
	{
		self.check_owner()?;
		self.check_created()?;
		if self.shared.factory.set(Box::new(factory)).is_err() {
			return Err(ActorError::BehaviorAlreadySet(self.shared.name.clone()));
		}
		Ok(self)
	}

	/// Appends a signal handler, invoked in registration order when the
	/// actor terminates.
	///
	/// Fails off the owning task or once the actor has started.
	pub fn on_signal<H>(&self, handler: H) -> Result<&Self, ActorError>
	where
		H: SignalHandler,
	{
		self.check_owner()?;
		self.check_created()?;
		self.shared.handlers.lock().push(Arc::new(handler));
		Ok(self)
	}

	/// Interrupts the actor task. The mailbox loop reports the interruption
	/// to the signal handlers as [`Signal::Panic`] and terminates.
	pub fn interrupt(&self) {
		self.shared.interrupt.cancel();
	}

	/// Type-erased handle, as consumed by [`run`].
	pub fn to_ref(&self) -> ActorRef {
		ActorRef::from(self)
	}

	pub(crate) fn from_shared(shared: Arc<ActorShared<B>>) -> Self {
		Actor { shared }
	}

	pub(crate) fn post(&self, message: Message<B>) -> bool {
		self.shared.mailbox.post(Post::User(message))
	}

	fn check_owner(&self) -> Result<(), ActorError> {
		if self.shared.owner.matches(&TaskIdent::current()) {
			Ok(())
		} else {
			Err(ActorError::NotOwner(self.shared.name.clone()))
		}
	}

	fn check_created(&self) -> Result<(), ActorError> {
		if self.shared.state.load(Ordering::Acquire) == CREATED {
			Ok(())
		} else {
			Err(ActorError::NotCreated(self.shared.name.clone()))
		}
	}
}

impl<B: Send + 'static> fmt::Debug for Actor<B> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Actor({})", self.shared.name)
	}
}

impl<B: Send + 'static> fmt::Display for Actor<B> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Actor({})", self.shared.name)
	}
}

/// Type-erased actor handle.
///
/// Lets heterogeneous actors travel together into [`run`] and backs the
/// task-local current-actor binding.
#[derive(Clone)]
pub struct ActorRef {
	pub(crate) shared: Arc<dyn ErasedActor>,
}

impl ActorRef {
	pub fn name(&self) -> &str {
		self.shared.name()
	}

	pub fn state(&self) -> ActorState {
		self.shared.state()
	}

	pub(crate) fn same_actor(&self, other: &ActorRef) -> bool {
		std::ptr::addr_eq(Arc::as_ptr(&self.shared), Arc::as_ptr(&other.shared))
	}
}

impl<B: Send + 'static> From<&Actor<B>> for ActorRef {
	fn from(actor: &Actor<B>) -> ActorRef {
		ActorRef {
			shared: actor.shared.clone(),
		}
	}
}

impl fmt::Debug for ActorRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Actor({})", self.shared.name())
	}
}

/// Starts every actor in `actors`, lets `bootstrap` post the initial
/// messages, and waits until all of the started actors have terminated.
///
/// Every actor is validated (owning task, behavior present) before any of
/// them starts.
pub async fn run<I, F>(actors: I, bootstrap: F) -> Result<(), ActorError>
where
	I: IntoIterator<Item = ActorRef>,
	F: FnOnce(&StartContext),
{
	let actors: Vec<ActorRef> = actors.into_iter().collect();
	let caller = TaskIdent::current();
	for actor in &actors {
		if !actor.shared.owner().matches(&caller) {
			return Err(ActorError::NotOwner(actor.name().to_string()));
		}
		if !actor.shared.has_behavior() {
			return Err(ActorError::BehaviorMissing(actor.name().to_string()));
		}
	}

	let mut handles = Vec::with_capacity(actors.len());
	for actor in &actors {
		handles.push(actor.shared.clone().start()?);
	}

	bootstrap(&StartContext::new());

	for handle in handles {
		if let Err(error) = handle.await {
			tracing::error!("actor task failed: {error:?}");
		}
	}
	Ok(())
}

async fn mailbox_loop<B: Send + 'static>(
	shared: Arc<ActorShared<B>>,
	mut receiver: MailboxReceiver<B>,
) {
	let mut behavior = match fresh_behavior(&shared) {
		Ok(behavior) => behavior,
		Err(cause) => {
			tracing::error!("{} behavior factory failed: {cause:#}", shared.name);
			signal_now(&Signal::Panic(cause), &shared).await;
			return;
		}
	};

	loop {
		let post = tokio::select! {
			_ = shared.interrupt.cancelled() => None,
			post = receiver.take() => Some(post),
		};
		let post = match post {
			Some(post) => post,
			None => {
				let signal = Signal::Panic(anyhow::anyhow!("{} was interrupted", shared.name));
				signal_now(&signal, &shared).await;
				match consume_restart(&shared, &mut receiver).await {
					Some(rebuilt) => {
						behavior = rebuilt;
						continue;
					}
					None => return,
				}
			}
		};
		match post {
			Post::Signal(mut message) => {
				signal_now(&message.signal, &shared).await;
				message.done();
				match consume_restart(&shared, &mut receiver).await {
					Some(rebuilt) => behavior = rebuilt,
					None => return,
				}
			}
			Post::User(message) => {
				if let Err(cause) = apply_message(&mut behavior, message) {
					tracing::error!("{} failed: {cause:#}", shared.name);
					let signal = Signal::Panic(cause);
					signal_now(&signal, &shared).await;
					match consume_restart(&shared, &mut receiver).await {
						Some(rebuilt) => behavior = rebuilt,
						None => return,
					}
				}
			}
		}
	}
}

/// Transitions the actor to shutdown and runs the handler chain in
/// registration order. A failing handler is logged and does not stop the
/// chain; a restart request does.
async fn signal_now<B: Send + 'static>(signal: &Signal, shared: &Arc<ActorShared<B>>) {
	shared.state.store(SHUTDOWN, Ordering::Release);
	let handlers: Vec<Arc<dyn SignalHandler>> = shared.handlers.lock().clone();
	for handler in handlers {
		let result = AssertUnwindSafe(handler.handle(signal, HandlerContext::new()))
			.catch_unwind()
			.await;
		match result {
			Ok(Ok(())) => {}
			Ok(Err(error)) => {
				tracing::error!("{}: error in signal handler: {error:#}", shared.name);
			}
			Err(panic) => {
				tracing::error!(
					"{}: signal handler panicked: {}",
					shared.name,
					panic_message(&*panic)
				);
			}
		}
		if shared.restart.load(Ordering::Acquire) {
			break;
		}
	}
}

/// Consumes a pending restart request: drains the queue and rebuilds the
/// behavior. `None` means the loop should exit.
async fn consume_restart<B: Send + 'static>(
	shared: &Arc<ActorShared<B>>,
	receiver: &mut MailboxReceiver<B>,
) -> Option<B> {
	if !shared.restart.swap(false, Ordering::AcqRel) {
		return None;
	}
	receiver.clear();
	shared.interrupt.reset();
	match fresh_behavior(shared) {
		Ok(behavior) => Some(behavior),
		Err(cause) => {
			tracing::error!("{} behavior factory failed: {cause:#}", shared.name);
			// a restart requested by this second chain is not honored
			signal_now(&Signal::Panic(cause), shared).await;
			None
		}
	}
}

fn fresh_behavior<B: Send + 'static>(shared: &Arc<ActorShared<B>>) -> anyhow::Result<B> {
	// validated before start and never unset
	let factory = shared.factory.get().expect("behavior is defined");
	std::panic::catch_unwind(AssertUnwindSafe(|| factory(Context::new())))
		.map_err(|panic| anyhow::anyhow!("behavior factory panicked: {}", panic_message(&*panic)))
}

fn apply_message<B>(behavior: &mut B, message: Message<B>) -> anyhow::Result<()> {
	match std::panic::catch_unwind(AssertUnwindSafe(|| message(behavior))) {
		Ok(result) => result,
		Err(panic) => Err(anyhow::anyhow!(
			"message panicked: {}",
			panic_message(&*panic)
		)),
	}
}
