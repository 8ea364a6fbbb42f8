mod actor;
mod cancel;
mod context;
mod error;
mod ident;
mod mailbox;
mod outcome;
mod scope;
mod signal;
mod stream;
mod task;

pub mod prelude {
	pub use super::Actor;
	pub use super::ActorRef;
	pub use super::ActorState;
	pub use super::AsyncScope;
	pub use super::Context;
	pub use super::Signal;
	pub use super::run;
}

pub use actor::Actor;
pub use actor::ActorRef;
pub use actor::ActorState;
pub use actor::BehaviorFactory;
pub use actor::run;
pub use context::Context;
pub use context::HandlerContext;
pub use context::StartContext;
pub use error::ActorError;
pub use error::ScopeError;
pub use error::TaskError;
pub use mailbox::Message;
pub use outcome::TaskResult;
pub use scope::AsyncScope;
pub use signal::Signal;
pub use signal::SignalHandler;
pub use stream::ResultStream;
pub use task::AsyncTask;
