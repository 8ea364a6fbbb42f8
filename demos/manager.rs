//! A manager actor that spawns a child dynamically and hands its address to
//! a callback actor. Shutting the manager down cascades to both.

use futures::FutureExt;
use weft::{Actor, Context, HandlerContext, Signal, run};

struct Hello;

impl Hello {
	fn say(&mut self, message: &str) {
		println!("Hello {message}");
	}
}

struct Callback {
	context: Context,
	manager: Actor<Manager>,
}

impl Callback {
	fn this_is_hello(&mut self, hello: Actor<Hello>) -> anyhow::Result<()> {
		self.context.post_to(&hello, |hello| {
			hello.say("spawned actor");
			Ok(())
		});
		self.context.post_to(&self.manager, Manager::end);
		Ok(())
	}
}

struct Manager {
	context: Context,
}

impl Manager {
	fn create_hello(&mut self, callback: &Actor<Callback>) -> anyhow::Result<()> {
		let hello = Actor::<Hello>::named("hello");
		hello.behavior(|_context| Hello)?;
		self.context.spawn(&hello)?;
		self.context
			.post_to(callback, move |callback| callback.this_is_hello(hello));
		Ok(())
	}

	fn end(&mut self) -> anyhow::Result<()> {
		self.context.shutdown()?;
		Ok(())
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt::init();

	let manager = Actor::<Manager>::named("manager");
	let callback = Actor::<Callback>::named("callback");

	manager.behavior(|context| Manager { context })?;
	let cb = callback.clone();
	manager.on_signal(move |_signal: &Signal, context: HandlerContext| {
		let cb = cb.clone();
		async move {
			context.signal(&cb, Signal::Shutdown).await?;
			anyhow::Ok(())
		}
		.boxed()
	})?;

	let boss = manager.clone();
	callback.behavior(move |context| Callback {
		context,
		manager: boss.clone(),
	})?;

	run([manager.to_ref(), callback.to_ref()], |context| {
		context.post_to(&manager, move |manager| manager.create_hello(&callback));
	})
	.await?;

	Ok(())
}
