use weft::{Actor, Context, run};

struct Hello {
	context: Context,
}

impl Hello {
	fn say(&mut self, message: &str) {
		println!("Hello {message}");
	}

	fn end(&mut self) -> anyhow::Result<()> {
		self.context.shutdown()?;
		Ok(())
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt::init();

	let hello = Actor::<Hello>::named("hello");
	hello.behavior(|context| Hello { context })?;

	run([hello.to_ref()], |context| {
		context.post_to(&hello, |hello| {
			hello.say("actors on tokio");
			Ok(())
		});
		context.post_to(&hello, Hello::end);
	})
	.await?;

	Ok(())
}
