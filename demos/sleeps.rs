//! Two computations sleeping in parallel, then a race where the first
//! success cancels the rest.

use std::time::{Duration, Instant};

use weft::AsyncScope;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt::init();

	let start = Instant::now();
	let mut scope: AsyncScope<i32, String> = AsyncScope::new();
	let first = scope.fork(async {
		tokio::time::sleep(Duration::from_secs(1)).await;
		Ok(40)
	});
	let second = scope.fork(async {
		tokio::time::sleep(Duration::from_secs(1)).await;
		Ok(2)
	});
	scope.await_all().await?;

	let sum = first.get_now().unwrap_or(0) + second.get_now().unwrap_or(0);
	println!("sum = {sum}");
	println!("elapsed = {:?}", start.elapsed());

	let mut race: AsyncScope<i32, String> = AsyncScope::new();
	race.fork(async {
		tokio::time::sleep(Duration::from_secs(1)).await;
		Ok(1)
	});
	race.fork(async {
		tokio::time::sleep(Duration::from_millis(42)).await;
		Ok(2)
	});
	println!("winner = {}", race.await_first().await?);

	Ok(())
}
