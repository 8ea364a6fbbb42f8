use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use weft::{Actor, ActorError, ActorState, Context, HandlerContext, Signal, run};

/// Behavior with no messages; terminates only through signals.
struct Idle;

/// Behavior that can be asked to shut itself down.
struct Stopper {
	context: Context,
}

impl Stopper {
	fn end(&mut self) -> anyhow::Result<()> {
		self.context.shutdown()?;
		Ok(())
	}
}

struct Hello {
	context: Context,
	out: Arc<Mutex<Vec<String>>>,
}

impl Hello {
	fn say(&mut self, message: &str) {
		self.out.lock().push(format!("Hello {message}"));
	}

	fn end(&mut self) -> anyhow::Result<()> {
		self.context.shutdown()?;
		Ok(())
	}
}

#[tokio::test]
async fn hello_actor_processes_messages_then_shuts_down() {
	let out = Arc::new(Mutex::new(Vec::new()));
	let hello = Actor::<Hello>::named("hello");
	let sink = out.clone();
	hello
		.behavior(move |context| Hello {
			context,
			out: sink.clone(),
		})
		.unwrap();

	run([hello.to_ref()], |context| {
		context.post_to(&hello, |hello| {
			hello.say("world");
			Ok(())
		});
		context.post_to(&hello, Hello::end);
	})
	.await
	.unwrap();

	assert_eq!(*out.lock(), vec!["Hello world".to_string()]);
	assert_eq!(hello.state(), ActorState::Shutdown);
}

#[tokio::test]
async fn mailbox_is_fifo_per_actor() {
	struct Recorder {
		context: Context,
		seen: Arc<Mutex<Vec<u32>>>,
	}

	let seen = Arc::new(Mutex::new(Vec::new()));
	let recorder = Actor::<Recorder>::named("recorder");
	let sink = seen.clone();
	recorder
		.behavior(move |context| Recorder {
			context,
			seen: sink.clone(),
		})
		.unwrap();

	run([recorder.to_ref()], |context| {
		for i in 0..20 {
			context.post_to(&recorder, move |recorder| {
				recorder.seen.lock().push(i);
				Ok(())
			});
		}
		context.post_to(&recorder, |recorder| {
			recorder.context.shutdown()?;
			Ok(())
		});
	})
	.await
	.unwrap();

	assert_eq!(*seen.lock(), (0..20).collect::<Vec<_>>());
}

#[tokio::test]
async fn current_actor_is_bound_and_running_inside_a_message() {
	struct Probe {
		context: Context,
		seen: Arc<Mutex<Option<(String, ActorState)>>>,
		mismatch: Arc<AtomicBool>,
	}

	let seen = Arc::new(Mutex::new(None));
	let mismatch = Arc::new(AtomicBool::new(false));
	let probe = Actor::<Probe>::named("probe");
	let slot = seen.clone();
	let wrong = mismatch.clone();
	probe
		.behavior(move |context| Probe {
			context,
			seen: slot.clone(),
			mismatch: wrong.clone(),
		})
		.unwrap();

	run([probe.to_ref()], |context| {
		context.post_to(&probe, |probe| {
			let me = probe.context.current_actor::<Probe>()?;
			*probe.seen.lock() = Some((me.name().to_string(), me.state()));
			let err = probe.context.current_actor::<Idle>().unwrap_err();
			probe.mismatch.store(
				matches!(err, ActorError::BehaviorMismatch { .. }),
				Ordering::SeqCst,
			);
			probe.context.shutdown()?;
			Ok(())
		});
	})
	.await
	.unwrap();

	assert_eq!(
		*seen.lock(),
		Some(("probe".to_string(), ActorState::Running))
	);
	assert!(mismatch.load(Ordering::SeqCst));
}

#[tokio::test]
async fn derived_names_use_the_behavior_type() {
	let actor = Actor::<Idle>::new();
	assert!(actor.name().starts_with("Idle"));
	assert_eq!(actor.to_ref().name(), actor.name());
	assert_eq!(actor.to_ref().state(), ActorState::Created);
}

#[tokio::test]
async fn run_requires_a_behavior() {
	let actor = Actor::<Idle>::named("nobody");
	let err = run([actor.to_ref()], |_| {}).await.unwrap_err();
	assert!(matches!(err, ActorError::BehaviorMissing(_)));
}

#[tokio::test]
async fn behavior_can_only_be_set_once() {
	let actor = Actor::<Idle>::named("idle");
	actor.behavior(|_| Idle).unwrap();
	let err = actor.behavior(|_| Idle).unwrap_err();
	assert!(matches!(err, ActorError::BehaviorAlreadySet(_)));
}

#[tokio::test]
async fn configuration_is_gated_to_the_owner_task() {
	let actor = Actor::<Idle>::named("elsewhere");
	let moved = actor.clone();
	let err = tokio::spawn(async move { moved.behavior(|_| Idle).err() })
		.await
		.unwrap()
		.unwrap();
	assert!(matches!(err, ActorError::NotOwner(_)));
}

#[tokio::test]
async fn configuration_ends_when_the_actor_starts() {
	let actor = Actor::<Stopper>::named("stopper");
	actor.behavior(|context| Stopper { context }).unwrap();
	run([actor.to_ref()], |context| {
		context.post_to(&actor, Stopper::end)
	})
	.await
	.unwrap();

	let err = actor
		.on_signal(|_signal: &Signal, _context: HandlerContext| async { anyhow::Ok(()) }.boxed())
		.unwrap_err();
	assert!(matches!(err, ActorError::NotCreated(_)));

	// a terminated actor cannot be started again either
	let err = run([actor.to_ref()], |_| {}).await.unwrap_err();
	assert!(matches!(err, ActorError::NotCreated(_)));
}

#[tokio::test]
async fn state_progresses_monotonically() {
	let actor = Actor::<Stopper>::named("steps");
	actor.behavior(|context| Stopper { context }).unwrap();
	assert_eq!(actor.state(), ActorState::Created);

	run([actor.to_ref()], |context| {
		context.post_to(&actor, Stopper::end)
	})
	.await
	.unwrap();

	assert_eq!(actor.state(), ActorState::Shutdown);
}

#[tokio::test]
async fn an_actor_cannot_signal_itself() {
	let failure = Arc::new(Mutex::new(None));
	let actor = Actor::<Stopper>::named("selfish");
	actor.behavior(|context| Stopper { context }).unwrap();
	let me = actor.clone();
	let slot = failure.clone();
	actor
		.on_signal(move |_signal: &Signal, context: HandlerContext| {
			let me = me.clone();
			let slot = slot.clone();
			async move {
				*slot.lock() = context.signal(&me, Signal::Shutdown).await.err();
				anyhow::Ok(())
			}
			.boxed()
		})
		.unwrap();

	run([actor.to_ref()], |context| {
		context.post_to(&actor, Stopper::end)
	})
	.await
	.unwrap();

	assert!(matches!(*failure.lock(), Some(ActorError::SelfSignal)));
}

#[tokio::test(start_paused = true)]
async fn signal_returns_after_the_target_handlers_ran() {
	let flag = Arc::new(AtomicBool::new(false));
	let observed = Arc::new(AtomicBool::new(false));

	let slow = Actor::<Idle>::named("slow");
	slow.behavior(|_| Idle).unwrap();
	let set = flag.clone();
	slow.on_signal(move |_signal: &Signal, _context: HandlerContext| {
		let set = set.clone();
		async move {
			tokio::time::sleep(Duration::from_millis(200)).await;
			set.store(true, Ordering::SeqCst);
			anyhow::Ok(())
		}
		.boxed()
	})
	.unwrap();

	let driver = Actor::<Stopper>::named("driver");
	driver.behavior(|context| Stopper { context }).unwrap();
	let target = slow.clone();
	let read = flag.clone();
	let saw = observed.clone();
	driver
		.on_signal(move |_signal: &Signal, context: HandlerContext| {
			let target = target.clone();
			let read = read.clone();
			let saw = saw.clone();
			async move {
				context.signal(&target, Signal::Shutdown).await?;
				saw.store(read.load(Ordering::SeqCst), Ordering::SeqCst);
				anyhow::Ok(())
			}
			.boxed()
		})
		.unwrap();

	run([slow.to_ref(), driver.to_ref()], |context| {
		context.post_to(&driver, Stopper::end)
	})
	.await
	.unwrap();

	assert!(flag.load(Ordering::SeqCst));
	assert!(observed.load(Ordering::SeqCst));
	assert_eq!(slow.state(), ActorState::Shutdown);
	assert_eq!(driver.state(), ActorState::Shutdown);
}

struct HelloChild {
	out: Arc<Mutex<Vec<String>>>,
}

impl HelloChild {
	fn say(&mut self, message: &str) {
		self.out.lock().push(format!("Hello {message}"));
	}
}

struct Manager {
	context: Context,
	out: Arc<Mutex<Vec<String>>>,
	order: Arc<Mutex<Vec<String>>>,
}

impl Manager {
	fn create_hello(&mut self, callback: &Actor<Callback>) -> anyhow::Result<()> {
		let hello = Actor::<HelloChild>::named("hello");
		let out = self.out.clone();
		hello.behavior(move |_context| HelloChild { out: out.clone() })?;
		let order = self.order.clone();
		hello.on_signal(move |_signal: &Signal, _context: HandlerContext| {
			let order = order.clone();
			async move {
				order.lock().push("hello".to_string());
				anyhow::Ok(())
			}
			.boxed()
		})?;
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

struct Callback {
	context: Context,
	manager: Actor<Manager>,
}

impl Callback {
	fn this_is_hello(&mut self, hello: Actor<HelloChild>) -> anyhow::Result<()> {
		self.context.post_to(&hello, |hello| {
			hello.say("hi");
			Ok(())
		});
		self.context.post_to(&self.manager, Manager::end);
		Ok(())
	}
}

#[tokio::test]
async fn manager_spawns_a_child_and_the_shutdown_cascades() {
	let out = Arc::new(Mutex::new(Vec::new()));
	let order = Arc::new(Mutex::new(Vec::new()));

	let manager = Actor::<Manager>::named("manager");
	let callback = Actor::<Callback>::named("callback");

	let sink = out.clone();
	let spawned = order.clone();
	manager
		.behavior(move |context| Manager {
			context,
			out: sink.clone(),
			order: spawned.clone(),
		})
		.unwrap();
	let cb = callback.clone();
	manager
		.on_signal(move |_signal: &Signal, context: HandlerContext| {
			let cb = cb.clone();
			async move {
				context.signal(&cb, Signal::Shutdown).await?;
				anyhow::Ok(())
			}
			.boxed()
		})
		.unwrap();

	let boss = manager.clone();
	callback
		.behavior(move |context| Callback {
			context,
			manager: boss.clone(),
		})
		.unwrap();

	let callback_handle = callback.clone();
	run([manager.to_ref(), callback.to_ref()], |context| {
		context.post_to(&manager, move |manager| manager.create_hello(&callback));
	})
	.await
	.unwrap();

	assert_eq!(*out.lock(), vec!["Hello hi".to_string()]);
	assert_eq!(*order.lock(), vec!["hello".to_string()]);
	assert_eq!(manager.state(), ActorState::Shutdown);
	assert_eq!(callback_handle.state(), ActorState::Shutdown);
}

#[tokio::test]
async fn children_shut_down_in_spawn_order() {
	struct Parent {
		context: Context,
		order: Arc<Mutex<Vec<String>>>,
	}

	impl Parent {
		fn create(&mut self) -> anyhow::Result<()> {
			for name in ["first", "second"] {
				let child = Actor::<Idle>::named(name);
				child.behavior(|_| Idle)?;
				let order = self.order.clone();
				child.on_signal(move |_signal: &Signal, _context: HandlerContext| {
					let order = order.clone();
					async move {
						order.lock().push(name.to_string());
						anyhow::Ok(())
					}
					.boxed()
				})?;
				self.context.spawn(&child)?;
			}
			Ok(())
		}

		fn end(&mut self) -> anyhow::Result<()> {
			self.context.shutdown()?;
			Ok(())
		}
	}

	let order = Arc::new(Mutex::new(Vec::new()));
	let parent = Actor::<Parent>::named("parent");
	let sink = order.clone();
	parent
		.behavior(move |context| Parent {
			context,
			order: sink.clone(),
		})
		.unwrap();

	run([parent.to_ref()], |context| {
		context.post_to(&parent, Parent::create);
		context.post_to(&parent, Parent::end);
	})
	.await
	.unwrap();

	assert_eq!(
		*order.lock(),
		vec!["first".to_string(), "second".to_string()]
	);
}

#[tokio::test]
async fn spawn_rejects_a_child_created_elsewhere() {
	struct Spawner {
		context: Context,
		result: Arc<Mutex<Option<ActorError>>>,
	}

	let result = Arc::new(Mutex::new(None));
	let spawner = Actor::<Spawner>::named("spawner");
	let slot = result.clone();
	spawner
		.behavior(move |context| Spawner {
			context,
			result: slot.clone(),
		})
		.unwrap();

	// created on the test task, not inside the spawner's behavior
	let outsider = Actor::<Idle>::named("outsider");
	outsider.behavior(|_| Idle).unwrap();

	run([spawner.to_ref()], |context| {
		context.post_to(&spawner, move |spawner| {
			*spawner.result.lock() = spawner.context.spawn(&outsider).err();
			spawner.context.shutdown()?;
			Ok(())
		});
	})
	.await
	.unwrap();

	assert!(matches!(*result.lock(), Some(ActorError::NotOwner(_))));
}

#[tokio::test]
async fn spawn_rejects_a_child_without_behavior() {
	struct Spawner {
		context: Context,
		result: Arc<Mutex<Option<ActorError>>>,
	}

	let result = Arc::new(Mutex::new(None));
	let spawner = Actor::<Spawner>::named("spawner");
	let slot = result.clone();
	spawner
		.behavior(move |context| Spawner {
			context,
			result: slot.clone(),
		})
		.unwrap();

	run([spawner.to_ref()], |context| {
		context.post_to(&spawner, |spawner| {
			let bare = Actor::<Idle>::named("bare");
			*spawner.result.lock() = spawner.context.spawn(&bare).err();
			spawner.context.shutdown()?;
			Ok(())
		});
	})
	.await
	.unwrap();

	assert!(matches!(
		*result.lock(),
		Some(ActorError::BehaviorMissing(_))
	));
}

#[tokio::test]
async fn a_failing_message_shuts_the_actor_down() {
	struct Flaky {
		context: Context,
	}

	let seen = Arc::new(Mutex::new(None));
	let flaky = Actor::<Flaky>::named("flaky");
	flaky.behavior(|context| Flaky { context }).unwrap();
	let slot = seen.clone();
	flaky
		.on_signal(move |signal: &Signal, _context: HandlerContext| {
			let description = match signal {
				Signal::Panic(error) => Some(error.to_string()),
				Signal::Shutdown => None,
			};
			let slot = slot.clone();
			async move {
				*slot.lock() = description;
				anyhow::Ok(())
			}
			.boxed()
		})
		.unwrap();

	run([flaky.to_ref()], |context| {
		context.post_to(&flaky, |flaky| {
			Err(flaky.context.panic(anyhow::anyhow!("database on fire")))
		});
	})
	.await
	.unwrap();

	assert_eq!(*seen.lock(), Some("database on fire".to_string()));
	assert_eq!(flaky.state(), ActorState::Shutdown);
}

#[tokio::test]
async fn a_panicking_message_shuts_the_actor_down() {
	let seen = Arc::new(Mutex::new(None));
	let fragile = Actor::<Idle>::named("fragile");
	fragile.behavior(|_| Idle).unwrap();
	let slot = seen.clone();
	fragile
		.on_signal(move |signal: &Signal, _context: HandlerContext| {
			let description = match signal {
				Signal::Panic(error) => Some(error.to_string()),
				Signal::Shutdown => None,
			};
			let slot = slot.clone();
			async move {
				*slot.lock() = description;
				anyhow::Ok(())
			}
			.boxed()
		})
		.unwrap();

	run([fragile.to_ref()], |context| {
		context.post_to(&fragile, |_idle| panic!("kaboom"));
	})
	.await
	.unwrap();

	let seen = seen.lock();
	assert!(seen.as_deref().is_some_and(|m| m.contains("kaboom")));
	assert_eq!(fragile.state(), ActorState::Shutdown);
}

#[tokio::test]
async fn interruption_reaches_the_signal_handlers() {
	let saw_panic = Arc::new(AtomicBool::new(false));
	let idle = Actor::<Idle>::named("interruptee");
	idle.behavior(|_| Idle).unwrap();
	let saw = saw_panic.clone();
	idle.on_signal(move |signal: &Signal, _context: HandlerContext| {
		let is_panic = matches!(signal, Signal::Panic(_));
		let saw = saw.clone();
		async move {
			if is_panic {
				saw.store(true, Ordering::SeqCst);
			}
			anyhow::Ok(())
		}
		.boxed()
	})
	.unwrap();

	run([idle.to_ref()], |_| idle.interrupt()).await.unwrap();

	assert!(saw_panic.load(Ordering::SeqCst));
	assert_eq!(idle.state(), ActorState::Shutdown);
}

#[tokio::test]
async fn restart_discards_queued_messages_and_rebuilds() {
	struct Counted {
		context: Context,
		count: u32,
		last: Arc<AtomicU32>,
	}

	impl Counted {
		fn increment(&mut self) -> anyhow::Result<()> {
			self.count += 1;
			self.last.store(self.count, Ordering::SeqCst);
			Ok(())
		}

		fn end(&mut self) -> anyhow::Result<()> {
			self.context.shutdown()?;
			Ok(())
		}
	}

	struct Driver {
		context: Context,
	}

	impl Driver {
		fn go(&mut self) -> anyhow::Result<()> {
			self.context.shutdown()?;
			Ok(())
		}
	}

	let builds = Arc::new(AtomicU32::new(0));
	let last_count = Arc::new(AtomicU32::new(0));

	let counted = Actor::<Counted>::named("counted");
	let factory_builds = builds.clone();
	let last = last_count.clone();
	counted
		.behavior(move |context| {
			factory_builds.fetch_add(1, Ordering::SeqCst);
			Counted {
				context,
				count: 0,
				last: last.clone(),
			}
		})
		.unwrap();
	counted
		.on_signal(|signal: &Signal, context: HandlerContext| {
			let restart = matches!(signal, Signal::Panic(_));
			async move {
				if restart {
					context.restart()?;
				}
				anyhow::Ok(())
			}
			.boxed()
		})
		.unwrap();

	let driver = Actor::<Driver>::named("driver");
	driver.behavior(|context| Driver { context }).unwrap();
	let target = counted.clone();
	driver
		.on_signal(move |_signal: &Signal, context: HandlerContext| {
			let target = target.clone();
			async move {
				context
					.signal(&target, Signal::Panic(anyhow::anyhow!("boom")))
					.await?;
				context.post_to(&target, Counted::increment);
				context.post_to(&target, Counted::increment);
				context.post_to(&target, Counted::end);
				anyhow::Ok(())
			}
			.boxed()
		})
		.unwrap();

	run([counted.to_ref(), driver.to_ref()], |context| {
		for _ in 0..3 {
			context.post_to(&counted, Counted::increment);
		}
		context.post_to(&driver, Driver::go);
	})
	.await
	.unwrap();

	// one build at start, one for the restart
	assert_eq!(builds.load(Ordering::SeqCst), 2);
	// the rebuilt behavior saw exactly the two post-restart increments
	assert_eq!(last_count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn posting_to_a_terminated_actor_is_discarded() {
	let victim = Actor::<Stopper>::named("victim");
	victim.behavior(|context| Stopper { context }).unwrap();
	run([victim.to_ref()], |context| {
		context.post_to(&victim, Stopper::end)
	})
	.await
	.unwrap();
	assert_eq!(victim.state(), ActorState::Shutdown);

	struct Poster {
		context: Context,
		victim: Actor<Stopper>,
	}

	let poster = Actor::<Poster>::named("poster");
	let target = victim.clone();
	poster
		.behavior(move |context| Poster {
			context,
			victim: target.clone(),
		})
		.unwrap();

	run([poster.to_ref()], |context| {
		context.post_to(&poster, |poster| {
			poster.context.post_to(&poster.victim, Stopper::end);
			poster.context.shutdown()?;
			Ok(())
		});
	})
	.await
	.unwrap();
}

#[tokio::test]
async fn context_operations_need_a_bound_actor() {
	let smuggler = Actor::<Stopper>::named("smuggler");
	smuggler.behavior(|context| Stopper { context }).unwrap();
	let (tx, rx) = tokio::sync::oneshot::channel();

	run([smuggler.to_ref()], |context| {
		context.post_to(&smuggler, move |stopper| {
			let context = stopper.context;
			tokio::spawn(async move {
				let _ = tx.send(context.shutdown().err());
			});
			stopper.context.shutdown()?;
			Ok(())
		});
	})
	.await
	.unwrap();

	let err = rx.await.unwrap();
	assert!(matches!(err, Some(ActorError::NoCurrentActor)));
}
