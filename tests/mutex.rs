use lanework::{Context, Env, Error, FileId, GenericContext, Lane, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn hosted() -> (Env, Arc<dyn Context>) {
    init_logger();
    let env = Env::builder().hosted_main().build().unwrap();
    let ctx = GenericContext::new(&env, FileId(3), "mutex test");
    ctx.set_lane(Lane::Main);
    let ctx: Arc<dyn Context> = ctx;
    (env, ctx)
}

#[test]
fn test_callbacks_bracket_the_held_period() {
    let (env, ctx) = hosted();
    let locked = Arc::new(AtomicUsize::new(0));
    let unlocked = Arc::new(AtomicUsize::new(0));

    let (l, u) = (locked.clone(), unlocked.clone());
    let mutex = Mutex::with_callbacks(
        move || {
            l.fetch_add(1, Ordering::SeqCst);
        },
        move || {
            u.fetch_add(1, Ordering::SeqCst);
        },
    );

    let a = mutex.acquire_lock(&ctx, false);
    let b = mutex.acquire_lock(&ctx, false);
    assert!(a.is_done() && b.is_done());
    assert_eq!(locked.load(Ordering::SeqCst), 1);

    drop(a);
    drop(b);
    env.pump_main();
    assert_eq!(unlocked.load(Ordering::SeqCst), 1);
    assert!(!mutex.is_locked());
}

#[test]
fn test_exclusive_requests_are_fifo() {
    let (env, ctx) = hosted();
    let mutex = Mutex::new();

    let first = mutex.acquire_lock(&ctx, true);
    let second = mutex.acquire_lock(&ctx, true);
    let third = mutex.acquire_lock(&ctx, false);
    assert_eq!(mutex.pending(), 2);
    assert!(mutex.try_acquire_lock(&ctx, false).is_none());

    drop(first);
    env.pump_main();
    assert!(second.is_done() && third.is_pending());

    drop(second);
    env.pump_main();
    assert!(third.is_done());
    assert!(!third.value().unwrap().is_exclusive());
}

#[test]
fn test_drop_cancels_and_expires() {
    let (env, ctx) = hosted();
    let mutex = Mutex::default();

    let held = mutex.acquire_lock(&ctx, true);
    let waiting = mutex.acquire_lock(&ctx, false);
    drop(mutex);

    assert!(matches!(waiting.error(), Some(Error::LockCancelled)));
    assert!(matches!(held.value().unwrap().check(), Err(Error::LockExpired)));
    drop(held);
    env.pump_main();
}

#[test]
fn test_serializes_worker_lane_critical_sections() {
    init_logger();
    let env = Env::builder().async_workers(4).build().unwrap();
    let ctx = GenericContext::new(&env, FileId(3), "pool");
    ctx.set_lane(Lane::Async);
    let ctx: Arc<dyn Context> = ctx;

    let mutex = Arc::new(Mutex::new());
    let inside = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));

    for _ in 0..16 {
        let (inside, finished) = (inside.clone(), finished.clone());
        mutex.acquire_lock(&ctx, true).then_ok(&ctx, move |lock| {
            assert!(lock.check().is_ok());
            assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0, "two holders at once");
            std::thread::sleep(Duration::from_millis(1));
            inside.fetch_sub(1, Ordering::SeqCst);
            finished.fetch_add(1, Ordering::SeqCst);
        });
    }

    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    while finished.load(Ordering::SeqCst) < 16 {
        assert!(std::time::Instant::now() < deadline, "timed out");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_callbacks_alternate_on_one_lane() {
    let (env, ctx) = hosted();
    let events = Arc::new(std::sync::Mutex::new(Vec::new()));

    let (l, u) = (events.clone(), events.clone());
    let mutex = Mutex::with_callbacks(
        move || l.lock().unwrap().push("lock"),
        move || u.lock().unwrap().push("unlock"),
    );

    for _ in 0..3 {
        let held = mutex.acquire_lock(&ctx, true);
        let next = mutex.acquire_lock(&ctx, false);
        drop(held);
        env.pump_main();
        assert!(next.is_done());
        drop(next);
        env.pump_main();
    }

    assert_eq!(
        *events.lock().unwrap(),
        ["lock", "unlock"].repeat(3),
        "hand-offs must not produce extra callbacks"
    );
}
