use lanework::{Context, Env, Error, FileId, GenericContext, Lane, Promise};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn test_every_lane_runs_jobs() {
    init_logger();
    let env = Env::builder().async_workers(2).build().unwrap();
    let ctx: Arc<dyn Context> = GenericContext::new(&env, FileId(1), "lanes");
    let (tx, rx) = mpsc::channel();

    for lane in Lane::ALL {
        let tx = tx.clone();
        env.exec(lane, ctx.clone(), move || {
            let name = std::thread::current().name().unwrap_or_default().to_owned();
            tx.send((lane, name)).unwrap();
        });
    }

    let mut seen: Vec<_> = (0..4).map(|_| rx.recv_timeout(TIMEOUT).unwrap()).collect();
    seen.sort_by_key(|(lane, _)| lane.to_string());
    for (lane, thread) in seen {
        assert!(thread.starts_with(&format!("lane-{lane}-")), "{lane} ran on {thread}");
    }
}

#[test]
fn test_same_producer_order_is_kept() {
    init_logger();
    let env = Env::builder().build().unwrap();
    let ctx: Arc<dyn Context> = GenericContext::new(&env, FileId(1), "order");
    let (tx, rx) = mpsc::channel();

    for i in 0..50 {
        let tx = tx.clone();
        env.exec_sub(ctx.clone(), move || tx.send(i).unwrap());
    }

    let received: Vec<_> = (0..50).map(|_| rx.recv_timeout(TIMEOUT).unwrap()).collect();
    assert_eq!(received, (0..50).collect::<Vec<_>>());
}

#[test]
fn test_exec_at_waits_for_its_time() {
    init_logger();
    let env = Env::builder().build().unwrap();
    let ctx: Arc<dyn Context> = GenericContext::new(&env, FileId(1), "timed");
    let (tx, rx) = mpsc::channel();

    let start = Instant::now();
    let at = start + Duration::from_millis(30);
    let tx2 = tx.clone();
    env.exec_at(Lane::Gl, ctx.clone(), move || tx2.send("delayed").unwrap(), at);
    env.exec_gl(ctx.clone(), move || tx.send("immediate").unwrap());

    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), "immediate");
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), "delayed");
    assert!(start.elapsed() >= Duration::from_millis(30));
}

#[test]
fn test_panic_is_contained_in_lane() {
    init_logger();
    let env = Env::builder().build().unwrap();
    let ctx: Arc<dyn Context> = GenericContext::new(&env, FileId(1), "panicky");
    let (tx, rx) = mpsc::channel();

    env.exec_sub(ctx.clone(), || panic!("lane task failed"));
    env.exec_sub(ctx.clone(), move || tx.send(()).unwrap());

    rx.recv_timeout(TIMEOUT).expect("sub lane died after a panic");
    assert_eq!(env.panics(), 1);
}

#[test]
fn test_pump_main_runs_due_jobs_on_caller() {
    init_logger();
    let env = Env::builder().hosted_main().build().unwrap();
    let ctx: Arc<dyn Context> = GenericContext::new(&env, FileId(1), "hosted");
    let caller = std::thread::current().id();
    let hits = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let hits = hits.clone();
        env.exec_main(ctx.clone(), move || {
            assert_eq!(std::thread::current().id(), caller);
            hits.fetch_add(1, Ordering::SeqCst);
        });
    }
    env.exec_at(Lane::Main, ctx.clone(), || {}, Instant::now() + Duration::from_secs(60));

    assert_eq!(env.queued(Lane::Main), 4);
    assert_eq!(env.pump_main(), 3);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert_eq!(env.queued(Lane::Main), 1, "future job stays queued");
}

#[test]
fn test_pump_main_with_dedicated_main_is_noop() {
    init_logger();
    let env = Env::builder().build().unwrap();
    assert_eq!(env.pump_main(), 0);
}

#[test]
fn test_drop_discards_queued_jobs() {
    init_logger();
    let env = Env::builder().hosted_main().build().unwrap();
    let ctx: Arc<dyn Context> = GenericContext::new(&env, FileId(1), "shutdown");
    let handle = env.handle().clone();

    let queued = Promise::<()>::new();
    let before = queued.future();
    env.exec_main(ctx.clone(), move || queued.resolve(()));

    drop(env);
    assert!(matches!(before.error(), Some(Error::Abandoned)));

    let late = Promise::<()>::new();
    let after = late.future();
    handle.exec_sub(ctx, move || late.resolve(()));
    assert!(matches!(after.error(), Some(Error::Abandoned)));
}

#[test]
fn test_exit_request_and_root() {
    init_logger();
    let env = Env::builder().root("/tmp/project").build().unwrap();

    assert!(!env.exit_requested());
    env.handle().clone().request_exit();
    assert!(env.exit_requested());
    assert_eq!(env.root(), std::path::Path::new("/tmp/project"));

    env.report(&Error::msg("reported by a consumer"));
}
