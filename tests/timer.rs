use lanework::{Context, Coro, Env, Error, FileId, GenericContext, sleep, sleep_until};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_sleep_basic() {
    init_logger();
    let env = Env::builder().build().unwrap();
    let ctx: Arc<dyn Context> = GenericContext::new(&env, FileId(1), "sleep");

    let start = Instant::now();
    futures::executor::block_on(sleep(&ctx, Duration::from_millis(50))).unwrap();

    assert!(
        start.elapsed() >= Duration::from_millis(50),
        "Sleep should wait at least the specified duration"
    );
}

#[test]
fn test_sleep_until_past_deadline() {
    init_logger();
    let env = Env::builder().build().unwrap();
    let ctx: Arc<dyn Context> = GenericContext::new(&env, FileId(1), "past");

    let start = Instant::now();
    futures::executor::block_on(sleep_until(&ctx, start)).unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_sleep_inside_coroutine() {
    init_logger();
    let env = Env::builder().build().unwrap();
    let ctx: Arc<dyn Context> = GenericContext::new(&env, FileId(1), "coro sleep");

    let inner = ctx.clone();
    let elapsed = Coro::spawn(&ctx, async move {
        let start = Instant::now();
        sleep(&inner, Duration::from_millis(20)).await?;
        sleep(&inner, Duration::from_millis(20)).await?;
        Ok(start.elapsed())
    })
    .future();

    let elapsed = futures::executor::block_on(elapsed).unwrap();
    assert!(elapsed >= Duration::from_millis(40));
}

#[test]
fn test_sleep_abandoned_on_shutdown() {
    init_logger();
    let env = Env::builder().build().unwrap();
    let ctx: Arc<dyn Context> = GenericContext::new(&env, FileId(1), "shutdown");

    let pending = sleep(&ctx, Duration::from_secs(60));
    drop(env);

    assert!(matches!(pending.error(), Some(Error::Abandoned)));
}
