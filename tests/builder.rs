use lanework::{EnvBuilder, EnvConfig, MainLane};
use std::time::Duration;

#[test]
fn test_builder_defaults() {
    let env = EnvBuilder::new().build().unwrap();
    let config = env.config();

    assert_eq!(config.main_lane, MainLane::Dedicated);
    assert!(config.async_workers >= 1);
    assert_eq!(env.thread_slice(), Duration::from_millis(1));
}

#[test]
fn test_builder_overrides() {
    let env = EnvBuilder::new()
        .async_workers(3)
        .hosted_main()
        .thread_slice(Duration::from_micros(250))
        .root("assets")
        .build()
        .unwrap();

    assert_eq!(env.config().async_workers, 3);
    assert_eq!(env.config().main_lane, MainLane::Hosted);
    assert_eq!(env.thread_slice(), Duration::from_micros(250));
    assert_eq!(env.root(), std::path::Path::new("assets"));
}

#[test]
fn test_config_from_json_fills_defaults() {
    let config: EnvConfig =
        serde_json::from_str(r#"{ "async_workers": 2, "main_lane": "hosted" }"#).unwrap();

    assert_eq!(config.async_workers, 2);
    assert_eq!(config.main_lane, MainLane::Hosted);
    assert_eq!(config.thread_slice_us, EnvConfig::default().thread_slice_us);

    let env = EnvBuilder::from_config(config.clone()).build().unwrap();
    assert_eq!(env.config(), &config);
    assert_eq!(env.pump_main(), 0);
}

#[test]
fn test_zero_async_workers_still_runs_async_lane() {
    let env = EnvBuilder::new().async_workers(0).build().unwrap();
    let ctx: std::sync::Arc<dyn lanework::Context> =
        lanework::GenericContext::new(&env, lanework::FileId(1), "async");
    let (tx, rx) = std::sync::mpsc::channel();

    env.exec_async(ctx, move || tx.send(()).unwrap());
    rx.recv_timeout(Duration::from_secs(5)).unwrap();
}
