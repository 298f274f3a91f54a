use lanework::{AggregatePromise, Error, Future, Promise};

#[test]
fn test_resolves_after_all_and_seal() {
    let a = Promise::<i32>::new();
    let b = Promise::<String>::new();

    let all = AggregatePromise::new();
    all.add(&a.future()).add(&b.future());
    let done = all.future();

    a.resolve(1);
    assert!(done.is_pending());
    b.resolve("two".into());
    assert!(done.is_pending(), "must wait for seal");

    let sealed = all.seal();
    assert!(sealed.is_done());
    assert!(done.is_done());
}

#[test]
fn test_futures_added_while_others_settle() {
    let all = AggregatePromise::new();

    let first = Promise::<()>::new();
    all.add(&first.future());
    first.resolve(());

    let late = Promise::<()>::new();
    all.add(&late.future());
    let done = all.seal();
    assert!(done.is_pending());

    late.resolve(());
    assert!(done.is_done());
}

#[test]
fn test_first_error_wins() {
    let a = Promise::<()>::new();
    let b = Promise::<()>::new();
    let all = AggregatePromise::new();
    all.add(&a.future()).add(&b.future());
    let done = all.seal();

    b.reject(Error::LockCancelled);
    a.reject(Error::LockExpired);

    assert!(matches!(done.error(), Some(Error::LockCancelled)));
}

#[test]
fn test_error_before_seal_fails_immediately() {
    let all = AggregatePromise::new();
    all.add(&Future::<u8>::failed("broken"));

    assert_eq!(all.future().error().unwrap().to_string(), "broken");
}

#[test]
fn test_empty_seal_and_drop() {
    assert!(AggregatePromise::new().seal().is_done());

    let all = AggregatePromise::default();
    all.add(&Future::ready(()));
    let done = all.future();
    drop(all);
    assert!(done.is_done());
}
