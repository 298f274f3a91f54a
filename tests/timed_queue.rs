use lanework::TimedQueue;
use std::time::{Duration, Instant};

#[test]
fn test_pop_respects_time() {
    let now = Instant::now();
    let mut queue = TimedQueue::new();
    queue.push(now + Duration::from_millis(20), "late");
    queue.push(now, "now");

    assert_eq!(queue.pop(now), Some("now"));
    assert_eq!(queue.pop(now), None, "late task must not be returned early");
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.pop(now + Duration::from_millis(20)), Some("late"));
    assert!(queue.is_empty());
}

#[test]
fn test_same_time_keeps_push_order() {
    let now = Instant::now();
    let mut queue = TimedQueue::new();
    for i in 0..10 {
        queue.push(now, i);
    }

    let popped: Vec<_> = std::iter::from_fn(|| queue.pop(now)).collect();
    assert_eq!(popped, (0..10).collect::<Vec<_>>());
}

#[test]
fn test_earliest_first_across_push_order() {
    let now = Instant::now();
    let mut queue = TimedQueue::new();
    queue.push(now + Duration::from_millis(3), 'c');
    queue.push(now + Duration::from_millis(1), 'a');
    queue.push(now + Duration::from_millis(2), 'b');

    assert_eq!(queue.next_time(), Some(now + Duration::from_millis(1)));
    let later = now + Duration::from_millis(5);
    let popped: Vec<_> = std::iter::from_fn(|| queue.pop(later)).collect();
    assert_eq!(popped, vec!['a', 'b', 'c']);
}

#[test]
fn test_is_idle_and_drain() {
    let now = Instant::now();
    let mut queue = TimedQueue::new();
    assert!(queue.is_idle(now));

    queue.push(now + Duration::from_secs(60), 1);
    assert!(queue.is_idle(now));
    queue.push(now, 2);
    assert!(!queue.is_idle(now));

    assert_eq!(queue.drain(), vec![2, 1]);
    assert!(queue.is_empty());
    assert_eq!(queue.next_time(), None);
}
