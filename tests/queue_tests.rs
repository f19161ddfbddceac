//! Bounded queue behaviour across tasks

mod common;

use std::sync::Arc;
use std::thread;

use common::{ManualClock, WallClock};
use rc_car_controller::queue::BoundedQueue;
use rc_car_controller::schedule::Clock;

#[test]
fn test_queue_never_exceeds_capacity() {
    let queue: BoundedQueue<u32, 5> = BoundedQueue::new();

    for i in 0..20 {
        let _ = queue.try_send(i);
        assert!(queue.len() <= queue.capacity());
    }
    assert_eq!(queue.len(), 5);
    assert_eq!(queue.free_slots(), 0);

    // Oldest entries are kept, newer ones rejected
    assert_eq!(queue.try_recv(), Some(0));
}

#[test]
fn test_overwrite_keeps_latest_only() {
    let queue: BoundedQueue<u32, 1> = BoundedQueue::new();

    for i in 0..10 {
        queue.overwrite(i);
    }
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.try_recv(), Some(9));
    assert!(queue.is_empty());
}

#[test]
fn test_recv_timeout_zero_checks_once() {
    let clock = ManualClock::new(1_000);
    let queue: BoundedQueue<u32, 2> = BoundedQueue::new();

    assert_eq!(queue.recv_timeout(0, &clock), None);
    assert_eq!(clock.now_us(), 0);

    queue.try_send(4).unwrap();
    assert_eq!(queue.recv_timeout(0, &clock), Some(4));
}

#[test]
fn test_threaded_fifo_order() {
    let queue: Arc<BoundedQueue<u32, 5>> = Arc::new(BoundedQueue::new());
    let sender = Arc::clone(&queue);

    let producer = thread::spawn(move || {
        for i in 0..200u32 {
            let mut item = i;
            loop {
                match sender.try_send(item) {
                    Ok(()) => break,
                    Err(back) => {
                        item = back;
                        thread::yield_now();
                    }
                }
            }
        }
    });

    let clock = WallClock::new();
    let mut received = Vec::new();
    while received.len() < 200 {
        if let Some(item) = queue.recv_timeout(1_000_000, &clock) {
            received.push(item);
        } else {
            panic!("queue stalled after {} items", received.len());
        }
    }
    producer.join().unwrap();

    assert_eq!(received, (0..200).collect::<Vec<_>>());
}

#[test]
fn test_threaded_overwrite_never_goes_backwards() {
    let queue: Arc<BoundedQueue<u64, 1>> = Arc::new(BoundedQueue::new());
    let sender = Arc::clone(&queue);

    let producer = thread::spawn(move || {
        for i in 1..=5_000u64 {
            sender.overwrite(i);
        }
    });

    let mut last = 0;
    while !producer.is_finished() || !queue.is_empty() {
        if let Some(value) = queue.try_recv() {
            assert!(value > last);
            last = value;
        }
    }
    producer.join().unwrap();
    assert!(last <= 5_000);
}
