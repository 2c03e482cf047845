use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use composition_runtime::{Event, OnceSignal};

#[test]
fn unsubscribed_handler_is_not_called() {
    let event = Event::<u32>::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&hits);
    let id = event.subscribe(move |v| {
        h.fetch_add(*v as usize, Ordering::SeqCst);
    });

    event.emit(&2);
    assert!(event.unsubscribe(id));
    event.emit(&5);

    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert!(!event.unsubscribe(id));
}

#[test]
fn handlers_run_in_subscription_order() {
    let event = Event::<()>::new();
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));
    for i in 0..3 {
        let o = Arc::clone(&order);
        event.subscribe(move |_| o.lock().unwrap().push(i));
    }
    event.emit(&());
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
}

#[test]
fn handler_may_subscribe_during_emit() {
    let event = Arc::new(Event::<()>::new());
    let inner = Arc::clone(&event);
    event.subscribe(move |_| {
        inner.subscribe(|_| {});
    });

    event.emit(&());

    assert_eq!(event.subscriber_count(), 2);
}

#[test]
fn once_signal_fires_once_and_late_subscribers_run_inline() {
    let signal = OnceSignal::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let h = Arc::clone(&hits);
    assert!(signal.subscribe(move || { h.fetch_add(1, Ordering::SeqCst); }).is_some());
    assert!(signal.fire());
    assert!(!signal.fire());
    assert!(signal.is_fired());
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let h = Arc::clone(&hits);
    assert!(signal.subscribe(move || { h.fetch_add(1, Ordering::SeqCst); }).is_none());
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test]
fn once_signal_unsubscribe_before_fire() {
    let signal = OnceSignal::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&hits);
    let id = signal
        .subscribe(move || { h.fetch_add(1, Ordering::SeqCst); })
        .expect("signal has not fired yet");

    assert!(signal.unsubscribe(id));
    signal.fire();

    assert_eq!(hits.load(Ordering::SeqCst), 0);
}
