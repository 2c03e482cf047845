//! # Synchronous Events
//!
//! Broadcast primitives used by collections and entities to publish changes.
//!
//! ## Design
//! - Delivery is synchronous and happens inline on the emitting thread. There
//!   is no queue.
//! - Handlers are snapshotted before delivery, so a handler may subscribe,
//!   unsubscribe or trigger further emissions (re-entrancy) without
//!   deadlocking. A handler removed while an emission is in flight may still
//!   receive that one emission.
//! - [`OnceSignal`] fires at most once. Subscribing after it fired invokes the
//!   handler immediately on the subscribing thread, which closes the
//!   check-then-subscribe race for late subscribers.
//!
//! ## Concurrency
//! Handler lists sit behind short-lived mutexes that are never held while a
//! handler runs. Poisoned locks are recovered, so a panicking handler cannot
//! wedge an event.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};


/// Token returned by `subscribe`, used to unsubscribe later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

fn next_subscription() -> SubscriptionId {
    SubscriptionId(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Handler<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// Multi-subscriber synchronous broadcast.
pub struct Event<A> {
    handlers: Mutex<Vec<(SubscriptionId, Handler<A>)>>,
}

impl<A> Default for Event<A> {
    fn default() -> Self {
        Self { handlers: Mutex::new(Vec::new()) }
    }
}

impl<A> Event<A> {
    /// Creates an event with no subscribers.
    pub fn new() -> Self { Self::default() }

    /// Registers `handler` and returns its subscription token.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let id = next_subscription();
        lock(&self.handlers).push((id, Arc::new(handler)));
        id
    }

    /// Removes a subscription. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = lock(&self.handlers);
        let before = handlers.len();
        handlers.retain(|(sid, _)| *sid != id);
        handlers.len() != before
    }

    /// Delivers `args` to every current subscriber, in subscription order.
    pub fn emit(&self, args: &A) {
        let snapshot: Vec<Handler<A>> = lock(&self.handlers)
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for handler in snapshot {
            handler(args);
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize { lock(&self.handlers).len() }

    /// Drops every subscription.
    pub fn clear(&self) { lock(&self.handlers).clear(); }
}

type OnceHandler = Box<dyn FnOnce() + Send>;

struct SignalState {
    fired: bool,
    handlers: Vec<(SubscriptionId, OnceHandler)>,
}

/// One-shot broadcast.
///
/// ## Invariants
/// - `fire` delivers to each handler registered before it, exactly once.
/// - After firing, the signal never resets.
pub struct OnceSignal {
    state: Mutex<SignalState>,
}

impl Default for OnceSignal {
    fn default() -> Self {
        Self { state: Mutex::new(SignalState { fired: false, handlers: Vec::new() }) }
    }
}

impl OnceSignal {
    /// Creates an unfired signal.
    pub fn new() -> Self { Self::default() }

    /// Returns `true` once the signal has fired.
    pub fn is_fired(&self) -> bool { lock(&self.state).fired }

    /// Registers a handler for the firing.
    ///
    /// If the signal already fired, `handler` runs immediately on this thread
    /// and `None` is returned.
    pub fn subscribe<F>(&self, handler: F) -> Option<SubscriptionId>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = lock(&self.state);
        if state.fired {
            drop(state);
            handler();
            return None;
        }
        let id = next_subscription();
        state.handlers.push((id, Box::new(handler)));
        Some(id)
    }

    /// Removes a pending handler. Returns `false` if it already ran or was
    /// never registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = lock(&self.state);
        let before = state.handlers.len();
        state.handlers.retain(|(sid, _)| *sid != id);
        state.handlers.len() != before
    }

    /// Fires the signal. Returns `false` if it had already fired.
    pub fn fire(&self) -> bool {
        let handlers = {
            let mut state = lock(&self.state);
            if state.fired {
                return false;
            }
            state.fired = true;
            std::mem::take(&mut state.handlers)
        };
        for (_, handler) in handlers {
            handler();
        }
        true
    }

    /// Drops pending handlers without firing them.
    pub fn clear(&self) { lock(&self.state).handlers.clear(); }
}
