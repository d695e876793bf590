//! Observable value cells.
//!
//! A [`Store`] holds exactly one current value. Consumers read it, subscribe
//! to changes, or await a value matching a predicate. Writing is reserved for
//! the call-state containers of this crate; a consumer holding a `Store` can
//! never overwrite it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::Notify;

type Subscriber<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct StoreInner<T> {
    /// Held across a write and its deliveries so subscribers and waiters see
    /// writes in the order they happened. Always taken before `value`.
    publish: Mutex<()>,
    value: Mutex<T>,
    subscribers: Mutex<Vec<(u64, Subscriber<T>)>>,
    next_subscriber: AtomicU64,
    writes: AtomicU64,
    changed: Notify,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A shared, observable single-value cell.
///
/// Cloning a `Store` clones the handle; all clones observe the same value.
///
/// # Example
///
/// ```
/// use storerpc_client::{CallResult, StoreClient};
///
/// let client = StoreClient::inert();
/// let store = client.path("user.get").now(vec![]).unwrap();
///
/// let _sub = store.subscribe(|state| println!("{:?}", state));
/// assert_eq!(store.get(), CallResult::Loading);
/// ```
pub struct Store<T> {
    inner: Arc<StoreInner<T>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("value", &*lock(&self.inner.value))
            .field("writes", &self.inner.writes.load(Ordering::Acquire))
            .finish()
    }
}

impl<T: Clone + Send + 'static> Store<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            inner: Arc::new(StoreInner::new(value)),
        }
    }

    /// Builds a store whose initial value may hold a weak handle to the store
    /// itself.
    pub(crate) fn new_cyclic(init: impl FnOnce(&WeakStore<T>) -> T) -> Self {
        let inner = Arc::new_cyclic(|weak| {
            let handle = WeakStore {
                inner: Weak::clone(weak),
            };
            StoreInner::new(init(&handle))
        });
        Self { inner }
    }

    /// Returns a clone of the current value.
    pub fn get(&self) -> T {
        lock(&self.inner.value).clone()
    }

    /// Runs `f` against the current value without cloning it.
    ///
    /// `f` runs under the store's lock and must not read the same store.
    /// Inside a subscriber callback this sees the value being delivered.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&lock(&self.inner.value))
    }

    /// Number of writes since creation.
    pub fn writes(&self) -> u64 {
        self.inner.writes.load(Ordering::Acquire)
    }

    /// Whether both handles point at the same cell.
    pub fn ptr_eq(&self, other: &Store<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakStore<T> {
        WeakStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Replaces the current value and notifies every subscriber.
    pub(crate) fn set(&self, value: T) {
        let _publishing = lock(&self.inner.publish);
        {
            let mut current = lock(&self.inner.value);
            *current = value.clone();
        }
        self.publish(value);
    }

    /// Replaces the current value with one derived from it, atomically with
    /// respect to other writers.
    pub(crate) fn update(&self, f: impl FnOnce(&T) -> T) {
        let _publishing = lock(&self.inner.publish);
        let value = {
            let mut current = lock(&self.inner.value);
            let next = f(&current);
            *current = next.clone();
            next
        };
        self.publish(value);
    }

    /// Delivers a write. The caller holds the publish lock.
    fn publish(&self, value: T) {
        self.inner.writes.fetch_add(1, Ordering::AcqRel);

        // Callbacks run outside the value and subscriber locks so they may
        // read the store.
        let subscribers: Vec<Subscriber<T>> = lock(&self.inner.subscribers)
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();
        for subscriber in subscribers {
            subscriber(&value);
        }

        self.inner.changed.notify_waiters();
    }

    /// Registers `f` to run on every write.
    ///
    /// `f` is called once immediately with the current value and then once
    /// per write, in write order. It may read the store but must not
    /// subscribe to it. Dropping the returned [`Subscription`] unregisters it.
    pub fn subscribe(&self, f: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let subscriber: Subscriber<T> = Arc::new(f);

        {
            // No write can slip between registration and the first delivery.
            let _publishing = lock(&self.inner.publish);
            lock(&self.inner.subscribers).push((id, Arc::clone(&subscriber)));
            let current = self.get();
            subscriber(&current);
        }

        let weak = Arc::downgrade(&self.inner);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    lock(&inner.subscribers).retain(|(other, _)| *other != id);
                }
            })),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.subscribers).len()
    }

    /// Waits until the current value satisfies `predicate` and returns it.
    ///
    /// Returns immediately if the current value already matches. A value is
    /// only matched once every subscriber has received it.
    pub async fn wait_for(&self, mut predicate: impl FnMut(&T) -> bool) -> T {
        loop {
            let notified = self.inner.changed.notified();
            tokio::pin!(notified);
            // Register before checking so a write between the check and the
            // await is not missed.
            notified.as_mut().enable();

            let matched = {
                let _published = lock(&self.inner.publish);
                let current = lock(&self.inner.value);
                predicate(&current).then(|| current.clone())
            };
            if let Some(value) = matched {
                return value;
            }

            notified.await;
        }
    }
}

impl<T> StoreInner<T> {
    fn new(value: T) -> Self {
        Self {
            publish: Mutex::new(()),
            value: Mutex::new(value),
            subscribers: Mutex::new(Vec::new()),
            next_subscriber: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            changed: Notify::new(),
        }
    }
}

/// Non-owning handle to a [`Store`].
pub(crate) struct WeakStore<T> {
    inner: Weak<StoreInner<T>>,
}

impl<T> Clone for WeakStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> WeakStore<T> {
    pub(crate) fn upgrade(&self) -> Option<Store<T>> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

/// Keeps a [`Store::subscribe`] callback registered until dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Unregisters the callback now.
    pub fn unsubscribe(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_get_and_set() {
        let store = Store::new(1);
        assert_eq!(store.get(), 1);
        store.set(2);
        assert_eq!(store.get(), 2);
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn test_subscribe_receives_current_then_every_write() {
        let store = Store::new(0);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let _sub = store.subscribe(move |v| sink.lock().unwrap().push(*v));

        store.set(1);
        store.set(1);
        store.set(2);

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 1, 2]);
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let store = Store::new(0);
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let sub = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(store.subscriber_count(), 1);

        drop(sub);
        assert_eq!(store.subscriber_count(), 0);

        store.set(5);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_explicit_unsubscribe() {
        let store = Store::new("a".to_string());
        let sub = store.subscribe(|_| {});
        sub.unsubscribe();
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_subscriber_may_read_store() {
        let store = Store::new(10);
        let reader = store.clone();
        let seen = Arc::new(AtomicUsize::new(0));

        let sink = Arc::clone(&seen);
        let _sub = store.subscribe(move |_| {
            sink.store(reader.get(), Ordering::SeqCst);
        });

        store.set(42);
        assert_eq!(seen.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn test_update_derives_from_current() {
        let store = Store::new(vec![1]);
        store.update(|v| {
            let mut next = v.clone();
            next.push(2);
            next
        });
        assert_eq!(store.get(), vec![1, 2]);
    }

    #[test]
    fn test_clones_share_value() {
        let a = Store::new(1);
        let b = a.clone();
        a.set(9);
        assert_eq!(b.get(), 9);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&Store::new(9)));
    }

    #[test]
    fn test_weak_store_does_not_keep_cell_alive() {
        let store = Store::new(1);
        let weak = store.downgrade();
        assert!(weak.upgrade().is_some());
        drop(store);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_new_cyclic_sees_itself() {
        let store = Store::new_cyclic(|weak: &WeakStore<u32>| {
            assert!(weak.upgrade().is_none());
            7
        });
        assert_eq!(store.get(), 7);
    }

    #[tokio::test]
    async fn test_wait_for_already_matching() {
        let store = Store::new(3);
        assert_eq!(store.wait_for(|v| *v == 3).await, 3);
    }

    #[tokio::test]
    async fn test_wait_for_future_write() {
        let store = Store::new(0);
        let writer = store.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            writer.set(1);
            writer.set(2);
        });

        let value = tokio::time::timeout(Duration::from_secs(2), store.wait_for(|v| *v == 2))
            .await
            .unwrap();
        assert_eq!(value, 2);
    }

    #[test]
    fn test_concurrent_writers_last_delivery_matches_value() {
        for _ in 0..500 {
            let store = Store::new(0);
            let last_seen = Arc::new(AtomicUsize::new(0));

            let sink = Arc::clone(&last_seen);
            let _sub = store.subscribe(move |v| sink.store(*v, Ordering::SeqCst));

            let writers: Vec<_> = [1, 2]
                .into_iter()
                .map(|value| {
                    let writer = store.clone();
                    std::thread::spawn(move || writer.set(value))
                })
                .collect();
            for writer in writers {
                writer.join().unwrap();
            }

            assert_eq!(last_seen.load(Ordering::SeqCst), store.get());
        }
    }

    #[test]
    fn test_subscribe_racing_a_write_ends_on_current_value() {
        for _ in 0..500 {
            let store = Store::new(0);
            let writer = store.clone();
            let handle = std::thread::spawn(move || writer.set(1));

            let last_seen = Arc::new(AtomicUsize::new(usize::MAX));
            let sink = Arc::clone(&last_seen);
            let _sub = store.subscribe(move |v| sink.store(*v, Ordering::SeqCst));
            handle.join().unwrap();

            assert_eq!(last_seen.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_wait_for_returns_after_subscribers_saw_the_value() {
        for _ in 0..500 {
            let store = Store::new(0);
            let seen = Arc::new(Mutex::new(Vec::new()));

            let sink = Arc::clone(&seen);
            let _sub = store.subscribe(move |v| sink.lock().unwrap().push(*v));

            let writer = store.clone();
            tokio::spawn(async move { writer.set(1) });

            tokio::time::timeout(Duration::from_secs(2), store.wait_for(|v| *v == 1))
                .await
                .unwrap();
            assert_eq!(seen.lock().unwrap().last(), Some(&1));
        }
    }
}
