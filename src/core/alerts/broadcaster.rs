//! Observer hub for store snapshots.
//!
//! Observers are invoked synchronously with the complete ordered list, and no
//! lock is held while they run. Every snapshot carries the store version it
//! was taken at; a snapshot older than one already accepted is dropped, so
//! concurrent writers can never leave observers looking at a stale state.
//!
//! Deliveries are serialized through a queue. A publish (or subscribe) that
//! arrives while another delivery is running, including one made from inside
//! an observer, is queued and delivered by the thread already draining it.
//! A panicking observer is logged and skipped.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

pub type Observer<T> = Arc<dyn Fn(&[T]) + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    observers: Vec<(u64, Observer<T>)>,
}

enum Job<T> {
    /// Fan a snapshot out to every registered observer
    Broadcast(Arc<[T]>),
    /// First call for a new subscriber
    Initial(Observer<T>, Arc<[T]>),
}

struct Delivery<T> {
    version: u64,
    latest: Option<Arc<[T]>>,
    /// Some thread is draining `queue`
    draining: bool,
    queue: VecDeque<Job<T>>,
}

struct Shared<T> {
    registry: Mutex<Registry<T>>,
    delivery: Mutex<Delivery<T>>,
}

pub struct Broadcaster<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Default for Broadcaster<T> {
    fn default() -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry {
                    next_id: 0,
                    observers: Vec::new(),
                }),
                delivery: Mutex::new(Delivery {
                    version: 0,
                    latest: None,
                    draining: false,
                    queue: VecDeque::new(),
                }),
            }),
        }
    }
}

fn notify<T>(observer: &Observer<T>, snapshot: &[T]) {
    if panic::catch_unwind(AssertUnwindSafe(|| observer(snapshot))).is_err() {
        log::error!("Observer panicked; continuing with the remaining observers");
    }
}

impl<T: Send + Sync + 'static> Broadcaster<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn delivery(&self) -> MutexGuard<'_, Delivery<T>> {
        match self.shared.delivery.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn observers(&self) -> Vec<Observer<T>> {
        match self.shared.registry.lock() {
            Ok(registry) => registry.observers.iter().map(|(_, o)| o.clone()).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Run queued jobs until the queue is empty, releasing the lock around
    /// every observer call. Returns at once if another call is draining.
    fn drain<'a>(&'a self, mut delivery: MutexGuard<'a, Delivery<T>>) {
        if delivery.draining {
            return;
        }
        delivery.draining = true;

        loop {
            let job = match delivery.queue.pop_front() {
                Some(job) => job,
                None => break,
            };
            drop(delivery);

            match job {
                Job::Broadcast(snapshot) => {
                    for observer in self.observers() {
                        notify(&observer, &snapshot);
                    }
                }
                Job::Initial(observer, snapshot) => notify(&observer, &snapshot),
            }

            delivery = self.delivery();
        }

        delivery.draining = false;
    }

    /// Register `observer` and invoke it once with the current state: `current`
    /// (taken at `version`) or a newer snapshot if one was already accepted.
    ///
    /// When no other delivery is in flight the call happens before this
    /// returns; otherwise it is queued behind the running delivery.
    pub fn subscribe(&self, observer: Observer<T>, version: u64, current: Arc<[T]>) -> Subscription {
        let mut delivery = self.delivery();

        let id = match self.shared.registry.lock() {
            Ok(mut registry) => {
                let id = registry.next_id;
                registry.next_id += 1;
                registry.observers.push((id, observer.clone()));
                Some(id)
            }
            Err(_) => {
                log::error!("Observer registry poisoned; subscription not recorded");
                None
            }
        };

        let initial = match &delivery.latest {
            Some(latest) if delivery.version > version => latest.clone(),
            _ => current,
        };
        delivery.queue.push_back(Job::Initial(observer, initial));
        self.drain(delivery);

        let weak: Weak<Shared<T>> = Arc::downgrade(&self.shared);
        Subscription {
            cancel: Mutex::new(id.map(|id| {
                Box::new(move || {
                    if let Some(shared) = weak.upgrade() {
                        if let Ok(mut registry) = shared.registry.lock() {
                            registry.observers.retain(|(oid, _)| *oid != id);
                        }
                    }
                }) as Box<dyn FnOnce() + Send>
            })),
        }
    }

    /// Deliver `snapshot` to every observer unless a newer version was already
    /// accepted.
    pub fn publish(&self, version: u64, snapshot: Arc<[T]>) {
        let mut delivery = self.delivery();
        if version <= delivery.version {
            log::debug!(
                "Skipping stale broadcast v{} (delivered v{})",
                version,
                delivery.version
            );
            return;
        }
        delivery.version = version;
        delivery.latest = Some(snapshot.clone());
        delivery.queue.push_back(Job::Broadcast(snapshot));
        self.drain(delivery);
    }

    pub fn observer_count(&self) -> usize {
        self.shared
            .registry
            .lock()
            .map(|r| r.observers.len())
            .unwrap_or(0)
    }
}

/// Handle returned by `subscribe`. Dropping it does not unsubscribe.
pub struct Subscription {
    cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    /// Stop further deliveries to this observer. Safe to call repeatedly.
    pub fn unsubscribe(&self) {
        let cancel = match self.cancel.lock() {
            Ok(mut cancel) => cancel.take(),
            Err(_) => None,
        };
        if let Some(cancel) = cancel {
            cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn snapshot(items: &[u32]) -> Arc<[u32]> {
        Arc::from(items.to_vec())
    }

    fn recording_observer() -> (Observer<u32>, Arc<Mutex<Vec<Vec<u32>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let observer: Observer<u32> = Arc::new(move |items: &[u32]| {
            sink.lock().unwrap().push(items.to_vec());
        });
        (observer, seen)
    }

    #[test]
    fn test_subscribe_invokes_immediately_even_when_empty() {
        let hub = Broadcaster::<u32>::new();
        let (observer, seen) = recording_observer();

        hub.subscribe(observer, 0, snapshot(&[]));
        assert_eq!(*seen.lock().unwrap(), vec![Vec::<u32>::new()]);
    }

    #[test]
    fn test_unsubscribe_only_affects_its_observer() {
        let hub = Broadcaster::<u32>::new();
        let (first, first_seen) = recording_observer();
        let (second, second_seen) = recording_observer();

        let first_sub = hub.subscribe(first, 0, snapshot(&[]));
        let _second_sub = hub.subscribe(second, 0, snapshot(&[]));

        hub.publish(1, snapshot(&[1]));
        first_sub.unsubscribe();
        first_sub.unsubscribe();
        hub.publish(2, snapshot(&[2, 1]));

        assert_eq!(first_seen.lock().unwrap().len(), 2);
        assert_eq!(second_seen.lock().unwrap().last().unwrap(), &vec![2, 1]);
        assert_eq!(hub.observer_count(), 1);
    }

    #[test]
    fn test_stale_versions_are_dropped() {
        let hub = Broadcaster::<u32>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let _sub = hub.subscribe(
            Arc::new(move |_: &[u32]| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            0,
            snapshot(&[]),
        );

        hub.publish(3, snapshot(&[3]));
        hub.publish(2, snapshot(&[2]));
        hub.publish(3, snapshot(&[3]));

        // initial call + v3 only
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_late_subscriber_gets_newer_delivered_snapshot() {
        let hub = Broadcaster::<u32>::new();
        hub.publish(5, snapshot(&[5, 4]));

        let (observer, seen) = recording_observer();
        hub.subscribe(observer, 4, snapshot(&[4]));

        assert_eq!(*seen.lock().unwrap(), vec![vec![5, 4]]);
    }

    #[test]
    fn test_observer_may_publish_from_its_callback() {
        let hub = Arc::new(Broadcaster::<u32>::new());
        let (observer, seen) = recording_observer();
        let _recorder = hub.subscribe(observer, 0, snapshot(&[]));

        let inner = hub.clone();
        let _chained = hub.subscribe(
            Arc::new(move |items: &[u32]| {
                if *items == [1] {
                    inner.publish(2, snapshot(&[2, 1]));
                }
            }),
            0,
            snapshot(&[]),
        );

        hub.publish(1, snapshot(&[1]));

        // the nested publish is delivered after the outer one completes
        assert_eq!(
            *seen.lock().unwrap(),
            vec![vec![], vec![1], vec![2, 1]]
        );
    }

    #[test]
    fn test_observer_may_subscribe_from_its_callback() {
        let hub = Arc::new(Broadcaster::<u32>::new());
        let (late, late_seen) = recording_observer();
        let late = Mutex::new(Some(late));
        let subs = Arc::new(Mutex::new(Vec::new()));

        let (inner, held) = (hub.clone(), subs.clone());
        let _first = hub.subscribe(
            Arc::new(move |items: &[u32]| {
                if items.is_empty() {
                    return;
                }
                let observer = late.lock().unwrap().take();
                if let Some(observer) = observer {
                    held.lock().unwrap().push(inner.subscribe(observer, 0, snapshot(&[])));
                }
            }),
            0,
            snapshot(&[]),
        );

        hub.publish(1, snapshot(&[1]));
        assert_eq!(*late_seen.lock().unwrap(), vec![vec![1]]);
        assert_eq!(subs.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_panicking_observer_does_not_block_others() {
        let hub = Broadcaster::<u32>::new();
        let _faulty = hub.subscribe(
            Arc::new(|items: &[u32]| {
                if !items.is_empty() {
                    panic!("observer bug");
                }
            }),
            0,
            snapshot(&[]),
        );
        let (observer, seen) = recording_observer();
        let _healthy = hub.subscribe(observer, 0, snapshot(&[]));

        hub.publish(1, snapshot(&[1]));
        hub.publish(2, snapshot(&[2, 1]));

        assert_eq!(seen.lock().unwrap().len(), 3);
        assert_eq!(seen.lock().unwrap().last().unwrap(), &vec![2, 1]);
    }

    #[test]
    fn test_unsubscribe_after_hub_dropped_is_harmless() {
        let hub = Broadcaster::<u32>::new();
        let (observer, _) = recording_observer();
        let sub = hub.subscribe(observer, 0, snapshot(&[]));
        drop(hub);
        sub.unsubscribe();
    }
}
