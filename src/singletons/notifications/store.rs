use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;
use futures_signals::signal::Mutable;

use crate::utils::timeout::Timeout;
use super::freshness::{self, Clock, SystemClock};
use super::record::NotificationRecord;

pub type ObserverId = usize;
type Observer = Rc<dyn Fn(&[NotificationRecord], bool)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    pub expiry: Duration,
    pub freshness: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            expiry: Duration::from_secs(10),
            freshness: Duration::from_secs(10),
        }
    }
}

struct StoreInner {
    config: StoreConfig,
    clock: Rc<dyn Clock>,
    // Newest first
    notifications: Vec<NotificationRecord>,
    timers: HashMap<u32, Timeout>,
    observers: Vec<(ObserverId, Observer)>,
    next_observer_id: ObserverId,
    visible: Mutable<bool>,
    torn_down: bool,
}

impl StoreInner {
    fn position(&self, id: u32) -> Option<usize> {
        self.notifications.iter().position(|n| n.id == id)
    }

    fn compute_visible(&self) -> bool {
        let now = self.clock.now();
        self.notifications
            .iter()
            .any(|n| freshness::is_fresh(n.timestamp, now, self.config.freshness))
    }
}

/// Ordered, id-unique collection of the popups currently on screen.
///
/// Every record is dropped `expiry` after it was added or last replaced, unless
/// it is removed earlier. Observers run synchronously after each mutation.
/// Single-threaded: timers are local tasks, so the store must live inside a
/// `LocalSet`.
#[derive(Clone)]
pub struct NotificationStore {
    inner: Rc<RefCell<StoreInner>>,
}

impl NotificationStore {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_clock(config, Rc::new(SystemClock))
    }

    pub fn with_clock(config: StoreConfig, clock: Rc<dyn Clock>) -> Self {
        NotificationStore {
            inner: Rc::new(RefCell::new(StoreInner {
                config,
                clock,
                notifications: Vec::new(),
                timers: HashMap::new(),
                observers: Vec::new(),
                next_observer_id: 0,
                visible: Mutable::new(false),
                torn_down: false,
            })),
        }
    }

    /// Inserts `record` at the head and arms its expiry.
    ///
    /// A live record with the same id is dropped first, so ids stay unique.
    pub fn add(&self, record: NotificationRecord) {
        let id = record.id;

        {
            let mut inner = self.inner.borrow_mut();
            if inner.torn_down {
                debug!(id, "Ignoring notification added after teardown");
                return;
            }

            if let Some(index) = inner.position(id) {
                debug!(id, "Notification re-added while live, moving it to the top");
                inner.notifications.remove(index);
            }

            inner.notifications.insert(0, record);
        }

        self.schedule_expiry(id);
        self.notify_observers();
    }

    /// Swaps the live record `id` for `record` without moving it and re-arms its
    /// expiry. Falls back to [`add`](Self::add) when `id` is not live.
    pub fn replace(&self, id: u32, mut record: NotificationRecord) {
        record.id = id;

        {
            let mut inner = self.inner.borrow_mut();
            if inner.torn_down {
                debug!(id, "Ignoring notification replaced after teardown");
                return;
            }

            match inner.position(id) {
                Some(index) => inner.notifications[index] = record,
                None => {
                    drop(inner);
                    debug!(id, "Replacing a notification that is not live, adding it instead");
                    self.add(record);
                    return;
                }
            }
        }

        self.schedule_expiry(id);
        self.notify_observers();
    }

    /// Removes `id` if present. Returns whether anything was removed.
    pub fn remove(&self, id: u32) -> bool {
        let removed = {
            let mut inner = self.inner.borrow_mut();

            if let Some(timer) = inner.timers.remove(&id) {
                timer.cancel();
            }

            match inner.position(id) {
                Some(index) => {
                    inner.notifications.remove(index);
                    true
                },

                None => false,
            }
        };

        if removed {
            self.notify_observers();
        }

        removed
    }

    pub fn contains(&self, id: u32) -> bool {
        self.inner.borrow().position(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().notifications.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the live records, newest first.
    pub fn notifications(&self) -> Vec<NotificationRecord> {
        self.inner.borrow().notifications.clone()
    }

    #[cfg(test)]
    pub fn ids(&self) -> Vec<u32> {
        self.inner.borrow().notifications.iter().map(|n| n.id).collect()
    }

    /// Whether any live record is fresh right now.
    pub fn visible(&self) -> bool {
        self.inner.borrow().compute_visible()
    }

    /// Visibility as of the last mutation or [`refresh_visibility`](Self::refresh_visibility).
    pub fn visible_signal(&self) -> Mutable<bool> {
        self.inner.borrow().visible.clone()
    }

    /// Recomputes visibility against the clock. Observers hear about it only
    /// when the value changed.
    pub fn refresh_visibility(&self) -> bool {
        let (visible, changed) = {
            let inner = self.inner.borrow();
            let visible = inner.compute_visible();
            (visible, visible != inner.visible.get())
        };

        if changed {
            self.notify_observers();
        }

        visible
    }

    #[cfg(test)]
    pub fn pending_timers(&self) -> usize {
        self.inner.borrow().timers.values().filter(|t| t.is_pending()).count()
    }

    pub fn subscribe<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&[NotificationRecord], bool) + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_observer_id;
        inner.next_observer_id += 1;
        inner.observers.push((id, Rc::new(observer)));
        id
    }

    #[cfg(test)]
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.observers.len();
        inner.observers.retain(|(observer_id, _)| *observer_id != id);
        inner.observers.len() != before
    }

    /// Swaps in new durations. Expiry applies from the next add or replace;
    /// freshness applies at once. Returns whether anything changed.
    pub fn set_config(&self, config: StoreConfig) -> bool {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.config == config {
                return false;
            }

            debug!(
                expiry = ?config.expiry,
                freshness = ?config.freshness,
                "Notification store reconfigured"
            );

            inner.config = config;
        }

        self.refresh_visibility();
        true
    }

    /// Cancels every pending expiry and empties the store. Later adds are ignored.
    pub fn teardown(&self) {
        let had_records = {
            let mut inner = self.inner.borrow_mut();
            if inner.torn_down {
                return;
            }

            inner.torn_down = true;

            for (_, timer) in inner.timers.drain() {
                timer.cancel();
            }

            let had_records = !inner.notifications.is_empty();
            inner.notifications.clear();
            had_records
        };

        debug!("Notification store torn down");

        if had_records {
            self.notify_observers();
        }
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.borrow().torn_down
    }

    /// Cancel-and-reschedule: a replaced record gets a full expiry window and the
    /// stale timer never fires.
    fn schedule_expiry(&self, id: u32) {
        let (timer, expiry) = {
            let mut inner = self.inner.borrow_mut();
            let expiry = inner.config.expiry;
            (inner.timers.entry(id).or_default().clone(), expiry)
        };

        let weak: Weak<RefCell<StoreInner>> = Rc::downgrade(&self.inner);

        timer.set(expiry, move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };

            let store = NotificationStore { inner };
            if store.remove(id) {
                debug!(id, "Notification popup expired");
            }
        });
    }

    fn notify_observers(&self) {
        let (snapshot, visible, observers) = {
            let inner = self.inner.borrow();
            let visible = inner.compute_visible();
            inner.visible.set_neq(visible);

            let observers = inner.observers
                .iter()
                .map(|(_, observer)| observer.clone())
                .collect::<Vec<_>>();

            (inner.notifications.clone(), visible, observers)
        };

        for observer in observers {
            observer(&snapshot, visible);
        }
    }
}
