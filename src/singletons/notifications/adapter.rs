use std::cell::RefCell;
use std::rc::Rc;
use async_broadcast::RecvError;
use tokio::task::JoinHandle;

use crate::services::notifications::{BusEvent, NotificationBus, ServiceError};
use super::record::NotificationRecord;
use super::store::NotificationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Added,
    Replaced,
    Removed,
    /// The bus had nothing for the id, so the event was dropped.
    Unresolved,
    Ignored,
}

/// Translates one bus event into store operations.
pub fn handle_event<B>(bus: &B, store: &NotificationStore, event: BusEvent) -> EventOutcome
where
    B: NotificationBus + ?Sized,
{
    match event {
        BusEvent::Notified(id, replaced) => {
            let Some(notification) = bus.get_notification(id) else {
                warn!(id, "Notification not found");
                return EventOutcome::Unresolved;
            };

            let record = NotificationRecord::from(&notification);

            if replaced && store.contains(id) {
                store.replace(id, record);
                EventOutcome::Replaced
            } else {
                store.add(record);
                EventOutcome::Added
            }
        },

        BusEvent::Resolved(id, reason) => {
            if store.remove(id) {
                debug!(id, ?reason, "Notification popup resolved");
            }

            EventOutcome::Removed
        },

        BusEvent::ActionInvoked(id, action_key) => {
            debug!(id, %action_key, "Action invoked");
            EventOutcome::Ignored
        },
    }
}

/// Keeps a store in sync with a notification bus until torn down.
pub struct BusAdapter<B: NotificationBus + 'static> {
    bus: Rc<B>,
    store: NotificationStore,
    listener: RefCell<Option<JoinHandle<()>>>,
}

impl<B: NotificationBus + 'static> BusAdapter<B> {
    /// Subscribes to `bus` and starts forwarding its events on a local task.
    pub fn attach(bus: Rc<B>, store: NotificationStore) -> Self {
        let mut receiver = bus.subscribe();

        let listener = tokio::task::spawn_local({
            let bus = bus.clone();
            let store = store.clone();

            async move {
                loop {
                    match receiver.recv().await {
                        Ok(event) => {
                            handle_event(bus.as_ref(), &store, event);
                        },

                        Err(RecvError::Overflowed(skipped)) => {
                            warn!(skipped, "Notification listener lagged behind the bus");
                        },

                        Err(RecvError::Closed) => {
                            info!("Notification bus closed");
                            break;
                        },
                    }
                }
            }
        });

        BusAdapter {
            bus,
            store,
            listener: RefCell::new(Some(listener)),
        }
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    pub fn is_attached(&self) -> bool {
        !self.store.is_torn_down()
            && self.listener.borrow().as_ref().is_some_and(|listener| !listener.is_finished())
    }

    pub fn dismiss(&self, id: u32) -> Result<(), ServiceError> {
        self.bus.dismiss(id)
    }

    pub fn invoke_action(&self, id: u32, action_key: &str) -> Result<(), ServiceError> {
        self.bus.invoke_action(id, action_key)
    }

    /// Drops the bus subscription, then tears the store down. Idempotent.
    pub fn teardown(&self) {
        if let Some(listener) = self.listener.borrow_mut().take() {
            listener.abort();
        }

        self.store.teardown();
    }
}

impl<B: NotificationBus + 'static> Drop for BusAdapter<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use async_broadcast::Receiver;
    use tokio::task::LocalSet;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt as _};

    use crate::services::notifications::Notification;
    use crate::services::notifications::wrapper::NotificationCloseReason;
    use crate::utils::broadcast::BroadcastChannel;
    use crate::singletons::notifications::store::StoreConfig;
    use crate::singletons::notifications::store::tests::ManualClock;

    const NOW: i64 = 1_700_000_000;

    struct FakeBus {
        notifications: RefCell<HashMap<u32, Notification>>,
        channel: BroadcastChannel<BusEvent>,
        dismissed: RefCell<Vec<u32>>,
    }

    impl FakeBus {
        fn new() -> Self {
            FakeBus {
                notifications: RefCell::new(HashMap::new()),
                channel: BroadcastChannel::new(16),
                dismissed: RefCell::new(Vec::new()),
            }
        }

        fn put(&self, id: u32, summary: &str, timestamp: i64) {
            self.notifications.borrow_mut().insert(id, Notification {
                id,
                app_name: "fake".to_owned(),
                replaces_id: 0,
                app_icon: String::new(),
                summary: summary.to_owned(),
                body: String::new(),
                actions: Vec::new(),
                hints: Vec::new(),
                expire_timeout: -1,
                timestamp,
            });
        }
    }

    impl NotificationBus for FakeBus {
        fn get_notification(&self, id: u32) -> Option<Notification> {
            self.notifications.borrow().get(&id).cloned()
        }

        fn subscribe(&self) -> Receiver<BusEvent> {
            self.channel.subscribe()
        }

        fn dismiss(&self, id: u32) -> Result<(), ServiceError> {
            self.dismissed.borrow_mut().push(id);
            Ok(())
        }

        fn invoke_action(&self, id: u32, _action_key: &str) -> Result<(), ServiceError> {
            Err(ServiceError::UnknownNotification(id))
        }
    }

    #[derive(Clone, Default)]
    struct WarningCounter(Arc<Mutex<usize>>);

    impl<S: Subscriber> Layer<S> for WarningCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == Level::WARN {
                if let Ok(mut count) = self.0.lock() {
                    *count += 1;
                }
            }
        }
    }

    fn store() -> (NotificationStore, ManualClock) {
        let clock = ManualClock::at(NOW);
        (NotificationStore::with_clock(StoreConfig::default(), Rc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn notified_adds_then_replaces_in_place() {
        LocalSet::new().run_until(async {
            let bus = FakeBus::new();
            let (store, _) = store();

            bus.put(1, "first", NOW);
            bus.put(2, "second", NOW);

            assert_eq!(handle_event(&bus, &store, BusEvent::Notified(1, false)), EventOutcome::Added);
            assert_eq!(handle_event(&bus, &store, BusEvent::Notified(2, false)), EventOutcome::Added);

            bus.put(1, "first, edited", NOW);
            assert_eq!(handle_event(&bus, &store, BusEvent::Notified(1, true)), EventOutcome::Replaced);

            assert_eq!(store.ids(), vec![2, 1]);
            assert_eq!(store.notifications()[1].summary, "first, edited");
        }).await;
    }

    #[tokio::test]
    async fn replace_flag_for_a_gone_popup_adds_it_again() {
        LocalSet::new().run_until(async {
            let bus = FakeBus::new();
            let (store, _) = store();

            bus.put(1, "first", NOW);
            bus.put(2, "second", NOW);
            handle_event(&bus, &store, BusEvent::Notified(1, false));
            handle_event(&bus, &store, BusEvent::Notified(2, false));
            store.remove(1);

            assert_eq!(handle_event(&bus, &store, BusEvent::Notified(1, true)), EventOutcome::Added);
            assert_eq!(store.ids(), vec![1, 2]);
        }).await;
    }

    #[tokio::test]
    async fn unresolved_ids_are_dropped_with_one_warning() {
        LocalSet::new().run_until(async {
            let bus = FakeBus::new();
            let (store, _) = store();
            bus.put(1, "first", NOW);
            handle_event(&bus, &store, BusEvent::Notified(1, false));
            let before = store.notifications();

            let counter = WarningCounter::default();
            let subscriber = tracing_subscriber::registry().with(counter.clone());

            let outcome = tracing::subscriber::with_default(subscriber, || {
                handle_event(&bus, &store, BusEvent::Notified(42, false))
            });

            assert_eq!(outcome, EventOutcome::Unresolved);
            assert_eq!(store.notifications(), before);
            assert_eq!(*counter.0.lock().unwrap(), 1);
        }).await;
    }

    #[tokio::test]
    async fn resolved_removes_regardless_of_age() {
        LocalSet::new().run_until(async {
            let bus = FakeBus::new();
            let (store, _) = store();
            bus.put(1, "fresh", NOW - 1);
            handle_event(&bus, &store, BusEvent::Notified(1, false));
            assert!(store.visible());

            let resolved = BusEvent::Resolved(1, NotificationCloseReason::ClosedByCall);
            assert_eq!(handle_event(&bus, &store, resolved.clone()), EventOutcome::Removed);
            assert!(store.is_empty());

            // Unknown ids are fine too
            assert_eq!(handle_event(&bus, &store, resolved), EventOutcome::Removed);
        }).await;
    }

    #[tokio::test]
    async fn action_events_leave_the_store_alone() {
        LocalSet::new().run_until(async {
            let bus = FakeBus::new();
            let (store, _) = store();
            bus.put(1, "first", NOW);
            handle_event(&bus, &store, BusEvent::Notified(1, false));

            let outcome = handle_event(&bus, &store, BusEvent::ActionInvoked(1, "default".to_owned()));
            assert_eq!(outcome, EventOutcome::Ignored);
            assert_eq!(store.ids(), vec![1]);
        }).await;
    }

    #[tokio::test(start_paused = true)]
    async fn attached_adapter_follows_the_bus_until_teardown() {
        LocalSet::new().run_until(async {
            let bus = Rc::new(FakeBus::new());
            let (store, _) = store();
            let changes = Rc::new(Cell::new(0));

            store.subscribe({
                let changes = changes.clone();
                move |_, _| changes.set(changes.get() + 1)
            });

            let adapter = BusAdapter::attach(bus.clone(), store.clone());
            assert!(adapter.is_attached());

            bus.put(1, "first", NOW);
            bus.channel.send(BusEvent::Notified(1, false));
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert_eq!(store.ids(), vec![1]);

            adapter.dismiss(1).unwrap();
            assert_eq!(*bus.dismissed.borrow(), vec![1]);
            assert!(adapter.invoke_action(1, "default").is_err());

            adapter.teardown();
            adapter.teardown();
            tokio::task::yield_now().await;

            assert!(!adapter.is_attached());
            assert!(store.is_torn_down());
            assert_eq!(bus.channel.receiver_count(), 0);

            let changes_at_teardown = changes.get();

            // Neither the bus nor the old expiry reach the store anymore
            bus.put(2, "second", NOW);
            bus.channel.send(BusEvent::Notified(2, false));
            tokio::time::sleep(Duration::from_secs(15)).await;

            assert!(store.is_empty());
            assert_eq!(changes.get(), changes_at_teardown);
        }).await;
    }

    #[tokio::test(start_paused = true)]
    async fn popups_expire_while_the_bus_keeps_them() {
        LocalSet::new().run_until(async {
            let bus = Rc::new(FakeBus::new());
            let (store, _) = store();
            let _adapter = BusAdapter::attach(bus.clone(), store.clone());

            bus.put(1, "first", NOW);
            bus.channel.send(BusEvent::Notified(1, false));

            tokio::time::sleep(Duration::from_millis(10_050)).await;
            assert!(store.is_empty());
            assert!(bus.get_notification(1).is_some());
        }).await;
    }
}
