use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::time::Duration;
use async_broadcast::Receiver;
use dbus::arg::{PropMap, RefArg as _};
use dbus::channel::{MatchingReceiver as _, Sender as _};
use dbus::message::MatchRule;
use dbus::nonblock::SyncConnection;
use dbus::nonblock::stdintf::org_freedesktop_dbus::RequestNameReply;
use dbus_crossroads::{Crossroads, IfaceToken};
use dbus_tokio::connection;
use serde::Serialize;
use tokio::task::AbortHandle;

use crate::utils::broadcast::BroadcastChannel;
use super::bus::{self, BusEvent};
use super::error::ServiceError;
use super::proxy::{self, OrgFreedesktopNotifications};

static SHARED_CONNECTION: OnceLock<Arc<SyncConnection>> = OnceLock::new();

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCloseReason {
    Expired = 1,
    Dismissed = 2,
    ClosedByCall = 3,
    Undefined = 4,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationHint {
    Urgency(u8),
    Category(String),
    DesktopEntry(String),
    ImagePath(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationAction {
    pub id: String,
    pub localized_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: u32,
    pub app_name: String,
    pub replaces_id: u32,
    pub app_icon: String,
    pub summary: String,
    pub body: String,
    pub actions: Vec<NotificationAction>,
    pub hints: Vec<NotificationHint>,
    pub expire_timeout: i32,
    /// Unix seconds at which the daemon received the notification.
    pub timestamp: i64,
}

impl Notification {
    pub fn urgency(&self) -> Option<u8> {
        self.hints.iter().find_map(|hint| match hint {
            NotificationHint::Urgency(u) => Some(*u),
            _ => None,
        })
    }

    pub fn category(&self) -> Option<&str> {
        self.hints.iter().find_map(|hint| match hint {
            NotificationHint::Category(c) => Some(c.as_str()),
            _ => None,
        })
    }

    pub fn desktop_entry(&self) -> Option<&str> {
        self.hints.iter().find_map(|hint| match hint {
            NotificationHint::DesktopEntry(d) => Some(d.as_str()),
            _ => None,
        })
    }

    pub fn image_path(&self) -> Option<&str> {
        self.hints.iter().find_map(|hint| match hint {
            NotificationHint::ImagePath(p) => Some(p.as_str()),
            _ => None,
        })
    }
}

/// Keeps the hints the popups care about. `image-data` is raw pixels and is skipped.
pub fn parse_hints(hints: PropMap) -> Vec<NotificationHint> {
    hints.into_iter().filter_map(|(key, value)| {
        match key.as_str() {
            "urgency" => value.as_u64()
                .or_else(|| value.as_i64().and_then(|i| u64::try_from(i).ok()))
                .and_then(|u| u8::try_from(u).ok())
                .map(NotificationHint::Urgency),
            "category" => value.as_str().map(|s| NotificationHint::Category(s.to_owned())),
            "desktop-entry" => value.as_str().map(|s| NotificationHint::DesktopEntry(s.to_owned())),
            "image-path" | "image_path" => value.as_str().map(|s| NotificationHint::ImagePath(s.to_owned())),
            _ => None,
        }
    }).collect()
}

/// Actions arrive flattened as `[key, label, key, label, ...]`.
pub fn parse_actions(actions: Vec<String>) -> Vec<NotificationAction> {
    let mut actions = actions.into_iter();
    let mut parsed = Vec::new();

    while let (Some(id), Some(localized_name)) = (actions.next(), actions.next()) {
        parsed.push(NotificationAction { id, localized_name });
    }

    parsed
}

/// Pending `expire_timeout` close for one id, tagged so a re-armed timer can
/// tell it has been superseded.
#[derive(Debug)]
struct Expiry {
    generation: u64,
    handle: AbortHandle,
}

#[derive(Debug, Clone)]
pub struct NotificationManager {
    id_counter: Arc<RwLock<u32>>,
    notifications: Arc<RwLock<HashMap<u32, Notification>>>,
    expiries: Arc<Mutex<HashMap<u32, Expiry>>>,
    expiry_generation: Arc<AtomicU64>,
    channel: BroadcastChannel<BusEvent>,
}

impl OrgFreedesktopNotifications for NotificationManager {
    fn notify(
        &mut self,
        app_name: String,
        replaces_id: u32,
        app_icon: String,
        summary: String,
        body: String,
        actions: Vec<String>,
        hints: PropMap,
        expire_timeout: i32,
    ) -> Result<u32, dbus::MethodErr> {
        let notification = Notification {
            id: 0,
            app_name,
            replaces_id,
            app_icon,
            summary,
            body,
            actions: parse_actions(actions),
            hints: parse_hints(hints),
            expire_timeout,
            timestamp: chrono::Local::now().timestamp(),
        };

        Ok(self.insert(notification)?)
    }

    fn close_notification(&mut self, id: u32) -> Result<(), dbus::MethodErr> {
        Ok(self.close(id, NotificationCloseReason::ClosedByCall)?)
    }

    fn get_capabilities(&mut self) -> Result<Vec<String>, dbus::MethodErr> {
        Ok(vec![
            "body".to_owned(),
            "body-markup".to_owned(),
            "actions".to_owned(),
            "icon-static".to_owned(),
        ])
    }

    fn get_server_information(&mut self) -> Result<(String, String, String, String), dbus::MethodErr> {
        Ok((
            "hlybar".to_owned(),
            "hlybar".to_owned(),
            env!("CARGO_PKG_VERSION").to_owned(),
            "1.2".to_owned(),
        ))
    }
}

impl Default for NotificationManager {
    fn default() -> Self {
        NotificationManager {
            id_counter: Arc::new(RwLock::new(0)),
            notifications: Arc::new(RwLock::new(HashMap::new())),
            expiries: Arc::new(Mutex::new(HashMap::new())),
            expiry_generation: Arc::new(AtomicU64::new(0)),
            channel: BroadcastChannel::new(CHANNEL_CAPACITY),
        }
    }
}

impl NotificationManager {
    /// Subscribes to notification events.
    pub fn subscribe(&self) -> Receiver<BusEvent> {
        self.channel.subscribe()
    }

    pub fn get_notification(&self, id: u32) -> Option<Notification> {
        self.notifications.read().ok()?.get(&id).cloned()
    }

    /// Stores `notification`, either overwriting the live entry named by its
    /// `replaces_id` or under a freshly assigned id.
    pub fn insert(&self, mut notification: Notification) -> Result<u32, ServiceError> {
        let mut notifications = self.notifications.write()
            .map_err(|_| ServiceError::Poisoned)?;

        let replaced = notification.replaces_id > 0 && notifications.contains_key(&notification.replaces_id);

        let id = if replaced {
            notification.replaces_id
        } else {
            let mut id_counter = self.id_counter.write()
                .map_err(|_| ServiceError::Poisoned)?;

            // Ids are never 0 and never reused while still live
            loop {
                *id_counter = id_counter.checked_add(1).unwrap_or(1);
                if !notifications.contains_key(&*id_counter) {
                    break *id_counter;
                }
            }
        };

        notification.id = id;
        debug!(
            id,
            replaced,
            app_name = %notification.app_name,
            category = notification.category().unwrap_or_default(),
            listeners = self.channel.receiver_count(),
            "Received notification"
        );

        let expire_timeout = notification.expire_timeout;
        notifications.insert(id, notification);
        drop(notifications);

        self.schedule_expiry(id, expire_timeout);
        self.channel.send(BusEvent::Notified(id, replaced));
        Ok(id)
    }

    /// Arms a close with reason `Expired` after `expire_timeout` milliseconds,
    /// replacing any earlier one for `id`. Non-positive timeouts never expire.
    fn schedule_expiry(&self, id: u32, expire_timeout: i32) {
        self.cancel_expiry(id);

        let Ok(timeout) = u64::try_from(expire_timeout) else {
            return;
        };

        if timeout == 0 {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(id, "No runtime to expire notification on, keeping it");
            return;
        };

        let Ok(mut expiries) = self.expiries.lock() else {
            return;
        };

        let generation = self.expiry_generation.fetch_add(1, Ordering::Relaxed);
        let manager = self.clone();

        let task = runtime.spawn(async move {
            tokio::time::sleep(Duration::from_millis(timeout)).await;

            let current = manager.expiries.lock().ok().and_then(|mut expiries| {
                let superseded = expiries.get(&id).is_none_or(|expiry| expiry.generation != generation);
                if superseded { None } else { expiries.remove(&id) }
            });

            if current.is_some() && manager.close(id, NotificationCloseReason::Expired).is_ok() {
                debug!(id, timeout, "Notification expired");
            }
        });

        expiries.insert(id, Expiry { generation, handle: task.abort_handle() });
    }

    fn cancel_expiry(&self, id: u32) {
        let expiry = self.expiries.lock().ok().and_then(|mut expiries| expiries.remove(&id));

        if let Some(expiry) = expiry {
            expiry.handle.abort();
        }
    }

    /// Removes a notification and tells both local subscribers and D-Bus clients.
    pub fn close(&self, id: u32, reason: NotificationCloseReason) -> Result<(), ServiceError> {
        let removed = self.notifications.write()
            .map_err(|_| ServiceError::Poisoned)?
            .remove(&id);

        if removed.is_none() {
            return Err(ServiceError::UnknownNotification(id));
        }

        self.cancel_expiry(id);

        debug!(id, ?reason, "Closed notification");
        self.channel.send(BusEvent::Resolved(id, reason));
        emit_notification_closed(id, reason as u32);

        Ok(())
    }

    pub fn dismiss(&self, id: u32) -> Result<(), ServiceError> {
        self.close(id, NotificationCloseReason::Dismissed)
    }

    pub fn invoke_action(&self, id: u32, action_key: &str) -> Result<(), ServiceError> {
        if self.get_notification(id).is_none() {
            return Err(ServiceError::UnknownNotification(id));
        }

        self.channel.send(BusEvent::ActionInvoked(id, action_key.to_owned()));
        emit_notification_action_invoked(id, action_key);

        Ok(())
    }

    /// Serves clients on the shared D-Bus connection, consuming this manager.
    ///
    /// The shared connection must be initialized via `init_shared_connection()` first.
    /// Method calls are dispatched from the connection's receive loop, so nothing
    /// needs to be awaited afterwards.
    pub fn serve(self) -> Result<(), ServiceError> {
        let connection = get_shared_connection().ok_or(ServiceError::NotConnected)?;

        let mut crossroads = Crossroads::new();
        let token: IfaceToken<NotificationManager> = proxy::register_org_freedesktop_notifications(&mut crossroads);

        crossroads.insert(bus::NOTIFICATIONS_DBUS_OBJECT, &[token], self);

        connection.start_receive(
            MatchRule::new_method_call(),
            Box::new(move |msg, conn| {
                if crossroads.handle_message(msg, conn).is_err() {
                    warn!("Failed to handle D-Bus method call");
                }
                true
            }),
        );

        Ok(())
    }
}

/// Initializes the shared D-Bus connection and requests the notifications bus name.
/// Must be called from within a tokio runtime context.
pub async fn init_shared_connection() -> Result<(), ServiceError> {
    let (resource, connection) = connection::new_session_sync()?;

    tokio::spawn(async move {
        let err = resource.await;
        error!(%err, "Lost connection to D-Bus");
    });

    let reply = connection.request_name(
        bus::NOTIFICATIONS_DBUS_BUS,
        false,
        true,
        true,
    ).await?;

    if !matches!(reply, RequestNameReply::PrimaryOwner | RequestNameReply::AlreadyOwner) {
        return Err(ServiceError::NameTaken(bus::NOTIFICATIONS_DBUS_BUS));
    }

    SHARED_CONNECTION.set(connection)
        .map_err(|_| ServiceError::DBus(dbus::Error::new_failed("Shared connection already initialized")))?;

    Ok(())
}

fn get_shared_connection() -> Option<Arc<SyncConnection>> {
    SHARED_CONNECTION.get().cloned()
}

fn emit_signal(member: &'static str, build: impl FnOnce(dbus::Message) -> dbus::Message) {
    let Some(connection) = get_shared_connection() else {
        debug!(member, "Not emitting D-Bus signal: shared connection not initialized");
        return;
    };

    let signal = build(dbus::Message::signal(
        &bus::NOTIFICATIONS_DBUS_OBJECT.into(),
        &bus::NOTIFICATIONS_DBUS_INTERFACE.into(),
        &member.into(),
    ));

    if connection.send(signal).is_err() {
        error!(member, "Failed to send D-Bus signal");
    }
}

fn emit_notification_closed(id: u32, reason: u32) {
    emit_signal(proxy::NOTIFICATION_CLOSED_SIGNAL, |msg| msg.append2(id, reason));
}

fn emit_notification_action_invoked(id: u32, action_key: &str) {
    emit_signal(proxy::ACTION_INVOKED_SIGNAL, |msg| msg.append2(id, action_key));
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbus::arg::Variant;

    fn notification(summary: &str, replaces_id: u32) -> Notification {
        Notification {
            id: 0,
            app_name: "test".to_owned(),
            replaces_id,
            app_icon: String::new(),
            summary: summary.to_owned(),
            body: String::new(),
            actions: Vec::new(),
            hints: Vec::new(),
            expire_timeout: -1,
            timestamp: 0,
        }
    }

    #[test]
    fn hints_keep_known_keys_only() {
        let mut hints = PropMap::new();
        hints.insert("urgency".to_owned(), Variant(Box::new(2_u8)));
        hints.insert("category".to_owned(), Variant(Box::new("email.arrived".to_owned())));
        hints.insert("desktop-entry".to_owned(), Variant(Box::new("thunderbird".to_owned())));
        hints.insert("image-path".to_owned(), Variant(Box::new("/tmp/a.png".to_owned())));
        hints.insert("x-vendor".to_owned(), Variant(Box::new(7_i32)));

        let mut n = notification("hi", 0);
        n.hints = parse_hints(hints);

        assert_eq!(n.hints.len(), 4);
        assert_eq!(n.urgency(), Some(2));
        assert_eq!(n.category(), Some("email.arrived"));
        assert_eq!(n.desktop_entry(), Some("thunderbird"));
        assert_eq!(n.image_path(), Some("/tmp/a.png"));
    }

    #[test]
    fn actions_are_paired_and_odd_tail_dropped() {
        let actions = parse_actions(vec![
            "default".to_owned(), "Open".to_owned(),
            "reply".to_owned(), "Reply".to_owned(),
            "dangling".to_owned(),
        ]);

        assert_eq!(actions, vec![
            NotificationAction { id: "default".to_owned(), localized_name: "Open".to_owned() },
            NotificationAction { id: "reply".to_owned(), localized_name: "Reply".to_owned() },
        ]);
    }

    #[test]
    fn insert_assigns_ids_and_replaces_live_entries() {
        let manager = NotificationManager::default();
        let mut events = manager.subscribe();

        let first = manager.insert(notification("one", 0)).unwrap();
        let second = manager.insert(notification("two", 0)).unwrap();
        assert_eq!((first, second), (1, 2));

        let replaced = manager.insert(notification("one again", first)).unwrap();
        assert_eq!(replaced, first);
        assert_eq!(manager.get_notification(first).unwrap().summary, "one again");
        assert_eq!(manager.get_notification(second).unwrap().summary, "two");

        // A stale replaces_id gets a new identity
        let fresh = manager.insert(notification("ghost", 99)).unwrap();
        assert_eq!(fresh, 3);

        assert_eq!(events.try_recv().unwrap(), BusEvent::Notified(1, false));
        assert_eq!(events.try_recv().unwrap(), BusEvent::Notified(2, false));
        assert_eq!(events.try_recv().unwrap(), BusEvent::Notified(1, true));
        assert_eq!(events.try_recv().unwrap(), BusEvent::Notified(3, false));
    }

    #[test]
    fn counter_wraparound_skips_live_ids() {
        let manager = NotificationManager::default();
        let first = manager.insert(notification("one", 0)).unwrap();
        let second = manager.insert(notification("two", 0)).unwrap();
        assert_eq!((first, second), (1, 2));

        *manager.id_counter.write().unwrap() = u32::MAX;

        let wrapped = manager.insert(notification("three", 0)).unwrap();
        assert_eq!(wrapped, 3);
        assert_eq!(manager.get_notification(1).unwrap().summary, "one");
        assert_eq!(manager.get_notification(2).unwrap().summary, "two");
    }

    #[tokio::test(start_paused = true)]
    async fn positive_timeouts_close_as_expired() {
        let manager = NotificationManager::default();
        let mut events = manager.subscribe();

        let mut short = notification("short", 0);
        short.expire_timeout = 1_000;
        let id = manager.insert(short).unwrap();
        let forever = manager.insert(notification("forever", 0)).unwrap();

        tokio::time::sleep(Duration::from_millis(1_050)).await;

        assert!(manager.get_notification(id).is_none());
        assert!(manager.get_notification(forever).is_some());
        assert!(manager.expiries.lock().unwrap().is_empty());

        assert_eq!(events.try_recv().unwrap(), BusEvent::Notified(id, false));
        assert_eq!(events.try_recv().unwrap(), BusEvent::Notified(forever, false));
        assert_eq!(events.try_recv().unwrap(), BusEvent::Resolved(id, NotificationCloseReason::Expired));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn replacing_restarts_the_expire_timeout() {
        let manager = NotificationManager::default();

        let mut first = notification("one", 0);
        first.expire_timeout = 1_000;
        let id = manager.insert(first).unwrap();

        tokio::time::sleep(Duration::from_millis(600)).await;

        let mut again = notification("one again", id);
        again.expire_timeout = 1_000;
        manager.insert(again).unwrap();

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(manager.get_notification(id).unwrap().summary, "one again");

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(manager.get_notification(id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn closing_early_cancels_the_expiry() {
        let manager = NotificationManager::default();
        let mut events = manager.subscribe();

        let mut short = notification("short", 0);
        short.expire_timeout = 1_000;
        let id = manager.insert(short).unwrap();
        manager.dismiss(id).unwrap();
        assert!(manager.expiries.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(2_000)).await;

        assert_eq!(events.try_recv().unwrap(), BusEvent::Notified(id, false));
        assert_eq!(events.try_recv().unwrap(), BusEvent::Resolved(id, NotificationCloseReason::Dismissed));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn close_resolves_once() {
        let manager = NotificationManager::default();
        let mut events = manager.subscribe();

        let id = manager.insert(notification("one", 0)).unwrap();
        manager.dismiss(id).unwrap();

        assert!(matches!(manager.dismiss(id), Err(ServiceError::UnknownNotification(1))));
        assert!(manager.get_notification(id).is_none());

        assert_eq!(events.try_recv().unwrap(), BusEvent::Notified(id, false));
        assert_eq!(events.try_recv().unwrap(), BusEvent::Resolved(id, NotificationCloseReason::Dismissed));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn invoking_actions_requires_a_live_notification() {
        let manager = NotificationManager::default();
        let mut events = manager.subscribe();

        assert!(manager.invoke_action(5, "default").is_err());

        let id = manager.insert(notification("one", 0)).unwrap();
        manager.invoke_action(id, "default").unwrap();

        assert_eq!(events.try_recv().unwrap(), BusEvent::Notified(id, false));
        assert_eq!(events.try_recv().unwrap(), BusEvent::ActionInvoked(id, "default".to_owned()));
    }

    #[test]
    fn dbus_notify_stamps_the_arrival_time() {
        let mut manager = NotificationManager::default();
        let before = chrono::Local::now().timestamp();

        let id = manager.notify(
            "app".to_owned(), 0, String::new(), "summary".to_owned(), String::new(),
            vec![], PropMap::new(), -1,
        ).unwrap();

        let stored = manager.get_notification(id).unwrap();
        assert!(stored.timestamp >= before);
        assert!(manager.close_notification(42).is_err());
    }
}
