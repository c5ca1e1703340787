use super::wrapper::NotificationCloseReason;

pub const NOTIFICATIONS_DBUS_BUS: &str = "org.freedesktop.Notifications";
pub const NOTIFICATIONS_DBUS_OBJECT: &str = "/org/freedesktop/Notifications";
pub const NOTIFICATIONS_DBUS_INTERFACE: &str = "org.freedesktop.Notifications";

#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    Notified(u32, bool),                       // id, replaced
    Resolved(u32, NotificationCloseReason),    // id, reason
    ActionInvoked(u32, String),                // id, action_key
}
