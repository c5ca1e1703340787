//! Server side of the `org.freedesktop.Notifications` interface.
//!
//! https://specifications.freedesktop.org/notification-spec/latest/protocol.html

use dbus::arg::PropMap;
use dbus_crossroads::{Crossroads, IfaceBuilder, IfaceToken};

use super::bus::NOTIFICATIONS_DBUS_INTERFACE;

pub trait OrgFreedesktopNotifications {
    #[allow(clippy::too_many_arguments)]
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
    ) -> Result<u32, dbus::MethodErr>;
    fn close_notification(&mut self, id: u32) -> Result<(), dbus::MethodErr>;
    fn get_capabilities(&mut self) -> Result<Vec<String>, dbus::MethodErr>;
    fn get_server_information(&mut self) -> Result<(String, String, String, String), dbus::MethodErr>;
}

pub const NOTIFICATION_CLOSED_SIGNAL: &str = "NotificationClosed";
pub const ACTION_INVOKED_SIGNAL: &str = "ActionInvoked";

pub fn register_org_freedesktop_notifications<T>(cr: &mut Crossroads) -> IfaceToken<T>
where
    T: OrgFreedesktopNotifications + Send + 'static,
{
    cr.register(NOTIFICATIONS_DBUS_INTERFACE, |b: &mut IfaceBuilder<T>| {
        b.signal::<(u32, u32), _>(NOTIFICATION_CLOSED_SIGNAL, ("id", "reason"));
        b.signal::<(u32, String), _>(ACTION_INVOKED_SIGNAL, ("id", "action_key"));

        b.method(
            "Notify",
            ("app_name", "replaces_id", "app_icon", "summary", "body", "actions", "hints", "expire_timeout"),
            ("id",),
            |_, t: &mut T, (app_name, replaces_id, app_icon, summary, body, actions, hints, expire_timeout): (String, u32, String, String, String, Vec<String>, PropMap, i32)| {
                t.notify(app_name, replaces_id, app_icon, summary, body, actions, hints, expire_timeout)
                    .map(|id| (id,))
            },
        );

        b.method("CloseNotification", ("id",), (), |_, t: &mut T, (id,): (u32,)| {
            t.close_notification(id)
        });

        b.method("GetCapabilities", (), ("capabilities",), |_, t: &mut T, _: ()| {
            t.get_capabilities().map(|caps| (caps,))
        });

        b.method("GetServerInformation", (), ("name", "vendor", "version", "spec_version"), |_, t: &mut T, _: ()| {
            t.get_server_information()
        });
    })
}
