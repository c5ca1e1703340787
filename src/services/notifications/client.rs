use std::time::Duration;
use dbus::arg::{PropMap, Variant};

use super::bus;

const CLIENT_TIMEOUT: Duration = Duration::from_secs(1);

/// Sends notifications to whichever daemon owns the bus name, ourselves included.
#[derive(Default, Clone)]
pub struct NotificationBuilder {
    app_name: Option<String>,
    replaces_id: Option<u32>,
    app_icon: Option<String>,
    summary: Option<String>,
    body: Option<String>,
    actions: Vec<(String, String)>,
    urgency: Option<u8>,
    image_path: Option<String>,
    desktop_entry: Option<String>,
    expire_timeout: Option<i32>,
}

impl NotificationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn app_name(mut self, app_name: &str) -> Self {
        self.app_name = Some(app_name.to_owned());
        self
    }

    pub fn replaces_id(mut self, replaces_id: u32) -> Self {
        self.replaces_id = Some(replaces_id);
        self
    }

    pub fn app_icon(mut self, app_icon: &str) -> Self {
        self.app_icon = Some(app_icon.to_owned());
        self
    }

    pub fn summary(mut self, summary: &str) -> Self {
        self.summary = Some(summary.to_owned());
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = Some(body.to_owned());
        self
    }

    pub fn action(mut self, key: &str, label: &str) -> Self {
        self.actions.push((key.to_owned(), label.to_owned()));
        self
    }

    pub fn urgency(mut self, urgency: u8) -> Self {
        self.urgency = Some(urgency);
        self
    }

    pub fn image_path(mut self, image_path: &str) -> Self {
        self.image_path = Some(image_path.to_owned());
        self
    }

    pub fn desktop_entry(mut self, desktop_entry: &str) -> Self {
        self.desktop_entry = Some(desktop_entry.to_owned());
        self
    }

    pub fn expire_timeout(mut self, expire_timeout: i32) -> Self {
        self.expire_timeout = Some(expire_timeout);
        self
    }

    fn hints(&self) -> PropMap {
        let mut hints = PropMap::new();

        if let Some(urgency) = self.urgency {
            hints.insert("urgency".to_owned(), Variant(Box::new(urgency)));
        }

        if let Some(image_path) = &self.image_path {
            hints.insert("image-path".to_owned(), Variant(Box::new(image_path.clone())));
        }

        if let Some(desktop_entry) = &self.desktop_entry {
            hints.insert("desktop-entry".to_owned(), Variant(Box::new(desktop_entry.clone())));
        }

        hints
    }

    fn flat_actions(&self) -> Vec<String> {
        // Even elements are identifiers, odd elements are localized names
        self.actions
            .iter()
            .flat_map(|(key, label)| [key.clone(), label.clone()])
            .collect()
    }

    pub fn send(self) -> Result<u32, dbus::Error> {
        let connection = dbus::blocking::Connection::new_session()?;
        let proxy = connection.with_proxy(
            bus::NOTIFICATIONS_DBUS_BUS,
            bus::NOTIFICATIONS_DBUS_OBJECT,
            CLIENT_TIMEOUT,
        );

        let hints = self.hints();
        let actions = self.flat_actions();

        let (id,): (u32,) = proxy.method_call(
            bus::NOTIFICATIONS_DBUS_INTERFACE,
            "Notify",
            (
                self.app_name.unwrap_or_default(),
                self.replaces_id.unwrap_or(0),
                self.app_icon.unwrap_or_default(),
                self.summary.unwrap_or_default(),
                self.body.unwrap_or_default(),
                actions,
                hints,
                self.expire_timeout.unwrap_or(-1),
            ),
        )?;

        Ok(id)
    }
}
