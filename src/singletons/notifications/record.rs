use serde::Serialize;

use crate::services::notifications::{Notification, NotificationAction};
use super::urgency::{self, Urgency};

pub const DEFAULT_APP_NAME: &str = "Application";
pub const DEFAULT_SUMMARY: &str = "New notification";

/// One popup, as seen by the store and the render layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRecord {
    pub id: u32,
    pub app_name: String,
    pub summary: String,
    pub body: Option<String>,
    pub timestamp: i64,
    pub urgency: Urgency,
    pub app_icon: Option<String>,
    pub desktop_entry: Option<String>,
    pub image: Option<String>,
    pub actions: Vec<NotificationAction>,
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}

impl NotificationRecord {
    pub fn new(id: u32, timestamp: i64) -> Self {
        NotificationRecord {
            id,
            app_name: DEFAULT_APP_NAME.to_owned(),
            summary: DEFAULT_SUMMARY.to_owned(),
            body: None,
            timestamp,
            urgency: Urgency::Normal,
            app_icon: None,
            desktop_entry: None,
            image: None,
            actions: Vec::new(),
        }
    }

    pub fn has_content(&self) -> bool {
        self.body.is_some()
    }

    pub fn has_actions(&self) -> bool {
        !self.actions.is_empty()
    }

    /// Icon name for the header: the app icon, else the desktop entry.
    pub fn icon_name(&self) -> Option<&str> {
        self.app_icon.as_deref().or(self.desktop_entry.as_deref())
    }
}

impl From<&Notification> for NotificationRecord {
    fn from(notification: &Notification) -> Self {
        let mut record = NotificationRecord::new(notification.id, notification.timestamp);

        if let Some(app_name) = non_empty(&notification.app_name) {
            record.app_name = app_name;
        }

        if let Some(summary) = non_empty(&notification.summary) {
            record.summary = summary;
        }

        record.body = non_empty(&notification.body);
        record.urgency = urgency::classify(notification.urgency());
        record.app_icon = non_empty(&notification.app_icon);
        record.desktop_entry = notification.desktop_entry().and_then(non_empty);
        record.image = notification.image_path().and_then(non_empty);
        record.actions = notification.actions.clone();
        record
    }
}
