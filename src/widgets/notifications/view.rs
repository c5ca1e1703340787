use std::fmt::Write as _;
use chrono::TimeZone as _;
use serde::Serialize;

use crate::services::notifications::NotificationAction;
use crate::singletons::notifications::{NotificationRecord, Urgency};
use crate::utils::{filesystem, icons};

/// Answers the two questions the popups cannot answer from the record alone.
pub trait Lookup {
    fn icon_exists(&self, name: &str) -> bool;
    fn file_exists(&self, path: &str) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLookup;

impl Lookup for SystemLookup {
    fn icon_exists(&self, name: &str) -> bool {
        icons::icon_exists(name)
    }

    fn file_exists(&self, path: &str) -> bool {
        filesystem::file_exists(path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationView {
    pub id: u32,
    pub app_name: String,
    pub summary: String,
    pub body: Option<String>,
    pub has_content: bool,
    pub time: Option<String>,
    pub urgency: Urgency,
    pub icon: Option<String>,
    pub has_icon: bool,
    pub image: Option<String>,
    pub has_preview: bool,
    pub has_icon_preview: bool,
    pub has_actions: bool,
    pub actions: Vec<NotificationAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopupState {
    pub visible: bool,
    pub notifications: Vec<NotificationView>,
}

/// Formats unix seconds in local time. `None` for out-of-range timestamps or a
/// bad format string.
pub fn format_time(timestamp: i64, format: &str) -> Option<String> {
    let time = chrono::Local.timestamp_opt(timestamp, 0).single()?;
    let mut formatted = String::new();
    write!(formatted, "{}", time.format(format)).ok()?;
    Some(formatted)
}

impl NotificationView {
    pub fn build(record: &NotificationRecord, time_format: &str, lookup: &dyn Lookup) -> Self {
        let has_icon = record.app_icon.is_some()
            || record.desktop_entry.as_deref().is_some_and(|entry| lookup.icon_exists(entry));

        let image = record.image.clone();
        let has_preview = image.as_deref().is_some_and(|path| lookup.file_exists(path));
        let has_icon_preview = image.as_deref().is_some_and(|name| lookup.icon_exists(name));

        NotificationView {
            id: record.id,
            app_name: record.app_name.clone(),
            summary: record.summary.clone(),
            body: record.body.clone(),
            has_content: record.has_content(),
            time: format_time(record.timestamp, time_format),
            urgency: record.urgency,
            icon: record.icon_name().map(str::to_owned),
            has_icon,
            image,
            has_preview,
            has_icon_preview,
            has_actions: record.has_actions(),
            actions: record.actions.clone(),
        }
    }
}

impl PopupState {
    pub fn build(records: &[NotificationRecord], visible: bool, time_format: &str, lookup: &dyn Lookup) -> Self {
        PopupState {
            visible,
            notifications: records
                .iter()
                .map(|record| NotificationView::build(record, time_format, lookup))
                .collect(),
        }
    }
}
