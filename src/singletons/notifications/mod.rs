pub mod adapter;
pub mod freshness;
pub mod record;
pub mod store;
pub mod urgency;

use std::rc::Rc;
use std::time::Duration;

use crate::config::{self, NotificationsConfig};
use crate::services::notifications::{wrapper, NotificationManager};
use self::adapter::BusAdapter;
use self::store::{NotificationStore, StoreConfig};

pub use self::record::NotificationRecord;
pub use self::urgency::Urgency;

pub type NotificationPopups = BusAdapter<NotificationManager>;

impl From<&NotificationsConfig> for StoreConfig {
    fn from(config: &NotificationsConfig) -> Self {
        StoreConfig {
            expiry: config.expiry(),
            freshness: config.freshness(),
        }
    }
}

/// Starts the notification daemon and the popup store behind it.
///
/// Returns `None` when popups are disabled or the bus cannot be claimed; the
/// rest of the shell keeps running without them.
pub async fn activate(config: &NotificationsConfig) -> Option<NotificationPopups> {
    if !config.enabled {
        info!("Notification popups are disabled");
        return None;
    }

    if let Err(err) = wrapper::init_shared_connection().await {
        error!(%err, "Notification daemon unavailable, popups disabled");
        return None;
    }

    let manager = NotificationManager::default();
    let store = NotificationStore::new(StoreConfig::from(config));

    // Subscribe before serving so no early notification is missed
    let popups = BusAdapter::attach(Rc::new(manager.clone()), store);

    if let Err(err) = manager.serve() {
        error!(%err, "Failed to serve notifications, popups disabled");
        return None;
    }

    info!(
        expiry = config.expiry_seconds,
        freshness = config.freshness_seconds,
        "Notification popups active"
    );

    Some(popups)
}

/// Re-reads the notification settings every `tick` and hands changed
/// durations to `store`, so edits to the config file apply without a restart.
pub fn follow_config(store: &NotificationStore, tick: Duration) {
    let store = store.clone();

    tokio::task::spawn_local(async move {
        let mut interval = tokio::time::interval(tick);

        while !store.is_torn_down() {
            interval.tick().await;
            store.set_config(StoreConfig::from(&config::read_config().notifications));
        }
    });
}
