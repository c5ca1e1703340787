pub mod bus;
pub mod client;
pub mod error;
pub mod proxy;
pub mod wrapper;

use async_broadcast::Receiver;

pub use self::bus::BusEvent;
pub use self::error::ServiceError;
pub use self::wrapper::{Notification, NotificationAction, NotificationManager};

/// What the popups need from a notification daemon.
pub trait NotificationBus {
    fn get_notification(&self, id: u32) -> Option<Notification>;
    fn subscribe(&self) -> Receiver<BusEvent>;
    fn dismiss(&self, id: u32) -> Result<(), ServiceError>;
    fn invoke_action(&self, id: u32, action_key: &str) -> Result<(), ServiceError>;
}

impl NotificationBus for NotificationManager {
    fn get_notification(&self, id: u32) -> Option<Notification> {
        NotificationManager::get_notification(self, id)
    }

    fn subscribe(&self) -> Receiver<BusEvent> {
        NotificationManager::subscribe(self)
    }

    fn dismiss(&self, id: u32) -> Result<(), ServiceError> {
        NotificationManager::dismiss(self, id)
    }

    fn invoke_action(&self, id: u32, action_key: &str) -> Result<(), ServiceError> {
        NotificationManager::invoke_action(self, id, action_key)
    }
}
