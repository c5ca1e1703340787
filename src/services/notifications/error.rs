use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("D-Bus error: {0}")]
    DBus(#[from] dbus::Error),

    #[error("{0} is already owned by another notification daemon")]
    NameTaken(&'static str),

    #[error("the shared D-Bus connection has not been initialized")]
    NotConnected,

    #[error("notification {0} does not exist")]
    UnknownNotification(u32),

    #[error("notification table lock was poisoned")]
    Poisoned,
}

impl From<ServiceError> for dbus::MethodErr {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::UnknownNotification(id) => {
                dbus::MethodErr::invalid_arg(&format!("notification {} does not exist", id))
            },

            other => dbus::MethodErr::failed(&other),
        }
    }
}
