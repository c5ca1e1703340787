use async_broadcast::{broadcast, InactiveReceiver, Receiver, Sender, TrySendError};

/// Fan-out channel that never blocks the sending side.
///
/// When the buffer is full the oldest message is dropped and lagging receivers
/// observe `RecvError::Overflowed`.
#[derive(Debug, Clone)]
pub struct BroadcastChannel<T> {
    sender: Sender<T>,
    inactive_template: InactiveReceiver<T>,
}

impl<T: Clone> BroadcastChannel<T> {
    pub fn new(buffer: usize) -> Self {
        let (mut sender, receiver) = broadcast(buffer);
        sender.set_overflow(true);

        Self {
            sender,
            // deactivate the initial receiver so it does not back up the buffer
            inactive_template: receiver.deactivate(),
        }
    }

    pub fn subscribe(&self) -> Receiver<T> {
        self.inactive_template.clone().activate()
    }

    /// Sends without waiting. Returns `false` when nobody is listening.
    pub fn send(&self, value: T) -> bool {
        match self.sender.try_broadcast(value) {
            Ok(_) => true,
            Err(TrySendError::Inactive(_)) => false,
            Err(err) => {
                warn!(%err, "Failed to broadcast message");
                false
            }
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
