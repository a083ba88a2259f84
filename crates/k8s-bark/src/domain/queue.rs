//! Bounded FIFO carrying notifications from observers to the dispatcher.
//!
//! Producers never wait: [`NotificationSender::try_enqueue`] hands the notification
//! back when the queue is full so the caller can record the drop. The single
//! consumer suspends in [`NotificationReceiver::recv`] while the queue is empty.

use derive_more::Display;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::error::TrySendError;

use crate::domain::notification::Notification;

/// Capacity of the queue between observers and the dispatcher.
pub const NOTIFICATION_QUEUE_CAPACITY: usize = 10;

/// Creates a queue holding at most `capacity` pending notifications.
pub fn notification_queue(capacity: usize) -> (NotificationSender, NotificationReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        NotificationSender { inner: tx },
        NotificationReceiver { inner: rx },
    )
}

/// Why a notification could not be queued. Carries the rejected notification.
#[derive(Debug, Display)]
pub enum EnqueueError {
    #[display("notification queue is full")]
    Full(Notification),
    #[display("notification queue is closed")]
    Closed(Notification),
}

impl EnqueueError {
    pub fn into_inner(self) -> Notification {
        match self {
            EnqueueError::Full(notification) | EnqueueError::Closed(notification) => notification,
        }
    }
}

impl core::error::Error for EnqueueError {}

#[derive(Debug, Clone)]
pub struct NotificationSender {
    inner: mpsc::Sender<Notification>,
}

impl NotificationSender {
    /// Queues without blocking; fails immediately when the queue is full or closed.
    pub fn try_enqueue(&self, notification: Notification) -> Result<(), EnqueueError> {
        self.inner.try_send(notification).map_err(|err| match err {
            TrySendError::Full(notification) => EnqueueError::Full(notification),
            TrySendError::Closed(notification) => EnqueueError::Closed(notification),
        })
    }

    /// Free slots left in the queue.
    pub fn available(&self) -> usize {
        self.inner.capacity()
    }

    pub fn max_capacity(&self) -> usize {
        self.inner.max_capacity()
    }

    /// Number of notifications waiting for the dispatcher.
    pub fn pending(&self) -> usize {
        self.max_capacity() - self.available()
    }
}

#[derive(Debug)]
pub struct NotificationReceiver {
    inner: mpsc::Receiver<Notification>,
}

impl NotificationReceiver {
    /// Waits for the next notification; `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.inner.recv().await
    }

    /// Takes the next notification if one is already queued.
    pub fn try_recv(&mut self) -> Option<Notification> {
        match self.inner.try_recv() {
            Ok(notification) => Some(notification),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}
