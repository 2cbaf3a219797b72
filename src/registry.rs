//! Subscriber registry.
//!
//! One mutex guards the tracked sequence and every entry's state. An entry is
//! `Connected` until a pump reports its connection gone, then `Closed` for good.
//! Closing an entry releases its delivery sender in the same lock acquisition,
//! so nothing is ever handed to a closed subscriber.

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::types::{DispatchReport, SubscriberId, SubscriberInfo};

/// A message on its way to one subscriber's writer pump
#[derive(Debug)]
pub struct Envelope {
    text: String,
    ack: Option<oneshot::Sender<()>>,
}

impl Envelope {
    fn handed_off(text: &str) -> (Self, oneshot::Receiver<()>) {
        let (ack, taken) = oneshot::channel();
        let envelope = Self {
            text: text.to_owned(),
            ack: Some(ack),
        };
        (envelope, taken)
    }

    fn queued(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            ack: None,
        }
    }

    /// Tell a waiting broadcaster the message has been taken. Idempotent.
    pub fn acknowledge(&mut self) {
        if let Some(ack) = self.ack.take() {
            let _ = ack.send(());
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubscriberState {
    Connected,
    Closed,
}

/// Registry entry for one connection
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    peer: String,
    connected_at: DateTime<Utc>,
    state: SubscriberState,
    delivery: Option<mpsc::Sender<Envelope>>,
}

impl Subscriber {
    /// Create a connected entry around the sending side of its delivery channel
    pub fn new(peer: impl Into<String>, delivery: mpsc::Sender<Envelope>) -> Self {
        Self {
            id: SubscriberId::new(),
            peer: peer.into(),
            connected_at: Utc::now(),
            state: SubscriberState::Connected,
            delivery: Some(delivery),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    fn is_closed(&self) -> bool {
        self.state == SubscriberState::Closed
    }

    /// `Connected -> Closed`, releasing the delivery sender.
    /// Returns false if the entry was already closed.
    fn mark_closed(&mut self) -> bool {
        if self.is_closed() {
            return false;
        }
        self.state = SubscriberState::Closed;
        self.delivery = None;
        true
    }

    fn info(&self) -> SubscriberInfo {
        SubscriberInfo {
            id: self.id,
            peer: self.peer.clone(),
            connected_at: self.connected_at,
            closed: self.is_closed(),
        }
    }
}

/// Hand `text` to the writer behind `delivery` and wait until it has taken it.
/// False means the writer is gone.
async fn hand_off(delivery: &mpsc::Sender<Envelope>, text: &str) -> bool {
    let (envelope, taken) = Envelope::handed_off(text);
    if delivery.send(envelope).await.is_err() {
        return false;
    }
    taken.await.is_ok()
}

/// Lock-protected collection of tracked subscribers
#[derive(Debug)]
pub struct Registry {
    subscribers: Mutex<Vec<Subscriber>>,
    eager_eviction: bool,
}

impl Registry {
    /// With `eager_eviction`, closing an entry also removes it. Otherwise it
    /// stays inert until the next broadcast pass evicts it.
    pub fn new(eager_eviction: bool) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            eager_eviction,
        }
    }

    pub async fn add(&self, subscriber: Subscriber) {
        let mut subscribers = self.subscribers.lock().await;
        info!(subscriber = %subscriber.id, peer = %subscriber.peer, "Added subscriber");
        subscribers.push(subscriber);
    }

    /// Mark a subscriber closed and release its delivery channel.
    ///
    /// Returns true only for the call that performed the transition.
    pub async fn close(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.lock().await;
        let Some(pos) = subscribers.iter().position(|s| s.id == id) else {
            return false;
        };

        let transitioned = subscribers[pos].mark_closed();
        if transitioned {
            info!(subscriber = %id, peer = %subscribers[pos].peer, "Removed subscriber");
        }
        if self.eager_eviction {
            subscribers.remove(pos);
        }
        transitioned
    }

    /// Number of tracked entries, including closed ones not yet evicted
    pub async fn len(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.subscribers.lock().await.is_empty()
    }

    pub async fn snapshot(&self) -> Vec<SubscriberInfo> {
        self.subscribers
            .lock()
            .await
            .iter()
            .map(Subscriber::info)
            .collect()
    }

    /// Broadcast pass in hand-off mode.
    ///
    /// Holds the lock for the whole traversal, including every blocking
    /// hand-off, so passes are totally ordered and `add` waits for the pass in
    /// flight. Live entries are compacted to the front in order; closed
    /// entries, and entries whose writer turns out to be gone, are evicted.
    pub async fn dispatch(&self, text: &str) -> DispatchReport {
        let mut report = DispatchReport::default();
        let mut subscribers = self.subscribers.lock().await;

        let mut kept = 0;
        for i in 0..subscribers.len() {
            if subscribers[i].is_closed() {
                report.evicted += 1;
                continue;
            }

            let delivered = match &subscribers[i].delivery {
                Some(delivery) => hand_off(delivery, text).await,
                None => false,
            };

            if delivered {
                subscribers.swap(kept, i);
                kept += 1;
                report.delivered += 1;
            } else {
                debug!(subscriber = %subscribers[i].id, "Writer gone, evicting subscriber");
                subscribers[i].mark_closed();
                report.evicted += 1;
            }
        }
        subscribers.truncate(kept);

        report
    }

    /// Broadcast pass in queued mode.
    ///
    /// The lock is held only to evict closed entries and clone the live
    /// senders. Queuing happens outside it and never waits: a full queue
    /// drops the message for that subscriber.
    pub async fn dispatch_queued(&self, text: &str) -> DispatchReport {
        let mut report = DispatchReport::default();

        let live: Vec<(SubscriberId, mpsc::Sender<Envelope>)> = {
            let mut subscribers = self.subscribers.lock().await;
            let before = subscribers.len();
            subscribers.retain(|s| !s.is_closed());
            report.evicted = before - subscribers.len();
            subscribers
                .iter()
                .filter_map(|s| s.delivery.clone().map(|tx| (s.id, tx)))
                .collect()
        };

        for (id, delivery) in live {
            match delivery.try_send(Envelope::queued(text)) {
                Ok(()) => report.delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(subscriber = %id, "Delivery queue full, dropping message");
                    report.dropped += 1;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(subscriber = %id, "Writer gone, closing subscriber");
                    // Lazy eviction leaves the closed entry for the next pass
                    if self.close(id).await && self.eager_eviction {
                        report.evicted += 1;
                    }
                }
            }
        }

        report
    }
}
