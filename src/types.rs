use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque ID type for subscribers
pub type SubscriberId = ulid::Ulid;

/// How a broadcast pass hands messages to subscribers
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum DispatchMode {
    #[default]
    /// Rendezvous hand-off under the registry lock. A broadcast returns only
    /// after every live subscriber's writer has taken the message.
    HandOff,
    /// Bounded per-subscriber queue filled outside the registry lock. A full
    /// queue drops the message for that subscriber.
    Queued { capacity: usize },
}

/// Public view of one registry entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriberInfo {
    pub id: SubscriberId,
    pub peer: String,
    pub connected_at: DateTime<Utc>,
    pub closed: bool,
}

/// Outcome of a single broadcast pass
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchReport {
    /// Subscribers the message was handed to (or queued for)
    pub delivered: usize,
    /// Subscribers skipped because their queue was full
    pub dropped: usize,
    /// Entries found closed and evicted, or found dead during the pass
    pub evicted: usize,
}
