pub mod channel;

pub use channel::ChannelQueue;

use crate::model::Target;
use std::error::Error;
use std::fmt;
use uuid::Uuid;

/// A unit of deferred work: "run this target against this connection"
/// (the async dispatch path fronting `execute`). Wire formats for a real
/// message bus (Kafka, Pulsar, ...) are out of scope; this crate only
/// defines the job shape `{id, target, connection, schema, dry_run,
/// metadata}` and an in-process transport.
#[derive(Clone, Debug)]
pub struct Job {
    pub id: Uuid,
    pub target: Target,
    pub connection: String,
    pub schema: String,
    pub dry_run: bool,
    pub metadata: Option<String>,
}

impl Job {
    pub fn new(
        target: Target,
        connection: impl Into<String>,
        schema: impl Into<String>,
        dry_run: bool,
        metadata: Option<String>,
    ) -> Self {
        Job {
            id: Uuid::new_v4(),
            target,
            connection: connection.into(),
            schema: schema.into(),
            dry_run,
            metadata,
        }
    }
}

#[derive(Debug)]
pub struct QueueError {
    pub kind: QueueErrorKind,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueueError: {}", self.kind)
    }
}

impl Error for QueueError {}

#[derive(Debug)]
pub enum QueueErrorKind {
    /// No consumer is left to receive jobs; the channel's receiving end was dropped.
    Closed,
}

impl fmt::Display for QueueErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "queue is closed, no consumer is listening"),
        }
    }
}

/// Publishing side of the async dispatch path. A fixed trait rather than an
/// enum, since unlike the backend adapters a real deployment is expected to
/// swap the in-process [`ChannelQueue`] for an external bus without this
/// crate needing to know about it.
pub trait Queue: Send + Sync {
    fn publish(&self, job: Job) -> impl std::future::Future<Output = Result<(), QueueError>> + Send;
}
