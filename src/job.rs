//! Work items exchanged between thread roles
//!
//! Role threads receive [`Job`]s, the control thread receives
//! [`Notification`]s. Both travel through a [`Dispatcher`], a bounded queue
//! with an overflow list so producers holding the asset table lock never
//! block on a full queue.

use parking_lot::Mutex;
use slotmap::new_key_type;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::id::AssetId;
use crate::provider::RawAsset;
use crate::queue::{BoundedQueue, TryPushError};
use crate::scheme::{Dependencies, Payload, SchemeDescriptor};

new_key_type! {
    /// Ticket of the one outstanding job of an asset
    pub(crate) struct JobKey;
}

/// Work executed on a role thread
pub(crate) enum Job {
    /// Obtain bytes for `generation` of `id`
    Fetch {
        id: AssetId,
        generation: u32,
        ticket: JobKey,
    },
    /// Run the load callback on the scheme's worker role
    Finalize {
        id: AssetId,
        generation: u32,
        ticket: JobKey,
        descriptor: Arc<SchemeDescriptor>,
        raw: RawAsset,
        previous: Option<Payload>,
    },
    /// Drop payloads on the thread that owns them
    Release {
        payloads: Vec<Payload>,
        disposal: Option<(AssetId, JobKey)>,
    },
}

/// Product of a successful finalize
pub(crate) struct Finalized {
    pub payload: Payload,
    pub dependencies: Dependencies,
    pub label: Option<String>,
}

/// Completion report applied by the control thread
pub(crate) enum Notification {
    Loaded {
        id: AssetId,
        generation: u32,
        ticket: JobKey,
        scheme: Option<u32>,
        result: Result<Finalized>,
    },
    Disposed {
        id: AssetId,
        ticket: JobKey,
    },
}

impl Notification {
    pub(crate) fn id(&self) -> AssetId {
        match self {
            Notification::Loaded { id, .. } | Notification::Disposed { id, .. } => *id,
        }
    }
}

/// A role's queue plus the items that did not fit in it yet.
///
/// Lock order is overflow, then queue. Items in the overflow list are always
/// newer than items in the queue, so FIFO order is kept.
pub(crate) struct Dispatcher<T> {
    queue: BoundedQueue<T>,
    overflow: Mutex<VecDeque<T>>,
}

impl<T> Dispatcher<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            queue: BoundedQueue::new(capacity),
            overflow: Mutex::new(VecDeque::new()),
        }
    }

    /// Enqueue without blocking. Once terminated the item is handed back.
    pub(crate) fn dispatch(&self, item: T) -> std::result::Result<(), T> {
        let mut overflow = self.overflow.lock();
        if !overflow.is_empty() {
            if self.queue.is_terminated() {
                return Err(item);
            }
            overflow.push_back(item);
            return Ok(());
        }
        match self.queue.try_push(item) {
            Ok(()) => Ok(()),
            Err(TryPushError::Full(item)) => {
                overflow.push_back(item);
                Ok(())
            }
            Err(TryPushError::Terminated(item)) => Err(item),
        }
    }

    /// Pop one item without blocking
    pub(crate) fn try_next(&self) -> Result<Option<T>> {
        let item = self.queue.try_pop()?;
        self.refill();
        match item {
            Some(item) => Ok(Some(item)),
            None => self.queue.try_pop(),
        }
    }

    /// Pop one item, waiting up to `timeout` for one to arrive
    pub(crate) fn next_timeout(&self, timeout: Duration) -> Result<Option<T>> {
        if let Some(item) = self.try_next()? {
            return Ok(Some(item));
        }
        let item = self.queue.pop_timeout(timeout)?;
        self.refill();
        Ok(item)
    }

    /// Pop one item; after termination, keep draining what was already queued
    pub(crate) fn drain_next(&self) -> Option<T> {
        match self.try_next() {
            Ok(item) => item,
            Err(_) => self
                .queue
                .try_pop_no_fail()
                .or_else(|| self.overflow.lock().pop_front()),
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.queue.estimated_size() + self.overflow.lock().len()
    }

    pub(crate) fn terminate(&self) {
        self.queue.terminate();
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.queue.is_terminated()
    }

    fn refill(&self) {
        let mut overflow = self.overflow.lock();
        while let Some(item) = overflow.pop_front() {
            if let Err(rejected) = self.queue.try_push(item) {
                overflow.push_front(rejected.into_inner());
                break;
            }
        }
    }
}
