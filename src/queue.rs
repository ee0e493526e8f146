// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bounded, terminable multi-producer/multi-consumer queue
//!
//! This is the only primitive used to hand work between thread roles.
//! Producers block (never spin) while the queue is full, and `terminate`
//! wakes every blocked producer and consumer with [`AssetError::Terminated`].

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::error::{AssetError, Result};

/// Why a non-blocking push did not enqueue; the item is handed back.
#[derive(PartialEq, Eq)]
pub enum TryPushError<T> {
    Full(T),
    Terminated(T),
}

impl<T> TryPushError<T> {
    pub fn into_inner(self) -> T {
        match self {
            TryPushError::Full(item) | TryPushError::Terminated(item) => item,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, TryPushError::Full(_))
    }
}

impl<T> fmt::Debug for TryPushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryPushError::Full(_) => write!(f, "Full(..)"),
            TryPushError::Terminated(_) => write!(f, "Terminated(..)"),
        }
    }
}

impl<T> From<TryPushError<T>> for AssetError {
    fn from(_: TryPushError<T>) -> Self {
        AssetError::Terminated
    }
}

struct QueueState<T> {
    items: VecDeque<T>,
    terminated: bool,
}

/// Capacity-limited queue with blocking and non-blocking push/pop
pub struct BoundedQueue<T> {
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
    len_hint: AtomicUsize,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity.min(1024)),
                terminated: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            len_hint: AtomicUsize::new(0),
        }
    }

    /// Push, blocking while the queue is full
    pub fn push(&self, item: T) -> Result<()> {
        let mut state = self.state.lock();
        loop {
            if state.terminated {
                return Err(AssetError::Terminated);
            }
            if state.items.len() < self.capacity {
                state.items.push_back(item);
                self.len_hint.store(state.items.len(), Ordering::Relaxed);
                drop(state);
                self.not_empty.notify_one();
                return Ok(());
            }
            self.not_full.wait(&mut state);
        }
    }

    /// Push without blocking
    pub fn try_push(&self, item: T) -> std::result::Result<(), TryPushError<T>> {
        let mut state = self.state.lock();
        if state.terminated {
            return Err(TryPushError::Terminated(item));
        }
        if state.items.len() >= self.capacity {
            return Err(TryPushError::Full(item));
        }
        state.items.push_back(item);
        self.len_hint.store(state.items.len(), Ordering::Relaxed);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Pop, blocking while the queue is empty
    pub fn pop(&self) -> Result<T> {
        let mut state = self.state.lock();
        loop {
            if state.terminated {
                return Err(AssetError::Terminated);
            }
            if let Some(item) = self.take_front(&mut state) {
                drop(state);
                self.not_full.notify_one();
                return Ok(item);
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Pop, blocking for at most `timeout`. `Ok(None)` when the time ran out.
    pub fn pop_timeout(&self, timeout: Duration) -> Result<Option<T>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.terminated {
                return Err(AssetError::Terminated);
            }
            if let Some(item) = self.take_front(&mut state) {
                drop(state);
                self.not_full.notify_one();
                return Ok(Some(item));
            }
            if self.not_empty.wait_until(&mut state, deadline).timed_out() {
                return Ok(None);
            }
        }
    }

    /// Pop without blocking. Fails once the queue is terminated.
    pub fn try_pop(&self) -> Result<Option<T>> {
        let mut state = self.state.lock();
        if state.terminated {
            return Err(AssetError::Terminated);
        }
        let item = self.take_front(&mut state);
        drop(state);
        if item.is_some() {
            self.not_full.notify_one();
        }
        Ok(item)
    }

    /// Pop without blocking, ignoring termination.
    ///
    /// Used to drain items that were already queued when the queue shut down.
    pub fn try_pop_no_fail(&self) -> Option<T> {
        let mut state = self.state.lock();
        let item = self.take_front(&mut state);
        drop(state);
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Shut the queue down and wake every waiter. Idempotent.
    pub fn terminate(&self) {
        let mut state = self.state.lock();
        state.terminated = true;
        drop(state);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_terminated(&self) -> bool {
        self.state.lock().terminated
    }

    /// Advisory item count, unordered with concurrent mutators
    pub fn estimated_size(&self) -> usize {
        self.len_hint.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn take_front(&self, state: &mut QueueState<T>) -> Option<T> {
        let item = state.items.pop_front();
        if item.is_some() {
            self.len_hint.store(state.items.len(), Ordering::Relaxed);
        }
        item
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity)
            .field("estimated_size", &self.estimated_size())
            .finish()
    }
}
