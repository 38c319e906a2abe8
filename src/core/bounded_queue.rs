//! Bounded, closable, multi-producer multi-consumer FIFO queue.
//!
//! Producers block while the queue is full, consumers block while it is empty.
//! All waiting happens on a `parking_lot::Condvar` paired with the queue mutex,
//! re-checking the predicate after every wakeup.
//!
//! # Closing
//!
//! [`BoundedQueue::close`] is idempotent and wakes every waiter:
//!
//! - pushes fail with [`QueueError::Closed`], including producers that were
//!   already blocked on a full queue;
//! - pops keep draining buffered items and then return `None`.
//!
//! # Examples
//!
//! ```
//! use prometheus_concurrency::core::BoundedQueue;
//! use std::thread;
//!
//! let queue = BoundedQueue::new(2);
//! let consumer = {
//!     let queue = queue.clone();
//!     thread::spawn(move || {
//!         let mut seen = Vec::new();
//!         while let Some(item) = queue.pop() {
//!             seen.push(item);
//!         }
//!         seen
//!     })
//! };
//!
//! for i in 0..5 {
//!     queue.push(i).unwrap();
//! }
//! queue.close();
//!
//! assert_eq!(consumer.join().unwrap(), vec![0, 1, 2, 3, 4]);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use super::error::{QueueError, TryPushError};

struct Inner<T> {
    items: VecDeque<T>,
    capacity: usize,
    closed: bool,
}

impl<T> Inner<T> {
    fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    fn push_back(&mut self, item: T) {
        self.items.push_back(item);
        assert!(
            self.items.len() <= self.capacity,
            "bounded queue holds {} items with capacity {}",
            self.items.len(),
            self.capacity
        );
    }
}

struct State<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

/// Thread-safe FIFO with a capacity bound.
///
/// Cloning a `BoundedQueue` yields another handle to the same queue.
pub struct BoundedQueue<T> {
    state: Arc<State<T>>,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.state.inner.lock();
        f.debug_struct("BoundedQueue")
            .field("len", &inner.items.len())
            .field("capacity", &inner.capacity)
            .field("closed", &inner.closed)
            .finish()
    }
}

impl<T> BoundedQueue<T> {
    /// Creates a queue holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "BoundedQueue capacity must be greater than zero");
        Self::with_capacity_limit(capacity, capacity.min(1024))
    }

    /// Creates a queue whose pushes never block on capacity.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::with_capacity_limit(usize::MAX, 16)
    }

    fn with_capacity_limit(capacity: usize, prealloc: usize) -> Self {
        Self {
            state: Arc::new(State {
                inner: Mutex::new(Inner {
                    items: VecDeque::with_capacity(prealloc),
                    capacity,
                    closed: false,
                }),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.state.inner.lock()
    }

    /// Maximum number of items; `usize::MAX` for unbounded queues.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Number of items currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// True when nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// True when a push would block.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.lock().is_full()
    }

    /// True once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Marks the queue closed and wakes all blocked producers and consumers.
    pub fn close(&self) {
        let mut inner = self.lock();
        if inner.closed {
            return;
        }
        inner.closed = true;
        drop(inner);
        self.state.not_full.notify_all();
        self.state.not_empty.notify_all();
    }

    /// Appends `item`, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the queue is closed before or while
    /// waiting for space. The item is dropped in that case.
    pub fn push(&self, item: T) -> Result<(), QueueError> {
        let mut inner = self.lock();
        while !inner.closed && inner.is_full() {
            self.state.not_full.wait(&mut inner);
        }
        if inner.closed {
            return Err(QueueError::Closed);
        }
        inner.push_back(item);
        drop(inner);
        self.state.not_empty.notify_one();
        Ok(())
    }

    /// Appends `item` without blocking.
    ///
    /// # Errors
    ///
    /// Hands the item back inside [`TryPushError::Full`] or
    /// [`TryPushError::Closed`].
    pub fn try_push(&self, item: T) -> Result<(), TryPushError<T>> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(TryPushError::Closed(item));
        }
        if inner.is_full() {
            return Err(TryPushError::Full(item));
        }
        inner.push_back(item);
        drop(inner);
        self.state.not_empty.notify_one();
        Ok(())
    }

    /// Appends `item`, blocking for at most `timeout` while the queue is full.
    ///
    /// # Errors
    ///
    /// Hands the item back inside [`TryPushError::Timeout`] or
    /// [`TryPushError::Closed`].
    pub fn push_timeout(&self, item: T, timeout: Duration) -> Result<(), TryPushError<T>> {
        let deadline = Instant::now().checked_add(timeout);
        let mut inner = self.lock();
        while !inner.closed && inner.is_full() {
            match deadline {
                Some(deadline) => {
                    if self.state.not_full.wait_until(&mut inner, deadline).timed_out() {
                        break;
                    }
                }
                None => self.state.not_full.wait(&mut inner),
            }
        }
        if inner.closed {
            return Err(TryPushError::Closed(item));
        }
        if inner.is_full() {
            return Err(TryPushError::Timeout(item));
        }
        inner.push_back(item);
        drop(inner);
        self.state.not_empty.notify_one();
        Ok(())
    }

    /// Removes the oldest item, blocking while the queue is empty.
    ///
    /// Returns `None` once the queue is closed and fully drained.
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.lock();
        while inner.items.is_empty() && !inner.closed {
            self.state.not_empty.wait(&mut inner);
        }
        let item = inner.items.pop_front();
        drop(inner);
        if item.is_some() {
            self.state.not_full.notify_one();
        }
        item
    }

    /// Removes the oldest item if one is buffered, without blocking.
    pub fn try_pop(&self) -> Option<T> {
        let item = self.lock().items.pop_front();
        if item.is_some() {
            self.state.not_full.notify_one();
        }
        item
    }

    /// Removes the oldest item, blocking for at most `timeout`.
    ///
    /// `Ok(None)` signals end of stream (closed and drained).
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Timeout`] if nothing arrived in time.
    pub fn pop_timeout(&self, timeout: Duration) -> Result<Option<T>, QueueError> {
        let deadline = Instant::now().checked_add(timeout);
        let mut inner = self.lock();
        while inner.items.is_empty() && !inner.closed {
            match deadline {
                Some(deadline) => {
                    if self.state.not_empty.wait_until(&mut inner, deadline).timed_out() {
                        break;
                    }
                }
                None => self.state.not_empty.wait(&mut inner),
            }
        }
        match inner.items.pop_front() {
            Some(item) => {
                drop(inner);
                self.state.not_full.notify_one();
                Ok(Some(item))
            }
            None if inner.closed => Ok(None),
            None => Err(QueueError::Timeout),
        }
    }

    /// Removes and returns everything currently buffered.
    pub fn drain(&self) -> Vec<T> {
        let items: Vec<T> = self.lock().items.drain(..).collect();
        if !items.is_empty() {
            self.state.not_full.notify_all();
        }
        items
    }
}
