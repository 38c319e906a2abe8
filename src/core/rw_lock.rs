//! Readers-writer lock with writer preference.
//!
//! Any number of readers may hold the lock together; a writer holds it alone.
//! Once a writer is waiting, newly arriving readers queue behind it, so a steady
//! stream of readers cannot starve writers. Among several waiting writers no
//! FIFO order is promised.
//!
//! Acquisition is normally scoped: [`ReadersWriterLock::read`] and
//! [`ReadersWriterLock::write`] return guards that release exactly once when
//! dropped, including during unwinding. The raw `acquire_*`/`release_*` pairs
//! are available for callers that manage the pairing themselves; releasing a
//! lock that is not held panics.
//!
//! # Examples
//!
//! ```
//! use prometheus_concurrency::core::ReadersWriterLock;
//!
//! let lock = ReadersWriterLock::new();
//! {
//!     let _r1 = lock.read();
//!     let _r2 = lock.read();
//!     assert_eq!(lock.active_readers(), 2);
//!     assert!(lock.try_write().is_none());
//! }
//! let _w = lock.write();
//! assert!(lock.is_write_locked());
//! ```

use std::fmt;

use parking_lot::{Condvar, Mutex, RwLock};

use super::log_sink::{LogLevel, LogSink};

#[derive(Debug, Default)]
struct RwState {
    active_readers: usize,
    waiting_readers: usize,
    writer_active: bool,
    waiting_writers: usize,
}

impl RwState {
    const fn reader_may_enter(&self) -> bool {
        !self.writer_active && self.waiting_writers == 0
    }

    const fn writer_may_enter(&self) -> bool {
        !self.writer_active && self.active_readers == 0
    }
}

/// Readers-writer admission discipline built on a mutex and two condvars.
#[derive(Debug, Default)]
pub struct ReadersWriterLock {
    state: Mutex<RwState>,
    readers: Condvar,
    writers: Condvar,
}

impl ReadersWriterLock {
    /// Create an unlocked lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until shared access is granted.
    ///
    /// Waits while a writer is active or any writer is waiting.
    pub fn acquire_read(&self) {
        let mut state = self.state.lock();
        state.waiting_readers += 1;
        while !state.reader_may_enter() {
            self.readers.wait(&mut state);
        }
        state.waiting_readers -= 1;
        state.active_readers += 1;
    }

    /// Release shared access obtained with [`acquire_read`](Self::acquire_read).
    ///
    /// # Panics
    ///
    /// Panics if no reader holds the lock.
    pub fn release_read(&self) {
        let mut state = self.state.lock();
        assert!(state.active_readers > 0, "release_read without an active reader");
        state.active_readers -= 1;
        let wake_writer = state.active_readers == 0 && state.waiting_writers > 0;
        drop(state);
        if wake_writer {
            self.writers.notify_one();
        }
    }

    /// Block until exclusive access is granted.
    ///
    /// The caller is counted as a waiting writer for the whole wait, which holds
    /// back readers that arrive afterwards.
    pub fn acquire_write(&self) {
        let mut state = self.state.lock();
        state.waiting_writers += 1;
        while !state.writer_may_enter() {
            self.writers.wait(&mut state);
        }
        state.waiting_writers -= 1;
        state.writer_active = true;
    }

    /// Release exclusive access obtained with [`acquire_write`](Self::acquire_write).
    ///
    /// A waiting writer is handed the lock first; otherwise all waiting readers
    /// are woken.
    ///
    /// # Panics
    ///
    /// Panics if no writer holds the lock.
    pub fn release_write(&self) {
        let mut state = self.state.lock();
        assert!(state.writer_active, "release_write without an active writer");
        state.writer_active = false;
        let wake_writer = state.waiting_writers > 0;
        drop(state);
        if wake_writer {
            self.writers.notify_one();
        } else {
            self.readers.notify_all();
        }
    }

    /// Shared access released when the guard drops.
    pub fn read(&self) -> ReadGuard<'_> {
        self.acquire_read();
        ReadGuard { lock: self }
    }

    /// Exclusive access released when the guard drops.
    pub fn write(&self) -> WriteGuard<'_> {
        self.acquire_write();
        WriteGuard { lock: self }
    }

    /// Shared access if it can be granted without waiting.
    pub fn try_read(&self) -> Option<ReadGuard<'_>> {
        let mut state = self.state.lock();
        if !state.reader_may_enter() {
            return None;
        }
        state.active_readers += 1;
        Some(ReadGuard { lock: self })
    }

    /// Exclusive access if it can be granted without waiting.
    pub fn try_write(&self) -> Option<WriteGuard<'_>> {
        let mut state = self.state.lock();
        if !state.writer_may_enter() {
            return None;
        }
        state.writer_active = true;
        Some(WriteGuard { lock: self })
    }

    /// Readers currently holding the lock.
    #[must_use]
    pub fn active_readers(&self) -> usize {
        self.state.lock().active_readers
    }

    /// Readers blocked waiting for access.
    #[must_use]
    pub fn waiting_readers(&self) -> usize {
        self.state.lock().waiting_readers
    }

    /// Writers blocked waiting for access.
    #[must_use]
    pub fn waiting_writers(&self) -> usize {
        self.state.lock().waiting_writers
    }

    /// True while a writer holds the lock.
    #[must_use]
    pub fn is_write_locked(&self) -> bool {
        self.state.lock().writer_active
    }
}

/// Scoped shared access; releases on drop.
#[must_use = "the read lock is released as soon as the guard is dropped"]
pub struct ReadGuard<'a> {
    lock: &'a ReadersWriterLock,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

impl fmt::Debug for ReadGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReadGuard")
    }
}

/// Scoped exclusive access; releases on drop.
#[must_use = "the write lock is released as soon as the guard is dropped"]
pub struct WriteGuard<'a> {
    lock: &'a ReadersWriterLock,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_write();
    }
}

impl fmt::Debug for WriteGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WriteGuard")
    }
}

/// A value shared between reader and writer threads under a
/// [`ReadersWriterLock`].
///
/// Admission order is decided by the readers-writer discipline; the inner
/// `parking_lot::RwLock` only provides interior mutability and is never
/// contended, since the discipline already excludes writers from readers.
#[derive(Debug, Default)]
pub struct RwResource<T> {
    lock: ReadersWriterLock,
    value: RwLock<T>,
}

impl<T> RwResource<T> {
    /// Wrap `value`.
    pub fn new(value: T) -> Self {
        Self {
            lock: ReadersWriterLock::new(),
            value: RwLock::new(value),
        }
    }

    /// Run `f` with shared access to the value.
    pub fn read_with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let _guard = self.lock.read();
        let value = self.value.read();
        f(&*value)
    }

    /// Run `f` with exclusive access to the value.
    pub fn write_with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let _guard = self.lock.write();
        let mut value = self.value.write();
        f(&mut *value)
    }

    /// The admission discipline guarding this value.
    pub const fn lock(&self) -> &ReadersWriterLock {
        &self.lock
    }

    /// Consume the resource and return the value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: Clone + fmt::Display> RwResource<T> {
    /// Read a copy of the value, reporting the access to `sink`.
    pub fn read_logged(&self, sink: &dyn LogSink) -> T {
        self.read_with(|value| {
            sink.record(
                LogLevel::Info,
                &format!("{} reading resource: {value}", thread_label()),
            );
            value.clone()
        })
    }

    /// Replace the value, reporting the access to `sink`.
    pub fn write_logged(&self, new_value: T, sink: &dyn LogSink) {
        self.write_with(|value| {
            sink.record(
                LogLevel::Info,
                &format!("{} wrote resource: {new_value}", thread_label()),
            );
            *value = new_value;
        });
    }
}

fn thread_label() -> String {
    let current = std::thread::current();
    current
        .name()
        .map_or_else(|| format!("{:?}", current.id()), str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log_sink::InMemoryLogSink;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_multiple_readers() {
        let lock = ReadersWriterLock::new();
        let r1 = lock.read();
        let r2 = lock.read();
        assert_eq!(lock.active_readers(), 2);
        drop(r1);
        drop(r2);
        assert_eq!(lock.active_readers(), 0);
    }

    #[test]
    fn test_writer_excludes_everyone() {
        let lock = ReadersWriterLock::new();
        let w = lock.write();
        assert!(lock.try_read().is_none());
        assert!(lock.try_write().is_none());
        drop(w);
        assert!(lock.try_read().is_some());
    }

    #[test]
    fn test_readers_exclude_writer() {
        let lock = ReadersWriterLock::new();
        let _r = lock.read();
        assert!(lock.try_write().is_none());
        assert!(lock.try_read().is_some());
    }

    #[test]
    #[should_panic(expected = "release_read without an active reader")]
    fn test_unbalanced_release_read_panics() {
        ReadersWriterLock::new().release_read();
    }

    #[test]
    #[should_panic(expected = "release_write without an active writer")]
    fn test_unbalanced_release_write_panics() {
        ReadersWriterLock::new().release_write();
    }

    #[test]
    fn test_raw_acquire_release() {
        let lock = ReadersWriterLock::new();
        lock.acquire_write();
        assert!(lock.is_write_locked());
        lock.release_write();
        lock.acquire_read();
        assert_eq!(lock.active_readers(), 1);
        lock.release_read();
    }

    #[test]
    fn test_waiting_writer_blocks_new_readers() {
        let lock = Arc::new(ReadersWriterLock::new());
        let first_reader = lock.read();

        let writer = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                let _w = lock.write();
            })
        };
        while lock.waiting_writers() == 0 {
            thread::sleep(Duration::from_millis(1));
        }

        assert!(lock.try_read().is_none());
        drop(first_reader);
        writer.join().unwrap();
        assert!(lock.try_read().is_some());
    }

    #[test]
    fn test_guard_released_on_panic() {
        let lock = Arc::new(ReadersWriterLock::new());
        let result = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                let _w = lock.write();
                panic!("critical section failed");
            })
            .join()
        };
        assert!(result.is_err());
        assert!(!lock.is_write_locked());
        assert!(lock.try_write().is_some());
    }

    #[test]
    fn test_resource_concurrent_writes() {
        let resource = Arc::new(RwResource::new(0_u64));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let resource = Arc::clone(&resource);
                thread::spawn(move || {
                    for _ in 0..100 {
                        resource.write_with(|v| *v += 1);
                        let _ = resource.read_with(|v| *v);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(resource.read_with(|v| *v), 800);
    }

    #[test]
    fn test_resource_readers_overlap() {
        let resource = Arc::new(RwResource::new(5_i32));
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let (resource, inside, peak) =
                    (Arc::clone(&resource), Arc::clone(&inside), Arc::clone(&peak));
                thread::spawn(move || {
                    resource.read_with(|_| {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(30));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    });
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) > 1);
    }

    #[test]
    fn test_logged_access() {
        let sink = InMemoryLogSink::new(8);
        let resource = RwResource::new(1_i64);
        resource.write_logged(42, &sink);
        assert_eq!(resource.read_logged(&sink), 42);
        assert!(sink.contains("wrote resource: 42"));
        assert!(sink.contains("reading resource: 42"));
        assert_eq!(resource.into_inner(), 42);
    }
}
