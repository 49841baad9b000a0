/// Mutex wrapper that records who holds the lock in debug builds.
///
/// In debug builds every acquisition captures the caller's `file:line` via
/// `#[track_caller]`; when tracing is enabled for the mutex, acquire, release and
/// failed try-acquire are logged at TRACE. In release builds the wrapper only
/// forwards to `std::sync::Mutex`.
///
/// Poisoning is recovered: a panic while holding the lock does not make later
/// `lock()` calls fail, since map callbacks must always be able to update state.
///
/// # Example
///
/// ```ignore
/// let state = Mutex::new("pers::MapState", 0u32);
/// state.set_tracing(true);
/// *state.lock() += 1;        // logs "lock 'pers::MapState' acquired at src/x.rs:12"
/// ```

use std::ops::{Deref, DerefMut};
use std::panic::Location;
use std::sync::{PoisonError, TryLockError};

#[cfg(debug_assertions)]
use std::sync::atomic::{AtomicBool, Ordering};

pub struct Mutex<T> {
    inner: std::sync::Mutex<T>,
    name: &'static str,
    #[cfg(debug_assertions)]
    tracing: AtomicBool,
    #[cfg(debug_assertions)]
    holder: std::sync::Mutex<Option<&'static Location<'static>>>,
}

impl<T> Mutex<T> {
    /// Create a new mutex
    ///
    /// # Arguments
    ///
    /// * `name` - Label used in trace output
    /// * `value` - Protected value
    pub fn new(name: &'static str, value: T) -> Self {
        Self {
            inner: std::sync::Mutex::new(value),
            name,
            #[cfg(debug_assertions)]
            tracing: AtomicBool::new(false),
            #[cfg(debug_assertions)]
            holder: std::sync::Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Enable or disable acquire/release tracing (no effect in release builds)
    pub fn set_tracing(&self, enabled: bool) {
        #[cfg(debug_assertions)]
        self.tracing.store(enabled, Ordering::Relaxed);
        #[cfg(not(debug_assertions))]
        let _ = enabled;
    }

    /// Acquire the lock, blocking the current thread
    #[track_caller]
    pub fn lock(&self) -> MutexGuard<'_, T> {
        let location = Location::caller();
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        MutexGuard::acquired(self, guard, location)
    }

    /// Try to acquire the lock without blocking
    ///
    /// Returns `None` if another thread holds it.
    #[track_caller]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        let location = Location::caller();
        match self.inner.try_lock() {
            Ok(guard) => Some(MutexGuard::acquired(self, guard, location)),
            Err(TryLockError::Poisoned(poisoned)) => {
                Some(MutexGuard::acquired(self, poisoned.into_inner(), location))
            }
            Err(TryLockError::WouldBlock) => {
                #[cfg(debug_assertions)]
                if self.tracing.load(Ordering::Relaxed) {
                    let holder = self.holder();
                    crate::pers_trace!(
                        "pers::Mutex",
                        "try_lock '{}' failed at {}:{} (held from {})",
                        self.name,
                        location.file(),
                        location.line(),
                        holder.map(|l| format!("{}:{}", l.file(), l.line()))
                            .unwrap_or_else(|| "unknown".to_string())
                    );
                }
                None
            }
        }
    }

    /// Location of the current holder, if any (always `None` in release builds)
    pub fn holder(&self) -> Option<&'static Location<'static>> {
        #[cfg(debug_assertions)]
        {
            *self.holder.lock().unwrap_or_else(PoisonError::into_inner)
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    }

    /// Mutable access without locking (requires exclusive borrow)
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut().unwrap_or_else(PoisonError::into_inner)
    }
}

/// RAII guard returned by [`Mutex::lock`]; dropping it unlocks.
pub struct MutexGuard<'a, T> {
    guard: std::sync::MutexGuard<'a, T>,
    #[cfg(debug_assertions)]
    mutex: &'a Mutex<T>,
    #[cfg(debug_assertions)]
    location: &'static Location<'static>,
}

impl<'a, T> MutexGuard<'a, T> {
    #[cfg(debug_assertions)]
    fn acquired(
        mutex: &'a Mutex<T>,
        guard: std::sync::MutexGuard<'a, T>,
        location: &'static Location<'static>,
    ) -> Self {
        *mutex.holder.lock().unwrap_or_else(PoisonError::into_inner) = Some(location);
        if mutex.tracing.load(Ordering::Relaxed) {
            crate::pers_trace!(
                "pers::Mutex",
                "lock '{}' acquired at {}:{}",
                mutex.name,
                location.file(),
                location.line()
            );
        }
        Self { guard, mutex, location }
    }

    #[cfg(not(debug_assertions))]
    fn acquired(
        _mutex: &'a Mutex<T>,
        guard: std::sync::MutexGuard<'a, T>,
        _location: &'static Location<'static>,
    ) -> Self {
        Self { guard }
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

#[cfg(debug_assertions)]
impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        *self.mutex.holder.lock().unwrap_or_else(PoisonError::into_inner) = None;
        if self.mutex.tracing.load(Ordering::Relaxed) {
            crate::pers_trace!(
                "pers::Mutex",
                "lock '{}' released (acquired at {}:{})",
                self.mutex.name,
                self.location.file(),
                self.location.line()
            );
        }
    }
}

#[cfg(test)]
#[path = "mutex_tests.rs"]
mod tests;
