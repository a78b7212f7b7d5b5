use std::sync::{Mutex, MutexGuard};

/// Acquire a mutex, recovering the guard if a previous holder panicked.
///
/// The data behind our locks (a table map, a database connection) stays
/// usable after a panic elsewhere, so poisoning is logged and ignored.
pub(crate) fn acquire_lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("{} mutex was poisoned, recovering", what);
            poisoned.into_inner()
        }
    }
}
