/// Utilities shared by the buffer subsystem

pub mod mutex;

pub use mutex::{Mutex, MutexGuard};
