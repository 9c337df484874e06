//! src/sync.rs
//!
//! A small convenience for binding a shared value to the lock that guards it,
//! so the pairing is visible at every call site instead of a naked mutex
//! floating next to the field it happens to protect.
//!
//! `Locked<T>` is built on `parking_lot::Mutex`, not `tokio::sync::Mutex`: every
//! structure it wraps in this crate (the peer table, the gossip cache, the
//! database, the consensus registry) is mutated with plain, non-async code, and
//! a `parking_lot::MutexGuard` is `!Send`, so the compiler refuses any attempt
//! to hold one across an `.await` point. That refusal is exactly the "no I/O
//! while locked" discipline this crate depends on.

use parking_lot::{Mutex, MutexGuard};

#[derive(Default)]
pub struct Locked<T> {
    inner: Mutex<T>,
}

impl<T> Locked<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock()
    }
}
