use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

// LinkKey
/// Connection-scoped identity of one uplink. Two subscribers of the same lane
/// are told apart by their keys, never by where their links live in memory.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct LinkKey(u64);

impl LinkKey {
    pub fn to_u64(&self) -> u64 {
        self.0
    }

    pub fn from_u64(value: u64) -> Self {
        LinkKey(value)
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

// LinkKeyGenerator
/// Hands out keys that never repeat for the lifetime of one generator.
///
/// The sequence starts at a random offset so keys from different
/// connections are unlikely to line up in logs.
pub struct LinkKeyGenerator {
    next: AtomicU64,
}

impl LinkKeyGenerator {
    pub fn new() -> Self {
        Self::starting_at(fastrand::u64(..))
    }

    pub fn starting_at(seed: u64) -> Self {
        Self {
            next: AtomicU64::new(seed),
        }
    }

    pub fn generate(&self) -> LinkKey {
        LinkKey(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for LinkKeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}
