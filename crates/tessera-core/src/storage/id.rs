//! Record id generation.

use parking_lot::Mutex;
use tracing::warn;
use ulid::Generator;

/// Source of record ids.
///
/// Ids must be globally unique, lexically sortable and ordered by creation time.
pub trait IdGenerator: Send + Sync {
    /// Produce the next id.
    fn next_id(&self) -> String;
}

/// Monotonic ULID generator.
///
/// Ids minted within one millisecond increment the random part, so they stay
/// strictly increasing.
pub struct UlidGenerator {
    inner: Mutex<Generator>,
}

impl UlidGenerator {
    /// Create a new generator.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Generator::new()),
        }
    }
}

impl Default for UlidGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for UlidGenerator {
    fn next_id(&self) -> String {
        let mut generator = self.inner.lock();
        loop {
            match generator.generate() {
                Ok(id) => return id.to_string(),
                // 2^80 ids in one millisecond; wait for the clock to move.
                Err(e) => {
                    warn!(error = %e, "ulid random part exhausted");
                    std::thread::yield_now();
                }
            }
        }
    }
}

impl std::fmt::Debug for UlidGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UlidGenerator").finish_non_exhaustive()
    }
}
