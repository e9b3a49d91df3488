use super::LockError;

/// A single-slot exclusion token.
///
/// Acquisition never waits: `try_lock` either takes the slot or reports that
/// someone else holds it. Callers surface the conflict instead of queueing.
pub trait Lock: Send + Sync {
    /// Try to take the slot. Returns `Ok(true)` if acquired, `Ok(false)` if already held.
    fn try_lock(&self) -> Result<bool, LockError>;

    /// Release the slot. Releasing a free slot is a no-op.
    fn unlock(&self) -> Result<(), LockError>;

    /// Whether the slot is currently held.
    fn is_locked(&self) -> Result<bool, LockError>;
}
