pub mod clock;
pub mod config;
#[cfg(feature = "http")]
pub mod http;
pub mod lock;
pub mod model;
pub mod registry;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, ConfigError};
pub use lock::{InMemoryLockManager, LockError, LockGuard, LockManager};
pub use model::{BusinessKey, Child, SquadAssignment};
pub use registry::{
    AssignmentRequest, NewChild, Receipt, Registry, RegistryError, UpdateMode, UpdateRequest,
};
#[cfg(feature = "parse")]
pub use store::ParseStore;
pub use store::{DocumentStore, Filter, InMemoryStore, StoreError, Versioned, WriteOutcome};
