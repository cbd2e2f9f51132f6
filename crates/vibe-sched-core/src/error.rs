use thiserror::Error;

/// Errors reported by the scheduler.
///
/// None of these are fatal. A failed operation leaves the scheduler exactly as
/// it was before the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("event queue is full ({capacity} slots)")]
    CapacityExceeded { capacity: usize },

    #[error("periodic registry is full ({slots} slots)")]
    RegistryFull { slots: usize },

    #[error("failed to allocate {bytes} bytes")]
    AllocationFailed { bytes: usize },

    #[error("unknown event kind index {0}")]
    UnknownEventKind(u8),
}
