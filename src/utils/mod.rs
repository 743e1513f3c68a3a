/// Bounded retry with jittered exponential backoff
pub mod backoff;
/// Logger
pub mod logger;
