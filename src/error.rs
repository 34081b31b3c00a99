//! Error type shared by the discovery engine and its Docker adapter.

/// Failures raised while talking to the container engine or building
/// collaborators.  None of these are fatal for the engine: query operations
/// swallow them and the background loops retry on their own timers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to connect to Docker: {0}")]
    Connect(#[source] bollard::errors::Error),
    #[error("Docker API request failed: {0}")]
    Docker(#[from] bollard::errors::Error),
    #[error("no event listener registered for this channel")]
    ListenerNotFound,
    #[error("Docker event stream closed")]
    EventStreamClosed,
    #[error("invalid service name pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
