use std::time::Duration;

use thiserror::Error;

/// Errors raised by the cluster collaborators.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("kubernetes api error: {0}")]
    Api(#[from] kube::Error),

    #[error("watching pod condition: {0}")]
    Wait(#[from] kube::runtime::wait::Error),

    #[error("pod {namespace}/{pod} not ready after {timeout:?}")]
    ReadyTimeout {
        namespace: String,
        pod: String,
        timeout: Duration,
    },

    #[error("pod {namespace}/{pod} was deleted")]
    PodDeleted { namespace: String, pod: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure of a single locate-and-stream attempt.
///
/// None of these reach the caller of the retry loop; they are logged and the
/// attempt is retried from a fresh pod listing.
#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("getting pods: {0}")]
    ListPods(#[source] ClusterError),

    #[error("image {0} not found")]
    ImageNotFound(String),

    #[error("waiting for pod ready: {0}")]
    WaitForReady(#[source] ClusterError),

    #[error("setting up container log stream: {0}")]
    OpenStream(#[source] ClusterError),

    #[error("streaming request: reading bytes from log stream: {0}")]
    ReadStream(#[source] std::io::Error),

    #[error("streaming request: writing to out: {0}")]
    WriteOutput(#[source] std::io::Error),

    #[error("cancelled")]
    Cancelled,
}

pub type Result<T, E = AggregatorError> = std::result::Result<T, E>;
