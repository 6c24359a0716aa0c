//! Follow the logs of a container image across a whole cluster.
//!
//! An [`Aggregator`] lists every pod, picks the first container running the
//! requested image, waits for its pod to be ready and forwards the followed
//! log stream line by line to one output, retrying the whole sequence on
//! failure. Output can be muted and unmuted at any time through a [`Muter`].

pub mod aggregator;
pub mod cli;
pub mod config;
pub mod controls;
pub mod error;
pub mod kubernetes;
pub mod muter;
pub mod types;

pub use aggregator::{Aggregator, LocatedStream, find_container};
pub use config::{AggregatorConfig, FileConfig};
pub use error::{AggregatorError, ClusterError};
pub use kubernetes::{ClusterApi, KubeCluster, LogStream, PodReadiness};
pub use muter::Muter;
pub use types::{ContainerSummary, LogRequest, PodSummary};
