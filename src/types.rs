use chrono::{DateTime, Utc};

/// Point-in-time view of a pod, as returned by a cluster listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodSummary {
    pub namespace: String,
    pub name: String,
    /// Containers in spec order.
    pub containers: Vec<ContainerSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub name: String,
    pub image: String,
}

impl PodSummary {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            containers: Vec::new(),
        }
    }

    pub fn with_container(mut self, name: impl Into<String>, image: impl Into<String>) -> Self {
        self.containers.push(ContainerSummary {
            name: name.into(),
            image: image.into(),
        });
        self
    }
}

/// Parameters for a single log-fetch request against one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRequest {
    /// Keep the connection open and stream new output.
    pub follow: bool,
    pub container: String,
    /// Lines older than this are not replayed.
    pub since_time: DateTime<Utc>,
}

/// Prefix written in front of every forwarded line of one stream.
pub fn line_header(pod_name: &str, container_name: &str) -> String {
    format!("[{} {}]", pod_name, container_name)
}
