use crate::error::ClusterError;
use crate::types::{ContainerSummary, LogRequest, PodSummary};
use async_trait::async_trait;
use futures::io::{AsyncBufRead, AsyncReadExt};
use futures::stream::TryStreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{ListParams, LogParams};
use kube::runtime::wait::await_condition;
use kube::{Api, Client, ResourceExt, config};
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

/// A following byte stream of container output.
pub type LogStream = Pin<Box<dyn AsyncBufRead + Send>>;

/// The parts of the cluster API the aggregator talks to.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Lists every pod in every namespace, in listing order.
    async fn list_pods(&self) -> Result<Vec<PodSummary>, ClusterError>;

    /// Opens the log stream described by `request` for one pod.
    async fn open_log_stream(
        &self,
        namespace: &str,
        pod: &str,
        request: &LogRequest,
    ) -> Result<LogStream, ClusterError>;
}

/// Blocks until a pod reports ready.
#[async_trait]
pub trait PodReadiness: Send + Sync {
    async fn wait_for_ready(&self, namespace: &str, pod: &str) -> Result<(), ClusterError>;
}

/// [`ClusterApi`] and [`PodReadiness`] backed by a live cluster.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
    ready_timeout: Duration,
}

impl KubeCluster {
    pub fn new(client: Client, ready_timeout: Duration) -> Self {
        Self {
            client,
            ready_timeout,
        }
    }

    /// Builds a client for `context`, or for the kubeconfig's current context.
    pub async fn connect(context: Option<&str>, ready_timeout: Duration) -> anyhow::Result<Self> {
        let client = match context {
            Some(ctx) => {
                let config = config::Config::from_kubeconfig(&config::KubeConfigOptions {
                    context: Some(ctx.to_string()),
                    ..Default::default()
                })
                .await
                .map_err(|e| anyhow::anyhow!("Context '{}' not found in kubeconfig: {}", ctx, e))?;
                info!("Initialized client for context: {}", ctx);
                Client::try_from(config)?
            }
            None => {
                let config = config::Config::infer().await?;
                info!("Using current context");
                Client::try_from(config)?
            }
        };
        Ok(Self::new(client, ready_timeout))
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn list_pods(&self) -> Result<Vec<PodSummary>, ClusterError> {
        let api: Api<Pod> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items.iter().map(pod_summary).collect())
    }

    async fn open_log_stream(
        &self,
        namespace: &str,
        pod: &str,
        request: &LogRequest,
    ) -> Result<LogStream, ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = log_params(request);
        let pod_name = pod.to_string();

        // The log body is pumped from a task that owns the Api, so the
        // returned stream does not borrow anything from this call.
        let (open_tx, open_rx) = oneshot::channel();
        let (chunk_tx, chunk_rx) = mpsc::channel::<std::io::Result<Vec<u8>>>(64);
        tokio::spawn(async move {
            let reader = match api.log_stream(&pod_name, &params).await {
                Ok(reader) => {
                    let _ = open_tx.send(Ok(()));
                    reader
                }
                Err(e) => {
                    let _ = open_tx.send(Err(e));
                    return;
                }
            };
            let mut reader = Box::pin(reader);
            let mut buf = vec![0u8; 8 * 1024];
            loop {
                let read = tokio::select! {
                    _ = chunk_tx.closed() => break,
                    read = reader.read(&mut buf) => read,
                };
                match read {
                    Ok(0) => break,
                    Ok(n) => {
                        if chunk_tx.send(Ok(buf[..n].to_vec())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = chunk_tx.send(Err(e)).await;
                        break;
                    }
                }
            }
            debug!("Log pump for pod {} finished", pod_name);
        });

        open_rx
            .await
            .map_err(|_| std::io::Error::other("log stream task exited before opening"))??;
        Ok(Box::pin(ReceiverStream::new(chunk_rx).into_async_read()))
    }
}

#[async_trait]
impl PodReadiness for KubeCluster {
    async fn wait_for_ready(&self, namespace: &str, pod: &str) -> Result<(), ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        debug!("Waiting for pod {}/{} to be ready", namespace, pod);
        match tokio::time::timeout(self.ready_timeout, await_condition(api, pod, is_pod_ready))
            .await
        {
            Ok(Ok(Some(_))) => Ok(()),
            Ok(Ok(None)) => Err(ClusterError::PodDeleted {
                namespace: namespace.to_string(),
                pod: pod.to_string(),
            }),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(ClusterError::ReadyTimeout {
                namespace: namespace.to_string(),
                pod: pod.to_string(),
                timeout: self.ready_timeout,
            }),
        }
    }
}

/// True once the pod's `Ready` condition is `True`.
fn is_pod_ready(pod: Option<&Pod>) -> bool {
    pod.and_then(|p| p.status.as_ref())
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

fn pod_summary(pod: &Pod) -> PodSummary {
    let containers = pod
        .spec
        .as_ref()
        .map(|spec| {
            spec.containers
                .iter()
                .map(|c| ContainerSummary {
                    name: c.name.clone(),
                    image: c.image.clone().unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default();

    PodSummary {
        namespace: pod.namespace().unwrap_or_default(),
        name: pod.name_any(),
        containers,
    }
}

/// Translates a request into kube log parameters.
fn log_params(request: &LogRequest) -> LogParams {
    LogParams {
        follow: request.follow,
        container: Some(request.container.clone()),
        since_time: Some(request.since_time),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Container, PodCondition, PodSpec, PodStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn pod_with_ready(status: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("web-0".to_string()),
                namespace: Some("prod".to_string()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![
                    Container {
                        name: "app".to_string(),
                        image: Some("registry/app:v1".to_string()),
                        ..Default::default()
                    },
                    Container {
                        name: "sidecar".to_string(),
                        image: None,
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }),
            status: Some(PodStatus {
                conditions: Some(vec![PodCondition {
                    type_: "Ready".to_string(),
                    status: status.to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_pod_summary_keeps_container_order() {
        let summary = pod_summary(&pod_with_ready("True"));
        assert_eq!(summary.namespace, "prod");
        assert_eq!(summary.name, "web-0");
        assert_eq!(
            summary.containers,
            vec![
                ContainerSummary {
                    name: "app".to_string(),
                    image: "registry/app:v1".to_string(),
                },
                ContainerSummary {
                    name: "sidecar".to_string(),
                    image: String::new(),
                },
            ]
        );
    }

    #[test]
    fn test_is_pod_ready() {
        assert!(is_pod_ready(Some(&pod_with_ready("True"))));
        assert!(!is_pod_ready(Some(&pod_with_ready("False"))));
        assert!(!is_pod_ready(None));
        assert!(!is_pod_ready(Some(&Pod::default())));
    }

    #[test]
    fn test_log_params_send_creation_time() {
        let since = chrono::Utc::now() - chrono::Duration::milliseconds(100);
        let request = LogRequest {
            follow: true,
            container: "app".to_string(),
            since_time: since,
        };

        let params = log_params(&request);
        assert!(params.follow);
        assert_eq!(params.container.as_deref(), Some("app"));
        assert_eq!(params.since_time, Some(since));
        assert_eq!(params.since_seconds, None);
    }
}
