use crate::config::AggregatorConfig;
use crate::error::{AggregatorError, Result};
use crate::kubernetes::{ClusterApi, LogStream, PodReadiness};
use crate::muter::Muter;
use crate::types::{ContainerSummary, LogRequest, PodSummary, line_header};
use chrono::{DateTime, Utc};
use futures::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Streams the logs of the first container running a given image to a
/// single output, prefixing each line with `[<pod> <container>] `.
///
/// One aggregator serves one image. Its mute state outlives individual
/// streams and is shared with every [`Muter`] handle obtained from it.
pub struct Aggregator<W> {
    muter: Muter,
    creation_time: DateTime<Utc>,
    output: W,
    config: AggregatorConfig,
}

/// A log stream attached to a selected container.
pub struct LocatedStream {
    pub header: String,
    pub request: LogRequest,
    pub stream: LogStream,
}

impl<W> Aggregator<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(output: W) -> Self {
        Self::with_config(output, AggregatorConfig::default())
    }

    pub fn with_config(output: W, config: AggregatorConfig) -> Self {
        Self {
            muter: Muter::new(),
            creation_time: Utc::now(),
            output,
            config,
        }
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// A handle sharing this aggregator's mute state.
    pub fn muter(&self) -> Muter {
        self.muter.clone()
    }

    pub fn mute(&self) {
        self.muter.mute();
    }

    pub fn unmute(&self) {
        self.muter.unmute();
    }

    pub fn is_muted(&self) -> bool {
        self.muter.is_muted()
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Best-effort streaming of `image` logs, retried up to the configured
    /// limit. Failures are logged, never returned.
    pub async fn stream_logs<C, R>(&mut self, client: &C, readiness: &R, image: &str)
    where
        C: ClusterApi + ?Sized,
        R: PodReadiness + ?Sized,
    {
        self.stream_logs_until(client, readiness, image, &CancellationToken::new())
            .await
    }

    /// Like [`stream_logs`](Self::stream_logs), but stops early once `cancel`
    /// fires: during the retry pause, the readiness wait, or between lines.
    pub async fn stream_logs_until<C, R>(
        &mut self,
        client: &C,
        readiness: &R,
        image: &str,
        cancel: &CancellationToken,
    ) where
        C: ClusterApi + ?Sized,
        R: PodReadiness + ?Sized,
    {
        let limit = self.config.retry_limit.max(1);
        for attempt in 1..=limit {
            match self.stream_once(client, readiness, image, cancel).await {
                Ok(()) => return,
                Err(AggregatorError::Cancelled) => {
                    info!("Stopped streaming logs for {}", image);
                    return;
                }
                Err(e) => warn!("Error getting logs (attempt {}/{}): {}", attempt, limit, e),
            }

            if attempt < limit {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Stopped streaming logs for {}", image);
                        return;
                    }
                    _ = tokio::time::sleep(self.config.retry_delay) => {}
                }
            }
        }
        warn!("Giving up on logs for {} after {} attempts", image, limit);
    }

    /// One locate-and-stream attempt.
    async fn stream_once<C, R>(
        &mut self,
        client: &C,
        readiness: &R,
        image: &str,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        C: ClusterApi + ?Sized,
        R: PodReadiness + ?Sized,
    {
        let LocatedStream { header, stream, .. } =
            self.locate(client, readiness, image, cancel).await?;
        self.forward(&header, stream, cancel).await
    }

    /// Finds the first container running `image`, waits for its pod to be
    /// ready and opens a following log stream on it.
    pub async fn locate<C, R>(
        &self,
        client: &C,
        readiness: &R,
        image: &str,
        cancel: &CancellationToken,
    ) -> Result<LocatedStream>
    where
        C: ClusterApi + ?Sized,
        R: PodReadiness + ?Sized,
    {
        let pods = client.list_pods().await.map_err(AggregatorError::ListPods)?;

        info!("Looking for logs to stream for {}", image);
        let (pod, container) = find_container(&pods, image)
            .ok_or_else(|| AggregatorError::ImageNotFound(image.to_string()))?;

        info!(
            "Trying to stream logs from pod: {} container: {}",
            pod.name, container.name
        );
        tokio::select! {
            _ = cancel.cancelled() => return Err(AggregatorError::Cancelled),
            ready = readiness.wait_for_ready(&pod.namespace, &pod.name) => {
                ready.map_err(AggregatorError::WaitForReady)?;
            }
        }

        let request = self.log_request(&container.name);
        let stream = client
            .open_log_stream(&pod.namespace, &pod.name, &request)
            .await
            .map_err(AggregatorError::OpenStream)?;

        Ok(LocatedStream {
            header: line_header(&pod.name, &container.name),
            request,
            stream,
        })
    }

    /// Request for a following stream that skips output older than this
    /// aggregator.
    pub fn log_request(&self, container: &str) -> LogRequest {
        LogRequest {
            follow: true,
            container: container.to_string(),
            since_time: self.creation_time,
        }
    }

    /// Copies newline-terminated lines from `stream` to the output until the
    /// remote side closes it. Lines read while muted are dropped.
    pub async fn forward<S>(
        &mut self,
        header: &str,
        mut stream: S,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        S: AsyncBufRead + Unpin,
    {
        let mut line = Vec::new();
        loop {
            line.clear();
            let read = tokio::select! {
                _ = cancel.cancelled() => return Err(AggregatorError::Cancelled),
                read = stream.read_until(b'\n', &mut line) => read,
            };
            if read.map_err(AggregatorError::ReadStream)? == 0 {
                break;
            }
            if line.last() != Some(&b'\n') {
                debug!("{} dropping {} trailing bytes without newline", header, line.len());
                break;
            }

            if self.muter.is_muted() {
                continue;
            }

            let mut out = Vec::with_capacity(header.len() + 1 + line.len());
            out.extend_from_slice(header.as_bytes());
            out.push(b' ');
            out.extend_from_slice(&line);
            self.output
                .write_all(&out)
                .await
                .map_err(AggregatorError::WriteOutput)?;
            self.output
                .flush()
                .await
                .map_err(AggregatorError::WriteOutput)?;
        }
        info!("{} exited", header);
        Ok(())
    }
}

/// First container, in pod listing order then spec order, whose image is
/// exactly `image`.
pub fn find_container<'a>(
    pods: &'a [PodSummary],
    image: &str,
) -> Option<(&'a PodSummary, &'a ContainerSummary)> {
    pods.iter().find_map(|pod| {
        pod.containers
            .iter()
            .inspect(|c| debug!("Found container {} with image {}", c.name, c.image))
            .find(|c| c.image == image)
            .map(|c| (pod, c))
    })
}
