//! HTTP measurement probe.
//!
//! Talks plain HTTP/1.1 to speedtest-style servers: a small resource for
//! latency, a large resource for download and a POST sink for upload.
//! Each step opens its own connection so one step's failure cannot leave a
//! half-read body in front of the next.

use std::future::Future;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST, USER_AGENT};
use http::{Method, Request};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::client::conn::http1::SendRequest;
use tokio::net::TcpStream;
use tracing::debug;

use speedwatch_core::config::ProbeConfig;

use crate::error::{ProbeError, ProbeResult, Stage};
use crate::probe::Probe;

const AGENT: &str = concat!("speedwatch/", env!("CARGO_PKG_VERSION"));

/// A candidate that answered during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTarget {
    /// `host:port` of the server.
    pub address: String,
    /// TCP connect time observed during discovery.
    pub connect_time: Duration,
}

/// [`Probe`] over plain HTTP/1.1.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    config: ProbeConfig,
}

impl HttpProbe {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Open a connection and drive it in the background.
    async fn connect(&self, stage: Stage, address: &str) -> ProbeResult<SendRequest<Full<Bytes>>> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|source| ProbeError::Connect {
                stage,
                address: address.to_string(),
                source,
            })?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|source| ProbeError::Handshake {
                stage,
                address: address.to_string(),
                source,
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "probe connection closed with error");
            }
        });

        Ok(sender)
    }

    fn request(
        &self,
        stage: Stage,
        method: Method,
        target: &HttpTarget,
        path: &str,
        body: Bytes,
    ) -> ProbeResult<Request<Full<Bytes>>> {
        Request::builder()
            .method(method)
            .uri(path)
            .header(HOST, target.address.as_str())
            .header(USER_AGENT, AGENT)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(Full::new(body))
            .map_err(|source| ProbeError::InvalidRequest { stage, source })
    }

    /// Send a request and fail on a non-2xx status.
    async fn send(
        &self,
        stage: Stage,
        sender: &mut SendRequest<Full<Bytes>>,
        request: Request<Full<Bytes>>,
    ) -> ProbeResult<hyper::Response<Incoming>> {
        let path = request.uri().path().to_string();
        sender.ready().await.map_err(|source| ProbeError::Request {
            stage,
            path: path.clone(),
            source,
        })?;
        let response = sender
            .send_request(request)
            .await
            .map_err(|source| ProbeError::Request {
                stage,
                path: path.clone(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(ProbeError::Status {
                stage,
                path,
                status: response.status(),
            });
        }
        Ok(response)
    }

    /// Bound a whole step by `request_timeout`.
    async fn timed<T>(
        &self,
        stage: Stage,
        step: impl Future<Output = ProbeResult<T>>,
    ) -> ProbeResult<T> {
        let timeout = self.config.request_timeout.get();
        tokio::time::timeout(timeout, step)
            .await
            .map_err(|_| ProbeError::Timeout { stage, timeout })?
    }

    async fn measure_latency(&self, target: &HttpTarget) -> ProbeResult<Duration> {
        let stage = Stage::Ping;
        let path = self.config.latency_path.as_str();
        let mut sender = self.connect(stage, &target.address).await?;
        let mut best: Option<Duration> = None;

        for _ in 0..self.config.ping_count {
            let request = self.request(stage, Method::GET, target, path, Bytes::new())?;
            let started = Instant::now();
            let response = self.send(stage, &mut sender, request).await?;
            let rtt = started.elapsed();
            drain(stage, path, response.into_body()).await?;
            best = Some(best.map_or(rtt, |b| b.min(rtt)));
        }

        best.ok_or_else(|| ProbeError::failed(stage, "no ping attempts made"))
    }

    async fn measure_download(&self, target: &HttpTarget) -> ProbeResult<f64> {
        let stage = Stage::Download;
        let path = self.config.download_path.as_str();
        let mut sender = self.connect(stage, &target.address).await?;
        let request = self.request(stage, Method::GET, target, path, Bytes::new())?;

        let started = Instant::now();
        let response = self.send(stage, &mut sender, request).await?;
        let bytes = drain(stage, path, response.into_body()).await?;
        let elapsed = started.elapsed();

        if bytes == 0 {
            return Err(ProbeError::failed(stage, "empty response body"));
        }
        debug!(address = %target.address, bytes, ?elapsed, "download finished");
        Ok(rate(bytes, elapsed))
    }

    async fn measure_upload(&self, target: &HttpTarget) -> ProbeResult<f64> {
        let stage = Stage::Upload;
        let path = self.config.upload_path.as_str();
        let payload = Bytes::from(vec![0u8; self.config.upload_bytes]);
        let bytes = payload.len() as u64;
        let mut sender = self.connect(stage, &target.address).await?;
        let request = self.request(stage, Method::POST, target, path, payload)?;

        let started = Instant::now();
        let response = self.send(stage, &mut sender, request).await?;
        drain(stage, path, response.into_body()).await?;
        let elapsed = started.elapsed();

        debug!(address = %target.address, bytes, ?elapsed, "upload finished");
        Ok(rate(bytes, elapsed))
    }
}

/// Read a response body to the end, returning the number of payload bytes.
async fn drain(stage: Stage, path: &str, mut body: Incoming) -> ProbeResult<u64> {
    let mut total = 0u64;
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|source| ProbeError::Request {
            stage,
            path: path.to_string(),
            source,
        })?;
        if let Some(data) = frame.data_ref() {
            total += data.len() as u64;
        }
    }
    Ok(total)
}

/// Bytes per second, zero when no time elapsed.
fn rate(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 { bytes as f64 / secs } else { 0.0 }
}

impl Probe for HttpProbe {
    type Target = HttpTarget;

    async fn discover(&self) -> ProbeResult<HttpTarget> {
        let connect_timeout = self.config.connect_timeout.get();
        let mut best: Option<HttpTarget> = None;

        for address in &self.config.targets {
            let started = Instant::now();
            let connect = TcpStream::connect(address.as_str());
            match tokio::time::timeout(connect_timeout, connect).await {
                Ok(Ok(_stream)) => {
                    let connect_time = started.elapsed();
                    debug!(%address, ?connect_time, "candidate reachable");
                    if best.as_ref().is_none_or(|b| connect_time < b.connect_time) {
                        best = Some(HttpTarget {
                            address: address.clone(),
                            connect_time,
                        });
                    }
                }
                Ok(Err(e)) => debug!(%address, error = %e, "candidate unreachable"),
                Err(_) => debug!(%address, ?connect_timeout, "candidate connect timed out"),
            }
        }

        best.ok_or(ProbeError::NoTarget {
            candidates: self.config.targets.len(),
        })
    }

    async fn ping(&self, target: &HttpTarget) -> ProbeResult<Duration> {
        self.timed(Stage::Ping, self.measure_latency(target)).await
    }

    async fn download(&self, target: &HttpTarget) -> ProbeResult<f64> {
        self.timed(Stage::Download, self.measure_download(target)).await
    }

    async fn upload(&self, target: &HttpTarget) -> ProbeResult<f64> {
        self.timed(Stage::Upload, self.measure_upload(target)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use speedwatch_core::HumanDuration;

    const BLOB_LEN: usize = 64 * 1024;

    async fn serve_speedtest() -> SocketAddr {
        let app = Router::new()
            .route("/", get(|| async { "pong" }))
            .route("/blob", get(|| async { vec![7u8; BLOB_LEN] }))
            .route("/empty", get(|| async { "" }))
            .route("/broken", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .route(
                "/upload",
                post(|body: axum::body::Bytes| async move { body.len().to_string() }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn test_config(targets: Vec<String>) -> ProbeConfig {
        ProbeConfig {
            targets,
            latency_path: "/".to_string(),
            download_path: "/blob".to_string(),
            upload_path: "/upload".to_string(),
            ping_count: 3,
            upload_bytes: 256 * 1024,
            connect_timeout: HumanDuration::from_secs(1),
            request_timeout: HumanDuration::from_secs(5),
        }
    }

    #[test]
    fn rate_handles_zero_elapsed() {
        assert_eq!(rate(1000, Duration::ZERO), 0.0);
        assert_eq!(rate(1000, Duration::from_millis(500)), 2000.0);
    }

    #[tokio::test]
    async fn discover_fails_when_nothing_is_reachable() {
        let probe = HttpProbe::new(test_config(vec!["127.0.0.1:1".to_string()]));
        let err = probe.discover().await.unwrap_err();
        assert_eq!(err.stage(), Stage::Discovery);
        assert!(matches!(err, ProbeError::NoTarget { candidates: 1 }));
    }

    #[tokio::test]
    async fn discover_skips_unreachable_candidates() {
        let addr = serve_speedtest().await;
        let probe = HttpProbe::new(test_config(vec![
            "127.0.0.1:1".to_string(),
            addr.to_string(),
        ]));
        let target = probe.discover().await.unwrap();
        assert_eq!(target.address, addr.to_string());
    }

    #[tokio::test]
    async fn full_cycle_against_local_server() {
        let addr = serve_speedtest().await;
        let probe = HttpProbe::new(test_config(vec![addr.to_string()]));

        let target = probe.discover().await.unwrap();
        let latency = probe.ping(&target).await.unwrap();
        assert!(latency > Duration::ZERO);
        assert!(latency < Duration::from_secs(5));

        let download = probe.download(&target).await.unwrap();
        assert!(download > 0.0, "download rate was {download}");

        let upload = probe.upload(&target).await.unwrap();
        assert!(upload > 0.0, "upload rate was {upload}");
    }

    #[tokio::test]
    async fn download_reports_http_status() {
        let addr = serve_speedtest().await;
        let mut config = test_config(vec![addr.to_string()]);
        config.download_path = "/broken".to_string();
        let probe = HttpProbe::new(config);

        let target = probe.discover().await.unwrap();
        let err = probe.download(&target).await.unwrap_err();
        assert_eq!(err.stage(), Stage::Download);
        assert!(matches!(
            err,
            ProbeError::Status { status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR
        ));
    }

    #[tokio::test]
    async fn download_rejects_empty_body() {
        let addr = serve_speedtest().await;
        let mut config = test_config(vec![addr.to_string()]);
        config.download_path = "/empty".to_string();
        let probe = HttpProbe::new(config);

        let target = probe.discover().await.unwrap();
        let err = probe.download(&target).await.unwrap_err();
        assert!(matches!(err, ProbeError::Failed { stage: Stage::Download, .. }));
    }

    #[tokio::test]
    async fn ping_to_vanished_target_fails_with_connect() {
        let probe = HttpProbe::new(test_config(vec!["127.0.0.1:1".to_string()]));
        let target = HttpTarget {
            address: "127.0.0.1:1".to_string(),
            connect_time: Duration::ZERO,
        };
        let err = probe.ping(&target).await.unwrap_err();
        assert_eq!(err.stage(), Stage::Ping);
        assert!(matches!(err, ProbeError::Connect { .. }));
    }
}
