//! In-process OTLP/gRPC collector for integration tests.
//!
//! Serves the trace, metrics and logs services on an ephemeral port,
//! records every request with its metadata, and can be told to fail the
//! next calls with chosen status codes.

#![allow(dead_code)]

use opentelemetry_proto::tonic::collector::logs::v1::logs_service_server::{
    LogsService, LogsServiceServer,
};
use opentelemetry_proto::tonic::collector::logs::v1::{
    ExportLogsServiceRequest, ExportLogsServiceResponse,
};
use opentelemetry_proto::tonic::collector::metrics::v1::metrics_service_server::{
    MetricsService, MetricsServiceServer,
};
use opentelemetry_proto::tonic::collector::metrics::v1::{
    ExportMetricsServiceRequest, ExportMetricsServiceResponse,
};
use opentelemetry_proto::tonic::collector::trace::v1::trace_service_server::{
    TraceService, TraceServiceServer,
};
use opentelemetry_proto::tonic::collector::trace::v1::{
    ExportTraceServiceRequest, ExportTraceServiceResponse,
};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::codec::CompressionEncoding;
use tonic::metadata::MetadataMap;
use tonic::transport::Server;
use tonic::{Code, Request, Response, Status};

#[derive(Default)]
struct CollectorState {
    spans: Mutex<Vec<ExportTraceServiceRequest>>,
    metrics: Mutex<Vec<ExportMetricsServiceRequest>>,
    logs: Mutex<Vec<ExportLogsServiceRequest>>,
    metadata: Mutex<Vec<MetadataMap>>,
    failures: Mutex<VecDeque<Code>>,
    attempts: AtomicUsize,
}

impl CollectorState {
    fn accept(&self, metadata: &MetadataMap) -> Result<(), Status> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.metadata.lock().unwrap().push(metadata.clone());

        match self.failures.lock().unwrap().pop_front() {
            Some(code) => Err(Status::new(code, "injected failure")),
            None => Ok(()),
        }
    }
}

#[derive(Clone)]
struct MockService(Arc<CollectorState>);

#[tonic::async_trait]
impl TraceService for MockService {
    async fn export(
        &self,
        request: Request<ExportTraceServiceRequest>,
    ) -> Result<Response<ExportTraceServiceResponse>, Status> {
        self.0.accept(request.metadata())?;
        self.0.spans.lock().unwrap().push(request.into_inner());
        Ok(Response::new(ExportTraceServiceResponse::default()))
    }
}

#[tonic::async_trait]
impl MetricsService for MockService {
    async fn export(
        &self,
        request: Request<ExportMetricsServiceRequest>,
    ) -> Result<Response<ExportMetricsServiceResponse>, Status> {
        self.0.accept(request.metadata())?;
        self.0.metrics.lock().unwrap().push(request.into_inner());
        Ok(Response::new(ExportMetricsServiceResponse::default()))
    }
}

#[tonic::async_trait]
impl LogsService for MockService {
    async fn export(
        &self,
        request: Request<ExportLogsServiceRequest>,
    ) -> Result<Response<ExportLogsServiceResponse>, Status> {
        self.0.accept(request.metadata())?;
        self.0.logs.lock().unwrap().push(request.into_inner());
        Ok(Response::new(ExportLogsServiceResponse::default()))
    }
}

/// A running mock collector. Stops when dropped.
pub struct MockCollector {
    addr: SocketAddr,
    state: Arc<CollectorState>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl MockCollector {
    /// Starts a collector on an ephemeral localhost port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock collector");
        let addr = listener.local_addr().expect("Failed to read local address");

        let state = Arc::new(CollectorState::default());
        let service = MockService(Arc::clone(&state));
        let (shutdown, stopped) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            Server::builder()
                .add_service(
                    TraceServiceServer::new(service.clone())
                        .accept_compressed(CompressionEncoding::Gzip)
                        .accept_compressed(CompressionEncoding::Deflate),
                )
                .add_service(
                    MetricsServiceServer::new(service.clone())
                        .accept_compressed(CompressionEncoding::Gzip)
                        .accept_compressed(CompressionEncoding::Deflate),
                )
                .add_service(
                    LogsServiceServer::new(service)
                        .accept_compressed(CompressionEncoding::Gzip)
                        .accept_compressed(CompressionEncoding::Deflate),
                )
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async {
                    let _ = stopped.await;
                })
                .await
                .expect("Mock collector failed");
        });

        Self {
            addr,
            state,
            shutdown: Some(shutdown),
            handle,
        }
    }

    /// Plaintext endpoint URI of the collector.
    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Fails the next calls, one per code, before accepting again.
    pub fn fail_next(&self, codes: &[Code]) {
        self.state.failures.lock().unwrap().extend(codes.iter().copied());
    }

    /// Number of export calls received, failed ones included.
    pub fn attempts(&self) -> usize {
        self.state.attempts.load(Ordering::SeqCst)
    }

    /// Accepted span requests.
    pub fn spans(&self) -> Vec<ExportTraceServiceRequest> {
        self.state.spans.lock().unwrap().clone()
    }

    /// Accepted metric requests.
    pub fn metrics(&self) -> Vec<ExportMetricsServiceRequest> {
        self.state.metrics.lock().unwrap().clone()
    }

    /// Accepted log requests.
    pub fn logs(&self) -> Vec<ExportLogsServiceRequest> {
        self.state.logs.lock().unwrap().clone()
    }

    /// Metadata of every call received, in arrival order.
    pub fn metadata(&self) -> Vec<MetadataMap> {
        self.state.metadata.lock().unwrap().clone()
    }

    /// Stops the collector and waits for it to exit.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let _ = (&mut self.handle).await;
    }
}

impl Drop for MockCollector {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// Returns a localhost endpoint with nothing listening on it.
pub async fn unreachable_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind temporary listener");
    let addr = listener.local_addr().expect("Failed to read local address");
    drop(listener);
    format!("http://{addr}")
}
