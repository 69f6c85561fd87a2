//! Pipeline supervisor - startup wiring and ordered shutdown.
//!
//! # Shutdown order
//!
//! 1. Cancel the shared token (ingest and broadcaster stop dequeuing)
//! 2. Await the ingest loop, which drops the only broadcast sender,
//!    then close the subscription it hands back
//! 3. Close every session, clear the set, refuse new registrations
//! 4. Await the broadcaster
//! 5. Wait for session tasks and in-flight index writes, bounded by
//!    the grace period
//! 6. Await the listeners

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::adapters::http::{health_router, shutdown_signal, viewer_router, HealthState, ViewerState};
use crate::config::{AppConfig, ConfigError};
use crate::domain::foundation::SessionState;
use crate::ports::{
    CloseReason, IndexClient, IndexError, PushSink, PushStream, QueueClient, QueueError,
    QueueSubscription,
};

use super::broadcaster::Broadcaster;
use super::indexer::Indexer;
use super::ingest::IngestLoop;
use super::registry::SessionRegistry;
use super::session::{SessionSettings, ViewerSession};
use super::stats::{PipelineStats, StatsSnapshot};

/// Errors that abort startup. Nothing after startup is fatal.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Queue unavailable: {0}")]
    Queue(#[from] QueueError),

    #[error("Failed to subscribe to topic '{topic}': {source}")]
    Subscribe {
        topic: String,
        #[source]
        source: QueueError,
    },

    #[error("Index store unavailable: {0}")]
    Index(#[from] IndexError),

    #[error("Invalid listen address: {0}")]
    Address(#[from] std::net::AddrParseError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Entry point for starting the processing core.
pub struct Pipeline;

impl Pipeline {
    /// Subscribe to the queue and start the ingest loop and broadcaster.
    ///
    /// # Errors
    ///
    /// Invalid configuration or a failed subscription.
    pub async fn start(
        config: &AppConfig,
        queue: &dyn QueueClient,
        index: Arc<dyn IndexClient>,
    ) -> Result<RunningPipeline, StartupError> {
        config.validate().map_err(ConfigError::from)?;

        let subscription = queue
            .subscribe(&config.queue.topic, &config.queue.group_id)
            .await
            .map_err(|source| StartupError::Subscribe {
                topic: config.queue.topic.clone(),
                source,
            })?;

        let cancel = CancellationToken::new();
        let stats = Arc::new(PipelineStats::new());
        let registry = Arc::new(SessionRegistry::new());
        let indexer = Arc::new(Indexer::new(
            index,
            config.index.name.clone(),
            config.index.max_concurrent_writes,
            stats.clone(),
        ));
        let (broadcast_tx, broadcast_rx) = mpsc::channel(config.pipeline.broadcast_capacity);

        let ingest = tokio::spawn(
            IngestLoop::new(
                subscription,
                indexer.clone(),
                broadcast_tx,
                config.queue.poll_timeout(),
                stats.clone(),
                cancel.clone(),
            )
            .run(),
        );
        let broadcaster = tokio::spawn(
            Broadcaster::new(broadcast_rx, registry.clone(), stats.clone(), cancel.clone()).run(),
        );

        tracing::info!(
            topic = %config.queue.topic,
            group = %config.queue.group_id,
            index = %config.index.name,
            "Pipeline started"
        );

        Ok(RunningPipeline {
            cancel,
            registry,
            stats,
            indexer,
            sessions: TaskTracker::new(),
            settings: SessionSettings {
                buffer_capacity: config.pipeline.session_buffer_capacity,
                ping_interval: config.pipeline.ping_interval(),
                read_deadline: config.pipeline.read_deadline(),
            },
            viewer_path: config.server.ws_path.clone(),
            shutdown_grace: config.pipeline.shutdown_grace(),
            ingest,
            broadcaster,
            listeners: Vec::new(),
        })
    }
}

/// What shutdown found and cleaned up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Sessions still registered when shutdown began.
    pub sessions_closed: usize,
    /// Index writes still running when the grace period ran out.
    pub index_writes_abandoned: usize,
    /// Payloads the broadcaster fanned out over its lifetime.
    pub broadcasts: u64,
    pub stats: StatsSnapshot,
}

/// Handle to a started pipeline.
pub struct RunningPipeline {
    cancel: CancellationToken,
    registry: Arc<SessionRegistry>,
    stats: Arc<PipelineStats>,
    indexer: Arc<Indexer>,
    sessions: TaskTracker,
    settings: SessionSettings,
    viewer_path: String,
    shutdown_grace: Duration,
    ingest: JoinHandle<Box<dyn QueueSubscription>>,
    broadcaster: JoinHandle<u64>,
    listeners: Vec<JoinHandle<()>>,
}

impl RunningPipeline {
    /// Serve the viewer upgrade endpoint on `listener`.
    pub fn serve_viewers(&mut self, listener: TcpListener) {
        let state = ViewerState {
            registry: self.registry.clone(),
            stats: self.stats.clone(),
            settings: self.settings,
            shutdown: self.cancel.clone(),
            sessions: self.sessions.clone(),
        };
        let router = viewer_router(&self.viewer_path, state);
        self.listeners
            .push(spawn_server("viewer", listener, router, self.cancel.clone()));
    }

    /// Serve the health endpoint on `listener`.
    pub fn serve_health(&mut self, listener: TcpListener) {
        let state = HealthState {
            registry: self.registry.clone(),
            stats: self.stats.clone(),
            shutdown: self.cancel.clone(),
        };
        self.listeners
            .push(spawn_server("health", listener, health_router(state), self.cancel.clone()));
    }

    /// Run a viewer session over an already-established connection.
    pub fn connect_viewer<S, R>(&self, sink: S, stream: R) -> JoinHandle<SessionState>
    where
        S: PushSink + 'static,
        R: PushStream + 'static,
    {
        let session = ViewerSession::new(self.registry.clone(), self.stats.clone(), self.settings);
        tracing::info!(viewer_id = %session.id(), "Viewer connected");
        self.sessions.spawn(session.run(sink, stream))
    }

    /// Number of active viewer sessions.
    pub async fn session_count(&self) -> usize {
        self.registry.session_count().await
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop everything in order. See the module docs for the sequence.
    pub async fn shutdown(self) -> ShutdownReport {
        tracing::info!("Pipeline shutting down");
        self.cancel.cancel();

        match self.ingest.await {
            Ok(mut subscription) => subscription.close().await,
            Err(e) => tracing::error!(error = %e, "Ingest loop task failed"),
        }

        let sessions_closed = self.registry.close_all(CloseReason::Shutdown).await;

        let broadcasts = match self.broadcaster.await {
            Ok(broadcasts) => broadcasts,
            Err(e) => {
                tracing::error!(error = %e, "Broadcaster task failed");
                0
            }
        };

        self.sessions.close();
        if time::timeout(self.shutdown_grace, self.sessions.wait())
            .await
            .is_err()
        {
            tracing::warn!(remaining = self.sessions.len(), "Viewer sessions still running after grace period");
        }

        let index_writes_abandoned = self.indexer.drain(self.shutdown_grace).await;

        for listener in self.listeners {
            let abort = listener.abort_handle();
            match time::timeout(self.shutdown_grace, listener).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Listener task failed"),
                Err(_) => {
                    tracing::warn!("Listener did not stop within grace period, aborting");
                    abort.abort();
                }
            }
        }

        let report = ShutdownReport {
            sessions_closed,
            index_writes_abandoned,
            broadcasts,
            stats: self.stats.snapshot(),
        };
        tracing::info!(
            sessions_closed = report.sessions_closed,
            index_writes_abandoned = report.index_writes_abandoned,
            consumed = report.stats.consumed,
            "Pipeline stopped"
        );
        report
    }
}

fn spawn_server(
    name: &'static str,
    listener: TcpListener,
    router: Router,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match listener.local_addr() {
            Ok(addr) => tracing::info!(listener = name, address = %addr, "Listening"),
            Err(e) => tracing::warn!(listener = name, error = %e, "Listening on unknown address"),
        }
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal(cancel))
            .await
        {
            tracing::error!(listener = name, error = %e, "Server error");
        }
        tracing::info!(listener = name, "Listener stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::index::InMemoryIndex;
    use crate::adapters::push::{in_memory_channel, OutboundFrame};
    use crate::adapters::queue::InMemoryQueue;
    use crate::config::ValidationError;
    use async_trait::async_trait;

    struct UnreachableQueue;

    #[async_trait]
    impl QueueClient for UnreachableQueue {
        async fn publish(&self, _: &str, _: &[u8], _: &[u8]) -> Result<(), QueueError> {
            Err(QueueError::Unavailable("connection refused".into()))
        }

        async fn subscribe(
            &self,
            _: &str,
            _: &str,
        ) -> Result<Box<dyn QueueSubscription>, QueueError> {
            Err(QueueError::Unavailable("connection refused".into()))
        }
    }

    fn index() -> Arc<dyn IndexClient> {
        Arc::new(InMemoryIndex::new())
    }

    #[tokio::test]
    async fn failed_subscription_aborts_startup() {
        let result = Pipeline::start(&AppConfig::default(), &UnreachableQueue, index()).await;
        assert!(matches!(result, Err(StartupError::Subscribe { .. })));
    }

    #[tokio::test]
    async fn invalid_config_aborts_startup() {
        let mut config = AppConfig::default();
        config.pipeline.broadcast_capacity = 0;

        let result = Pipeline::start(&config, &InMemoryQueue::new(), index()).await;
        assert!(matches!(
            result,
            Err(StartupError::Config(ConfigError::ValidationFailed(
                ValidationError::ZeroCapacity(_)
            )))
        ));
    }

    #[tokio::test]
    async fn shutdown_closes_every_session() {
        let queue = InMemoryQueue::new();
        let pipeline = Pipeline::start(&AppConfig::default(), &queue, index())
            .await
            .unwrap();

        let mut viewers = Vec::new();
        let mut handles = Vec::new();
        for _ in 0..3 {
            let (sink, stream, viewer) = in_memory_channel();
            handles.push(pipeline.connect_viewer(sink, stream));
            viewers.push(viewer);
        }
        while pipeline.session_count().await < 3 {
            tokio::task::yield_now().await;
        }

        let report = pipeline.shutdown().await;

        assert_eq!(report.sessions_closed, 3);
        assert_eq!(report.stats.sessions_opened, 3);
        assert_eq!(report.stats.sessions_closed, 3);
        for handle in handles {
            assert_eq!(handle.await.unwrap(), SessionState::Closed);
        }
        for mut viewer in viewers {
            let frames = viewer.collect_until_closed().await;
            assert_eq!(frames.last(), Some(&OutboundFrame::Close(CloseReason::Shutdown)));
        }
    }

    #[tokio::test]
    async fn viewers_connecting_after_shutdown_are_refused() {
        let queue = InMemoryQueue::new();
        let pipeline = Pipeline::start(&AppConfig::default(), &queue, index())
            .await
            .unwrap();
        pipeline.cancel.cancel();
        pipeline.registry.close_all(CloseReason::Shutdown).await;

        let (sink, stream, _viewer) = in_memory_channel();
        let state = pipeline.connect_viewer(sink, stream).await.unwrap();

        assert_eq!(state, SessionState::Closed);
        assert_eq!(pipeline.session_count().await, 0);
        assert!(pipeline.is_shutting_down());
    }

    #[tokio::test]
    async fn listeners_stop_on_shutdown() {
        let queue = InMemoryQueue::new();
        let mut pipeline = Pipeline::start(&AppConfig::default(), &queue, index())
            .await
            .unwrap();
        pipeline.serve_viewers(TcpListener::bind("127.0.0.1:0").await.unwrap());
        pipeline.serve_health(TcpListener::bind("127.0.0.1:0").await.unwrap());

        let report = time::timeout(Duration::from_secs(10), pipeline.shutdown()).await;
        assert!(report.is_ok());
    }
}
