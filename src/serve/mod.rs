//! Development server with live reload.
//!
//! `serve` runs two things side by side until Ctrl-C:
//!
//! - the HTTP server ([`DevServer`], axum on a tokio runtime), answering
//!   static files from the routes and base directories plus the two reload
//!   endpoints;
//! - the polling [`watch::Watcher`] on a plain thread, which reruns the
//!   matching task when sources change and pushes a notification through
//!   the project's [`reload::ReloadHub`].

pub mod files;
pub mod reload;
pub mod watch;

use crate::plan::TaskName;
use crate::tasks::{Project, TaskError, TaskReport};
use axum::Router;
use axum::routing::get;
use files::FileResolver;
use reload::ReloadHub;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("could not start the async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("could not listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server failed: {0}")]
    Server(#[source] std::io::Error),
    #[error("could not wait for Ctrl-C: {0}")]
    Signal(#[source] std::io::Error),
    #[error("the file watcher panicked")]
    WatcherPanicked,
}

#[derive(Clone)]
pub(crate) struct AppState {
    files: Arc<FileResolver>,
    hub: ReloadHub,
}

pub fn router(files: FileResolver, hub: ReloadHub) -> Router {
    let state = AppState {
        files: Arc::new(files),
        hub,
    };
    Router::new()
        .route(reload::EVENTS_PATH, get(reload::events))
        .route(reload::CLIENT_PATH, get(reload::client))
        .fallback(files::serve_file)
        .with_state(state)
}

/// A running HTTP server. Dropping it without [`DevServer::shutdown`] leaves
/// the server running until the runtime stops.
pub struct DevServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl DevServer {
    /// Bind `serve.host` on `port` (0 picks a free port) and start serving.
    pub async fn start(project: &Project, port: u16) -> Result<Self, ServeError> {
        let host = project.config.serve.host.as_str();
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|source| ServeError::Bind {
                addr: format!("{host}:{port}"),
                source,
            })?;
        let addr = listener.local_addr().map_err(ServeError::Server)?;

        let app = router(FileResolver::for_project(project), project.reload_hub().clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            handle,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Stop accepting connections and wait for the server task.
    ///
    /// Open event streams keep a graceful shutdown waiting, so the hub's
    /// senders must be gone (or clients disconnected) for this to return.
    /// [`serve`] aborts instead.
    pub async fn shutdown(mut self) -> Result<(), ServeError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        match self.handle.await {
            Ok(result) => result.map_err(ServeError::Server),
            Err(e) if e.is_cancelled() => Ok(()),
            Err(_) => Err(ServeError::Server(std::io::Error::other("server task panicked"))),
        }
    }

    fn abort(self) {
        self.handle.abort();
    }
}

/// Watch sources and serve the site until Ctrl-C.
pub fn serve(project: &Project) -> Result<TaskReport, TaskError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(ServeError::Runtime)?;
    let mut watcher = watch::Watcher::new(project)?;
    let stop = AtomicBool::new(false);

    std::thread::scope(|scope| -> Result<(), TaskError> {
        let watching = scope.spawn(|| watcher.run(&stop));

        let served = runtime.block_on(async {
            let server = DevServer::start(project, project.config.serve.port).await?;
            info!(url = %server.url("/"), "serving");
            let signal = tokio::signal::ctrl_c().await.map_err(ServeError::Signal);
            info!("shutting down");
            // Browsers hold event streams open forever; don't wait for them.
            server.abort();
            signal
        });

        stop.store(true, Ordering::Relaxed);
        if watching.join().is_err() {
            warn!("watcher thread panicked");
            return Err(ServeError::WatcherPanicked.into());
        }
        served.map_err(TaskError::from)
    })?;

    Ok(TaskReport {
        task: TaskName::Serve,
        files: Vec::new(),
    })
}
