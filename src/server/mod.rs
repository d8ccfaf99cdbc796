//! TCP request server exposing the VP-tree index.
//!
//! The server lifecycle is `Unstarted -> Running -> Stopped`. `start` loads
//! the vector store, builds the index once (blocking startup), binds the
//! listener, and only then publishes the Running state; `stop` shuts the
//! accept loop down and lets in-flight connections finish on their own.
//! The built index is shared read-only across connection tasks, so the
//! query path takes no locks.

pub mod protocol;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{Result, VantageError};
use crate::fill::FillSearch;
use crate::server::protocol::{QueryRequest, QueryResponse, decode_request, encode_response};
use crate::store::VectorStore;
use crate::vector::DistanceMetric;
use crate::vptree::{VpTree, VpTreeConfig};

/// How k-NN queries are answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    /// Single bounded-heap descent.
    #[default]
    Exact,
    /// Expanding-radius fill search.
    Fill,
}

/// Startup configuration for the search server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Path to the serialized vector store.
    pub vector_data_path: PathBuf,
    /// TCP port to listen on; 0 picks a free port.
    pub listen_port: u16,
    /// Leaf size for the VP-tree build.
    pub leaf_size: usize,
    /// Distance metric.
    pub metric: DistanceMetric,
    /// Seed for vantage-point selection.
    pub seed: u64,
    /// Strategy for answering k-NN queries.
    pub strategy: SearchStrategy,
    /// Per-query wall-clock budget in milliseconds. Queries that exceed it
    /// are abandoned and their connection closed.
    pub query_timeout_ms: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            vector_data_path: PathBuf::from("vectors.vstr"),
            listen_port: 7877,
            leaf_size: 2,
            metric: DistanceMetric::Euclidean,
            seed: 42,
            strategy: SearchStrategy::Exact,
            query_timeout_ms: None,
        }
    }
}

impl ServerConfig {
    /// Load a configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            VantageError::storage(format!("failed to read config {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn tree_config(&self) -> VpTreeConfig {
        VpTreeConfig::default()
            .with_leaf_size(self.leaf_size)
            .with_metric(self.metric)
            .with_seed(self.seed)
    }
}

/// Lifecycle states of the server.
enum ServerState {
    Unstarted,
    Running(Arc<VpTree>),
    Stopped,
}

/// A TCP server answering k-NN and range queries against a single index.
pub struct SearchServer {
    config: ServerConfig,
    state: Arc<RwLock<ServerState>>,
    shutdown: Arc<Notify>,
    accept_task: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl SearchServer {
    /// Create an unstarted server.
    pub fn new(config: ServerConfig) -> Self {
        SearchServer {
            config,
            state: Arc::new(RwLock::new(ServerState::Unstarted)),
            shutdown: Arc::new(Notify::new()),
            accept_task: None,
            local_addr: None,
        }
    }

    /// Load the store, build the index, bind, and begin accepting
    /// connections. Returns the bound address.
    ///
    /// Build failures are fatal: the server stays out of the Running state.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if !matches!(*self.state.read(), ServerState::Unstarted) {
            return Err(VantageError::invalid_argument(
                "server has already been started",
            ));
        }

        let store = {
            let path = self.config.vector_data_path.clone();
            tokio::task::spawn_blocking(move || VectorStore::load(&path))
                .await
                .map_err(|e| VantageError::internal(format!("store load task failed: {e}")))??
        };
        let store = Arc::new(store);
        info!(
            points = store.len(),
            dimension = store.dimension(),
            "vector store loaded"
        );

        let build_started = Instant::now();
        let tree = {
            let store = store.clone();
            let tree_config = self.config.tree_config();
            tokio::task::spawn_blocking(move || VpTree::build(store, tree_config))
                .await
                .map_err(|e| VantageError::internal(format!("index build task failed: {e}")))??
        };
        let tree = Arc::new(tree);
        info!(
            elapsed_ms = build_started.elapsed().as_millis() as u64,
            "index built"
        );

        let listener = TcpListener::bind(("0.0.0.0", self.config.listen_port)).await?;
        let addr = listener.local_addr()?;

        *self.state.write() = ServerState::Running(tree.clone());

        let shutdown = self.shutdown.clone();
        let strategy = self.config.strategy;
        let timeout = self.config.query_timeout_ms.map(Duration::from_millis);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.notified() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            debug!(%peer, "connection accepted");
                            let tree = tree.clone();
                            tokio::spawn(handle_connection(stream, tree, strategy, timeout));
                        }
                        Err(e) => warn!(error = %e, "accept failed"),
                    },
                }
            }
        });

        self.accept_task = Some(task);
        self.local_addr = Some(addr);
        info!(%addr, "server running");
        Ok(addr)
    }

    /// Close the listening socket and stop accepting connections. In-flight
    /// requests are left to complete.
    pub async fn stop(&mut self) {
        self.shutdown.notify_one();
        if let Some(task) = self.accept_task.take() {
            let _ = task.await;
        }
        *self.state.write() = ServerState::Stopped;
        info!("server stopped");
    }

    /// The bound address, once running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Answer a single query against the current state. Queries outside the
    /// Running state get a `service_unavailable` error response.
    pub fn handle_query(&self, request: QueryRequest) -> QueryResponse {
        let tree = match &*self.state.read() {
            ServerState::Running(tree) => tree.clone(),
            ServerState::Unstarted => {
                return QueryResponse::from_error(&VantageError::service_unavailable(
                    "index is not built yet",
                ));
            }
            ServerState::Stopped => {
                return QueryResponse::from_error(&VantageError::service_unavailable(
                    "server is stopped",
                ));
            }
        };
        run_query(&tree, self.config.strategy, request)
    }
}

/// Validate and dispatch one request against the index. k-NN takes
/// precedence when both `k` and `maxRange` are present.
pub fn run_query(tree: &VpTree, strategy: SearchStrategy, request: QueryRequest) -> QueryResponse {
    let outcome = match (request.k, request.max_range) {
        (Some(k), _) => match strategy {
            SearchStrategy::Exact => tree.knn(&request.query_vector, k),
            SearchStrategy::Fill => FillSearch::new(tree, k).and_then(|mut search| {
                search.search(&request.query_vector)?;
                Ok(search.neighbors())
            }),
        },
        (None, Some(max_range)) => tree.range(&request.query_vector, max_range),
        (None, None) => Err(VantageError::invalid_argument(
            "request must carry k or maxRange",
        )),
    };

    match outcome {
        Ok(neighbors) => QueryResponse::from_neighbors(neighbors),
        Err(e) => QueryResponse::from_error(&e),
    }
}

/// Serve one connection: read request lines, answer each in order.
///
/// A malformed payload produces an error response and leaves the connection
/// open; an exceeded query budget abandons the connection without a
/// response.
async fn handle_connection(
    stream: TcpStream,
    tree: Arc<VpTree>,
    strategy: SearchStrategy,
    timeout: Option<Duration>,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "request read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match decode_request(&line) {
            Ok(request) => {
                let tree = tree.clone();
                let search = tokio::task::spawn_blocking(move || run_query(&tree, strategy, request));
                let joined = match timeout {
                    Some(budget) => match tokio::time::timeout(budget, search).await {
                        Ok(joined) => joined,
                        Err(_) => {
                            warn!("query exceeded its time budget, abandoning connection");
                            return;
                        }
                    },
                    None => search.await,
                };
                match joined {
                    Ok(response) => response,
                    Err(e) => {
                        error!(error = %e, "search task failed");
                        QueryResponse::from_error(&VantageError::internal("search task failed"))
                    }
                }
            }
            Err(e) => {
                debug!(error = %e, "malformed request");
                QueryResponse::from_error(&e)
            }
        };

        let encoded = match encode_response(&response) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!(error = %e, "response encoding failed");
                break;
            }
        };
        if let Err(e) = write_half.write_all(encoded.as_bytes()).await {
            debug!(error = %e, "response write failed");
            break;
        }
    }
}
