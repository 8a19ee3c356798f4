// Copyright (c) 2024 InfluxData Inc.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! In-process control plane and shard node used by the integration tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::{Bytes, BytesMut};
use influxdb3_remote_query::codec::encode_frame;
use influxdb3_remote_query::{
    BackoffExecutor, ClusterNode, Measurement, NodeDirectoryResolver, RemoteIteratorCreator,
    RetryPolicy, ShardRef, Sources,
};
use influxdb3_shard_rpc_protos::influxdb3::internal::shard_rpc::v1::{
    ExpandSourcesCommand, ExpandSourcesResponse, FieldDimensionsCommand, FieldDimensionsResponse,
    ReadShardCommand, ReadShardResponse,
};
use prost::Message;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const CLUSTER: &str = "prod";
pub const LIVE_NODE: u64 = 1;
pub const DEAD_NODE: u64 = 2;

#[derive(Debug)]
pub struct MockState {
    pub nodes: Mutex<Option<Vec<ClusterNode>>>,
    pub directory_body: Mutex<Option<String>>,
    pub read_body: Mutex<Vec<u8>>,
    pub rpc_status: Mutex<StatusCode>,
    pub field_dimensions: Mutex<FieldDimensionsResponse>,
    /// Regex to the measurement names it expands to on this node.
    pub expansions: Mutex<HashMap<String, Vec<String>>>,
    pub expand_error: Mutex<String>,
    pub clusters_requested: Mutex<Vec<String>>,
    pub last_read: Mutex<Option<ReadShardCommand>>,
    pub last_field_dimensions: Mutex<Option<FieldDimensionsCommand>>,
    pub directory_hits: AtomicUsize,
    pub rpc_hits: AtomicUsize,
}

impl MockState {
    fn new(addr: SocketAddr) -> Self {
        let nodes = vec![
            ClusterNode {
                id: LIVE_NODE,
                ip: addr.ip().to_string(),
                hostname: "data-1".to_string(),
                bind_address: addr.to_string(),
                alive: true,
            },
            ClusterNode {
                id: DEAD_NODE,
                ip: addr.ip().to_string(),
                hostname: "data-2".to_string(),
                bind_address: addr.to_string(),
                alive: false,
            },
        ];
        Self {
            nodes: Mutex::new(Some(nodes)),
            directory_body: Mutex::new(None),
            read_body: Mutex::new(Vec::new()),
            rpc_status: Mutex::new(StatusCode::OK),
            field_dimensions: Mutex::new(FieldDimensionsResponse::default()),
            expansions: Mutex::new(HashMap::new()),
            expand_error: Mutex::new(String::new()),
            clusters_requested: Mutex::new(Vec::new()),
            last_read: Mutex::new(None),
            last_field_dimensions: Mutex::new(None),
            directory_hits: AtomicUsize::new(0),
            rpc_hits: AtomicUsize::new(0),
        }
    }

    pub fn set_nodes(&self, nodes: Vec<ClusterNode>) {
        *self.nodes.lock().unwrap() = Some(nodes);
    }

    /// Serves `body` verbatim from the membership endpoint.
    pub fn set_directory_body(&self, body: &str) {
        *self.directory_body.lock().unwrap() = Some(body.to_string());
    }

    pub fn set_read_response(&self, envelope: ReadShardResponse, points: Vec<Bytes>) {
        let mut body = BytesMut::new();
        body.extend_from_slice(&encode_frame(&envelope));
        for point in points {
            body.extend_from_slice(&point);
        }
        *self.read_body.lock().unwrap() = body.to_vec();
    }
}

async fn list_nodes(
    State(state): State<Arc<MockState>>,
    Path(cluster): Path<String>,
) -> impl IntoResponse {
    state.directory_hits.fetch_add(1, Ordering::SeqCst);
    state.clusters_requested.lock().unwrap().push(cluster);
    if let Some(body) = state.directory_body.lock().unwrap().clone() {
        return (StatusCode::OK, body).into_response();
    }
    let nodes = state.nodes.lock().unwrap().clone().unwrap_or_default();
    Json(nodes).into_response()
}

async fn read(State(state): State<Arc<MockState>>, body: Bytes) -> impl IntoResponse {
    state.rpc_hits.fetch_add(1, Ordering::SeqCst);
    *state.last_read.lock().unwrap() = ReadShardCommand::decode(body).ok();
    let status = *state.rpc_status.lock().unwrap();
    let body = state.read_body.lock().unwrap().clone();
    (status, body)
}

async fn field_dimensions(State(state): State<Arc<MockState>>, body: Bytes) -> impl IntoResponse {
    state.rpc_hits.fetch_add(1, Ordering::SeqCst);
    *state.last_field_dimensions.lock().unwrap() = FieldDimensionsCommand::decode(body).ok();
    let status = *state.rpc_status.lock().unwrap();
    let body = state.field_dimensions.lock().unwrap().encode_to_vec();
    (status, body)
}

async fn expand_sources(State(state): State<Arc<MockState>>, body: Bytes) -> impl IntoResponse {
    state.rpc_hits.fetch_add(1, Ordering::SeqCst);
    let error = state.expand_error.lock().unwrap().clone();
    let response = match ExpandSourcesCommand::decode(body) {
        Ok(cmd) if error.is_empty() => {
            let requested = Sources::unmarshal_binary(&cmd.sources).unwrap_or_default();
            let expansions = state.expansions.lock().unwrap();
            let expanded: Sources = requested
                .iter()
                .flat_map(|m| match &m.regex {
                    Some(regex) => expansions
                        .get(regex)
                        .cloned()
                        .unwrap_or_default()
                        .into_iter()
                        .map(|name| Measurement::new(&m.database, &m.retention_policy, name))
                        .collect::<Vec<_>>(),
                    None => vec![m.clone()],
                })
                .collect();
            ExpandSourcesResponse {
                sources: expanded.marshal_binary(),
                error: String::new(),
            }
        }
        Ok(_) => ExpandSourcesResponse {
            sources: Vec::new(),
            error,
        },
        Err(e) => ExpandSourcesResponse {
            sources: Vec::new(),
            error: e.to_string(),
        },
    };
    response.encode_to_vec()
}

/// Control plane and shard node served from one ephemeral listener. The node's bind
/// address is the listener itself.
#[derive(Debug)]
pub struct MockCluster {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockCluster {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockState::new(addr));

        let app = Router::new()
            .route("/nodes/:cluster", get(list_nodes))
            .route("/read", post(read))
            .route("/fielddimensions", post(field_dimensions))
            .route("/expandsources", post(expand_sources))
            .with_state(Arc::clone(&state));

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state, handle }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn resolver(&self) -> NodeDirectoryResolver {
        NodeDirectoryResolver::new(self.endpoint(), CLUSTER, fast_executor())
    }

    pub fn creator(&self, shard_id: u64, node_id: u64) -> RemoteIteratorCreator {
        RemoteIteratorCreator::new(
            ShardRef::new(shard_id, node_id),
            Arc::new(self.resolver()),
            fast_executor(),
        )
    }
}

impl Drop for MockCluster {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Five attempts with millisecond backoff, so failing tests stay fast.
pub fn fast_executor() -> BackoffExecutor {
    BackoffExecutor::new(reqwest::Client::new(), RetryPolicy::new(5, Duration::from_millis(1)))
}

/// An address nothing listens on.
pub fn closed_address() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}
