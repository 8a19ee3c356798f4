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

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::form_urlencoded;

use crate::backoff::{ensure_success, read_body, BackoffExecutor};
use crate::error::{RemoteQueryError, Result};

/// A cluster member as reported by the control plane.
///
/// Only `id` is required; absent fields decode as empty or `false`, which
/// [`NodeDirectory::require_alive`] treats as unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNode {
    pub id: u64,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub hostname: String,
    /// `host:port` the node serves shard RPCs on.
    #[serde(default)]
    pub bind_address: String,
    #[serde(default)]
    pub alive: bool,
}

impl ClusterNode {
    pub fn rpc_url(&self, path: &str) -> String {
        format!("http://{}{}", self.bind_address, path)
    }
}

/// Snapshot of cluster membership for the duration of one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeDirectory {
    nodes: HashMap<u64, ClusterNode>,
}

impl NodeDirectory {
    pub fn get(&self, node_id: u64) -> Option<&ClusterNode> {
        self.nodes.get(&node_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClusterNode> {
        self.nodes.values()
    }

    pub fn alive(&self) -> impl Iterator<Item = &ClusterNode> {
        self.nodes.values().filter(|n| n.alive)
    }

    /// Looks up a node that an RPC can be sent to. Absent nodes, dead nodes and nodes
    /// without a bind address are all unreachable.
    pub fn require_alive(&self, node_id: u64) -> Result<&ClusterNode> {
        let node = self
            .get(node_id)
            .ok_or(RemoteQueryError::NodeNotFound { node_id })?;
        if !node.alive || node.bind_address.is_empty() {
            return Err(RemoteQueryError::NodeUnreachable {
                node_id,
                alive: node.alive,
                bind_address: node.bind_address.clone(),
            });
        }
        Ok(node)
    }
}

impl FromIterator<ClusterNode> for NodeDirectory {
    fn from_iter<I: IntoIterator<Item = ClusterNode>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().map(|n| (n.id, n)).collect(),
        }
    }
}

/// Fetches cluster membership from the control plane. Nothing is cached; each call
/// returns what the control plane reports right now, dead nodes included.
#[derive(Debug, Clone)]
pub struct NodeDirectoryResolver {
    endpoint: String,
    cluster_name: String,
    executor: BackoffExecutor,
}

impl NodeDirectoryResolver {
    pub fn new(
        endpoint: impl Into<String>,
        cluster_name: impl Into<String>,
        executor: BackoffExecutor,
    ) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self {
            endpoint,
            cluster_name: cluster_name.into(),
            executor,
        }
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn nodes_url(&self) -> String {
        let escaped: String =
            form_urlencoded::byte_serialize(self.cluster_name.as_bytes()).collect();
        format!("{}/nodes/{}", self.endpoint, escaped)
    }

    pub async fn resolve_alive_nodes(&self, cancel: &CancellationToken) -> Result<NodeDirectory> {
        let url = self.nodes_url();
        debug!(url = %url, cluster = %self.cluster_name, "fetching cluster membership");

        let response = self
            .executor
            .execute(cancel, |client| client.get(&url).build())
            .await?;
        let response = ensure_success(response, cancel).await?;
        let body = read_body(response, cancel).await?;

        let nodes: Vec<ClusterNode> = serde_json::from_slice(&body)?;
        let directory: NodeDirectory = nodes.into_iter().collect();
        info!(
            cluster = %self.cluster_name,
            nodes = directory.len(),
            alive = directory.alive().count(),
            "resolved cluster membership"
        );
        Ok(directory)
    }
}
