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

//! Reads from a shard owned by another cluster node.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use influxdb3_shard_rpc_protos::influxdb3::internal::shard_rpc::v1::{
    ExpandSourcesCommand, ExpandSourcesResponse, FieldDimensionsCommand, FieldDimensionsResponse,
    ReadShardCommand, ReadShardResponse,
};
use prost::Message;
use reqwest::header::CONTENT_TYPE;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::backoff::{ensure_success, read_body, BackoffExecutor};
use crate::codec::{FrameReader, PointDecoder};
use crate::error::{RemoteQueryError, Result};
use crate::iterator::PointIterator;
use crate::node_directory::{ClusterNode, NodeDirectoryResolver};
use crate::query_types::{DataType, Dimensions, Fields, IteratorOptions, Sources};

pub const READ_PATH: &str = "/read";
pub const FIELD_DIMENSIONS_PATH: &str = "/fielddimensions";
pub const EXPAND_SOURCES_PATH: &str = "/expandsources";

const OCTET_STREAM: &str = "application/octet-stream";

/// Where a shard lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShardRef {
    pub shard_id: u64,
    pub node_id: u64,
}

impl ShardRef {
    pub fn new(shard_id: u64, node_id: u64) -> Self {
        Self { shard_id, node_id }
    }
}

/// Operations the query engine needs from a shard, whether it is local or remote.
#[async_trait]
pub trait IteratorCreator: std::fmt::Debug + Send + Sync {
    /// Opens a point stream for `options`.
    async fn create_iterator(
        &self,
        options: &IteratorOptions,
        cancel: &CancellationToken,
    ) -> Result<PointIterator>;

    /// Returns the fields and dimensions present across `sources`.
    async fn field_dimensions(
        &self,
        sources: &Sources,
        cancel: &CancellationToken,
    ) -> Result<(Fields, Dimensions)>;

    /// Expands regex sources into the concrete measurements they match.
    async fn expand_sources(
        &self,
        sources: &Sources,
        cancel: &CancellationToken,
    ) -> Result<Sources>;
}

/// [`IteratorCreator`] for a shard on another node, reached over HTTP.
///
/// Membership is resolved again for every operation so the node address is never stale.
#[derive(Debug, Clone)]
pub struct RemoteIteratorCreator {
    shard: ShardRef,
    resolver: Arc<NodeDirectoryResolver>,
    executor: BackoffExecutor,
}

impl RemoteIteratorCreator {
    pub fn new(
        shard: ShardRef,
        resolver: Arc<NodeDirectoryResolver>,
        executor: BackoffExecutor,
    ) -> Self {
        Self {
            shard,
            resolver,
            executor,
        }
    }

    pub fn shard(&self) -> ShardRef {
        self.shard
    }

    async fn target_node(&self, cancel: &CancellationToken) -> Result<ClusterNode> {
        let directory = self.resolver.resolve_alive_nodes(cancel).await?;
        let node = directory.require_alive(self.shard.node_id).map_err(|e| {
            error!(
                shard_id = self.shard.shard_id,
                node_id = self.shard.node_id,
                error = %e,
                "shard owner is not reachable"
            );
            e
        })?;
        Ok(node.clone())
    }

    /// Resolves the owning node and POSTs `body` to `path` on it.
    async fn post(
        &self,
        path: &str,
        body: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response> {
        let node = self.target_node(cancel).await?;
        let url = node.rpc_url(path);
        let body = Bytes::from(body);
        debug!(
            shard_id = self.shard.shard_id,
            node_id = node.id,
            url = %url,
            bytes = body.len(),
            "sending shard rpc"
        );

        let response = self
            .executor
            .execute(cancel, |client| {
                client
                    .post(&url)
                    .header(CONTENT_TYPE, OCTET_STREAM)
                    .body(body.clone())
                    .build()
            })
            .await
            .map_err(|e| {
                error!(
                    shard_id = self.shard.shard_id,
                    node_id = node.id,
                    url = %url,
                    error = %e,
                    "shard rpc failed"
                );
                e
            })?;
        ensure_success(response, cancel).await
    }
}

#[async_trait]
impl IteratorCreator for RemoteIteratorCreator {
    async fn create_iterator(
        &self,
        options: &IteratorOptions,
        cancel: &CancellationToken,
    ) -> Result<PointIterator> {
        let cmd = ReadShardCommand {
            shard_id: self.shard.shard_id,
            iterator_options: options.marshal_binary(),
        };
        let response = self.post(READ_PATH, cmd.encode_to_vec(), cancel).await?;

        let mut frames = FrameReader::new(Box::new(response));
        let envelope = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RemoteQueryError::Cancelled),
            frame = frames.next_frame() => frame?,
        };
        let envelope = envelope.ok_or_else(|| {
            RemoteQueryError::Frame("read response ended before its envelope".to_string())
        })?;
        let envelope = ReadShardResponse::decode(envelope)
            .map_err(|e| RemoteQueryError::decode("read shard response", e))?;
        if !envelope.error.is_empty() {
            return Err(RemoteQueryError::Remote(envelope.error));
        }

        let shard = self.shard;
        let on_close = Box::new(move || {
            debug!(
                shard_id = shard.shard_id,
                node_id = shard.node_id,
                "released remote point stream"
            );
        });
        let iter = PointIterator::from_wire_type(
            envelope.r#type,
            PointDecoder::new(frames),
            on_close,
            cancel.clone(),
        )
        .map_err(|e| {
            error!(
                shard_id = shard.shard_id,
                node_id = shard.node_id,
                error = %e,
                "remote node answered with an unusable iterator"
            );
            e
        })?;

        info!(
            shard_id = shard.shard_id,
            node_id = shard.node_id,
            value_type = %iter.data_type(),
            "opened remote point stream"
        );
        Ok(iter)
    }

    async fn field_dimensions(
        &self,
        sources: &Sources,
        cancel: &CancellationToken,
    ) -> Result<(Fields, Dimensions)> {
        let cmd = FieldDimensionsCommand {
            shard_id: self.shard.shard_id,
            sources: sources.marshal_binary(),
        };
        let response = self.post(FIELD_DIMENSIONS_PATH, cmd.encode_to_vec(), cancel).await?;
        let body = read_body(response, cancel).await?;
        let msg = FieldDimensionsResponse::decode(body)
            .map_err(|e| RemoteQueryError::decode("field dimensions response", e))?;
        if !msg.error.is_empty() {
            return Err(RemoteQueryError::Remote(msg.error));
        }

        let fields: Fields = msg
            .fields
            .into_iter()
            .map(|(name, code)| (name, DataType::from(code)))
            .collect();
        let dimensions: Dimensions = msg.dimensions.into_iter().collect();
        debug!(
            shard_id = self.shard.shard_id,
            fields = fields.len(),
            dimensions = dimensions.len(),
            "resolved remote field dimensions"
        );
        Ok((fields, dimensions))
    }

    async fn expand_sources(
        &self,
        sources: &Sources,
        cancel: &CancellationToken,
    ) -> Result<Sources> {
        let cmd = ExpandSourcesCommand {
            shard_id: self.shard.shard_id,
            sources: sources.marshal_binary(),
        };
        let response = self.post(EXPAND_SOURCES_PATH, cmd.encode_to_vec(), cancel).await?;
        let body = read_body(response, cancel).await?;
        let msg = ExpandSourcesResponse::decode(body)
            .map_err(|e| RemoteQueryError::decode("expand sources response", e))?;
        if !msg.error.is_empty() {
            return Err(RemoteQueryError::Remote(msg.error));
        }

        let expanded = Sources::unmarshal_binary(&msg.sources)?;
        debug!(
            shard_id = self.shard.shard_id,
            requested = sources.len(),
            expanded = expanded.len(),
            "expanded remote sources"
        );
        Ok(expanded)
    }
}
