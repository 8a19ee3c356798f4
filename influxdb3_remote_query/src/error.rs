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

use thiserror::Error;

/// Boxed source error used where the failing layer is generic over its error type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum RemoteQueryError {
    /// The caller-supplied request builder failed. Never retried.
    #[error("failed to build request: {0}")]
    BuildRequest(#[source] BoxError),

    #[error("failed to build http client: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// Connection level failure that persisted through every retry attempt.
    #[error("transport error after {attempts} attempt(s): {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: BoxError,
    },

    #[error("failed to read response body: {0}")]
    ResponseBody(#[source] reqwest::Error),

    #[error("unexpected status {status} from {url}: {body}")]
    UnexpectedStatus {
        status: reqwest::StatusCode,
        url: String,
        body: String,
    },

    #[error("failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: prost::DecodeError,
    },

    #[error("malformed node directory: {0}")]
    Directory(#[from] serde_json::Error),

    #[error("invalid frame: {0}")]
    Frame(String),

    #[error("invalid point: {0}")]
    Point(String),

    /// Error string reported by the remote node. Displayed verbatim.
    #[error("{0}")]
    Remote(String),

    #[error("unsupported iterator type: {0}")]
    UnsupportedType(i32),

    #[error("node {node_id} not found in cluster directory")]
    NodeNotFound { node_id: u64 },

    #[error("node {node_id} is unreachable (alive: {alive}, bind address: {bind_address:?})")]
    NodeUnreachable {
        node_id: u64,
        alive: bool,
        bind_address: String,
    },

    #[error("operation cancelled")]
    Cancelled,
}

impl RemoteQueryError {
    pub(crate) fn decode(what: &'static str, source: prost::DecodeError) -> Self {
        Self::Decode { what, source }
    }

    /// True for errors raised by the remote node itself rather than by the exchange.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

pub type Result<T, E = RemoteQueryError> = std::result::Result<T, E>;
