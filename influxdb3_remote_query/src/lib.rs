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

//! Client half of the remote shard query protocol.
//!
//! A query coordinator uses [`RemoteIteratorCreator`] to read points, field/dimension metadata
//! and expanded sources from a shard owned by another cluster node. Node addresses come from
//! the control plane through [`NodeDirectoryResolver`]; every outbound call goes through the
//! retrying [`BackoffExecutor`].
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr,
    clippy::future_not_send
)]

pub mod backoff;
pub mod codec;
pub mod config;
pub mod creator;
pub mod error;
pub mod iterator;
pub mod node_directory;
pub mod query_types;

pub use backoff::{BackoffExecutor, RetryPolicy, DEFAULT_MAX_ATTEMPTS};
pub use codec::{ChunkSource, FrameReader, MemoryChunks, PointDecoder};
pub use config::RemoteQueryConfig;
pub use creator::{IteratorCreator, RemoteIteratorCreator, ShardRef};
pub use error::{RemoteQueryError, Result};
pub use iterator::{
    CloseFn, PointIterator, RemoteBooleanIterator, RemoteFloatIterator, RemoteIntegerIterator,
    RemoteIterator, RemoteStringIterator,
};
pub use node_directory::{ClusterNode, NodeDirectory, NodeDirectoryResolver};
pub use query_types::{
    DataType, Dimensions, Fields, Interval, IteratorOptions, Measurement, Point, PointValue,
    Sources, Tags,
};
