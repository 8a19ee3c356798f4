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

//! Length-prefixed framing for the `/read` response body.
//!
//! Every frame is a 4-byte big-endian length followed by that many bytes of protobuf. The
//! first frame of a body is the `ReadShardResponse` envelope; every frame after it is a point.

use std::collections::VecDeque;
use std::fmt;

use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use influxdb3_shard_rpc_protos::influxdb3::internal::shard_rpc::v1 as proto;
use prost::Message;

use crate::error::{RemoteQueryError, Result};
use crate::query_types::{Point, PointValue};

pub const FRAME_HEADER_LEN: usize = 4;
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Incremental source of body bytes.
#[async_trait]
pub trait ChunkSource: Send {
    /// Returns the next chunk, or `None` once the body is exhausted.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;
}

#[async_trait]
impl ChunkSource for reqwest::Response {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        self.chunk().await.map_err(RemoteQueryError::ResponseBody)
    }
}

/// Chunks already held in memory, e.g. a body that was buffered by a local shard.
#[derive(Debug, Default)]
pub struct MemoryChunks(VecDeque<Bytes>);

impl MemoryChunks {
    pub fn new(chunks: impl IntoIterator<Item = Bytes>) -> Self {
        Self(chunks.into_iter().collect())
    }
}

#[async_trait]
impl ChunkSource for MemoryChunks {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        Ok(self.0.pop_front())
    }
}

pub fn encode_frame<M: Message>(msg: &M) -> Bytes {
    let payload = msg.encode_to_vec();
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.put_slice(&payload);
    buf.freeze()
}

pub fn encode_point<V: PointValue>(point: Point<V>) -> Bytes {
    encode_frame(&point.into_wire())
}

/// Splits a chunked body into frames. Bytes read past a frame boundary stay buffered for the
/// next call, so the reader can be handed from the envelope step to the point decoder.
pub struct FrameReader {
    source: Box<dyn ChunkSource>,
    buf: BytesMut,
    eof: bool,
}

impl fmt::Debug for FrameReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameReader")
            .field("buffered", &self.buf.len())
            .field("eof", &self.eof)
            .finish_non_exhaustive()
    }
}

impl FrameReader {
    pub fn new(source: Box<dyn ChunkSource>) -> Self {
        Self {
            source,
            buf: BytesMut::new(),
            eof: false,
        }
    }

    /// Returns the next frame payload, or `None` at a clean end of body.
    pub async fn next_frame(&mut self) -> Result<Option<Bytes>> {
        loop {
            if self.buf.len() >= FRAME_HEADER_LEN {
                let header = [self.buf[0], self.buf[1], self.buf[2], self.buf[3]];
                let len = u32::from_be_bytes(header) as usize;
                if len > MAX_FRAME_LEN {
                    return Err(RemoteQueryError::Frame(format!(
                        "frame of {len} bytes exceeds limit of {MAX_FRAME_LEN}"
                    )));
                }
                if self.buf.len() >= FRAME_HEADER_LEN + len {
                    self.buf.advance(FRAME_HEADER_LEN);
                    return Ok(Some(self.buf.split_to(len).freeze()));
                }
            }

            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(RemoteQueryError::Frame(format!(
                    "body ended inside a frame with {} bytes pending",
                    self.buf.len()
                )));
            }

            match self.source.next_chunk().await? {
                Some(chunk) => self.buf.extend_from_slice(&chunk),
                None => self.eof = true,
            }
        }
    }
}

/// Decodes point frames from a body whose envelope has already been consumed.
#[derive(Debug)]
pub struct PointDecoder {
    frames: FrameReader,
    exhausted: bool,
}

impl PointDecoder {
    pub fn new(frames: FrameReader) -> Self {
        Self {
            frames,
            exhausted: false,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub async fn next_point<V: PointValue>(&mut self) -> Result<Option<Point<V>>> {
        if self.exhausted {
            return Ok(None);
        }
        match self.frames.next_frame().await? {
            Some(frame) => {
                let wire = proto::Point::decode(frame)
                    .map_err(|e| RemoteQueryError::decode("point", e))?;
                Point::from_wire(wire).map(Some)
            }
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }
}
