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

//! Typed point iterators over an open shard RPC response body.
//!
//! An iterator exclusively owns the body it reads. The body is released, and the close
//! callback invoked, exactly once: at natural end of stream, on the first pull error, on an
//! explicit [`RemoteIterator::close`], or when the iterator is dropped, whichever comes first.
//! Pulling after that returns `Ok(None)`.

use std::fmt;
use std::marker::PhantomData;

use futures::stream::{self, BoxStream, StreamExt};
use influxdb3_shard_rpc_protos::influxdb3::internal::shard_rpc::v1::read_shard_response::IteratorType;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::codec::PointDecoder;
use crate::error::{RemoteQueryError, Result};
use crate::query_types::{DataType, Point, PointValue};

/// Invoked once when an iterator releases its body.
pub type CloseFn = Box<dyn FnOnce() + Send + 'static>;

pub struct RemoteIterator<V> {
    decoder: Option<PointDecoder>,
    closed: bool,
    on_close: Option<CloseFn>,
    cancel: CancellationToken,
    _value: PhantomData<fn() -> V>,
}

pub type RemoteFloatIterator = RemoteIterator<f64>;
pub type RemoteIntegerIterator = RemoteIterator<i64>;
pub type RemoteStringIterator = RemoteIterator<String>;
pub type RemoteBooleanIterator = RemoteIterator<bool>;

impl<V> fmt::Debug for RemoteIterator<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteIterator")
            .field("value_type", &std::any::type_name::<V>())
            .field("closed", &self.closed)
            .field("decoder", &self.decoder)
            .finish_non_exhaustive()
    }
}

impl<V: PointValue> RemoteIterator<V> {
    pub fn new(decoder: PointDecoder, on_close: CloseFn, cancel: CancellationToken) -> Self {
        Self {
            decoder: Some(decoder),
            closed: false,
            on_close: Some(on_close),
            cancel,
            _value: PhantomData,
        }
    }

    pub fn data_type(&self) -> DataType {
        V::DATA_TYPE
    }

    /// Pulls the next point. `Ok(None)` means end of stream, and stays that way.
    pub async fn next(&mut self) -> Result<Option<Point<V>>> {
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(None);
        };

        let pulled = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(RemoteQueryError::Cancelled),
            pulled = decoder.next_point::<V>() => pulled,
        };

        match pulled {
            Ok(Some(point)) => Ok(Some(point)),
            Ok(None) => {
                debug!(value_type = %V::DATA_TYPE, "remote point stream exhausted");
                self.close();
                Ok(None)
            }
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    /// Adapts the iterator into a stream that ends at end of stream or after the first error.
    pub fn into_stream(self) -> BoxStream<'static, Result<Point<V>>> {
        stream::unfold(Some(self), |state| async move {
            let mut iter = state?;
            match iter.next().await {
                Ok(Some(point)) => Some((Ok(point), Some(iter))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
        .boxed()
    }
}

impl<V> RemoteIterator<V> {
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Releases the body. Safe to call any number of times.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.decoder.take();
        if let Some(on_close) = self.on_close.take() {
            on_close();
        }
    }
}

impl<V> Drop for RemoteIterator<V> {
    fn drop(&mut self) {
        self.close();
    }
}

/// A point iterator tagged with its value kind. The kind is decided once, from the
/// envelope, when the stream is opened.
#[derive(Debug)]
pub enum PointIterator {
    Float(RemoteFloatIterator),
    Integer(RemoteIntegerIterator),
    String(RemoteStringIterator),
    Boolean(RemoteBooleanIterator),
}

impl PointIterator {
    /// Builds the variant for a wire iterator type code. An unknown code releases the
    /// decoder and its body before returning the error, without running `on_close`.
    pub fn from_wire_type(
        code: i32,
        decoder: PointDecoder,
        on_close: CloseFn,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let Ok(iterator_type) = IteratorType::try_from(code) else {
            drop(decoder);
            return Err(RemoteQueryError::UnsupportedType(code));
        };
        Ok(match iterator_type {
            IteratorType::Float => Self::Float(RemoteIterator::new(decoder, on_close, cancel)),
            IteratorType::Integer => Self::Integer(RemoteIterator::new(decoder, on_close, cancel)),
            IteratorType::String => Self::String(RemoteIterator::new(decoder, on_close, cancel)),
            IteratorType::Boolean => Self::Boolean(RemoteIterator::new(decoder, on_close, cancel)),
        })
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Self::Float(_) => DataType::Float,
            Self::Integer(_) => DataType::Integer,
            Self::String(_) => DataType::String,
            Self::Boolean(_) => DataType::Boolean,
        }
    }

    pub fn close(&mut self) {
        match self {
            Self::Float(it) => it.close(),
            Self::Integer(it) => it.close(),
            Self::String(it) => it.close(),
            Self::Boolean(it) => it.close(),
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            Self::Float(it) => it.is_closed(),
            Self::Integer(it) => it.is_closed(),
            Self::String(it) => it.is_closed(),
            Self::Boolean(it) => it.is_closed(),
        }
    }
}
