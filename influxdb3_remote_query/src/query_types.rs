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

//! Query-side values that cross the shard RPC boundary in serialized form.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use influxdb3_shard_rpc_protos::influxdb3::internal::shard_rpc::v1 as proto;
use prost::Message;

use crate::error::{RemoteQueryError, Result};

/// Smallest timestamp a query may ask for.
pub const MIN_TIME: i64 = i64::MIN + 2;
/// Largest timestamp a query may ask for.
pub const MAX_TIME: i64 = i64::MAX - 1;

/// Field name to value kind, as returned by a field/dimension lookup.
pub type Fields = HashMap<String, DataType>;
/// Deduplicated dimension (tag key) names.
pub type Dimensions = HashSet<String>;
pub type Tags = BTreeMap<String, String>;

/// Value kind of a field or expression. The discriminants are the wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataType {
    #[default]
    Unknown = 0,
    Float = 1,
    Integer = 2,
    String = 3,
    Boolean = 4,
    Time = 5,
    Duration = 6,
    Tag = 7,
    AnyField = 8,
    Unsigned = 9,
}

impl From<i32> for DataType {
    fn from(code: i32) -> Self {
        match code {
            1 => Self::Float,
            2 => Self::Integer,
            3 => Self::String,
            4 => Self::Boolean,
            5 => Self::Time,
            6 => Self::Duration,
            7 => Self::Tag,
            8 => Self::AnyField,
            9 => Self::Unsigned,
            _ => Self::Unknown,
        }
    }
}

impl From<DataType> for i32 {
    fn from(data_type: DataType) -> Self {
        data_type as Self
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Float => "float",
            Self::Integer => "integer",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Time => "time",
            Self::Duration => "duration",
            Self::Tag => "tag",
            Self::AnyField => "field",
            Self::Unsigned => "unsigned",
        };
        f.write_str(name)
    }
}

/// A measurement reference, either by exact name or by regex.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Measurement {
    pub database: String,
    pub retention_policy: String,
    pub name: String,
    /// An empty pattern is not a regex; it encodes the same as `None`.
    pub regex: Option<String>,
}

impl Measurement {
    pub fn new(
        database: impl Into<String>,
        retention_policy: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            retention_policy: retention_policy.into(),
            name: name.into(),
            regex: None,
        }
    }

    pub fn with_regex(
        database: impl Into<String>,
        retention_policy: impl Into<String>,
        regex: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            retention_policy: retention_policy.into(),
            name: String::new(),
            regex: Some(regex.into()).filter(|r| !r.is_empty()),
        }
    }

    fn to_proto(&self) -> proto::Measurement {
        proto::Measurement {
            database: self.database.clone(),
            retention_policy: self.retention_policy.clone(),
            name: self.name.clone(),
            regex: self.regex.clone().unwrap_or_default(),
        }
    }

    fn from_proto(m: proto::Measurement) -> Self {
        Self {
            database: m.database,
            retention_policy: m.retention_policy,
            name: m.name,
            regex: (!m.regex.is_empty()).then_some(m.regex),
        }
    }
}

/// Ordered list of measurements a statement reads from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sources(pub Vec<Measurement>);

impl Sources {
    pub fn new(sources: Vec<Measurement>) -> Self {
        Self(sources)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Measurement> {
        self.0.iter()
    }

    /// True if any source is a regex that the owning node has to expand.
    pub fn has_regex(&self) -> bool {
        self.0.iter().any(|m| m.regex.is_some())
    }

    pub fn marshal_binary(&self) -> Vec<u8> {
        self.to_proto().encode_to_vec()
    }

    pub fn unmarshal_binary(buf: &[u8]) -> Result<Self> {
        let decoded =
            proto::Sources::decode(buf).map_err(|e| RemoteQueryError::decode("sources", e))?;
        Ok(Self::from_proto(decoded))
    }

    fn to_proto(&self) -> proto::Sources {
        proto::Sources {
            sources: self.0.iter().map(Measurement::to_proto).collect(),
        }
    }

    fn from_proto(sources: proto::Sources) -> Self {
        Self(sources.sources.into_iter().map(Measurement::from_proto).collect())
    }
}

impl FromIterator<Measurement> for Sources {
    fn from_iter<I: IntoIterator<Item = Measurement>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// GROUP BY time() bucket, in nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Interval {
    pub duration: i64,
    pub offset: i64,
}

/// Describes the point stream requested from a shard.
#[derive(Debug, Clone, PartialEq)]
pub struct IteratorOptions {
    /// Expression being evaluated, e.g. `mean(value)`. `None` for raw queries.
    pub expr: Option<String>,
    /// Auxiliary fields carried along with each point.
    pub aux: Vec<String>,
    /// Tag keys the output is grouped by.
    pub dimensions: Vec<String>,
    pub interval: Interval,
    /// WHERE clause, already rendered by the planner.
    pub condition: Option<String>,
    pub start_time: i64,
    pub end_time: i64,
    pub ascending: bool,
    pub limit: u64,
    pub offset: u64,
    pub slimit: u64,
    pub soffset: u64,
    pub dedupe: bool,
    pub ordered: bool,
    pub sources: Sources,
}

impl Default for IteratorOptions {
    fn default() -> Self {
        Self {
            expr: None,
            aux: Vec::new(),
            dimensions: Vec::new(),
            interval: Interval::default(),
            condition: None,
            start_time: MIN_TIME,
            end_time: MAX_TIME,
            ascending: true,
            limit: 0,
            offset: 0,
            slimit: 0,
            soffset: 0,
            dedupe: false,
            ordered: false,
            sources: Sources::default(),
        }
    }
}

impl IteratorOptions {
    pub fn marshal_binary(&self) -> Vec<u8> {
        let options = proto::IteratorOptions {
            expr: self.expr.clone().unwrap_or_default(),
            aux: self.aux.clone(),
            dimensions: self.dimensions.clone(),
            interval: Some(proto::Interval {
                duration: self.interval.duration,
                offset: self.interval.offset,
            }),
            condition: self.condition.clone().unwrap_or_default(),
            start_time: self.start_time,
            end_time: self.end_time,
            ascending: self.ascending,
            limit: self.limit,
            offset: self.offset,
            slimit: self.slimit,
            soffset: self.soffset,
            dedupe: self.dedupe,
            ordered: self.ordered,
            sources: Some(self.sources.to_proto()),
        };
        options.encode_to_vec()
    }

    pub fn unmarshal_binary(buf: &[u8]) -> Result<Self> {
        let o = proto::IteratorOptions::decode(buf)
            .map_err(|e| RemoteQueryError::decode("iterator options", e))?;
        let interval = o.interval.unwrap_or_default();
        Ok(Self {
            expr: (!o.expr.is_empty()).then_some(o.expr),
            aux: o.aux,
            dimensions: o.dimensions,
            interval: Interval {
                duration: interval.duration,
                offset: interval.offset,
            },
            condition: (!o.condition.is_empty()).then_some(o.condition),
            start_time: o.start_time,
            end_time: o.end_time,
            ascending: o.ascending,
            limit: o.limit,
            offset: o.offset,
            slimit: o.slimit,
            soffset: o.soffset,
            dedupe: o.dedupe,
            ordered: o.ordered,
            sources: o.sources.map(Sources::from_proto).unwrap_or_default(),
        })
    }
}

/// Scalar carried by a typed point stream.
pub trait PointValue: Sized + Send + fmt::Debug + 'static {
    const DATA_TYPE: DataType;

    fn from_wire(point: &mut proto::Point) -> Option<Self>;

    fn into_wire(self, point: &mut proto::Point);
}

impl PointValue for f64 {
    const DATA_TYPE: DataType = DataType::Float;

    fn from_wire(point: &mut proto::Point) -> Option<Self> {
        point.float_value
    }

    fn into_wire(self, point: &mut proto::Point) {
        point.float_value = Some(self);
    }
}

impl PointValue for i64 {
    const DATA_TYPE: DataType = DataType::Integer;

    fn from_wire(point: &mut proto::Point) -> Option<Self> {
        point.integer_value
    }

    fn into_wire(self, point: &mut proto::Point) {
        point.integer_value = Some(self);
    }
}

impl PointValue for String {
    const DATA_TYPE: DataType = DataType::String;

    fn from_wire(point: &mut proto::Point) -> Option<Self> {
        point.string_value.take()
    }

    fn into_wire(self, point: &mut proto::Point) {
        point.string_value = Some(self);
    }
}

impl PointValue for bool {
    const DATA_TYPE: DataType = DataType::Boolean;

    fn from_wire(point: &mut proto::Point) -> Option<Self> {
        point.boolean_value
    }

    fn into_wire(self, point: &mut proto::Point) {
        point.boolean_value = Some(self);
    }
}

/// A single typed data point. `value` is `None` for a nil point.
#[derive(Debug, Clone, PartialEq)]
pub struct Point<V> {
    pub name: String,
    pub tags: Tags,
    pub time: i64,
    pub value: Option<V>,
    pub aggregated: u32,
}

impl<V: PointValue> Point<V> {
    pub fn new(name: impl Into<String>, time: i64, value: V) -> Self {
        Self {
            name: name.into(),
            tags: Tags::new(),
            time,
            value: Some(value),
            aggregated: 0,
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn from_wire(mut wire: proto::Point) -> Result<Self> {
        let value = V::from_wire(&mut wire);
        if value.is_none() && !wire.nil {
            return Err(RemoteQueryError::Point(format!(
                "{} point at {} for {:?} carries no {} value",
                V::DATA_TYPE,
                wire.time,
                wire.name,
                V::DATA_TYPE
            )));
        }
        Ok(Self {
            name: wire.name,
            tags: wire.tags.into_iter().collect(),
            time: wire.time,
            value: if wire.nil { None } else { value },
            aggregated: wire.aggregated,
        })
    }

    pub fn into_wire(self) -> proto::Point {
        let mut wire = proto::Point {
            name: self.name,
            tags: self.tags.into_iter().collect(),
            time: self.time,
            nil: self.value.is_none(),
            aggregated: self.aggregated,
            ..Default::default()
        };
        if let Some(value) = self.value {
            value.into_wire(&mut wire);
        }
        wire
    }
}
