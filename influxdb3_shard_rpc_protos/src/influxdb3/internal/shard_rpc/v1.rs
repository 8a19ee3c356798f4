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

/// Body of `POST /read`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadShardCommand {
    #[prost(uint64, tag = "1")]
    pub shard_id: u64,
    /// Serialized `IteratorOptions`.
    #[prost(bytes = "vec", tag = "2")]
    pub iterator_options: Vec<u8>,
}

/// Envelope frame at the head of a `/read` response body.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadShardResponse {
    #[prost(enumeration = "read_shard_response::IteratorType", tag = "1")]
    pub r#type: i32,
    #[prost(string, tag = "2")]
    pub error: String,
}

pub mod read_shard_response {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum IteratorType {
        Float = 0,
        Integer = 1,
        String = 2,
        Boolean = 3,
    }
}

/// Body of `POST /fielddimensions`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FieldDimensionsCommand {
    #[prost(uint64, tag = "1")]
    pub shard_id: u64,
    /// Serialized `Sources`.
    #[prost(bytes = "vec", tag = "2")]
    pub sources: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FieldDimensionsResponse {
    /// Field name to influxql data type code.
    #[prost(map = "string, int32", tag = "1")]
    pub fields: HashMap<String, i32>,
    #[prost(string, repeated, tag = "2")]
    pub dimensions: Vec<String>,
    #[prost(string, tag = "3")]
    pub error: String,
}

/// Body of `POST /expandsources`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExpandSourcesCommand {
    #[prost(uint64, tag = "1")]
    pub shard_id: u64,
    #[prost(bytes = "vec", tag = "2")]
    pub sources: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExpandSourcesResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub sources: Vec<u8>,
    #[prost(string, tag = "2")]
    pub error: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Measurement {
    #[prost(string, tag = "1")]
    pub database: String,
    #[prost(string, tag = "2")]
    pub retention_policy: String,
    #[prost(string, tag = "3")]
    pub name: String,
    #[prost(string, tag = "4")]
    pub regex: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Sources {
    #[prost(message, repeated, tag = "1")]
    pub sources: Vec<Measurement>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Interval {
    #[prost(int64, tag = "1")]
    pub duration: i64,
    #[prost(int64, tag = "2")]
    pub offset: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IteratorOptions {
    #[prost(string, tag = "1")]
    pub expr: String,
    #[prost(string, repeated, tag = "2")]
    pub aux: Vec<String>,
    #[prost(string, repeated, tag = "3")]
    pub dimensions: Vec<String>,
    #[prost(message, optional, tag = "4")]
    pub interval: Option<Interval>,
    #[prost(string, tag = "5")]
    pub condition: String,
    #[prost(int64, tag = "6")]
    pub start_time: i64,
    #[prost(int64, tag = "7")]
    pub end_time: i64,
    #[prost(bool, tag = "8")]
    pub ascending: bool,
    #[prost(uint64, tag = "9")]
    pub limit: u64,
    #[prost(uint64, tag = "10")]
    pub offset: u64,
    #[prost(uint64, tag = "11")]
    pub slimit: u64,
    #[prost(uint64, tag = "12")]
    pub soffset: u64,
    #[prost(bool, tag = "13")]
    pub dedupe: bool,
    #[prost(bool, tag = "14")]
    pub ordered: bool,
    #[prost(message, optional, tag = "15")]
    pub sources: Option<Sources>,
}

/// One frame of the streamed `/read` point sequence.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Point {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(map = "string, string", tag = "2")]
    pub tags: HashMap<String, String>,
    #[prost(int64, tag = "3")]
    pub time: i64,
    #[prost(bool, tag = "4")]
    pub nil: bool,
    #[prost(double, optional, tag = "5")]
    pub float_value: Option<f64>,
    #[prost(int64, optional, tag = "6")]
    pub integer_value: Option<i64>,
    #[prost(string, optional, tag = "7")]
    pub string_value: Option<String>,
    #[prost(bool, optional, tag = "8")]
    pub boolean_value: Option<bool>,
    #[prost(uint32, tag = "9")]
    pub aggregated: u32,
}
