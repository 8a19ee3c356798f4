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

use std::time::Duration;

use crate::backoff::{BackoffExecutor, RetryPolicy, DEFAULT_BACKOFF_UNIT, DEFAULT_MAX_ATTEMPTS};
use crate::error::{RemoteQueryError, Result};
use crate::node_directory::NodeDirectoryResolver;

/// CLI config for reaching shards owned by other cluster nodes.
#[derive(Debug, Clone, clap::Args)]
pub struct RemoteQueryConfig {
    /// Base URL of the control plane that reports cluster membership.
    #[clap(long = "control-plane-endpoint", env = "CFLUX_ENDPOINT", action)]
    pub control_plane_endpoint: String,

    /// Name of the cluster this node belongs to.
    #[clap(long = "cluster-name", env = "CLUSTER", action)]
    pub cluster_name: String,

    /// Per-attempt timeout for requests to the control plane and remote nodes.
    #[clap(
        long = "remote-request-timeout-secs",
        env = "REMOTE_REQUEST_TIMEOUT_SECS",
        default_value = "30",
        action
    )]
    pub request_timeout_secs: u64,

    #[clap(
        long = "remote-connect-timeout-secs",
        env = "REMOTE_CONNECT_TIMEOUT_SECS",
        default_value = "5",
        action
    )]
    pub connect_timeout_secs: u64,

    /// Attempts made before a transport failure is returned to the caller.
    #[clap(
        long = "remote-max-attempts",
        env = "REMOTE_MAX_ATTEMPTS",
        default_value_t = DEFAULT_MAX_ATTEMPTS,
        action
    )]
    pub max_attempts: u32,
}

impl RemoteQueryConfig {
    pub fn new(control_plane_endpoint: impl Into<String>, cluster_name: impl Into<String>) -> Self {
        Self {
            control_plane_endpoint: control_plane_endpoint.into(),
            cluster_name: cluster_name.into(),
            request_timeout_secs: 30,
            connect_timeout_secs: 5,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, DEFAULT_BACKOFF_UNIT)
    }

    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .build()
            .map_err(RemoteQueryError::HttpClient)
    }

    pub fn executor(&self) -> Result<BackoffExecutor> {
        Ok(BackoffExecutor::new(self.http_client()?, self.retry_policy()))
    }

    pub fn node_directory_resolver(&self, executor: BackoffExecutor) -> NodeDirectoryResolver {
        NodeDirectoryResolver::new(&self.control_plane_endpoint, &self.cluster_name, executor)
    }
}
