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

//! Retry with exponential backoff around a single HTTP round trip.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::codec::ChunkSource;
use crate::error::{RemoteQueryError, Result};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);
/// Error bodies longer than this are cut off in [`RemoteQueryError::UnexpectedStatus`].
pub const MAX_ERROR_BODY_LEN: usize = 64 * 1024;

/// Attempt ceiling and the unit that `(2^attempt - 1) / 2` backoff delays are measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_unit: Duration) -> Self {
        Self {
            max_attempts,
            backoff_unit,
        }
    }

    /// Delay after failed attempt number `attempt` (counted from 1): 0.5, 1.5, 3.5, 7.5 units...
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = (2f64.powi(attempt.min(32) as i32) - 1.0) / 2.0;
        self.backoff_unit.mul_f64(factor)
    }
}

/// Runs `build` then `send` until `send` succeeds, `build` fails, the token is cancelled or
/// `policy.max_attempts` attempts have failed.
///
/// `build` is invoked once per attempt so every attempt gets a fresh request. Only failures
/// of `send` are retried; whatever `send` resolves to on success is returned untouched.
pub async fn retry_with_backoff<R, T, E, B, S, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut build: B,
    mut send: S,
) -> Result<T>
where
    B: FnMut() -> Result<R>,
    S: FnMut(R) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let request = build()?;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RemoteQueryError::Cancelled),
            outcome = send(request) => outcome,
        };

        match outcome {
            Ok(response) => {
                if attempt > 1 {
                    debug!(attempt, "request succeeded after retry");
                }
                return Ok(response);
            }
            Err(e) if attempt >= max_attempts => {
                error!(attempts = attempt, error = %e, "request failed permanently");
                return Err(RemoteQueryError::Transport {
                    attempts: attempt,
                    source: Box::new(e),
                });
            }
            Err(e) => {
                let delay = policy.backoff(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "request failed, retrying"
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(RemoteQueryError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        }
    }
}

/// Sends requests through a shared reqwest client, retrying transport failures.
///
/// HTTP error statuses are not transport failures and come back as ordinary responses.
#[derive(Debug, Clone)]
pub struct BackoffExecutor {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl BackoffExecutor {
    pub fn new(client: reqwest::Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Executes the request produced by `build`, retrying with backoff on transport errors.
    /// The response body is left open for the caller.
    pub async fn execute<B>(
        &self,
        cancel: &CancellationToken,
        mut build: B,
    ) -> Result<reqwest::Response>
    where
        B: FnMut(&reqwest::Client) -> reqwest::Result<reqwest::Request>,
    {
        retry_with_backoff(
            &self.policy,
            cancel,
            || build(&self.client).map_err(|e| RemoteQueryError::BuildRequest(Box::new(e))),
            |request| self.client.execute(request),
        )
        .await
    }
}

/// Turns a non-2xx response into an error carrying up to [`MAX_ERROR_BODY_LEN`] bytes of
/// the body text.
pub(crate) async fn ensure_success(
    mut response: reqwest::Response,
    cancel: &CancellationToken,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = error_body(&mut response, cancel).await?;
    Err(RemoteQueryError::UnexpectedStatus { status, url, body })
}

/// Reads the prefix of an error body. A failed read is noted in the returned text.
async fn error_body(source: &mut dyn ChunkSource, cancel: &CancellationToken) -> Result<String> {
    let mut buf = Vec::new();
    let mut truncated = false;
    let failure = loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RemoteQueryError::Cancelled),
            chunk = source.next_chunk() => chunk,
        };
        match chunk {
            Ok(Some(chunk)) => {
                let room = MAX_ERROR_BODY_LEN - buf.len();
                if chunk.len() > room {
                    buf.extend_from_slice(&chunk[..room]);
                    truncated = true;
                    break None;
                }
                buf.extend_from_slice(&chunk);
            }
            Ok(None) => break None,
            Err(e) => break Some(e),
        }
    };

    let mut body = String::from_utf8_lossy(&buf).into_owned();
    if truncated {
        body.push_str(" [truncated]");
    }
    if let Some(e) = failure {
        if !body.is_empty() {
            body.push(' ');
        }
        body.push_str(&format!("[{e}]"));
    }
    Ok(body)
}

/// Reads a whole response body, aborting if the token fires.
pub(crate) async fn read_body(
    response: reqwest::Response,
    cancel: &CancellationToken,
) -> Result<Bytes> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RemoteQueryError::Cancelled),
        body = response.bytes() => body.map_err(RemoteQueryError::ResponseBody),
    }
}
