// src/provider/transport.rs

//! HTTP transport shared by the search client and the webhook channel.

use std::error::Error as _;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::Result;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure before a complete response was read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Name resolution or connection setup failed
    #[error("connection failed: {0}")]
    Connect(String),

    /// Stream ended before the body was complete
    #[error("response body interrupted: {0}")]
    Body(String),

    /// Request could not be built or sent at all
    #[error("invalid request: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let message = error_chain(&err);
        if err.is_timeout() {
            Self::Timeout(message)
        } else if err.is_builder() {
            Self::Request(message)
        } else if err.is_body() || err.is_decode() {
            Self::Body(message)
        } else {
            Self::Connect(message)
        }
    }
}

/// Flatten an error and its sources into one line.
fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Minimal HTTP capability: GET a URL, POST a JSON body.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> std::result::Result<HttpResponse, TransportError>;

    async fn post_json(
        &self,
        url: &str,
        body: Vec<u8>,
        timeout: Duration,
    ) -> std::result::Result<HttpResponse, TransportError>;
}

/// Production transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with the given User-Agent.
    ///
    /// Timeouts are set per request, not on the client.
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }

    async fn read(
        response: reqwest::Response,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, timeout: Duration) -> std::result::Result<HttpResponse, TransportError> {
        let response = self.client.get(url).timeout(timeout).send().await?;
        Self::read(response).await
    }

    async fn post_json(
        &self,
        url: &str,
        body: Vec<u8>,
        timeout: Duration,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        Self::read(response).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport for tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// A recorded request.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Recorded {
        pub method: &'static str,
        pub url: String,
        pub body: Vec<u8>,
        pub timeout: Duration,
    }

    /// Replays queued responses in order; the last one repeats once the
    /// queue is down to a single entry.
    #[derive(Debug, Default)]
    pub struct ScriptedTransport {
        replies: Mutex<VecDeque<std::result::Result<HttpResponse, TransportError>>>,
        requests: Mutex<Vec<Recorded>>,
    }

    impl ScriptedTransport {
        pub fn new(
            replies: impl IntoIterator<Item = std::result::Result<HttpResponse, TransportError>>,
        ) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn requests(&self) -> Vec<Recorded> {
            self.requests.lock().unwrap().clone()
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn next(&self, recorded: Recorded) -> std::result::Result<HttpResponse, TransportError> {
            self.requests.lock().unwrap().push(recorded);
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                replies.pop_front().unwrap()
            } else {
                replies
                    .front()
                    .cloned()
                    .unwrap_or_else(|| Err(TransportError::Connect("no scripted reply".into())))
            }
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn get(
            &self,
            url: &str,
            timeout: Duration,
        ) -> std::result::Result<HttpResponse, TransportError> {
            self.next(Recorded {
                method: "GET",
                url: url.to_string(),
                body: Vec::new(),
                timeout,
            })
        }

        async fn post_json(
            &self,
            url: &str,
            body: Vec<u8>,
            timeout: Duration,
        ) -> std::result::Result<HttpResponse, TransportError> {
            self.next(Recorded {
                method: "POST",
                url: url.to_string(),
                body,
                timeout,
            })
        }
    }
}
