//! Shared plumbing for the HTTP-backed providers

use crate::error::{EmbedError, Result};
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// A reqwest client bound to one provider and its request deadline.
#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    client: Client,
    provider: &'static str,
    timeout: Duration,
}

impl HttpClient {
    /// Build a client with JSON content type, auth headers and a request timeout.
    pub(crate) fn new(
        provider: &'static str,
        timeout: Duration,
        auth_headers: &[(HeaderName, String)],
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in auth_headers {
            let value = HeaderValue::from_str(value).map_err(|_| {
                EmbedError::invalid_config(format!("invalid {provider} header value for {name}"))
            })?;
            headers.insert(name.clone(), value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|source| EmbedError::Request { source })?;

        Ok(Self {
            client,
            provider,
            timeout,
        })
    }

    /// POST `body` as JSON and decode a JSON response.
    ///
    /// Non-success statuses become [`EmbedError::Status`] carrying the body
    /// text; hitting the client deadline becomes [`EmbedError::Timeout`].
    pub(crate) async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(EmbedError::Status {
                provider: self.provider.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(|e| self.request_error(e))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            EmbedError::malformed(format!("failed to parse {} response: {e}", self.provider))
        })
    }

    fn request_error(&self, source: reqwest::Error) -> EmbedError {
        EmbedError::from_request(source, self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one connection: read the request, then reply with `response`
    /// (or hold the socket open without answering when it is `None`).
    async fn serve_once(response: Option<&'static str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await;
            match response {
                Some(response) => {
                    let _ = socket.write_all(response.as_bytes()).await;
                }
                None => tokio::time::sleep(Duration::from_secs(5)).await,
            }
        });
        format!("http://{addr}/embeddings")
    }

    #[tokio::test]
    async fn test_deadline_becomes_timeout() {
        let url = serve_once(None).await;
        let client = HttpClient::new("openai", Duration::from_millis(100), &[]).unwrap();

        let err = client
            .post_json::<_, Value>(&url, &json!({"input": "hello"}))
            .await
            .unwrap_err();

        assert!(err.is_timeout(), "expected a timeout, got {err:?}");
        assert!(matches!(
            err,
            EmbedError::Timeout { after } if after == Duration::from_millis(100)
        ));
    }

    #[tokio::test]
    async fn test_error_status_keeps_body() {
        let url = serve_once(Some(concat!(
            "HTTP/1.1 429 Too Many Requests\r\n",
            "content-length: 12\r\n",
            "connection: close\r\n\r\n",
            "rate limited",
        )))
        .await;
        let client = HttpClient::new("gemini", Duration::from_secs(5), &[]).unwrap();

        let err = client
            .post_json::<_, Value>(&url, &json!({}))
            .await
            .unwrap_err();

        match err {
            EmbedError::Status {
                provider,
                status,
                body,
            } => {
                assert_eq!(provider, "gemini");
                assert_eq!(status, 429);
                assert_eq!(body, "rate limited");
            }
            other => panic!("expected a status error, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_bad_header_value() {
        let err = HttpClient::new(
            "openai",
            Duration::from_secs(1),
            &[(reqwest::header::AUTHORIZATION, "Bearer bad\nkey".to_string())],
        )
        .unwrap_err();
        assert!(matches!(err, EmbedError::InvalidConfig { .. }));
    }
}
