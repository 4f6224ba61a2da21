//! Minimal HTTP/1.1 request helper.
//!
//! One connection per request. Every request, including connect, is bound
//! by a single timeout.

use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST, USER_AGENT};
use http::{Method, Request, Uri};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use tracing::debug;

use driftwatch_core::{FetchError, FetchResult};

const AGENT: &str = "driftwatch/0.1";

/// Send a request and return the body of a 2xx response.
pub(crate) async fn send(
    method: Method,
    url: &str,
    body: Option<Bytes>,
    timeout: Duration,
) -> FetchResult<Bytes> {
    let uri: Uri = url.parse().map_err(|e| FetchError::transport(url, e))?;
    let authority = uri
        .authority()
        .ok_or_else(|| FetchError::transport(url, "missing host"))?
        .clone();
    let connect_addr = match authority.port_u16() {
        Some(_) => authority.to_string(),
        None => format!("{}:80", authority.host()),
    };
    let path = uri
        .path_and_query()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let exchange = async {
        let stream = tokio::net::TcpStream::connect(&connect_addr)
            .await
            .map_err(|e| FetchError::transport(url, e))?;

        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| FetchError::transport(url, e))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "connection closed with error");
            }
        });

        let mut builder = Request::builder()
            .method(method)
            .uri(path.as_str())
            .header(HOST, authority.as_str())
            .header(USER_AGENT, AGENT);
        if body.is_some() {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }
        let req = builder
            .body(Full::new(body.unwrap_or_default()))
            .map_err(|e| FetchError::transport(url, e))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| FetchError::transport(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            debug!(%status, %url, "non-2xx response");
            return Err(FetchError::Status {
                target: url.to_string(),
                status: status.as_u16(),
            });
        }

        let collected = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| FetchError::transport(url, e))?;
        Ok(collected.to_bytes())
    };

    match tokio::time::timeout(timeout, exchange).await {
        Ok(result) => result,
        Err(_) => {
            debug!(%url, "request timed out");
            Err(FetchError::Timeout {
                target: url.to_string(),
                timeout,
            })
        }
    }
}

/// GET `url` and decode the JSON body.
pub(crate) async fn get_json<T: DeserializeOwned>(url: &str, timeout: Duration) -> FetchResult<T> {
    let body = send(Method::GET, url, None, timeout).await?;
    serde_json::from_slice(&body).map_err(|e| FetchError::malformed(url, e))
}
