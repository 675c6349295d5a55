use hyper::header::AUTHORIZATION;
use hyper::{Body, Client, Method, Request, Uri};
use hyper_tls::HttpsConnector;
use url::Url;

pub type HttpsClient = Client<HttpsConnector<hyper::client::HttpConnector>>;

/// What the harness needs from a response: the status and how many body
/// bytes came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body_len: usize,
}

/// A request that produced no HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("connection refused or host unreachable")]
    Connect,

    #[error("timeout")]
    Timeout,

    #[error("connection closed unexpectedly")]
    Closed,

    #[error("network error: {0}")]
    Other(String),
}

impl RequestError {
    pub fn kind(&self) -> &'static str {
        match self {
            RequestError::InvalidUrl(_) => "INVALID_URL",
            RequestError::Connect => "CONNECT_ERROR",
            RequestError::Timeout => "TIMEOUT",
            RequestError::Closed => "CONNECTION_CLOSED",
            RequestError::Other(_) => "REQUEST_ERROR",
        }
    }
}

impl From<hyper::Error> for RequestError {
    fn from(e: hyper::Error) -> Self {
        if e.is_connect() {
            RequestError::Connect
        } else if e.is_timeout() {
            RequestError::Timeout
        } else if e.is_closed() || e.is_incomplete_message() {
            RequestError::Closed
        } else {
            RequestError::Other(e.to_string())
        }
    }
}

/// Seam between the harness and the network. Timeouts are enforced by the
/// caller, so implementations may take as long as the server does.
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, bearer_token: &str) -> Result<HttpReply, RequestError>;
}

/// Pooled hyper client over HTTP or HTTPS.
#[derive(Clone)]
pub struct HyperTransport {
    client: HttpsClient,
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperTransport {
    pub fn new() -> Self {
        let https = HttpsConnector::new();
        let client: HttpsClient = Client::builder().build::<_, Body>(https);
        Self { client }
    }
}

#[async_trait::async_trait]
impl HttpTransport for HyperTransport {
    async fn get(&self, url: &str, bearer_token: &str) -> Result<HttpReply, RequestError> {
        // Only syntactic validity is checked; an empty path segment from a
        // missing parameter is still a valid request.
        let url = Url::parse(url).map_err(|e| RequestError::InvalidUrl(format!("{}: {}", url, e)))?;
        let uri: Uri = url
            .as_str()
            .parse::<Uri>()
            .map_err(|e| RequestError::InvalidUrl(e.to_string()))?;

        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(AUTHORIZATION, format!("Bearer {}", bearer_token))
            .body(Body::empty())
            .map_err(|e| RequestError::InvalidUrl(e.to_string()))?;

        let response = self.client.request(request).await?;
        let status = response.status().as_u16();
        let body = hyper::body::to_bytes(response.into_body()).await?;

        Ok(HttpReply {
            status,
            body_len: body.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn sends_bearer_token_and_reads_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/users/get-profile"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"id\":7}"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport = HyperTransport::new();
        let reply = transport
            .get(&format!("{}/users/get-profile", mock_server.uri()), "test-token")
            .await
            .unwrap();

        assert_eq!(reply, HttpReply { status: 200, body_len: 8 });
    }

    #[tokio::test]
    async fn error_statuses_are_replies_not_errors() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/notifications"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let transport = HyperTransport::new();
        let reply = transport
            .get(&format!("{}/notifications", mock_server.uri()), "t")
            .await
            .unwrap();

        assert_eq!(reply.status, 503);
        assert_eq!(reply.body_len, 0);
    }

    #[tokio::test]
    async fn unparsable_url_is_a_request_error() {
        let transport = HyperTransport::new();
        let err = transport.get("/instruments", "t").await.unwrap_err();
        assert!(matches!(err, RequestError::InvalidUrl(_)));
        assert_eq!(err.kind(), "INVALID_URL");
    }

    #[tokio::test]
    async fn refused_connection_is_a_connect_error() {
        // Bind then drop a listener to get a port nothing is serving.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HyperTransport::new();
        let err = transport
            .get(&format!("http://{}/instruments", addr), "t")
            .await
            .unwrap_err();
        assert_eq!(err, RequestError::Connect);
    }
}
