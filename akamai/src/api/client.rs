use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use url::Url;

use super::error::{ApiError, Problem};
use super::pool::ConnectionPoolConfig;
use crate::edgegrid::{EdgegridConfig, Signer};

/// EdgeGrid-signed Akamai API client
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: Url,
    signer: Signer,
    account_key: Option<String>,
}

impl Client {
    /// Create a new API client with default pool settings
    pub fn new(config: EdgegridConfig) -> Result<Self, ApiError> {
        Self::with_pool_config(config, ConnectionPoolConfig::default())
    }

    pub fn with_pool_config(
        config: EdgegridConfig,
        pool_config: ConnectionPoolConfig,
    ) -> Result<Self, ApiError> {
        let http_client = pool_config.build_client()?;
        let base_url = config.base_url()?;
        let account_key = config.account_key.clone();

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
                signer: Signer::new(config),
                account_key,
            }),
        })
    }

    /// Property Manager API operations
    pub fn papi(&self) -> crate::api::papi::PapiApi<'_> {
        crate::api::papi::PapiApi::new(self)
    }

    /// Application Security API operations
    pub fn appsec(&self) -> crate::api::appsec::AppsecApi<'_> {
        crate::api::appsec::AppsecApi::new(self)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = self.url(path, query)?;
        self.execute(Method::GET, url, None).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path, query)?;
        let body = serde_json::to_vec(body).map_err(|e| ApiError::ParseError(e.to_string()))?;
        self.execute(Method::POST, url, Some(body)).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path, query)?;
        let body = serde_json::to_vec(body).map_err(|e| ApiError::ParseError(e.to_string()))?;
        self.execute(Method::PUT, url, Some(body)).await
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, ApiError> {
        let mut url = self
            .inner
            .base_url
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", path, e)))?;

        if !query.is_empty() || self.inner.account_key.is_some() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            if let Some(account_key) = &self.inner.account_key {
                pairs.append_pair("accountSwitchKey", account_key);
            }
        }

        Ok(url)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<T, ApiError> {
        let authorization = self
            .inner
            .signer
            .sign(method.as_str(), &url, body.as_deref())?;

        tracing::debug!("{} request to: {}", method, url);

        let mut request = self
            .inner
            .http_client
            .request(method, url.clone())
            .header(AUTHORIZATION, authorization);
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = request.send().await?;
        if response.status().is_success() {
            self.parse_success_response(response).await
        } else {
            self.handle_error_response(url, response).await
        }
    }

    /// Parse successful response
    async fn parse_success_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;
        tracing::debug!("API response body: {}", text);

        serde_json::from_str::<T>(&text).map_err(|e| {
            tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
            ApiError::ParseError(format!("Failed to parse response: {}", e))
        })
    }

    /// Handle error response
    async fn handle_error_response<T>(
        &self,
        url: Url,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        tracing::debug!("API error response ({}): {}", status, text);

        if status == 404 {
            return Err(ApiError::NotFound(url.path().to_string()));
        }

        match serde_json::from_str::<Problem>(&text) {
            Ok(mut problem) if !problem.title.is_empty() || !problem.detail.is_empty() => {
                if problem.status == 0 {
                    problem.status = status;
                }
                Err(ApiError::Problem {
                    status,
                    problem: Box::new(problem),
                })
            }
            _ => Err(ApiError::Unexpected {
                status,
                message: text,
            }),
        }
    }
}

/// Absolute API path with every segment percent-encoded
pub(crate) fn api_path(segments: &[&str]) -> Result<String, ApiError> {
    let mut url = Url::parse("https://localhost/").map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| ApiError::InvalidUrl("URL cannot have path segments".to_string()))?
        .clear()
        .extend(segments);
    Ok(url.path().to_string())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Echo {
        value: String,
    }

    fn config(host: String) -> EdgegridConfig {
        EdgegridConfig {
            host,
            client_token: "akab-ct".to_string(),
            client_secret: "secret".to_string(),
            access_token: "akab-at".to_string(),
            max_body: 131072,
            account_key: None,
        }
    }

    #[tokio::test]
    async fn get_sends_signed_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/papi/v1/echo")
            .match_query(Matcher::UrlEncoded("a".into(), "b c".into()))
            .match_header(
                "authorization",
                Matcher::Regex(
                    r"^EG1-HMAC-SHA256 client_token=akab-ct;access_token=akab-at;timestamp=\d{8}T\d{2}:\d{2}:\d{2}\+0000;nonce=[0-9a-f-]{36};signature=.+$".to_string(),
                ),
            )
            .with_body(r#"{"value":"ok"}"#)
            .create_async()
            .await;

        let client = Client::new(config(server.url())).unwrap();
        let echo: Echo = client.get("/papi/v1/echo", &[("a", "b c".to_string())]).await.unwrap();

        assert_eq!(echo.value, "ok");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn account_switch_key_is_appended() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/appsec/v1/echo")
            .match_query(Matcher::UrlEncoded("accountSwitchKey".into(), "1-ABC".into()))
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(serde_json::json!({"value": "in"})))
            .with_body(r#"{"value":"out"}"#)
            .create_async()
            .await;

        let mut cfg = config(server.url());
        cfg.account_key = Some("1-ABC".to_string());
        let client = Client::new(cfg).unwrap();

        let echo: Echo = client
            .put("/appsec/v1/echo", &[], &serde_json::json!({"value": "in"}))
            .await
            .unwrap();

        assert_eq!(echo.value, "out");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn problem_details_are_parsed() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/papi/v1/echo")
            .with_status(400)
            .with_header("content-type", "application/problem+json")
            .with_body(r#"{"type":"bad","title":"Bad Request","detail":"network is required"}"#)
            .create_async()
            .await;

        let client = Client::new(config(server.url())).unwrap();
        let err = client
            .post::<Echo, _>("/papi/v1/echo", &[], &serde_json::json!({}))
            .await
            .unwrap_err();

        match err {
            ApiError::Problem { status, problem } => {
                assert_eq!(status, 400);
                assert_eq!(problem.status, 400);
                assert_eq!(problem.detail, "network is required");
            }
            other => panic!("Expected Problem error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn plain_404_is_not_found() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/papi/v1/missing")
            .with_status(404)
            .with_body("nope")
            .create_async()
            .await;

        let client = Client::new(config(server.url())).unwrap();
        let err = client.get::<Echo>("/papi/v1/missing", &[]).await.unwrap_err();

        assert!(matches!(err, ApiError::NotFound(path) if path == "/papi/v1/missing"));
    }

    #[tokio::test]
    async fn problem_404_is_not_found() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/papi/v1/properties/prp_1/activations")
            .with_status(404)
            .with_header("content-type", "application/problem+json")
            .with_body(r#"{"type":"/papi/v1/errors/not_found","title":"Not Found","detail":"The system was unable to locate the requested resource","status":404}"#)
            .create_async()
            .await;

        let client = Client::new(config(server.url())).unwrap();
        let err = client
            .get::<Echo>("/papi/v1/properties/prp_1/activations", &[])
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::NotFound(_)), "{:?}", err);
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn api_path_escapes_reserved_characters() {
        assert_eq!(
            api_path(&["papi", "v1", "properties", "prp_1"]).unwrap(),
            "/papi/v1/properties/prp_1"
        );
        assert_eq!(
            api_path(&["security-policies", "a/b", "c?d", "e#f"]).unwrap(),
            "/security-policies/a%2Fb/c%3Fd/e%23f"
        );
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/papi/v1/echo")
            .with_body("not json")
            .create_async()
            .await;

        let client = Client::new(config(server.url())).unwrap();
        let err = client.get::<Echo>("/papi/v1/echo", &[]).await.unwrap_err();

        assert!(matches!(err, ApiError::ParseError(_)));
    }

    #[tokio::test]
    async fn network_errors_surface_as_request_errors() {
        let client = Client::new(config("http://127.0.0.1:1".to_string())).unwrap();
        let err = client.get::<Echo>("/papi/v1/echo", &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::RequestError(_)));
    }
}
