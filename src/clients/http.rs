use std::time::Duration;

use reqwest::{Client, Response, StatusCode, Url};

use crate::clients::error::ClientError;

/// Base URL plus a reqwest client whose every request is bounded by `timeout`.
#[derive(Debug, Clone)]
pub struct ServiceEndpoint {
    service: &'static str,
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl ServiceEndpoint {
    pub fn new(service: &'static str, base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url).map_err(|err| {
            ClientError::InvalidConfig(format!("invalid {service} base url '{base_url}': {err}"))
        })?;

        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidConfig(format!(
                "{service} base url '{base_url}' cannot carry a path"
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("ride-orchestrator/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| {
                ClientError::InvalidConfig(format!("failed to build {service} http client: {err}"))
            })?;

        Ok(Self {
            service,
            client,
            base_url,
            timeout,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Appends percent-encoded path segments to the base URL.
    pub fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::InvalidConfig(format!("{} base url cannot carry a path", self.service))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn transport_error(&self, err: reqwest::Error) -> ClientError {
        ClientError::from_reqwest(self.service, self.timeout, err)
    }

    /// Passes the response through when it carries `expected`, otherwise turns
    /// the status and body into a `ClientError`.
    pub async fn expect_status(
        &self,
        response: Response,
        expected: StatusCode,
    ) -> Result<Response, ClientError> {
        let status = response.status();
        if status == expected {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());

        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound {
                service: self.service,
                reason: body.trim().to_string(),
            });
        }

        Err(ClientError::Status {
            service: self.service,
            status: status.as_u16(),
            body: body.trim().to_string(),
        })
    }
}
