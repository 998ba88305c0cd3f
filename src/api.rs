use crate::error::Result;
use crate::types::{ApiResponse, RefreshRequest, SendEthRequest};
use log::{debug, error, info};
use reqwest::{Response, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP wrappers for the MPC coordinator.
///
/// None of the calls return `Err`: transport failures and non-200 responses
/// are both folded into an [`ApiResponse`] with `error: true`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn sse_url(&self) -> String {
        self.url("/sse")
    }

    /// `GET /configs`
    pub async fn get_configs(&self) -> ApiResponse {
        info!("Loading wallet configurations");
        normalise(self.client.get(self.url("/configs")).send().await).await
    }

    /// `GET /online`. Returns `None` when the participants cannot be queried.
    pub async fn get_online(&self) -> Option<BTreeMap<String, bool>> {
        let response = self.client.get(self.url("/online")).send().await;
        let parsed = match response {
            Ok(response) => response.json::<BTreeMap<String, bool>>().await,
            Err(e) => Err(e),
        };
        match parsed {
            Ok(online) => Some(online),
            Err(e) => {
                error!("Unable to load online participants: {}", e);
                None
            }
        }
    }

    /// `POST /keys/generate`
    pub async fn start_dkg(&self) -> ApiResponse {
        info!("Requesting new key generation");
        normalise(self.client.post(self.url("/keys/generate")).send().await).await
    }

    /// `POST /keys/refresh`
    pub async fn start_dkf(&self, address: &str) -> ApiResponse {
        info!("Requesting key refresh for {}", address);
        let body = RefreshRequest { address };
        normalise(
            self.client
                .post(self.url("/keys/refresh"))
                .json(&body)
                .send()
                .await,
        )
        .await
    }

    /// `POST /sendeth`, `amount` in wei.
    pub async fn send_eth(&self, address: &str, to: &str, amount: u128) -> ApiResponse {
        info!("Requesting transfer of {} wei from {} to {}", amount, address, to);
        let body = SendEthRequest {
            address,
            to,
            amount: amount.to_string(),
        };
        normalise(self.client.post(self.url("/sendeth")).json(&body).send().await).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn normalise(result: reqwest::Result<Response>) -> ApiResponse {
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            error!("Request failed: {}", e);
            return ApiResponse::failure(e.to_string());
        }
    };

    let status = response.status();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to read response body: {}", e);
            return ApiResponse::failure(e.to_string());
        }
    };
    let data = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));

    if status == StatusCode::OK {
        ApiResponse::ok(data)
    } else {
        debug!("Server returned non-200 status: {}", status);
        ApiResponse::failure(data)
    }
}
