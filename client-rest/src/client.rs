//! REST implementation of the [`ScoringService`]

use crate::service::{ClientError, ScoringService};
use crate::types::*;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Path of the initial corpus endpoint
const PATH_INITIAL_MAP_DATA: &str = "initial-map-data";
/// Path of the single point score endpoint
const PATH_OPTIMIZE_POINT: &str = "optimize-point";
/// Path of the reasoning endpoint
const PATH_ANALYZE_REASONING: &str = "analyze-reasoning";
/// Path of the grid search endpoint
const PATH_OPTIMIZE_GRID: &str = "optimize-grid";
/// Path of the radius search endpoint
const PATH_OPTIMIZE_RADIUS: &str = "optimize-radius";
/// Path of the power supply endpoint
const PATH_POWER_SUPPLY: &str = "power-supply";

/// JSON-over-HTTP client for the scoring backend
#[derive(Debug, Clone)]
pub struct RestClient {
    name: String,
    base_url: String,
    http: reqwest::Client,
}

impl RestClient {
    /// Create a new client for the backend rooted at `base_url`
    /// (for example `http://127.0.0.1:5000/api`). Requests give up after
    /// `timeout`.
    pub fn new_client(base_url: &str, name: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Full URL for an endpoint path
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get<Resp>(&self, path: &str) -> Result<Resp, ClientError>
    where
        Resp: DeserializeOwned,
    {
        let url = self.endpoint(path);
        client_debug!("(get) {} client GET {}.", self.name, url);
        let response = self.http.get(&url).send().await.map_err(map_reqwest_error)?;
        decode(response).await
    }

    async fn post<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, ClientError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = self.endpoint(path);
        client_debug!("(post) {} client POST {}.", self.name, url);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        decode(response).await
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        client_warn!("(map_reqwest_error) request timed out: {}", e);
        return ClientError::Timeout;
    }

    client_warn!("(map_reqwest_error) transport failure: {}", e);
    ClientError::Transport(e.to_string())
}

/// The backend reports failures as `{"error": "..."}`; fall back to the raw body.
fn error_message(body: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(value) => match value.get("error").and_then(|e| e.as_str()) {
            Some(message) => message.to_string(),
            None => value.to_string(),
        },
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    }
}

async fn decode<Resp>(response: reqwest::Response) -> Result<Resp, ClientError>
where
    Resp: DeserializeOwned,
{
    let status = response.status();
    let body = response.bytes().await.map_err(map_reqwest_error)?;

    if !status.is_success() {
        let message = error_message(&body);
        client_error!("(decode) backend returned {}: {}", status, message);
        return Err(ClientError::Status(status.as_u16(), message));
    }

    serde_json::from_slice(&body).map_err(|e| {
        client_error!("(decode) could not decode response body: {}", e);
        ClientError::Decode(e.to_string())
    })
}

#[async_trait]
impl ScoringService for RestClient {
    fn get_name(&self) -> &str {
        &self.name
    }

    async fn get_initial_map_data(&self) -> Result<InitialMapData, ClientError> {
        client_info!("(get_initial_map_data) {} client.", self.get_name());
        self.get(PATH_INITIAL_MAP_DATA).await
    }

    async fn score_feasibility(
        &self,
        request: FeasibilityRequest,
    ) -> Result<FeasibilityScore, ClientError> {
        client_info!("(score_feasibility) {} client.", self.get_name());
        client_debug!("(score_feasibility) request: {:?}", request);
        self.post(PATH_OPTIMIZE_POINT, &request).await
    }

    async fn get_reasoning(
        &self,
        request: ReasoningRequest,
    ) -> Result<ReasoningResponse, ClientError> {
        client_info!("(get_reasoning) {} client.", self.get_name());
        client_debug!("(get_reasoning) request: {:?}", request);
        self.post(PATH_ANALYZE_REASONING, &request).await
    }

    async fn optimize_grid(&self, request: GridRequest) -> Result<GridResponse, ClientError> {
        client_info!("(optimize_grid) {} client.", self.get_name());
        client_debug!("(optimize_grid) request: {:?}", request);
        self.post(PATH_OPTIMIZE_GRID, &request).await
    }

    async fn optimize_radius(
        &self,
        request: RadiusRequest,
    ) -> Result<RadiusResponse, ClientError> {
        client_info!("(optimize_radius) {} client.", self.get_name());
        client_debug!("(optimize_radius) request: {:?}", request);
        self.post(PATH_OPTIMIZE_RADIUS, &request).await
    }

    async fn analyze_power_supply(
        &self,
        request: PowerSupplyRequest,
    ) -> Result<PowerSupplyResponse, ClientError> {
        client_info!("(analyze_power_supply) {} client.", self.get_name());
        client_debug!("(analyze_power_supply) request: {:?}", request);
        self.post(PATH_POWER_SUPPLY, &request).await
    }
}
