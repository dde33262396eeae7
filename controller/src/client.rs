use std::{collections::HashMap, future::Future, path::PathBuf, pin::Pin, time::Duration};

use reqwest::{
    header::{AUTHORIZATION, CONTENT_TYPE, LOCATION},
    Method, StatusCode, Url,
};
use serde::Deserialize;
use tracing::{debug, warn};

use coolwatch_common::{HvacMode, HvacState, Sample, WatchdogConfig};

pub const MAX_REDIRECTS: usize = 10;
pub const SETTLE_DELAY: Duration = Duration::from_secs(60);

const MAX_ERROR_BODY_CHARS: usize = 200;

pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("could not communicate: {0}")]
    Transport(String),
    #[error("stopped after {0} redirects")]
    TooManyRedirects(usize),
    #[error("thermostat service rejected the token ({status})")]
    Auth { status: StatusCode },
    #[error("unexpected answer from the thermostat service ({status}): {body}")]
    Protocol { status: StatusCode, body: String },
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl ApiError {
    /// Coarse category used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) | Self::TooManyRedirects(_) => "transport",
            Self::Auth { .. } => "auth",
            Self::Protocol { .. } => "protocol",
            Self::Schema(_) => "schema",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("response is not the expected device tree: {0}")]
    Tree(#[source] serde_json::Error),
    #[error("thermostat {0} is not present in the response")]
    UnknownDevice(String),
    #[error("thermostat {id} has unexpected fields: {source}")]
    Thermostat {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Read and change the state of a single remote thermostat.
pub trait ThermostatApi: Send + Sync {
    fn read(&self) -> ApiFuture<'_, Sample>;

    /// Requests `mode`, then returns a fresh read so the caller can confirm the change.
    fn write(&self, mode: HvacMode) -> ApiFuture<'_, Sample>;
}

#[derive(Deserialize)]
struct DeviceTree {
    devices: Devices,
}

#[derive(Deserialize)]
struct Devices {
    thermostats: HashMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct ThermostatDoc {
    ambient_temperature_f: f64,
    hvac_mode: HvacMode,
    hvac_state: HvacState,
}

pub struct NestClient {
    http: reqwest::Client,
    base_url: String,
    thermostat_id: String,
    token: String,
    debug_dump: Option<PathBuf>,
    settle_delay: Duration,
}

impl NestClient {
    pub fn new(config: &WatchdogConfig) -> Result<Self, reqwest::Error> {
        // Redirects are followed by hand so the token is re-sent on every hop.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_owned(),
            thermostat_id: config.thermostat_id.clone(),
            token: config.token.clone(),
            debug_dump: config.debug.then(|| config.last_output.clone()),
            settle_delay: SETTLE_DELAY,
        })
    }

    #[cfg(test)]
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    fn read_url(&self) -> String {
        self.base_url.clone()
    }

    fn write_url(&self) -> String {
        format!("{}/devices/thermostats/{}", self.base_url, self.thermostat_id)
    }

    async fn fetch(&self) -> Result<Sample, ApiError> {
        let response = self.send(Method::GET, &self.read_url(), None).await?;
        let response = check_status(response).await?;
        let body = response
            .bytes()
            .await
            .map_err(|err| ApiError::Transport(err.to_string()))?;

        if let Some(path) = &self.debug_dump {
            if let Err(err) = tokio::fs::write(path, &body).await {
                warn!("could not write debug dump to {}: {err}", path.display());
            }
        }

        let sample = decode_sample(&body, &self.thermostat_id)?;
        debug!(
            temperature_f = sample.temperature_f,
            mode = sample.mode.as_str(),
            cooling = sample.is_cooling,
            "thermostat read"
        );
        Ok(sample)
    }

    async fn change_mode(&self, mode: HvacMode) -> Result<Sample, ApiError> {
        let payload = serde_json::json!({ "hvac_mode": mode }).to_string();

        let response = self
            .send(Method::PUT, &self.write_url(), Some(payload))
            .await?;
        check_status(response).await?;

        debug!(mode = mode.as_str(), "mode change accepted, waiting to confirm");
        tokio::time::sleep(self.settle_delay).await;
        self.fetch().await
    }

    async fn send(
        &self,
        mut method: Method,
        url: &str,
        mut body: Option<String>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut url = Url::parse(url).map_err(|err| ApiError::Transport(err.to_string()))?;

        for _ in 0..=MAX_REDIRECTS {
            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .header(AUTHORIZATION, &self.token)
                .header(CONTENT_TYPE, "application/json");
            if let Some(body) = &body {
                request = request.body(body.clone());
            }

            let response = request
                .send()
                .await
                .map_err(|err| ApiError::Transport(err.to_string()))?;

            if !response.status().is_redirection() {
                return Ok(response);
            }

            if let Some(next) = redirect_method(response.status(), &method) {
                method = next;
                body = None;
            }
            url = redirect_target(&response)?;
            debug!(%url, "following redirect");
        }

        Err(ApiError::TooManyRedirects(MAX_REDIRECTS))
    }
}

impl ThermostatApi for NestClient {
    fn read(&self) -> ApiFuture<'_, Sample> {
        Box::pin(self.fetch())
    }

    fn write(&self, mode: HvacMode) -> ApiFuture<'_, Sample> {
        Box::pin(self.change_mode(mode))
    }
}

/// Method for the next hop when a redirect drops the body: always on 303, and
/// on 301/302 for anything but GET or HEAD.
fn redirect_method(status: StatusCode, method: &Method) -> Option<Method> {
    let rewrites = match status {
        StatusCode::SEE_OTHER => true,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => {
            *method != Method::GET && *method != Method::HEAD
        }
        _ => false,
    };
    rewrites.then_some(Method::GET)
}

fn redirect_target(response: &reqwest::Response) -> Result<Url, ApiError> {
    let status = response.status();
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Protocol {
            status,
            body: "redirect without a location header".to_owned(),
        })?;

    response
        .url()
        .join(location)
        .map_err(|err| ApiError::Protocol {
            status,
            body: format!("redirect to unusable location {location:?}: {err}"),
        })
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status == StatusCode::OK {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, body))
}

fn status_error(status: StatusCode, body: String) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Auth { status },
        _ => ApiError::Protocol {
            status,
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        },
    }
}

pub(crate) fn decode_sample(body: &[u8], thermostat_id: &str) -> Result<Sample, SchemaError> {
    let mut tree: DeviceTree = serde_json::from_slice(body).map_err(SchemaError::Tree)?;

    let raw = tree
        .devices
        .thermostats
        .remove(thermostat_id)
        .ok_or_else(|| SchemaError::UnknownDevice(thermostat_id.to_owned()))?;

    let doc: ThermostatDoc =
        serde_json::from_value(raw).map_err(|source| SchemaError::Thermostat {
            id: thermostat_id.to_owned(),
            source,
        })?;

    Ok(Sample::new(
        doc.ambient_temperature_f.trunc() as i32,
        doc.hvac_mode,
        doc.hvac_state,
    ))
}
