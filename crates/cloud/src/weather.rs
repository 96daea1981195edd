//! OpenWeatherMap current-weather client.

use reqwest::Client;
use tracing::debug;

use crate::api::WeatherApi;
use crate::error::{CloudError, Result};
use crate::http::{build_client, ServiceClientOptions};
use crate::models::{WeatherReport, WeatherResponse};

pub const OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherClient {
    pub fn new(api_key: impl Into<String>, options: &ServiceClientOptions) -> Result<Self> {
        Ok(Self {
            client: build_client(options)?,
            base_url: OPENWEATHER_BASE_URL.to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl WeatherApi for OpenWeatherClient {
    async fn current_weather(&self, lat: f64, lon: f64) -> Result<WeatherReport> {
        let resp = self
            .client
            .get(format!("{}/weather", self.base_url))
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(CloudError::status(resp.status()));
        }
        let body: WeatherResponse = resp
            .json()
            .await
            .map_err(|e| CloudError::Parse(format!("weather response: {e}")))?;
        debug!(lat, lon, location = %body.name, "weather fetched");
        Ok(body.into())
    }
}
