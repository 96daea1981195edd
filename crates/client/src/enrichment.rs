//! Best-effort context for a displayed image: distance from the user, the
//! nearest place name and the current weather.

use geocanvas_cloud::{GeocodeApi, WeatherApi, WeatherReport};
use geocanvas_core::{Bounds, LngLat};
use tracing::{debug, warn};

use crate::context::MapContext;
use crate::renderer::MapRenderer;
use crate::results::LogEntry;

pub const UNKNOWN_LOCATION: &str = "an unknown location";

/// What was learned about one location.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentReport {
    pub point: LngLat,
    /// Kilometres from the user; `None` without a known user location.
    pub distance_km: Option<f64>,
    pub place: String,
    pub weather: Option<WeatherReport>,
}

/// Runs the lookups. Either collaborator may be absent (no API key), in
/// which case its part is skipped.
pub struct ContextEnrichment<W, G> {
    weather: Option<W>,
    geocoder: Option<G>,
}

impl<W: WeatherApi, G: GeocodeApi> ContextEnrichment<W, G> {
    pub fn new(weather: Option<W>, geocoder: Option<G>) -> Self {
        Self { weather, geocoder }
    }

    /// Great-circle distance from the user's last known location.
    pub fn distance_km<R: MapRenderer>(ctx: &MapContext<R>, point: LngLat) -> Option<f64> {
        ctx.user_location().map(|user| user.distance_km(&point))
    }

    /// Nearest place name, or [`UNKNOWN_LOCATION`] on any failure.
    pub async fn place_name(&self, point: LngLat) -> String {
        let Some(geocoder) = &self.geocoder else {
            return UNKNOWN_LOCATION.to_string();
        };
        match geocoder.reverse_geocode(point.lat, point.lng).await {
            Ok(Some(place)) => place,
            Ok(None) => UNKNOWN_LOCATION.to_string(),
            Err(e) => {
                warn!(error = %e, "reverse geocode failed");
                UNKNOWN_LOCATION.to_string()
            }
        }
    }

    pub async fn weather(&self, point: LngLat) -> Option<WeatherReport> {
        let client = self.weather.as_ref()?;
        match client.current_weather(point.lat, point.lng).await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "weather lookup failed");
                None
            }
        }
    }

    /// Look up everything about the centre of `bounds` and post it to the
    /// results panel. The geocode and weather requests run concurrently and
    /// neither failure affects the other.
    pub async fn enrich<R: MapRenderer>(
        &self,
        ctx: &MapContext<R>,
        bounds: &Bounds,
    ) -> EnrichmentReport {
        let point = bounds.centroid();
        let distance_km = Self::distance_km(ctx, point);
        if let Some(km) = distance_km {
            ctx.report(LogEntry::info(format!(
                "You are {km:.2} km from the image location."
            )));
        }

        let (place, weather) = futures::join!(self.place_name(point), self.weather(point));

        ctx.report(LogEntry::info(format!(
            "The image is located near {place}."
        )));
        if let Some(report) = &weather {
            ctx.report(LogEntry::info(format_weather(report)));
        }
        debug!(lng = point.lng, lat = point.lat, %place, "enrichment done");

        EnrichmentReport {
            point,
            distance_km,
            place,
            weather,
        }
    }
}

/// One-line weather summary.
pub fn format_weather(report: &WeatherReport) -> String {
    let mut line = format!("{:.1}°C, {}", report.temperature, report.description);
    if !report.location.is_empty() {
        line = format!("Weather in {}: {line}", report.location);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::HeadlessRenderer;
    use approx::assert_relative_eq;
    use geocanvas_cloud::{CloudError, Result};

    struct FixedWeather;

    impl WeatherApi for FixedWeather {
        async fn current_weather(&self, _lat: f64, _lon: f64) -> Result<WeatherReport> {
            Ok(WeatherReport {
                location: "Lisbon".into(),
                temperature: 21.44,
                description: "clear sky".into(),
                icon: Some("01d".into()),
            })
        }
    }

    struct BrokenGeocoder;

    impl GeocodeApi for BrokenGeocoder {
        async fn reverse_geocode(&self, _lat: f64, _lon: f64) -> Result<Option<String>> {
            Err(CloudError::Network("offline".into()))
        }
    }

    #[tokio::test]
    async fn failures_fall_back_independently() {
        let ctx = MapContext::new(HeadlessRenderer::loaded());
        ctx.set_user_location(Some(LngLat::new(0.0, 0.0)));
        let enrichment = ContextEnrichment::new(Some(FixedWeather), Some(BrokenGeocoder));

        let report = enrichment
            .enrich(&ctx, &Bounds::new(1.0, 0.0, -1.0, 2.0))
            .await;

        assert_eq!(report.place, UNKNOWN_LOCATION);
        assert_eq!(report.weather.map(|w| w.location), Some("Lisbon".to_string()));
        assert_relative_eq!(report.distance_km.unwrap_or_default(), 111.195, epsilon = 0.01);

        let results = ctx.results();
        assert!(results.contains("You are 111.19 km from the image location."));
        assert!(results.contains("The image is located near an unknown location."));
        assert!(results.contains("Weather in Lisbon: 21.4°C, clear sky"));
    }

    #[tokio::test]
    async fn missing_collaborators_are_skipped() {
        let ctx = MapContext::new(HeadlessRenderer::loaded());
        let enrichment: ContextEnrichment<FixedWeather, BrokenGeocoder> =
            ContextEnrichment::new(None, None);

        let report = enrichment
            .enrich(&ctx, &Bounds::new(1.0, 0.0, -1.0, 2.0))
            .await;
        assert!(report.distance_km.is_none());
        assert!(report.weather.is_none());
        assert_eq!(ctx.results().len(), 1);
    }
}
