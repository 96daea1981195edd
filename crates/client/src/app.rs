//! The top-level controller: user actions in, component calls out.

use std::cell::{Ref, RefCell, RefMut};

use geocanvas_cloud::{GeocodeApi, ProcessingApi, WeatherApi};
use geocanvas_core::{Color, FeatureCollection, LngLat};
use tracing::info;

use crate::context::MapContext;
use crate::draw::{DrawEvent, DrawToolkit};
use crate::enrichment::{ContextEnrichment, EnrichmentReport};
use crate::error::{JobResult, SessionResult};
use crate::registry::LayerAction;
use crate::renderer::MapRenderer;
use crate::results::LogEntry;
use crate::session::VectorEditSession;
use crate::upload::{
    DisplayedImage, IdSource, PollClock, PollPolicy, TiffDownload, UploadJobCoordinator,
    UploadLimits, UploadSource,
};

/// Engine tuning.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub poll: PollPolicy,
    pub limits: UploadLimits,
}

/// Owns the shared context and every component, and routes user actions.
pub struct AppController<R, T, P, W, G, C, I> {
    ctx: MapContext<R>,
    session: RefCell<VectorEditSession<T>>,
    uploads: UploadJobCoordinator<P, C, I>,
    enrichment: ContextEnrichment<W, G>,
    /// Editable features saved across a basemap switch.
    stash: RefCell<Option<FeatureCollection>>,
}

impl<R, T, P, W, G, C, I> AppController<R, T, P, W, G, C, I>
where
    R: MapRenderer,
    T: DrawToolkit,
    P: ProcessingApi,
    W: WeatherApi,
    G: GeocodeApi,
    C: PollClock,
    I: IdSource,
{
    pub fn new(
        ctx: MapContext<R>,
        toolkit: T,
        uploads: UploadJobCoordinator<P, C, I>,
        enrichment: ContextEnrichment<W, G>,
        options: ClientOptions,
    ) -> Self {
        Self {
            ctx,
            session: RefCell::new(VectorEditSession::new(toolkit)),
            uploads: uploads.with_policy(options.poll).with_limits(options.limits),
            enrichment,
            stash: RefCell::new(None),
        }
    }

    pub fn context(&self) -> &MapContext<R> {
        &self.ctx
    }

    pub fn session(&self) -> Ref<'_, VectorEditSession<T>> {
        self.session.borrow()
    }

    pub fn session_mut(&self) -> RefMut<'_, VectorEditSession<T>> {
        self.session.borrow_mut()
    }

    pub fn uploads(&self) -> &UploadJobCoordinator<P, C, I> {
        &self.uploads
    }

    /// The style finished loading, first time or after a basemap switch.
    pub fn on_style_loaded(&self) {
        let restored = self
            .ctx
            .with_layers(|registry, renderer| registry.on_style_loaded(renderer));
        let features = self.stash.borrow_mut().take().unwrap_or_default();
        self.session.borrow_mut().restore(&self.ctx, features);
        info!(restored, "style loaded");
    }

    /// Save the editable features before the renderer swaps its style.
    pub fn before_style_change(&self) {
        let features = self.session.borrow().toolkit().get_all();
        *self.stash.borrow_mut() = Some(features);
    }

    pub fn set_user_location(&self, location: Option<LngLat>) {
        self.ctx.set_user_location(location);
    }

    pub fn on_draw_event(&self, event: DrawEvent) {
        self.session.borrow_mut().handle_event(&self.ctx, event);
    }

    pub fn set_fill_color(&self, input: &str) -> SessionResult<()> {
        let color = self.parse_color(input)?;
        self.ctx.style_mut().set_fill_color(color);
        self.restyle_selection();
        Ok(())
    }

    pub fn set_stroke_color(&self, input: &str) -> SessionResult<()> {
        let color = self.parse_color(input)?;
        self.ctx.style_mut().set_stroke_color(color);
        self.restyle_selection();
        Ok(())
    }

    pub fn set_fill_opacity(&self, opacity: f64) -> SessionResult<()> {
        let result = self.ctx.style_mut().set_fill_opacity(opacity);
        self.report_style_result(result)
    }

    pub fn set_stroke_width(&self, width: f64) -> SessionResult<()> {
        let result = self.ctx.style_mut().set_stroke_width(width);
        self.report_style_result(result)
    }

    pub fn save_properties(&self, rows: Vec<(String, String)>) -> SessionResult<()> {
        self.session.borrow_mut().save_properties(&self.ctx, rows)
    }

    pub fn import_geojson(&self, text: &str) -> SessionResult<usize> {
        let layer = self.session.borrow_mut().import_geojson(&self.ctx, text)?;
        Ok(layer.feature_count)
    }

    pub fn export_geojson(&self) -> SessionResult<String> {
        self.session.borrow().export_geojson(&self.ctx)
    }

    pub fn layer_action(&self, action: LayerAction) -> bool {
        self.ctx
            .with_layers(|registry, renderer| registry.apply(renderer, action))
    }

    /// Upload, display, then annotate the results with context about the
    /// image location.
    pub async fn upload(&self, source: Option<UploadSource>) -> JobResult<DisplayedImage> {
        let displayed = self.uploads.upload(&self.ctx, source).await?;
        self.enrichment.enrich(&self.ctx, &displayed.info.bounds).await;
        Ok(displayed)
    }

    /// Classify a job's upload, or the most recent upload when `uuid` is
    /// `None`.
    pub async fn classify(&self, uuid: Option<&str>) -> JobResult<DisplayedImage> {
        let latest = self.uploads.latest().map(|j| j.uuid);
        self.uploads
            .classify(&self.ctx, uuid.or(latest.as_deref()))
            .await
    }

    pub async fn export_tiff(&self, uuid: Option<&str>) -> JobResult<TiffDownload> {
        let latest = self.uploads.latest().map(|j| j.uuid);
        self.uploads
            .export_tiff(&self.ctx, uuid.or(latest.as_deref()))
            .await
    }

    pub async fn enrich(&self, bounds: &geocanvas_core::Bounds) -> EnrichmentReport {
        self.enrichment.enrich(&self.ctx, bounds).await
    }

    fn parse_color(&self, input: &str) -> SessionResult<Color> {
        Color::parse(input).map_err(|e| {
            self.ctx.report(LogEntry::error(e.to_string()));
            e.into()
        })
    }

    fn report_style_result(&self, result: geocanvas_core::Result<()>) -> SessionResult<()> {
        match result {
            Ok(()) => {
                self.restyle_selection();
                Ok(())
            }
            Err(e) => {
                self.ctx.report(LogEntry::error(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Restyle the selection; with nothing selected the new defaults still
    /// change the paint fallbacks.
    fn restyle_selection(&self) {
        let mut session = self.session.borrow_mut();
        if session.apply_style_to_selection(&self.ctx) == 0 {
            session.recompile(&self.ctx);
        }
    }
}
