//! Shared mutable state of one map view.

use std::cell::{Cell, Ref, RefCell, RefMut};

use geocanvas_core::{LngLat, StyleState};

use crate::registry::RasterLayerRegistry;
use crate::renderer::MapRenderer;
use crate::results::{LogEntry, ResultsPanel};

/// Everything the engine components share: the renderer, the current style
/// selection, the raster layer registry, the results panel and the user's
/// last known location.
///
/// Components receive `&MapContext` and borrow a cell only for the duration
/// of a synchronous step. No borrow is ever held across an `.await`.
pub struct MapContext<R> {
    renderer: RefCell<R>,
    style: RefCell<StyleState>,
    registry: RefCell<RasterLayerRegistry>,
    results: RefCell<ResultsPanel>,
    user_location: Cell<Option<LngLat>>,
}

impl<R: MapRenderer> MapContext<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer: RefCell::new(renderer),
            style: RefCell::new(StyleState::default()),
            registry: RefCell::new(RasterLayerRegistry::new()),
            results: RefCell::new(ResultsPanel::new()),
            user_location: Cell::new(None),
        }
    }

    pub fn renderer(&self) -> Ref<'_, R> {
        self.renderer.borrow()
    }

    pub fn renderer_mut(&self) -> RefMut<'_, R> {
        self.renderer.borrow_mut()
    }

    pub fn style(&self) -> Ref<'_, StyleState> {
        self.style.borrow()
    }

    pub fn style_mut(&self) -> RefMut<'_, StyleState> {
        self.style.borrow_mut()
    }

    pub fn registry(&self) -> Ref<'_, RasterLayerRegistry> {
        self.registry.borrow()
    }

    /// Run `f` against the registry and the renderer together.
    pub fn with_layers<T>(&self, f: impl FnOnce(&mut RasterLayerRegistry, &mut R) -> T) -> T {
        let mut registry = self.registry.borrow_mut();
        let mut renderer = self.renderer.borrow_mut();
        f(&mut registry, &mut renderer)
    }

    pub fn results(&self) -> Ref<'_, ResultsPanel> {
        self.results.borrow()
    }

    /// Post a message to the results panel.
    pub fn report(&self, entry: LogEntry) {
        self.results.borrow_mut().push(entry);
    }

    pub fn user_location(&self) -> Option<LngLat> {
        self.user_location.get()
    }

    pub fn set_user_location(&self, location: Option<LngLat>) {
        self.user_location.set(location);
    }

    pub fn into_renderer(self) -> R {
        self.renderer.into_inner()
    }
}
