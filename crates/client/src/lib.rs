//! # geocanvas-client
//!
//! Layer and feature lifecycle engine of the geocanvas map client.
//!
//! The engine drives a style-based map renderer through the [`MapRenderer`]
//! seam and a drawing toolkit through [`DrawToolkit`]. All shared state lives
//! in one [`MapContext`]:
//!
//! - [`RasterLayerRegistry`] - uploaded and processed image overlays
//! - [`VectorEditSession`] - drawn features, their styles and metadata
//! - [`UploadJobCoordinator`] - upload, processing and classification jobs
//! - [`ContextEnrichment`] - distance, place name and weather for an image
//!
//! Everything runs on one thread; async work interleaves at `.await`
//! points only.

pub mod app;
pub mod context;
pub mod draw;
pub mod enrichment;
pub mod error;
pub mod registry;
pub mod renderer;
pub mod results;
pub mod session;
pub mod upload;

pub use app::{AppController, ClientOptions};
pub use context::MapContext;
pub use draw::{DrawEvent, DrawMode, DrawToolkit, MemoryToolkit};
pub use enrichment::{ContextEnrichment, EnrichmentReport, UNKNOWN_LOCATION};
pub use error::{ExportError, JobError, SessionError};
pub use registry::{LayerAction, RasterLayerRecord, RasterLayerRegistry};
pub use renderer::{HeadlessRenderer, MapRenderer};
pub use results::{LogEntry, LogLevel, ResultsPanel};
pub use session::{ImportedLayer, PaintReport, PropertyEditor, SessionState, VectorEditSession};
pub use upload::{
    CancellationToken, DisplayedImage, IdSource, JobStage, PollClock, PollPolicy, TiffDownload,
    TokioClock, UploadJob, UploadJobCoordinator, UploadLimits, UploadSource, UuidSource,
};
