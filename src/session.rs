/// The main-thread owner of everything mutable
///
/// A `Session` holds the loaded image, the adjustment record, the geometry
/// editors, the undo history, the presets and the background workers. The
/// shell calls [`Session::begin_frame`] once per frame; that is the only
/// place where pending geometry ops are applied and the GPU is driven.
///
/// Frame order:
/// 1. take the latest file selection and start loading it
/// 2. install a finished load
/// 3. apply the pending geometry/undo op
/// 4. collect finished exports and size estimates
/// 5. re-render the preview if anything made it dirty
/// 6. collect histogram readbacks

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::{DecodeError, EncodeError, Error, GpuResourceError, Result, ValidationError};
use crate::export::ExportOptions;
use crate::gpu::histogram::{self, DisplayHistogram, HistogramCounts, HISTOGRAM_BINS};
use crate::gpu::{GpuPipeline, ViewTransform};
use crate::navigator::{self, SelectionReceiver, SelectionSender};
use crate::pixels::{ProcessedImage, RawImage};
use crate::raw::exif::ExifSummary;
use crate::raw::DecodedRaw;
use crate::state::auto_adjust::calculate_auto_settings;
use crate::state::geometry::{CropAspect, CropEditor, ImageViewport, Rotation, RotateEditor};
use crate::state::presets::{self, Preset};
use crate::state::slider::{SliderEdits, SliderRelease};
use crate::state::{Field, PendingOp, PendingOps, PresetStore, UndoStack, Uniforms};
use crate::worker::{EstimateWorker, ExportOutcome, ExportWorker, JobPoll, LoadWorker};

/// Which interaction the canvas is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditMode {
    #[default]
    Develop,
    Crop,
    Rotate,
}

/// The image currently being developed
#[derive(Debug)]
pub struct LoadedImage {
    pub path: PathBuf,
    pub raw: RawImage,
    pub exif: ExifSummary,
    /// Bumped whenever `raw` is replaced
    pub revision: u64,
}

/// Snapshot of the flags the UI shows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStatus {
    pub is_loading: bool,
    pub loading_path: Option<PathBuf>,
    pub is_exporting: bool,
    pub export_progress: f32,
    pub is_estimating: bool,
    pub estimated_size_kb: Option<u64>,
    pub image_dirty: bool,
    pub undo_depth: usize,
    pub geometry_pending: bool,
    pub histogram_ready: bool,
    pub last_export: Option<PathBuf>,
    pub message: Option<String>,
    pub error: Option<String>,
}

pub struct Session {
    config: AppConfig,
    pipeline: Option<GpuPipeline>,
    image: Option<LoadedImage>,
    uniforms: Uniforms,
    undo: UndoStack,
    pending: PendingOps,
    mode: EditMode,
    crop: CropEditor,
    rotate: RotateEditor,
    sliders: SliderEdits,
    presets: PresetStore,
    selector: SelectionSender,
    selections: SelectionReceiver,
    queued_selection: Option<PathBuf>,
    loader: LoadWorker,
    exporter: ExportWorker,
    estimator: EstimateWorker,
    dirty: bool,
    compare: bool,
    uploaded_revision: Option<u64>,
    raw_histogram: Option<[u32; HISTOGRAM_BINS]>,
    preview: Option<ProcessedImage>,
    preview_generation: u64,
    full_render: Option<(u64, Uniforms, Arc<ProcessedImage>)>,
    estimated_kb: Option<u64>,
    last_export: Option<PathBuf>,
    message: Option<String>,
    error: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("image", &self.image)
            .field("mode", &self.mode)
            .field("dirty", &self.dirty)
            .field("gpu", &self.pipeline.is_some())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Build a session. Without a pipeline the session still tracks state,
    /// but never renders.
    pub fn new(config: AppConfig, pipeline: Option<GpuPipeline>) -> Result<Self> {
        let presets = PresetStore::load(config.presets_file())?;
        let (selector, selections) = navigator::selection_channel();
        Ok(Self {
            uniforms: Uniforms::defaults(),
            undo: UndoStack::new(config.undo_capacity),
            pending: PendingOps::default(),
            mode: EditMode::Develop,
            crop: CropEditor::new(config.drag_threshold_px, config.crop_handle_radius_px),
            rotate: RotateEditor::new(config.rotate_sensitivity, config.max_rotate_angle),
            sliders: SliderEdits::new(config.drag_threshold_px),
            presets,
            selector,
            selections,
            queued_selection: None,
            loader: LoadWorker::new(),
            exporter: ExportWorker::new(),
            estimator: EstimateWorker::new(),
            dirty: false,
            compare: false,
            uploaded_revision: None,
            raw_histogram: None,
            preview: None,
            preview_generation: 0,
            full_render: None,
            estimated_kb: None,
            last_export: None,
            message: None,
            error: None,
            image: None,
            pipeline,
            config,
        })
    }

    // ========== Frame loop ==========

    /// Advance one frame. Returns true when a new preview is available.
    pub fn begin_frame(&mut self) -> bool {
        self.take_selection();
        self.poll_load();
        self.apply_pending();
        self.poll_export();

        let rendered = if self.dirty { self.render() } else { false };
        if let Some(pipeline) = self.pipeline.as_mut() {
            pipeline.poll_histogram();
        }
        rendered
    }

    fn take_selection(&mut self) {
        if let Some(path) = self.selections.take_latest() {
            self.queued_selection = Some(path);
        }
        if self.loader.is_loading() {
            return;
        }
        if let Some(path) = self.queued_selection.take() {
            if let Err(e) = self.loader.start(path) {
                self.fail(e);
            }
        }
    }

    fn poll_load(&mut self) {
        match self.loader.poll() {
            JobPoll::Finished(outcome) => match outcome.result {
                Ok(decoded) => self.install_image(outcome.path, decoded),
                Err(e) => {
                    tracing::error!("❌ Failed to load {}: {e}", outcome.path.display());
                    self.fail(e);
                }
            },
            JobPoll::Lost => self.fail(DecodeError::Corrupt("decoder crashed".to_string())),
            JobPoll::Idle | JobPoll::Running => {}
        }
    }

    fn poll_export(&mut self) {
        let export = self.exporter.poll();
        self.finish_export(export);
        let estimate = self.estimator.poll();
        self.finish_estimate(estimate);
    }

    fn finish_export(&mut self, poll: JobPoll<ExportOutcome>) {
        match poll {
            JobPoll::Finished(outcome) => match outcome.result {
                Ok(bytes) => {
                    self.message = Some(format!(
                        "Exported {} ({} kB)",
                        outcome.path.display(),
                        bytes.div_ceil(1024)
                    ));
                    self.last_export = Some(outcome.path);
                }
                Err(e) => self.fail(e),
            },
            JobPoll::Lost => self.error = Some("export worker crashed".to_string()),
            JobPoll::Idle | JobPoll::Running => {}
        }
    }

    fn finish_estimate(&mut self, poll: JobPoll<std::result::Result<u64, EncodeError>>) {
        match poll {
            JobPoll::Finished(Ok(kb)) => self.estimated_kb = Some(kb),
            JobPoll::Finished(Err(e)) => {
                self.estimated_kb = None;
                self.fail(e);
            }
            JobPoll::Lost => self.error = Some("size estimate worker crashed".to_string()),
            JobPoll::Idle | JobPoll::Running => {}
        }
    }

    /// Apply the staged geometry op, if any. Runs before any render.
    fn apply_pending(&mut self) {
        let Some(op) = self.pending.take() else {
            return;
        };
        let Some(image) = self.image.as_mut() else {
            return;
        };

        match op {
            PendingOp::Undo => {
                let Some(previous) = self.undo.pop() else {
                    tracing::info!("↩️  Nothing to undo");
                    return;
                };
                tracing::info!("↩️  Undo to {}x{}", previous.width, previous.height);
                image.raw = previous;
            }
            op => {
                let Some(next) = op.transform(&image.raw) else {
                    return;
                };
                tracing::info!(
                    "✂️  Applied {}: {}x{} -> {}x{}",
                    op.name(),
                    image.raw.width,
                    image.raw.height,
                    next.width,
                    next.height
                );
                let previous = std::mem::replace(&mut image.raw, next);
                self.undo.push(previous);
            }
        }

        image.revision += 1;
        self.raw_histogram = None;
        self.estimated_kb = None;
        self.crop.reset();
        self.dirty = true;
    }

    /// Upload if needed, render the preview and read it back
    fn render(&mut self) -> bool {
        let uniforms = self.effective_uniforms();
        let view = self.view_transform();
        let (Some(pipeline), Some(image)) = (self.pipeline.as_mut(), self.image.as_ref()) else {
            // Headless: stays dirty until a renderer exists
            return false;
        };

        if self.uploaded_revision != Some(image.revision) {
            if let Err(e) = pipeline.upload_raw(&image.raw) {
                self.dirty = false;
                self.fail(e);
                return false;
            }
            self.uploaded_revision = Some(image.revision);
        }

        let result = pipeline
            .render_preview(&uniforms, view, self.config.max_preview_dimension)
            .and_then(|_| pipeline.read_preview());
        self.dirty = false;
        match result {
            Ok(preview) => {
                self.preview = Some(preview);
                self.preview_generation += 1;
                true
            }
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }

    fn effective_uniforms(&self) -> Uniforms {
        if self.compare {
            let mut original = Uniforms::defaults();
            original.base_exposure = self.uniforms.base_exposure;
            original
        } else {
            self.uniforms
        }
    }

    /// Transient rotation for the current mode
    pub fn view_transform(&self) -> ViewTransform {
        match self.mode {
            EditMode::Crop => ViewTransform {
                quarter_turns: self.crop.view_turns,
                angle: 0.0,
            },
            EditMode::Rotate => ViewTransform {
                quarter_turns: 0,
                angle: self.rotate.angle,
            },
            EditMode::Develop => ViewTransform::default(),
        }
    }

    fn fail(&mut self, error: impl Into<Error>) {
        let error = error.into();
        tracing::error!("❌ {error}");
        self.error = Some(error.to_string());
    }

    // ========== Loading ==========

    /// Queue `path` for loading. Only the newest request per frame is used.
    pub fn request_load(&mut self, path: impl Into<PathBuf>) {
        self.selector.select(path.into());
    }

    /// Sender for the file browser
    pub fn selector(&self) -> SelectionSender {
        self.selector.clone()
    }

    /// Load with a custom decoder, bypassing the selection channel
    pub fn load_with<F>(&mut self, path: impl Into<PathBuf>, decode: F) -> Result<()>
    where
        F: FnOnce(&Path) -> std::result::Result<DecodedRaw, DecodeError> + Send + 'static,
    {
        self.loader.start_with(path.into(), decode)
    }

    /// Make `decoded` the current image
    pub fn install_image(&mut self, path: PathBuf, decoded: DecodedRaw) {
        self.autosave_sidecar();

        let mut uniforms = Uniforms::defaults();
        uniforms.base_exposure = decoded.initial_exposure;
        match presets::load_sidecar(&path, &self.config.sidecar_extension) {
            Ok(Some(saved)) => uniforms = saved,
            Ok(None) => {}
            Err(e) => tracing::warn!("⚠️  Ignoring unreadable sidecar for {}: {e}", path.display()),
        }

        tracing::info!(
            "🖼️  Installed {} ({}x{}, base exposure {:+.2} EV)",
            path.display(),
            decoded.image.width,
            decoded.image.height,
            uniforms.base_exposure
        );

        let revision = self.image.as_ref().map_or(0, |i| i.revision + 1);
        self.image = Some(LoadedImage {
            path,
            raw: decoded.image,
            exif: decoded.exif,
            revision,
        });
        self.uniforms = uniforms;
        self.undo.clear();
        self.pending.take();
        self.mode = EditMode::Develop;
        self.crop.reset();
        self.rotate = RotateEditor::new(self.config.rotate_sensitivity, self.config.max_rotate_angle);
        self.sliders.clear();
        self.compare = false;
        self.uploaded_revision = None;
        self.raw_histogram = None;
        self.full_render = None;
        self.estimated_kb = None;
        self.preview = None;
        self.error = None;
        self.dirty = true;
    }

    fn autosave_sidecar(&mut self) {
        if !self.config.sidecar_autosave || self.uniforms.is_unedited() {
            return;
        }
        if let Err(e) = self.save_sidecar() {
            tracing::warn!("⚠️  Sidecar autosave failed: {e}");
        }
    }

    // ========== Adjustments ==========

    pub fn uniforms(&self) -> &Uniforms {
        &self.uniforms
    }

    /// Set a field through its clamp
    pub fn set_field(&mut self, field: Field, value: f32) {
        self.uniforms.set_clamped(field, value);
        self.dirty = true;
    }

    /// Set a field from its slider position
    pub fn set_slider(&mut self, field: Field, slider: f32) {
        self.uniforms.set_slider(field, slider);
        self.dirty = true;
    }

    pub fn set_hsl_enabled(&mut self, enabled: bool) {
        self.uniforms.hsl_enabled = i32::from(enabled);
        self.dirty = true;
    }

    /// Back to defaults, keeping the image's base exposure
    pub fn reset_adjustments(&mut self) {
        let base = self.uniforms.base_exposure;
        self.uniforms = Uniforms::defaults();
        self.uniforms.base_exposure = base;
        self.sliders.clear();
        self.dirty = true;
        tracing::info!("🔄 Adjustments reset");
    }

    /// Show the unadjusted image while `on`
    pub fn set_compare(&mut self, on: bool) {
        if self.compare != on {
            self.compare = on;
            self.dirty = true;
        }
    }

    pub fn is_comparing(&self) -> bool {
        self.compare
    }

    /// Derive tone offsets from the RAW histogram
    pub fn auto_adjust(&mut self) -> Result<()> {
        let bins = self.raw_histogram()?;
        calculate_auto_settings(&bins, &self.config.auto_adjust).apply(&mut self.uniforms);
        self.dirty = true;
        Ok(())
    }

    fn raw_histogram(&mut self) -> Result<[u32; HISTOGRAM_BINS]> {
        if let Some(bins) = self.raw_histogram {
            return Ok(bins);
        }
        let image = self.image.as_ref().ok_or(ValidationError::NoImage)?;
        let bins = match self.pipeline.as_mut() {
            Some(pipeline) => {
                if self.uploaded_revision != Some(image.revision) {
                    pipeline.upload_raw(&image.raw)?;
                    self.uploaded_revision = Some(image.revision);
                }
                pipeline.compute_raw_histogram()?
            }
            None => histogram::accumulate_raw(&image.raw),
        };
        self.raw_histogram = Some(bins);
        Ok(bins)
    }

    // ========== Slider interaction ==========

    pub fn sliders(&self) -> &SliderEdits {
        &self.sliders
    }

    pub fn slider_press(&mut self, field: Field, x: f32) {
        self.sliders.press(field, x, &self.uniforms);
    }

    pub fn slider_motion(&mut self, field: Field, x: f32, track_width: f32) -> bool {
        let changed = self.sliders.motion(field, x, track_width, &mut self.uniforms);
        self.dirty |= changed;
        changed
    }

    pub fn slider_release(&mut self, field: Field) -> SliderRelease {
        self.sliders.release(field, &self.uniforms)
    }

    pub fn slider_text(&mut self, field: Field, text: &str) {
        self.sliders.set_text(field, text);
    }

    /// Commit typed text. Non-numeric input leaves the value unchanged.
    pub fn slider_commit(&mut self, field: Field) -> bool {
        let committed = self.sliders.commit(field, &mut self.uniforms);
        self.dirty |= committed;
        committed
    }

    pub fn slider_cancel(&mut self, field: Field) {
        self.sliders.cancel(field);
    }

    // ========== Geometry ==========

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: EditMode) {
        if self.mode == mode {
            return;
        }
        if self.mode == EditMode::Crop {
            self.crop.reset();
        }
        self.rotate.angle = 0.0;
        self.mode = mode;
        self.dirty = true;
    }

    pub fn crop_editor(&self) -> &CropEditor {
        &self.crop
    }

    pub fn rotate_editor(&self) -> &RotateEditor {
        &self.rotate
    }

    /// Size of the frame shown while cropping (after the view rotation)
    pub fn crop_frame_size(&self) -> Option<(u32, u32)> {
        let (w, h) = self.image_size()?;
        Some(if self.crop.view_turns % 2 == 1 { (h, w) } else { (w, h) })
    }

    pub fn crop_press(&mut self, point: (f32, f32), viewport: &ImageViewport) {
        self.crop.press(point, viewport);
    }

    pub fn crop_motion(&mut self, point: (f32, f32), viewport: &ImageViewport) -> bool {
        let Some(size) = self.crop_frame_size() else {
            return false;
        };
        self.crop.motion(point, viewport, size)
    }

    pub fn crop_release(&mut self) -> bool {
        self.crop.release()
    }

    pub fn set_crop_aspect(&mut self, aspect: CropAspect) {
        if let Some(size) = self.crop_frame_size() {
            self.crop.set_aspect(aspect, size);
        }
    }

    /// Rotate the crop-mode preview by quarter turns
    pub fn rotate_crop_view(&mut self, turns: i32) {
        self.crop.rotate_view(turns);
        self.dirty = true;
    }

    /// Stage the crop (with its view rotation) for the next frame
    pub fn commit_crop(&mut self) -> Result<()> {
        self.image.as_ref().ok_or(ValidationError::NoImage)?;
        self.pending.queue(self.crop.commit())?;
        self.mode = EditMode::Develop;
        Ok(())
    }

    /// Stage a quarter-turn rotation for the next frame
    pub fn rotate_quarter(&mut self, turns: i32) -> Result<()> {
        self.image.as_ref().ok_or(ValidationError::NoImage)?;
        self.pending.queue(PendingOp::Rotate(Rotation::Quarter(turns)))?;
        Ok(())
    }

    pub fn rotate_begin(&mut self, x: f32) {
        self.rotate.begin(x);
    }

    pub fn rotate_motion(&mut self, x: f32) -> bool {
        let changed = self.rotate.motion(x);
        self.dirty |= changed;
        changed
    }

    /// Finish the rotate drag and stage the accumulated angle
    pub fn rotate_end(&mut self) -> Result<()> {
        if let Some(op) = self.rotate.end() {
            self.pending.queue(op)?;
        }
        self.dirty = true;
        Ok(())
    }

    /// Stage an undo for the next frame. Undo with no history is a no-op.
    pub fn request_undo(&mut self) -> Result<()> {
        self.pending.queue(PendingOp::Undo)?;
        Ok(())
    }

    /// Stage an arbitrary geometry op
    pub fn queue_op(&mut self, op: PendingOp) -> Result<()> {
        self.pending.queue(op)?;
        Ok(())
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    // ========== Presets and sidecars ==========

    pub fn presets(&self) -> &[Preset] {
        self.presets.presets()
    }

    /// Save the current adjustments under `name`. Empty names are ignored.
    pub fn save_preset(&mut self, name: &str) -> Result<bool> {
        let saved = self.presets.save(name, &self.uniforms)?;
        if saved {
            self.message = Some(format!("Saved preset {}", name.trim()));
        }
        Ok(saved)
    }

    /// Replace the adjustments with a preset's, keeping this image's base
    /// exposure
    pub fn apply_preset(&mut self, name: &str) -> Result<()> {
        let preset = self
            .presets
            .get(name)
            .ok_or_else(|| ValidationError::UnknownPreset(name.to_string()))?;
        let base_exposure = self.uniforms.base_exposure;
        self.uniforms = preset.uniforms;
        self.uniforms.base_exposure = base_exposure;
        self.dirty = true;
        tracing::info!("🎨 Applied preset {name}");
        Ok(())
    }

    pub fn delete_preset(&mut self, name: &str) -> Result<bool> {
        self.presets.delete(name)
    }

    /// Reload presets from disk
    pub fn reload_presets(&mut self) -> Result<()> {
        self.presets = PresetStore::load(self.presets.path().to_path_buf())?;
        Ok(())
    }

    pub fn save_sidecar(&self) -> Result<PathBuf> {
        let image = self.image.as_ref().ok_or(ValidationError::NoImage)?;
        presets::save_sidecar(&image.path, &self.config.sidecar_extension, &self.uniforms)
    }

    /// Replace the adjustments with the sidecar's. Returns false if there is none.
    pub fn load_sidecar(&mut self) -> Result<bool> {
        let image = self.image.as_ref().ok_or(ValidationError::NoImage)?;
        match presets::load_sidecar(&image.path, &self.config.sidecar_extension)? {
            Some(uniforms) => {
                self.uniforms = uniforms;
                self.dirty = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ========== Export ==========

    /// Full-resolution render of the current state, cached until the image
    /// or the adjustments change
    pub fn render_full(&mut self) -> Result<Arc<ProcessedImage>> {
        let image = self.image.as_ref().ok_or(ValidationError::NoImage)?;
        if let Some((revision, uniforms, rendered)) = &self.full_render {
            if *revision == image.revision && *uniforms == self.uniforms {
                return Ok(Arc::clone(rendered));
            }
        }

        let pipeline = self.pipeline.as_mut().ok_or(GpuResourceError::Unavailable)?;
        if self.uploaded_revision != Some(image.revision) {
            pipeline.upload_raw(&image.raw)?;
            self.uploaded_revision = Some(image.revision);
        }
        let rendered = Arc::new(pipeline.render_full(&self.uniforms)?);
        self.full_render = Some((image.revision, self.uniforms, Arc::clone(&rendered)));
        Ok(rendered)
    }

    /// Start a trial encode for the size readout
    pub fn request_estimate(&mut self, options: ExportOptions) -> Result<()> {
        if self.exporter.is_exporting() {
            return Err(ValidationError::Busy("export").into());
        }
        self.estimator.check_idle()?;
        let rendered = self.render_full()?;
        self.estimated_kb = None;
        self.estimator.start(rendered, options)
    }

    /// Start writing the current state to `path`
    pub fn request_export(&mut self, path: impl Into<PathBuf>, options: ExportOptions) -> Result<()> {
        if self.estimator.is_estimating() {
            return Err(ValidationError::Busy("size estimate").into());
        }
        self.exporter.check_idle()?;
        let rendered = self.render_full()?;
        self.exporter.start(rendered, options, path.into())
    }

    // ========== Read access ==========

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn has_gpu(&self) -> bool {
        self.pipeline.is_some()
    }

    pub fn image(&self) -> Option<&LoadedImage> {
        self.image.as_ref()
    }

    pub fn image_size(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(|i| (i.raw.width, i.raw.height))
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Last rendered preview and a counter that changes with every render
    pub fn preview(&self) -> Option<(&ProcessedImage, u64)> {
        self.preview.as_ref().map(|p| (p, self.preview_generation))
    }

    /// Smoothed histogram; `None` until the first readback completes
    pub fn histogram(&self) -> Option<&DisplayHistogram> {
        self.pipeline.as_ref().and_then(|p| p.histogram())
    }

    /// Unsmoothed bin counts of the last completed readback
    pub fn histogram_counts(&self) -> Option<&HistogramCounts> {
        self.pipeline.as_ref().and_then(|p| p.histogram_counts())
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            is_loading: self.loader.is_loading(),
            loading_path: self.loader.pending_path().map(Path::to_path_buf),
            is_exporting: self.exporter.is_exporting(),
            export_progress: self.exporter.progress(),
            is_estimating: self.estimator.is_estimating(),
            estimated_size_kb: self.estimated_kb,
            image_dirty: self.dirty,
            undo_depth: self.undo.len(),
            geometry_pending: self.pending.is_pending(),
            histogram_ready: self.histogram().is_some(),
            last_export: self.last_export.clone(),
            message: self.message.clone(),
            error: self.error.clone(),
        }
    }

    /// Consume the pending error, else the pending info message
    pub fn take_notice(&mut self) -> Option<String> {
        self.error.take().or_else(|| self.message.take())
    }

    /// Block until background loads, exports and estimates finish, then
    /// run one frame. For shutdown and tests.
    pub fn settle(&mut self) -> bool {
        if let JobPoll::Finished(outcome) = self.loader.wait() {
            match outcome.result {
                Ok(decoded) => self.install_image(outcome.path, decoded),
                Err(e) => self.fail(e),
            }
        }
        let estimate = self.estimator.wait();
        self.finish_estimate(estimate);
        let export = self.exporter.wait();
        self.finish_export(export);
        if let Some(pipeline) = self.pipeline.as_mut() {
            pipeline.wait_histogram();
        }
        self.begin_frame()
    }

    /// Write the sidecar if autosave is on. Call before exiting.
    pub fn shutdown(&mut self) {
        self.autosave_sidecar();
    }
}
