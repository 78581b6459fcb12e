use iced::widget::{
    button, canvas, checkbox, column, container, horizontal_rule, image, pick_list, row, scrollable,
    stack, text, text_input, Column,
};
use iced::{keyboard, time, Alignment, ContentFit, Element, Length, Subscription, Task, Theme};
use rfd::FileDialog;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use raw_darkroom::export::{BitDepth, ChromaSubsampling, ExportFormat, ExportOptions, ResizeTarget, TiffCompression};
use raw_darkroom::gpu::{GpuContext, GpuPipeline};
use raw_darkroom::navigator;
use raw_darkroom::state::geometry::{CropAspect, ImageViewport};
use raw_darkroom::state::slider::{display_value, SliderRelease};
use raw_darkroom::state::uniforms::{to_slider, HSL_BANDS};
use raw_darkroom::{AppConfig, EditMode, Field, Session};

mod ui;

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

const TONE: [Field; 7] = [
    Field::Exposure,
    Field::Contrast,
    Field::Highlights,
    Field::Shadows,
    Field::Whites,
    Field::Blacks,
    Field::Clarity,
];
const COLOR: [Field; 5] = [
    Field::Temperature,
    Field::Tint,
    Field::Saturation,
    Field::Vibrance,
    Field::HueOffset,
];
const DETAIL: [Field; 8] = [
    Field::SharpenIntensity,
    Field::DenoiseLuma,
    Field::DenoiseChroma,
    Field::VignetteStrength,
    Field::VignetteSize,
    Field::VignetteFeather,
    Field::GrainAmount,
    Field::GrainSize,
];

/// Main application state
struct Darkroom {
    session: Session,
    /// Last preview as an iced image, rebuilt when a new render lands
    preview: Option<(image::Handle, (u32, u32))>,
    preview_generation: u64,
    files: Vec<PathBuf>,
    preset_name: String,
    selected_preset: Option<String>,
    export: ExportOptions,
    show_hsl: bool,
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    Tick,
    OpenFolder,
    Select(PathBuf),

    SliderPress(Field, f32),
    SliderMotion(Field, f32, f32),
    SliderRelease(Field),
    SliderText(Field, String),
    SliderCommit(Field),
    HslEnabled(bool),
    ShowHsl(bool),

    SetMode(EditMode),
    CropPress((f32, f32), ImageViewport),
    CropMotion((f32, f32), ImageViewport),
    CropRelease,
    CropAspect(CropAspect),
    RotateCropView(i32),
    ApplyCrop,
    RotateQuarter(i32),
    RotateBegin(f32),
    RotateMotion(f32),
    RotateEnd,
    Undo,

    AutoAdjust,
    Reset,
    Compare(bool),

    PresetName(String),
    SavePreset,
    ApplyPreset(String),
    DeletePreset,
    SaveSidecar,

    ExportFormat(ExportFormat),
    JpegQuality(u8),
    Subsampling(ChromaSubsampling),
    Progressive(bool),
    Interlaced(bool),
    TiffCompression(TiffCompression),
    TiffDepth(BitDepth),
    ResizeWidth(String),
    ResizeHeight(String),
    Estimate,
    Export,
}

impl Darkroom {
    fn new(session: Session) -> (Self, Task<Message>) {
        let export = session.config().export;
        let status = if session.has_gpu() {
            "Open a folder to start.".to_string()
        } else {
            "⚠️  No GPU adapter found; previews are disabled.".to_string()
        };
        (
            Darkroom {
                session,
                preview: None,
                preview_generation: 0,
                files: Vec::new(),
                preset_name: String::new(),
                selected_preset: None,
                export,
                show_hsl: false,
                status,
            },
            Task::none(),
        )
    }

    /// Show a failed request in the status line
    fn report<T>(&mut self, result: raw_darkroom::Result<T>) {
        if let Err(e) = result {
            tracing::warn!("⚠️  {e}");
            self.status = e.to_string();
        }
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Tick => {
                if self.session.begin_frame() {
                    if let Some((preview, generation)) = self.session.preview() {
                        if generation != self.preview_generation {
                            let handle = image::Handle::from_rgba(preview.width, preview.height, preview.to_rgba8());
                            self.preview = Some((handle, (preview.width, preview.height)));
                            self.preview_generation = generation;
                        }
                    }
                }
                if let Some(notice) = self.session.take_notice() {
                    self.status = notice;
                }
            }
            Message::OpenFolder => {
                if let Some(folder) = FileDialog::new().set_title("Select Folder with RAW Photos").pick_folder() {
                    self.files = navigator::list_raw_files(&folder, true);
                    self.status = format!("{} RAW files in {}", self.files.len(), folder.display());
                }
            }
            Message::Select(path) => self.session.request_load(path),

            Message::SliderPress(field, x) => self.session.slider_press(field, x),
            Message::SliderMotion(field, x, width) => {
                self.session.slider_motion(field, x, width);
            }
            Message::SliderRelease(field) => {
                if self.session.slider_release(field) == SliderRelease::Click {
                    tracing::debug!("Editing {} as text", field.key());
                }
            }
            Message::SliderText(field, text) => self.session.slider_text(field, &text),
            Message::SliderCommit(field) => {
                self.session.slider_commit(field);
            }
            Message::HslEnabled(on) => self.session.set_hsl_enabled(on),
            Message::ShowHsl(on) => self.show_hsl = on,

            Message::SetMode(mode) => self.session.set_mode(mode),
            Message::CropPress(point, viewport) => self.session.crop_press(point, &viewport),
            Message::CropMotion(point, viewport) => {
                self.session.crop_motion(point, &viewport);
            }
            Message::CropRelease => {
                self.session.crop_release();
            }
            Message::CropAspect(aspect) => self.session.set_crop_aspect(aspect),
            Message::RotateCropView(turns) => self.session.rotate_crop_view(turns),
            Message::ApplyCrop => {
                let result = self.session.commit_crop();
                self.report(result);
            }
            Message::RotateQuarter(turns) => {
                let result = self.session.rotate_quarter(turns);
                self.report(result);
            }
            Message::RotateBegin(x) => self.session.rotate_begin(x),
            Message::RotateMotion(x) => {
                self.session.rotate_motion(x);
            }
            Message::RotateEnd => {
                let result = self.session.rotate_end();
                self.report(result);
            }
            Message::Undo => {
                let result = self.session.request_undo();
                self.report(result);
            }

            Message::AutoAdjust => {
                let result = self.session.auto_adjust();
                self.report(result);
            }
            Message::Reset => self.session.reset_adjustments(),
            Message::Compare(on) => self.session.set_compare(on),

            Message::PresetName(name) => self.preset_name = name,
            Message::SavePreset => {
                let result = self.session.save_preset(&self.preset_name);
                if matches!(result, Ok(true)) {
                    self.selected_preset = Some(self.preset_name.trim().to_string());
                    self.preset_name.clear();
                }
                self.report(result);
            }
            Message::ApplyPreset(name) => {
                let result = self.session.apply_preset(&name);
                self.selected_preset = Some(name);
                self.report(result);
            }
            Message::DeletePreset => {
                if let Some(name) = self.selected_preset.take() {
                    let result = self.session.delete_preset(&name);
                    self.report(result);
                }
            }
            Message::SaveSidecar => match self.session.save_sidecar() {
                Ok(path) => self.status = format!("Saved {}", path.display()),
                Err(e) => self.status = e.to_string(),
            },

            Message::ExportFormat(format) => self.export.format = format,
            Message::JpegQuality(quality) => self.export.jpeg.quality = quality.min(100),
            Message::Subsampling(subsampling) => self.export.jpeg.subsampling = subsampling,
            Message::Progressive(on) => self.export.jpeg.progressive = on,
            Message::Interlaced(on) => self.export.png.interlaced = on,
            Message::TiffCompression(compression) => self.export.tiff.compression = compression,
            Message::TiffDepth(depth) => self.export.tiff.bit_depth = depth,
            Message::ResizeWidth(input) => self.set_resize(Some(&input), None),
            Message::ResizeHeight(input) => self.set_resize(None, Some(&input)),
            Message::Estimate => {
                let result = self.session.request_estimate(self.export);
                self.report(result);
            }
            Message::Export => {
                let Some(path) = self.pick_export_path() else {
                    return Task::none();
                };
                if let Some(format) = ExportFormat::from_path(&path) {
                    self.export.format = format;
                }
                let result = self.session.request_export(path, self.export);
                self.report(result);
            }
        }
        Task::none()
    }

    /// Update one side of the export size. Empty or zero means "keep
    /// proportions"; both sides empty turns resizing off.
    fn set_resize(&mut self, width: Option<&str>, height: Option<&str>) {
        let parse = |input: &str| -> Option<u32> {
            let digits = input.trim();
            if digits.is_empty() {
                Some(0)
            } else {
                digits.parse().ok()
            }
        };
        let mut target = self.export.resize.unwrap_or_default();
        if let Some(w) = width.and_then(parse) {
            target.width = w;
        }
        if let Some(h) = height.and_then(parse) {
            target.height = h;
        }
        self.export.resize = (target != ResizeTarget::default()).then_some(target);
    }

    fn pick_export_path(&self) -> Option<PathBuf> {
        let format = self.export.format;
        let stem = self
            .session
            .image()
            .and_then(|i| i.path.file_stem())
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "export".to_string());
        let path = FileDialog::new()
            .set_title("Export Image")
            .add_filter(format.to_string(), &[format.extension()])
            .set_file_name(format!("{stem}.{}", format.extension()))
            .save_file()?;
        if path.extension().is_some() {
            Some(path)
        } else {
            Some(path.with_extension(format.extension()))
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        row![self.browser(), self.canvas_area(), self.controls()]
            .spacing(10)
            .padding(10)
            .into()
    }

    fn browser(&self) -> Element<Message> {
        let current = self.session.image().map(|i| i.path.clone());
        let loading = self.session.status().loading_path;
        let files = self.files.iter().fold(Column::new().spacing(2), |col, path| {
            let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            let label = if loading.as_ref() == Some(path) {
                format!("⏳ {name}")
            } else if current.as_ref() == Some(path) {
                format!("▶ {name}")
            } else {
                name
            };
            col.push(
                button(text(label).size(13))
                    .on_press(Message::Select(path.clone()))
                    .width(Length::Fill)
                    .style(button::text),
            )
        });

        column![
            button("Open Folder").on_press(Message::OpenFolder).padding(8),
            scrollable(files).height(Length::Fill),
        ]
        .spacing(10)
        .width(220)
        .into()
    }

    fn canvas_area(&self) -> Element<Message> {
        let viewer: Element<Message> = match &self.preview {
            Some((handle, size)) => {
                let crop = self.session.crop_editor();
                let overlay = ui::canvas::GeometryOverlay {
                    mode: self.session.mode(),
                    image_size: *size,
                    crop: crop.rect,
                    angle: self.session.rotate_editor().angle,
                };
                stack![
                    image(handle.clone())
                        .content_fit(ContentFit::Contain)
                        .width(Length::Fill)
                        .height(Length::Fill),
                    canvas(overlay).width(Length::Fill).height(Length::Fill),
                ]
                .into()
            }
            None => container(text("No image").size(20))
                .center_x(Length::Fill)
                .center_y(Length::Fill)
                .into(),
        };

        let info = self
            .session
            .image()
            .map(|i| format!("{}   {}", i.exif.camera_line(), i.exif.location_line()))
            .unwrap_or_default();

        column![
            container(viewer).width(Length::Fill).height(Length::Fill),
            self.geometry_bar(),
            text(info).size(12),
            text(&self.status).size(13),
        ]
        .spacing(8)
        .width(Length::Fill)
        .into()
    }

    fn geometry_bar(&self) -> Element<Message> {
        let mode = self.session.mode();
        let mode_button = |label: &'static str, target: EditMode| {
            let b = button(text(label).size(13)).padding([4, 10]);
            if mode == target {
                b.style(button::primary)
            } else {
                b.style(button::secondary).on_press(Message::SetMode(target))
            }
        };

        let mut bar = row![
            mode_button("Develop", EditMode::Develop),
            mode_button("Crop", EditMode::Crop),
            mode_button("Straighten", EditMode::Rotate),
            button("⟲ 90°").on_press(Message::RotateQuarter(-1)),
            button("⟳ 90°").on_press(Message::RotateQuarter(1)),
            button(text(format!("Undo ({})", self.session.undo_depth()))).on_press(Message::Undo),
        ]
        .spacing(6)
        .align_y(Alignment::Center);

        if mode == EditMode::Crop {
            bar = bar
                .push(pick_list(
                    CropAspect::ALL,
                    Some(self.session.crop_editor().aspect),
                    Message::CropAspect,
                ))
                .push(button("↺").on_press(Message::RotateCropView(-1)))
                .push(button("↻").on_press(Message::RotateCropView(1)))
                .push(button("Apply Crop").on_press(Message::ApplyCrop).style(button::success));
        }
        bar.into()
    }

    fn slider_row(&self, field: Field) -> Element<Message> {
        let uniforms = self.session.uniforms();
        let spec = field.spec();
        let span = (spec.max - spec.min).max(f32::EPSILON);
        let slider = ui::slider::FieldSlider {
            field,
            position: (uniforms.slider_value(field) - spec.min) / span,
            origin: (to_slider(spec.default, spec.mapping) - spec.min) / span,
        };

        let value: Element<Message> = match self.session.sliders().buffer(field) {
            Some(buffer) => text_input("", buffer)
                .on_input(move |s| Message::SliderText(field, s))
                .on_submit(Message::SliderCommit(field))
                .size(12)
                .width(64)
                .into(),
            None => text(display_value(uniforms, field)).size(12).width(64).into(),
        };

        row![
            text(label(field)).size(12).width(110),
            canvas(slider).width(Length::Fill).height(20),
            value,
        ]
        .spacing(6)
        .align_y(Alignment::Center)
        .into()
    }

    fn section<'a>(&'a self, title: &'a str, fields: &[Field]) -> Column<'a, Message> {
        fields
            .iter()
            .fold(column![text(title).size(14)].spacing(4), |col, &field| {
                col.push(self.slider_row(field))
            })
    }

    fn controls(&self) -> Element<Message> {
        let histogram = ui::histogram::HistogramView {
            histogram: self.session.histogram(),
        };

        let actions = row![
            button("Auto").on_press(Message::AutoAdjust),
            button("Reset").on_press(Message::Reset),
            checkbox("Before", self.session.is_comparing()).on_toggle(Message::Compare),
        ]
        .spacing(6)
        .align_y(Alignment::Center);

        let mut hsl = column![row![
            checkbox("HSL", self.session.uniforms().hsl_enabled != 0).on_toggle(Message::HslEnabled),
            checkbox("Show bands", self.show_hsl).on_toggle(Message::ShowHsl),
        ]
        .spacing(10)]
        .spacing(4);
        if self.show_hsl {
            for field in raw_darkroom::Uniforms::fields().skip(Field::SCALARS.len()).take(HSL_BANDS * 3) {
                hsl = hsl.push(self.slider_row(field));
            }
        }

        let adjustments = column![
            self.section("Tone", &TONE),
            horizontal_rule(1),
            self.section("Color", &COLOR),
            hsl,
            horizontal_rule(1),
            self.section("Detail & Effects", &DETAIL),
        ]
        .spacing(8);

        column![
            canvas(histogram).width(Length::Fill).height(110),
            actions,
            scrollable(adjustments).height(Length::Fill),
            horizontal_rule(1),
            self.presets_panel(),
            horizontal_rule(1),
            self.export_panel(),
        ]
        .spacing(8)
        .width(340)
        .into()
    }

    fn presets_panel(&self) -> Element<Message> {
        let names: Vec<String> = self.session.presets().iter().map(|p| p.name.clone()).collect();
        column![
            row![
                pick_list(names, self.selected_preset.clone(), Message::ApplyPreset).placeholder("Presets"),
                button("Delete").on_press_maybe(self.selected_preset.as_ref().map(|_| Message::DeletePreset)),
            ]
            .spacing(6),
            row![
                text_input("Preset name", &self.preset_name)
                    .on_input(Message::PresetName)
                    .on_submit(Message::SavePreset),
                button("Save").on_press(Message::SavePreset),
                button("Sidecar").on_press(Message::SaveSidecar),
            ]
            .spacing(6),
        ]
        .spacing(6)
        .into()
    }

    fn export_panel(&self) -> Element<Message> {
        let status = self.session.status();
        let busy = status.is_exporting || status.is_estimating;

        let mut options = row![pick_list(ExportFormat::ALL, Some(self.export.format), Message::ExportFormat)]
            .spacing(6)
            .align_y(Alignment::Center);
        options = match self.export.format {
            ExportFormat::Jpeg => options
                .push(
                    iced::widget::slider(1..=100u8, self.export.jpeg.quality, Message::JpegQuality).width(90),
                )
                .push(text(format!("Q{}", self.export.jpeg.quality)).size(12))
                .push(pick_list(
                    ChromaSubsampling::ALL,
                    Some(self.export.jpeg.subsampling),
                    Message::Subsampling,
                ))
                .push(checkbox("Progressive", self.export.jpeg.progressive).on_toggle(Message::Progressive)),
            ExportFormat::Png => {
                options.push(checkbox("Interlaced", self.export.png.interlaced).on_toggle(Message::Interlaced))
            }
            ExportFormat::Tiff => options
                .push(pick_list(
                    TiffCompression::ALL,
                    Some(self.export.tiff.compression),
                    Message::TiffCompression,
                ))
                .push(pick_list(BitDepth::ALL, Some(self.export.tiff.bit_depth), Message::TiffDepth)),
        };

        let side = |value: u32| if value == 0 { String::new() } else { value.to_string() };
        let target = self.export.resize.unwrap_or_default();
        let resize = row![
            text("Size").size(12),
            text_input("width", &side(target.width))
                .on_input(Message::ResizeWidth)
                .width(70),
            text("×").size(12),
            text_input("height", &side(target.height))
                .on_input(Message::ResizeHeight)
                .width(70),
        ]
        .spacing(6)
        .align_y(Alignment::Center);

        let size = if status.is_estimating {
            "Estimating…".to_string()
        } else {
            status
                .estimated_size_kb
                .map(|kb| format!("≈ {kb} kB"))
                .unwrap_or_default()
        };
        let progress = if status.is_exporting {
            format!("Exporting {:.0}%", status.export_progress * 100.0)
        } else {
            String::new()
        };

        column![
            options,
            resize,
            row![
                button("Estimate").on_press_maybe((!busy).then_some(Message::Estimate)),
                button("Export…").on_press_maybe((!busy).then_some(Message::Export)),
                text(size).size(12),
                text(progress).size(12),
            ]
            .spacing(6)
            .align_y(Alignment::Center),
        ]
        .spacing(6)
        .into()
    }

    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            time::every(FRAME_INTERVAL).map(|_| Message::Tick),
            keyboard::on_key_press(|key, modifiers| match key.as_ref() {
                keyboard::Key::Character("z") if modifiers.command() => Some(Message::Undo),
                _ => None,
            }),
        ])
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

impl Drop for Darkroom {
    fn drop(&mut self) {
        self.session.shutdown();
    }
}

/// Slider label from the field's text key
fn label(field: Field) -> String {
    let key = field.key();
    let mut words = key.split('_');
    let first = words.next().unwrap_or_default();
    let mut out: String = first
        .chars()
        .take(1)
        .flat_map(char::to_uppercase)
        .chain(first.chars().skip(1))
        .collect();
    for word in words {
        out.push(' ');
        out.push_str(word);
    }
    out
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load_default().unwrap_or_else(|e| {
        tracing::warn!("⚠️  Using default configuration: {e}");
        AppConfig::default()
    });

    // Separate device from iced's; previews come back as CPU images
    let pipeline = match GpuContext::new() {
        Ok(ctx) => {
            tracing::info!("🎨 GPU: {}", ctx.adapter_name);
            Some(GpuPipeline::new(ctx, config.histogram_smoothing))
        }
        Err(e) => {
            tracing::error!("❌ GPU unavailable: {e}");
            None
        }
    };
    let session = Session::new(config, pipeline)?;

    iced::application("RAW Darkroom", Darkroom::update, Darkroom::view)
        .subscription(Darkroom::subscription)
        .theme(Darkroom::theme)
        .centered()
        .run_with(move || Darkroom::new(session))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(dir: &std::path::Path) -> Darkroom {
        let config = AppConfig {
            presets_path: Some(dir.join("presets.json")),
            ..AppConfig::default()
        };
        let session = Session::new(config, None).unwrap();
        Darkroom::new(session).0
    }

    #[test]
    fn test_export_panel_messages_reach_options() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        let _ = app.update(Message::Progressive(false));
        let _ = app.update(Message::Interlaced(true));
        let _ = app.update(Message::TiffCompression(TiffCompression::None));
        let _ = app.update(Message::TiffDepth(BitDepth::Sixteen));
        assert!(!app.export.jpeg.progressive);
        assert!(app.export.png.interlaced);
        assert_eq!(app.export.tiff.compression, TiffCompression::None);
        assert_eq!(app.export.tiff.bit_depth, BitDepth::Sixteen);
    }

    #[test]
    fn test_resize_fields() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        let _ = app.update(Message::ResizeWidth("1920".to_string()));
        assert_eq!(app.export.resize, Some(ResizeTarget { width: 1920, height: 0 }));
        let _ = app.update(Message::ResizeHeight("12a".to_string()));
        assert_eq!(app.export.resize, Some(ResizeTarget { width: 1920, height: 0 }));
        let _ = app.update(Message::ResizeWidth(String::new()));
        assert_eq!(app.export.resize, None);
    }
}
