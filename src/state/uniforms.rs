/// Adjustment parameters for the development pipeline
///
/// `Uniforms` is uploaded to the GPU byte-for-byte, so its field order and
/// padding must match the WGSL `Uniforms` struct in `gpu::shaders`: 24 scalar
/// floats, the HSL enable flag, 12 bytes of padding so the HSL array starts on
/// a 16-byte boundary, 15 `vec4` HSL bands and a trailing `vec3` pad.
/// Total: 368 bytes.
///
/// The record itself never clamps. Valid ranges are enforced where values
/// come in (slider edits, text entry, sidecar/preset parsing) through
/// [`clamp`] and [`Uniforms::set_clamped`].

use std::fmt::Write as _;

pub const HSL_BANDS: usize = 15;

/// Degrees between HSL band centers
pub const HSL_BAND_SPACING: f32 = 360.0 / HSL_BANDS as f32;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Uniforms {
    // ========== Tone ==========
    /// Exposure in stops (-5.0 to +5.0)
    pub exposure: f32,
    /// Log-space contrast around `contrast_pivot` (-1.0 to +1.0)
    pub contrast: f32,
    pub highlights: f32,
    pub shadows: f32,
    pub whites: f32,
    pub blacks: f32,

    // ========== Color ==========
    pub saturation: f32,
    pub vibrance: f32,
    /// Global hue rotation in degrees
    pub hue_offset: f32,
    pub temperature: f32,
    pub tint: f32,

    // ========== Effects ==========
    pub vignette_strength: f32,
    pub vignette_feather: f32,
    pub vignette_size: f32,
    pub grain_amount: f32,
    /// Grain feature size in pixels
    pub grain_size: f32,
    /// Mid-frequency local contrast
    pub clarity: f32,
    pub denoise_luma: f32,
    pub denoise_chroma: f32,
    pub sharpen_intensity: f32,

    /// Per-image exposure compensation estimated at load time
    pub base_exposure: f32,

    // Constants (passed as uniforms for consistency)
    pub contrast_pivot: f32,
    pub blacks_scale: f32,
    pub whites_scale: f32,

    /// 0 or 1
    pub hsl_enabled: i32,
    pub _pad_hsl: [u32; 3],
    /// x = hue shift, y = saturation, z = luminance, w unused
    pub hsl_adjustments: [[f32; 4]; HSL_BANDS],
    pub _padding: [f32; 4],
}

impl Default for Uniforms {
    fn default() -> Self {
        Self::defaults()
    }
}

/// How a slider position maps to the stored value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SliderMapping {
    /// Slider value is the stored value
    Linear,
    /// `actual = sign(s) * |s|^3 / scale`, finer control near zero
    Cubic { scale: f32 },
}

/// Static description of one adjustable field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    /// Slider-space bounds
    pub min: f32,
    pub max: f32,
    /// Default stored value
    pub default: f32,
    pub mapping: SliderMapping,
}

impl FieldSpec {
    const fn linear(min: f32, max: f32, default: f32) -> Self {
        Self { min, max, default, mapping: SliderMapping::Linear }
    }

    const fn cubic(min: f32, max: f32, scale: f32) -> Self {
        Self { min, max, default: 0.0, mapping: SliderMapping::Cubic { scale } }
    }

    const fn fixed(value: f32) -> Self {
        Self::linear(value, value, value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HslChannel {
    Hue,
    Saturation,
    Luminance,
}

impl HslChannel {
    pub const ALL: [HslChannel; 3] = [HslChannel::Hue, HslChannel::Saturation, HslChannel::Luminance];

    fn index(self) -> usize {
        match self {
            HslChannel::Hue => 0,
            HslChannel::Saturation => 1,
            HslChannel::Luminance => 2,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            HslChannel::Hue => "hue",
            HslChannel::Saturation => "sat",
            HslChannel::Luminance => "lum",
        }
    }
}

/// Identity of one numeric field in [`Uniforms`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Exposure,
    Contrast,
    Highlights,
    Shadows,
    Whites,
    Blacks,
    Saturation,
    Vibrance,
    HueOffset,
    Temperature,
    Tint,
    VignetteStrength,
    VignetteFeather,
    VignetteSize,
    GrainAmount,
    GrainSize,
    Clarity,
    DenoiseLuma,
    DenoiseChroma,
    SharpenIntensity,
    BaseExposure,
    ContrastPivot,
    BlacksScale,
    WhitesScale,
    Hsl { band: usize, channel: HslChannel },
}

impl Field {
    /// Every scalar field, in record order
    pub const SCALARS: [Field; 24] = [
        Field::Exposure,
        Field::Contrast,
        Field::Highlights,
        Field::Shadows,
        Field::Whites,
        Field::Blacks,
        Field::Saturation,
        Field::Vibrance,
        Field::HueOffset,
        Field::Temperature,
        Field::Tint,
        Field::VignetteStrength,
        Field::VignetteFeather,
        Field::VignetteSize,
        Field::GrainAmount,
        Field::GrainSize,
        Field::Clarity,
        Field::DenoiseLuma,
        Field::DenoiseChroma,
        Field::SharpenIntensity,
        Field::BaseExposure,
        Field::ContrastPivot,
        Field::BlacksScale,
        Field::WhitesScale,
    ];

    pub fn spec(self) -> FieldSpec {
        match self {
            Field::Exposure => FieldSpec::linear(-5.0, 5.0, 0.0),
            Field::Contrast => FieldSpec::linear(-1.0, 1.0, 0.0),
            Field::Highlights => FieldSpec::linear(-1.0, 1.0, 0.0),
            Field::Shadows => FieldSpec::linear(-1.0, 1.0, 0.0),
            Field::Whites => FieldSpec::linear(-1.0, 1.0, 0.0),
            Field::Blacks => FieldSpec::linear(-1.0, 1.0, 0.0),
            Field::Saturation => FieldSpec::linear(-1.0, 1.0, 0.0),
            Field::Vibrance => FieldSpec::linear(-1.0, 1.0, 0.0),
            Field::HueOffset => FieldSpec::linear(-180.0, 180.0, 0.0),
            Field::Temperature => FieldSpec::linear(-1.0, 1.0, 0.0),
            Field::Tint => FieldSpec::linear(-1.0, 1.0, 0.0),
            Field::VignetteStrength => FieldSpec::cubic(-1.0, 1.0, 1.0),
            Field::VignetteFeather => FieldSpec::linear(0.0, 1.0, 0.5),
            Field::VignetteSize => FieldSpec::linear(0.0, 1.0, 0.5),
            Field::GrainAmount => FieldSpec::cubic(0.0, 1.0, 4.0),
            Field::GrainSize => FieldSpec::linear(0.5, 4.0, 1.5),
            Field::Clarity => FieldSpec::linear(-1.0, 1.0, 0.0),
            Field::DenoiseLuma => FieldSpec::linear(0.0, 1.0, 0.0),
            Field::DenoiseChroma => FieldSpec::linear(0.0, 1.0, 0.0),
            Field::SharpenIntensity => FieldSpec::linear(0.0, 2.0, 0.0),
            Field::BaseExposure => FieldSpec::linear(-5.0, 5.0, 0.0),
            Field::ContrastPivot => FieldSpec::fixed(0.18),
            Field::BlacksScale => FieldSpec::fixed(0.1),
            Field::WhitesScale => FieldSpec::fixed(0.5),
            Field::Hsl { .. } => FieldSpec::linear(-1.0, 1.0, 0.0),
        }
    }

    /// Key used in the key=value text format
    pub fn key(self) -> String {
        let name = match self {
            Field::Exposure => "exposure",
            Field::Contrast => "contrast",
            Field::Highlights => "highlights",
            Field::Shadows => "shadows",
            Field::Whites => "whites",
            Field::Blacks => "blacks",
            Field::Saturation => "saturation",
            Field::Vibrance => "vibrance",
            Field::HueOffset => "hue_offset",
            Field::Temperature => "temperature",
            Field::Tint => "tint",
            Field::VignetteStrength => "vignette_strength",
            Field::VignetteFeather => "vignette_feather",
            Field::VignetteSize => "vignette_size",
            Field::GrainAmount => "grain_amount",
            Field::GrainSize => "grain_size",
            Field::Clarity => "clarity",
            Field::DenoiseLuma => "denoise_luma",
            Field::DenoiseChroma => "denoise_chroma",
            Field::SharpenIntensity => "sharpen_intensity",
            Field::BaseExposure => "base_exposure",
            Field::ContrastPivot => "contrast_pivot",
            Field::BlacksScale => "blacks_scale",
            Field::WhitesScale => "whites_scale",
            Field::Hsl { band, channel } => return format!("hsl_{band}_{}", channel.suffix()),
        };
        name.to_string()
    }

    pub fn from_key(key: &str) -> Option<Field> {
        if let Some(rest) = key.strip_prefix("hsl_") {
            let (band, suffix) = rest.split_once('_')?;
            let band: usize = band.parse().ok()?;
            if band >= HSL_BANDS {
                return None;
            }
            let channel = HslChannel::ALL.into_iter().find(|c| c.suffix() == suffix)?;
            return Some(Field::Hsl { band, channel });
        }
        Field::SCALARS.into_iter().find(|f| f.key() == key)
    }

    /// Constants are carried in the record but never user-editable
    pub fn is_constant(self) -> bool {
        matches!(self, Field::ContrastPivot | Field::BlacksScale | Field::WhitesScale)
    }
}

/// Slider position to stored value
pub fn from_slider(slider: f32, mapping: SliderMapping) -> f32 {
    match mapping {
        SliderMapping::Linear => slider,
        SliderMapping::Cubic { scale } => slider.signum() * slider.abs().powi(3) / scale,
    }
}

/// Stored value to slider position
pub fn to_slider(actual: f32, mapping: SliderMapping) -> f32 {
    match mapping {
        SliderMapping::Linear => actual,
        SliderMapping::Cubic { scale } => (actual * scale).cbrt(),
    }
}

/// Map an edited value into the field's valid range.
///
/// Bounds are the slider limits pushed through the mapping. Both mappings are
/// monotonic, so this equals clamping in slider space while leaving in-range
/// values bit-exact.
pub fn clamp(field: Field, value: f32) -> f32 {
    let spec = field.spec();
    if !value.is_finite() {
        return spec.default;
    }
    let lo = from_slider(spec.min, spec.mapping);
    let hi = from_slider(spec.max, spec.mapping);
    value.clamp(lo, hi)
}

impl Uniforms {
    /// Baseline values: identity exposure, zero offsets, tonemap pivot at mid-gray
    pub fn defaults() -> Self {
        let mut u: Uniforms = bytemuck::Zeroable::zeroed();
        for field in Field::SCALARS {
            *u.field_mut(field) = field.spec().default;
        }
        u.hsl_enabled = 1;
        u
    }

    pub fn get(&self, field: Field) -> f32 {
        match field {
            Field::Exposure => self.exposure,
            Field::Contrast => self.contrast,
            Field::Highlights => self.highlights,
            Field::Shadows => self.shadows,
            Field::Whites => self.whites,
            Field::Blacks => self.blacks,
            Field::Saturation => self.saturation,
            Field::Vibrance => self.vibrance,
            Field::HueOffset => self.hue_offset,
            Field::Temperature => self.temperature,
            Field::Tint => self.tint,
            Field::VignetteStrength => self.vignette_strength,
            Field::VignetteFeather => self.vignette_feather,
            Field::VignetteSize => self.vignette_size,
            Field::GrainAmount => self.grain_amount,
            Field::GrainSize => self.grain_size,
            Field::Clarity => self.clarity,
            Field::DenoiseLuma => self.denoise_luma,
            Field::DenoiseChroma => self.denoise_chroma,
            Field::SharpenIntensity => self.sharpen_intensity,
            Field::BaseExposure => self.base_exposure,
            Field::ContrastPivot => self.contrast_pivot,
            Field::BlacksScale => self.blacks_scale,
            Field::WhitesScale => self.whites_scale,
            Field::Hsl { band, channel } => self.hsl_adjustments[band][channel.index()],
        }
    }

    pub fn field_mut(&mut self, field: Field) -> &mut f32 {
        match field {
            Field::Exposure => &mut self.exposure,
            Field::Contrast => &mut self.contrast,
            Field::Highlights => &mut self.highlights,
            Field::Shadows => &mut self.shadows,
            Field::Whites => &mut self.whites,
            Field::Blacks => &mut self.blacks,
            Field::Saturation => &mut self.saturation,
            Field::Vibrance => &mut self.vibrance,
            Field::HueOffset => &mut self.hue_offset,
            Field::Temperature => &mut self.temperature,
            Field::Tint => &mut self.tint,
            Field::VignetteStrength => &mut self.vignette_strength,
            Field::VignetteFeather => &mut self.vignette_feather,
            Field::VignetteSize => &mut self.vignette_size,
            Field::GrainAmount => &mut self.grain_amount,
            Field::GrainSize => &mut self.grain_size,
            Field::Clarity => &mut self.clarity,
            Field::DenoiseLuma => &mut self.denoise_luma,
            Field::DenoiseChroma => &mut self.denoise_chroma,
            Field::SharpenIntensity => &mut self.sharpen_intensity,
            Field::BaseExposure => &mut self.base_exposure,
            Field::ContrastPivot => &mut self.contrast_pivot,
            Field::BlacksScale => &mut self.blacks_scale,
            Field::WhitesScale => &mut self.whites_scale,
            Field::Hsl { band, channel } => &mut self.hsl_adjustments[band][channel.index()],
        }
    }

    /// Store `value` after clamping it into the field's range
    pub fn set_clamped(&mut self, field: Field, value: f32) {
        *self.field_mut(field) = clamp(field, value);
    }

    /// Current value in slider space
    pub fn slider_value(&self, field: Field) -> f32 {
        to_slider(self.get(field), field.spec().mapping)
    }

    /// Set from a slider position, clamped to the slider bounds
    pub fn set_slider(&mut self, field: Field, slider: f32) {
        let spec = field.spec();
        if !slider.is_finite() {
            return;
        }
        *self.field_mut(field) = from_slider(slider.clamp(spec.min, spec.max), spec.mapping);
    }

    /// Every numeric field including the HSL bands, in serialization order
    pub fn fields() -> impl Iterator<Item = Field> {
        Field::SCALARS.into_iter().chain((0..HSL_BANDS).flat_map(|band| {
            HslChannel::ALL
                .into_iter()
                .map(move |channel| Field::Hsl { band, channel })
        }))
    }

    /// Check if this represents an unedited image (base exposure aside)
    pub fn is_unedited(&self) -> bool {
        let mut defaults = Self::defaults();
        defaults.base_exposure = self.base_exposure;
        *self == defaults
    }

    /// Flat key=value text, one line per field
    pub fn serialize(&self) -> String {
        let mut out = String::with_capacity(2048);
        for field in Self::fields() {
            let _ = writeln!(out, "{}={}", field.key(), self.get(field));
        }
        let _ = writeln!(out, "hsl_enabled={}", self.hsl_enabled);
        out
    }

    /// Parse key=value text onto the defaults.
    ///
    /// Unknown keys are ignored, missing keys keep their default and every
    /// value goes through [`clamp`].
    pub fn deserialize(text: &str) -> Self {
        let mut u = Self::defaults();
        u.apply_text(text);
        u
    }

    /// Overlay key=value text onto this record
    pub fn apply_text(&mut self, text: &str) {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                tracing::warn!("⚠️  Ignoring malformed line: {line}");
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            if key == "hsl_enabled" {
                match value {
                    "1" | "true" => self.hsl_enabled = 1,
                    "0" | "false" => self.hsl_enabled = 0,
                    _ => tracing::warn!("⚠️  Ignoring hsl_enabled={value}"),
                }
                continue;
            }

            let Some(field) = Field::from_key(key) else {
                tracing::debug!("Skipping unknown key {key}");
                continue;
            };
            match value.parse::<f32>() {
                Ok(v) if v.is_finite() => self.set_clamped(field, v),
                _ => tracing::warn!("⚠️  Ignoring non-numeric value for {key}: {value}"),
            }
        }
    }

    /// Raw bytes as uploaded to the GPU
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_layout() {
        assert_eq!(std::mem::size_of::<Uniforms>(), 368);
        assert_eq!(std::mem::offset_of!(Uniforms, hsl_enabled), 96);
        assert_eq!(std::mem::offset_of!(Uniforms, hsl_adjustments), 112);
        assert_eq!(std::mem::offset_of!(Uniforms, _padding), 352);
    }

    #[test]
    fn test_default_is_unedited() {
        let u = Uniforms::defaults();
        assert!(u.is_unedited());
        assert_eq!(u.exposure, 0.0);
        assert_eq!(u.contrast_pivot, 0.18);
        assert_eq!(u.hsl_enabled, 1);
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut u = Uniforms::defaults();
        u.exposure = 1.25;
        u.contrast = -0.3;
        u.hue_offset = 42.5;
        u.vignette_strength = -0.216;
        u.grain_amount = 0.1;
        u.base_exposure = 0.7;
        u.hsl_adjustments[3] = [0.5, -0.25, 0.125, 0.0];
        u.hsl_adjustments[14] = [-1.0, 1.0, 0.3333, 0.0];
        u.hsl_enabled = 0;

        let text = u.serialize();
        let restored = Uniforms::deserialize(&text);

        for field in Uniforms::fields() {
            assert!(
                (u.get(field) - restored.get(field)).abs() < 1e-6,
                "{} differs",
                field.key()
            );
        }
        assert_eq!(restored.hsl_enabled, 0);
        assert_eq!(u, restored);
    }

    #[test]
    fn test_unknown_keys_ignored_and_missing_default() {
        let u = Uniforms::deserialize("exposure=2\nfuture_knob=7\nnot a line\nshadows=abc\n");
        assert_eq!(u.exposure, 2.0);
        assert_eq!(u.shadows, 0.0);
        assert_eq!(u.vignette_size, 0.5);
    }

    #[test]
    fn test_deserialize_clamps() {
        let u = Uniforms::deserialize("exposure=50\ncontrast_pivot=0.5\nhsl_20_hue=1\n");
        assert_eq!(u.exposure, 5.0);
        assert_eq!(u.contrast_pivot, 0.18);
    }

    #[test]
    fn test_cubic_inverse_law() {
        for &scale in &[1.0f32, 4.0, 10.0] {
            for &x in &[-0.9f32, -0.2, -0.001, 0.0, 0.003, 0.05, 0.24] {
                let mapping = SliderMapping::Cubic { scale };
                let back = from_slider(to_slider(x, mapping), mapping);
                assert!((back - x).abs() < 1e-5, "scale {scale} x {x} -> {back}");
            }
        }
    }

    #[test]
    fn test_clamp_in_slider_space() {
        // grain_amount: slider [0, 1], scale 4 -> actual [0, 0.25]
        assert!((clamp(Field::GrainAmount, 10.0) - 0.25).abs() < 1e-6);
        assert_eq!(clamp(Field::GrainAmount, -1.0), 0.0);
        let s = to_slider(clamp(Field::GrainAmount, 3.0), Field::GrainAmount.spec().mapping);
        assert!(s <= 1.0 + 1e-6 && s >= 0.0);

        assert_eq!(clamp(Field::VignetteStrength, -5.0), -1.0);
        assert_eq!(clamp(Field::Exposure, f32::NAN), 0.0);
    }

    #[test]
    fn test_field_keys_round_trip() {
        for field in Uniforms::fields() {
            assert_eq!(Field::from_key(&field.key()), Some(field));
        }
        assert_eq!(Field::from_key("hsl_15_hue"), None);
        assert_eq!(Field::from_key("hsl_2_xyz"), None);
    }

    #[test]
    fn test_set_slider_cubic() {
        let mut u = Uniforms::defaults();
        u.set_slider(Field::VignetteStrength, -0.5);
        assert!((u.vignette_strength + 0.125).abs() < 1e-6);
        assert!((u.slider_value(Field::VignetteStrength) + 0.5).abs() < 1e-5);
    }
}
