//! Invariants of the adjustment model, geometry and histogram helpers

use raw_darkroom::gpu::histogram::{accumulate_processed, HISTOGRAM_CHANNELS};
use raw_darkroom::state::geometry::{CropEditor, CropHandle, CropRect, ImageViewport};
use raw_darkroom::state::uniforms::{clamp, from_slider, to_slider, HslChannel, SliderMapping};
use raw_darkroom::state::UndoStack;
use raw_darkroom::{Field, ProcessedImage, RawImage, Uniforms};

fn edited() -> Uniforms {
    let mut u = Uniforms::defaults();
    u.exposure = 1.25;
    u.contrast = -0.3;
    u.highlights = -0.6;
    u.temperature = 0.2;
    u.vignette_strength = -0.125;
    u.grain_amount = 0.02;
    u.base_exposure = 0.7;
    u.hsl_enabled = 1;
    u.set_clamped(Field::Hsl { band: 4, channel: HslChannel::Saturation }, -0.4);
    u.set_clamped(Field::Hsl { band: 14, channel: HslChannel::Hue }, 0.15);
    u
}

#[test]
fn serialized_uniforms_read_back_identically() {
    let original = edited();
    let restored = Uniforms::deserialize(&original.serialize());
    for field in Uniforms::fields() {
        assert!(
            (original.get(field) - restored.get(field)).abs() <= 1e-6,
            "{} differs",
            field.key()
        );
    }
    assert_eq!(original.hsl_enabled, restored.hsl_enabled);
}

#[test]
fn cubic_slider_mapping_inverts() {
    for scale in [1.0f32, 4.0] {
        let mapping = SliderMapping::Cubic { scale };
        for x in [-0.25f32, -0.01, 0.0, 0.003, 0.1, 0.25] {
            let back = from_slider(to_slider(x, mapping), mapping);
            assert!((back - x).abs() < 1e-5, "scale {scale}, x {x}: {back}");
        }
    }
}

#[test]
fn clamped_values_stay_inside_slider_range() {
    for field in [Field::VignetteStrength, Field::GrainAmount, Field::Exposure] {
        let spec = field.spec();
        for value in [-1e6, -3.0, 0.5, 3.0, 1e6] {
            let slider = to_slider(clamp(field, value), spec.mapping);
            assert!(slider >= spec.min - 1e-4 && slider <= spec.max + 1e-4);
        }
    }
}

#[test]
fn undo_stack_evicts_oldest_first() {
    let mut stack = UndoStack::new(10);
    for i in 0..11u32 {
        stack.push(RawImage::filled(i + 1, 1, [0, 0, 0, 65535]));
    }
    assert_eq!(stack.len(), 10);
    let widths: Vec<u32> = std::iter::from_fn(|| stack.pop()).map(|s| s.width).collect();
    assert_eq!(widths, (2..=11).rev().collect::<Vec<_>>());
}

#[test]
fn crop_edits_keep_rect_ordered_and_in_bounds() {
    let viewport = ImageViewport {
        origin: (0.0, 0.0),
        size: (400.0, 300.0),
    };
    let mut editor = CropEditor::new(3.0, 16.0);
    let gestures = [
        ((0.0, 0.0), (500.0, 450.0)),
        ((400.0, 300.0), (-80.0, -40.0)),
        ((200.0, 150.0), (900.0, 900.0)),
        ((0.0, 300.0), (399.0, 1.0)),
    ];
    for (press, release) in gestures {
        editor.press(press, &viewport);
        editor.motion(release, &viewport, (4000, 3000));
        editor.release();
        let r = editor.rect;
        assert!(0.0 <= r.left && r.left < r.right && r.right <= 1.0, "{r:?}");
        assert!(0.0 <= r.top && r.top < r.bottom && r.bottom <= 1.0, "{r:?}");
    }

    let flipped = CropRect::new(0.9, 1.4, -0.2, 0.3)
        .with_corner(CropHandle::CORNERS[0], (2.0, -1.0), None)
        .normalized();
    assert!(flipped.left < flipped.right && flipped.top < flipped.bottom);
}

#[test]
fn histogram_counts_every_pixel() {
    let (w, h) = (37u32, 23u32);
    let data: Vec<u16> = (0..w * h)
        .flat_map(|i| {
            let v = (i * 211 % 65536) as u16;
            [v, 65535 - v, v / 3, 65535]
        })
        .collect();
    let image = ProcessedImage::new(data, w, h).unwrap();
    let counts = accumulate_processed(&image);
    for channel in 0..HISTOGRAM_CHANNELS {
        assert_eq!(counts.total(channel), u64::from(w * h));
    }
}
