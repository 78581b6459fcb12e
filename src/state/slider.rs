/// Slider interaction context
///
/// Every slider reports its gestures here under its own `Field`, so two
/// sliders can never share an edit buffer. A press that stays within the drag
/// threshold is a click and opens text entry; anything further is a drag that
/// moves the value in slider space.

use std::collections::HashMap;

use crate::state::uniforms::{Field, Uniforms};

/// Decimal places shown in text entry
pub const EDIT_PRECISION: usize = 4;
/// Decimal places shown next to a slider
pub const DISPLAY_PRECISION: usize = 2;

/// How a press on a slider ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliderRelease {
    /// No press was in progress for this slider
    None,
    /// Released without moving past the threshold; text entry is now open
    Click,
    Drag,
}

#[derive(Debug, Clone, Copy)]
struct Press {
    start_x: f32,
    start_slider: f32,
    dragging: bool,
}

#[derive(Debug)]
pub struct SliderEdits {
    presses: HashMap<Field, Press>,
    buffers: HashMap<Field, String>,
    drag_threshold: f32,
}

impl Default for SliderEdits {
    fn default() -> Self {
        Self::new(3.0)
    }
}

impl SliderEdits {
    pub fn new(drag_threshold: f32) -> Self {
        Self {
            presses: HashMap::new(),
            buffers: HashMap::new(),
            drag_threshold,
        }
    }

    pub fn press(&mut self, field: Field, x: f32, uniforms: &Uniforms) {
        self.presses.insert(
            field,
            Press {
                start_x: x,
                start_slider: uniforms.slider_value(field),
                dragging: false,
            },
        );
    }

    /// Pointer motion over a slider `track_width` pixels wide.
    /// Returns `true` when the value changed.
    pub fn motion(&mut self, field: Field, x: f32, track_width: f32, uniforms: &mut Uniforms) -> bool {
        let Some(press) = self.presses.get_mut(&field) else {
            return false;
        };
        let dx = x - press.start_x;
        if !press.dragging && dx.abs() < self.drag_threshold {
            return false;
        }
        press.dragging = true;

        let spec = field.spec();
        let span = spec.max - spec.min;
        let slider = press.start_slider + dx / track_width.max(1.0) * span;
        let before = uniforms.get(field);
        uniforms.set_slider(field, slider);
        uniforms.get(field) != before
    }

    pub fn release(&mut self, field: Field, uniforms: &Uniforms) -> SliderRelease {
        match self.presses.remove(&field) {
            None => SliderRelease::None,
            Some(press) if press.dragging => SliderRelease::Drag,
            Some(_) => {
                self.begin_text(field, uniforms);
                SliderRelease::Click
            }
        }
    }

    /// Open text entry seeded with the current value
    pub fn begin_text(&mut self, field: Field, uniforms: &Uniforms) {
        let text = format!("{:.*}", EDIT_PRECISION, uniforms.get(field));
        self.buffers.insert(field, text);
    }

    pub fn is_editing(&self, field: Field) -> bool {
        self.buffers.contains_key(&field)
    }

    pub fn buffer(&self, field: Field) -> Option<&str> {
        self.buffers.get(&field).map(String::as_str)
    }

    /// Replace the edit text. Ignored unless text entry is open for `field`.
    pub fn set_text(&mut self, field: Field, text: &str) {
        if let Some(buffer) = self.buffers.get_mut(&field) {
            buffer.clear();
            buffer.push_str(text);
        }
    }

    /// Close text entry and write the parsed value through the clamp.
    ///
    /// Returns whether a value was written. No open entry and unparsable
    /// text both return `false` and leave the value as it was.
    pub fn commit(&mut self, field: Field, uniforms: &mut Uniforms) -> bool {
        let Some(text) = self.buffers.remove(&field) else {
            return false;
        };
        match text.trim().parse::<f32>() {
            Ok(value) if value.is_finite() => {
                uniforms.set_clamped(field, value);
                true
            }
            _ => {
                tracing::debug!("Ignoring non-numeric input {text:?} for {}", field.key());
                false
            }
        }
    }

    pub fn cancel(&mut self, field: Field) {
        self.buffers.remove(&field);
    }

    /// Drop all in-progress gestures and entries
    pub fn clear(&mut self) {
        self.presses.clear();
        self.buffers.clear();
    }
}

/// Value as shown beside the slider
pub fn display_value(uniforms: &Uniforms, field: Field) -> String {
    format!("{:.*}", DISPLAY_PRECISION, uniforms.get(field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_opens_text_entry() {
        let mut edits = SliderEdits::new(3.0);
        let mut u = Uniforms::defaults();
        u.exposure = 1.25;

        edits.press(Field::Exposure, 50.0, &u);
        assert!(!edits.motion(Field::Exposure, 51.0, 100.0, &mut u));
        assert_eq!(edits.release(Field::Exposure, &u), SliderRelease::Click);
        assert_eq!(edits.buffer(Field::Exposure), Some("1.2500"));
    }

    #[test]
    fn test_drag_moves_value() {
        let mut edits = SliderEdits::new(3.0);
        let mut u = Uniforms::defaults();

        edits.press(Field::Contrast, 0.0, &u);
        // Track is 200 px over a span of 2.0
        assert!(edits.motion(Field::Contrast, 50.0, 200.0, &mut u));
        assert!((u.contrast - 0.5).abs() < 1e-6);
        assert!(edits.motion(Field::Contrast, 1000.0, 200.0, &mut u));
        assert_eq!(u.contrast, 1.0);
        assert_eq!(edits.release(Field::Contrast, &u), SliderRelease::Drag);
        assert!(!edits.is_editing(Field::Contrast));
    }

    #[test]
    fn test_sliders_do_not_share_buffers() {
        let mut edits = SliderEdits::default();
        let mut u = Uniforms::defaults();
        edits.begin_text(Field::Exposure, &u);
        edits.begin_text(Field::Shadows, &u);
        edits.set_text(Field::Exposure, "2");
        edits.set_text(Field::Shadows, "-0.5");
        edits.set_text(Field::Tint, "1");

        assert!(edits.commit(Field::Exposure, &mut u));
        assert!(edits.commit(Field::Shadows, &mut u));
        assert!(!edits.commit(Field::Tint, &mut u));
        assert_eq!(u.exposure, 2.0);
        assert_eq!(u.shadows, -0.5);
        assert_eq!(u.tint, 0.0);
    }

    #[test]
    fn test_invalid_text_leaves_value() {
        let mut edits = SliderEdits::default();
        let mut u = Uniforms::defaults();
        u.saturation = 0.3;
        edits.begin_text(Field::Saturation, &u);
        edits.set_text(Field::Saturation, "lots");

        assert!(!edits.commit(Field::Saturation, &mut u));
        assert_eq!(u.saturation, 0.3);
        assert!(!edits.is_editing(Field::Saturation));

        edits.begin_text(Field::Exposure, &u);
        edits.set_text(Field::Exposure, "abc");
        assert!(!edits.commit(Field::Exposure, &mut u));
        assert_eq!(u.exposure, 0.0);
    }

    #[test]
    fn test_text_entry_is_clamped() {
        let mut edits = SliderEdits::default();
        let mut u = Uniforms::defaults();
        edits.begin_text(Field::Exposure, &u);
        edits.set_text(Field::Exposure, " 12 ");
        assert!(edits.commit(Field::Exposure, &mut u));
        assert_eq!(u.exposure, 5.0);
        assert_eq!(display_value(&u, Field::Exposure), "5.00");
    }
}
