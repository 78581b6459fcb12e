/// Crop and rotation editing
///
/// Geometry edits never touch the image directly. Interaction updates the
/// editor state here, and a commit produces a [`PendingOp`] that the session
/// applies at the start of the next frame, after the GPU is done with the
/// current texture.

use crate::error::ValidationError;
use crate::pixels::RawImage;
use crate::raw::transform::{self, PixelRect};

/// Smallest normalized crop extent in either direction
pub const MIN_CROP_EXTENT: f32 = 0.01;

/// Normalized crop rectangle; `0 <= left < right <= 1`, `0 <= top < bottom <= 1`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Default for CropRect {
    fn default() -> Self {
        Self::FULL
    }
}

impl CropRect {
    pub const FULL: CropRect = CropRect { left: 0.0, top: 0.0, right: 1.0, bottom: 1.0 };

    /// Build from any four coordinates; the result is normalized
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        CropRect { left, top, right, bottom }.normalized()
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn is_full(&self) -> bool {
        *self == Self::FULL
    }

    /// Clamp into [0, 1], order the edges and enforce the minimum extent
    pub fn normalized(self) -> Self {
        let (left, right) = normalize_span(self.left, self.right);
        let (top, bottom) = normalize_span(self.top, self.bottom);
        CropRect { left, top, right, bottom }
    }

    /// Pixel rectangle for an image of the given size
    pub fn to_pixels(&self, width: u32, height: u32) -> PixelRect {
        let x0 = ((self.left * width as f32).round() as u32).min(width.saturating_sub(1));
        let y0 = ((self.top * height as f32).round() as u32).min(height.saturating_sub(1));
        let x1 = ((self.right * width as f32).round() as u32).clamp(x0 + 1, width.max(x0 + 1));
        let y1 = ((self.bottom * height as f32).round() as u32).clamp(y0 + 1, height.max(y0 + 1));
        (x0, y0, x1 - x0, y1 - y0)
    }

    /// Translate without resizing, stopping at the image border
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        let dx = dx.clamp(-self.left, 1.0 - self.right);
        let dy = dy.clamp(-self.top, 1.0 - self.bottom);
        CropRect {
            left: self.left + dx,
            top: self.top + dy,
            right: self.right + dx,
            bottom: self.bottom + dy,
        }
        .normalized()
    }

    fn corner(&self, handle: CropHandle) -> (f32, f32) {
        match handle {
            CropHandle::TopLeft => (self.left, self.top),
            CropHandle::TopRight => (self.right, self.top),
            CropHandle::BottomRight => (self.right, self.bottom),
            CropHandle::BottomLeft | CropHandle::Move => (self.left, self.bottom),
        }
    }

    /// Move one corner to `point`, keeping the opposite corner fixed.
    ///
    /// `ratio` is the width/height ratio in normalized units, if constrained.
    pub fn with_corner(&self, handle: CropHandle, point: (f32, f32), ratio: Option<f32>) -> Self {
        let Some(opposite) = handle.opposite() else {
            return *self;
        };
        if !(point.0.is_finite() && point.1.is_finite()) {
            return *self;
        }
        let (ax, ay) = self.corner(opposite);
        let (px, py) = (point.0.clamp(0.0, 1.0), point.1.clamp(0.0, 1.0));
        let (default_sx, default_sy) = handle.direction();

        let dx = px - ax;
        let dy = py - ay;
        let sx = if dx == 0.0 { default_sx } else { dx.signum() };
        let sy = if dy == 0.0 { default_sy } else { dy.signum() };
        let mut w = dx.abs();
        let mut h = dy.abs();

        if let Some(k) = ratio.filter(|k| k.is_finite() && *k > 0.0) {
            if h == 0.0 || w / h > k {
                w = h * k;
            } else {
                h = w / k;
            }
            let max_w = if sx < 0.0 { ax } else { 1.0 - ax };
            let max_h = if sy < 0.0 { ay } else { 1.0 - ay };
            if w > max_w {
                w = max_w;
                h = w / k;
            }
            if h > max_h {
                h = max_h;
                w = h * k;
            }
        }

        let (cx, cy) = (ax + sx * w, ay + sy * h);
        CropRect::new(ax.min(cx), ay.min(cy), ax.max(cx), ay.max(cy))
    }

    /// Largest rectangle of the given normalized ratio centered in this one
    pub fn fit_ratio(&self, k: f32) -> Self {
        if !(k.is_finite() && k > 0.0) {
            return *self;
        }
        let (cx, cy) = ((self.left + self.right) * 0.5, (self.top + self.bottom) * 0.5);
        let mut w = self.width();
        let mut h = self.height();
        if w / h > k {
            w = h * k;
        } else {
            h = w / k;
        }
        CropRect::new(cx - w * 0.5, cy - h * 0.5, cx + w * 0.5, cy + h * 0.5)
    }
}

fn normalize_span(a: f32, b: f32) -> (f32, f32) {
    let a = if a.is_finite() { a.clamp(0.0, 1.0) } else { 0.0 };
    let b = if b.is_finite() { b.clamp(0.0, 1.0) } else { 1.0 };
    let (mut lo, mut hi) = if a <= b { (a, b) } else { (b, a) };
    if hi - lo < MIN_CROP_EXTENT {
        if lo + MIN_CROP_EXTENT <= 1.0 {
            hi = lo + MIN_CROP_EXTENT;
        } else {
            hi = 1.0;
            lo = 1.0 - MIN_CROP_EXTENT;
        }
    }
    (lo, hi)
}

/// What a pointer press grabbed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropHandle {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
    /// Drag the whole rectangle
    Move,
}

impl CropHandle {
    pub const CORNERS: [CropHandle; 4] = [
        CropHandle::TopLeft,
        CropHandle::TopRight,
        CropHandle::BottomRight,
        CropHandle::BottomLeft,
    ];

    fn opposite(self) -> Option<CropHandle> {
        match self {
            CropHandle::TopLeft => Some(CropHandle::BottomRight),
            CropHandle::TopRight => Some(CropHandle::BottomLeft),
            CropHandle::BottomRight => Some(CropHandle::TopLeft),
            CropHandle::BottomLeft => Some(CropHandle::TopRight),
            CropHandle::Move => None,
        }
    }

    /// Direction from the opposite corner toward this one
    fn direction(self) -> (f32, f32) {
        match self {
            CropHandle::TopLeft => (-1.0, -1.0),
            CropHandle::TopRight => (1.0, -1.0),
            CropHandle::BottomRight => (1.0, 1.0),
            CropHandle::BottomLeft | CropHandle::Move => (-1.0, 1.0),
        }
    }
}

/// Aspect ratio constraints for the crop rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CropAspect {
    #[default]
    Free,
    Square,
    FourThree,
    ThreeTwo,
    SixteenNine,
}

impl CropAspect {
    pub const ALL: [CropAspect; 5] = [
        CropAspect::Free,
        CropAspect::Square,
        CropAspect::FourThree,
        CropAspect::ThreeTwo,
        CropAspect::SixteenNine,
    ];

    /// Pixel width/height ratio, `None` for free
    pub fn ratio(self) -> Option<f32> {
        match self {
            CropAspect::Free => None,
            CropAspect::Square => Some(1.0),
            CropAspect::FourThree => Some(4.0 / 3.0),
            CropAspect::ThreeTwo => Some(3.0 / 2.0),
            CropAspect::SixteenNine => Some(16.0 / 9.0),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CropAspect::Free => "Free",
            CropAspect::Square => "1:1",
            CropAspect::FourThree => "4:3",
            CropAspect::ThreeTwo => "3:2",
            CropAspect::SixteenNine => "16:9",
        }
    }

    /// Ratio in normalized crop units for an image of the given size.
    /// Portrait images use the ratio flipped.
    pub fn normalized_ratio(self, width: u32, height: u32) -> Option<f32> {
        let r = self.ratio()?;
        if width == 0 || height == 0 {
            return None;
        }
        let image_aspect = width as f32 / height as f32;
        let r = if image_aspect < 1.0 { 1.0 / r } else { r };
        Some(r / image_aspect)
    }
}

impl std::fmt::Display for CropAspect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Screen-space placement of the displayed image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageViewport {
    pub origin: (f32, f32),
    pub size: (f32, f32),
}

impl ImageViewport {
    pub fn to_screen(&self, p: (f32, f32)) -> (f32, f32) {
        (self.origin.0 + p.0 * self.size.0, self.origin.1 + p.1 * self.size.1)
    }

    pub fn to_normalized(&self, p: (f32, f32)) -> (f32, f32) {
        (
            (p.0 - self.origin.0) / self.size.0.max(1.0),
            (p.1 - self.origin.1) / self.size.1.max(1.0),
        )
    }

    /// Corner within `radius` pixels, else `Move` if inside the rect
    pub fn hit_test(&self, rect: &CropRect, point: (f32, f32), radius: f32) -> Option<CropHandle> {
        for handle in CropHandle::CORNERS {
            let (cx, cy) = self.to_screen(rect.corner(handle));
            let (dx, dy) = (point.0 - cx, point.1 - cy);
            if dx * dx + dy * dy <= radius * radius {
                return Some(handle);
            }
        }
        let (x0, y0) = self.to_screen((rect.left, rect.top));
        let (x1, y1) = self.to_screen((rect.right, rect.bottom));
        if point.0 >= x0 && point.0 <= x1 && point.1 >= y0 && point.1 <= y1 {
            return Some(CropHandle::Move);
        }
        None
    }
}

/// Crop drag gesture: `Idle -> Armed -> Dragging -> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CropDrag {
    #[default]
    Idle,
    /// Pressed, but not yet past the drag threshold
    Armed {
        handle: Option<CropHandle>,
        origin: (f32, f32),
        start: CropRect,
    },
    Dragging {
        handle: CropHandle,
        origin: (f32, f32),
        start: CropRect,
    },
}

/// Crop mode state: the rectangle, its constraint, the gesture in progress and
/// the preview rotation applied while cropping
#[derive(Debug, Clone)]
pub struct CropEditor {
    pub rect: CropRect,
    pub aspect: CropAspect,
    pub drag: CropDrag,
    /// Quarter turns shown while in crop mode, baked in on commit
    pub view_turns: i32,
    drag_threshold: f32,
    handle_radius: f32,
}

impl CropEditor {
    pub fn new(drag_threshold: f32, handle_radius: f32) -> Self {
        Self {
            rect: CropRect::FULL,
            aspect: CropAspect::Free,
            drag: CropDrag::Idle,
            view_turns: 0,
            drag_threshold,
            handle_radius,
        }
    }

    /// Back to the full frame with no rotation
    pub fn reset(&mut self) {
        self.rect = CropRect::FULL;
        self.drag = CropDrag::Idle;
        self.view_turns = 0;
    }

    pub fn rotate_view(&mut self, turns: i32) {
        self.view_turns = (self.view_turns + turns).rem_euclid(4);
        // The displayed frame changed shape; start over
        self.rect = CropRect::FULL;
    }

    /// Apply an aspect constraint to the current rectangle
    pub fn set_aspect(&mut self, aspect: CropAspect, image_size: (u32, u32)) {
        self.aspect = aspect;
        if let Some(k) = aspect.normalized_ratio(image_size.0, image_size.1) {
            self.rect = self.rect.fit_ratio(k);
        }
    }

    pub fn press(&mut self, point: (f32, f32), viewport: &ImageViewport) {
        let handle = viewport.hit_test(&self.rect, point, self.handle_radius);
        self.drag = CropDrag::Armed {
            handle,
            origin: point,
            start: self.rect,
        };
    }

    /// Pointer motion. Returns `true` when the rectangle changed.
    pub fn motion(&mut self, point: (f32, f32), viewport: &ImageViewport, image_size: (u32, u32)) -> bool {
        match self.drag {
            CropDrag::Idle => false,
            CropDrag::Armed { handle, origin, start } => {
                let (dx, dy) = (point.0 - origin.0, point.1 - origin.1);
                let Some(handle) = handle else {
                    return false;
                };
                if (dx * dx + dy * dy).sqrt() < self.drag_threshold {
                    return false;
                }
                self.drag = CropDrag::Dragging { handle, origin, start };
                self.update_drag(handle, origin, start, point, viewport, image_size);
                true
            }
            CropDrag::Dragging { handle, origin, start } => {
                self.update_drag(handle, origin, start, point, viewport, image_size);
                true
            }
        }
    }

    fn update_drag(
        &mut self,
        handle: CropHandle,
        origin: (f32, f32),
        start: CropRect,
        point: (f32, f32),
        viewport: &ImageViewport,
        image_size: (u32, u32),
    ) {
        self.rect = match handle {
            CropHandle::Move => {
                let dx = (point.0 - origin.0) / viewport.size.0.max(1.0);
                let dy = (point.1 - origin.1) / viewport.size.1.max(1.0);
                start.translated(dx, dy)
            }
            corner => {
                let ratio = self.aspect.normalized_ratio(image_size.0, image_size.1);
                start.with_corner(corner, viewport.to_normalized(point), ratio)
            }
        };
    }

    /// End the gesture. Returns `true` if it was a drag rather than a click.
    pub fn release(&mut self) -> bool {
        let dragged = matches!(self.drag, CropDrag::Dragging { .. });
        self.drag = CropDrag::Idle;
        dragged
    }

    /// The op that bakes the current rectangle and view rotation
    pub fn commit(&self) -> PendingOp {
        PendingOp::Crop {
            rect: self.rect,
            quarter_turns: self.view_turns,
        }
    }
}

/// Arbitrary-angle rotation drag: `Idle -> Dragging -> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RotateDrag {
    #[default]
    Idle,
    Dragging { start_x: f32, start_angle: f32 },
}

#[derive(Debug, Clone)]
pub struct RotateEditor {
    /// Degrees, clockwise positive
    pub angle: f32,
    pub drag: RotateDrag,
    sensitivity: f32,
    max_angle: f32,
}

impl RotateEditor {
    pub fn new(sensitivity: f32, max_angle: f32) -> Self {
        Self {
            angle: 0.0,
            drag: RotateDrag::Idle,
            sensitivity,
            max_angle,
        }
    }

    pub fn begin(&mut self, x: f32) {
        self.drag = RotateDrag::Dragging {
            start_x: x,
            start_angle: self.angle,
        };
    }

    pub fn motion(&mut self, x: f32) -> bool {
        let RotateDrag::Dragging { start_x, start_angle } = self.drag else {
            return false;
        };
        self.angle = (start_angle + (x - start_x) * self.sensitivity).clamp(-self.max_angle, self.max_angle);
        true
    }

    /// End the drag and produce the op to bake, if any rotation accumulated
    pub fn end(&mut self) -> Option<PendingOp> {
        if self.drag == RotateDrag::Idle {
            return None;
        }
        self.drag = RotateDrag::Idle;
        let angle = std::mem::take(&mut self.angle);
        (angle.abs() > 1e-3).then_some(PendingOp::Rotate(Rotation::Arbitrary(angle)))
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.drag, RotateDrag::Dragging { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rotation {
    /// Quarter turns, clockwise positive
    Quarter(i32),
    /// Degrees, clockwise positive
    Arbitrary(f32),
}

/// A geometry mutation deferred to the start of the next frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PendingOp {
    Crop { rect: CropRect, quarter_turns: i32 },
    Rotate(Rotation),
    Undo,
}

impl PendingOp {
    /// Apply to `image`. `Undo` has no pixel transform of its own.
    pub fn transform(&self, image: &RawImage) -> Option<RawImage> {
        match *self {
            PendingOp::Crop { rect, quarter_turns } => {
                let rotated = transform::rotate_quarter(image, quarter_turns);
                let pixels = rect.to_pixels(rotated.width, rotated.height);
                Some(transform::crop(&rotated, pixels))
            }
            PendingOp::Rotate(Rotation::Quarter(turns)) => Some(transform::rotate_quarter(image, turns)),
            PendingOp::Rotate(Rotation::Arbitrary(degrees)) => Some(transform::rotate_arbitrary(image, degrees)),
            PendingOp::Undo => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PendingOp::Crop { .. } => "crop",
            PendingOp::Rotate(_) => "rotate",
            PendingOp::Undo => "undo",
        }
    }
}

/// Single-slot queue of deferred geometry ops, drained once per frame
#[derive(Debug, Default)]
pub struct PendingOps {
    slot: Option<PendingOp>,
}

impl PendingOps {
    /// Stage an op. A second op before the next drain is rejected.
    pub fn queue(&mut self, op: PendingOp) -> Result<(), ValidationError> {
        if let Some(pending) = self.slot {
            tracing::warn!("⚠️  Ignoring {} while {} is pending", op.name(), pending.name());
            return Err(ValidationError::Busy("geometry"));
        }
        self.slot = Some(op);
        Ok(())
    }

    /// Consume the staged op, exactly once
    pub fn take(&mut self) -> Option<PendingOp> {
        self.slot.take()
    }

    pub fn is_pending(&self) -> bool {
        self.slot.is_some()
    }

    pub fn peek(&self) -> Option<&PendingOp> {
        self.slot.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid(r: &CropRect) -> bool {
        0.0 <= r.left && r.left < r.right && r.right <= 1.0 && 0.0 <= r.top && r.top < r.bottom && r.bottom <= 1.0
    }

    #[test]
    fn test_normalization_orders_and_clamps() {
        let r = CropRect::new(0.8, 1.5, 0.2, -0.3);
        assert_eq!(r, CropRect { left: 0.2, top: 0.0, right: 0.8, bottom: 1.0 });

        let degenerate = CropRect::new(1.0, 0.5, 1.0, 0.5);
        assert!(valid(&degenerate));
    }

    #[test]
    fn test_corner_edits_stay_valid() {
        let mut rect = CropRect::FULL;
        let points = [
            (0.3, 0.3),
            (1.2, -0.4),
            (0.0, 0.0),
            (0.999, 0.999),
            (-5.0, 7.0),
            (0.5, 0.5),
            (f32::NAN, 0.2),
        ];
        for (i, p) in points.iter().enumerate() {
            let handle = CropHandle::CORNERS[i % 4];
            rect = rect.with_corner(handle, *p, None);
            assert!(valid(&rect), "{rect:?} after {p:?}");
            rect = rect.with_corner(handle, *p, Some(1.5));
            assert!(valid(&rect), "{rect:?} after {p:?} with ratio");
        }
    }

    #[test]
    fn test_corner_drag_past_anchor_flips() {
        let start = CropRect::new(0.2, 0.2, 0.6, 0.6);
        let r = start.with_corner(CropHandle::BottomRight, (0.1, 0.1), None);
        assert_eq!(r, CropRect { left: 0.1, top: 0.1, right: 0.2, bottom: 0.2 });
    }

    #[test]
    fn test_aspect_constraint() {
        // 3:2 on a 3:2 image is square in normalized units
        let k = CropAspect::ThreeTwo.normalized_ratio(3000, 2000).unwrap();
        assert!((k - 1.0).abs() < 1e-6);

        let r = CropRect::FULL.with_corner(CropHandle::BottomRight, (0.8, 0.4), Some(k));
        assert!((r.width() - r.height()).abs() < 1e-6);
    }

    #[test]
    fn test_move_stops_at_border() {
        let r = CropRect::new(0.1, 0.1, 0.5, 0.5).translated(0.9, -0.5);
        assert!((r.right - 1.0).abs() < 1e-6);
        assert!(r.top.abs() < 1e-6);
        assert!((r.width() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_drag_needs_threshold() {
        let viewport = ImageViewport { origin: (0.0, 0.0), size: (100.0, 100.0) };
        let mut editor = CropEditor::new(3.0, 16.0);

        editor.press((100.0, 100.0), &viewport);
        assert!(matches!(editor.drag, CropDrag::Armed { handle: Some(CropHandle::BottomRight), .. }));
        assert!(!editor.motion((99.0, 99.0), &viewport, (100, 100)));
        assert_eq!(editor.rect, CropRect::FULL);

        assert!(editor.motion((80.0, 70.0), &viewport, (100, 100)));
        assert!(matches!(editor.drag, CropDrag::Dragging { .. }));
        assert!((editor.rect.right - 0.8).abs() < 1e-6);
        assert!((editor.rect.bottom - 0.7).abs() < 1e-6);
        assert!(editor.release());
        assert_eq!(editor.drag, CropDrag::Idle);
    }

    #[test]
    fn test_press_outside_does_nothing() {
        let viewport = ImageViewport { origin: (50.0, 50.0), size: (100.0, 100.0) };
        let mut editor = CropEditor::new(3.0, 16.0);
        editor.rect = CropRect::new(0.25, 0.25, 0.75, 0.75);
        editor.press((5.0, 5.0), &viewport);
        assert!(!editor.motion((40.0, 40.0), &viewport, (100, 100)));
        assert!(!editor.release());
    }

    #[test]
    fn test_rotate_drag_clamps() {
        let mut rot = RotateEditor::new(0.15, 90.0);
        rot.begin(0.0);
        rot.motion(100.0);
        assert!((rot.angle - 15.0).abs() < 1e-4);
        rot.motion(10_000.0);
        assert_eq!(rot.angle, 90.0);
        assert_eq!(rot.end(), Some(PendingOp::Rotate(Rotation::Arbitrary(90.0))));
        assert_eq!(rot.angle, 0.0);
        assert_eq!(rot.end(), None);
    }

    #[test]
    fn test_pending_slot_single_op() {
        let mut ops = PendingOps::default();
        ops.queue(PendingOp::Undo).unwrap();
        assert_eq!(
            ops.queue(PendingOp::Rotate(Rotation::Quarter(1))),
            Err(ValidationError::Busy("geometry"))
        );
        assert_eq!(ops.take(), Some(PendingOp::Undo));
        assert_eq!(ops.take(), None);
        assert!(ops.queue(PendingOp::Rotate(Rotation::Quarter(1))).is_ok());
    }

    #[test]
    fn test_crop_op_transform() {
        let image = RawImage::filled(100, 80, [1, 2, 3, 4]);
        let op = PendingOp::Crop { rect: CropRect::new(0.25, 0.25, 0.75, 0.75), quarter_turns: 1 };
        let out = op.transform(&image).unwrap();
        // Rotated to 80x100 first, then halved
        assert_eq!((out.width, out.height), (40, 50));
        assert!(PendingOp::Undo.transform(&image).is_none());
    }
}
