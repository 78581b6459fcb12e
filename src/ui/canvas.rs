use iced::mouse::{self, Cursor};
use iced::widget::canvas::{self, Path, Program, Stroke};
use iced::{Color, Point, Rectangle, Renderer, Size, Theme};

use raw_darkroom::state::geometry::ImageViewport;
use raw_darkroom::state::CropRect;
use raw_darkroom::EditMode;

use crate::Message;

/// Interaction layer stacked over the preview image
///
/// In crop mode it draws the crop rectangle and turns pointer input into
/// crop gestures; in rotate mode it draws a level grid and reports
/// horizontal drags. In develop mode it is inert.
pub struct GeometryOverlay {
    pub mode: EditMode,
    /// Size of the displayed preview, in pixels
    pub image_size: (u32, u32),
    pub crop: CropRect,
    pub angle: f32,
}

impl GeometryOverlay {
    /// Where the preview lands inside `bounds` when fitted with `Contain`
    pub fn viewport(&self, bounds: Size) -> ImageViewport {
        let (w, h) = (self.image_size.0.max(1) as f32, self.image_size.1.max(1) as f32);
        let scale = (bounds.width / w).min(bounds.height / h);
        let size = (w * scale, h * scale);
        ImageViewport {
            origin: ((bounds.width - size.0) * 0.5, (bounds.height - size.1) * 0.5),
            size,
        }
    }

    fn draw_crop(&self, frame: &mut canvas::Frame, viewport: &ImageViewport) {
        let (left, top) = viewport.to_screen((self.crop.left, self.crop.top));
        let (right, bottom) = viewport.to_screen((self.crop.right, self.crop.bottom));
        let (ix, iy) = viewport.origin;
        let (iw, ih) = viewport.size;
        let shade = Color::from_rgba(0.0, 0.0, 0.0, 0.55);

        frame.fill_rectangle(Point::new(ix, iy), Size::new(iw, top - iy), shade);
        frame.fill_rectangle(Point::new(ix, bottom), Size::new(iw, iy + ih - bottom), shade);
        frame.fill_rectangle(Point::new(ix, top), Size::new(left - ix, bottom - top), shade);
        frame.fill_rectangle(Point::new(right, top), Size::new(ix + iw - right, bottom - top), shade);

        let guide = Stroke::default()
            .with_color(Color::from_rgba(1.0, 1.0, 1.0, 0.35))
            .with_width(1.0);
        for third in [1.0 / 3.0, 2.0 / 3.0] {
            let x = left + (right - left) * third;
            let y = top + (bottom - top) * third;
            frame.stroke(&Path::line(Point::new(x, top), Point::new(x, bottom)), guide.clone());
            frame.stroke(&Path::line(Point::new(left, y), Point::new(right, y)), guide.clone());
        }

        frame.stroke(
            &Path::rectangle(Point::new(left, top), Size::new(right - left, bottom - top)),
            Stroke::default().with_color(Color::WHITE).with_width(1.5),
        );
        for (x, y) in [(left, top), (right, top), (left, bottom), (right, bottom)] {
            frame.fill(&Path::circle(Point::new(x, y), 5.0), Color::WHITE);
        }
    }

    fn draw_level_grid(&self, frame: &mut canvas::Frame, viewport: &ImageViewport) {
        let (ix, iy) = viewport.origin;
        let (iw, ih) = viewport.size;
        let grid = Stroke::default()
            .with_color(Color::from_rgba(1.0, 1.0, 1.0, 0.3))
            .with_width(1.0);
        for i in 1..8 {
            let t = i as f32 / 8.0;
            frame.stroke(
                &Path::line(Point::new(ix + iw * t, iy), Point::new(ix + iw * t, iy + ih)),
                grid.clone(),
            );
            frame.stroke(
                &Path::line(Point::new(ix, iy + ih * t), Point::new(ix + iw, iy + ih * t)),
                grid.clone(),
            );
        }
        frame.fill_text(canvas::Text {
            content: format!("{:+.1}°", self.angle),
            position: Point::new(ix + 8.0, iy + 8.0),
            color: Color::WHITE,
            ..canvas::Text::default()
        });
    }
}

impl Program<Message> for GeometryOverlay {
    type State = DragState;

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());
        let viewport = self.viewport(bounds.size());
        match self.mode {
            EditMode::Crop => self.draw_crop(&mut frame, &viewport),
            EditMode::Rotate => self.draw_level_grid(&mut frame, &viewport),
            EditMode::Develop => {}
        }
        vec![frame.into_geometry()]
    }

    fn update(
        &self,
        state: &mut Self::State,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> (canvas::event::Status, Option<Message>) {
        if self.mode == EditMode::Develop {
            return (canvas::event::Status::Ignored, None);
        }
        let viewport = self.viewport(bounds.size());

        match event {
            canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                if let Some(pos) = cursor.position_in(bounds) {
                    state.is_dragging = true;
                    let message = match self.mode {
                        EditMode::Crop => Message::CropPress((pos.x, pos.y), viewport),
                        _ => Message::RotateBegin(pos.x),
                    };
                    return (canvas::event::Status::Captured, Some(message));
                }
            }

            canvas::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => {
                if state.is_dragging {
                    state.is_dragging = false;
                    let message = match self.mode {
                        EditMode::Crop => Message::CropRelease,
                        _ => Message::RotateEnd,
                    };
                    return (canvas::event::Status::Captured, Some(message));
                }
            }

            canvas::Event::Mouse(mouse::Event::CursorMoved { position }) => {
                if state.is_dragging {
                    // Positions outside the canvas still drive the gesture
                    let pos = Point::new(position.x - bounds.x, position.y - bounds.y);
                    let message = match self.mode {
                        EditMode::Crop => Message::CropMotion((pos.x, pos.y), viewport),
                        _ => Message::RotateMotion(pos.x),
                    };
                    return (canvas::event::Status::Captured, Some(message));
                }
            }

            _ => {}
        }

        (canvas::event::Status::Ignored, None)
    }

    fn mouse_interaction(
        &self,
        state: &Self::State,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> mouse::Interaction {
        match self.mode {
            EditMode::Develop => mouse::Interaction::default(),
            _ if state.is_dragging => mouse::Interaction::Grabbing,
            _ if cursor.is_over(bounds) => mouse::Interaction::Crosshair,
            _ => mouse::Interaction::default(),
        }
    }
}

/// State for drag interactions
#[derive(Debug, Clone, Default)]
pub struct DragState {
    pub is_dragging: bool,
}
