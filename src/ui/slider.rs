/// Adjustment slider drawn on a canvas
///
/// The widget only reports raw pointer positions. The session decides
/// whether a press became a drag or a click that opens text entry.
use iced::mouse::{self, Cursor};
use iced::widget::canvas::{self, Path, Program, Stroke};
use iced::{Color, Point, Rectangle, Renderer, Size, Theme};

use raw_darkroom::Field;

use crate::Message;

pub struct FieldSlider {
    pub field: Field,
    /// Slider position within the field's range, 0..=1
    pub position: f32,
    /// Where the default value sits, 0..=1
    pub origin: f32,
}

impl Program<Message> for FieldSlider {
    type State = bool;

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());
        let mid = bounds.height * 0.5;
        let width = bounds.width;

        frame.fill_rectangle(
            Point::new(0.0, mid - 1.5),
            Size::new(width, 3.0),
            Color::from_rgb(0.25, 0.25, 0.28),
        );

        let (from, to) = if self.position < self.origin {
            (self.position, self.origin)
        } else {
            (self.origin, self.position)
        };
        frame.fill_rectangle(
            Point::new(from * width, mid - 1.5),
            Size::new((to - from) * width, 3.0),
            Color::from_rgb(0.45, 0.65, 0.95),
        );

        let color = if cursor.is_over(bounds) {
            Color::WHITE
        } else {
            Color::from_rgb(0.85, 0.85, 0.85)
        };
        let handle = Path::circle(Point::new(self.position.clamp(0.0, 1.0) * width, mid), 6.0);
        frame.fill(&handle, color);
        frame.stroke(&handle, Stroke::default().with_color(Color::BLACK).with_width(1.0));

        vec![frame.into_geometry()]
    }

    fn update(
        &self,
        pressed: &mut Self::State,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> (canvas::event::Status, Option<Message>) {
        match event {
            canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                if let Some(pos) = cursor.position_in(bounds) {
                    *pressed = true;
                    return (
                        canvas::event::Status::Captured,
                        Some(Message::SliderPress(self.field, pos.x)),
                    );
                }
            }
            canvas::Event::Mouse(mouse::Event::CursorMoved { position }) if *pressed => {
                return (
                    canvas::event::Status::Captured,
                    Some(Message::SliderMotion(self.field, position.x - bounds.x, bounds.width)),
                );
            }
            canvas::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) if *pressed => {
                *pressed = false;
                return (
                    canvas::event::Status::Captured,
                    Some(Message::SliderRelease(self.field)),
                );
            }
            _ => {}
        }
        (canvas::event::Status::Ignored, None)
    }
}
