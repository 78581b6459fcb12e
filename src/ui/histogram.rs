/// Live histogram panel
/// Draws the smoothed RGB and luma histogram of the current preview
use iced::widget::canvas::{self, Path, Stroke};
use iced::{mouse, Color, Point, Rectangle, Renderer, Theme};

use raw_darkroom::gpu::histogram::{HISTOGRAM_BINS, LUMA_CHANNEL};
use raw_darkroom::gpu::DisplayHistogram;

use crate::Message;

/// Borrowed view of the session's histogram; `None` until the first readback
#[derive(Debug, Clone, Copy)]
pub struct HistogramView<'a> {
    pub histogram: Option<&'a DisplayHistogram>,
}

const CHANNEL_COLORS: [Color; 4] = [
    Color::from_rgba(1.0, 0.3, 0.3, 0.45),
    Color::from_rgba(0.3, 1.0, 0.3, 0.45),
    Color::from_rgba(0.35, 0.5, 1.0, 0.45),
    Color::from_rgba(0.9, 0.9, 0.9, 0.8),
];

impl canvas::Program<Message> for HistogramView<'_> {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());
        frame.fill_rectangle(Point::ORIGIN, bounds.size(), Color::from_rgb(0.08, 0.08, 0.09));

        let Some(histogram) = self.histogram else {
            return vec![frame.into_geometry()];
        };
        let peak = histogram.peak();
        if peak <= 0.0 {
            return vec![frame.into_geometry()];
        }

        let width = bounds.width;
        let height = bounds.height;
        let step = width / HISTOGRAM_BINS as f32;

        for (channel, bins) in histogram.bins.iter().enumerate() {
            let area = Path::new(|builder| {
                builder.move_to(Point::new(0.0, height));
                for (i, &value) in bins.iter().enumerate() {
                    // Square root keeps shadows visible next to a tall spike
                    let normalized = (value / peak).clamp(0.0, 1.0).sqrt();
                    builder.line_to(Point::new(i as f32 * step, height - normalized * height));
                }
                builder.line_to(Point::new(width, height));
                builder.close();
            });

            if channel == LUMA_CHANNEL {
                frame.stroke(
                    &area,
                    Stroke::default().with_color(CHANNEL_COLORS[channel]).with_width(1.0),
                );
            } else {
                frame.fill(&area, CHANNEL_COLORS[channel]);
            }
        }

        vec![frame.into_geometry()]
    }
}
