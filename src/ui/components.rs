//! Small rendering helpers shared by the slot boxes and the trigger.

use image::RgbImage;
use ratatui::{
    style::{Color, Style},
    text::{Line, Span},
};

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub fn spinner_frame(tick: usize) -> &'static str {
    SPINNER[tick % SPINNER.len()]
}

/// Render `thumb` into at most `cols` x `rows` cells using upper half blocks,
/// two pixel rows per cell. Aspect ratio is preserved.
pub fn preview_lines(thumb: &RgbImage, cols: u16, rows: u16) -> Vec<Line<'static>> {
    let (tw, th) = thumb.dimensions();
    if tw == 0 || th == 0 || cols == 0 || rows == 0 {
        return Vec::new();
    }

    let scale = (cols as f32 / tw as f32).min((rows as f32 * 2.0) / th as f32);
    let out_w = ((tw as f32 * scale) as u32).max(1);
    let out_h = ((th as f32 * scale) as u32).max(1);

    let sample = |x: u32, y: u32| {
        let sx = (x * tw / out_w).min(tw - 1);
        let sy = (y * th / out_h).min(th - 1);
        let p = thumb.get_pixel(sx, sy);
        Color::Rgb(p[0], p[1], p[2])
    };

    (0..out_h.div_ceil(2))
        .map(|row| {
            let spans: Vec<Span<'static>> = (0..out_w)
                .map(|x| {
                    let top = sample(x, row * 2);
                    let style = if row * 2 + 1 < out_h {
                        Style::default().fg(top).bg(sample(x, row * 2 + 1))
                    } else {
                        Style::default().fg(top)
                    };
                    Span::styled("▀", style)
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}
