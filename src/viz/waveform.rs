//! Channel trace widget for ratatui

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    widgets::{Block, Widget},
};

/// Renders one coil channel's samples as a filled trace around a center line.
pub struct ChannelTrace<'a> {
    samples: &'a [f64],
    /// Full-scale amplitude; samples at +-scale reach the panel edges.
    scale: f64,
    style: Style,
    block: Option<Block<'a>>,
}

impl<'a> ChannelTrace<'a> {
    pub fn new(samples: &'a [f64], scale: f64) -> Self {
        Self {
            samples,
            scale: if scale > 0.0 { scale } else { 1.0 },
            style: Style::default(),
            block: None,
        }
    }

    pub fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }

    fn render_trace(&self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 || self.samples.is_empty() {
            return;
        }

        let width = area.width as usize;
        let height = area.height as usize;
        let center_y = area.y + (height / 2) as u16;

        let samples_per_col = self.samples.len() as f64 / width as f64;

        for x in 0..width {
            let start = (x as f64 * samples_per_col) as usize;
            let end = (((x + 1) as f64 * samples_per_col) as usize).min(self.samples.len());

            let value = if start < end {
                self.samples[start..end].iter().sum::<f64>() / (end - start) as f64
            } else if start < self.samples.len() {
                self.samples[start]
            } else {
                0.0
            };

            let half_height = (height / 2) as f64;
            let offset = (value / self.scale * half_height).clamp(-half_height, half_height) as i16;
            let screen_x = area.x + x as u16;

            for dy in 0..=offset.unsigned_abs() {
                let y = if offset >= 0 {
                    center_y.saturating_sub(dy)
                } else {
                    center_y + dy
                };
                if y >= area.y && y < area.y + area.height {
                    buf.set_string(screen_x, y, "│", self.style);
                }
            }
        }

        // Zero line where nothing was drawn.
        for x in area.x..area.x + area.width {
            if center_y >= area.y && center_y < area.y + area.height {
                let cell = &buf[(x, center_y)];
                if cell.symbol() == " " {
                    buf.set_string(x, center_y, "─", Style::default());
                }
            }
        }
    }
}

impl Widget for ChannelTrace<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner_area = match &self.block {
            Some(block) => {
                let inner = block.inner(area);
                block.clone().render(area, buf);
                inner
            }
            None => area,
        };

        self.render_trace(inner_area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_empty() {
        let trace = ChannelTrace::new(&[], 1.0);
        let area = Rect::new(0, 0, 10, 5);
        let mut buf = Buffer::empty(area);
        trace.render(area, &mut buf);
        // Should not panic
    }

    #[test]
    fn test_trace_with_samples() {
        let samples: Vec<f64> = (0..100)
            .map(|i| (i as f64 / 100.0 * std::f64::consts::TAU).sin())
            .collect();
        let trace = ChannelTrace::new(&samples, 1.0);
        let area = Rect::new(0, 0, 20, 7);
        let mut buf = Buffer::empty(area);
        trace.render(area, &mut buf);
    }

    #[test]
    fn test_trace_clamps_over_scale() {
        let samples = vec![10.0, -10.0, 10.0, -10.0];
        let trace = ChannelTrace::new(&samples, 1.0);
        let area = Rect::new(0, 0, 4, 5);
        let mut buf = Buffer::empty(area);
        trace.render(area, &mut buf);
    }

    #[test]
    fn test_trace_zero_scale_falls_back() {
        let trace = ChannelTrace::new(&[0.5], 0.0);
        assert_eq!(trace.scale, 1.0);
    }

    #[test]
    fn test_trace_with_block() {
        let samples = vec![0.5; 10];
        let trace = ChannelTrace::new(&samples, 1.0)
            .block(ratatui::widgets::Block::default().title("x"));
        let area = Rect::new(0, 0, 20, 8);
        let mut buf = Buffer::empty(area);
        trace.render(area, &mut buf);
    }
}
