//! Mapping between musical coordinates (ticks, pitches) and SVG units.

use serde::Serialize;
use tracing::warn;

use super::constants::*;
use crate::events::{PianoRollData, PITCH_MAX, PITCH_MIN};

/// Scale factors that fit a whole tune into one viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RollGeometry {
    /// Viewport width of the roll area
    pub width: f64,
    /// Viewport height of the roll area
    pub height: f64,
    /// Horizontal zoom applied on top of the base pixels per tick
    pub scale_x: f64,
    /// Height of one pitch row
    pub row_height: f64,
    /// Lowest rendered pitch (content minimum minus padding; may be negative)
    pub low_pitch: i32,
    /// Highest rendered pitch (content maximum plus padding; may exceed 127)
    pub high_pitch: i32,
    /// Number of rows the height is divided into
    pub pitch_range: i32,
}

impl RollGeometry {
    /// Fit `data` into a `width` × `height` viewport. A zero or negative
    /// dimension falls back to 300 × 150.
    pub fn fit(data: &PianoRollData, width: f64, height: f64) -> Self {
        let usable = |d: f64| d > 0.0 && d.is_finite();
        let (width, height) = if !usable(width) || !usable(height) {
            warn!(width, height, "viewport has zero dimensions, using fallback");
            (
                sanitize(width).max(FALLBACK_WIDTH),
                sanitize(height).max(FALLBACK_HEIGHT),
            )
        } else {
            (width, height)
        };

        let required = data.width_ticks.max(1) as f64 * PIXELS_PER_TICK_BASE;
        let scale_x = (width / required).max(MIN_SCALE_X);

        let low_pitch = data.min_pitch as i32 - PADDING_PITCHES;
        let high_pitch = data.max_pitch as i32 + PADDING_PITCHES;
        let pitch_range = (high_pitch - low_pitch + 1).max(1);
        let row_height = height / pitch_range as f64;

        Self {
            width,
            height,
            scale_x,
            row_height,
            low_pitch,
            high_pitch,
            pitch_range,
        }
    }

    pub fn tick_to_x(&self, tick: f64) -> f64 {
        tick * PIXELS_PER_TICK_BASE * self.scale_x
    }

    pub fn x_to_tick(&self, x: f64) -> f64 {
        x / (PIXELS_PER_TICK_BASE * self.scale_x)
    }

    /// Top edge of the row for `pitch`.
    pub fn pitch_to_y(&self, pitch: i32) -> f64 {
        self.height - ((pitch - self.low_pitch) + 1) as f64 * self.row_height
    }

    /// Width in SVG units of a span of ticks.
    pub fn ticks_to_width(&self, ticks: f64) -> f64 {
        ticks * PIXELS_PER_TICK_BASE * self.scale_x
    }

    /// Rendered pitches that are valid MIDI notes, low to high.
    pub fn visible_pitches(&self) -> impl Iterator<Item = u8> {
        let low = self.low_pitch.max(PITCH_MIN as i32);
        let high = self.high_pitch.min(PITCH_MAX as i32);
        (low..=high).map(|p| p as u8)
    }

    /// Height of a note bar or key, centered in its row.
    pub fn bar_height(&self) -> f64 {
        (self.row_height - NOTE_VERTICAL_GAP).max(1.0)
    }

    /// Top edge of a centered bar in the row for `pitch`.
    pub fn bar_top(&self, pitch: i32) -> f64 {
        self.pitch_to_y(pitch) + (self.row_height - self.bar_height()) / 2.0
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abc::parse_abc;
    use crate::events::extract_events;
    use pretty_assertions::assert_eq;

    fn data(abc: &str) -> PianoRollData {
        extract_events(&parse_abc(abc).unwrap(), 480)
    }

    #[test]
    fn fit_scales_whole_tune_into_width() {
        // One bar of 4/4 at 480 tpq: 1920 ticks → 96 base pixels.
        let data = data("L:1/4\nK:C\nC D E F");
        let geo = RollGeometry::fit(&data, 960.0, 100.0);
        assert!((geo.scale_x - 10.0).abs() < 1e-9);
        assert!((geo.tick_to_x(1920.0) - 960.0).abs() < 1e-9);
        assert!((geo.tick_to_x(480.0) - 240.0).abs() < 1e-9);
        assert!((geo.x_to_tick(240.0) - 480.0).abs() < 1e-9);
    }

    #[test]
    fn rows_cover_content_plus_padding() {
        let data = data("L:1/4\nK:C\nC G");
        let geo = RollGeometry::fit(&data, 400.0, 110.0);
        // 60..=67 plus two rows each side = 12 rows.
        assert_eq!(geo.pitch_range, 12);
        assert_eq!(geo.low_pitch, 58);
        assert_eq!(geo.high_pitch, 69);
        assert!((geo.row_height - 110.0 / 12.0).abs() < 1e-9);
        // Lowest row sits on the bottom edge, highest on the top edge.
        assert!((geo.pitch_to_y(58) - (110.0 - geo.row_height)).abs() < 1e-9);
        assert!(geo.pitch_to_y(69).abs() < 1e-9);
    }

    #[test]
    fn zero_viewport_uses_fallback() {
        let data = data("K:C\nC");
        let geo = RollGeometry::fit(&data, 0.0, 0.0);
        assert_eq!((geo.width, geo.height), (300.0, 150.0));
        let geo = RollGeometry::fit(&data, 500.0, 0.0);
        assert_eq!((geo.width, geo.height), (500.0, 150.0));
    }

    #[test]
    fn scale_has_a_floor() {
        let data = data("L:1\nK:C\nC C C C C C C C C C");
        let geo = RollGeometry::fit(&data, 1.0, 100.0);
        assert_eq!(geo.scale_x, MIN_SCALE_X);
    }

    #[test]
    fn visible_pitches_are_clipped_to_midi_range() {
        let data = data("K:C\nC,,,,,, c'''''");
        let geo = RollGeometry::fit(&data, 100.0, 100.0);
        let pitches: Vec<u8> = geo.visible_pitches().collect();
        assert_eq!(pitches.first(), Some(&0));
        assert_eq!(pitches.last(), Some(&127));
        assert_eq!(geo.low_pitch, -2);
    }

    #[test]
    fn bars_are_centered_with_a_gap() {
        let data = data("K:C\nC");
        let geo = RollGeometry::fit(&data, 100.0, 170.0);
        // A single pitch plus padding: 5 rows of 34.
        assert_eq!(geo.pitch_range, 5);
        assert_eq!(geo.bar_height(), 33.0);
        assert_eq!(geo.bar_top(60), geo.pitch_to_y(60) + 0.5);
    }
}
