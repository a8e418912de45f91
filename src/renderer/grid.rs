//! Background grid: scale-colored pitch rows, alternating measure shading,
//! pitch separators and three levels of vertical time lines.

use serde::Serialize;

use super::constants::*;
use super::geometry::RollGeometry;
use crate::events::{PianoRollData, PITCH_MAX, PITCH_MIN};

/// One horizontal pitch row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowBand {
    pub pitch: u8,
    pub y: f64,
    pub height: f64,
    pub in_scale: bool,
}

/// A shaded measure, already clipped to the viewport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShadeRect {
    pub measure: u32,
    pub x: f64,
    pub width: f64,
}

/// Everything drawn behind the notes. Line positions are pixel-snapped
/// (`round(v) + 0.5`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Grid {
    pub rows: Vec<RowBand>,
    pub shading: Vec<ShadeRect>,
    /// y of each horizontal separator
    pub pitch_lines: Vec<f64>,
    /// x of each sixteenth line not covered by a beat or measure line
    pub sixteenth_lines: Vec<f64>,
    /// x of each beat line not covered by a measure line
    pub beat_lines: Vec<f64>,
    pub measure_lines: Vec<f64>,
}

/// Tick length of the felt beat: a dotted quarter in `/8` meters, a half
/// note in `/2`, a quarter otherwise.
pub fn beat_ticks(data: &PianoRollData) -> f64 {
    let quarter = data.ticks_per_beat as f64;
    match data.meter.beat_type {
        8 => quarter * 1.5,
        2 => quarter * 2.0,
        _ => quarter,
    }
}

fn snap(v: f64) -> f64 {
    v.round() + 0.5
}

fn is_multiple(tick: f64, step: f64) -> bool {
    step > 0.0 && (tick % step).abs() < 0.01
}

/// Lay out the grid for `data` in `geometry`. Measures with even index are
/// shaded when `shade_even_measures` is set, odd ones otherwise.
pub fn derive_grid(
    data: &PianoRollData,
    geometry: &RollGeometry,
    shade_even_measures: bool,
) -> Grid {
    let view_width = geometry.width;
    let view_height = geometry.height;
    let row_height = geometry.row_height;

    let sixteenth = data.ticks_per_beat as f64 / 4.0;
    let beat = beat_ticks(data);
    let measure = data.ticks_per_measure as f64;

    let sixteenth_px = geometry.ticks_to_width(sixteenth);
    let beat_px = geometry.ticks_to_width(beat);
    let measure_px = geometry.ticks_to_width(measure);
    let draw_beats = beat > 0.0 && beat_px >= MIN_BEAT_SPACING;
    let draw_measures = measure > 0.0 && measure_px >= MIN_MEASURE_SPACING;

    let margin = if sixteenth > 0.0 { sixteenth } else { 1.0 };
    let start_tick = -margin;
    // Nothing past the right edge is drawn, so stop there on long tunes.
    let end_tick = (data.width_ticks as f64 + margin).min(geometry.x_to_tick(view_width) + margin);

    let mut grid = Grid::default();

    // ── Rows ────────────────────────────────────────────────────────
    for pitch in geometry.visible_pitches() {
        let y = geometry.pitch_to_y(pitch as i32);
        if y + row_height < 0.0 || y > view_height {
            continue;
        }
        grid.rows.push(RowBand {
            pitch,
            y,
            height: row_height,
            in_scale: data.is_in_scale(pitch),
        });
    }

    // ── Measure shading ─────────────────────────────────────────────
    if measure > 0.0 {
        let first = (start_tick / measure).floor().max(0.0) as u32;
        let last = (end_tick / measure).ceil().max(0.0) as u32;
        let parity = if shade_even_measures { 0 } else { 1 };
        for m in (first..last).filter(|m| m % 2 == parity) {
            let x0 = geometry.tick_to_x(m as f64 * measure);
            let x1 = geometry.tick_to_x((m + 1) as f64 * measure);
            if x1 < 0.0 || x0 > view_width {
                continue;
            }
            let x = x0.max(0.0);
            let width = x1.min(view_width) - x;
            if width > 0.0 {
                grid.shading.push(ShadeRect { measure: m, x, width });
            }
        }
    }

    // ── Horizontal pitch separators ─────────────────────────────────
    let low = geometry.low_pitch.max(PITCH_MIN as i32);
    let high = (geometry.high_pitch + 1).min(PITCH_MAX as i32 + 1);
    for pitch in low..=high {
        let y = geometry.pitch_to_y(pitch - 1) + row_height;
        if (-1.0..=view_height + 1.0).contains(&y) {
            grid.pitch_lines.push(snap(y));
        }
    }

    // ── Vertical time lines ─────────────────────────────────────────
    let in_view = |x: f64| (-1.0..=view_width + 1.0).contains(&x);

    if sixteenth > 0.0 && sixteenth_px >= MIN_SIXTEENTH_SPACING {
        let first = (start_tick / sixteenth).floor().max(0.0) as u64;
        let last = (end_tick / sixteenth).ceil().max(0.0) as u64;
        for s in first..=last {
            let tick = s as f64 * sixteenth;
            let on_beat = draw_beats && is_multiple(tick, beat);
            if on_beat || (draw_measures && is_multiple(tick, measure)) {
                continue;
            }
            let x = geometry.tick_to_x(tick);
            if in_view(x) {
                grid.sixteenth_lines.push(snap(x));
            }
        }
    }

    if draw_beats {
        let first = (start_tick / beat).floor().max(0.0) as u64;
        let last = (end_tick / beat).ceil().max(0.0) as u64;
        for b in first..=last {
            let tick = b as f64 * beat;
            if draw_measures && is_multiple(tick, measure) {
                continue;
            }
            let x = geometry.tick_to_x(tick);
            if in_view(x) {
                grid.beat_lines.push(snap(x));
            }
        }
    }

    if draw_measures {
        let first = (start_tick / measure).floor().max(0.0) as u64;
        let last = (end_tick / measure).ceil().max(0.0) as u64;
        for m in first..=last {
            let x = geometry.tick_to_x(m as f64 * measure);
            if in_view(x) {
                grid.measure_lines.push(snap(x));
            }
        }
    }

    grid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abc::parse_abc;
    use crate::events::extract_events;
    use pretty_assertions::assert_eq;

    fn setup(abc: &str, width: f64, height: f64) -> (PianoRollData, RollGeometry) {
        let data = extract_events(&parse_abc(abc).unwrap(), 480);
        let geometry = RollGeometry::fit(&data, width, height);
        (data, geometry)
    }

    #[test]
    fn beat_follows_meter_denominator() {
        let (data, _) = setup("M:6/8\nK:C\nC", 100.0, 100.0);
        assert_eq!(beat_ticks(&data), 720.0);
        let (data, _) = setup("M:2/2\nK:C\nC", 100.0, 100.0);
        assert_eq!(beat_ticks(&data), 960.0);
        let (data, _) = setup("M:3/4\nK:C\nC", 100.0, 100.0);
        assert_eq!(beat_ticks(&data), 480.0);
    }

    #[test]
    fn rows_follow_scale() {
        // C and E in C major: rows 58..=66.
        let (data, geo) = setup("L:1/4\nK:C\nC E", 200.0, 90.0);
        let grid = derive_grid(&data, &geo, true);
        assert_eq!(grid.rows.len(), 9);
        let row = |p: u8| grid.rows.iter().find(|r| r.pitch == p).unwrap();
        assert!(row(60).in_scale);
        assert!(!row(61).in_scale);
        assert!((row(66).y - 0.0).abs() < 1e-9);
        // Bottom edges of rows 58..=66.
        assert_eq!(grid.pitch_lines.len(), 9);
        assert_eq!(grid.pitch_lines.first(), Some(&90.5));
        assert_eq!(grid.pitch_lines.last(), Some(&10.5));
    }

    #[test]
    fn two_bars_of_four_four_at_full_zoom() {
        // 3840 ticks into 1920 px: a sixteenth is 60 px, a beat 240 px.
        let (data, geo) = setup("L:1/4\nK:C\nC D E F|G A B c|", 1920.0, 100.0);
        let grid = derive_grid(&data, &geo, true);
        assert_eq!(grid.measure_lines, vec![0.5, 960.5, 1920.5]);
        // Beats at 1, 2, 3 of each bar.
        assert_eq!(
            grid.beat_lines,
            vec![240.5, 480.5, 720.5, 1200.5, 1440.5, 1680.5]
        );
        // 33 sixteenth positions (0..=32) minus the 9 drawn coarser.
        assert_eq!(grid.sixteenth_lines.len(), 24);
        assert!(!grid.sixteenth_lines.contains(&240.5));
        assert_eq!(grid.sixteenth_lines[0], 60.5);
        // Measure 0 shaded, measure 1 not.
        assert_eq!(grid.shading.len(), 1);
        assert_eq!(grid.shading[0].measure, 0);
        assert_eq!(grid.shading[0].width, 960.0);
    }

    #[test]
    fn odd_measure_shading() {
        let (data, geo) = setup("L:1/4\nK:C\nC D E F|G A B c|", 1920.0, 100.0);
        let grid = derive_grid(&data, &geo, false);
        let shaded: Vec<u32> = grid.shading.iter().map(|s| s.measure).collect();
        assert_eq!(shaded, vec![1]);
        assert_eq!(grid.shading[0].x, 960.0);
    }

    #[test]
    fn dense_tunes_drop_fine_lines() {
        // 64 bars in 400 px: a sixteenth is ~0.4 px, a beat ~1.6 px, a bar ~6 px.
        let abc = format!("L:1\nK:C\n{}", "C|".repeat(64));
        let (data, geo) = setup(&abc, 400.0, 100.0);
        let grid = derive_grid(&data, &geo, true);
        assert!(grid.sixteenth_lines.is_empty());
        assert!(grid.beat_lines.is_empty());
        assert_eq!(grid.measure_lines.len(), 65);
    }

    #[test]
    fn mid_zoom_draws_all_three_levels() {
        let abc = format!("L:1\nK:C\n{}", "C|".repeat(8));
        let (data, geo) = setup(&abc, 400.0, 100.0);
        let grid = derive_grid(&data, &geo, true);
        // 8 bars into 400 px: sixteenth ~3.1 px, beat 12.5 px.
        assert!(!grid.sixteenth_lines.is_empty());
        assert_eq!(grid.beat_lines.len(), 24);
        assert_eq!(grid.measure_lines.len(), 9);
    }

    #[test]
    fn saturated_tunes_stay_inside_the_viewport() {
        let (data, geo) = setup("L:1/8\nK:C\nC99999999 C", 800.0, 100.0);
        assert_eq!(data.width_ticks, u32::MAX);
        let grid = derive_grid(&data, &geo, true);
        assert!(grid.measure_lines.iter().all(|&x| x <= 801.5));
        assert!(grid.shading.iter().all(|s| s.x + s.width <= 800.0));
    }
}
