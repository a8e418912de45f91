//! Piano-roll renderer — converts flattened note events into SVG.
//!
//! The whole tune is fitted into one fixed viewport: time runs left to
//! right, pitch bottom to top, with a key panel on the left naming every
//! row. The output is a self-contained SVG string.

mod constants;
mod geometry;
mod grid;
mod keys;
mod legend;
mod notes;
mod svg_builder;

use tracing::info;

use crate::events::{extract_events, PianoRollData};
use crate::model::Tune;
use crate::options::RenderOptions;
use constants::*;
use svg_builder::SvgBuilder;

pub use constants::DEFAULT_VOICE_COLORS;
pub use geometry::RollGeometry;
pub use grid::{beat_ticks, derive_grid, Grid, RowBand, ShadeRect};
pub use keys::{drum_name, is_black_key, layout_keys, KeyLabel};
pub use legend::{layout_legend, render_legend, LegendEntry};
pub use notes::{layout_notes, NoteRect};
pub(crate) use svg_builder::escape;

// ═══════════════════════════════════════════════════════════════════════
// Public API
// ═══════════════════════════════════════════════════════════════════════

/// Render note events into a complete SVG string.
///
/// The roll fills `options.width` × `options.height`; the key panel, when
/// shown, is added to the left of it.
pub fn render_roll_to_svg(data: &PianoRollData, options: &RenderOptions) -> String {
    let geometry = RollGeometry::fit(data, options.width, options.height);
    let panel = if options.show_key_panel {
        options.key_panel_width.max(0.0)
    } else {
        0.0
    };

    info!(
        width = geometry.width,
        height = geometry.height,
        scale_x = geometry.scale_x,
        low_pitch = geometry.low_pitch,
        high_pitch = geometry.high_pitch,
        notes = data.notes.len(),
        "rendering piano roll"
    );

    let grid = derive_grid(data, &geometry, options.shade_even_measures);
    let notes = layout_notes(data, &geometry, options);

    let total_width = panel + geometry.width;
    let mut svg = SvgBuilder::new(total_width, geometry.height);
    if let Some(title) = &data.title {
        svg.title(title);
    }
    svg.rect(0.0, 0.0, total_width, geometry.height, BACKGROUND_COLOR);

    svg.open_group("roll", panel, 0.0);
    render_grid(&mut svg, &grid, &geometry);
    svg.open_group("notes", 0.0, 0.0);
    for note in &notes {
        svg.titled_rect(
            note.x,
            note.y,
            note.width,
            note.height,
            &note.color,
            note.opacity,
            &note.tooltip(),
        );
    }
    svg.close_group();
    svg.close_group();

    if panel > 0.0 {
        let labels = layout_keys(data, &geometry);
        render_key_panel(&mut svg, &labels, panel, geometry.height);
    }

    svg.build()
}

/// Extract events from `tune` and render them.
pub fn render_tune_to_svg(tune: &Tune, options: &RenderOptions) -> String {
    let data = extract_events(tune, options.ticks_per_beat);
    render_roll_to_svg(&data, options)
}

// ═══════════════════════════════════════════════════════════════════════
// Drawing
// ═══════════════════════════════════════════════════════════════════════

fn render_grid(svg: &mut SvgBuilder, grid: &Grid, geometry: &RollGeometry) {
    let (w, h) = (geometry.width, geometry.height);

    svg.open_group("grid", 0.0, 0.0);
    for row in &grid.rows {
        let fill = if row.in_scale {
            GRID_ROW_IN_SCALE_COLOR
        } else {
            GRID_ROW_OUT_SCALE_COLOR
        };
        svg.rect(0.0, row.y, w, row.height, fill);
    }
    for shade in &grid.shading {
        svg.rect(shade.x, 0.0, shade.width, h, DARK_MEASURE_SHADING_COLOR);
    }
    for &y in &grid.pitch_lines {
        svg.line(0.0, y, w, y, KEY_SEPARATOR_COLOR, PITCH_LINE_WIDTH);
    }
    for &x in &grid.sixteenth_lines {
        svg.line(x, 0.0, x, h, GRID_LINE_COLOR, SIXTEENTH_LINE_WIDTH);
    }
    for &x in &grid.beat_lines {
        svg.line(x, 0.0, x, h, BEAT_LINE_COLOR, BEAT_LINE_WIDTH);
    }
    for &x in &grid.measure_lines {
        svg.line(x, 0.0, x, h, MEASURE_LINE_COLOR, MEASURE_LINE_WIDTH);
    }
    svg.close_group();
}

fn render_key_panel(svg: &mut SvgBuilder, labels: &[KeyLabel], width: f64, height: f64) {
    svg.open_group("keys", 0.0, 0.0);
    svg.rect(0.0, 0.0, width, height, BACKGROUND_COLOR);

    for key in labels {
        let (fill, key_width, text_color) = if key.black {
            (KEY_BLACK_COLOR, width * BLACK_KEY_WIDTH_RATIO, KEY_BLACK_TEXT_COLOR)
        } else if key.in_scale {
            (KEY_WHITE_COLOR, width, KEY_TEXT_COLOR)
        } else {
            (KEY_WHITE_COLOR, width, KEY_OUT_OF_SCALE_TEXT_COLOR)
        };
        svg.titled_rect(0.0, key.y, key_width, key.height, fill, 1.0, &key.title);
        if !key.black {
            let bottom = key.y + key.height;
            svg.line(0.0, bottom, width, bottom, KEY_SEPARATOR_COLOR, 1.0);
        }
        svg.text(
            key.indent,
            key.y + key.height / 2.0,
            &key.text,
            key.font_size,
            text_color,
            "start",
        );
    }

    svg.close_group();
}
