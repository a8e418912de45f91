//! Note bars: position, size, color and opacity of every note event.

use serde::Serialize;

use super::constants::*;
use super::geometry::RollGeometry;
use crate::events::{NoteEvent, PianoRollData};
use crate::key::pitch_label;
use crate::options::RenderOptions;

/// A laid-out note bar, in roll coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: String,
    pub opacity: f64,
    pub pitch: u8,
    pub voice: usize,
    pub start_tick: u32,
    pub duration_ticks: u32,
}

impl NoteRect {
    /// Tooltip text, e.g. `E4 · voice 1 · tick 480 (+240)`.
    pub fn tooltip(&self) -> String {
        format!(
            "{} · voice {} · tick {} (+{})",
            pitch_label(self.pitch),
            self.voice + 1,
            self.start_tick,
            self.duration_ticks
        )
    }
}

fn velocity_opacity(velocity: u8) -> f64 {
    (velocity as f64 / 127.0).clamp(MIN_OPACITY, 1.0)
}

fn note_color(data: &PianoRollData, note: &NoteEvent, options: &RenderOptions) -> String {
    match options.voice_colors.as_deref() {
        Some(palette) if !palette.is_empty() => palette[note.voice % palette.len()].clone(),
        _ if data.is_in_scale(note.pitch) => NOTE_IN_SCALE_COLOR.to_string(),
        _ => NOTE_OUT_SCALE_COLOR.to_string(),
    }
}

/// Place every note of `data`. Notes of the highlighted voice (or of every
/// voice when nothing is highlighted) are colored and faded by velocity;
/// the rest are drawn muted grey.
pub fn layout_notes(
    data: &PianoRollData,
    geometry: &RollGeometry,
    options: &RenderOptions,
) -> Vec<NoteRect> {
    let height = geometry.bar_height();

    data.notes
        .iter()
        .map(|note| {
            let highlighted = options.highlight_voice.map_or(true, |v| v == note.voice);
            let (color, opacity) = if highlighted {
                (note_color(data, note, options), velocity_opacity(note.velocity))
            } else {
                (MUTED_NOTE_COLOR.to_string(), MUTED_OPACITY)
            };

            NoteRect {
                x: geometry.tick_to_x(note.start_tick as f64),
                y: geometry.bar_top(note.pitch as i32),
                width: geometry.ticks_to_width(note.duration_ticks as f64).max(1.0),
                height,
                color,
                opacity,
                pitch: note.pitch,
                voice: note.voice,
                start_tick: note.start_tick,
                duration_ticks: note.duration_ticks,
            }
        })
        .collect()
}
