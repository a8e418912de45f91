//! Key panel: one label per visible pitch row, piano keys for pitched
//! tunes and General MIDI drum names for percussion.

use serde::Serialize;

use super::constants::*;
use super::geometry::RollGeometry;
use crate::events::PianoRollData;
use crate::key::pitch_label;

/// General MIDI percussion names for notes 35–81.
const GM_DRUM_NAMES: [&str; 47] = [
    "Aco Bass Drum", "Bass Drum 1", "Side Stick", "Aco Snare",
    "Hand Clap", "Ele Snare", "Low Floor Tom", "Closed HiHat",
    "High Floor Tom", "Pedal HiHat", "Low Tom", "Open HiHat",
    "Low-Mid Tom", "Hi-Mid Tom", "Crash Cymbal1", "High Tom",
    "Ride Cymbal 1", "Chinese Cymbal", "Ride Bell", "Tambourine",
    "Splash Cymbal", "Cowbell", "Crash Cymbal2", "Vibraslap",
    "Ride Cymbal 2", "Hi Bongo", "Low Bongo", "Mute Hi Conga",
    "Open Hi Conga", "Low Conga", "High Timbale", "Low Timbale",
    "High Agogo", "Low Agogo", "Cabasa", "Maracas",
    "Short Whistle", "Long Whistle", "Short Guiro", "Long Guiro",
    "Claves", "Hi Wood Block", "Low Wood Block", "Mute Cuica",
    "Open Cuica", "Mute Triangle", "Open Triangle",
];
const GM_DRUM_FIRST: u8 = 35;

/// General MIDI drum name for a percussion note, if it has one.
pub fn drum_name(pitch: u8) -> Option<&'static str> {
    let idx = pitch.checked_sub(GM_DRUM_FIRST)? as usize;
    GM_DRUM_NAMES.get(idx).copied()
}

pub fn is_black_key(pitch: u8) -> bool {
    matches!(pitch % 12, 1 | 3 | 6 | 8 | 10)
}

/// A row label in the key panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyLabel {
    pub pitch: u8,
    /// Top of the key, centered in its row like the note bars
    pub y: f64,
    pub height: f64,
    /// Visible text (`C4`, `Closed HiHat`, `P 20`)
    pub text: String,
    /// Hover text
    pub title: String,
    pub black: bool,
    pub in_scale: bool,
    /// Left padding of the text
    pub indent: f64,
    pub font_size: f64,
}

/// One label per rendered pitch that is a valid MIDI note, low to high.
pub fn layout_keys(data: &PianoRollData, geometry: &RollGeometry) -> Vec<KeyLabel> {
    let height = geometry.bar_height();
    let font_size = (height * KEY_FONT_RATIO).clamp(KEY_FONT_MIN, KEY_FONT_MAX);

    geometry
        .visible_pitches()
        .map(|pitch| {
            let in_scale = data.is_in_scale(pitch);
            let y = geometry.bar_top(pitch as i32);

            if data.is_percussion() {
                let name = drum_name(pitch);
                KeyLabel {
                    pitch,
                    y,
                    height,
                    text: name.map_or_else(|| format!("P {pitch}"), str::to_string),
                    title: format!("{pitch}: {}", name.unwrap_or("Unknown Drum")),
                    black: false,
                    in_scale,
                    indent: DRUM_INDENT,
                    font_size,
                }
            } else {
                let black = is_black_key(pitch);
                let label = pitch_label(pitch);
                let scale_text = if in_scale { "In Scale" } else { "Out of Scale" };
                KeyLabel {
                    pitch,
                    y,
                    height,
                    title: format!("Note {pitch} ({label}) - {scale_text}"),
                    text: label,
                    black,
                    in_scale,
                    indent: if black { BLACK_KEY_INDENT } else { WHITE_KEY_INDENT },
                    font_size,
                }
            }
        })
        .collect()
}
