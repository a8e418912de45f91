//! Render settings, loadable from a JSON file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RollError, RollResult};
use crate::events::DEFAULT_TICKS_PER_BEAT;

/// Largest division a Standard MIDI File header can carry.
pub const MAX_TICKS_PER_BEAT: u32 = 0x7FFF;

/// How a piano roll is drawn. Every field has a default, so a config file
/// only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Width of the roll area in SVG units (key panel excluded)
    pub width: f64,
    /// Height of the roll area in SVG units
    pub height: f64,
    pub ticks_per_beat: u32,
    /// Render index of the voice drawn in color; `None` colors every voice
    pub highlight_voice: Option<usize>,
    /// Per-voice palette replacing the in/out-of-scale colors
    pub voice_colors: Option<Vec<String>>,
    /// Shade measures 0, 2, 4… (true) or 1, 3, 5… (false)
    pub shade_even_measures: bool,
    pub show_key_panel: bool,
    pub key_panel_width: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 240.0,
            ticks_per_beat: DEFAULT_TICKS_PER_BEAT,
            highlight_voice: Some(0),
            voice_colors: None,
            shade_even_measures: true,
            show_key_panel: true,
            key_panel_width: 64.0,
        }
    }
}

impl RenderOptions {
    pub fn from_json(text: &str) -> RollResult<Self> {
        let options: Self = serde_json::from_str(text)?;
        options.validate()?;
        Ok(options)
    }

    /// Reject sizes no viewport could use. Zero is allowed and falls back
    /// to the default viewport at render time.
    pub fn validate(&self) -> RollResult<()> {
        for (name, value) in [
            ("width", self.width),
            ("height", self.height),
            ("key_panel_width", self.key_panel_width),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(RollError::render(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if !(1..=MAX_TICKS_PER_BEAT).contains(&self.ticks_per_beat) {
            return Err(RollError::render(format!(
                "ticks_per_beat must be between 1 and {MAX_TICKS_PER_BEAT}, got {}",
                self.ticks_per_beat
            )));
        }
        if self.voice_colors.as_ref().is_some_and(|c| c.is_empty()) {
            return Err(RollError::render("voice_colors must not be empty"));
        }
        Ok(())
    }

    pub fn load(path: &Path) -> RollResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| RollError::io(path, e))?;
        Self::from_json(&text)
    }
}
