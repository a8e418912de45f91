//! Shared constants for the piano-roll renderer (all in SVG user units).

// ── Geometry ────────────────────────────────────────────────────────
pub(super) const PIXELS_PER_TICK_BASE: f64 = 0.05;
pub(super) const PADDING_PITCHES: i32 = 2; // empty rows above and below the content
pub(super) const NOTE_VERTICAL_GAP: f64 = 1.0;
pub(super) const MIN_SCALE_X: f64 = 0.01;
pub(super) const FALLBACK_WIDTH: f64 = 300.0;
pub(super) const FALLBACK_HEIGHT: f64 = 150.0;

// ── Grid thresholds (minimum pixel spacing before a level is drawn) ─
pub(super) const MIN_SIXTEENTH_SPACING: f64 = 2.5;
pub(super) const MIN_BEAT_SPACING: f64 = 2.0;
pub(super) const MIN_MEASURE_SPACING: f64 = 0.5;

// ── Stroke widths ───────────────────────────────────────────────────
pub(super) const PITCH_LINE_WIDTH: f64 = 0.5;
pub(super) const SIXTEENTH_LINE_WIDTH: f64 = 0.25;
pub(super) const BEAT_LINE_WIDTH: f64 = 0.5;
pub(super) const MEASURE_LINE_WIDTH: f64 = 1.0;

// ── Notes ───────────────────────────────────────────────────────────
pub(super) const MIN_OPACITY: f64 = 0.3;
pub(super) const MUTED_OPACITY: f64 = 0.6;

// ── Key panel ───────────────────────────────────────────────────────
pub(super) const KEY_FONT_MIN: f64 = 6.0;
pub(super) const KEY_FONT_MAX: f64 = 10.0;
pub(super) const KEY_FONT_RATIO: f64 = 0.6;
pub(super) const WHITE_KEY_INDENT: f64 = 5.0;
pub(super) const BLACK_KEY_INDENT: f64 = 15.0;
pub(super) const DRUM_INDENT: f64 = 6.0;
pub(super) const BLACK_KEY_WIDTH_RATIO: f64 = 0.65;

// ── Colors (dark theme) ─────────────────────────────────────────────
pub(super) const BACKGROUND_COLOR: &str = "#1e1e1e";
pub(super) const NOTE_IN_SCALE_COLOR: &str = "#6cb2f5";
pub(super) const NOTE_OUT_SCALE_COLOR: &str = "#ffb74d";
pub(super) const MUTED_NOTE_COLOR: &str = "#888888";
pub(super) const GRID_ROW_IN_SCALE_COLOR: &str = "rgba(63, 107, 173, 0.1)";
pub(super) const GRID_ROW_OUT_SCALE_COLOR: &str = "rgba(139, 74, 26, 0.1)";
pub(super) const GRID_LINE_COLOR: &str = "#404040";
pub(super) const BEAT_LINE_COLOR: &str = "#555";
pub(super) const MEASURE_LINE_COLOR: &str = "#777";
pub(super) const DARK_MEASURE_SHADING_COLOR: &str = "rgba(0, 0, 0, 0.04)";
pub(super) const KEY_WHITE_COLOR: &str = "#3a3a3a";
pub(super) const KEY_BLACK_COLOR: &str = "#1a1a1a";
pub(super) const KEY_SEPARATOR_COLOR: &str = "#444";
pub(super) const KEY_TEXT_COLOR: &str = "#e0e0e0";
pub(super) const KEY_BLACK_TEXT_COLOR: &str = "#cccccc";
pub(super) const KEY_OUT_OF_SCALE_TEXT_COLOR: &str = "#8a8a8a";

/// Palette handed out in voice order when per-voice coloring is asked for.
pub const DEFAULT_VOICE_COLORS: [&str; 5] = ["#6cb2f5", "#ffb74d", "#8e44ad", "#2ecc71", "#f1c40f"];
