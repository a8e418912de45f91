//! abcroll — ABC notation parser and static piano-roll renderer.
//!
//! Reads ABC text (and MusicXML / compressed MXL), flattens every voice into
//! timed note events and draws them as a self-contained SVG piano roll.
//! Standard MIDI Files load straight into the same event model.
//! Analysis documents that embed `<abc>…</abc>` blocks can be rendered to
//! HTML pages, and a whole dataset of them to a static site.
//!
//! # Example
//! ```no_run
//! use abcroll::{load_tune, render_tune_to_svg, RenderOptions};
//!
//! let tune = load_tune("tunes/kesh.abc").unwrap();
//! println!("Title: {:?}", tune.title);
//! println!("Voices: {}", tune.voices.len());
//! let svg = render_tune_to_svg(&tune, &RenderOptions::default());
//! std::fs::write("kesh.svg", svg).unwrap();
//! ```

pub mod abc;
pub mod analysis;
pub mod convert;
pub mod dataset;
pub mod error;
pub mod events;
pub mod key;
pub mod midi;
pub mod model;
pub mod musicxml;
pub mod mxl;
pub mod options;
pub mod page;
pub mod renderer;
pub mod site;

use std::path::Path;

use tracing::debug;

pub use abc::{parse_abc, parse_abc_book};
pub use analysis::{abc_blocks, split_analysis, AbcBlock, Segment};
pub use convert::{convert_dir, write_abc, ConversionSummary};
pub use dataset::{Dataset, Example, IndexItem};
pub use error::{RollError, RollResult};
pub use events::{extract_events, NoteEvent, PianoRollData, VoiceInfo, DEFAULT_TICKS_PER_BEAT};
pub use key::{KeySignature, ScaleHighlight, ScaleType};
pub use midi::{events_to_midi, parse_midi};
pub use model::*;
pub use musicxml::parse_musicxml;
pub use mxl::parse_mxl;
pub use options::RenderOptions;
pub use page::{render_analysis_page, render_index_page, render_roll_page, IndexEntry};
pub use renderer::{render_legend, render_roll_to_svg, render_tune_to_svg};
pub use site::{build_site, SiteSummary};

/// Load a tune from a file path.
/// Automatically detects format based on file extension:
/// - `.abc` → ABC notation (first tune of the file)
/// - `.musicxml` or `.xml` → uncompressed MusicXML
/// - `.mxl` → compressed MXL (ZIP archive)
pub fn load_tune<P: AsRef<Path>>(path: P) -> RollResult<Tune> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| RollError::io(path, e))?;
    debug!(path = %path.display(), bytes = data.len(), "loading tune");
    parse_bytes(&data, extension(path).as_deref())
}

/// Load any supported file as piano-roll data.
///
/// Standard MIDI Files (`.mid`, `.midi`, or anything starting with an
/// `MThd` header) keep their own division and are titled after the file
/// stem. Every other format goes through [`load_tune`] and is flattened at
/// `ticks_per_beat`.
pub fn load_roll<P: AsRef<Path>>(path: P, ticks_per_beat: u32) -> RollResult<PianoRollData> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| RollError::io(path, e))?;
    let extension = extension(path);
    debug!(path = %path.display(), bytes = data.len(), "loading piano roll");

    if !is_midi(&data, extension.as_deref()) {
        let tune = parse_bytes(&data, extension.as_deref())?;
        return Ok(extract_events(&tune, ticks_per_beat));
    }
    let mut roll = parse_midi(&data)?;
    roll.title = path.file_stem().and_then(|s| s.to_str()).map(str::to_string);
    Ok(roll)
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn is_midi(data: &[u8], extension: Option<&str>) -> bool {
    matches!(extension, Some("mid") | Some("midi")) || data.starts_with(b"MThd")
}

/// Parse a tune from raw bytes with an optional format hint.
/// If `extension` is None or unknown, the format is sniffed: ZIP archives
/// are MXL, documents starting with `<` are MusicXML, anything else is ABC.
pub fn parse_bytes(data: &[u8], extension: Option<&str>) -> RollResult<Tune> {
    if is_midi(data, extension) {
        return Err(RollError::midi(
            "standard MIDI files carry no notation; load them with load_roll",
        ));
    }
    match extension {
        Some("mxl") => parse_mxl(data),
        Some("musicxml") | Some("xml") => parse_musicxml(utf8(data)?),
        Some("abc") => parse_abc(utf8(data)?),
        _ => {
            if data.starts_with(b"PK\x03\x04") {
                return parse_mxl(data);
            }
            let text = utf8(data)?;
            if text.trim_start().starts_with('<') {
                parse_musicxml(text)
            } else {
                parse_abc(text)
            }
        }
    }
}

fn utf8(data: &[u8]) -> RollResult<&str> {
    // Skip a UTF-8 byte order mark.
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    std::str::from_utf8(data)
        .map_err(|e| RollError::xml(format!("input is not valid UTF-8: {e}")))
}

/// Convert a parsed tune to a JSON string.
pub fn tune_to_json(tune: &Tune) -> RollResult<String> {
    Ok(serde_json::to_string_pretty(tune)?)
}

/// Load any supported file (MIDI included) and render it directly to SVG.
pub fn render_file_to_svg<P: AsRef<Path>>(path: P, options: &RenderOptions) -> RollResult<String> {
    let roll = load_roll(path, options.ticks_per_beat)?;
    Ok(render_roll_to_svg(&roll, options))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_formats_without_a_hint() {
        let abc = parse_bytes(b"X:1\nT:Sniffed\nK:C\nCDE", None).unwrap();
        assert_eq!(abc.title.as_deref(), Some("Sniffed"));

        let xml = b"<?xml version=\"1.0\"?><score-partwise><part-list/></score-partwise>";
        assert!(parse_bytes(xml, None).unwrap().voices.is_empty());

        assert!(matches!(parse_bytes(b"PK\x03\x04junk", None), Err(RollError::Archive(_))));
        assert!(matches!(parse_bytes(b"MThd", None), Err(RollError::Midi(_))));
        assert!(matches!(parse_bytes(b"X:1", Some("mid")), Err(RollError::Midi(_))));
    }

    #[test]
    fn extension_hint_wins_and_bom_is_skipped() {
        let tune = parse_bytes(b"\xEF\xBB\xBFX:1\nK:G\nG", Some("abc")).unwrap();
        assert_eq!(tune.note_count(), 1);
        assert!(parse_bytes(b"X:1\nK:C\nC", Some("xml")).is_err());
    }

    #[test]
    fn tune_json_has_voices() {
        let tune = parse_abc("X:1\nK:C\nC").unwrap();
        let json = tune_to_json(&tune).unwrap();
        assert!(json.contains("\"voices\""));
        assert!(json.contains("\"type\": \"note\""));
    }
}
