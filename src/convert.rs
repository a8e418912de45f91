//! MusicXML → ABC conversion.
//!
//! [`write_abc`] prints a [`Tune`] back as ABC text; [`convert_dir`] runs
//! it over a directory tree of `.musicxml`, `.xml` and `.mxl` files.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{RollError, RollResult};
use crate::key::{spell_pitch, KeySignature, PitchResolver};
use crate::model::*;

const BARS_PER_LINE: usize = 4;
const CONVERTIBLE: [&str; 3] = ["musicxml", "xml", "mxl"];

// ═══════════════════════════════════════════════════════════════════════
// Tune → ABC text
// ═══════════════════════════════════════════════════════════════════════

/// Write `tune` as a single ABC tune.
pub fn write_abc(tune: &Tune) -> String {
    let mut out = String::new();
    out.push_str(&format!("X:{}\n", tune.reference.unwrap_or(1)));
    if let Some(title) = &tune.title {
        out.push_str(&format!("T:{}\n", single_line(title)));
    }
    if let Some(composer) = &tune.composer {
        out.push_str(&format!("C:{}\n", single_line(composer)));
    }
    out.push_str(&format!("M:{}/{}\n", tune.meter.beats, tune.meter.beat_type));
    out.push_str(&format!("L:{}\n", fraction(tune.unit_length)));
    if let Some(tempo) = &tune.tempo {
        out.push_str(&format!("Q:1/4={}\n", tempo.bpm.round() as i64));
    }
    out.push_str(&format!("K:{}\n", tune.key.abc_name()));

    let multi_voice = tune.voices.len() > 1;
    for voice in &tune.voices {
        if multi_voice {
            out.push_str(&format!("V:{}", voice_id(&voice.id)));
            if let Some(name) = &voice.name {
                let name = single_line(name).replace('"', "'");
                out.push_str(&format!(" name=\"{name}\""));
            }
            out.push('\n');
        }
        out.push_str(&VoiceWriter::new(tune).write(voice));
    }
    out
}

/// ABC voice ids cannot contain whitespace.
fn voice_id(id: &str) -> String {
    id.split_whitespace().collect::<Vec<_>>().join("_")
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `0.125` → `1/8`.
fn fraction(value: f64) -> String {
    let (num, den) = ratio(value);
    format!("{num}/{den}")
}

/// Closest small fraction to `value`, preferring binary denominators.
fn ratio(value: f64) -> (u64, u64) {
    const DENOMINATORS: [u64; 12] = [1, 2, 4, 8, 16, 32, 64, 3, 6, 12, 24, 48];
    let value = value.max(0.0);
    let den = DENOMINATORS
        .iter()
        .copied()
        .find(|&d| {
            let scaled = value * d as f64;
            (scaled - scaled.round()).abs() < 1e-6
        })
        .unwrap_or(64);
    let num = (value * den as f64).round() as u64;
    let g = gcd(num, den);
    (num / g, den / g)
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a.max(1)
    } else {
        gcd(b, a % b)
    }
}

/// Length suffix for a duration in whole notes: `""`, `2`, `/`, `3/2`, …
fn length_suffix(duration: f64, unit: f64) -> String {
    let (num, den) = ratio(duration / unit);
    match (num, den) {
        (1, 1) => String::new(),
        (n, 1) => n.to_string(),
        (1, 2) => "/".to_string(),
        (1, d) => format!("/{d}"),
        (n, d) => format!("{n}/{d}"),
    }
}

/// Prints one voice, tracking the accidentals a reader would infer.
struct VoiceWriter {
    unit: f64,
    key: KeySignature,
    /// Resolves pitch names from ABC sources
    reader: PitchResolver,
    /// Mirrors what a reader of the output will assume
    written: PitchResolver,
    bars: usize,
}

impl VoiceWriter {
    fn new(tune: &Tune) -> Self {
        let unit = if tune.unit_length > 0.0 {
            tune.unit_length
        } else {
            tune.meter.default_unit_length()
        };
        Self {
            unit,
            key: tune.key.clone(),
            reader: PitchResolver::new(&tune.key),
            written: PitchResolver::new(&tune.key),
            bars: 0,
        }
    }

    fn write(mut self, voice: &Voice) -> String {
        let mut out = String::new();
        for element in &voice.elements {
            match element {
                Element::Note(note) => {
                    if note.duration > 0.0 && !note.pitches.is_empty() {
                        out.push_str(&self.note(note));
                        out.push(' ');
                    }
                }
                Element::Rest(rest) => {
                    if rest.duration > 0.0 {
                        let symbol = if rest.invisible { 'x' } else { 'z' };
                        let length = length_suffix(rest.duration, self.unit);
                        out.push_str(&format!("{symbol}{length} "));
                    }
                }
                Element::Bar => {
                    self.reader.bar();
                    self.written.bar();
                    self.bars += 1;
                    out.push('|');
                    out.push(if self.bars % BARS_PER_LINE == 0 { '\n' } else { ' ' });
                }
                Element::KeyChange(key) => {
                    self.reader.set_key(key);
                    self.written.set_key(key);
                    self.key = key.clone();
                    out.push_str(&format!("[K:{}] ", key.abc_name()));
                }
            }
        }
        let mut out = out.trim_end().to_string();
        out.push('\n');
        out
    }

    fn note(&mut self, note: &NoteElement) -> String {
        let length = length_suffix(note.duration, self.unit);
        if let [pitch] = note.pitches.as_slice() {
            let tie = if pitch.tie { "-" } else { "" };
            return format!("{}{length}{tie}", self.pitch(pitch));
        }

        let mut chord = String::from("[");
        for pitch in &note.pitches {
            chord.push_str(&self.pitch(pitch));
            if pitch.tie {
                chord.push('-');
            }
        }
        chord.push(']');
        chord.push_str(&length);
        chord
    }

    /// Spell one pitch, writing an accidental only where the key and the
    /// bar so far would imply a different one.
    fn pitch(&mut self, pitch: &NotePitch) -> String {
        let midi = match (pitch.midi, &pitch.name) {
            (Some(midi), _) => midi,
            (None, Some(name)) => self.reader.resolve(name),
            (None, None) => 60,
        };

        let spelled = spell_pitch(midi, self.key.accidentals().prefer_flats);
        let mut text = String::new();
        if spelled.alteration != self.written.implied_alteration(spelled.letter) {
            text.push_str(match spelled.alteration {
                1 => "^",
                -1 => "_",
                _ => "=",
            });
            self.written.remember(spelled.letter, spelled.alteration);
        }

        if spelled.octave >= 5 {
            text.push(spelled.letter.to_ascii_lowercase());
            for _ in 5..spelled.octave {
                text.push('\'');
            }
        } else {
            text.push(spelled.letter);
            for _ in spelled.octave..4 {
                text.push(',');
            }
        }
        text
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Batch conversion
// ═══════════════════════════════════════════════════════════════════════

/// Counts from a [`convert_dir`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionSummary {
    pub found: usize,
    pub attempted: usize,
    pub failed: usize,
}

impl ConversionSummary {
    pub fn succeeded(&self) -> bool {
        self.failed == 0
    }
}

fn is_convertible(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| CONVERTIBLE.contains(&e.as_str()))
}

/// Convertible files under `dir`, depth first, sorted within each directory.
fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> RollResult<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| RollError::io(dir, e))?
        .flatten()
        .map(|entry| entry.path())
        .collect();
    entries.sort();

    for path in entries {
        if path.is_dir() {
            collect_files(&path, files)?;
        } else if is_convertible(&path) {
            files.push(path);
        }
    }
    Ok(())
}

fn convert_file(path: &Path, output: &Path) -> RollResult<PathBuf> {
    let tune = crate::load_tune(path)?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("tune");
    let target = output.join(format!("{stem}.abc"));
    std::fs::write(&target, write_abc(&tune)).map_err(|e| RollError::io(&target, e))?;
    Ok(target)
}

/// Convert every MusicXML/MXL file below `input` into `<stem>.abc` inside
/// `output`. Files that fail are logged and counted; only problems with the
/// directories themselves are errors.
pub fn convert_dir(input: &Path, output: &Path) -> RollResult<ConversionSummary> {
    if !input.is_dir() {
        return Err(RollError::io(
            input,
            std::io::Error::new(std::io::ErrorKind::NotFound, "input is not a directory"),
        ));
    }
    std::fs::create_dir_all(output).map_err(|e| RollError::io(output, e))?;

    let mut files = Vec::new();
    collect_files(input, &mut files)?;
    info!(
        input = %input.display(),
        output = %output.display(),
        files = files.len(),
        "starting conversion"
    );

    let mut summary = ConversionSummary {
        found: files.len(),
        ..ConversionSummary::default()
    };
    for path in &files {
        summary.attempted += 1;
        match convert_file(path, output) {
            Ok(target) => info!(from = %path.display(), to = %target.display(), "converted"),
            Err(e) => {
                error!(file = %path.display(), error = %e, "conversion failed");
                summary.failed += 1;
            }
        }
    }

    if summary.found == 0 {
        warn!(input = %input.display(), "no MusicXML files found");
    }
    info!(
        found = summary.found,
        attempted = summary.attempted,
        failed = summary.failed,
        "conversion finished"
    );
    Ok(summary)
}
