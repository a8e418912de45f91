//! Key signatures, scale membership and pitch resolution.
//!
//! ABC pitch text (`^G,`, `_B'`, `=c`) only becomes an absolute MIDI pitch
//! once the key signature and any accidentals earlier in the same bar are
//! known. [`PitchResolver`] carries that state while a voice is walked.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Sharp-spelled pitch-class names, indexed by `pitch % 12`.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

const LETTERS: [char; 7] = ['C', 'D', 'E', 'F', 'G', 'A', 'B'];
const NATURAL_SEMITONES: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];
/// Circle-of-fifths position of each natural letter's major key.
const LETTER_FIFTHS: [i32; 7] = [0, 2, 4, -1, 1, 3, 5];
const SHARP_ORDER: [char; 7] = ['F', 'C', 'G', 'D', 'A', 'E', 'B'];
const FLAT_ORDER: [char; 7] = ['B', 'E', 'A', 'D', 'G', 'C', 'F'];

const MAJOR_NAMES_BY_FIFTHS: [&str; 15] = [
    "Cb", "Gb", "Db", "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#",
];
const MINOR_NAMES_BY_FIFTHS: [&str; 15] = [
    "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#", "G#", "D#", "A#",
];

fn letter_index(letter: char) -> Option<usize> {
    LETTERS.iter().position(|&l| l == letter.to_ascii_uppercase())
}

// ─── Scale types ─────────────────────────────────────────────────────

/// Scale used for highlighting rows, keys and notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScaleType {
    Major,
    Minor,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Locrian,
    PentatonicMajor,
    PentatonicMinor,
    Blues,
    Chromatic,
    None,
}

impl ScaleType {
    /// Semitone offsets from the root.
    pub fn intervals(self) -> &'static [u8] {
        match self {
            ScaleType::Major => &[0, 2, 4, 5, 7, 9, 11],
            ScaleType::Minor => &[0, 2, 3, 5, 7, 8, 10],
            ScaleType::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            ScaleType::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            ScaleType::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            ScaleType::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            ScaleType::Locrian => &[0, 1, 3, 5, 6, 8, 10],
            ScaleType::PentatonicMajor => &[0, 2, 4, 7, 9],
            ScaleType::PentatonicMinor => &[0, 3, 5, 7, 10],
            ScaleType::Blues => &[0, 3, 5, 6, 7, 10],
            ScaleType::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
            ScaleType::None => &[],
        }
    }

    /// Shift from the root's major signature, in fifths.
    /// `None` when the scale carries no signature at all.
    fn signature_shift(self) -> Option<i32> {
        match self {
            ScaleType::Major
            | ScaleType::PentatonicMajor
            | ScaleType::Blues
            | ScaleType::Chromatic => Some(0),
            ScaleType::Minor | ScaleType::PentatonicMinor => Some(-3),
            ScaleType::Dorian => Some(-2),
            ScaleType::Phrygian => Some(-4),
            ScaleType::Lydian => Some(1),
            ScaleType::Mixolydian => Some(-1),
            ScaleType::Locrian => Some(-5),
            ScaleType::None => None,
        }
    }

    /// Match a normalized (lowercase, no spaces) mode string.
    fn from_mode(mode: &str) -> Option<Self> {
        let scale = match mode {
            "" | "maj" | "major" | "ion" | "ionian" => ScaleType::Major,
            "m" | "min" | "minor" | "aeo" | "aeolian" => ScaleType::Minor,
            "penta" | "pentatonicmajor" | "pentatonic" => ScaleType::PentatonicMajor,
            "pentatonicminor" => ScaleType::PentatonicMinor,
            "blues" => ScaleType::Blues,
            "chrom" | "chromatic" => ScaleType::Chromatic,
            _ => match mode.get(..3)? {
                "maj" | "ion" => ScaleType::Major,
                "min" | "aeo" => ScaleType::Minor,
                "dor" => ScaleType::Dorian,
                "phr" => ScaleType::Phrygian,
                "lyd" => ScaleType::Lydian,
                "mix" => ScaleType::Mixolydian,
                "loc" => ScaleType::Locrian,
                _ => return None,
            },
        };
        Some(scale)
    }

    /// Suffix used when writing the key back as ABC.
    fn abc_suffix(self) -> &'static str {
        match self {
            ScaleType::Minor | ScaleType::PentatonicMinor => "m",
            ScaleType::Blues => "blues",
            ScaleType::Dorian => "dor",
            ScaleType::Phrygian => "phr",
            ScaleType::Lydian => "lyd",
            ScaleType::Mixolydian => "mix",
            ScaleType::Locrian => "loc",
            _ => "",
        }
    }
}

// ─── Key signature ───────────────────────────────────────────────────

/// A key as written in a `K:` field (or a MusicXML `<key>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySignature {
    /// Pitch class of the tonic (0 = C)
    pub root: u8,
    /// Spelled tonic, e.g. "F#" or "Bb"
    pub root_name: String,
    /// Scale used for highlighting
    pub scale: ScaleType,
    /// Sharps (positive) or flats (negative) in the signature
    pub fifths: i32,
    /// `K:perc` — rows show drum names and every pitch counts as in scale
    pub percussion: bool,
}

impl Default for KeySignature {
    fn default() -> Self {
        Self {
            root: 0,
            root_name: "C".to_string(),
            scale: ScaleType::Major,
            fifths: 0,
            percussion: false,
        }
    }
}

impl KeySignature {
    /// Percussion key: no signature, no scale.
    pub fn percussion() -> Self {
        Self {
            scale: ScaleType::None,
            percussion: true,
            ..Self::default()
        }
    }

    /// Build a key from a circle-of-fifths position (MusicXML `<fifths>`).
    pub fn from_fifths(fifths: i32, minor: bool) -> Self {
        let fifths = fifths.clamp(-7, 7);
        let idx = (fifths + 7) as usize;
        let name = if minor {
            MINOR_NAMES_BY_FIFTHS[idx]
        } else {
            MAJOR_NAMES_BY_FIFTHS[idx]
        };
        let (root, _) = root_from_name(name).unwrap_or((0, 0));
        Self {
            root,
            root_name: name.to_string(),
            scale: if minor { ScaleType::Minor } else { ScaleType::Major },
            fifths,
            percussion: false,
        }
    }

    /// Build a key from `<fifths>` plus a `<mode>` word such as "dorian".
    /// Unknown modes read as major.
    pub fn from_fifths_and_mode(fifths: i32, mode: &str) -> Self {
        let mode = mode.trim().to_lowercase();
        let scale = ScaleType::from_mode(&mode).unwrap_or(ScaleType::Major);
        if matches!(scale, ScaleType::Major | ScaleType::Minor) {
            return Self::from_fifths(fifths, scale == ScaleType::Minor);
        }
        let shift = scale.signature_shift().unwrap_or(0);
        let fifths = fifths.clamp(-7, 7);
        let tonic = fifths - shift;
        if !(-7..=7).contains(&tonic) {
            return Self::from_fifths(fifths, false);
        }
        let name = MAJOR_NAMES_BY_FIFTHS[(tonic + 7) as usize];
        let (root, _) = root_from_name(name).unwrap_or((0, 0));
        Self {
            root,
            root_name: name.to_string(),
            scale,
            fifths,
            percussion: false,
        }
    }

    pub fn accidentals(&self) -> KeyAccidentals {
        KeyAccidentals::from_fifths(self.fifths)
    }

    pub fn highlight(&self) -> ScaleHighlight {
        ScaleHighlight::new(self.root, self.scale, self.percussion)
    }

    /// The key as an ABC `K:` value.
    pub fn abc_name(&self) -> String {
        if self.percussion {
            return "perc".to_string();
        }
        format!("{}{}", self.root_name, self.scale.abc_suffix())
    }
}

/// Pitch class and accidental of a spelled root such as "Eb".
fn root_from_name(name: &str) -> Option<(u8, i32)> {
    let mut chars = name.chars();
    let idx = letter_index(chars.next()?)?;
    let acc = match chars.next() {
        Some('#') => 1,
        Some('b') => -1,
        _ => 0,
    };
    let pc = (NATURAL_SEMITONES[idx] + acc).rem_euclid(12) as u8;
    Some((pc, acc))
}

/// Parse the value of a `K:` field (`G`, `F#m`, `Bb dorian`, `perc`,
/// `D clef=bass`, …).
pub fn parse_key_field(value: &str) -> KeySignature {
    let tokens: Vec<&str> = value.split_whitespace().collect();
    let Some(first) = tokens.first() else {
        return KeySignature::default();
    };

    let is_perc = |t: &&str| {
        let t = t.to_ascii_lowercase();
        t == "perc" || t == "clef=perc" || t == "clef=percussion"
    };
    if tokens.iter().any(is_perc) {
        debug!("percussion key detected");
        return KeySignature::percussion();
    }
    if first.eq_ignore_ascii_case("none") {
        return KeySignature::default();
    }

    let Some(letter) = first.chars().next() else {
        return KeySignature::default();
    };
    let letter = letter.to_ascii_uppercase();
    let Some(idx) = letter_index(letter) else {
        warn!(key = value, "unrecognized key root, defaulting to C major");
        return KeySignature::default();
    };

    let mut rest = &first[letter.len_utf8()..];
    let mut acc = 0;
    if let Some(stripped) = rest.strip_prefix('#') {
        acc = 1;
        rest = stripped;
    } else if let Some(stripped) = rest.strip_prefix('b') {
        // "Cblues" is C + blues, not C flat.
        if !stripped.to_ascii_lowercase().starts_with("lues") {
            acc = -1;
            rest = stripped;
        }
    }

    // Mode words run until the first attribute (`clef=…`) or explicit
    // accidental (`^f`).
    let mut mode = rest.to_string();
    for token in tokens.iter().skip(1) {
        if token.contains('=') || token.starts_with('^') || token.starts_with('_') {
            break;
        }
        mode.push_str(token);
    }
    let mode: String = mode
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    let scale = ScaleType::from_mode(&mode).unwrap_or_else(|| {
        warn!(mode = %mode, "unrecognized mode, defaulting to major scale");
        ScaleType::Major
    });

    let fifths = scale
        .signature_shift()
        .map(|shift| (LETTER_FIFTHS[idx] + 7 * acc + shift).clamp(-7, 7))
        .unwrap_or(0);

    let root_name = match acc {
        1 => format!("{letter}#"),
        -1 => format!("{letter}b"),
        _ => letter.to_string(),
    };

    KeySignature {
        root: (NATURAL_SEMITONES[idx] + acc).rem_euclid(12) as u8,
        root_name,
        scale,
        fifths,
        percussion: false,
    }
}

// ─── Accidentals ─────────────────────────────────────────────────────

/// How the key signature alters each natural letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyAccidentals {
    alterations: [i8; 7],
    pub prefer_flats: bool,
}

impl KeyAccidentals {
    pub fn from_fifths(fifths: i32) -> Self {
        let mut alterations = [0i8; 7];
        let count = fifths.unsigned_abs().min(7) as usize;
        let (order, alter) = if fifths >= 0 {
            (&SHARP_ORDER, 1)
        } else {
            (&FLAT_ORDER, -1)
        };
        for &letter in order.iter().take(count) {
            if let Some(idx) = letter_index(letter) {
                alterations[idx] = alter;
            }
        }
        Self {
            alterations,
            prefer_flats: fifths < 0,
        }
    }

    /// Signature alteration of a letter: +1 sharp, -1 flat, 0 natural.
    pub fn alteration(&self, letter: char) -> i8 {
        letter_index(letter).map_or(0, |i| self.alterations[i])
    }
}

/// Resolves ABC pitch text to MIDI while walking one voice.
#[derive(Debug, Clone)]
pub struct PitchResolver {
    key: KeyAccidentals,
    bar: HashMap<char, i8>,
}

impl PitchResolver {
    pub fn new(key: &KeySignature) -> Self {
        Self {
            key: key.accidentals(),
            bar: HashMap::new(),
        }
    }

    pub fn set_key(&mut self, key: &KeySignature) {
        self.key = key.accidentals();
    }

    /// A bar line: forget accidentals written in the previous bar.
    pub fn bar(&mut self) {
        self.bar.clear();
    }

    /// Alteration the resolver would apply to an unmarked `letter` right now.
    pub fn implied_alteration(&self, letter: char) -> i8 {
        let letter = letter.to_ascii_uppercase();
        self.bar
            .get(&letter)
            .copied()
            .unwrap_or_else(|| self.key.alteration(letter))
    }

    /// Record an explicit accidental for the rest of the bar.
    pub fn remember(&mut self, letter: char, alteration: i8) {
        self.bar.insert(letter.to_ascii_uppercase(), alteration);
    }

    /// Convert pitch text such as `^G,`, `_B'` or `=c` to a MIDI number.
    /// Text without a note letter resolves to middle C.
    pub fn resolve(&mut self, name: &str) -> u8 {
        let bytes = name.as_bytes();
        let mut pos = 0;
        let mut explicit: i32 = 0;
        while pos < bytes.len() && (bytes[pos] == b'^' || bytes[pos] == b'_') {
            explicit += if bytes[pos] == b'^' { 1 } else { -1 };
            pos += 1;
        }
        let mut natural = false;
        if pos < bytes.len() && bytes[pos] == b'=' {
            natural = true;
            explicit = 0;
            pos += 1;
        }

        let Some(offset) = name[pos..].find(|c: char| matches!(c, 'A'..='G' | 'a'..='g')) else {
            return 60;
        };
        pos += offset;
        let raw = bytes[pos] as char;
        let letter = raw.to_ascii_uppercase();
        let lower = raw.is_ascii_lowercase();
        pos += 1;

        let mut octave_shift = 0;
        while pos < bytes.len() {
            match bytes[pos] {
                b'\'' => octave_shift += 1,
                b',' => octave_shift -= 1,
                _ => break,
            }
            pos += 1;
        }

        let alteration = if explicit != 0 || natural {
            let a = explicit.clamp(-2, 2) as i8;
            self.remember(letter, a);
            a
        } else {
            self.implied_alteration(letter)
        };

        let base = if lower { 72 } else { 60 };
        let natural_semitone = letter_index(letter).map_or(0, |i| NATURAL_SEMITONES[i]);
        let midi = base + natural_semitone + alteration as i32 + octave_shift * 12;
        midi.clamp(0, 127) as u8
    }
}

// ─── Highlighting ────────────────────────────────────────────────────

/// Pitch classes belonging to the tune's scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScaleHighlight {
    pitch_classes: BTreeSet<u8>,
    percussion: bool,
}

impl ScaleHighlight {
    pub fn new(root: u8, scale: ScaleType, percussion: bool) -> Self {
        let pitch_classes = if percussion {
            BTreeSet::new()
        } else {
            scale
                .intervals()
                .iter()
                .map(|&interval| (root + interval) % 12)
                .collect()
        };
        Self {
            pitch_classes,
            percussion,
        }
    }

    pub fn is_in_scale(&self, pitch: u8) -> bool {
        self.percussion || self.pitch_classes.contains(&(pitch % 12))
    }

    pub fn pitch_classes(&self) -> impl Iterator<Item = u8> + '_ {
        self.pitch_classes.iter().copied()
    }
}

// ─── Spelling ────────────────────────────────────────────────────────

/// "C4"-style label, octave numbered so that MIDI 60 is C4.
pub fn pitch_label(pitch: u8) -> String {
    let octave = (pitch / 12) as i32 - 1;
    format!("{}{}", NOTE_NAMES[(pitch % 12) as usize], octave)
}

/// A MIDI pitch spelled as letter + alteration + scientific octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpelledPitch {
    pub letter: char,
    pub alteration: i8,
    pub octave: i32,
}

pub fn spell_pitch(midi: u8, prefer_flats: bool) -> SpelledPitch {
    const SHARP_SPELLING: [(char, i8); 12] = [
        ('C', 0), ('C', 1), ('D', 0), ('D', 1), ('E', 0), ('F', 0),
        ('F', 1), ('G', 0), ('G', 1), ('A', 0), ('A', 1), ('B', 0),
    ];
    const FLAT_SPELLING: [(char, i8); 12] = [
        ('C', 0), ('D', -1), ('D', 0), ('E', -1), ('E', 0), ('F', 0),
        ('G', -1), ('G', 0), ('A', -1), ('A', 0), ('B', -1), ('B', 0),
    ];
    let table = if prefer_flats { &FLAT_SPELLING } else { &SHARP_SPELLING };
    let (letter, alteration) = table[(midi % 12) as usize];
    SpelledPitch {
        letter,
        alteration,
        octave: (midi / 12) as i32 - 1,
    }
}
