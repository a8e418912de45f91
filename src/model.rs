//! Data model for a parsed tune.
//!
//! Both the ABC parser and the MusicXML importer produce these structures;
//! the event extractor flattens them into timed notes for the piano roll.

use serde::{Deserialize, Serialize};

use crate::key::KeySignature;

/// A complete tune.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tune {
    /// Reference number (`X:`)
    pub reference: Option<u32>,
    /// Title of the piece (first `T:`)
    pub title: Option<String>,
    /// Composer (`C:`)
    pub composer: Option<String>,
    /// Time signature in effect at the start of the tune
    pub meter: Meter,
    /// Default note length in whole notes (`L:`)
    pub unit_length: f64,
    /// Key signature in effect at the start of the tune
    pub key: KeySignature,
    /// Tempo (`Q:`)
    pub tempo: Option<Tempo>,
    /// Voices in order of first appearance
    pub voices: Vec<Voice>,
}

/// Time signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meter {
    /// Numerator (e.g., 3 in 3/4)
    pub beats: u32,
    /// Denominator (e.g., 4 in 3/4)
    pub beat_type: u32,
}

/// Tempo in quarter notes per minute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tempo {
    pub bpm: f64,
}

/// One independent line of music.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voice {
    /// Voice identifier (`V:` id, or "P1"-style for imported parts)
    pub id: String,
    /// Display name (`name="…"`)
    pub name: Option<String>,
    /// Ordered musical elements
    pub elements: Vec<Element>,
}

/// A musical element within a voice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    Note(NoteElement),
    Rest(RestElement),
    /// Bar line; clears bar-local accidentals
    Bar,
    /// Key change in the middle of a voice
    KeyChange(KeySignature),
}

/// A note or chord.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteElement {
    /// One pitch for a single note, several for a chord
    pub pitches: Vec<NotePitch>,
    /// Duration in whole notes
    pub duration: f64,
    /// MIDI velocity from the most recent dynamic marking
    pub velocity: Option<u8>,
}

/// Pitch of a single note head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotePitch {
    /// Raw ABC pitch text such as "^G," (accidental, letter, octave marks)
    pub name: Option<String>,
    /// Absolute MIDI pitch, when the importer already knows it
    pub midi: Option<u8>,
    /// Tied to the next note of the same pitch
    pub tie: bool,
}

/// A rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestElement {
    /// Duration in whole notes
    pub duration: f64,
    /// `x` rests take time but are not printed
    pub invisible: bool,
}

impl Default for Meter {
    fn default() -> Self {
        Self {
            beats: 4,
            beat_type: 4,
        }
    }
}

impl Meter {
    /// Length of one measure in whole notes.
    pub fn measure_length(&self) -> f64 {
        self.beats as f64 / self.beat_type.max(1) as f64
    }

    /// Default `L:` when the tune does not give one.
    pub fn default_unit_length(&self) -> f64 {
        if self.measure_length() < 0.75 {
            1.0 / 16.0
        } else {
            1.0 / 8.0
        }
    }
}

impl Tune {
    /// Create an empty tune with 4/4, L:1/8, C major.
    pub fn new() -> Self {
        Self {
            reference: None,
            title: None,
            composer: None,
            meter: Meter::default(),
            unit_length: 1.0 / 8.0,
            key: KeySignature::default(),
            tempo: None,
            voices: Vec::new(),
        }
    }

    /// Find a voice by id, creating it at the end if it does not exist yet.
    pub fn voice_mut(&mut self, id: &str) -> &mut Voice {
        let idx = match self.voices.iter().position(|v| v.id == id) {
            Some(idx) => idx,
            None => {
                self.voices.push(Voice::new(id));
                self.voices.len() - 1
            }
        };
        &mut self.voices[idx]
    }

    /// Number of note elements (chords count once) across all voices.
    pub fn note_count(&self) -> usize {
        self.voices
            .iter()
            .flat_map(|v| &v.elements)
            .filter(|e| matches!(e, Element::Note(_)))
            .count()
    }

    /// True when no voice contains a note or rest.
    pub fn is_empty(&self) -> bool {
        self.voices
            .iter()
            .flat_map(|v| &v.elements)
            .all(|e| !matches!(e, Element::Note(_) | Element::Rest(_)))
    }
}

impl Default for Tune {
    fn default() -> Self {
        Self::new()
    }
}

impl Voice {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            elements: Vec::new(),
        }
    }

    /// Total duration of notes and rests, in whole notes.
    pub fn duration(&self) -> f64 {
        self.elements
            .iter()
            .map(|e| match e {
                Element::Note(n) => n.duration,
                Element::Rest(r) => r.duration,
                _ => 0.0,
            })
            .sum()
    }
}

impl NotePitch {
    /// A pitch written as ABC text, resolved later against the key.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            midi: None,
            tie: false,
        }
    }

    /// A pitch whose MIDI number is already known.
    pub fn absolute(midi: u8) -> Self {
        Self {
            name: None,
            midi: Some(midi),
            tie: false,
        }
    }
}
