//! Flatten a parsed tune into timed note events.
//!
//! Every voice keeps its own clock; voices get a stable render index in
//! order of first appearance so colors and highlighting never shuffle.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::key::{KeySignature, PitchResolver, ScaleHighlight};
use crate::model::{Element, Meter, Tempo, Tune};

/// Ticks per quarter note unless the caller asks otherwise.
pub const DEFAULT_TICKS_PER_BEAT: u32 = 480;
pub const PITCH_MIN: u8 = 0;
pub const PITCH_MAX: u8 = 127;
const DEFAULT_VELOCITY: u8 = 100;
/// Pitch range shown when a tune has no notes at all (C4–C5).
const EMPTY_RANGE: (u8, u8) = (60, 72);

/// One sounding note on the piano roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteEvent {
    pub pitch: u8,
    pub start_tick: u32,
    pub duration_ticks: u32,
    pub velocity: u8,
    /// Render index of the voice
    pub voice: usize,
}

impl NoteEvent {
    pub fn end_tick(&self) -> u32 {
        self.start_tick.saturating_add(self.duration_ticks)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VoiceInfo {
    pub id: String,
    pub name: Option<String>,
    /// GM instrument of an imported MIDI track ("Drums" on channel 10)
    pub instrument: Option<String>,
    /// First channel an imported MIDI track plays on (0-based)
    pub channel: Option<u8>,
    pub drums: bool,
}

impl VoiceInfo {
    /// Name shown in track lists: the voice name, else its id.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Everything the renderer needs to paint one tune.
#[derive(Debug, Clone, Serialize)]
pub struct PianoRollData {
    pub title: Option<String>,
    pub notes: Vec<NoteEvent>,
    /// Lowest pitch with a note (or 60 for an empty tune)
    pub min_pitch: u8,
    /// Highest pitch with a note (or 72 for an empty tune)
    pub max_pitch: u8,
    /// End of the latest note or rest
    pub width_ticks: u32,
    pub ticks_per_beat: u32,
    pub ticks_per_measure: u32,
    pub meter: Meter,
    pub tempo: Option<Tempo>,
    pub key: KeySignature,
    pub highlight: ScaleHighlight,
    /// Voices in render-index order
    pub voices: Vec<VoiceInfo>,
}

impl PianoRollData {
    pub fn is_percussion(&self) -> bool {
        self.key.percussion
    }

    pub fn is_in_scale(&self, pitch: u8) -> bool {
        self.highlight.is_in_scale(pitch)
    }

    /// Number of notes played by the voice with render index `voice`.
    pub fn voice_note_count(&self, voice: usize) -> usize {
        self.notes.iter().filter(|n| n.voice == voice).count()
    }
}

/// Ticks in one measure of `meter`.
pub(crate) fn measure_ticks(ticks_per_beat: u32, meter: Meter) -> u32 {
    let quarters = 4.0 / meter.beat_type.max(1) as f64 * meter.beats as f64;
    (ticks_per_beat as f64 * quarters).round() as u32
}

/// Lowest and highest pitch of `notes`, or C4–C5 when there are none.
pub(crate) fn pitch_range(notes: &[NoteEvent]) -> (u8, u8) {
    let low = notes.iter().map(|n| n.pitch).min();
    let high = notes.iter().map(|n| n.pitch).max();
    low.zip(high).unwrap_or(EMPTY_RANGE)
}

/// Right edge of the content: `last_end`, or one 4/4 bar when nothing
/// sounds.
pub(crate) fn content_width(last_end: u32, ticks_per_beat: u32) -> u32 {
    if last_end > 0 {
        last_end
    } else {
        ticks_per_beat.saturating_mul(4)
    }
}

/// Walk every voice of `tune` and produce absolute-tick note events.
///
/// Clocks saturate at `u32::MAX`, so absurd durations squash the tail of a
/// voice instead of wrapping.
pub fn extract_events(tune: &Tune, ticks_per_beat: u32) -> PianoRollData {
    let ticks_per_beat = ticks_per_beat.max(1);
    let ticks_per_whole = ticks_per_beat as f64 * 4.0;
    let to_ticks = |duration: f64| {
        let ticks = (duration * ticks_per_whole).round();
        if ticks.is_finite() {
            ticks.clamp(0.0, u32::MAX as f64) as u32
        } else {
            0
        }
    };

    let mut notes: Vec<NoteEvent> = Vec::new();
    let mut last_end: u32 = 0;

    for (voice_index, voice) in tune.voices.iter().enumerate() {
        let mut tick: u32 = 0;
        let mut resolver = PitchResolver::new(&tune.key);
        // pitch → index of the event a tie would extend
        let mut open_ties: HashMap<u8, usize> = HashMap::new();

        for element in &voice.elements {
            match element {
                Element::Bar => resolver.bar(),
                Element::KeyChange(key) => resolver.set_key(key),
                Element::Rest(rest) => {
                    tick = tick.saturating_add(to_ticks(rest.duration));
                    open_ties.clear();
                    last_end = last_end.max(tick);
                }
                Element::Note(note) => {
                    let duration_ticks = to_ticks(note.duration);
                    let mut next_ties = HashMap::new();

                    for pitch in &note.pitches {
                        let midi = match (&pitch.name, pitch.midi) {
                            (Some(name), _) => resolver.resolve(name),
                            (None, Some(midi)) => midi,
                            (None, None) => continue,
                        };
                        if midi > PITCH_MAX {
                            continue;
                        }

                        let continued = open_ties
                            .get(&midi)
                            .copied()
                            .filter(|&idx| notes[idx].end_tick() == tick);
                        let idx = match continued {
                            Some(idx) => {
                                let note = &mut notes[idx];
                                note.duration_ticks =
                                    note.duration_ticks.saturating_add(duration_ticks);
                                idx
                            }
                            None => {
                                notes.push(NoteEvent {
                                    pitch: midi,
                                    start_tick: tick,
                                    duration_ticks,
                                    velocity: note.velocity.unwrap_or(DEFAULT_VELOCITY),
                                    voice: voice_index,
                                });
                                notes.len() - 1
                            }
                        };
                        if pitch.tie {
                            next_ties.insert(midi, idx);
                        }
                    }

                    open_ties = next_ties;
                    tick = tick.saturating_add(duration_ticks);
                    last_end = last_end.max(tick);
                }
            }
        }
    }

    let (min_pitch, max_pitch) = pitch_range(&notes);
    let width_ticks = content_width(last_end, ticks_per_beat);
    let meter = tune.meter;
    let ticks_per_measure = measure_ticks(ticks_per_beat, meter);

    debug!(
        notes = notes.len(),
        voices = tune.voices.len(),
        width_ticks,
        min_pitch,
        max_pitch,
        "extracted piano roll events"
    );

    PianoRollData {
        title: tune.title.clone(),
        notes,
        min_pitch,
        max_pitch,
        width_ticks,
        ticks_per_beat,
        ticks_per_measure,
        meter,
        tempo: tune.tempo,
        key: tune.key.clone(),
        highlight: tune.key.highlight(),
        voices: tune
            .voices
            .iter()
            .map(|v| VoiceInfo {
                id: v.id.clone(),
                name: v.name.clone(),
                ..VoiceInfo::default()
            })
            .collect(),
    }
}
