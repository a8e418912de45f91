//! Standard MIDI File import.
//!
//! Every track that completes at least one note becomes a voice named
//! after its track-name meta event, tagged with its first channel and the
//! GM instrument of its first program change. A track whose first channel
//! is 10 is a drum track.

use std::collections::HashMap;

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use tracing::{debug, info, warn};

use super::DRUM_CHANNEL;
use crate::error::{RollError, RollResult};
use crate::events::{
    content_width, measure_ticks, pitch_range, NoteEvent, PianoRollData, VoiceInfo,
    DEFAULT_TICKS_PER_BEAT,
};
use crate::key::KeySignature;
use crate::model::{Meter, Tempo};

/// General MIDI program names, indexed by program number.
const GM_INSTRUMENTS: [&str; 128] = [
    "Acoustic Grand Piano", "Bright Acoustic Piano", "Electric Grand Piano", "Honky-tonk Piano",
    "Electric Piano 1", "Electric Piano 2", "Harpsichord", "Clavinet",
    "Celesta", "Glockenspiel", "Music Box", "Vibraphone",
    "Marimba", "Xylophone", "Tubular Bells", "Dulcimer",
    "Drawbar Organ", "Percussive Organ", "Rock Organ", "Church Organ",
    "Reed Organ", "Accordion", "Harmonica", "Tango Accordion",
    "Acoustic Guitar (nylon)", "Acoustic Guitar (steel)", "Electric Guitar (jazz)",
    "Electric Guitar (clean)", "Electric Guitar (muted)", "Overdriven Guitar",
    "Distortion Guitar", "Guitar Harmonics",
    "Acoustic Bass", "Electric Bass (finger)", "Electric Bass (pick)", "Fretless Bass",
    "Slap Bass 1", "Slap Bass 2", "Synth Bass 1", "Synth Bass 2",
    "Violin", "Viola", "Cello", "Contrabass",
    "Tremolo Strings", "Pizzicato Strings", "Orchestral Harp", "Timpani",
    "String Ensemble 1", "String Ensemble 2", "Synth Strings 1", "Synth Strings 2",
    "Choir Aahs", "Voice Oohs", "Synth Voice", "Orchestra Hit",
    "Trumpet", "Trombone", "Tuba", "Muted Trumpet",
    "French Horn", "Brass Section", "Synth Brass 1", "Synth Brass 2",
    "Soprano Sax", "Alto Sax", "Tenor Sax", "Baritone Sax",
    "Oboe", "English Horn", "Bassoon", "Clarinet",
    "Piccolo", "Flute", "Recorder", "Pan Flute",
    "Blown bottle", "Shakuhachi", "Whistle", "Ocarina",
    "Lead 1 (square)", "Lead 2 (sawtooth)", "Lead 3 (calliope)", "Lead 4 (chiff)",
    "Lead 5 (charang)", "Lead 6 (voice)", "Lead 7 (fifths)", "Lead 8 (bass + lead)",
    "Pad 1 (new age)", "Pad 2 (warm)", "Pad 3 (polysynth)", "Pad 4 (choir)",
    "Pad 5 (bowed)", "Pad 6 (metallic)", "Pad 7 (halo)", "Pad 8 (sweep)",
    "FX 1 (rain)", "FX 2 (soundtrack)", "FX 3 (crystal)", "FX 4 (atmosphere)",
    "FX 5 (brightness)", "FX 6 (goblins)", "FX 7 (echoes)", "FX 8 (sci-fi)",
    "Sitar", "Banjo", "Shamisen", "Koto",
    "Kalimba", "Bagpipe", "Fiddle", "Shanai",
    "Tinkle Bell", "Agogo", "Steel Drums", "Woodblock",
    "Taiko Drum", "Melodic Tom", "Synth Drum", "Reverse Cymbal",
    "Guitar Fret Noise", "Breath Noise", "Seashore", "Bird Tweet",
    "Telephone Ring", "Helicopter", "Applause", "Gunshot",
];

const DRUMS: &str = "Drums";

/// GM instrument name for a program number.
pub fn instrument_name(program: u8) -> &'static str {
    GM_INSTRUMENTS
        .get(program as usize)
        .copied()
        .unwrap_or("Unknown Instrument")
}

/// Name, first channel and first program change of one track.
#[derive(Debug, Default)]
struct TrackInfo {
    name: Option<String>,
    channel: Option<u8>,
    program: Option<u8>,
}

impl TrackInfo {
    fn scan(track: &[TrackEvent]) -> Self {
        let mut info = Self::default();
        for event in track {
            match event.kind {
                TrackEventKind::Midi { channel, message } => {
                    let channel = channel.as_int();
                    if let MidiMessage::ProgramChange { program } = message {
                        // Only the channel the track plays on counts.
                        let same_channel = info.channel.map_or(true, |c| c == channel);
                        if info.program.is_none() && same_channel {
                            info.program = Some(program.as_int());
                        }
                    }
                    info.channel.get_or_insert(channel);
                }
                TrackEventKind::Meta(MetaMessage::TrackName(name)) => {
                    let name = String::from_utf8_lossy(name).trim().to_string();
                    info.name = Some(name).filter(|n| !n.is_empty());
                }
                _ => {}
            }
        }
        info
    }

    fn is_drums(&self) -> bool {
        self.channel == Some(DRUM_CHANNEL)
    }

    fn voice(self, index: usize) -> VoiceInfo {
        let drums = self.is_drums();
        let instrument = if drums {
            Some(DRUMS.to_string())
        } else {
            self.program.map(|p| instrument_name(p).to_string())
        };
        VoiceInfo {
            id: index.to_string(),
            name: Some(self.name.unwrap_or_else(|| format!("Track {index}"))),
            instrument,
            channel: Some(self.channel.unwrap_or(0)),
            drums,
        }
    }
}

/// Completed notes of one track, in onset order. A note-on without a
/// matching note-off is dropped.
fn track_notes(track: &[TrackEvent], voice: usize) -> Vec<NoteEvent> {
    let mut tick: u32 = 0;
    // pitch → (start, velocity); the track is read as one instrument
    let mut sounding: HashMap<u8, (u32, u8)> = HashMap::new();
    let mut notes = Vec::new();

    for event in track {
        tick = tick.saturating_add(event.delta.as_int());
        let TrackEventKind::Midi { message, .. } = event.kind else {
            continue;
        };
        let (key, on_velocity) = match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                (key.as_int(), Some(vel.as_int()))
            }
            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                (key.as_int(), None)
            }
            _ => continue,
        };
        match on_velocity {
            Some(velocity) => {
                sounding.insert(key, (tick, velocity));
            }
            None => {
                if let Some((start, velocity)) = sounding.remove(&key) {
                    notes.push(NoteEvent {
                        pitch: key,
                        start_tick: start,
                        duration_ticks: tick - start,
                        velocity,
                        voice,
                    });
                }
            }
        }
    }

    if !sounding.is_empty() {
        debug!(voice, dangling = sounding.len(), "notes never released");
    }
    notes.sort_by_key(|n| n.start_tick);
    notes
}

fn ticks_per_beat(timing: Timing) -> u32 {
    match timing {
        Timing::Metrical(tpb) if tpb.as_int() > 0 => tpb.as_int() as u32,
        Timing::Metrical(_) => DEFAULT_TICKS_PER_BEAT,
        Timing::Timecode(fps, sub) => {
            warn!(?fps, sub, "timecode division, assuming default ticks per beat");
            DEFAULT_TICKS_PER_BEAT
        }
    }
}

/// First time signature in any track, or 4/4.
fn first_meter(smf: &Smf) -> Meter {
    let found = smf.tracks.iter().flatten().find_map(|event| match event.kind {
        TrackEventKind::Meta(MetaMessage::TimeSignature(num, den_pow, _, _)) => {
            Some((num, den_pow))
        }
        _ => None,
    });
    match found {
        Some((num, den_pow)) => Meter {
            beats: if num > 0 { num as u32 } else { 4 },
            beat_type: 1u32.checked_shl(den_pow as u32).unwrap_or(4),
        },
        None => {
            warn!("no time signature found, using 4/4");
            Meter::default()
        }
    }
}

fn first_tempo(smf: &Smf) -> Option<Tempo> {
    smf.tracks.iter().flatten().find_map(|event| match event.kind {
        TrackEventKind::Meta(MetaMessage::Tempo(uspq)) if uspq.as_int() > 0 => Some(Tempo {
            bpm: 60_000_000.0 / uspq.as_int() as f64,
        }),
        _ => None,
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Public API
// ═══════════════════════════════════════════════════════════════════════

/// Read a Standard MIDI File into piano-roll data.
///
/// Ticks keep the file's own division. Tracks without a completed note are
/// skipped. The key is C major, or percussion when the first kept track is
/// a drum track, so its rows are labelled with drum names.
pub fn parse_midi(bytes: &[u8]) -> RollResult<PianoRollData> {
    let smf = Smf::parse(bytes).map_err(|e| RollError::midi(e.to_string()))?;
    let ticks_per_beat = ticks_per_beat(smf.header.timing);
    let meter = first_meter(&smf);

    let mut notes = Vec::new();
    let mut voices = Vec::new();
    for (index, track) in smf.tracks.iter().enumerate() {
        let track_notes = track_notes(track, voices.len());
        let info = TrackInfo::scan(track);
        if track_notes.is_empty() {
            info!(track = index, name = ?info.name, "track skipped, no notes");
            continue;
        }
        notes.extend(track_notes);
        voices.push(info.voice(index));
    }

    let last_end = notes.iter().map(NoteEvent::end_tick).max().unwrap_or(0);
    let (min_pitch, max_pitch) = pitch_range(&notes);
    let key = if voices.first().is_some_and(|v| v.drums) {
        KeySignature::percussion()
    } else {
        KeySignature::default()
    };

    debug!(
        tracks = smf.tracks.len(),
        voices = voices.len(),
        notes = notes.len(),
        ticks_per_beat,
        "parsed midi file"
    );

    Ok(PianoRollData {
        title: None,
        notes,
        min_pitch,
        max_pitch,
        width_ticks: content_width(last_end, ticks_per_beat),
        ticks_per_beat,
        ticks_per_measure: measure_ticks(ticks_per_beat, meter),
        meter,
        tempo: first_tempo(&smf),
        highlight: key.highlight(),
        key,
        voices,
    })
}
