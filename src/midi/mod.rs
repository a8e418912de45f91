//! Standard MIDI Files: export of flattened note events, and import of
//! existing files as piano-roll data (see [`reader`]).
//!
//! Export produces an SMF Type 1 as raw bytes. Track 0 is the tempo map;
//! each voice follows on its own track and channel. Percussion tunes play
//! every voice on the GM drum channel.

mod reader;

use tracing::debug;

use crate::events::{PianoRollData, VoiceInfo};

pub use reader::{instrument_name, parse_midi};

/// Used when the tune gives no `Q:` / `<sound tempo>`.
pub const DEFAULT_BPM: f64 = 120.0;
/// GM percussion channel (0-based).
pub const DRUM_CHANNEL: u8 = 9;

/// A single MIDI event (note on/off, meta, …).
#[derive(Debug, Clone)]
pub struct MidiEvent {
    /// Absolute time in ticks from the start of the track
    pub tick: u32,
    /// Raw MIDI message bytes (status + data)
    pub bytes: Vec<u8>,
}

impl MidiEvent {
    /// Note-offs sort ahead of note-ons on the same tick so repeated
    /// pitches retrigger cleanly.
    fn order(&self) -> (u32, u8) {
        let is_note_on = self.bytes.first().is_some_and(|s| s & 0xF0 == 0x90);
        (self.tick, u8::from(is_note_on))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Public API
// ═══════════════════════════════════════════════════════════════════════

/// Channel for the voice with render index `voice`: voices fill channels
/// 0–15 in order, skipping the drum channel, unless the tune is percussion.
pub fn voice_channel(voice: usize, percussion: bool) -> u8 {
    if percussion {
        return DRUM_CHANNEL;
    }
    let slot = (voice % 15) as u8;
    if slot >= DRUM_CHANNEL {
        slot + 1
    } else {
        slot
    }
}

/// Channel a voice is written on: the channel an imported track came from,
/// else the next free one.
fn channel_for(info: Option<&VoiceInfo>, voice: usize, percussion: bool) -> u8 {
    match info {
        Some(info) if info.drums => DRUM_CHANNEL,
        Some(VoiceInfo {
            channel: Some(channel),
            ..
        }) => channel & 0x0F,
        _ => voice_channel(voice, percussion),
    }
}

/// Encode the events as a complete SMF Type 1 file. The division is the
/// data's `ticks_per_beat`, so event ticks are written unchanged.
pub fn events_to_midi(data: &PianoRollData) -> Vec<u8> {
    let bpm = data
        .tempo
        .map(|t| t.bpm)
        .filter(|b| *b > 0.0)
        .unwrap_or(DEFAULT_BPM);
    let division = data.ticks_per_beat.clamp(1, 0x7FFF) as u16;

    let voice_count = data
        .notes
        .iter()
        .map(|n| n.voice + 1)
        .max()
        .unwrap_or(0)
        .max(data.voices.len());

    let mut tracks = vec![build_tempo_track(data, bpm)];
    for voice in 0..voice_count {
        let info = data.voices.get(voice);
        let channel = channel_for(info, voice, data.is_percussion());
        let mut events = Vec::new();
        for note in data.notes.iter().filter(|n| n.voice == voice) {
            let velocity = note.velocity.clamp(1, 127);
            events.push(MidiEvent {
                tick: note.start_tick,
                bytes: vec![0x90 | channel, note.pitch, velocity],
            });
            events.push(MidiEvent {
                tick: note.end_tick(),
                bytes: vec![0x80 | channel, note.pitch, 0],
            });
        }
        let name = info
            .map(|v| v.label().to_string())
            .unwrap_or_else(|| format!("Voice {}", voice + 1));
        tracks.push(encode_track(&events, &name));
    }

    debug!(
        tracks = tracks.len(),
        notes = data.notes.len(),
        bpm,
        division,
        "encoded midi"
    );
    build_smf(&tracks, division)
}

// ═══════════════════════════════════════════════════════════════════════
// SMF byte encoding
// ═══════════════════════════════════════════════════════════════════════

/// Build the complete Standard MIDI File bytes.
fn build_smf(tracks: &[Vec<u8>], division: u16) -> Vec<u8> {
    let mut out = Vec::new();

    // MThd header
    out.extend_from_slice(b"MThd");
    out.extend_from_slice(&6u32.to_be_bytes()); // header length
    out.extend_from_slice(&1u16.to_be_bytes()); // format type 1
    out.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    out.extend_from_slice(&division.to_be_bytes());

    for track_data in tracks {
        out.extend_from_slice(b"MTrk");
        out.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
        out.extend_from_slice(track_data);
    }

    out
}

/// Track 0: one tempo and one time signature meta event.
fn build_tempo_track(data: &PianoRollData, bpm: f64) -> Vec<u8> {
    let uspq = (60_000_000.0 / bpm).round() as u32; // microseconds per quarter
    let denominator_power = data.meter.beat_type.max(1).ilog2() as u8;
    let events = [
        // FF 51 03 tt tt tt
        MidiEvent {
            tick: 0,
            bytes: vec![
                0xFF,
                0x51,
                0x03,
                ((uspq >> 16) & 0xFF) as u8,
                ((uspq >> 8) & 0xFF) as u8,
                (uspq & 0xFF) as u8,
            ],
        },
        // FF 58 04 nn dd cc bb
        MidiEvent {
            tick: 0,
            bytes: vec![
                0xFF,
                0x58,
                0x04,
                data.meter.beats.min(255) as u8,
                denominator_power,
                24,
                8,
            ],
        },
    ];
    encode_track(&events, data.title.as_deref().unwrap_or("Tempo"))
}

/// Encode a track's events into raw MTrk bytes (delta-time encoded).
fn encode_track(events: &[MidiEvent], name: &str) -> Vec<u8> {
    let mut data = Vec::new();

    // Track name meta event
    let name_bytes = name.as_bytes();
    data.push(0x00); // delta time 0
    data.push(0xFF);
    data.push(0x03); // track name
    write_vlq(&mut data, name_bytes.len() as u32);
    data.extend_from_slice(name_bytes);

    let mut sorted: Vec<&MidiEvent> = events.iter().collect();
    sorted.sort_by_key(|e| e.order());

    let mut last_tick: u32 = 0;
    for event in &sorted {
        let delta = event.tick.saturating_sub(last_tick);
        write_vlq(&mut data, delta);
        data.extend_from_slice(&event.bytes);
        last_tick = event.tick;
    }

    // End of track
    data.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);

    data
}

/// Write a variable-length quantity (VLQ) to a byte vector.
fn write_vlq(out: &mut Vec<u8>, mut value: u32) {
    if value == 0 {
        out.push(0);
        return;
    }
    let mut buf = [0u8; 5];
    let mut i = 0;
    while value > 0 {
        buf[i] = (value & 0x7F) as u8;
        value >>= 7;
        if i > 0 {
            buf[i] |= 0x80;
        }
        i += 1;
    }
    // Write in reverse order
    for j in (0..i).rev() {
        out.push(buf[j]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abc::parse_abc;
    use crate::events::extract_events;
    use pretty_assertions::assert_eq;

    fn vlq(value: u32) -> Vec<u8> {
        let mut out = Vec::new();
        write_vlq(&mut out, value);
        out
    }

    /// Split an SMF into its track chunks.
    fn tracks(smf: &[u8]) -> Vec<&[u8]> {
        let mut chunks = Vec::new();
        let mut pos = 14;
        while pos + 8 <= smf.len() {
            assert_eq!(&smf[pos..pos + 4], b"MTrk");
            let len = u32::from_be_bytes([smf[pos + 4], smf[pos + 5], smf[pos + 6], smf[pos + 7]]);
            let len = len as usize;
            chunks.push(&smf[pos + 8..pos + 8 + len]);
            pos += 8 + len;
        }
        chunks
    }

    #[test]
    fn vlq_encoding() {
        assert_eq!(vlq(0), vec![0x00]);
        assert_eq!(vlq(0x7F), vec![0x7F]);
        assert_eq!(vlq(0x80), vec![0x81, 0x00]);
        assert_eq!(vlq(480), vec![0x83, 0x60]);
        assert_eq!(vlq(0x0FFF_FFFF), vec![0xFF, 0xFF, 0xFF, 0x7F]);
    }

    #[test]
    fn channels_skip_the_drum_channel() {
        let channels: Vec<u8> = (0..17).map(|v| voice_channel(v, false)).collect();
        assert_eq!(
            channels,
            vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 10, 11, 12, 13, 14, 15, 0, 1]
        );
        assert_eq!(voice_channel(3, true), DRUM_CHANNEL);
    }

    #[test]
    fn header_and_tempo() {
        let tune = parse_abc("X:1\nM:3/4\nL:1/4\nQ:1/4=100\nK:C\nCDE|").unwrap();
        let data = extract_events(&tune, 480);
        let smf = events_to_midi(&data);
        assert_eq!(&smf[0..4], b"MThd");
        assert_eq!(u16::from_be_bytes([smf[8], smf[9]]), 1);
        assert_eq!(u16::from_be_bytes([smf[10], smf[11]]), 2);
        assert_eq!(u16::from_be_bytes([smf[12], smf[13]]), 480);

        let chunks = tracks(&smf);
        assert_eq!(chunks.len(), 2);
        // 600000 µs per quarter, then 3/4.
        let tempo = &chunks[0];
        let at = tempo.windows(3).position(|w| w == [0xFF, 0x51, 0x03]).unwrap();
        assert_eq!(&tempo[at + 3..at + 6], &[0x09, 0x27, 0xC0]);
        let at = tempo.windows(3).position(|w| w == [0xFF, 0x58, 0x04]).unwrap();
        assert_eq!(&tempo[at + 3..at + 5], &[3, 2]);
    }

    #[test]
    fn notes_become_on_off_pairs() {
        let data = extract_events(&parse_abc("X:1\nL:1/4\nK:C\nCC|").unwrap(), 480);
        let smf = events_to_midi(&data);
        let melody = tracks(&smf)[1];
        let body_start = 3 + 1 + melody[3] as usize;
        assert_eq!(
            &melody[body_start..],
            &[
                0x00, 0x90, 60, 100, // on at 0
                0x83, 0x60, 0x80, 60, 0, // off at 480
                0x00, 0x90, 60, 100, // retrigger
                0x83, 0x60, 0x80, 60, 0, // off at 960
                0x00, 0xFF, 0x2F, 0x00,
            ]
        );
    }

    #[test]
    fn percussion_uses_the_drum_channel() {
        let data = extract_events(&parse_abc("X:1\nK:perc\nC,,").unwrap(), 480);
        let smf = events_to_midi(&data);
        let track = tracks(&smf)[1];
        assert!(track.windows(2).any(|w| w == [0x99, 36]));
    }

    #[test]
    fn imported_tracks_keep_their_channels() {
        let tune = parse_abc("X:1\nV:1\nV:2\nK:C\nV:1\nC\nV:2\nE").unwrap();
        let mut data = extract_events(&tune, 480);
        data.voices[0].channel = Some(4);
        data.voices[1].drums = true;
        let smf = events_to_midi(&data);
        let chunks = tracks(&smf);
        assert!(chunks[1].windows(2).any(|w| w == [0x94, 60]));
        assert!(chunks[2].windows(2).any(|w| w == [0x99, 64]));
    }
}
