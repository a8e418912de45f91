//! ABC notation parser — converts ABC text into the Tune data model.
//!
//! Covers the subset of ABC 2.1 needed to place notes in time: header
//! fields, voices, notes, chords, rests, lengths, broken rhythm, tuplets,
//! ties, bar lines and inline fields. Ornaments, grace notes, chord
//! symbols and lyrics are skipped.

mod body;
mod header;

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::{RollError, RollResult};
use crate::key::parse_key_field;
use crate::model::*;

pub use header::{parse_meter, parse_tempo, parse_unit_length};

/// Parse ABC text and return its first tune.
pub fn parse_abc(text: &str) -> RollResult<Tune> {
    let mut tunes = parse_abc_book(text)?;
    Ok(tunes.remove(0))
}

/// Parse ABC text containing one or more tunes separated by `X:` fields.
/// The result is never empty.
pub fn parse_abc_book(text: &str) -> RollResult<Vec<Tune>> {
    let mut tunes = Vec::new();
    let mut builder = TuneBuilder::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        match split_field(line) {
            Some((letter, value)) => {
                if letter == 'X' && builder.started {
                    tunes.push(builder.finish());
                    builder = TuneBuilder::new();
                }
                builder.field(letter, value, line_no)?;
            }
            None => builder.music_line(line, line_no)?,
        }
    }

    if builder.started {
        tunes.push(builder.finish());
    }
    if tunes.is_empty() {
        return Err(RollError::abc(1, "no tune found"));
    }
    Ok(tunes)
}

/// Remove a trailing `%` comment; `%%` directive lines vanish entirely.
fn strip_comment(line: &str) -> &str {
    if line.trim_start().starts_with("%%") {
        return "";
    }
    let mut prev = '\0';
    for (idx, c) in line.char_indices() {
        if c == '%' && prev != '\\' {
            return &line[..idx];
        }
        prev = c;
    }
    line
}

/// `T:Title` → `('T', "Title")`.
fn split_field(line: &str) -> Option<(char, &str)> {
    let mut chars = line.chars();
    let letter = chars.next()?;
    if letter.is_ascii_alphabetic() && chars.next() == Some(':') {
        Some((letter, line[2..].trim()))
    } else {
        None
    }
}

/// Velocity for a dynamic marking decoration.
fn dynamic_velocity(decoration: &str) -> Option<u8> {
    let velocity = match decoration {
        "pppp" => 15,
        "ppp" => 30,
        "pp" => 45,
        "p" => 60,
        "mp" => 75,
        "mf" => 90,
        "f" => 105,
        "ff" => 120,
        "fff" | "ffff" => 127,
        _ => return None,
    };
    Some(velocity)
}

// ─── Builder ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Tuplet {
    factor: f64,
    remaining: u32,
}

/// Per-voice parsing state.
#[derive(Debug, Clone)]
struct VoiceState {
    unit_length: f64,
    velocity: Option<u8>,
    tuplet: Option<Tuplet>,
    broken_next: Option<f64>,
    /// Inside a `&` overlay: drop material until the next bar line
    overlay_skip: bool,
}

impl VoiceState {
    fn new(unit_length: f64) -> Self {
        Self {
            unit_length,
            velocity: None,
            tuplet: None,
            broken_next: None,
            overlay_skip: false,
        }
    }
}

pub(crate) struct TuneBuilder {
    tune: Tune,
    started: bool,
    in_body: bool,
    unit_length_set: bool,
    current_voice: Option<String>,
    states: HashMap<String, VoiceState>,
    overlay_warned: bool,
}

impl TuneBuilder {
    fn new() -> Self {
        Self {
            tune: Tune::new(),
            started: false,
            in_body: false,
            unit_length_set: false,
            current_voice: None,
            states: HashMap::new(),
            overlay_warned: false,
        }
    }

    fn finish(mut self) -> Tune {
        if !self.in_body {
            self.start_body();
        }
        // Voices declared in the header but never used carry no information.
        self.tune.voices.retain(|v| !v.elements.is_empty());
        debug!(
            title = self.tune.title.as_deref().unwrap_or("untitled"),
            voices = self.tune.voices.len(),
            notes = self.tune.note_count(),
            "parsed abc tune"
        );
        self.tune
    }

    fn start_body(&mut self) {
        self.in_body = true;
        if !self.unit_length_set {
            self.tune.unit_length = self.tune.meter.default_unit_length();
        }
    }

    fn has_timed_content(&self) -> bool {
        !self.tune.is_empty()
    }

    pub(crate) fn field(&mut self, letter: char, value: &str, line_no: usize) -> RollResult<()> {
        self.started = true;
        match letter {
            'X' => self.tune.reference = value.parse().ok(),
            'T' => {
                if self.tune.title.is_none() && !value.is_empty() {
                    self.tune.title = Some(value.to_string());
                }
            }
            'C' => {
                if self.tune.composer.is_none() && !value.is_empty() {
                    self.tune.composer = Some(value.to_string());
                }
            }
            'M' => {
                if self.has_timed_content() {
                    debug!(line = line_no, "meter change after the first note is not tracked");
                } else {
                    self.tune.meter = parse_meter(value);
                }
            }
            'L' => match parse_unit_length(value) {
                Some(length) if self.in_body => self.state().unit_length = length,
                Some(length) => {
                    self.tune.unit_length = length;
                    self.unit_length_set = true;
                }
                None => warn!(line = line_no, value, "unreadable unit length"),
            },
            'Q' => {
                if self.tune.tempo.is_none() {
                    self.tune.tempo = parse_tempo(value);
                }
            }
            'K' => {
                let key = parse_key_field(value);
                if self.in_body {
                    self.push(Element::KeyChange(key));
                } else {
                    self.tune.key = key;
                    self.start_body();
                }
            }
            'V' => {
                let Some((id, name)) = header::parse_voice(value) else {
                    return Err(RollError::abc(line_no, "voice field without an id"));
                };
                let voice = self.tune.voice_mut(&id);
                if name.is_some() {
                    voice.name = name;
                }
                if self.in_body {
                    self.current_voice = Some(id);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn music_line(&mut self, line: &str, line_no: usize) -> RollResult<()> {
        self.started = true;
        if !self.in_body {
            self.start_body();
        }
        body::parse_music_line(self, line, line_no)
    }

    // ─── Voice access ────────────────────────────────────────────────

    fn voice_id(&mut self) -> String {
        if let Some(id) = &self.current_voice {
            return id.clone();
        }
        let id = self
            .tune
            .voices
            .first()
            .map(|v| v.id.clone())
            .unwrap_or_else(|| "1".to_string());
        self.current_voice = Some(id.clone());
        id
    }

    fn state(&mut self) -> &mut VoiceState {
        let id = self.voice_id();
        let unit_length = self.tune.unit_length;
        self.states
            .entry(id)
            .or_insert_with(|| VoiceState::new(unit_length))
    }

    fn push(&mut self, element: Element) {
        let id = self.voice_id();
        self.tune.voice_mut(&id).elements.push(element);
    }

    fn last_timed_mut(&mut self) -> Option<&mut Element> {
        let id = self.voice_id();
        self.tune
            .voice_mut(&id)
            .elements
            .iter_mut()
            .rev()
            .find(|e| matches!(e, Element::Note(_) | Element::Rest(_)))
    }

    /// Duration of the next note or rest, consuming pending broken rhythm
    /// and tuplet state.
    fn timed(&mut self, multiplier: f64) -> f64 {
        let state = self.state();
        let mut duration = state.unit_length * multiplier;
        if let Some(factor) = state.broken_next.take() {
            duration *= factor;
        }
        if let Some(tuplet) = state.tuplet.as_mut() {
            duration *= tuplet.factor;
            tuplet.remaining = tuplet.remaining.saturating_sub(1);
            if tuplet.remaining == 0 {
                state.tuplet = None;
            }
        }
        duration
    }

    // ─── Element emission (called from the body scanner) ─────────────

    fn emit_note(&mut self, pitches: Vec<NotePitch>, multiplier: f64) {
        if self.state().overlay_skip {
            return;
        }
        let duration = self.timed(multiplier);
        let velocity = self.state().velocity;
        self.push(Element::Note(NoteElement {
            pitches,
            duration,
            velocity,
        }));
    }

    fn emit_rest(&mut self, multiplier: f64, invisible: bool) {
        if self.state().overlay_skip {
            return;
        }
        let duration = self.timed(multiplier);
        self.push(Element::Rest(RestElement {
            duration,
            invisible,
        }));
    }

    fn emit_measure_rest(&mut self, measures: u32) {
        if self.state().overlay_skip {
            return;
        }
        let duration = self.tune.meter.measure_length() * measures.max(1) as f64;
        self.push(Element::Rest(RestElement {
            duration,
            invisible: false,
        }));
    }

    fn emit_bar(&mut self) {
        self.state().overlay_skip = false;
        self.push(Element::Bar);
    }

    fn tie_last(&mut self) {
        if let Some(Element::Note(note)) = self.last_timed_mut() {
            for pitch in &mut note.pitches {
                pitch.tie = true;
            }
        }
    }

    /// `>` (or `<` with the factors swapped): lengthen the previous note,
    /// shorten the next one.
    fn apply_broken(&mut self, previous: f64, next: f64) {
        match self.last_timed_mut() {
            Some(Element::Note(note)) => note.duration *= previous,
            Some(Element::Rest(rest)) => rest.duration *= previous,
            _ => return,
        }
        self.state().broken_next = Some(next);
    }

    /// `(p:q:r` — put p notes into the time of q for the next r notes.
    fn start_tuplet(&mut self, p: u32, q: Option<u32>, r: Option<u32>) {
        if p == 0 {
            return;
        }
        let compound = self.tune.meter.beat_type == 8 && self.tune.meter.beats % 3 == 0;
        let q = q.filter(|&q| q > 0).unwrap_or(match p {
            2 | 4 | 8 => 3,
            3 | 6 => 2,
            _ if compound => 3,
            _ => 2,
        });
        let r = r.filter(|&r| r > 0).unwrap_or(p);
        self.state().tuplet = Some(Tuplet {
            factor: q as f64 / p as f64,
            remaining: r,
        });
    }

    fn set_dynamic(&mut self, velocity: u8) {
        self.state().velocity = Some(velocity);
    }

    fn overlay(&mut self, line_no: usize) {
        if !self.overlay_warned {
            warn!(line = line_no, "voice overlay '&' is not supported; overlaid notes dropped");
            self.overlay_warned = true;
        }
        self.state().overlay_skip = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ScaleType;
    use pretty_assertions::assert_eq;

    fn durations(voice: &Voice) -> Vec<f64> {
        voice
            .elements
            .iter()
            .filter_map(|e| match e {
                Element::Note(n) => Some(n.duration),
                Element::Rest(r) => Some(r.duration),
                _ => None,
            })
            .collect()
    }

    fn names(voice: &Voice) -> Vec<String> {
        voice
            .elements
            .iter()
            .filter_map(|e| match e {
                Element::Note(n) => Some(
                    n.pitches
                        .iter()
                        .filter_map(|p| p.name.clone())
                        .collect::<Vec<_>>()
                        .join(" "),
                ),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn parses_header_fields() {
        let abc = "X:7\nT:Speed the Plough\nT:Alt title\nC:Trad\n\
                   M:6/8\nL:1/8\nQ:3/8=120\nK:Gm\nGAB|";
        let tune = parse_abc(abc).unwrap();
        assert_eq!(tune.reference, Some(7));
        assert_eq!(tune.title.as_deref(), Some("Speed the Plough"));
        assert_eq!(tune.composer.as_deref(), Some("Trad"));
        assert_eq!(tune.meter, Meter { beats: 6, beat_type: 8 });
        assert_eq!(tune.unit_length, 0.125);
        assert_eq!(tune.tempo, Some(Tempo { bpm: 180.0 }));
        assert_eq!(tune.key.scale, ScaleType::Minor);
        assert_eq!(tune.key.root, 7);
    }

    #[test]
    fn default_unit_length_comes_from_meter() {
        let tune = parse_abc("M:2/4\nK:C\nC").unwrap();
        assert_eq!(tune.unit_length, 1.0 / 16.0);
        let tune = parse_abc("M:4/4\nK:C\nC").unwrap();
        assert_eq!(tune.unit_length, 1.0 / 8.0);
    }

    #[test]
    fn note_lengths() {
        let tune = parse_abc("L:1/8\nK:C\nC C2 C/2 C/ C// C3/2 C/4").unwrap();
        assert_eq!(
            durations(&tune.voices[0]),
            vec![0.125, 0.25, 0.0625, 0.0625, 0.03125, 0.1875, 0.03125]
        );
    }

    #[test]
    fn pitches_keep_their_raw_text() {
        let tune = parse_abc("K:C\n^G, _B' =c __d ^^e").unwrap();
        assert_eq!(names(&tune.voices[0]), vec!["^G,", "_B'", "=c", "__d", "^^e"]);
    }

    #[test]
    fn chords_take_first_note_length_times_outer() {
        let tune = parse_abc("L:1/4\nK:C\n[CEG]2 [C2E2G2] [CE]/").unwrap();
        let voice = &tune.voices[0];
        assert_eq!(durations(voice), vec![0.5, 0.5, 0.125]);
        assert_eq!(names(voice)[0], "C E G");
    }

    #[test]
    fn unterminated_chord_reports_line() {
        let err = parse_abc("K:C\nCDE|\n[CEG").unwrap_err();
        assert_eq!(err.to_string(), "abc error on line 3: unterminated chord");
    }

    #[test]
    fn rests_and_measure_rests() {
        let tune = parse_abc("M:3/4\nL:1/4\nK:C\nz x2 Z2 | C").unwrap();
        let voice = &tune.voices[0];
        assert_eq!(durations(voice), vec![0.25, 0.5, 1.5, 0.25]);
        assert!(matches!(voice.elements[1], Element::Rest(RestElement { invisible: true, .. })));
    }

    #[test]
    fn broken_rhythm() {
        let tune = parse_abc("L:1/8\nK:C\nA>B C<D E>>F").unwrap();
        assert_eq!(
            durations(&tune.voices[0]),
            vec![0.1875, 0.0625, 0.0625, 0.1875, 0.21875, 0.03125]
        );
    }

    #[test]
    fn tuplets() {
        let tune = parse_abc("L:1/8\nK:C\n(3CDE F (3:2:2GA B").unwrap();
        let d = durations(&tune.voices[0]);
        let third = 0.125 * 2.0 / 3.0;
        assert!((d[0] - third).abs() < 1e-9);
        assert!((d[2] - third).abs() < 1e-9);
        assert_eq!(d[3], 0.125);
        assert!((d[4] - third).abs() < 1e-9);
        assert!((d[5] - third).abs() < 1e-9);
        assert_eq!(d[6], 0.125);
    }

    #[test]
    fn ties_mark_every_chord_pitch() {
        let tune = parse_abc("K:C\nC2-C2 [CE]-[CE]").unwrap();
        let Element::Note(first) = &tune.voices[0].elements[0] else {
            panic!("expected note");
        };
        assert!(first.pitches[0].tie);
        let Element::Note(chord) = &tune.voices[0].elements[2] else {
            panic!("expected chord");
        };
        assert!(chord.pitches.iter().all(|p| p.tie));
    }

    #[test]
    fn bars_and_repeats_emit_one_bar_each() {
        let tune = parse_abc("K:C\n|:C|D:|[1E:|2F||G|]").unwrap();
        let bars = tune.voices[0]
            .elements
            .iter()
            .filter(|e| matches!(e, Element::Bar))
            .count();
        assert_eq!(bars, 6);
        assert_eq!(names(&tune.voices[0]), vec!["C", "D", "E", "F", "G"]);
    }

    #[test]
    fn skips_decorations_symbols_and_graces() {
        let abc = "K:C\n\"Am\"!trill!.A ~B {cd}e +fermata+f \"^text\"g (ab) y T c";
        let tune = parse_abc(abc).unwrap();
        assert_eq!(names(&tune.voices[0]), vec!["A", "B", "e", "f", "g", "a", "b", "c"]);
    }

    #[test]
    fn dynamics_set_velocity() {
        let tune = parse_abc("K:C\nC !pp! D E !ff! F").unwrap();
        let velocities: Vec<Option<u8>> = tune.voices[0]
            .elements
            .iter()
            .filter_map(|e| match e {
                Element::Note(n) => Some(n.velocity),
                _ => None,
            })
            .collect();
        assert_eq!(velocities, vec![None, Some(45), Some(45), Some(120)]);
    }

    #[test]
    fn voices_from_header_and_body() {
        let abc = "X:1\nT:Duet\nV:1 name=\"Flute\"\nV:2 name=\"Cello\"\nK:D\n\
                   V:1\nABcd|\nV:2\nD,2F,2|\n[V:1]e4|\n";
        let tune = parse_abc(abc).unwrap();
        assert_eq!(tune.voices.len(), 2);
        assert_eq!(tune.voices[0].id, "1");
        assert_eq!(tune.voices[0].name.as_deref(), Some("Flute"));
        assert_eq!(tune.voices[1].name.as_deref(), Some("Cello"));
        assert_eq!(names(&tune.voices[0]), vec!["A", "B", "c", "d", "e"]);
        assert_eq!(names(&tune.voices[1]), vec!["D,", "F,"]);
    }

    #[test]
    fn music_before_any_voice_goes_to_first_declared_voice() {
        let tune = parse_abc("V:A\nV:B\nK:C\nCDE|\nV:B\nG,|").unwrap();
        assert_eq!(tune.voices[0].id, "A");
        assert_eq!(names(&tune.voices[0]), vec!["C", "D", "E"]);
    }

    #[test]
    fn inline_fields() {
        let tune = parse_abc("L:1/8\nK:C\nC [L:1/4] D [K:Bb] B [M:3/4] E").unwrap();
        let voice = &tune.voices[0];
        assert_eq!(durations(voice), vec![0.125, 0.25, 0.25, 0.25]);
        assert!(voice
            .elements
            .iter()
            .any(|e| matches!(e, Element::KeyChange(k) if k.fifths == -2)));
        // Meter changes after the first note are not tracked.
        assert_eq!(tune.meter, Meter::default());
    }

    #[test]
    fn comments_and_directives_are_ignored() {
        let tune = parse_abc("%abc-2.1\n%%score 1\nK:C % key\nCD % trailing\nw: la la\nE").unwrap();
        assert_eq!(names(&tune.voices[0]), vec!["C", "D", "E"]);
    }

    #[test]
    fn overlay_material_is_dropped_until_bar() {
        let tune = parse_abc("K:C\nCDEF & GABc | d").unwrap();
        assert_eq!(names(&tune.voices[0]), vec!["C", "D", "E", "F", "d"]);
    }

    #[test]
    fn books_split_on_reference_numbers() {
        let tunes = parse_abc_book("X:1\nT:One\nK:C\nC\n\nX:2\nT:Two\nK:G\nG").unwrap();
        assert_eq!(tunes.len(), 2);
        assert_eq!(tunes[1].title.as_deref(), Some("Two"));
        assert_eq!(tunes[1].key.fifths, 1);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(parse_abc("").is_err());
        assert!(parse_abc("   \n% only a comment\n").is_err());
    }

    #[test]
    fn header_only_tune_is_empty_but_valid() {
        let tune = parse_abc("X:1\nT:Silence\nK:C").unwrap();
        assert!(tune.voices.is_empty());
        assert!(tune.is_empty());
    }
}
