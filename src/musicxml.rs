//! MusicXML importer — converts `score-partwise` documents into the Tune
//! data model.
//!
//! Only what the piano roll needs is read: header text, the first key,
//! meter and tempo, and every pitched or unpitched note with its duration.
//! Each `<voice>` of each part becomes one [`Voice`]; measures are closed
//! with a bar after padding shorter voices with invisible rests.

use std::collections::HashMap;

use roxmltree::{Document, Node};
use tracing::debug;

use crate::error::{RollError, RollResult};
use crate::key::KeySignature;
use crate::model::*;

const EPSILON: f64 = 1e-9;
const STEP_SEMITONES: [(&str, i32); 7] = [
    ("C", 0),
    ("D", 2),
    ("E", 4),
    ("F", 5),
    ("G", 7),
    ("A", 9),
    ("B", 11),
];

/// Parse a MusicXML XML string into a Tune.
pub fn parse_musicxml(xml: &str) -> RollResult<Tune> {
    // MusicXML files include a DOCTYPE declaration, so we must allow DTDs
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let doc = Document::parse_with_options(xml, options)
        .map_err(|e| RollError::xml(e.to_string()))?;
    let root = doc.root_element();

    if root.tag_name().name() != "score-partwise" {
        return Err(RollError::xml(format!(
            "unsupported root element '{}', only 'score-partwise' is supported",
            root.tag_name().name()
        )));
    }

    let mut tune = Tune::new();
    let mut header = Header::default();
    let mut part_list = PartList::default();
    let mut stats = NoteStats::default();

    for child in root.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "work" => header.work_title = child_text(&child, "work-title"),
            "movement-title" => header.movement_title = text_of(&child),
            "identification" => parse_identification(&child, &mut header),
            "credit" => parse_credit(&child, &mut header),
            "part-list" => part_list = parse_part_list(&child),
            "part" => parse_part(&child, &part_list, &mut tune, &mut stats),
            _ => {}
        }
    }

    tune.title = header.title();
    tune.composer = header.credit_composer.or(header.creator_composer);
    tune.tempo = find_tempo(&root);
    tune.unit_length = tune.meter.default_unit_length();
    if stats.pitched == 0 && stats.unpitched > 0 {
        tune.key = KeySignature::percussion();
    }

    debug!(
        title = ?tune.title,
        voices = tune.voices.len(),
        notes = tune.note_count(),
        "parsed musicxml"
    );
    Ok(tune)
}

// ─── Header ──────────────────────────────────────────────────────────

/// Title and composer candidates; `<credit>` text wins over the
/// `<work>`/`<identification>` fallbacks.
#[derive(Default)]
struct Header {
    credit_title: Option<String>,
    work_title: Option<String>,
    movement_title: Option<String>,
    credit_composer: Option<String>,
    creator_composer: Option<String>,
}

impl Header {
    fn title(&self) -> Option<String> {
        self.credit_title
            .clone()
            .or_else(|| self.work_title.clone())
            .or_else(|| self.movement_title.clone())
    }
}

fn parse_identification(node: &Node, header: &mut Header) {
    for child in node.children().filter(|n| n.is_element()) {
        if child.tag_name().name() == "creator"
            && child.attribute("type") == Some("composer")
            && header.creator_composer.is_none()
        {
            header.creator_composer = text_of(&child);
        }
    }
}

fn parse_credit(node: &Node, header: &mut Header) {
    let credit_type = child_text(node, "credit-type").unwrap_or_default();
    let words: Vec<String> = node
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "credit-words")
        .filter_map(|n| text_of(&n))
        .collect();
    if words.is_empty() {
        return;
    }
    let text = words.join(" ");
    match credit_type.as_str() {
        "title" if header.credit_title.is_none() => header.credit_title = Some(text),
        "composer" if header.credit_composer.is_none() => header.credit_composer = Some(text),
        _ => {}
    }
}

/// First tempo in the document: a `<sound tempo>` or, failing that, a
/// quarter-note `<metronome>`.
fn find_tempo(root: &Node) -> Option<Tempo> {
    let sound = root
        .descendants()
        .filter(|n| n.tag_name().name() == "sound")
        .find_map(|n| n.attribute("tempo").and_then(|t| t.trim().parse::<f64>().ok()))
        .filter(|bpm| *bpm > 0.0);
    if let Some(bpm) = sound {
        return Some(Tempo { bpm });
    }

    root.descendants()
        .filter(|n| n.tag_name().name() == "metronome")
        .find_map(|n| {
            let unit = child_text(&n, "beat-unit")?;
            let per_minute = child_text(&n, "per-minute")?.parse::<f64>().ok()?;
            let quarters = match unit.as_str() {
                "whole" => 4.0,
                "half" => 2.0,
                "quarter" => 1.0,
                "eighth" => 0.5,
                "16th" => 0.25,
                _ => return None,
            };
            let dotted = n.children().any(|c| c.tag_name().name() == "beat-unit-dot");
            let quarters = if dotted { quarters * 1.5 } else { quarters };
            Some(Tempo {
                bpm: per_minute * quarters,
            })
        })
}

// ─── Part list ───────────────────────────────────────────────────────

#[derive(Default)]
struct PartList {
    /// Part id → `<part-name>`
    names: HashMap<String, String>,
    /// `<score-instrument>` id → 0-based `<midi-unpitched>` key
    unpitched: HashMap<String, u8>,
}

fn parse_part_list(node: &Node) -> PartList {
    let mut list = PartList::default();
    for part in node
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "score-part")
    {
        let Some(id) = part.attribute("id") else {
            continue;
        };
        if let Some(name) = child_text(&part, "part-name").filter(|n| !n.is_empty()) {
            list.names.insert(id.to_string(), name);
        }
        for instrument in part
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "midi-instrument")
        {
            let key = child_text(&instrument, "midi-unpitched")
                .and_then(|v| v.parse::<u8>().ok())
                .filter(|v| (1..=128).contains(v));
            if let (Some(id), Some(key)) = (instrument.attribute("id"), key) {
                list.unpitched.insert(id.to_string(), key - 1);
            }
        }
    }
    list
}

// ─── Parts ───────────────────────────────────────────────────────────

#[derive(Default)]
struct NoteStats {
    pitched: usize,
    unpitched: usize,
}

/// Walks one `<part>`, tracking where each of its voices stands.
struct PartReader<'a> {
    part_id: String,
    part_name: Option<String>,
    list: &'a PartList,
    /// `<divisions>` per quarter note
    divisions: f64,
    /// Voice numbers in order of appearance, with their tune voice ids
    voices: Vec<(String, String)>,
    /// Start of the current measure, in whole notes from the tune start
    measure_start: f64,
    /// Read cursor inside the current measure, in whole notes
    cursor: f64,
    /// Furthest point any voice or cursor reached in this measure
    measure_end: f64,
    /// End of each voice's material, in whole notes from the tune start
    voice_end: HashMap<String, f64>,
    key: Option<KeySignature>,
}

fn parse_part(node: &Node, list: &PartList, tune: &mut Tune, stats: &mut NoteStats) {
    let part_id = node.attribute("id").unwrap_or("P").to_string();
    let mut reader = PartReader {
        part_name: list.names.get(&part_id).cloned(),
        part_id,
        list,
        divisions: 1.0,
        voices: Vec::new(),
        measure_start: 0.0,
        cursor: 0.0,
        measure_end: 0.0,
        voice_end: HashMap::new(),
        key: None,
    };

    for measure in node
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "measure")
    {
        reader.measure(&measure, tune, stats);
    }
}

impl PartReader<'_> {
    fn measure(&mut self, node: &Node, tune: &mut Tune, stats: &mut NoteStats) {
        self.cursor = 0.0;
        self.measure_end = 0.0;

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "attributes" => self.attributes(&child, tune),
                "note" => self.note(&child, tune, stats),
                "backup" => {
                    self.cursor = (self.cursor - self.duration(&child)).max(0.0);
                }
                "forward" => {
                    let duration = self.duration(&child);
                    let voice = child_text(&child, "voice").unwrap_or_else(|| "1".to_string());
                    self.cursor += duration;
                    self.catch_up(&voice, tune);
                }
                _ => {}
            }
            self.measure_end = self.measure_end.max(self.cursor);
        }

        self.close_measure(tune);
    }

    fn attributes(&mut self, node: &Node, tune: &mut Tune) {
        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "divisions" => {
                    if let Some(d) = parse_f64(&child).filter(|d| *d > 0.0) {
                        self.divisions = d;
                    }
                }
                "key" => self.key_change(parse_key(&child), tune),
                "time" => {
                    if tune.voices.is_empty() && self.measure_start < EPSILON {
                        if let Some(meter) = parse_time(&child) {
                            tune.meter = meter;
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn key_change(&mut self, key: KeySignature, tune: &mut Tune) {
        let first_in_tune = tune.voices.is_empty() && self.measure_start < EPSILON;
        if first_in_tune {
            tune.key = key.clone();
        } else if self.key.as_ref() != Some(&key) {
            for (_, id) in &self.voices {
                tune.voice_mut(id).elements.push(Element::KeyChange(key.clone()));
            }
        }
        self.key = Some(key);
    }

    /// Duration child of a note, backup or forward, in whole notes.
    fn duration(&self, node: &Node) -> f64 {
        child_text(node, "duration")
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| d.is_finite())
            .map_or(0.0, |d| d.max(0.0) / self.divisions / 4.0)
    }

    /// Tune voice id for a part voice number, creating the voice (padded up
    /// to the current measure) on first use.
    fn voice_id(&mut self, number: &str, tune: &mut Tune) -> String {
        if let Some((_, id)) = self.voices.iter().find(|(n, _)| n == number) {
            return id.clone();
        }

        let (id, name) = if self.voices.is_empty() {
            (self.part_id.clone(), self.part_name.clone())
        } else {
            (
                format!("{}-{}", self.part_id, number),
                self.part_name.as_ref().map(|n| format!("{n} {number}")),
            )
        };
        self.voices.push((number.to_string(), id.clone()));

        let voice = tune.voice_mut(&id);
        voice.name = name;
        if self.measure_start > EPSILON {
            voice.elements.push(invisible_rest(self.measure_start));
        }
        if let Some(key) = &self.key {
            if *key != tune.key {
                tune.voice_mut(&id).elements.push(Element::KeyChange(key.clone()));
            }
        }
        self.voice_end.insert(number.to_string(), self.measure_start);
        id
    }

    /// Fill a voice with an invisible rest up to the read cursor.
    fn catch_up(&mut self, number: &str, tune: &mut Tune) {
        let id = self.voice_id(number, tune);
        let target = self.measure_start + self.cursor;
        let end = self.voice_end.get(number).copied().unwrap_or(self.measure_start);
        if target - end > EPSILON {
            tune.voice_mut(&id).elements.push(invisible_rest(target - end));
            self.voice_end.insert(number.to_string(), target);
        }
    }

    fn note(&mut self, node: &Node, tune: &mut Tune, stats: &mut NoteStats) {
        let has = |name: &str| node.children().any(|c| c.tag_name().name() == name);
        if has("grace") || has("cue") {
            return;
        }

        let number = child_text(node, "voice").unwrap_or_else(|| "1".to_string());
        let duration = self.duration(node);
        let chord = has("chord");

        if chord {
            // Chord members share the previous note's onset.
            if let Some(pitch) = self.pitch(node, stats) {
                let id = self.voice_id(&number, tune);
                if let Some(Element::Note(prev)) = tune.voice_mut(&id).elements.last_mut() {
                    prev.pitches.push(pitch);
                    return;
                }
            }
        }

        self.catch_up(&number, tune);
        let id = self.voice_id(&number, tune);

        let element = if has("rest") {
            Element::Rest(RestElement {
                duration,
                invisible: node
                    .children()
                    .find(|c| c.tag_name().name() == "rest")
                    .and_then(|r| r.attribute("print-object"))
                    == Some("no")
                    || node.attribute("print-object") == Some("no"),
            })
        } else {
            match self.pitch(node, stats) {
                Some(pitch) => Element::Note(NoteElement {
                    pitches: vec![pitch],
                    duration,
                    velocity: None,
                }),
                None => invisible_rest(duration),
            }
        };
        tune.voice_mut(&id).elements.push(element);

        self.cursor += duration;
        self.voice_end
            .insert(number, self.measure_start + self.cursor);
    }

    /// Absolute pitch of a `<pitch>` or `<unpitched>` note, with its tie.
    fn pitch(&self, node: &Node, stats: &mut NoteStats) -> Option<NotePitch> {
        let mut midi = None;
        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "pitch" => {
                    midi = parse_pitch(&child, "step", "octave");
                    stats.pitched += 1;
                }
                "unpitched" => {
                    let mapped = node
                        .children()
                        .find(|c| c.tag_name().name() == "instrument")
                        .and_then(|i| i.attribute("id"))
                        .and_then(|id| self.list.unpitched.get(id).copied());
                    midi = mapped.or_else(|| parse_pitch(&child, "display-step", "display-octave"));
                    stats.unpitched += 1;
                }
                _ => {}
            }
        }

        let mut pitch = NotePitch::absolute(midi?);
        pitch.tie = node.children().any(|c| {
            matches!(c.tag_name().name(), "tie" | "tied") && c.attribute("type") == Some("start")
        }) || node
            .children()
            .filter(|c| c.tag_name().name() == "notations")
            .flat_map(|n| n.children())
            .any(|c| c.tag_name().name() == "tied" && c.attribute("type") == Some("start"));
        Some(pitch)
    }

    /// Pad every voice to the longest one, then draw the bar line.
    fn close_measure(&mut self, tune: &mut Tune) {
        let longest = self
            .voice_end
            .values()
            .map(|end| end - self.measure_start)
            .fold(self.measure_end, f64::max);
        let measure_end = self.measure_start + longest;

        for (number, id) in &self.voices {
            let end = self.voice_end.get(number).copied().unwrap_or(self.measure_start);
            let voice = tune.voice_mut(id);
            if measure_end - end > EPSILON {
                voice.elements.push(invisible_rest(measure_end - end));
            }
            voice.elements.push(Element::Bar);
        }
        for end in self.voice_end.values_mut() {
            *end = measure_end;
        }
        self.measure_start = measure_end;
    }
}

fn invisible_rest(duration: f64) -> Element {
    Element::Rest(RestElement {
        duration,
        invisible: true,
    })
}

// ─── Attributes ──────────────────────────────────────────────────────

fn parse_key(node: &Node) -> KeySignature {
    let fifths = child_text(node, "fifths")
        .and_then(|f| f.parse::<i32>().ok())
        .unwrap_or(0);
    let mode = child_text(node, "mode").unwrap_or_default();
    KeySignature::from_fifths_and_mode(fifths, &mode)
}

fn parse_time(node: &Node) -> Option<Meter> {
    // Compound numerators such as "3+2" add up.
    let beats = child_text(node, "beats")?
        .split('+')
        .map(|b| b.trim().parse::<u32>().ok())
        .sum::<Option<u32>>()?;
    let beat_type = child_text(node, "beat-type")?.parse::<u32>().ok()?;
    (beats > 0 && beat_type > 0).then_some(Meter { beats, beat_type })
}

/// MIDI number of a step/alter/octave triple.
fn parse_pitch(node: &Node, step_tag: &str, octave_tag: &str) -> Option<u8> {
    let step = child_text(node, step_tag)?;
    let semitone = STEP_SEMITONES
        .iter()
        .find(|(s, _)| s.eq_ignore_ascii_case(&step))
        .map(|(_, semi)| *semi)?;
    let octave = child_text(node, octave_tag)?.parse::<i32>().ok()?;
    let alter = child_text(node, "alter")
        .and_then(|a| a.parse::<f64>().ok())
        .map_or(0, |a| a.round() as i32);
    let midi = (octave + 1) * 12 + semitone + alter;
    (0..=127).contains(&midi).then_some(midi as u8)
}

// ─── Helpers ─────────────────────────────────────────────────────────

fn text_of(node: &Node) -> Option<String> {
    node.text()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn child_text(node: &Node, name: &str) -> Option<String> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
        .and_then(|c| text_of(&c))
}

fn parse_f64(node: &Node) -> Option<f64> {
    node.text().and_then(|t| t.trim().parse().ok())
}
