//! Integration tests — parse the sample files in tests/fixtures/.

use std::io::{Cursor, Write};
use std::path::PathBuf;

use abcroll::{
    extract_events, load_tune, parse_abc_book, parse_bytes, Element, Meter, PianoRollData,
    RollError, ScaleType, Tempo, Tune,
};
use pretty_assertions::assert_eq;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// `(pitch, start, duration, voice)` for every event.
fn event_tuples(data: &PianoRollData) -> Vec<(u8, u32, u32, usize)> {
    data.notes
        .iter()
        .map(|n| (n.pitch, n.start_tick, n.duration_ticks, n.voice))
        .collect()
}

// ─── ABC ─────────────────────────────────────────────────────────────

#[test]
fn parse_kesh_jig() {
    let tune = load_tune(fixtures_dir().join("abc/kesh.abc")).expect("Failed to parse kesh.abc");

    assert_eq!(tune.reference, Some(1));
    assert_eq!(tune.title.as_deref(), Some("The Kesh"));
    assert_eq!(tune.composer.as_deref(), Some("Trad."));
    assert_eq!(tune.meter, Meter { beats: 6, beat_type: 8 });
    assert_eq!(tune.unit_length, 1.0 / 8.0);
    assert_eq!(tune.tempo, Some(Tempo { bpm: 174.0 }));
    assert_eq!(tune.key.abc_name(), "G");
    assert_eq!(tune.note_count(), 24);

    let data = extract_events(&tune, 480);
    assert_eq!(data.notes.len(), 24);
    assert_eq!(data.ticks_per_measure, 1440);
    assert_eq!(data.width_ticks, 24 * 240);
    assert_eq!((data.min_pitch, data.max_pitch), (67, 79));
    assert!(data.notes.iter().all(|n| n.duration_ticks == 240 && n.velocity == 100));
    // Every note of the tune is diatonic to G major.
    assert!(data.notes.iter().all(|n| data.is_in_scale(n.pitch)));
}

#[test]
fn parse_book_with_two_tunes() {
    let text = std::fs::read_to_string(fixtures_dir().join("abc/kesh.abc")).unwrap();
    let tunes = parse_abc_book(&text).unwrap();
    assert_eq!(tunes.len(), 2);

    let second = &tunes[1];
    assert_eq!(second.title.as_deref(), Some("Second Tune"));
    assert_eq!(second.key.scale, ScaleType::Minor);
    assert_eq!(second.key.fifths, -1);

    let data = extract_events(second, 480);
    let pitches: Vec<u8> = data.notes.iter().map(|n| n.pitch).collect();
    assert_eq!(pitches, vec![74, 73, 74, 69]);
    assert_eq!(data.width_ticks, 3 * 480 + 1440);
}

#[test]
fn parse_duet_voices() {
    let tune = load_tune(fixtures_dir().join("abc/duet.abc")).unwrap();
    let names: Vec<Option<&str>> = tune.voices.iter().map(|v| v.name.as_deref()).collect();
    assert_eq!(names, vec![Some("Flute"), Some("Cello")]);

    let data = extract_events(&tune, 480);
    assert_eq!(
        event_tuples(&data),
        vec![
            (74, 0, 480, 0),
            (78, 480, 480, 0),
            (81, 960, 960, 0),
            (86, 1920, 1920, 0),
            (50, 0, 480, 1),
            (54, 480, 480, 1),
            (57, 960, 960, 1),
            (50, 1920, 1920, 1),
        ]
    );
    assert_eq!(data.width_ticks, 3840);
}

#[test]
fn parse_percussion_groove() {
    let tune = load_tune(fixtures_dir().join("abc/drums.abc")).unwrap();
    assert!(tune.key.percussion);

    let data = extract_events(&tune, 480);
    assert!(data.is_percussion());
    assert_eq!((data.min_pitch, data.max_pitch), (36, 42));
    // Percussion rows are never dimmed.
    assert!((0..=127).all(|p| data.is_in_scale(p)));
}

// ─── MusicXML ────────────────────────────────────────────────────────

fn assert_scale_study(tune: &Tune) {
    assert_eq!(tune.title.as_deref(), Some("Scale Study"));
    assert_eq!(tune.composer.as_deref(), Some("Anon"));
    assert_eq!(tune.tempo, Some(Tempo { bpm: 90.0 }));
    assert_eq!(tune.meter, Meter::default());
    assert_eq!(tune.key.abc_name(), "C");

    let ids: Vec<&str> = tune.voices.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec!["P1", "P2"]);
    assert_eq!(tune.voices[1].name.as_deref(), Some("Bass"));
    let bars = |i: usize| {
        tune.voices[i]
            .elements
            .iter()
            .filter(|e| matches!(e, Element::Bar))
            .count()
    };
    assert_eq!((bars(0), bars(1)), (2, 2));

    let data = extract_events(tune, 480);
    let violin: Vec<u8> = data
        .notes
        .iter()
        .filter(|n| n.voice == 0)
        .map(|n| n.pitch)
        .collect();
    assert_eq!(violin, vec![60, 62, 64, 65, 67, 69, 71, 72]);

    let bass: Vec<(u8, u32, u32, usize)> = event_tuples(&data)
        .into_iter()
        .filter(|e| e.3 == 1)
        .collect();
    // The tied C3 spans the bar line as one event.
    assert_eq!(bass, vec![(48, 0, 2880, 1), (43, 2880, 960, 1), (46, 2880, 960, 1)]);
    assert_eq!(data.width_ticks, 3840);
}

#[test]
fn parse_scale_musicxml() {
    let tune = load_tune(fixtures_dir().join("musicxml/scale.musicxml"))
        .expect("Failed to parse scale.musicxml");
    assert_scale_study(&tune);
}

#[test]
fn parse_scale_as_compressed_mxl() {
    let xml = std::fs::read_to_string(fixtures_dir().join("musicxml/scale.musicxml")).unwrap();
    let container = r#"<?xml version="1.0" encoding="UTF-8"?>
<container><rootfiles><rootfile full-path="scale.xml" media-type="application/vnd.recordare.musicxml+xml"/></rootfiles></container>"#;

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    writer.start_file("META-INF/container.xml", options).unwrap();
    writer.write_all(container.as_bytes()).unwrap();
    writer.start_file("scale.xml", options).unwrap();
    writer.write_all(xml.as_bytes()).unwrap();
    let data = writer.finish().unwrap().into_inner();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scale.mxl");
    std::fs::write(&path, &data).unwrap();

    assert_scale_study(&load_tune(&path).unwrap());
    // Without a hint the ZIP signature is recognized.
    assert_scale_study(&parse_bytes(&data, None).unwrap());
}

#[test]
fn missing_file_reports_the_path() {
    let err = load_tune(fixtures_dir().join("abc/nope.abc")).unwrap_err();
    assert!(matches!(err, RollError::Io { .. }));
    assert!(err.to_string().contains("nope.abc"));
}
