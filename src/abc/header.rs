//! Values of information fields (`M:`, `L:`, `Q:`, `V:`).

use tracing::warn;

use crate::model::{Meter, Tempo};

/// Parse an `M:` value. `C` is common time, `C|` cut time; additive
/// numerators such as `2+3/8` are summed. Anything unreadable is 4/4.
pub fn parse_meter(value: &str) -> Meter {
    let value = value.trim();
    match value {
        "C" => return Meter { beats: 4, beat_type: 4 },
        "C|" => return Meter { beats: 2, beat_type: 2 },
        "" => return Meter::default(),
        _ if value.eq_ignore_ascii_case("none") => return Meter::default(),
        _ => {}
    }

    let parsed = value.split_once('/').and_then(|(num, den)| {
        let beats = num
            .trim()
            .trim_start_matches('(')
            .trim_end_matches(')')
            .split('+')
            .map(|n| n.trim().parse::<u32>().ok())
            .sum::<Option<u32>>()?;
        let beat_type = den.trim().parse::<u32>().ok()?;
        (beats > 0 && beat_type > 0).then_some(Meter { beats, beat_type })
    });

    parsed.unwrap_or_else(|| {
        warn!(meter = value, "unreadable meter, using 4/4");
        Meter::default()
    })
}

/// Parse an `L:` value (`1/8`, `1/16`, `1`) into whole notes.
pub fn parse_unit_length(value: &str) -> Option<f64> {
    let value = value.trim();
    let length = match value.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().ok()?;
            let den = den.trim().parse::<f64>().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => value.parse::<f64>().ok()?,
    };
    (length > 0.0).then_some(length)
}

/// Parse a `Q:` value into quarter notes per minute.
///
/// Accepts `1/4=120`, `3/8=60`, `"Allegro" 1/4=120` and a bare `120`.
pub fn parse_tempo(value: &str) -> Option<Tempo> {
    // Drop quoted text.
    let mut unquoted = String::new();
    let mut in_quote = false;
    for c in value.chars() {
        if c == '"' {
            in_quote = !in_quote;
        } else if !in_quote {
            unquoted.push(c);
        }
    }
    let unquoted = unquoted.trim();

    let bpm = match unquoted.split_once('=') {
        Some((beats, bpm)) => {
            let bpm = bpm.trim().parse::<f64>().ok()?;
            let beat_length: f64 = beats
                .split_whitespace()
                .map(parse_unit_length)
                .sum::<Option<f64>>()?;
            if beat_length <= 0.0 {
                return None;
            }
            bpm * beat_length / 0.25
        }
        None => unquoted.parse::<f64>().ok()?,
    };
    (bpm > 0.0).then_some(Tempo { bpm })
}

/// Id and display name from a `V:` value such as `1 name="Bass" clef=bass`.
pub(crate) fn parse_voice(value: &str) -> Option<(String, Option<String>)> {
    let id = value.split_whitespace().next()?.to_string();
    let name = ["name=", "nm="].iter().find_map(|attr| {
        let start = value.find(attr)? + attr.len();
        let rest = &value[start..];
        if let Some(quoted) = rest.strip_prefix('"') {
            quoted.find('"').map(|end| quoted[..end].to_string())
        } else {
            rest.split_whitespace().next().map(String::from)
        }
    });
    Some((id, name))
}
