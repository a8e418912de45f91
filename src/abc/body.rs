//! Music line scanner: walks one line of tune body and feeds notes, rests,
//! bars and inline fields to the tune builder.

use tracing::trace;

use super::{dynamic_velocity, TuneBuilder};
use crate::error::{RollError, RollResult};
use crate::model::NotePitch;

struct ScannedNote {
    pitch: NotePitch,
    multiplier: f64,
    end: usize,
}

pub(super) fn parse_music_line(b: &mut TuneBuilder, line: &str, line_no: usize) -> RollResult<()> {
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '`' | '\\' | ')' | ']' | 'y' => i += 1,
            '"' => i = skip_past(&chars, i + 1, '"'),
            '{' => i = skip_past(&chars, i + 1, '}'),
            '!' | '+' => match find(&chars, i + 1, c) {
                Some(end) => {
                    let decoration: String = chars[i + 1..end].iter().collect();
                    if let Some(velocity) = dynamic_velocity(&decoration) {
                        b.set_dynamic(velocity);
                    }
                    i = end + 1;
                }
                None => i += 1,
            },
            '.' | '~' | 'H' | 'L' | 'M' | 'O' | 'P' | 'S' | 'T' | 'u' | 'v' => i += 1,
            '(' => {
                if chars.get(i + 1).is_some_and(char::is_ascii_digit) {
                    i = scan_tuplet(b, &chars, i + 1);
                } else {
                    i += 1;
                }
            }
            '[' => {
                let next = chars.get(i + 1).copied();
                let after = chars.get(i + 2).copied();
                if next.is_some_and(|n| n.is_ascii_alphabetic()) && after == Some(':') {
                    let end = find(&chars, i + 1, ']')
                        .ok_or_else(|| RollError::abc(line_no, "unterminated inline field"))?;
                    let inner: String = chars[i + 1..end].iter().collect();
                    let value = inner[2..].trim();
                    b.field(chars[i + 1], value, line_no)?;
                    i = end + 1;
                } else if next.is_some_and(|n| n.is_ascii_digit()) {
                    i = skip_volta(&chars, i + 1);
                } else if next == Some('|') {
                    i = scan_bar(b, &chars, i + 1);
                } else {
                    i = scan_chord(b, &chars, i + 1, line_no)?;
                }
            }
            '|' | ':' => i = scan_bar(b, &chars, i),
            '&' => {
                b.overlay(line_no);
                i += 1;
            }
            '>' | '<' => {
                let mut run = 0;
                while i < chars.len() && chars[i] == c && run < 3 {
                    run += 1;
                    i += 1;
                }
                let short = 0.5f64.powi(run);
                let long = 2.0 - short;
                if c == '>' {
                    b.apply_broken(long, short);
                } else {
                    b.apply_broken(short, long);
                }
            }
            '-' => {
                b.tie_last();
                i += 1;
            }
            '^' | '_' | '=' | 'A'..='G' | 'a'..='g' => match scan_note(&chars, i) {
                Some(note) => {
                    b.emit_note(vec![note.pitch], note.multiplier);
                    i = note.end;
                }
                None => i += 1,
            },
            'z' | 'x' => {
                let (multiplier, end) = scan_length(&chars, i + 1);
                b.emit_rest(multiplier, c == 'x');
                i = end;
            }
            'Z' | 'X' => {
                let (count, end) = scan_digits(&chars, i + 1);
                b.emit_measure_rest(count.unwrap_or(1));
                i = end;
            }
            _ => {
                trace!(line = line_no, symbol = %c, "skipping unsupported symbol");
                i += 1;
            }
        }
    }

    Ok(())
}

fn find(chars: &[char], from: usize, target: char) -> Option<usize> {
    chars
        .get(from..)?
        .iter()
        .position(|&c| c == target)
        .map(|p| from + p)
}

/// Index just after the next `target`, or the end of the line.
fn skip_past(chars: &[char], from: usize, target: char) -> usize {
    find(chars, from, target).map_or(chars.len(), |end| end + 1)
}

fn scan_digits(chars: &[char], mut i: usize) -> (Option<u32>, usize) {
    let start = i;
    let mut value: u32 = 0;
    while i < chars.len() {
        let Some(d) = chars[i].to_digit(10) else {
            break;
        };
        value = value.saturating_mul(10).saturating_add(d);
        i += 1;
    }
    ((i > start).then_some(value), i)
}

/// Length multiplier such as `2`, `/`, `//`, `3/2`, `/4`.
fn scan_length(chars: &[char], i: usize) -> (f64, usize) {
    let (numerator, mut i) = scan_digits(chars, i);
    let numerator = numerator.unwrap_or(1) as f64;
    let mut denominator = 1.0;
    while i < chars.len() && chars[i] == '/' {
        let (d, next) = scan_digits(chars, i + 1);
        denominator *= d.filter(|&d| d > 0).map_or(2.0, f64::from);
        i = next;
    }
    (numerator / denominator, i)
}

/// Accidentals, letter, octave marks and length of one note.
fn scan_note(chars: &[char], start: usize) -> Option<ScannedNote> {
    let mut i = start;
    while i < chars.len() && matches!(chars[i], '^' | '_') {
        i += 1;
    }
    if i < chars.len() && chars[i] == '=' {
        i += 1;
    }
    if !chars.get(i).is_some_and(|c| matches!(c, 'A'..='G' | 'a'..='g')) {
        return None;
    }
    i += 1;
    while i < chars.len() && matches!(chars[i], '\'' | ',') {
        i += 1;
    }
    let name: String = chars[start..i].iter().collect();
    let (multiplier, end) = scan_length(chars, i);
    Some(ScannedNote {
        pitch: NotePitch::named(name),
        multiplier,
        end,
    })
}

/// Bar lines: `|`, `||`, `|]`, `|:`, `:|`, `::`, with an optional volta
/// number straight after (`|1`, `:|2`).
fn scan_bar(b: &mut TuneBuilder, chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && matches!(chars[i], '|' | ':') {
        i += 1;
    }
    if i < chars.len() && chars[i] == ']' {
        i += 1;
    }
    b.emit_bar();
    if chars.get(i).is_some_and(char::is_ascii_digit) {
        i = skip_volta(chars, i);
    }
    i
}

/// Volta numbers such as `1`, `1,3` or `1-2`.
fn skip_volta(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && (chars[i].is_ascii_digit() || matches!(chars[i], ',' | '-')) {
        i += 1;
    }
    i
}

fn scan_tuplet(b: &mut TuneBuilder, chars: &[char], i: usize) -> usize {
    let (p, mut i) = scan_digits(chars, i);
    let mut q = None;
    let mut r = None;
    if chars.get(i) == Some(&':') {
        let (digits, next) = scan_digits(chars, i + 1);
        q = digits;
        i = next;
        if chars.get(i) == Some(&':') {
            let (digits, next) = scan_digits(chars, i + 1);
            r = digits;
            i = next;
        }
    }
    b.start_tuplet(p.unwrap_or(3), q, r);
    i
}

/// `[CEG]2` — notes up to `]`, then an outer length.
fn scan_chord(
    b: &mut TuneBuilder,
    chars: &[char],
    mut i: usize,
    line_no: usize,
) -> RollResult<usize> {
    let mut pitches = Vec::new();
    let mut first_multiplier = None;

    loop {
        let Some(&c) = chars.get(i) else {
            return Err(RollError::abc(line_no, "unterminated chord"));
        };
        match c {
            ']' => {
                i += 1;
                break;
            }
            '"' => i = skip_past(chars, i + 1, '"'),
            '!' | '+' => i = find(chars, i + 1, c).map_or(i + 1, |end| end + 1),
            '^' | '_' | '=' | 'A'..='G' | 'a'..='g' => match scan_note(chars, i) {
                Some(mut note) => {
                    i = note.end;
                    if chars.get(i) == Some(&'-') {
                        note.pitch.tie = true;
                        i += 1;
                    }
                    first_multiplier.get_or_insert(note.multiplier);
                    pitches.push(note.pitch);
                }
                None => i += 1,
            },
            _ => i += 1,
        }
    }

    let (outer, end) = scan_length(chars, i);
    if !pitches.is_empty() {
        b.emit_note(pitches, first_multiplier.unwrap_or(1.0) * outer);
    }
    Ok(end)
}
