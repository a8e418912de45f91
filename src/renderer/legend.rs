//! Track list shown next to a roll: one entry per voice, with the colors
//! its notes are drawn in and whether it is highlighted or muted.

use serde::Serialize;

use super::constants::*;
use super::svg_builder::escape;
use crate::events::PianoRollData;
use crate::options::RenderOptions;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegendEntry {
    /// Render index of the voice
    pub voice: usize,
    pub label: String,
    /// Id (when it differs from the label), instrument, channel and note count
    pub detail: String,
    /// Swatches: the voice's palette color, or the in-scale and out-of-scale
    /// colors its notes can take
    pub colors: Vec<String>,
    pub highlighted: bool,
    pub drums: bool,
}

fn swatches(data: &PianoRollData, voice: usize, options: &RenderOptions) -> Vec<String> {
    if let Some(palette) = options.voice_colors.as_deref().filter(|p| !p.is_empty()) {
        return vec![palette[voice % palette.len()].clone()];
    }
    if data.is_percussion() {
        return vec![NOTE_IN_SCALE_COLOR.to_string()];
    }
    vec![
        NOTE_IN_SCALE_COLOR.to_string(),
        NOTE_OUT_SCALE_COLOR.to_string(),
    ]
}

/// One entry per voice of `data`, in render-index order. Colors follow the
/// same rules as the note bars.
pub fn layout_legend(data: &PianoRollData, options: &RenderOptions) -> Vec<LegendEntry> {
    data.voices
        .iter()
        .enumerate()
        .map(|(voice, info)| {
            let highlighted = options.highlight_voice.map_or(true, |v| v == voice);
            let colors = if highlighted {
                swatches(data, voice, options)
            } else {
                vec![MUTED_NOTE_COLOR.to_string()]
            };

            let label = info.label().to_string();
            let mut detail = Vec::new();
            if info.id != label {
                detail.push(info.id.clone());
            }
            if let Some(instrument) = &info.instrument {
                detail.push(instrument.clone());
            }
            if let Some(channel) = info.channel {
                detail.push(format!("ch {}", channel as u32 + 1));
            }
            detail.push(format!("{} notes", data.voice_note_count(voice)));

            LegendEntry {
                voice,
                label,
                detail: detail.join(" · "),
                colors,
                highlighted,
                drums: info.drums,
            }
        })
        .collect()
}

/// The legend as an HTML list.
pub fn render_legend(data: &PianoRollData, options: &RenderOptions) -> String {
    let entries = layout_legend(data, options);
    let mut out = String::from("<ul class=\"track-list\">\n");
    if entries.is_empty() {
        out.push_str("<li class=\"track-item disabled\">No tracks</li>\n");
    }
    for entry in &entries {
        let mut class = String::from("track-item");
        class.push_str(if entry.highlighted { " active" } else { " muted" });
        if entry.drums {
            class.push_str(" drums");
        }
        out.push_str(&format!(
            r#"<li class="{}" data-track-index="{}">"#,
            class, entry.voice
        ));
        for color in &entry.colors {
            out.push_str(&format!(
                r#"<span class="track-swatch" style="background: {}"></span>"#,
                escape(color)
            ));
        }
        out.push_str(&format!(
            "<span class=\"track-name\">{}</span> <span class=\"track-info\">{}</span></li>\n",
            escape(&entry.label),
            escape(&entry.detail)
        ));
    }
    out.push_str("</ul>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abc::parse_abc;
    use crate::events::extract_events;
    use pretty_assertions::assert_eq;

    const DUET: &str = "V:1 name=\"Flute\"\nV:2\nK:C\nV:1\nC D E|\nV:2\nC,4|";

    fn data(abc: &str) -> PianoRollData {
        extract_events(&parse_abc(abc).unwrap(), 480)
    }

    #[test]
    fn first_voice_is_active_and_the_rest_muted() {
        let entries = layout_legend(&data(DUET), &RenderOptions::default());
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].label, "Flute");
        assert_eq!(entries[0].detail, "1 · 3 notes");
        assert_eq!(entries[0].colors, vec!["#6cb2f5", "#ffb74d"]);
        assert!(entries[0].highlighted);

        assert_eq!(entries[1].label, "2");
        assert_eq!(entries[1].detail, "1 notes");
        assert_eq!(entries[1].colors, vec!["#888888"]);
        assert!(!entries[1].highlighted);
    }

    #[test]
    fn palette_gives_one_swatch_per_voice() {
        let options = RenderOptions {
            highlight_voice: None,
            voice_colors: Some(vec!["#111111".into(), "#222222".into()]),
            ..RenderOptions::default()
        };
        let entries = layout_legend(&data(DUET), &options);
        assert_eq!(entries[0].colors, vec!["#111111"]);
        assert_eq!(entries[1].colors, vec!["#222222"]);
        assert!(entries.iter().all(|e| e.highlighted));
    }

    #[test]
    fn html_marks_state_and_escapes_names() {
        let roll = data("V:1 name=\"A&B\"\nK:C\nV:1\nC");
        let html = render_legend(&roll, &RenderOptions::default());
        assert!(html.starts_with("<ul class=\"track-list\">"));
        assert!(html.contains(r#"<li class="track-item active" data-track-index="0">"#));
        assert!(html.contains(r#"<span class="track-name">A&amp;B</span>"#));
        assert_eq!(html.matches("track-swatch").count(), 2);
    }

    #[test]
    fn empty_roll_says_so() {
        let mut roll = data("K:C\nC");
        roll.voices.clear();
        let html = render_legend(&roll, &RenderOptions::default());
        assert!(html.contains("No tracks"));
    }
}
