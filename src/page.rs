//! HTML pages: an analysis document with inline piano rolls, a standalone
//! viewer for one roll, and the dataset index.

use tracing::warn;

use crate::abc::parse_abc;
use crate::analysis::{split_analysis, AbcBlock, Segment};
use crate::events::{extract_events, PianoRollData};
use crate::options::RenderOptions;
use crate::renderer::{escape, render_legend, render_roll_to_svg};

const STYLE: &str = r#"
body { margin: 0; background: #121212; color: #e0e0e0; font-family: 'Helvetica Neue', Arial, sans-serif; }
main { max-width: 1000px; margin: 0 auto; padding: 24px; }
h1 { font-size: 1.4em; font-weight: 600; }
nav a, .item-list a { color: #6cb2f5; text-decoration: none; }
.commentary { line-height: 1.5; margin: 16px 0; }
.abc-render-block { background: #1e1e1e; border: 1px solid #333; border-radius: 6px; margin: 20px 0; padding: 12px; }
.abc-title { font-weight: 600; margin-bottom: 4px; }
.abc-meta { color: #8a8a8a; font-size: 0.85em; margin-bottom: 8px; }
.track-list { list-style: none; padding: 0; margin: 0 0 8px; display: flex; flex-wrap: wrap; gap: 6px 16px; font-size: 0.85em; }
.track-item.muted { opacity: 0.6; }
.track-item.active .track-name { font-weight: 600; }
.track-item.disabled { color: #8a8a8a; }
.track-swatch { display: inline-block; width: 10px; height: 10px; border-radius: 2px; margin-right: 3px; }
.track-info { color: #8a8a8a; }
.static-piano-roll-wrapper { overflow-x: auto; }
.abc-source pre { background: #181818; padding: 8px; overflow-x: auto; }
.error { color: #ff6b6b; }
.item-list { list-style: none; padding: 0; }
.item-list li { padding: 4px 0; border-bottom: 1px solid #2a2a2a; }
.filter-note { color: #8a8a8a; }
"#;

/// A link in the index sidebar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub title: String,
    pub href: String,
}

fn document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n<style>{}</style>\n</head>\n\
         <body>\n<main>\n{}</main>\n</body>\n</html>\n",
        escape(title),
        STYLE,
        body
    )
}

/// Escaped commentary with line breaks kept.
fn commentary_html(text: &str) -> String {
    escape(text).replace('\n', "<br>")
}

/// Meta line, track list and the roll itself.
fn roll_html(out: &mut String, data: &PianoRollData, options: &RenderOptions) {
    out.push_str(&format!(
        "<div class=\"abc-meta\">K: {} · M: {}/{} · {} notes · {} voice(s)</div>\n",
        escape(&data.key.abc_name()),
        data.meter.beats,
        data.meter.beat_type,
        data.notes.len(),
        data.voices.len().max(1)
    ));
    out.push_str(&render_legend(data, options));
    out.push_str("<div class=\"static-piano-roll-wrapper\">\n");
    out.push_str(&render_roll_to_svg(data, options));
    out.push_str("</div>\n");
}

fn block_html(out: &mut String, block: &AbcBlock, options: &RenderOptions) {
    out.push_str(&format!(
        "<div class=\"abc-render-block\" id=\"{}\">\n",
        escape(&block.id)
    ));
    out.push_str(&format!(
        "<div class=\"abc-title\">{}</div>\n",
        escape(&block.title)
    ));

    match parse_abc(&block.abc) {
        Ok(tune) => roll_html(out, &extract_events(&tune, options.ticks_per_beat), options),
        Err(e) => {
            warn!(block = %block.id, error = %e, "abc block failed to parse");
            out.push_str(&format!(
                "<p class=\"error\">Setup Error: {}</p>\n",
                escape(&e.to_string())
            ));
        }
    }

    out.push_str(&format!(
        "<details class=\"abc-source\"><summary>ABC source</summary><pre>{}</pre></details>\n",
        escape(&block.abc)
    ));
    out.push_str("</div>\n");
}

/// Render an analysis document as a standalone HTML page.
pub fn render_analysis_page(title: &str, text: &str, options: &RenderOptions) -> String {
    render_analysis_page_with_nav(title, text, options, None)
}

/// Like [`render_analysis_page`], with a link back to an index page.
pub fn render_analysis_page_with_nav(
    title: &str,
    text: &str,
    options: &RenderOptions,
    back_href: Option<&str>,
) -> String {
    let mut body = String::new();
    if let Some(href) = back_href {
        body.push_str(&format!(
            "<nav><a href=\"{}\">&larr; All examples</a></nav>\n",
            escape(href)
        ));
    }
    body.push_str(&format!("<h1>{}</h1>\n", escape(title)));
    body.push_str("<div id=\"analysis-content\">\n");

    for segment in split_analysis(text) {
        match segment {
            Segment::Commentary(text) => body.push_str(&format!(
                "<div class=\"commentary\">{}</div>\n",
                commentary_html(&text)
            )),
            Segment::AbcBlock(block) => block_html(&mut body, &block, options),
        }
    }

    body.push_str("</div>\n");
    document(title, &body)
}

/// A single roll with its track list, e.g. an imported MIDI file.
pub fn render_roll_page(title: &str, data: &PianoRollData, options: &RenderOptions) -> String {
    let mut body = format!("<h1>{}</h1>\n", escape(title));
    body.push_str("<div class=\"abc-render-block\">\n");
    roll_html(&mut body, data, options);
    body.push_str("</div>\n");
    document(title, &body)
}

/// Render the list of examples. `query` is shown when the list was
/// filtered.
pub fn render_index_page(title: &str, entries: &[IndexEntry], query: Option<&str>) -> String {
    let mut body = format!("<h1>{}</h1>\n", escape(title));
    if let Some(q) = query.map(str::trim).filter(|q| !q.is_empty()) {
        body.push_str(&format!(
            "<p class=\"filter-note\">{} example(s) matching “{}”</p>\n",
            entries.len(),
            escape(q)
        ));
    }
    body.push_str("<ul class=\"item-list\" id=\"item-list\">\n");
    for entry in entries {
        body.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            escape(&entry.href),
            escape(&entry.title)
        ));
    }
    body.push_str("</ul>\n");
    document(title, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commentary_is_escaped_with_line_breaks() {
        let html = render_analysis_page("T", "a < b\nand c", &RenderOptions::default());
        assert!(html.contains(r#"<div class="commentary">a &lt; b<br>and c</div>"#));
    }

    #[test]
    fn blocks_render_inline_svg() {
        let text = "Look:\n<abc>\nX:1\nT:Tiny\nK:D\nDFA|\n</abc>";
        let html = render_analysis_page("Demo", text, &RenderOptions::default());
        assert!(html.contains(r#"<div class="abc-render-block" id="abc-block-1">"#));
        assert!(html.contains(r#"<div class="abc-title">Tiny</div>"#));
        assert!(html.contains("<svg xmlns="));
        assert!(html.contains("K: D · M: 4/4 · 3 notes · 1 voice(s)"));
        assert!(html.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn broken_blocks_show_setup_error() {
        let html =
            render_analysis_page("Demo", "<abc>K:C\n[CEG</abc>", &RenderOptions::default());
        assert!(html.contains("Setup Error: abc error on line 2: unterminated chord"));
        assert!(!html.contains("<svg"));
    }

    #[test]
    fn nav_link_is_optional() {
        let options = RenderOptions::default();
        assert!(!render_analysis_page("x", "y", &options).contains("<nav>"));
        let html = render_analysis_page_with_nav("x", "y", &options, Some("index.html"));
        assert!(html.contains(r#"<a href="index.html">"#));
    }

    #[test]
    fn index_lists_entries() {
        let entries = vec![
            IndexEntry {
                title: "Jig & Reel".into(),
                href: "examples/0.html".into(),
            },
            IndexEntry {
                title: "Air".into(),
                href: "examples/1.html".into(),
            },
        ];
        let html = render_index_page("Dataset", &entries, Some(" ji "));
        assert!(html.contains(r#"<li><a href="examples/0.html">Jig &amp; Reel</a></li>"#));
        assert!(html.contains("2 example(s) matching “ji”"));
        let html = render_index_page("Dataset", &entries, None);
        assert!(!html.contains("filter-note\">"));
    }

    #[test]
    fn blocks_carry_a_track_list() {
        let text = "<abc>X:1\nV:1 name=\"Lead\"\nV:2\nK:C\nV:1\nCDE|\nV:2\nC,|</abc>";
        let html = render_analysis_page("Demo", text, &RenderOptions::default());
        assert!(html.contains(r#"<ul class="track-list">"#));
        assert!(html.contains(r#"<span class="track-name">Lead</span>"#));
        assert!(html.contains(r#"<li class="track-item muted" data-track-index="1">"#));
        // Track list sits between the meta line and the roll.
        let meta = html.find("abc-meta").unwrap();
        let list = html.find("track-list\">").unwrap();
        let svg = html.find("<svg").unwrap();
        assert!(meta < list && list < svg);
    }

    #[test]
    fn blank_block_shows_setup_error_and_keeps_numbering() {
        let text = "<abc> </abc>\n<abc>T:Real\nK:C\nC</abc>";
        let html = render_analysis_page("Demo", text, &RenderOptions::default());
        assert!(html.contains(r#"id="abc-block-1""#));
        assert!(html.contains(r#"<div class="abc-title">Music Example 1</div>"#));
        assert!(html.contains("Setup Error: abc error on line 1: no tune found"));
        assert!(html.contains(r#"id="abc-block-2""#));
        assert_eq!(html.matches("<svg").count(), 1);
    }

    #[test]
    fn roll_page_wraps_one_roll() {
        let data = extract_events(&parse_abc("X:1\nK:G\nGAB").unwrap(), 480);
        let html = render_roll_page("groove.mid", &data, &RenderOptions::default());
        assert!(html.contains("<h1>groove.mid</h1>"));
        assert!(html.contains("K: G · M: 4/4 · 3 notes · 1 voice(s)"));
        assert!(html.contains("track-list"));
        assert_eq!(html.matches("<svg").count(), 1);
    }
}
