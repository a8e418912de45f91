//! Splits an analysis document into commentary and embedded ABC blocks.
//!
//! Notation is embedded as `<abc>…</abc>`; everything else is commentary.

use serde::Serialize;

const OPEN_TAG: &str = "<abc>";
const CLOSE_TAG: &str = "</abc>";

/// One piece of an analysis document, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Segment {
    /// Prose between blocks, trimmed
    Commentary(String),
    AbcBlock(AbcBlock),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbcBlock {
    /// 1-based position among the document's blocks
    pub index: usize,
    /// `abc-block-N`
    pub id: String,
    /// First `T:` line, or `Music Example N`
    pub title: String,
    /// Block content, trimmed
    pub abc: String,
}

impl AbcBlock {
    fn new(index: usize, abc: &str) -> Self {
        let abc = abc.trim().to_string();
        let title = block_title(&abc).unwrap_or_else(|| format!("Music Example {index}"));
        Self {
            index,
            id: format!("abc-block-{index}"),
            title,
            abc,
        }
    }
}

/// Title from the first line of the form `T:…` (leading spaces and tabs
/// allowed).
fn block_title(abc: &str) -> Option<String> {
    abc.lines().find_map(|line| {
        line.trim_start_matches([' ', '\t'])
            .strip_prefix("T:")
            .map(|rest| rest.trim_start_matches([' ', '\t']).to_string())
    })
}

fn push_commentary(segments: &mut Vec<Segment>, part: &str) {
    let part = part.trim();
    if !part.is_empty() {
        segments.push(Segment::Commentary(part.to_string()));
    }
}

/// Split `text` into commentary and ABC blocks. Whitespace-only commentary
/// is dropped; an `<abc>` without a closing tag stays commentary.
pub fn split_analysis(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = text;
    let mut block_index = 0;

    while let Some(start) = rest.find(OPEN_TAG) {
        let inner_start = start + OPEN_TAG.len();
        let Some(len) = rest[inner_start..].find(CLOSE_TAG) else {
            break;
        };
        push_commentary(&mut segments, &rest[..start]);

        // Blank blocks still take a number so later ids stay stable.
        block_index += 1;
        let inner = &rest[inner_start..inner_start + len];
        segments.push(Segment::AbcBlock(AbcBlock::new(block_index, inner)));
        rest = &rest[inner_start + len + CLOSE_TAG.len()..];
    }
    push_commentary(&mut segments, rest);

    segments
}

/// The ABC blocks of `text`, in order.
pub fn abc_blocks(text: &str) -> Vec<AbcBlock> {
    split_analysis(text)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::AbcBlock(block) => Some(block),
            Segment::Commentary(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_commentary_and_blocks() {
        let text =
            "Intro line\n<abc>\nX:1\nT:First\nK:C\nCDE\n</abc>\nMiddle\n<abc>K:G\nGAB</abc>\n  \n";
        let segments = split_analysis(text);
        assert_eq!(
            segments,
            vec![
                Segment::Commentary("Intro line".into()),
                Segment::AbcBlock(AbcBlock {
                    index: 1,
                    id: "abc-block-1".into(),
                    title: "First".into(),
                    abc: "X:1\nT:First\nK:C\nCDE".into(),
                }),
                Segment::Commentary("Middle".into()),
                Segment::AbcBlock(AbcBlock {
                    index: 2,
                    id: "abc-block-2".into(),
                    title: "Music Example 2".into(),
                    abc: "K:G\nGAB".into(),
                }),
            ]
        );
    }

    #[test]
    fn title_allows_leading_whitespace() {
        let blocks = abc_blocks("<abc>X:1\n \tT:\tIndented\nK:C</abc>");
        assert_eq!(blocks[0].title, "Indented");
    }

    #[test]
    fn first_title_wins() {
        let blocks = abc_blocks("<abc>T:One\nT:Two\nK:C</abc>");
        assert_eq!(blocks[0].title, "One");
    }

    #[test]
    fn blocks_use_shortest_match() {
        let blocks = abc_blocks("<abc>A</abc> and <abc>B</abc>");
        let abc: Vec<&str> = blocks.iter().map(|b| b.abc.as_str()).collect();
        assert_eq!(abc, vec!["A", "B"]);
    }

    #[test]
    fn unterminated_block_is_commentary() {
        let segments = split_analysis("Before <abc>K:C\nCDE");
        assert_eq!(segments, vec![Segment::Commentary("Before <abc>K:C\nCDE".into())]);
    }

    #[test]
    fn plain_text_and_empty_input() {
        assert_eq!(
            split_analysis("just words"),
            vec![Segment::Commentary("just words".into())]
        );
        assert!(split_analysis("   \n\t").is_empty());
    }

    #[test]
    fn blank_blocks_keep_their_number() {
        let blocks = abc_blocks("a <abc> </abc> b <abc>T:X\nK:C\nC</abc>");
        let ids: Vec<&str> = blocks.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["abc-block-1", "abc-block-2"]);
        assert_eq!(blocks[0].abc, "");
        assert_eq!(blocks[0].title, "Music Example 1");
        assert_eq!(blocks[1].title, "X");
    }
}
