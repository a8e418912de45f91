//! Static browser: renders a dataset into an index page plus one analysis
//! page per example.
//!
//! ```text
//! out/
//!   index.html
//!   examples/<stem>.html
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::dataset::{Dataset, IndexItem};
use crate::error::{RollError, RollResult};
use crate::options::RenderOptions;
use crate::page::{render_analysis_page_with_nav, render_index_page, IndexEntry};

const PAGES_DIR: &str = "examples";
const DEFAULT_TITLE: &str = "ABC Dataset Browser";

/// Outcome of a site build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SiteSummary {
    /// Items in the index
    pub total: usize,
    /// Items left after filtering
    pub listed: usize,
    /// Example pages written
    pub rendered: usize,
    /// Examples that could not be loaded
    pub failed: usize,
}

/// File name for an item's page: the example path with separators and
/// odd characters flattened, made unique with a numeric suffix.
fn page_name(item: &IndexItem, used: &mut HashSet<String>) -> String {
    let stem = item
        .path
        .trim_end_matches(".json")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect::<String>();
    let stem = if stem.is_empty() { "example".to_string() } else { stem };

    let mut name = format!("{stem}.html");
    let mut n = 2;
    while !used.insert(name.clone()) {
        name = format!("{stem}-{n}.html");
        n += 1;
    }
    name
}

fn write(path: &Path, content: &str) -> RollResult<()> {
    std::fs::write(path, content).map_err(|e| RollError::io(path, e))
}

/// Build the static site for `dataset_dir` into `out_dir`, listing only
/// items whose title matches `query`. Examples that fail to load are
/// logged, counted and left out of the index.
pub fn build_site(
    dataset_dir: &Path,
    out_dir: &Path,
    query: &str,
    options: &RenderOptions,
) -> RollResult<SiteSummary> {
    let dataset = Dataset::open(dataset_dir)?;
    let pages_dir = out_dir.join(PAGES_DIR);
    std::fs::create_dir_all(&pages_dir).map_err(|e| RollError::io(&pages_dir, e))?;

    let listed = dataset.filter(query);
    let mut summary = SiteSummary {
        total: dataset.items().len(),
        listed: listed.len(),
        ..SiteSummary::default()
    };

    let mut used = HashSet::new();
    let mut entries = Vec::new();
    for item in listed {
        let example = match dataset.load_example(item) {
            Ok(example) => example,
            Err(e) => {
                warn!(title = %item.title, path = %item.path, error = %e, "skipping example");
                summary.failed += 1;
                continue;
            }
        };

        let name = page_name(item, &mut used);
        let html = render_analysis_page_with_nav(
            &item.title,
            &example.analysis_text(),
            options,
            Some("../index.html"),
        );
        write(&pages_dir.join(&name), &html)?;
        summary.rendered += 1;
        entries.push(IndexEntry {
            title: item.title.clone(),
            href: format!("{PAGES_DIR}/{name}"),
        });
    }

    let index = render_index_page(DEFAULT_TITLE, &entries, Some(query));
    write(&out_dir.join("index.html"), &index)?;

    info!(
        total = summary.total,
        listed = summary.listed,
        rendered = summary.rendered,
        failed = summary.failed,
        out = %out_dir.display(),
        "site built"
    );
    Ok(summary)
}
