//! Static dataset: an `index.json` listing examples and one JSON file per
//! example under `example/`.
//!
//! ```text
//! data/
//!   index.json            [{ "title": "...", "path": "0001.json" }, ...]
//!   example/0001.json     { "input": "...", "output": "..." }
//! ```

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RollError, RollResult};

pub const INDEX_FILE: &str = "index.json";
pub const EXAMPLE_DIR: &str = "example";

/// One entry of `index.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexItem {
    pub title: String,
    /// Path of the example file, relative to `example/`
    pub path: String,
}

/// One example file: the prompt and the model's answer, both free text that
/// may embed `<abc>` blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub input: String,
    pub output: String,
}

impl Example {
    /// The analysis document shown for this example.
    pub fn analysis_text(&self) -> String {
        format!(
            "Input:\n\n{} \n\n Output:\n\n{}\n\n",
            self.input, self.output
        )
    }
}

/// Case-insensitive substring filter on titles. A blank query keeps
/// everything.
pub fn filter_items<'a>(items: &'a [IndexItem], query: &str) -> Vec<&'a IndexItem> {
    let query = query.trim().to_lowercase();
    items
        .iter()
        .filter(|item| query.is_empty() || item.title.to_lowercase().contains(&query))
        .collect()
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> RollResult<T> {
    let text = std::fs::read_to_string(path).map_err(|e| RollError::io(path, e))?;
    serde_json::from_str(&text)
        .map_err(|e| RollError::dataset(format!("{}: {e}", path.display())))
}

/// A dataset directory with its index loaded.
#[derive(Debug, Clone)]
pub struct Dataset {
    root: PathBuf,
    items: Vec<IndexItem>,
}

impl Dataset {
    /// Open `root` and read its `index.json`.
    pub fn open(root: impl Into<PathBuf>) -> RollResult<Self> {
        let root = root.into();
        let items: Vec<IndexItem> = read_json(&root.join(INDEX_FILE))?;
        debug!(root = %root.display(), items = items.len(), "loaded dataset index");
        Ok(Self { root, items })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn items(&self) -> &[IndexItem] {
        &self.items
    }

    pub fn filter(&self, query: &str) -> Vec<&IndexItem> {
        filter_items(&self.items, query)
    }

    /// Location of an item's example file. Paths that would leave the
    /// `example/` directory are rejected.
    pub fn example_path(&self, item: &IndexItem) -> RollResult<PathBuf> {
        let relative = Path::new(&item.path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if item.path.is_empty() || escapes {
            return Err(RollError::dataset(format!(
                "example path '{}' is outside the dataset",
                item.path
            )));
        }
        Ok(self.root.join(EXAMPLE_DIR).join(relative))
    }

    pub fn load_example(&self, item: &IndexItem) -> RollResult<Example> {
        read_json(&self.example_path(item)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn items() -> Vec<IndexItem> {
        ["Blues in G", "Reel in D", "Slow Air"]
            .iter()
            .enumerate()
            .map(|(i, title)| IndexItem {
                title: title.to_string(),
                path: format!("{i}.json"),
            })
            .collect()
    }

    #[test]
    fn filter_is_trimmed_and_case_insensitive() {
        let items = items();
        let titles = |q: &str| -> Vec<String> {
            filter_items(&items, q).iter().map(|i| i.title.clone()).collect()
        };
        assert_eq!(titles("  IN "), vec!["Blues in G", "Reel in D"]);
        assert_eq!(titles("air"), vec!["Slow Air"]);
        assert_eq!(titles("").len(), 3);
        assert_eq!(titles("   ").len(), 3);
        assert!(titles("polka").is_empty());
    }

    #[test]
    fn analysis_text_layout() {
        let example = Example {
            input: "Write a jig".into(),
            output: "<abc>K:D\nDFA</abc>".into(),
        };
        assert_eq!(
            example.analysis_text(),
            "Input:\n\nWrite a jig \n\n Output:\n\n<abc>K:D\nDFA</abc>\n\n"
        );
    }

    #[test]
    fn opens_dataset_and_loads_examples() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("example")).unwrap();
        std::fs::write(
            dir.path().join("index.json"),
            r#"[{"title": "One", "path": "one.json"}, {"title": "Broken", "path": "missing.json"}]"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("example/one.json"),
            r#"{"input": "in", "output": "out"}"#,
        )
        .unwrap();

        let dataset = Dataset::open(dir.path()).unwrap();
        assert_eq!(dataset.items().len(), 2);
        let example = dataset.load_example(&dataset.items()[0]).unwrap();
        assert_eq!(example.output, "out");
        let err = dataset.load_example(&dataset.items()[1]).unwrap_err();
        assert!(matches!(err, RollError::Io { .. }));
    }

    #[test]
    fn invalid_index_is_a_dataset_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.json"), r#"{"title": "not a list"}"#).unwrap();
        let err = Dataset::open(dir.path()).unwrap_err();
        assert!(err.to_string().starts_with("dataset error:"));
    }

    #[test]
    fn missing_index_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(Dataset::open(dir.path()), Err(RollError::Io { .. })));
    }

    #[test]
    fn paths_cannot_escape_the_example_dir() {
        let dataset = Dataset {
            root: PathBuf::from("data"),
            items: Vec::new(),
        };
        let item = |path: &str| IndexItem {
            title: "x".into(),
            path: path.into(),
        };
        assert!(dataset.example_path(&item("../secret.json")).is_err());
        assert!(dataset.example_path(&item("/etc/passwd")).is_err());
        assert!(dataset.example_path(&item("")).is_err());
        assert_eq!(
            dataset.example_path(&item("sub/a.json")).unwrap(),
            PathBuf::from("data/example/sub/a.json")
        );
    }
}
