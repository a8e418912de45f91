//! Error type shared by every importer, renderer and builder in the crate.

use std::path::PathBuf;

pub type RollResult<T> = Result<T, RollError>;

#[derive(thiserror::Error, Debug)]
pub enum RollError {
    #[error("failed to access '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("xml error: {0}")]
    Xml(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("abc error on line {line}: {message}")]
    Abc { line: usize, message: String },

    #[error("midi error: {0}")]
    Midi(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("render error: {0}")]
    Render(String),
}

impl RollError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn xml(msg: impl Into<String>) -> Self {
        Self::Xml(msg.into())
    }

    pub fn archive(msg: impl Into<String>) -> Self {
        Self::Archive(msg.into())
    }

    pub fn abc(line: usize, msg: impl Into<String>) -> Self {
        Self::Abc {
            line,
            message: msg.into(),
        }
    }

    pub fn midi(msg: impl Into<String>) -> Self {
        Self::Midi(msg.into())
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(RollError::xml("x").to_string().starts_with("xml error:"));
        assert!(RollError::archive("x").to_string().starts_with("archive error:"));
        assert!(RollError::dataset("x").to_string().starts_with("dataset error:"));
        assert!(RollError::midi("x").to_string().starts_with("midi error:"));
        assert_eq!(
            RollError::abc(3, "bad length").to_string(),
            "abc error on line 3: bad length"
        );
    }

    #[test]
    fn io_error_names_the_path() {
        let err = RollError::io(
            "data/index.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.to_string().contains("data/index.json"));
    }
}
