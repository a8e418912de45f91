//! MXL file handler — reads compressed MusicXML (.mxl) archives.
//!
//! An .mxl file is a ZIP archive containing:
//!   - META-INF/container.xml  — declares the root MusicXML file path
//!   - <rootfile>.xml          — the actual MusicXML content (e.g., score.xml)
//!   - (optional) other files  — images, sounds, etc.

use std::io::{Cursor, Read};

use tracing::debug;
use zip::ZipArchive;

use crate::error::{RollError, RollResult};
use crate::model::Tune;
use crate::musicxml;

const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Read and parse a .mxl file from raw bytes.
pub fn parse_mxl(data: &[u8]) -> RollResult<Tune> {
    let xml = extract_musicxml_from_mxl(data)?;
    musicxml::parse_musicxml(&xml)
}

/// Extract the MusicXML content string from .mxl bytes.
pub fn extract_musicxml_from_mxl(data: &[u8]) -> RollResult<String> {
    let mut archive = ZipArchive::new(Cursor::new(data))
        .map_err(|e| RollError::archive(format!("failed to open archive: {e}")))?;

    let root_file_path = find_root_file(&mut archive)?;
    debug!(root = %root_file_path, entries = archive.len(), "reading mxl root file");

    let mut root_file = archive.by_name(&root_file_path).map_err(|e| {
        RollError::archive(format!("root file '{root_file_path}' not found in archive: {e}"))
    })?;
    let mut xml = String::new();
    root_file
        .read_to_string(&mut xml)
        .map_err(|e| RollError::archive(format!("failed to read '{root_file_path}': {e}")))?;

    Ok(xml)
}

/// The rootfile named by `META-INF/container.xml`, or the first
/// MusicXML-looking entry when the archive has no container.
fn find_root_file(archive: &mut ZipArchive<Cursor<&[u8]>>) -> RollResult<String> {
    let container_xml = match archive.by_name(CONTAINER_PATH) {
        Ok(mut file) => {
            let mut xml = String::new();
            file.read_to_string(&mut xml)
                .map_err(|e| RollError::archive(format!("failed to read container.xml: {e}")))?;
            Some(xml)
        }
        Err(_) => None,
    }; // mutable borrow of archive is released here

    if let Some(xml) = container_xml {
        let doc = roxmltree::Document::parse(&xml)
            .map_err(|e| RollError::xml(format!("container.xml: {e}")))?;
        return doc
            .descendants()
            .filter(|n| n.tag_name().name() == "rootfile")
            .find_map(|n| n.attribute("full-path"))
            .map(String::from)
            .ok_or_else(|| RollError::archive("no rootfile in container.xml"));
    }

    let names: Vec<String> = archive.file_names().map(String::from).collect();
    names
        .iter()
        .find(|name| {
            !name.starts_with("META-INF/")
                && (name.ends_with(".xml") || name.ends_with(".musicxml"))
        })
        .cloned()
        .ok_or_else(|| {
            RollError::archive(format!("no MusicXML file found in archive, entries: {names:?}"))
        })
}
