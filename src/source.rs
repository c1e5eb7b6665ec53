//! Where segments come from.
//!
//! Segments are produced upstream by a document segmenter. The
//! [`KireSource`] reads the segmenter's JSONL metadata file and the
//! markdown segment files it points at.

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{domain::Segment, extract};

/// The result of reading a segment source.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Segments {
    /// Readable segments, in document order.
    pub segments: Vec<Segment>,
    /// Segment files that were listed but could not be found.
    pub gaps: Vec<PathBuf>,
}

/// An ordered supply of segments.
pub trait SegmentSource {
    /// Read every segment, preserving document order.
    ///
    /// A segment whose backing content is missing is reported as a gap and
    /// excluded; it is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment list itself cannot be read.
    fn read(&self) -> Result<Segments, SourceError>;
}

impl SegmentSource for Vec<Segment> {
    fn read(&self) -> Result<Segments, SourceError> {
        Ok(Segments {
            segments: self.clone(),
            gaps: Vec::new(),
        })
    }
}

/// Errors that prevent a segment source from being read.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The metadata file could not be opened or read.
    #[error("failed to read segment metadata {}: {source}", path.display())]
    Metadata {
        /// The metadata file.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// A metadata line is not valid JSON of the expected shape.
    #[error("malformed segment metadata at line {line}: {source}")]
    Malformed {
        /// 1-based line number.
        line: usize,
        /// The parse error.
        source: serde_json::Error,
    },

    /// A segment file exists but could not be read.
    #[error("failed to read segment {}: {source}", path.display())]
    Segment {
        /// The segment file.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
}

#[derive(Debug, Deserialize)]
struct Entry {
    metadata: EntryMetadata,
}

#[derive(Debug, Deserialize)]
struct EntryMetadata {
    segment_index: usize,
    filename: String,
    #[serde(default)]
    heading_path: Vec<String>,
}

/// Segments described by a kire JSONL metadata file.
#[derive(Debug, Clone)]
pub struct KireSource {
    metadata_path: PathBuf,
    segment_dir: PathBuf,
}

impl KireSource {
    /// A source reading `metadata_path`, resolving segment files relative to
    /// `segment_dir`.
    #[must_use]
    pub fn new(metadata_path: impl Into<PathBuf>, segment_dir: impl Into<PathBuf>) -> Self {
        Self {
            metadata_path: metadata_path.into(),
            segment_dir: segment_dir.into(),
        }
    }

    fn entries(&self) -> Result<Vec<EntryMetadata>, SourceError> {
        let metadata_error = |source| SourceError::Metadata {
            path: self.metadata_path.clone(),
            source,
        };

        let file = File::open(&self.metadata_path).map_err(metadata_error)?;
        let mut entries = Vec::new();

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(metadata_error)?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let entry: Entry = serde_json::from_str(line).map_err(|source| {
                SourceError::Malformed {
                    line: index + 1,
                    source,
                }
            })?;
            entries.push(entry.metadata);
        }

        entries.sort_by_key(|entry| entry.segment_index);
        Ok(entries)
    }
}

impl SegmentSource for KireSource {
    #[tracing::instrument(level = "debug", skip(self), fields(metadata = %self.metadata_path.display()))]
    fn read(&self) -> Result<Segments, SourceError> {
        let mut result = Segments::default();

        for entry in self.entries()? {
            let path = self.segment_dir.join(&entry.filename);
            match read_segment(&path, entry) {
                Ok(segment) => result.segments.push(segment),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::warn!(path = %path.display(), "segment file not found, skipping");
                    result.gaps.push(path);
                }
                Err(source) => return Err(SourceError::Segment { path, source }),
            }
        }

        tracing::debug!(
            segments = result.segments.len(),
            gaps = result.gaps.len(),
            "read segments"
        );
        Ok(result)
    }
}

fn read_segment(path: &Path, entry: EntryMetadata) -> io::Result<Segment> {
    let content = std::fs::read_to_string(path)?;
    let context = extract::context_annotation(&content).map(str::to_string);

    let mut segment = Segment::new(
        format!("seg-{:04}", entry.segment_index),
        entry.heading_path,
        content,
    )
    .with_file_path(entry.filename);

    if let Some(context) = context {
        segment = segment.with_context(context);
    }
    Ok(segment)
}
