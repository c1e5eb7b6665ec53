use std::io::{self, BufReader, Read};

use non_empty_string::NonEmptyString;
use serde::{Deserialize, Serialize};

use crate::domain::{Example, InvalidExampleId, ReqId, ReqIdError, SourceInfo, Spec};

/// A requirement record as stored on disk.
///
/// Field names and the omission of empty fields follow the `<ID>.yml`
/// layout:
///
/// ```yaml
/// id: REQ-001
/// title: User login
/// source:
///   segment_id: seg-0000
///   heading_path: [Auth, User login]
/// examples:
///   - id: E1
///     given: a registered user
///     when: they submit valid credentials
///     then: they are signed in
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "SourceFile::is_empty")]
    source: SourceFile,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    depends: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    examples: Vec<ExampleFile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    questions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct SourceFile {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    segment_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    heading_path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_path: Option<String>,
}

impl SourceFile {
    fn is_empty(&self) -> bool {
        self.segment_id.is_empty() && self.heading_path.is_empty() && self.file_path.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct ExampleFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default)]
    given: String,
    #[serde(default)]
    when: String,
    #[serde(default)]
    then: String,
}

/// Errors that can occur when loading a record from disk.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The file is not valid YAML for a record.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// The record has no `id` and none was supplied by the file name.
    #[error("id is required")]
    MissingId,

    /// The `id` or a `depends` entry is not a requirement identifier.
    #[error(transparent)]
    Id(#[from] ReqIdError),

    /// An example identifier is malformed.
    #[error(transparent)]
    ExampleId(#[from] InvalidExampleId),

    /// The title is empty.
    #[error("title is required")]
    EmptyTitle,
}

impl SpecFile {
    /// Read a record file.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be read or is not valid YAML.
    pub fn read<R: Read>(reader: R) -> Result<Self, LoadError> {
        Ok(serde_yaml::from_reader(BufReader::new(reader))?)
    }

    /// Convert into a domain record.
    ///
    /// `fallback_id` is used when the file carries no `id` (typically the
    /// file stem).
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier, title, a dependency or an example
    /// identifier is invalid.
    pub fn into_spec(self, fallback_id: Option<&str>) -> Result<Spec, LoadError> {
        let id = self
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .or(fallback_id)
            .ok_or(LoadError::MissingId)?;
        let id = ReqId::try_from(id)?;

        let title = NonEmptyString::new(self.title.trim().to_string())
            .map_err(|_| LoadError::EmptyTitle)?;

        let source = SourceInfo {
            segment_id: self.source.segment_id,
            heading_path: self.source.heading_path,
            file_path: self.source.file_path,
        };

        let mut spec = Spec::new(id, title, source);
        spec.description = self.description.filter(|d| !d.trim().is_empty());
        spec.depends = self
            .depends
            .iter()
            .map(|dep| ReqId::try_from(dep.trim()))
            .collect::<Result<_, _>>()?;
        spec.examples = self
            .examples
            .into_iter()
            .map(|ex| -> Result<Example, LoadError> {
                let example = Example::new(ex.given, ex.when, ex.then);
                match ex.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
                    Some(id) => Ok(example.with_id(id.parse()?)),
                    None => Ok(example),
                }
            })
            .collect::<Result<_, _>>()?;
        spec.questions = self.questions;
        spec.tags = self.tags;
        Ok(spec)
    }
}

impl From<&Spec> for SpecFile {
    fn from(spec: &Spec) -> Self {
        Self {
            id: Some(spec.id.to_string()),
            title: spec.title.to_string(),
            description: spec.description.clone(),
            source: SourceFile {
                segment_id: spec.source.segment_id.clone(),
                heading_path: spec.source.heading_path.clone(),
                file_path: spec.source.file_path.clone(),
            },
            depends: spec.depends.iter().map(ToString::to_string).collect(),
            examples: spec
                .examples
                .iter()
                .map(|ex| ExampleFile {
                    id: ex.id().map(|id| id.to_string()),
                    given: ex.given().to_string(),
                    when: ex.when().to_string(),
                    then: ex.then().to_string(),
                })
                .collect(),
            questions: spec.questions.clone(),
            tags: spec.tags.clone(),
        }
    }
}
