//! A filesystem backed store of requirement records.
//!
//! Each record lives in its own `<ID>.yml` file directly under the store
//! root.

use std::{
    ffi::OsStr,
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use walkdir::WalkDir;

use crate::{
    domain::{ReqId, Spec},
    storage::{SpecFile, SpecStore, StoreError},
};

/// A directory of YAML record files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    root: PathBuf,
}

impl Directory {
    /// Opens a directory at the given path.
    ///
    /// The directory is created on the first write if it does not exist.
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The path a record with this identifier is stored at.
    #[must_use]
    pub fn path(&self, id: ReqId) -> PathBuf {
        self.root.join(id.file_name())
    }
}

impl SpecStore for Directory {
    fn exists(&self, id: ReqId) -> bool {
        self.path(id).is_file()
    }

    fn write(&mut self, spec: &Spec) -> Result<(), StoreError> {
        let yaml = serde_yaml::to_string(&SpecFile::from(spec)).map_err(|source| {
            StoreError::Serialize {
                id: spec.id,
                source,
            }
        })?;

        fs::create_dir_all(&self.root).map_err(|source| StoreError::Io {
            path: self.root.clone(),
            source,
        })?;

        let path = self.path(spec.id);
        fs::write(&path, yaml).map_err(|source| StoreError::Io { path, source })
    }

    fn read_all(&self) -> Result<Vec<Spec>, StoreError> {
        if !self.root.is_dir() {
            tracing::debug!(root = %self.root.display(), "spec directory does not exist");
            return Ok(Vec::new());
        }

        let paths = collect_yaml_paths(&self.root);

        let mut specs = paths
            .par_iter()
            .map(|path| load(path))
            .collect::<Result<Vec<_>, _>>()?;

        specs.sort_by_key(|spec| spec.id);
        Ok(specs)
    }
}

fn collect_yaml_paths(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            matches!(
                entry.path().extension().and_then(OsStr::to_str),
                Some("yml" | "yaml")
            )
        })
        .map(walkdir::DirEntry::into_path)
        .collect()
}

fn load(path: &Path) -> Result<Spec, StoreError> {
    let load_error = |source| StoreError::Load {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(|source: io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let stem = path.file_stem().and_then(OsStr::to_str);

    SpecFile::read(file)
        .and_then(|spec_file| spec_file.into_spec(stem))
        .map_err(load_error)
}

#[cfg(test)]
mod tests {
    use non_empty_string::NonEmptyString;
    use tempfile::TempDir;

    use super::*;
    use crate::domain::{Example, SourceInfo};

    fn spec(id: usize, title: &str) -> Spec {
        Spec::new(
            ReqId::from_number(id).unwrap(),
            NonEmptyString::new(title.to_string()).unwrap(),
            SourceInfo::default(),
        )
    }

    #[test]
    fn write_then_read_back() {
        let tmp = TempDir::new().unwrap();
        let mut store = Directory::new(tmp.path().join("specs"));
        let mut record = spec(1, "Login");
        record.examples = vec![Example::new("g", "w", "t").with_id("E1".parse().unwrap())];

        assert!(!store.exists(record.id));
        store.write(&record).unwrap();

        assert!(store.exists(record.id));
        assert!(tmp.path().join("specs/REQ-001.yml").is_file());
        assert_eq!(store.read_all().unwrap(), [record]);
    }

    #[test]
    fn records_are_listed_in_numeric_order() {
        let tmp = TempDir::new().unwrap();
        let mut store = Directory::new(tmp.path().to_path_buf());
        for (id, title) in [(1000, "d"), (2, "b"), (10, "c"), (1, "a")] {
            store.write(&spec(id, title)).unwrap();
        }

        let ids: Vec<String> = store
            .read_all()
            .unwrap()
            .iter()
            .map(|s| s.id.to_string())
            .collect();

        assert_eq!(ids, ["REQ-001", "REQ-002", "REQ-010", "REQ-1000"]);
    }

    #[test]
    fn missing_id_comes_from_the_file_name() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("REQ-004.yml"), "title: From stem\n").unwrap();

        let specs = Directory::new(tmp.path().to_path_buf()).read_all().unwrap();

        assert_eq!(specs[0].id.to_string(), "REQ-004");
    }

    #[test]
    fn other_files_are_ignored() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("notes.md"), "# not a record").unwrap();
        fs::create_dir(tmp.path().join("nested")).unwrap();
        fs::write(tmp.path().join("nested/REQ-009.yml"), "title: nested\n").unwrap();

        let specs = Directory::new(tmp.path().to_path_buf()).read_all().unwrap();

        assert!(specs.is_empty());
    }

    #[test]
    fn invalid_record_reports_its_path() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("REQ-001.yml"), "id: REQ-001\ntitle: ''\n").unwrap();

        let error = Directory::new(tmp.path().to_path_buf())
            .read_all()
            .unwrap_err();

        assert!(
            matches!(error, StoreError::Load { ref path, .. } if path.ends_with("REQ-001.yml"))
        );
    }

    #[test]
    fn missing_directory_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = Directory::new(tmp.path().join("absent"));
        assert!(store.read_all().unwrap().is_empty());
    }
}
