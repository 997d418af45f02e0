//! Loading YAML documents from disk
//!
//! Every loaded document remembers where it came from so errors can point at the file. All
//! documents are merged into one [MapStore] in load order; later documents override earlier ones.
use crate::store::MapStore;
use std::path::{Path, PathBuf};

/// File suffixes picked up by [Documents::load_directory]
pub const FILE_SUFFIXES: [&str; 2] = [".confex.yaml", ".confex.yml"];

pub type Source = Option<PathBuf>;

#[derive(Debug, Default, Clone)]
pub struct Documents {
    documents: Vec<(Source, MapStore)>,
}

impl Documents {
    pub fn insert(&mut self, document: MapStore, source: impl Into<Source>) {
        self.documents.push((source.into(), document));
    }

    pub fn source_count(&self) -> usize {
        self.documents.len()
    }

    pub fn sources(&self) -> impl Iterator<Item = &Source> {
        self.documents.iter().map(|(source, _)| source)
    }

    /// Merge all documents into a single store
    pub fn merged(&self) -> MapStore {
        let mut store = MapStore::new();
        for (_, document) in &self.documents {
            store.merge(document.clone());
        }
        store
    }

    pub fn load_file(&mut self, file_path: &Path) -> Result<(), LoadError> {
        let file_path = file_path.canonicalize()?;
        tracing::info!(path = %file_path.display(), "loading file");

        let contents = std::fs::read_to_string(&file_path)?;
        let document = MapStore::from_yaml(&contents).map_err(|source| LoadError::Parse {
            path: file_path.clone(),
            source,
        })?;

        self.insert(document, file_path);
        Ok(())
    }

    /// Load every `*.confex.yaml` / `*.confex.yml` file of `dir_path`, sorted by name
    pub fn load_directory(&mut self, dir_path: &Path) -> Result<(), LoadError> {
        let mut file_paths = vec![];
        for dir_entry in std::fs::read_dir(dir_path)? {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_file() {
                continue;
            }

            let file_name = dir_entry.file_name();
            let file_name = file_name.to_string_lossy();
            if FILE_SUFFIXES.iter().any(|suffix| file_name.ends_with(suffix)) {
                file_paths.push(dir_entry.path());
            }
        }

        if file_paths.is_empty() {
            return Err(LoadError::NoFilesFound(dir_path.to_path_buf()));
        }

        file_paths.sort();
        for file_path in file_paths {
            self.load_file(&file_path)?;
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("no files found in directory {}", .0.display())]
    NoFilesFound(PathBuf),
    #[error("IO error")]
    Io(#[from] std::io::Error),
    #[error("unable to parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: crate::error::Error,
    },
}

impl From<MapStore> for Documents {
    fn from(value: MapStore) -> Self {
        let mut documents = Documents::default();
        documents.insert(value, None);
        documents
    }
}

/// Utility macro to create [Documents]
///
/// Create from a single document
/// ```
/// # use confex::documents;
/// documents!("answer: 42");
/// ```
///
/// Create from multiple documents (path required)
/// ```
/// # use confex::documents;
/// documents! {
///   "one.confex.yaml" => "one: 1",
///   "two.confex.yaml" => "two: 2"
/// };
/// ```
///
/// # Panic
/// Panics on invalid input
///
/// ```should_panic
/// # use confex::documents;
/// documents!("- not a mapping");
/// ```
#[macro_export]
macro_rules! documents {
    // single document without source
    { $yaml:expr } => {
        $crate::documents::Documents::from(
            $crate::store::MapStore::from_yaml($yaml).expect("document must parse")
        )
    };
    // multi document with sources
    { $($source:expr => $yaml:expr),+ } => {{
        let mut docs = $crate::documents::Documents::default();
        $(
            docs.insert(
                $crate::store::MapStore::from_yaml($yaml).expect("document must parse"),
                Some(::std::path::PathBuf::from($source)),
            );
        )+

        docs
    }};
}
