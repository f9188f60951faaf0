//! Program library
//!
//! Programs are registered by name, parsed once, and shared read-only across
//! every run that executes them. Each registration is content-hashed so a
//! re-registration with identical source is a no-op and callers can tell
//! program versions apart.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

use crate::error::ParseError;
use crate::parser::{self, Program};

/// Extension of program files picked up by directory loading.
pub const PROGRAM_EXT: &str = "seq";

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("failed to read {file}: {source}")]
    Io {
        file: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {file}: {source}")]
    Parse {
        file: PathBuf,
        source: ParseError,
    },
}

struct LibraryEntry {
    version: String,
    program: Arc<Program>,
}

/// Named collection of parsed programs.
#[derive(Default)]
pub struct ProgramLibrary {
    entries: RwLock<HashMap<String, LibraryEntry>>,
}

impl ProgramLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and register a program. Parse errors surface here, never at
    /// run time. Re-registering the same source under the same name keeps
    /// the cached parse.
    pub fn register(&self, name: &str, source: &str) -> Result<(), ParseError> {
        let version = content_hash(source);

        {
            let entries = self.entries.read().expect("library lock poisoned");
            if let Some(existing) = entries.get(name) {
                if existing.version == version {
                    return Ok(());
                }
            }
        }

        let program = parser::parse(source)?;
        info!(name, version = %&version[..12], steps = program.len(), "registered program");

        let mut entries = self.entries.write().expect("library lock poisoned");
        entries.insert(
            name.to_string(),
            LibraryEntry {
                version,
                program: Arc::new(program),
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Program>> {
        let entries = self.entries.read().expect("library lock poisoned");
        entries.get(name).map(|entry| entry.program.clone())
    }

    /// Content hash of the registered source, if any.
    pub fn version(&self, name: &str) -> Option<String> {
        let entries = self.entries.read().expect("library lock poisoned");
        entries.get(name).map(|entry| entry.version.clone())
    }

    /// Load every `.seq` file in a directory, using the file stem as the
    /// program name. Returns how many programs were registered.
    pub fn load_dir(&self, dir: &Path) -> Result<usize, LibraryError> {
        let mut count = 0;

        let read_dir = std::fs::read_dir(dir).map_err(|source| LibraryError::Io {
            file: dir.to_path_buf(),
            source,
        })?;

        for entry in read_dir {
            let entry = entry.map_err(|source| LibraryError::Io {
                file: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();

            if path.extension().and_then(|e| e.to_str()) != Some(PROGRAM_EXT) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let source = std::fs::read_to_string(&path).map_err(|source| LibraryError::Io {
                file: path.clone(),
                source,
            })?;

            self.register(name, &source)
                .map_err(|source| LibraryError::Parse {
                    file: path.clone(),
                    source,
                })?;
            count += 1;
        }

        Ok(count)
    }
}

fn content_hash(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}
