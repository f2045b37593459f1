//! File and directory manipulation utilities.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::{fs, io};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::from_reader;

/// Reads a JSON-encoded type from a given file `path`.
pub fn read_json<D: DeserializeOwned>(path: impl AsRef<Path>) -> Result<D, io::Error> {
    let file = File::open(path)?;
    Ok(from_reader(file)?)
}

/// Writes a JSON-encoded type to a given file `path`, creating parent directories as
/// needed and replacing any existing file.
pub fn write_json<S: Serialize>(path: impl AsRef<Path>, value: &S) -> Result<(), io::Error> {
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    serde_json::to_writer(BufWriter::new(file), value)?;
    Ok(())
}
