//! Single-file hierarchical table container.
//!
//! Layout (little endian):
//!
//! ```text
//! magic "DQCC" | version u16 | entry count u32
//! per entry: path (u16 len + utf8) | data column count u16
//!            | data columns (u16 len + utf8 each) | level u32
//!            | payload len u64 | zlib(JSON table)
//! ```
//!
//! Entries are kept ordered by path so equal contents give equal bytes.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::debug;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::core::{Cell, Table};
use crate::error::{QcError, Result};

const MAGIC: &[u8; 4] = b"DQCC";
const VERSION: u16 = 1;

pub const PATH_SEPARATOR: char = '/';

/// Strip trailing separators from a root prefix
pub fn normalize_root(root: &str) -> &str {
    root.trim_end_matches(PATH_SEPARATOR)
}

/// Join a root prefix and a relative key into a container path
pub fn join_path(root: &str, key: &str) -> String {
    format!("{}{}{}", normalize_root(root), PATH_SEPARATOR, key)
}

/// Canonical form of a container path: no empty segments, no leading `/`
pub fn canonical_path(path: &str) -> Result<String> {
    let canonical = path
        .split(PATH_SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    if canonical.is_empty() {
        return Err(QcError::Schema(format!("empty container path '{}'", path)));
    }
    Ok(canonical)
}

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    data_columns: Vec<String>,
    level: u32,
    payload: Vec<u8>,
}

fn corrupt(message: impl Into<String>) -> QcError {
    QcError::persistence(
        "Corrupt container",
        io::Error::new(io::ErrorKind::InvalidData, message.into()),
    )
}

fn io_err(context: &str) -> impl Fn(io::Error) -> QcError + '_ {
    move |e| QcError::persistence(context, e)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Container {
    entries: BTreeMap<String, Entry>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the container at `path`; a missing file yields an empty container
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let file = File::open(path)
            .map_err(|e| QcError::persistence(format!("Failed to open {:?}", path), e))?;
        Self::read_from(BufReader::new(file))
    }

    /// Write atomically: temporary sibling, then rename over `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        let file_name = path
            .file_name()
            .ok_or_else(|| corrupt(format!("{:?} has no file name", path)))?;
        let temp_path = path.with_file_name(format!("{}.tmp", file_name.to_string_lossy()));

        let file = File::create(&temp_path)
            .map_err(|e| QcError::persistence(format!("Failed to create {:?}", temp_path), e))?;

        let result = self.write_and_replace(file, &temp_path, path);
        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result?;
        debug!("Wrote {} entries to {:?}", self.entries.len(), path);
        Ok(())
    }

    fn write_and_replace(&self, file: File, temp_path: &Path, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer
            .flush()
            .map_err(io_err("Failed to flush container"))?;
        drop(writer);

        fs::rename(temp_path, path)
            .map_err(|e| QcError::persistence(format!("Failed to replace {:?}", path), e))
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        let err = io_err("Failed to write container");
        writer.write_all(MAGIC).map_err(&err)?;
        writer.write_all(&VERSION.to_le_bytes()).map_err(&err)?;
        writer
            .write_all(&(self.entries.len() as u32).to_le_bytes())
            .map_err(&err)?;

        for (path, entry) in &self.entries {
            write_str(&mut writer, path).map_err(&err)?;
            writer
                .write_all(&(entry.data_columns.len() as u16).to_le_bytes())
                .map_err(&err)?;
            for column in &entry.data_columns {
                write_str(&mut writer, column).map_err(&err)?;
            }
            writer.write_all(&entry.level.to_le_bytes()).map_err(&err)?;
            writer
                .write_all(&(entry.payload.len() as u64).to_le_bytes())
                .map_err(&err)?;
            writer.write_all(&entry.payload).map_err(&err)?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let err = io_err("Failed to read container");

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(&err)?;
        if &magic != MAGIC {
            return Err(corrupt("bad magic"));
        }
        let version = u16::from_le_bytes(read_array(&mut reader).map_err(&err)?);
        if version != VERSION {
            return Err(corrupt(format!("unsupported version {}", version)));
        }

        let count = u32::from_le_bytes(read_array(&mut reader).map_err(&err)?);
        let mut entries = BTreeMap::new();
        for _ in 0..count {
            let path = read_str(&mut reader).map_err(&err)?;
            let n_columns = u16::from_le_bytes(read_array(&mut reader).map_err(&err)?);
            let data_columns = (0..n_columns)
                .map(|_| read_str(&mut reader))
                .collect::<io::Result<Vec<_>>>()
                .map_err(&err)?;
            let level = u32::from_le_bytes(read_array(&mut reader).map_err(&err)?);
            let len = u64::from_le_bytes(read_array(&mut reader).map_err(&err)?);

            let mut payload = Vec::new();
            (&mut reader)
                .take(len)
                .read_to_end(&mut payload)
                .map_err(&err)?;
            if payload.len() as u64 != len {
                return Err(corrupt(format!("truncated payload for '{}'", path)));
            }

            entries.insert(
                path,
                Entry {
                    data_columns,
                    level,
                    payload,
                },
            );
        }
        Ok(Self { entries })
    }

    /// Store `table` at `path`, replacing any previous entry.
    ///
    /// Columns whose names contain the path separator are not registered
    /// as data columns.
    pub fn put(&mut self, path: &str, table: &Table, level: u32) -> Result<()> {
        let path = canonical_path(path)?;
        let json = serde_json::to_vec(table)
            .map_err(|e| QcError::Schema(format!("cannot encode '{}': {}", path, e)))?;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level.min(9)));
        encoder
            .write_all(&json)
            .map_err(io_err("Failed to compress table"))?;
        let payload = encoder
            .finish()
            .map_err(io_err("Failed to compress table"))?;

        let data_columns = table
            .column_names()
            .into_iter()
            .filter(|name| !name.contains(PATH_SEPARATOR))
            .map(str::to_string)
            .collect();

        self.entries.insert(
            path,
            Entry {
                data_columns,
                level,
                payload,
            },
        );
        Ok(())
    }

    pub fn get(&self, path: &str) -> Result<Table> {
        let path = canonical_path(path)?;
        let entry = self
            .entries
            .get(&path)
            .ok_or_else(|| QcError::EntryNotFound(path.clone()))?;

        let mut json = Vec::new();
        ZlibDecoder::new(entry.payload.as_slice())
            .read_to_end(&mut json)
            .map_err(io_err("Failed to decompress table"))?;
        serde_json::from_slice(&json)
            .map_err(|e| corrupt(format!("cannot decode '{}': {}", path, e)))
    }

    pub fn contains(&self, path: &str) -> bool {
        canonical_path(path)
            .map(|p| self.entries.contains_key(&p))
            .unwrap_or(false)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn data_columns(&self, path: &str) -> Result<&[String]> {
        let path = canonical_path(path)?;
        self.entries
            .get(&path)
            .map(|e| e.data_columns.as_slice())
            .ok_or(QcError::EntryNotFound(path))
    }

    pub fn compression_level(&self, path: &str) -> Result<u32> {
        let path = canonical_path(path)?;
        self.entries
            .get(&path)
            .map(|e| e.level)
            .ok_or(QcError::EntryNotFound(path))
    }

    pub fn remove(&mut self, path: &str) -> bool {
        canonical_path(path)
            .map(|p| self.entries.remove(&p).is_some())
            .unwrap_or(false)
    }

    /// Rows of `path` where `predicate` holds for data column `column`
    pub fn select<F>(&self, path: &str, column: &str, predicate: F) -> Result<Table>
    where
        F: Fn(&Cell) -> bool,
    {
        if !self.data_columns(path)?.iter().any(|c| c == column) {
            return Err(QcError::NotQueryable {
                path: path.to_string(),
                column: column.to_string(),
            });
        }

        let table = self.get(path)?;
        let position = table
            .column_names()
            .iter()
            .position(|c| *c == column)
            .ok_or_else(|| corrupt(format!("data column '{}' missing from '{}'", column, path)))?;
        Ok(table.filter_rows(|row| predicate(row[position])))
    }
}

fn write_str<W: Write>(writer: &mut W, s: &str) -> io::Result<()> {
    let len = u16::try_from(s.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "name too long"))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(s.as_bytes())
}

fn read_array<R: Read, const N: usize>(reader: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_str<R: Read>(reader: &mut R) -> io::Result<String> {
    let len = u16::from_le_bytes(read_array(reader)?) as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
