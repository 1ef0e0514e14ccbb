//! Flat-file meme storage.
//!
//! Memes are PNGs named `meme_{seq:03}_{slug}.png` in one directory. The
//! sequence is one more than the highest already on disk; gaps are never
//! reused. Assigning a sequence and writing the file happen under one lock,
//! and files are created with `create_new`, so concurrent requests can't
//! clobber each other.

use std::fs::{self, OpenOptions};
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use image::{DynamicImage, ImageFormat};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::constants::{
    BATCH_SUMMARY_FILENAME, FILENAME_SLUG_MAX_LEN, GENERATED_URL_PREFIX,
};

const FILENAME_PREFIX: &str = "meme_";
const PNG_SUFFIX: &str = ".png";
const SEQUENCE_DIGITS: std::ops::RangeInclusive<usize> = 3..=6;
const MAX_CREATE_ATTEMPTS: u32 = 100;

/// Storage failures.
#[derive(Debug)]
pub enum StorageError {
    /// Filesystem operation failed.
    Io(io::Error),
    /// PNG encoding failed.
    Encode(image::ImageError),
    /// JSON (de)serialization failed.
    Serialize(serde_json::Error),
    /// Not a plain filename inside the store.
    InvalidFilename(String),
    /// Another writer panicked while holding the sequence lock.
    Lock,
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "Storage I/O error: {err}"),
            Self::Encode(err) => write!(f, "Failed to encode image: {err}"),
            Self::Serialize(err) => write!(f, "Failed to serialize JSON: {err}"),
            Self::InvalidFilename(name) => write!(f, "Invalid filename: {name}"),
            Self::Lock => write!(f, "Meme store lock poisoned"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StorageError::Io(err)
    }
}

impl From<image::ImageError> for StorageError {
    fn from(err: image::ImageError) -> Self {
        StorageError::Encode(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialize(err)
    }
}

/// A stored meme as listed or served.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemeFile {
    /// Bare filename.
    pub filename: String,
    /// Where the HTTP server serves it.
    pub url: String,
    /// Size in bytes.
    pub size: u64,
}

/// A directory of generated memes.
#[derive(Debug)]
pub struct MemeStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl MemeStore {
    /// Store rooted at `dir`. Nothing is created until the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// The backing directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Public URL for `filename`.
    pub fn url_for(filename: &str) -> String {
        format!("{GENERATED_URL_PREFIX}/{filename}")
    }

    /// The sequence number the next save would get.
    pub fn next_sequence(&self) -> Result<u32, StorageError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(1),
            Err(err) => return Err(err.into()),
        };

        let mut highest = 0;
        for entry in entries {
            let entry = entry?;
            if let Some(seq) = entry.file_name().to_str().and_then(sequence_number) {
                highest = highest.max(seq);
            }
        }
        Ok(highest + 1)
    }

    /// Encode `image` as PNG and write it under the next sequence number.
    pub fn save(&self, image: &DynamicImage, description: &str) -> Result<MemeFile, StorageError> {
        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        let slug = sanitize_description(description);

        let _guard = self.write_lock.lock().map_err(|_| StorageError::Lock)?;
        fs::create_dir_all(&self.dir)?;

        let mut seq = self.next_sequence()?;
        for _ in 0..MAX_CREATE_ATTEMPTS {
            let filename = meme_filename(seq, &slug);
            let path = self.dir.join(&filename);
            let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    debug!("{} appeared underneath us, trying the next sequence", path.display());
                    seq += 1;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            write_or_discard(file, &path, &png)?;
            info!("Meme saved to: {}", path.display());
            return Ok(MemeFile {
                url: Self::url_for(&filename),
                filename,
                size: png.len() as u64,
            });
        }

        Err(StorageError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free filename after {MAX_CREATE_ATTEMPTS} attempts"),
        )))
    }

    /// PNGs in the store, newest first. A missing directory is an empty list.
    pub fn list(&self) -> Result<Vec<MemeFile>, StorageError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut memes: Vec<(SystemTime, MemeFile)> = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Some(filename) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !filename.ends_with(PNG_SUFFIX) {
                continue;
            }
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            memes.push((
                modified,
                MemeFile {
                    url: Self::url_for(&filename),
                    filename,
                    size: metadata.len(),
                },
            ));
        }

        memes.sort_by(|(a_time, a), (b_time, b)| {
            b_time.cmp(a_time).then_with(|| b.filename.cmp(&a.filename))
        });
        Ok(memes.into_iter().map(|(_, meme)| meme).collect())
    }

    /// Path for a bare `filename` in the store. Anything that could escape the
    /// directory is rejected.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf, StorageError> {
        let is_plain = !filename.is_empty()
            && !filename.starts_with('.')
            && !filename.contains(['/', '\\', '\0'])
            && !filename.contains("..");
        if !is_plain {
            return Err(StorageError::InvalidFilename(filename.to_string()));
        }
        Ok(self.dir.join(filename))
    }

    /// Write the batch summary JSON next to the memes.
    pub fn write_batch_summary(&self, summary: &impl Serialize) -> Result<PathBuf, StorageError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(BATCH_SUMMARY_FILENAME);
        fs::write(&path, serde_json::to_vec_pretty(summary)?)?;
        info!("Summary saved to: {}", path.display());
        Ok(path)
    }

    /// Read the batch summary, if a batch has run.
    pub fn read_batch_summary<T: DeserializeOwned>(&self) -> Result<Option<T>, StorageError> {
        let path = self.dir.join(BATCH_SUMMARY_FILENAME);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Write all of `bytes` into a freshly created `path`. If the write fails the
/// file is removed, so a truncated meme never shows up in listings.
fn write_or_discard(mut file: impl Write, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let written = file.write_all(bytes).and_then(|()| file.flush());
    if let Err(err) = written {
        drop(file);
        if let Err(remove_err) = fs::remove_file(path) {
            warn!("Failed to remove partial {}: {remove_err}", path.display());
        }
        return Err(err.into());
    }
    Ok(())
}

/// `meme_{seq:03}_{slug}.png`
pub fn meme_filename(seq: u32, slug: &str) -> String {
    format!("{FILENAME_PREFIX}{seq:03}_{slug}{PNG_SUFFIX}")
}

/// The sequence number in a `meme_###_*.png` filename.
pub fn sequence_number(filename: &str) -> Option<u32> {
    let rest = filename
        .strip_prefix(FILENAME_PREFIX)?
        .strip_suffix(PNG_SUFFIX)?;
    let (digits, _) = rest.split_once('_')?;
    if !SEQUENCE_DIGITS.contains(&digits.len()) || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Situation text turned into a filename slug: lower-cased, only ASCII
/// letters and digits, whitespace runs as `_`, bounded length.
pub fn sanitize_description(description: &str) -> String {
    let cleaned: String = description
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();
    let mut slug = cleaned.split_whitespace().collect::<Vec<_>>().join("_");
    slug.truncate(FILENAME_SLUG_MAX_LEN);
    let slug = slug.trim_end_matches('_');
    if slug.is_empty() {
        "meme".to_string()
    } else {
        slug.to_string()
    }
}
