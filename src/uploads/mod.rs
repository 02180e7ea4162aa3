//! File upload storage with an extension allow-list.
//!
//! Files land in a flat directory and are shared in chat as `/uploads/...`
//! URLs rebroadcast through the file-share event.

pub mod handlers;

use std::path::PathBuf;

use tokio::fs;
use tracing::info;

use crate::error::{Error, UploadError};

const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "pdf", "mp4", "mp3", "docx"];

pub struct UploadStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    /// Reduces a client-supplied name to a safe flat filename: the last path
    /// component, with anything outside `[A-Za-z0-9._-]` replaced, and the
    /// extension checked against the allow-list.
    pub fn sanitize_filename(name: &str) -> Result<String, UploadError> {
        let base = name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .trim();

        let cleaned: String = base
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        let cleaned = cleaned.trim_matches('.').to_string();
        if cleaned.is_empty() {
            return Err(UploadError::InvalidFilename);
        }

        match cleaned.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                let ext = ext.to_ascii_lowercase();
                if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
                    Ok(cleaned)
                } else {
                    Err(UploadError::TypeNotAllowed(ext))
                }
            }
            _ => Err(UploadError::InvalidFilename),
        }
    }

    /// Stores the file and returns its share URL.
    pub async fn save(&self, filename: &str, bytes: &[u8]) -> Result<String, Error> {
        if bytes.len() > self.max_bytes {
            return Err(Error::Upload(UploadError::TooLarge));
        }

        let filename = Self::sanitize_filename(filename).map_err(Error::Upload)?;

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::Upload(UploadError::StorageError(e.to_string())))?;
        fs::write(self.dir.join(&filename), bytes)
            .await
            .map_err(|e| Error::Upload(UploadError::StorageError(e.to_string())))?;

        info!("Stored upload {} ({} bytes)", filename, bytes.len());
        Ok(format!("/uploads/{filename}"))
    }

    /// Reads a stored file back, with the content type implied by its
    /// extension.
    pub async fn read(&self, filename: &str) -> Result<(Vec<u8>, &'static str), Error> {
        let filename = Self::sanitize_filename(filename).map_err(Error::Upload)?;

        let bytes = match fs::read(self.dir.join(&filename)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::Upload(UploadError::NotFound));
            }
            Err(e) => return Err(Error::Upload(UploadError::StorageError(e.to_string()))),
        };

        let ext = filename.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
        Ok((bytes, content_type_for(ext)))
    }
}

fn content_type_for(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "pdf" => "application/pdf",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}
