//! File intake: uploaded image files, their previews and the dropzone's drag state.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// File picker filter. Only a hint: drops are not filtered.
pub const ACCEPT: &str = "image/*";

/// Fallback MIME type for content we cannot identify.
pub const OCTET_STREAM: &str = "application/octet-stream";

static NEXT_FILE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one upload. Previews are tagged with the id they were derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(u64);

impl FileId {
    fn next() -> Self {
        Self(NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// How the file reached us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadSource {
    #[default]
    Picker,
    Drop,
}

impl UploadSource {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "drop" => Self::Drop,
            _ => Self::Picker,
        }
    }
}

/// Where the file's bytes live.
#[derive(Debug, Clone)]
pub enum Blob {
    Memory(Bytes),
    /// Written to the spool directory on upload, read back on demand.
    Spooled(Arc<SpooledFile>),
}

/// An upload on disk. The file is removed when the last handle goes away.
#[derive(Debug)]
pub struct SpooledFile(PathBuf);

impl SpooledFile {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for SpooledFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

impl Blob {
    /// Read the whole blob. Only spooled blobs can fail.
    pub async fn read(&self) -> io::Result<Bytes> {
        match self {
            Self::Memory(bytes) => Ok(bytes.clone()),
            Self::Spooled(file) => tokio::fs::read(file.path()).await.map(Bytes::from),
        }
    }
}

/// A user-chosen file. Immutable once created; a new upload replaces it.
#[derive(Debug, Clone)]
pub struct ImageFile {
    id: FileId,
    name: String,
    mime_type: String,
    blob: Blob,
}

impl ImageFile {
    /// An in-memory upload. `declared_mime` is whatever the browser sent, if anything.
    pub fn from_bytes(name: impl Into<String>, declared_mime: Option<&str>, bytes: Bytes) -> Self {
        let mime_type = resolve_mime(declared_mime, &bytes);
        Self {
            id: FileId::next(),
            name: name.into(),
            mime_type,
            blob: Blob::Memory(bytes),
        }
    }

    /// Write `bytes` into `dir` and keep only the path.
    pub async fn spool(
        dir: &Path,
        name: impl Into<String>,
        declared_mime: Option<&str>,
        bytes: Bytes,
    ) -> io::Result<Self> {
        let id = FileId::next();
        let mime_type = resolve_mime(declared_mime, &bytes);
        let path = dir.join(format!("upload-{}-{}.bin", std::process::id(), id.0));
        tokio::fs::write(&path, &bytes).await?;
        Ok(Self {
            id,
            name: name.into(),
            mime_type,
            blob: Blob::Spooled(Arc::new(SpooledFile(path))),
        })
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn blob(&self) -> &Blob {
        &self.blob
    }
}

/// Trust the declared type unless it is missing or generic, then sniff magic bytes.
pub fn resolve_mime(declared: Option<&str>, bytes: &[u8]) -> String {
    match declared.map(str::trim) {
        Some(mime) if !mime.is_empty() && mime != OCTET_STREAM => mime.to_string(),
        _ => image::guess_format(bytes)
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|_| OCTET_STREAM.to_string()),
    }
}

/// Displayable `data:` URI of an uploaded file's exact bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Preview(String);

impl Preview {
    /// Read the file and build its data URI. Runs off the request path.
    pub async fn derive(file: &ImageFile) -> io::Result<Self> {
        let bytes = file.blob().read().await?;
        Ok(Self::from_bytes(file.mime_type(), &bytes))
    }

    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        Self(format!("data:{mime_type};base64,{}", STANDARD.encode(bytes)))
    }

    pub fn as_uri(&self) -> &str {
        &self.0
    }

    /// Split the URI back into MIME type and bytes.
    pub fn decode(&self) -> Option<(String, Vec<u8>)> {
        let rest = self.0.strip_prefix("data:")?;
        let (mime, data) = rest.split_once(";base64,")?;
        let bytes = STANDARD.decode(data).ok()?;
        Some((mime.to_string(), bytes))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragEvent {
    Enter,
    Over,
    Leave,
    Drop,
}

/// Cosmetic "something is being dragged over the dropzone" flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dropzone {
    dragging: bool,
}

impl Dropzone {
    pub fn handle(&mut self, event: DragEvent) {
        self.dragging = matches!(event, DragEvent::Enter | DragEvent::Over);
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    #[tokio::test]
    async fn preview_round_trips_bytes_and_mime() {
        let bytes: Vec<u8> = PNG_HEADER.iter().copied().chain(0u8..=255).collect();
        let file = ImageFile::from_bytes("photo.png", Some("image/png"), Bytes::from(bytes.clone()));

        let preview = Preview::derive(&file).await.unwrap();
        assert!(preview.as_uri().starts_with("data:image/png;base64,"));

        let (mime, decoded) = preview.decode().unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn mime_is_sniffed_when_missing_or_generic() {
        assert_eq!(resolve_mime(None, PNG_HEADER), "image/png");
        assert_eq!(resolve_mime(Some(OCTET_STREAM), PNG_HEADER), "image/png");
        assert_eq!(resolve_mime(Some("image/jpeg"), PNG_HEADER), "image/jpeg");
        assert_eq!(resolve_mime(Some(""), b"plain text"), OCTET_STREAM);
    }

    #[test]
    fn dropped_non_images_are_accepted() {
        let file = ImageFile::from_bytes("notes.txt", Some("text/plain"), Bytes::from_static(b"hi"));
        assert_eq!(file.mime_type(), "text/plain");
        assert_eq!(file.name(), "notes.txt");
    }

    #[test]
    fn file_ids_are_unique() {
        let a = ImageFile::from_bytes("a.png", None, Bytes::new());
        let b = ImageFile::from_bytes("a.png", None, Bytes::new());
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn spooled_file_reads_back_then_fails_once_removed() {
        let dir = std::env::temp_dir();
        let file = ImageFile::spool(&dir, "photo.png", None, Bytes::from_static(PNG_HEADER))
            .await
            .unwrap();
        assert_eq!(file.mime_type(), "image/png");
        assert_eq!(file.blob().read().await.unwrap().as_ref(), PNG_HEADER);

        let Blob::Spooled(spooled) = file.blob() else { panic!("expected a spooled blob") };
        let path = spooled.path().to_path_buf();
        tokio::fs::remove_file(&path).await.unwrap();
        assert!(Preview::derive(&file).await.is_err());
    }

    #[tokio::test]
    async fn spooled_file_is_removed_with_last_handle() {
        let file = ImageFile::spool(&std::env::temp_dir(), "photo.png", None, Bytes::from_static(PNG_HEADER))
            .await
            .unwrap();
        let Blob::Spooled(spooled) = file.blob() else { panic!("expected a spooled blob") };
        let path = spooled.path().to_path_buf();
        let copy = file.clone();

        drop(file);
        assert!(path.exists());
        drop(copy);
        assert!(!path.exists());
    }

    #[test]
    fn drag_state_follows_events() {
        let mut zone = Dropzone::default();
        assert!(!zone.is_dragging());
        zone.handle(DragEvent::Enter);
        assert!(zone.is_dragging());
        zone.handle(DragEvent::Over);
        assert!(zone.is_dragging());
        zone.handle(DragEvent::Leave);
        assert!(!zone.is_dragging());
        zone.handle(DragEvent::Over);
        zone.handle(DragEvent::Drop);
        assert!(!zone.is_dragging());
    }

    #[test]
    fn upload_source_parsing() {
        assert_eq!(UploadSource::parse("drop"), UploadSource::Drop);
        assert_eq!(UploadSource::parse("picker"), UploadSource::Picker);
        assert_eq!(UploadSource::parse(""), UploadSource::Picker);
    }
}
