/// Shared data structures for the application state
///
/// These structs represent the data model that flows between
/// the capability layer and the UI layer.
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::Path;

use crate::backend::{BlobStore, CreateNoteInput, NoteRecord};

/// Identity of a note in the list
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NoteId {
    /// Assigned by the backend
    Remote(String),
    /// Client-side placeholder for a creation the backend has not confirmed
    Local(u64),
}

impl NoteId {
    pub fn remote(&self) -> Option<&str> {
        match self {
            NoteId::Remote(id) => Some(id),
            NoteId::Local(_) => None,
        }
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoteId::Remote(id) => write!(f, "{}", id),
            NoteId::Local(n) => write!(f, "local-{}", n),
        }
    }
}

/// Image attachment of a note
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    /// Storage key only
    Unresolved(String),
    /// Storage key plus the URL the blob store handed out for it
    Resolved { key: String, url: String },
}

impl ImageRef {
    pub fn key(&self) -> &str {
        match self {
            ImageRef::Unresolved(key) => key,
            ImageRef::Resolved { key, .. } => key,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            ImageRef::Unresolved(_) => None,
            ImageRef::Resolved { url, .. } => Some(url),
        }
    }
}

/// A single note in the list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: NoteId,
    pub name: String,
    pub description: String,
    pub image: Option<ImageRef>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Note {
    /// Resolve an unresolved image key through the blob store.
    ///
    /// A failed lookup leaves the key unresolved; the note still shows,
    /// with the placeholder image.
    pub async fn resolve_image(mut self, store: &dyn BlobStore) -> Note {
        let key = match &self.image {
            Some(ImageRef::Unresolved(key)) => key.clone(),
            _ => return self,
        };
        match store.get_url(&key).await {
            Ok(url) => self.image = Some(ImageRef::Resolved { key, url }),
            Err(e) => {
                log::warn!("⚠️  Could not resolve image {:?} of note {}: {}", key, self.id, e);
            }
        }
        self
    }
}

impl From<NoteRecord> for Note {
    fn from(record: NoteRecord) -> Self {
        Note {
            id: NoteId::Remote(record.id),
            name: record.name,
            description: record.description,
            image: record.image.filter(|key| !key.is_empty()).map(ImageRef::Unresolved),
            created_at: record.created_at,
        }
    }
}

/// Scratch buffer behind the create-note form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingForm {
    pub name: String,
    pub description: String,
    /// Storage key of the staged upload
    pub image: Option<String>,
}

impl PendingForm {
    /// Both text fields must be filled in before a note can be created
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && !self.description.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        *self == PendingForm::default()
    }

    pub fn to_input(&self) -> CreateNoteInput {
        CreateNoteInput {
            name: self.name.clone(),
            description: self.description.clone(),
            image: self.image.clone(),
        }
    }
}

/// A file picked in the image dialog
#[derive(Clone, PartialEq, Eq)]
pub struct SelectedFile {
    /// File name, used as the storage key
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub async fn read(path: &Path) -> std::io::Result<SelectedFile> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"))?;
        let bytes = tokio::fs::read(path).await?;
        Ok(SelectedFile { name, bytes })
    }
}

// Skip the payload in debug output
impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}
