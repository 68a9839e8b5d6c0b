/// In-memory capabilities for controller tests
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    AuthCapability, BackendError, BackendResult, BlobStore, CreateNoteInput, GraphApi, NoteRecord,
    Services,
};

/// Recorded calls and switchable failures
#[derive(Debug, Default)]
pub struct MemoryState {
    pub notes: Vec<NoteRecord>,
    pub blobs: HashMap<String, Vec<u8>>,
    pub list_calls: usize,
    pub created: Vec<CreateNoteInput>,
    pub deleted: Vec<String>,
    pub sign_outs: usize,
    pub fail_list: bool,
    pub fail_create: bool,
    pub fail_delete: bool,
    pub fail_put: bool,
    pub fail_get: bool,
    next_id: u64,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn with_notes(notes: Vec<NoteRecord>) -> Arc<Self> {
        let backend = MemoryBackend::default();
        backend.state().notes = notes;
        Arc::new(backend)
    }

    pub fn services(self: &Arc<Self>) -> Services {
        Services {
            auth: self.clone(),
            api: self.clone(),
            store: self.clone(),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }

    pub fn url_for(key: &str) -> String {
        format!("https://blobs.test/public/{}", key)
    }
}

pub fn record(id: &str, name: &str, description: &str, image: Option<&str>) -> NoteRecord {
    NoteRecord {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        image: image.map(str::to_string),
        created_at: None,
    }
}

#[async_trait]
impl GraphApi for MemoryBackend {
    async fn list_notes(&self) -> BackendResult<Vec<NoteRecord>> {
        let mut state = self.state();
        state.list_calls += 1;
        if state.fail_list {
            return Err(BackendError::Network("connection reset".into()));
        }
        Ok(state.notes.clone())
    }

    async fn create_note(&self, input: &CreateNoteInput) -> BackendResult<NoteRecord> {
        let mut state = self.state();
        state.created.push(input.clone());
        if state.fail_create {
            return Err(BackendError::Api("create rejected".into()));
        }
        state.next_id += 1;
        let note = NoteRecord {
            id: format!("srv-{}", state.next_id),
            name: input.name.clone(),
            description: input.description.clone(),
            image: input.image.clone(),
            created_at: None,
        };
        state.notes.push(note.clone());
        Ok(note)
    }

    async fn delete_note(&self, id: &str) -> BackendResult<NoteRecord> {
        let mut state = self.state();
        state.deleted.push(id.to_string());
        if state.fail_delete {
            return Err(BackendError::Api("delete rejected".into()));
        }
        let pos = state
            .notes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| BackendError::NotFound(id.to_string()))?;
        Ok(state.notes.remove(pos))
    }
}

#[async_trait]
impl BlobStore for MemoryBackend {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> BackendResult<()> {
        let mut state = self.state();
        if state.fail_put {
            return Err(BackendError::Storage("bucket unavailable".into()));
        }
        state.blobs.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get_url(&self, key: &str) -> BackendResult<String> {
        if self.state().fail_get {
            return Err(BackendError::NotFound(key.to_string()));
        }
        Ok(MemoryBackend::url_for(key))
    }
}

#[async_trait]
impl AuthCapability for MemoryBackend {
    async fn sign_out(&self) -> BackendResult<()> {
        self.state().sign_outs += 1;
        Ok(())
    }

    fn username(&self) -> Option<String> {
        Some("tester".into())
    }
}
