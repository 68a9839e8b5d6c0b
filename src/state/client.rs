/// NotesClient: the controller between user intent and the capabilities
///
/// Every operation is a synchronous state transition on the UI thread that
/// may hand back an `Effect`, a future performing the capability calls. The
/// effect resolves to an `Event`, which must be fed back through `apply`.
/// All list and form mutations therefore happen in one place, in the order
/// the effects complete.
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use std::sync::Arc;

use super::collection::{Confirmation, NotesCollection, Removal};
use super::data::{ImageRef, Note, NoteId, PendingForm, SelectedFile};
use crate::backend::{BackendError, BackendResult, BlobStore, GraphApi, Services};

pub type Effect = BoxFuture<'static, Event>;

/// Completion of an effect
#[derive(Debug, Clone)]
pub enum Event {
    Loaded {
        generation: u64,
        result: BackendResult<Vec<Note>>,
    },
    Created {
        local: u64,
        result: BackendResult<Note>,
    },
    Deleted {
        id: String,
        result: BackendResult<()>,
    },
    Uploaded {
        key: String,
        result: BackendResult<()>,
    },
    SignedOut(BackendResult<()>),
}

pub struct NotesClient {
    services: Services,
    notes: NotesCollection,
    form: PendingForm,
    next_local: u64,
    /// Listings requested so far; also the clock for reconciliation
    requested: u64,
    loading: usize,
    creating: usize,
    signed_in: bool,
    error: Option<String>,
}

impl NotesClient {
    pub fn new(services: Services) -> Self {
        NotesClient {
            services,
            notes: NotesCollection::default(),
            form: PendingForm::default(),
            next_local: 1,
            requested: 0,
            loading: 0,
            creating: 0,
            signed_in: true,
            error: None,
        }
    }

    pub fn notes(&self) -> &[Note] {
        self.notes.notes()
    }

    pub fn form(&self) -> &PendingForm {
        &self.form
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading > 0
    }

    pub fn is_creating(&self) -> bool {
        self.creating > 0
    }

    pub fn is_signed_in(&self) -> bool {
        self.signed_in
    }

    pub fn username(&self) -> Option<String> {
        self.services.auth.username()
    }

    pub fn set_name(&mut self, name: String) {
        self.form.name = name;
    }

    pub fn set_description(&mut self, description: String) {
        self.form.description = description;
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Fetch every note and resolve their images.
    pub fn initialize(&mut self) -> Option<Effect> {
        if !self.signed_in {
            return None;
        }
        self.requested += 1;
        self.loading += 1;

        let generation = self.requested;
        let api = self.services.api.clone();
        let store = self.services.store.clone();
        Some(
            async move {
                let result = fetch_notes(api, store).await;
                Event::Loaded { generation, result }
            }
            .boxed(),
        )
    }

    /// Create a note from the form.
    ///
    /// Does nothing unless both name and description are filled in, or while
    /// another creation is still in flight.
    pub fn submit_note(&mut self) -> Option<Effect> {
        if !self.signed_in || !self.form.is_complete() {
            log::debug!("Create ignored: form incomplete");
            return None;
        }
        if self.is_creating() {
            log::debug!("Create ignored: previous note still saving");
            return None;
        }

        let form = std::mem::take(&mut self.form);
        let input = form.to_input();
        let local = self.next_local;
        self.next_local += 1;
        self.creating += 1;

        self.notes.push_pending(
            local,
            Note {
                id: NoteId::Local(local),
                name: form.name,
                description: form.description,
                image: form.image.map(ImageRef::Unresolved),
                created_at: None,
            },
        );

        let api = self.services.api.clone();
        let store = self.services.store.clone();
        Some(
            async move {
                let result = match api.create_note(&input).await {
                    Ok(record) => Ok(Note::from(record).resolve_image(store.as_ref()).await),
                    Err(e) => Err(e),
                };
                Event::Created { local, result }
            }
            .boxed(),
        )
    }

    /// Remove a note from the list now and delete it on the backend.
    pub fn delete_note(&mut self, id: &NoteId) -> Option<Effect> {
        if !self.signed_in {
            return None;
        }
        match self.notes.remove(id) {
            Removal::Remote(remote) => Some(self.delete_effect(remote)),
            Removal::Local => {
                log::debug!("Removed unconfirmed note {}", id);
                None
            }
            Removal::Missing => {
                log::debug!("Delete ignored: no note {}", id);
                None
            }
        }
    }

    /// Stage a picked image and upload it. `None` means the dialog was cancelled.
    pub fn on_file_selected(&mut self, file: Option<SelectedFile>) -> Option<Effect> {
        let file = file?;
        if !self.signed_in {
            return None;
        }

        let key = file.name;
        self.form.image = Some(key.clone());

        let store = self.services.store.clone();
        Some(
            async move {
                let result = store.put(&key, file.bytes).await;
                Event::Uploaded { key, result }
            }
            .boxed(),
        )
    }

    pub fn sign_out(&mut self) -> Option<Effect> {
        if !self.signed_in {
            return None;
        }
        let auth = self.services.auth.clone();
        Some(async move { Event::SignedOut(auth.sign_out().await) }.boxed())
    }

    /// Apply the completion of an effect. May start a follow-up effect.
    pub fn apply(&mut self, event: Event) -> Option<Effect> {
        if !self.signed_in {
            log::debug!("Ignoring {:?} after sign-out", event);
            return None;
        }

        match event {
            Event::Loaded { generation, result } => {
                self.loading = self.loading.saturating_sub(1);
                match result {
                    Ok(notes) => {
                        let count = notes.len();
                        if self.notes.replace_from_backend(notes, generation) {
                            log::info!("📚 Loaded {} notes", count);
                        } else {
                            log::debug!("Discarded stale listing #{}", generation);
                        }
                    }
                    Err(e) => self.report("Could not load notes", e),
                }
                None
            }
            Event::Created { local, result } => {
                self.creating = self.creating.saturating_sub(1);
                match result {
                    Ok(note) => {
                        log::info!("📝 Note {} confirmed", note.id);
                        match self.notes.confirm(local, note, self.requested) {
                            Confirmation::Inserted => None,
                            Confirmation::Cancelled(id) => Some(self.delete_effect(id)),
                        }
                    }
                    Err(e) => {
                        if let Some(note) = self.notes.fail_pending(local) {
                            if self.form.is_empty() {
                                self.form = PendingForm {
                                    name: note.name,
                                    description: note.description,
                                    image: note.image.map(|image| image.key().to_string()),
                                };
                            }
                        }
                        self.report("Could not create note", e);
                        None
                    }
                }
            }
            Event::Deleted { id, result } => {
                match result {
                    Ok(()) | Err(BackendError::NotFound(_)) => {
                        log::info!("🗑️  Note {} deleted", id);
                        self.notes.delete_confirmed(&id, self.requested);
                    }
                    Err(e) => {
                        self.notes.delete_failed(&id);
                        self.report("Could not delete note", e);
                    }
                }
                None
            }
            Event::Uploaded { key, result } => {
                match result {
                    Ok(()) => log::info!("📸 Uploaded {}", key),
                    Err(e) => self.report(&format!("Could not upload {}", key), e),
                }
                self.initialize()
            }
            Event::SignedOut(result) => {
                match result {
                    Ok(()) => {
                        log::info!("👋 Signed out");
                        self.signed_in = false;
                        self.notes = NotesCollection::default();
                        self.form = PendingForm::default();
                        self.error = None;
                    }
                    Err(e) => self.report("Could not sign out", e),
                }
                None
            }
        }
    }

    fn delete_effect(&self, id: String) -> Effect {
        let api = self.services.api.clone();
        async move {
            let result = api.delete_note(&id).await.map(|_| ());
            Event::Deleted { id, result }
        }
        .boxed()
    }

    fn report(&mut self, context: &str, err: BackendError) {
        log::error!("❌ {}: {}", context, err);
        self.error = Some(format!("{}: {}", context, err));
    }
}

async fn fetch_notes(
    api: Arc<dyn GraphApi>,
    store: Arc<dyn BlobStore>,
) -> BackendResult<Vec<Note>> {
    let records = api.list_notes().await?;
    let notes = join_all(
        records
            .into_iter()
            .map(|record| Note::from(record).resolve_image(store.as_ref())),
    )
    .await;
    Ok(notes)
}
