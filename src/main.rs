use iced::widget::{button, column, container, horizontal_space, row, scrollable, text, text_input, Column};
use iced::{Alignment, Element, Length, Task, Theme};
use rfd::FileDialog;
use std::path::PathBuf;
use thiserror::Error;

mod backend;
mod config;
mod state;
mod ui;

use backend::{BackendError, Services};
use config::{Config, ConfigError};
use state::client::{Effect, Event, NotesClient};
use state::data::{NoteId, SelectedFile};
use ui::images::ImageCache;

/// Image types offered by the picker
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

/// Main application state
struct NotesApp {
    /// Notes, form and capability calls
    client: NotesClient,
    /// Loaded images, keyed by display URL
    images: ImageCache,
    /// Problems that happen outside the client (e.g. reading a picked file)
    notice: Option<String>,
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    /// A capability call finished
    Client(Event),
    NameChanged(String),
    DescriptionChanged(String),
    /// User clicked "Choose Image"
    PickImage,
    /// The picked file was read from disk
    ImagePicked(Result<SelectedFile, String>),
    CreateNote,
    DeleteNote(NoteId),
    SignOut,
    DismissError,
    /// Bytes for a resolved image URL arrived
    ImageFetched {
        url: String,
        result: Result<Vec<u8>, String>,
    },
}

#[derive(Debug, Error)]
enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("backend: {0}")]
    Backend(#[from] BackendError),
}

impl NotesApp {
    /// Create a new instance of the application and start the first fetch
    fn new(services: Services) -> (Self, Task<Message>) {
        let mut client = NotesClient::new(services);
        let task = run(client.initialize());

        log::info!("🗒️  Notes initialized for {}", client.username().unwrap_or_else(|| "local user".into()));

        (
            NotesApp {
                client,
                images: ImageCache::default(),
                notice: None,
            },
            task,
        )
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        let task = match message {
            Message::Client(event) => {
                if matches!(event, Event::Loaded { result: Ok(_), .. }) {
                    self.images.retry_failed();
                }
                run(self.client.apply(event))
            }
            Message::NameChanged(name) => {
                self.client.set_name(name);
                Task::none()
            }
            Message::DescriptionChanged(description) => {
                self.client.set_description(description);
                Task::none()
            }
            Message::PickImage => {
                // Show the native file picker dialog
                let file = FileDialog::new()
                    .set_title("Select an Image")
                    .add_filter("Images", IMAGE_EXTENSIONS)
                    .pick_file();

                match file {
                    Some(path) => Task::perform(read_picked(path), Message::ImagePicked),
                    None => run(self.client.on_file_selected(None)),
                }
            }
            Message::ImagePicked(Ok(file)) => run(self.client.on_file_selected(Some(file))),
            Message::ImagePicked(Err(e)) => {
                log::error!("❌ {}", e);
                self.notice = Some(e);
                Task::none()
            }
            Message::CreateNote => run(self.client.submit_note()),
            Message::DeleteNote(id) => run(self.client.delete_note(&id)),
            Message::SignOut => run(self.client.sign_out()),
            Message::DismissError => {
                self.client.dismiss_error();
                self.notice = None;
                Task::none()
            }
            Message::ImageFetched { url, result } => {
                self.images.insert(url, result);
                Task::none()
            }
        };

        Task::batch([task, self.load_images()])
    }

    /// Start fetching any resolved image not in the cache yet
    fn load_images(&mut self) -> Task<Message> {
        let urls = self.images.request_missing(self.client.notes());
        Task::batch(urls.into_iter().map(|url| {
            Task::perform(ui::images::fetch(url.clone()), move |result| {
                Message::ImageFetched { url: url.clone(), result }
            })
        }))
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        if !self.client.is_signed_in() {
            return container(
                column![
                    text("Signed out").size(36),
                    text("Restart the app to sign in again.").size(16),
                ]
                .spacing(10)
                .align_x(Alignment::Center),
            )
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .into();
        }

        let user = self.client.username().unwrap_or_default();
        let header = row![
            text("My Notes App").size(40),
            horizontal_space(),
            text(user).size(14),
            button("Sign Out")
                .on_press(Message::SignOut)
                .style(button::danger)
                .padding(10),
        ]
        .spacing(20)
        .align_y(Alignment::Center);

        let form = self.client.form();
        let attachment = match &form.image {
            Some(key) => format!("📎 {}", key),
            None => "No image".to_string(),
        };
        let submit = (!self.client.is_creating()).then_some(Message::CreateNote);
        let create = button("Create Note")
            .on_press_maybe(submit.clone())
            .style(button::primary)
            .padding(10);

        let form_row = container(
            row![
                text_input("Note name", &form.name)
                    .on_input(Message::NameChanged)
                    .padding(10),
                text_input("Note description", &form.description)
                    .on_input(Message::DescriptionChanged)
                    .on_submit_maybe(submit)
                    .padding(10),
                button("Choose Image").on_press(Message::PickImage).padding(10),
                text(attachment).size(14),
                create,
            ]
            .spacing(10)
            .align_y(Alignment::Center),
        )
        .padding(16)
        .style(container::rounded_box);

        let banner = self
            .client
            .error()
            .or(self.notice.as_deref())
            .map(|message| {
                row![
                    text(format!("⚠️  {}", message)).size(14),
                    horizontal_space(),
                    button("Dismiss").on_press(Message::DismissError).padding(6),
                ]
                .spacing(10)
                .align_y(Alignment::Center)
            });

        let notes: Element<Message> = if self.client.notes().is_empty() {
            let label = if self.client.is_loading() {
                "Loading notes…"
            } else {
                "No notes yet."
            };
            text(label).size(16).into()
        } else {
            Column::with_children(
                self.client
                    .notes()
                    .iter()
                    .map(|note| ui::note_card::note_card(note, &self.images)),
            )
            .spacing(12)
            .into()
        };

        let content = Column::new()
            .push(header)
            .push_maybe(banner)
            .push(form_row)
            .push(notes)
            .spacing(20)
            .padding(40)
            .max_width(1000.0);

        container(scrollable(content))
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x(Length::Fill)
            .into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Hand an effect to the runtime; its event comes back as Message::Client
fn run(effect: Option<Effect>) -> Task<Message> {
    match effect {
        Some(effect) => Task::perform(effect, Message::Client),
        None => Task::none(),
    }
}

/// Read a picked file off the UI thread
async fn read_picked(path: PathBuf) -> Result<SelectedFile, String> {
    SelectedFile::read(&path)
        .await
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))
}

fn bootstrap() -> Result<Services, StartupError> {
    let config = Config::load()?;
    Ok(Services::from_config(&config)?)
}

fn main() -> iced::Result {
    env_logger::init();

    let services = match bootstrap() {
        Ok(services) => services,
        Err(e) => {
            log::error!("❌ Startup failed: {}", e);
            eprintln!("notes-app: {}", e);
            std::process::exit(1);
        }
    };

    iced::application("Notes", NotesApp::update, NotesApp::view)
        .theme(NotesApp::theme)
        .centered()
        .run_with(move || NotesApp::new(services))
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend::memory::{record, MemoryBackend};
    use std::sync::Arc;

    const CAT_KEY: &str = "cat.png";

    fn app_with(notes: Vec<backend::NoteRecord>) -> (Arc<MemoryBackend>, NotesApp) {
        let backend = MemoryBackend::with_notes(notes);
        let (app, _startup) = NotesApp::new(backend.services());
        (backend, app)
    }

    /// Run a listing outside the runtime and deliver it like iced would
    async fn deliver_listing(app: &mut NotesApp) {
        let effect = app.client.initialize().unwrap();
        let event = effect.await;
        let _ = app.update(Message::Client(event));
    }

    #[tokio::test]
    async fn test_listing_starts_image_loads() {
        let (_, mut app) = app_with(vec![record("1", "Cat", "a cat", Some(CAT_KEY))]);
        let url = MemoryBackend::url_for(CAT_KEY);

        deliver_listing(&mut app).await;

        assert_eq!(app.client.notes().len(), 1);
        assert!(app.images.is_loading(&url));
    }

    #[tokio::test]
    async fn test_failed_image_is_retried_on_next_listing() {
        let (_, mut app) = app_with(vec![record("1", "Cat", "a cat", Some(CAT_KEY))]);
        let url = MemoryBackend::url_for(CAT_KEY);
        deliver_listing(&mut app).await;

        let _ = app.update(Message::ImageFetched {
            url: url.clone(),
            result: Err("HTTP 404".into()),
        });
        assert!(!app.images.is_loading(&url));

        // Unrelated messages do not refetch.
        let _ = app.update(Message::NameChanged("x".into()));
        assert!(!app.images.is_loading(&url));

        deliver_listing(&mut app).await;
        assert!(app.images.is_loading(&url));

        let _ = app.update(Message::ImageFetched {
            url: url.clone(),
            result: Ok(vec![1, 2, 3]),
        });
        assert!(app.images.handle(&url).is_some());
    }

    #[tokio::test]
    async fn test_repeated_create_while_saving_adds_one_note() {
        let (_, mut app) = app_with(vec![]);

        let _ = app.update(Message::NameChanged("Groceries".into()));
        let _ = app.update(Message::DescriptionChanged("milk".into()));
        let _ = app.update(Message::CreateNote);
        let _ = app.update(Message::NameChanged("Again".into()));
        let _ = app.update(Message::DescriptionChanged("eggs".into()));
        let _ = app.update(Message::CreateNote);

        assert_eq!(app.client.notes().len(), 1);
        assert!(app.client.is_creating());
        assert_eq!(app.client.form().name, "Again");
    }
}
