use iced::widget::{button, column, container, image, row, text};
use iced::{Alignment, Element, Length};

use super::images::ImageCache;
use crate::state::data::{ImageRef, Note, NoteId};
use crate::Message;

const IMAGE_WIDTH: f32 = 200.0;
const PLACEHOLDER_HEIGHT: f32 = 140.0;

/// One note: image (or placeholder), name, description, delete button
pub fn note_card<'a>(note: &'a Note, images: &'a ImageCache) -> Element<'a, Message> {
    let url = note.image.as_ref().and_then(ImageRef::url);

    let picture: Element<'a, Message> = match url.and_then(|url| images.handle(url)) {
        Some(handle) => image(handle.clone())
            .width(Length::Fixed(IMAGE_WIDTH))
            .into(),
        None => {
            let label = match (&note.image, url) {
                (None, _) => "No image",
                (Some(_), Some(url)) if images.is_loading(url) => "Loading…",
                (Some(_), _) => "Image unavailable",
            };
            container(text(label).size(14))
                .center_x(Length::Fixed(IMAGE_WIDTH))
                .center_y(Length::Fixed(PLACEHOLDER_HEIGHT))
                .style(container::bordered_box)
                .into()
        }
    };

    let mut details = column![
        text(&note.name).size(24),
        text(&note.description).size(16),
    ]
    .spacing(8)
    .align_x(Alignment::Start);

    if let NoteId::Local(_) = note.id {
        details = details.push(text("Saving…").size(12));
    }

    details = details.push(
        button(text("❌"))
            .on_press(Message::DeleteNote(note.id.clone()))
            .padding(6),
    );

    container(row![picture, details].spacing(20).align_y(Alignment::Start))
        .padding(16)
        .width(Length::Fill)
        .style(container::rounded_box)
        .into()
}
