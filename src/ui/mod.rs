/// View helpers
///
/// - note_card.rs: rendering of a single note
/// - images.rs: cache of image handles for resolved URLs

pub mod images;
pub mod note_card;
