/// GraphQL documents and response envelopes for the notes API
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{BackendError, BackendResult, NoteRecord};

const NOTE_FIELDS: &str = "id name description image createdAt";

pub fn list_notes_query() -> String {
    format!(
        "query ListNotes($nextToken: String) {{ listNotes(nextToken: $nextToken) {{ items {{ {} }} nextToken }} }}",
        NOTE_FIELDS
    )
}

pub fn create_note_mutation() -> String {
    format!(
        "mutation CreateNote($input: CreateNoteInput!) {{ createNote(input: $input) {{ {} }} }}",
        NOTE_FIELDS
    )
}

pub fn delete_note_mutation() -> String {
    format!(
        "mutation DeleteNote($input: DeleteNoteInput!) {{ deleteNote(input: $input) {{ {} }} }}",
        NOTE_FIELDS
    )
}

/// Request body sent to the endpoint
#[derive(Debug, Serialize)]
pub struct GraphQlRequest {
    pub query: String,
    pub variables: Value,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

/// Response envelope: `data` and/or `errors`
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

impl<T> GraphQlResponse<T> {
    /// Any reported error wins over partial data.
    pub fn into_result(self) -> BackendResult<T> {
        if !self.errors.is_empty() {
            let messages: Vec<String> = self.errors.into_iter().map(|e| e.message).collect();
            return Err(BackendError::Api(messages.join("; ")));
        }
        self.data
            .ok_or_else(|| BackendError::Api("response carried no data".into()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePage {
    pub items: Vec<Option<NoteRecord>>,
    #[serde(default)]
    pub next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNotesData {
    pub list_notes: NotePage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteData {
    pub create_note: NoteRecord,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteNoteData {
    pub delete_note: Option<NoteRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_page_parses_nulls_and_token() {
        let body = r#"{
            "data": { "listNotes": {
                "items": [
                    { "id": "n1", "name": "A", "description": "a", "image": "cat.png",
                      "createdAt": "2024-05-01T10:00:00.000Z" },
                    null,
                    { "id": "n2", "name": "B", "description": "b", "image": null }
                ],
                "nextToken": "abc"
            } }
        }"#;

        let response: GraphQlResponse<ListNotesData> = serde_json::from_str(body).unwrap();
        let page = response.into_result().unwrap().list_notes;

        assert_eq!(page.next_token.as_deref(), Some("abc"));
        let notes: Vec<NoteRecord> = page.items.into_iter().flatten().collect();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].image.as_deref(), Some("cat.png"));
        assert!(notes[0].created_at.is_some());
        assert_eq!(notes[1].image, None);
    }

    #[test]
    fn test_errors_win_over_data() {
        let body = r#"{
            "data": { "createNote": null },
            "errors": [ { "message": "Unauthorized" }, { "message": "Try again" } ]
        }"#;

        let response: GraphQlResponse<Value> = serde_json::from_str(body).unwrap();
        assert_eq!(
            response.into_result(),
            Err(BackendError::Api("Unauthorized; Try again".into()))
        );
    }

    #[test]
    fn test_documents_name_their_operations() {
        assert!(list_notes_query().starts_with("query ListNotes"));
        assert!(create_note_mutation().contains("createNote(input: $input)"));
        assert!(delete_note_mutation().contains("DeleteNoteInput!"));
    }
}
