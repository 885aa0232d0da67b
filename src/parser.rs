use crate::models::TaskRequest;
use crate::state::Draft;
use thiserror::Error;

#[derive(Debug, PartialEq, Error)]
pub enum DraftError {
    #[error("title required")]
    TitleRequired,
}

/// Turns the draft into a request body: the title is trimmed and must not be
/// empty, a blank description is sent as `null`.
pub fn parse_draft(draft: &Draft) -> Result<TaskRequest, DraftError> {
    let title = draft.title.trim();
    if title.is_empty() {
        return Err(DraftError::TitleRequired);
    }

    let description = draft.description.trim();
    let description = if description.is_empty() {
        None
    } else {
        Some(description.to_string())
    };

    Ok(TaskRequest {
        title: title.to_string(),
        description,
    })
}
