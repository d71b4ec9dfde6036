use crate::error::ContentError;

/// Post bodies must contain something other than whitespace.
pub fn validate_post_text(text: &str) -> Result<(), ContentError> {
    if text.trim().is_empty() {
        return Err(ContentError::EmptyPost);
    }
    Ok(())
}

pub fn validate_comment_text(text: &str) -> Result<(), ContentError> {
    if text.trim().is_empty() {
        return Err(ContentError::EmptyComment);
    }
    Ok(())
}
