use thiserror::Error;

/// Coarse failure classes every layer reports in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing input.
    Validation,
    /// A referenced identity or post does not exist.
    NotFound,
    /// The operation clashes with current state (duplicate, already friends).
    Conflict,
    /// The store was busy or unreachable; safe for the caller to retry.
    Transient,
    /// Anything unexpected.
    Internal,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transient)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelationshipError {
    #[error("You can't send a request to yourself.")]
    SelfRequest,

    #[error("Already friends.")]
    AlreadyFriends,

    #[error("Request already sent.")]
    AlreadyRequested,

    #[error("This user already sent you a request; accept it instead.")]
    ReversePending,

    #[error("No such request found")]
    NoSuchRequest,
}

impl RelationshipError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelationshipError::SelfRequest => ErrorKind::Validation,
            RelationshipError::AlreadyFriends
            | RelationshipError::AlreadyRequested
            | RelationshipError::ReversePending
            | RelationshipError::NoSuchRequest => ErrorKind::Conflict,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    #[error("Post content cannot be empty")]
    EmptyPost,

    #[error("Comment text cannot be empty")]
    EmptyComment,
}

impl ContentError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}
