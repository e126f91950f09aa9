use crate::QuestionKey;

/// Errors from loading or querying quiz content.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// The package has no rounds.
    #[error("package has no rounds")]
    EmptyPackage,

    /// A round has no questions in any theme.
    #[error("round {0} has no questions")]
    EmptyRound(u32),

    /// An id is zero. Ids are 1-based.
    #[error("{kind} id must be positive")]
    ZeroId { kind: &'static str },

    /// Two siblings share the same id.
    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: u32 },

    /// No question exists under the given key.
    #[error("question not found: {0}")]
    NotFound(QuestionKey),

    /// The question was already taken earlier in the session.
    #[error("question already taken: {0}")]
    AlreadyTaken(QuestionKey),

    /// The package document could not be parsed.
    #[error("invalid package document: {0}")]
    Parse(#[from] serde_json::Error),
}
