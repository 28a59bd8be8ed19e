// Errors surfaced by the data-fetch and mutation boundaries
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum BoundaryError {
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Upstream returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("GraphQL error: {0}")]
    Graphql(String),
    #[error("Malformed response: {0}")]
    Decode(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for BoundaryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BoundaryError::Decode(err.to_string())
        } else {
            BoundaryError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BoundaryError {
    fn from(err: serde_json::Error) -> Self {
        BoundaryError::Decode(err.to_string())
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SquadError {
    #[error("Player {0} is already in the squad")]
    AlreadyInSquad(String),
    #[error("Match {0} is archived and its squad can no longer change")]
    Archived(String),
    #[error(transparent)]
    Boundary(#[from] BoundaryError),
}
