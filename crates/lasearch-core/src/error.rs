use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown document kind: {0:?} (expected LLC1 or CON29)")]
    UnknownDocumentKind(String),

    #[error("unknown planning decision: {0:?}")]
    UnknownDecision(String),
}
