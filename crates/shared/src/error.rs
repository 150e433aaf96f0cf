use thiserror::Error;

/// A payload that parsed as JSON but does not describe a usable snapshot.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SnapshotError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("negative revision {0}")]
    NegativeRevision(i64),
    #[error("non-finite timestamp in `{0}`")]
    NonFiniteTimestamp(&'static str),
    #[error("invalid countdown_sec {0}")]
    InvalidCountdown(f64),
    #[error("question has no options")]
    NoOptions,
    #[error("answer index {index} out of range for {options} options")]
    AnswerOutOfRange { index: usize, options: usize },
}
