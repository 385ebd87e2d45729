use thiserror::Error;

/// Failure inside a DOM backend.
///
/// Never crosses the engine boundary: the engines go through the
/// infallible query wrappers on [`Dom`](crate::Dom), which log and
/// degrade to "no match".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("unsupported selector: {0}")]
    UnsupportedSelector(String),
    #[error("javascript exception: {0}")]
    Js(String),
}
