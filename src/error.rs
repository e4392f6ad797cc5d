use thiserror::Error;

/// Errors that can occur while splitting a stream into chunks and assembling
/// the resulting tree.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading from one of the input streams failed.
    #[error("failed to read input stream: {0}")]
    Io(#[from] std::io::Error),

    /// The injected store rejected a blob or tree.
    #[error("store rejected write: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    /// A buffer, stack, or shalist invariant was violated. This indicates a
    /// bug in the splitter or tree builder rather than bad input.
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl Error {
    pub(crate) fn store<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Store(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
