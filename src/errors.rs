use std::any::Any;
use std::io;
use std::io::ErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Io(io::Error),
    #[error("reader callback failed")]
    ReaderCallback,
    #[error("writer callback failed")]
    WriterCallback,
    #[error("at least one callback must be supplied")]
    NoCallback,
    #[error("invalid method: {0}")]
    Method(String),
    #[error("{0}")]
    Format(String),
    #[error("{0}")]
    State(&'static str),
    #[error("segment checksum mismatch")]
    Checksum,
    #[error("{0}")]
    Crypto(String),
    #[error("failed to parse summary output")]
    Summary,
    #[error("summary tool exited with status {0}")]
    Tool(i32),
    #[error("{0}")]
    Panic(String),
}

impl Error {
    /// Wrap into an [`io::Error`] so it can travel through `Read`/`Write`.
    pub fn into_io_error(self) -> io::Error {
        match self {
            Error::Io(e) => e,
            e => io::Error::new(ErrorKind::Other, e),
        }
    }

    /// Describe a panic payload caught with `catch_unwind`.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let msg = match payload.downcast::<String>() {
            Ok(s) => *s,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(s) => s.to_string(),
                Err(_) => "unknown panic".into(),
            },
        };
        Error::Panic(msg)
    }

    pub(crate) fn format<S: Into<String>>(msg: S) -> Self {
        Error::Format(msg.into())
    }
}

/// Errors that went through [`Error::into_io_error`] come back out as
/// themselves.
impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        if !e.get_ref().map_or(false, |inner| inner.is::<Error>()) {
            return Error::Io(e);
        }
        let kind = e.kind();
        match e.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(inner)) => Error::Io(io::Error::new(kind, inner)),
            None => Error::Io(kind.into()),
        }
    }
}
