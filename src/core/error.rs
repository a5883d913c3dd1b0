use thiserror::Error as ThisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Storage,
    Parse,
    NotFound,
    InvalidArgument,
    InvalidState,
    Internal,
}

#[derive(Debug, ThisError)]
#[error("{kind:?}: {context}")]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Error { kind, context: context.into() }
    }

    pub fn not_found(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::NotFound, context)
    }

    pub fn invalid(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidArgument, context)
    }

    /// Rejected input, reported before any mutation happened.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Parse | ErrorKind::NotFound | ErrorKind::InvalidArgument
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::new(ErrorKind::Io, err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::new(ErrorKind::Storage, format!("encoding error: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Error::new(ErrorKind::Io, err.to_string())
        } else {
            Error::new(ErrorKind::Parse, err.to_string())
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::new(ErrorKind::Storage, format!("SQL error: {}", err))
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::new(ErrorKind::InvalidArgument, format!("Invalid regular expression: {}", err))
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::new(ErrorKind::Parse, format!("Malformed segment markup: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_kind_and_context() {
        let err = Error::not_found("Unknown memory: abc");
        assert_eq!(err.to_string(), "NotFound: Unknown memory: abc");
    }

    #[test]
    fn validation_kinds() {
        assert!(Error::invalid("bad").is_validation());
        assert!(!Error::new(ErrorKind::Storage, "disk").is_validation());
        let regex_err: Error = regex::Regex::new("(").unwrap_err().into();
        assert!(regex_err.is_validation());
    }
}
