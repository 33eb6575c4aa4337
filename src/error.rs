use std::io;
use std::path::PathBuf;

/// error type for packrat operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("read error on {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("write error on {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("archive read error: {0}")]
    ArchiveRead(#[source] io::Error),

    #[error("archive write error: {0}")]
    ArchiveWrite(#[source] io::Error),

    #[error("no such path: {0}")]
    NotExist(PathBuf),

    #[error("source path has no file name: {0}")]
    InvalidSource(PathBuf),

    #[error("entry name too long for archive record: {0}")]
    NameTooLong(String),

    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    #[error("huffman code length {0} exceeds 256 bits")]
    CodeTooLong(usize),

    #[error("operation cancelled")]
    Cancelled,

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

/// errno-like classification of an error, for callers that dispatch on
/// failure kind rather than message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    IoOpen,
    IoRead,
    IoWrite,
    NotExist,
    NoPermission,
    Malformed,
    Cancelled,
    Other,
}

impl Error {
    /// classify this error into the coarse taxonomy
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Open { .. } => ErrorCode::IoOpen,
            Error::Read { .. } | Error::ArchiveRead(_) => ErrorCode::IoRead,
            Error::Write { .. } | Error::ArchiveWrite(_) => ErrorCode::IoWrite,
            Error::NotExist(_) => ErrorCode::NotExist,
            Error::MalformedArchive(_) | Error::CodeTooLong(_) => ErrorCode::Malformed,
            Error::Cancelled => ErrorCode::Cancelled,
            Error::Io { source, .. } => match source.kind() {
                io::ErrorKind::NotFound => ErrorCode::NotExist,
                io::ErrorKind::PermissionDenied => ErrorCode::NoPermission,
                _ => ErrorCode::Other,
            },
            _ => ErrorCode::Other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// helper to wrap io errors with path context
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}
