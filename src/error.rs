use thiserror::Error;

pub use color_eyre::eyre::eyre;

pub type Result<T> = core::result::Result<T, Error>;

/// Server-reported ERR_Packet payload.
#[derive(Debug, Clone, thiserror::Error)]
#[error("ERROR {} ({}): {}", self.error_code, self.sql_state, self.message)]
pub struct ServerError {
    pub error_code: u16,
    pub sql_state: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum Error {
    /// The server returned an ERR_Packet outside of authentication.
    #[error("server error: {0}")]
    Server(#[from] ServerError),

    /// The server rejected authentication, or requested a plugin this
    /// crate does not implement.
    #[error("authentication failed: {message}")]
    Auth { code: Option<u16>, message: String },

    /// The reliable transport has given up: either the socket is gone and
    /// retries are exhausted, or the client explicitly closed it.
    #[error("connection closed")]
    Disconnected,

    /// A well-formed-looking packet violated a wire protocol invariant
    /// (bad header, unknown auth switch marker, truncated column
    /// definition, ...).
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Caller supplied a different number of parameters than the prepared
    /// statement expects.
    #[error("parameter count mismatch: given {given}, statement expects {expected}")]
    ParamMismatch { given: usize, expected: usize },

    /// A value could not be encoded as a MySQL parameter (e.g. an integer
    /// that does not fit in 64 bits).
    #[error("cannot encode parameter: {0}")]
    UnsupportedParam(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad config: {0}")]
    BadConfig(String),

    #[error("unsupported authentication plugin: {0}")]
    Unsupported(String),

    /// Internal invariant violation; if this is ever returned it is a bug
    /// in this crate, not a server or caller mistake.
    #[error("internal error: {0}")]
    LibraryBug(color_eyre::Report),

    /// Not enough bytes were available to decode a value. Never escapes the
    /// engine: it signals "await more packet payload", not a caller-visible
    /// failure.
    #[error("short buffer")]
    ShortBuffer,
}

impl Error {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    pub fn from_debug(err: impl std::fmt::Debug) -> Self {
        Self::LibraryBug(color_eyre::eyre::eyre!(format!("{:#?}", err)))
    }
}

impl From<core::convert::Infallible> for Error {
    fn from(err: core::convert::Infallible) -> Self {
        match err {}
    }
}

impl<Src, Dst: ?Sized> From<zerocopy::CastError<Src, Dst>> for Error {
    fn from(err: zerocopy::CastError<Src, Dst>) -> Self {
        Self::LibraryBug(color_eyre::eyre::eyre!("{:#?}", err))
    }
}
