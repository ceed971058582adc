use snafu::{Location, Snafu};

pub type Result<T, E = BackendError> = ::std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BackendError {
    #[snafu(display("request to `{url}` failed at {location}: {source}"))]
    Request {
        url: String,
        source: reqwest::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("`{url}` answered with status {status}: {message}"))]
    Status {
        url: String,
        status: u16,
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    /// The deck behind the file id is still being processed by the server.
    #[snafu(display("file is not ready yet: {message}"))]
    NotReady {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("malformed response from `{url}` at {location}: {source}"))]
    Decode {
        url: String,
        source: reqwest::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("cannot refresh the access token without a refresh token"))]
    MissingRefreshToken {
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to build the HTTP client: {source}"))]
    Client { source: reqwest::Error },
}

impl BackendError {
    pub fn is_not_ready(&self) -> bool {
        matches!(self, BackendError::NotReady { .. })
    }
}
