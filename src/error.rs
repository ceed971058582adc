use snafu::{Location, Snafu};

use crate::config::ConfigError;
use crate::repl::ReplError;
use crate::service::backend::BackendError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ApplicationError {
    #[snafu(transparent)]
    Config { source: ConfigError },

    /// Could not initialize the logger
    InitializeLogger {
        source: tracing::subscriber::SetGlobalDefaultError,
        #[snafu(implicit)]
        location: Location,
    },

    /// Could not build the client for the script server
    Backend {
        source: BackendError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(transparent)]
    Repl { source: ReplError },
}
