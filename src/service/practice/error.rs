use snafu::{Location, Snafu};

use super::SessionState;
use crate::model::{FileId, ValidationError};
use crate::service::backend::BackendError;
use crate::service::generation::GenerationError;
use crate::service::revision::RevisionError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SessionError {
    #[snafu(display("could not open the script of file {file_id}: {source}"))]
    Load {
        file_id: FileId,
        source: BackendError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("the session is {state:?}, cannot do that now"))]
    Inactive {
        state: SessionState,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("set a goal time first"))]
    GoalTimeUnset,

    #[snafu(display("a past revision is being previewed, cancel or restore it before editing"))]
    PreviewReadOnly,

    #[snafu(transparent)]
    Validation { source: ValidationError },

    #[snafu(transparent)]
    Generation { source: GenerationError },

    #[snafu(transparent)]
    Revision { source: RevisionError },
}
