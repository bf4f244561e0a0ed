mod health;
mod sync;

pub use health::health_check;
pub use sync::{export_drawing, import_drawing, reimport_drawing};

use crate::error::ApiError;
use cadsync_core::models::ProjectId;

pub(crate) fn parse_project(value: &str) -> Result<ProjectId, ApiError> {
    value
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid project id").with_details(value.to_string()))
}
