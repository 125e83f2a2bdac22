mod error;
mod handler;
mod router;

pub use error::{ApiError, ApiErrorCode, recover_error};
pub use handler::{ApiResponse, EmptyResponse};
pub use router::routes;
