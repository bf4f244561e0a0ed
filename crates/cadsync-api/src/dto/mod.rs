mod request;
mod response;

pub use request::ExportRequest;
pub use response::HealthResponse;
