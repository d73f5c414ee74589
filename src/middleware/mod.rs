//! HTTP middleware

mod request_id;

pub use request_id::REQUEST_ID_HEADER;
pub use request_id::request_id;
