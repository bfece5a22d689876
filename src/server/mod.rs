//! HTTP layer: request info resolution, the license filter, and upstream forwarding

pub mod filter;
pub mod proxy;
pub mod request_info;
pub mod router;

pub use filter::{
    violation_headers, GateMode, LicenseGate, LICENSE_VIOLATION_STATUS, VIOLATION_CURRENT,
    VIOLATION_END_TIME, VIOLATION_EXPECTED, VIOLATION_START_TIME, VIOLATION_TYPE,
};
pub use proxy::{forward, Upstream};
pub use request_info::{resolve_request_info, RequestInfo};
pub use router::build_router;
