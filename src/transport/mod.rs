//! Transports shared by the scrapers.
//!
//! - [`http`]: JSON APIs over a pooled `reqwest` client with retry/backoff
//! - [`browser`]: JavaScript-rendered pages through headless Chrome
//!
//! Both follow the same lifecycle: `Uninitialized` until first use, `Active`
//! while the native resource exists, `Closed` after teardown. A closed
//! transport refuses work until it is explicitly re-initialised.

pub mod browser;
pub mod http;

pub use browser::{BrowserTransport, PageRenderer};
pub use http::{HttpTransport, validate_shape};

/// Lifecycle phase of a transport, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Active,
    Closed,
}
