//! Request pipeline stages, outermost first:
//!
//! 1. [`recover_panic`]
//! 2. request id + `TraceLayer` (wired in the router)
//! 3. [`log_request`]
//! 4. [`common_headers`]
//! 5. [`load_and_save`]
//! 6. [`authenticate`]
//! 7. [`require_authentication`] on protected routes only

mod gate;
mod headers;
mod identity;
mod logging;
mod recover;
mod session;

pub use gate::{require_authentication, LOGIN_PATH};
pub use headers::common_headers;
pub use identity::{authenticate, Identity, RequestContext};
pub use logging::log_request;
pub use recover::{install_panic_hook, recover_panic};
pub use session::load_and_save;
