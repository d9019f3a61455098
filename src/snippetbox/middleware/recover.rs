use axum::{
    extract::Request,
    http::{header::CONNECTION, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use futures::FutureExt;
use std::{
    any::Any,
    backtrace::Backtrace,
    cell::RefCell,
    panic::{self, AssertUnwindSafe},
    sync::Once,
};
use tracing::error;

use crate::snippetbox::errors::client_error;

/// Where a panic happened, captured by the hook while the faulting frames are
/// still on the stack.
#[derive(Debug)]
pub struct PanicReport {
    pub location: String,
    pub backtrace: String,
}

thread_local! {
    static LAST_PANIC: RefCell<Option<PanicReport>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Install a process-wide panic hook that records the panic site and a
/// backtrace for [`recover_panic`]. Chains to the previous hook. Idempotent.
pub fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let report = PanicReport {
                location: info
                    .location()
                    .map_or_else(|| "unknown".to_string(), ToString::to_string),
                backtrace: Backtrace::force_capture().to_string(),
            };
            LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(report));
            previous(info);
        }));
    });
}

/// Take the report recorded by the most recent panic on this thread.
pub fn take_panic_report() -> Option<PanicReport> {
    LAST_PANIC.with(|slot| slot.borrow_mut().take())
}

/// Turn a panic anywhere below into a generic 500 and close the connection.
pub async fn recover_panic(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            // The hook ran on this thread during the same poll that unwound.
            let report = take_panic_report().unwrap_or_else(|| PanicReport {
                location: "unknown".to_string(),
                backtrace: "not captured (panic hook not installed)".to_string(),
            });
            error!(
                %method,
                %uri,
                location = %report.location,
                trace = %report.backtrace,
                "{}",
                panic_message(panic.as_ref())
            );
            let mut response = client_error(StatusCode::INTERNAL_SERVER_ERROR);
            response
                .headers_mut()
                .insert(CONNECTION, HeaderValue::from_static("close"));
            response
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_handles_common_payloads() {
        let static_str: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(static_str.as_ref()), "boom");

        let owned: Box<dyn Any + Send> = Box::new("owned boom".to_string());
        assert_eq!(panic_message(owned.as_ref()), "owned boom");

        let other: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(other.as_ref()), "panic with non-string payload");
    }

    #[inline(never)]
    fn explode_in_handler() {
        panic!("boom");
    }

    #[test]
    fn hook_records_the_faulting_frame() {
        install_panic_hook();
        let _ = take_panic_report();

        let result = panic::catch_unwind(explode_in_handler);
        assert!(result.is_err());

        let report = take_panic_report().expect("hook recorded a report");
        assert!(report.location.contains("recover.rs"), "{}", report.location);
        assert!(
            report.backtrace.contains("explode_in_handler"),
            "{}",
            report.backtrace
        );
        assert!(take_panic_report().is_none());
    }
}
