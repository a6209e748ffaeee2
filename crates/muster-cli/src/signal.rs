//! SIGINT → cancellation-token bridge.
//!
//! The capture loops poll their token once per frame, so all the handler
//! has to do is flip the shared flag — an atomic store, which is
//! async-signal-safe.

use muster_core::CancelToken;
use std::sync::OnceLock;

static TOKEN: OnceLock<CancelToken> = OnceLock::new();

extern "C" fn on_sigint(_signum: libc::c_int) {
    if let Some(token) = TOKEN.get() {
        token.cancel();
    }
}

/// Install the SIGINT handler (idempotent) and return the token it fires.
pub fn cancel_on_sigint() -> CancelToken {
    let token = TOKEN.get_or_init(CancelToken::new).clone();
    let handler = on_sigint as extern "C" fn(libc::c_int);
    // SAFETY: the handler only performs an atomic store.
    let _ = unsafe { libc::signal(libc::SIGINT, handler as libc::sighandler_t) };
    token
}
