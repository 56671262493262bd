//! Failure isolation for calls into extension code
//!
//! Loader hooks, teardown sinks and listeners may fail by returning an error
//! or by panicking. Both are caught here so the caller can log them and keep
//! going.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Why an isolated call did not succeed
#[derive(Debug)]
pub enum Failure<E> {
    /// The callee returned an error
    Error(E),
    /// The callee panicked; holds the panic message when one was available
    Panic(String),
}

impl<E: fmt::Display> fmt::Display for Failure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Error(e) => write!(f, "{e}"),
            Failure::Panic(msg) => write!(f, "panicked: {msg}"),
        }
    }
}

/// Run `f`, converting a panic into [`Failure::Panic`]
pub fn isolate<T, E>(f: impl FnOnce() -> Result<T, E>) -> Result<T, Failure<E>> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(Failure::Error(e)),
        Err(payload) => Err(Failure::Panic(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
