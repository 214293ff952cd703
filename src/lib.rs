// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! This crate implements a fatal-signal monitor: it catches a configurable
//! set of UNIX signals (SIGSEGV, SIGBUS, SIGABRT, optionally SIGQUIT for
//! ANR-style hang diagnostics) and hands a symbolicated backtrace to an
//! embedding runtime.
//!
//! Architecturally, it consists of two parts:
//! 1. A signal handler, registered for every monitored signal, which runs
//!    under the constrained async-signal-safe environment
//!    <https://man7.org/linux/man-pages/man7/signal-safety.7.html>.
//!    In particular, memory allocation and synchronization such as mutexes
//!    are potentially UB in that context. The handler therefore does as
//!    little as possible: it posts the signal number, as a single `write`
//!    of one 64-bit value, onto an eventfd and returns, letting the default
//!    semantics of the signal take their course. It runs on a dedicated
//!    alternate stack so that it has usable stack space even when the fault
//!    was a stack overflow, and with all other catchable signals blocked so
//!    that handlers cannot re-enter each other.
//! 2. A long-lived reporter thread, spawned at registration time, which
//!    blocks on the eventfd. When an event arrives it captures a backtrace,
//!    resolves each frame against the dynamic loader's symbol tables, and
//!    invokes the caller-supplied [`FaultSink`] with the signal number and
//!    the formatted trace. The sink runs in a normal execution context and
//!    may allocate, lock, and block freely.
//!
//! Failures during setup are surfaced through a caller-supplied notifier
//! rather than panics: registration happens during early process startup,
//! and a bug in the diagnostics layer must never take the monitored process
//! down with it. If the eventfd cannot be created the handlers still
//! install, but are permanently muted.

#![cfg(unix)]

mod api;
mod collector;
mod shared;

pub use api::{init_with_signals, FailureNotifier};
pub use collector::{
    capture, disable, enable, format_report, symbolize, FaultSink, SymbolizedFrame,
};
pub use shared::configuration::MonitorConfiguration;
pub use shared::error::MonitorError;

use nix::sys::signal::Signal;

/// Converts a raw signal number into a [`Signal`], failing for numbers the
/// platform does not define.
pub fn signal_from_signum(signum: i32) -> anyhow::Result<Signal> {
    Ok(Signal::try_from(signum)?)
}

/// The signals monitored when the caller has no platform-specific
/// preference: the classic fatal four, in ascending signum order (the
/// order [`MonitorConfiguration`] normalizes signal lists to).
pub fn default_signals() -> Vec<i32> {
    vec![libc::SIGILL, libc::SIGABRT, libc::SIGBUS, libc::SIGSEGV]
}
