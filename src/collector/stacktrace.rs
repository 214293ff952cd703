// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Backtrace capture and best-effort symbolication.
//!
//! Capture runs on the reporter thread, in normal execution context, so the
//! synchronized `backtrace::trace` is fine here (the unsynchronized variant
//! is only needed when unwinding inside a crashing process). Symbolication
//! asks the dynamic loader, via `dladdr`, for the containing module and the
//! nearest preceding exported symbol of each address. A miss is not an
//! error: stripped binaries degrade gracefully to address-only lines.

use std::ffi::CStr;
use std::fmt::Write;
use symbolic_common::Name;
use symbolic_demangle::{Demangle, DemangleOptions};

/// One captured return address plus whatever the dynamic loader knew about
/// it. Both strings are empty when resolution failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolizedFrame {
    pub ip: usize,
    pub symbol: String,
    pub module: String,
}

/// Walks the current call stack and returns up to `max_frames` instruction
/// pointers, innermost first, stopping early if the stack is shorter.
///
/// Frames up to and including this function's own are skipped: they belong
/// to the monitor and the unwinder, not to the code being diagnosed. If
/// the skip marker cannot be identified (no unwind info for this frame),
/// the unfiltered stack is returned instead — a noisy trace beats an empty
/// one.
pub fn capture(max_frames: usize) -> Vec<usize> {
    let mut ips = Vec::with_capacity(max_frames);
    let capture_address = capture as usize;
    let mut seen_self = false;
    backtrace::trace(|frame| {
        if !seen_self {
            if frame.symbol_address() as usize == capture_address {
                seen_self = true;
            }
            return true;
        }
        let ip = frame.ip() as usize;
        if ip != 0 {
            ips.push(ip);
        }
        ips.len() < max_frames
    });
    if ips.is_empty() {
        backtrace::trace(|frame| {
            let ip = frame.ip() as usize;
            if ip != 0 {
                ips.push(ip);
            }
            ips.len() < max_frames
        });
    }
    ips
}

/// Resolves each address to a `(symbol, module)` pair. Resolution is a pure
/// lookup against the loader's tables, so symbolizing the same address
/// twice yields the same result.
pub fn symbolize(ips: &[usize], demangle_names: bool) -> Vec<SymbolizedFrame> {
    ips.iter()
        .map(|&ip| resolve_frame(ip, demangle_names))
        .collect()
}

fn resolve_frame(ip: usize, demangle_names: bool) -> SymbolizedFrame {
    let mut symbol = String::new();
    let mut module = String::new();

    // SAFETY: dladdr only writes `info` on success, and the strings it
    // returns point into loader-owned tables that live as long as the
    // containing module stays mapped.
    let mut info: libc::Dl_info = unsafe { std::mem::zeroed() };
    if unsafe { libc::dladdr(ip as *const libc::c_void, &mut info) } != 0 {
        if !info.dli_sname.is_null() {
            let raw = unsafe { CStr::from_ptr(info.dli_sname) }
                .to_string_lossy()
                .into_owned();
            symbol = if demangle_names {
                Name::from(raw.as_str())
                    .try_demangle(DemangleOptions::name_only())
                    .into_owned()
            } else {
                raw
            };
        }
        if !info.dli_fname.is_null() {
            module = unsafe { CStr::from_ptr(info.dli_fname) }
                .to_string_lossy()
                .into_owned();
        }
    }

    SymbolizedFrame { ip, symbol, module }
}

/// Renders the delivery payload: a header line naming the signal and the
/// UTC capture time, then one line per frame with index, address, symbol
/// and module.
pub fn format_report(signum: i32, frames: &[SymbolizedFrame]) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(
        out,
        "signal {signum} received at {}",
        chrono::Utc::now().to_rfc3339()
    );
    for (idx, frame) in frames.iter().enumerate() {
        let _ = writeln!(
            out,
            "  #{idx:2}: {:#018x}  {} {}",
            frame.ip, frame.symbol, frame.module
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_respects_max_frames() {
        let ips = capture(4);
        assert!(!ips.is_empty());
        assert!(ips.len() <= 4);
    }

    #[test]
    fn test_capture_is_stable_at_equal_depth() {
        let first = capture(256);
        let second = capture(256);
        assert!(!first.is_empty());
        assert_eq!(first.len(), second.len());
    }

    #[test]
    fn test_capture_starts_at_the_caller() {
        let ips = capture(32);
        assert!(!ips.is_empty());
        // Resolve whatever debug info this build has; none of the captured
        // frames may point back into the capture machinery itself.
        let mut names = vec![];
        for ip in &ips {
            backtrace::resolve(*ip as *mut libc::c_void, |symbol| {
                if let Some(name) = symbol.name() {
                    names.push(name.to_string());
                }
            });
        }
        assert!(
            names.iter().all(|n| !n.contains("stacktrace::capture")),
            "monitor internals leaked into the trace: {names:?}"
        );
    }

    #[test]
    fn test_symbolize_preserves_addresses_and_is_idempotent() {
        let ips = capture(8);
        let first = symbolize(&ips, true);
        let second = symbolize(&ips, true);
        assert_eq!(first.len(), ips.len());
        for (frame, ip) in first.iter().zip(&ips) {
            assert_eq!(frame.ip, *ip);
        }
        assert_eq!(first, second);
    }

    #[test]
    fn test_unresolvable_address_degrades_to_empty_fields() {
        // Address 1 is never inside a mapped module.
        let frames = symbolize(&[1], true);
        assert_eq!(frames[0].ip, 1);
        assert!(frames[0].symbol.is_empty());
        assert!(frames[0].module.is_empty());
    }

    #[test]
    fn test_format_report_layout() {
        let frames = vec![
            SymbolizedFrame {
                ip: 0xdeadbeef,
                symbol: "main".into(),
                module: "/usr/bin/app".into(),
            },
            SymbolizedFrame {
                ip: 0x1,
                symbol: String::new(),
                module: String::new(),
            },
        ];
        let report = format_report(libc::SIGSEGV, &frames);
        let mut lines = report.lines();
        assert!(lines
            .next()
            .unwrap()
            .starts_with(&format!("signal {} received at ", libc::SIGSEGV)));
        let frame_line = lines.next().unwrap();
        assert!(frame_line.contains("# 0:"));
        assert!(frame_line.contains("0x00000000deadbeef"));
        assert!(frame_line.contains("main"));
        assert!(frame_line.contains("/usr/bin/app"));
        // Unresolved frames keep their address-only line.
        assert!(lines.next().unwrap().contains("# 1:"));
    }
}
