// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
#![cfg(unix)]

//! End-to-end: install handlers, raise monitored signals, observe delivery.
//!
//! Signal dispositions, the thread sigmask, and the one-shot init guard are
//! process-wide, so this whole scenario lives in a single test function and
//! its own test binary.

use datadog_signal_monitor::{
    disable, enable, init_with_signals, FailureNotifier, FaultSink, MonitorConfiguration,
    MonitorError,
};
use nix::sys::signal::{self, SigSet, Signal};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct ChannelSink {
    tx: mpsc::Sender<(i32, String)>,
}

impl FaultSink for ChannelSink {
    fn on_fatal_signal(&mut self, signum: i32, trace: &str) {
        let _ = self.tx.send((signum, trace.to_string()));
    }
}

#[test]
fn monitored_signals_are_delivered_with_a_symbolicated_trace() {
    // Start out the way a zygote-like spawner leaves us: SIGQUIT blocked.
    let mut quit_set = SigSet::empty();
    quit_set.add(Signal::SIGQUIT);
    quit_set.thread_block().unwrap();

    let (tx, rx) = mpsc::channel();
    let failures: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(vec![]));
    let failures_seen = Arc::clone(&failures);
    let notifier: FailureNotifier = Arc::new(move |e: &MonitorError| {
        failures_seen.lock().unwrap().push(e.to_string());
    });

    let config = MonitorConfiguration::new(
        vec![libc::SIGQUIT, libc::SIGUSR1],
        true,
        true,
        None,
        true,
    )
    .unwrap();
    init_with_signals(config, notifier, Box::new(ChannelSink { tx })).unwrap();
    assert!(failures.lock().unwrap().is_empty());

    // Registering SIGQUIT must have unblocked it for the calling thread.
    assert!(!SigSet::thread_get_mask()
        .unwrap()
        .contains(Signal::SIGQUIT));

    // A monitored signal produces exactly one delivery with a real trace.
    signal::raise(Signal::SIGUSR1).unwrap();
    let (signum, trace) = rx.recv_timeout(Duration::from_secs(10)).unwrap();
    assert_eq!(signum, libc::SIGUSR1);
    assert!(trace.lines().count() > 1, "trace should have frames:\n{trace}");
    assert!(trace.starts_with(&format!("signal {} received at ", libc::SIGUSR1)));
    assert!(trace.contains('#'));

    // SIGQUIT here is diagnostic, not terminal: the process keeps running.
    signal::raise(Signal::SIGQUIT).unwrap();
    let (signum, _trace) = rx.recv_timeout(Duration::from_secs(10)).unwrap();
    assert_eq!(signum, libc::SIGQUIT);

    // A disabled monitor posts nothing, and re-enabling restores delivery.
    disable();
    signal::raise(Signal::SIGUSR1).unwrap();
    assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    enable();
    signal::raise(Signal::SIGUSR1).unwrap();
    let (signum, _trace) = rx.recv_timeout(Duration::from_secs(10)).unwrap();
    assert_eq!(signum, libc::SIGUSR1);

    // No deliveries beyond the signals actually raised.
    assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    assert!(failures.lock().unwrap().is_empty());
}
