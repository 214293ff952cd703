// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
#![cfg(unix)]

use datadog_signal_monitor::{
    init_with_signals, FailureNotifier, FaultSink, MonitorConfiguration,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
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
fn empty_signal_set_installs_nothing_and_reports_nothing() {
    let (tx, rx) = mpsc::channel();
    let failure_count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&failure_count);
    let notifier: FailureNotifier = Arc::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let config = MonitorConfiguration::new(vec![], false, false, None, false).unwrap();
    init_with_signals(config, notifier.clone(), Box::new(ChannelSink { tx: tx.clone() }))
        .unwrap();

    // The no-op install does not claim the process-wide slot either: a
    // second empty install succeeds the same way.
    let config = MonitorConfiguration::new(vec![], false, false, None, false).unwrap();
    init_with_signals(config, notifier, Box::new(ChannelSink { tx })).unwrap();

    assert_eq!(failure_count.load(Ordering::SeqCst), 0);
    assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
}
