#![cfg(feature = "logging")]

use log::{Level, LevelFilter, Metadata, Record};
use once_cell::sync::Lazy;
use process_helper::{run, Options};
use std::sync::Mutex;

/// Records every message at Info or above.
struct RecordingLogger {
    records: Mutex<Vec<(Level, String)>>,
}

impl log::Log for RecordingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.records
                .lock()
                .unwrap()
                .push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

static RECORDER: Lazy<RecordingLogger> = Lazy::new(|| RecordingLogger {
    records: Mutex::new(Vec::new()),
});

#[test]
fn test_log_command() {
    log::set_logger(&*RECORDER).unwrap();
    log::set_max_level(LevelFilter::Info);

    let mut opts = Options::new();
    opts.suppress_output();
    run("echo not logged", &opts).unwrap();

    opts.enable_log_command();
    run("echo hello", &opts).unwrap();

    let records = RECORDER.records.lock().unwrap().clone();
    assert_eq!(records, vec![(Level::Info, "echo hello".to_string())]);
}
