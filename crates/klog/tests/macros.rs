//! Integration tests for klog public API (macros, facade bridge, registration).

use std::sync::{Mutex, Once, OnceLock};

use klog::{LogContextProvider, LogLevel, LogOutput, pr_debug, pr_err, pr_info, pr_warn};

static INIT: Once = Once::new();

// The ring buffer and console sink are process-wide; run these tests one at a time.
static SERIAL: Mutex<()> = Mutex::new(());

static OUTPUT_BUF: OnceLock<Mutex<String>> = OnceLock::new();

struct TestOutput;

impl LogOutput for TestOutput {
    fn write_str(&self, s: &str) {
        let buf = OUTPUT_BUF.get_or_init(|| Mutex::new(String::new()));
        buf.lock().unwrap().push_str(s);
    }
}

static TEST_OUTPUT: TestOutput = TestOutput;

struct TestContextProvider;

impl LogContextProvider for TestContextProvider {
    fn cpu_id(&self) -> usize {
        1
    }

    fn timestamp(&self) -> usize {
        123456
    }
}

static TEST_PROVIDER: TestContextProvider = TestContextProvider;

fn init_once() {
    INIT.call_once(|| {
        test_support::init_mock_runtime();
        unsafe {
            klog::register_log_output(&TEST_OUTPUT);
            klog::register_context_provider(&TEST_PROVIDER);
        }
        klog::init_facade();
    });
}

fn drain_logs() {
    while klog::read_log().is_some() {}
}

fn take_output() -> String {
    let buf = OUTPUT_BUF.get_or_init(|| Mutex::new(String::new()));
    let mut g = buf.lock().unwrap();
    let out = g.clone();
    g.clear();
    out
}

#[test]
fn test_pr_macros_buffer_and_console() {
    let _serial = SERIAL.lock().unwrap();
    init_once();
    drain_logs();
    take_output();

    pr_info!("hello {}", 42);
    pr_warn!("watch out");

    // Info is buffered but below the default console threshold.
    let entry = klog::read_log().expect("info entry buffered");
    assert_eq!(entry.level, LogLevel::Info);
    assert_eq!(entry.message(), "hello 42");
    assert_eq!(entry.cpu, 1);
    assert_eq!(entry.timestamp, 123456);

    let entry = klog::read_log().expect("warn entry buffered");
    assert_eq!(entry.level, LogLevel::Warning);

    let console = take_output();
    assert!(!console.contains("hello 42"));
    assert!(console.contains("watch out"));
    assert!(console.contains("cpu1"));
}

#[test]
fn test_facade_bridge_routes_into_ring() {
    let _serial = SERIAL.lock().unwrap();
    init_once();
    drain_logs();
    take_output();

    log::warn!("facade warning {}", 7);

    let entry = klog::read_log().expect("facade record buffered");
    assert_eq!(entry.level, LogLevel::Warning);
    assert_eq!(entry.message(), "facade warning 7");
    assert!(take_output().contains("facade warning 7"));
}

#[test]
fn test_debug_filtered_by_default() {
    let _serial = SERIAL.lock().unwrap();
    init_once();
    drain_logs();

    pr_debug!("invisible");
    assert!(klog::read_log().is_none());

    klog::set_global_level(LogLevel::Debug);
    pr_debug!("visible");
    let entry = klog::read_log().expect("debug entry after raising level");
    assert_eq!(entry.message(), "visible");
    klog::set_global_level(LogLevel::Info);
}

#[test]
fn test_pr_err_always_hits_console() {
    let _serial = SERIAL.lock().unwrap();
    init_once();
    drain_logs();
    take_output();

    pr_err!("disk on fire");
    assert!(take_output().contains("disk on fire"));
    drain_logs();
}
