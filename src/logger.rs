use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

static INIT: AtomicBool = AtomicBool::new(false);

/// Initializes the logger with debug mode, logging all messages including debug messages.
pub fn init_logger_debug() {
    if !INIT.swap(true, Ordering::SeqCst) {
        init(true);
    }
}

/// Initializes the logger with default mode, only logging warnings and above.
pub fn init_logger() {
    if !INIT.swap(true, Ordering::SeqCst) {
        init(false);
    }
}

fn init(debug: bool) {
    let default_filter = if debug { "gta3sc=trace" } else { "gta3sc=warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .try_init();
}
