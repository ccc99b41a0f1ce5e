//! Shared helpers for integration tests.

#![allow(dead_code, unused_macros)]

use launchspan::{
    ArgToken, CallParams, CallPhase, CallbackRecord, Dim3, Dispatcher, MemorySink, StreamHandle,
    Tracer, TracerConfig,
};
use std::sync::{Arc, Once};

static INIT_LOGGING: Once = Once::new();

/// Installs a test-writer tracing subscriber once per test binary.
///
/// Honors `RUST_LOG`; defaults to `launchspan=debug`.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("launchspan=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Logs the start of a named test phase.
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = $name, "test phase");
    };
}

/// Logs test completion.
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = $name, "test complete");
    };
}

/// Asserts `cond`, logging the expected and actual values first.
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {{
        let ok = $cond;
        if ok {
            tracing::debug!(check = $msg, expected = ?$expected, actual = ?$actual, "check passed");
        } else {
            tracing::error!(check = $msg, expected = ?$expected, actual = ?$actual, "check failed");
        }
        assert!(
            ok,
            "{}: expected {:?}, actual {:?}",
            $msg, $expected, $actual
        );
    }};
}

/// A dispatcher over a fresh memory sink with default config.
pub fn memory_dispatcher() -> (Arc<MemorySink>, Arc<Tracer>, Dispatcher) {
    memory_dispatcher_with(&TracerConfig::default())
}

/// A dispatcher over a fresh memory sink.
pub fn memory_dispatcher_with(config: &TracerConfig) -> (Arc<MemorySink>, Arc<Tracer>, Dispatcher) {
    let sink = Arc::new(MemorySink::new());
    let tracer = Arc::new(Tracer::new(config, sink.clone()));
    let dispatcher = Dispatcher::new(tracer.clone());
    (sink, tracer, dispatcher)
}

pub fn configure(phase: CallPhase, grid: (u32, u32, u32), block: (u32, u32, u32)) -> CallbackRecord {
    CallbackRecord::runtime(
        22,
        phase,
        "cudaConfigureCall",
        CallParams::Configure {
            grid: Dim3::from(grid),
            block: Dim3::from(block),
            shared_mem: 0,
            stream: StreamHandle::DEFAULT,
        },
    )
}

pub fn setup_argument(phase: CallPhase, arg: usize) -> CallbackRecord {
    CallbackRecord::runtime(
        23,
        phase,
        "cudaSetupArgument",
        CallParams::SetupArgument {
            arg: ArgToken(arg),
            size: 8,
            offset: 0,
        },
    )
}

pub fn launch(phase: CallPhase, symbol: &str) -> CallbackRecord {
    CallbackRecord::runtime(
        13,
        phase,
        "cudaLaunch",
        CallParams::Launch {
            symbol: symbol.to_string(),
        },
    )
}

pub fn plain(phase: CallPhase, name: &str) -> CallbackRecord {
    CallbackRecord::runtime(1, phase, name, CallParams::None)
}

/// Enter and exit records for a whole configured launch, in callback order.
pub fn configured_launch(symbol: &str, args: &[usize]) -> Vec<CallbackRecord> {
    let mut records = vec![
        configure(CallPhase::Enter, (1, 1, 1), (32, 1, 1)),
        configure(CallPhase::Exit, (1, 1, 1), (32, 1, 1)),
    ];
    for &arg in args {
        records.push(setup_argument(CallPhase::Enter, arg));
        records.push(setup_argument(CallPhase::Exit, arg));
    }
    records.push(launch(CallPhase::Enter, symbol));
    records.push(launch(CallPhase::Exit, symbol));
    records
}
