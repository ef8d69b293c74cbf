//! Feature-specific logging macros and utilities
//!
//! Each pipeline component logs under its own target so runs can be filtered
//! with e.g. `RUST_LOG=datadic::ingest=debug`.

/// Feature categories for logging
#[derive(Debug, Clone)]
pub enum LogFeature {
    Process,
    Ingest,
    Store,
    Scheduler,
    Inbound,
}

impl LogFeature {
    /// Get the target string for this feature
    pub fn target(&self) -> &'static str {
        match self {
            LogFeature::Process => "datadic::process",
            LogFeature::Ingest => "datadic::ingest",
            LogFeature::Store => "datadic::store",
            LogFeature::Scheduler => "datadic::scheduler",
            LogFeature::Inbound => "datadic::inbound",
        }
    }
}

// Transform pipeline (normalize, repair, flatten, link, aggregate)
#[macro_export]
macro_rules! log_process_info {
    ($($arg:tt)*) => {
        log::info!(target: "datadic::process", $($arg)*)
    };
}

#[macro_export]
macro_rules! log_process_warn {
    ($($arg:tt)*) => {
        log::warn!(target: "datadic::process", $($arg)*)
    };
}

#[macro_export]
macro_rules! log_process_debug {
    ($($arg:tt)*) => {
        log::debug!(target: "datadic::process", $($arg)*)
    };
}

// Orchestrator and loaders
#[macro_export]
macro_rules! log_ingest_info {
    ($($arg:tt)*) => {
        log::info!(target: "datadic::ingest", $($arg)*)
    };
}

#[macro_export]
macro_rules! log_ingest_warn {
    ($($arg:tt)*) => {
        log::warn!(target: "datadic::ingest", $($arg)*)
    };
}

#[macro_export]
macro_rules! log_ingest_error {
    ($($arg:tt)*) => {
        log::error!(target: "datadic::ingest", $($arg)*)
    };
}

#[macro_export]
macro_rules! log_ingest_debug {
    ($($arg:tt)*) => {
        log::debug!(target: "datadic::ingest", $($arg)*)
    };
}

// Scheduler and name cache
#[macro_export]
macro_rules! log_scheduler_info {
    ($($arg:tt)*) => {
        log::info!(target: "datadic::scheduler", $($arg)*)
    };
}

#[macro_export]
macro_rules! log_scheduler_warn {
    ($($arg:tt)*) => {
        log::warn!(target: "datadic::scheduler", $($arg)*)
    };
}

// Write path
#[macro_export]
macro_rules! log_inbound_info {
    ($($arg:tt)*) => {
        log::info!(target: "datadic::inbound", $($arg)*)
    };
}

// Performance monitoring helper
pub struct PerformanceTimer {
    start: std::time::Instant,
    feature: LogFeature,
    operation: String,
}

impl PerformanceTimer {
    pub fn new(feature: LogFeature, operation: String) -> Self {
        log::debug!(target: feature.target(), "Starting timed operation: {}", operation);
        Self {
            start: std::time::Instant::now(),
            feature,
            operation,
        }
    }

    pub fn finish(self) -> std::time::Duration {
        let duration = self.start.elapsed();
        log::info!(
            target: self.feature.target(),
            "Operation '{}' completed in {:?}",
            self.operation,
            duration
        );
        duration
    }
}
