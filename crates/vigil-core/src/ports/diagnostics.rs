//! Diagnostic sink port definition

use crate::diagnostics::DiagnosticReport;

/// Port for emitting diagnostic snapshots
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, report: &DiagnosticReport);
}

/// Emits diagnostic reports through `tracing` at INFO level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnosticSink;

impl DiagnosticSink for TracingDiagnosticSink {
    fn emit(&self, report: &DiagnosticReport) {
        tracing::info!(
            source = %report.source,
            state = %report.state,
            healthy = report.is_healthy,
            frames = report.frame_count,
            restarts = report.restart_count,
            consecutive_failures = report.consecutive_failures,
            "Capture diagnostics\n{}",
            report
        );
    }
}
