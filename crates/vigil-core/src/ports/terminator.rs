//! Process terminator port definition

/// Exit code used when a session escalates after exhausting its restart budget
pub const ESCALATION_EXIT_CODE: i32 = 1;

/// Port for ending the host process
///
/// Sessions configured to exit on stream failure call this after the
/// terminal error has been surfaced. Implementations normally never return.
pub trait ProcessTerminator: Send + Sync {
    fn terminate(&self, exit_code: i32);
}
