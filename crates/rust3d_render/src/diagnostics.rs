//! Soft failure reporting for shader compilation and program linking
//!
//! A stage that fails to compile or a program that fails to link does not
//! abort anything. The backend's info log is handed to a sink and execution
//! continues; the caller decides whether to give up.

use std::fmt;

use crate::gpu::StageKind;

/// One reported compile or link failure
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    StageCompile { stage: StageKind, log: String },
    ProgramLink { log: String },
}

impl Diagnostic {
    /// The backend info log, verbatim
    pub fn log(&self) -> &str {
        match self {
            Diagnostic::StageCompile { log, .. } | Diagnostic::ProgramLink { log } => log,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::StageCompile { stage, log } => {
                write!(f, "{} shader failed to compile: {}", stage, log)
            }
            Diagnostic::ProgramLink { log } => write!(f, "program failed to link: {}", log),
        }
    }
}

/// Receives compile and link diagnostics
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to the `log` facade at warn level
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        log::warn!("{}", diagnostic);
    }
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_sink_collects_in_order() {
        let mut sink: Vec<Diagnostic> = Vec::new();
        sink.report(Diagnostic::StageCompile {
            stage: StageKind::Vertex,
            log: "a".into(),
        });
        sink.report(Diagnostic::ProgramLink { log: "b".into() });
        assert_eq!(sink.len(), 2);
        assert_eq!(sink[0].log(), "a");
        assert_eq!(sink[1].log(), "b");
    }

    #[test]
    fn test_display_includes_log() {
        let d = Diagnostic::StageCompile {
            stage: StageKind::Fragment,
            log: "error: missing entry point".into(),
        };
        assert_eq!(
            d.to_string(),
            "fragment shader failed to compile: error: missing entry point"
        );
    }

    #[test]
    fn test_log_sink_accepts_reports() {
        let mut sink = LogSink;
        sink.report(Diagnostic::ProgramLink { log: "x".into() });
    }
}
