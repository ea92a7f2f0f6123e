//==================================================
// File: fault/reporter.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Fail-fast fault reporting for compiled programs
// Objective: Print the exception header and call trace, then end the process
//==================================================

use std::io::{self, IsTerminal, Write};
use std::process;

use parking_lot::Mutex;
use tracing::{error, warn};

use crate::config::{FaultConfig, FaultStream};

use super::trace::CallTrace;
use super::Fault;

const BRED: &str = "\x1b[1;31m";
const RED: &str = "\x1b[0;31m";
const BYEL: &str = "\x1b[1;33m";
const YEL: &str = "\x1b[0;33m";
const RESET: &str = "\x1b[0m";

// Held by the first faulting thread until the process exits.
static REPORT_LOCK: Mutex<()> = parking_lot::const_mutex(());

#[derive(Debug, Clone, Default)]
pub struct FaultReporter {
    config: FaultConfig,
}

impl FaultReporter {
    pub fn new(config: FaultConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FaultConfig {
        &self.config
    }

    /// Writes the diagnostic block for `message` and the visible part of `trace`.
    pub fn write_report<W: Write>(
        &self,
        out: &mut W,
        message: &str,
        trace: &CallTrace,
        color: bool,
    ) -> io::Result<()> {
        if color {
            writeln!(out, "{BRED}[RUNTIME] {RED}Encountered Exception! {BRED}'{message}'")?;
            writeln!(out, "{BYEL}[STACKTRACE] {YEL}")?;
        } else {
            writeln!(out, "[RUNTIME] Encountered Exception! '{message}'")?;
            writeln!(out, "[STACKTRACE] ")?;
        }
        for frame in trace.visible(&self.config.module_markers) {
            writeln!(out, "{}", frame.description)?;
        }
        if color {
            write!(out, "{RESET}")?;
        }
        out.flush()
    }

    pub fn raise(&self, fault: &Fault) -> ! {
        self.terminate(&fault.to_string(), fault.kind().as_str())
    }

    /// Prints the report for `message` and terminates with the configured
    /// exit status. Never returns.
    pub fn report(&self, message: &str) -> ! {
        self.terminate(message, "unclassified")
    }

    // The log event follows the report so the diagnostic block always opens
    // the fault output, even when logs share its stream.
    fn terminate(&self, message: &str, kind: &str) -> ! {
        let _serial = REPORT_LOCK.lock();

        let trace = CallTrace::capture(self.config.frame_limit);
        let written = match self.config.stream {
            FaultStream::Stderr => {
                let stderr = io::stderr();
                let color = self.config.color.enabled(stderr.is_terminal());
                self.write_report(&mut stderr.lock(), message, &trace, color)
            }
            FaultStream::Stdout => {
                let stdout = io::stdout();
                let color = self.config.color.enabled(stdout.is_terminal());
                self.write_report(&mut stdout.lock(), message, &trace, color)
            }
        };
        drop(trace);

        if let Err(err) = written {
            warn!(%err, "fault report could not be written");
        }
        error!(kind, fault = message, "fatal runtime exception");
        process::exit(self.config.exit_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColorMode;
    use crate::fault::trace::ResolvedFrame;

    fn render(reporter: &FaultReporter, message: &str, frames: &[&str], color: bool) -> String {
        let trace = CallTrace::from_frames(
            frames
                .iter()
                .map(|text| ResolvedFrame::new(0, *text))
                .collect(),
        );
        let mut out = Vec::new();
        reporter
            .write_report(&mut out, message, &trace, color)
            .expect("write to vec");
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn plain_report_layout() {
        let reporter = FaultReporter::default();
        let text = render(
            &reporter,
            "Object of type Cat could not be casted to type Dog!",
            &["./demo(cast_site+0x1) [0x10]", "./demo(main+0x2) [0x20]", "/lib/libc.so.6(start) [0x30]"],
            false,
        );
        assert_eq!(
            text,
            "[RUNTIME] Encountered Exception! 'Object of type Cat could not be casted to type Dog!'\n\
             [STACKTRACE] \n\
             ./demo(cast_site+0x1) [0x10]\n\
             ./demo(main+0x2) [0x20]\n"
        );
    }

    #[test]
    fn colored_report_wraps_header() {
        let reporter = FaultReporter::new(FaultConfig {
            color: ColorMode::Always,
            ..FaultConfig::default()
        });
        let text = render(&reporter, "boom", &[], true);
        assert!(text.starts_with("\x1b[1;31m[RUNTIME] \x1b[0;31mEncountered Exception! \x1b[1;31m'boom'\n"));
        assert!(text.contains("\x1b[1;33m[STACKTRACE] \x1b[0;33m\n"));
        assert!(text.ends_with(RESET));
    }

    #[test]
    fn custom_markers_cut_the_trace() {
        let reporter = FaultReporter::new(FaultConfig {
            module_markers: vec!["std::rt::".into()],
            ..FaultConfig::default()
        });
        let text = render(&reporter, "x", &["demo::main", "std::rt::lang_start", "libc.so.6"], false);
        assert!(text.contains("demo::main\n"));
        assert!(!text.contains("lang_start"));
        assert!(!text.contains("libc.so.6"));
    }
}
