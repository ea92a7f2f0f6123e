//==================================================
// File: fault/trace.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Call-trace collection for fatal runtime faults
// Objective: Capture the faulting thread's frames and cut them at the first
//            dynamically loaded module
//==================================================

/// Frames captured per fault unless configured otherwise.
pub const DEFAULT_FRAME_LIMIT: usize = 128;

/// Module-file suffixes that mark the start of loader/OS machinery.
pub const DEFAULT_MODULE_MARKERS: [&str; 2] = [".so", ".dll"];

// Symbol prefixes of the capture machinery and of the reporter itself. Matched
// against the start of the demangled symbol only.
const REPORTER_FRAMES: [&str; 5] = [
    "backtrace::",
    "solvra_rtti::fault::trace::CallTrace::capture",
    "solvra_rtti::fault::reporter::",
    "solvra_rtti::fault::raise",
    "solvra_rtti::fault::report",
];

//==================================================
// Section 1.0 - Frames
//==================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFrame {
    pub address: usize,
    pub description: String,
}

impl ResolvedFrame {
    pub fn new(address: usize, description: impl Into<String>) -> Self {
        Self {
            address,
            description: description.into(),
        }
    }
}

/// Ordered frames of one fault site, innermost call first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallTrace {
    frames: Vec<ResolvedFrame>,
}

impl CallTrace {
    pub fn from_frames(frames: Vec<ResolvedFrame>) -> Self {
        Self { frames }
    }

    /// Captures at most `limit` frames of the calling thread and resolves them.
    /// Frames belonging to the reporter are dropped from the front.
    pub fn capture(limit: usize) -> Self {
        if limit == 0 {
            return Self::default();
        }

        let mut raw = Vec::with_capacity(limit.min(DEFAULT_FRAME_LIMIT));
        backtrace::trace(|frame| {
            raw.push(frame.clone());
            raw.len() < limit
        });

        let resolved: Vec<(Option<String>, ResolvedFrame)> = raw.iter().map(resolve).collect();
        let start = reporter_prefix_len(resolved.iter().map(|(symbol, _)| symbol.as_deref()));

        Self {
            frames: resolved.into_iter().skip(start).map(|(_, frame)| frame).collect(),
        }
    }

    pub fn frames(&self) -> &[ResolvedFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames before the first one whose description carries a module marker.
    pub fn visible<S: AsRef<str>>(&self, markers: &[S]) -> &[ResolvedFrame] {
        let end = self
            .frames
            .iter()
            .position(|frame| is_external(&frame.description, markers))
            .unwrap_or(self.frames.len());
        &self.frames[..end]
    }
}

pub fn is_external<S: AsRef<str>>(description: &str, markers: &[S]) -> bool {
    markers
        .iter()
        .any(|marker| !marker.as_ref().is_empty() && description.contains(marker.as_ref()))
}

fn is_reporter_symbol(symbol: &str) -> bool {
    let symbol = symbol.trim_start_matches('<');
    REPORTER_FRAMES.iter().any(|prefix| symbol.starts_with(prefix))
}

/// Number of leading frames owned by the capture machinery or the reporter.
/// Only the leading block counts: once a program frame has been seen, later
/// frames are never dropped, whatever their names.
fn reporter_prefix_len<'a>(symbols: impl Iterator<Item = Option<&'a str>>) -> usize {
    let mut end = 0;
    for (index, symbol) in symbols.enumerate() {
        match symbol {
            Some(name) if is_reporter_symbol(name) => end = index + 1,
            // Unnamed frames between capture frames belong to the unwinder.
            None => {}
            Some(name) if name.starts_with("_Unwind_") => {}
            Some(_) => break,
        }
    }
    end
}

//==================================================
// Section 2.0 - Symbolization
//==================================================

fn resolve(frame: &backtrace::Frame) -> (Option<String>, ResolvedFrame) {
    let ip = frame.ip();
    let mut symbol = None;
    backtrace::resolve_frame(frame, |resolved| {
        if symbol.is_none() {
            symbol = resolved.name().map(|name| format!("{name:#}"));
        }
    });
    // Runtime start of the enclosing function; the resolver's own symbol
    // address is not relocated by the module's load base.
    let start = Some(frame.symbol_address() as usize).filter(|&addr| addr != 0);
    let module = sys::module_of(ip);
    let description = describe(
        module.as_ref().map(|m| (m.path.as_str(), m.base)),
        symbol.as_deref().map(|name| (name, start)),
        ip as usize,
    );
    (symbol, ResolvedFrame::new(ip as usize, description))
}

/// Formats one frame as `module(symbol+0xoff) [0xaddr]`.
fn describe(module: Option<(&str, usize)>, symbol: Option<(&str, Option<usize>)>, address: usize) -> String {
    let symbol_part = symbol.map(|(name, start)| match start {
        Some(start) if start <= address => format!("{name}+0x{:x}", address - start),
        _ => name.to_string(),
    });
    match (module, symbol_part) {
        (Some((path, _)), Some(symbol)) => format!("{path}({symbol}) [0x{address:x}]"),
        (Some((path, base)), None) => {
            format!("{path}(+0x{:x}) [0x{address:x}]", address.wrapping_sub(base))
        }
        (None, Some(symbol)) => format!("{symbol} [0x{address:x}]"),
        (None, None) => format!("?? [0x{address:x}]"),
    }
}

struct ModuleInfo {
    path: String,
    base: usize,
}

#[cfg(unix)]
#[allow(unsafe_code)]
mod sys {
    use std::ffi::{CStr, c_void};

    use super::ModuleInfo;

    pub(super) fn module_of(address: *mut c_void) -> Option<ModuleInfo> {
        // SAFETY: Dl_info is plain data; all-zero is a valid empty record.
        let mut info: libc::Dl_info = unsafe { std::mem::zeroed() };
        // SAFETY: dladdr only reads the loader's tables and writes into `info`.
        let found = unsafe { libc::dladdr(address.cast_const(), &mut info) };
        if found == 0 || info.dli_fname.is_null() {
            return None;
        }
        // SAFETY: on success dli_fname points at a NUL-terminated path owned by the loader.
        let path = unsafe { CStr::from_ptr(info.dli_fname) }
            .to_string_lossy()
            .into_owned();
        Some(ModuleInfo {
            path,
            base: info.dli_fbase as usize,
        })
    }
}

#[cfg(not(unix))]
mod sys {
    use std::ffi::c_void;

    use super::ModuleInfo;

    pub(super) fn module_of(_address: *mut c_void) -> Option<ModuleInfo> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic(descriptions: &[&str]) -> CallTrace {
        CallTrace::from_frames(
            descriptions
                .iter()
                .enumerate()
                .map(|(index, text)| ResolvedFrame::new(0x1000 + index, *text))
                .collect(),
        )
    }

    #[test]
    fn stops_before_first_module_frame() {
        let trace = synthetic(&[
            "./demo(main_Cast+0x12) [0x1000]",
            "./demo(main+0x40) [0x1001]",
            "/lib/x86_64-linux-gnu/libc.so.6(__libc_start_main+0xf3) [0x1002]",
            "./demo(_start+0x2e) [0x1003]",
        ]);
        let visible = trace.visible(&DEFAULT_MODULE_MARKERS);
        assert_eq!(visible.len(), 2);
        assert_eq!(visible[1].description, "./demo(main+0x40) [0x1001]");
    }

    #[test]
    fn windows_modules_are_markers_too() {
        let trace = synthetic(&["demo.exe(run) [0x1]", "KERNEL32.dll(BaseThreadInitThunk) [0x2]"]);
        assert_eq!(trace.visible(&DEFAULT_MODULE_MARKERS).len(), 1);
    }

    #[test]
    fn keeps_everything_without_markers() {
        let trace = synthetic(&["a", "b", "c"]);
        assert_eq!(trace.visible(&DEFAULT_MODULE_MARKERS).len(), 3);
        let none: [&str; 0] = [];
        assert_eq!(trace.visible(&none).len(), 3);
    }

    #[test]
    fn marker_on_first_frame_hides_all() {
        let trace = synthetic(&["libfoo.so(f) [0x1]", "./demo(main) [0x2]"]);
        assert!(trace.visible(&DEFAULT_MODULE_MARKERS).is_empty());
    }

    #[test]
    fn empty_markers_never_match() {
        assert!(!is_external("anything", &[""]));
    }

    #[test]
    fn describe_follows_loader_format() {
        assert_eq!(
            describe(Some(("./demo", 0)), Some(("demo::main", Some(0x100))), 0x120),
            "./demo(demo::main+0x20) [0x120]"
        );
        assert_eq!(
            describe(Some(("/lib/libc.so.6", 0x7000)), None, 0x7010),
            "/lib/libc.so.6(+0x10) [0x7010]"
        );
        assert_eq!(describe(None, Some(("f", None)), 0x5), "f [0x5]");
        assert_eq!(describe(None, None, 0x5), "?? [0x5]");
    }

    #[test]
    fn capture_respects_limit() {
        assert!(CallTrace::capture(0).is_empty());
        assert!(CallTrace::capture(4).len() <= 4);
    }

    #[test]
    fn reporter_run_is_cut_only_at_the_front() {
        let symbols = [
            Some("backtrace::backtrace::libunwind::trace"),
            None,
            Some("backtrace::backtrace::trace_unsynchronized"),
            Some("solvra_rtti::fault::trace::CallTrace::capture"),
            Some("solvra_rtti::fault::reporter::FaultReporter::report"),
            Some("<solvra_rtti::fault::reporter::FaultReporter>::raise"),
            Some("solvra_rtti::runtime::throw"),
            Some("solvra_rtti::main"),
            Some("std::sys::backtrace::__rust_begin_short_backtrace"),
            Some("std::rt::lang_start"),
        ];
        assert_eq!(reporter_prefix_len(symbols.into_iter()), 6);
        assert_eq!(reporter_prefix_len([Some("app::main")].into_iter()), 0);
        assert!(!is_reporter_symbol("std::sys::backtrace::__rust_begin_short_backtrace"));
        assert!(!is_reporter_symbol("solvra_rtti::fault::trace::tests::site"));
    }

    #[inline(never)]
    fn fault_site_marker() -> CallTrace {
        let trace = CallTrace::capture(DEFAULT_FRAME_LIMIT);
        std::hint::black_box(trace)
    }

    #[test]
    fn capture_starts_at_the_calling_site() {
        let trace = fault_site_marker();
        let visible = trace.visible(&DEFAULT_MODULE_MARKERS);
        let site = visible
            .iter()
            .find(|frame| frame.description.contains("fault_site_marker"))
            .unwrap_or_else(|| panic!("calling frame missing from {visible:#?}"));
        assert!(
            !trace.frames().iter().any(|frame| {
                frame.description.contains("CallTrace::capture")
                    || frame.description.contains("backtrace::backtrace::")
            }),
            "capture frames leaked into {:#?}",
            trace.frames()
        );

        // Offsets are relative to the function start, not the load base.
        if let Some(offset) = site.description.split("fault_site_marker+0x").nth(1) {
            let digits: String = offset.chars().take_while(|c| c.is_ascii_hexdigit()).collect();
            let offset = usize::from_str_radix(&digits, 16).expect("hex offset");
            assert!(offset < 0x1000, "offset too large in {}", site.description);
        }
    }
}
