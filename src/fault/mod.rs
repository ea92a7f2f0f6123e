//==================================================
// File: fault/mod.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Fatal runtime faults raised by generated code
// Objective: Name every fault, format its message, hand it to the reporter
//==================================================

pub mod reporter;
pub mod trace;

use thiserror::Error;

use crate::descriptor::TypeHandle;

pub use reporter::FaultReporter;
pub use trace::{CallTrace, ResolvedFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    NullReference,
    InvalidCast,
    BrokenExecutable,
}

impl FaultKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FaultKind::NullReference => "null-reference",
            FaultKind::InvalidCast => "invalid-cast",
            FaultKind::BrokenExecutable => "broken-executable",
        }
    }
}

/// What an invalid-cast message quotes for each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastSubject {
    ClassNames,
    Fingerprints,
}

/// Metadata that generated code expected but the registry could not supply.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MissingMetadata {
    #[error("Conversion metadata for output type could not be found! This indicates a broken executable.")]
    TargetType,
    #[error("Runtime metadata for the source object could not be found! This indicates a broken executable.")]
    SourceType,
}

/// Unrecoverable runtime fault. `Display` yields the exact diagnostic message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Fault {
    #[error("Null-Pointer exception! The given reference was null.")]
    NullReference,
    #[error("Object of type {from} could not be casted to type {to}!")]
    InvalidCast {
        from: String,
        to: String,
        subject: CastSubject,
    },
    #[error("{0}")]
    BrokenExecutable(MissingMetadata),
}

impl Fault {
    pub fn kind(&self) -> FaultKind {
        match self {
            Fault::NullReference => FaultKind::NullReference,
            Fault::InvalidCast { .. } => FaultKind::InvalidCast,
            Fault::BrokenExecutable(_) => FaultKind::BrokenExecutable,
        }
    }

    /// Same class name on both sides means the instantiations differ, so the
    /// fingerprints are the only thing worth quoting.
    pub(crate) fn invalid_cast(source: TypeHandle<'_>, target: TypeHandle<'_>, target_fingerprint: &str) -> Self {
        if source.class_name() == target.class_name() {
            Fault::InvalidCast {
                from: source.fingerprint().to_string(),
                to: target_fingerprint.to_string(),
                subject: CastSubject::Fingerprints,
            }
        } else {
            Fault::InvalidCast {
                from: source.class_name().to_string(),
                to: target.class_name().to_string(),
                subject: CastSubject::ClassNames,
            }
        }
    }
}

/// Reports `fault` through the installed runtime context (or default settings)
/// and terminates the process.
pub fn raise(fault: &Fault) -> ! {
    crate::runtime::reporter().raise(fault)
}

/// Reports a free-form message and terminates the process.
pub fn report(message: &str) -> ! {
    crate::runtime::reporter().report(message)
}
