//==============================================
// File: runtime/mod.rs
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Process-wide runtime context for generated code
// Objective: Install the type registry once and turn any cast or null fault
//            into the fatal report
//==============================================

//==============================================
// Import & Modules
//==============================================

use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::info;

use crate::cast::CastValidator;
use crate::config::RtConfig;
use crate::descriptor::{TypeId, Typed};
use crate::fault::FaultReporter;
use crate::guard;
use crate::registry::TypeRegistry;

static CONTEXT: OnceCell<RuntimeContext> = OnceCell::new();
static DEFAULT_REPORTER: OnceCell<FaultReporter> = OnceCell::new();

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("runtime type context is already installed")]
    AlreadyInstalled,
    #[error("runtime type context has not been installed")]
    NotInstalled,
}

//==============================================
// Section 1.0 - Runtime Context
//==============================================

/// Registry plus settings shared by every cast and dereference site.
#[derive(Debug)]
pub struct RuntimeContext {
    registry: TypeRegistry,
    config: RtConfig,
    reporter: FaultReporter,
}

impl RuntimeContext {
    pub fn new(registry: TypeRegistry, config: RtConfig) -> Self {
        let reporter = FaultReporter::new(config.faults.clone());
        Self {
            registry,
            config,
            reporter,
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RtConfig {
        &self.config
    }

    pub fn reporter(&self) -> &FaultReporter {
        &self.reporter
    }

    pub fn validator(&self) -> CastValidator<'_> {
        CastValidator::new(&self.registry).with_policy(self.config.casts.downcast)
    }

    /// Validates a cast; an illegal one ends the process.
    pub fn ensure_cast(&self, source: Option<TypeId>, target: Option<TypeId>, target_fingerprint: &str) {
        if let Err(fault) = self.validator().validate(source, target, target_fingerprint) {
            self.reporter.raise(&fault);
        }
    }

    pub fn ensure_cast_object<T: Typed + ?Sized>(
        &self,
        object: Option<&T>,
        target: Option<TypeId>,
        target_fingerprint: &str,
    ) {
        self.ensure_cast(object.map(Typed::type_id), target, target_fingerprint);
    }

    /// Unwraps a reference that must not be null; a null one ends the process.
    pub fn ensure_non_null<'a, T: ?Sized>(&self, reference: Option<&'a T>) -> &'a T {
        match guard::guard(reference) {
            Ok(value) => value,
            Err(fault) => self.reporter.raise(&fault),
        }
    }
}

//==============================================
// Section 2.0 - Global Installation
//==============================================

/// Installs the process-wide context. Succeeds exactly once.
pub fn install(context: RuntimeContext) -> Result<&'static RuntimeContext, RuntimeError> {
    CONTEXT
        .set(context)
        .map_err(|_| RuntimeError::AlreadyInstalled)?;
    let installed = CONTEXT.get().ok_or(RuntimeError::NotInstalled)?;
    info!(
        types = installed.registry.len(),
        downcast = ?installed.config.casts.downcast,
        "runtime type context installed"
    );
    Ok(installed)
}

pub fn context() -> Result<&'static RuntimeContext, RuntimeError> {
    CONTEXT.get().ok_or(RuntimeError::NotInstalled)
}

/// Reporter of the installed context, or one with default settings.
pub fn reporter() -> &'static FaultReporter {
    match CONTEXT.get() {
        Some(context) => &context.reporter,
        None => DEFAULT_REPORTER.get_or_init(FaultReporter::default),
    }
}

//==============================================
// Section 3.0 - Generated Code Entry Points
//==============================================

/// Reports `message` and terminates.
pub fn throw(message: &str) -> ! {
    reporter().report(message)
}

pub fn throw_if_null<T: ?Sized>(reference: Option<&T>) -> &T {
    match guard::guard(reference) {
        Ok(value) => value,
        Err(fault) => reporter().raise(&fault),
    }
}

/// Cast check against the installed registry. Without one there is no
/// metadata at all, which is itself fatal.
pub fn throw_if_invalid_cast(source: Option<TypeId>, target: Option<TypeId>, target_fingerprint: &str) {
    if source.is_none() {
        return;
    }
    match context() {
        Ok(context) => context.ensure_cast(source, target, target_fingerprint),
        Err(err) => throw(&err.to_string()),
    }
}
