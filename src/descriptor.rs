//==================================================
// File: descriptor.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Runtime type identity for compiled SolvraScript objects
// Objective: Describe classes by name, fingerprint and a single parent link
//==================================================

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::registry::TypeRegistry;

/// Dense index of a descriptor inside its [`TypeRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(u32);

impl TypeId {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Runtime metadata for one class definition.
///
/// `class_name` is the coarse identity shared by every instantiation of a
/// class, `fingerprint` tells instantiations apart (for example `List<Int>`
/// and `List<String>` share the class name `List`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    class_name: String,
    fingerprint: String,
    parent: Option<TypeId>,
}

impl TypeDescriptor {
    pub(crate) fn new(class_name: String, fingerprint: String, parent: Option<TypeId>) -> Self {
        Self {
            class_name,
            fingerprint,
            parent,
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn parent(&self) -> Option<TypeId> {
        self.parent
    }
}

/// Borrowed view of a descriptor together with the registry that owns it.
///
/// Handles are only minted by the registry for ids it contains, so every
/// accessor is infallible.
#[derive(Clone, Copy)]
pub struct TypeHandle<'r> {
    registry: &'r TypeRegistry,
    id: TypeId,
}

impl<'r> TypeHandle<'r> {
    pub(crate) fn new(registry: &'r TypeRegistry, id: TypeId) -> Self {
        Self { registry, id }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn descriptor(&self) -> &'r TypeDescriptor {
        self.registry.slot(self.id)
    }

    pub fn class_name(&self) -> &'r str {
        self.descriptor().class_name()
    }

    pub fn fingerprint(&self) -> &'r str {
        self.descriptor().fingerprint()
    }

    pub fn parent(&self) -> Option<TypeHandle<'r>> {
        self.descriptor()
            .parent()
            .map(|parent| TypeHandle::new(self.registry, parent))
    }

    pub fn is_root(&self) -> bool {
        self.descriptor().parent().is_none()
    }

    /// Iterates the parent chain, nearest ancestor first. The handle itself is
    /// not yielded.
    pub fn ancestors(&self) -> Ancestors<'r> {
        Ancestors {
            next: self.parent(),
            remaining: self.registry.max_depth(),
        }
    }
}

impl PartialEq for TypeHandle<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.registry, other.registry) && self.id == other.id
    }
}

impl Eq for TypeHandle<'_> {}

impl fmt::Debug for TypeHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeHandle")
            .field("id", &self.id)
            .field("class_name", &self.class_name())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

impl fmt::Display for TypeHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.class_name(), self.fingerprint())
    }
}

/// Parent-chain walk bounded by the deepest chain seen at registry build time.
pub struct Ancestors<'r> {
    next: Option<TypeHandle<'r>>,
    remaining: usize,
}

impl<'r> Iterator for Ancestors<'r> {
    type Item = TypeHandle<'r>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next.take()?;
        self.remaining -= 1;
        self.next = current.parent();
        Some(current)
    }
}

/// Anything that can stand behind a non-null object reference.
pub trait Typed {
    fn type_id(&self) -> TypeId;
}

/// Minimal object header carried by every allocated SolvraScript object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHeader {
    type_id: TypeId,
}

impl ObjectHeader {
    pub const fn new(type_id: TypeId) -> Self {
        Self { type_id }
    }
}

impl Typed for ObjectHeader {
    fn type_id(&self) -> TypeId {
        self.type_id
    }
}
