//==================================================
// File: registry/mod.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Process-wide table of type descriptors for compiled programs
// Objective: Validate declarations once, then serve immutable lookups to casts
//==================================================

pub mod manifest;

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::descriptor::{TypeDescriptor, TypeHandle, TypeId};

pub use manifest::{ManifestError, RegistryManifest};

/// Class name every type may always be cast to unless the object model says otherwise.
pub const DEFAULT_UNIVERSAL_TOP: &str = "Any";

/// Largest number of descriptors a registry accepts. `u32::MAX` stays free as
/// the "null type" sentinel used across the C boundary.
pub const MAX_TYPES: usize = (u32::MAX - 1) as usize;

//==================================================
// Section 1.0 - Errors
//==================================================

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("type declaration #{index} has an empty class name")]
    EmptyClassName { index: usize },
    #[error("type '{class_name}' has an empty fingerprint")]
    EmptyFingerprint { class_name: String },
    #[error("fingerprint '{0}' is declared more than once")]
    DuplicateFingerprint(String),
    #[error("type '{fingerprint}' names unknown parent '{parent}'")]
    UnknownParent { fingerprint: String, parent: String },
    #[error("inheritance cycle detected through '{0}'")]
    Cycle(String),
    #[error("registry holds more than {} types", MAX_TYPES)]
    TooManyTypes,
    #[error("failed to read registry manifest {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode registry manifest {}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: ManifestError,
    },
    #[error("failed to encode registry manifest")]
    Encode(#[source] bincode::Error),
}

//==================================================
// Section 2.0 - Declarations & Builder
//==================================================

/// One class declaration as emitted by the compiler. Parents are referenced by
/// fingerprint and may be declared in any order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub class_name: String,
    pub fingerprint: String,
    #[serde(default)]
    pub parent: Option<String>,
}

impl TypeDecl {
    pub fn new(class_name: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            fingerprint: fingerprint.into(),
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    universal_top: Option<String>,
    decls: Vec<TypeDecl>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the universal top type name (defaults to [`DEFAULT_UNIVERSAL_TOP`]).
    pub fn universal_top(mut self, name: impl Into<String>) -> Self {
        self.universal_top = Some(name.into());
        self
    }

    /// Declares a root class.
    pub fn with_type(mut self, class_name: &str, fingerprint: &str) -> Self {
        self.decls.push(TypeDecl::new(class_name, fingerprint));
        self
    }

    /// Declares a class whose parent is identified by `parent_fingerprint`.
    pub fn with_child(mut self, class_name: &str, fingerprint: &str, parent_fingerprint: &str) -> Self {
        self.decls
            .push(TypeDecl::new(class_name, fingerprint).with_parent(parent_fingerprint));
        self
    }

    pub fn push(&mut self, decl: TypeDecl) {
        self.decls.push(decl);
    }

    /// Validates every declaration and freezes the result.
    pub fn build(self) -> Result<TypeRegistry, RegistryError> {
        if self.decls.len() > MAX_TYPES {
            return Err(RegistryError::TooManyTypes);
        }

        let mut fingerprints = HashMap::with_capacity(self.decls.len());
        for (index, decl) in self.decls.iter().enumerate() {
            if decl.class_name.is_empty() {
                return Err(RegistryError::EmptyClassName { index });
            }
            if decl.fingerprint.is_empty() {
                return Err(RegistryError::EmptyFingerprint {
                    class_name: decl.class_name.clone(),
                });
            }
            let id = TypeId::from_raw(index as u32);
            if fingerprints.insert(decl.fingerprint.clone(), id).is_some() {
                return Err(RegistryError::DuplicateFingerprint(decl.fingerprint.clone()));
            }
        }

        let mut parents = Vec::with_capacity(self.decls.len());
        for decl in &self.decls {
            let parent = match decl.parent.as_deref() {
                None => None,
                Some(parent) => Some(*fingerprints.get(parent).ok_or_else(|| {
                    RegistryError::UnknownParent {
                        fingerprint: decl.fingerprint.clone(),
                        parent: parent.to_string(),
                    }
                })?),
            };
            parents.push(parent);
        }

        let depths = chain_depths(&parents, &self.decls)?;
        let max_depth = depths.iter().copied().max().unwrap_or(0);

        let descriptors = self
            .decls
            .into_iter()
            .zip(parents)
            .map(|(decl, parent)| TypeDescriptor::new(decl.class_name, decl.fingerprint, parent))
            .collect::<Vec<_>>();

        let universal_top = self
            .universal_top
            .unwrap_or_else(|| DEFAULT_UNIVERSAL_TOP.to_string());

        debug!(
            types = descriptors.len(),
            max_depth,
            universal_top = %universal_top,
            "type registry built"
        );

        Ok(TypeRegistry {
            descriptors,
            fingerprints,
            universal_top,
            max_depth,
        })
    }
}

/// Number of ancestors of every declaration. Each chain is walked once; a
/// node met twice on the same walk is a cycle.
fn chain_depths(parents: &[Option<TypeId>], decls: &[TypeDecl]) -> Result<Vec<usize>, RegistryError> {
    let mut depths: Vec<Option<usize>> = vec![None; parents.len()];
    let mut visiting = vec![false; parents.len()];
    let mut path = Vec::new();

    for start in 0..parents.len() {
        if depths[start].is_some() {
            continue;
        }
        path.clear();
        let mut above = 0;
        let mut cursor = Some(start);
        while let Some(index) = cursor {
            if let Some(depth) = depths[index] {
                above = depth + 1;
                break;
            }
            if visiting[index] {
                return Err(RegistryError::Cycle(decls[index].fingerprint.clone()));
            }
            visiting[index] = true;
            path.push(index);
            cursor = parents[index].map(TypeId::index);
        }
        for (offset, &index) in path.iter().rev().enumerate() {
            depths[index] = Some(above + offset);
        }
    }

    Ok(depths.into_iter().map(|depth| depth.unwrap_or(0)).collect())
}

//==================================================
// Section 3.0 - Registry
//==================================================

/// Immutable set of descriptors. Shared freely between threads once built.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    descriptors: Vec<TypeDescriptor>,
    fingerprints: HashMap<String, TypeId>,
    universal_top: String,
    max_depth: usize,
}

impl TypeRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn universal_top(&self) -> &str {
        &self.universal_top
    }

    /// Longest parent chain in the registry; bounds every ancestor walk.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn contains(&self, id: TypeId) -> bool {
        id.index() < self.descriptors.len()
    }

    pub fn handle(&self, id: TypeId) -> Option<TypeHandle<'_>> {
        self.contains(id).then(|| TypeHandle::new(self, id))
    }

    pub fn by_fingerprint(&self, fingerprint: &str) -> Option<TypeHandle<'_>> {
        self.fingerprints
            .get(fingerprint)
            .map(|id| TypeHandle::new(self, *id))
    }

    /// First declared descriptor carrying `class_name`.
    pub fn by_class_name(&self, class_name: &str) -> Option<TypeHandle<'_>> {
        self.iter().find(|handle| handle.class_name() == class_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = TypeHandle<'_>> {
        (0..self.descriptors.len()).map(|index| TypeHandle::new(self, TypeId::from_raw(index as u32)))
    }

    pub(crate) fn slot(&self, id: TypeId) -> &TypeDescriptor {
        &self.descriptors[id.index()]
    }
}
