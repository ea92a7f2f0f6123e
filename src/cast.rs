//==================================================
// File: cast.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Decide whether a runtime value may be viewed as another declared type
// Objective: Pure cast validation; callers decide what a failure costs
//==================================================

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::descriptor::{TypeId, Typed};
use crate::fault::{Fault, MissingMetadata};
use crate::registry::TypeRegistry;

/// How a downcast from a declared base type is judged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DowncastPolicy {
    /// Accept when the target type descends from the source object's class,
    /// comparing class names only. Matches the native runtime.
    #[default]
    Permissive,
    /// Accept only casts the object's own runtime type already satisfies.
    Strict,
}

/// The rule that admitted a cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastRule {
    NullSource,
    SameFingerprint,
    UniversalTop,
    Upcast,
    Downcast,
}

#[derive(Debug, Clone, Copy)]
pub struct CastValidator<'r> {
    registry: &'r TypeRegistry,
    policy: DowncastPolicy,
}

impl<'r> CastValidator<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            policy: DowncastPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: DowncastPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> DowncastPolicy {
        self.policy
    }

    /// Runs the ordered cast rules and reports which one matched.
    ///
    /// `source` is the runtime type of the object being cast (`None` for a
    /// null reference), `target` the requested type (`None` when the compiler
    /// emitted no metadata for it) and `target_fingerprint` the exact
    /// instantiation requested at the cast site.
    pub fn classify(
        &self,
        source: Option<TypeId>,
        target: Option<TypeId>,
        target_fingerprint: &str,
    ) -> Result<CastRule, Fault> {
        let Some(source) = source else {
            return Ok(CastRule::NullSource);
        };
        let Some(target) = target.and_then(|id| self.registry.handle(id)) else {
            return Err(Fault::BrokenExecutable(MissingMetadata::TargetType));
        };
        let source = self
            .registry
            .handle(source)
            .ok_or(Fault::BrokenExecutable(MissingMetadata::SourceType))?;

        if source.fingerprint() == target_fingerprint {
            return Ok(CastRule::SameFingerprint);
        }
        if target.class_name() == self.registry.universal_top() {
            return Ok(CastRule::UniversalTop);
        }
        if source
            .ancestors()
            .any(|ancestor| ancestor.class_name() == target.class_name())
        {
            return Ok(CastRule::Upcast);
        }
        if self.policy == DowncastPolicy::Permissive
            && target
                .ancestors()
                .any(|ancestor| ancestor.class_name() == source.class_name())
        {
            return Ok(CastRule::Downcast);
        }

        trace!(
            source = source.fingerprint(),
            target = target_fingerprint,
            "cast rejected"
        );
        Err(Fault::invalid_cast(source, target, target_fingerprint))
    }

    pub fn validate(
        &self,
        source: Option<TypeId>,
        target: Option<TypeId>,
        target_fingerprint: &str,
    ) -> Result<(), Fault> {
        self.classify(source, target, target_fingerprint).map(|_| ())
    }

    /// Same as [`validate`](Self::validate) but reads the source type from the object.
    pub fn validate_object<T: Typed + ?Sized>(
        &self,
        object: Option<&T>,
        target: Option<TypeId>,
        target_fingerprint: &str,
    ) -> Result<(), Fault> {
        self.validate(object.map(Typed::type_id), target, target_fingerprint)
    }
}

/// One-shot validation with the default (permissive) policy.
pub fn validate(
    registry: &TypeRegistry,
    source: Option<TypeId>,
    target: Option<TypeId>,
    target_fingerprint: &str,
) -> Result<(), Fault> {
    CastValidator::new(registry).validate(source, target, target_fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::CastSubject;

    fn registry() -> TypeRegistry {
        TypeRegistry::builder()
            .with_type("Any", "Any")
            .with_type("Animal", "Animal#1")
            .with_child("Dog", "Dog#1", "Animal#1")
            .with_child("Labrador", "Labrador#1", "Dog#1")
            .with_child("Cat", "Cat#1", "Animal#1")
            .with_type("List", "List<Int>")
            .with_type("List", "List<String>")
            .build()
            .expect("test registry")
    }

    fn id(registry: &TypeRegistry, fingerprint: &str) -> TypeId {
        registry.by_fingerprint(fingerprint).unwrap().id()
    }

    #[test]
    fn rules_apply_in_order() {
        let registry = registry();
        let validator = CastValidator::new(&registry);
        let dog = id(&registry, "Dog#1");
        let animal = id(&registry, "Animal#1");
        let labrador = id(&registry, "Labrador#1");
        let any = id(&registry, "Any");

        assert_eq!(validator.classify(None, None, "x"), Ok(CastRule::NullSource));
        assert_eq!(
            validator.classify(Some(dog), Some(dog), "Dog#1"),
            Ok(CastRule::SameFingerprint)
        );
        assert_eq!(validator.classify(Some(dog), Some(any), "Any"), Ok(CastRule::UniversalTop));
        assert_eq!(
            validator.classify(Some(labrador), Some(animal), "Animal#1"),
            Ok(CastRule::Upcast)
        );
        assert_eq!(
            validator.classify(Some(animal), Some(labrador), "Labrador#1"),
            Ok(CastRule::Downcast)
        );
    }

    #[test]
    fn null_source_beats_missing_target() {
        let registry = registry();
        assert_eq!(validate(&registry, None, None, ""), Ok(()));
    }

    #[test]
    fn missing_metadata_is_a_broken_executable() {
        let registry = registry();
        let dog = id(&registry, "Dog#1");
        assert_eq!(
            validate(&registry, Some(dog), None, "Dog#1"),
            Err(Fault::BrokenExecutable(MissingMetadata::TargetType))
        );
        assert_eq!(
            validate(&registry, Some(dog), Some(TypeId::from_raw(999)), "Dog#1"),
            Err(Fault::BrokenExecutable(MissingMetadata::TargetType))
        );
        assert_eq!(
            validate(&registry, Some(TypeId::from_raw(999)), Some(dog), "Dog#1"),
            Err(Fault::BrokenExecutable(MissingMetadata::SourceType))
        );
    }

    #[test]
    fn siblings_cite_class_names() {
        let registry = registry();
        let err = validate(
            &registry,
            Some(id(&registry, "Cat#1")),
            Some(id(&registry, "Dog#1")),
            "Dog#1",
        )
        .unwrap_err();
        assert_eq!(
            err,
            Fault::InvalidCast {
                from: "Cat".into(),
                to: "Dog".into(),
                subject: CastSubject::ClassNames,
            }
        );
    }

    #[test]
    fn instantiations_cite_fingerprints() {
        let registry = registry();
        let err = validate(
            &registry,
            Some(id(&registry, "List<Int>")),
            Some(id(&registry, "List<String>")),
            "List<String>",
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Object of type List<Int> could not be casted to type List<String>!"
        );
    }

    #[test]
    fn strict_policy_rejects_declared_downcasts() {
        let registry = registry();
        let validator = CastValidator::new(&registry).with_policy(DowncastPolicy::Strict);
        let err = validator
            .validate(
                Some(id(&registry, "Animal#1")),
                Some(id(&registry, "Labrador#1")),
                "Labrador#1",
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "Object of type Animal could not be casted to type Labrador!");
        assert_eq!(
            validator.classify(
                Some(id(&registry, "Labrador#1")),
                Some(id(&registry, "Dog#1")),
                "Dog#1"
            ),
            Ok(CastRule::Upcast)
        );
    }

    #[test]
    fn comparisons_are_case_sensitive() {
        let registry = TypeRegistry::builder()
            .with_type("dog", "dog#1")
            .with_type("Dog", "Dog#1")
            .build()
            .unwrap();
        let err = validate(
            &registry,
            Some(id(&registry, "dog#1")),
            Some(id(&registry, "Dog#1")),
            "Dog#1",
        );
        assert!(err.is_err());
    }
}
