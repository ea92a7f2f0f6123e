//==================================================
// File: registry/manifest.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: On-disk form of the compiler's type metadata
// Objective: Decode TOML, JSON or bincode manifests into a validated registry
//==================================================

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{RegistryError, TypeDecl, TypeRegistry};

/// Type metadata exactly as the compiler writes it next to an executable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryManifest {
    #[serde(default)]
    pub universal_top: Option<String>,
    #[serde(default)]
    pub types: Vec<TypeDecl>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManifestFormat {
    Toml,
    Json,
    Bincode,
}

impl ManifestFormat {
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => ManifestFormat::Toml,
            Some("json") => ManifestFormat::Json,
            _ => ManifestFormat::Bincode,
        }
    }
}

/// Decoder failure for one of the manifest encodings.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("invalid TOML manifest")]
    Toml(#[from] toml::de::Error),
    #[error("invalid JSON manifest")]
    Json(#[from] serde_json::Error),
    #[error("invalid bincode manifest")]
    Bincode(#[from] bincode::Error),
}

impl RegistryManifest {
    pub fn from_toml_str(source: &str) -> Result<Self, ManifestError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_json_str(source: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn from_bincode(bytes: &[u8]) -> Result<Self, ManifestError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Compact binary image, the form embedded into release executables.
    pub fn to_bincode(&self) -> Result<Vec<u8>, RegistryError> {
        bincode::serialize(self).map_err(RegistryError::Encode)
    }

    /// Reads a manifest, picking the decoder from the file extension
    /// (`.toml`, `.json`, anything else is treated as bincode).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let io_error = |source: std::io::Error| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        };

        let decoded = match ManifestFormat::from_path(path) {
            ManifestFormat::Toml => Self::from_toml_str(&fs::read_to_string(path).map_err(io_error)?),
            ManifestFormat::Json => Self::from_json_str(&fs::read_to_string(path).map_err(io_error)?),
            ManifestFormat::Bincode => Self::from_bincode(&fs::read(path).map_err(io_error)?),
        };
        decoded.map_err(|source| RegistryError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn into_registry(self) -> Result<TypeRegistry, RegistryError> {
        let mut builder = TypeRegistry::builder();
        if let Some(top) = self.universal_top {
            builder = builder.universal_top(top);
        }
        for decl in self.types {
            builder.push(decl);
        }
        builder.build()
    }
}

impl TypeRegistry {
    /// Loads and validates a manifest file in one step.
    pub fn load(path: impl AsRef<Path>) -> Result<TypeRegistry, RegistryError> {
        RegistryManifest::load(path)?.into_registry()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZOO_TOML: &str = r#"
universal_top = "Any"

[[types]]
class_name = "Animal"
fingerprint = "Animal#1"

[[types]]
class_name = "Dog"
fingerprint = "Dog#1"
parent = "Animal#1"
"#;

    #[test]
    fn toml_manifest_builds_registry() {
        let manifest = RegistryManifest::from_toml_str(ZOO_TOML).expect("parse toml");
        assert_eq!(manifest.types.len(), 2);
        let registry = manifest.into_registry().expect("registry");
        let dog = registry.by_fingerprint("Dog#1").unwrap();
        assert_eq!(dog.parent().unwrap().fingerprint(), "Animal#1");
    }

    #[test]
    fn json_manifest_defaults_optional_fields() {
        let manifest = RegistryManifest::from_json_str(
            r#"{ "types": [ { "class_name": "Any", "fingerprint": "Any" } ] }"#,
        )
        .expect("parse json");
        assert_eq!(manifest.universal_top, None);
        assert_eq!(manifest.types[0].parent, None);
    }

    #[test]
    fn bincode_image_matches_source() {
        let manifest = RegistryManifest::from_toml_str(ZOO_TOML).unwrap();
        let bytes = manifest.to_bincode().expect("encode bincode");
        let decoded = RegistryManifest::from_bincode(&bytes).expect("decode bincode");
        assert_eq!(decoded, manifest);
    }

    #[test]
    fn decoder_errors_keep_their_source() {
        let err = RegistryManifest::from_toml_str("[[types]]\nclass_name = 5\n").unwrap_err();
        assert!(matches!(err, ManifestError::Toml(_)));
        let err = RegistryManifest::from_json_str("{ \"types\": 3 }").unwrap_err();
        assert!(matches!(err, ManifestError::Json(_)));
        let err = RegistryManifest::from_bincode(&[0xff; 3]).unwrap_err();
        assert!(matches!(err, ManifestError::Bincode(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(ManifestFormat::from_path(Path::new("a.toml")), ManifestFormat::Toml);
        assert_eq!(ManifestFormat::from_path(Path::new("a.json")), ManifestFormat::Json);
        assert_eq!(ManifestFormat::from_path(Path::new("a.rtti")), ManifestFormat::Bincode);
    }
}
