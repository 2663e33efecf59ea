//! Lenient reader for plugin descriptors.
//!
//! Descriptors are hand-written YAML, so the reader is forgiving: scalars of
//! any type are accepted where a string is expected, a single scalar is
//! accepted where a list is expected, and wrongly shaped fields are dropped
//! with a warning instead of rejecting the whole descriptor. Only a missing
//! `id` (record ignored) or an unknown `environment` (admission undecidable)
//! disqualify a descriptor.

use std::collections::BTreeMap;

use serde_yaml::{Mapping, Value};
use tracing::warn;

use crate::environment::Environment;
use crate::error::DescriptorError;
use crate::metadata::MetadataBuilder;

/// Descriptor keys, as spelled in `metadata.yml`.
pub mod keys {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const DESCRIPTION: &str = "description";
    pub const AUTHOR: &str = "author";
    pub const VERSION: &str = "version";
    pub const LICENSE: &str = "license";
    pub const CONTACTS: &str = "contacts";
    pub const ENVIRONMENT: &str = "environment";
    pub const ENTRY_POINTS: &str = "entrypoints";
    pub const PATCHES: &str = "patches";
    pub const DEPENDENCIES: &str = "dependencies";
    pub const IMAGE: &str = "image";
    pub const IMAGE_URL: &str = "imageUrl";
}

/// A parsed descriptor document.
#[derive(Debug, Clone, Default)]
pub struct Descriptor {
    fields: Mapping,
}

impl Descriptor {
    /// Parses descriptor bytes.
    ///
    /// An empty document is accepted and behaves like an empty mapping.
    pub fn parse(bytes: &[u8]) -> Result<Self, DescriptorError> {
        let value: Value = serde_yaml::from_slice(bytes)?;
        match value {
            Value::Mapping(fields) => Ok(Self { fields }),
            Value::Null => Ok(Self::default()),
            _ => Err(DescriptorError::NotAMapping),
        }
    }

    /// Returns the value of a string-like key.
    ///
    /// Blank strings are treated as absent.
    pub fn string(&self, key: &str) -> Option<String> {
        let value = self.fields.get(key)?;
        let text = scalar_to_string(value).or_else(|| {
            warn!(key, "Descriptor field is not a scalar, ignoring it");
            None
        })?;
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Returns the values of a list-like key, in declared order.
    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.fields.get(key) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Sequence(items)) => items
                .iter()
                .filter_map(|item| {
                    let text = scalar_to_string(item);
                    if text.is_none() {
                        warn!(key, "Descriptor list contains a non-scalar item, skipping it");
                    }
                    text
                })
                .filter(|text| !text.trim().is_empty())
                .collect(),
            Some(other) => match scalar_to_string(other) {
                Some(single) if !single.trim().is_empty() => vec![single],
                Some(_) => Vec::new(),
                None => {
                    warn!(key, "Descriptor field should be a list, ignoring it");
                    Vec::new()
                }
            },
        }
    }

    /// Returns the entries of a mapping-like key.
    ///
    /// A bare list of ids is also accepted and maps each id to `"*"`.
    pub fn string_map(&self, key: &str) -> BTreeMap<String, String> {
        match self.fields.get(key) {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(Value::Mapping(entries)) => entries
                .iter()
                .filter_map(|(k, v)| {
                    let k = scalar_to_string(k)?;
                    let v = match v {
                        Value::Null => "*".to_string(),
                        other => scalar_to_string(other)?,
                    };
                    Some((k, v))
                })
                .collect(),
            Some(Value::Sequence(_)) => self
                .string_list(key)
                .into_iter()
                .map(|id| (id, "*".to_string()))
                .collect(),
            Some(_) => {
                warn!(key, "Descriptor field should be a mapping, ignoring it");
                BTreeMap::new()
            }
        }
    }

    /// Converts the descriptor into a metadata builder.
    ///
    /// Returns `Ok(None)` when the mandatory `id` is missing: such a document
    /// does not describe a plugin.
    pub fn into_builder(self) -> Result<Option<MetadataBuilder>, DescriptorError> {
        let Some(id) = self.string(keys::ID) else {
            return Ok(None);
        };

        let environment = match self.string(keys::ENVIRONMENT) {
            Some(raw) => raw.parse::<Environment>()?,
            None => Environment::Both,
        };

        let mut builder = MetadataBuilder::new()
            .id(id)
            .environment(environment)
            .entry_points(self.string_list(keys::ENTRY_POINTS))
            .patches(self.string_list(keys::PATCHES))
            .dependencies(self.string_map(keys::DEPENDENCIES));

        builder.name = self.string(keys::NAME);
        builder.description = self.string(keys::DESCRIPTION);
        builder.author = self.string(keys::AUTHOR);
        builder.version = self.string(keys::VERSION);
        builder.license = self.string(keys::LICENSE);
        builder.contacts = self.string(keys::CONTACTS);
        builder.image = self.string(keys::IMAGE);
        builder.image_url = self.string(keys::IMAGE_URL);

        Ok(Some(builder))
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_descriptor() {
        let yaml = r#"
id: example.greeter
name: Greeter
description: Says hello
author: Someone
version: 1.2.0
license: MIT
contacts: https://example.invalid
environment: server
entrypoints:
  - example.greeter.Main
  - example.greeter.Commands
patches: [example.greeter.PatchA]
dependencies:
  host-core: ">=41"
  example.lib: "*"
imageUrl: https://example.invalid/icon.png
"#;
        let metadata = Descriptor::parse(yaml.as_bytes())
            .unwrap()
            .into_builder()
            .unwrap()
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(metadata.id(), "example.greeter");
        assert_eq!(metadata.name(), Some("Greeter"));
        assert_eq!(metadata.environment(), Environment::Server);
        assert_eq!(
            metadata.entry_points(),
            ["example.greeter.Main", "example.greeter.Commands"]
        );
        assert_eq!(metadata.patches(), ["example.greeter.PatchA"]);
        assert_eq!(metadata.dependencies().len(), 2);
        assert_eq!(
            metadata.dependencies().get("host-core").map(String::as_str),
            Some(">=41")
        );
        assert_eq!(
            metadata.image_url(),
            Some("https://example.invalid/icon.png")
        );
        assert!(!metadata.is_internal());
    }

    #[test]
    fn test_missing_id_is_not_a_plugin() {
        let descriptor = Descriptor::parse(b"name: Nameless\nversion: 1.0\n").unwrap();
        assert!(descriptor.into_builder().unwrap().is_none());

        let empty = Descriptor::parse(b"").unwrap();
        assert!(empty.into_builder().unwrap().is_none());

        let blank = Descriptor::parse(b"id: '   '\n").unwrap();
        assert!(blank.into_builder().unwrap().is_none());
    }

    #[test]
    fn test_scalars_are_stringified() {
        let descriptor = Descriptor::parse(b"id: 42\nversion: 1.5\nentrypoints: single.Main\n").unwrap();
        assert_eq!(descriptor.string(keys::ID).as_deref(), Some("42"));
        assert_eq!(descriptor.string(keys::VERSION).as_deref(), Some("1.5"));
        assert_eq!(descriptor.string_list(keys::ENTRY_POINTS), vec!["single.Main"]);
    }

    #[test]
    fn test_misshaped_fields_are_dropped() {
        let yaml = "id: odd\nname: [not, a, string]\npatches: {a: b}\ndependencies: 3\n";
        let metadata = Descriptor::parse(yaml.as_bytes())
            .unwrap()
            .into_builder()
            .unwrap()
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(metadata.id(), "odd");
        assert_eq!(metadata.name(), None);
        assert!(metadata.patches().is_empty());
        assert!(metadata.dependencies().is_empty());
    }

    #[test]
    fn test_dependency_list_form() {
        let descriptor = Descriptor::parse(b"id: x\ndependencies: [a, b]\n").unwrap();
        let deps = descriptor.string_map(keys::DEPENDENCIES);
        assert_eq!(deps.get("a").map(String::as_str), Some("*"));
        assert_eq!(deps.get("b").map(String::as_str), Some("*"));
    }

    #[test]
    fn test_environment_defaults_and_rejects() {
        let default = Descriptor::parse(b"id: x\n").unwrap().into_builder().unwrap().unwrap();
        assert_eq!(default.build().unwrap().environment(), Environment::Both);

        let invalid = Descriptor::parse(b"id: x\nenvironment: desktop\n").unwrap();
        assert!(matches!(
            invalid.into_builder(),
            Err(DescriptorError::Environment(_))
        ));
    }

    #[test]
    fn test_non_mapping_document() {
        assert!(matches!(
            Descriptor::parse(b"- just\n- a list\n"),
            Err(DescriptorError::NotAMapping)
        ));
    }
}
