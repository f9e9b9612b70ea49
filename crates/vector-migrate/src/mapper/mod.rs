//! Schema mapping between vector store metadata layouts.
//!
//! A [`SchemaMapping`] declares how metadata fields are renamed, converted
//! and defaulted when records move from one store to another. The mapping is
//! immutable once a migration begins; it is stored alongside the checkpoint
//! so a resumed run transforms records identically.

pub mod recommend;
pub mod transform;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::StoreKind;
use crate::error::{MigrateError, Result};

pub use recommend::{recommend, FieldRecommendation, SchemaRecommendation};
pub use transform::{map_batch, map_record};

/// Declarative transformation of metadata between two store schemas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaMapping {
    /// Source store kind.
    pub source_db: StoreKind,

    /// Target store kind.
    pub target_db: StoreKind,

    /// Source field name to target field name renames.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_mappings: BTreeMap<String, String>,

    /// Per-field value conversions, keyed by target field name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub type_conversions: BTreeMap<String, TypeConversion>,

    /// Values substituted for fields missing on the source record.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub default_values: BTreeMap<String, Value>,
}

impl SchemaMapping {
    /// Pass-through mapping between two stores: no renames, no conversions.
    pub fn identity(source_db: StoreKind, target_db: StoreKind) -> Self {
        Self {
            source_db,
            target_db,
            field_mappings: BTreeMap::new(),
            type_conversions: BTreeMap::new(),
            default_values: BTreeMap::new(),
        }
    }

    /// Check the mapping is usable for a migration.
    pub fn validate(&self) -> Result<()> {
        if self.source_db == self.target_db {
            return Err(MigrateError::validation(
                "source and target databases must be different",
            ));
        }
        Ok(())
    }

    /// Whether metadata must be flattened to dot-notation keys.
    ///
    /// Applies when either end of the mapping only stores flat metadata.
    pub fn requires_flattening(&self) -> bool {
        self.source_db.flat_metadata_only() || self.target_db.flat_metadata_only()
    }
}

/// Declared conversion for one metadata field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeConversion {
    /// Type label on the source side (informational).
    pub from_type: String,

    /// Type label on the target side (informational).
    pub to_type: String,

    /// Named converter applied to the field's value.
    pub converter: Converter,
}

/// Named value converters. Referenced by name so mappings stay serializable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Converter {
    /// Pass the value through unchanged.
    Identity,

    /// Convert whole-valued floats to integers, leave everything else as-is.
    /// Stores like Pinecone surface every number as a float; targets that
    /// distinguish integer payloads want them narrowed back.
    NumberAuto,

    /// Render any value as a string.
    Stringify,

    /// Parse a string into a number; fails when the string is not numeric.
    ParseNumber,
}

impl Converter {
    /// Apply the converter to a value.
    pub fn apply(&self, value: &Value) -> std::result::Result<Value, String> {
        match self {
            Converter::Identity => Ok(value.clone()),
            Converter::NumberAuto => Ok(auto_narrow_number(value)),
            Converter::Stringify => Ok(match value {
                Value::String(s) => Value::String(s.clone()),
                other => Value::String(other.to_string()),
            }),
            Converter::ParseNumber => match value {
                Value::Number(_) => Ok(value.clone()),
                Value::String(s) => {
                    if let Ok(i) = s.parse::<i64>() {
                        Ok(Value::from(i))
                    } else if let Ok(f) = s.parse::<f64>() {
                        serde_json::Number::from_f64(f)
                            .map(Value::Number)
                            .ok_or_else(|| format!("value {:?} is not a finite number", s))
                    } else {
                        Err(format!("value {:?} is not numeric", s))
                    }
                }
                other => Err(format!("cannot parse {} as a number", type_name(other))),
            },
        }
    }
}

/// Whole-valued floats become integers; everything else is untouched.
fn auto_narrow_number(value: &Value) -> Value {
    if let Some(f) = value.as_f64() {
        if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
            return Value::from(f as i64);
        }
    }
    value.clone()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identity_mapping_validates() {
        let mapping = SchemaMapping::identity(StoreKind::Pinecone, StoreKind::Qdrant);
        assert!(mapping.validate().is_ok());
    }

    #[test]
    fn test_same_store_rejected() {
        let mapping = SchemaMapping::identity(StoreKind::Qdrant, StoreKind::Qdrant);
        let err = mapping.validate().unwrap_err();
        assert!(err.to_string().contains("must be different"));
    }

    #[test]
    fn test_flattening_rule() {
        assert!(SchemaMapping::identity(StoreKind::Pinecone, StoreKind::Qdrant)
            .requires_flattening());
        assert!(SchemaMapping::identity(StoreKind::Qdrant, StoreKind::Pinecone)
            .requires_flattening());
        assert!(!SchemaMapping::identity(StoreKind::Qdrant, StoreKind::Weaviate)
            .requires_flattening());
    }

    #[test]
    fn test_number_auto_narrows_whole_floats() {
        assert_eq!(
            Converter::NumberAuto.apply(&json!(42.0)).unwrap(),
            json!(42)
        );
        assert_eq!(
            Converter::NumberAuto.apply(&json!(2.5)).unwrap(),
            json!(2.5)
        );
        assert_eq!(
            Converter::NumberAuto.apply(&json!("text")).unwrap(),
            json!("text")
        );
    }

    #[test]
    fn test_stringify() {
        assert_eq!(
            Converter::Stringify.apply(&json!(7)).unwrap(),
            json!("7")
        );
        assert_eq!(
            Converter::Stringify.apply(&json!("already")).unwrap(),
            json!("already")
        );
    }

    #[test]
    fn test_parse_number_failure() {
        assert!(Converter::ParseNumber.apply(&json!("12")).is_ok());
        assert!(Converter::ParseNumber.apply(&json!("not a number")).is_err());
        assert!(Converter::ParseNumber.apply(&json!({"nested": 1})).is_err());
    }

    #[test]
    fn test_mapping_json_roundtrip() {
        let mut mapping = SchemaMapping::identity(StoreKind::Pinecone, StoreKind::Qdrant);
        mapping
            .field_mappings
            .insert("title".into(), "heading".into());
        mapping.type_conversions.insert(
            "count".into(),
            TypeConversion {
                from_type: "float64".into(),
                to_type: "integer".into(),
                converter: Converter::NumberAuto,
            },
        );

        let blob = serde_json::to_string(&mapping).unwrap();
        let loaded: SchemaMapping = serde_json::from_str(&blob).unwrap();
        assert_eq!(loaded.field_mappings["title"], "heading");
        assert_eq!(
            loaded.type_conversions["count"].converter,
            Converter::NumberAuto
        );
    }
}
