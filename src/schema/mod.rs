//! The CloudFormation resource type catalogue.
//!
//! The catalogue follows the shape of AWS's published
//! `CloudFormationResourceSpecification.json`: resource types with their
//! attributes and properties, plus shared property types. A subset of the
//! specification is embedded into the binary and loaded at start-up.

use anyhow::{anyhow, bail, Result};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::value::ValueType;

#[derive(Debug, Clone, Deserialize)]
pub struct Schema {
    #[serde(rename = "ResourceTypes", default)]
    pub resource_types: IndexMap<String, ResourceType>,
    #[serde(rename = "PropertyTypes", default)]
    pub property_types: IndexMap<String, PropertyType>,
    #[serde(rename = "ResourceSpecificationVersion", default)]
    pub spec_version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceType {
    #[serde(rename = "Documentation", default)]
    pub documentation: String,
    #[serde(rename = "Attributes", default)]
    pub attributes: IndexMap<String, Attribute>,
    #[serde(rename = "Properties", default)]
    pub properties: IndexMap<String, Property>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PropertyType {
    #[serde(rename = "Documentation", default)]
    pub documentation: String,
    #[serde(rename = "Properties", default)]
    pub properties: IndexMap<String, Property>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Property {
    #[serde(rename = "Documentation", default)]
    pub documentation: String,
    #[serde(rename = "Required", default)]
    pub required: bool,
    #[serde(rename = "DuplicatesAllowed", default)]
    pub duplicates_allowed: bool,
    #[serde(rename = "UpdateType", default)]
    pub update_type: Option<UpdateType>,
    #[serde(flatten)]
    pub type_ref: TypeRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Attribute {
    #[serde(flatten)]
    pub type_ref: TypeRef,
}

/// A reference to the type of a property or attribute. Either a primitive,
/// or a `List`/`Map` of items, or the name of a [`PropertyType`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TypeRef {
    #[serde(rename = "Type", default)]
    pub type_name: Option<String>,
    #[serde(rename = "PrimitiveType", default)]
    pub primitive_type: Option<PrimitiveType>,
    #[serde(rename = "ItemType", default)]
    pub item_type: Option<String>,
    #[serde(rename = "PrimitiveItemType", default)]
    pub primitive_item_type: Option<PrimitiveType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PrimitiveType {
    String,
    Long,
    Integer,
    Double,
    Boolean,
    Timestamp,
    Json,
}

impl PrimitiveType {
    pub fn value_type(self) -> ValueType {
        match self {
            PrimitiveType::String | PrimitiveType::Timestamp => ValueType::String,
            PrimitiveType::Long | PrimitiveType::Integer | PrimitiveType::Double => {
                ValueType::Number
            }
            PrimitiveType::Boolean => ValueType::Bool,
            PrimitiveType::Json => ValueType::Any,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum UpdateType {
    Mutable,
    Immutable,
    Conditional,
}

impl Schema {
    /// Decodes a schema from specification JSON and verifies that every type
    /// reference resolves to a known property type.
    pub fn load(src: &str) -> Result<Schema> {
        let schema: Schema = serde_json::from_str(src)?;

        for (resource_name, resource) in &schema.resource_types {
            for attr in resource.attributes.values() {
                schema.verify_type_ref(&attr.type_ref, resource_name)?;
            }
            for prop in resource.properties.values() {
                schema.verify_type_ref(&prop.type_ref, resource_name)?;
            }
        }

        for (full_name, property_type) in &schema.property_types {
            // Property type keys are either resource-qualified
            // ("AWS::S3::Bucket.VersioningConfiguration") or bare names
            // shared across many resource types ("Tag").
            let resource_name = match full_name.split_once('.') {
                Some((resource_name, _)) => {
                    if !schema.resource_types.contains_key(resource_name) {
                        bail!(
                            "property type {} declared for non-existent resource type {:?}",
                            full_name,
                            resource_name
                        );
                    }
                    resource_name
                }
                None => "",
            };
            for prop in property_type.properties.values() {
                schema.verify_type_ref(&prop.type_ref, resource_name)?;
            }
        }

        Ok(schema)
    }

    /// The schema built into the binary.
    pub fn builtin() -> Schema {
        // The embedded source is validated by the build process, so a load
        // failure here is a bug rather than a user error.
        Schema::load(include_str!("builtin.json")).expect("embedded schema source is valid")
    }

    fn verify_type_ref(&self, type_ref: &TypeRef, resource_name: &str) -> Result<()> {
        if let Some(name) = &type_ref.type_name {
            if name != "List" && name != "Map" && self.find_property_type(resource_name, name).is_none() {
                return Err(anyhow!(
                    "reference to unknown property type {:?} for resource type {:?}",
                    name,
                    resource_name
                ));
            }
        }
        if let Some(name) = &type_ref.item_type {
            if self.find_property_type(resource_name, name).is_none() {
                return Err(anyhow!(
                    "reference to unknown property type {:?} for resource type {:?}",
                    name,
                    resource_name
                ));
            }
        }
        Ok(())
    }

    /// Looks up a property type, trying the resource-qualified name first
    /// and then the bare name, which covers shared types such as `Tag`.
    pub fn find_property_type(&self, resource_name: &str, name: &str) -> Option<&PropertyType> {
        let qualified = format!("{}.{}", resource_name, name);
        self.property_types
            .get(&qualified)
            .or_else(|| self.property_types.get(name))
    }

    /// The evaluation-model type of a property or attribute.
    pub fn value_type(&self, resource_name: &str, type_ref: &TypeRef) -> ValueType {
        self.value_type_guarded(resource_name, type_ref, &mut Vec::new())
    }

    fn value_type_guarded(
        &self,
        resource_name: &str,
        type_ref: &TypeRef,
        visiting: &mut Vec<String>,
    ) -> ValueType {
        if let Some(primitive) = type_ref.primitive_type {
            return primitive.value_type();
        }

        match type_ref.type_name.as_deref() {
            Some("List") => ValueType::list_of(self.item_value_type(resource_name, type_ref, visiting)),
            Some("Map") => {
                // The value model has no keyed-collection type with uniform
                // element typing, so maps type-check loosely.
                ValueType::Any
            }
            Some(name) => self.named_value_type(resource_name, name, visiting),
            None => ValueType::Any,
        }
    }

    fn item_value_type(
        &self,
        resource_name: &str,
        type_ref: &TypeRef,
        visiting: &mut Vec<String>,
    ) -> ValueType {
        if let Some(primitive) = type_ref.primitive_item_type {
            return primitive.value_type();
        }
        match &type_ref.item_type {
            Some(name) => self.named_value_type(resource_name, name, visiting),
            None => ValueType::Any,
        }
    }

    fn named_value_type(
        &self,
        resource_name: &str,
        name: &str,
        visiting: &mut Vec<String>,
    ) -> ValueType {
        let key = format!("{}.{}", resource_name, name);
        if visiting.contains(&key) {
            // Some property types are self-referential (for example nested
            // policy documents); give up on precision rather than recurse.
            return ValueType::Any;
        }
        let Some(property_type) = self.find_property_type(resource_name, name) else {
            return ValueType::Any;
        };

        visiting.push(key);
        let fields = property_type
            .properties
            .iter()
            .map(|(prop_name, prop)| {
                (
                    prop_name.clone(),
                    self.value_type_guarded(resource_name, &prop.type_ref, visiting),
                )
            })
            .collect();
        visiting.pop();
        ValueType::Object(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_schema_loads() {
        let schema = Schema::builtin();
        assert!(schema.resource_types.contains_key("AWS::S3::Bucket"));
        assert!(!schema.spec_version.is_empty());
    }

    #[test]
    fn attribute_types_map_to_value_types() {
        let schema = Schema::builtin();
        let bucket = &schema.resource_types["AWS::S3::Bucket"];
        let arn = &bucket.attributes["Arn"];
        assert_eq!(
            schema.value_type("AWS::S3::Bucket", &arn.type_ref),
            ValueType::String
        );
    }

    #[test]
    fn shared_property_types_resolve_by_bare_name() {
        let schema = Schema::builtin();
        assert!(schema.find_property_type("AWS::S3::Bucket", "Tag").is_some());
        // Qualified lookup wins over the bare fallback.
        assert!(schema
            .find_property_type("AWS::S3::Bucket", "VersioningConfiguration")
            .is_some());
    }

    #[test]
    fn list_properties_type_as_lists() {
        let schema = Schema::builtin();
        let bucket = &schema.resource_types["AWS::S3::Bucket"];
        let tags = &bucket.properties["Tags"];
        match schema.value_type("AWS::S3::Bucket", &tags.type_ref) {
            ValueType::List(element) => match *element {
                ValueType::Object(fields) => {
                    assert_eq!(fields.get("Key"), Some(&ValueType::String));
                }
                other => panic!("expected object element type, got {}", other),
            },
            other => panic!("expected list type, got {}", other),
        }
    }

    #[test]
    fn unknown_type_reference_fails_load() {
        let src = r#"{
            "ResourceTypes": {
                "AWS::Test::Thing": {
                    "Properties": {
                        "Config": {"Type": "Missing"}
                    }
                }
            },
            "PropertyTypes": {},
            "ResourceSpecificationVersion": "0.0.0"
        }"#;
        assert!(Schema::load(src).is_err());
    }
}
