//! Serialization of a [`FlatTemplate`] into CloudFormation template JSON.
//!
//! This is a pure translation: by the time a template reaches this module
//! every expression has been checked, so a failure here is a bug rather than
//! a user error, and the functions below do not report diagnostics.

use serde_json::{json, Map, Value as Json};

use crate::eval::{
    DynExpr, FlatOutput, FlatParameter, FlatResource, FlatTemplate, LogicalOp,
};
use crate::value::Value;

/// Renders the template as pretty-printed CloudFormation JSON.
pub fn marshal(template: &FlatTemplate) -> String {
    serde_json::to_string_pretty(&prepare_structure(template))
        .expect("prepared template structure is JSON-representable")
}

/// Builds the JSON object structure of the template. Empty top-level
/// sections are omitted entirely.
pub fn prepare_structure(template: &FlatTemplate) -> Json {
    let mut ret = Map::new();

    if let Some(description) = &template.description {
        ret.insert("Description".to_string(), json!(description));
    }

    if !template.metadata.is_empty() {
        let metadata: Map<String, Json> = template
            .metadata
            .iter()
            .map(|(name, val)| (name.clone(), val.to_json()))
            .collect();
        ret.insert("Metadata".to_string(), Json::Object(metadata));
    }

    if !template.parameters.is_empty() {
        let parameters: Map<String, Json> = template
            .parameters
            .iter()
            .map(|(name, param)| (name.clone(), prepare_parameter(param)))
            .collect();
        ret.insert("Parameters".to_string(), Json::Object(parameters));
    }

    if !template.mappings.is_empty() {
        let mappings: Map<String, Json> = template
            .mappings
            .iter()
            .map(|(name, mapping)| {
                let inner: Map<String, Json> = mapping
                    .iter()
                    .map(|(key, val)| (key.clone(), val.to_json()))
                    .collect();
                (name.clone(), Json::Object(inner))
            })
            .collect();
        ret.insert("Mappings".to_string(), Json::Object(mappings));
    }

    if !template.conditions.is_empty() {
        let conditions: Map<String, Json> = template
            .conditions
            .iter()
            .map(|(name, expr)| (name.clone(), prepare_dyn_expr(expr)))
            .collect();
        ret.insert("Conditions".to_string(), Json::Object(conditions));
    }

    if !template.resources.is_empty() {
        let resources: Map<String, Json> = template
            .resources
            .iter()
            .map(|(name, resource)| (name.clone(), prepare_resource(resource)))
            .collect();
        ret.insert("Resources".to_string(), Json::Object(resources));
    }

    if !template.outputs.is_empty() {
        let outputs: Map<String, Json> = template
            .outputs
            .iter()
            .map(|(name, output)| (name.clone(), prepare_output(output)))
            .collect();
        ret.insert("Outputs".to_string(), Json::Object(outputs));
    }

    Json::Object(ret)
}

fn set_unless_null(map: &mut Map<String, Json>, key: &str, val: &Value) {
    if !val.is_null() {
        map.insert(key.to_string(), val.to_json());
    }
}

fn prepare_parameter(param: &FlatParameter) -> Json {
    let mut raw = Map::new();

    if !param.type_name.is_empty() {
        raw.insert("Type".to_string(), json!(param.type_name));
    }
    set_unless_null(&mut raw, "Description", &param.description);
    set_unless_null(&mut raw, "Default", &param.default);
    set_unless_null(&mut raw, "AllowedPattern", &param.allowed_pattern);

    if !param.allowed_values.is_empty() {
        raw.insert(
            "AllowedValues".to_string(),
            Json::Array(param.allowed_values.iter().map(Value::to_json).collect()),
        );
    }

    set_unless_null(&mut raw, "ConstraintDescription", &param.constraint_description);
    set_unless_null(&mut raw, "MinLength", &param.min_length);
    set_unless_null(&mut raw, "MaxLength", &param.max_length);
    set_unless_null(&mut raw, "MinValue", &param.min_value);
    set_unless_null(&mut raw, "MaxValue", &param.max_value);
    set_unless_null(&mut raw, "NoEcho", &param.no_echo);

    Json::Object(raw)
}

fn prepare_resource(resource: &FlatResource) -> Json {
    let mut raw = Map::new();

    raw.insert("Type".to_string(), json!(resource.type_name));

    if !resource.properties.is_empty() {
        let properties: Map<String, Json> = resource
            .properties
            .iter()
            .map(|(name, expr)| (name.clone(), prepare_dyn_expr(expr)))
            .collect();
        raw.insert("Properties".to_string(), Json::Object(properties));
    }

    if !resource.metadata.is_empty() {
        let metadata: Map<String, Json> = resource
            .metadata
            .iter()
            .map(|(name, val)| (name.clone(), val.to_json()))
            .collect();
        raw.insert("Metadata".to_string(), Json::Object(metadata));
    }

    if !resource.depends_on.is_empty() {
        raw.insert(
            "DependsOn".to_string(),
            Json::Array(resource.depends_on.iter().map(|id| json!(id)).collect()),
        );
    }

    set_unless_null(&mut raw, "DeletionPolicy", &resource.deletion_policy);

    if let Some(policy) = &resource.creation_policy {
        let mut creation = Map::new();
        if !policy.auto_scaling_min_successful_percent.is_null() {
            creation.insert(
                "AutoScalingCreationPolicy".to_string(),
                json!({
                    "MinSuccessfulInstancesPercent":
                        policy.auto_scaling_min_successful_percent.to_json()
                }),
            );
        }
        let mut signal = Map::new();
        set_unless_null(&mut signal, "Count", &policy.signal_count);
        set_unless_null(&mut signal, "Timeout", &policy.signal_timeout);
        if !signal.is_empty() {
            creation.insert("ResourceSignal".to_string(), Json::Object(signal));
        }
        if !creation.is_empty() {
            raw.insert("CreationPolicy".to_string(), Json::Object(creation));
        }
    }

    if let Some(policy) = &resource.update_policy {
        let mut update = Map::new();
        if !policy.auto_scaling_replace.is_null() {
            update.insert(
                "AutoScalingReplacingUpdate".to_string(),
                json!({"WillReplace": policy.auto_scaling_replace.to_json()}),
            );
        }
        if !update.is_empty() {
            raw.insert("UpdatePolicy".to_string(), Json::Object(update));
        }
    }

    Json::Object(raw)
}

fn prepare_output(output: &FlatOutput) -> Json {
    let mut raw = Map::new();

    set_unless_null(&mut raw, "Description", &output.description);
    raw.insert("Value".to_string(), prepare_dyn_expr(&output.value));
    if let Some(export_name) = &output.export_name {
        raw.insert(
            "Export".to_string(),
            json!({"Name": prepare_dyn_expr(export_name)}),
        );
    }

    Json::Object(raw)
}

fn prepare_dyn_expr(expr: &DynExpr) -> Json {
    match expr {
        DynExpr::Literal(val) => val.to_json(),

        DynExpr::Ref { logical_id } => json!({"Ref": logical_id}),

        DynExpr::GetAttr { logical_id, attrs } => {
            let mut args = vec![json!(logical_id)];
            args.extend(attrs.iter().map(prepare_dyn_expr));
            json!({"Fn::GetAtt": args})
        }

        DynExpr::Join { delimiter, exprs } => {
            let parts: Vec<Json> = exprs.iter().map(prepare_dyn_expr).collect();
            json!({"Fn::Join": [delimiter, parts]})
        }

        DynExpr::Split { delimiter, string } => {
            json!({"Fn::Split": [delimiter, prepare_dyn_expr(string)]})
        }

        DynExpr::Index { list, index } => {
            json!({"Fn::Select": [prepare_dyn_expr(index), prepare_dyn_expr(list)]})
        }

        DynExpr::If {
            condition_name,
            then_expr,
            else_expr,
        } => {
            json!({"Fn::If": [condition_name, prepare_dyn_expr(then_expr), prepare_dyn_expr(else_expr)]})
        }

        DynExpr::Equals { a, b } => {
            json!({"Fn::Equals": [prepare_dyn_expr(a), prepare_dyn_expr(b)]})
        }

        DynExpr::Not(inner) => json!({"Fn::Not": [prepare_dyn_expr(inner)]}),

        DynExpr::Logical { op, values } => {
            let name = match op {
                LogicalOp::And => "Fn::And",
                LogicalOp::Or => "Fn::Or",
            };
            let values: Vec<Json> = values.iter().map(prepare_dyn_expr).collect();
            let mut obj = Map::new();
            obj.insert(name.to_string(), Json::Array(values));
            Json::Object(obj)
        }

        DynExpr::MappingLookup {
            mapping_name,
            first_key,
            second_key,
        } => {
            json!({"Fn::FindInMap": [mapping_name, prepare_dyn_expr(first_key), prepare_dyn_expr(second_key)]})
        }

        DynExpr::Base64(inner) => json!({"Fn::Base64": prepare_dyn_expr(inner)}),

        DynExpr::AccountAZs { region } => json!({"Fn::GetAZs": prepare_dyn_expr(region)}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> DynExpr {
        DynExpr::literal(s)
    }

    #[test]
    fn empty_template_emits_empty_object() {
        let template = FlatTemplate::default();
        assert_eq!(prepare_structure(&template), json!({}));
    }

    #[test]
    fn description_only() {
        let template = FlatTemplate {
            description: Some("hello".to_string()),
            ..FlatTemplate::default()
        };
        assert_eq!(prepare_structure(&template), json!({"Description": "hello"}));
    }

    #[test]
    fn ref_and_get_att() {
        assert_eq!(
            prepare_dyn_expr(&DynExpr::Ref {
                logical_id: "Bucket".to_string()
            }),
            json!({"Ref": "Bucket"})
        );
        assert_eq!(
            prepare_dyn_expr(&DynExpr::GetAttr {
                logical_id: "Bucket".to_string(),
                attrs: vec![lit("Arn")],
            }),
            json!({"Fn::GetAtt": ["Bucket", "Arn"]})
        );
    }

    #[test]
    fn join_split_select() {
        let join = DynExpr::Join {
            delimiter: String::new(),
            exprs: vec![
                lit("arn:"),
                DynExpr::Ref {
                    logical_id: "Bucket".to_string(),
                },
            ],
        };
        assert_eq!(
            prepare_dyn_expr(&join),
            json!({"Fn::Join": ["", ["arn:", {"Ref": "Bucket"}]]})
        );

        let split = DynExpr::Split {
            delimiter: ",".to_string(),
            string: Box::new(lit("a,b")),
        };
        assert_eq!(prepare_dyn_expr(&split), json!({"Fn::Split": [",", "a,b"]}));

        let select = DynExpr::Index {
            list: Box::new(DynExpr::Ref {
                logical_id: "Zones".to_string(),
            }),
            index: Box::new(DynExpr::literal(0i64)),
        };
        assert_eq!(
            prepare_dyn_expr(&select),
            json!({"Fn::Select": [0, {"Ref": "Zones"}]})
        );
    }

    #[test]
    fn boolean_operators() {
        let equals = DynExpr::Equals {
            a: Box::new(lit("a")),
            b: Box::new(lit("b")),
        };
        assert_eq!(
            prepare_dyn_expr(&equals),
            json!({"Fn::Equals": ["a", "b"]})
        );
        assert_eq!(
            prepare_dyn_expr(&DynExpr::Not(Box::new(equals.clone()))),
            json!({"Fn::Not": [{"Fn::Equals": ["a", "b"]}]})
        );
        assert_eq!(
            prepare_dyn_expr(&DynExpr::Logical {
                op: LogicalOp::Or,
                values: vec![equals.clone(), equals],
            }),
            json!({"Fn::Or": [{"Fn::Equals": ["a", "b"]}, {"Fn::Equals": ["a", "b"]}]})
        );
    }

    #[test]
    fn conditional_and_lookup_functions() {
        let cond = DynExpr::If {
            condition_name: "IsProd".to_string(),
            then_expr: Box::new(lit("m5.large")),
            else_expr: Box::new(lit("t3.micro")),
        };
        assert_eq!(
            prepare_dyn_expr(&cond),
            json!({"Fn::If": ["IsProd", "m5.large", "t3.micro"]})
        );

        let lookup = DynExpr::MappingLookup {
            mapping_name: "RegionMap".to_string(),
            first_key: Box::new(DynExpr::Ref {
                logical_id: "AWS::Region".to_string(),
            }),
            second_key: Box::new(lit("Ami")),
        };
        assert_eq!(
            prepare_dyn_expr(&lookup),
            json!({"Fn::FindInMap": ["RegionMap", {"Ref": "AWS::Region"}, "Ami"]})
        );

        assert_eq!(
            prepare_dyn_expr(&DynExpr::Base64(Box::new(lit("hi")))),
            json!({"Fn::Base64": "hi"})
        );
        assert_eq!(
            prepare_dyn_expr(&DynExpr::AccountAZs {
                region: Box::new(lit("us-east-1"))
            }),
            json!({"Fn::GetAZs": "us-east-1"})
        );
    }
}
