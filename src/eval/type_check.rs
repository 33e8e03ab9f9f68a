//! Type checking of expressions against the declared or inferred types of
//! the constructs they reference.

use hcl::Expression;
use indexmap::IndexMap;

use crate::addr::{EachIndex, EachType};
use crate::diag::{Diagnostic, Diagnostics};
use crate::eval::context::ModuleContext;
use crate::eval::each::EachState;
use crate::eval::expr::{self, Scope};
use crate::schema::Schema;
use crate::value::{Value, ValueType};

/// The evaluation-model type of a CloudFormation parameter type string.
///
/// Parameters support a handful of special type names plus a large family of
/// AWS-specific types that are all strings of a particular syntax, so
/// anything unrecognized types as a string. Number-flavoured parameters
/// actually come back from CloudFormation as strings, but typing them as
/// numbers here avoids quirky results when they are used where the source
/// language expects a number; CloudFormation converts back as needed.
pub fn parameter_value_type(type_name: &str) -> ValueType {
    match type_name {
        "String" => ValueType::String,
        "Number" => ValueType::Number,
        "List<Number>" => ValueType::list_of(ValueType::Number),
        "CommaDelimitedList" => ValueType::list_of(ValueType::String),
        _ => ValueType::String,
    }
}

impl ModuleContext {
    /// Verifies the internal type consistency of the given expression and
    /// returns the expression's own result type.
    ///
    /// The methodology is to actually evaluate the expression, but in a
    /// scope where every dynamic construct is replaced by an unknown value
    /// of a suitable type. The type information propagates through the
    /// expression and the value is discarded at the end.
    ///
    /// Type checking follows the source language's own type rules; it does
    /// not enforce the extra restrictions that apply when lowering to
    /// CloudFormation expressions, which come from the limitations of that
    /// language and are reported by the lowerer instead.
    ///
    /// The result may be [`ValueType::Any`] when insufficient information is
    /// available, such as when errors exist elsewhere in the configuration.
    /// Errors inside *referenced* constructs are not repeated here; the
    /// caller is expected to check each construct independently.
    pub fn type_check(
        &self,
        expr: &Expression,
        each: &EachState,
        schema: &Schema,
    ) -> (ValueType, Diagnostics) {
        self.type_check_guarded(expr, each, schema, &mut Vec::new())
    }

    fn type_check_guarded(
        &self,
        expr: &Expression,
        each: &EachState,
        schema: &Schema,
        visiting: &mut Vec<String>,
    ) -> (ValueType, Diagnostics) {
        let mut diags = Diagnostics::new();

        let mut locals: IndexMap<String, Value> = IndexMap::new();
        let mut modules: IndexMap<String, Value> = IndexMap::new();
        let mut resources: IndexMap<String, Value> = IndexMap::new();
        let mut params: IndexMap<String, Value> = IndexMap::new();

        let mut traversals = Vec::new();
        expr::collect_traversals(expr, &mut traversals);

        for traversal in &traversals {
            let Some(root) = expr::traversal_root(traversal) else {
                continue;
            };
            match root {
                "Const" => {
                    // The whole constant table goes into the scope below.
                }
                "Each" => {
                    if !each.enabled() {
                        diags.push(Diagnostic::error(
                            "Illegal use of \"Each\" object",
                            "The \"Each\" object can be accessed only within modules and resources that have ForEach set.",
                        ));
                    }
                }
                "Local" => {
                    let Some(name) = expr::traversal_attr_name(traversal, 0) else {
                        diags.push(Diagnostic::error(
                            "Illegal use of Local object",
                            "The Local object requires an attribute to select a specific named local value.",
                        ));
                        continue;
                    };
                    let Some(local) = self.config.locals.get(name) else {
                        // Leaving the name unbound produces the usual
                        // unsupported-attribute message during evaluation.
                        continue;
                    };
                    if visiting.iter().any(|n| n == name) {
                        locals.insert(name.to_string(), Value::unknown());
                        continue;
                    }
                    visiting.push(name.to_string());
                    // Diagnostics inside the local's own expression are
                    // discarded; the caller checks each local separately.
                    let (local_ty, _) =
                        self.type_check_guarded(&local.expr, &EachState::none(), schema, visiting);
                    visiting.pop();
                    locals.insert(name.to_string(), Value::Unknown(local_ty));
                }
                "Module" => {
                    let Some(name) = expr::traversal_attr_name(traversal, 0) else {
                        diags.push(Diagnostic::error(
                            "Illegal use of Module object",
                            "The Module object requires an attribute to specify which module to access.",
                        ));
                        continue;
                    };
                    let Some(eacher) = self.children.get(name) else {
                        continue;
                    };
                    let placeholder = match eacher.each_type {
                        EachType::None => match eacher.single() {
                            Some(instance) => module_object_placeholder(instance, schema),
                            None => Value::unknown(),
                        },
                        EachType::Int => Value::List(
                            eacher
                                .instances
                                .values()
                                .map(|instance| module_object_placeholder(instance, schema))
                                .collect(),
                        ),
                        EachType::String => Value::Object(
                            eacher
                                .instances
                                .iter()
                                .filter_map(|(key, instance)| match key {
                                    EachIndex::String(key) => Some((
                                        key.clone(),
                                        module_object_placeholder(instance, schema),
                                    )),
                                    _ => None,
                                })
                                .collect(),
                        ),
                    };
                    modules.insert(name.to_string(), placeholder);
                }
                "Resource" => {
                    let Some(name) = expr::traversal_attr_name(traversal, 0) else {
                        diags.push(Diagnostic::error(
                            "Illegal use of Resource object",
                            "The Resource object requires an attribute to specify which resource to access.",
                        ));
                        continue;
                    };
                    let Some(resource) = self.config.resources.get(name) else {
                        continue;
                    };
                    // A reference to a type that is missing from the schema
                    // is reported by a separate check; for typing purposes
                    // such a resource is simply opaque.
                    let placeholder = match resource.type_name.as_deref() {
                        Some(type_name) => match schema.resource_types.get(type_name) {
                            Some(resource_type) => Value::Object(
                                resource_type
                                    .attributes
                                    .iter()
                                    .map(|(attr_name, attr)| {
                                        (
                                            attr_name.clone(),
                                            Value::Unknown(
                                                schema.value_type(type_name, &attr.type_ref),
                                            ),
                                        )
                                    })
                                    .collect(),
                            ),
                            None => Value::unknown(),
                        },
                        None => Value::unknown(),
                    };
                    resources.insert(name.to_string(), placeholder);
                }
                "Param" => {
                    let Some(name) = expr::traversal_attr_name(traversal, 0) else {
                        diags.push(Diagnostic::error(
                            "Illegal use of Param object",
                            "The Param object requires an attribute to specify which parameter to access.",
                        ));
                        continue;
                    };
                    let Some(param) = self.config.parameters.get(name) else {
                        continue;
                    };
                    let ty = parameter_value_type(param.type_name.as_deref().unwrap_or("String"));
                    params.insert(name.to_string(), Value::Unknown(ty));
                }
                _ => {
                    // No special action for unrecognized root names; by
                    // omitting them from the scope the evaluation below
                    // produces good errors for them.
                }
            }
        }

        let mut scope = Scope::new();
        scope.declare("Const", Value::Object(self.constants.clone()));
        scope.declare("Each", each_placeholder(each));
        scope.declare("Local", Value::Object(locals));
        scope.declare("Module", Value::Object(modules));
        scope.declare("Resource", Value::Object(resources));
        scope.declare("Param", Value::Object(params));

        let (val, eval_diags) = expr::eval_expr(expr, &scope);
        diags.append(eval_diags);

        (val.ty(), diags)
    }
}

fn each_placeholder(each: &EachState) -> Value {
    if each.enabled() {
        let mut fields = IndexMap::new();
        fields.insert("Key".to_string(), each.key.value());
        fields.insert("Value".to_string(), each.value.clone());
        Value::Object(fields)
    } else {
        // Outside ForEach the Each object is unknown with dynamic fields, so
        // type propagation through erroneous expressions does not cascade.
        let mut fields = IndexMap::new();
        fields.insert("Key".to_string(), ValueType::Any);
        fields.insert("Value".to_string(), ValueType::Any);
        Value::Unknown(ValueType::Object(fields))
    }
}

fn module_object_placeholder(instance: &ModuleContext, schema: &Schema) -> Value {
    let fields = instance
        .config
        .outputs
        .iter()
        .map(|(name, output)| {
            // Diagnostics are ignored here because each output is expected
            // to be checked separately, so any errors are already reported.
            let ty = match &output.value {
                Some(value_expr) => {
                    instance
                        .type_check(value_expr, &instance.each, schema)
                        .0
                }
                None => ValueType::Any,
            };
            (name.clone(), Value::Unknown(ty))
        })
        .collect();
    Value::Object(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::ModulePath;
    use crate::config;

    fn parse_expr(src: &str) -> Expression {
        let body: hcl::Body = hcl::from_str(&format!("x = {}", src)).unwrap();
        body.attributes().next().unwrap().expr().clone()
    }

    fn test_context(config_src: &str) -> ModuleContext {
        let (file, diags) = config::parse_file_source(config_src, "test.awsup");
        assert!(!diags.has_errors(), "bad test config: {:?}", diags);
        let (module, diags) = config::new_module(None, vec![file]);
        assert!(!diags.has_errors(), "bad test config: {:?}", diags);
        ModuleContext {
            path: ModulePath::root(),
            each: EachState::none(),
            config: module,
            constants: IndexMap::new(),
            children: IndexMap::new(),
        }
    }

    #[test]
    fn parameter_types_map_to_value_types() {
        assert_eq!(parameter_value_type("String"), ValueType::String);
        assert_eq!(parameter_value_type("Number"), ValueType::Number);
        assert_eq!(
            parameter_value_type("List<Number>"),
            ValueType::list_of(ValueType::Number)
        );
        assert_eq!(
            parameter_value_type("CommaDelimitedList"),
            ValueType::list_of(ValueType::String)
        );
        assert_eq!(
            parameter_value_type("AWS::EC2::KeyPair::KeyName"),
            ValueType::String
        );
    }

    #[test]
    fn resource_attribute_types_come_from_schema() {
        let schema = Schema::builtin();
        let ctx = test_context(r#"Resource "Bucket" { Type = "AWS::S3::Bucket" }"#);
        let (ty, diags) = ctx.type_check(
            &parse_expr("Resource.Bucket.Arn"),
            &EachState::none(),
            &schema,
        );
        assert!(!diags.has_errors(), "{:?}", diags);
        assert_eq!(ty, ValueType::String);
    }

    #[test]
    fn unknown_resource_attribute_is_an_error() {
        let schema = Schema::builtin();
        let ctx = test_context(r#"Resource "Bucket" { Type = "AWS::S3::Bucket" }"#);
        let (_, diags) = ctx.type_check(
            &parse_expr("Resource.Bucket.NoSuchAttr"),
            &EachState::none(),
            &schema,
        );
        assert!(diags.has_errors());
    }

    #[test]
    fn param_types_flow_through_expressions() {
        let schema = Schema::builtin();
        let ctx = test_context(r#"Parameter "Size" { Type = "Number" }"#);
        let (ty, diags) = ctx.type_check(
            &parse_expr("Param.Size + 1"),
            &EachState::none(),
            &schema,
        );
        assert!(!diags.has_errors());
        assert_eq!(ty, ValueType::Number);
    }

    #[test]
    fn local_types_are_inferred() {
        let schema = Schema::builtin();
        let ctx = test_context(
            r#"
Parameter "Size" { Type = "Number" }
Locals {
  Doubled = Param.Size * 2
}
"#,
        );
        let (ty, diags) = ctx.type_check(
            &parse_expr("\"${Local.Doubled}\""),
            &EachState::none(),
            &schema,
        );
        assert!(!diags.has_errors(), "{:?}", diags);
        assert_eq!(ty, ValueType::String);
    }

    #[test]
    fn each_outside_for_each_is_an_error_but_does_not_cascade() {
        let schema = Schema::builtin();
        let ctx = test_context("");
        let (ty, diags) = ctx.type_check(
            &parse_expr("Each.Value.whatever"),
            &EachState::none(),
            &schema,
        );
        assert!(diags.has_errors());
        // Exactly one error: the attribute access on the unknown placeholder
        // stays quiet.
        assert_eq!(diags.iter().count(), 1);
        assert_eq!(ty, ValueType::Any);
    }
}
