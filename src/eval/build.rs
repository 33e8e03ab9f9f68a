//! The flattening pass: reduces the whole module tree to a single
//! [`FlatTemplate`].
//!
//! Parameters and outputs come from the root module only. Conditions,
//! mappings, and resources come from every module in the tree; constructs of
//! non-root modules are emitted under hashed logical IDs derived from their
//! qualified names so they stay unique in the flattened output.

use hcl::Expression;
use indexmap::IndexMap;

use crate::addr::{valid_name, EachIndex, NameInModule};
use crate::config;
use crate::diag::{Diagnostic, Diagnostics, Subject};
use crate::eval::context::{ModuleContext, RootContext};
use crate::eval::context_load::{classify_for_each, ForEachExpansion};
use crate::eval::dynamic::resource_logical_id;
use crate::eval::each::EachState;
use crate::eval::flat::{
    FlatCreationPolicy, FlatOutput, FlatParameter, FlatResource, FlatTemplate, FlatUpdatePolicy,
};
use crate::eval::op_tree::DynExpr;
use crate::eval::type_check::parameter_value_type;
use crate::schema::Schema;
use crate::value::{Value, ValueType};

impl RootContext {
    /// Flattens the module tree into a single template. The template is
    /// returned even when diagnostics contain errors, for the benefit of
    /// analysis tooling; it must not be emitted in that case.
    pub fn build(&self, schema: &Schema) -> (FlatTemplate, Diagnostics) {
        let mut template = FlatTemplate::default();
        let mut diags = Diagnostics::new();
        let root = &self.root;
        let none = EachState::none();

        if let Some(description) = &root.config.description {
            let val = eval_constant_into(root, Some(&description.expr), &ValueType::String, &none, &mut diags);
            if let Value::String(s) = val {
                template.description = Some(s);
            }
        }

        for (name, attr) in &root.config.metadata {
            let val = eval_constant_into(root, Some(&attr.expr), &ValueType::Any, &none, &mut diags);
            template.metadata.insert(name.clone(), val);
        }

        for (name, param) in &root.config.parameters {
            let flat = build_parameter(root, name, param, &mut diags);
            template.parameters.insert(name.clone(), flat);
        }

        for (name, output) in &root.config.outputs {
            let flat = build_output(root, name, output, &mut diags);
            template.outputs.insert(name.clone(), flat);
        }

        self.visit_modules(&mut |mctx| {
            if !mctx.is_root() {
                for param in mctx.config.parameters.values() {
                    diags.push(
                        Diagnostic::error(
                            "Parameter not allowed in child module",
                            "Parameters are supported in the root module only; use a constant to pass values into a child module.",
                        )
                        .with_subject(Subject::in_file(
                            &param.file,
                            format!("Parameter {:?}", param.name),
                        )),
                    );
                }
            }

            build_conditions(mctx, &mut template, &mut diags);
            build_mappings(mctx, &mut template, &mut diags);
            build_resources(mctx, schema, &mut template, &mut diags);
            true
        });

        (template, diags)
    }
}

/// The name under which a module-level construct is emitted: bare in the
/// root module, the hashed qualified name everywhere else.
fn emitted_name(mctx: &ModuleContext, name: &str) -> String {
    if mctx.is_root() {
        return name.to_string();
    }
    NameInModule {
        module: mctx.path.clone(),
        name: name.to_string(),
        key: EachIndex::None,
    }
    .id()
}

fn eval_constant_into(
    mctx: &ModuleContext,
    expr: Option<&Expression>,
    ty: &ValueType,
    each: &EachState,
    diags: &mut Diagnostics,
) -> Value {
    let (val, val_diags) = mctx.eval_constant_opt(expr, ty, each);
    diags.append(val_diags);
    val
}

fn eval_dynamic_into(
    mctx: &ModuleContext,
    expr: &Expression,
    each: &EachState,
    diags: &mut Diagnostics,
) -> DynExpr {
    let (lowered, lower_diags) = mctx.eval_dynamic(expr, each);
    diags.append(lower_diags);
    lowered
}

fn build_parameter(
    root: &ModuleContext,
    name: &str,
    param: &config::Parameter,
    diags: &mut Diagnostics,
) -> FlatParameter {
    let none = EachState::none();

    if !valid_name(name) {
        diags.push(
            Diagnostic::error(
                "Invalid parameter name",
                "Parameter names may contain only alphanumeric characters.",
            )
            .with_subject(Subject::in_file(&param.file, format!("Parameter {:?}", name))),
        );
    }

    let type_name = param.type_name.clone().unwrap_or_else(|| "String".to_string());
    let val_type = parameter_value_type(&type_name);

    let description =
        eval_constant_into(root, param.description.as_ref(), &ValueType::String, &none, diags);
    let default = eval_constant_into(root, param.default.as_ref(), &val_type, &none, diags);

    let mut allowed_pattern = eval_constant_into(
        root,
        param.allowed_pattern.as_ref(),
        &ValueType::String,
        &none,
        diags,
    );
    if val_type != ValueType::String && !allowed_pattern.is_null() {
        diags.push(
            Diagnostic::error(
                "Pattern constraint not permitted",
                "AllowedPattern may be set only for parameters of string type.",
            )
            .with_subject(Subject::in_file(&param.file, format!("Parameter {:?}", name))),
        );
        // The disallowed constraint must not reach the emitted template.
        allowed_pattern = Value::Null(ValueType::String);
    }

    let raw_allowed = eval_constant_into(
        root,
        param.allowed_values.as_ref(),
        &ValueType::list_of(val_type.clone()),
        &none,
        diags,
    );
    let allowed_values = match raw_allowed {
        Value::List(elems) => elems,
        _ => Vec::new(),
    };

    let mut min_length =
        eval_constant_into(root, param.min_length.as_ref(), &ValueType::Number, &none, diags);
    let mut max_length =
        eval_constant_into(root, param.max_length.as_ref(), &ValueType::Number, &none, diags);
    if val_type != ValueType::String {
        for (constraint, val) in [("MinLength", &mut min_length), ("MaxLength", &mut max_length)] {
            if !val.is_null() {
                diags.push(
                    Diagnostic::error(
                        "Length constraint not permitted",
                        format!("{} may be set only for parameters of string type.", constraint),
                    )
                    .with_subject(Subject::in_file(&param.file, format!("Parameter {:?}", name))),
                );
                *val = Value::Null(ValueType::Number);
            }
        }
    }

    let mut min_value =
        eval_constant_into(root, param.min_value.as_ref(), &ValueType::Number, &none, diags);
    let mut max_value =
        eval_constant_into(root, param.max_value.as_ref(), &ValueType::Number, &none, diags);
    if val_type != ValueType::Number {
        for (constraint, val) in [("MinValue", &mut min_value), ("MaxValue", &mut max_value)] {
            if !val.is_null() {
                diags.push(
                    Diagnostic::error(
                        "Value constraint not permitted",
                        format!("{} may be set only for parameters of number type.", constraint),
                    )
                    .with_subject(Subject::in_file(&param.file, format!("Parameter {:?}", name))),
                );
                *val = Value::Null(ValueType::Number);
            }
        }
    }

    let constraint_description = eval_constant_into(
        root,
        param.constraint_description.as_ref(),
        &ValueType::String,
        &none,
        diags,
    );
    let no_echo =
        eval_constant_into(root, param.obscure.as_ref(), &ValueType::Bool, &none, diags);

    FlatParameter {
        type_name,
        description,
        default,
        allowed_pattern,
        allowed_values,
        constraint_description,
        min_length,
        max_length,
        min_value,
        max_value,
        no_echo,
    }
}

fn build_output(
    root: &ModuleContext,
    name: &str,
    output: &config::Output,
    diags: &mut Diagnostics,
) -> FlatOutput {
    let none = EachState::none();

    if !valid_name(name) {
        diags.push(
            Diagnostic::error(
                "Invalid output name",
                "Output names may contain only alphanumeric characters.",
            )
            .with_subject(Subject::in_file(&output.file, format!("Output {:?}", name))),
        );
    }

    let description =
        eval_constant_into(root, output.description.as_ref(), &ValueType::String, &none, diags);
    let value = match &output.value {
        Some(expr) => eval_dynamic_into(root, expr, &none, diags),
        None => DynExpr::null_literal(),
    };
    let export_name = output.export.as_ref().map(|export| match &export.name {
        Some(expr) => eval_dynamic_into(root, expr, &none, diags),
        None => DynExpr::null_literal(),
    });

    FlatOutput {
        description,
        value,
        export_name,
    }
}

fn build_conditions(mctx: &ModuleContext, template: &mut FlatTemplate, diags: &mut Diagnostics) {
    for (name, attr) in &mctx.config.conditions {
        if !valid_name(name) {
            diags.push(
                Diagnostic::error(
                    "Invalid condition name",
                    "Condition names may contain only alphanumeric characters.",
                )
                .with_subject(Subject::in_file(&attr.file, format!("condition {:?}", name))),
            );
        }
        let lowered = eval_dynamic_into(mctx, &attr.expr, &mctx.each, diags);
        template.conditions.insert(emitted_name(mctx, name), lowered);
    }
}

fn build_mappings(mctx: &ModuleContext, template: &mut FlatTemplate, diags: &mut Diagnostics) {
    for (name, attr) in &mctx.config.mappings {
        if !valid_name(name) {
            diags.push(
                Diagnostic::error(
                    "Invalid mapping name",
                    "Mapping names may contain only alphanumeric characters.",
                )
                .with_subject(Subject::in_file(&attr.file, format!("mapping {:?}", name))),
            );
        }

        let val = eval_constant_into(mctx, Some(&attr.expr), &ValueType::Any, &mctx.each, diags);
        let Value::Object(top) = val else {
            if !val.is_null() {
                diags.push(
                    Diagnostic::error(
                        "Incorrect value type",
                        "A mapping must be an object whose values are objects.",
                    )
                    .with_expr(&attr.expr),
                );
            }
            continue;
        };

        let mut flat = IndexMap::new();
        for (key, inner) in top {
            if !matches!(inner, Value::Object(_)) {
                diags.push(
                    Diagnostic::error(
                        "Incorrect value type",
                        format!(
                            "Each top-level key of a mapping must be assigned an object of values; key {:?} is not.",
                            key
                        ),
                    )
                    .with_expr(&attr.expr),
                );
                continue;
            }
            flat.insert(key, inner);
        }
        template.mappings.insert(emitted_name(mctx, name), flat);
    }
}

fn build_resources(
    mctx: &ModuleContext,
    schema: &Schema,
    template: &mut FlatTemplate,
    diags: &mut Diagnostics,
) {
    for (name, resource) in &mctx.config.resources {
        if !valid_name(name) {
            diags.push(
                Diagnostic::error(
                    "Invalid resource name",
                    "Resource names may contain only alphanumeric characters.",
                )
                .with_subject(Subject::in_file(
                    &resource.file,
                    format!("Resource {:?}", name),
                )),
            );
        }

        let (for_each_val, val_diags) =
            mctx.eval_constant_opt(resource.for_each.as_ref(), &ValueType::Any, &mctx.each);
        let broken = val_diags.has_errors();
        diags.append(val_diags);
        if broken {
            continue;
        }

        let subject = Subject::in_file(&resource.file, format!("Resource {:?}", name));
        let Some(expansion) = classify_for_each(&for_each_val, &subject, diags) else {
            continue;
        };

        let instances: Vec<(EachIndex, EachState)> = match expansion {
            ForEachExpansion::Single => vec![(EachIndex::None, mctx.each.clone())],
            ForEachExpansion::Keyed { entries, .. } => entries
                .into_iter()
                .map(|(key, value)| (key.clone(), EachState::new(key, value)))
                .collect(),
        };

        for (key, each) in instances {
            let logical_id = resource_logical_id(&mctx.path, name, &key);
            let flat = build_resource_instance(mctx, resource, &each, schema, diags);
            template.resources.insert(logical_id, flat);
        }
    }
}

fn build_resource_instance(
    mctx: &ModuleContext,
    resource: &config::Resource,
    each: &EachState,
    schema: &Schema,
    diags: &mut Diagnostics,
) -> FlatResource {
    let type_name = resource.type_name.clone().unwrap_or_default();
    let resource_schema = schema.resource_types.get(&type_name);
    if resource_schema.is_none() && !type_name.is_empty() {
        diags.push(
            Diagnostic::error(
                "Unsupported resource type",
                format!("{:?} is not a known CloudFormation resource type.", type_name),
            )
            .with_subject(Subject::in_file(
                &resource.file,
                format!("Resource {:?}", resource.logical_id),
            )),
        );
    }

    let mut properties = IndexMap::new();
    for (prop_name, expr) in &resource.properties {
        let lowered = eval_dynamic_into(mctx, expr, each, diags);

        if let Some(resource_schema) = resource_schema {
            match resource_schema.properties.get(prop_name) {
                None => {
                    diags.push(
                        Diagnostic::error(
                            "Unsupported property",
                            format!(
                                "The resource type {} does not have a property named {:?}.",
                                type_name, prop_name
                            ),
                        )
                        .with_expr(expr),
                    );
                }
                Some(prop) => {
                    let want = schema.value_type(&type_name, &prop.type_ref);
                    let (got, check_diags) = mctx.type_check(expr, each, schema);
                    diags.append(check_diags);
                    if !types_compatible(&got, &want) {
                        diags.push(
                            Diagnostic::error(
                                "Incorrect value for property",
                                format!(
                                    "The property {:?} of {} expects {}, not {}.",
                                    prop_name, type_name, want, got
                                ),
                            )
                            .with_expr(expr),
                        );
                    }
                }
            }
        }

        properties.insert(prop_name.clone(), lowered);
    }

    if let Some(resource_schema) = resource_schema {
        for (prop_name, prop) in &resource_schema.properties {
            if prop.required && !resource.properties.contains_key(prop_name) {
                diags.push(
                    Diagnostic::error(
                        "Missing required property",
                        format!(
                            "The resource type {} requires a property named {:?}.",
                            type_name, prop_name
                        ),
                    )
                    .with_subject(Subject::in_file(
                        &resource.file,
                        format!("Resource {:?}", resource.logical_id),
                    )),
                );
            }
        }
    }

    let mut metadata = IndexMap::new();
    for (meta_name, expr) in &resource.metadata {
        let val = eval_constant_into(mctx, Some(expr), &ValueType::Any, each, diags);
        metadata.insert(meta_name.clone(), val);
    }

    let depends_on = build_depends_on(mctx, resource, diags);

    let deletion_policy = eval_constant_into(
        mctx,
        resource.deletion_policy.as_ref(),
        &ValueType::String,
        each,
        diags,
    );
    if let Value::String(policy) = &deletion_policy {
        if !matches!(policy.as_str(), "Delete" | "Retain" | "Snapshot") {
            diags.push(
                Diagnostic::error(
                    "Invalid deletion policy",
                    "DeletionPolicy must be one of \"Delete\", \"Retain\", or \"Snapshot\".",
                )
                .with_subject(Subject::in_file(
                    &resource.file,
                    format!("Resource {:?}", resource.logical_id),
                )),
            );
        }
    }

    let creation_policy = resource.creation_policy.as_ref().map(|policy| {
        let mut flat = FlatCreationPolicy::default();
        if let Some(auto_scaling) = &policy.auto_scaling {
            flat.auto_scaling_min_successful_percent = eval_constant_into(
                mctx,
                auto_scaling.min_successful_instances_percent.as_ref(),
                &ValueType::Number,
                each,
                diags,
            );
        }
        if let Some(signal) = &policy.signal {
            flat.signal_count =
                eval_constant_into(mctx, signal.count.as_ref(), &ValueType::Number, each, diags);
            flat.signal_timeout =
                eval_constant_into(mctx, signal.timeout.as_ref(), &ValueType::String, each, diags);
        }
        flat
    });

    let update_policy = resource.update_policy.as_ref().map(|policy| {
        let mut flat = FlatUpdatePolicy::default();
        if let Some(auto_scaling) = &policy.auto_scaling {
            flat.auto_scaling_replace = eval_constant_into(
                mctx,
                auto_scaling.replace.as_ref(),
                &ValueType::Bool,
                each,
                diags,
            );
        }
        flat
    });

    FlatResource {
        type_name,
        properties,
        metadata,
        depends_on,
        deletion_policy,
        creation_policy,
        update_policy,
    }
}

fn build_depends_on(
    mctx: &ModuleContext,
    resource: &config::Resource,
    diags: &mut Diagnostics,
) -> Vec<String> {
    use crate::eval::expr::{traversal_attr_name, traversal_root};

    let mut depends_on = Vec::new();
    for traversal in &resource.depends_on {
        let target = match (traversal_root(traversal), traversal_attr_name(traversal, 0)) {
            (Some("Resource"), Some(target)) if traversal.operators.len() == 1 => target,
            _ => {
                diags.push(
                    Diagnostic::error(
                        "Invalid DependsOn reference",
                        "DependsOn must reference a resource in the same module, like Resource.Name.",
                    )
                    .with_subject(Subject::in_file(
                        &resource.file,
                        format!("Resource {:?}", resource.logical_id),
                    )),
                );
                continue;
            }
        };
        match mctx.config.resources.get(target) {
            None => {
                diags.push(
                    Diagnostic::error(
                        "Unknown resource",
                        format!("There is no resource named {:?}.", target),
                    )
                    .with_subject(Subject::in_file(
                        &resource.file,
                        format!("Resource {:?}", resource.logical_id),
                    )),
                );
            }
            Some(target_resource) if target_resource.for_each.is_some() => {
                diags.push(
                    Diagnostic::error(
                        "Invalid DependsOn reference",
                        format!(
                            "The resource {:?} uses ForEach; depending on a fanned-out resource is not supported.",
                            target
                        ),
                    )
                    .with_subject(Subject::in_file(
                        &resource.file,
                        format!("Resource {:?}", resource.logical_id),
                    )),
                );
            }
            Some(_) => {
                depends_on.push(resource_logical_id(&mctx.path, target, &EachIndex::None));
            }
        }
    }
    depends_on
}

/// Loose structural compatibility between an inferred type and a
/// schema-declared one. CloudFormation converts freely between scalar
/// encodings, so scalar kinds are interchangeable; list and object shapes
/// must line up, checking only the fields both sides know about.
fn types_compatible(got: &ValueType, want: &ValueType) -> bool {
    fn is_scalar(ty: &ValueType) -> bool {
        matches!(ty, ValueType::Bool | ValueType::Number | ValueType::String)
    }

    match (got, want) {
        (ValueType::Any, _) | (_, ValueType::Any) => true,
        (got, want) if is_scalar(got) && is_scalar(want) => true,
        (ValueType::List(got), ValueType::List(want)) => types_compatible(got, want),
        (ValueType::Object(got), ValueType::Object(want)) => got
            .iter()
            .all(|(name, got_field)| match want.get(name) {
                Some(want_field) => types_compatible(got_field, want_field),
                None => false,
            }),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_types_are_interchangeable() {
        assert!(types_compatible(&ValueType::Number, &ValueType::String));
        assert!(types_compatible(&ValueType::Bool, &ValueType::String));
        assert!(!types_compatible(
            &ValueType::list_of(ValueType::String),
            &ValueType::String
        ));
    }

    #[test]
    fn object_compat_checks_shared_fields() {
        let mut got = IndexMap::new();
        got.insert("Key".to_string(), ValueType::String);
        let mut want = IndexMap::new();
        want.insert("Key".to_string(), ValueType::String);
        want.insert("Value".to_string(), ValueType::String);
        assert!(types_compatible(
            &ValueType::Object(got.clone()),
            &ValueType::Object(want.clone())
        ));

        got.insert("Bogus".to_string(), ValueType::String);
        assert!(!types_compatible(
            &ValueType::Object(got),
            &ValueType::Object(want)
        ));
    }
}
