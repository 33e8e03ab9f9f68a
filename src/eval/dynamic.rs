//! Dynamic lowering: the runtime half of the dual-mode evaluator.
//!
//! Lowering translates a source expression into a [`DynExpr`] tree that
//! CloudFormation can evaluate when the template is applied. Only the
//! expression shapes with CloudFormation analogs are accepted; any other
//! shape falls back to constant evaluation, so the full source language
//! remains usable wherever the result collapses to a constant.

use hcl::expr::{BinaryOperator, TemplateExpr};
use hcl::template::{Element, Template};
use hcl::{Expression, TraversalOperator};

use crate::addr::{make_each_index, EachIndex, EachType, ModulePath, NameInModule};
use crate::diag::{Diagnostic, Diagnostics, Subject};
use crate::eval::context::ModuleContext;
use crate::eval::each::EachState;
use crate::eval::expr::{self};
use crate::eval::op_tree::{DynExpr, LogicalOp};
use crate::value::{Value, ValueType};

/// The logical ID under which a resource of the given module is emitted.
/// Resources of the root module with no `ForEach` key keep their declared
/// name; everything else takes the hashed qualified-name ID.
pub(crate) fn resource_logical_id(module: &ModulePath, name: &str, key: &EachIndex) -> String {
    if module.is_root() && *key == EachIndex::None {
        return name.to_string();
    }
    NameInModule {
        module: module.clone(),
        name: name.to_string(),
        key: key.clone(),
    }
    .id()
}

impl ModuleContext {
    /// Evaluates the given expression to produce a [`DynExpr`], which can
    /// then be serialized as a value in CloudFormation JSON.
    ///
    /// If `each` is anything other than [`EachState::none`] then the `Each`
    /// object is also available, exposing the values in the given state.
    pub fn eval_dynamic(&self, expr: &Expression, each: &EachState) -> (DynExpr, Diagnostics) {
        self.eval_dynamic_guarded(expr, each, &mut Vec::new())
    }

    fn eval_dynamic_guarded(
        &self,
        expr: &Expression,
        each: &EachState,
        local_stack: &mut Vec<String>,
    ) -> (DynExpr, Diagnostics) {
        let mut diags = Diagnostics::new();

        match expr {
            Expression::Null => (DynExpr::Literal(Value::null()), diags),
            Expression::Bool(b) => (DynExpr::Literal(Value::Bool(*b)), diags),
            Expression::Number(n) => (DynExpr::Literal(Value::Number(n.clone())), diags),
            Expression::String(s) => (DynExpr::Literal(Value::from(s.as_str())), diags),

            Expression::Parenthesis(inner) => {
                self.eval_dynamic_guarded(inner, each, local_stack)
            }

            Expression::Variable(var) => {
                self.lower_scope_traversal(var.as_str(), &[], expr, each, local_stack)
            }

            Expression::Traversal(traversal) => match expr::traversal_root(traversal) {
                Some(root) => self.lower_scope_traversal(
                    root,
                    &traversal.operators,
                    expr,
                    each,
                    local_stack,
                ),
                None => {
                    let (base, base_diags) =
                        self.eval_dynamic_guarded(&traversal.expr, each, local_stack);
                    diags.append(base_diags);
                    let (lowered, op_diags) =
                        self.apply_dyn_operators(base, &traversal.operators, each, local_stack);
                    diags.append(op_diags);
                    (lowered, diags)
                }
            },

            Expression::TemplateExpr(template) => {
                self.lower_template(template, expr, each, local_stack)
            }

            Expression::Operation(operation) => match operation.as_ref() {
                hcl::expr::Operation::Binary(op) => match op.operator {
                    BinaryOperator::And | BinaryOperator::Or => {
                        let logical_op = match op.operator {
                            BinaryOperator::And => LogicalOp::And,
                            _ => LogicalOp::Or,
                        };
                        let (lhs, lhs_diags) =
                            self.eval_dynamic_guarded(&op.lhs_expr, each, local_stack);
                        diags.append(lhs_diags);
                        let (rhs, rhs_diags) =
                            self.eval_dynamic_guarded(&op.rhs_expr, each, local_stack);
                        diags.append(rhs_diags);

                        // Nested expressions of the same operator flatten
                        // into a single node, producing a more compact final
                        // template.
                        let mut values = Vec::new();
                        for side in [lhs, rhs] {
                            match side {
                                DynExpr::Logical { op, values: inner } if op == logical_op => {
                                    values.extend(inner)
                                }
                                other => values.push(other),
                            }
                        }
                        (
                            DynExpr::Logical {
                                op: logical_op,
                                values,
                            },
                            diags,
                        )
                    }
                    BinaryOperator::Eq | BinaryOperator::NotEq => {
                        let (a, a_diags) =
                            self.eval_dynamic_guarded(&op.lhs_expr, each, local_stack);
                        diags.append(a_diags);
                        let (b, b_diags) =
                            self.eval_dynamic_guarded(&op.rhs_expr, each, local_stack);
                        diags.append(b_diags);

                        for operand in [&a, &b] {
                            if !operand.is_literal_or_ref() {
                                diags.push(
                                    Diagnostic::error(
                                        "Invalid comparison operand",
                                        "CloudFormation can compare only literal values and references.",
                                    )
                                    .with_expr(expr),
                                );
                            }
                        }

                        let equals = DynExpr::Equals {
                            a: Box::new(a),
                            b: Box::new(b),
                        };
                        // CloudFormation has no "not equal" test, so wrap a
                        // "not" expression around.
                        let lowered = if op.operator == BinaryOperator::NotEq {
                            DynExpr::Not(Box::new(equals))
                        } else {
                            equals
                        };
                        (lowered, diags)
                    }
                    _ => self.lower_fallback(expr, each),
                },
                hcl::expr::Operation::Unary(_) => self.lower_fallback(expr, each),
            },

            _ => self.lower_fallback(expr, each),
        }
    }

    fn lower_template(
        &self,
        template: &TemplateExpr,
        expr: &Expression,
        each: &EachState,
        local_stack: &mut Vec<String>,
    ) -> (DynExpr, Diagnostics) {
        let mut diags = Diagnostics::new();
        let template = match Template::from_expr(template) {
            Ok(template) => template,
            Err(_) => return self.lower_fallback(expr, each),
        };

        let mut parts = Vec::new();
        for element in template.elements() {
            match element {
                Element::Literal(lit) => {
                    parts.push(DynExpr::Literal(Value::from(lit.as_str())))
                }
                Element::Interpolation(interp) => {
                    let (part, part_diags) =
                        self.eval_dynamic_guarded(&interp.expr, each, local_stack);
                    diags.append(part_diags);
                    parts.push(part);
                }
                Element::Directive(_) => {
                    // Directives have no CloudFormation analog; the whole
                    // template goes through the constant fallback.
                    return self.lower_fallback(expr, each);
                }
            }
        }

        match parts.len() {
            0 => (DynExpr::Literal(Value::from("")), diags),
            1 => (parts.into_iter().next().unwrap(), diags),
            _ => (
                DynExpr::Join {
                    delimiter: String::new(),
                    exprs: parts,
                },
                diags,
            ),
        }
    }

    fn lower_scope_traversal(
        &self,
        root: &str,
        operators: &[TraversalOperator],
        expr: &Expression,
        each: &EachState,
        local_stack: &mut Vec<String>,
    ) -> (DynExpr, Diagnostics) {
        let mut diags = Diagnostics::new();

        match root {
            "Const" | "Each" => {
                let (val, val_diags) = self.eval_constant(expr, &ValueType::Any, each);
                diags.append(val_diags);
                (DynExpr::Literal(val), diags)
            }

            "Local" => {
                let Some(name) = attr_name(operators, 0) else {
                    diags.push(
                        Diagnostic::error(
                            "Illegal use of Local object",
                            "The Local object requires an attribute to select a specific named local value.",
                        )
                        .with_expr(expr),
                    );
                    return (DynExpr::null_literal(), diags);
                };
                let Some(local) = self.config.locals.get(name) else {
                    diags.push(Diagnostic::error(
                        "Unknown local value",
                        format!("There is no local value named {:?}.", name),
                    ));
                    return (DynExpr::null_literal(), diags);
                };

                let lowered = if self.local_is_constant(name, &mut Vec::new()) {
                    // A constant-only local evaluates here and becomes a
                    // literal.
                    let (val, val_diags) =
                        self.eval_constant(&local.expr, &ValueType::Any, each);
                    diags.append(val_diags);
                    DynExpr::Literal(val)
                } else {
                    if local_stack.iter().any(|n| n == name) {
                        diags.push(Diagnostic::error(
                            "Local value cycle",
                            format!(
                                "The local value {:?} refers to itself, possibly through other local values.",
                                name
                            ),
                        ));
                        return (DynExpr::null_literal(), diags);
                    }
                    // A dynamic local's expression gets incorporated into
                    // ours.
                    local_stack.push(name.to_string());
                    let (lowered, local_diags) =
                        self.eval_dynamic_guarded(&local.expr, each, local_stack);
                    local_stack.pop();
                    diags.append(local_diags);
                    lowered
                };

                let (lowered, op_diags) =
                    self.apply_dyn_operators(lowered, &operators[1..], each, local_stack);
                diags.append(op_diags);
                (lowered, diags)
            }

            "Resource" => {
                let Some(name) = attr_name(operators, 0) else {
                    diags.push(
                        Diagnostic::error(
                            "Illegal use of Resource object",
                            "The Resource object requires an attribute to specify which resource to access.",
                        )
                        .with_expr(expr),
                    );
                    return (DynExpr::null_literal(), diags);
                };
                let Some(resource) = self.config.resources.get(name) else {
                    diags.push(Diagnostic::error(
                        "Unknown resource",
                        format!("There is no resource named {:?}.", name),
                    ));
                    return (DynExpr::null_literal(), diags);
                };

                let mut consumed = 1;
                let key = if resource.for_each.is_some() {
                    match operators.get(1) {
                        Some(TraversalOperator::Index(key_expr)) => {
                            consumed = 2;
                            let (key_val, key_diags) =
                                self.eval_constant(key_expr, &ValueType::Any, each);
                            diags.append(key_diags);
                            if !key_val.is_known() || key_val.is_null() {
                                return (DynExpr::null_literal(), diags);
                            }
                            let key = make_each_index(&key_val);
                            if key == EachIndex::None {
                                diags.push(
                                    Diagnostic::error(
                                        "Invalid resource instance index",
                                        "A ForEach resource instance index must be a whole number or a string.",
                                    )
                                    .with_expr(key_expr),
                                );
                                return (DynExpr::null_literal(), diags);
                            }
                            key
                        }
                        _ => {
                            diags.push(
                                Diagnostic::error(
                                    "Invalid resource reference",
                                    format!(
                                        "The resource {:?} uses ForEach, so a reference must select one instance by index.",
                                        name
                                    ),
                                )
                                .with_expr(expr),
                            );
                            return (DynExpr::null_literal(), diags);
                        }
                    }
                } else {
                    EachIndex::None
                };

                let logical_id = resource_logical_id(&self.path, name, &key);
                let remaining = &operators[consumed..];
                if remaining.is_empty() {
                    return (DynExpr::Ref { logical_id }, diags);
                }

                let mut attrs = Vec::new();
                for operator in remaining {
                    match operator {
                        TraversalOperator::GetAttr(attr) => {
                            attrs.push(DynExpr::Literal(Value::from(attr.as_str())))
                        }
                        TraversalOperator::Index(key_expr) => {
                            let (lowered, key_diags) =
                                self.eval_dynamic_guarded(key_expr, each, local_stack);
                            diags.append(key_diags);
                            attrs.push(lowered);
                        }
                        TraversalOperator::LegacyIndex(index) => {
                            attrs.push(DynExpr::Literal(Value::from(*index as i64)))
                        }
                        TraversalOperator::AttrSplat | TraversalOperator::FullSplat => {
                            diags.push(
                                Diagnostic::error(
                                    "Splat expression not supported",
                                    "This value does not support splat expressions.",
                                )
                                .with_expr(expr),
                            );
                            break;
                        }
                    }
                }
                (DynExpr::GetAttr { logical_id, attrs }, diags)
            }

            "Param" => {
                let Some(name) = attr_name(operators, 0) else {
                    diags.push(
                        Diagnostic::error(
                            "Illegal use of Param object",
                            "The Param object requires an attribute to specify which parameter to access.",
                        )
                        .with_expr(expr),
                    );
                    return (DynExpr::null_literal(), diags);
                };
                if !self.config.parameters.contains_key(name) {
                    diags.push(Diagnostic::error(
                        "Unknown parameter",
                        format!("There is no parameter named {:?}.", name),
                    ));
                    return (DynExpr::null_literal(), diags);
                }
                let base = DynExpr::Ref {
                    logical_id: name.to_string(),
                };
                let (lowered, op_diags) =
                    self.apply_dyn_operators(base, &operators[1..], each, local_stack);
                diags.append(op_diags);
                (lowered, diags)
            }

            "Module" => self.lower_module_reference(operators, expr, each, local_stack),

            "Mapping" | "Condition" => {
                diags.push(
                    Diagnostic::error(
                        "Reserved object name",
                        format!("The name {:?} is reserved and not yet supported.", root),
                    )
                    .with_expr(expr),
                );
                (DynExpr::null_literal(), diags)
            }

            other => {
                diags.push(
                    Diagnostic::error(
                        "Unknown object",
                        format!("There is no object named {:?}.", other),
                    )
                    .with_subject(Subject::new(other)),
                );
                (DynExpr::null_literal(), diags)
            }
        }
    }

    fn lower_module_reference(
        &self,
        operators: &[TraversalOperator],
        expr: &Expression,
        each: &EachState,
        local_stack: &mut Vec<String>,
    ) -> (DynExpr, Diagnostics) {
        let mut diags = Diagnostics::new();

        let Some(name) = attr_name(operators, 0) else {
            diags.push(
                Diagnostic::error(
                    "Illegal use of Module object",
                    "The Module object requires an attribute to specify which module to access.",
                )
                .with_expr(expr),
            );
            return (DynExpr::null_literal(), diags);
        };
        let Some(eacher) = self.children.get(name) else {
            diags.push(Diagnostic::error(
                "Unknown module",
                format!("There is no module named {:?}.", name),
            ));
            return (DynExpr::null_literal(), diags);
        };

        let (instance, output_pos) = match eacher.each_type {
            EachType::None => {
                let Some(instance) = eacher.single() else {
                    // The instance failed to construct; that error is
                    // already reported at the call site.
                    return (DynExpr::null_literal(), diags);
                };
                (instance, 1)
            }
            key_type @ (EachType::Int | EachType::String) => {
                let Some(TraversalOperator::Index(key_expr)) = operators.get(1) else {
                    diags.push(
                        Diagnostic::error(
                            "Invalid module reference",
                            format!(
                                "The module {:?} uses ForEach, so a reference must select one instance by index.",
                                name
                            ),
                        )
                        .with_expr(expr),
                    );
                    return (DynExpr::null_literal(), diags);
                };
                let want = match key_type {
                    EachType::Int => ValueType::Number,
                    _ => ValueType::String,
                };
                let (key_val, key_diags) = self.eval_constant(key_expr, &want, each);
                diags.append(key_diags);
                if !key_val.is_known() || key_val.is_null() {
                    return (DynExpr::null_literal(), diags);
                }
                let key = make_each_index(&key_val);
                if key == EachIndex::None {
                    diags.push(
                        Diagnostic::error(
                            "Invalid module instance index",
                            "A ForEach module instance index must be a whole number or a string.",
                        )
                        .with_expr(key_expr),
                    );
                    return (DynExpr::null_literal(), diags);
                }
                let instance = match eacher.index(&key) {
                    Some(instance) => instance,
                    None => {
                        diags.push(
                            Diagnostic::error(
                                "Unknown module instance",
                                format!(
                                    "The module {:?} has no instance with index {}.",
                                    name, key
                                ),
                            )
                            .with_expr(key_expr),
                        );
                        return (DynExpr::null_literal(), diags);
                    }
                };
                (instance, 2)
            }
        };

        let Some(output_name) = attr_name(operators, output_pos) else {
            diags.push(
                Diagnostic::error(
                    "Invalid module reference",
                    "A module reference requires an output name.",
                )
                .with_expr(expr),
            );
            return (DynExpr::null_literal(), diags);
        };
        let Some(output) = instance.config.outputs.get(output_name) else {
            diags.push(Diagnostic::error(
                "Unknown module output",
                format!(
                    "The module {:?} has no output named {:?}.",
                    name, output_name
                ),
            ));
            return (DynExpr::null_literal(), diags);
        };

        // The referenced output's expression lowers in the child module's
        // own context, under the Each state that instance was created with.
        let lowered = match &output.value {
            Some(value_expr) => {
                let (lowered, value_diags) =
                    instance.eval_dynamic_guarded(value_expr, &instance.each, &mut Vec::new());
                diags.append(value_diags);
                lowered
            }
            None => DynExpr::null_literal(),
        };

        let (lowered, op_diags) =
            self.apply_dyn_operators(lowered, &operators[output_pos + 1..], each, local_stack);
        diags.append(op_diags);
        (lowered, diags)
    }

    fn apply_dyn_operators(
        &self,
        start: DynExpr,
        operators: &[TraversalOperator],
        each: &EachState,
        local_stack: &mut Vec<String>,
    ) -> (DynExpr, Diagnostics) {
        let mut diags = Diagnostics::new();
        let mut lowered = start;

        for operator in operators {
            match operator {
                TraversalOperator::Index(key_expr) => {
                    let (index, index_diags) =
                        self.eval_dynamic_guarded(key_expr, each, local_stack);
                    diags.append(index_diags);
                    if !matches!(
                        index,
                        DynExpr::Literal(_) | DynExpr::Ref { .. } | DynExpr::MappingLookup { .. }
                    ) {
                        diags.push(
                            Diagnostic::error(
                                "Invalid index",
                                "A CloudFormation list index must be a literal value, a reference, or a mapping lookup.",
                            )
                            .with_expr(key_expr),
                        );
                    }
                    lowered = DynExpr::Index {
                        list: Box::new(lowered),
                        index: Box::new(index),
                    };
                }
                TraversalOperator::LegacyIndex(index) => {
                    lowered = DynExpr::Index {
                        list: Box::new(lowered),
                        index: Box::new(DynExpr::Literal(Value::from(*index as i64))),
                    };
                }
                TraversalOperator::GetAttr(name) => {
                    diags.push(Diagnostic::error(
                        "Unsupported attribute",
                        format!(
                            "This value does not have any attributes (accessing {:?}).",
                            name.as_str()
                        ),
                    ));
                    return (DynExpr::null_literal(), diags);
                }
                TraversalOperator::AttrSplat | TraversalOperator::FullSplat => {
                    diags.push(Diagnostic::error(
                        "Splat expression not supported",
                        "This value does not support splat expressions.",
                    ));
                    return (DynExpr::null_literal(), diags);
                }
            }
        }

        (lowered, diags)
    }

    /// The fallback for expression shapes with no CloudFormation analog: if
    /// the expression references nothing dynamic it evaluates as a constant,
    /// and otherwise the whole expression is in error.
    fn lower_fallback(&self, expr: &Expression, each: &EachState) -> (DynExpr, Diagnostics) {
        let mut diags = Diagnostics::new();

        let variables = self.detect_variables(expr);
        if !variables.is_empty() {
            let first = Expression::Traversal(Box::new(variables[0].clone()));
            diags.push(
                Diagnostic::error(
                    "Illegal use of non-constant value",
                    format!(
                        "This expression type is not supported by CloudFormation, so only constant values are permitted and the result value will be hard-coded into the generated template. A non-constant value is referenced at {}.",
                        first
                    ),
                )
                // Intentionally the whole expression rather than just the
                // erroneous traversal.
                .with_expr(expr),
            );
            return (DynExpr::null_literal(), diags);
        }

        let (val, val_diags) = self.eval_constant(expr, &ValueType::Any, each);
        diags.append(val_diags);
        (DynExpr::Literal(val), diags)
    }
}

fn attr_name(operators: &[TraversalOperator], index: usize) -> Option<&str> {
    match operators.get(index) {
        Some(TraversalOperator::GetAttr(name)) => Some(name.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::ModulePath;
    use crate::config;
    use indexmap::IndexMap;

    fn parse_expr(src: &str) -> Expression {
        let body: hcl::Body = hcl::from_str(&format!("x = {}", src)).unwrap();
        body.attributes().next().unwrap().expr().clone()
    }

    fn test_context(config_src: &str) -> ModuleContext {
        let (file, diags) = config::parse_file_source(config_src, "test.awsup");
        assert!(!diags.has_errors(), "bad test config: {:?}", diags);
        let (module, diags) = config::new_module(None, vec![file]);
        assert!(!diags.has_errors(), "bad test config: {:?}", diags);
        let mut constants = IndexMap::new();
        constants.insert("Env".to_string(), Value::from("prod"));
        ModuleContext {
            path: ModulePath::root(),
            each: EachState::none(),
            config: module,
            constants,
            children: IndexMap::new(),
        }
    }

    fn lower(ctx: &ModuleContext, src: &str) -> (DynExpr, Diagnostics) {
        ctx.eval_dynamic(&parse_expr(src), &EachState::none())
    }

    #[test]
    fn literal_lowering() {
        let ctx = test_context("");
        let (lowered, diags) = lower(&ctx, "\"hello\"");
        assert!(diags.is_empty());
        assert_eq!(lowered, DynExpr::literal("hello"));
    }

    #[test]
    fn const_reference_becomes_literal() {
        let ctx = test_context("");
        let (lowered, diags) = lower(&ctx, "Const.Env");
        assert!(!diags.has_errors());
        assert_eq!(lowered, DynExpr::literal("prod"));
    }

    #[test]
    fn resource_reference_becomes_ref() {
        let ctx = test_context(r#"Resource "Bucket" { Type = "AWS::S3::Bucket" }"#);
        let (lowered, diags) = lower(&ctx, "Resource.Bucket");
        assert!(!diags.has_errors());
        assert_eq!(
            lowered,
            DynExpr::Ref {
                logical_id: "Bucket".to_string()
            }
        );
    }

    #[test]
    fn resource_attribute_becomes_get_attr() {
        let ctx = test_context(r#"Resource "Bucket" { Type = "AWS::S3::Bucket" }"#);
        let (lowered, diags) = lower(&ctx, "Resource.Bucket.Arn");
        assert!(!diags.has_errors());
        assert_eq!(
            lowered,
            DynExpr::GetAttr {
                logical_id: "Bucket".to_string(),
                attrs: vec![DynExpr::literal("Arn")],
            }
        );
    }

    #[test]
    fn template_interpolation_joins_with_empty_delimiter() {
        let ctx = test_context(r#"Resource "Bucket" { Type = "AWS::S3::Bucket" }"#);
        let (lowered, diags) = lower(&ctx, r#""arn:${Resource.Bucket}""#);
        assert!(!diags.has_errors());
        assert_eq!(
            lowered,
            DynExpr::Join {
                delimiter: String::new(),
                exprs: vec![
                    DynExpr::literal("arn:"),
                    DynExpr::Ref {
                        logical_id: "Bucket".to_string()
                    },
                ],
            }
        );
    }

    #[test]
    fn single_interpolation_collapses_to_child() {
        let ctx = test_context(r#"Resource "Bucket" { Type = "AWS::S3::Bucket" }"#);
        let (lowered, diags) = lower(&ctx, r#""${Resource.Bucket}""#);
        assert!(!diags.has_errors());
        assert_eq!(
            lowered,
            DynExpr::Ref {
                logical_id: "Bucket".to_string()
            }
        );
    }

    #[test]
    fn logical_chains_flatten() {
        let ctx = test_context(r#"Parameter "P" { Type = "String" }"#);
        let (lowered, diags) =
            lower(&ctx, r#"Param.P == "a" && Param.P == "b" && Param.P == "c""#);
        assert!(!diags.has_errors(), "{:?}", diags);
        match lowered {
            DynExpr::Logical { op, values } => {
                assert_eq!(op, LogicalOp::And);
                assert_eq!(values.len(), 3);
                assert!(values.iter().all(|v| matches!(v, DynExpr::Equals { .. })));
            }
            other => panic!("expected flattened logical, got {:?}", other),
        }
    }

    #[test]
    fn inequality_wraps_not() {
        let ctx = test_context(r#"Parameter "P" { Type = "String" }"#);
        let (lowered, diags) = lower(&ctx, r#"Param.P != "x""#);
        assert!(!diags.has_errors());
        assert!(matches!(lowered, DynExpr::Not(inner) if matches!(*inner, DynExpr::Equals { .. })));
    }

    #[test]
    fn equals_operands_must_be_literal_or_ref() {
        let ctx = test_context(r#"Parameter "P" { Type = "String" }"#);
        let (_, diags) = lower(&ctx, r#""x${Param.P}y" == "a""#);
        assert!(diags.has_errors());
    }

    #[test]
    fn index_lowering() {
        let ctx = test_context(r#"Parameter "Zones" { Type = "CommaDelimitedList" }"#);
        let (lowered, diags) = lower(&ctx, "Param.Zones[0]");
        assert!(!diags.has_errors());
        assert_eq!(
            lowered,
            DynExpr::Index {
                list: Box::new(DynExpr::Ref {
                    logical_id: "Zones".to_string()
                }),
                index: Box::new(DynExpr::literal(0i64)),
            }
        );
    }

    #[test]
    fn unsupported_shape_with_variables_is_an_error() {
        let ctx = test_context(r#"Parameter "P" { Type = "Number" }"#);
        let (lowered, diags) = lower(&ctx, "Param.P + 1");
        assert!(diags.has_errors());
        assert_eq!(lowered, DynExpr::null_literal());
    }

    #[test]
    fn unsupported_shape_without_variables_collapses_to_constant() {
        let ctx = test_context("");
        let (lowered, diags) = lower(&ctx, "1 + 2");
        assert!(!diags.has_errors());
        assert_eq!(lowered, DynExpr::literal(3i64));
    }

    #[test]
    fn dynamic_local_lowers_through_its_expression() {
        let ctx = test_context(
            r#"
Resource "Bucket" { Type = "AWS::S3::Bucket" }
Locals {
  BucketRef = Resource.Bucket
}
"#,
        );
        let (lowered, diags) = lower(&ctx, "Local.BucketRef");
        assert!(!diags.has_errors());
        assert_eq!(
            lowered,
            DynExpr::Ref {
                logical_id: "Bucket".to_string()
            }
        );
    }

    #[test]
    fn dynamic_local_cycle_is_reported() {
        let ctx = test_context(
            r#"
Resource "Bucket" { Type = "AWS::S3::Bucket" }
Locals {
  A = "${Local.B}${Resource.Bucket}"
  B = "${Local.A}${Resource.Bucket}"
}
"#,
        );
        let (_, diags) = lower(&ctx, "Local.A");
        assert!(diags.has_errors());
        assert!(diags.iter().any(|d| d.summary == "Local value cycle"));
    }

    #[test]
    fn reserved_roots_are_rejected() {
        let ctx = test_context("");
        let (_, diags) = lower(&ctx, "Mapping.RegionMap");
        assert!(diags.has_errors());
    }
}
