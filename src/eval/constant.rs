//! Constant evaluation: the compile-time half of the dual-mode evaluator.
//!
//! In constant mode the whole expression language is available, but the only
//! scope roots that may be referenced are `Const`, `Each` (inside `ForEach`
//! only), and `Local` values that are themselves fully constant. The result
//! is always a known value of the requested type, or a typed null when
//! something went wrong (in which case errors have been reported).

use hcl::Expression;

use crate::diag::{Diagnostic, Diagnostics, Subject};
use crate::eval::context::ModuleContext;
use crate::eval::each::EachState;
use crate::eval::expr::{self, Scope};
use crate::value::{Value, ValueType};

/// Returns all of the traversals in the expression whose root is neither
/// `Const` nor `Each`. The result is empty when the expression can be fully
/// evaluated at generation time without consulting the module context.
pub fn detect_variables(expr: &Expression) -> Vec<hcl::Traversal> {
    let mut traversals = Vec::new();
    expr::collect_traversals(expr, &mut traversals);
    traversals
        .into_iter()
        .filter(|traversal| {
            !matches!(expr::traversal_root(traversal), Some("Const") | Some("Each"))
        })
        .collect()
}

impl ModuleContext {
    /// The context-aware variant of [`detect_variables`]: additionally
    /// follows `Local` references one hop, so that a reference to a
    /// fully-constant local does not count as a variable. When a local is
    /// *not* fully constant, the `Local` traversal itself is reported and
    /// its transitive references are elided, keeping diagnostics pointed at
    /// the outer expression.
    pub fn detect_variables(&self, expr: &Expression) -> Vec<hcl::Traversal> {
        detect_variables(expr)
            .into_iter()
            .filter(|traversal| {
                if expr::traversal_root(traversal) == Some("Local") {
                    if let Some(name) = expr::traversal_attr_name(traversal, 0) {
                        if self.config.locals.contains_key(name)
                            && self.local_is_constant(name, &mut Vec::new())
                        {
                            return false;
                        }
                    }
                }
                true
            })
            .collect()
    }

    /// Whether the named local's expression is fully constant, transitively
    /// through other locals. Cycles are treated as constant here so that the
    /// evaluation path reports them exactly once.
    pub(crate) fn local_is_constant(&self, name: &str, visiting: &mut Vec<String>) -> bool {
        if visiting.iter().any(|n| n == name) {
            return true;
        }
        let Some(local) = self.config.locals.get(name) else {
            return false;
        };

        visiting.push(name.to_string());
        let constant = detect_variables(&local.expr).iter().all(|traversal| {
            match expr::traversal_root(traversal) {
                Some("Local") => match expr::traversal_attr_name(traversal, 0) {
                    Some(inner) => {
                        self.config.locals.contains_key(inner)
                            && self.local_is_constant(inner, visiting)
                    }
                    None => false,
                },
                _ => false,
            }
        });
        visiting.pop();
        constant
    }

    /// Evaluates the given expression to produce a constant value, converted
    /// to the requested type.
    ///
    /// If `each` is anything other than [`EachState::none`] then the `Each`
    /// object is also available, exposing the values in the given state.
    pub fn eval_constant(
        &self,
        expr: &Expression,
        ty: &ValueType,
        each: &EachState,
    ) -> (Value, Diagnostics) {
        self.eval_constant_guarded(expr, ty, each, &mut Vec::new())
    }

    /// Like [`ModuleContext::eval_constant`] for an optional expression; an
    /// absent expression is a null of the requested type.
    pub fn eval_constant_opt(
        &self,
        expr: Option<&Expression>,
        ty: &ValueType,
        each: &EachState,
    ) -> (Value, Diagnostics) {
        match expr {
            Some(expr) => self.eval_constant(expr, ty, each),
            None => (Value::Null(ty.clone()), Diagnostics::new()),
        }
    }

    fn eval_constant_guarded(
        &self,
        expr: &Expression,
        ty: &ValueType,
        each: &EachState,
        visiting: &mut Vec<String>,
    ) -> (Value, Diagnostics) {
        let mut diags = Diagnostics::new();
        let mut scope = Scope::new();
        let mut locals = indexmap::IndexMap::new();

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
                        diags.push(
                            Diagnostic::error(
                                "Illegal use of \"Each\" object",
                                "The \"Each\" object can be accessed only within modules and resources that have ForEach set.",
                            )
                            .with_subject(Subject::new("Each")),
                        );
                    }
                }
                "Local" => {
                    let Some(name) = expr::traversal_attr_name(traversal, 0) else {
                        diags.push(
                            Diagnostic::error(
                                "Illegal use of Local object",
                                "The Local object requires an attribute to select a specific named local value.",
                            )
                            .with_subject(Subject::new("Local")),
                        );
                        continue;
                    };
                    if locals.contains_key(name) {
                        continue;
                    }
                    let Some(local) = self.config.locals.get(name) else {
                        diags.push(Diagnostic::error(
                            "Unknown local value",
                            format!("There is no local value named {:?}.", name),
                        ));
                        locals.insert(name.to_string(), Value::unknown());
                        continue;
                    };
                    if visiting.iter().any(|n| n == name) {
                        diags.push(Diagnostic::error(
                            "Local value cycle",
                            format!(
                                "The local value {:?} refers to itself, possibly through other local values.",
                                name
                            ),
                        ));
                        locals.insert(name.to_string(), Value::unknown());
                        continue;
                    }
                    if !self.local_is_constant(name, &mut Vec::new()) {
                        diags.push(
                            Diagnostic::error(
                                "Illegal use of non-constant value",
                                "Only literals and named constants can be used here.",
                            )
                            .with_subject(Subject::new(format!("Local.{}", name))),
                        );
                        locals.insert(name.to_string(), Value::unknown());
                        continue;
                    }
                    visiting.push(name.to_string());
                    let (val, local_diags) =
                        self.eval_constant_guarded(&local.expr, &ValueType::Any, each, visiting);
                    visiting.pop();
                    diags.append(local_diags);
                    locals.insert(name.to_string(), val);
                }
                other => {
                    diags.push(
                        Diagnostic::error(
                            "Illegal use of non-constant value",
                            "Only literals and named constants can be used here.",
                        )
                        .with_subject(Subject::new(other)),
                    );
                    // Put a placeholder value in the scope anyway, so that
                    // evaluation can still complete without a cascade of
                    // secondary errors; the result will come out unknown.
                    scope.declare(other, Value::unknown());
                }
            }
        }

        scope.declare("Const", Value::Object(self.constants.clone()));
        scope.declare("Local", Value::Object(locals));
        if each.enabled() {
            let mut each_obj = indexmap::IndexMap::new();
            each_obj.insert("Key".to_string(), each.key.value());
            each_obj.insert("Value".to_string(), each.value.clone());
            scope.declare("Each", Value::Object(each_obj));
        } else {
            // Keep "Each" bound even where it is illegal, so that the error
            // above does not trigger further unknown-object noise.
            scope.declare("Each", Value::unknown());
        }

        let (mut val, eval_diags) = expr::eval_expr(expr, &scope);
        diags.append(eval_diags);

        // Constants must never be unknown. This can happen only if there is
        // an error, so the caller will generally detect that case with
        // `diags.has_errors()` and not look at the result, but producing a
        // reasonable result anyway supports partial analysis of erroneous
        // configuration.
        if !val.is_known() {
            val = Value::Null(val.ty());
        }

        match val.convert(ty) {
            Ok(converted) => (converted, diags),
            Err(err) => {
                diags.push(
                    Diagnostic::error(
                        "Incorrect value type",
                        format!("This expression is not of the expected type: {}.", err),
                    )
                    .with_expr(expr),
                );
                (Value::Null(ty.clone()), diags)
            }
        }
    }
}
