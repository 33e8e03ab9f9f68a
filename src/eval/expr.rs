//! The generic expression evaluator.
//!
//! Both constant evaluation and type checking run expressions through this
//! engine; they differ only in the scope they construct. The engine supports
//! the whole source expression language and understands [`Value::Unknown`]:
//! operations over unknown operands produce unknown results of the best
//! known type instead of errors, which is how type information propagates
//! and how one bad reference avoids producing a cascade of follow-on
//! diagnostics.

use hcl::expr::{BinaryOperator, TemplateExpr, UnaryOperator};
use hcl::template::{Element, Template};
use hcl::{Expression, ObjectKey, Traversal, TraversalOperator};
use indexmap::IndexMap;

use crate::diag::{Diagnostic, Diagnostics, Subject};
use crate::value::{Value, ValueType};

/// The set of named objects visible to an expression.
#[derive(Debug, Clone, Default)]
pub(crate) struct Scope {
    vars: IndexMap<String, Value>,
}

impl Scope {
    pub fn new() -> Scope {
        Scope::default()
    }

    pub fn declare(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }
}

pub(crate) fn eval_expr(expr: &Expression, scope: &Scope) -> (Value, Diagnostics) {
    let mut diags = Diagnostics::new();
    let val = eval(expr, scope, &mut diags);
    (val, diags)
}

fn eval(expr: &Expression, scope: &Scope, diags: &mut Diagnostics) -> Value {
    match expr {
        Expression::Null => Value::null(),
        Expression::Bool(b) => Value::Bool(*b),
        Expression::Number(n) => Value::Number(n.clone()),
        Expression::String(s) => Value::String(s.clone()),

        Expression::Array(elems) => {
            Value::List(elems.iter().map(|e| eval(e, scope, diags)).collect())
        }

        Expression::Object(fields) => eval_object(fields, scope, diags),

        Expression::TemplateExpr(template) => eval_template_expr(template, scope, diags),

        Expression::Parenthesis(inner) => eval(inner, scope, diags),

        Expression::Variable(var) => match scope.get(var.as_str()) {
            Some(value) => value.clone(),
            None => {
                diags.push(
                    Diagnostic::error(
                        "Unknown object",
                        format!("There is no object named {:?}.", var.as_str()),
                    )
                    .with_subject(Subject::new(var.as_str())),
                );
                Value::unknown()
            }
        },

        Expression::Traversal(traversal) => {
            let mut value = eval(&traversal.expr, scope, diags);
            for operator in &traversal.operators {
                value = apply_traversal_operator(value, operator, scope, diags);
            }
            value
        }

        Expression::Conditional(cond) => {
            let cond_val = eval(&cond.cond_expr, scope, diags);
            match bool_operand(cond_val, "condition", &cond.cond_expr, diags) {
                Some(BoolVal::Known(true)) => eval(&cond.true_expr, scope, diags),
                Some(BoolVal::Known(false)) => eval(&cond.false_expr, scope, diags),
                Some(BoolVal::Unknown) => {
                    // Evaluate both branches for their types, but the result
                    // cannot be known.
                    let then_val = eval(&cond.true_expr, scope, diags);
                    let else_val = eval(&cond.false_expr, scope, diags);
                    Value::Unknown(ValueType::unify(&then_val.ty(), &else_val.ty()))
                }
                None => Value::unknown(),
            }
        }

        Expression::Operation(operation) => match operation.as_ref() {
            hcl::expr::Operation::Unary(op) => {
                let val = eval(&op.expr, scope, diags);
                eval_unary(op.operator, val, &op.expr, diags)
            }
            hcl::expr::Operation::Binary(op) => {
                let lhs = eval(&op.lhs_expr, scope, diags);
                let rhs = eval(&op.rhs_expr, scope, diags);
                eval_binary(op.operator, lhs, rhs, expr, diags)
            }
        },

        Expression::ForExpr(for_expr) => eval_for_expr(for_expr, scope, diags),

        Expression::FuncCall(_) => {
            diags.push(
                Diagnostic::error(
                    "Call to unknown function",
                    "This language does not support function calls.",
                )
                .with_expr(expr),
            );
            Value::unknown()
        }

        other => {
            diags.push(
                Diagnostic::error("Unsupported expression", "This expression is not supported.")
                    .with_expr(other),
            );
            Value::unknown()
        }
    }
}

fn eval_object(
    fields: &hcl::Object<ObjectKey, Expression>,
    scope: &Scope,
    diags: &mut Diagnostics,
) -> Value {
    let mut out = IndexMap::new();
    for (key, value_expr) in fields {
        let key = match key {
            ObjectKey::Identifier(ident) => ident.as_str().to_string(),
            ObjectKey::Expression(key_expr) => {
                let key_val = eval(key_expr, scope, diags);
                if !key_val.is_known() {
                    // An unknown key makes the whole object shape unknown.
                    return Value::unknown();
                }
                match key_val.convert(&ValueType::String) {
                    Ok(Value::String(s)) => s,
                    _ => {
                        diags.push(
                            Diagnostic::error(
                                "Incorrect object key",
                                "Object keys must be strings.",
                            )
                            .with_expr(key_expr),
                        );
                        continue;
                    }
                }
            }
            _ => {
                diags.push(Diagnostic::error(
                    "Incorrect object key",
                    "Object keys must be strings.",
                ));
                continue;
            }
        };
        out.insert(key, eval(value_expr, scope, diags));
    }
    Value::Object(out)
}

fn eval_template_expr(template: &TemplateExpr, scope: &Scope, diags: &mut Diagnostics) -> Value {
    let template = match Template::from_expr(template) {
        Ok(template) => template,
        Err(err) => {
            diags.push(Diagnostic::error(
                "Invalid template",
                format!("Failed to parse string template: {}.", err),
            ));
            return Value::Unknown(ValueType::String);
        }
    };

    let mut out = String::new();
    let mut unknown = false;
    for element in template.elements() {
        match element {
            Element::Literal(lit) => out.push_str(lit),
            Element::Interpolation(interp) => {
                let val = eval(&interp.expr, scope, diags);
                if !val.is_known() {
                    unknown = true;
                    continue;
                }
                if val.is_null() {
                    diags.push(
                        Diagnostic::error(
                            "Invalid template interpolation value",
                            "The expression result is null, so it cannot be included in a string.",
                        )
                        .with_expr(&interp.expr),
                    );
                    unknown = true;
                    continue;
                }
                match val.convert(&ValueType::String) {
                    Ok(Value::String(s)) => out.push_str(&s),
                    _ => {
                        diags.push(
                            Diagnostic::error(
                                "Invalid template interpolation value",
                                "The expression result cannot be included in a string.",
                            )
                            .with_expr(&interp.expr),
                        );
                        unknown = true;
                    }
                }
            }
            Element::Directive(_) => {
                diags.push(Diagnostic::error(
                    "Template directives not supported",
                    "Template directives cannot be used in this context.",
                ));
                return Value::Unknown(ValueType::String);
            }
        }
    }

    if unknown {
        Value::Unknown(ValueType::String)
    } else {
        Value::String(out)
    }
}

fn apply_traversal_operator(
    value: Value,
    operator: &TraversalOperator,
    scope: &Scope,
    diags: &mut Diagnostics,
) -> Value {
    match operator {
        TraversalOperator::GetAttr(name) => apply_get_attr(value, name.as_str(), diags),
        TraversalOperator::Index(key_expr) => {
            let key = eval(key_expr, scope, diags);
            apply_index(value, key, diags)
        }
        TraversalOperator::LegacyIndex(index) => {
            apply_index(value, Value::from(*index as i64), diags)
        }
        TraversalOperator::AttrSplat | TraversalOperator::FullSplat => {
            diags.push(Diagnostic::error(
                "Splat expression not supported",
                "This value does not support splat expressions.",
            ));
            Value::unknown()
        }
    }
}

fn apply_get_attr(value: Value, name: &str, diags: &mut Diagnostics) -> Value {
    match value {
        Value::Object(fields) => match fields.get(name) {
            Some(field) => field.clone(),
            None => {
                diags.push(Diagnostic::error(
                    "Unsupported attribute",
                    format!("This object does not have an attribute named {:?}.", name),
                ));
                Value::unknown()
            }
        },
        Value::Unknown(ValueType::Any) => Value::unknown(),
        Value::Unknown(ValueType::Object(field_types)) => match field_types.get(name) {
            Some(field_type) => Value::Unknown(field_type.clone()),
            None => {
                diags.push(Diagnostic::error(
                    "Unsupported attribute",
                    format!("This object does not have an attribute named {:?}.", name),
                ));
                Value::unknown()
            }
        },
        Value::Null(_) => {
            diags.push(Diagnostic::error(
                "Unsupported attribute",
                format!("Cannot get attribute {:?} from a null value.", name),
            ));
            Value::unknown()
        }
        _ => {
            diags.push(Diagnostic::error(
                "Unsupported attribute",
                "This value does not have any attributes.",
            ));
            Value::unknown()
        }
    }
}

fn apply_index(value: Value, key: Value, diags: &mut Diagnostics) -> Value {
    if !key.is_known() {
        return Value::Unknown(value.ty().element_type());
    }

    match value {
        Value::List(elems) => {
            let index = match key.convert(&ValueType::Number) {
                Ok(Value::Number(n)) => n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0),
                _ => None,
            };
            let Some(index) = index else {
                diags.push(Diagnostic::error(
                    "Invalid index",
                    "A list can only be indexed with a non-negative whole number.",
                ));
                return Value::unknown();
            };
            match elems.get(index as usize) {
                Some(element) => element.clone(),
                None => {
                    diags.push(Diagnostic::error(
                        "Invalid index",
                        "The given index is out of range for this list.",
                    ));
                    Value::unknown()
                }
            }
        }
        Value::Object(fields) => {
            let key = match key.convert(&ValueType::String) {
                Ok(Value::String(s)) => s,
                _ => {
                    diags.push(Diagnostic::error(
                        "Invalid index",
                        "An object can only be indexed with a string key.",
                    ));
                    return Value::unknown();
                }
            };
            match fields.get(&key) {
                Some(field) => field.clone(),
                None => {
                    diags.push(Diagnostic::error(
                        "Invalid index",
                        format!("This object does not have an attribute named {:?}.", key),
                    ));
                    Value::unknown()
                }
            }
        }
        Value::Unknown(ty) => Value::Unknown(ty.element_type()),
        Value::Null(_) => {
            diags.push(Diagnostic::error(
                "Invalid index",
                "Cannot index a null value.",
            ));
            Value::unknown()
        }
        _ => {
            diags.push(Diagnostic::error(
                "Invalid index",
                "Only lists and objects can be indexed.",
            ));
            Value::unknown()
        }
    }
}

enum BoolVal {
    Known(bool),
    Unknown,
}

fn bool_operand(
    val: Value,
    what: &str,
    expr: &Expression,
    diags: &mut Diagnostics,
) -> Option<BoolVal> {
    if !val.is_known() {
        return Some(BoolVal::Unknown);
    }
    if val.is_null() {
        diags.push(
            Diagnostic::error(
                "Invalid operand",
                format!("The {} must not be null.", what),
            )
            .with_expr(expr),
        );
        return None;
    }
    match val.convert(&ValueType::Bool) {
        Ok(Value::Bool(b)) => Some(BoolVal::Known(b)),
        _ => {
            diags.push(
                Diagnostic::error(
                    "Invalid operand",
                    format!("The {} must be of bool type.", what),
                )
                .with_expr(expr),
            );
            None
        }
    }
}

enum NumVal {
    Known(hcl::Number),
    Unknown,
}

fn number_operand(val: Value, expr: &Expression, diags: &mut Diagnostics) -> Option<NumVal> {
    if !val.is_known() {
        return Some(NumVal::Unknown);
    }
    if val.is_null() {
        diags.push(
            Diagnostic::error("Invalid operand", "The operand must not be null.").with_expr(expr),
        );
        return None;
    }
    match val.convert(&ValueType::Number) {
        Ok(Value::Number(n)) => Some(NumVal::Known(n)),
        _ => {
            diags.push(
                Diagnostic::error("Invalid operand", "The operand must be of number type.")
                    .with_expr(expr),
            );
            None
        }
    }
}

fn eval_unary(
    operator: UnaryOperator,
    val: Value,
    expr: &Expression,
    diags: &mut Diagnostics,
) -> Value {
    match operator {
        UnaryOperator::Not => match bool_operand(val, "operand of !", expr, diags) {
            Some(BoolVal::Known(b)) => Value::Bool(!b),
            _ => Value::Unknown(ValueType::Bool),
        },
        UnaryOperator::Neg => match number_operand(val, expr, diags) {
            Some(NumVal::Known(n)) => {
                if let Some(i) = n.as_i64() {
                    if let Some(negated) = i.checked_neg() {
                        return Value::from(negated);
                    }
                }
                match n.as_f64().and_then(|f| hcl::Number::from_f64(-f)) {
                    Some(negated) => Value::Number(negated),
                    None => Value::Unknown(ValueType::Number),
                }
            }
            _ => Value::Unknown(ValueType::Number),
        },
    }
}

fn eval_binary(
    operator: BinaryOperator,
    lhs: Value,
    rhs: Value,
    expr: &Expression,
    diags: &mut Diagnostics,
) -> Value {
    use BinaryOperator::*;

    match operator {
        Eq | NotEq => {
            if !lhs.is_known() || !rhs.is_known() {
                return Value::Unknown(ValueType::Bool);
            }
            let equal = if lhs.is_null() || rhs.is_null() {
                lhs.is_null() && rhs.is_null()
            } else {
                lhs == rhs
            };
            Value::Bool(if operator == Eq { equal } else { !equal })
        }

        And | Or => {
            let l = bool_operand(lhs, "operand of a logical operator", expr, diags);
            let r = bool_operand(rhs, "operand of a logical operator", expr, diags);
            let (Some(l), Some(r)) = (l, r) else {
                return Value::Unknown(ValueType::Bool);
            };
            match (operator, l, r) {
                // A known-decisive operand decides even when the other side
                // is unknown.
                (And, BoolVal::Known(false), _) | (And, _, BoolVal::Known(false)) => {
                    Value::Bool(false)
                }
                (Or, BoolVal::Known(true), _) | (Or, _, BoolVal::Known(true)) => Value::Bool(true),
                (_, BoolVal::Known(a), BoolVal::Known(b)) => Value::Bool(match operator {
                    And => a && b,
                    _ => a || b,
                }),
                _ => Value::Unknown(ValueType::Bool),
            }
        }

        Less | LessEq | Greater | GreaterEq => {
            let l = number_operand(lhs, expr, diags);
            let r = number_operand(rhs, expr, diags);
            match (l, r) {
                (Some(NumVal::Known(a)), Some(NumVal::Known(b))) => {
                    let a = a.as_f64().unwrap_or(f64::NAN);
                    let b = b.as_f64().unwrap_or(f64::NAN);
                    Value::Bool(match operator {
                        Less => a < b,
                        LessEq => a <= b,
                        Greater => a > b,
                        _ => a >= b,
                    })
                }
                (Some(_), Some(_)) => Value::Unknown(ValueType::Bool),
                _ => Value::Unknown(ValueType::Bool),
            }
        }

        Plus | Minus | Mul | Div | Mod => {
            let l = number_operand(lhs, expr, diags);
            let r = number_operand(rhs, expr, diags);
            match (l, r) {
                (Some(NumVal::Known(a)), Some(NumVal::Known(b))) => {
                    arithmetic(operator, a, b, expr, diags)
                }
                (Some(_), Some(_)) => Value::Unknown(ValueType::Number),
                _ => Value::Unknown(ValueType::Number),
            }
        }
    }
}

fn arithmetic(
    operator: BinaryOperator,
    a: hcl::Number,
    b: hcl::Number,
    expr: &Expression,
    diags: &mut Diagnostics,
) -> Value {
    use BinaryOperator::*;

    // Integer arithmetic stays integral where it can; division and overflow
    // fall through to floating point.
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        let int_result = match operator {
            Plus => a.checked_add(b),
            Minus => a.checked_sub(b),
            Mul => a.checked_mul(b),
            _ => None,
        };
        if let Some(result) = int_result {
            return Value::from(result);
        }
    }

    let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) else {
        return Value::Unknown(ValueType::Number);
    };
    if matches!(operator, Div | Mod) && b == 0.0 {
        diags.push(
            Diagnostic::error("Invalid operand", "Cannot divide by zero.").with_expr(expr),
        );
        return Value::Unknown(ValueType::Number);
    }
    let result = match operator {
        Plus => a + b,
        Minus => a - b,
        Mul => a * b,
        Div => a / b,
        _ => a % b,
    };
    match hcl::Number::from_f64(result) {
        Some(n) => Value::Number(n),
        None => {
            diags.push(
                Diagnostic::error("Invalid operand", "The arithmetic result is not a number.")
                    .with_expr(expr),
            );
            Value::Unknown(ValueType::Number)
        }
    }
}

fn eval_for_expr(
    for_expr: &hcl::expr::ForExpr,
    scope: &Scope,
    diags: &mut Diagnostics,
) -> Value {
    let collection = eval(&for_expr.collection_expr, scope, diags);
    if !collection.is_known() {
        return Value::unknown();
    }

    let entries: Vec<(Value, Value)> = match collection {
        Value::List(elems) => elems
            .into_iter()
            .enumerate()
            .map(|(i, v)| (Value::from(i as i64), v))
            .collect(),
        Value::Object(fields) => fields
            .into_iter()
            .map(|(k, v)| (Value::String(k), v))
            .collect(),
        other => {
            diags.push(
                Diagnostic::error(
                    "Invalid for expression",
                    format!(
                        "The for expression collection must be a list or object, not {}.",
                        other.ty()
                    ),
                )
                .with_expr(&for_expr.collection_expr),
            );
            return Value::unknown();
        }
    };

    let mut list_out = Vec::new();
    let mut object_out: IndexMap<String, Value> = IndexMap::new();

    for (key, value) in entries {
        let mut iter_scope = scope.clone();
        iter_scope.declare(for_expr.value_var.as_str(), value);
        if let Some(key_var) = &for_expr.key_var {
            iter_scope.declare(key_var.as_str(), key);
        }

        if let Some(cond_expr) = &for_expr.cond_expr {
            let cond = eval(cond_expr, &iter_scope, diags);
            match bool_operand(cond, "for expression condition", cond_expr, diags) {
                Some(BoolVal::Known(true)) => {}
                Some(BoolVal::Known(false)) => continue,
                // An unknown filter makes the whole collection unknowable.
                Some(BoolVal::Unknown) => return Value::unknown(),
                None => return Value::unknown(),
            }
        }

        let element = eval(&for_expr.value_expr, &iter_scope, diags);

        if let Some(key_expr) = &for_expr.key_expr {
            let key_val = eval(key_expr, &iter_scope, diags);
            if !key_val.is_known() {
                return Value::unknown();
            }
            let key_str = match key_val.convert(&ValueType::String) {
                Ok(Value::String(s)) => s,
                _ => {
                    diags.push(
                        Diagnostic::error(
                            "Invalid for expression",
                            "The for expression key must be a string or number.",
                        )
                        .with_expr(key_expr),
                    );
                    return Value::unknown();
                }
            };
            if for_expr.grouping {
                match object_out.entry(key_str).or_insert_with(|| Value::List(Vec::new())) {
                    Value::List(group) => group.push(element),
                    _ => unreachable!("grouped entries are always lists"),
                }
            } else {
                object_out.insert(key_str, element);
            }
        } else {
            list_out.push(element);
        }
    }

    if for_expr.key_expr.is_some() {
        Value::Object(object_out)
    } else {
        Value::List(list_out)
    }
}

/// Collects every scope traversal in the expression, including bare variable
/// references (represented as traversals with no operators).
pub(crate) fn collect_traversals(expr: &Expression, out: &mut Vec<Traversal>) {
    match expr {
        Expression::Variable(var) => out.push(Traversal::new(
            Expression::Variable(var.clone()),
            Vec::<TraversalOperator>::new(),
        )),
        Expression::Traversal(traversal) => {
            if matches!(traversal.expr, Expression::Variable(_)) {
                out.push((**traversal).clone());
            } else {
                collect_traversals(&traversal.expr, out);
            }
            for operator in &traversal.operators {
                if let TraversalOperator::Index(key_expr) = operator {
                    collect_traversals(key_expr, out);
                }
            }
        }
        Expression::Array(elems) => {
            for element in elems {
                collect_traversals(element, out);
            }
        }
        Expression::Object(fields) => {
            for (key, value) in fields {
                if let ObjectKey::Expression(key_expr) = key {
                    collect_traversals(key_expr, out);
                }
                collect_traversals(value, out);
            }
        }
        Expression::TemplateExpr(template) => {
            if let Ok(template) = Template::from_expr(template) {
                collect_in_template(&template, out);
            }
        }
        Expression::Parenthesis(inner) => collect_traversals(inner, out),
        Expression::Conditional(cond) => {
            collect_traversals(&cond.cond_expr, out);
            collect_traversals(&cond.true_expr, out);
            collect_traversals(&cond.false_expr, out);
        }
        Expression::Operation(operation) => match operation.as_ref() {
            hcl::expr::Operation::Unary(op) => collect_traversals(&op.expr, out),
            hcl::expr::Operation::Binary(op) => {
                collect_traversals(&op.lhs_expr, out);
                collect_traversals(&op.rhs_expr, out);
            }
        },
        Expression::ForExpr(for_expr) => {
            collect_traversals(&for_expr.collection_expr, out);
            if let Some(key_expr) = &for_expr.key_expr {
                collect_traversals(key_expr, out);
            }
            collect_traversals(&for_expr.value_expr, out);
            if let Some(cond_expr) = &for_expr.cond_expr {
                collect_traversals(cond_expr, out);
            }
        }
        Expression::FuncCall(call) => {
            for arg in &call.args {
                collect_traversals(arg, out);
            }
        }
        _ => {}
    }
}

fn collect_in_template(template: &Template, out: &mut Vec<Traversal>) {
    use hcl::template::Directive;

    for element in template.elements() {
        match element {
            Element::Literal(_) => {}
            Element::Interpolation(interp) => collect_traversals(&interp.expr, out),
            Element::Directive(directive) => match directive {
                Directive::If(if_dir) => {
                    collect_traversals(&if_dir.cond_expr, out);
                    collect_in_template(&if_dir.true_template, out);
                    if let Some(false_template) = &if_dir.false_template {
                        collect_in_template(false_template, out);
                    }
                }
                Directive::For(for_dir) => {
                    collect_traversals(&for_dir.collection_expr, out);
                    collect_in_template(&for_dir.template, out);
                }
            },
        }
    }
}

/// The root variable name of a scope traversal, when its base is a bare
/// variable.
pub(crate) fn traversal_root(traversal: &Traversal) -> Option<&str> {
    match &traversal.expr {
        Expression::Variable(var) => Some(var.as_str()),
        _ => None,
    }
}

/// The attribute name at the given operator position, when that operator is
/// an attribute access.
pub(crate) fn traversal_attr_name(traversal: &Traversal, index: usize) -> Option<&str> {
    match traversal.operators.get(index) {
        Some(TraversalOperator::GetAttr(name)) => Some(name.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_expr(src: &str) -> Expression {
        let body: hcl::Body = hcl::from_str(&format!("x = {}", src)).unwrap();
        body.attributes().next().unwrap().expr().clone()
    }

    fn eval_src(src: &str, scope: &Scope) -> (Value, Diagnostics) {
        eval_expr(&parse_expr(src), scope)
    }

    #[test]
    fn evaluates_literals_and_collections() {
        let scope = Scope::new();
        let (val, diags) = eval_src(r#"{ a = 1, b = [true, "x"] }"#, &scope);
        assert!(diags.is_empty());
        match val {
            Value::Object(fields) => {
                assert_eq!(fields["a"], Value::from(1i64));
                assert_eq!(
                    fields["b"],
                    Value::List(vec![Value::from(true), Value::from("x")])
                );
            }
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn evaluates_conditional_expression() {
        let scope = Scope::new();
        let (val, diags) = eval_src("true ? 1 : 0", &scope);
        assert!(diags.is_empty());
        assert_eq!(val, Value::from(1i64));
    }

    #[test]
    fn evaluates_for_expression() {
        let scope = Scope::new();
        let (val, diags) = eval_src("[for x in [1, 2, 3] : x * 2]", &scope);
        assert!(diags.is_empty());
        assert_eq!(val, Value::from(vec![2i64, 4, 6]));
    }

    #[test]
    fn evaluates_template_interpolation() {
        let mut scope = Scope::new();
        scope.declare("name", Value::from("world"));
        let (val, diags) = eval_src(r#""hello ${name}""#, &scope);
        assert!(diags.is_empty());
        assert_eq!(val, Value::from("hello world"));
    }

    #[test]
    fn unknown_propagates_through_operations() {
        let mut scope = Scope::new();
        scope.declare("later", Value::Unknown(ValueType::Number));
        let (val, diags) = eval_src("later + 1", &scope);
        assert!(diags.is_empty());
        assert_eq!(val, Value::Unknown(ValueType::Number));

        let (val, _) = eval_src(r#""prefix-${later}""#, &scope);
        assert_eq!(val, Value::Unknown(ValueType::String));
    }

    #[test]
    fn attribute_access_on_fully_unknown_value_stays_silent() {
        let mut scope = Scope::new();
        scope.declare("mystery", Value::unknown());
        let (val, diags) = eval_src("mystery.anything.at.all", &scope);
        assert!(diags.is_empty());
        assert_eq!(val, Value::unknown());
    }

    #[test]
    fn missing_scope_name_is_an_error() {
        let scope = Scope::new();
        let (val, diags) = eval_src("Nope.thing", &scope);
        assert!(diags.has_errors());
        assert_eq!(val, Value::unknown());
    }

    #[test]
    fn function_calls_are_rejected() {
        let scope = Scope::new();
        let (_, diags) = eval_src(r#"upper("x")"#, &scope);
        assert!(diags.has_errors());
    }

    #[test]
    fn short_circuit_with_unknown_operand() {
        let mut scope = Scope::new();
        scope.declare("unknown", Value::Unknown(ValueType::Bool));
        let (val, _) = eval_src("false && unknown", &scope);
        assert_eq!(val, Value::Bool(false));
        let (val, _) = eval_src("true || unknown", &scope);
        assert_eq!(val, Value::Bool(true));
        let (val, _) = eval_src("true && unknown", &scope);
        assert_eq!(val, Value::Unknown(ValueType::Bool));
    }

    #[test]
    fn collects_traversals_everywhere() {
        let expr = parse_expr(r#"[Const.a, "x${Resource.B.Arn}", list[Param.i]]"#);
        let mut out = Vec::new();
        collect_traversals(&expr, &mut out);
        let roots: Vec<&str> = out.iter().filter_map(traversal_root).collect();
        assert_eq!(roots, vec!["Const", "Resource", "list", "Param"]);
    }
}
