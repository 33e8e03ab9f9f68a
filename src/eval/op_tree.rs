//! The intermediate representation of dynamic expressions.
//!
//! [`DynExpr`] represents the subset of operations that can be encoded into
//! CloudFormation JSON for evaluation at stack-apply time. Instances are
//! produced by translating source expressions that have analogs in the
//! CloudFormation language; anything else must collapse to a constant first.
//!
//! The variant list is closed on purpose: both the lowerer and the JSON
//! emitter enumerate every case exhaustively.

use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum DynExpr {
    /// A value known at generation time. The name is a bit of a misnomer
    /// since a literal is not dynamic, but it allows dynamic expressions to
    /// embed constant fragments.
    Literal(Value),

    /// The name or ID returned by a reference to a parameter or resource,
    /// emitted as `{"Ref": id}`.
    Ref { logical_id: String },

    /// An attribute exported by a resource, emitted as `Fn::GetAtt`.
    GetAttr {
        logical_id: String,
        attrs: Vec<DynExpr>,
    },

    /// Joins several expressions together with a delimiter (`Fn::Join`).
    Join {
        delimiter: String,
        exprs: Vec<DynExpr>,
    },

    /// Splits a string by a delimiter to produce a list (`Fn::Split`).
    Split {
        delimiter: String,
        string: Box<DynExpr>,
    },

    /// Looks up a single item from a list by index (`Fn::Select`).
    ///
    /// The index may only be a `Literal`, `Ref`, or `MappingLookup`.
    Index {
        list: Box<DynExpr>,
        index: Box<DynExpr>,
    },

    /// Returns one of two values depending on a named condition defined in
    /// the template (`Fn::If`).
    If {
        condition_name: String,
        then_expr: Box<DynExpr>,
        else_expr: Box<DynExpr>,
    },

    /// Boolean equality, for use in named conditions (`Fn::Equals`).
    ///
    /// Both operands must be `Literal` or `Ref`.
    Equals { a: Box<DynExpr>, b: Box<DynExpr> },

    /// Boolean inverse (`Fn::Not`).
    Not(Box<DynExpr>),

    /// Logical AND/OR over boolean sub-expressions (`Fn::And`/`Fn::Or`).
    Logical {
        op: LogicalOp,
        values: Vec<DynExpr>,
    },

    /// Looks up a value from a named mapping table (`Fn::FindInMap`).
    ///
    /// The keys may only use `Literal`, `Ref`, and nested `MappingLookup`.
    MappingLookup {
        mapping_name: String,
        first_key: Box<DynExpr>,
        second_key: Box<DynExpr>,
    },

    /// Base64-encodes a string (`Fn::Base64`).
    Base64(Box<DynExpr>),

    /// The availability zones usable in the region where the template is
    /// being applied (`Fn::GetAZs`).
    AccountAZs { region: Box<DynExpr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl DynExpr {
    pub fn literal(value: impl Into<Value>) -> DynExpr {
        DynExpr::Literal(value.into())
    }

    pub fn null_literal() -> DynExpr {
        DynExpr::Literal(Value::null())
    }

    /// Whether this expression is acceptable in positions that
    /// CloudFormation restricts to literals and references, such as the
    /// operands of `Fn::Equals`.
    pub fn is_literal_or_ref(&self) -> bool {
        matches!(self, DynExpr::Literal(_) | DynExpr::Ref { .. })
    }
}
