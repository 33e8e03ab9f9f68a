//! Evaluation: the semantic middle end.
//!
//! This module owns the module instance tree ([`RootContext`],
//! [`ModuleContext`]), the dual-mode expression evaluator (constant
//! evaluation and dynamic lowering to [`DynExpr`]), the type checker, and
//! the flattening pass that reduces the whole tree to a [`FlatTemplate`].

mod build;
mod constant;
mod context;
mod context_load;
mod dynamic;
mod each;
mod expr;
mod flat;
mod op_tree;
mod type_check;

pub use constant::detect_variables;
pub use context::{ModuleContext, ModuleEach, RootContext};
pub use each::EachState;
pub use flat::{
    FlatCreationPolicy, FlatOutput, FlatParameter, FlatResource, FlatTemplate, FlatUpdatePolicy,
};
pub use op_tree::{DynExpr, LogicalOp};
pub use type_check::parameter_value_type;
