//! `awsup` is a transpiler that generates AWS CloudFormation template JSON
//! from a modular, HCL-flavoured source language.
//!
//! A configuration is a tree of *modules*, each a directory of `.awsup` files
//! (or a single file). Modules declare constants, locals, parameters,
//! mappings, conditions, resources, outputs and calls to child modules, and
//! the whole tree is flattened into one CloudFormation template.
//!
//! The pipeline:
//!
//! 1. [`config`] parses source files into per-module declaration tables,
//!    leaving every expression unevaluated.
//! 2. [`eval`] instantiates the module tree ([`eval::RootContext`]), fanning
//!    out `ForEach` module calls and computing each instance's constant
//!    table, then flattens the tree into an [`eval::FlatTemplate`].
//!    Expressions are evaluated in one of two modes: *constant* evaluation
//!    accepts the full expression language but only compile-time-known
//!    scopes, while *dynamic* lowering accepts references to runtime
//!    constructs but only the operator subset that CloudFormation itself
//!    supports, producing an [`eval::DynExpr`] tree.
//! 3. [`cfnjson`] serializes the flat template as CloudFormation JSON.
//!
//! Everything that can fail on user input reports through [`diag::Diagnostics`]
//! rather than `Result`, so partial results remain available for analysis
//! tooling even when the configuration has errors.

pub mod addr;
pub mod cfnjson;
pub mod config;
pub mod diag;
pub mod eval;
pub mod schema;
pub mod value;
