//! The configuration model: per-file and per-module declaration tables as
//! produced by the parser. Every expression field holds an unevaluated
//! [`hcl::Expression`]; nothing here is resolved until the evaluation phase
//! builds a module tree.

mod parse;
mod values_file;

use std::path::PathBuf;

use indexmap::IndexMap;

pub use parse::{new_module, parse_file_source, Parser};
pub use values_file::parse_values_source;

/// A whole module: the declarations of every `.awsup` file in one source
/// directory, folded together with collision checking.
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// The directory the module was loaded from. `None` for modules built
    /// from in-memory sources, which therefore cannot have child modules.
    pub source_dir: Option<PathBuf>,
    /// Paths of the files that make up the module, in load order.
    pub files: Vec<PathBuf>,

    pub description: Option<Attr>,
    pub conditions: IndexMap<String, Attr>,
    pub constants: IndexMap<String, Constant>,
    pub locals: IndexMap<String, Attr>,
    pub mappings: IndexMap<String, Attr>,
    pub metadata: IndexMap<String, Attr>,
    pub modules: IndexMap<String, ModuleCall>,
    pub outputs: IndexMap<String, Output>,
    pub parameters: IndexMap<String, Parameter>,
    pub resources: IndexMap<String, Resource>,
}

/// One parsed source file, before folding into a [`Module`].
#[derive(Debug, Clone, Default)]
pub struct File {
    pub source_path: PathBuf,

    pub description: Option<Attr>,
    pub conditions: Vec<Attr>,
    pub constants: Vec<Constant>,
    pub locals: Vec<Attr>,
    pub mappings: Vec<Attr>,
    pub metadata: Vec<Attr>,
    pub modules: Vec<ModuleCall>,
    pub outputs: Vec<Output>,
    pub parameters: Vec<Parameter>,
    pub resources: Vec<Resource>,
}

/// A named attribute declaration together with the file it came from.
#[derive(Debug, Clone)]
pub struct Attr {
    pub name: String,
    pub expr: hcl::Expression,
    pub file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Constant {
    pub name: String,
    pub file: PathBuf,
    pub description: Option<hcl::Expression>,
    pub default: Option<hcl::Expression>,
}

#[derive(Debug, Clone)]
pub struct ModuleCall {
    pub name: String,
    pub file: PathBuf,
    pub source: Option<hcl::Expression>,
    pub parameters: IndexMap<String, hcl::Expression>,
    pub constants: IndexMap<String, hcl::Expression>,
    pub for_each: Option<hcl::Expression>,
}

#[derive(Debug, Clone)]
pub struct Output {
    pub name: String,
    pub file: PathBuf,
    pub description: Option<hcl::Expression>,
    pub value: Option<hcl::Expression>,
    pub export: Option<OutputExport>,
}

#[derive(Debug, Clone)]
pub struct OutputExport {
    pub name: Option<hcl::Expression>,
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub file: PathBuf,
    pub type_name: Option<String>,
    pub description: Option<hcl::Expression>,
    pub default: Option<hcl::Expression>,
    pub allowed_pattern: Option<hcl::Expression>,
    pub allowed_values: Option<hcl::Expression>,
    pub constraint_description: Option<hcl::Expression>,
    pub min_length: Option<hcl::Expression>,
    pub max_length: Option<hcl::Expression>,
    pub min_value: Option<hcl::Expression>,
    pub max_value: Option<hcl::Expression>,
    pub obscure: Option<hcl::Expression>,
}

#[derive(Debug, Clone)]
pub struct Resource {
    pub logical_id: String,
    pub file: PathBuf,
    pub type_name: Option<String>,
    pub properties: IndexMap<String, hcl::Expression>,
    pub metadata: IndexMap<String, hcl::Expression>,
    pub depends_on: Vec<hcl::Traversal>,
    pub creation_policy: Option<CreationPolicy>,
    pub deletion_policy: Option<hcl::Expression>,
    pub update_policy: Option<UpdatePolicy>,
    pub for_each: Option<hcl::Expression>,
}

#[derive(Debug, Clone, Default)]
pub struct CreationPolicy {
    pub auto_scaling: Option<CreationPolicyAutoScaling>,
    pub signal: Option<CreationPolicySignal>,
}

#[derive(Debug, Clone, Default)]
pub struct CreationPolicyAutoScaling {
    pub min_successful_instances_percent: Option<hcl::Expression>,
}

#[derive(Debug, Clone, Default)]
pub struct CreationPolicySignal {
    pub count: Option<hcl::Expression>,
    pub timeout: Option<hcl::Expression>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdatePolicy {
    pub auto_scaling: Option<UpdatePolicyAutoScaling>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdatePolicyAutoScaling {
    pub replace: Option<hcl::Expression>,
}
