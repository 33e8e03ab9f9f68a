//! Parsing of `.awsup` source files into the configuration model.
//!
//! The parser owns an append-only cache of decoded files so that a module
//! referenced from several places is read and decoded once. All file I/O
//! happens inside these functions; everything downstream works on the
//! decoded model.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::config::{
    Attr, Constant, CreationPolicy, CreationPolicyAutoScaling, CreationPolicySignal, File, Module,
    ModuleCall, Output, OutputExport, Parameter, Resource, UpdatePolicy, UpdatePolicyAutoScaling,
};
use crate::diag::{Diagnostic, Diagnostics, Subject};

#[derive(Debug, Default)]
pub struct Parser {
    files: HashMap<PathBuf, File>,
}

impl Parser {
    pub fn new() -> Self {
        Parser::default()
    }

    /// Parses a single source file, returning the cached result when the
    /// file has been parsed before. Diagnostics for a file are reported only
    /// on its first parse.
    pub fn parse_file(&mut self, path: &Path) -> (File, Diagnostics) {
        if let Some(file) = self.files.get(path) {
            return (file.clone(), Diagnostics::new());
        }

        let src = match std::fs::read_to_string(path) {
            Ok(src) => src,
            Err(err) => {
                let diags = Diagnostics::from(Diagnostic::error(
                    "Failed to read configuration file",
                    format!("There was an error reading {}: {}.", path.display(), err),
                ));
                return (
                    File {
                        source_path: path.to_path_buf(),
                        ..File::default()
                    },
                    diags,
                );
            }
        };

        let (file, diags) = parse_file_source(&src, path);
        self.files.insert(path.to_path_buf(), file.clone());
        (file, diags)
    }

    /// Parses every `.awsup` file in a directory into one module. Files whose
    /// names begin with `.` or look like editor temporary files (`#...#`) are
    /// skipped. Files fold in name order so results do not depend on the
    /// order the filesystem happens to list entries in.
    pub fn parse_dir(&mut self, path: &Path) -> (Module, Diagnostics) {
        let mut diags = Diagnostics::new();

        let entries = match std::fs::read_dir(path) {
            Ok(entries) => entries,
            Err(err) => {
                diags.push(Diagnostic::error(
                    "Failed to read configuration",
                    format!("There was an error reading {}: {}.", path.display(), err),
                ));
                return (Module::default(), diags);
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| {
                name.ends_with(".awsup")
                    && !name.starts_with('.')
                    && !(name.starts_with('#') && name.ends_with('#'))
            })
            .collect();
        names.sort();

        let mut files = Vec::new();
        for name in names {
            let (file, file_diags) = self.parse_file(&path.join(name));
            diags.append(file_diags);
            files.push(file);
        }

        let (module, module_diags) = new_module(Some(path.to_path_buf()), files);
        diags.append(module_diags);
        (module, diags)
    }

    /// Parses either a directory of `.awsup` files or a single file into a
    /// module.
    pub fn parse_dir_or_file(&mut self, path: &Path) -> (Module, Diagnostics) {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => {
                let (file, mut diags) = self.parse_file(path);
                let source_dir = path.parent().map(Path::to_path_buf);
                let (module, module_diags) = new_module(source_dir, vec![file]);
                diags.append(module_diags);
                (module, diags)
            }
            _ => self.parse_dir(path),
        }
    }
}

/// Parses and decodes a single file from in-memory source. The resulting
/// file carries the given path for diagnostics only.
pub fn parse_file_source(src: &str, path: impl Into<PathBuf>) -> (File, Diagnostics) {
    let path = path.into();
    let mut file = File {
        source_path: path.clone(),
        ..File::default()
    };
    let mut diags = Diagnostics::new();

    let body = match hcl::parse(src) {
        Ok(body) => body,
        Err(err) => {
            diags.push(
                Diagnostic::error(
                    "Failed to parse configuration file",
                    format!("There was an error parsing {}: {}.", path.display(), err),
                )
                .with_file(&path),
            );
            return (file, diags);
        }
    };

    for structure in body.iter() {
        match structure {
            hcl::Structure::Attribute(attr) => {
                if attr.key() != "Description" {
                    diags.push(
                        Diagnostic::error(
                            "Unsupported attribute",
                            format!(
                                "An attribute named {:?} is not expected here. Only \"Description\" may be set at the top level of a file.",
                                attr.key()
                            ),
                        )
                        .with_subject(Subject::in_file(&path, attr.key())),
                    );
                    continue;
                }
                file.description = Some(Attr {
                    name: attr.key().to_string(),
                    expr: attr.expr().clone(),
                    file: path.clone(),
                });
            }
            hcl::Structure::Block(block) => decode_block(block, &path, &mut file, &mut diags),
        }
    }

    (file, diags)
}

fn decode_block(block: &hcl::Block, path: &Path, file: &mut File, diags: &mut Diagnostics) {
    match block.identifier() {
        "Conditions" => file
            .conditions
            .extend(body_attrs(block.body(), path, diags)),
        "Locals" => file.locals.extend(body_attrs(block.body(), path, diags)),
        "Mappings" => file.mappings.extend(body_attrs(block.body(), path, diags)),
        "Metadata" => file.metadata.extend(body_attrs(block.body(), path, diags)),
        "Constant" => {
            if let Some(constant) = decode_constant(block, path, diags) {
                file.constants.push(constant);
            }
        }
        "Module" => {
            if let Some(call) = decode_module_call(block, path, diags) {
                file.modules.push(call);
            }
        }
        "Output" => {
            if let Some(output) = decode_output(block, path, diags) {
                file.outputs.push(output);
            }
        }
        "Parameter" => {
            if let Some(parameter) = decode_parameter(block, path, diags) {
                file.parameters.push(parameter);
            }
        }
        "Resource" => {
            if let Some(resource) = decode_resource(block, path, diags) {
                file.resources.push(resource);
            }
        }
        "UserInterface" => {
            diags.push(
                Diagnostic::warning(
                    "UserInterface block is not yet supported",
                    "This block is ignored by this version of awsup.",
                )
                .with_subject(Subject::in_file(path, "UserInterface")),
            );
        }
        other => {
            diags.push(
                Diagnostic::error(
                    "Unsupported block type",
                    format!("Blocks of type {:?} are not expected here.", other),
                )
                .with_subject(Subject::in_file(path, other)),
            );
        }
    }
}

/// Folds a set of parsed files into a module, collision-checking every named
/// declaration. The first definition of a name wins; later ones produce
/// errors. Duplicate files produce a warning only.
pub fn new_module(source_dir: Option<PathBuf>, files: Vec<File>) -> (Module, Diagnostics) {
    let mut module = Module {
        source_dir,
        ..Module::default()
    };
    let mut diags = Diagnostics::new();

    for file in files {
        if module.files.contains(&file.source_path) {
            diags.push(Diagnostic::warning(
                "Duplicate file in module",
                format!(
                    "Ignored duplicate definition for file {} while building module.",
                    file.source_path.display()
                ),
            ));
            continue;
        }
        module.files.push(file.source_path.clone());

        if let Some(description) = file.description {
            if module.description.is_some() {
                diags.push(
                    Diagnostic::error(
                        "Duplicate module description",
                        "Only one file of a module may set the \"Description\" attribute.",
                    )
                    .with_file(&description.file),
                );
            } else {
                module.description = Some(description);
            }
        }

        for def in file.conditions {
            insert_unique(&mut module.conditions, def.name.clone(), def, "condition", &mut diags);
        }
        for def in file.constants {
            insert_unique(&mut module.constants, def.name.clone(), def, "constant", &mut diags);
        }
        for def in file.locals {
            insert_unique(&mut module.locals, def.name.clone(), def, "local", &mut diags);
        }
        for def in file.mappings {
            insert_unique(&mut module.mappings, def.name.clone(), def, "mapping", &mut diags);
        }
        for def in file.metadata {
            insert_unique(&mut module.metadata, def.name.clone(), def, "metadata field", &mut diags);
        }
        for def in file.modules {
            insert_unique(&mut module.modules, def.name.clone(), def, "module", &mut diags);
        }
        for def in file.outputs {
            insert_unique(&mut module.outputs, def.name.clone(), def, "output", &mut diags);
        }
        for def in file.parameters {
            insert_unique(&mut module.parameters, def.name.clone(), def, "parameter", &mut diags);
        }
        for def in file.resources {
            insert_unique(
                &mut module.resources,
                def.logical_id.clone(),
                def,
                "resource",
                &mut diags,
            );
        }
    }

    (module, diags)
}

fn insert_unique<T>(
    map: &mut IndexMap<String, T>,
    name: String,
    def: T,
    what: &str,
    diags: &mut Diagnostics,
) {
    if map.contains_key(&name) {
        diags.push(Diagnostic::error(
            format!("Duplicate {}", what),
            format!(
                "Duplicate definition of {} {:?}; the first definition wins.",
                what, name
            ),
        ));
        return;
    }
    map.insert(name, def);
}

/// Collects the attributes of a body that permits only attributes, such as a
/// `Locals` or `Mappings` block.
fn body_attrs(body: &hcl::Body, path: &Path, diags: &mut Diagnostics) -> Vec<Attr> {
    for block in body.blocks() {
        diags.push(
            Diagnostic::error(
                "Unsupported block",
                format!(
                    "Blocks are not allowed here; found a {:?} block where only attributes are expected.",
                    block.identifier()
                ),
            )
            .with_subject(Subject::in_file(path, block.identifier())),
        );
    }
    body.attributes()
        .map(|attr| Attr {
            name: attr.key().to_string(),
            expr: attr.expr().clone(),
            file: path.to_path_buf(),
        })
        .collect()
}

/// Collects a body's attributes as a name-to-expression bag, used for the
/// `Parameters`, `Constants`, and `Metadata` sub-blocks.
fn attr_bag(body: &hcl::Body, path: &Path, diags: &mut Diagnostics) -> IndexMap<String, hcl::Expression> {
    body_attrs(body, path, diags)
        .into_iter()
        .map(|attr| (attr.name, attr.expr))
        .collect()
}

fn block_label(block: &hcl::Block, what: &str, path: &Path, diags: &mut Diagnostics) -> Option<String> {
    let labels = block.labels();
    if labels.len() != 1 {
        diags.push(
            Diagnostic::error(
                format!("Invalid {} declaration", what),
                format!("A {} block requires exactly one name label.", what),
            )
            .with_subject(Subject::in_file(path, block.identifier())),
        );
        return None;
    }
    Some(labels[0].as_str().to_string())
}

fn string_literal(
    expr: &hcl::Expression,
    what: &str,
    path: &Path,
    diags: &mut Diagnostics,
) -> Option<String> {
    match expr {
        hcl::Expression::String(s) => Some(s.clone()),
        _ => {
            diags.push(
                Diagnostic::error(
                    "Invalid attribute value",
                    format!("{} must be a quoted string literal.", what),
                )
                .with_subject(Subject::in_file(path, expr.to_string())),
            );
            None
        }
    }
}

fn unexpected_attr(attr: &hcl::Attribute, context: &str, path: &Path, diags: &mut Diagnostics) {
    diags.push(
        Diagnostic::error(
            "Unsupported attribute",
            format!(
                "An attribute named {:?} is not expected in a {} block.",
                attr.key(),
                context
            ),
        )
        .with_subject(Subject::in_file(path, attr.key())),
    );
}

fn unexpected_block(block: &hcl::Block, context: &str, path: &Path, diags: &mut Diagnostics) {
    diags.push(
        Diagnostic::error(
            "Unsupported block",
            format!(
                "A block of type {:?} is not expected in a {} block.",
                block.identifier(),
                context
            ),
        )
        .with_subject(Subject::in_file(path, block.identifier())),
    );
}

fn decode_constant(block: &hcl::Block, path: &Path, diags: &mut Diagnostics) -> Option<Constant> {
    let name = block_label(block, "Constant", path, diags)?;
    let mut constant = Constant {
        name,
        file: path.to_path_buf(),
        description: None,
        default: None,
    };
    for attr in block.body().attributes() {
        match attr.key() {
            "Description" => constant.description = Some(attr.expr().clone()),
            "Default" => constant.default = Some(attr.expr().clone()),
            _ => unexpected_attr(attr, "Constant", path, diags),
        }
    }
    for b in block.body().blocks() {
        unexpected_block(b, "Constant", path, diags);
    }
    Some(constant)
}

fn decode_module_call(block: &hcl::Block, path: &Path, diags: &mut Diagnostics) -> Option<ModuleCall> {
    let name = block_label(block, "Module", path, diags)?;
    let mut call = ModuleCall {
        name,
        file: path.to_path_buf(),
        source: None,
        parameters: IndexMap::new(),
        constants: IndexMap::new(),
        for_each: None,
    };
    for attr in block.body().attributes() {
        match attr.key() {
            "Source" => call.source = Some(attr.expr().clone()),
            "ForEach" => call.for_each = Some(attr.expr().clone()),
            _ => unexpected_attr(attr, "Module", path, diags),
        }
    }
    for b in block.body().blocks() {
        match b.identifier() {
            "Parameters" => call.parameters = attr_bag(b.body(), path, diags),
            "Constants" => call.constants = attr_bag(b.body(), path, diags),
            _ => unexpected_block(b, "Module", path, diags),
        }
    }
    Some(call)
}

fn decode_output(block: &hcl::Block, path: &Path, diags: &mut Diagnostics) -> Option<Output> {
    let name = block_label(block, "Output", path, diags)?;
    let mut output = Output {
        name,
        file: path.to_path_buf(),
        description: None,
        value: None,
        export: None,
    };
    for attr in block.body().attributes() {
        match attr.key() {
            "Description" => output.description = Some(attr.expr().clone()),
            "Value" => output.value = Some(attr.expr().clone()),
            _ => unexpected_attr(attr, "Output", path, diags),
        }
    }
    for b in block.body().blocks() {
        match b.identifier() {
            "Export" => {
                let mut export = OutputExport { name: None };
                for attr in b.body().attributes() {
                    match attr.key() {
                        "Name" => export.name = Some(attr.expr().clone()),
                        _ => unexpected_attr(attr, "Export", path, diags),
                    }
                }
                for inner in b.body().blocks() {
                    unexpected_block(inner, "Export", path, diags);
                }
                output.export = Some(export);
            }
            _ => unexpected_block(b, "Output", path, diags),
        }
    }
    if output.value.is_none() {
        diags.push(
            Diagnostic::error(
                "Missing required attribute",
                format!(
                    "The Output block {:?} requires a \"Value\" attribute.",
                    output.name
                ),
            )
            .with_file(path),
        );
    }
    Some(output)
}

fn decode_parameter(block: &hcl::Block, path: &Path, diags: &mut Diagnostics) -> Option<Parameter> {
    let name = block_label(block, "Parameter", path, diags)?;
    let mut parameter = Parameter {
        name,
        file: path.to_path_buf(),
        type_name: None,
        description: None,
        default: None,
        allowed_pattern: None,
        allowed_values: None,
        constraint_description: None,
        min_length: None,
        max_length: None,
        min_value: None,
        max_value: None,
        obscure: None,
    };
    for attr in block.body().attributes() {
        match attr.key() {
            "Type" => parameter.type_name = string_literal(attr.expr(), "Type", path, diags),
            "Description" => parameter.description = Some(attr.expr().clone()),
            "Default" => parameter.default = Some(attr.expr().clone()),
            "AllowedPattern" => parameter.allowed_pattern = Some(attr.expr().clone()),
            "AllowedValues" => parameter.allowed_values = Some(attr.expr().clone()),
            "ConstraintDescription" => {
                parameter.constraint_description = Some(attr.expr().clone())
            }
            "MinLength" => parameter.min_length = Some(attr.expr().clone()),
            "MaxLength" => parameter.max_length = Some(attr.expr().clone()),
            "MinValue" => parameter.min_value = Some(attr.expr().clone()),
            "MaxValue" => parameter.max_value = Some(attr.expr().clone()),
            "Obscure" => parameter.obscure = Some(attr.expr().clone()),
            _ => unexpected_attr(attr, "Parameter", path, diags),
        }
    }
    for b in block.body().blocks() {
        unexpected_block(b, "Parameter", path, diags);
    }
    if parameter.type_name.is_none() {
        diags.push(
            Diagnostic::error(
                "Missing required attribute",
                format!(
                    "The Parameter block {:?} requires a \"Type\" attribute.",
                    parameter.name
                ),
            )
            .with_file(path),
        );
    }
    Some(parameter)
}

fn decode_resource(block: &hcl::Block, path: &Path, diags: &mut Diagnostics) -> Option<Resource> {
    let logical_id = block_label(block, "Resource", path, diags)?;
    let mut resource = Resource {
        logical_id,
        file: path.to_path_buf(),
        type_name: None,
        properties: IndexMap::new(),
        metadata: IndexMap::new(),
        depends_on: Vec::new(),
        creation_policy: None,
        deletion_policy: None,
        update_policy: None,
        for_each: None,
    };
    for attr in block.body().attributes() {
        match attr.key() {
            "Type" => resource.type_name = string_literal(attr.expr(), "Type", path, diags),
            "DependsOn" => resource.depends_on = decode_depends_on(attr.expr(), path, diags),
            "DeletionPolicy" => resource.deletion_policy = Some(attr.expr().clone()),
            "ForEach" => resource.for_each = Some(attr.expr().clone()),
            _ => unexpected_attr(attr, "Resource", path, diags),
        }
    }
    for b in block.body().blocks() {
        match b.identifier() {
            "Parameters" => resource.properties = attr_bag(b.body(), path, diags),
            "Metadata" => resource.metadata = attr_bag(b.body(), path, diags),
            "CreationPolicy" => {
                resource.creation_policy = Some(decode_creation_policy(b, path, diags))
            }
            "UpdatePolicy" => resource.update_policy = Some(decode_update_policy(b, path, diags)),
            _ => unexpected_block(b, "Resource", path, diags),
        }
    }
    if resource.type_name.is_none() {
        diags.push(
            Diagnostic::error(
                "Missing required attribute",
                format!(
                    "The Resource block {:?} requires a \"Type\" attribute.",
                    resource.logical_id
                ),
            )
            .with_file(path),
        );
    }
    Some(resource)
}

fn decode_creation_policy(
    block: &hcl::Block,
    path: &Path,
    diags: &mut Diagnostics,
) -> CreationPolicy {
    let mut policy = CreationPolicy::default();
    for attr in block.body().attributes() {
        unexpected_attr(attr, "CreationPolicy", path, diags);
    }
    for b in block.body().blocks() {
        match b.identifier() {
            "AutoScaling" => {
                let mut auto_scaling = CreationPolicyAutoScaling::default();
                for attr in b.body().attributes() {
                    match attr.key() {
                        "MinSuccessfulInstancesPercent" => {
                            auto_scaling.min_successful_instances_percent =
                                Some(attr.expr().clone())
                        }
                        _ => unexpected_attr(attr, "AutoScaling", path, diags),
                    }
                }
                policy.auto_scaling = Some(auto_scaling);
            }
            "Signal" => {
                let mut signal = CreationPolicySignal::default();
                for attr in b.body().attributes() {
                    match attr.key() {
                        "Count" => signal.count = Some(attr.expr().clone()),
                        "Timeout" => signal.timeout = Some(attr.expr().clone()),
                        _ => unexpected_attr(attr, "Signal", path, diags),
                    }
                }
                policy.signal = Some(signal);
            }
            _ => unexpected_block(b, "CreationPolicy", path, diags),
        }
    }
    policy
}

fn decode_update_policy(block: &hcl::Block, path: &Path, diags: &mut Diagnostics) -> UpdatePolicy {
    let mut policy = UpdatePolicy::default();
    for attr in block.body().attributes() {
        unexpected_attr(attr, "UpdatePolicy", path, diags);
    }
    for b in block.body().blocks() {
        match b.identifier() {
            "AutoScaling" => {
                let mut auto_scaling = UpdatePolicyAutoScaling::default();
                for attr in b.body().attributes() {
                    match attr.key() {
                        "Replace" => auto_scaling.replace = Some(attr.expr().clone()),
                        _ => unexpected_attr(attr, "AutoScaling", path, diags),
                    }
                }
                policy.auto_scaling = Some(auto_scaling);
            }
            _ => unexpected_block(b, "UpdatePolicy", path, diags),
        }
    }
    policy
}

fn decode_depends_on(
    expr: &hcl::Expression,
    path: &Path,
    diags: &mut Diagnostics,
) -> Vec<hcl::Traversal> {
    fn traversal_of(expr: &hcl::Expression) -> Option<hcl::Traversal> {
        match expr {
            hcl::Expression::Traversal(t) => Some((**t).clone()),
            hcl::Expression::Variable(v) => Some(hcl::Traversal::new(
                hcl::Expression::Variable(v.clone()),
                Vec::<hcl::TraversalOperator>::new(),
            )),
            _ => None,
        }
    }

    let elements: Vec<&hcl::Expression> = match expr {
        hcl::Expression::Array(elems) => elems.iter().collect(),
        other => vec![other],
    };

    let mut ret = Vec::new();
    for element in elements {
        match traversal_of(element) {
            Some(traversal) => ret.push(traversal),
            None => diags.push(
                Diagnostic::error(
                    "Invalid DependsOn reference",
                    "DependsOn must be a resource reference or a list of resource references.",
                )
                .with_subject(Subject::in_file(path, element.to_string())),
            ),
        }
    }
    ret
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> File {
        let (file, diags) = parse_file_source(src, "test.awsup");
        assert!(!diags.has_errors(), "unexpected diagnostics: {:?}", diags);
        file
    }

    #[test]
    fn decodes_description_and_constant() {
        let file = parse_ok(
            r#"
Description = "hello"

Constant "Env" {
  Description = "deployment environment"
  Default     = "dev"
}
"#,
        );
        assert!(file.description.is_some());
        assert_eq!(file.constants.len(), 1);
        assert_eq!(file.constants[0].name, "Env");
        assert!(file.constants[0].default.is_some());
    }

    #[test]
    fn decodes_module_call_with_constants() {
        let file = parse_ok(
            r#"
Module "Network" {
  Source  = "./network"
  ForEach = ["a", "b"]

  Constants {
    Cidr = "10.0.0.0/16"
  }
}
"#,
        );
        let call = &file.modules[0];
        assert_eq!(call.name, "Network");
        assert!(call.source.is_some());
        assert!(call.for_each.is_some());
        assert!(call.constants.contains_key("Cidr"));
    }

    #[test]
    fn decodes_resource_block() {
        let file = parse_ok(
            r#"
Resource "Bucket" {
  Type = "AWS::S3::Bucket"

  Parameters {
    BucketName = "my-bucket"
  }

  Metadata {
    Comment = "hand-made"
  }

  DependsOn      = [Resource.Other]
  DeletionPolicy = "Retain"

  CreationPolicy {
    Signal {
      Count   = 2
      Timeout = "PT5M"
    }
  }
}
"#,
        );
        let resource = &file.resources[0];
        assert_eq!(resource.type_name.as_deref(), Some("AWS::S3::Bucket"));
        assert!(resource.properties.contains_key("BucketName"));
        assert!(resource.metadata.contains_key("Comment"));
        assert_eq!(resource.depends_on.len(), 1);
        assert!(resource.deletion_policy.is_some());
        let policy = resource.creation_policy.as_ref().unwrap();
        assert!(policy.signal.is_some());
        assert!(policy.auto_scaling.is_none());
    }

    #[test]
    fn missing_resource_type_is_an_error() {
        let (_, diags) = parse_file_source(r#"Resource "B" {}"#, "test.awsup");
        assert!(diags.has_errors());
    }

    #[test]
    fn user_interface_block_warns() {
        let (_, diags) = parse_file_source("UserInterface {}\n", "test.awsup");
        assert!(!diags.has_errors());
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn duplicate_declarations_error_and_first_wins() {
        let (file_a, _) = parse_file_source(r#"Constant "X" { Default = 1 }"#, "a.awsup");
        let (file_b, _) = parse_file_source(r#"Constant "X" { Default = 2 }"#, "b.awsup");
        let (module, diags) = new_module(None, vec![file_a, file_b]);
        assert!(diags.has_errors());
        let first = &module.constants["X"];
        assert_eq!(first.file, PathBuf::from("a.awsup"));
    }

    #[test]
    fn unknown_block_type_is_an_error() {
        let (_, diags) = parse_file_source("Widget \"x\" {}\n", "test.awsup");
        assert!(diags.has_errors());
    }
}
