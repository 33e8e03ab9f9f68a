//! Construction of the module instance tree: loading module sources,
//! fanning out `ForEach` module calls, and building per-instance constant
//! tables.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use path_absolutize::Absolutize;

use crate::addr::{EachIndex, EachType, ModulePath};
use crate::config;
use crate::diag::{Diagnostic, Diagnostics, Subject};
use crate::eval::context::{ModuleContext, ModuleEach};
use crate::eval::each::EachState;
use crate::eval::expr::{self, Scope};
use crate::value::{Value, ValueType};

/// A reference to the call site that instantiated a module. Absent for the
/// root module, which is instantiated from the command line.
pub(crate) struct Call<'a> {
    pub parent: &'a ModuleContext,
    pub subject: Subject,
}

pub(crate) fn new_module_context(
    parser: &mut config::Parser,
    src_path: &Path,
    path: ModulePath,
    each: EachState,
    input_constants: &IndexMap<String, hcl::Expression>,
    call: Option<Call<'_>>,
) -> (ModuleContext, Diagnostics) {
    load_module_context(
        parser,
        src_path,
        path,
        each,
        input_constants,
        call,
        &mut Vec::new(),
    )
}

pub(crate) fn module_context_from_config(
    parser: &mut config::Parser,
    config: config::Module,
    path: ModulePath,
    each: EachState,
    input_constants: &IndexMap<String, hcl::Expression>,
    call: Option<Call<'_>>,
) -> (ModuleContext, Diagnostics) {
    context_from_config(parser, config, path, each, input_constants, call, &mut Vec::new())
}

fn load_module_context(
    parser: &mut config::Parser,
    src_path: &Path,
    path: ModulePath,
    each: EachState,
    input_constants: &IndexMap<String, hcl::Expression>,
    call: Option<Call<'_>>,
    loading: &mut Vec<PathBuf>,
) -> (ModuleContext, Diagnostics) {
    let (config, mut diags) = parser.parse_dir_or_file(src_path);
    if diags.has_errors() {
        // A failed parse ends this branch of the tree, though the caller may
        // still poke around in the partial configuration if desired since it
        // can include valid portions.
        return (
            ModuleContext {
                path,
                each,
                config,
                constants: IndexMap::new(),
                children: IndexMap::new(),
            },
            diags,
        );
    }

    let (mctx, ctx_diags) =
        context_from_config(parser, config, path, each, input_constants, call, loading);
    diags.append(ctx_diags);
    (mctx, diags)
}

fn context_from_config(
    parser: &mut config::Parser,
    config: config::Module,
    path: ModulePath,
    each: EachState,
    input_constants: &IndexMap<String, hcl::Expression>,
    call: Option<Call<'_>>,
    loading: &mut Vec<PathBuf>,
) -> (ModuleContext, Diagnostics) {
    let (constants, mut diags) =
        build_constants_table(&config.constants, input_constants, call.as_ref(), &each);

    let mut mctx = ModuleContext {
        path,
        each,
        config,
        constants,
        children: IndexMap::new(),
    };

    let (children, child_diags) = load_children(parser, &mctx, loading);
    diags.append(child_diags);
    mctx.children = children;

    (mctx, diags)
}

fn load_children(
    parser: &mut config::Parser,
    mctx: &ModuleContext,
    loading: &mut Vec<PathBuf>,
) -> (IndexMap<String, ModuleEach>, Diagnostics) {
    let mut children = IndexMap::new();
    let mut diags = Diagnostics::new();

    for (name, mcfg) in &mctx.config.modules {
        // ForEach evaluates under the enclosing context's Each state, so a
        // nested ForEach sees (and may shadow) its parent's Each.
        let (for_each_val, val_diags) =
            mctx.eval_constant_opt(mcfg.for_each.as_ref(), &ValueType::Any, &mctx.each);
        let broken = val_diags.has_errors();
        diags.append(val_diags);
        if broken {
            // Can't process any further if ForEach doesn't evaluate.
            continue;
        }

        let subject = Subject::in_file(&mcfg.file, format!("Module {:?}", name));
        let Some(expansion) = classify_for_each(&for_each_val, &subject, &mut diags) else {
            continue;
        };

        let base_path = mctx.path.child(name);
        match expansion {
            ForEachExpansion::Single => {
                let mut eacher = ModuleEach::new(EachType::None);
                // A non-ForEach call leaves the caller's Each state in
                // effect inside the call's own attributes.
                let (child, child_diags) = child_module_context(
                    parser,
                    mctx,
                    base_path,
                    mcfg,
                    mctx.each.clone(),
                    loading,
                );
                diags.append(child_diags);
                if let Some(child) = child {
                    eacher.instances.insert(EachIndex::None, child);
                }
                children.insert(name.clone(), eacher);
            }
            ForEachExpansion::Keyed { each_type, entries } => {
                let mut eacher = ModuleEach::new(each_type);
                for (key, value) in entries {
                    let child_path = base_path.index(key.clone());
                    let child_each = EachState::new(key.clone(), value);
                    let (child, child_diags) = child_module_context(
                        parser,
                        mctx,
                        child_path,
                        mcfg,
                        child_each,
                        loading,
                    );
                    diags.append(child_diags);
                    let Some(child) = child else {
                        // The call was too broken to construct any context.
                        continue;
                    };
                    eacher.instances.insert(key, child);
                }
                children.insert(name.clone(), eacher);
            }
        }
    }

    (children, diags)
}

/// How a `ForEach` value fans a construct out. `Single` is the no-`ForEach`
/// case (a null value); keyed expansions carry the index type and the
/// ordered `(key, value)` entries.
pub(crate) enum ForEachExpansion {
    Single,
    Keyed {
        each_type: EachType,
        entries: Vec<(EachIndex, Value)>,
    },
}

/// Classifies an evaluated `ForEach` value. Lists fan out with zero-based
/// integer keys and objects with string keys; anything else (other than the
/// null that means "no ForEach") is an error.
pub(crate) fn classify_for_each(
    val: &Value,
    subject: &Subject,
    diags: &mut Diagnostics,
) -> Option<ForEachExpansion> {
    match val {
        Value::Null(_) => Some(ForEachExpansion::Single),
        Value::List(elems) => Some(ForEachExpansion::Keyed {
            each_type: EachType::Int,
            entries: elems
                .iter()
                .enumerate()
                .map(|(i, v)| (EachIndex::Int(i as i64), v.clone()))
                .collect(),
        }),
        Value::Object(fields) => Some(ForEachExpansion::Keyed {
            each_type: EachType::String,
            entries: fields
                .iter()
                .map(|(k, v)| (EachIndex::String(k.clone()), v.clone()))
                .collect(),
        }),
        other => {
            diags.push(
                Diagnostic::error(
                    "Incorrect value type",
                    format!(
                        "A {} value cannot be used as a ForEach iterator.",
                        other.ty()
                    ),
                )
                .with_subject(subject.clone()),
            );
            None
        }
    }
}

fn child_module_context(
    parser: &mut config::Parser,
    mctx: &ModuleContext,
    path: ModulePath,
    mcfg: &config::ModuleCall,
    each: EachState,
    loading: &mut Vec<PathBuf>,
) -> (Option<ModuleContext>, Diagnostics) {
    let mut diags = Diagnostics::new();

    let Some(base_path) = &mctx.config.source_dir else {
        // A missing source directory means the module came from a synthetic
        // source such as an in-memory buffer, which has nowhere to resolve
        // child references against.
        diags.push(
            Diagnostic::error(
                "Child modules not allowed",
                "The current module was not loaded from an on-disk path, so child module references cannot be resolved.",
            )
            .with_subject(Subject::in_file(&mcfg.file, format!("Module {:?}", mcfg.name))),
        );
        return (None, diags);
    };

    let (src_val, src_diags) =
        mctx.eval_constant_opt(mcfg.source.as_ref(), &ValueType::String, &each);
    let broken = src_diags.has_errors();
    diags.append(src_diags);
    if broken {
        // Can't proceed without a valid source.
        return (None, diags);
    }

    if src_val.is_null() {
        diags.push(
            Diagnostic::error(
                "Unspecified module source",
                "Child module declaration is missing the required attribute \"Source\".",
            )
            .with_subject(Subject::in_file(&mcfg.file, format!("Module {:?}", mcfg.name))),
        );
        return (None, diags);
    }

    let src = src_val.as_str().unwrap_or_default().to_string();
    if !(src.starts_with("./") || src.starts_with("../")) {
        diags.push(
            Diagnostic::error(
                "Invalid child module source path",
                "A child module source must be a relative path beginning with either \"./\" or \"../\".",
            )
            .with_subject(Subject::in_file(&mcfg.file, src)),
        );
        return (None, diags);
    }

    let src_path = base_path.join(&src);
    let src_path = match src_path.absolutize() {
        Ok(abs) => abs.into_owned(),
        Err(err) => {
            diags.push(Diagnostic::error(
                "Invalid child module source path",
                format!("Failed to resolve {}: {}.", src_path.display(), err),
            ));
            return (None, diags);
        }
    };

    if loading.contains(&src_path) {
        diags.push(
            Diagnostic::error(
                "Module source cycle",
                format!(
                    "The module source {} is already being loaded further up the module tree, so loading it again here would recurse forever.",
                    src_path.display()
                ),
            )
            .with_subject(Subject::in_file(&mcfg.file, format!("Module {:?}", mcfg.name))),
        );
        return (None, diags);
    }

    loading.push(src_path.clone());
    let call = Call {
        parent: mctx,
        subject: Subject::in_file(&mcfg.file, format!("Module {:?}", mcfg.name)),
    };
    let (child, child_diags) = load_module_context(
        parser,
        &src_path,
        path,
        each,
        &mcfg.constants,
        Some(call),
        loading,
    );
    loading.pop();
    diags.append(child_diags);
    (Some(child), diags)
}

fn build_constants_table(
    cfgs: &IndexMap<String, config::Constant>,
    input: &IndexMap<String, hcl::Expression>,
    call: Option<&Call<'_>>,
    each: &EachState,
) -> (IndexMap<String, Value>, Diagnostics) {
    let mut table = IndexMap::new();
    let mut diags = Diagnostics::new();

    for (name, cfg) in cfgs {
        let mut val = match input.get(name) {
            Some(expr) => match call {
                Some(call) => {
                    let (val, val_diags) =
                        call.parent.eval_constant(expr, &ValueType::Any, each);
                    diags.append(val_diags);
                    val
                }
                None => {
                    // Root constants come from values files given on the
                    // command line, which are evaluated with no scope at
                    // all.
                    let (val, val_diags) = expr::eval_expr(expr, &Scope::new());
                    diags.append(val_diags);
                    val
                }
            },
            None => {
                // Defaults evaluate with no scope; they are self-contained.
                let (val, val_diags) = match &cfg.default {
                    Some(default) => expr::eval_expr(default, &Scope::new()),
                    None => (Value::null(), Diagnostics::new()),
                };
                diags.append(val_diags);
                if val.is_null() {
                    match call {
                        // Root constants are expected to come from the CLI,
                        // so a different message is warranted.
                        None => diags.push(Diagnostic::error(
                            "Required root constant not set",
                            format!(
                                "The root module requires a value for its named constant {:?}. Set it in a file passed with the --constants argument.",
                                name
                            ),
                        )),
                        Some(call) => diags.push(
                            Diagnostic::error(
                                "Missing required constant for module",
                                format!(
                                    "This module requires a value for its named constant {:?}.",
                                    name
                                ),
                            )
                            .with_subject(call.subject.clone()),
                        ),
                    }
                }
                val
            }
        };

        // The table must never contain unknown values, even when an error
        // made evaluation come out unknown; a constant is always known.
        if !val.is_known() {
            val = Value::Null(val.ty());
        }
        table.insert(name.clone(), val);
    }

    // Detect extraneous constants in the input.
    for name in input.keys() {
        if !cfgs.contains_key(name) {
            match call {
                None => diags.push(Diagnostic::error(
                    "Unsupported root module constant",
                    format!("The root module does not expect a constant named {:?}.", name),
                )),
                Some(call) => diags.push(
                    Diagnostic::error(
                        "Unsupported module constant",
                        format!("This child module does not expect a constant named {:?}.", name),
                    )
                    .with_subject(call.subject.clone()),
                ),
            }
        }
    }

    (table, diags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_null_as_single() {
        let mut diags = Diagnostics::new();
        let subject = Subject::new("Module \"M\"");
        let expansion = classify_for_each(&Value::null(), &subject, &mut diags).unwrap();
        assert!(matches!(expansion, ForEachExpansion::Single));
        assert!(diags.is_empty());
    }

    #[test]
    fn classify_list_with_int_keys() {
        let mut diags = Diagnostics::new();
        let subject = Subject::new("Module \"M\"");
        let val = Value::from(vec!["a", "b"]);
        match classify_for_each(&val, &subject, &mut diags).unwrap() {
            ForEachExpansion::Keyed { each_type, entries } => {
                assert_eq!(each_type, EachType::Int);
                assert_eq!(entries[0], (EachIndex::Int(0), Value::from("a")));
                assert_eq!(entries[1], (EachIndex::Int(1), Value::from("b")));
            }
            _ => panic!("expected keyed expansion"),
        }
    }

    #[test]
    fn classify_empty_list_keeps_key_type() {
        let mut diags = Diagnostics::new();
        let subject = Subject::new("Module \"M\"");
        match classify_for_each(&Value::List(Vec::new()), &subject, &mut diags).unwrap() {
            ForEachExpansion::Keyed { each_type, entries } => {
                assert_eq!(each_type, EachType::Int);
                assert!(entries.is_empty());
            }
            _ => panic!("expected keyed expansion"),
        }
    }

    #[test]
    fn classify_scalar_is_an_error() {
        let mut diags = Diagnostics::new();
        let subject = Subject::new("Module \"M\"");
        assert!(classify_for_each(&Value::from(5i64), &subject, &mut diags).is_none());
        assert!(diags.has_errors());
    }
}
