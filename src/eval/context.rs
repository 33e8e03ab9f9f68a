//! The evaluated module instance tree.

use indexmap::IndexMap;

use crate::addr::{EachIndex, EachType, ModulePath};
use crate::config;
use crate::diag::Diagnostics;
use crate::eval::context_load;
use crate::eval::each::EachState;
use crate::value::Value;

/// The root of an evaluated module tree.
#[derive(Debug)]
pub struct RootContext {
    pub root: ModuleContext,
}

impl RootContext {
    /// Creates a `RootContext` by loading a module configuration from the
    /// given path (either a directory containing `.awsup` files or a single
    /// file) and then loading the tree of descendant modules referenced by
    /// the root, following `Source` values in `Module` blocks.
    ///
    /// If the returned diagnostics contain errors then the returned context
    /// may not be complete, but it is still returned to allow for cautious
    /// use by analysis use-cases such as text editor integrations.
    pub fn new(
        parser: &mut config::Parser,
        root_path: &std::path::Path,
        constants: &IndexMap<String, hcl::Expression>,
    ) -> (RootContext, Diagnostics) {
        let (root, diags) = context_load::new_module_context(
            parser,
            root_path,
            ModulePath::root(),
            EachState::none(),
            constants,
            None,
        );
        (RootContext { root }, diags)
    }

    /// Creates a root context from an already-folded configuration module,
    /// for callers that construct configuration in memory.
    pub fn from_module(
        parser: &mut config::Parser,
        module: config::Module,
        constants: &IndexMap<String, hcl::Expression>,
    ) -> (RootContext, Diagnostics) {
        let (root, diags) = context_load::module_context_from_config(
            parser,
            module,
            ModulePath::root(),
            EachState::none(),
            constants,
            None,
        );
        (RootContext { root }, diags)
    }

    /// Visits the root module and every module beneath it, depth-first. The
    /// callback returns `false` to stop descending into a module's children.
    pub fn visit_modules(&self, visit: &mut dyn FnMut(&ModuleContext) -> bool) {
        self.root.visit_modules(visit);
    }
}

/// The evaluation context of one module instance.
#[derive(Debug)]
pub struct ModuleContext {
    /// The absolute path of the module instance that this context belongs
    /// to. This can be used as part of identifiers that need to be
    /// globally-unique in the resulting flattened CloudFormation JSON.
    pub path: ModulePath,

    /// The `ForEach` state this instance was created under. Instances of a
    /// non-`ForEach` module call inherit the state of their caller, so a
    /// nested `ForEach` sees its parent's `Each` until it shadows it.
    pub each: EachState,

    /// The configuration for the module that this context belongs to. A
    /// configuration is not modified once it is part of a context.
    pub config: config::Module,

    /// The values of all of the module's named constants. Constant values
    /// are always known; where evaluation failed the table holds a typed
    /// null instead (the error has already been reported).
    pub constants: IndexMap<String, Value>,

    /// Contexts for child modules, keyed by the name given in configuration.
    /// Since a single `Module` block can fan out to many instances with
    /// `ForEach`, the children are accessed through a [`ModuleEach`].
    pub children: IndexMap<String, ModuleEach>,
}

impl ModuleContext {
    pub fn is_root(&self) -> bool {
        self.path.is_root()
    }

    pub fn visit_modules(&self, visit: &mut dyn FnMut(&ModuleContext) -> bool) {
        if !visit(self) {
            return;
        }
        for eacher in self.children.values() {
            for child in eacher.instances.values() {
                child.visit_modules(visit);
            }
        }
    }
}

/// Either a single child [`ModuleContext`] or the multiple indexed contexts
/// created when `ForEach` is used on a module block.
///
/// Use [`ModuleEach::is_for_each`] to determine which mode is in use, since
/// that dictates which accessors may be called.
#[derive(Debug)]
pub struct ModuleEach {
    /// The type of index used for `ForEach` on this collection of module
    /// instances, or [`EachType::None`] if `ForEach` is not in use.
    pub each_type: EachType,

    /// The context for each known index. When not in `ForEach` mode this map
    /// contains a single member keyed [`EachIndex::None`]. To iterate over
    /// all instances, use the values and disregard the keys.
    pub instances: IndexMap<EachIndex, ModuleContext>,
}

impl ModuleEach {
    pub(crate) fn new(each_type: EachType) -> ModuleEach {
        ModuleEach {
            each_type,
            instances: IndexMap::new(),
        }
    }

    pub fn is_for_each(&self) -> bool {
        self.each_type != EachType::None
    }

    /// The single instance of a non-`ForEach` module block, or `None` when
    /// the instance could not be constructed because its call was broken.
    ///
    /// Panics when called on a `ForEach` collection; that is a bug in the
    /// caller, not a configuration error.
    pub fn single(&self) -> Option<&ModuleContext> {
        if self.is_for_each() {
            panic!("can't use single() on a ModuleEach for a ForEach module block");
        }
        self.instances.get(&EachIndex::None)
    }

    /// The instance with the given index of a `ForEach` module block.
    ///
    /// Panics when called on a non-`ForEach` collection or with an index of
    /// the wrong type; both are bugs in the caller.
    pub fn index(&self, key: &EachIndex) -> Option<&ModuleContext> {
        if !self.is_for_each() {
            panic!("can't use index() on a ModuleEach for a non-ForEach module block");
        }
        if key.each_type() != self.each_type {
            panic!(
                "this ModuleEach requires {:?} indices, but was given {:?}",
                self.each_type,
                key.each_type()
            );
        }
        self.instances.get(key)
    }
}
