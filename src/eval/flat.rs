//! The flattened template: everything the module tree reduces to, ready for
//! serialization as CloudFormation JSON.

use indexmap::IndexMap;

use crate::eval::op_tree::DynExpr;
use crate::value::Value;

#[derive(Debug, Default)]
pub struct FlatTemplate {
    pub description: Option<String>,
    pub metadata: IndexMap<String, Value>,
    pub parameters: IndexMap<String, FlatParameter>,
    pub mappings: IndexMap<String, IndexMap<String, Value>>,
    pub conditions: IndexMap<String, DynExpr>,
    pub resources: IndexMap<String, FlatResource>,
    pub outputs: IndexMap<String, FlatOutput>,
}

#[derive(Debug)]
pub struct FlatParameter {
    pub type_name: String,
    pub description: Value,
    pub default: Value,
    pub allowed_pattern: Value,
    pub allowed_values: Vec<Value>,
    pub constraint_description: Value,
    pub min_length: Value,
    pub max_length: Value,
    pub min_value: Value,
    pub max_value: Value,
    pub no_echo: Value,
}

#[derive(Debug)]
pub struct FlatResource {
    pub type_name: String,
    pub properties: IndexMap<String, DynExpr>,
    pub metadata: IndexMap<String, Value>,
    pub depends_on: Vec<String>,
    pub deletion_policy: Value,
    pub creation_policy: Option<FlatCreationPolicy>,
    pub update_policy: Option<FlatUpdatePolicy>,
}

#[derive(Debug)]
pub struct FlatCreationPolicy {
    pub auto_scaling_min_successful_percent: Value,
    pub signal_count: Value,
    pub signal_timeout: Value,
}

#[derive(Debug)]
pub struct FlatUpdatePolicy {
    pub auto_scaling_replace: Value,
}

impl Default for FlatCreationPolicy {
    fn default() -> Self {
        FlatCreationPolicy {
            auto_scaling_min_successful_percent: Value::null(),
            signal_count: Value::null(),
            signal_timeout: Value::null(),
        }
    }
}

impl Default for FlatUpdatePolicy {
    fn default() -> Self {
        FlatUpdatePolicy {
            auto_scaling_replace: Value::null(),
        }
    }
}

#[derive(Debug)]
pub struct FlatOutput {
    pub description: Value,
    pub value: DynExpr,
    pub export_name: Option<DynExpr>,
}
