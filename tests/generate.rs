//! End-to-end tests: write a module tree to disk, build it, and check the
//! emitted CloudFormation JSON.

use std::path::Path;

use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::tempdir;

use awsup::addr::{EachIndex, EachType, ModulePath, NameInModule};
use awsup::diag::Diagnostics;
use awsup::{cfnjson, config, eval, schema};

fn write_files(dir: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }
}

fn load(path: &Path) -> (eval::RootContext, Diagnostics) {
    let mut parser = config::Parser::new();
    eval::RootContext::new(&mut parser, path, &IndexMap::new())
}

fn generate(path: &Path) -> (serde_json::Value, Diagnostics) {
    let (ctx, mut diags) = load(path);
    let (template, build_diags) = ctx.build(&schema::Schema::builtin());
    diags.append(build_diags);
    (cfnjson::prepare_structure(&template), diags)
}

#[test]
fn trivial_template() {
    let dir = tempdir().unwrap();
    write_files(dir.path(), &[("main.awsup", "Description = \"hello\"\n")]);

    let (json, diags) = generate(dir.path());
    assert!(!diags.has_errors(), "{:?}", diags);
    assert_eq!(json, json!({"Description": "hello"}));
}

#[test]
fn parameter_constraints() {
    let dir = tempdir().unwrap();
    write_files(
        dir.path(),
        &[(
            "main.awsup",
            r#"
Parameter "P" {
  Type     = "Number"
  MinValue = 1
  MaxValue = 10
  Default  = 3
}
"#,
        )],
    );

    let (json, diags) = generate(dir.path());
    assert!(!diags.has_errors(), "{:?}", diags);
    assert_eq!(
        json,
        json!({
            "Parameters": {
                "P": {"Type": "Number", "Default": 3, "MinValue": 1, "MaxValue": 10}
            }
        })
    );
}

#[test]
fn length_constraint_rejected_on_number_parameter() {
    let dir = tempdir().unwrap();
    write_files(
        dir.path(),
        &[(
            "main.awsup",
            r#"
Parameter "P" {
  Type      = "Number"
  MinLength = 1
}
"#,
        )],
    );

    let (ctx, diags) = load(dir.path());
    assert!(!diags.has_errors(), "{:?}", diags);
    let (template, diags) = ctx.build(&schema::Schema::builtin());
    assert!(diags.has_errors());
    assert!(diags
        .iter()
        .any(|d| d.summary == "Length constraint not permitted"));
    // The offending constraint is not emitted.
    let json = cfnjson::prepare_structure(&template);
    assert!(json["Parameters"]["P"].get("MinLength").is_none());
}

#[test]
fn pattern_constraint_rejected_on_number_parameter() {
    let dir = tempdir().unwrap();
    write_files(
        dir.path(),
        &[(
            "main.awsup",
            r#"
Parameter "P" {
  Type           = "Number"
  AllowedPattern = "[0-9]+"
}
"#,
        )],
    );

    let (ctx, diags) = load(dir.path());
    assert!(!diags.has_errors(), "{:?}", diags);
    let (template, diags) = ctx.build(&schema::Schema::builtin());
    assert!(diags.has_errors());
    assert!(diags
        .iter()
        .any(|d| d.summary == "Pattern constraint not permitted"));
    let json = cfnjson::prepare_structure(&template);
    assert!(json["Parameters"]["P"].get("AllowedPattern").is_none());
}

#[test]
fn value_constraint_rejected_on_string_parameter() {
    let dir = tempdir().unwrap();
    write_files(
        dir.path(),
        &[(
            "main.awsup",
            r#"
Parameter "P" {
  Type     = "String"
  MinValue = 1
  MaxValue = 10
}
"#,
        )],
    );

    let (ctx, diags) = load(dir.path());
    assert!(!diags.has_errors(), "{:?}", diags);
    let (template, diags) = ctx.build(&schema::Schema::builtin());
    assert!(diags.has_errors());
    assert!(diags
        .iter()
        .any(|d| d.summary == "Value constraint not permitted"));
    let json = cfnjson::prepare_structure(&template);
    assert!(json["Parameters"]["P"].get("MinValue").is_none());
    assert!(json["Parameters"]["P"].get("MaxValue").is_none());
}

#[test]
fn template_interpolation_lowers_to_join() {
    let dir = tempdir().unwrap();
    write_files(
        dir.path(),
        &[(
            "main.awsup",
            r#"
Resource "Bucket" {
  Type = "AWS::S3::Bucket"
}

Output "BucketArn" {
  Value = "arn:${Resource.Bucket}"
}
"#,
        )],
    );

    let (json, diags) = generate(dir.path());
    assert!(!diags.has_errors(), "{:?}", diags);
    assert_eq!(
        json["Outputs"]["BucketArn"]["Value"],
        json!({"Fn::Join": ["", ["arn:", {"Ref": "Bucket"}]]})
    );
}

#[test]
fn logical_chains_emit_one_flat_and() {
    let dir = tempdir().unwrap();
    write_files(
        dir.path(),
        &[(
            "main.awsup",
            r#"
Parameter "P" {
  Type = "String"
}

Output "AllSet" {
  Value = Param.P == "a" && Param.P == "b" && Param.P == "c"
}
"#,
        )],
    );

    let (json, diags) = generate(dir.path());
    assert!(!diags.has_errors(), "{:?}", diags);
    let and = &json["Outputs"]["AllSet"]["Value"]["Fn::And"];
    let children = and.as_array().expect("Fn::And is an array");
    assert_eq!(children.len(), 3);
    for child in children {
        assert!(child.get("Fn::Equals").is_some(), "got {}", child);
    }
}

#[test]
fn for_each_fans_out_child_modules() {
    let dir = tempdir().unwrap();
    write_files(
        dir.path(),
        &[
            (
                "main.awsup",
                r#"
Module "M" {
  Source  = "./child"
  ForEach = ["a", "b"]

  Constants {
    x = Each.Value
  }
}
"#,
            ),
            ("child/child.awsup", "Constant \"x\" {}\n"),
        ],
    );

    let (ctx, diags) = load(dir.path());
    assert!(!diags.has_errors(), "{:?}", diags);

    let eacher = &ctx.root.children["M"];
    assert_eq!(eacher.each_type, EachType::Int);
    assert_eq!(eacher.instances.len(), 2);

    let first = eacher.index(&EachIndex::Int(0)).unwrap();
    assert_eq!(first.path.to_string(), ".M[0]");
    assert_eq!(first.constants["x"], awsup::value::Value::from("a"));

    let second = eacher.index(&EachIndex::Int(1)).unwrap();
    assert_eq!(second.path.to_string(), ".M[1]");
    assert_eq!(second.constants["x"], awsup::value::Value::from("b"));
}

#[test]
fn for_each_over_empty_list_keeps_key_type() {
    let dir = tempdir().unwrap();
    write_files(
        dir.path(),
        &[
            (
                "main.awsup",
                r#"
Module "M" {
  Source  = "./child"
  ForEach = []
}
"#,
            ),
            ("child/child.awsup", "Description = \"empty\"\n"),
        ],
    );

    let (ctx, diags) = load(dir.path());
    assert!(!diags.has_errors(), "{:?}", diags);
    let eacher = &ctx.root.children["M"];
    assert_eq!(eacher.each_type, EachType::Int);
    assert!(eacher.instances.is_empty());
}

#[test]
fn resources_emit_with_properties_and_depends_on() {
    let dir = tempdir().unwrap();
    write_files(
        dir.path(),
        &[(
            "main.awsup",
            r#"
Resource "Logs" {
  Type = "AWS::S3::Bucket"
}

Resource "Bucket" {
  Type = "AWS::S3::Bucket"

  Parameters {
    BucketName    = "my-bucket"
    AccessControl = "Private"
  }

  DependsOn      = [Resource.Logs]
  DeletionPolicy = "Retain"
}
"#,
        )],
    );

    let (json, diags) = generate(dir.path());
    assert!(!diags.has_errors(), "{:?}", diags);
    assert_eq!(
        json["Resources"]["Bucket"],
        json!({
            "Type": "AWS::S3::Bucket",
            "Properties": {
                "BucketName": "my-bucket",
                "AccessControl": "Private"
            },
            "DependsOn": ["Logs"],
            "DeletionPolicy": "Retain"
        })
    );
}

#[test]
fn for_each_resources_emit_hashed_ids() {
    let dir = tempdir().unwrap();
    write_files(
        dir.path(),
        &[(
            "main.awsup",
            r#"
Resource "Queue" {
  Type    = "AWS::SQS::Queue"
  ForEach = ["jobs", "events"]

  Parameters {
    QueueName = Each.Value
  }
}
"#,
        )],
    );

    let (json, diags) = generate(dir.path());
    assert!(!diags.has_errors(), "{:?}", diags);

    let resources = json["Resources"].as_object().unwrap();
    assert_eq!(resources.len(), 2);

    let first_id = NameInModule {
        module: ModulePath::root(),
        name: "Queue".to_string(),
        key: EachIndex::Int(0),
    }
    .id();
    let first = &resources[&first_id];
    assert_eq!(first["Properties"]["QueueName"], json!("jobs"));
}

#[test]
fn child_module_resources_get_qualified_ids() {
    let dir = tempdir().unwrap();
    write_files(
        dir.path(),
        &[
            (
                "main.awsup",
                r#"
Module "Net" {
  Source = "./net"
}
"#,
            ),
            (
                "net/net.awsup",
                r#"
Resource "Vpc" {
  Type = "AWS::EC2::VPC"

  Parameters {
    CidrBlock = "10.0.0.0/16"
  }
}
"#,
            ),
        ],
    );

    let (json, diags) = generate(dir.path());
    assert!(!diags.has_errors(), "{:?}", diags);

    let expected_id = NameInModule {
        module: ModulePath::root().child("Net"),
        name: "Vpc".to_string(),
        key: EachIndex::None,
    }
    .id();
    let resources = json["Resources"].as_object().unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(
        resources[&expected_id]["Properties"]["CidrBlock"],
        json!("10.0.0.0/16")
    );
}

#[test]
fn module_output_references_are_inlined() {
    let dir = tempdir().unwrap();
    write_files(
        dir.path(),
        &[
            (
                "main.awsup",
                r#"
Module "Net" {
  Source = "./net"
}

Output "VpcId" {
  Value = Module.Net.Id
}
"#,
            ),
            (
                "net/net.awsup",
                r#"
Resource "Vpc" {
  Type = "AWS::EC2::VPC"

  Parameters {
    CidrBlock = "10.0.0.0/16"
  }
}

Output "Id" {
  Value = Resource.Vpc
}
"#,
            ),
        ],
    );

    let (json, diags) = generate(dir.path());
    assert!(!diags.has_errors(), "{:?}", diags);

    let vpc_id = NameInModule {
        module: ModulePath::root().child("Net"),
        name: "Vpc".to_string(),
        key: EachIndex::None,
    }
    .id();
    assert_eq!(json["Outputs"]["VpcId"]["Value"], json!({"Ref": vpc_id}));
}

#[test]
fn fractional_module_instance_index_is_an_error() {
    let dir = tempdir().unwrap();
    write_files(
        dir.path(),
        &[
            (
                "main.awsup",
                r#"
Module "M" {
  Source  = "./child"
  ForEach = ["a", "b"]
}

Output "First" {
  Value = Module.M[1.5].Out
}
"#,
            ),
            (
                "child/child.awsup",
                r#"
Output "Out" {
  Value = "fixed"
}
"#,
            ),
        ],
    );

    let (ctx, diags) = load(dir.path());
    assert!(!diags.has_errors(), "{:?}", diags);
    let (_, diags) = ctx.build(&schema::Schema::builtin());
    assert!(diags.has_errors());
    assert!(diags
        .iter()
        .any(|d| d.summary == "Invalid module instance index"));
}

#[test]
fn mappings_and_conditions_emit() {
    let dir = tempdir().unwrap();
    write_files(
        dir.path(),
        &[(
            "main.awsup",
            r#"
Parameter "Env" {
  Type = "String"
}

Mappings {
  Sizes = {
    small = { instance = "t3.micro" }
    large = { instance = "m5.large" }
  }
}

Conditions {
  IsProd = Param.Env == "prod"
}
"#,
        )],
    );

    let (json, diags) = generate(dir.path());
    assert!(!diags.has_errors(), "{:?}", diags);
    assert_eq!(
        json["Mappings"]["Sizes"]["small"],
        json!({"instance": "t3.micro"})
    );
    assert_eq!(
        json["Conditions"]["IsProd"],
        json!({"Fn::Equals": [{"Ref": "Env"}, "prod"]})
    );
}

#[test]
fn unknown_property_is_an_error() {
    let dir = tempdir().unwrap();
    write_files(
        dir.path(),
        &[(
            "main.awsup",
            r#"
Resource "Bucket" {
  Type = "AWS::S3::Bucket"

  Parameters {
    NoSuchProperty = 1
  }
}
"#,
        )],
    );

    let (_, diags) = generate(dir.path());
    assert!(diags.has_errors());
    assert!(diags.iter().any(|d| d.summary == "Unsupported property"));
}

#[test]
fn property_type_mismatch_is_an_error() {
    let dir = tempdir().unwrap();
    write_files(
        dir.path(),
        &[(
            "main.awsup",
            r#"
Resource "Bucket" {
  Type = "AWS::S3::Bucket"

  Parameters {
    BucketName = ["not", "a", "string"]
  }
}
"#,
        )],
    );

    let (_, diags) = generate(dir.path());
    assert!(diags.has_errors());
    assert!(diags
        .iter()
        .any(|d| d.summary == "Incorrect value for property"));
}

#[test]
fn missing_required_constant_reports_cli_hint_for_root() {
    let dir = tempdir().unwrap();
    write_files(dir.path(), &[("main.awsup", "Constant \"Env\" {}\n")]);

    let (_, diags) = load(dir.path());
    assert!(diags.has_errors());
    assert!(diags.iter().any(|d| {
        d.summary == "Required root constant not set" && d.detail.contains("--constants")
    }));
}

#[test]
fn constants_flow_from_values_files() {
    let dir = tempdir().unwrap();
    write_files(
        dir.path(),
        &[
            (
                "main.awsup",
                r#"
Constant "Env" {}

Description = "${Const.Env} stack"
"#,
            ),
            ("values.awsup", "Env = \"prod\"\n"),
        ],
    );

    let mut parser = config::Parser::new();
    let (constants, diags) = parser.parse_values_files(&[dir.path().join("values.awsup")]);
    assert!(!diags.has_errors(), "{:?}", diags);

    let (ctx, mut diags) = eval::RootContext::new(&mut parser, dir.path(), &constants);
    let (template, build_diags) = ctx.build(&schema::Schema::builtin());
    diags.append(build_diags);
    assert!(!diags.has_errors(), "{:?}", diags);
    assert_eq!(template.description.as_deref(), Some("prod stack"));
}

#[test]
fn extraneous_constant_is_an_error() {
    let dir = tempdir().unwrap();
    write_files(
        dir.path(),
        &[
            (
                "main.awsup",
                r#"
Module "M" {
  Source = "./child"

  Constants {
    Bogus = 1
  }
}
"#,
            ),
            ("child/child.awsup", "Description = \"child\"\n"),
        ],
    );

    let (_, diags) = load(dir.path());
    assert!(diags.has_errors());
    assert!(diags
        .iter()
        .any(|d| d.summary == "Unsupported module constant"));
}

#[test]
fn child_source_must_be_relative() {
    let dir = tempdir().unwrap();
    write_files(
        dir.path(),
        &[(
            "main.awsup",
            r#"
Module "M" {
  Source = "child"
}
"#,
        )],
    );

    let (_, diags) = load(dir.path());
    assert!(diags.has_errors());
    assert!(diags
        .iter()
        .any(|d| d.summary == "Invalid child module source path"));
}

#[test]
fn module_source_cycles_are_detected() {
    let dir = tempdir().unwrap();
    write_files(
        dir.path(),
        &[
            (
                "a/main.awsup",
                r#"
Module "B" {
  Source = "../b"
}
"#,
            ),
            (
                "b/main.awsup",
                r#"
Module "A" {
  Source = "../a"
}
"#,
            ),
        ],
    );

    let (_, diags) = load(&dir.path().join("a"));
    assert!(diags.has_errors());
    assert!(diags.iter().any(|d| d.summary == "Module source cycle"));
}

#[test]
fn editor_junk_files_are_skipped() {
    let dir = tempdir().unwrap();
    write_files(
        dir.path(),
        &[
            ("main.awsup", "Description = \"hello\"\n"),
            (".hidden.awsup", "This is not valid HCL {{{\n"),
            ("#main.awsup#", "Neither is this }}}\n"),
            ("notes.txt", "and this is not awsup at all\n"),
        ],
    );

    let (json, diags) = generate(dir.path());
    assert!(!diags.has_errors(), "{:?}", diags);
    assert_eq!(json, json!({"Description": "hello"}));
}

#[test]
fn in_memory_modules_cannot_have_children() {
    let (file, diags) = config::parse_file_source(
        r#"
Module "M" {
  Source = "./child"
}
"#,
        "synthetic.awsup",
    );
    assert!(!diags.has_errors(), "{:?}", diags);
    let (module, diags) = config::new_module(None, vec![file]);
    assert!(!diags.has_errors(), "{:?}", diags);

    let mut parser = config::Parser::new();
    let (_, diags) = eval::RootContext::from_module(&mut parser, module, &IndexMap::new());
    assert!(diags.has_errors());
    assert!(diags
        .iter()
        .any(|d| d.summary == "Child modules not allowed"));
}

#[test]
fn creation_policy_emits_cloudformation_shape() {
    let dir = tempdir().unwrap();
    write_files(
        dir.path(),
        &[(
            "main.awsup",
            r#"
Resource "Group" {
  Type = "AWS::AutoScaling::AutoScalingGroup"

  Parameters {
    MinSize = "1"
    MaxSize = "3"
  }

  CreationPolicy {
    AutoScaling {
      MinSuccessfulInstancesPercent = 80
    }

    Signal {
      Count   = 2
      Timeout = "PT5M"
    }
  }
}
"#,
        )],
    );

    let (json, diags) = generate(dir.path());
    assert!(!diags.has_errors(), "{:?}", diags);
    assert_eq!(
        json["Resources"]["Group"]["CreationPolicy"],
        json!({
            "AutoScalingCreationPolicy": {"MinSuccessfulInstancesPercent": 80},
            "ResourceSignal": {"Count": 2, "Timeout": "PT5M"}
        })
    );
}
