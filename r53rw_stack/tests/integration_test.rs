use std::process::Command;
use r53rw_stack::{build_stack, StackConfig};
use serde_json::{json, Value};

fn config(build_notice: bool) -> StackConfig {
    StackConfig {
        id: String::from("r53rw"),
        hosted_zone_id: String::from("Z0123456789"),
        hosted_zone_name: String::from("example.com."),
        build_notice,
    }
}

fn synth(build_notice: bool) -> Value {
    let template = build_stack(&config(build_notice)).unwrap();
    serde_json::to_value(&template).unwrap()
}

fn resources_of_type<'a>(template: &'a Value, resource_type: &str) -> Vec<&'a String> {
    template["Resources"].as_object().unwrap()
        .iter()
        .filter(|(_, r)| r["Type"] == resource_type)
        .map(|(id, _)| id)
        .collect()
}

#[test]
fn test_declares_pipeline() {
    let template = synth(false);
    assert_eq!(template["AWSTemplateFormatVersion"], "2010-09-09");
    assert_eq!(resources_of_type(&template, "AWS::Lambda::Function"), vec!["r53rwCodebuildAlert", "r53rwDiffNotice"]);
    assert_eq!(resources_of_type(&template, "AWS::CodeBuild::Project"), vec!["r53rwCodebuildProject"]);
    assert_eq!(resources_of_type(&template, "AWS::CloudTrail::Trail"), vec!["r53rwTrail"]);
    assert_eq!(resources_of_type(&template, "AWS::Events::Rule"), vec!["r53rwRule", "r53rwRuleOnBuildFailed"]);
    assert!(template["Parameters"]["ArtifactBucket"].is_object());
    assert!(template["Parameters"]["ArtifactKeyDiffNotice"].is_object());
    assert!(template["Parameters"]["ArtifactKeyCodebuildNotice"].is_null());
}

#[test]
fn test_zone_change_rule_fans_out() {
    let template = synth(false);
    let rule = &template["Resources"]["r53rwRule"]["Properties"];
    assert_eq!(rule["EventPattern"]["detail"]["requestParameters"]["hostedZoneId"], json!(["Z0123456789"]));
    assert_eq!(rule["EventPattern"]["detail-type"], json!(["AWS API Call via CloudTrail"]));
    let targets = rule["Targets"].as_array().unwrap();
    assert_eq!(targets.len(), 2);
    assert_eq!(targets[0]["Arn"], json!({"Fn::GetAtt": ["r53rwDiffNotice", "Arn"]}));
    assert_eq!(targets[1]["Arn"], json!({"Fn::GetAtt": ["r53rwCodebuildProject", "Arn"]}));
}

#[test]
fn test_build_failure_rule_targets_alert() {
    let template = synth(false);
    let rule = &template["Resources"]["r53rwRuleOnBuildFailed"]["Properties"];
    assert_eq!(rule["EventPattern"]["detail"]["build-status"], json!(["FAILED"]));
    assert_eq!(rule["EventPattern"]["detail"]["project-name"], json!([{"Ref": "r53rwCodebuildProject"}]));
    assert_eq!(rule["Targets"][0]["Arn"], json!({"Fn::GetAtt": ["r53rwCodebuildAlert", "Arn"]}));
    let permission = &template["Resources"]["r53rwRuleOnBuildFailedAllowr53rwCodebuildAlert"]["Properties"];
    assert_eq!(permission["Principal"], "events.amazonaws.com");
}

#[test]
fn test_build_notice_is_optional() {
    let template = synth(true);
    assert!(template["Resources"]["r53rwCodebuildNotice"].is_object());
    let rule = &template["Resources"]["r53rwRuleOnBuildSucceeded"]["Properties"];
    assert_eq!(rule["EventPattern"]["detail"]["build-status"], json!(["SUCCEEDED"]));
    assert_eq!(rule["Targets"][0]["Arn"], json!({"Fn::GetAtt": ["r53rwCodebuildNotice", "Arn"]}));
}

#[test]
fn test_buildspec_exports_configured_zone() {
    let template = synth(false);
    let build_spec = &template["Resources"]["r53rwCodebuildProject"]["Properties"]["Source"]["BuildSpec"]["Fn::Sub"];
    let text = build_spec[0].as_str().unwrap();
    assert!(text.contains("roadwork --export --target-zone example.com. --output Routefile"));
    assert!(text.contains("aws s3 cp Routefile s3://${ExportBucket}/Routefile"));
    assert_eq!(build_spec[1]["ExportBucket"], json!({"Ref": "r53rwBucket"}));
}

#[test]
fn test_outputs() {
    let template = synth(false);
    assert_eq!(template["Outputs"]["ExportBucketName"]["Value"], json!({"Ref": "r53rwBucket"}));
    assert_eq!(template["Outputs"]["ExportProjectName"]["Value"], json!({"Ref": "r53rwCodebuildProject"}));
}

#[test]
fn test_prefix_is_sanitized() {
    let mut config = config(false);
    config.id = String::from("r53rw-prod");
    let template = serde_json::to_value(build_stack(&config).unwrap()).unwrap();
    assert!(template["Resources"]["r53rwprodBucket"].is_object());
}

#[test]
fn test_id_in_parameter_namespace_rejected() {
    let mut config = config(false);
    config.id = String::from("Artifact");
    let err = build_stack(&config).unwrap_err();
    assert_eq!(
        err.reason,
        "Invalid stack id \"Artifact\"\nmust not start with \"Artifact\", which is reserved for template parameters"
    );
}

#[test]
fn test_cli_stdout_is_only_the_template() {
    let output = Command::new(env!("CARGO_BIN_EXE_r53rw_stack"))
        .env("R53RW_ID", "r53rw")
        .env("R53RW_HOSTED_ZONE_ID", "Z0123456789")
        .env("R53RW_HOSTED_ZONE_NAME", "example.com.")
        .env("TRACING_DEBUG", "1")
        .env_remove("R53RW_BUILD_NOTICE")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let template: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(template["AWSTemplateFormatVersion"], "2010-09-09");
    assert!(template["Resources"]["r53rwDiffNotice"].is_object());
    let logs = String::from_utf8_lossy(&output.stderr);
    assert!(logs.contains("assembled stack r53rw for zone example.com."));
}
