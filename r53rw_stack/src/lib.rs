pub mod config;
pub mod policy;
pub mod resources;
pub mod template;

use std::io::Write;
use tracing::info;

use r53rw_notify::params::PARAM_SLACK_ACCESS_TOKEN;
use crate::resources::function::{FunctionSpec, ARTIFACT_BUCKET, ARTIFACT_PARAMETER_PREFIX};
use crate::resources::rule::{RuleTarget, BUILD_FAILED, BUILD_SUCCEEDED};
use crate::resources::{bucket, build, function, rule, trail};

pub use config::StackConfig;
pub use template::{logical_id, ref_, StackError, Template};

pub type Error = Box<dyn std::error::Error + Send + Sync>;

pub const DESCRIPTION: &str = "r53rw: Route53 change watcher with zone export and Slack notifications";

/// Assembles the whole pipeline: export bucket, audit trail, notifier
/// functions, export project and the rules wiring them together. The result
/// has been validated.
pub fn build_stack(config: &StackConfig) -> Result<Template, StackError> {
    let prefix = config.id.as_str();
    check_prefix(prefix)?;
    let mut template = Template::new(DESCRIPTION);
    template.add_parameter(ARTIFACT_BUCKET, "S3 bucket holding the Lambda bootstrap zips")?;

    let bucket_id = logical_id(prefix, "Bucket");
    bucket::add_export_bucket(&mut template, &bucket_id)?;
    trail::add_audit_trail(&mut template, prefix)?;

    let diff_notice = function::add_function(
        &mut template,
        prefix,
        &FunctionSpec::new("diff_notice").reads_parameter(PARAM_SLACK_ACCESS_TOKEN)
    )?;
    let codebuild_alert = function::add_function(
        &mut template,
        prefix,
        &FunctionSpec::new("codebuild_alert").reads_parameter(PARAM_SLACK_ACCESS_TOKEN)
    )?;

    let project = build::add_export_project(&mut template, prefix, &bucket_id, &config.hosted_zone_name)?;

    rule::add_rule(
        &mut template,
        &logical_id(prefix, "Rule"),
        rule::zone_change_pattern(&config.hosted_zone_id),
        &[RuleTarget::Function(diff_notice), RuleTarget::Project(project.clone())]
    )?;
    rule::add_rule(
        &mut template,
        &logical_id(prefix, "RuleOnBuildFailed"),
        rule::build_state_pattern(&project, BUILD_FAILED),
        &[RuleTarget::Function(codebuild_alert)]
    )?;

    if config.build_notice {
        let codebuild_notice = function::add_function(
            &mut template,
            prefix,
            &FunctionSpec::new("codebuild_notice").reads_parameter(PARAM_SLACK_ACCESS_TOKEN)
        )?;
        rule::add_rule(
            &mut template,
            &logical_id(prefix, "RuleOnBuildSucceeded"),
            rule::build_state_pattern(&project, BUILD_SUCCEEDED),
            &[RuleTarget::Function(codebuild_notice)]
        )?;
    }

    template.add_output("ExportBucketName", ref_(&bucket_id))?;
    template.add_output("ExportProjectName", ref_(&project))?;

    template.validate()?;
    info!("assembled stack {} for zone {}", prefix, config.hosted_zone_name);
    Ok(template)
}

/// Resource ids are `prefix` plus a suffix, so a prefix that sanitizes to
/// the parameter namespace would shadow `ArtifactBucket` or an
/// `ArtifactKey<Fn>` parameter.
pub fn check_prefix(prefix: &str) -> Result<(), StackError> {
    if logical_id(prefix, "").starts_with(ARTIFACT_PARAMETER_PREFIX) {
        return Err(StackError::new(format!(
            "Invalid stack id {:?}\nmust not start with {:?}, which is reserved for template parameters",
            prefix, ARTIFACT_PARAMETER_PREFIX
        )));
    }
    Ok(())
}

/// Writes the template as pretty JSON followed by a newline.
pub fn write_template<W: Write>(template: &Template, out: &mut W) -> Result<(), Error> {
    serde_json::to_writer_pretty(&mut *out, template)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

#[test]
fn test_check_prefix() {
    assert!(check_prefix("r53rw").is_ok());
    assert!(check_prefix("ArtifactStore").is_err());
    assert!(check_prefix("Artifact-Key").is_err());
    assert!(check_prefix("artifact").is_ok());
}

#[test]
fn test_write_template_is_plain_json() {
    let mut template = Template::new(DESCRIPTION);
    template.add_parameter(ARTIFACT_BUCKET, "bucket").unwrap();
    let mut out = Vec::new();
    write_template(&template, &mut out).unwrap();
    assert_eq!(out.last(), Some(&b'\n'));
    let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(parsed["AWSTemplateFormatVersion"], "2010-09-09");
}
