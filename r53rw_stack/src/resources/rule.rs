use serde_json::{json, Value};

use crate::policy::PolicyBuilder;
use crate::resources::add_role;
use crate::template::{get_att, ref_, Resource, StackError, Template};

pub const BUILD_FAILED: &str = "FAILED";
pub const BUILD_SUCCEEDED: &str = "SUCCEEDED";

#[derive(Debug, Clone)]
pub enum RuleTarget {
    /// A Lambda function, by logical id.
    Function(String),
    /// A CodeBuild project, by logical id. Started through an events role.
    Project(String),
}

/// Matches `ChangeResourceRecordSets` calls recorded by CloudTrail against
/// the one hosted zone.
pub fn zone_change_pattern(hosted_zone_id: &str) -> Value {
    json!({
        "source": ["aws.route53"],
        "detail-type": ["AWS API Call via CloudTrail"],
        "detail": {
            "eventSource": ["route53.amazonaws.com"],
            "eventName": ["ChangeResourceRecordSets"],
            "requestParameters": {
                "hostedZoneId": [hosted_zone_id]
            }
        }
    })
}

pub fn build_state_pattern(project_id: &str, status: &str) -> Value {
    json!({
        "source": ["aws.codebuild"],
        "detail-type": ["CodeBuild Build State Change"],
        "detail": {
            "project-name": [ref_(project_id)],
            "build-status": [status]
        }
    })
}

/// Declares an enabled rule with `targets`, plus the permissions each target
/// needs: a `lambda:InvokeFunction` grant for functions, an events role that
/// may start the build for projects.
pub fn add_rule(
    template: &mut Template,
    rule_id: &str,
    pattern: Value,
    targets: &[RuleTarget]
) -> Result<(), StackError> {
    let mut rule_targets = Vec::with_capacity(targets.len());
    for (i, target) in targets.iter().enumerate() {
        let target_id = format!("Target{}", i);
        match target {
            RuleTarget::Function(function_id) => {
                rule_targets.push(json!({
                    "Id": target_id,
                    "Arn": get_att(function_id, "Arn"),
                }));
                template.add_resource(
                    &format!("{}Allow{}", rule_id, function_id),
                    Resource::new("AWS::Lambda::Permission", json!({
                        "Action": "lambda:InvokeFunction",
                        "FunctionName": get_att(function_id, "Arn"),
                        "Principal": "events.amazonaws.com",
                        "SourceArn": get_att(rule_id, "Arn"),
                    }))
                )?;
            }
            RuleTarget::Project(project_id) => {
                let role_id = format!("{}EventsRole", project_id);
                if template.resource(&role_id).is_none() {
                    add_role(
                        template,
                        &role_id,
                        "events.amazonaws.com",
                        &[],
                        PolicyBuilder::new()
                            .allow(&["codebuild:StartBuild"], vec![get_att(project_id, "Arn")])
                            .build()
                    )?;
                }
                rule_targets.push(json!({
                    "Id": target_id,
                    "Arn": get_att(project_id, "Arn"),
                    "RoleArn": get_att(&role_id, "Arn"),
                }));
            }
        }
    }

    template.add_resource(rule_id, Resource::new("AWS::Events::Rule", json!({
        "State": "ENABLED",
        "EventPattern": pattern,
        "Targets": rule_targets,
    })))
}

#[test]
fn test_zone_change_pattern_scoped_to_zone() {
    let pattern = zone_change_pattern("Z123");
    assert_eq!(pattern["detail"]["requestParameters"]["hostedZoneId"], json!(["Z123"]));
    assert_eq!(pattern["detail"]["eventName"], json!(["ChangeResourceRecordSets"]));
}

#[test]
fn test_project_target_gets_events_role() {
    let mut template = Template::new("test");
    template.add_resource("Project", Resource::new("AWS::CodeBuild::Project", json!({}))).unwrap();
    template.add_resource("Fn", Resource::new("AWS::Lambda::Function", json!({}))).unwrap();
    add_rule(
        &mut template,
        "Rule",
        zone_change_pattern("Z1"),
        &[RuleTarget::Function(String::from("Fn")), RuleTarget::Project(String::from("Project"))]
    ).unwrap();

    let rule = template.resource("Rule").unwrap();
    assert_eq!(rule.properties["Targets"][0]["Id"], "Target0");
    assert_eq!(rule.properties["Targets"][1]["RoleArn"], get_att("ProjectEventsRole", "Arn"));
    assert!(template.resource("RuleAllowFn").is_some());
    let policy = template.resource("ProjectEventsRoleDefaultPolicy").unwrap();
    assert_eq!(policy.properties["PolicyDocument"]["Statement"][0]["Action"], json!(["codebuild:StartBuild"]));
    assert!(template.validate().is_ok());
}
