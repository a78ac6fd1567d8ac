use serde_json::{json, Value};

use crate::policy::PolicyBuilder;
use crate::resources::add_role;
use crate::template::{get_att, join, logical_id, ref_, sub, sub_with, Resource, StackError, Template};

pub const EXPORT_FILE: &str = "Routefile";

const BUILD_IMAGE: &str = "aws/codebuild/standard:2.0";
const COMPUTE_TYPE: &str = "BUILD_GENERAL1_SMALL";

/// Installs roadworker, exports `zone_name` and copies the export into the
/// bucket substituted for `${ExportBucket}`.
pub fn buildspec(zone_name: &str) -> Value {
    json!({
        "version": 0.2,
        "phases": {
            "install": {
                "runtime-versions": { "ruby": 2.6 },
                "commands": ["gem install roadworker"]
            },
            "build": {
                "commands": [
                    format!("roadwork --export --target-zone {} --output {}", zone_name, EXPORT_FILE),
                    format!("aws s3 cp {} s3://${{ExportBucket}}/{}", EXPORT_FILE, EXPORT_FILE)
                ]
            }
        }
    })
}

/// Declares the export project. Its role may write the one export object
/// and read Route53, nothing else besides its own logs. Returns the
/// project's logical id.
pub fn add_export_project(
    template: &mut Template,
    prefix: &str,
    bucket_id: &str,
    zone_name: &str
) -> Result<String, StackError> {
    let project_id = logical_id(prefix, "CodebuildProject");
    let role_id = format!("{}Role", project_id);
    let log_group = format!(
        "arn:${{AWS::Partition}}:logs:${{AWS::Region}}:${{AWS::AccountId}}:log-group:/aws/codebuild/${{{}}}",
        project_id
    );

    add_role(
        template,
        &role_id,
        "codebuild.amazonaws.com",
        &[],
        PolicyBuilder::new()
            .allow(
                &["logs:CreateLogGroup", "logs:CreateLogStream", "logs:PutLogEvents"],
                vec![sub(&log_group), sub(&format!("{}:*", log_group))]
            )
            .allow(
                &["s3:PutObject"],
                vec![join(vec![get_att(bucket_id, "Arn"), Value::from(format!("/{}", EXPORT_FILE))])]
            )
            .allow(&["route53:List*", "route53:Get*"], vec![Value::from("*")])
            .build()
    )?;

    // Pretty JSON is valid YAML, which is what CodeBuild expects here.
    let spec = format!("{:#}", buildspec(zone_name));
    template.add_resource(&project_id, Resource::new("AWS::CodeBuild::Project", json!({
        "Source": {
            "Type": "NO_SOURCE",
            "BuildSpec": sub_with(&spec, json!({ "ExportBucket": ref_(bucket_id) })),
        },
        "Artifacts": { "Type": "NO_ARTIFACTS" },
        "Environment": {
            "Type": "LINUX_CONTAINER",
            "Image": BUILD_IMAGE,
            "ComputeType": COMPUTE_TYPE,
            "PrivilegedMode": false,
        },
        "ServiceRole": get_att(&role_id, "Arn"),
    })))?;
    Ok(project_id)
}

#[test]
fn test_buildspec_commands() {
    let spec = buildspec("example.com.");
    assert_eq!(spec["phases"]["install"]["commands"][0], "gem install roadworker");
    assert_eq!(
        spec["phases"]["build"]["commands"],
        json!([
            "roadwork --export --target-zone example.com. --output Routefile",
            "aws s3 cp Routefile s3://${ExportBucket}/Routefile"
        ])
    );
}

#[test]
fn test_project_role_scoped_to_export_object() {
    let mut template = Template::new("test");
    crate::resources::bucket::add_export_bucket(&mut template, "r53rwBucket").unwrap();
    let id = add_export_project(&mut template, "r53rw", "r53rwBucket", "example.com.").unwrap();
    assert_eq!(id, "r53rwCodebuildProject");

    let policy = template.resource("r53rwCodebuildProjectRoleDefaultPolicy").unwrap();
    let statements = &policy.properties["PolicyDocument"]["Statement"];
    assert_eq!(statements[1]["Action"], json!(["s3:PutObject"]));
    assert_eq!(
        statements[1]["Resource"][0],
        json!({"Fn::Join": ["", [{"Fn::GetAtt": ["r53rwBucket", "Arn"]}, "/Routefile"]]})
    );
    assert_eq!(statements[2]["Action"], json!(["route53:List*", "route53:Get*"]));
    assert!(template.validate().is_ok());
}
