use serde_json::{json, Value};

use crate::policy::PolicyBuilder;
use crate::resources::add_role;
use crate::template::{get_att, logical_id, ref_, sub, Resource, StackError, Template};

/// Every template parameter starts with this.
pub const ARTIFACT_PARAMETER_PREFIX: &str = "Artifact";
pub const ARTIFACT_BUCKET: &str = "ArtifactBucket";
pub const FUNCTION_LOG_RETENTION_DAYS: u32 = 30;

const RUNTIME: &str = "provided.al2";
const HANDLER: &str = "bootstrap";

pub struct FunctionSpec {
    /// Name of the crate the function is built from, e.g. `diff_notice`.
    pub name: String,
    /// Memory in MB. 128 - 10240.
    pub memory_size: u32,
    /// Timeout in seconds. 1 - 900.
    pub timeout: u32,
    /// Parameter store entries the function may read.
    pub readable_parameters: Vec<String>,
}

impl FunctionSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            memory_size: 128,
            timeout: 60,
            readable_parameters: vec![],
        }
    }

    pub fn reads_parameter(mut self, parameter: &str) -> Self {
        self.readable_parameters.push(parameter.to_string());
        self
    }

    pub fn is_valid(&self) -> Result<(), StackError> {
        if self.memory_size < 128 || self.memory_size > 10240 {
            return Err(StackError::new(format!("Invalid memory size {:?}\nMust be between 128 and 10240", self.memory_size)));
        }
        if self.timeout < 1 || self.timeout > 900 {
            return Err(StackError::new(format!("Invalid timeout {:?}\nMust be between 1 and 900", self.timeout)));
        }
        Ok(())
    }

    /// `diff_notice` -> `DiffNotice`.
    pub fn camel_name(&self) -> String {
        self.name.split('_')
            .map(|part| {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect()
    }

    pub fn artifact_key_parameter(&self) -> String {
        format!("{}Key{}", ARTIFACT_PARAMETER_PREFIX, self.camel_name())
    }
}

fn parameter_arn(name: &str) -> Value {
    sub(&format!("arn:${{AWS::Partition}}:ssm:${{AWS::Region}}:${{AWS::AccountId}}:parameter/{}", name))
}

/// Declares the function, its execution role and its log group. Code comes
/// from `ArtifactBucket` / `ArtifactKey<Name>`; the key parameter is declared
/// here, the bucket parameter by the caller. Returns the function's logical
/// id.
pub fn add_function(template: &mut Template, prefix: &str, spec: &FunctionSpec) -> Result<String, StackError> {
    spec.is_valid()?;
    let function_id = logical_id(prefix, &spec.camel_name());
    let role_id = format!("{}ServiceRole", function_id);
    let key_param = spec.artifact_key_parameter();

    template.add_parameter(&key_param, &format!("S3 key of the {} bootstrap zip", spec.name))?;

    let mut permissions = PolicyBuilder::new();
    if !spec.readable_parameters.is_empty() {
        permissions = permissions.allow(
            &["ssm:GetParameter"],
            spec.readable_parameters.iter().map(|p| parameter_arn(p)).collect()
        );
    }
    let policy_id = add_role(
        template,
        &role_id,
        "lambda.amazonaws.com",
        &["service-role/AWSLambdaBasicExecutionRole", "AWSXRayDaemonWriteAccess"],
        permissions.build()
    )?;

    let mut function = Resource::new("AWS::Lambda::Function", json!({
        "Runtime": RUNTIME,
        "Handler": HANDLER,
        "Code": {
            "S3Bucket": ref_(ARTIFACT_BUCKET),
            "S3Key": ref_(&key_param),
        },
        "MemorySize": spec.memory_size,
        "Timeout": spec.timeout,
        "TracingConfig": { "Mode": "Active" },
        "Role": get_att(&role_id, "Arn"),
    }))
        .depends_on(&role_id);
    if let Some(policy_id) = policy_id {
        function = function.depends_on(&policy_id);
    }
    template.add_resource(&function_id, function)?;

    template.add_resource(&format!("{}LogGroup", function_id), Resource::new("AWS::Logs::LogGroup", json!({
        "LogGroupName": sub(&format!("/aws/lambda/${{{}}}", function_id)),
        "RetentionInDays": FUNCTION_LOG_RETENTION_DAYS,
    })).retain())?;

    Ok(function_id)
}

#[test]
fn test_camel_name() {
    assert_eq!(FunctionSpec::new("codebuild_alert").camel_name(), "CodebuildAlert");
    assert_eq!(FunctionSpec::new("diff_notice").artifact_key_parameter(), "ArtifactKeyDiffNotice");
}

#[test]
fn test_invalid_sizes() {
    let mut spec = FunctionSpec::new("diff_notice");
    spec.memory_size = 64;
    assert!(spec.is_valid().is_err());
    spec.memory_size = 128;
    spec.timeout = 901;
    assert!(spec.is_valid().is_err());
}

#[test]
fn test_function_reads_only_its_parameter() {
    let mut template = Template::new("test");
    template.add_parameter(ARTIFACT_BUCKET, "bucket").unwrap();
    let spec = FunctionSpec::new("diff_notice").reads_parameter("r53rw_SLACK_ACCESS_TOKEN");
    let id = add_function(&mut template, "r53rw", &spec).unwrap();
    assert_eq!(id, "r53rwDiffNotice");

    let function = template.resource(&id).unwrap();
    assert_eq!(function.properties["Timeout"], 60);
    assert_eq!(function.properties["MemorySize"], 128);
    assert_eq!(function.properties["TracingConfig"]["Mode"], "Active");

    let policy = template.resource("r53rwDiffNoticeServiceRoleDefaultPolicy").unwrap();
    let statements = policy.properties["PolicyDocument"]["Statement"].as_array().unwrap();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0]["Action"], json!(["ssm:GetParameter"]));
    assert_eq!(
        statements[0]["Resource"][0]["Fn::Sub"],
        "arn:${AWS::Partition}:ssm:${AWS::Region}:${AWS::AccountId}:parameter/r53rw_SLACK_ACCESS_TOKEN"
    );
    assert!(template.validate().is_ok());
}
