use serde_json::json;
use tracing::debug;

use crate::policy::{PolicyBuilder, PolicyStatement};
use crate::resources::{add_role, bucket};
use crate::template::{get_att, join, logical_id, ref_, sub, Resource, StackError, Template};

pub const TRAIL_LOG_RETENTION_DAYS: u32 = 7;

const CLOUDTRAIL: &str = "cloudtrail.amazonaws.com";

/// Logical ids of the trail and its supporting resources.
#[derive(Debug, Clone)]
pub struct TrailIds {
    pub trail: String,
    pub bucket: String,
    pub bucket_policy: String,
    pub log_group: String,
    pub logs_role: String,
}

impl TrailIds {
    pub fn new(prefix: &str) -> Self {
        Self {
            trail: logical_id(prefix, "Trail"),
            bucket: logical_id(prefix, "TrailS3"),
            bucket_policy: logical_id(prefix, "TrailS3Policy"),
            log_group: logical_id(prefix, "TrailLogGroup"),
            logs_role: logical_id(prefix, "TrailLogsRole"),
        }
    }
}

/// A multi-region trail with log file validation that also forwards to a
/// CloudWatch log group kept for a week. The zone-change rule depends on
/// this trail delivering Route53 API calls to EventBridge.
pub fn add_audit_trail(template: &mut Template, prefix: &str) -> Result<TrailIds, StackError> {
    let ids = TrailIds::new(prefix);

    template.add_resource(&ids.bucket, bucket::private_bucket(json!({})))?;
    let bucket_policy = PolicyBuilder::new()
        .add_statement(
            PolicyStatement::allow(&["s3:GetBucketAcl"], vec![get_att(&ids.bucket, "Arn")])
                .for_service(CLOUDTRAIL)
        )
        .add_statement(
            PolicyStatement::allow(
                &["s3:PutObject"],
                vec![join(vec![get_att(&ids.bucket, "Arn"), sub("/AWSLogs/${AWS::AccountId}/*")])]
            )
                .for_service(CLOUDTRAIL)
                .with_condition(json!({
                    "StringEquals": { "s3:x-amz-acl": "bucket-owner-full-control" }
                }))
        )
        .build();
    template.add_resource(&ids.bucket_policy, Resource::new("AWS::S3::BucketPolicy", json!({
        "Bucket": ref_(&ids.bucket),
        "PolicyDocument": bucket_policy,
    })))?;

    template.add_resource(&ids.log_group, Resource::new("AWS::Logs::LogGroup", json!({
        "RetentionInDays": TRAIL_LOG_RETENTION_DAYS,
    })).retain())?;
    let logs_policy = add_role(
        template,
        &ids.logs_role,
        CLOUDTRAIL,
        &[],
        PolicyBuilder::new()
            .allow(&["logs:CreateLogStream", "logs:PutLogEvents"], vec![get_att(&ids.log_group, "Arn")])
            .build()
    )?;

    let mut trail = Resource::new("AWS::CloudTrail::Trail", json!({
        "IsLogging": true,
        "S3BucketName": ref_(&ids.bucket),
        "EnableLogFileValidation": true,
        "IncludeGlobalServiceEvents": true,
        "IsMultiRegionTrail": true,
        "CloudWatchLogsLogGroupArn": get_att(&ids.log_group, "Arn"),
        "CloudWatchLogsRoleArn": get_att(&ids.logs_role, "Arn"),
    }))
        .depends_on(&ids.bucket_policy)
        .depends_on(&ids.logs_role);
    // CloudTrail checks it can write to the log group at creation time.
    if let Some(policy_id) = logs_policy {
        trail = trail.depends_on(&policy_id);
    }
    template.add_resource(&ids.trail, trail)?;
    debug!("declared trail {}", ids.trail);
    Ok(ids)
}

#[test]
fn test_trail_settings() {
    let mut template = Template::new("test");
    let ids = add_audit_trail(&mut template, "r53rw").unwrap();
    let trail = template.resource(&ids.trail).unwrap();
    assert_eq!(trail.properties["IsMultiRegionTrail"], true);
    assert_eq!(trail.properties["IncludeGlobalServiceEvents"], true);
    assert_eq!(trail.properties["EnableLogFileValidation"], true);
    assert!(trail.depends_on.contains(&ids.bucket_policy));
    let log_group = template.resource(&ids.log_group).unwrap();
    assert_eq!(log_group.properties["RetentionInDays"], 7);
    assert!(template.validate().is_ok());
}
