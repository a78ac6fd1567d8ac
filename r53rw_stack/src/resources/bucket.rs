use serde_json::{json, Value};

use crate::template::{Resource, StackError, Template};

pub const NONCURRENT_VERSION_EXPIRATION_DAYS: u32 = 30;

fn encryption() -> Value {
    json!({
        "ServerSideEncryptionConfiguration": [{
            "ServerSideEncryptionByDefault": { "SSEAlgorithm": "AES256" }
        }]
    })
}

fn block_public_access() -> Value {
    json!({
        "BlockPublicAcls": true,
        "BlockPublicPolicy": true,
        "IgnorePublicAcls": true,
        "RestrictPublicBuckets": true,
    })
}

/// Private, S3-managed-encryption bucket. Retained when the stack goes away.
pub fn private_bucket(extra: Value) -> Resource {
    let mut properties = json!({
        "BucketEncryption": encryption(),
        "PublicAccessBlockConfiguration": block_public_access(),
    });
    if let (Value::Object(props), Value::Object(extra)) = (&mut properties, extra) {
        props.extend(extra);
    }
    Resource::new("AWS::S3::Bucket", properties).retain()
}

/// The bucket `Routefile` exports land in. Versioned, so every export is
/// kept; superseded versions expire after 30 days.
pub fn add_export_bucket(template: &mut Template, bucket_id: &str) -> Result<(), StackError> {
    template.add_resource(bucket_id, private_bucket(json!({
        "VersioningConfiguration": { "Status": "Enabled" },
        "LifecycleConfiguration": {
            "Rules": [{
                "Status": "Enabled",
                "NoncurrentVersionExpiration": {
                    "NoncurrentDays": NONCURRENT_VERSION_EXPIRATION_DAYS
                }
            }]
        },
    })))
}

#[test]
fn test_export_bucket_lifecycle() {
    let mut template = Template::new("test");
    add_export_bucket(&mut template, "r53rwBucket").unwrap();
    let bucket = template.resource("r53rwBucket").unwrap();
    assert_eq!(bucket.properties["VersioningConfiguration"]["Status"], "Enabled");
    assert_eq!(
        bucket.properties["LifecycleConfiguration"]["Rules"][0]["NoncurrentVersionExpiration"]["NoncurrentDays"],
        30
    );
    assert_eq!(
        bucket.properties["BucketEncryption"]["ServerSideEncryptionConfiguration"][0]["ServerSideEncryptionByDefault"]["SSEAlgorithm"],
        "AES256"
    );
    assert_eq!(bucket.deletion_policy.as_deref(), Some("Retain"));
}
