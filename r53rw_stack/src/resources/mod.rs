pub mod bucket;
pub mod build;
pub mod function;
pub mod rule;
pub mod trail;

use serde_json::{json, Value};

use crate::policy::{assume_role_policy, PolicyDocument};
use crate::template::{ref_, sub, Resource, StackError, Template};

pub fn managed_policy(name: &str) -> Value {
    sub(&format!("arn:${{AWS::Partition}}:iam::aws:policy/{}", name))
}

/// Declares a role assumable by `service` and, when `permissions` has any
/// statements, a separate `AWS::IAM::Policy` holding them. Keeping the
/// permissions out of the role lets them name resources that themselves
/// depend on the role. Returns the policy's logical id if one was made.
pub fn add_role(
    template: &mut Template,
    role_id: &str,
    service: &str,
    managed_policies: &[&str],
    permissions: PolicyDocument
) -> Result<Option<String>, StackError> {
    let mut properties = json!({
        "AssumeRolePolicyDocument": assume_role_policy(service),
    });
    if !managed_policies.is_empty() {
        properties["ManagedPolicyArns"] = Value::Array(
            managed_policies.iter().map(|p| managed_policy(p)).collect()
        );
    }
    template.add_resource(role_id, Resource::new("AWS::IAM::Role", properties))?;

    if permissions.Statement.is_empty() {
        return Ok(None);
    }
    let policy_id = format!("{}DefaultPolicy", role_id);
    template.add_resource(&policy_id, Resource::new("AWS::IAM::Policy", json!({
        "PolicyName": policy_id,
        "PolicyDocument": permissions,
        "Roles": [ref_(role_id)],
    })))?;
    Ok(Some(policy_id))
}

#[test]
fn test_add_role_without_permissions() {
    let mut template = Template::new("test");
    let policy = add_role(
        &mut template,
        "EventsRole",
        "events.amazonaws.com",
        &[],
        crate::policy::PolicyBuilder::new().build()
    ).unwrap();
    assert!(policy.is_none());
    let role = template.resource("EventsRole").unwrap();
    assert!(role.properties.get("ManagedPolicyArns").is_none());
}
