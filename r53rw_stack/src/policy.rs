use serde::{Deserialize, Serialize};
use serde_json::Value;

pub static POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    Allow
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(non_snake_case)]
pub struct PolicyDocument {
    pub Version: String,
    pub Statement: Vec<PolicyStatement>
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(non_snake_case)]
pub struct PolicyStatement {
    pub Effect: Effect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub Principal: Option<Value>,
    pub Action: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub Resource: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub Condition: Option<Value>
}

impl PolicyStatement {
    pub fn new(effect: Effect, actions: &[&str], resources: Vec<Value>) -> Self {
        Self {
            Effect: effect,
            Principal: None,
            Action: actions.iter().map(|a| a.to_string()).collect(),
            Resource: resources,
            Condition: None,
        }
    }

    pub fn allow(actions: &[&str], resources: Vec<Value>) -> Self {
        Self::new(Effect::Allow, actions, resources)
    }

    pub fn for_service(mut self, service: &str) -> Self {
        self.Principal = Some(serde_json::json!({ "Service": service }));
        self
    }

    pub fn with_condition(mut self, condition: Value) -> Self {
        self.Condition = Some(condition);
        self
    }
}

#[derive(Debug)]
pub struct PolicyBuilder {
    policy: PolicyDocument
}

impl PolicyBuilder {
    pub fn new() -> PolicyBuilder {
        Self {
            policy: PolicyDocument {
                Version: POLICY_VERSION.to_string(),
                Statement: vec![],
            },
        }
    }

    pub fn add_statement(mut self, stmt: PolicyStatement) -> Self {
        self.policy.Statement.push(stmt);
        self
    }

    pub fn allow(self, actions: &[&str], resources: Vec<Value>) -> Self {
        self.add_statement(PolicyStatement::allow(actions, resources))
    }

    pub fn build(self) -> PolicyDocument {
        self.policy
    }
}

impl Default for PolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Trust policy letting `service` (e.g. `lambda.amazonaws.com`) assume a role.
pub fn assume_role_policy(service: &str) -> PolicyDocument {
    PolicyBuilder::new()
        .add_statement(PolicyStatement::allow(&["sts:AssumeRole"], vec![]).for_service(service))
        .build()
}

#[test]
fn test_assume_role_policy() {
    let doc = serde_json::to_value(assume_role_policy("codebuild.amazonaws.com")).unwrap();
    assert_eq!(doc, serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": {"Service": "codebuild.amazonaws.com"},
            "Action": ["sts:AssumeRole"]
        }]
    }));
}

#[test]
fn test_builder_keeps_statement_order() {
    let doc = PolicyBuilder::new()
        .allow(&["route53:List*", "route53:Get*"], vec![Value::from("*")])
        .allow(&["s3:PutObject"], vec![Value::from("arn:aws:s3:::export/Routefile")])
        .build();
    assert_eq!(doc.Statement.len(), 2);
    assert_eq!(doc.Statement[0].Effect, Effect::Allow);
    assert_eq!(doc.Statement[1].Action, vec!["s3:PutObject".to_string()]);
}
