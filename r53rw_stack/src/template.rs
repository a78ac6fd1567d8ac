use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use serde::Serialize;
use serde_json::{json, Value};

pub const FORMAT_VERSION: &str = "2010-09-09";

#[derive(Debug)]
pub struct StackError {
    pub reason: String
}

impl StackError {
    pub fn new<T: Into<String>>(reason: T) -> Self {
        Self { reason: reason.into() }
    }
}

impl std::error::Error for StackError {}

impl Display for StackError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    #[serde(rename = "Type")]
    pub resource_type: String,
    pub properties: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<String>,
}

impl Resource {
    pub fn new(resource_type: &str, properties: Value) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            properties,
            depends_on: vec![],
            deletion_policy: None,
            update_replace_policy: None,
        }
    }

    pub fn depends_on(mut self, logical_id: &str) -> Self {
        self.depends_on.push(logical_id.to_string());
        self
    }

    /// Keeps the physical resource when the stack is deleted or the resource
    /// is replaced.
    pub fn retain(mut self) -> Self {
        self.deletion_policy = Some("Retain".to_string());
        self.update_replace_policy = Some("Retain".to_string());
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    format_version: String,
    description: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    parameters: BTreeMap<String, Value>,
    resources: BTreeMap<String, Resource>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    outputs: BTreeMap<String, Value>,
}

impl Template {
    pub fn new(description: &str) -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            description: description.to_string(),
            parameters: BTreeMap::new(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    fn check_new_id(&self, logical_id: &str) -> Result<(), StackError> {
        verify_resource_name(logical_id)?;
        if self.parameters.contains_key(logical_id) || self.resources.contains_key(logical_id) {
            return Err(StackError::new(format!("Logical id {:?} is declared twice", logical_id)));
        }
        Ok(())
    }

    /// Declares a `String` parameter.
    pub fn add_parameter(&mut self, logical_id: &str, description: &str) -> Result<(), StackError> {
        self.check_new_id(logical_id)?;
        self.parameters.insert(logical_id.to_string(), json!({
            "Type": "String",
            "Description": description,
        }));
        Ok(())
    }

    pub fn add_resource(&mut self, logical_id: &str, resource: Resource) -> Result<(), StackError> {
        self.check_new_id(logical_id)?;
        self.resources.insert(logical_id.to_string(), resource);
        Ok(())
    }

    pub fn add_output(&mut self, logical_id: &str, value: Value) -> Result<(), StackError> {
        verify_resource_name(logical_id)?;
        if self.outputs.contains_key(logical_id) {
            return Err(StackError::new(format!("Output {:?} is declared twice", logical_id)));
        }
        self.outputs.insert(logical_id.to_string(), json!({ "Value": value }));
        Ok(())
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    /// Checks that every `Ref`, `Fn::GetAtt` and `Fn::Sub` variable points at
    /// something this template declares (or an `AWS::` pseudo parameter), and
    /// that every `DependsOn` names a resource.
    pub fn validate(&self) -> Result<(), StackError> {
        let mut referenced = BTreeSet::new();
        for (id, resource) in &self.resources {
            collect_references(&resource.properties, &mut referenced);
            for dep in &resource.depends_on {
                if !self.resources.contains_key(dep) {
                    return Err(StackError::new(format!("{} depends on undeclared resource {:?}", id, dep)));
                }
            }
        }
        for output in self.outputs.values() {
            collect_references(output, &mut referenced);
        }
        for name in referenced {
            if name.starts_with("AWS::") {
                continue;
            }
            if !self.resources.contains_key(&name) && !self.parameters.contains_key(&name) {
                return Err(StackError::new(format!("Reference to undeclared logical id {:?}", name)));
            }
        }
        Ok(())
    }
}

pub fn verify_resource_name(resource_name: &str) -> Result<(), StackError> {
    if resource_name.len() > 255 {
        return Err(StackError::new(format!("Invalid resource name {:?}\nmust be less than 255 characters", resource_name)));
    }
    if resource_name.is_empty() {
        return Err(StackError::new(format!("Invalid resource name {:?}\nMust contain at least 1 character", resource_name)));
    }
    if !resource_name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(StackError::new(format!("Invalid resource name {:?}\nMust contain only alphanumeric characters [A-Za-z0-9]", resource_name)));
    }
    Ok(())
}

/// `prefix` with everything but ASCII alphanumerics dropped, followed by
/// `suffix`. `("r53rw-prod", "Bucket")` gives `r53rwprodBucket`.
pub fn logical_id(prefix: &str, suffix: &str) -> String {
    prefix.chars()
        .chain(suffix.chars())
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

pub fn ref_(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

pub fn sub(text: &str) -> Value {
    json!({ "Fn::Sub": text })
}

pub fn sub_with(text: &str, variables: Value) -> Value {
    json!({ "Fn::Sub": [text, variables] })
}

pub fn join(parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": ["", parts] })
}

fn collect_references(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(name)) = map.get("Ref") {
                out.insert(name.to_owned());
            }
            if let Some(Value::Array(args)) = map.get("Fn::GetAtt") {
                if let Some(Value::String(name)) = args.first() {
                    out.insert(name.to_owned());
                }
            }
            match map.get("Fn::Sub") {
                Some(Value::String(text)) => sub_variables(text, &BTreeSet::new(), out),
                Some(Value::Array(args)) => {
                    let locals: BTreeSet<String> = match args.get(1) {
                        Some(Value::Object(vars)) => vars.keys().cloned().collect(),
                        _ => BTreeSet::new(),
                    };
                    if let Some(Value::String(text)) = args.first() {
                        sub_variables(text, &locals, out);
                    }
                }
                _ => {}
            }
            for v in map.values() {
                collect_references(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_references(v, out);
            }
        }
        _ => {}
    }
}

// `${Name}` and `${Name.Attr}` refer to the template; `${!Literal}` does not.
fn sub_variables(text: &str, locals: &BTreeSet<String>, out: &mut BTreeSet<String>) {
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        rest = &rest[start + 2..];
        let end = match rest.find('}') {
            Some(end) => end,
            None => break,
        };
        let var = &rest[..end];
        rest = &rest[end + 1..];
        if var.starts_with('!') {
            continue;
        }
        let name = if var.starts_with("AWS::") {
            var
        } else {
            var.split('.').next().unwrap_or(var)
        };
        if !locals.contains(name) {
            out.insert(name.to_string());
        }
    }
}

#[test]
fn test_logical_id_strips_separators() {
    assert_eq!(logical_id("r53rw-prod_1", "Bucket"), "r53rwprod1Bucket");
}

#[test]
fn test_verify_resource_name() {
    assert!(verify_resource_name("Bucket1").is_ok());
    assert!(verify_resource_name("").is_err());
    assert!(verify_resource_name("my-bucket").is_err());
    assert!(verify_resource_name(&"a".repeat(256)).is_err());
}

#[test]
fn test_duplicate_logical_id_rejected() {
    let mut template = Template::new("test");
    template.add_parameter("ArtifactBucket", "bucket").unwrap();
    let err = template.add_resource("ArtifactBucket", Resource::new("AWS::S3::Bucket", json!({}))).unwrap_err();
    assert_eq!(err.reason, "Logical id \"ArtifactBucket\" is declared twice");
}

#[test]
fn test_validate_finds_dangling_references() {
    let mut template = Template::new("test");
    template.add_resource("Fn", Resource::new("AWS::Lambda::Function", json!({
        "Role": get_att("FnRole", "Arn"),
    }))).unwrap();
    assert!(template.validate().is_err());
    template.add_resource("FnRole", Resource::new("AWS::IAM::Role", json!({}))).unwrap();
    assert!(template.validate().is_ok());
}

#[test]
fn test_validate_sub_variables() {
    let mut template = Template::new("test");
    template.add_resource("Logs", Resource::new("AWS::Logs::LogGroup", json!({
        "LogGroupName": sub("/aws/lambda/${Fn}-${AWS::Region}-${!Literal}"),
        "Tag": sub_with("${Local}", json!({"Local": "x"})),
    }))).unwrap();
    assert_eq!(template.validate().unwrap_err().reason, "Reference to undeclared logical id \"Fn\"");
    template.add_resource("Fn", Resource::new("AWS::Lambda::Function", json!({}))).unwrap();
    assert!(template.validate().is_ok());
}

#[test]
fn test_parameters_and_outputs() {
    let mut template = Template::new("test");
    template.add_parameter("ArtifactBucket", "bucket").unwrap();
    template.add_output("Artifacts", ref_("ArtifactBucket")).unwrap();
    let doc = serde_json::to_value(&template).unwrap();
    assert_eq!(doc["Parameters"]["ArtifactBucket"]["Type"], "String");
    assert_eq!(doc["Outputs"]["Artifacts"], json!({"Value": {"Ref": "ArtifactBucket"}}));
    assert!(template.add_output("Artifacts", ref_("ArtifactBucket")).is_err());
    assert!(template.validate().is_ok());
}

#[test]
fn test_validate_depends_on() {
    let mut template = Template::new("test");
    template.add_resource("Trail", Resource::new("AWS::CloudTrail::Trail", json!({})).depends_on("Policy")).unwrap();
    assert!(template.validate().is_err());
}
