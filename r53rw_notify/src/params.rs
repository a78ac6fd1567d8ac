use std::collections::HashMap;
use std::env;
use std::fmt::{Display, Formatter};
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_ssm as ssm;
use lambda_runtime::Error;
use tracing::debug;

pub const PARAM_ID: &str = "r53rw_ID";
pub const PARAM_HOSTED_ZONE_ID: &str = "r53rw_HOSTED_ZONE_ID";
pub const PARAM_HOSTED_ZONE_NAME: &str = "r53rw_HOSTED_ZONE_NAME";
pub const PARAM_SLACK_ACCESS_TOKEN: &str = "r53rw_SLACK_ACCESS_TOKEN";

const SSM_ENDPOINT: &str = "SSM_ENDPOINT";

#[derive(Debug)]
pub struct MissingParameterError {
    pub name: String
}

impl std::error::Error for MissingParameterError {}

impl Display for MissingParameterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "parameter {} not found in parameter store", self.name)
    }
}

/// Builds an SSM client from the ambient AWS config. `SSM_ENDPOINT` points it
/// somewhere other than the regional endpoint (localstack and friends).
pub async fn ssm_client() -> ssm::Client {
    let region_provider = RegionProviderChain::default_provider().or_else("us-east-1");
    let config = aws_config::from_env().region(region_provider).load().await;
    let ssm_config = match env::var(SSM_ENDPOINT) {
        Ok(endpoint) => ssm::config::Builder::from(&config).endpoint_url(endpoint).build(),
        _ => ssm::config::Builder::from(&config).build()
    };
    ssm::Client::from_conf(ssm_config)
}

pub async fn get_parameter(client: &ssm::Client, name: &str) -> Result<String, Error> {
    let result = client.get_parameter()
        .name(name)
        .with_decryption(true)
        .send()
        .await?;
    debug!("resolved parameter {}", name);
    match result.parameter().and_then(|p| p.value()) {
        Some(value) => Ok(value.to_string()),
        None => Err(MissingParameterError { name: name.to_string() }.into())
    }
}

/// Resolves several parameters in one call. Every requested name must come
/// back; a name SSM reports as invalid is an error.
pub async fn get_parameters(client: &ssm::Client, names: &[&str]) -> Result<HashMap<String, String>, Error> {
    let result = client.get_parameters()
        .set_names(Some(names.iter().map(|n| n.to_string()).collect()))
        .with_decryption(true)
        .send()
        .await?;
    let mut params = HashMap::with_capacity(names.len());
    if let Some(found) = result.parameters() {
        for param in found {
            if let (Some(name), Some(value)) = (param.name(), param.value()) {
                params.insert(name.to_string(), value.to_string());
            }
        }
    }
    require_all(params, names)
}

fn require_all(params: HashMap<String, String>, names: &[&str]) -> Result<HashMap<String, String>, Error> {
    match names.iter().find(|n| !params.contains_key(**n)) {
        Some(missing) => Err(MissingParameterError { name: missing.to_string() }.into()),
        None => Ok(params)
    }
}

#[test]
fn test_require_all_reports_first_missing() {
    let params = HashMap::from([
        (PARAM_ID.to_string(), String::from("r53rw")),
        (PARAM_HOSTED_ZONE_NAME.to_string(), String::from("example.com.")),
    ]);
    let err = require_all(params, &[PARAM_ID, PARAM_HOSTED_ZONE_ID, PARAM_HOSTED_ZONE_NAME]).unwrap_err();
    assert_eq!(err.to_string(), "parameter r53rw_HOSTED_ZONE_ID not found in parameter store");
}

#[test]
fn test_require_all_passes_through() {
    let params = HashMap::from([(PARAM_ID.to_string(), String::from("r53rw"))]);
    let resolved = require_all(params, &[PARAM_ID]).unwrap();
    assert_eq!(resolved.get(PARAM_ID).map(String::as_str), Some("r53rw"));
}
