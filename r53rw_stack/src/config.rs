use std::collections::HashMap;
use std::env;
use r53rw_notify::params::{
    self, MissingParameterError, PARAM_HOSTED_ZONE_ID, PARAM_HOSTED_ZONE_NAME, PARAM_ID
};
use tracing::info;

use crate::Error;

const R53RW_BUILD_NOTICE: &str = "R53RW_BUILD_NOTICE";
const R53RW_ID: &str = "R53RW_ID";
const R53RW_HOSTED_ZONE_ID: &str = "R53RW_HOSTED_ZONE_ID";
const R53RW_HOSTED_ZONE_NAME: &str = "R53RW_HOSTED_ZONE_NAME";

/// Everything the stack is parameterized by, resolved once before synthesis.
#[derive(Debug, Clone)]
pub struct StackConfig {
    /// Prefix for every logical id.
    pub id: String,
    pub hosted_zone_id: String,
    pub hosted_zone_name: String,
    /// Also deploy the notice function and its build-succeeded rule.
    pub build_notice: bool,
}

impl StackConfig {
    /// Reads the deploy parameters from the environment when all three are
    /// set there, otherwise from the parameter store.
    pub async fn load() -> Result<StackConfig, Error> {
        let build_notice = env::var(R53RW_BUILD_NOTICE).is_ok();
        if let Some(config) = StackConfig::from_lookup(|name| env::var(name).ok(), build_notice) {
            info!("loaded stack config for {} from environment", config.id);
            return Ok(config);
        }

        let ssm_client = params::ssm_client().await;
        let params = params::get_parameters(
            &ssm_client,
            &[PARAM_ID, PARAM_HOSTED_ZONE_ID, PARAM_HOSTED_ZONE_NAME]
        ).await?;
        let config = StackConfig::from_params(params, build_notice)?;
        info!("loaded stack config for {}", config.id);
        Ok(config)
    }

    pub fn from_params(mut params: HashMap<String, String>, build_notice: bool) -> Result<StackConfig, Error> {
        let mut take = |name: &str| params.remove(name)
            .ok_or_else(|| MissingParameterError { name: name.to_string() });
        Ok(StackConfig {
            id: take(PARAM_ID)?,
            hosted_zone_id: take(PARAM_HOSTED_ZONE_ID)?,
            hosted_zone_name: take(PARAM_HOSTED_ZONE_NAME)?,
            build_notice,
        })
    }

    pub fn from_lookup<F>(lookup: F, build_notice: bool) -> Option<StackConfig>
    where
        F: Fn(&str) -> Option<String>
    {
        Some(StackConfig {
            id: lookup(R53RW_ID)?,
            hosted_zone_id: lookup(R53RW_HOSTED_ZONE_ID)?,
            hosted_zone_name: lookup(R53RW_HOSTED_ZONE_NAME)?,
            build_notice,
        })
    }
}

#[test]
fn test_from_params() {
    let params = HashMap::from([
        (PARAM_ID.to_string(), String::from("r53rw")),
        (PARAM_HOSTED_ZONE_ID.to_string(), String::from("Z1")),
        (PARAM_HOSTED_ZONE_NAME.to_string(), String::from("example.com.")),
    ]);
    let config = StackConfig::from_params(params, false).unwrap();
    assert_eq!(config.hosted_zone_id, "Z1");
    assert!(!config.build_notice);
}

#[test]
fn test_from_params_missing_zone() {
    let params = HashMap::from([(PARAM_ID.to_string(), String::from("r53rw"))]);
    let err = StackConfig::from_params(params, false).unwrap_err();
    assert_eq!(err.to_string(), "parameter r53rw_HOSTED_ZONE_ID not found in parameter store");
}

#[test]
fn test_from_lookup_needs_every_variable() {
    let vars = HashMap::from([
        (R53RW_ID, String::from("r53rw")),
        (R53RW_HOSTED_ZONE_ID, String::from("Z1")),
        (R53RW_HOSTED_ZONE_NAME, String::from("example.com.")),
    ]);
    let config = StackConfig::from_lookup(|name| vars.get(name).cloned(), true).unwrap();
    assert_eq!(config.hosted_zone_name, "example.com.");
    assert!(config.build_notice);

    let partial = |name: &str| if name == R53RW_ID { Some(String::from("r53rw")) } else { None };
    assert!(StackConfig::from_lookup(partial, false).is_none());
}
