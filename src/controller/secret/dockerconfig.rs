//! # Docker Config Combiner
//!
//! Merges the `.dockerconfigjson` payloads of several Secrets into one.
//!
//! - Secrets without a payload are skipped
//! - an unparsable payload fails the whole combination
//! - on a registry collision the later Secret wins

use crate::constants::DOCKER_CONFIG_JSON_KEY;
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CombineError {
    #[error("parsing .dockerconfigjson of secret {secret}: {source}")]
    Parse {
        secret: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("serializing combined docker config: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// `{"auths": {registry: {username, password, auth, ...}}}`
#[derive(Debug, Default, Deserialize, Serialize)]
struct DockerConfigJson {
    #[serde(default)]
    auths: BTreeMap<String, BTreeMap<String, Value>>,
}

/// Combined `.dockerconfigjson` payload of `secrets`, in input order
///
/// # Errors
///
/// `Parse` when a present payload is not a docker config.
pub fn combine_docker_configs(secrets: &[Secret]) -> Result<Vec<u8>, CombineError> {
    let mut combined = DockerConfigJson::default();

    for secret in secrets {
        let Some(payload) = secret
            .data
            .as_ref()
            .and_then(|data| data.get(DOCKER_CONFIG_JSON_KEY))
            .filter(|payload| !payload.0.is_empty())
        else {
            continue;
        };

        let config: DockerConfigJson =
            serde_json::from_slice(&payload.0).map_err(|source| CombineError::Parse {
                secret: format!(
                    "{}/{}",
                    secret.namespace().unwrap_or_default(),
                    secret.name_any()
                ),
                source,
            })?;
        combined.auths.extend(config.auths);
    }

    serde_json::to_vec(&combined).map_err(CombineError::Serialize)
}
