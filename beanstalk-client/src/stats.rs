//! # Structured Payloads
//!
//! `OK <bytes>` replies carry YAML documents. Job and tube statistics
//! decode into typed structs; server statistics stay a loose map because
//! the field set varies between daemon versions.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use beanstalk_common::{BeanstalkResult, JobId, Priority};

/// Server-wide counters keyed by their wire names.
pub type ServerStats = BTreeMap<String, serde_yaml::Value>;

/// Lifecycle state reported for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    #[default]
    Ready,
    Delayed,
    Reserved,
    Buried,
}

/// Reply to `stats-job`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct JobStats {
    pub id: JobId,
    pub tube: String,
    pub state: JobState,
    pub pri: Priority,
    pub age: u64,
    pub delay: u64,
    pub ttr: u64,
    pub time_left: u64,
    pub file: u64,
    pub reserves: u64,
    pub timeouts: u64,
    pub releases: u64,
    pub buries: u64,
    pub kicks: u64,
}

/// Reply to `stats-tube`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TubeStats {
    pub name: String,
    pub current_jobs_urgent: u64,
    pub current_jobs_ready: u64,
    pub current_jobs_reserved: u64,
    pub current_jobs_delayed: u64,
    pub current_jobs_buried: u64,
    pub total_jobs: u64,
    pub current_using: u64,
    pub current_waiting: u64,
    pub current_watching: u64,
    pub pause: u64,
    pub cmd_delete: u64,
    pub cmd_pause_tube: u64,
    pub pause_time_left: u64,
}

/// Decodes a YAML payload into `T`.
pub(crate) fn decode<T: DeserializeOwned>(payload: &[u8]) -> BeanstalkResult<T> {
    Ok(serde_yaml::from_slice(payload)?)
}

/// Decodes a YAML list of tube names.
///
/// Names such as `123` or `true` are valid tubes but YAML scalars of other
/// types; they are rendered back to their text form.
pub(crate) fn decode_names(payload: &[u8]) -> BeanstalkResult<Vec<String>> {
    let values: Vec<serde_yaml::Value> = decode(payload)?;
    Ok(values.into_iter().map(scalar_text).collect())
}

fn scalar_text(value: serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(text) => text,
        serde_yaml::Value::Number(number) => number.to_string(),
        serde_yaml::Value::Bool(flag) => flag.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(&other)
            .map(|text| text.trim_end().to_string())
            .unwrap_or_default(),
    }
}
