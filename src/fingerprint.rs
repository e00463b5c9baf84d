//! Stable identities for hardware, benchmark cases and run contexts
//!
//! Each identity is the SHA-256 of a canonical JSON rendering (struct fields
//! in declaration order, map keys sorted), hex encoded. Two submissions that
//! describe the same machine or the same parameter permutation therefore land
//! in the same time series no matter how the harness ordered its fields.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Identity-relevant description of a benchmark machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineInfo {
    pub name: String,
    pub architecture_name: String,
    pub kernel_name: String,
    pub os_name: String,
    pub os_version: String,
    pub cpu_model_name: String,
    pub cpu_core_count: u32,
    pub cpu_thread_count: u32,
    pub memory_bytes: u64,
    #[serde(default)]
    pub gpu_count: u32,
    #[serde(default)]
    pub gpu_product_names: Vec<String>,
}

/// Where a result was measured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Hardware {
    Machine(MachineInfo),
    /// A pool of machines identified by name and an opaque description
    Cluster {
        name: String,
        info: BTreeMap<String, String>,
    },
}

/// Fingerprint of a machine or cluster
///
/// # Example
/// ```
/// use benchtrend::fingerprint::{hardware_fingerprint, Hardware};
/// use std::collections::BTreeMap;
///
/// let cluster = Hardware::Cluster { name: "ci-pool".into(), info: BTreeMap::new() };
/// let fp = hardware_fingerprint(&cluster);
/// assert_eq!(fp.len(), 64);
/// assert_eq!(fp, hardware_fingerprint(&cluster.clone()));
/// ```
pub fn hardware_fingerprint(hardware: &Hardware) -> String {
    let canonical = match hardware {
        Hardware::Machine(info) => format!("machine:{}", canonical_json(info)),
        Hardware::Cluster { name, info } => {
            format!("cluster:{}:{}", name, canonical_json(info))
        }
    };
    sha256_hex(canonical.as_bytes())
}

/// Case identity: benchmark name plus its parameter permutation
pub fn case_id(name: &str, params: &BTreeMap<String, String>) -> String {
    let canonical = format!("case:{}:{}", name, canonical_json(params));
    sha256_hex(canonical.as_bytes())
}

/// Context identity: build and runtime configuration
///
/// `serde_json::Value` objects keep sorted keys (no `preserve_order`), so
/// nested objects are canonical too.
pub fn context_id(context: &BTreeMap<String, serde_json::Value>) -> String {
    let canonical = format!("context:{}", canonical_json(context));
    sha256_hex(canonical.as_bytes())
}

fn canonical_json<T: Serialize>(value: &T) -> String {
    // Serializing these plain structs and string-keyed maps cannot fail.
    serde_json::to_string(value).unwrap_or_default()
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
