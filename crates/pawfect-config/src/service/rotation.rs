//! Key rotation sweep
//!
//! Audits which stored secrets are sealed under which key version and
//! re-seals them under a target version. Each changed record is written once
//! with a rotation history entry.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use pawfect_common::crypto::{inspect, is_sealed};
use pawfect_common::{ConfigError, ConfigResult, SYSTEM_ACTOR, SealInfo};
use pawfect_persistence::{ConfigRecordStorageData, ConfigWrite};

use crate::model::path;
use crate::service::store::{ConfigStore, unsealed_value_error};

/// Seal state of one stored sensitive value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealAudit {
    pub key: String,
    pub path: String,
    pub sealed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_version: Option<u8>,
    /// Not sealed under the encryptor's current key version
    pub needs_rotation: bool,
}

/// A record the sweep could not rotate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationFailure {
    pub key: String,
    pub path: String,
    pub error: String,
}

/// Outcome of `rotate_all`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationReport {
    pub target_version: u8,
    /// Keys of records rewritten by the sweep
    pub rotated_records: Vec<String>,
    /// Sealed values moved to the target version
    pub resealed_values: usize,
    /// Plaintext values sealed for the first time
    pub sealed_legacy_values: usize,
    /// Records already fully sealed under the target version
    pub unchanged_records: usize,
    pub failures: Vec<RotationFailure>,
}

impl RotationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Default)]
struct RecordOutcome {
    resealed: usize,
    sealed_legacy: usize,
}

/// Rotation and audit over every active record
pub struct KeyRotationService {
    store: Arc<ConfigStore>,
}

impl KeyRotationService {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self { store }
    }

    /// Report the seal state of every non-empty sensitive value without
    /// decrypting anything
    pub async fn audit(&self) -> ConfigResult<Vec<SealAudit>> {
        let current = self.store.encryptor().current_version();
        let records = self.store.persistence().config_find_all(false).await?;

        let mut audits = Vec::new();
        for record in &records {
            for sensitive in self
                .store
                .effective_sensitive_paths(&record.key, &record.sensitive_paths)
            {
                let Some(value) = path::get(&record.data, &sensitive)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                else {
                    continue;
                };
                // Values of a record not flagged encrypted are plaintext
                let info = if record.is_encrypted {
                    inspect(value)
                } else {
                    SealInfo::unsealed()
                };
                audits.push(SealAudit {
                    key: record.key.clone(),
                    path: sensitive,
                    sealed: info.sealed,
                    key_version: info.key_version,
                    needs_rotation: info.key_version != Some(current),
                });
            }
        }
        Ok(audits)
    }

    /// Re-seal every sensitive value under `target_version`
    ///
    /// Cryptographic failures abort only the affected record and are listed
    /// in the report. Storage failures abort the sweep.
    pub async fn rotate_all(&self, target_version: u8, actor: &str) -> ConfigResult<RotationReport> {
        let encryptor = self.store.encryptor();
        if encryptor
            .key_provider()
            .key_material(target_version)
            .is_none()
        {
            return Err(ConfigError::KeyMaterialMissing {
                version: target_version,
            });
        }

        let actor = if actor.is_empty() { SYSTEM_ACTOR } else { actor };

        let mut report = RotationReport {
            target_version,
            ..Default::default()
        };
        let records = self.store.persistence().config_find_all(false).await?;

        for record in records {
            let sensitive = self
                .store
                .effective_sensitive_paths(&record.key, &record.sensitive_paths);
            let mut data = record.data.clone();

            let outcome = match self
                .rotate_values(&record, &mut data, &sensitive, target_version)
                .await
            {
                Ok(outcome) => outcome,
                Err((failed_path, e)) => {
                    error!(
                        key = %record.key,
                        path = %failed_path,
                        error = %e,
                        "Key rotation failed for record"
                    );
                    report.failures.push(RotationFailure {
                        key: record.key.clone(),
                        path: failed_path,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            if outcome.resealed == 0 && outcome.sealed_legacy == 0 {
                report.unchanged_records += 1;
                continue;
            }

            let stored = self
                .store
                .persistence()
                .config_upsert(ConfigWrite {
                    key: record.key.clone(),
                    data,
                    is_encrypted: true,
                    category: record.category,
                    sensitive_paths: sensitive,
                    updated_by: actor.to_string(),
                    rotation: true,
                })
                .await?;
            info!(
                key = %stored.key,
                version = stored.version,
                resealed = outcome.resealed,
                sealed_legacy = outcome.sealed_legacy,
                target_version,
                "Rotated configuration record"
            );
            report.resealed_values += outcome.resealed;
            report.sealed_legacy_values += outcome.sealed_legacy;
            report.rotated_records.push(stored.key);
        }

        info!(
            target_version,
            rotated = report.rotated_records.len(),
            unchanged = report.unchanged_records,
            failed = report.failures.len(),
            "Key rotation sweep finished"
        );
        Ok(report)
    }

    async fn rotate_values(
        &self,
        record: &ConfigRecordStorageData,
        data: &mut Value,
        sensitive: &[String],
        target_version: u8,
    ) -> Result<RecordOutcome, (String, ConfigError)> {
        let encryptor = self.store.encryptor();
        let mut outcome = RecordOutcome::default();

        for sensitive_path in sensitive {
            let Some(value) = path::get(data, sensitive_path)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
            else {
                continue;
            };

            let replacement = if record.is_encrypted {
                if !is_sealed(&value) {
                    Err(unsealed_value_error(encryptor, &value))
                } else if inspect(&value).key_version == Some(target_version) {
                    continue;
                } else {
                    outcome.resealed += 1;
                    encryptor.rotate_async(&value, target_version).await
                }
            } else {
                outcome.sealed_legacy += 1;
                encryptor.seal_with_version_async(&value, target_version).await
            };

            let sealed = replacement.map_err(|e| (sensitive_path.clone(), e))?;
            path::set(data, sensitive_path, Value::String(sealed));
        }
        Ok(outcome)
    }
}
