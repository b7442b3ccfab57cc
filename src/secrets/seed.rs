//! Service secrets seeding document.
//!
//! The document lists secrets a service should import into its secret store
//! on startup:
//!
//! ```json
//! {
//!   "secrets": [
//!     {
//!       "secretName": "credentials001",
//!       "imported": false,
//!       "secretData": [
//!         { "key": "username", "value": "admin" },
//!         { "key": "password", "value": "hunter2" }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! After an entry is stored it is marked `imported` and its `secretData` is
//! cleared, so the re-serialized document no longer carries the plaintext.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::error::{Result, SecretsError, SeedFailure};
use super::types::SecretData;

/// Root of the seeding document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSecrets {
    #[validate(nested)]
    pub secrets: Vec<ServiceSecret>,
}

/// One secret to import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_service_secret"))]
pub struct ServiceSecret {
    #[validate(custom(function = "validate_secret_name"))]
    pub secret_name: String,

    #[serde(default)]
    pub imported: bool,

    #[serde(default)]
    #[validate(nested)]
    pub secret_data: Vec<SecretDataKeyValue>,
}

/// Key/value pair of a secret to import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SecretDataKeyValue {
    #[validate(length(min = 1))]
    pub key: String,
    pub value: String,
}

fn validate_secret_name(name: &str) -> std::result::Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::new("empty_secret_name"));
    }
    Ok(())
}

fn validate_service_secret(secret: &ServiceSecret) -> std::result::Result<(), ValidationError> {
    if !secret.imported && secret.secret_data.is_empty() {
        return Err(ValidationError::new("missing_secret_data"));
    }
    Ok(())
}

impl ServiceSecrets {
    /// Parse and validate a seeding document.
    pub fn from_json(contents: &[u8]) -> Result<Self> {
        let secrets: Self = serde_json::from_slice(contents).map_err(|e| {
            SecretsError::invalid_document(format!("unable to parse secrets file: {}", e))
        })?;

        secrets.validate().map_err(|e| {
            SecretsError::invalid_document(format!("secrets file failed validation: {}", e))
        })?;

        Ok(secrets)
    }

    /// Compact JSON form of the document.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn pending(&self) -> usize {
        self.secrets.iter().filter(|secret| !secret.imported).count()
    }
}

impl ServiceSecret {
    /// Trimmed secret name and the key/value pairs as a map.
    pub fn prepare(&self) -> (String, SecretData) {
        let data = self
            .secret_data
            .iter()
            .map(|kv| (kv.key.clone(), kv.value.clone()))
            .collect();

        (self.secret_name.trim().to_string(), data)
    }

    /// Mark as imported and drop the plaintext values.
    pub fn mark_imported(&mut self) {
        self.imported = true;
        self.secret_data.clear();
    }
}

/// Outcome of seeding every pending entry of a document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SeedReport {
    /// Secret names stored during this run.
    pub stored: Vec<String>,
    /// Secret names that were already imported.
    pub skipped: Vec<String>,
    pub failures: Vec<SeedFailure>,
    /// The document re-serialized with imported entries scrubbed.
    pub document: Vec<u8>,
}

impl SeedReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Collapse the per-entry failures into a single aggregate error.
    pub fn into_result(self) -> Result<()> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(SecretsError::Seeding { failures: self.failures })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "secrets": [
            {
                "secretName": "  credentials001 ",
                "imported": false,
                "secretData": [
                    { "key": "username", "value": "admin" },
                    { "key": "password", "value": "hunter2" }
                ]
            },
            {
                "secretName": "credentials002",
                "imported": true,
                "secretData": []
            }
        ]
    }"#;

    #[test]
    fn test_parse_document() {
        let secrets = ServiceSecrets::from_json(DOCUMENT.as_bytes()).unwrap();

        assert_eq!(secrets.secrets.len(), 2);
        assert_eq!(secrets.pending(), 1);
        assert!(secrets.secrets[1].imported);
    }

    #[test]
    fn test_prepare_trims_name() {
        let secrets = ServiceSecrets::from_json(DOCUMENT.as_bytes()).unwrap();

        let (name, data) = secrets.secrets[0].prepare();
        assert_eq!(name, "credentials001");
        assert_eq!(data.get("username").map(String::as_str), Some("admin"));
        assert_eq!(data.get("password").map(String::as_str), Some("hunter2"));
    }

    #[test]
    fn test_mark_imported_scrubs_payload() {
        let mut secrets = ServiceSecrets::from_json(DOCUMENT.as_bytes()).unwrap();
        secrets.secrets[0].mark_imported();

        let json = String::from_utf8(secrets.to_json().unwrap()).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(json.contains(r#""secretName":"  credentials001 ","imported":true,"secretData":[]"#));
    }

    #[test]
    fn test_missing_data_for_pending_entry_is_rejected() {
        let doc = r#"{"secrets":[{"secretName":"db","imported":false,"secretData":[]}]}"#;

        let err = ServiceSecrets::from_json(doc.as_bytes()).unwrap_err();
        assert!(matches!(err, SecretsError::InvalidDocument { .. }));
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let doc = r#"{"secrets":[{"secretName":"   ","secretData":[{"key":"a","value":"b"}]}]}"#;

        let err = ServiceSecrets::from_json(doc.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("failed validation"));
    }

    #[test]
    fn test_empty_key_is_rejected() {
        let doc = r#"{"secrets":[{"secretName":"db","secretData":[{"key":"","value":"b"}]}]}"#;

        assert!(ServiceSecrets::from_json(doc.as_bytes()).is_err());
    }

    #[test]
    fn test_malformed_json() {
        let err = ServiceSecrets::from_json(b"{\"secrets\": [").unwrap_err();
        assert!(err.to_string().contains("unable to parse secrets file"));
    }

    #[test]
    fn test_report_into_result() {
        assert!(SeedReport::default().into_result().is_ok());

        let report = SeedReport {
            failures: vec![SeedFailure { secret_name: "db".into(), error: "boom".into() }],
            ..Default::default()
        };
        assert!(!report.is_success());
        assert!(matches!(report.into_result(), Err(SecretsError::Seeding { failures }) if failures.len() == 1));
    }
}
