//! Validate workflow: schema-checks the lockfile and policy documents.

use std::path::Path;

use crate::config::load_policy;
use crate::core::error::{EXIT_OK, EXIT_USER_ERROR, Result, ShieldError};
use crate::lockfile::LockfileStore;
use crate::workflows::report::{DocumentValidation, Envelope, ValidateReport};

pub fn validate(store: &LockfileStore, policy_path: &Path) -> Result<ValidateReport> {
    let lockfile = if store.exists() {
        match store.read() {
            Ok(lockfile) => {
                let validation = crate::lockfile::validate(&lockfile);
                DocumentValidation {
                    present: true,
                    valid: validation.valid,
                    errors: validation.errors,
                }
            }
            Err(err) => DocumentValidation {
                present: true,
                valid: false,
                errors: vec![err.to_string()],
            },
        }
    } else {
        DocumentValidation {
            present: false,
            valid: true,
            errors: Vec::new(),
        }
    };

    let policy = match load_policy(policy_path) {
        Ok(Some(_)) => DocumentValidation {
            present: true,
            valid: true,
            errors: Vec::new(),
        },
        Ok(None) => DocumentValidation {
            present: false,
            valid: true,
            errors: Vec::new(),
        },
        Err(ShieldError::User(message)) => DocumentValidation {
            present: true,
            valid: false,
            errors: vec![message],
        },
        Err(other) => return Err(other),
    };

    Ok(ValidateReport {
        envelope: Envelope::new("validate"),
        lockfile,
        policy,
    })
}

/// Exit code: any invalid document is a user error.
#[must_use]
pub fn exit_code(report: &ValidateReport) -> i32 {
    if report.lockfile.valid && report.policy.valid {
        EXIT_OK
    } else {
        EXIT_USER_ERROR
    }
}
