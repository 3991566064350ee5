//! Doctor workflow: environment diagnostics.

use std::path::Path;

use crate::config::{Settings, load_policy};
use crate::core::ContentCache;
use crate::core::error::Result;
use crate::lockfile::LockfileStore;
use crate::workflows::report::{DoctorCheck, DoctorReport, Envelope};

pub fn doctor(
    settings: &Settings,
    store: &LockfileStore,
    policy_path: &Path,
    cache: &ContentCache,
) -> Result<DoctorReport> {
    let mut checks = Vec::new();

    let cache_root = cache.root().to_path_buf();
    let cache_writable = std::fs::create_dir_all(&cache_root).is_ok()
        && tempfile::NamedTempFile::new_in(&cache_root).is_ok();
    checks.push(DoctorCheck {
        name: "cache".into(),
        ok: cache_writable,
        detail: if cache_writable {
            let (bytes, files) = cache.stats().unwrap_or((0, 0));
            format!("{} ({files} file(s), {bytes} bytes)", cache_root.display())
        } else {
            format!("{} is not writable", cache_root.display())
        },
    });

    if store.exists() {
        match store.read() {
            Ok(lockfile) => {
                let validation = crate::lockfile::validate(&lockfile);
                checks.push(DoctorCheck {
                    name: "lockfile".into(),
                    ok: validation.valid,
                    detail: if validation.valid {
                        format!("{} server(s) pinned", lockfile.servers.len())
                    } else {
                        validation.errors.join("; ")
                    },
                });
            }
            Err(err) => checks.push(DoctorCheck {
                name: "lockfile".into(),
                ok: false,
                detail: err.to_string(),
            }),
        }
    } else {
        checks.push(DoctorCheck {
            name: "lockfile".into(),
            ok: true,
            detail: format!("absent ({})", store.path().display()),
        });
    }

    match load_policy(policy_path) {
        Ok(Some(_)) => checks.push(DoctorCheck {
            name: "policy".into(),
            ok: true,
            detail: policy_path.display().to_string(),
        }),
        Ok(None) => checks.push(DoctorCheck {
            name: "policy".into(),
            ok: true,
            detail: format!("absent ({})", policy_path.display()),
        }),
        Err(err) => checks.push(DoctorCheck {
            name: "policy".into(),
            ok: false,
            detail: err.to_string(),
        }),
    }

    checks.push(DoctorCheck {
        name: "registry".into(),
        ok: true,
        detail: settings.registry_url.clone(),
    });
    checks.push(DoctorCheck {
        name: "advisories".into(),
        ok: true,
        detail: settings.osv_url.clone(),
    });

    let ok = checks.iter().all(|c| c.ok);
    Ok(DoctorReport {
        envelope: Envelope::new("doctor"),
        checks,
        ok,
    })
}
