//! Human-readable rendering of workflow reports
//!
//! All terminal output for reports lives here; the workflows themselves
//! never print.

use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use owo_colors::OwoColorize;

use crate::core::types::{Severity, Verdict};
use crate::lockfile::Lockfile;
use crate::workflows::report::{
    AddReport, DoctorReport, ScanReport, ValidateReport, VerifyReport, VerifyStatus,
};

/// Success message with checkmark
#[must_use]
pub fn success(msg: &str) -> String {
    format!("{} {}", "✓".green().bold(), msg)
}

/// Error message with X
#[must_use]
pub fn error(msg: &str) -> String {
    format!("{} {}", "✗".red().bold(), msg)
}

/// Warning message with triangle
#[must_use]
pub fn warning(msg: &str) -> String {
    format!("{} {}", "⚠".yellow().bold(), msg)
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn colored_verdict(verdict: Verdict) -> String {
    match verdict {
        Verdict::Clean => verdict.to_string().green().to_string(),
        Verdict::Warning => verdict.to_string().yellow().to_string(),
        Verdict::Suspicious => verdict.to_string().red().to_string(),
        Verdict::Malicious => verdict.to_string().red().bold().to_string(),
        Verdict::Unknown => verdict.to_string().dimmed().to_string(),
    }
}

fn colored_severity(severity: Severity) -> String {
    match severity {
        Severity::Critical => severity.to_string().red().bold().to_string(),
        Severity::High => severity.to_string().red().to_string(),
        Severity::Medium => severity.to_string().yellow().to_string(),
        Severity::Low => severity.to_string().cyan().to_string(),
        Severity::Info => severity.to_string().dimmed().to_string(),
    }
}

pub fn render_add(report: &AddReport) {
    println!(
        "{}",
        success(&format!(
            "Pinned {}@{} ({} artifact(s))",
            report.namespace.bold(),
            report.version,
            report.artifacts.len()
        ))
    );
    if report.verified {
        println!(
            "  verified via {}{}",
            report.verification_method.as_deref().unwrap_or("unknown"),
            report
                .verified_owner
                .as_deref()
                .map(|o| format!(" (owner {o})"))
                .unwrap_or_default()
        );
    } else {
        println!("{}", warning("identity is unverified"));
    }
    println!(
        "  verdict {} | risk score {}",
        colored_verdict(report.verdict),
        report.risk_score
    );
    if !report.skipped_kinds.is_empty() {
        println!(
            "  skipped unsupported package kinds: {}",
            report.skipped_kinds.join(", ")
        );
    }
    if report.policy_overridden {
        println!(
            "{}",
            warning(&format!(
                "policy was overridden by {}",
                report.approved_by.as_deref().unwrap_or("unknown")
            ))
        );
    }
    render_findings(&report.findings);
}

pub fn render_scan(report: &ScanReport) {
    let mut table = new_table();
    table.set_header(vec!["namespace", "version", "verdict", "risk", "findings"]);
    for server in &report.servers {
        table.add_row(vec![
            server.namespace.clone(),
            server.version.clone(),
            colored_verdict(server.verdict),
            server.risk_score.to_string(),
            server.findings.len().to_string(),
        ]);
    }
    println!("{table}");

    for server in &report.servers {
        for err in &server.errors {
            println!("{}", error(&format!("{}: {err}", server.namespace)));
        }
        if server.policy_blocked {
            for reason in &server.policy_reasons {
                println!(
                    "{}",
                    error(&format!(
                        "{}: blocked [{}] {}",
                        server.namespace,
                        reason.code.as_str(),
                        reason.message
                    ))
                );
            }
        }
    }

    let verdicts: Vec<String> = report
        .summary
        .verdicts
        .iter()
        .map(|(v, n)| format!("{n} {v}"))
        .collect();
    println!(
        "{} server(s), {} artifact(s): {}",
        report.summary.servers,
        report.summary.artifacts,
        verdicts.join(", ")
    );
    if report.summary.policy.enforced {
        if report.summary.policy.blocked == 0 {
            println!("{}", success("policy: no servers blocked"));
        } else {
            println!(
                "{}",
                error(&format!(
                    "policy: {} server(s) blocked",
                    report.summary.policy.blocked
                ))
            );
        }
    }
}

pub fn render_verify(report: &VerifyReport) {
    for entry in &report.entries {
        match entry.status {
            VerifyStatus::Ok => {
                println!("{}", success(&format!("{} {}", entry.namespace, entry.digest)));
            }
            VerifyStatus::Drift => {
                println!("{}", error(&format!("{} drifted", entry.namespace)));
                if let Some(message) = &entry.message {
                    println!("{message}");
                }
            }
            VerifyStatus::CacheMiss => {
                println!(
                    "{}",
                    warning(&format!("{}: {}", entry.namespace, "cache miss (offline)"))
                );
            }
            VerifyStatus::Error => {
                println!(
                    "{}",
                    error(&format!(
                        "{}: {}",
                        entry.namespace,
                        entry.message.as_deref().unwrap_or("verification error")
                    ))
                );
            }
        }
    }
    if report.ok {
        println!("{}", success("all pinned artifacts match"));
    }
}

pub fn render_validate(report: &ValidateReport) {
    for (name, doc) in [("lockfile", &report.lockfile), ("policy", &report.policy)] {
        if !doc.present {
            println!("  {name}: absent");
        } else if doc.valid {
            println!("{}", success(&format!("{name}: valid")));
        } else {
            println!("{}", error(&format!("{name}: invalid")));
            for err in &doc.errors {
                println!("    {err}");
            }
        }
    }
}

pub fn render_doctor(report: &DoctorReport) {
    for check in &report.checks {
        let line = format!("{}: {}", check.name, check.detail);
        if check.ok {
            println!("{}", success(&line));
        } else {
            println!("{}", error(&line));
        }
    }
}

pub fn render_list(lockfile: &Lockfile) {
    if lockfile.servers.is_empty() {
        println!("no servers pinned");
        return;
    }
    let mut table = new_table();
    table.set_header(vec!["namespace", "version", "verified", "artifacts", "fetched"]);
    for (namespace, entry) in &lockfile.servers {
        table.add_row(vec![
            namespace.clone(),
            entry.version.clone(),
            if entry.verified {
                format!(
                    "yes ({})",
                    entry.verification_method.as_deref().unwrap_or("-")
                )
            } else {
                "no".into()
            },
            entry.artifacts.len().to_string(),
            entry.fetched_at.clone(),
        ]);
    }
    println!("{table}");
}

fn render_findings(findings: &[crate::core::types::Finding]) {
    if findings.is_empty() {
        return;
    }
    let mut table = new_table();
    table.set_header(vec!["severity", "rule", "message"]);
    for finding in findings {
        table.add_row(vec![
            colored_severity(finding.severity),
            finding.rule_id.clone(),
            finding.message.clone(),
        ]);
    }
    println!("{table}");
}
