//! Remote host probes and output parsing
//!
//! Everything here shells out to standard Linux tools and parses their
//! output leniently: the remote filesystem is the authoritative source for
//! backup history, and a snapshot probe that fails to parse degrades its
//! field to a default instead of failing the whole call.

use crate::Result;
use barback_ssh::RemoteExecutor;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One backup archive discovered on the remote host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    /// Identifier accepted by restore (the archive filename)
    pub id: String,
    /// Archive filename
    pub filename: String,
    /// Human-readable size as reported by the remote host
    pub size: String,
    /// Modification date string
    pub date: String,
}

/// Point-in-time snapshot of the remote host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSnapshot {
    /// Remote hostname
    pub hostname: String,
    /// Operating system description
    pub os_version: String,
    /// Total root filesystem size in bytes
    pub total_disk: u64,
    /// Used root filesystem size in bytes
    pub used_disk: u64,
    /// CPU usage percentage
    pub cpu_usage: f64,
    /// Memory usage percentage
    pub memory_usage: f64,
}

/// Probe the remote host for a [`SystemSnapshot`].
///
/// Individual probe failures leave the affected fields at their defaults;
/// a connected session never fails this call outright.
pub async fn system_snapshot(executor: &dyn RemoteExecutor) -> Result<SystemSnapshot> {
    let mut snapshot = SystemSnapshot::default();

    match executor.exec("hostname").await {
        Ok(output) => snapshot.hostname = output.stdout.trim().to_string(),
        Err(e) => debug!("hostname probe failed: {}", e),
    }

    match executor
        .exec(". /etc/os-release 2>/dev/null && echo \"$PRETTY_NAME\" || uname -sr")
        .await
    {
        Ok(output) => snapshot.os_version = output.stdout.trim().to_string(),
        Err(e) => debug!("os probe failed: {}", e),
    }

    match executor.exec("df -B1 --output=size,used / | tail -1").await {
        Ok(output) => {
            if let Some((total, used)) = parse_df_output(&output.stdout) {
                snapshot.total_disk = total;
                snapshot.used_disk = used;
            }
        }
        Err(e) => debug!("disk probe failed: {}", e),
    }

    match executor.exec("free -b | grep -i mem").await {
        Ok(output) => {
            if let Some(usage) = parse_free_output(&output.stdout) {
                snapshot.memory_usage = usage;
            }
        }
        Err(e) => debug!("memory probe failed: {}", e),
    }

    match executor.exec("top -bn1 | grep '%Cpu'").await {
        Ok(output) => {
            if let Some(usage) = parse_cpu_line(&output.stdout) {
                snapshot.cpu_usage = usage;
            }
        }
        Err(e) => debug!("cpu probe failed: {}", e),
    }

    Ok(snapshot)
}

/// Parse `df -B1 --output=size,used` output into `(total, used)` bytes.
pub(crate) fn parse_df_output(line: &str) -> Option<(u64, u64)> {
    let mut fields = line.split_whitespace();
    let total = fields.next()?.parse().ok()?;
    let used = fields.next()?.parse().ok()?;
    Some((total, used))
}

/// Parse the `Mem:` line of `free -b` into a used-percentage.
pub(crate) fn parse_free_output(line: &str) -> Option<f64> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    // Mem: total used free ...
    let total: f64 = fields.get(1)?.parse().ok()?;
    let used: f64 = fields.get(2)?.parse().ok()?;
    if total <= 0.0 {
        return None;
    }
    Some((used / total * 1000.0).round() / 10.0)
}

/// Parse the `%Cpu(s):` line of `top -bn1` into a usage percentage,
/// derived from the idle column.
pub(crate) fn parse_cpu_line(line: &str) -> Option<f64> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let idle_pos = fields.iter().position(|f| f.starts_with("id"))?;
    let idle: f64 = fields
        .get(idle_pos.checked_sub(1)?)?
        .trim_end_matches(',')
        .replace(',', ".")
        .parse()
        .ok()?;
    Some(((100.0 - idle) * 10.0).round() / 10.0)
}

/// Parse `ls -lh --time-style=long-iso` output into backup records.
///
/// Lines that do not look like a listing entry are skipped.
pub(crate) fn parse_backup_listing(output: &str) -> Vec<BackupRecord> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            // -rw-r--r-- 1 root root 1.2G 2024-01-01 00:00 /tmp/backup-....tar.gz
            if fields.len() < 8 || !fields[0].starts_with('-') {
                return None;
            }
            let path = fields[7];
            let filename = path.rsplit('/').next()?.to_string();
            if !filename.starts_with("backup-") {
                return None;
            }
            Some(BackupRecord {
                id: filename.clone(),
                filename,
                size: fields[4].to_string(),
                date: format!("{} {}", fields[5], fields[6]),
            })
        })
        .collect()
}
