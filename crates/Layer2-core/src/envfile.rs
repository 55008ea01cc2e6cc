//! Environment file handling
//!
//! Collected key/value pairs are written as newline-delimited `KEY=VALUE`
//! into a `.env` file colocated with the instance directory, and re-read on
//! a later start. Order is preserved and values may contain `=` (only the
//! first `=` splits). Duplicate names are written as supplied; consumers
//! apply last-write-wins when materializing the process environment.

use cloudhost_foundation::Result;
use std::path::Path;

/// 환경 변수 파일명
pub const ENV_FILE: &str = ".env";

/// Write pairs into `dir/.env`, one `KEY=VALUE` per line.
pub fn write_env_file(dir: &Path, pairs: &[(String, String)]) -> Result<()> {
    let content = pairs
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("\n");
    std::fs::write(dir.join(ENV_FILE), content)?;
    Ok(())
}

/// Read `dir/.env` back, preserving order. Missing file yields no pairs.
pub fn read_env_file(dir: &Path) -> Result<Vec<(String, String)>> {
    let path = dir.join(ENV_FILE);
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(&path)?;
    let mut pairs = Vec::new();
    for line in content.lines() {
        if line.is_empty() {
            continue;
        }
        match line.split_once('=') {
            Some((name, value)) => pairs.push((name.to_string(), value.to_string())),
            None => pairs.push((line.to_string(), String::new())),
        }
    }
    Ok(pairs)
}
