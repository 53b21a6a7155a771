//! Plain-text list of submitted ESPA order ids, one per line.
use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Order ids to resume, last submitted first. Blank lines are skipped.
pub fn read_jobs<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Unable to read jobs file {}", path.display()))?;
    Ok(content
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

pub fn append_job<P: AsRef<Path>>(path: P, order_id: &str) -> Result<()> {
    let path = path.as_ref();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Unable to open jobs file {}", path.display()))?;
    writeln!(file, "{order_id}")?;
    Ok(())
}
