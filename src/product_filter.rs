use crate::config::DateRange;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

const TILE_TOKEN: usize = 2;
const DATE_TOKEN: usize = 3;

/// Product ids from the catalog acquired over `path_row` within `range`.
///
/// Ids look like `LC08_L1TP_091084_20170101_20170218_01_T1`: the third
/// `_`-separated token is the path/row and the fourth the acquisition date.
pub fn extract_products<P: AsRef<Path>>(catalog: P, path_row: &str, range: &DateRange) -> Result<Vec<String>> {
    let catalog = catalog.as_ref();
    let content = fs::read_to_string(catalog)
        .with_context(|| format!("Unable to read catalog {}", catalog.display()))?;
    Ok(filter_products(&content, path_row, range))
}

pub fn filter_products(content: &str, path_row: &str, range: &DateRange) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| matches(line, path_row, range))
        .map(str::to_string)
        .collect()
}

fn matches(id: &str, path_row: &str, range: &DateRange) -> bool {
    let tokens: Vec<&str> = id.split('_').collect();
    match (tokens.get(TILE_TOKEN), tokens.get(DATE_TOKEN)) {
        (Some(tile), Some(date)) => *tile == path_row && range.contains(date),
        _ => false,
    }
}
