//! Country inventory loading.
//!
//! One tabular file per country, first column = phone number. Export
//! tools emit the numbers in several encodings (plain digits, quoted
//! strings, spreadsheet scientific notation), all of which normalize to
//! a dialable digit string here. Membership is immutable after load.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::PoolResult;

/// Minimal digit count for a row to be treated as a real number.
const MIN_NUMBER_DIGITS: usize = 6;

/// Loads every `*.csv` in `dir` as one country inventory; the file stem
/// is the country name.
pub fn load_inventories(dir: &Path) -> PoolResult<BTreeMap<String, Vec<String>>> {
    let mut inventories = BTreeMap::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let Some(country) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let content = fs::read_to_string(&path)?;
        let numbers = parse_inventory_rows(&content);
        tracing::info!(country, count = numbers.len(), "loaded country inventory");
        inventories.insert(country.to_string(), numbers);
    }
    Ok(inventories)
}

/// Parses inventory rows; header lines and sub-threshold rows drop out
/// naturally because they do not normalize to enough digits.
pub fn parse_inventory_rows(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let first_cell = line.split(',').next().unwrap_or_default();
            normalize_number_cell(first_cell)
        })
        .collect()
}

/// Normalizes one inventory cell into a dialable digit string.
fn normalize_number_cell(cell: &str) -> Option<String> {
    let cell = cell.trim().trim_matches('"').trim();
    if cell.is_empty() {
        return None;
    }
    // Spreadsheet exports mangle long numbers into scientific notation.
    let digits = if cell.contains(['E', 'e']) && cell.contains('.') {
        let value: f64 = cell.parse().ok()?;
        if !value.is_finite() || value <= 0.0 {
            return None;
        }
        format!("{value:.0}")
    } else {
        cell.chars().filter(|c| c.is_ascii_digit()).collect()
    };
    if digits.len() >= MIN_NUMBER_DIGITS {
        Some(digits)
    } else {
        None
    }
}
