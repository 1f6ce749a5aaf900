//! Stateless helper utilities shared by resolution, registry and writer.

use std::collections::BTreeMap;

use crate::conf::{N_LEN_EXCEL_SHEET_NAME_MAX, TUP_EXCEL_ILLEGAL};
use crate::spec::EnumCellValue;

////////////////////////////////////////////////////////////////////////////////
// #region ColumnAddressing

/// Convert a 1-based column number into Excel letters (`1 -> "A"`, `27 -> "AA"`).
///
/// Returns `None` for `0`.
pub fn derive_column_letters(n_col_1based: usize) -> Option<String> {
    if n_col_1based == 0 {
        return None;
    }

    let mut l_letters = Vec::new();
    let mut n_col = n_col_1based;
    while n_col > 0 {
        let n_rem = (n_col - 1) % 26;
        l_letters.push(char::from(b'A' + n_rem as u8));
        n_col = (n_col - 1) / 26;
    }
    Some(l_letters.into_iter().rev().collect())
}

/// Convert a 1-based column number into a single-column range (`30 -> "AD:AD"`).
pub fn derive_column_range(n_col_1based: usize) -> Option<String> {
    derive_column_letters(n_col_1based).map(|c_letters| format!("{c_letters}:{c_letters}"))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FormatText

/// Remove every `"` so the format code is accepted by the workbook writer.
pub fn strip_format_quotes(fmt: &str) -> String {
    fmt.replace('"', "")
}

/// Render a width for the registry file; integral widths drop the fraction.
pub fn format_width_text(width: f64) -> String {
    if width.is_finite() && width.fract() == 0.0 {
        format!("{}", width as i64)
    } else {
        width.to_string()
    }
}

/// Parse a registry width cell; empty text is `Ok(None)`.
pub fn parse_width_text(text: &str) -> Result<Option<f64>, String> {
    let c_text = text.trim();
    if c_text.is_empty() {
        return Ok(None);
    }
    match c_text.parse::<f64>() {
        Ok(val) if val.is_nan() => Ok(None),
        Ok(val) if val.is_finite() && val >= 0.0 => Ok(Some(val)),
        _ => Err(format!("Invalid width: {c_text:?}")),
    }
}

/// Map an empty registry cell to `None`.
pub fn convert_empty_to_none(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Manifest comment: description, with `" in <units>"` appended when units are present.
pub fn derive_description_with_units(description: &str, units: Option<&str>) -> String {
    match units {
        Some(c_units) if !c_units.is_empty() => format!("{description} in {c_units}"),
        _ => description.to_string(),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellValueConversion

/// Blank out non-finite numbers; other values pass through.
pub fn convert_cell_value(value: EnumCellValue) -> EnumCellValue {
    match value {
        EnumCellValue::Number(n) if !n.is_finite() => EnumCellValue::None,
        other => other,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNameValidation

/// Validate one Excel sheet name.
pub fn validate_sheet_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Sheet name must not be blank.".to_string());
    }
    if name.chars().count() > N_LEN_EXCEL_SHEET_NAME_MAX {
        return Err(format!(
            "Sheet name {name:?} exceeds {N_LEN_EXCEL_SHEET_NAME_MAX} characters."
        ));
    }
    if let Some(c_illegal) = TUP_EXCEL_ILLEGAL.iter().find(|c| name.contains(**c)) {
        return Err(format!(
            "Sheet name {name:?} contains illegal character {c_illegal:?}."
        ));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(format!(
            "Sheet name {name:?} must not start or end with an apostrophe."
        ));
    }
    Ok(())
}

/// Validate that sheet names are individually valid and unique (case-insensitive, as Excel).
pub fn validate_sheet_names(names: &[String]) -> Result<(), String> {
    let mut dict_pos: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (n_idx, c_name) in names.iter().enumerate() {
        validate_sheet_name(c_name)?;
        dict_pos.entry(c_name.to_lowercase()).or_default().push(n_idx);
    }

    let c_msg = dict_pos
        .iter()
        .filter_map(|(c_name, l_pos)| {
            if l_pos.len() > 1 {
                Some(format!("{c_name:?} x{} at indices {:?}", l_pos.len(), l_pos))
            } else {
                None
            }
        })
        .collect::<Vec<_>>()
        .join("; ");

    if c_msg.is_empty() {
        Ok(())
    } else {
        Err(format!("Duplicate sheet names detected: {c_msg}"))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
