//! Column-info export constants and default preset factories.

use crate::spec::{SpecCellFormat, SpecExportOptions, SpecRegistryCsvOptions};

/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Number format assigned to positions with no registry entry.
pub const C_FMT_DEFAULT: &str = "0";
/// Column width assigned to positions with no registry entry.
pub const N_WIDTH_DEFAULT: f64 = 10.0;
/// Text number format.
pub const C_FMT_TEXT: &str = "@";
/// Header text given to an unnamed row index.
pub const C_INDEX_NAME_PLACEHOLDER: &str = "index";

/// Registry key column.
pub const C_REGISTRY_COL_NAME: &str = "Name";
/// Registry description column.
pub const C_REGISTRY_COL_DESCRIPTION: &str = "Description";
/// Registry units column.
pub const C_REGISTRY_COL_UNITS: &str = "Units";
/// Registry number-format column.
pub const C_REGISTRY_COL_FORMAT: &str = "XLFormat";
/// Registry column-width column.
pub const C_REGISTRY_COL_WIDTH: &str = "XLWidth";

/// Sheet name of the steps manifest.
pub const C_STEPS_SHEET_NAME: &str = "ExcelSteps";
/// Index name of the steps manifest.
pub const C_STEPS_INDEX_NAME: &str = "row";
/// Step kind emitted for every documented column.
pub const C_STEP_COL_FORMAT: &str = "Col_Format";
/// Step kind asking the consumer to freeze the header row.
pub const C_STEP_FREEZE_ROW1: &str = "Tbl_FreezeRow1";

/// Manifest column: sheet the step applies to.
pub const C_STEPS_COL_SHEET: &str = "Sheet";
/// Manifest column: documented column name.
pub const C_STEPS_COL_COLUMN: &str = "Column";
/// Manifest column: step kind.
pub const C_STEPS_COL_STEP: &str = "Step";
/// Manifest column: formula, list name or sort key; left empty.
pub const C_STEPS_COL_FORMULA: &str = "Formula/List Name/Sort-by";
/// Manifest column: insertion anchor column; left empty.
pub const C_STEPS_COL_AFTER: &str = "After or End Column";
/// Manifest column: keep-formulas flag; left empty.
pub const C_STEPS_COL_KEEP_FORMULAS: &str = "Keep Formulas";
/// Manifest column: description with units.
pub const C_STEPS_COL_COMMENT: &str = "Comment";
/// Manifest column: registered number format.
pub const C_STEPS_COL_NUMBER_FORMAT: &str = "Number Format";
/// Manifest column: registered column width.
pub const C_STEPS_COL_WIDTH: &str = "Width";

/// Steps manifest data columns in sheet order.
pub const TUP_STEPS_COLUMNS: [&str; 9] = [
    C_STEPS_COL_SHEET,
    C_STEPS_COL_COLUMN,
    C_STEPS_COL_STEP,
    C_STEPS_COL_FORMULA,
    C_STEPS_COL_AFTER,
    C_STEPS_COL_KEEP_FORMULAS,
    C_STEPS_COL_COMMENT,
    C_STEPS_COL_NUMBER_FORMAT,
    C_STEPS_COL_WIDTH,
];

/// Steps manifest columns forced to text format.
pub const TUP_STEPS_TEXT_COLUMNS: [&str; 2] = [C_STEPS_COL_FORMULA, C_STEPS_COL_NUMBER_FORMAT];

/// Header cell format matching the pandas header look (bold, thin border, centered).
pub fn derive_default_header_format() -> SpecCellFormat {
    SpecCellFormat {
        bold: Some(true),
        border: Some(1),
        align: Some("center".to_string()),
        valign: Some("top".to_string()),
        ..Default::default()
    }
}

/// Build default export options.
pub fn derive_default_export_options() -> SpecExportOptions {
    SpecExportOptions::default()
}

/// Build default registry CSV options.
pub fn derive_default_registry_csv_options() -> SpecRegistryCsvOptions {
    SpecRegistryCsvOptions::default()
}
