//! Shared column-info export models, options, reports and errors.

use std::collections::HashMap;
use std::path::PathBuf;

use polars::prelude::DataFrame;

use crate::conf::{
    C_FMT_DEFAULT, C_INDEX_NAME_PLACEHOLDER, C_REGISTRY_COL_DESCRIPTION, C_REGISTRY_COL_FORMAT,
    C_REGISTRY_COL_NAME, C_REGISTRY_COL_UNITS, C_REGISTRY_COL_WIDTH, C_STEPS_SHEET_NAME,
    N_WIDTH_DEFAULT, derive_default_header_format,
};

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification used for header and index cells.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Number format code.
    pub num_format: Option<String>,
}

/// Normalized cell value during conversion/write pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Missing/blank value.
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
    /// Boolean value.
    Boolean(bool),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnRegistrySpecification

/// Display attributes registered for one column name.
///
/// Every attribute is optional; an empty registry cell loads as `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecColumnMeta {
    /// Human description of the column.
    pub description: Option<String>,
    /// Measurement units appended to the description in the steps manifest.
    pub units: Option<String>,
    /// Excel number format code.
    pub format: Option<String>,
    /// Excel column width.
    pub width: Option<f64>,
}

impl SpecColumnMeta {
    /// Meta carrying only a number format and width.
    pub fn with_format(format: impl Into<String>, width: f64) -> Self {
        Self {
            format: Some(format.into()),
            width: Some(width),
            ..Default::default()
        }
    }

    /// Meta carrying every attribute.
    pub fn new(
        description: impl Into<String>,
        units: impl Into<String>,
        format: impl Into<String>,
        width: f64,
    ) -> Self {
        Self {
            description: Some(description.into()),
            units: Some(units.into()),
            format: Some(format.into()),
            width: Some(width),
        }
    }
}

/// CSV layout of the persisted registry file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecRegistryCsvOptions {
    /// Key column holding the column name.
    pub col_name: String,
    /// Description attribute column.
    pub col_description: String,
    /// Units attribute column.
    pub col_units: String,
    /// Number-format attribute column.
    pub col_format: String,
    /// Width attribute column.
    pub col_width: String,
    /// Field delimiter.
    pub delimiter: u8,
}

impl Default for SpecRegistryCsvOptions {
    fn default() -> Self {
        Self {
            col_name: C_REGISTRY_COL_NAME.to_string(),
            col_description: C_REGISTRY_COL_DESCRIPTION.to_string(),
            col_units: C_REGISTRY_COL_UNITS.to_string(),
            col_format: C_REGISTRY_COL_FORMAT.to_string(),
            col_width: C_REGISTRY_COL_WIDTH.to_string(),
            delimiter: b',',
        }
    }
}

impl SpecRegistryCsvOptions {
    /// Attribute column names in persisted order.
    pub fn attribute_columns(&self) -> [&str; 4] {
        [
            &self.col_description,
            &self.col_units,
            &self.col_format,
            &self.col_width,
        ]
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DatasetSpecification

/// Row-label declaration of a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumDatasetIndex {
    /// Implicit 0-based row number, optionally named.
    RowNumber {
        /// Index header name; `None` for an unnamed index.
        name: Option<String>,
    },
    /// Leading row-label columns taken from the frame.
    Columns(Vec<String>),
}

impl Default for EnumDatasetIndex {
    fn default() -> Self {
        Self::RowNumber { name: None }
    }
}

/// One tabular dataset destined for a worksheet.
#[derive(Debug, Clone)]
pub struct SpecDataset {
    /// Frame holding data and index columns.
    pub df: DataFrame,
    /// Row-label declaration.
    pub index: EnumDatasetIndex,
}

impl SpecDataset {
    /// Dataset with an unnamed row-number index.
    pub fn new(df: DataFrame) -> Self {
        Self {
            df,
            index: EnumDatasetIndex::default(),
        }
    }

    /// Dataset with a named row-number index.
    pub fn with_row_number_index(df: DataFrame, name: impl Into<String>) -> Self {
        Self {
            df,
            index: EnumDatasetIndex::RowNumber {
                name: Some(name.into()),
            },
        }
    }

    /// Dataset whose row labels are the given frame columns.
    pub fn with_index_columns<I, S>(df: DataFrame, cols_index: I) -> Result<Self, ColInfoXlsxError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let l_cols_index: Vec<String> = cols_index.into_iter().map(Into::into).collect();
        if l_cols_index.is_empty() {
            return Err(ColInfoXlsxError::InvalidDataset(
                "index column list must not be empty.".to_string(),
            ));
        }
        let l_colnames_df: Vec<&str> = df.get_column_names_str();
        for (n_idx, c_col) in l_cols_index.iter().enumerate() {
            if !l_colnames_df.contains(&c_col.as_str()) {
                return Err(ColInfoXlsxError::InvalidDataset(format!(
                    "Index column not found: {c_col:?}"
                )));
            }
            if l_cols_index[..n_idx].contains(c_col) {
                return Err(ColInfoXlsxError::InvalidDataset(format!(
                    "Index column listed twice: {c_col:?}"
                )));
            }
        }
        Ok(Self {
            df,
            index: EnumDatasetIndex::Columns(l_cols_index),
        })
    }

    /// Index level names in declared order; `None` for an unnamed level.
    pub fn index_names(&self) -> Vec<Option<String>> {
        match &self.index {
            EnumDatasetIndex::RowNumber { name } => vec![name.clone()],
            EnumDatasetIndex::Columns(cols) => cols.iter().cloned().map(Some).collect(),
        }
    }

    /// Data column names in frame order, excluding index columns.
    pub fn data_column_names(&self) -> Vec<String> {
        let l_cols_index: &[String] = match &self.index {
            EnumDatasetIndex::RowNumber { .. } => &[],
            EnumDatasetIndex::Columns(cols) => cols,
        };
        self.df
            .get_column_names_str()
            .into_iter()
            .filter(|c_name| !l_cols_index.iter().any(|c_idx| c_idx == c_name))
            .map(ToString::to_string)
            .collect()
    }

    /// Number of written positions (index levels + data columns).
    pub fn width_positions(&self) -> usize {
        self.index_names().len() + self.data_column_names().len()
    }

    /// Number of data rows.
    pub fn height(&self) -> usize {
        self.df.height()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetPlanSpecification

/// Resolved per-position display plan for one sheet.
///
/// `names_position`, `fmts` and `widths` are aligned 1:1: index levels first,
/// then data columns. An empty format means default column styling; a zero
/// width means the writer leaves the width untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecSheetPlan {
    /// Worksheet name.
    pub sheet_name: String,
    /// Header text per position.
    pub names_position: Vec<String>,
    /// Number format per position.
    pub fmts: Vec<String>,
    /// Column width per position.
    pub widths: Vec<f64>,
}

impl SpecSheetPlan {
    /// Number of positions covered by the plan.
    pub fn len(&self) -> usize {
        self.fmts.len()
    }

    /// Whether the plan covers no positions.
    pub fn is_empty(&self) -> bool {
        self.fmts.is_empty()
    }

    /// Overwrite the format of the position holding `name`, if any.
    pub fn set_format_by_name(&mut self, name: &str, fmt: &str) -> bool {
        match self.names_position.iter().position(|c_name| c_name == name) {
            Some(n_idx) => {
                self.fmts[n_idx] = fmt.to_string();
                true
            }
            None => false,
        }
    }
}

/// Distinct non-empty number formats of one workbook, in first-seen order.
///
/// The position of a format in the table is its identity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecFormatTable {
    pub(crate) l_fmts: Vec<String>,
    pub(crate) dict_fmt_id: HashMap<String, usize>,
}

impl SpecFormatTable {
    /// Identity of `fmt`; `None` for empty or unknown formats.
    pub fn id_of(&self, fmt: &str) -> Option<usize> {
        self.dict_fmt_id.get(fmt).copied()
    }

    /// Format string with identity `id`.
    pub fn get(&self, id: usize) -> Option<&str> {
        self.l_fmts.get(id).map(String::as_str)
    }

    /// Number of distinct formats.
    pub fn len(&self) -> usize {
        self.l_fmts.len()
    }

    /// Whether no format was collected.
    pub fn is_empty(&self) -> bool {
        self.l_fmts.is_empty()
    }

    /// Iterate `(id, format)` pairs in identity order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.l_fmts
            .iter()
            .enumerate()
            .map(|(n_id, c_fmt)| (n_id, c_fmt.as_str()))
    }
}

/// One row of the steps manifest.
///
/// A row with every field `None` is a blank separator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecStepsManifestRow {
    /// Sheet the step applies to.
    pub sheet: Option<String>,
    /// Documented column name.
    pub column: Option<String>,
    /// Step kind (`Col_Format` / `Tbl_FreezeRow1`).
    pub step: Option<String>,
    /// Description, with units when registered.
    pub comment: Option<String>,
    /// Registered number format.
    pub number_format: Option<String>,
    /// Registered column width.
    pub width: Option<f64>,
}

impl SpecStepsManifestRow {
    /// Blank separator row.
    pub fn blank() -> Self {
        Self::default()
    }

    /// Whether this is a blank separator row.
    pub fn is_blank(&self) -> bool {
        self == &Self::default()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ExportOptions

/// Export-wide options controlling resolution defaults and sheet layout.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecExportOptions {
    /// Append the steps manifest sheet.
    pub if_include_steps_manifest: bool,
    /// Format used for positions absent from the registry.
    pub fmt_default: String,
    /// Width used for positions absent from the registry.
    pub width_default: f64,
    /// Header text for an unnamed index.
    pub index_name_placeholder: String,
    /// Sheet name of the steps manifest.
    pub steps_sheet_name: String,
    /// Format of header cells.
    pub fmt_header: SpecCellFormat,
    /// Freeze the header row of every sheet.
    pub if_freeze_header: bool,
}

impl Default for SpecExportOptions {
    fn default() -> Self {
        Self {
            if_include_steps_manifest: false,
            fmt_default: C_FMT_DEFAULT.to_string(),
            width_default: N_WIDTH_DEFAULT,
            index_name_placeholder: C_INDEX_NAME_PLACEHOLDER.to_string(),
            steps_sheet_name: C_STEPS_SHEET_NAME.to_string(),
            fmt_header: derive_default_header_format(),
            if_freeze_header: false,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// Column directive applied to one worksheet column.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecColumnDirective {
    /// Letter range, e.g. `"AD:AD"`.
    pub range: String,
    /// Applied number format, if any.
    pub fmt: Option<String>,
    /// Applied width, if any.
    pub width: Option<f64>,
}

/// Per-sheet write summary.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecSheetReport {
    /// Worksheet name.
    pub sheet_name: String,
    /// Number of data rows written.
    pub n_rows: usize,
    /// Column directives applied, in position order.
    pub directives: Vec<SpecColumnDirective>,
}

/// Workbook write report.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecXlsxReport {
    /// Output file path.
    pub path_file_out: PathBuf,
    /// Sheets written, in workbook order.
    pub sheets: Vec<SpecSheetReport>,
    /// Distinct number formats created.
    pub n_formats: usize,
    /// Non-fatal warnings, e.g. columns written with default formatting.
    pub warnings: Vec<String>,
}

impl SpecXlsxReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Top-level export errors.
#[derive(Debug, thiserror::Error)]
pub enum ColInfoXlsxError {
    /// Persisted registry is missing, malformed or ambiguous.
    #[error("Failed to load column info {}: {message}", path.display())]
    RegistryLoad {
        /// Registry source path (`<reader>` for in-memory sources).
        path: PathBuf,
        /// Failure detail.
        message: String,
    },
    /// Registry could not be written back.
    #[error("Failed to save column info {}: {message}", path.display())]
    RegistrySave {
        /// Registry destination path.
        path: PathBuf,
        /// Failure detail.
        message: String,
    },
    /// Dataset and sheet-name lists differ in length.
    #[error(
        "Must be same number of datasets and sheet names (datasets={n_datasets}, sheets={n_sheet_names})"
    )]
    MismatchedInput {
        /// Number of datasets supplied.
        n_datasets: usize,
        /// Number of sheet names supplied.
        n_sheet_names: usize,
    },
    /// Sheet names would be rejected by Excel.
    #[error("Invalid sheet name: {0}")]
    InvalidSheetName(String),
    /// Dataset declaration is inconsistent with its frame.
    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),
    /// Underlying workbook writer failed.
    #[error("xlsx write error: {0}")]
    Write(String),
}

impl From<rust_xlsxwriter::XlsxError> for ColInfoXlsxError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Self::Write(err.to_string())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
