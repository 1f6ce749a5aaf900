//! `colinfo_xlsx` v1:
//! Multi-sheet XLSX export driven by a column-info registry.
//!
//! Module layout:
//! - `conf`     : constants and default presets
//! - `spec`     : specs/models/options/errors
//! - `util`     : pure helper functions
//! - `registry` : column-info registry and its CSV persistence
//! - `resolve`  : per-sheet format resolution and format deduplication
//! - `manifest` : "ExcelSteps" documentation sheet
//! - `writer`   : workbook sink trait and `rust_xlsxwriter` writer
//! - `assemble` : orchestration and public entry points
pub mod assemble;
pub mod conf;
pub mod manifest;
pub mod registry;
pub mod resolve;
pub mod spec;
pub mod util;
pub mod writer;

pub use assemble::{
    SpecWorkbookPlan, assemble, plan_workbook, try_write_workbook, write_workbook,
};
pub use conf::{
    C_FMT_DEFAULT, C_FMT_TEXT, C_STEPS_SHEET_NAME, N_LEN_EXCEL_SHEET_NAME_MAX, N_WIDTH_DEFAULT,
};
pub use manifest::create_steps_manifest;
pub use registry::ColumnRegistry;
pub use resolve::{plan_format_table, resolve_sheet_plan};
pub use spec::{
    ColInfoXlsxError, EnumCellValue, EnumDatasetIndex, SpecCellFormat, SpecColumnDirective,
    SpecColumnMeta, SpecDataset, SpecExportOptions, SpecFormatTable, SpecRegistryCsvOptions,
    SpecSheetPlan, SpecSheetReport, SpecStepsManifestRow, SpecXlsxReport,
};
pub use util::derive_column_range;
pub use writer::{WorkbookSink, XlsxWriter};
