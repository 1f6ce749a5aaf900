//! Workbook assembly: manifest injection, resolution, deduplication, write.

use std::borrow::Cow;
use std::path::Path;

use tracing::{debug, error, info};

use crate::conf::{C_FMT_TEXT, TUP_STEPS_TEXT_COLUMNS, derive_default_export_options};
use crate::manifest::create_steps_manifest;
use crate::registry::ColumnRegistry;
use crate::resolve::{plan_format_table, resolve_sheet_plan};
use crate::spec::{
    ColInfoXlsxError, SpecDataset, SpecExportOptions, SpecFormatTable, SpecSheetPlan,
    SpecXlsxReport,
};
use crate::util::validate_sheet_names;
use crate::writer::{WorkbookSink, XlsxWriter};

/// Everything needed to write one workbook.
#[derive(Debug, Clone)]
pub struct SpecWorkbookPlan {
    /// Steps manifest dataset, when requested; written after the input sheets.
    pub steps_manifest: Option<SpecDataset>,
    /// One plan per written sheet, in workbook order.
    pub plans: Vec<SpecSheetPlan>,
    /// Distinct formats across `plans`.
    pub format_table: SpecFormatTable,
    /// Input columns that fell back to the default format and width.
    pub warnings: Vec<String>,
}

impl SpecWorkbookPlan {
    /// Pair every plan with its dataset, in workbook order.
    pub fn sheets<'a>(
        &'a self,
        datasets: &'a [SpecDataset],
    ) -> impl Iterator<Item = (&'a SpecDataset, &'a SpecSheetPlan)> {
        datasets
            .iter()
            .chain(self.steps_manifest.iter())
            .zip(self.plans.iter())
    }
}

/// Resolve formats for `datasets` without writing anything.
///
/// `registry` is never modified; manifest-specific entries live in a copy.
pub fn plan_workbook<S: AsRef<str>>(
    datasets: &[SpecDataset],
    sheet_names: &[S],
    registry: &ColumnRegistry,
    options: &SpecExportOptions,
) -> Result<SpecWorkbookPlan, ColInfoXlsxError> {
    if datasets.len() != sheet_names.len() {
        return Err(ColInfoXlsxError::MismatchedInput {
            n_datasets: datasets.len(),
            n_sheet_names: sheet_names.len(),
        });
    }

    let mut l_sheet_names: Vec<String> = sheet_names
        .iter()
        .map(|c_name| c_name.as_ref().to_string())
        .collect();
    if options.if_include_steps_manifest {
        l_sheet_names.push(options.steps_sheet_name.clone());
    }
    validate_sheet_names(&l_sheet_names).map_err(ColInfoXlsxError::InvalidSheetName)?;

    let (steps_manifest, registry_used) = if options.if_include_steps_manifest {
        let iter_sheets = datasets
            .iter()
            .zip(l_sheet_names.iter().map(String::as_str));
        let (ds_steps, registry_steps) = create_steps_manifest(iter_sheets, registry, options)?;
        (Some(ds_steps), Cow::Owned(registry_steps))
    } else {
        (None, Cow::Borrowed(registry))
    };

    let mut warnings = Vec::new();
    for (dataset, c_sheet) in datasets.iter().zip(&l_sheet_names) {
        let iter_names = dataset
            .index_names()
            .into_iter()
            .flatten()
            .chain(dataset.data_column_names());
        for c_col in iter_names {
            if !registry_used.contains(&c_col) {
                warnings.push(format!(
                    "Sheet {c_sheet:?}: column {c_col:?} has no column info; using format {:?} and width {}.",
                    options.fmt_default, options.width_default
                ));
            }
        }
    }

    let mut plans: Vec<SpecSheetPlan> = datasets
        .iter()
        .chain(steps_manifest.iter())
        .zip(&l_sheet_names)
        .map(|(dataset, c_name)| resolve_sheet_plan(dataset, c_name, &registry_used, options))
        .collect();

    if steps_manifest.is_some()
        && let Some(plan_steps) = plans.last_mut()
    {
        for c_col in TUP_STEPS_TEXT_COLUMNS {
            plan_steps.set_format_by_name(c_col, C_FMT_TEXT);
        }
    }

    let format_table = plan_format_table(&plans);
    debug!(
        n_sheets = plans.len(),
        n_formats = format_table.len(),
        n_unregistered = warnings.len(),
        "planned workbook"
    );

    Ok(SpecWorkbookPlan {
        steps_manifest,
        plans,
        format_table,
        warnings,
    })
}

/// Plan `datasets` and write them through `sink`, committing on success.
pub fn assemble<S: AsRef<str>, W: WorkbookSink>(
    datasets: &[SpecDataset],
    sheet_names: &[S],
    registry: &ColumnRegistry,
    options: &SpecExportOptions,
    sink: &mut W,
) -> Result<SpecWorkbookPlan, ColInfoXlsxError> {
    let workbook_plan = plan_workbook(datasets, sheet_names, registry, options)?;

    sink.register_formats(&workbook_plan.format_table)?;
    for (dataset, plan) in workbook_plan.sheets(datasets) {
        sink.write_sheet(dataset, plan, &workbook_plan.format_table)?;
    }
    sink.close()?;

    Ok(workbook_plan)
}

/// Write `datasets` to `path_file_out` as an `.xlsx` workbook.
pub fn try_write_workbook<S: AsRef<str>>(
    datasets: &[SpecDataset],
    sheet_names: &[S],
    path_file_out: impl AsRef<Path>,
    registry: &ColumnRegistry,
    options: &SpecExportOptions,
) -> Result<SpecXlsxReport, ColInfoXlsxError> {
    let mut writer = XlsxWriter::new(path_file_out.as_ref().to_path_buf(), options);
    let workbook_plan = assemble(datasets, sheet_names, registry, options, &mut writer)?;

    let mut report = writer.report();
    for c_msg in &workbook_plan.warnings {
        report.warn(c_msg);
    }
    Ok(report)
}

/// Write a workbook and return a status message instead of an error.
///
/// Success reads `"<path> Written Successfully"`; failure reads `"ERROR: <reason>"`.
pub fn write_workbook<S: AsRef<str>>(
    datasets: &[SpecDataset],
    sheet_names: &[S],
    path_file_out: impl AsRef<Path>,
    registry: &ColumnRegistry,
    if_include_steps_manifest: bool,
) -> String {
    let path_file_out = path_file_out.as_ref();
    let options = SpecExportOptions {
        if_include_steps_manifest,
        ..derive_default_export_options()
    };
    match try_write_workbook(datasets, sheet_names, path_file_out, registry, &options) {
        Ok(report) => {
            info!(
                path = %path_file_out.display(),
                n_sheets = report.sheets.len(),
                n_formats = report.n_formats,
                "export finished"
            );
            format!("{} Written Successfully", path_file_out.display())
        }
        Err(err) => {
            error!(path = %path_file_out.display(), %err, "export failed");
            format!("ERROR: {err}")
        }
    }
}

#[cfg(test)]
mod tests {
    use polars::prelude::{Column, DataFrame};

    use super::*;
    use crate::spec::SpecColumnMeta;

    #[derive(Debug, Default)]
    struct RecordingSink {
        l_formats: Vec<String>,
        l_sheets: Vec<(String, Vec<Option<usize>>, Vec<f64>)>,
        if_closed: bool,
        if_fail_close: bool,
    }

    impl WorkbookSink for RecordingSink {
        fn register_formats(&mut self, table: &SpecFormatTable) -> Result<(), ColInfoXlsxError> {
            self.l_formats = table.iter().map(|(_, c_fmt)| c_fmt.to_string()).collect();
            Ok(())
        }

        fn write_sheet(
            &mut self,
            _dataset: &SpecDataset,
            plan: &SpecSheetPlan,
            table: &SpecFormatTable,
        ) -> Result<(), ColInfoXlsxError> {
            let l_ids = plan.fmts.iter().map(|c_fmt| table.id_of(c_fmt)).collect();
            self.l_sheets
                .push((plan.sheet_name.clone(), l_ids, plan.widths.clone()));
            Ok(())
        }

        fn close(&mut self) -> Result<(), ColInfoXlsxError> {
            if self.if_fail_close {
                return Err(ColInfoXlsxError::Write("disk full".to_string()));
            }
            self.if_closed = true;
            Ok(())
        }
    }

    fn derive_dataset(cols: &[&str]) -> SpecDataset {
        let l_cols: Vec<Column> = cols
            .iter()
            .map(|c_name| Column::new((*c_name).into(), &[1.0f64, 2.5]))
            .collect();
        SpecDataset::new(DataFrame::new(l_cols).expect("frame"))
    }

    fn derive_registry() -> ColumnRegistry {
        let mut registry = ColumnRegistry::new();
        registry.insert("Revenue", SpecColumnMeta::new("Annual Revenue", "USD", "$0.00", 11.0));
        registry.insert("Cost", SpecColumnMeta::new("Annual Cost", "USD", "$0.00", 11.0));
        registry.insert("Share", SpecColumnMeta::new("Market share", "", "0.0%", 8.0));
        registry
    }

    #[test]
    fn test_mismatched_input_writes_nothing() {
        let datasets = vec![derive_dataset(&["Revenue"]), derive_dataset(&["Cost"])];
        let mut sink = RecordingSink::default();

        let err = assemble(
            &datasets,
            &["Sheet1"],
            &derive_registry(),
            &SpecExportOptions::default(),
            &mut sink,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            ColInfoXlsxError::MismatchedInput {
                n_datasets: 2,
                n_sheet_names: 1
            }
        ));
        assert!(sink.l_formats.is_empty());
        assert!(sink.l_sheets.is_empty());
        assert!(!sink.if_closed);
    }

    #[test]
    fn test_write_workbook_mismatch_returns_error_status_and_no_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.xlsx");
        let datasets = vec![derive_dataset(&["Revenue"]), derive_dataset(&["Cost"])];

        let c_status = write_workbook(&datasets, &["Sheet1"], &path, &derive_registry(), false);

        assert!(c_status.starts_with("ERROR: Must be same number of datasets and sheet names"));
        assert!(!path.exists());
    }

    #[test]
    fn test_assemble_shares_format_ids_across_sheets() {
        let datasets = vec![
            derive_dataset(&["Revenue", "Share"]),
            derive_dataset(&["Cost", "Other"]),
        ];
        let mut sink = RecordingSink::default();

        let workbook_plan = assemble(
            &datasets,
            &["Sheet1", "Sheet2"],
            &derive_registry(),
            &SpecExportOptions::default(),
            &mut sink,
        )
        .expect("assemble");

        assert_eq!(sink.l_formats, vec!["0", "$0.00", "0.0%"]);
        assert_eq!(
            sink.l_sheets,
            vec![
                (
                    "Sheet1".to_string(),
                    vec![Some(0), Some(1), Some(2)],
                    vec![10.0, 11.0, 8.0]
                ),
                (
                    "Sheet2".to_string(),
                    vec![Some(0), Some(1), Some(0)],
                    vec![10.0, 11.0, 10.0]
                ),
            ]
        );
        assert!(sink.if_closed);
        assert!(workbook_plan.steps_manifest.is_none());
        assert_eq!(
            workbook_plan.warnings,
            vec![
                "Sheet \"Sheet2\": column \"Other\" has no column info; using format \"0\" and width 10."
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_assemble_appends_steps_manifest_with_text_columns() {
        let datasets = vec![derive_dataset(&["Revenue", "Other"])];
        let registry = derive_registry();
        let registry_before = registry.clone();
        let options = SpecExportOptions {
            if_include_steps_manifest: true,
            ..Default::default()
        };
        let mut sink = RecordingSink::default();

        let workbook_plan =
            assemble(&datasets, &["Sales"], &registry, &options, &mut sink).expect("assemble");

        assert_eq!(registry, registry_before);
        assert_eq!(workbook_plan.plans.len(), 2);
        let plan_steps = &workbook_plan.plans[1];
        assert_eq!(plan_steps.sheet_name, "ExcelSteps");
        assert_eq!(plan_steps.names_position[0], "row");
        assert_eq!(plan_steps.names_position[4], "Formula/List Name/Sort-by");
        assert_eq!(plan_steps.names_position[8], "Number Format");
        assert_eq!(plan_steps.fmts[4], "@");
        assert_eq!(plan_steps.fmts[8], "@");
        assert_eq!(plan_steps.fmts[1], "0");
        assert_eq!(plan_steps.len(), 10);

        let ds_steps = workbook_plan.steps_manifest.as_ref().expect("manifest");
        assert_eq!(ds_steps.height(), 4);

        assert_eq!(sink.l_sheets.len(), 2);
        assert_eq!(sink.l_sheets[1].0, "ExcelSteps");
        assert_eq!(sink.l_formats, vec!["0", "$0.00", "@"]);
        assert_eq!(plan_steps.widths[4], 10.0);
        assert_eq!(plan_steps.widths[8], 10.0);
        assert_eq!(workbook_plan.warnings.len(), 1);
    }

    #[test]
    fn test_assemble_rejects_duplicate_sheet_names_before_writing() {
        let datasets = vec![derive_dataset(&["Revenue"]), derive_dataset(&["Cost"])];
        let mut sink = RecordingSink::default();

        let err = assemble(
            &datasets,
            &["Data", "data"],
            &derive_registry(),
            &SpecExportOptions::default(),
            &mut sink,
        )
        .unwrap_err();

        assert!(matches!(err, ColInfoXlsxError::InvalidSheetName(_)));
        assert!(sink.l_sheets.is_empty());
    }

    #[test]
    fn test_assemble_propagates_write_failure() {
        let datasets = vec![derive_dataset(&["Revenue"])];
        let mut sink = RecordingSink {
            if_fail_close: true,
            ..Default::default()
        };

        let err = assemble(
            &datasets,
            &["Sheet1"],
            &derive_registry(),
            &SpecExportOptions::default(),
            &mut sink,
        )
        .unwrap_err();

        assert_eq!(err.to_string(), "xlsx write error: disk full");
    }

    #[test]
    fn test_write_workbook_end_to_end() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("report.xlsx");
        let datasets = vec![
            derive_dataset(&["Revenue", "Share"]),
            derive_dataset(&["Cost"]),
        ];

        let c_status = write_workbook(
            &datasets,
            &["Sheet1", "Sheet2"],
            &path,
            &derive_registry(),
            true,
        );

        assert_eq!(c_status, format!("{} Written Successfully", path.display()));
        assert!(path.exists());

        let report = try_write_workbook(
            &datasets,
            &["Sheet1", "Sheet2"],
            dir.path().join("report_2.xlsx"),
            &derive_registry(),
            &SpecExportOptions {
                if_include_steps_manifest: true,
                if_freeze_header: true,
                ..Default::default()
            },
        )
        .expect("write");
        let l_names: Vec<&str> = report
            .sheets
            .iter()
            .map(|sheet| sheet.sheet_name.as_str())
            .collect();
        assert_eq!(l_names, vec!["Sheet1", "Sheet2", "ExcelSteps"]);
        assert_eq!(report.sheets[2].n_rows, 9);
        assert_eq!(report.sheets[0].directives[2].range, "C:C");
        assert_eq!(report.sheets[0].directives[2].fmt.as_deref(), Some("0.0%"));
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_try_write_workbook_reports_unregistered_columns() {
        let dir = tempfile::tempdir().expect("tempdir");
        let datasets = vec![derive_dataset(&["Revenue", "Headcount"])];

        let report = try_write_workbook(
            &datasets,
            &["Staff"],
            dir.path().join("staff.xlsx"),
            &derive_registry(),
            &SpecExportOptions::default(),
        )
        .expect("write");

        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("\"Headcount\""));
        assert_eq!(report.sheets[0].directives[2].width, Some(10.0));
    }
}
