//! "ExcelSteps" manifest: one documentation row per described column.

use polars::prelude::{Column, DataFrame};
use tracing::debug;

use crate::conf::{
    C_FMT_TEXT, C_STEP_COL_FORMAT, C_STEP_FREEZE_ROW1, C_STEPS_COL_AFTER, C_STEPS_COL_COLUMN,
    C_STEPS_COL_COMMENT, C_STEPS_COL_FORMULA, C_STEPS_COL_KEEP_FORMULAS,
    C_STEPS_COL_NUMBER_FORMAT, C_STEPS_COL_SHEET, C_STEPS_COL_STEP, C_STEPS_COL_WIDTH,
    C_STEPS_INDEX_NAME, TUP_STEPS_TEXT_COLUMNS,
};
use crate::registry::ColumnRegistry;
use crate::spec::{
    ColInfoXlsxError, SpecColumnMeta, SpecDataset, SpecExportOptions, SpecStepsManifestRow,
};
use crate::util::derive_description_with_units;

/// Copy of `registry` where the manifest's formula and number-format columns are text.
///
/// Other attributes of those keys are kept when already registered; a new
/// key gets `options.width_default`.
pub fn derive_steps_registry(
    registry: &ColumnRegistry,
    options: &SpecExportOptions,
) -> ColumnRegistry {
    let mut updates = ColumnRegistry::new();
    for c_col in TUP_STEPS_TEXT_COLUMNS {
        let mut meta = registry.get(c_col).cloned().unwrap_or_else(|| SpecColumnMeta {
            width: Some(options.width_default),
            ..Default::default()
        });
        meta.format = Some(C_FMT_TEXT.to_string());
        updates.insert(c_col, meta);
    }
    registry.merge(&updates)
}

/// Build manifest rows for `sheets`, in sheet order then position order.
///
/// Positions without a registered description are skipped. Each sheet ends
/// with a blank row, a freeze-header directive and another blank row.
pub fn derive_steps_manifest_rows<'a, I>(
    sheets: I,
    registry: &ColumnRegistry,
) -> Vec<SpecStepsManifestRow>
where
    I: IntoIterator<Item = (&'a SpecDataset, &'a str)>,
{
    let mut l_rows = Vec::new();
    for (dataset, sheet_name) in sheets {
        let iter_names = dataset
            .index_names()
            .into_iter()
            .flatten()
            .chain(dataset.data_column_names());
        for c_col in iter_names {
            let Some(meta) = registry.get(&c_col) else {
                continue;
            };
            let Some(c_description) = meta.description.as_deref() else {
                continue;
            };

            l_rows.push(SpecStepsManifestRow {
                sheet: Some(sheet_name.to_string()),
                column: Some(c_col.clone()),
                step: Some(C_STEP_COL_FORMAT.to_string()),
                comment: Some(derive_description_with_units(
                    c_description,
                    meta.units.as_deref(),
                )),
                number_format: meta.format.clone(),
                width: meta.width,
            });
        }

        l_rows.push(SpecStepsManifestRow::blank());
        l_rows.push(SpecStepsManifestRow {
            sheet: Some(sheet_name.to_string()),
            step: Some(C_STEP_FREEZE_ROW1.to_string()),
            ..Default::default()
        });
        l_rows.push(SpecStepsManifestRow::blank());
    }
    l_rows
}

/// Materialize manifest rows into a dataset indexed by a row number named `row`.
pub fn create_steps_manifest_dataset(
    rows: &[SpecStepsManifestRow],
) -> Result<SpecDataset, ColInfoXlsxError> {
    let n_rows = rows.len();
    let col_text = |name: &str, values: Vec<Option<String>>| Column::new(name.into(), values);
    let col_empty = |name: &str| Column::new(name.into(), vec![None::<String>; n_rows]);

    let l_cols = vec![
        col_text(
            C_STEPS_COL_SHEET,
            rows.iter().map(|row| row.sheet.clone()).collect(),
        ),
        col_text(
            C_STEPS_COL_COLUMN,
            rows.iter().map(|row| row.column.clone()).collect(),
        ),
        col_text(
            C_STEPS_COL_STEP,
            rows.iter().map(|row| row.step.clone()).collect(),
        ),
        col_empty(C_STEPS_COL_FORMULA),
        col_empty(C_STEPS_COL_AFTER),
        col_empty(C_STEPS_COL_KEEP_FORMULAS),
        col_text(
            C_STEPS_COL_COMMENT,
            rows.iter().map(|row| row.comment.clone()).collect(),
        ),
        col_text(
            C_STEPS_COL_NUMBER_FORMAT,
            rows.iter().map(|row| row.number_format.clone()).collect(),
        ),
        Column::new(
            C_STEPS_COL_WIDTH.into(),
            rows.iter().map(|row| row.width).collect::<Vec<Option<f64>>>(),
        ),
    ];

    let df = DataFrame::new(l_cols).map_err(|err| {
        ColInfoXlsxError::InvalidDataset(format!("Failed to build steps manifest: {err}"))
    })?;
    debug!(n_rows, "built steps manifest");
    Ok(SpecDataset::with_row_number_index(df, C_STEPS_INDEX_NAME))
}

/// Build the manifest dataset and the registry copy used to format it.
pub fn create_steps_manifest<'a, I>(
    sheets: I,
    registry: &ColumnRegistry,
    options: &SpecExportOptions,
) -> Result<(SpecDataset, ColumnRegistry), ColInfoXlsxError>
where
    I: IntoIterator<Item = (&'a SpecDataset, &'a str)>,
{
    let registry_steps = derive_steps_registry(registry, options);
    let l_rows = derive_steps_manifest_rows(sheets, &registry_steps);
    let dataset = create_steps_manifest_dataset(&l_rows)?;
    Ok((dataset, registry_steps))
}

#[cfg(test)]
mod tests {
    use polars::prelude::AnyValue;

    use super::*;
    use crate::conf::TUP_STEPS_COLUMNS;
    use crate::spec::EnumDatasetIndex;

    fn derive_frame(cols: &[&str]) -> DataFrame {
        let l_cols: Vec<Column> = cols
            .iter()
            .map(|c_name| Column::new((*c_name).into(), &[1i64, 2]))
            .collect();
        DataFrame::new(l_cols).expect("frame")
    }

    fn derive_registry() -> ColumnRegistry {
        let mut registry = ColumnRegistry::new();
        registry.insert("Revenue", SpecColumnMeta::new("Annual Revenue", "USD", "$0.00", 11.0));
        registry.insert("Year", SpecColumnMeta::new("Fiscal year", "", "0", 6.0));
        registry.insert("Hidden", SpecColumnMeta::with_format("0.0", 7.0));
        registry
    }

    #[test]
    fn test_rows_document_described_columns_only() {
        let df = derive_frame(&["Year", "Revenue", "Hidden", "Other"]);
        let dataset = SpecDataset::with_index_columns(df, ["Year"]).expect("dataset");
        let l_rows = derive_steps_manifest_rows([(&dataset, "Sales")], &derive_registry());

        assert_eq!(l_rows.len(), 5);
        assert_eq!(
            l_rows[0],
            SpecStepsManifestRow {
                sheet: Some("Sales".to_string()),
                column: Some("Year".to_string()),
                step: Some("Col_Format".to_string()),
                comment: Some("Fiscal year".to_string()),
                number_format: Some("0".to_string()),
                width: Some(6.0),
            }
        );
        assert_eq!(l_rows[1].column.as_deref(), Some("Revenue"));
        assert_eq!(l_rows[1].comment.as_deref(), Some("Annual Revenue in USD"));
        assert!(l_rows[2].is_blank());
        assert_eq!(l_rows[3].sheet.as_deref(), Some("Sales"));
        assert_eq!(l_rows[3].step.as_deref(), Some("Tbl_FreezeRow1"));
        assert_eq!(l_rows[3].column, None);
        assert!(l_rows[4].is_blank());
    }

    #[test]
    fn test_rows_follow_sheet_order_and_skip_unnamed_index() {
        let ds_a = SpecDataset::new(derive_frame(&["Revenue"]));
        let ds_b = SpecDataset::new(derive_frame(&["Year", "Revenue"]));
        let l_rows =
            derive_steps_manifest_rows([(&ds_a, "A"), (&ds_b, "B")], &derive_registry());

        let l_cols: Vec<(Option<&str>, Option<&str>)> = l_rows
            .iter()
            .map(|row| (row.sheet.as_deref(), row.column.as_deref()))
            .collect();
        assert_eq!(
            l_cols,
            vec![
                (Some("A"), Some("Revenue")),
                (None, None),
                (Some("A"), None),
                (None, None),
                (Some("B"), Some("Year")),
                (Some("B"), Some("Revenue")),
                (None, None),
                (Some("B"), None),
                (None, None),
            ]
        );
    }

    #[test]
    fn test_steps_registry_forces_text_without_touching_input() {
        let mut registry = derive_registry();
        registry.insert("Number Format", SpecColumnMeta::with_format("0", 15.0));

        let registry_steps = derive_steps_registry(&registry, &SpecExportOptions::default());

        assert_eq!(
            registry_steps.get("Number Format"),
            Some(&SpecColumnMeta::with_format("@", 15.0))
        );
        assert_eq!(
            registry_steps.get("Formula/List Name/Sort-by"),
            Some(&SpecColumnMeta::with_format("@", 10.0))
        );
        assert_eq!(
            registry.get("Number Format"),
            Some(&SpecColumnMeta::with_format("0", 15.0))
        );
        assert!(!registry.contains("Formula/List Name/Sort-by"));
    }

    #[test]
    fn test_manifest_dataset_layout() {
        let dataset = SpecDataset::new(derive_frame(&["Revenue"]));
        let options = SpecExportOptions::default();
        let (ds_steps, _) = create_steps_manifest([(&dataset, "Sheet1")], &derive_registry(), &options)
            .expect("manifest");

        assert_eq!(
            ds_steps.index,
            EnumDatasetIndex::RowNumber {
                name: Some("row".to_string())
            }
        );
        assert_eq!(ds_steps.data_column_names(), TUP_STEPS_COLUMNS.to_vec());
        assert_eq!(ds_steps.height(), 4);

        let col_width = ds_steps.df.column("Width").expect("Width");
        assert_eq!(col_width.get(0).expect("cell"), AnyValue::Float64(11.0));
        assert_eq!(col_width.get(1).expect("cell"), AnyValue::Null);
        let col_fmt = ds_steps.df.column("Number Format").expect("Number Format");
        assert_eq!(col_fmt.get(0).expect("cell"), AnyValue::String("$0.00"));
    }
}
