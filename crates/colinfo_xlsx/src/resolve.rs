//! Per-sheet format resolution and workbook-wide format deduplication.

use std::collections::HashMap;

use tracing::debug;

use crate::registry::ColumnRegistry;
use crate::spec::{SpecDataset, SpecExportOptions, SpecFormatTable, SpecSheetPlan};
use crate::util::strip_format_quotes;

/// Resolve number format and width for every written position of `dataset`.
///
/// Positions are the index levels followed by the data columns. A registered
/// name takes the registry's format/width; an unregistered or unnamed
/// position falls back to `options.fmt_default` / `options.width_default`.
/// Registered attributes that are absent become `""` / `0.0` (default column
/// styling), and `"` characters are stripped from formats.
pub fn resolve_sheet_plan(
    dataset: &SpecDataset,
    sheet_name: &str,
    registry: &ColumnRegistry,
    options: &SpecExportOptions,
) -> SpecSheetPlan {
    let l_names_index = dataset.index_names();
    let l_names_data = dataset.data_column_names();
    let n_positions = l_names_index.len() + l_names_data.len();

    let mut names_position = Vec::with_capacity(n_positions);
    let mut fmts = Vec::with_capacity(n_positions);
    let mut widths = Vec::with_capacity(n_positions);

    let iter_positions = l_names_index
        .into_iter()
        .chain(l_names_data.into_iter().map(Some));
    for name in iter_positions {
        let (c_name, meta) = match name {
            Some(c_name) => {
                let meta = registry.get(&c_name);
                (c_name, meta)
            }
            None => {
                debug!(sheet = sheet_name, "unnamed index; using placeholder");
                (options.index_name_placeholder.clone(), None)
            }
        };

        let (c_fmt, n_width) = match meta {
            Some(meta) => (
                meta.format.as_deref().map(strip_format_quotes).unwrap_or_default(),
                meta.width.filter(|val| val.is_finite()).unwrap_or(0.0),
            ),
            None => (options.fmt_default.clone(), options.width_default),
        };

        names_position.push(c_name);
        fmts.push(c_fmt);
        widths.push(n_width);
    }

    debug!(sheet = sheet_name, n_positions, "resolved sheet formats");
    SpecSheetPlan {
        sheet_name: sheet_name.to_string(),
        names_position,
        fmts,
        widths,
    }
}

/// Collect the distinct non-empty formats of `plans`.
///
/// Identities are assigned in first-seen order, scanning sheets in order and
/// positions within each sheet in order.
pub fn plan_format_table<'a, I>(plans: I) -> SpecFormatTable
where
    I: IntoIterator<Item = &'a SpecSheetPlan>,
{
    let mut l_fmts: Vec<String> = Vec::new();
    let mut dict_fmt_id: HashMap<String, usize> = HashMap::new();

    for plan in plans {
        for c_fmt in &plan.fmts {
            if c_fmt.is_empty() || dict_fmt_id.contains_key(c_fmt) {
                continue;
            }
            dict_fmt_id.insert(c_fmt.clone(), l_fmts.len());
            l_fmts.push(c_fmt.clone());
        }
    }

    SpecFormatTable {
        l_fmts,
        dict_fmt_id,
    }
}
