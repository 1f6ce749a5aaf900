//! Workbook writer collaborator and its `rust_xlsxwriter` implementation.

use std::path::PathBuf;

use polars::prelude::{AnyValue, Column};
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use tracing::{debug, info};

use crate::spec::{
    ColInfoXlsxError, EnumCellValue, EnumDatasetIndex, SpecCellFormat, SpecColumnDirective,
    SpecDataset, SpecExportOptions, SpecFormatTable, SpecSheetPlan, SpecSheetReport,
    SpecXlsxReport,
};
use crate::util::{convert_cell_value, derive_column_range};

/// Destination of an assembled workbook.
///
/// The assembler registers the workbook's format table once, writes every
/// sheet in order, then closes the sink.
pub trait WorkbookSink {
    /// Create one format object per entry of `table`.
    fn register_formats(&mut self, table: &SpecFormatTable) -> Result<(), ColInfoXlsxError>;

    /// Write one dataset as a worksheet, applying `plan` column by column.
    ///
    /// Formats are looked up in the table passed to [`Self::register_formats`].
    fn write_sheet(
        &mut self,
        dataset: &SpecDataset,
        plan: &SpecSheetPlan,
        table: &SpecFormatTable,
    ) -> Result<(), ColInfoXlsxError>;

    /// Commit the workbook.
    fn close(&mut self) -> Result<(), ColInfoXlsxError>;
}

/// Stateful workbook writer.
pub struct XlsxWriter {
    path_file_out: PathBuf,
    workbook: Workbook,
    fmt_header: SpecCellFormat,
    if_freeze_header: bool,
    l_fmts_number: Vec<Format>,
    report: SpecXlsxReport,
    if_closed: bool,
}

impl XlsxWriter {
    /// Create writer bound to output path.
    ///
    /// The workbook is buffered in memory until [`WorkbookSink::close`] is called.
    pub fn new(path_file_out: PathBuf, options: &SpecExportOptions) -> Self {
        Self {
            report: SpecXlsxReport {
                path_file_out: path_file_out.clone(),
                ..Default::default()
            },
            path_file_out,
            workbook: Workbook::new(),
            fmt_header: options.fmt_header.clone(),
            if_freeze_header: options.if_freeze_header,
            l_fmts_number: Vec::new(),
            if_closed: false,
        }
    }

    /// Return snapshot of the write report.
    pub fn report(&self) -> SpecXlsxReport {
        self.report.clone()
    }
}

impl WorkbookSink for XlsxWriter {
    fn register_formats(&mut self, table: &SpecFormatTable) -> Result<(), ColInfoXlsxError> {
        if self.if_closed {
            return Err(ColInfoXlsxError::Write("Cannot write after close().".to_string()));
        }
        self.l_fmts_number = table
            .iter()
            .map(|(_, c_fmt)| Format::new().set_num_format(c_fmt))
            .collect();
        self.report.n_formats = self.l_fmts_number.len();
        debug!(n_formats = self.l_fmts_number.len(), "registered number formats");
        Ok(())
    }

    fn write_sheet(
        &mut self,
        dataset: &SpecDataset,
        plan: &SpecSheetPlan,
        table: &SpecFormatTable,
    ) -> Result<(), ColInfoXlsxError> {
        if self.if_closed {
            return Err(ColInfoXlsxError::Write("Cannot write after close().".to_string()));
        }
        let n_positions = dataset.width_positions();
        if plan.fmts.len() != n_positions || plan.widths.len() != n_positions {
            return Err(ColInfoXlsxError::InvalidDataset(format!(
                "Sheet {:?}: plan covers {} formats / {} widths for {n_positions} positions.",
                plan.sheet_name,
                plan.fmts.len(),
                plan.widths.len()
            )));
        }

        let l_sources = derive_position_sources(dataset)?;
        let n_index_levels = dataset.index_names().len();
        let n_height = dataset.height();

        let mut l_fmt_ids = Vec::with_capacity(n_positions);
        for c_fmt in &plan.fmts {
            let fmt_id = table.id_of(c_fmt);
            if fmt_id.is_some_and(|n_id| n_id >= self.l_fmts_number.len()) {
                return Err(ColInfoXlsxError::Write(format!(
                    "Format {c_fmt:?} was not registered before writing {:?}.",
                    plan.sheet_name
                )));
            }
            if fmt_id.is_none() && !c_fmt.is_empty() {
                return Err(ColInfoXlsxError::Write(format!(
                    "Format {c_fmt:?} is missing from the format table."
                )));
            }
            l_fmt_ids.push(fmt_id);
        }

        let fmt_header = derive_rust_xlsx_format(&self.fmt_header);
        let worksheet = self.workbook.add_worksheet();
        worksheet.set_name(&plan.sheet_name)?;

        for (n_idx_col, c_name) in plan.names_position.iter().enumerate() {
            worksheet.write_string_with_format(0, cast_col_num(n_idx_col)?, c_name, &fmt_header)?;
        }

        for n_row in 0..n_height {
            let n_row_sheet = cast_row_num(n_row + 1)?;
            for (n_idx_col, source) in l_sources.iter().enumerate() {
                let value = convert_cell_value(source.get(n_row)?);
                let n_col_sheet = cast_col_num(n_idx_col)?;
                if n_idx_col < n_index_levels {
                    write_cell(worksheet, n_row_sheet, n_col_sheet, &value, Some(&fmt_header))?;
                } else {
                    let fmt = l_fmt_ids[n_idx_col].map(|n_id| &self.l_fmts_number[n_id]);
                    write_cell(worksheet, n_row_sheet, n_col_sheet, &value, fmt)?;
                }
            }
        }

        let mut l_directives = Vec::new();
        for (n_idx_col, (fmt_id, n_width)) in l_fmt_ids.iter().zip(&plan.widths).enumerate() {
            let n_col_sheet = cast_col_num(n_idx_col)?;
            let fmt = fmt_id.map(|n_id| &self.l_fmts_number[n_id]);
            let width = (*n_width > 0.0).then_some(*n_width);
            if fmt.is_none() && width.is_none() {
                continue;
            }
            if let Some(fmt) = fmt {
                worksheet.set_column_format(n_col_sheet, fmt)?;
            }
            if let Some(n_width) = width {
                worksheet.set_column_width(n_col_sheet, n_width)?;
            }

            let directive = SpecColumnDirective {
                range: derive_column_range(n_idx_col + 1).unwrap_or_default(),
                fmt: fmt_id.and_then(|n_id| table.get(n_id)).map(ToString::to_string),
                width,
            };
            debug!(
                sheet = %plan.sheet_name,
                range = %directive.range,
                fmt = ?directive.fmt,
                width = ?directive.width,
                "applied column directive"
            );
            l_directives.push(directive);
        }

        if self.if_freeze_header {
            worksheet.set_freeze_panes(1, 0)?;
        }

        self.report.sheets.push(SpecSheetReport {
            sheet_name: plan.sheet_name.clone(),
            n_rows: n_height,
            directives: l_directives,
        });
        Ok(())
    }

    /// Flush workbook to disk. Idempotent.
    fn close(&mut self) -> Result<(), ColInfoXlsxError> {
        if self.if_closed {
            return Ok(());
        }
        self.workbook.save(&self.path_file_out)?;
        self.if_closed = true;
        info!(
            path = %self.path_file_out.display(),
            n_sheets = self.report.sheets.len(),
            "workbook written"
        );
        Ok(())
    }
}

/// Cell source of one written position.
enum EnumPositionSource<'a> {
    RowNumber,
    Column(&'a Column),
}

impl EnumPositionSource<'_> {
    fn get(&self, n_row: usize) -> Result<EnumCellValue, ColInfoXlsxError> {
        match self {
            Self::RowNumber => Ok(EnumCellValue::Number(n_row as f64)),
            Self::Column(col) => col
                .get(n_row)
                .map(derive_cell_value_from_any_value)
                .map_err(|err| {
                    ColInfoXlsxError::Write(format!("Failed to access cell value: {err}"))
                }),
        }
    }
}

fn derive_position_sources(
    dataset: &SpecDataset,
) -> Result<Vec<EnumPositionSource<'_>>, ColInfoXlsxError> {
    let derive_column = |c_name: &str| {
        dataset
            .df
            .column(c_name)
            .map(EnumPositionSource::Column)
            .map_err(|err| ColInfoXlsxError::InvalidDataset(format!("{c_name:?}: {err}")))
    };

    let mut l_sources = Vec::with_capacity(dataset.width_positions());
    match &dataset.index {
        EnumDatasetIndex::RowNumber { .. } => l_sources.push(EnumPositionSource::RowNumber),
        EnumDatasetIndex::Columns(cols) => {
            for c_name in cols {
                l_sources.push(derive_column(c_name)?);
            }
        }
    }
    for c_name in dataset.data_column_names() {
        l_sources.push(derive_column(&c_name)?);
    }
    Ok(l_sources)
}

fn derive_cell_value_from_any_value(value: AnyValue<'_>) -> EnumCellValue {
    match value {
        AnyValue::Null => EnumCellValue::None,
        AnyValue::String(val) => EnumCellValue::String(val.to_string()),
        AnyValue::StringOwned(val) => EnumCellValue::String(val.to_string()),
        AnyValue::Boolean(val) => EnumCellValue::Boolean(val),
        AnyValue::UInt32(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float64(val) => EnumCellValue::Number(val),
        _ => EnumCellValue::String(value.to_string()),
    }
}

fn write_cell(
    worksheet: &mut Worksheet,
    n_row: u32,
    n_col: u16,
    value: &EnumCellValue,
    format: Option<&Format>,
) -> Result<(), ColInfoXlsxError> {
    match (value, format) {
        (EnumCellValue::None, Some(fmt)) => {
            worksheet.write_blank(n_row, n_col, fmt)?;
        }
        (EnumCellValue::None, None) => {}
        (EnumCellValue::String(val), Some(fmt)) => {
            worksheet.write_string_with_format(n_row, n_col, val, fmt)?;
        }
        (EnumCellValue::String(val), None) => {
            worksheet.write_string(n_row, n_col, val)?;
        }
        (EnumCellValue::Number(val), Some(fmt)) => {
            worksheet.write_number_with_format(n_row, n_col, *val, fmt)?;
        }
        (EnumCellValue::Number(val), None) => {
            worksheet.write_number(n_row, n_col, *val)?;
        }
        (EnumCellValue::Boolean(val), Some(fmt)) => {
            worksheet.write_boolean_with_format(n_row, n_col, *val, fmt)?;
        }
        (EnumCellValue::Boolean(val), None) => {
            worksheet.write_boolean(n_row, n_col, *val)?;
        }
    }
    Ok(())
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }
    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        7 => FormatBorder::Hair,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        _ => None,
    }
}

fn cast_row_num(value: usize) -> Result<u32, ColInfoXlsxError> {
    u32::try_from(value)
        .map_err(|_| ColInfoXlsxError::Write(format!("row index overflow: {value}")))
}

fn cast_col_num(value: usize) -> Result<u16, ColInfoXlsxError> {
    u16::try_from(value)
        .map_err(|_| ColInfoXlsxError::Write(format!("column index overflow: {value}")))
}
