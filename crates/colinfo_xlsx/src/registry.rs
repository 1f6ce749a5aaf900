//! Column registry ("column info"): column name -> display attributes.
//!
//! The registry is persisted as a flat CSV table: one key column followed by
//! description / units / number-format / width columns. Extra columns are
//! tolerated on load and carried through untouched on save.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::conf::derive_default_registry_csv_options;
use crate::spec::{ColInfoXlsxError, SpecColumnMeta, SpecRegistryCsvOptions};
use crate::util::{convert_empty_to_none, format_width_text, parse_width_text};

const C_READER_PATH: &str = "<reader>";

/// In-memory column registry.
///
/// Entries keep insertion order so keys appended on save follow the order in
/// which they were registered.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnRegistry {
    dict_meta: IndexMap<String, SpecColumnMeta>,
}

impl ColumnRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a registry CSV with default column names.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ColInfoXlsxError> {
        Self::load_with_options(path, &derive_default_registry_csv_options())
    }

    /// Load a registry CSV.
    pub fn load_with_options(
        path: impl AsRef<Path>,
        options: &SpecRegistryCsvOptions,
    ) -> Result<Self, ColInfoXlsxError> {
        let path = path.as_ref();
        let v_bytes = fs::read(path).map_err(|err| ColInfoXlsxError::RegistryLoad {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        let registry = Self::load_from_bytes(&v_bytes, options).map_err(|message| {
            ColInfoXlsxError::RegistryLoad {
                path: path.to_path_buf(),
                message,
            }
        })?;
        info!(path = %path.display(), n_entries = registry.len(), "loaded column info");
        Ok(registry)
    }

    /// Load a registry from any CSV reader.
    pub fn load_from_reader<R: Read>(
        mut reader: R,
        options: &SpecRegistryCsvOptions,
    ) -> Result<Self, ColInfoXlsxError> {
        let mut v_bytes = Vec::new();
        reader
            .read_to_end(&mut v_bytes)
            .map_err(|err| ColInfoXlsxError::RegistryLoad {
                path: PathBuf::from(C_READER_PATH),
                message: err.to_string(),
            })?;
        Self::load_from_bytes(&v_bytes, options).map_err(|message| {
            ColInfoXlsxError::RegistryLoad {
                path: PathBuf::from(C_READER_PATH),
                message,
            }
        })
    }

    fn load_from_bytes(v_bytes: &[u8], options: &SpecRegistryCsvOptions) -> Result<Self, String> {
        let table = SpecRegistryTable::parse(v_bytes, options)?;
        for c_col in &table.cols_attribute_missing {
            warn!(column = %c_col, "column info has no such attribute column; treating as empty");
        }

        let mut dict_meta = IndexMap::with_capacity(table.rows.len());
        for row in &table.rows {
            dict_meta.insert(row.key.clone(), table.derive_meta(row)?);
        }
        Ok(Self { dict_meta })
    }

    /// Exact-match lookup; no case folding.
    pub fn get(&self, key: &str) -> Option<&SpecColumnMeta> {
        self.dict_meta.get(key)
    }

    /// Whether `key` is registered.
    pub fn contains(&self, key: &str) -> bool {
        self.dict_meta.contains_key(key)
    }

    /// Register or replace one entry, returning the previous attributes.
    pub fn insert(&mut self, key: impl Into<String>, meta: SpecColumnMeta) -> Option<SpecColumnMeta> {
        self.dict_meta.insert(key.into(), meta)
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.dict_meta.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.dict_meta.is_empty()
    }

    /// Registered keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.dict_meta.keys().map(String::as_str)
    }

    /// Iterate `(key, meta)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SpecColumnMeta)> {
        self.dict_meta
            .iter()
            .map(|(c_key, meta)| (c_key.as_str(), meta))
    }

    /// Return a new registry with every entry of `updates` overwriting `self`.
    ///
    /// Keys absent from `updates` are untouched; `self` is not modified.
    pub fn merge(&self, updates: &ColumnRegistry) -> ColumnRegistry {
        let mut registry = self.clone();
        for (c_key, meta) in &updates.dict_meta {
            registry.dict_meta.insert(c_key.clone(), meta.clone());
        }
        registry
    }

    /// Merge into the registry file at `path` with default column names.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ColInfoXlsxError> {
        self.save_with_options(path, &derive_default_registry_csv_options())
    }

    /// Merge into the registry file at `path`.
    ///
    /// Existing rows whose keys are not in `self` are written back byte for
    /// byte; rows for keys in `self` get their attribute cells replaced; new
    /// keys are appended. A missing file is created.
    pub fn save_with_options(
        &self,
        path: impl AsRef<Path>,
        options: &SpecRegistryCsvOptions,
    ) -> Result<(), ColInfoXlsxError> {
        let path = path.as_ref();
        let derive_error = |message: String| ColInfoXlsxError::RegistrySave {
            path: path.to_path_buf(),
            message,
        };

        let v_bytes_existing = match fs::read(path) {
            Ok(val) => Some(val),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => return Err(derive_error(err.to_string())),
        };
        let v_bytes_out = self
            .derive_merged_bytes(v_bytes_existing.as_deref(), options)
            .map_err(derive_error)?;
        fs::write(path, v_bytes_out).map_err(|err| derive_error(err.to_string()))?;

        info!(path = %path.display(), n_entries = self.len(), "saved column info");
        Ok(())
    }

    /// Render the registry file that results from merging `self` into `existing`.
    pub fn derive_merged_bytes(
        &self,
        existing: Option<&[u8]>,
        options: &SpecRegistryCsvOptions,
    ) -> Result<Vec<u8>, String> {
        let Some(v_bytes_existing) = existing.filter(|val| !val.is_empty()) else {
            return self.derive_fresh_bytes(options);
        };

        let mut table = SpecRegistryTable::parse(v_bytes_existing, options)?;
        let v_terminator = table.derive_terminator();
        let if_rewrite_all = !table.cols_attribute_missing.is_empty();
        if if_rewrite_all {
            debug!("column info file lacks attribute columns; rewriting every row");
            table.append_missing_attribute_columns(options);
        }

        let mut v_out = Vec::with_capacity(v_bytes_existing.len());
        if if_rewrite_all {
            v_out.extend(serialize_record(&table.headers, options, &v_terminator)?);
        } else {
            v_out.extend_from_slice(&table.raw_header);
        }

        for row in &table.rows {
            match self.dict_meta.get(&row.key) {
                Some(meta) => {
                    let l_fields = table.derive_fields_updated(&row.fields, meta);
                    ensure_line_terminated(&mut v_out, &v_terminator);
                    v_out.extend(serialize_record(&l_fields, options, &v_terminator)?);
                }
                None if if_rewrite_all => {
                    let mut l_fields = row.fields.clone();
                    l_fields.resize(table.headers.len(), String::new());
                    ensure_line_terminated(&mut v_out, &v_terminator);
                    v_out.extend(serialize_record(&l_fields, options, &v_terminator)?);
                }
                None => v_out.extend_from_slice(&row.raw),
            }
        }

        let set_keys_existing: HashSet<&str> =
            table.rows.iter().map(|row| row.key.as_str()).collect();
        for (c_key, meta) in &self.dict_meta {
            if set_keys_existing.contains(c_key.as_str()) {
                continue;
            }
            let mut l_fields = vec![String::new(); table.headers.len()];
            l_fields[table.n_idx_key] = c_key.clone();
            let l_fields = table.derive_fields_updated(&l_fields, meta);
            ensure_line_terminated(&mut v_out, &v_terminator);
            v_out.extend(serialize_record(&l_fields, options, &v_terminator)?);
        }

        Ok(v_out)
    }

    fn derive_fresh_bytes(&self, options: &SpecRegistryCsvOptions) -> Result<Vec<u8>, String> {
        let v_terminator = b"\n".to_vec();
        let mut l_headers = vec![options.col_name.clone()];
        l_headers.extend(options.attribute_columns().iter().map(ToString::to_string));

        let mut v_out = serialize_record(&l_headers, options, &v_terminator)?;
        for (c_key, meta) in &self.dict_meta {
            let mut l_fields = vec![c_key.clone()];
            l_fields.extend(derive_attribute_fields(meta));
            v_out.extend(serialize_record(&l_fields, options, &v_terminator)?);
        }
        Ok(v_out)
    }
}

/// Attribute cells in persisted order: description, units, format, width.
fn derive_attribute_fields(meta: &SpecColumnMeta) -> [String; 4] {
    [
        meta.description.clone().unwrap_or_default(),
        meta.units.clone().unwrap_or_default(),
        meta.format.clone().unwrap_or_default(),
        meta.width.map(format_width_text).unwrap_or_default(),
    ]
}

fn serialize_record(
    fields: &[String],
    options: &SpecRegistryCsvOptions,
    terminator: &[u8],
) -> Result<Vec<u8>, String> {
    let csv_terminator = if terminator == b"\r\n" {
        csv::Terminator::CRLF
    } else {
        csv::Terminator::Any(b'\n')
    };
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .terminator(csv_terminator)
        .quote_style(csv::QuoteStyle::Necessary)
        .has_headers(false)
        .from_writer(Vec::new());
    wtr.write_record(fields)
        .map_err(|err| format!("Failed to encode registry row: {err}"))?;
    wtr.into_inner()
        .map_err(|err| format!("Failed to encode registry row: {err}"))
}

fn ensure_line_terminated(v_out: &mut Vec<u8>, terminator: &[u8]) {
    if !v_out.is_empty() && v_out.last() != Some(&b'\n') {
        v_out.extend_from_slice(terminator);
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region RawTable

#[derive(Debug, Clone)]
struct SpecRegistryRawRow {
    key: String,
    fields: Vec<String>,
    raw: Vec<u8>,
}

/// Registry file parsed into records, keeping each record's original bytes.
#[derive(Debug, Clone)]
struct SpecRegistryTable {
    headers: Vec<String>,
    raw_header: Vec<u8>,
    rows: Vec<SpecRegistryRawRow>,
    n_idx_key: usize,
    /// Header positions of description, units, format and width.
    idx_attributes: [Option<usize>; 4],
    cols_attribute_missing: Vec<String>,
}

impl SpecRegistryTable {
    fn parse(v_bytes: &[u8], options: &SpecRegistryCsvOptions) -> Result<Self, String> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .has_headers(true)
            .from_reader(v_bytes);

        let headers: Vec<String> = rdr
            .headers()
            .map_err(|err| format!("Malformed header: {err}"))?
            .iter()
            .map(ToString::to_string)
            .collect();
        let n_idx_key = headers
            .iter()
            .position(|c_col| c_col == &options.col_name)
            .ok_or_else(|| format!("Missing key column {:?}", options.col_name))?;

        let l_cols_attribute = options.attribute_columns();
        let mut idx_attributes = [None; 4];
        let mut cols_attribute_missing = Vec::new();
        for (n_attr, c_col) in l_cols_attribute.iter().enumerate() {
            idx_attributes[n_attr] = headers.iter().position(|c_header| c_header == c_col);
            if idx_attributes[n_attr].is_none() {
                cols_attribute_missing.push(c_col.to_string());
            }
        }

        let mut l_records = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(|err| format!("Malformed row: {err}"))?;
            let n_byte_start = record
                .position()
                .map(|pos| derive_record_start(v_bytes, pos.byte() as usize))
                .ok_or_else(|| "Row without byte position".to_string())?;
            let n_line = record.position().map_or(0, |pos| pos.line());
            l_records.push((n_byte_start, n_line, record));
        }

        let n_byte_header_end = l_records
            .first()
            .map_or(v_bytes.len(), |(n_byte_start, _, _)| *n_byte_start);
        let raw_header = v_bytes[..n_byte_header_end].to_vec();

        let mut dict_line_by_key: HashMap<String, u64> = HashMap::new();
        let mut rows = Vec::with_capacity(l_records.len());
        for (n_idx, (n_byte_start, n_line, record)) in l_records.iter().enumerate() {
            let n_byte_end = l_records
                .get(n_idx + 1)
                .map_or(v_bytes.len(), |(n_next, _, _)| *n_next);
            let key = record.get(n_idx_key).unwrap_or_default().to_string();
            if key.is_empty() {
                return Err(format!("Empty key in column {:?} at line {n_line}", options.col_name));
            }
            if let Some(n_line_first) = dict_line_by_key.get(&key) {
                return Err(format!(
                    "Duplicate key {key:?} at lines {n_line_first} and {n_line}"
                ));
            }
            dict_line_by_key.insert(key.clone(), *n_line);

            rows.push(SpecRegistryRawRow {
                key,
                fields: record.iter().map(ToString::to_string).collect(),
                raw: v_bytes[*n_byte_start..n_byte_end].to_vec(),
            });
        }

        Ok(Self {
            headers,
            raw_header,
            rows,
            n_idx_key,
            idx_attributes,
            cols_attribute_missing,
        })
    }

    fn derive_meta(&self, row: &SpecRegistryRawRow) -> Result<SpecColumnMeta, String> {
        let get_field = |n_attr: usize| {
            self.idx_attributes[n_attr]
                .and_then(|n_idx| row.fields.get(n_idx))
                .map_or("", String::as_str)
        };
        let width = parse_width_text(get_field(3))
            .map_err(|err| format!("{err} for key {:?}", row.key))?;
        Ok(SpecColumnMeta {
            description: convert_empty_to_none(get_field(0)),
            units: convert_empty_to_none(get_field(1)),
            format: convert_empty_to_none(get_field(2)),
            width,
        })
    }

    fn derive_fields_updated(&self, fields: &[String], meta: &SpecColumnMeta) -> Vec<String> {
        let mut l_fields = fields.to_vec();
        l_fields.resize(self.headers.len(), String::new());
        for (n_attr, c_value) in derive_attribute_fields(meta).into_iter().enumerate() {
            if let Some(n_idx) = self.idx_attributes[n_attr] {
                l_fields[n_idx] = c_value;
            }
        }
        l_fields
    }

    fn append_missing_attribute_columns(&mut self, options: &SpecRegistryCsvOptions) {
        for (n_attr, c_col) in options.attribute_columns().iter().enumerate() {
            if self.idx_attributes[n_attr].is_none() {
                self.headers.push(c_col.to_string());
                self.idx_attributes[n_attr] = Some(self.headers.len() - 1);
            }
        }
        self.cols_attribute_missing.clear();
    }

    /// Line terminator of the header line; LF when the file has a single line.
    fn derive_terminator(&self) -> Vec<u8> {
        match self.raw_header.iter().position(|val| *val == b'\n') {
            Some(n_pos) if n_pos > 0 && self.raw_header[n_pos - 1] == b'\r' => b"\r\n".to_vec(),
            _ => b"\n".to_vec(),
        }
    }
}

/// First byte of a record at or after `n_byte`.
///
/// Record positions may point into the preceding line break (the `\n` of a
/// CRLF pair); those bytes belong to the previous slice.
fn derive_record_start(v_bytes: &[u8], n_byte: usize) -> usize {
    let mut n_start = n_byte.min(v_bytes.len());
    while n_start < v_bytes.len() && matches!(v_bytes[n_start], b'\r' | b'\n') {
        n_start += 1;
    }
    n_start
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
