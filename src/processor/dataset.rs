use memchr::{memchr, memchr2};
use memmap2::Mmap;
use std::{
    borrow::Cow,
    collections::HashMap,
    fs::File,
    path::Path,
    str,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tracing::{info, warn};

use crate::processor::{
    LoadSummary, ProcessorError, Record, RowError, Value,
    column::{FieldDescriptor, Schema, classify_with},
    config::EngineConfig,
    value_index,
};

fn next_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// An immutable, classified record set
///
/// Cloning is cheap: records, schema and config are shared.
///
/// # Examples
///
/// ```rust
/// # use creative_query::{Dataset, EngineConfig};
/// let csv = "creative,spend,clicks\nA,10,3\nB,20,\n";
/// let dataset = Dataset::from_csv_str(csv, &EngineConfig::default()).unwrap();
/// assert_eq!(dataset.row_count(), 2);
/// assert!(dataset.record(1).unwrap().get("clicks").is_null());
/// ```
#[derive(Debug, Clone)]
pub struct Dataset {
    id: u64,
    schema: Arc<Schema>,
    records: Arc<[Record]>,
    summary: Arc<LoadSummary>,
    config: Arc<EngineConfig>,
}

impl Dataset {
    /// Loads a CSV file using memory mapping
    ///
    /// The first record is the header. Cells are coerced to
    /// Null/Bool/Int/Float/Str; rows whose arity differs from the header are
    /// skipped and reported in [`Dataset::load_summary`].
    ///
    /// # Errors
    /// Returns a [`ProcessorError`] if:
    /// - File cannot be opened or mapped
    /// - The file is not UTF-8
    /// - The header is missing or repeats a field name
    pub fn load_csv(path: &Path, config: &EngineConfig) -> Result<Self, ProcessorError> {
        let file = File::open(path)?;
        // SAFETY: the map is only read while parsing and dropped before returning.
        let mmap = unsafe { Mmap::map(&file)? };
        let text = str::from_utf8(&mmap[..])?;
        let dataset = Self::from_csv_str(text, config)?;
        info!(
            path = %path.display(),
            rows = dataset.row_count(),
            fields = dataset.schema.len(),
            rejected = dataset.summary.errors.len(),
            "Loaded dataset"
        );
        Ok(dataset)
    }

    /// Parses CSV text with a header row
    ///
    /// Empty header cells at the end of the header line are dropped, and so
    /// are surplus empty cells at the end of data rows, so `a,b,` exports
    /// load as two columns.
    pub fn from_csv_str(text: &str, config: &EngineConfig) -> Result<Self, ProcessorError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut scanner = CsvScanner::new(text);

        let mut headers: Vec<String> = scanner
            .next_record()
            .ok_or(ProcessorError::EmptySchema)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        // a trailing delimiter does not name a column
        while headers.last().is_some_and(|h| h.is_empty()) {
            headers.pop();
        }
        if headers.is_empty() {
            return Err(ProcessorError::EmptySchema);
        }

        let mut rows = Vec::new();
        let mut line_numbers = Vec::new();
        let mut line = 1;
        while let Some(mut fields) = scanner.next_record() {
            line += 1;
            if fields.len() == 1 && fields[0].is_empty() {
                continue;
            }
            while fields.len() > headers.len()
                && fields.last().is_some_and(|f| f.trim().is_empty())
            {
                fields.pop();
            }
            rows.push(fields.iter().map(|f| coerce_cell(f)).collect());
            line_numbers.push(line);
        }

        Self::build(&headers, rows, Some(&line_numbers), config)
    }

    /// Builds a dataset from rows that are already split and typed.
    /// Each row must have one value per header.
    pub fn from_rows<S: AsRef<str>>(
        headers: &[S],
        rows: Vec<Vec<Value>>,
        config: &EngineConfig,
    ) -> Result<Self, ProcessorError> {
        Self::build(headers, rows, None, config)
    }

    /// Builds a dataset from field-name keyed maps. Maps whose key set is
    /// not exactly the header set are rejected.
    pub fn from_maps<S: AsRef<str>>(
        headers: &[S],
        maps: Vec<HashMap<String, Value>>,
        config: &EngineConfig,
    ) -> Result<Self, ProcessorError> {
        let schema = Arc::new(build_schema(headers, config)?);
        let mut records = Vec::with_capacity(maps.len());
        let mut errors = Vec::new();

        for (idx, mut map) in maps.into_iter().enumerate() {
            let row = idx + 2;
            if map.len() != schema.len() {
                errors.push(reject(
                    row,
                    format!("Expected {} fields, got {}", schema.len(), map.len()),
                ));
                continue;
            }
            let values: Option<Vec<Value>> = schema.names().map(|name| map.remove(name)).collect();
            match values {
                Some(values) => records.push(Record::new(Arc::clone(&schema), values)),
                None => errors.push(reject(row, "Field set differs from header".to_string())),
            }
        }

        Ok(Self::assemble(schema, records, errors, config))
    }

    fn build<S: AsRef<str>>(
        headers: &[S],
        rows: Vec<Vec<Value>>,
        line_numbers: Option<&[usize]>,
        config: &EngineConfig,
    ) -> Result<Self, ProcessorError> {
        let schema = Arc::new(build_schema(headers, config)?);
        let mut records = Vec::with_capacity(rows.len());
        let mut errors = Vec::new();

        for (idx, values) in rows.into_iter().enumerate() {
            let row = line_numbers.and_then(|l| l.get(idx).copied()).unwrap_or(idx + 2);
            if values.len() != schema.len() {
                errors.push(reject(
                    row,
                    format!("Expected {} fields, got {}", schema.len(), values.len()),
                ));
                continue;
            }
            records.push(Record::new(Arc::clone(&schema), values));
        }

        Ok(Self::assemble(schema, records, errors, config))
    }

    fn assemble(
        schema: Arc<Schema>,
        records: Vec<Record>,
        errors: Vec<RowError>,
        config: &EngineConfig,
    ) -> Self {
        let summary = LoadSummary {
            rows_loaded: records.len(),
            errors,
        };
        Dataset {
            id: next_id(),
            schema,
            records: records.into(),
            summary: Arc::new(summary),
            config: Arc::new(config.clone()),
        }
    }

    /// Process-unique identity, used to key cached views
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        self.schema.fields()
    }

    pub fn get_field(&self, name: &str) -> Result<&FieldDescriptor, ProcessorError> {
        self.schema.get_field(name)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record(&self, idx: usize) -> Option<&Record> {
        self.records.get(idx)
    }

    /// Records at the given row indices, in that order
    pub fn rows<'a>(&'a self, indices: &'a [usize]) -> impl Iterator<Item = &'a Record> + 'a {
        indices.iter().filter_map(|&i| self.records.get(i))
    }

    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn load_summary(&self) -> &LoadSummary {
        &self.summary
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Pick-list for `field` over `rows`, or over every record when `None`
    pub fn distinct_values(&self, field: &str, rows: Option<&[usize]>) -> Vec<String> {
        match rows {
            Some(rows) => value_index::distinct_values(self.rows(rows), field),
            None => value_index::distinct_values(self.records.iter(), field),
        }
    }

    pub fn is_numeric_field(&self, field: &FieldDescriptor) -> bool {
        value_index::is_numeric_field(
            self.records.iter(),
            field,
            self.config.numeric_sample_size,
        )
    }
}

fn build_schema<S: AsRef<str>>(
    headers: &[S],
    config: &EngineConfig,
) -> Result<Schema, ProcessorError> {
    Schema::new(classify_with(headers, &config.metric_keys))
}

fn reject(row: usize, reason: String) -> RowError {
    warn!(row, %reason, "Rejected row");
    RowError { row, reason }
}

/// Best-effort typing of a raw CSV cell
pub fn coerce_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(v) = atoi_simd::parse::<i64>(trimmed.as_bytes()) {
        return Value::Int(v);
    }
    match fast_float::parse::<f64, _>(trimmed) {
        Ok(v) if v.is_finite() => Value::Float(v),
        _ => Value::Str(raw.to_string()),
    }
}

/// Quote-aware record splitter: `,` separates, `"` quotes, `""` escapes a
/// quote, quoted fields may span lines, CRLF is accepted.
struct CsvScanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> CsvScanner<'a> {
    fn new(text: &'a str) -> Self {
        CsvScanner { text, pos: 0 }
    }

    fn next_record(&mut self) -> Option<Vec<Cow<'a, str>>> {
        let bytes = self.text.as_bytes();
        if self.pos >= bytes.len() {
            return None;
        }

        let mut fields = Vec::new();
        loop {
            fields.push(self.read_field());
            match bytes.get(self.pos) {
                Some(b',') => self.pos += 1,
                Some(b'\n') => {
                    self.pos += 1;
                    break;
                }
                _ => break,
            }
        }
        Some(fields)
    }

    fn read_field(&mut self) -> Cow<'a, str> {
        let bytes = self.text.as_bytes();
        if bytes.get(self.pos) == Some(&b'"') {
            return self.read_quoted();
        }

        let end = self.delimiter_from(self.pos);
        let field = &self.text[self.pos..end];
        self.pos = end;
        Cow::Borrowed(field.strip_suffix('\r').unwrap_or(field))
    }

    fn read_quoted(&mut self) -> Cow<'a, str> {
        let bytes = self.text.as_bytes();
        let mut out = String::new();
        let mut start = self.pos + 1;

        loop {
            match memchr(b'"', &bytes[start..]) {
                Some(off) => {
                    let quote = start + off;
                    if bytes.get(quote + 1) == Some(&b'"') {
                        out.push_str(&self.text[start..=quote]);
                        start = quote + 2;
                    } else {
                        out.push_str(&self.text[start..quote]);
                        self.pos = quote + 1;
                        break;
                    }
                }
                None => {
                    // unterminated quote runs to the end of input
                    out.push_str(&self.text[start..]);
                    self.pos = bytes.len();
                    break;
                }
            }
        }

        // stray text after the closing quote is kept verbatim
        let end = self.delimiter_from(self.pos);
        out.push_str(self.text[self.pos..end].trim_end_matches('\r'));
        self.pos = end;
        Cow::Owned(out)
    }

    fn delimiter_from(&self, from: usize) -> usize {
        let bytes = self.text.as_bytes();
        memchr2(b',', b'\n', &bytes[from..]).map_or(bytes.len(), |off| from + off)
    }
}
