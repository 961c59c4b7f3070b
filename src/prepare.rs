//! One-shot preparation of GTFS CSV exports before they are pushed to the document store.
//!
//! Exports arrive Latin-1 encoded and are rewritten as UTF-8. The agency is
//! renamed, stops are trimmed and scattered around the demo area, and both
//! stops and routes are turned into JSON documents ready for upload.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use rand::Rng;
use serde_json::{Map, Number, Value};
use thiserror::Error;
use tracing::{info, warn};

/// Files a GTFS export is expected to carry, with the columns we look for first.
pub const GTFS_FILES: [(&str, &str); 7] = [
    ("agency.csv", "agency_id,agency_name"),
    ("stops.csv", "stop_id,stop_name,stop_lat,stop_lon"),
    ("routes.csv", "route_id,route_short_name,route_type"),
    ("trips.csv", "route_id,trip_id,service_id"),
    ("stop_times.csv", "trip_id,arrival_time,departure_time,stop_id"),
    (
        "calendar.csv",
        "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date",
    ),
    ("calendar_dates.csv", "service_id,date,exception_type"),
];

pub const DEFAULT_AGENCY_NAME: &str = "Kinatwa Sacco";
pub const DEFAULT_STOP_LIMIT: usize = 500;
pub const DEFAULT_ROUTE_LIMIT: usize = 50;
// Greenpark / Shamba area on the Nairobi outskirts.
pub const STOP_CENTER: (f64, f64) = (-1.29, 36.82);
/// Roughly a kilometre either way.
pub const STOP_SPREAD_DEG: f64 = 0.01;

#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("{file} has no {column} column")]
    MissingColumn { file: String, column: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Parse Latin-1 CSV. Short rows are padded with empty cells; rows longer
    /// than the header are dropped and counted.
    pub fn read_latin1<R: Read>(name: &str, mut reader: R) -> Result<(Self, usize), PrepareError> {
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw).map_err(|source| PrepareError::Io {
            path: PathBuf::from(name),
            source,
        })?;
        // Every byte is a valid Latin-1 code point.
        let text: String = raw.iter().map(|&b| b as char).collect();

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());
        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        let mut skipped = 0;
        for result in rdr.records() {
            match result {
                Ok(record) if record.len() > headers.len() => {
                    warn!(
                        file = name,
                        line = record.position().map(|p| p.line()),
                        fields = record.len(),
                        "Skipping bad line"
                    );
                    skipped += 1;
                }
                Ok(record) => {
                    let mut row: Vec<String> = record.iter().map(str::to_string).collect();
                    row.resize(headers.len(), String::new());
                    rows.push(row);
                }
                Err(e) => {
                    warn!(file = name, error = %e, "Skipping bad line");
                    skipped += 1;
                }
            }
        }

        Ok((
            Self {
                name: name.to_string(),
                headers,
                rows,
            },
            skipped,
        ))
    }

    pub fn load(path: &Path) -> Result<Self, PrepareError> {
        let file = File::open(path).map_err(|source| PrepareError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (table, skipped) = Self::read_latin1(&name, file)?;
        if skipped > 0 {
            warn!(file = %name, skipped, "Dropped malformed rows");
        }
        Ok(table)
    }

    pub fn write<W: Write>(&self, writer: W) -> Result<(), PrepareError> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush().map_err(|source| PrepareError::Io {
            path: PathBuf::from(&self.name),
            source,
        })?;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), PrepareError> {
        let file = File::create(path).map_err(|source| PrepareError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.write(file)
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn require_column(&self, name: &str) -> Result<usize, PrepareError> {
        self.column(name).ok_or_else(|| PrepareError::MissingColumn {
            file: self.name.clone(),
            column: name.to_string(),
        })
    }

    /// Overwrite `name` in every row, appending the column when it is missing.
    pub fn fill_column(&mut self, name: &str, value: &str) {
        let idx = match self.column(name) {
            Some(idx) => idx,
            None => {
                self.headers.push(name.to_string());
                self.headers.len() - 1
            }
        };
        for row in &mut self.rows {
            row.resize(self.headers.len(), String::new());
            row[idx] = value.to_string();
        }
    }

    pub fn truncate(&mut self, limit: usize) {
        self.rows.truncate(limit);
    }

    /// One JSON object per row. Columns whose non-empty cells are all numeric
    /// become numbers; empty cells become `empty`.
    fn documents(&self, limit: usize, empty: &Value) -> Vec<Map<String, Value>> {
        let rows = &self.rows[..self.rows.len().min(limit)];
        let kinds: Vec<ColumnKind> = (0..self.headers.len())
            .map(|i| ColumnKind::infer(rows.iter().map(|r| r.get(i).map_or("", String::as_str))))
            .collect();

        rows.iter()
            .map(|row| {
                self.headers
                    .iter()
                    .enumerate()
                    .map(|(i, header)| {
                        let cell = row.get(i).map_or("", String::as_str);
                        let value = if cell.is_empty() {
                            empty.clone()
                        } else {
                            kinds[i].convert(cell)
                        };
                        (header.clone(), value)
                    })
                    .collect()
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ColumnKind {
    Integer,
    Float,
    Text,
}

impl ColumnKind {
    fn infer<'a>(cells: impl Iterator<Item = &'a str>) -> Self {
        let mut kind = ColumnKind::Integer;
        let mut seen = false;
        for cell in cells.filter(|c| !c.is_empty()) {
            seen = true;
            if kind == ColumnKind::Integer && cell.parse::<i64>().is_err() {
                kind = ColumnKind::Float;
            }
            if kind == ColumnKind::Float && !cell.parse::<f64>().is_ok_and(f64::is_finite) {
                return ColumnKind::Text;
            }
        }
        if seen {
            kind
        } else {
            ColumnKind::Text
        }
    }

    fn convert(self, cell: &str) -> Value {
        match self {
            ColumnKind::Integer => cell
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(cell.to_string())),
            ColumnKind::Float => cell
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(cell.to_string())),
            ColumnKind::Text => Value::String(cell.to_string()),
        }
    }
}

pub fn rename_agency(table: &mut Table, agency_name: &str) {
    table.fill_column("agency_name", agency_name);
}

/// Keep the first `limit` stops and give each a random spot within `spread`
/// degrees of `center`. Adds `wheelchair_boarding = 0` when the export lacks it.
pub fn scatter_stops<R: Rng>(
    table: &mut Table,
    limit: usize,
    center: (f64, f64),
    spread: f64,
    rng: &mut R,
) -> Result<(), PrepareError> {
    let lat = table.require_column("stop_lat")?;
    let lon = table.require_column("stop_lon")?;
    table.truncate(limit);

    for row in &mut table.rows {
        row[lat] = (center.0 + rng.gen_range(-spread..spread)).to_string();
        row[lon] = (center.1 + rng.gen_range(-spread..spread)).to_string();
    }

    if table.column("wheelchair_boarding").is_none() {
        table.fill_column("wheelchair_boarding", "0");
    }
    Ok(())
}

/// Stop documents with missing cells as null. Stops without usable coordinates are left out.
pub fn stop_documents(table: &Table, limit: usize) -> Vec<Value> {
    table
        .documents(limit, &Value::Null)
        .into_iter()
        .filter(|doc| {
            ["stop_lat", "stop_lon"]
                .iter()
                .all(|key| doc.get(*key).is_some_and(Value::is_number))
        })
        .map(Value::Object)
        .collect()
}

/// Route documents with missing cells as empty strings.
pub fn route_documents(table: &Table, limit: usize) -> Vec<Value> {
    table
        .documents(limit, &Value::String(String::new()))
        .into_iter()
        .map(Value::Object)
        .collect()
}

#[derive(Debug, Clone)]
pub struct PrepareOptions {
    pub agency_name: String,
    pub stop_limit: usize,
    pub route_limit: usize,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            agency_name: DEFAULT_AGENCY_NAME.to_string(),
            stop_limit: DEFAULT_STOP_LIMIT,
            route_limit: DEFAULT_ROUTE_LIMIT,
        }
    }
}

#[derive(Debug, Default)]
pub struct PreparedData {
    pub stops: Vec<Value>,
    pub routes: Vec<Value>,
}

/// Rewrite the export in `dir` in place and return the documents to upload.
pub fn prepare_directory<R: Rng>(
    dir: &Path,
    options: &PrepareOptions,
    rng: &mut R,
) -> Result<PreparedData, PrepareError> {
    let mut prepared = PreparedData::default();

    for (file_name, expected) in GTFS_FILES {
        let path = dir.join(file_name);
        if !path.exists() {
            warn!(file = file_name, path = %path.display(), "Not found");
            continue;
        }

        let mut table = Table::load(&path)?;
        info!(
            file = file_name,
            rows = table.rows.len(),
            columns = ?table.headers,
            expected,
            "Processing"
        );

        match file_name {
            "agency.csv" => {
                rename_agency(&mut table, &options.agency_name);
                table.save(&path)?;
                info!(file = file_name, agency = %options.agency_name, "Renamed agency");
            }
            "stops.csv" => {
                let before = table.rows.len();
                scatter_stops(
                    &mut table,
                    options.stop_limit,
                    STOP_CENTER,
                    STOP_SPREAD_DEG,
                    rng,
                )?;
                table.save(&path)?;
                prepared.stops = stop_documents(&table, options.stop_limit);
                info!(
                    before,
                    after = table.rows.len(),
                    documents = prepared.stops.len(),
                    "Scattered stops"
                );
            }
            "routes.csv" => {
                prepared.routes = route_documents(&table, options.route_limit);
            }
            _ => {}
        }
    }

    Ok(prepared)
}
