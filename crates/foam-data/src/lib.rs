//! Dataset configuration and CSV loading for FOAM.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use arrow_array::{Array, StringArray};
use arrow_csv::reader::Format;
use arrow_csv::ReaderBuilder;
use arrow_schema::{ArrowError, DataType, Field as ArrowField, Schema};
use chrono::{NaiveDate, NaiveDateTime};
use foam_core::{
    status_color, Award, AwardColumn, Column, Datasets, FacetOrder, Opportunity, OpportunityColumn,
};
use thiserror::Error;
use tracing::{debug, info, info_span};

pub const CRATE_NAME: &str = "foam-data";

#[derive(Debug, Clone)]
pub struct DataConfig {
    pub data_dir: PathBuf,
    pub opportunities_file: String,
    pub awards_file: String,
    pub facet_order_file: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            opportunities_file: "ActiveOpportunities.csv".to_string(),
            awards_file: "PastAwards.csv".to_string(),
            facet_order_file: None,
        }
    }
}

impl DataConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: std::env::var("FOAM_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            opportunities_file: std::env::var("FOAM_OPPORTUNITIES_FILE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.opportunities_file),
            awards_file: std::env::var("FOAM_AWARDS_FILE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.awards_file),
            facet_order_file: std::env::var("FOAM_FACET_ORDER_FILE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn opportunities_path(&self) -> PathBuf {
        self.data_dir.join(&self.opportunities_file)
    }

    pub fn awards_path(&self) -> PathBuf {
        self.data_dir.join(&self.awards_file)
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("data file not found: {}", .path.display())]
    MissingFile { path: PathBuf },
    #[error("{} is missing required column `{column}`", .path.display())]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error("reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: ArrowError,
    },
}

impl LoadError {
    /// Missing inputs are reported to the user instead of aborting.
    pub fn is_missing_input(&self) -> bool {
        matches!(self, LoadError::MissingFile { .. })
    }
}

pub fn load_datasets(config: &DataConfig) -> Result<Datasets, LoadError> {
    let opportunities = load_opportunities(&config.opportunities_path())?;
    let awards = load_awards(&config.awards_path())?;
    Ok(Datasets {
        opportunities,
        awards,
    })
}

/// Built-in facet order, overlaid with the YAML file when one is configured.
pub fn load_facet_order(config: &DataConfig) -> anyhow::Result<FacetOrder> {
    let Some(path) = &config.facet_order_file else {
        return Ok(FacetOrder::default());
    };
    let yaml = std::fs::read_to_string(path)
        .with_context(|| format!("reading facet order file {}", path.display()))?;
    let overrides: FacetOrder = serde_yaml::from_str(&yaml)
        .with_context(|| format!("parsing facet order file {}", path.display()))?;
    Ok(FacetOrder::default().merged(overrides))
}

pub fn load_opportunities(path: &Path) -> Result<Vec<Opportunity>, LoadError> {
    use OpportunityColumn as C;
    let table = StringTable::read(path, OpportunityColumn::all())?;
    let mut coerced_dates = 0usize;
    let rows = (0..table.len)
        .map(|i| {
            let posted_raw = table.get(C::PostedDate.header(), i);
            let posted_date = posted_raw.and_then(parse_date);
            if posted_raw.is_some() && posted_date.is_none() {
                coerced_dates += 1;
            }
            let days_remaining_code = table.owned(C::DaysRemainingCode.header(), i);
            Opportunity {
                notice_id: table.owned(C::NoticeId.header(), i),
                awarding_agency: table.owned(C::AwardingAgency.header(), i),
                title: table.owned(C::Title.header(), i),
                description: table.owned(C::Description.header(), i),
                opportunity_type: table.owned(C::OpportunityType.header(), i),
                score: table.owned(C::Score.header(), i),
                score_mapped: table.owned(C::ScoreMapped.header(), i),
                set_aside_type: table.owned(C::SetAsideType.header(), i),
                status_color: days_remaining_code
                    .as_deref()
                    .and_then(status_color)
                    .map(String::from),
                days_remaining_code,
                days_to_response_deadline: table
                    .get(C::DaysToResponseDeadline.header(), i)
                    .and_then(parse_number),
                posted_date,
                naics_description: table.owned(C::NaicsDescription.header(), i),
                description_link: table.owned(C::DescriptionLink.header(), i),
            }
        })
        .collect::<Vec<_>>();
    if coerced_dates > 0 {
        debug!(path = %path.display(), coerced_dates, "unparseable dates coerced to null");
    }
    Ok(rows)
}

pub fn load_awards(path: &Path) -> Result<Vec<Award>, LoadError> {
    use AwardColumn as C;
    let table = StringTable::read(path, AwardColumn::all())?;
    let date = |column: AwardColumn, i: usize| table.get(column.header(), i).and_then(parse_date);
    let number =
        |column: AwardColumn, i: usize| table.get(column.header(), i).and_then(parse_number);
    Ok((0..table.len)
        .map(|i| Award {
            award_id: table.owned(C::AwardId.header(), i).unwrap_or_default(),
            awarding_agency: table.owned(C::AwardingAgency.header(), i),
            recipient_name: table.owned(C::RecipientName.header(), i),
            award_type: table.owned(C::AwardType.header(), i),
            contract_status: table.owned(C::ContractStatus.header(), i),
            naics_description: table.owned(C::NaicsDescription.header(), i),
            amount_bin: table.owned(C::AmountBin.header(), i),
            generated_internal_id: table.owned(C::GeneratedInternalId.header(), i),
            award_amount: number(C::AwardAmount, i),
            description: table.owned(C::Description.header(), i),
            start_date: date(C::StartDate, i),
            end_date: date(C::EndDate, i),
            last_modified_date: date(C::LastModifiedDate, i),
            months_until_end: table.owned(C::MonthsUntilEnd.header(), i),
            url: table.owned(C::Url.header(), i),
            number_of_offers_received: number(C::OffersReceived, i),
            contract_duration_years: number(C::ContractDurationYears, i),
        })
        .collect())
}

/// Required columns of a CSV file, read as text. Empty cells are null; other
/// cells are kept verbatim.
struct StringTable {
    columns: HashMap<&'static str, Vec<Option<String>>>,
    len: usize,
}

impl StringTable {
    fn read<C: Column>(path: &Path, required: &[C]) -> Result<Self, LoadError> {
        let span = info_span!("load_csv", path = %path.display());
        let _guard = span.enter();
        let started = Instant::now();

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(LoadError::MissingFile {
                    path: path.to_path_buf(),
                })
            }
            Err(source) => {
                return Err(LoadError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let csv_err = |source: ArrowError| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let (inferred, _) = Format::default()
            .with_header(true)
            .infer_schema(Cursor::new(&bytes), Some(1))
            .map_err(csv_err)?;
        let headers = inferred
            .fields()
            .iter()
            .map(|f| f.name().trim().to_string())
            .collect::<Vec<_>>();

        let mut projection = Vec::with_capacity(required.len());
        for column in required {
            let header = column.header();
            let idx = headers
                .iter()
                .position(|h| h == header)
                .ok_or_else(|| LoadError::MissingColumn {
                    path: path.to_path_buf(),
                    column: header,
                })?;
            projection.push(idx);
        }

        // Every column is read as text; typed coercion happens per field.
        let schema = Schema::new(
            headers
                .iter()
                .map(|h| ArrowField::new(h.as_str(), DataType::Utf8, true))
                .collect::<Vec<_>>(),
        );
        let reader = ReaderBuilder::new(Arc::new(schema))
            .with_header(true)
            .with_projection(projection)
            .build(Cursor::new(&bytes))
            .map_err(csv_err)?;

        let mut columns: HashMap<&'static str, Vec<Option<String>>> =
            required.iter().map(|c| (c.header(), Vec::new())).collect();
        let mut len = 0usize;
        for batch in reader {
            let batch = batch.map_err(csv_err)?;
            for (pos, column) in required.iter().enumerate() {
                let array = batch
                    .column(pos)
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .ok_or_else(|| {
                        csv_err(ArrowError::CastError(format!(
                            "column `{}` was not read as text",
                            column.header()
                        )))
                    })?;
                let values = columns.entry(column.header()).or_default();
                values.extend((0..array.len()).map(|i| {
                    if array.is_null(i) {
                        None
                    } else {
                        let v = array.value(i);
                        (!v.is_empty()).then(|| v.to_string())
                    }
                }));
            }
            len += batch.num_rows();
        }

        info!(
            rows = len,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "loaded csv table"
        );
        Ok(Self { columns, len })
    }

    fn get(&self, header: &str, row: usize) -> Option<&str> {
        self.columns
            .get(header)
            .and_then(|values| values.get(row))
            .and_then(|v| v.as_deref())
    }

    fn owned(&self, header: &str, row: usize) -> Option<String> {
        self.get(header, row).map(String::from)
    }
}

/// Coerce a date-like value; anything unparseable becomes null.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    for fmt in ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d);
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%m/%d/%Y %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.date_naive())
}

/// Numeric coercion tolerant of currency formatting (`$1,200.50`).
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned = raw
        .trim()
        .trim_start_matches('$')
        .replace(',', "");
    cleaned.parse::<f64>().ok().filter(|v| !v.is_nan())
}
