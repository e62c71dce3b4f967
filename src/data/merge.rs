//! Dataset Merge Module
//! Reshapes the wide time-series files to long format, joins them with the
//! daily panel on (location, date), derives per-100k columns and fills gaps
//! to produce the per-country, per-day merged table.

use chrono::NaiveDate;
use log::info;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::data::loader::{self, LoaderError};

/// Identifier columns of the wide time-series files; everything else is an
/// observation date.
const WIDE_ID_COLUMNS: [&str; 4] = ["Province/State", "Country/Region", "Lat", "Long"];

/// Count columns that get a per-100k companion when present.
pub const COUNT_COLUMNS: [&str; 6] = [
    "confirmed",
    "deaths",
    "recovered",
    "new_cases",
    "new_deaths",
    "new_vaccinations",
];

/// Columns carried over from the daily panel source. Selecting this subset
/// before the join means a name collision with the metrics table cannot
/// occur, so the metrics-table version of a column always wins.
const PANEL_COLUMNS: [&str; 6] = [
    "population",
    "new_cases",
    "new_deaths",
    "new_vaccinations",
    "people_fully_vaccinated_per_hundred",
    "stringency_index",
];

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error("Failed to write merged dataset: {0}")]
    Io(#[from] std::io::Error),
    #[error("Column '{0}' missing from {1}")]
    MissingColumn(String, String),
    #[error("No metric tables to merge")]
    NoMetrics,
}

/// Run the whole merge strictly in order (reshape, merge, join, derive,
/// fill), persist the artifact and hand the table to the chart producers.
pub fn build_merged_dataset(config: &PipelineConfig) -> Result<DataFrame, MergeError> {
    let confirmed = melt_wide(&loader::load_csv(&config.confirmed_path())?, "confirmed")?;
    let deaths = melt_wide(&loader::load_csv(&config.deaths_path())?, "deaths")?;
    let recovered = melt_wide(&loader::load_csv(&config.recovered_path())?, "recovered")?;

    let metrics = merge_metrics(vec![confirmed, deaths, recovered])?;
    let panel = load_panel(&config.panel_path())?;
    let joined = join_panel(metrics, panel)?;
    let derived = derive_per100k(joined)?;
    let mut merged = fill_gaps(derived)?;

    let mut file = File::create(&config.merged_path)?;
    CsvWriter::new(&mut file).finish(&mut merged)?;
    info!("Merged dataset saved as {}", config.merged_path.display());

    Ok(merged)
}

/// Transform one wide time-series table into long format with columns
/// (location, date, <metric>), summing sub-regions that share a country
/// and date into one national figure. Rows without a country are dropped;
/// column headers that fail to parse as dates become null dates and
/// propagate as-is.
pub fn melt_wide(df: &DataFrame, metric: &str) -> Result<DataFrame, MergeError> {
    let countries = df
        .column("Country/Region")
        .map_err(|_| {
            MergeError::MissingColumn(
                "Country/Region".to_string(),
                format!("{metric} time series"),
            )
        })?
        .str()?;

    let mut locations: Vec<String> = Vec::new();
    let mut dates: Vec<Option<i32>> = Vec::new();
    let mut values: Vec<Option<f64>> = Vec::new();

    for column in df.get_columns() {
        let name = column.name().as_str();
        if WIDE_ID_COLUMNS.contains(&name) {
            continue;
        }

        let date = NaiveDate::parse_from_str(name, "%m/%d/%y")
            .ok()
            .map(days_since_epoch);
        let value_f64 = column.cast(&DataType::Float64)?;
        let value_ca = value_f64.f64()?;

        for i in 0..df.height() {
            let Some(country) = countries.get(i) else {
                continue;
            };
            locations.push(country.to_string());
            dates.push(date);
            values.push(value_ca.get(i));
        }
    }

    let long = DataFrame::new(vec![
        Column::new("location".into(), locations),
        Column::new("date".into(), dates),
        Column::new(metric.into(), values),
    ])?;

    Ok(long
        .lazy()
        .with_column(col("date").cast(DataType::Date))
        .group_by_stable([col("location"), col("date")])
        .agg([col(metric).sum()])
        .collect()?)
}

/// Fold the per-metric long tables into one via full outer joins on
/// (location, date); a date present for only one metric still yields a
/// row, with the other metrics null until the fill step.
pub fn merge_metrics(frames: Vec<DataFrame>) -> Result<DataFrame, MergeError> {
    let mut iter = frames.into_iter();
    let mut merged = iter.next().ok_or(MergeError::NoMetrics)?;

    for frame in iter {
        merged = merged
            .lazy()
            .join(
                frame.lazy(),
                [col("location"), col("date")],
                [col("location"), col("date")],
                JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
            )
            .collect()?;
    }

    Ok(merged)
}

/// Load the daily panel source and reduce it to the columns the merge
/// consumes, with the date parsed and one row per (location, date).
pub fn load_panel(path: &Path) -> Result<DataFrame, MergeError> {
    let df = loader::load_csv(path)?;

    for required in ["location", "date"].iter().chain(PANEL_COLUMNS.iter()) {
        if df.column(required).is_err() {
            return Err(MergeError::MissingColumn(
                (*required).to_string(),
                path.display().to_string(),
            ));
        }
    }

    let dates: Vec<Option<i32>> = df
        .column("date")?
        .str()?
        .into_iter()
        .map(|raw| {
            raw.and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                .map(days_since_epoch)
        })
        .collect();

    let mut selected =
        df.select(["location", "date"].iter().chain(PANEL_COLUMNS.iter()).copied())?;
    selected.replace("date", Series::new("date".into(), dates))?;

    let mut exprs: Vec<Expr> = vec![col("date").cast(DataType::Date)];
    for name in PANEL_COLUMNS {
        exprs.push(col(name).cast(DataType::Float64));
    }

    // (location, date) is a lookup key in the panel, not an identity;
    // keep the first row per key.
    Ok(selected
        .lazy()
        .with_columns(exprs)
        .group_by_stable([col("location"), col("date")])
        .agg([col("*").exclude(["location", "date"]).first()])
        .collect()?)
}

/// Left-join the panel onto the merged metrics; unmatched rows keep null
/// for the panel-only fields.
pub fn join_panel(metrics: DataFrame, panel: DataFrame) -> Result<DataFrame, MergeError> {
    Ok(metrics
        .lazy()
        .join(
            panel.lazy(),
            [col("location"), col("date")],
            [col("location"), col("date")],
            JoinArgs::new(JoinType::Left).with_coalesce(JoinCoalesce::CoalesceColumns),
        )
        .collect()?)
}

/// Add `<col>_per100k` for every tracked count column present. The
/// population column is used as-is at this point; a null population
/// yields a null derived value that the fill step later zeroes.
pub fn derive_per100k(df: DataFrame) -> Result<DataFrame, MergeError> {
    let mut exprs: Vec<Expr> = Vec::new();
    for count in COUNT_COLUMNS {
        if df.column(count).is_ok() {
            exprs.push(
                (col(count).cast(DataType::Float64) / col("population") * lit(1e5))
                    .alias(format!("{count}_per100k")),
            );
        }
    }
    if exprs.is_empty() {
        return Ok(df);
    }
    Ok(df.lazy().with_columns(exprs).collect()?)
}

/// Sort by (location, date) and fill gaps per location: population is
/// forward- then back-filled, every other numeric column is
/// forward-filled, and whatever is still null becomes 0.0. Afterwards no
/// numeric column contains a null.
pub fn fill_gaps(df: DataFrame) -> Result<DataFrame, MergeError> {
    let sorted = df
        .lazy()
        .sort(["location", "date"], SortMultipleOptions::default())
        .collect()?;

    let runs = location_runs(sorted.column("location")?.str()?);

    let mut columns: Vec<Column> = Vec::with_capacity(sorted.width());
    for column in sorted.get_columns() {
        let name = column.name().as_str();
        if name == "location" || name == "date" {
            columns.push(column.clone());
            continue;
        }

        let as_f64 = column.cast(&DataType::Float64)?;
        let mut values: Vec<Option<f64>> = as_f64.f64()?.into_iter().collect();

        forward_fill_runs(&mut values, &runs);
        if name == "population" {
            backward_fill_runs(&mut values, &runs);
        }

        let filled: Vec<f64> = values.into_iter().map(|v| v.unwrap_or(0.0)).collect();
        columns.push(Column::new(column.name().clone(), filled));
    }

    Ok(DataFrame::new(columns)?)
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    // NaiveDate::default() is the Unix epoch.
    (date - NaiveDate::default()).num_days() as i32
}

/// Contiguous runs of the same location in a sorted frame, as half-open
/// row ranges.
fn location_runs(location: &StringChunked) -> Vec<(usize, usize)> {
    let n = location.len();
    let mut runs = Vec::new();
    let mut start = 0usize;
    for i in 1..n {
        if location.get(i) != location.get(i - 1) {
            runs.push((start, i));
            start = i;
        }
    }
    if n > 0 {
        runs.push((start, n));
    }
    runs
}

fn forward_fill_runs(values: &mut [Option<f64>], runs: &[(usize, usize)]) {
    for &(start, end) in runs {
        let mut last: Option<f64> = None;
        for value in &mut values[start..end] {
            match value {
                Some(v) => last = Some(*v),
                None => *value = last,
            }
        }
    }
}

fn backward_fill_runs(values: &mut [Option<f64>], runs: &[(usize, usize)]) {
    for &(start, end) in runs {
        let mut next: Option<f64> = None;
        for value in values[start..end].iter_mut().rev() {
            match value {
                Some(v) => next = Some(*v),
                None => *value = next,
            }
        }
    }
}
