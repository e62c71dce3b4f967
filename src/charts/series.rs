//! Chart Series Module
//! Read-only extraction of per-location series and rankings from the
//! merged table.

use chrono::{Days, NaiveDate};
use polars::prelude::*;

use crate::charts::ChartError;

/// Latest-dated snapshot of one location for the vaccination comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct VaccinationRow {
    pub location: String,
    pub deaths_per100k: f64,
    pub fully_vaccinated_pct: f64,
}

/// The `n` locations with the highest maximum of `column`.
pub fn top_locations_by_max(
    df: &DataFrame,
    column: &str,
    n: usize,
) -> Result<Vec<String>, ChartError> {
    ensure_column(df, column)?;
    ensure_column(df, "location")?;

    let ranked = df
        .clone()
        .lazy()
        .group_by_stable([col("location")])
        .agg([col(column).cast(DataType::Float64).max().alias("peak")])
        .sort(
            ["peak"],
            SortMultipleOptions::default().with_order_descending(true),
        )
        .limit(n as u32)
        .collect()?;

    Ok(ranked
        .column("location")?
        .str()?
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect())
}

/// Chronological (date, value) points of one column for one location.
/// Rows with a null date or value are skipped.
pub fn location_series(
    df: &DataFrame,
    location: &str,
    column: &str,
) -> Result<Vec<(NaiveDate, f64)>, ChartError> {
    ensure_column(df, column)?;

    let rows = df
        .clone()
        .lazy()
        .filter(col("location").eq(lit(location)))
        .select([col("date"), col(column).cast(DataType::Float64)])
        .sort(["date"], SortMultipleOptions::default())
        .collect()?;

    let dates = rows.column("date")?.as_materialized_series().date()?.physical();
    let values = rows.column(column)?.f64()?;

    let mut points = Vec::with_capacity(rows.height());
    for (day, value) in dates.into_iter().zip(values) {
        let (Some(day), Some(value)) = (day, value) else {
            continue;
        };
        let Some(date) = date_from_days(day) else {
            continue;
        };
        points.push((date, value));
    }
    Ok(points)
}

/// Trailing rolling mean with min-periods-1 semantics: every prefix
/// shorter than the window averages whatever is available.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 {
        return values.to_vec();
    }
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for i in 0..values.len() {
        sum += values[i];
        if i >= window {
            sum -= values[i - window];
        }
        let len = (i + 1).min(window);
        out.push(sum / len as f64);
    }
    out
}

/// Rolling mean applied to the value component of a dated series.
pub fn rolling_mean_points(
    points: &[(NaiveDate, f64)],
    window: usize,
) -> Vec<(NaiveDate, f64)> {
    let values: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
    points
        .iter()
        .map(|(d, _)| *d)
        .zip(rolling_mean(&values, window))
        .collect()
}

/// Each location's most recent dated row, restricted to locations above
/// `min_population`, the top `n` by deaths per 100k first.
pub fn vaccination_ranking(
    df: &DataFrame,
    min_population: f64,
    n: usize,
) -> Result<Vec<VaccinationRow>, ChartError> {
    for name in [
        "deaths_per100k",
        "people_fully_vaccinated_per_hundred",
        "population",
    ] {
        ensure_column(df, name)?;
    }

    let latest = df
        .clone()
        .lazy()
        .sort(["location", "date"], SortMultipleOptions::default())
        .group_by_stable([col("location")])
        .agg([
            col("deaths_per100k").cast(DataType::Float64).last(),
            col("people_fully_vaccinated_per_hundred")
                .cast(DataType::Float64)
                .last(),
            col("population").cast(DataType::Float64).last(),
        ])
        .filter(col("population").gt(lit(min_population)))
        .sort(
            ["deaths_per100k"],
            SortMultipleOptions::default().with_order_descending(true),
        )
        .limit(n as u32)
        .collect()?;

    let locations = latest.column("location")?.str()?;
    let deaths = latest.column("deaths_per100k")?.f64()?;
    let vaccinated = latest.column("people_fully_vaccinated_per_hundred")?.f64()?;

    let mut rows = Vec::with_capacity(latest.height());
    for i in 0..latest.height() {
        let Some(location) = locations.get(i) else {
            continue;
        };
        rows.push(VaccinationRow {
            location: location.to_string(),
            deaths_per100k: deaths.get(i).unwrap_or(0.0),
            fully_vaccinated_pct: vaccinated.get(i).unwrap_or(0.0),
        });
    }
    Ok(rows)
}

fn ensure_column(df: &DataFrame, name: &str) -> Result<(), ChartError> {
    if df.column(name).is_err() {
        return Err(ChartError::MissingColumn(name.to_string()));
    }
    Ok(())
}

fn date_from_days(days: i32) -> Option<NaiveDate> {
    // NaiveDate::default() is the Unix epoch.
    let epoch = NaiveDate::default();
    if days >= 0 {
        epoch.checked_add_days(Days::new(days as u64))
    } else {
        epoch.checked_sub_days(Days::new(u64::from(days.unsigned_abs())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    fn sample_frame() -> DataFrame {
        df!(
            "location" => ["A", "A", "A", "B", "B", "B"],
            "date" => [0i32, 1, 2, 0, 1, 2],
            "confirmed" => [1.0, 2.0, 3.0, 10.0, 20.0, 30.0],
            "deaths_per100k" => [0.1, 0.2, 0.3, 5.0, 6.0, 7.0],
            "people_fully_vaccinated_per_hundred" => [10.0, 11.0, 12.0, 40.0, 45.0, 50.0],
            "population" => [2_000_000.0; 6],
        )
        .expect("frame")
        .lazy()
        .with_column(col("date").cast(DataType::Date))
        .collect()
        .expect("date cast")
    }

    #[test]
    fn ranking_orders_by_peak_value() {
        let df = sample_frame();
        let top = top_locations_by_max(&df, "confirmed", 2).expect("ranking");
        assert_eq!(top, vec!["B".to_string(), "A".to_string()]);

        let top_one = top_locations_by_max(&df, "confirmed", 1).expect("ranking");
        assert_eq!(top_one, vec!["B".to_string()]);
    }

    #[test]
    fn location_series_is_chronological_with_real_dates() {
        let df = sample_frame();
        let points = location_series(&df, "A", "confirmed").expect("series");
        assert_eq!(points.len(), 3);
        assert_eq!(
            points[0].0,
            NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch"),
            "Day 0 is the Unix epoch"
        );
        assert!(points.windows(2).all(|w| w[0].0 < w[1].0));
        assert_eq!(points[2].1, 3.0);
    }

    #[test]
    fn rolling_mean_uses_available_prefix() {
        let smoothed = rolling_mean(&[1.0, 2.0, 3.0], 7);
        assert_eq!(smoothed, vec![1.0, 1.5, 2.0]);

        let windowed = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(windowed, vec![1.0, 1.5, 2.5, 3.5]);
    }

    #[test]
    fn vaccination_ranking_filters_and_sorts() {
        let df = df!(
            "location" => ["Small", "Small", "Big", "Big", "Bigger", "Bigger"],
            "date" => [0i32, 1, 0, 1, 0, 1],
            "deaths_per100k" => [90.0, 99.0, 1.0, 2.0, 3.0, 4.0],
            "people_fully_vaccinated_per_hundred" => [0.0, 0.0, 50.0, 55.0, 60.0, 65.0],
            "population" => [500_000.0, 500_000.0, 2_000_000.0, 2_000_000.0, 3_000_000.0, 3_000_000.0],
        )
        .expect("frame")
        .lazy()
        .with_column(col("date").cast(DataType::Date))
        .collect()
        .expect("date cast");

        let rows = vaccination_ranking(&df, 1_000_000.0, 20).expect("ranking");
        let names: Vec<&str> = rows.iter().map(|r| r.location.as_str()).collect();
        assert_eq!(
            names,
            vec!["Bigger", "Big"],
            "Small populations are excluded, highest deaths first"
        );
        assert_eq!(rows[0].deaths_per100k, 4.0, "The latest dated row is used");
        assert_eq!(rows[0].fully_vaccinated_pct, 65.0);
    }

    #[test]
    fn missing_chart_column_is_a_hard_error() {
        let df = sample_frame();
        let err = location_series(&df, "A", "stringency_index");
        assert!(matches!(err, Err(ChartError::MissingColumn(name)) if name == "stringency_index"));
    }
}
