//! Static Chart Renderer
//! The four chart producers. Each is a pure function of the merged table
//! plus the output directory and writes exactly one PNG.

use chrono::{Days, NaiveDate};
use log::info;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};

use crate::charts::{series, ChartError};
use crate::stats::StatsCalculator;

pub const COUNTRY_TRENDS_FILE: &str = "cases_by_country_over_time.png";
pub const DEATHS_VS_VACCINATION_FILE: &str = "deaths_vs_vaccination.png";
pub const POLICY_VS_OUTCOMES_FILE: &str = "policy_vs_outcomes.png";
pub const CORRELATION_HEATMAP_FILE: &str = "heatmap_correlation.png";

/// Trailing window for the smoothed series.
const ROLLING_WINDOW: usize = 7;

/// Colors for per-country line series.
const PALETTE: [RGBColor; 10] = [
    RGBColor(231, 76, 60),
    RGBColor(46, 204, 113),
    RGBColor(155, 89, 182),
    RGBColor(243, 156, 18),
    RGBColor(26, 188, 156),
    RGBColor(233, 30, 99),
    RGBColor(0, 188, 212),
    RGBColor(255, 87, 34),
    RGBColor(121, 85, 72),
    RGBColor(96, 125, 139),
];

const DEATHS_BAR: RGBColor = RGBColor(255, 99, 71); // tomato
const VACCINATION_BAR: RGBColor = RGBColor(60, 179, 113); // medium sea green
const CASES_BAR: RGBColor = RGBColor(255, 165, 0); // orange

/// Columns feeding the correlation heatmap.
const CORRELATION_COLUMNS: [&str; 8] = [
    "confirmed_per100k",
    "deaths_per100k",
    "recovered_per100k",
    "new_cases_per100k",
    "new_deaths_per100k",
    "people_fully_vaccinated_per_hundred",
    "stringency_index",
    "population",
];

/// Country trend chart: 7-day rolling confirmed/deaths per 100k for the
/// six locations with the highest maximum cumulative confirmed count.
pub fn render_country_trends(df: &DataFrame, output_dir: &Path) -> Result<PathBuf, ChartError> {
    let top = series::top_locations_by_max(df, "confirmed", 6)?;
    if top.is_empty() {
        return Err(ChartError::EmptySelection("country trend chart"));
    }

    let mut lines = Vec::with_capacity(top.len());
    for location in &top {
        let cases = series::rolling_mean_points(
            &series::location_series(df, location, "confirmed_per100k")?,
            ROLLING_WINDOW,
        );
        let deaths = series::rolling_mean_points(
            &series::location_series(df, location, "deaths_per100k")?,
            ROLLING_WINDOW,
        );
        lines.push((location.clone(), cases, deaths));
    }

    let all_points = || lines.iter().flat_map(|(_, c, d)| c.iter().chain(d.iter()));
    let (x_min, x_max) =
        date_range(all_points()).ok_or(ChartError::EmptySelection("country trend chart"))?;
    let y_max = pad(value_max(all_points()));

    let path = output_dir.join(COUNTRY_TRENDS_FILE);
    let root = BitMapBackend::new(&path, (1600, 900)).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            "COVID-19 Confirmed Cases and Deaths Over Time (Top 6 Countries, per 100k)",
            ("sans-serif", 34),
        )
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(x_min..x_max, 0f64..y_max)
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc("Cases/Deaths per 100k")
        .x_label_formatter(&|date| date.format("%Y-%m").to_string())
        .draw()
        .map_err(render_err)?;

    for (i, (location, cases, deaths)) in lines.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        chart
            .draw_series(LineSeries::new(cases.iter().copied(), color.stroke_width(2)))
            .map_err(render_err)?
            .label(format!("{location} (cases)"))
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 18, y)], color.stroke_width(2))
            });
        chart
            .draw_series(DashedLineSeries::new(
                deaths.iter().copied(),
                6,
                4,
                color.stroke_width(2),
            ))
            .map_err(render_err)?
            .label(format!("{location} (deaths)"))
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 18, y)], color.stroke_width(1))
            });
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(render_err)?;

    root.present().map_err(render_err)?;
    info!("Wrote {}", path.display());
    Ok(path.clone())
}

/// Deaths-vs-vaccination chart: for each location's latest dated row,
/// restricted to populations over one million, the 20 highest deaths per
/// 100k as horizontal bars against percent fully vaccinated.
pub fn render_deaths_vs_vaccination(
    df: &DataFrame,
    output_dir: &Path,
) -> Result<PathBuf, ChartError> {
    let rows = series::vaccination_ranking(df, 1_000_000.0, 20)?;
    if rows.is_empty() {
        return Err(ChartError::EmptySelection("deaths vs vaccination chart"));
    }

    let n = rows.len();
    let x_max = pad(
        rows.iter()
            .map(|r| r.deaths_per100k.max(r.fully_vaccinated_pct))
            .filter(|v| v.is_finite())
            .fold(0.0, f64::max),
    );

    let path = output_dir.join(DEATHS_VS_VACCINATION_FILE);
    let root = BitMapBackend::new(&path, (1400, 1000)).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    let labels: Vec<&str> = rows.iter().map(|r| r.location.as_str()).collect();
    let label_for = |y: &f64| {
        let slot = y.floor() as usize;
        if slot < n {
            // Highest-ranked location at the top of the chart.
            labels[n - 1 - slot].to_string()
        } else {
            String::new()
        }
    };

    let mut chart = ChartBuilder::on(&root)
        .caption(
            "Deaths vs Vaccination Rates per Capita (Top 20 Impacted Countries)",
            ("sans-serif", 30),
        )
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(180)
        .build_cartesian_2d(0f64..x_max, 0f64..n as f64)
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n)
        .y_label_formatter(&label_for)
        .x_desc("Value")
        .y_desc("Country")
        .draw()
        .map_err(render_err)?;

    for (i, row) in rows.iter().enumerate() {
        let base = (n - 1 - i) as f64;
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(0.0, base + 0.12), (row.deaths_per100k.max(0.0), base + 0.88)],
                DEATHS_BAR.mix(0.8).filled(),
            )))
            .map_err(render_err)?;
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [
                    (0.0, base + 0.28),
                    (row.fully_vaccinated_pct.max(0.0), base + 0.72),
                ],
                VACCINATION_BAR.mix(0.6).filled(),
            )))
            .map_err(render_err)?;
    }

    // Zero-sized series carrying the legend entries.
    chart
        .draw_series(std::iter::once(Rectangle::new(
            [(0.0, 0.0), (0.0, 0.0)],
            DEATHS_BAR.mix(0.8).filled(),
        )))
        .map_err(render_err)?
        .label("Deaths per 100k")
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 14, y + 5)], DEATHS_BAR.mix(0.8).filled()));
    chart
        .draw_series(std::iter::once(Rectangle::new(
            [(0.0, 0.0), (0.0, 0.0)],
            VACCINATION_BAR.mix(0.6).filled(),
        )))
        .map_err(render_err)?
        .label("Fully Vaccinated (%)")
        .legend(|(x, y)| {
            Rectangle::new([(x, y - 5), (x + 14, y + 5)], VACCINATION_BAR.mix(0.6).filled())
        });

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(render_err)?;

    root.present().map_err(render_err)?;
    info!("Wrote {}", path.display());
    Ok(path.clone())
}

struct PolicyPanel {
    location: String,
    stringency: Vec<(NaiveDate, f64)>,
    cases: Vec<(NaiveDate, f64)>,
    deaths: Vec<(NaiveDate, f64)>,
}

/// Policy-vs-outcomes chart: one panel per top-4 location overlaying
/// rolling new cases/deaths per 100k (bars, secondary axis) against the
/// stringency index (line), all panels sharing one date range.
pub fn render_policy_vs_outcomes(df: &DataFrame, output_dir: &Path) -> Result<PathBuf, ChartError> {
    let top = series::top_locations_by_max(df, "confirmed", 4)?;
    if top.is_empty() {
        return Err(ChartError::EmptySelection("policy vs outcomes chart"));
    }

    let mut panels = Vec::with_capacity(top.len());
    for location in &top {
        let stringency = series::location_series(df, location, "stringency_index")?;
        let cases = series::rolling_mean_points(
            &series::location_series(df, location, "new_cases_per100k")?,
            ROLLING_WINDOW,
        );
        let deaths = series::rolling_mean_points(
            &series::location_series(df, location, "new_deaths_per100k")?,
            ROLLING_WINDOW,
        );
        panels.push(PolicyPanel {
            location: location.clone(),
            stringency,
            cases,
            deaths,
        });
    }

    let (x_min, x_max) = date_range(panels.iter().flat_map(|p| {
        p.stringency.iter().chain(p.cases.iter()).chain(p.deaths.iter())
    }))
    .ok_or(ChartError::EmptySelection("policy vs outcomes chart"))?;

    let path = output_dir.join(POLICY_VS_OUTCOMES_FILE);
    let root = BitMapBackend::new(&path, (1800, 1200)).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;
    let root = root
        .titled(
            "Policy Stringency vs COVID-19 Outcomes (Top 4 Countries)",
            ("sans-serif", 36),
        )
        .map_err(render_err)?;

    let areas = root.split_evenly((2, 2));
    for (area, panel) in areas.iter().zip(&panels) {
        // The stringency index is a 0-100 composite score.
        let stringency_max = pad(value_max(panel.stringency.iter())).max(100.0);
        let outcome_max = pad(value_max(panel.cases.iter().chain(panel.deaths.iter())));

        let mut chart = ChartBuilder::on(area)
            .caption(
                format!("{}: Policy Stringency vs Outcomes", panel.location),
                ("sans-serif", 24),
            )
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .right_y_label_area_size(60)
            .build_cartesian_2d(x_min..x_max, 0f64..stringency_max)
            .map_err(render_err)?
            .set_secondary_coord(x_min..x_max, 0f64..outcome_max);

        chart
            .configure_mesh()
            .x_desc("Date")
            .y_desc("Stringency Index")
            .x_label_formatter(&|date| date.format("%Y-%m").to_string())
            .draw()
            .map_err(render_err)?;
        chart
            .configure_secondary_axes()
            .y_desc("Cases/Deaths per 100k")
            .draw()
            .map_err(render_err)?;

        chart
            .draw_secondary_series(panel.cases.iter().map(|(date, value)| {
                let end = date.checked_add_days(Days::new(1)).unwrap_or(*date);
                Rectangle::new([(*date, 0.0), (end, *value)], CASES_BAR.mix(0.4).filled())
            }))
            .map_err(render_err)?
            .label("New Cases (7d avg)")
            .legend(|(x, y)| {
                Rectangle::new([(x, y - 5), (x + 14, y + 5)], CASES_BAR.mix(0.4).filled())
            });
        chart
            .draw_secondary_series(panel.deaths.iter().map(|(date, value)| {
                let end = date.checked_add_days(Days::new(1)).unwrap_or(*date);
                Rectangle::new([(*date, 0.0), (end, *value)], RED.mix(0.3).filled())
            }))
            .map_err(render_err)?
            .label("New Deaths (7d avg)")
            .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 14, y + 5)], RED.mix(0.3).filled()));

        chart
            .draw_series(LineSeries::new(
                panel.stringency.iter().copied(),
                BLUE.stroke_width(2),
            ))
            .map_err(render_err)?
            .label("Stringency Index")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], BLUE.stroke_width(2)));

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(render_err)?;
    }

    root.present().map_err(render_err)?;
    info!("Wrote {}", path.display());
    Ok(path.clone())
}

/// Correlation heatmap: annotated pairwise Pearson matrix across the
/// eight derived/raw columns.
pub fn render_correlation_heatmap(
    df: &DataFrame,
    output_dir: &Path,
) -> Result<PathBuf, ChartError> {
    let matrix = StatsCalculator::correlation_matrix(df, &CORRELATION_COLUMNS)?;
    let n = CORRELATION_COLUMNS.len();

    let path = output_dir.join(CORRELATION_HEATMAP_FILE);
    let root = BitMapBackend::new(&path, (1150, 1000)).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            "Correlation Heatmap: Cases, Deaths, Vaccination, Policy, Population",
            ("sans-serif", 26),
        )
        .margin(15)
        .x_label_area_size(170)
        .y_label_area_size(240)
        .build_cartesian_2d(0f64..n as f64, 0f64..n as f64)
        .map_err(render_err)?;

    let x_label = |x: &f64| {
        let idx = x.floor() as usize;
        if idx < n {
            CORRELATION_COLUMNS[idx].to_string()
        } else {
            String::new()
        }
    };
    let y_label = |y: &f64| {
        let idx = y.floor() as usize;
        if idx < n {
            // Matrix row 0 sits at the top of the chart.
            CORRELATION_COLUMNS[n - 1 - idx].to_string()
        } else {
            String::new()
        }
    };

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_labels(n)
        .y_labels(n)
        .x_label_formatter(&x_label)
        .y_label_formatter(&y_label)
        .x_label_style(("sans-serif", 15).into_font().transform(FontTransform::Rotate90))
        .y_label_style(("sans-serif", 15))
        .draw()
        .map_err(render_err)?;

    let mut cells = Vec::with_capacity(n * n);
    let mut annotations = Vec::with_capacity(n * n);
    for (i, row) in matrix.iter().enumerate() {
        for (j, &value) in row.iter().enumerate() {
            let x = j as f64;
            let y = (n - 1 - i) as f64;
            cells.push(Rectangle::new(
                [(x, y), (x + 1.0, y + 1.0)],
                diverging_color(value).filled(),
            ));

            let text_color = if value.is_finite() && value.abs() > 0.6 {
                WHITE
            } else {
                BLACK
            };
            let label = if value.is_finite() {
                format!("{value:.2}")
            } else {
                "-".to_string()
            };
            annotations.push(Text::new(
                label,
                (x + 0.5, y + 0.5),
                ("sans-serif", 18)
                    .into_font()
                    .color(&text_color)
                    .pos(Pos::new(HPos::Center, VPos::Center)),
            ));
        }
    }
    chart.draw_series(cells).map_err(render_err)?;
    chart.draw_series(annotations).map_err(render_err)?;

    root.present().map_err(render_err)?;
    info!("Wrote {}", path.display());
    Ok(path.clone())
}

fn render_err(e: impl std::fmt::Display) -> ChartError {
    ChartError::Render(e.to_string())
}

fn date_range<'a, I>(points: I) -> Option<(NaiveDate, NaiveDate)>
where
    I: Iterator<Item = &'a (NaiveDate, f64)>,
{
    let mut bounds: Option<(NaiveDate, NaiveDate)> = None;
    for (date, _) in points {
        bounds = Some(match bounds {
            None => (*date, *date),
            Some((lo, hi)) => (lo.min(*date), hi.max(*date)),
        });
    }
    // A degenerate single-day range cannot form an axis; widen it by a day.
    bounds.map(|(lo, hi)| {
        if lo == hi {
            (lo, hi.checked_add_days(Days::new(1)).unwrap_or(hi))
        } else {
            (lo, hi)
        }
    })
}

fn value_max<'a, I>(points: I) -> f64
where
    I: Iterator<Item = &'a (NaiveDate, f64)>,
{
    points
        .map(|(_, v)| *v)
        .filter(|v| v.is_finite())
        .fold(0.0, f64::max)
}

fn pad(max: f64) -> f64 {
    if max > 0.0 {
        max * 1.05
    } else {
        1.0
    }
}

/// White at zero, saturating towards blue for negative and red for
/// positive correlations.
fn diverging_color(value: f64) -> RGBColor {
    if !value.is_finite() {
        return RGBColor(220, 220, 220);
    }
    let v = value.clamp(-1.0, 1.0);
    let blend = |from: u8, to: u8, t: f64| (from as f64 + (to as f64 - from as f64) * t).round() as u8;
    if v < 0.0 {
        let t = -v;
        RGBColor(blend(247, 59, t), blend(247, 76, t), blend(247, 192, t))
    } else {
        RGBColor(blend(247, 180, v), blend(247, 4, v), blend(247, 38, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diverging_color_is_white_at_zero_and_saturated_at_the_poles() {
        assert_eq!(diverging_color(0.0), RGBColor(247, 247, 247));
        assert_eq!(diverging_color(1.0), RGBColor(180, 4, 38));
        assert_eq!(diverging_color(-1.0), RGBColor(59, 76, 192));
        assert_eq!(diverging_color(f64::NAN), RGBColor(220, 220, 220));
    }

    #[test]
    fn date_range_widens_single_day_spans() {
        let day = NaiveDate::from_ymd_opt(2020, 1, 22).expect("date");
        let points = vec![(day, 1.0)];
        let (lo, hi) = date_range(points.iter()).expect("bounds");
        assert_eq!(lo, day);
        assert!(hi > lo, "A degenerate range must be widened");
    }

    #[test]
    fn value_max_ignores_non_finite_values() {
        let day = NaiveDate::from_ymd_opt(2020, 1, 22).expect("date");
        let points = vec![(day, 3.0), (day, f64::INFINITY), (day, f64::NAN)];
        assert_eq!(value_max(points.iter()), 3.0);
    }
}
