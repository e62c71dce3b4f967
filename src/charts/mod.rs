//! Charts module - Static chart producers for the merged table

mod renderer;
mod series;

use polars::prelude::PolarsError;
use thiserror::Error;

pub use renderer::{
    render_correlation_heatmap, render_country_trends, render_deaths_vs_vaccination,
    render_policy_vs_outcomes, CORRELATION_HEATMAP_FILE, COUNTRY_TRENDS_FILE,
    DEATHS_VS_VACCINATION_FILE, POLICY_VS_OUTCOMES_FILE,
};

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("Column '{0}' missing from merged table")]
    MissingColumn(String),
    #[error("No rows available for the {0}")]
    EmptySelection(&'static str),
    #[error(transparent)]
    Stats(#[from] crate::stats::StatsError),
    #[error("Render failed: {0}")]
    Render(String),
}
