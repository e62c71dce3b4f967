//! Covid Insight - COVID-19 Dataset Merge & Chart Pipeline
//!
//! Fetches public COVID-19 datasets, merges them into a per-country,
//! per-day table and renders a fixed set of exploratory charts.

mod charts;
mod config;
mod data;
mod fetch;
mod stats;

use anyhow::Context;
use log::info;

use config::PipelineConfig;

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let config = PipelineConfig::default();
    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            config.output_dir.display()
        )
    })?;

    let summary = fetch::fetch_all(&config.sources());
    info!("Fetch complete: {summary}");

    let merged = data::build_merged_dataset(&config)?;
    info!(
        "Merged dataset: {} rows x {} columns",
        merged.height(),
        merged.width()
    );

    charts::render_country_trends(&merged, &config.output_dir)?;
    charts::render_deaths_vs_vaccination(&merged, &config.output_dir)?;
    charts::render_policy_vs_outcomes(&merged, &config.output_dir)?;
    charts::render_correlation_heatmap(&merged, &config.output_dir)?;

    info!("All visualizations saved in {}", config.output_dir.display());
    Ok(())
}
