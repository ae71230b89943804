//! Run orchestration: Loader → Normalizer → report stages.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::error::PipelineResult;
use crate::loader::{load_all_data, load_fact_table, Dataset};
use crate::logs::{log_info, log_success};
use crate::report::country::run_country_specific;
use crate::report::general::run_general;
use crate::report::interactive::run_interactive;
use crate::report::ReportTally;

/// Which report stages a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stages {
    pub general: bool,
    pub interactive: bool,
    pub country_specific: bool,
}

impl Stages {
    pub const ALL: Stages = Stages {
        general: true,
        interactive: true,
        country_specific: true,
    };

    pub const GENERAL: Stages = Stages {
        general: true,
        interactive: false,
        country_specific: false,
    };

    pub const INTERACTIVE: Stages = Stages {
        general: false,
        interactive: true,
        country_specific: false,
    };

    pub const COUNTRY_SPECIFIC: Stages = Stages {
        general: false,
        interactive: false,
        country_specific: true,
    };
}

/// Options of a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub stages: Stages,
    /// Concurrent per-country jobs; 1 runs them in order.
    pub jobs: usize,
    /// Restrict country-specific recipes to one ISO3 code.
    pub only_country: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            stages: Stages::ALL,
            jobs: 1,
            only_country: None,
        }
    }
}

/// Counts of a finished run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub flows: usize,
    pub general: ReportTally,
    pub interactive: ReportTally,
    pub country_specific: ReportTally,
}

impl RunSummary {
    pub fn total(&self) -> ReportTally {
        let mut total = self.general;
        total.merge(self.interactive);
        total.merge(self.country_specific);
        total
    }
}

/// Run the selected stages on an already loaded dataset.
///
/// Stages run in order general, country-specific, interactive; the first
/// stage error stops the run.
pub async fn run_on_dataset(dataset: &Dataset, config: &Config, opts: &RunOptions) -> PipelineResult<RunSummary> {
    let lookups = dataset.lookups();
    let mut summary = RunSummary {
        flows: dataset.flows.len(),
        ..RunSummary::default()
    };

    if opts.stages.general {
        log_info("📊 General reports");
        summary.general = run_general(dataset, &lookups, config)?;
    }

    if opts.stages.country_specific {
        log_info("🌍 Country-specific reports");
        summary.country_specific =
            run_country_specific(dataset, &lookups, config, opts.only_country.as_deref())?;
    }

    if opts.stages.interactive {
        log_info("🗺️ Interactive reports");
        summary.interactive = run_interactive(
            Arc::clone(&dataset.flows),
            &lookups,
            &config.interactive_dir(),
            opts.jobs,
        )
        .await?;
    }

    Ok(summary)
}

/// Load every input, then run the selected stages.
pub async fn run(config: &Config, opts: &RunOptions) -> PipelineResult<RunSummary> {
    let start = Instant::now();
    log_info(format!("Output directory: {}", config.output_dir.display()));

    let dataset = load_all_data(config)?;
    let summary = run_on_dataset(&dataset, config, opts).await?;

    let total = summary.total();
    log_success(format!(
        "Run finished in {:.1}s: {} files written, {} failed, {} skipped",
        start.elapsed().as_secs_f64(),
        total.written,
        total.failed,
        total.skipped
    ));
    Ok(summary)
}

/// Build (or load) the normalized fact-table cache only.
pub fn build_fact_table(config: &Config) -> PipelineResult<usize> {
    let flows = load_fact_table(config)?;
    log_success(format!(
        "Fact table ready: {} flows in {}",
        flows.len(),
        config.all_data_cache_path().display()
    ));
    Ok(flows.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_merges_stages() {
        let summary = RunSummary {
            flows: 3,
            general: ReportTally { written: 12, failed: 1, skipped: 0 },
            interactive: ReportTally { written: 6, failed: 0, skipped: 0 },
            country_specific: ReportTally { written: 5, failed: 0, skipped: 1 },
        };
        assert_eq!(summary.total(), ReportTally { written: 23, failed: 1, skipped: 1 });
    }

    #[test]
    fn test_default_runs_everything_sequentially() {
        let opts = RunOptions::default();
        assert_eq!(opts.stages, Stages::ALL);
        assert_eq!(opts.jobs, 1);
    }
}
