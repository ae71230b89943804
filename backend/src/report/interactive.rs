//! Per-country tables for the interactive map.
//!
//! Each country is an independent job writing only under
//! `<output>/interactive/<ISO3>/`. With `jobs > 1` the jobs run as blocking
//! tasks on the tokio runtime, at most `jobs` at a time. Every job runs to
//! completion; failures are collected and reported together at the end.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinSet;

use crate::error::{PipelineError, PipelineResult, WriteError, WriteResult};
use crate::logs::{log_error, log_info, log_success};
use crate::models::{Cell, CountryCode, Table, TradeFlow, TradeRole};
use crate::report::writer::{save_table, try_save_table, write_json, WriteOptions};
use crate::report::ReportTally;
use crate::transform::aggregate::{country_chapter_flows, totals_per_chapter};
use crate::transform::mapper::{make_human_readable, CountryFormat, Lookups, ProductFormat};
use crate::transform::rank::{chapter_totals_all_years, ranked_table, top_partners_all_years};

/// Chapters and partners kept per year in the per-country rankings.
pub const TOP_N: usize = 5;

/// Name of the country index file.
pub const AVAILABLE_COUNTRIES_FILE: &str = "available_countries.json";

/// Read-only inputs shared by every country job.
pub struct InteractiveContext {
    flows: Arc<Vec<TradeFlow>>,
    lookups: Lookups,
    /// Indices into `flows` of the flows each country takes part in.
    touching: HashMap<CountryCode, Vec<usize>>,
    out_dir: PathBuf,
}

impl InteractiveContext {
    pub fn new(flows: Arc<Vec<TradeFlow>>, lookups: Lookups, out_dir: impl Into<PathBuf>) -> Self {
        let mut touching: HashMap<CountryCode, Vec<usize>> = HashMap::new();
        for (idx, flow) in flows.iter().enumerate() {
            touching.entry(flow.exporter).or_default().push(idx);
            if flow.importer != flow.exporter {
                touching.entry(flow.importer).or_default().push(idx);
            }
        }
        Self {
            flows,
            lookups,
            touching,
            out_dir: out_dir.into(),
        }
    }

    /// Every country with at least one flow, ascending.
    pub fn countries(&self) -> Vec<CountryCode> {
        let codes: BTreeSet<CountryCode> = self.touching.keys().copied().collect();
        codes.into_iter().collect()
    }

    fn flows_of(&self, country: CountryCode) -> Vec<&TradeFlow> {
        self.touching
            .get(&country)
            .map(|idx| idx.iter().map(|&i| &self.flows[i]).collect())
            .unwrap_or_default()
    }
}

/// Chapter code → description for every chapter present in `flows`.
pub fn chapter_descriptions_table(flows: &[TradeFlow], lookups: &Lookups) -> PipelineResult<Table> {
    let chapters: BTreeSet<&str> = flows.iter().map(|f| f.product_chapter.as_str()).collect();
    let mut table = Table::new(["product_chapter", "description"]);
    for chapter in chapters {
        let description = lookups.chapter_label(chapter, ProductFormat::Description)?;
        table.push(vec![Cell::from(chapter), Cell::from(description)]);
    }
    Ok(table)
}

/// Imports and exports of `country` per (year, chapter).
pub fn surplus_deficit_table(flows: &[&TradeFlow], country: CountryCode) -> Table {
    let mut table = Table::new(["year", "product_chapter", "imports_trln_USD", "exports_trln_USD"]);
    for row in country_chapter_flows(flows.iter().copied(), country) {
        table.push(vec![
            Cell::from(row.year),
            Cell::from(row.product_chapter),
            Cell::Float(row.imports_trln_usd),
            Cell::Float(row.exports_trln_usd),
        ]);
    }
    table
}

/// Top chapters (food merged) of the flows where `country` is on `role`'s side.
pub fn top_chapters_table(
    flows: &[&TradeFlow],
    country: CountryCode,
    role: TradeRole,
    lookups: &Lookups,
) -> PipelineResult<Table> {
    let chapter_totals = totals_per_chapter(flows.iter().copied().filter(|f| role.of(f) == country));
    let rows = chapter_totals_all_years(&chapter_totals, TOP_N, true);
    Ok(make_human_readable(
        ranked_table(&rows, "product_chapter"),
        lookups,
        None,
        Some(ProductFormat::Description),
    )?)
}

/// Top partners of `country` on `role`'s side, per (year, chapter).
pub fn top_partners_table(
    flows: &[&TradeFlow],
    country: CountryCode,
    role: TradeRole,
    lookups: &Lookups,
) -> PipelineResult<Table> {
    let counterpart = match role {
        TradeRole::Exporter => TradeRole::Importer,
        TradeRole::Importer => TradeRole::Exporter,
    };
    let rows = top_partners_all_years(
        flows.iter().copied().filter(|f| counterpart.of(f) == country),
        role,
        TOP_N,
    );
    Ok(make_human_readable(
        ranked_table(&rows, role.column()),
        lookups,
        Some(CountryFormat::Iso3),
        None,
    )?)
}

/// Write the five tables of one country; returns its ISO3 directory name.
pub fn country_job(ctx: &InteractiveContext, country: CountryCode) -> PipelineResult<String> {
    let iso3 = ctx.lookups.country_label(country, CountryFormat::Iso3)?.to_string();
    let dir = ctx.out_dir.join(&iso3);
    let flows = ctx.flows_of(country);
    let opts = WriteOptions::default();

    save_table(&surplus_deficit_table(&flows, country), &dir.join("surplus_deficit_by_chapter.csv"), opts)?;
    save_table(
        &top_chapters_table(&flows, country, TradeRole::Importer, &ctx.lookups)?,
        &dir.join("top_import_chapters.csv"),
        opts,
    )?;
    save_table(
        &top_chapters_table(&flows, country, TradeRole::Exporter, &ctx.lookups)?,
        &dir.join("top_export_chapters.csv"),
        opts,
    )?;
    save_table(
        &top_partners_table(&flows, country, TradeRole::Exporter, &ctx.lookups)?,
        &dir.join("top_import_srcs.csv"),
        opts,
    )?;
    save_table(
        &top_partners_table(&flows, country, TradeRole::Importer, &ctx.lookups)?,
        &dir.join("top_export_dsts.csv"),
        opts,
    )?;

    Ok(iso3)
}

/// Outcome of the per-country loop.
#[derive(Debug, Clone, Default)]
pub struct InteractiveSummary {
    /// ISO3 codes written.
    pub countries: Vec<String>,
    /// `"<country>: <error>"` per failed job.
    pub failures: Vec<String>,
}

/// Run `job`, turning a panic into a [`PipelineError::Worker`].
fn run_guarded(job: impl FnOnce() -> PipelineResult<String>) -> PipelineResult<String> {
    panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(PipelineError::Worker(format!("panicked: {}", message)))
    })
}

fn failure(ctx: &InteractiveContext, country: CountryCode, err: &PipelineError) -> String {
    let name = ctx
        .lookups
        .country_label(country, CountryFormat::Iso3)
        .map(str::to_string)
        .unwrap_or_else(|_| country.to_string());
    format!("{}: {}", name, err)
}

/// Run every country job, `jobs` at a time.
pub async fn run_country_jobs(ctx: Arc<InteractiveContext>, jobs: usize) -> InteractiveSummary {
    let countries = ctx.countries();
    log_info(format!("Creating CSVs for {} countries ({} worker(s))", countries.len(), jobs.max(1)));

    let mut done: BTreeMap<CountryCode, PipelineResult<String>> = BTreeMap::new();
    let mut cancelled = Vec::new();

    if jobs <= 1 {
        for country in countries {
            done.insert(country, run_guarded(|| country_job(&ctx, country)));
        }
    } else {
        let mut set = JoinSet::new();
        let mut pending = countries.into_iter();
        loop {
            while set.len() < jobs {
                let Some(country) = pending.next() else {
                    break;
                };
                let ctx = Arc::clone(&ctx);
                set.spawn_blocking(move || (country, run_guarded(|| country_job(&ctx, country))));
            }
            match set.join_next().await {
                Some(Ok((country, result))) => {
                    done.insert(country, result);
                }
                Some(Err(e)) => cancelled.push(PipelineError::Worker(e.to_string()).to_string()),
                None => break,
            }
        }
    }

    let mut summary = InteractiveSummary::default();
    for (country, result) in done {
        match result {
            Ok(iso3) => summary.countries.push(iso3),
            Err(e) => {
                let message = failure(&ctx, country, &e);
                log_error(&message);
                summary.failures.push(message);
            }
        }
    }
    summary.failures.extend(cancelled);
    summary.countries.sort();
    summary
}

/// Names of the country directories under `interactive_dir`, sorted.
pub fn list_country_dirs(interactive_dir: &Path) -> WriteResult<Vec<String>> {
    let read = fs::read_dir(interactive_dir).map_err(|source| WriteError::Io {
        path: interactive_dir.to_path_buf(),
        source,
    })?;
    let mut names: Vec<String> = read
        .flatten()
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .collect();
    names.sort();
    Ok(names)
}

/// Rewrite `available_countries.json` from the directories on disk.
pub fn write_available_countries(interactive_dir: &Path) -> WriteResult<Vec<String>> {
    let names = list_country_dirs(interactive_dir)?;
    write_json(&names, &interactive_dir.join(AVAILABLE_COUNTRIES_FILE))?;
    Ok(names)
}

/// Write the chapter lookup, every country directory and the country index.
///
/// The index lists the countries written by this run.
///
/// Returns [`PipelineError::CountriesFailed`] when any country job failed;
/// the outputs of the other countries are kept.
pub async fn run_interactive(
    flows: Arc<Vec<TradeFlow>>,
    lookups: &Lookups,
    interactive_dir: &Path,
    jobs: usize,
) -> PipelineResult<ReportTally> {
    let mut tally = ReportTally::default();
    let descriptions = chapter_descriptions_table(&flows, lookups)?;
    tally.record(try_save_table(
        &descriptions,
        &interactive_dir.join("prod_chap_to_description.csv"),
        WriteOptions::default(),
    ));

    let ctx = Arc::new(InteractiveContext::new(flows, lookups.clone(), interactive_dir));
    let summary = run_country_jobs(ctx, jobs).await;
    tally.written += summary.countries.len() * 5;

    write_json(&summary.countries, &interactive_dir.join(AVAILABLE_COUNTRIES_FILE))?;
    tally.written += 1;
    log_success(format!(
        "Interactive reports: {} countries written, {} failed",
        summary.countries.len(),
        summary.failures.len()
    ));

    if !summary.failures.is_empty() {
        return Err(PipelineError::CountriesFailed(summary.failures));
    }
    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChapterRef, CountryRef};
    use tempfile::tempdir;

    fn flow(year: u16, exp: u32, imp: u32, ch: &str, v: f64) -> TradeFlow {
        TradeFlow {
            year,
            exporter: exp,
            importer: imp,
            product_chapter: ch.to_string(),
            value_trln_usd: v,
            quantity_mln_metric_tons: v,
        }
    }

    fn lookups(with_ukraine: bool) -> Lookups {
        let mut countries = vec![
            CountryRef {
                country_code: 682,
                country_name: "Saudi Arabia".into(),
                country_iso2: "SA".into(),
                country_iso3: "SAU".into(),
            },
            CountryRef {
                country_code: 156,
                country_name: "China".into(),
                country_iso2: "CN".into(),
                country_iso3: "CHN".into(),
            },
        ];
        if with_ukraine {
            countries.push(CountryRef {
                country_code: 804,
                country_name: "Ukraine".into(),
                country_iso2: "UA".into(),
                country_iso3: "UKR".into(),
            });
        }
        let chapters = [("10", "Cereals"), ("27", "Mineral fuels")]
            .iter()
            .map(|&(code, desc)| ChapterRef {
                section: "X".into(),
                hscode: code.into(),
                description: desc.into(),
            })
            .collect::<Vec<_>>();
        Lookups::new(&countries, &chapters)
    }

    fn flows() -> Arc<Vec<TradeFlow>> {
        Arc::new(vec![
            flow(2023, 682, 804, "10", 5.0),
            flow(2023, 804, 682, "10", 3.0),
            flow(2023, 682, 156, "27", 4.0),
        ])
    }

    #[test]
    fn test_surplus_deficit_by_chapter() {
        let ctx = InteractiveContext::new(flows(), lookups(true), "unused");
        let table = surplus_deficit_table(&ctx.flows_of(682), 682);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "product_chapter"), Some(&Cell::Text("10".into())));
        assert_eq!(table.get(0, "imports_trln_USD"), Some(&Cell::Float(3.0)));
        assert_eq!(table.get(0, "exports_trln_USD"), Some(&Cell::Float(5.0)));
        assert_eq!(table.get(1, "imports_trln_USD"), Some(&Cell::Float(0.0)));
    }

    #[test]
    fn test_top_partners_labels() {
        let ctx = InteractiveContext::new(flows(), lookups(true), "unused");
        let table = top_partners_table(&ctx.flows_of(682), 682, TradeRole::Importer, &ctx.lookups).unwrap();
        let idx = table.column_index("importer").unwrap();
        let names: Vec<String> = table.rows().iter().map(|r| r[idx].to_string()).collect();
        assert_eq!(names, vec!["UKR", "CHN"]);
    }

    #[test]
    fn test_top_partners_split_by_chapter() {
        let ctx = InteractiveContext::new(flows(), lookups(true), "unused");
        let table = top_partners_table(&ctx.flows_of(682), 682, TradeRole::Importer, &ctx.lookups).unwrap();
        assert_eq!(
            table.columns(),
            &["year", "product_chapter", "importer", "value_trln_USD", "quantity_mln_metric_tons"]
        );
        assert_eq!(table.get(0, "product_chapter"), Some(&Cell::Text("10".into())));
        assert_eq!(table.get(1, "product_chapter"), Some(&Cell::Text("27".into())));

        let sources = top_partners_table(&ctx.flows_of(682), 682, TradeRole::Exporter, &ctx.lookups).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources.get(0, "exporter"), Some(&Cell::Text("UKR".into())));
        assert_eq!(sources.get(0, "product_chapter"), Some(&Cell::Text("10".into())));
    }

    #[tokio::test]
    async fn test_parallel_jobs_write_every_country() {
        let dir = tempdir().unwrap();
        let ctx = Arc::new(InteractiveContext::new(flows(), lookups(true), dir.path()));
        let summary = run_country_jobs(ctx, 2).await;
        assert!(summary.failures.is_empty());
        assert_eq!(summary.countries, vec!["CHN", "SAU", "UKR"]);
        for iso3 in ["CHN", "SAU", "UKR"] {
            for file in [
                "surplus_deficit_by_chapter.csv",
                "top_import_chapters.csv",
                "top_export_chapters.csv",
                "top_import_srcs.csv",
                "top_export_dsts.csv",
            ] {
                assert!(dir.path().join(iso3).join(file).exists(), "{}/{}", iso3, file);
            }
        }
    }

    #[tokio::test]
    async fn test_failed_country_does_not_stop_others() {
        let dir = tempdir().unwrap();
        // a file where SAU's directory should go
        fs::write(dir.path().join("SAU"), "").unwrap();

        let err = run_interactive(flows(), &lookups(true), dir.path(), 2).await.unwrap_err();
        match err {
            PipelineError::CountriesFailed(failures) => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].starts_with("SAU: "));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(dir.path().join("UKR").join("top_export_dsts.csv").exists());
        assert!(dir.path().join("prod_chap_to_description.csv").exists());
        let listed: Vec<String> = serde_json::from_str(
            &fs::read_to_string(dir.path().join(AVAILABLE_COUNTRIES_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(listed, vec!["CHN", "UKR"]);
    }

    #[test]
    fn test_panicking_job_is_reported_for_its_country() {
        let ctx = InteractiveContext::new(flows(), lookups(true), "unused");
        let err = run_guarded(|| panic!("disk on fire")).unwrap_err();
        assert!(matches!(err, PipelineError::Worker(ref m) if m.contains("disk on fire")));

        let message = failure(&ctx, 682, &err);
        assert!(message.starts_with("SAU: "));
        assert!(message.contains("disk on fire"));
    }

    #[test]
    fn test_list_country_dirs_skips_files() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("USA")).unwrap();
        fs::create_dir(dir.path().join("CHN")).unwrap();
        fs::write(dir.path().join("prod_chap_to_description.csv"), "").unwrap();
        let names = write_available_countries(dir.path()).unwrap();
        assert_eq!(names, vec!["CHN", "USA"]);
        assert!(dir.path().join(AVAILABLE_COUNTRIES_FILE).exists());
    }
}
