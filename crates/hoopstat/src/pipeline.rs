// Pipeline runner: discovers season files, runs the stages in order for one
// competition, and writes the output tables.
//
// Stage order:
// 1. Merge raw season files (normalize, consolidate, concatenate)
// 2. Classify awards
// 3. Tag HOF players (when a roster is configured)
// 4. Drop sparse metric columns (when a threshold is configured)
// 5. Impute missing metrics per era
// 6. Aggregate careers
// 7. Repeat 5-6 on the HOF-only subset

use crate::config::Config;
use anyhow::{bail, Context};
use glob::glob;
use hoopstat_core::awards::classify_table;
use hoopstat_core::career::{aggregate, CareerTable};
use hoopstat_core::hof::{hof_only, HofRoster};
use hoopstat_core::impute::impute;
use hoopstat_core::normalize::merge_files;
use hoopstat_core::season::{Competition, Metric, SeasonTable};
use hoopstat_core::table_io::{read_season_table, write_career_table, write_season_table};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Which part of the pipeline to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Merge raw files, then impute and aggregate.
    Run,
    /// Merge raw files only.
    Merge,
    /// Impute and aggregate from a previously written merged table.
    Careers,
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub input_rows: usize,
    pub unique_players: usize,
    pub dropped_metrics: Vec<Metric>,
    pub imputed_rows: usize,
    pub career_rows: usize,
    /// Season rows tagged HOF, when tagging ran.
    pub hof_rows: Option<usize>,
    /// Career rows of HOF players in the HOF-only output.
    pub hof_career_rows: Option<usize>,
}

impl RunSummary {
    fn log(&self, competition: Competition) {
        info!("===== {} summary =====", competition.label());
        info!(
            "input: {} rows, {} unique players",
            self.input_rows, self.unique_players
        );
        if !self.dropped_metrics.is_empty() {
            let names: Vec<_> = self.dropped_metrics.iter().map(|m| m.header()).collect();
            info!("dropped sparse columns: {}", names.join(", "));
        }
        if self.imputed_rows > 0 {
            info!(
                "imputed: {} rows; careers: {} rows",
                self.imputed_rows, self.career_rows
            );
        }
        if let Some(rows) = self.hof_rows {
            info!("HOF season rows: {}", rows);
        }
        if let Some(rows) = self.hof_career_rows {
            info!("HOF careers: {}", rows);
        }
    }
}

pub struct Pipeline<'a> {
    config: &'a Config,
    base_dir: PathBuf,
    roster: Option<HofRoster>,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, base_dir: &Path) -> anyhow::Result<Self> {
        let roster = match &config.roster {
            Some(names) => {
                let roster = HofRoster::new(names.iter().cloned())
                    .context("failed to build HOF name matcher")?;
                info!("HOF roster: {} players", roster.len());
                Some(roster)
            }
            None => {
                info!("no hof.toml; HOF tagging disabled");
                None
            }
        };
        Ok(Pipeline {
            config,
            base_dir: base_dir.to_path_buf(),
            roster,
        })
    }

    /// Run `stage` for one competition and log its summary.
    pub fn run(&self, competition: Competition, stage: Stage) -> anyhow::Result<RunSummary> {
        let output_dir = self.base_dir.join(&self.config.output.dir);
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("failed to create output directory {}", output_dir.display()))?;

        let mut summary = RunSummary::default();
        let table = match stage {
            Stage::Run | Stage::Merge => self.merge(competition, &mut summary)?,
            Stage::Careers => {
                let path = self.output_path(&self.config.output.files(competition).merged);
                let table = read_season_table(&path, competition)
                    .with_context(|| format!("failed to read merged {} table", competition.label()))?;
                info!("read {} rows from {}", table.len(), path.display());
                summary.input_rows = table.len();
                summary.unique_players = table.unique_players();
                if table.schema.hof {
                    summary.hof_rows = Some(table.records.iter().filter(|r| r.hof).count());
                }
                table
            }
        };

        if stage != Stage::Merge {
            self.careers(&table, &mut summary)?;
        }

        summary.log(competition);
        Ok(summary)
    }

    /// Raw season files for a competition, from the configured input dir.
    fn discover(&self, competition: Competition) -> anyhow::Result<Vec<PathBuf>> {
        let pattern_path = self
            .base_dir
            .join(&self.config.input.dir)
            .join(self.config.input.pattern(competition));
        let Some(pattern) = pattern_path.to_str() else {
            bail!("input path is not valid UTF-8: {}", pattern_path.display());
        };

        let mut files = Vec::new();
        for entry in glob(pattern).with_context(|| format!("invalid glob pattern {pattern}"))? {
            match entry {
                Ok(path) => files.push(path),
                Err(e) => warn!("skipping unreadable path: {}", e),
            }
        }

        if files.is_empty() {
            bail!("no {} files match {}", competition.label(), pattern);
        }
        info!("found {} {} season files", files.len(), competition.label());
        Ok(files)
    }

    fn merge(&self, competition: Competition, summary: &mut RunSummary) -> anyhow::Result<SeasonTable> {
        let files = self.discover(competition)?;
        let merged = merge_files(&files, competition)
            .with_context(|| format!("failed to merge {} season files", competition.label()))?;
        summary.input_rows = merged.len();
        summary.unique_players = merged.unique_players();

        let mut table = classify_table(&merged);

        if let Some(roster) = &self.roster {
            table = roster.tag(&table);
            summary.hof_rows = Some(table.records.iter().filter(|r| r.hof).count());
        }

        if let Some(threshold) = self.config.hof.sparse_column_threshold {
            let (trimmed, dropped) = table.drop_sparse_metrics(threshold);
            for metric in &dropped {
                info!(
                    "dropping {}: more than {:.0}% missing",
                    metric.header(),
                    threshold * 100.0
                );
            }
            summary.dropped_metrics = dropped;
            table = trimmed;
        }

        let path = self.output_path(&self.config.output.files(competition).merged);
        write_season_table(&path, &table)
            .with_context(|| format!("failed to write merged {} table", competition.label()))?;
        info!("wrote {} rows to {}", table.len(), path.display());
        Ok(table)
    }

    fn careers(&self, table: &SeasonTable, summary: &mut RunSummary) -> anyhow::Result<()> {
        let files = self.config.output.files(table.competition);

        let careers = self.impute_and_aggregate(table, &files.imputed, &files.career)?;
        summary.imputed_rows = table.len();
        summary.career_rows = careers.len();

        if !self.config.hof.hof_only_outputs || !table.schema.hof {
            return Ok(());
        }
        let subset = hof_only(table);
        if subset.is_empty() {
            warn!(
                "no HOF players in {} data; skipping HOF-only outputs",
                table.competition.label()
            );
            return Ok(());
        }

        let prefix = &self.config.hof.output_prefix;
        let hof_careers = self.impute_and_aggregate(
            &subset,
            &format!("{prefix}{}", files.imputed),
            &format!("{prefix}{}", files.career),
        )?;
        summary.hof_career_rows = Some(hof_careers.len());
        Ok(())
    }

    fn impute_and_aggregate(
        &self,
        table: &SeasonTable,
        imputed_name: &str,
        career_name: &str,
    ) -> anyhow::Result<CareerTable> {
        let label = table.competition.label();

        let imputed = impute(table).with_context(|| format!("failed to impute {label} table"))?;
        let path = self.output_path(imputed_name);
        write_season_table(&path, &imputed)
            .with_context(|| format!("failed to write imputed {label} table"))?;
        info!("wrote {} rows to {}", imputed.len(), path.display());

        let careers = aggregate(&imputed);
        if !careers.hof_conflicts.is_empty() {
            warn!(
                "{} players with conflicting HOF values: {}",
                careers.hof_conflicts.len(),
                careers.hof_conflicts.join(", ")
            );
        }
        let path = self.output_path(career_name);
        write_career_table(&path, &careers)
            .with_context(|| format!("failed to write {label} career table"))?;
        info!("wrote {} careers to {}", careers.len(), path.display());

        Ok(careers)
    }

    fn output_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(&self.config.output.dir).join(name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
