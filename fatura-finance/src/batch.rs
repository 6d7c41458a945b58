//! Batch runner: classify statement files one after another, reconcile what
//! fell through to the fallback, and write a classified copy of each file.
//!
//! A failing file is recorded in its report and the batch moves on. A failed
//! reconciliation still writes the file with the decisions made before it.
//! Once the operator aborts, later files are still classified and written but
//! nothing more is prompted.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use fatura_core::{
    CategoryDictionary, Classifier, MatchPolicy, Normalizer, PendingQueue, ReconcileError,
    ReconcileReport, Reconciler, Resolution, Sample,
};
use fatura_ingest::{SkippedRow, SourceProfile, read_statement, write_classified_file};

use crate::summary::Summary;

pub const DEFAULT_OUTPUT_SUFFIX: &str = "_classificado";
pub const DEFAULT_CATEGORY_COLUMN: &str = "categoria";

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub policy: MatchPolicy,
    /// Defaults to the input file's directory.
    pub output_dir: Option<PathBuf>,
    pub output_suffix: String,
    pub category_column: String,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            policy: MatchPolicy::default(),
            output_dir: None,
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
            category_column: DEFAULT_CATEGORY_COLUMN.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchInput {
    pub path: PathBuf,
    pub profile: SourceProfile,
}

impl BatchInput {
    pub fn new(path: impl Into<PathBuf>, profile: SourceProfile) -> Self {
        Self {
            path: path.into(),
            profile,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    /// Rows written.
    pub rows: usize,
    /// Rows still labeled with the fallback after reconciliation.
    pub unclassified: usize,
    /// Rows labeled by an operator decision made while processing this file.
    pub resolved: usize,
    pub skipped: Vec<SkippedRow>,
    pub summary: Option<Summary>,
    pub error: Option<String>,
}

impl FileReport {
    fn failed(input: &Path, error: &anyhow::Error) -> Self {
        Self {
            input: input.to_path_buf(),
            output: None,
            rows: 0,
            unclassified: 0,
            resolved: 0,
            skipped: Vec::new(),
            summary: None,
            error: Some(format!("{error:#}")),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
    /// The operator stopped prompting at some point during the batch.
    pub aborted: bool,
}

impl BatchReport {
    pub fn failed(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| !f.is_ok())
    }

    pub fn total_rows(&self) -> usize {
        self.files.iter().map(|f| f.rows).sum()
    }

    pub fn total_unclassified(&self) -> usize {
        self.files.iter().map(|f| f.unclassified).sum()
    }
}

/// `<dir>/<stem><suffix>.csv`, where `dir` defaults to the input's directory.
pub fn output_path(input: &Path, output_dir: Option<&Path>, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "statement".to_string());
    let dir = output_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(format!("{stem}{suffix}.csv"))
}

pub struct BatchRunner<'a> {
    normalizer: &'a Normalizer,
    options: BatchOptions,
    reconciler: Option<Reconciler<'a>>,
    aborted: bool,
    /// Descriptions the operator already left unclassified in this batch.
    kept: HashSet<String>,
}

impl<'a> BatchRunner<'a> {
    pub fn new(normalizer: &'a Normalizer, options: BatchOptions) -> Self {
        Self {
            normalizer,
            options,
            reconciler: None,
            aborted: false,
            kept: HashSet::new(),
        }
    }

    /// Enables interactive reconciliation.
    pub fn with_reconciler(mut self, reconciler: Reconciler<'a>) -> Self {
        self.reconciler = Some(reconciler);
        self
    }

    pub fn run(&mut self, dict: &mut CategoryDictionary, inputs: &[BatchInput]) -> BatchReport {
        let mut report = BatchReport::default();

        for input in inputs {
            let file_report = match self.process_file(dict, input) {
                Ok(r) => r,
                Err(e) => {
                    warn!(file = %input.path.display(), error = %format!("{e:#}"), "file failed");
                    FileReport::failed(&input.path, &e)
                }
            };
            report.files.push(file_report);
        }

        report.aborted = self.aborted;
        info!(
            files = report.files.len(),
            failed = report.failed().count(),
            rows = report.total_rows(),
            unclassified = report.total_unclassified(),
            "batch finished"
        );
        report
    }

    pub fn process_file(&mut self, dict: &mut CategoryDictionary, input: &BatchInput) -> Result<FileReport> {
        let path = &input.path;
        info!(file = %path.display(), source = %input.profile.name, "classifying");

        let statement = read_statement(path, &input.profile)
            .with_context(|| format!("reading {}", path.display()))?;

        let classifier = Classifier::new(dict, self.options.policy).context("compiling dictionary")?;

        let mut normalized = Vec::with_capacity(statement.rows.len());
        let mut labels = Vec::with_capacity(statement.rows.len());
        let mut queue = PendingQueue::default();

        for row in &statement.rows {
            let t = &row.transaction;
            let norm = self.normalizer.normalize(&t.description);
            let label = classifier.classify(&norm).to_string();

            if classifier.is_fallback(&label) && !norm.is_empty() && !self.kept.contains(&norm) {
                queue.push(
                    &norm,
                    Sample {
                        date: t.date,
                        amount: t.amount,
                        raw_category: t.raw_category.clone(),
                        raw_description: t.description.clone(),
                    },
                );
            }
            normalized.push(norm);
            labels.push(label);
        }
        drop(classifier);

        debug!(rows = labels.len(), pending = queue.len(), "classified");

        let mut resolved = 0;
        let mut error = None;
        match self.reconcile(dict, queue) {
            Ok(Some(decisions)) => {
                for (norm, label) in normalized.iter().zip(labels.iter_mut()) {
                    if !dict.is_fallback(label) {
                        continue;
                    }
                    if let Some(category) = decisions.category_for(norm) {
                        *label = category.to_string();
                        resolved += 1;
                    }
                }
            }
            Ok(None) => {}
            // Decisions confirmed before the failure are already in `dict`.
            Err(e) => {
                warn!(
                    file = %path.display(),
                    error = %format!("{e:#}"),
                    "reconciliation failed, writing the decisions made so far"
                );
                resolved = self.relabel(dict, &normalized, &mut labels)?;
                error = Some(format!("{e:#}"));
            }
        }

        let output = output_path(path, self.options.output_dir.as_deref(), &self.options.output_suffix);
        if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        write_classified_file(
            &output,
            &statement.headers,
            statement.rows.iter().zip(labels.iter()).map(|(r, l)| (&r.record, l.as_str())),
            statement.delimiter,
            &self.options.category_column,
        )
        .with_context(|| format!("writing {}", output.display()))?;

        let summary = Summary::from_rows(
            labels
                .iter()
                .zip(statement.rows.iter())
                .map(|(l, r)| (l.as_str(), r.transaction.amount)),
            dict.fallback(),
        );
        let unclassified = labels.iter().filter(|l| dict.is_fallback(l)).count();

        info!(
            file = %path.display(),
            output = %output.display(),
            rows = labels.len(),
            unclassified,
            resolved,
            skipped = statement.skipped.len(),
            "file written"
        );

        Ok(FileReport {
            input: path.clone(),
            output: Some(output),
            rows: labels.len(),
            unclassified,
            resolved,
            skipped: statement.skipped,
            summary: Some(summary),
            error,
        })
    }

    /// Relabels fallback rows against the dictionary as it stands now.
    fn relabel(
        &self,
        dict: &CategoryDictionary,
        normalized: &[String],
        labels: &mut [String],
    ) -> Result<usize> {
        let classifier = Classifier::new(dict, self.options.policy).context("compiling dictionary")?;
        let mut relabeled = 0;
        for (norm, label) in normalized.iter().zip(labels.iter_mut()) {
            if !classifier.is_fallback(label) {
                continue;
            }
            let category = classifier.classify(norm);
            if !classifier.is_fallback(category) {
                *label = category.to_string();
                relabeled += 1;
            }
        }
        Ok(relabeled)
    }

    /// Runs the operator loop over this file's pending items, unless prompting
    /// is off or was aborted earlier.
    fn reconcile(
        &mut self,
        dict: &mut CategoryDictionary,
        queue: PendingQueue,
    ) -> Result<Option<ReconcileReport>> {
        if self.aborted || queue.is_empty() {
            return Ok(None);
        }
        let Some(reconciler) = self.reconciler.as_mut() else {
            return Ok(None);
        };

        let report = match reconciler.run(dict, &queue.into_items()) {
            Ok(r) => r,
            Err(e) => {
                if matches!(e, ReconcileError::Prompt(_)) {
                    self.aborted = true;
                }
                return Err(e).context("reconciling");
            }
        };

        for (description, resolution) in &report.decisions {
            if *resolution == Resolution::KeptUnclassified {
                self.kept.insert(description.clone());
            }
        }
        if report.aborted {
            info!("prompting stopped, remaining files are classified without it");
            self.aborted = true;
        }
        Ok(Some(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fatura_core::NormalizeOptions;

    #[test]
    fn test_output_path_defaults_next_to_input() {
        let p = output_path(Path::new("/data/nubank-2025-04.csv"), None, "_classificado");
        assert_eq!(p, PathBuf::from("/data/nubank-2025-04_classificado.csv"));

        let p = output_path(Path::new("fatura.csv"), Some(Path::new("/out")), "_x");
        assert_eq!(p, PathBuf::from("/out/fatura_x.csv"));

        let p = output_path(Path::new("fatura.csv"), None, "_classificado");
        assert_eq!(p, PathBuf::from("fatura_classificado.csv"));
    }

    #[test]
    fn test_non_interactive_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("abril.csv");
        std::fs::write(
            &input,
            "date,title,amount\n\
             2025-04-01,Uber *Trip - Parcela 1/2,12.00\n\
             2025-04-02,Padaria,5.00\n",
        )
        .unwrap();

        let mut dict = CategoryDictionary::from_json(r#"{"transporte": ["uber trip"]}"#, "outros").unwrap();
        let normalizer = Normalizer::new(&NormalizeOptions::default()).unwrap();
        let mut runner = BatchRunner::new(&normalizer, BatchOptions::default());

        let report = runner.run(&mut dict, &[BatchInput::new(&input, SourceProfile::nubank())]);
        let file = &report.files[0];

        assert!(file.is_ok(), "{:?}", file.error);
        assert_eq!(file.rows, 2);
        assert_eq!(file.unclassified, 1);
        assert_eq!(file.resolved, 0);
        assert!(!report.aborted);

        let written = std::fs::read_to_string(dir.path().join("abril_classificado.csv")).unwrap();
        assert_eq!(
            written,
            "date,title,amount,categoria\n\
             2025-04-01,Uber *Trip - Parcela 1/2,12.00,transporte\n\
             2025-04-02,Padaria,5.00,outros\n"
        );
    }
}
