use fatura_core::{
    CategoryDictionary, Classifier, JsonFileStore, MatchPolicy, NormalizeOptions, Normalizer, PendingItem,
    PromptOutcome, Prompter, Reconciler, Suggestion,
};
use fatura_finance::{BatchInput, BatchOptions, BatchRunner};
use fatura_ingest::SourceProfile;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("fixtures")
        .join(name)
}

struct ScriptedPrompter {
    answers: VecDeque<PromptOutcome>,
    asked: Vec<String>,
}

impl ScriptedPrompter {
    fn new(answers: Vec<PromptOutcome>) -> Self {
        Self {
            answers: answers.into(),
            asked: Vec::new(),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(
        &mut self,
        item: &PendingItem,
        _: &[String],
        _: Option<&Suggestion>,
    ) -> anyhow::Result<PromptOutcome> {
        self.asked.push(item.description.clone());
        Ok(self.answers.pop_front().unwrap_or(PromptOutcome::Skipped))
    }
}

/// Confirms the first item, then loses the terminal.
struct FlakyTerminal {
    asked: Vec<String>,
}

impl Prompter for FlakyTerminal {
    fn ask(
        &mut self,
        item: &PendingItem,
        _: &[String],
        _: Option<&Suggestion>,
    ) -> anyhow::Result<PromptOutcome> {
        self.asked.push(item.description.clone());
        if self.asked.len() > 1 {
            anyhow::bail!("stdin closed");
        }
        Ok(PromptOutcome::Confirmed("transporte".into()))
    }
}

/// Copies the fixture dictionary into `dir` and loads it.
fn dictionary_in(dir: &Path) -> (JsonFileStore, CategoryDictionary) {
    let path = dir.join("categorias.json");
    std::fs::copy(fixture("categorias.json"), &path).unwrap();
    let store = JsonFileStore::new(path);
    let dict = store.load("outros").unwrap();
    (store, dict)
}

fn options_in(dir: &Path) -> BatchOptions {
    BatchOptions {
        output_dir: Some(dir.join("out")),
        ..BatchOptions::default()
    }
}

fn normalizer() -> Normalizer {
    Normalizer::new(&NormalizeOptions::default()).unwrap()
}

fn categories_column(path: &Path) -> Vec<String> {
    let mut rdr = csv::Reader::from_path(path).unwrap();
    let headers = rdr.headers().unwrap().clone();
    let idx = headers.iter().position(|h| h == "categoria").unwrap();
    rdr.records().map(|r| r.unwrap()[idx].to_string()).collect()
}

#[test]
fn test_non_interactive_classification_of_nubank_export() {
    let dir = tempfile::tempdir().unwrap();
    let (_store, mut dict) = dictionary_in(dir.path());
    let normalizer = normalizer();

    let mut runner = BatchRunner::new(&normalizer, options_in(dir.path()));
    let report = runner.run(
        &mut dict,
        &[BatchInput::new(fixture("nubank-2025-04.csv"), SourceProfile::nubank())],
    );

    let file = &report.files[0];
    assert!(file.is_ok(), "{:?}", file.error);
    assert_eq!(file.rows, 7);
    assert_eq!(file.unclassified, 2);

    let output = file.output.clone().unwrap();
    assert_eq!(output, dir.path().join("out").join("nubank-2025-04_classificado.csv"));
    assert_eq!(
        categories_column(&output),
        vec!["transporte", "alimentacao", "outros", "alimentacao", "outros", "assinaturas", "transporte"]
    );

    let summary = file.summary.as_ref().unwrap();
    assert_eq!(summary.fallback.as_ref().map(|f| f.count), Some(2));
}

#[test]
fn test_interactive_decision_is_applied_and_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let (store, mut dict) = dictionary_in(dir.path());
    let normalizer = normalizer();
    let mut prompter = ScriptedPrompter::new(vec![PromptOutcome::Confirmed("farmacia".into())]);

    let mut runner = BatchRunner::new(&normalizer, options_in(dir.path()))
        .with_reconciler(Reconciler::new(&mut prompter, &store));
    let report = runner.run(
        &mut dict,
        &[BatchInput::new(fixture("nubank-2025-04.csv"), SourceProfile::nubank())],
    );
    drop(runner);

    // Two drogasil rows, one prompt.
    assert_eq!(prompter.asked, vec!["drogasil"]);
    let file = &report.files[0];
    assert_eq!(file.resolved, 2);
    assert_eq!(file.unclassified, 0);

    let categories = categories_column(file.output.as_ref().unwrap());
    assert_eq!(categories[2], "farmacia");
    assert_eq!(categories[4], "farmacia");

    let reloaded = store.load("outros").unwrap();
    assert_eq!(reloaded.descriptions("farmacia").unwrap(), &["drogasil"]);
    let names: Vec<&str> = reloaded.categories().collect();
    assert_eq!(names, vec!["transporte", "alimentacao", "assinaturas", "outros", "farmacia"]);
}

#[test]
fn test_malformed_row_is_skipped_and_reported() {
    let dir = tempfile::tempdir().unwrap();
    let (_store, mut dict) = dictionary_in(dir.path());
    let normalizer = normalizer();

    let mut runner = BatchRunner::new(&normalizer, options_in(dir.path()));
    let report = runner.run(
        &mut dict,
        &[BatchInput::new(fixture("nubank-malformed.csv"), SourceProfile::nubank())],
    );

    let file = &report.files[0];
    assert_eq!(file.rows, 2);
    assert_eq!(file.skipped.len(), 1);
    assert_eq!(file.skipped[0].line, 3);

    let written = std::fs::read_to_string(file.output.as_ref().unwrap()).unwrap();
    assert_eq!(
        written,
        "date,title,amount,categoria\n\
         2025-05-01,Uber *Trip,10.00,transporte\n\
         2025-05-03,Netflix.com,55.90,assinaturas\n"
    );
}

#[test]
fn test_missing_file_does_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let (_store, mut dict) = dictionary_in(dir.path());
    let normalizer = normalizer();

    let mut runner = BatchRunner::new(&normalizer, options_in(dir.path()));
    let report = runner.run(
        &mut dict,
        &[
            BatchInput::new(dir.path().join("nope.csv"), SourceProfile::nubank()),
            BatchInput::new(fixture("nubank-malformed.csv"), SourceProfile::nubank()),
        ],
    );

    assert_eq!(report.files.len(), 2);
    assert!(report.files[0].error.as_deref().unwrap().contains("nope.csv"));
    assert!(report.files[0].output.is_none());
    assert!(report.files[1].is_ok());
    assert_eq!(report.failed().count(), 1);
}

#[test]
fn test_abort_keeps_decisions_and_finishes_remaining_files() {
    let dir = tempfile::tempdir().unwrap();
    let (store, mut dict) = dictionary_in(dir.path());
    let normalizer = normalizer();

    let first = dir.path().join("maio.csv");
    std::fs::write(
        &first,
        "date,title,amount\n\
         2025-05-01,Cabify,15.00\n\
         2025-05-02,Cinemark,30.00\n\
         2025-05-03,Petz,80.00\n",
    )
    .unwrap();

    let mut prompter = ScriptedPrompter::new(vec![
        PromptOutcome::Confirmed("transporte".into()),
        PromptOutcome::Aborted,
    ]);
    let mut runner = BatchRunner::new(&normalizer, options_in(dir.path()))
        .with_reconciler(Reconciler::new(&mut prompter, &store));
    let report = runner.run(
        &mut dict,
        &[
            BatchInput::new(&first, SourceProfile::nubank()),
            BatchInput::new(fixture("nubank-2025-04.csv"), SourceProfile::nubank()),
        ],
    );
    drop(runner);

    assert!(report.aborted);
    assert_eq!(prompter.asked, vec!["cabify", "cinemark"]);
    assert!(report.files.iter().all(|f| f.is_ok()));

    assert_eq!(
        categories_column(report.files[0].output.as_ref().unwrap()),
        vec!["transporte", "outros", "outros"]
    );
    assert_eq!(report.files[1].unclassified, 2);

    let reloaded = store.load("outros").unwrap();
    let c = Classifier::new(&reloaded, MatchPolicy::Exact).unwrap();
    assert_eq!(c.classify("cabify"), "transporte");
    assert_eq!(c.classify("cinemark"), "outros");
}

#[test]
fn test_prompt_failure_still_writes_decisions_made_so_far() {
    let dir = tempfile::tempdir().unwrap();
    let (store, mut dict) = dictionary_in(dir.path());
    let normalizer = normalizer();

    let first = dir.path().join("maio.csv");
    std::fs::write(
        &first,
        "date,title,amount\n\
         2025-05-01,Cabify,15.00\n\
         2025-05-02,Cinemark,30.00\n\
         2025-05-03,Petz,80.00\n",
    )
    .unwrap();

    let mut prompter = FlakyTerminal { asked: Vec::new() };
    let mut runner = BatchRunner::new(&normalizer, options_in(dir.path()))
        .with_reconciler(Reconciler::new(&mut prompter, &store));
    let report = runner.run(
        &mut dict,
        &[
            BatchInput::new(&first, SourceProfile::nubank()),
            BatchInput::new(fixture("nubank-2025-04.csv"), SourceProfile::nubank()),
        ],
    );
    drop(runner);

    assert!(report.aborted);
    assert_eq!(prompter.asked, vec!["cabify", "cinemark"]);

    let file = &report.files[0];
    assert!(file.error.as_deref().unwrap().contains("stdin closed"));
    assert_eq!(file.rows, 3);
    assert_eq!(file.resolved, 1);
    assert_eq!(file.unclassified, 2);
    assert_eq!(
        categories_column(file.output.as_ref().unwrap()),
        vec!["transporte", "outros", "outros"]
    );

    assert!(report.files[1].is_ok(), "{:?}", report.files[1].error);
    assert_eq!(report.files[1].unclassified, 2);

    let reloaded = store.load("outros").unwrap();
    let c = Classifier::new(&reloaded, MatchPolicy::Exact).unwrap();
    assert_eq!(c.classify("cabify"), "transporte");
}

#[test]
fn test_skipped_description_is_not_asked_again_in_later_files() {
    let dir = tempfile::tempdir().unwrap();
    let (store, mut dict) = dictionary_in(dir.path());
    let normalizer = normalizer();

    let second = dir.path().join("copia.csv");
    std::fs::copy(fixture("nubank-2025-04.csv"), &second).unwrap();

    let mut prompter = ScriptedPrompter::new(vec![PromptOutcome::Skipped]);
    let mut runner = BatchRunner::new(&normalizer, options_in(dir.path()))
        .with_reconciler(Reconciler::new(&mut prompter, &store));
    let report = runner.run(
        &mut dict,
        &[
            BatchInput::new(fixture("nubank-2025-04.csv"), SourceProfile::nubank()),
            BatchInput::new(&second, SourceProfile::nubank()),
        ],
    );
    drop(runner);

    assert_eq!(prompter.asked, vec!["drogasil"]);
    assert!(!report.aborted);
    assert_eq!(report.total_unclassified(), 4);
}

#[test]
fn test_amex_export_with_preamble() {
    let dir = tempfile::tempdir().unwrap();
    let (_store, mut dict) = dictionary_in(dir.path());
    let normalizer = normalizer();

    let mut runner = BatchRunner::new(
        &normalizer,
        BatchOptions {
            policy: MatchPolicy::Prefix,
            ..options_in(dir.path())
        },
    );
    let report = runner.run(
        &mut dict,
        &[BatchInput::new(fixture("amex-activity.csv"), SourceProfile::amex())],
    );

    let file = &report.files[0];
    assert!(file.is_ok(), "{:?}", file.error);
    assert_eq!(file.rows, 4);

    let output = file.output.as_ref().unwrap();
    let written = std::fs::read_to_string(output).unwrap();
    assert!(written.starts_with("Date,Description,Amount,Extended Details,Category,categoria\n"));
    // "uber trip help uber com ca" starts with the "uber trip" entry.
    assert_eq!(categories_column(output), vec!["outros", "outros", "transporte", "outros"]);
}
