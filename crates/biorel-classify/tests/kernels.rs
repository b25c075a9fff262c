//! End-to-end kernel runs against stand-in learner scripts.
//!
//! Each fake tool "learns" by writing a model file and "predicts" by echoing
//! the gold label of every example, so a full train/test cycle must recover
//! exactly the gold relations.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use biorel_classify::metrics::{evaluate_relations, gold_relations, RelationMetrics};
use biorel_classify::{
    build_classifier, ClassifyError, FeatureKernel, JsreKernel, KernelKind, RelationClassifier,
    SvmTkKernel,
};
use biorel_core::{
    AppConfig, Corpus, Document, KernelConfig, PairType, RelationTarget, Sentence, Span,
    GOLD_STANDARD,
};

const PTYPE: &str = "mirna_protein";

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn pair_type() -> PairType {
    PairType::new(&["mirna"], &["protein"])
}

/// "miR-21 represses PTEN. miR-155 binds SHIP1." with miR-21 -> PTEN as gold
fn corpus() -> Corpus {
    let text = "miR-21 represses PTEN. miR-155 binds SHIP1.";
    let mut doc = Document::new("d1", text);
    doc.add_sentence(Sentence::new("miR-21 represses PTEN.", 0, "d1.s0", "d1"));
    doc.add_sentence(Sentence::new("miR-155 binds SHIP1.", 23, "d1.s1", "d1"));
    let mut ids = Vec::new();
    for (span, etype, oid) in [
        (Span::new(0, 6), "mirna", "T1"),
        (Span::new(17, 21), "protein", "T2"),
        (Span::new(23, 30), "mirna", "T3"),
        (Span::new(37, 42), "protein", "T4"),
    ] {
        ids.push(
            doc.tag_document_entity(&[span], etype, None, Some(oid), GOLD_STANDARD)
                .unwrap(),
        );
    }
    doc.get_entity_mut(&ids[0], GOLD_STANDARD)
        .unwrap()
        .targets
        .push(RelationTarget {
            eid: ids[1].clone(),
            relation: PTYPE.to_string(),
        });
    let mut corpus = Corpus::new("kernels");
    corpus.insert(doc);
    corpus
}

fn kernel_config(dir: &Path) -> KernelConfig {
    KernelConfig {
        models_dir: dir.join("models"),
        ..KernelConfig::default()
    }
}

/// Train, reload and test a classifier; returns the metrics and predicted annotation ids
fn run_cycle(classifier: &mut dyn RelationClassifier) -> (RelationMetrics, Vec<(String, String)>) {
    let mut corpus = corpus();
    classifier.train(&corpus).unwrap();
    classifier.load_classifier().unwrap();
    classifier.test(&corpus).unwrap();
    let results = classifier.get_predictions(&mut corpus).unwrap();
    assert_eq!(corpus.get("d1").unwrap().pairs.len(), results.len());

    let metrics = evaluate_relations(&results, &gold_relations(&corpus, PTYPE));
    let predicted = results
        .pairs
        .values()
        .map(|p| {
            assert!(p.recognized_by.contains_key(classifier.name()));
            (
                p.source.original_id.clone().unwrap_or_default(),
                p.target.original_id.clone().unwrap_or_default(),
            )
        })
        .collect();
    (metrics, predicted)
}

/// A learner that echoes the gold labels recovers exactly miR-21 -> PTEN
fn assert_gold_recovered(classifier: &mut dyn RelationClassifier) {
    let (metrics, predicted) = run_cycle(classifier);
    assert_eq!(predicted, vec![("T1".to_string(), "T2".to_string())]);
    assert_eq!(
        (metrics.true_positives, metrics.false_positives, metrics.false_negatives),
        (1, 0, 0),
        "{}",
        classifier.name()
    );
}

#[test]
fn test_jsre_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let java = script(
        dir.path(),
        "java",
        r#"for last; do :; done
case "$*" in
  *sre.Train*) echo model > "$last" ;;
  *sre.Predict*) shift $(($# - 3)); cut -f1 "$1" > "$3" ;;
  *) exit 2 ;;
esac"#,
    );
    let config = KernelConfig {
        java: java.to_string_lossy().into_owned(),
        ..kernel_config(dir.path())
    };
    let mut kernel = JsreKernel::new(PTYPE, pair_type(), &config);
    assert_gold_recovered(&mut kernel);
    assert!(dir.path().join("models/mirna_protein/jsre_train.txt").is_file());
}

#[test]
fn test_svmtk_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let learn = script(dir.path(), "svm_learn", r#"for last; do :; done
echo model > "$last""#);
    let classify = script(dir.path(), "svm_classify", r#"cut -d' ' -f1 "$1" > "$3""#);
    let config = KernelConfig {
        svm_learn: learn.to_string_lossy().into_owned(),
        svm_classify: classify.to_string_lossy().into_owned(),
        ..kernel_config(dir.path())
    };
    let mut kernel = SvmTkKernel::new(PTYPE, pair_type(), &config);
    assert_gold_recovered(&mut kernel);
}

#[test]
fn test_feature_kernels_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let learner = script(
        dir.path(),
        "learner",
        r#"case "$1" in
  train) echo model > "$3" ;;
  predict) sed 's/.*"label":\([0-9]\).*/\1/' "$2" ;;
  *) exit 2 ;;
esac"#,
    );
    let command = vec!["sh".to_string(), learner.to_string_lossy().into_owned()];
    let config = KernelConfig {
        scikit_command: command.clone(),
        multir_command: command,
        ..kernel_config(dir.path())
    };

    let mut scikit = FeatureKernel::scikit(PTYPE, pair_type(), &config);
    assert_gold_recovered(&mut scikit);

    let mut multir = FeatureKernel::multir(PTYPE, pair_type(), &config);
    assert_gold_recovered(&mut multir);
    assert!(dir.path().join("models/mirna_protein/multir.model").is_file());
}

#[test]
fn test_failing_tool_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = KernelConfig {
        svm_learn: "false".to_string(),
        ..kernel_config(dir.path())
    };
    let mut kernel = SvmTkKernel::new(PTYPE, pair_type(), &config);
    let err = kernel.train(&corpus()).unwrap_err();
    assert!(matches!(err, ClassifyError::ToolFailed { .. }));
}

#[test]
fn test_rules_through_factory() {
    let mut config = AppConfig::default();
    config.kernels = kernel_config(Path::new("unused"));
    let mut classifier = build_classifier(KernelKind::Rules, PTYPE, &config).unwrap();
    let (metrics, predicted) = run_cycle(classifier.as_mut());
    // every same-sentence pair is accepted, miR-155 -> SHIP1 included
    assert_eq!(predicted.len(), 2);
    assert_eq!(
        (metrics.true_positives, metrics.false_positives, metrics.false_negatives),
        (1, 1, 0)
    );
}
