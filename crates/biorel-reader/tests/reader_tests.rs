//! End-to-end reader tests: load, annotate, persist, generate pairs

use biorel_core::{AppConfig, Corpus, PairGenerator, PairType, GOLD_STANDARD};
use biorel_reader::{reader_for, CorpusFormat};

fn standoff_corpus() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("doc1.txt"),
        "WRKY1 activates MYB2 and MYB3. MYB2 is found in seeds.",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("doc1.a1"),
        "T1\tProtein 0 5\tWRKY1\nT2\tProtein 16 20\tMYB2\nT3\tProtein 25 29\tMYB3\nT4\tProtein 31 35\tMYB2\nT5\tTissue 48 53\tseeds\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("doc1.a2"),
        "E1\tRegulates_Expression Agent:T1 Target:T2\n",
    )
    .unwrap();
    dir
}

#[test]
fn test_annotated_corpus_survives_save_and_load() {
    let dir = standoff_corpus();
    let config = AppConfig::default();
    let reader = reader_for(CorpusFormat::SeeDev, &config);

    let mut corpus = reader.load_corpus(dir.path()).unwrap();
    let report = reader
        .load_annotations(&mut corpus, dir.path(), "all")
        .unwrap();
    assert_eq!(report.entities_tagged, 5);
    assert_eq!(report.relations_linked, 1);

    let saved = dir.path().join("out").join("corpus.json");
    corpus.save(&saved).unwrap();
    let loaded = Corpus::load(&saved).unwrap();
    assert_eq!(loaded.entity_count(GOLD_STANDARD), 5);
    assert_eq!(loaded.relation_count(GOLD_STANDARD), 1);

    let doc = loaded.get("doc1").unwrap();
    let generator = PairGenerator::new(
        "regulates_expression",
        PairType::new(&["protein"], &["protein"]),
    );
    let pairs = generator.generate(doc);

    // WRKY1, MYB2, MYB3 share the first sentence; both orientations of the
    // three unordered pairs
    assert_eq!(pairs.len(), 6);
    let positives: Vec<_> = pairs.iter().filter(|p| p.is_relation).collect();
    assert_eq!(positives.len(), 1);
    assert_eq!(positives[0].source.text, "WRKY1");
    assert_eq!(positives[0].target.text, "MYB2");
}

#[test]
fn test_cross_sentence_pairs_with_distance() {
    let dir = standoff_corpus();
    let config = AppConfig::default();
    let reader = reader_for(CorpusFormat::SeeDev, &config);
    let mut corpus = reader.load_corpus(dir.path()).unwrap();
    reader
        .load_annotations(&mut corpus, dir.path(), "protein")
        .unwrap();

    let doc = corpus.get("doc1").unwrap();
    let generator = PairGenerator::new(
        "regulates_expression",
        PairType::new(&["protein"], &["protein"]),
    )
    .with_max_sentence_distance(1);
    // four proteins, six unordered pairs, two orientations each
    assert_eq!(generator.generate(doc).len(), 12);
}
