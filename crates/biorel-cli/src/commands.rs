//! CLI actions
//!
//! Corpora are addressed by their configured name. `load-corpus` and
//! `annotate` work on a single corpus and save it to its configured corpus
//! file; the other actions load and merge any number of saved corpora.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use tracing::info;

use biorel_classify::metrics::{
    evaluate_relations, gold_arguments, gold_relations, predicted_arguments, AggregateMetrics,
    EntityMetrics,
};
use biorel_classify::{build_classifier, KernelKind, RelationResults};
use biorel_core::{AppConfig, Corpus, CorpusPaths, GOLD_STANDARD};
use biorel_reader::mirna::gold_entities;
use biorel_reader::{reader_for, AnnotationStats, CorpusFormat, CorpusReader};

/// Number of top words kept per type combination in statistics logs
const TOP_WORDS: usize = 20;

fn single<'a>(goldstd: &'a [String]) -> anyhow::Result<&'a str> {
    match goldstd {
        [name] => Ok(name.as_str()),
        _ => bail!("only one corpus can be processed at a time, got {}", goldstd.len()),
    }
}

fn corpus_reader(
    config: &AppConfig,
    name: &str,
) -> anyhow::Result<(CorpusPaths, Box<dyn CorpusReader>)> {
    let paths = config.corpus(name)?.clone();
    let format: CorpusFormat = paths.format.parse()?;
    Ok((paths, reader_for(format, config)))
}

/// Load and merge saved corpora
pub fn load_corpora(config: &AppConfig, goldstd: &[String]) -> anyhow::Result<Corpus> {
    let mut merged = Corpus::new(goldstd.join("+"));
    for name in goldstd {
        let paths = config.corpus(name)?;
        let corpus = Corpus::load(&paths.corpus)
            .with_context(|| format!("loading corpus {name}; run load-corpus first"))?;
        info!(corpus = %name, documents = corpus.len(), "loaded corpus");
        merged.merge(corpus);
    }
    Ok(merged)
}

pub fn load_corpus(config: &AppConfig, goldstd: &[String]) -> anyhow::Result<()> {
    let name = single(goldstd)?;
    let (paths, reader) = corpus_reader(config, name)?;
    let corpus = reader
        .load_corpus(&paths.text)
        .with_context(|| format!("reading {} corpus {name}", reader.format()))?;
    corpus.save(&paths.corpus)?;
    info!(corpus = %name, documents = corpus.len(), path = %paths.corpus.display(), "saved corpus");
    Ok(())
}

pub fn annotate(config: &AppConfig, goldstd: &[String], etype: &str) -> anyhow::Result<()> {
    let name = single(goldstd)?;
    let (paths, reader) = corpus_reader(config, name)?;
    let Some(annotations) = &paths.annotations else {
        bail!("corpus {name} has no annotations configured");
    };
    let mut corpus = Corpus::load(&paths.corpus)
        .with_context(|| format!("loading corpus {name}; run load-corpus first"))?;

    let report = reader.load_annotations(&mut corpus, annotations, etype)?;
    info!(
        corpus = %name,
        tagged = report.entities_tagged,
        skipped = report.skipped_total(),
        relations = report.relations_linked,
        "annotated corpus"
    );
    corpus.save(&paths.corpus)?;
    Ok(())
}

pub fn train_relations(
    config: &AppConfig,
    goldstd: &[String],
    kernel: KernelKind,
    ptype: &str,
) -> anyhow::Result<()> {
    let corpus = load_corpora(config, goldstd)?;
    let mut classifier = build_classifier(kernel, ptype, config)?;
    classifier
        .train(&corpus)
        .with_context(|| format!("training {kernel} for {ptype}"))?;
    Ok(())
}

/// `prefix` with `suffix` appended to its file name
fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut path = prefix.as_os_str().to_owned();
    path.push(suffix);
    PathBuf::from(path)
}

/// Classify with one or every configured pair type.
///
/// Results go to `<output>.json` (merged) and `<output>_<ptype>.json` (per
/// type when testing `all`); BioNLP files are written into `<output>/`.
pub fn test_relations(
    config: &AppConfig,
    goldstd: &[String],
    kernel: KernelKind,
    pairtype: &str,
    output: &Path,
) -> anyhow::Result<AggregateMetrics> {
    let mut corpus = load_corpora(config, goldstd)?;
    let all = pairtype.eq_ignore_ascii_case("all");
    let ptypes: Vec<String> = if all {
        config.pair_types.keys().cloned().collect()
    } else {
        config.pair_type(pairtype)?;
        vec![pairtype.to_string()]
    };

    let mut merged = RelationResults::new(format!("{kernel}_{pairtype}"));
    let mut gold = BTreeSet::new();
    let mut gold_args = BTreeSet::new();
    for ptype in &ptypes {
        let mut classifier = build_classifier(kernel, ptype, config)?;
        classifier
            .load_classifier()
            .with_context(|| format!("loading {kernel} for {ptype}"))?;
        classifier.test(&corpus)?;
        let results = classifier.get_predictions(&mut corpus)?;

        let type_gold = gold_relations(&corpus, ptype);
        let metrics = evaluate_relations(&results, &type_gold);
        info!(
            ptype = %ptype,
            predicted = metrics.predicted_total,
            gold = metrics.gold_total,
            precision = metrics.precision(),
            recall = metrics.recall(),
            f1 = metrics.f1_score(),
            "evaluated"
        );
        if all {
            results.save(with_suffix(output, &format!("_{ptype}.json")))?;
        }
        gold.extend(type_gold);
        gold_args.extend(gold_arguments(&corpus, ptype));
        merged.merge(results);
    }

    merged.save(with_suffix(output, ".json"))?;
    merged.write_bionlp(output, &config.pair_types)?;

    let mut aggregate = AggregateMetrics {
        num_documents: corpus.len(),
        ..AggregateMetrics::default()
    };
    aggregate.add_entity_metrics(&EntityMetrics::compare(
        &predicted_arguments(&merged),
        &gold_args,
    ));
    aggregate.add_relation_metrics(&evaluate_relations(&merged, &gold));
    Ok(aggregate)
}

pub fn write_results(config: &AppConfig, results: &Path, output: &Path) -> anyhow::Result<usize> {
    let results = RelationResults::load(results)
        .with_context(|| format!("loading results {}", results.display()))?;
    Ok(results.write_bionlp(output, &config.pair_types)?)
}

/// Write `did\tstart\tend\ttext` for every gold entity of `etype`
pub fn write_goldstandard(
    config: &AppConfig,
    goldstd: &str,
    output: &Path,
    etype: &str,
) -> anyhow::Result<usize> {
    let paths = config.corpus(goldstd)?;
    let format: CorpusFormat = paths.format.parse()?;

    let rows: BTreeSet<(String, usize, usize, String)> = match (format, &paths.annotations) {
        (CorpusFormat::Mirna, Some(annotations)) => gold_entities(annotations, etype)?
            .into_iter()
            .map(|e| (e.did, e.start, e.end, e.text))
            .collect(),
        _ => {
            let corpus = Corpus::load(&paths.corpus)?;
            corpus
                .documents()
                .flat_map(|doc| doc.get_entities(GOLD_STANDARD))
                .filter(|e| etype.eq_ignore_ascii_case("all") || e.etype.eq_ignore_ascii_case(etype))
                .map(|e| (e.did.clone(), e.dspan.start, e.dspan.end, e.text.clone()))
                .collect()
        }
    };

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(output).with_context(|| format!("creating {}", output.display()))?;
    let mut out = BufWriter::new(file);
    for (did, start, end, text) in &rows {
        writeln!(out, "{did}\t{start}\t{end}\t{text}")?;
    }
    out.flush()?;
    info!(entities = rows.len(), path = %output.display(), "wrote gold standard");
    Ok(rows.len())
}

pub fn stats(config: &AppConfig, goldstd: &[String]) -> anyhow::Result<AnnotationStats> {
    let corpus = load_corpora(config, goldstd)?;
    let stats = AnnotationStats::from_corpus(&corpus, GOLD_STANDARD);
    stats.log(TOP_WORDS);
    Ok(stats)
}

// ============================================================================
// Tests
// ============================================================================
