//! External learner invocation
//!
//! Kernels delegate learning to command-line tools. Each run is a blocking
//! child process; a non-zero exit status is an error carrying its stderr.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use biorel_core::Corpus;

use crate::features::PairExample;
use crate::results::RelationResults;
use crate::{ClassifyError, Result};

/// A command-line tool and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTool {
    pub program: String,
    pub args: Vec<String>,
}

impl ExternalTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Tool from a configured command line: program followed by fixed arguments
    pub fn from_command(command: &[String]) -> Result<Self> {
        let (program, args) = command.split_first().ok_or_else(|| ClassifyError::Unsupported {
            kernel: "external".to_string(),
            operation: "an empty command".to_string(),
        })?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    /// Append an argument
    pub fn arg(mut self, arg: impl AsRef<std::ffi::OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    /// Run to completion and return stdout
    pub fn run(&self) -> Result<String> {
        info!(program = %self.program, args = ?self.args, "running external tool");
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|e| ClassifyError::io(&self.program, e))?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(ClassifyError::ToolFailed {
                tool: self.program.clone(),
                status: output.status.to_string(),
                stderr,
            });
        }
        if !stderr.is_empty() {
            debug!(program = %self.program, stderr = %stderr.trim_end(), "tool stderr");
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Parse one score per non-empty line, taking the first field of each line
pub fn parse_scores(output: &str, expected: usize, tool: &str) -> Result<Vec<f32>> {
    let scores = output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let field = line.split_whitespace().next().unwrap_or_default();
            field.parse::<f32>().map_err(|_| ClassifyError::MalformedOutput {
                tool: tool.to_string(),
                message: format!("not a score: {line:?}"),
            })
        })
        .collect::<Result<Vec<f32>>>()?;

    if scores.len() != expected {
        return Err(ClassifyError::MalformedOutput {
            tool: tool.to_string(),
            message: format!("expected {expected} scores, got {}", scores.len()),
        });
    }
    Ok(scores)
}

/// Write one line per example
pub fn write_lines<F>(path: &Path, examples: &[PairExample], line: F) -> Result<()>
where
    F: Fn(&PairExample) -> Result<String>,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ClassifyError::io(parent, e))?;
    }
    let file = std::fs::File::create(path).map_err(|e| ClassifyError::io(path, e))?;
    let mut out = std::io::BufWriter::new(file);
    for example in examples {
        writeln!(out, "{}", line(example)?).map_err(|e| ClassifyError::io(path, e))?;
    }
    out.flush().map_err(|e| ClassifyError::io(path, e))?;
    debug!(path = %path.display(), examples = examples.len(), "wrote examples");
    Ok(())
}

/// Model directory of one pair type
pub fn model_dir(models_dir: &Path, ptype: &str) -> PathBuf {
    models_dir.join(ptype)
}

/// Candidate examples and their scores from the last test run
#[derive(Debug, Default)]
pub struct ScoredExamples {
    pub examples: Vec<PairExample>,
    pub scores: Vec<f32>,
}

impl ScoredExamples {
    /// Record every example accepted by `positive` on the corpus
    pub fn predictions<F>(
        &self,
        corpus: &mut Corpus,
        classifier: &str,
        ptype: &str,
        positive: F,
    ) -> Result<RelationResults>
    where
        F: Fn(f32) -> bool,
    {
        let mut results = RelationResults::new(format!("{classifier}_{ptype}"));
        for (example, score) in self.examples.iter().zip(&self.scores) {
            if positive(*score) {
                results.record(
                    corpus,
                    &example.pair.source,
                    &example.pair.target,
                    ptype,
                    classifier,
                    *score,
                )?;
            }
        }
        info!(classifier, ptype, predicted = results.len(), "predictions");
        Ok(results)
    }
}

// ============================================================================
// Tests
// ============================================================================
