//! Inbox ingestion through an external classifier command.

use super::{open, print_json, short, spinner};
use anyhow::Result;
use console::style;
use gardener_core::{GardenerError, IngestDecision, NoteClassifier};
use serde::Serialize;
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use tracing::debug;

/// Request written to the classifier's stdin.
#[derive(Serialize)]
struct ClassifyRequest<'a> {
    note: &'a str,
    filename: &'a str,
    context: &'a str,
}

/// Runs a shell command per note and parses its stdout as a decision.
struct CommandClassifier {
    command: String,
}

impl CommandClassifier {
    fn shell(&self) -> Command {
        if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(&self.command);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(&self.command);
            cmd
        }
    }
}

impl NoteClassifier for CommandClassifier {
    fn classify(
        &self,
        note: &str,
        filename: &str,
        context: &str,
    ) -> gardener_core::Result<IngestDecision> {
        let request = serde_json::to_vec(&ClassifyRequest {
            note,
            filename,
            context,
        })?;
        debug!(command = %self.command, file = filename, "running classifier");

        let mut child = self
            .shell()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GardenerError::Classifier(format!("cannot start classifier: {}", e)))?;
        // Feed stdin from its own thread while stdout and stderr are drained.
        let writer = child
            .stdin
            .take()
            .map(|mut stdin| thread::spawn(move || stdin.write_all(&request)));
        let output = child.wait_with_output()?;
        if let Some(writer) = writer {
            match writer.join() {
                Ok(Err(e)) if e.kind() != ErrorKind::BrokenPipe => return Err(e.into()),
                Ok(_) => {}
                Err(_) => {
                    return Err(GardenerError::Classifier(
                        "classifier input writer panicked".to_string(),
                    ))
                }
            }
        }
        if !output.status.success() {
            return Err(GardenerError::Classifier(format!(
                "classifier exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        IngestDecision::parse(&String::from_utf8_lossy(&output.stdout))
    }
}

pub fn run(dir: &Path, classifier_cmd: &str, json: bool) -> Result<()> {
    let kb = open(dir)?;
    let classifier = CommandClassifier {
        command: classifier_cmd.to_string(),
    };

    let pb = spinner("Ingesting inbox...")?;
    let outcomes = kb.ingest(&classifier);
    pb.finish_and_clear();
    let outcomes = outcomes?;

    if json {
        return print_json(&outcomes);
    }

    if outcomes.is_empty() {
        println!("{} Inbox is empty", style("✓").green());
        return Ok(());
    }

    let mut failed = 0;
    for outcome in &outcomes {
        if outcome.success {
            let action = outcome.action.map(|a| a.as_str()).unwrap_or("?");
            println!(
                "{} {} -> {} {} ({})",
                style("✓").green(),
                outcome.file,
                action,
                outcome.target.as_deref().unwrap_or("-"),
                style(short(outcome.commit.as_deref())).dim()
            );
            if let Some(warning) = &outcome.warning {
                println!("    {} {}", style("⚠").yellow(), warning);
            }
            if outcome.redirected {
                println!(
                    "    {} destination was invalid; parked in the tasks file",
                    style("⚠").yellow()
                );
            }
        } else {
            failed += 1;
            println!(
                "{} {}: {}",
                style("×").red(),
                outcome.file,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    println!();
    println!(
        "Processed {} of {} note(s)",
        outcomes.len() - failed,
        outcomes.len()
    );
    if failed > 0 {
        println!(
            "  {} Failed notes were left in the inbox for the next run",
            style("→").cyan()
        );
    }
    Ok(())
}
