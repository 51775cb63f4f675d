//! agentpipe-answer: answer a pending agent question.
//!
//! Writes `{scratch_dir}/{tool_use_id}.json` for a running `agentpipe` to
//! pick up. The file is written to a temp name first and renamed into
//! place, so the waiting side never reads a partial answer.
//!
//!   agentpipe-answer toolu_01ABC -a "Which database?=Postgres"
//!   agentpipe-answer toolu_01ABC --json '{"Which database?": "Postgres"}'

use agentpipe::approval::handoff::write_answer_file;
use agentpipe::config::Settings;
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(
    name = "agentpipe-answer",
    version,
    about = "Answer a question a running agentpipe agent is waiting on"
)]
struct Args {
    /// Tool use id of the pending question
    tool_use_id: String,

    /// An answer as QUESTION=ANSWER (repeatable). Splits on the last `=`;
    /// use --json for answers that contain `=`
    #[arg(short, long = "answer", value_name = "QUESTION=ANSWER", conflicts_with = "json")]
    answers: Vec<String>,

    /// All answers as a JSON object of strings
    #[arg(long, value_name = "OBJECT")]
    json: Option<String>,

    /// Directory the agent reads answers from
    #[arg(long, env = "AGENTPIPE_SCRATCH_DIR", value_name = "DIR")]
    scratch_dir: Option<PathBuf>,

    /// Settings file (default: .agentpipe.yaml, searched upward)
    #[arg(long, env = "AGENTPIPE_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("[agentpipe] Error: {:#}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let answers = match &args.json {
        Some(raw) => serde_json::from_str::<BTreeMap<String, String>>(raw)
            .context("--json must be an object of string answers")?,
        None => parse_pairs(&args.answers)?,
    };
    if answers.is_empty() {
        bail!("no answers given (use -a QUESTION=ANSWER or --json)");
    }

    let cwd = std::env::current_dir().context("Could not determine current directory")?;
    let scratch_dir = Settings::load(args.config.as_deref(), &cwd)?
        .gate_config(args.scratch_dir.as_deref())
        .scratch_dir;
    let path = write_answer_file(&scratch_dir, &args.tool_use_id, &answers)?;

    eprintln!("[agentpipe] Answered {} ({})", args.tool_use_id, path.display());
    Ok(())
}

/// Split `QUESTION=ANSWER` pairs on the last `=` so questions may contain `=`.
fn parse_pairs(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    pairs
        .iter()
        .map(|pair| match pair.rsplit_once('=') {
            Some((question, answer)) if !question.is_empty() => {
                Ok((question.to_string(), answer.to_string()))
            }
            _ => bail!("expected QUESTION=ANSWER, got {:?}", pair),
        })
        .collect()
}
