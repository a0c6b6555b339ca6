//! Replay scripts for the demo binary
//!
//! Parses a line-based script of workspace events and key presses into
//! typed steps, executes them against a fresh workspace and engine, and
//! reports a transcript plus the selections that were committed along the
//! way. Scripts are the synchronous event stream a real editor frontend
//! would deliver one input at a time.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Utc;

use crate::cycle::config::Config;
use crate::cycle::engine::{Commit, Engine, KeyOutcome};
use crate::cycle::variants::Invocation;
use crate::log::SelectionRecord;
use crate::workspace::{Target, Workspace};

/// A console busy flag togglable from a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyFlag {
    /// A foreign process is doing work.
    Process,
    /// The console is narrowed to a sub-view.
    Narrow,
    /// Unsent input is pending.
    Input,
    /// The console's own process has exited.
    Dead,
}

/// One step of a replay script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// `open <name> <kind> [<file>]`
    OpenDoc {
        /// Requested display name.
        name: String,
        /// Content kind.
        kind: String,
        /// Backing file, if the document should have one.
        file: Option<PathBuf>,
    },
    /// `kill <name>`
    KillDoc {
        /// Display name of the document to destroy.
        name: String,
    },
    /// `console <name> <dir>` — scenario setup for a pre-existing console.
    OpenConsole {
        /// Requested display name.
        name: String,
        /// Working directory.
        dir: PathBuf,
    },
    /// `busy <name> <flag>`
    Busy {
        /// Console display name.
        name: String,
        /// Which flag to set.
        flag: BusyFlag,
    },
    /// `idle <name>` — clear all busy flags.
    Idle {
        /// Console display name.
        name: String,
    },
    /// `project <root>`
    Project {
        /// Project root directory.
        root: PathBuf,
    },
    /// `view` — add another view.
    AddView,
    /// `invoke [count] <command> [arg]`
    Invoke {
        /// Command name.
        command: String,
        /// Optional argument.
        arg: Option<String>,
        /// Optional explicit numeric count.
        count: Option<i64>,
    },
    /// `key [count] <key>`
    Key {
        /// The key to feed.
        key: String,
        /// Optional signed repeat count.
        count: Option<i64>,
    },
}

/// Parse one script line into a step.
///
/// Returns `None` for blank lines and `#` comments; malformed lines are
/// construction-time errors.
pub fn parse_step(line: &str) -> Result<Option<Step>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let tokens: Vec<&str> = line.split_whitespace().collect();

    let step = match tokens.as_slice() {
        ["open", name, kind] => Step::OpenDoc {
            name: (*name).to_string(),
            kind: (*kind).to_string(),
            file: None,
        },
        ["open", name, kind, file] => Step::OpenDoc {
            name: (*name).to_string(),
            kind: (*kind).to_string(),
            file: Some(PathBuf::from(file)),
        },
        ["kill", name] => Step::KillDoc {
            name: (*name).to_string(),
        },
        ["console", name, dir] => Step::OpenConsole {
            name: (*name).to_string(),
            dir: PathBuf::from(dir),
        },
        ["busy", name, flag] => Step::Busy {
            name: (*name).to_string(),
            flag: parse_busy_flag(flag)?,
        },
        ["idle", name] => Step::Idle {
            name: (*name).to_string(),
        },
        ["project", root] => Step::Project {
            root: PathBuf::from(root),
        },
        ["view"] => Step::AddView,
        ["invoke", rest @ ..] => parse_invoke(rest)?,
        ["key", rest @ ..] => parse_key(rest)?,
        _ => bail!("Malformed step: '{line}'"),
    };
    Ok(Some(step))
}

fn parse_busy_flag(flag: &str) -> Result<BusyFlag> {
    match flag {
        "process" => Ok(BusyFlag::Process),
        "narrow" => Ok(BusyFlag::Narrow),
        "input" => Ok(BusyFlag::Input),
        "dead" => Ok(BusyFlag::Dead),
        other => bail!("Unknown busy flag: '{other}'"),
    }
}

fn parse_invoke(tokens: &[&str]) -> Result<Step> {
    let (count, tokens) = split_count(tokens);
    match tokens {
        [command] => Ok(Step::Invoke {
            command: (*command).to_string(),
            arg: None,
            count,
        }),
        [command, arg] => Ok(Step::Invoke {
            command: (*command).to_string(),
            arg: Some((*arg).to_string()),
            count,
        }),
        _ => bail!("Malformed invoke step"),
    }
}

fn parse_key(tokens: &[&str]) -> Result<Step> {
    let (count, tokens) = split_count(tokens);
    match tokens {
        [key] => Ok(Step::Key {
            key: (*key).to_string(),
            count,
        }),
        _ => bail!("Malformed key step"),
    }
}

/// Split a leading signed integer off a token list, if present.
fn split_count<'a, 'b>(tokens: &'a [&'b str]) -> (Option<i64>, &'a [&'b str]) {
    match tokens.first().and_then(|t| t.parse::<i64>().ok()) {
        Some(count) => (Some(count), &tokens[1..]),
        None => (None, tokens),
    }
}

/// Parse a whole script, reporting the offending line on failure.
pub fn parse_script(content: &str) -> Result<Vec<Step>> {
    let mut steps = Vec::new();
    for (line_num, line) in content.lines().enumerate() {
        if let Some(step) =
            parse_step(line).with_context(|| format!("Script line {}", line_num + 1))?
        {
            steps.push(step);
        }
    }
    Ok(steps)
}

/// One rendered line of a replay transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptLine {
    /// A workspace setup event.
    Event(String),
    /// An engine status notification.
    Notice(String),
    /// A committed selection.
    Committed {
        /// Display name of the selected resource.
        target: String,
        /// Whether cycling preceded the commit.
        cycled: bool,
    },
    /// A user error that aborted one step.
    UserError(String),
}

/// Result of running a replay script.
#[derive(Debug)]
pub struct ReplayResult {
    /// Number of steps executed.
    pub steps_run: usize,
    /// Selections committed during the run, in order.
    pub records: Vec<SelectionRecord>,
    /// Transcript for display.
    pub transcript: Vec<TranscriptLine>,
}

/// Executes replay scripts against a fresh workspace and engine.
pub struct ReplayRunner {
    config: Config,
}

impl ReplayRunner {
    /// Create a runner with the given configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Parse and execute a script.
    ///
    /// Setup steps that reference missing resources are script errors and
    /// fail the run; user errors from commands and keys abort only their
    /// step and are recorded in the transcript.
    pub fn run(&self, script: &str) -> Result<ReplayResult> {
        let steps = parse_script(script)?;
        let mut ws = Workspace::new();
        let mut engine = Engine::with_default_commands(self.config.clone())?;

        let mut result = ReplayResult {
            steps_run: 0,
            records: Vec::new(),
            transcript: Vec::new(),
        };
        for step in &steps {
            execute_step(step, &mut ws, &mut engine, &mut result)?;
            result.steps_run += 1;
            drain(&mut engine, &ws, &mut result);
        }
        // End of input ends any session still open.
        engine.finish_session(&mut ws);
        drain(&mut engine, &ws, &mut result);
        Ok(result)
    }
}

/// Execute one step against the workspace and engine.
fn execute_step(
    step: &Step,
    ws: &mut Workspace,
    engine: &mut Engine,
    result: &mut ReplayResult,
) -> Result<()> {
    match step {
        Step::OpenDoc { name, kind, file } => {
            let id = ws.open_document(name, kind, file.clone());
            let opened = ws
                .document(id)
                .map_or_else(|| name.clone(), |d| d.name.clone());
            result
                .transcript
                .push(TranscriptLine::Event(format!("Opened document '{opened}'")));
        }
        Step::KillDoc { name } => {
            let id = ws
                .find_document(name)
                .with_context(|| format!("Cannot kill unknown document '{name}'"))?;
            ws.kill_document(id);
            result
                .transcript
                .push(TranscriptLine::Event(format!("Killed document '{name}'")));
        }
        Step::OpenConsole { name, dir } => {
            let id = ws.open_console(name, dir);
            let opened = ws
                .console(id)
                .map_or_else(|| name.clone(), |c| c.name.clone());
            result
                .transcript
                .push(TranscriptLine::Event(format!("Opened console '{opened}'")));
        }
        Step::Busy { name, flag } => {
            let id = ws
                .find_console(name)
                .with_context(|| format!("Cannot flag unknown console '{name}'"))?;
            let console = ws.console_mut(id).context("Console vanished")?;
            match flag {
                BusyFlag::Process => console.foreign_process = true,
                BusyFlag::Narrow => console.narrowed = true,
                BusyFlag::Input => console.pending_input = true,
                BusyFlag::Dead => console.process_alive = false,
            }
        }
        Step::Idle { name } => {
            let id = ws
                .find_console(name)
                .with_context(|| format!("Cannot flag unknown console '{name}'"))?;
            let console = ws.console_mut(id).context("Console vanished")?;
            console.foreign_process = false;
            console.narrowed = false;
            console.pending_input = false;
        }
        Step::Project { root } => {
            ws.add_project_root(root);
        }
        Step::AddView => {
            ws.add_view();
        }
        Step::Invoke {
            command,
            arg,
            count,
        } => {
            let invocation = Invocation {
                key: None,
                count: *count,
                arg: arg.clone(),
            };
            if let Err(err) = engine.invoke(ws, command, &invocation) {
                result
                    .transcript
                    .push(TranscriptLine::UserError(format!("{err}")));
            }
        }
        Step::Key { key, count } => match engine.feed_key(ws, key, *count) {
            Ok(KeyOutcome::Cycled(target)) => {
                let name = ws.target_name(target).unwrap_or("?").to_string();
                result
                    .transcript
                    .push(TranscriptLine::Event(format!("Cycled to '{name}'")));
            }
            Ok(KeyOutcome::Invoked(_) | KeyOutcome::Unbound) => {}
            Err(err) => {
                result
                    .transcript
                    .push(TranscriptLine::UserError(format!("{err}")));
            }
        },
    }
    Ok(())
}

/// Drain engine notices and commits into the transcript and record list.
fn drain(engine: &mut Engine, ws: &Workspace, result: &mut ReplayResult) {
    for notice in engine.take_notices() {
        result.transcript.push(TranscriptLine::Notice(notice));
    }
    for commit in engine.take_commits() {
        let record = to_record(&commit, ws);
        result.transcript.push(TranscriptLine::Committed {
            target: record.target.clone(),
            cycled: record.cycled,
        });
        result.records.push(record);
    }
}

/// Convert an engine commit into a journal record.
fn to_record(commit: &Commit, ws: &Workspace) -> SelectionRecord {
    let kind = match commit.target {
        Target::Doc(_) => "document",
        Target::Console(_) => "console",
    };
    SelectionRecord {
        timestamp: Utc::now(),
        command: commit.command.clone(),
        target: ws.target_name(commit.target).unwrap_or("?").to_string(),
        kind: kind.to_string(),
        cycled: commit.cycled,
        net_moves: commit.net_moves,
        escalation: commit.escalation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- parse_step ---

    #[test]
    fn test_parse_skips_blank_and_comments() {
        assert_eq!(parse_step("").unwrap(), None);
        assert_eq!(parse_step("   ").unwrap(), None);
        assert_eq!(parse_step("# a comment").unwrap(), None);
    }

    #[test]
    fn test_parse_open_doc() {
        let step = parse_step("open report article").unwrap().unwrap();
        assert_eq!(
            step,
            Step::OpenDoc {
                name: "report".to_string(),
                kind: "article".to_string(),
                file: None,
            }
        );
    }

    #[test]
    fn test_parse_open_doc_with_file() {
        let step = parse_step("open report article /f/report.txt")
            .unwrap()
            .unwrap();
        assert_eq!(
            step,
            Step::OpenDoc {
                name: "report".to_string(),
                kind: "article".to_string(),
                file: Some(PathBuf::from("/f/report.txt")),
            }
        );
    }

    #[test]
    fn test_parse_console_and_flags() {
        assert_eq!(
            parse_step("console build /proj/a").unwrap().unwrap(),
            Step::OpenConsole {
                name: "build".to_string(),
                dir: PathBuf::from("/proj/a"),
            }
        );
        assert_eq!(
            parse_step("busy build process").unwrap().unwrap(),
            Step::Busy {
                name: "build".to_string(),
                flag: BusyFlag::Process,
            }
        );
        assert_eq!(
            parse_step("idle build").unwrap().unwrap(),
            Step::Idle {
                name: "build".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_unknown_busy_flag_fails() {
        let err = parse_step("busy build sideways").unwrap_err();
        assert!(
            err.to_string().contains("Unknown busy flag"),
            "Expected flag error, got: {err}"
        );
    }

    #[test]
    fn test_parse_invoke_forms() {
        assert_eq!(
            parse_step("invoke console").unwrap().unwrap(),
            Step::Invoke {
                command: "console".to_string(),
                arg: None,
                count: None,
            }
        );
        assert_eq!(
            parse_step("invoke switch-doc report").unwrap().unwrap(),
            Step::Invoke {
                command: "switch-doc".to_string(),
                arg: Some("report".to_string()),
                count: None,
            }
        );
        assert_eq!(
            parse_step("invoke 4 console /proj").unwrap().unwrap(),
            Step::Invoke {
                command: "console".to_string(),
                arg: Some("/proj".to_string()),
                count: Some(4),
            }
        );
    }

    #[test]
    fn test_parse_key_forms() {
        assert_eq!(
            parse_step("key n").unwrap().unwrap(),
            Step::Key {
                key: "n".to_string(),
                count: None,
            }
        );
        assert_eq!(
            parse_step("key 3 n").unwrap().unwrap(),
            Step::Key {
                key: "n".to_string(),
                count: Some(3),
            }
        );
        assert_eq!(
            parse_step("key -2 p").unwrap().unwrap(),
            Step::Key {
                key: "p".to_string(),
                count: Some(-2),
            }
        );
    }

    #[test]
    fn test_parse_malformed_step_fails() {
        assert!(parse_step("open report").is_err());
        assert!(parse_step("dance").is_err());
        assert!(parse_step("key").is_err());
    }

    #[test]
    fn test_parse_script_reports_line_number() {
        let err = parse_script("open a text\nnonsense here extra words\n").unwrap_err();
        assert!(
            format!("{err:?}").contains("line 2"),
            "Expected line number in: {err:?}"
        );
    }

    // --- runner ---

    #[test]
    fn test_run_cycling_script_commits_final_candidate_only() {
        let script = "\
open report article
open report article
open report article
invoke switch-doc report
key n
key q
";
        let result = ReplayRunner::new(Config::default()).run(script).unwrap();

        assert_eq!(result.records.len(), 1);
        let record = &result.records[0];
        assert_eq!(record.target, "report<2>");
        assert!(record.cycled);
        assert_eq!(record.net_moves, 1);
        assert_eq!(record.kind, "document");
    }

    #[test]
    fn test_run_emits_cycling_notice() {
        let script = "\
open report article
open report article
invoke switch-doc report
key q
";
        let result = ReplayRunner::new(Config::default()).run(script).unwrap();
        assert!(
            result
                .transcript
                .iter()
                .any(|line| matches!(line, TranscriptLine::Notice(n) if n.contains("Cycling"))),
            "Expected a cycling notice in: {:?}",
            result.transcript
        );
    }

    #[test]
    fn test_run_pass_through_commit_without_cycling() {
        let script = "\
open alone article
invoke switch-doc alone
";
        let result = ReplayRunner::new(Config::default()).run(script).unwrap();
        assert_eq!(result.records.len(), 1);
        assert!(!result.records[0].cycled);
        assert_eq!(result.records[0].target, "alone");
    }

    #[test]
    fn test_run_user_error_continues() {
        let script = "\
open alone article
invoke switch-doc missing
invoke switch-doc alone
";
        let result = ReplayRunner::new(Config::default()).run(script).unwrap();
        assert_eq!(result.steps_run, 3);
        assert!(result
            .transcript
            .iter()
            .any(|line| matches!(line, TranscriptLine::UserError(_))));
        assert_eq!(result.records.len(), 1);
    }

    #[test]
    fn test_run_setup_error_fails() {
        let err = ReplayRunner::new(Config::default())
            .run("kill missing\n")
            .unwrap_err();
        assert!(
            err.to_string().contains("unknown document"),
            "Expected setup error, got: {err}"
        );
    }

    #[test]
    fn test_run_console_escalation_script() {
        let script = "\
console console /p
invoke console /p
invoke console /p
invoke console /p
";
        let result = ReplayRunner::new(Config::default()).run(script).unwrap();
        let fresh: Vec<&SelectionRecord> = result
            .records
            .iter()
            .filter(|r| r.escalation >= 16)
            .collect();
        assert_eq!(fresh.len(), 1, "records: {:?}", result.records);
        assert_eq!(fresh[0].kind, "console");
    }
}
