//! Console selection heuristic
//!
//! Selects or creates a worker console for a target directory, honoring a
//! directory-affinity mode and a busy tolerance, and builds the recency ring
//! the cycling session moves over. Repeated invocations of the same command
//! escalate the tolerance so a user can mash the trigger to skip past busy
//! consoles and finally land on a guaranteed-fresh one.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::cycle::config::{Affinity, Tolerance};
use crate::cycle::ring::Ring;
use crate::workspace::{Console, ConsoleId, Target, Workspace};

/// Options for one console selection.
#[derive(Debug, Clone)]
pub struct SelectOptions {
    /// Target working directory.
    pub dir: PathBuf,
    /// Directory affinity mode.
    pub affinity: Affinity,
    /// Effective busy tolerance (escalation already applied).
    pub tolerance: Tolerance,
    /// Whether partially entered, unsent input counts as busy.
    pub interactive: bool,
    /// Canonical console name for fresh consoles.
    pub name: String,
}

/// The outcome of a console selection.
#[derive(Debug)]
pub struct ConsoleSelection {
    /// The console to use.
    pub chosen: ConsoleId,
    /// Whether a fresh console was created.
    pub created: bool,
    /// Other live consoles, most recently used first, with the chosen
    /// console last; the cursor starts on the chosen console.
    pub ring: Ring<Target>,
}

/// Whether a console is currently unsafe to reuse.
///
/// Ordered guards, first match wins: an active foreign process, then
/// narrowing, then (interactive checks only) pending unsent input.
#[must_use]
pub fn is_busy(console: &Console, interactive: bool) -> bool {
    if console.foreign_process {
        return true;
    }
    if console.narrowed {
        return true;
    }
    if interactive && console.pending_input {
        return true;
    }
    false
}

/// Select or create a console for `opts.dir`.
///
/// Scans all live consoles once in recency order, classifying each as
/// exact-directory, same-project, or other, and keeping the first
/// acceptable candidate per bucket (non-busy under strict tolerance, any
/// under tolerant). Choice order: forced-fresh, exact directory match,
/// same-project match (commanded to change directory), most recent
/// acceptable console when affinity is off, otherwise a fresh console —
/// renaming any holder of the canonical unnumbered name out of the way
/// first.
pub fn select_console(ws: &mut Workspace, opts: &SelectOptions) -> Result<ConsoleSelection> {
    let target_root = ws.project_root_of(&opts.dir).map(Path::to_path_buf);

    let mut exact: Option<ConsoleId> = None;
    let mut project: Option<ConsoleId> = None;
    let mut in_project: Option<ConsoleId> = None;
    let mut any: Option<ConsoleId> = None;

    if opts.tolerance != Tolerance::Fresh {
        for console in ws.consoles_by_recency() {
            if !console.process_alive {
                continue;
            }
            if opts.tolerance == Tolerance::Strict && is_busy(console, opts.interactive) {
                continue;
            }
            any.get_or_insert(console.id);
            if console.cwd == opts.dir {
                exact.get_or_insert(console.id);
                in_project.get_or_insert(console.id);
            } else if target_root.is_some()
                && ws.project_root_of(&console.cwd) == target_root.as_deref()
            {
                project.get_or_insert(console.id);
                in_project.get_or_insert(console.id);
            }
        }
    }

    let reuse = match opts.affinity {
        Affinity::Directory => exact.or(project),
        Affinity::Project => in_project,
        Affinity::None => any,
    };

    let (chosen, created) = match reuse {
        Some(id) => {
            // A same-project console is commanded into the target directory;
            // affinity-free reuse leaves the console where it is.
            if opts.affinity != Affinity::None {
                let cwd = ws.console(id).map(|c| c.cwd.clone());
                if cwd.as_deref() != Some(opts.dir.as_path()) {
                    ws.set_cwd(id, &opts.dir)?;
                }
            }
            (id, false)
        }
        None => {
            if let Some(holder) = ws.find_console(&opts.name) {
                let fallback = ws.free_console_name(&opts.name);
                ws.rename_console(holder, &fallback)?;
            }
            (ws.open_console(&opts.name, &opts.dir), true)
        }
    };

    let ring = recency_ring(ws, chosen)?;
    Ok(ConsoleSelection {
        chosen,
        created,
        ring,
    })
}

/// Ring of the other live consoles, most recently used first, with `chosen`
/// appended last and the cursor placed on it.
fn recency_ring(ws: &Workspace, chosen: ConsoleId) -> Result<Ring<Target>> {
    let others: Vec<ConsoleId> = ws
        .consoles_by_recency()
        .iter()
        .map(|c| c.id)
        .filter(|&id| id != chosen)
        .collect();

    let mut ring = Ring::new(others.len() + 1)?;
    for id in others {
        ring.insert(Target::Console(id))?;
    }
    ring.insert(Target::Console(chosen))?;
    ring.advance(-1);
    Ok(ring)
}

/// Tracks consecutive invocations of the same command to escalate busy
/// tolerance.
#[derive(Debug, Default)]
pub struct Escalation {
    last: Option<String>,
    accumulator: u32,
}

impl Escalation {
    /// Create a fresh tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an invocation of `command` and return the effective repeat
    /// accumulator for it.
    ///
    /// A bare repeat of the previous command multiplies the accumulator by
    /// four; any different command resets it. An explicit count fully
    /// suppresses escalation: the count itself is used for this invocation
    /// and the stored accumulator restarts from one.
    pub fn note(&mut self, command: &str, explicit_count: Option<i64>) -> u32 {
        let repeated = self.last.as_deref() == Some(command);
        self.last = Some(command.to_string());
        if let Some(count) = explicit_count {
            self.accumulator = 1;
            return u32::try_from(count.max(1)).unwrap_or(1);
        }
        self.accumulator = if repeated {
            self.accumulator.saturating_mul(4)
        } else {
            1
        };
        self.accumulator
    }

    /// The command most recently noted, if any.
    #[must_use]
    pub fn last_command(&self) -> Option<&str> {
        self.last.as_deref()
    }
}

/// Map a repeat accumulator onto the tolerance ladder.
///
/// One is the configured base, four raises it to at least tolerant, and
/// sixteen or more forces a fresh console.
#[must_use]
pub fn effective_tolerance(base: Tolerance, accumulator: u32) -> Tolerance {
    if accumulator >= 16 {
        Tolerance::Fresh
    } else if accumulator >= 4 {
        base.max(Tolerance::Tolerant)
    } else {
        base
    }
}
