//! Engine glue
//!
//! Owns the dispatcher, the escalation tracker, per-document sibling
//! memory, and the single active cycling session. Keys are routed into the
//! session first; any key the session does not bind ends it before being
//! processed normally. `with_default_commands` wires up the two built-in
//! selection commands (`switch-doc`, `console`) with cycling variants and
//! remaps so invoking either name reaches the variant.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::cycle::config::{Config, OverrideTable};
use crate::cycle::console::{effective_tolerance, select_console, Escalation, SelectOptions};
use crate::cycle::ring::Ring;
use crate::cycle::session::{CycleSession, KeyPair, KeySpec};
use crate::cycle::siblings::{sibling_ring, SiblingMemory};
use crate::cycle::variants::{
    build_variants, Command, CommandHandler, Dispatcher, Invocation, SelectionFn, SelectionResult,
    VariantSpec,
};
use crate::workspace::{DocId, SelectContext, Target, Workspace};

/// A durably committed selection, ready to journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// The command the selection came from.
    pub command: String,
    /// The selected resource.
    pub target: Target,
    /// Whether a cycling session preceded the commit.
    pub cycled: bool,
    /// Net ring movement (zero without cycling).
    pub net_moves: i64,
    /// Repeat accumulator of the originating invocation.
    pub escalation: u32,
}

/// Engine state shared with command handlers.
///
/// Handlers receive this by reference instead of capturing it, so every
/// piece of per-session and cross-session state is explicit.
pub struct EngineState {
    /// Parsed configuration.
    pub config: Config,
    /// Compiled kind-override table.
    pub overrides: OverrideTable,
    /// The active cycling session, if any.
    pub active: Option<CycleSession>,
    /// Same-command repeat tracker.
    pub escalation: Escalation,
    /// Effective repeat accumulator of the invocation being dispatched.
    pub repeat: u32,
    /// Remembered sibling rings, keyed by the finally selected document.
    pub sibling_memory: HashMap<DocId, SiblingMemory>,
    /// Status notifications for the host to render.
    pub notices: Vec<String>,
    /// Committed selections not yet drained by the host.
    pub commits: Vec<Commit>,
}

impl EngineState {
    /// Build fresh state from a configuration, compiling its override table.
    pub fn new(config: Config) -> Result<Self> {
        let overrides = config.override_table()?;
        Ok(Self {
            config,
            overrides,
            active: None,
            escalation: Escalation::new(),
            repeat: 1,
            sibling_memory: HashMap::new(),
            notices: Vec::new(),
            commits: Vec::new(),
        })
    }
}

/// What happened to a fed key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// The key moved the active session's ring onto this candidate.
    Cycled(Target),
    /// The key invoked a command by binding.
    Invoked(String),
    /// The key was not bound to anything.
    Unbound,
}

/// The transient cycling engine.
pub struct Engine {
    dispatcher: Dispatcher,
    state: EngineState,
}

impl Engine {
    /// An engine with no commands registered.
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            dispatcher: Dispatcher::new(),
            state: EngineState::new(config)?,
        })
    }

    /// An engine with the built-in selection commands wrapped in cycling
    /// variants: `switch-doc` (bound to `b`) and `console` (bound to `o`,
    /// whose variant reuses the invoking key as its forward key).
    pub fn with_default_commands(config: Config) -> Result<Self> {
        let mut engine = Self::new(config)?;
        engine
            .dispatcher
            .register("switch-doc", plain_handler("switch-doc", run_switch_doc))?;
        engine
            .dispatcher
            .register("console", plain_handler("console", run_console))?;

        let forward = engine.state.config.keys.forward.clone();
        let backward = engine.state.config.keys.backward.clone();
        let specs = vec![
            VariantSpec {
                name: "cycle-switch-doc".to_string(),
                underlying: Command {
                    name: "switch-doc".to_string(),
                    run: run_switch_doc,
                },
                keys: KeyPair {
                    forward: KeySpec::Literal(forward),
                    backward: KeySpec::Literal(backward.clone()),
                },
                body: None,
                binding: Some("b".to_string()),
            },
            VariantSpec {
                name: "cycle-console".to_string(),
                underlying: Command {
                    name: "console".to_string(),
                    run: run_console,
                },
                keys: KeyPair {
                    forward: KeySpec::Invoking,
                    backward: KeySpec::Literal(backward),
                },
                body: None,
                binding: Some("o".to_string()),
            },
        ];
        let registrations = build_variants(specs, default_ring_builder)?;
        engine.dispatcher.register_variants(registrations)?;
        engine.dispatcher.add_remap("switch-doc", "cycle-switch-doc")?;
        engine.dispatcher.add_remap("console", "cycle-console")?;
        Ok(engine)
    }

    /// The dispatcher, for registering further commands and bindings.
    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    /// Whether a cycling session is currently open.
    #[must_use]
    pub const fn session_active(&self) -> bool {
        self.state.active.is_some()
    }

    /// Drain pending status notifications.
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.state.notices)
    }

    /// Drain selections committed since the last drain.
    pub fn take_commits(&mut self) -> Vec<Commit> {
        std::mem::take(&mut self.state.commits)
    }

    /// Invoke a command by name, ending any active session first.
    pub fn invoke(
        &mut self,
        ws: &mut Workspace,
        name: &str,
        invocation: &Invocation,
    ) -> Result<()> {
        self.finish_session(ws);
        self.dispatcher
            .dispatch(ws, &mut self.state, name, invocation)
    }

    /// Feed one key press, with an optional signed numeric prefix.
    ///
    /// Keys bound in the active session move its ring; any other key ends
    /// the session and is then processed normally (command binding or
    /// nothing).
    pub fn feed_key(
        &mut self,
        ws: &mut Workspace,
        key: &str,
        count: Option<i64>,
    ) -> Result<KeyOutcome> {
        if let Some(session) = self.state.active.as_mut() {
            if let Some(direction) = session.direction_for(key) {
                let target = session.cycle(ws, direction, count.unwrap_or(1))?;
                return Ok(KeyOutcome::Cycled(target));
            }
        }
        self.finish_session(ws);

        if let Some(command) = self.dispatcher.command_for_key(key).map(str::to_string) {
            let invocation = Invocation {
                key: Some(key.to_string()),
                count,
                arg: None,
            };
            self.dispatcher
                .dispatch(ws, &mut self.state, &command, &invocation)?;
            return Ok(KeyOutcome::Invoked(command));
        }
        Ok(KeyOutcome::Unbound)
    }

    /// End the active session, if any, running its exit action and saving
    /// sibling memory for the finally selected document.
    pub fn finish_session(&mut self, ws: &mut Workspace) -> bool {
        let Some(session) = self.state.active.take() else {
            return false;
        };
        let summary = session.exit(ws);
        if let Target::Doc(id) = summary.final_target {
            self.state.sibling_memory.insert(
                id,
                SiblingMemory {
                    items: summary.items.clone(),
                    cursor: summary.cursor,
                },
            );
        }
        self.state.commits.push(Commit {
            command: summary.command,
            target: summary.final_target,
            cycled: true,
            net_moves: summary.net_moves,
            escalation: summary.repeat,
        });
        true
    }
}

/// Wrap a selection command body as a plain (non-cycling) handler that
/// commits its selection immediately.
fn plain_handler(name: &'static str, run: SelectionFn) -> CommandHandler {
    Box::new(move |ws, state, invocation| {
        let result = run(ws, state, invocation)?;
        state.commits.push(Commit {
            command: name.to_string(),
            target: result.target,
            cycled: false,
            net_moves: 0,
            escalation: state.repeat,
        });
        Ok(())
    })
}

/// Built-in `switch-doc`: select a document by name, or the most recently
/// visited document other than the one currently shown.
fn run_switch_doc(
    ws: &mut Workspace,
    _state: &mut EngineState,
    invocation: &Invocation,
) -> Result<SelectionResult> {
    let target = match invocation.arg.as_deref() {
        Some(name) => Target::Doc(
            ws.find_document(name)
                .with_context(|| format!("No document named '{name}'"))?,
        ),
        None => {
            let shown = ws.shown_in(ws.active_view());
            ws.history()
                .iter()
                .copied()
                .find(|t| matches!(t, Target::Doc(_)) && Some(*t) != shown)
                .context("No recent document to switch to")?
        }
    };
    ws.apply(target, SelectContext::Focus)?;
    Ok(SelectionResult {
        target,
        context: SelectContext::Focus,
        prebuilt: None,
    })
}

/// Built-in `console`: select or create a console for a directory via the
/// selection heuristic, escalating on bare repeats.
fn run_console(
    ws: &mut Workspace,
    state: &mut EngineState,
    invocation: &Invocation,
) -> Result<SelectionResult> {
    let dir = PathBuf::from(invocation.arg.as_deref().unwrap_or("."));
    let opts = SelectOptions {
        dir,
        affinity: state.config.console.affinity,
        tolerance: effective_tolerance(state.config.console.tolerance, state.repeat),
        interactive: true,
        name: state.config.console.name.clone(),
    };
    let selection = select_console(ws, &opts)?;

    // Escalated invocations land in the same view instead of opening the
    // console elsewhere.
    let context = if state.repeat >= 4 {
        SelectContext::Focus
    } else {
        ws.other_view().map_or(SelectContext::Focus, SelectContext::Display)
    };
    ws.apply(Target::Console(selection.chosen), context)?;

    if selection.created {
        if let Some(name) = ws.target_name(Target::Console(selection.chosen)) {
            let notice = format!("Created console '{name}'");
            state.notices.push(notice);
        }
    }
    Ok(SelectionResult {
        target: Target::Console(selection.chosen),
        context,
        prebuilt: Some(selection.ring),
    })
}

/// Default ring rule: a prebuilt ring wins; document results get the
/// sibling heuristic, seeded with any remembered ring; a ring without
/// alternatives starts no session.
fn default_ring_builder(
    ws: &mut Workspace,
    state: &mut EngineState,
    result: &SelectionResult,
    _invocation: &Invocation,
) -> Result<Option<Ring<Target>>> {
    if let Some(ring) = &result.prebuilt {
        return Ok((ring.len() > 1).then(|| ring.clone()));
    }
    let Target::Doc(seed) = result.target else {
        return Ok(None);
    };
    let previous = state.sibling_memory.get(&seed);
    sibling_ring(ws, &state.overrides, seed, previous)
}
