//! Command-variant wrapper
//!
//! Wraps selection commands so their results can seed cycling sessions. A
//! registration table of `VariantSpec`s plus one ring-builder function is
//! turned into generated handler closures and key registrations — a
//! higher-order builder, not metaprogramming. The dispatcher consults an
//! explicit remap table, so a built-in command name can be redirected to
//! its cycling variant without touching the built-in itself.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};

use crate::cycle::engine::{Commit, EngineState};
use crate::cycle::ring::Ring;
use crate::cycle::session::{CycleSession, KeyPair, SessionCtx};
use crate::workspace::{SelectContext, Target, Workspace};

/// One invocation of a command: the key that triggered it (if any), an
/// optional explicit numeric count, and an optional argument.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    /// The key press that invoked the command, if it came from a binding.
    pub key: Option<String>,
    /// Explicit signed numeric prefix.
    pub count: Option<i64>,
    /// Command argument (a document name, a directory).
    pub arg: Option<String>,
}

impl Invocation {
    /// An invocation with no key, count, or argument.
    #[must_use]
    pub fn bare() -> Self {
        Self::default()
    }

    /// An invocation carrying just an argument.
    #[must_use]
    pub fn with_arg(arg: &str) -> Self {
        Self {
            arg: Some(arg.to_string()),
            ..Self::default()
        }
    }
}

/// What an underlying selection command produced.
#[derive(Debug)]
pub struct SelectionResult {
    /// The resource that was selected.
    pub target: Target,
    /// How it was applied (cycling keeps using the same context).
    pub context: SelectContext,
    /// A ring the command already built, if it has better knowledge than
    /// the generic ring builder (the console heuristic does).
    pub prebuilt: Option<Ring<Target>>,
}

/// Body of a selection command or variant.
pub type SelectionFn = fn(&mut Workspace, &mut EngineState, &Invocation) -> Result<SelectionResult>;

/// Maps a command's result to the ring a session will cycle over, or to
/// `None` when no cycling should start.
pub type RingBuilder = fn(
    &mut Workspace,
    &mut EngineState,
    &SelectionResult,
    &Invocation,
) -> Result<Option<Ring<Target>>>;

/// A generated command handler.
pub type CommandHandler = Box<dyn Fn(&mut Workspace, &mut EngineState, &Invocation) -> Result<()>>;

/// An underlying selection command.
#[derive(Debug, Clone)]
pub struct Command {
    /// Command name, used for remapping and escalation tracking.
    pub name: String,
    /// The command body.
    pub run: SelectionFn,
}

/// Registration table entry for one command variant.
#[derive(Debug, Clone)]
pub struct VariantSpec {
    /// Name of the generated command.
    pub name: String,
    /// The wrapped selection command.
    pub underlying: Command,
    /// Trigger bindings captured when a session starts.
    pub keys: KeyPair,
    /// Optional replacement body; defaults to forwarding the invocation to
    /// the underlying command.
    pub body: Option<SelectionFn>,
    /// Key to register the generated command under, if any.
    pub binding: Option<String>,
}

/// A generated command ready to register: name, optional key, handler.
pub struct Registration {
    /// Name of the generated command.
    pub name: String,
    /// Key it should be bound to, if any.
    pub binding: Option<String>,
    /// The handler closure.
    pub handler: CommandHandler,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("binding", &self.binding)
            .field("handler", &"<closure>")
            .finish()
    }
}

/// Generate one executable command per spec.
///
/// Each generated command runs its body (or forwards to the underlying
/// command), hands the result to `builder`, and starts a cycling session
/// when the builder yields a ring; otherwise it is a pure pass-through.
/// Malformed specs fail here, at construction time.
pub fn build_variants(specs: Vec<VariantSpec>, builder: RingBuilder) -> Result<Vec<Registration>> {
    let mut seen = std::collections::HashSet::new();
    for spec in &specs {
        if spec.name.trim().is_empty() {
            bail!("Variant name cannot be empty");
        }
        if spec.underlying.name.trim().is_empty() {
            bail!("Variant '{}' wraps a command with no name", spec.name);
        }
        if !seen.insert(spec.name.clone()) {
            bail!("Duplicate variant name: '{}'", spec.name);
        }
        if let Some(binding) = &spec.binding {
            if binding.is_empty() || binding.contains(char::is_whitespace) {
                bail!("Variant '{}' has a malformed key binding", spec.name);
            }
        }
    }

    Ok(specs
        .into_iter()
        .map(|spec| Registration {
            name: spec.name.clone(),
            binding: spec.binding.clone(),
            handler: make_handler(spec, builder),
        })
        .collect())
}

/// Build the handler closure for one variant spec.
fn make_handler(spec: VariantSpec, builder: RingBuilder) -> CommandHandler {
    Box::new(move |ws, state, invocation| {
        // Snapshot pre-command state; the exit action reconciles against it.
        let saved_history = ws.history_snapshot();
        let origin_view = ws.active_view();

        let run = spec.body.unwrap_or(spec.underlying.run);
        let result = run(ws, state, invocation)?;

        let Some(ring) = builder(ws, state, &result, invocation)? else {
            // Pass-through: no observable difference from the wrapped
            // command; the selection commits immediately.
            state.commits.push(Commit {
                command: spec.name.clone(),
                target: result.target,
                cycled: false,
                net_moves: 0,
                escalation: state.repeat,
            });
            return Ok(());
        };

        let ctx = SessionCtx {
            command: spec.name.clone(),
            saved_history,
            origin_view,
            select: result.context,
            repeat: state.repeat,
        };
        let session = CycleSession::start(
            ring,
            ctx,
            &spec.keys,
            invocation.key.as_deref(),
            &state.config.keys.forward,
            &state.config.keys.backward,
        );
        state.notices.push(format!(
            "Cycling: {} → next, {} → previous",
            session.forward_key(),
            session.backward_key()
        ));
        state.active = Some(session);
        Ok(())
    })
}

/// Command dispatcher with an explicit remap table and key bindings.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<String, CommandHandler>,
    remap: HashMap<String, String>,
    bindings: Vec<(String, String)>,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command handler under a name.
    pub fn register(&mut self, name: &str, handler: CommandHandler) -> Result<()> {
        if name.trim().is_empty() {
            bail!("Command name cannot be empty");
        }
        if self.handlers.contains_key(name) {
            bail!("Command '{name}' is already registered");
        }
        self.handlers.insert(name.to_string(), handler);
        Ok(())
    }

    /// Register a batch of generated variants, including their bindings.
    pub fn register_variants(&mut self, registrations: Vec<Registration>) -> Result<()> {
        for registration in registrations {
            self.register(&registration.name, registration.handler)?;
            if let Some(key) = registration.binding {
                self.bind(&key, &registration.name)?;
            }
        }
        Ok(())
    }

    /// Redirect invocations of `from` to the command `to`.
    ///
    /// `to` must already be registered; remaps are a single hop.
    pub fn add_remap(&mut self, from: &str, to: &str) -> Result<()> {
        if !self.handlers.contains_key(to) {
            bail!("Cannot remap '{from}' to unknown command '{to}'");
        }
        self.remap.insert(from.to_string(), to.to_string());
        Ok(())
    }

    /// Bind a key to a command name.
    pub fn bind(&mut self, key: &str, command: &str) -> Result<()> {
        if key.is_empty() || key.contains(char::is_whitespace) {
            bail!("Malformed key binding '{key}'");
        }
        if self.bindings.iter().any(|(k, _)| k == key) {
            bail!("Key '{key}' is already bound");
        }
        self.bindings.push((key.to_string(), command.to_string()));
        Ok(())
    }

    /// The command a key is bound to, if any.
    #[must_use]
    pub fn command_for_key(&self, key: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, command)| command.as_str())
    }

    /// Resolve a command name through the remap table (one hop).
    #[must_use]
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.remap.get(name).map_or(name, String::as_str)
    }

    /// Dispatch a command by name, feeding the escalation tracker and
    /// running the resolved handler.
    pub fn dispatch(
        &self,
        ws: &mut Workspace,
        state: &mut EngineState,
        name: &str,
        invocation: &Invocation,
    ) -> Result<()> {
        let resolved = self.resolve(name).to_string();
        let handler = self
            .handlers
            .get(&resolved)
            .with_context(|| format!("Unknown command: '{name}'"))?;
        state.repeat = state.escalation.note(&resolved, invocation.count);
        handler(ws, state, invocation)
    }
}
