//! Cycling session and exit protocol
//!
//! The temporary mode installed after a wrapped command returns a candidate
//! ring. Forward/backward keys move the ring cursor and apply the candidate
//! under it; any other key ends the session. Intermediate candidates leave
//! no durable trace: the exit action restores the history snapshot taken
//! before the wrapped command ran and records only the final candidate, so
//! cycling is indistinguishable from having selected that candidate
//! directly.

use anyhow::Result;

use crate::cycle::ring::Ring;
use crate::workspace::{SelectContext, Target, ViewId, Workspace};

/// How a trigger binding is resolved when a session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySpec {
    /// A fixed key.
    Literal(String),
    /// Reuse the key that invoked the wrapped command.
    Invoking,
}

impl KeySpec {
    /// Resolve against the invoking key, falling back to `fallback` when
    /// the command was invoked without one.
    #[must_use]
    pub fn resolve(&self, invoking: Option<&str>, fallback: &str) -> String {
        match self {
            Self::Literal(key) => key.clone(),
            Self::Invoking => invoking.unwrap_or(fallback).to_string(),
        }
    }
}

/// The forward/backward trigger bindings of a command variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    /// Binding that advances the ring.
    pub forward: KeySpec,
    /// Binding that moves the ring backward.
    pub backward: KeySpec,
}

/// Per-session context captured before the wrapped command ran.
#[derive(Debug, Clone)]
pub struct SessionCtx {
    /// Name of the command that seeded the session.
    pub command: String,
    /// History snapshot from before the wrapped command's own selection.
    pub saved_history: Vec<Target>,
    /// View that was active when the command was invoked.
    pub origin_view: ViewId,
    /// How candidates are applied while cycling.
    pub select: SelectContext,
    /// Repeat accumulator of the invocation that seeded the session.
    pub repeat: u32,
}

/// What the exit action reports back to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitSummary {
    /// Name of the command that seeded the session.
    pub command: String,
    /// The candidate that ended up selected.
    pub final_target: Target,
    /// Net cursor movement over the whole session.
    pub net_moves: i64,
    /// Ring candidates in insertion order, for per-resource memory.
    pub items: Vec<Target>,
    /// Final cursor position within `items`.
    pub cursor: usize,
    /// Repeat accumulator of the invocation that seeded the session.
    pub repeat: u32,
}

/// An active cycling session.
///
/// Owned by the engine; exit consumes the session, so the exit action runs
/// exactly once.
#[derive(Debug)]
pub struct CycleSession {
    ring: Ring<Target>,
    ctx: SessionCtx,
    forward: String,
    backward: String,
    net_moves: i64,
}

impl CycleSession {
    /// Start a session over `ring`, resolving the trigger bindings from how
    /// the command was invoked.
    #[must_use]
    pub fn start(
        ring: Ring<Target>,
        ctx: SessionCtx,
        keys: &KeyPair,
        invoking_key: Option<&str>,
        default_forward: &str,
        default_backward: &str,
    ) -> Self {
        Self {
            ring,
            ctx,
            forward: keys.forward.resolve(invoking_key, default_forward),
            backward: keys.backward.resolve(invoking_key, default_backward),
            net_moves: 0,
        }
    }

    /// The resolved forward key.
    #[must_use]
    pub fn forward_key(&self) -> &str {
        &self.forward
    }

    /// The resolved backward key.
    #[must_use]
    pub fn backward_key(&self) -> &str {
        &self.backward
    }

    /// The command that seeded this session.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.ctx.command
    }

    /// The cycling direction bound to `key`, if any. Forward is checked
    /// first should both bindings resolve to the same key.
    #[must_use]
    pub fn direction_for(&self, key: &str) -> Option<i64> {
        if key == self.forward {
            Some(1)
        } else if key == self.backward {
            Some(-1)
        } else {
            None
        }
    }

    /// Move the cursor by `direction * count` and apply the new candidate.
    ///
    /// On a user error (the candidate vanished mid-session) the cursor move
    /// is rolled back and the session stays open.
    pub fn cycle(&mut self, ws: &mut Workspace, direction: i64, count: i64) -> Result<Target> {
        let offset = direction.saturating_mul(count);
        self.ring.advance(offset);
        let candidate = *self.ring.get(0);
        match ws.apply(candidate, self.ctx.select) {
            Ok(()) => {
                self.net_moves = self.net_moves.saturating_add(offset);
                Ok(candidate)
            }
            Err(err) => {
                self.ring.advance(-offset);
                Err(err)
            }
        }
    }

    /// Run the exit action: restore the pre-command history, then record
    /// exactly the final candidate as visited.
    ///
    /// Consuming the session guarantees this happens once.
    pub fn exit(mut self, ws: &mut Workspace) -> ExitSummary {
        ws.history_commit(std::mem::take(&mut self.ctx.saved_history));
        let final_target = *self.ring.get(0);
        ws.record_visit(final_target);
        ExitSummary {
            command: self.ctx.command,
            final_target,
            net_moves: self.net_moves,
            items: self.ring.items().to_vec(),
            cursor: self.ring.cursor(),
            repeat: self.ctx.repeat,
        }
    }
}
