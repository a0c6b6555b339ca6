//! In-memory host environment for the cycling engine.
//!
//! Models the three things the engine needs from its host: selectable
//! resources (documents and consoles), views that display one resource at a
//! time, and the most-recently-used selection history with snapshot/commit
//! semantics. Everything is synchronous and single-owner; recency uses a
//! logical clock owned by the workspace so ordering is deterministic.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

/// Identifier of an open document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocId(u32);

/// Identifier of a console (worker session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsoleId(u32);

/// Identifier of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(u32);

/// A selectable resource: the candidate value rings cycle over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// An open document.
    Doc(DocId),
    /// A console session.
    Console(ConsoleId),
}

/// How a candidate is applied to the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectContext {
    /// Select into the currently active view.
    Focus,
    /// Display within the given view without changing focus rules.
    Display(ViewId),
}

/// An open document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Identifier.
    pub id: DocId,
    /// Display name, possibly carrying a `<N>` disambiguation suffix.
    pub name: String,
    /// Content kind (e.g. "article", "log").
    pub kind: String,
    /// Backing file, if the document has persistent storage.
    pub path: Option<PathBuf>,
}

/// A console session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Console {
    /// Identifier.
    pub id: ConsoleId,
    /// Display name, possibly carrying a `<N>` disambiguation suffix.
    pub name: String,
    /// Working directory.
    pub cwd: PathBuf,
    /// Logical clock stamp of the last selection; higher is more recent.
    pub last_used: u64,
    /// Whether the console's own process is still alive.
    pub process_alive: bool,
    /// A foreign process is currently doing work in this console.
    pub foreign_process: bool,
    /// The console is restricted to a sub-view of its content.
    pub narrowed: bool,
    /// Input has been typed but not yet submitted.
    pub pending_input: bool,
}

/// A visible region displaying at most one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    /// Identifier.
    pub id: ViewId,
    /// The resource currently shown, if any.
    pub shown: Option<Target>,
}

/// The host environment: resources, views, and the selection history.
#[derive(Debug, Default)]
pub struct Workspace {
    docs: Vec<Document>,
    consoles: Vec<Console>,
    views: Vec<View>,
    active_view: u32,
    history: Vec<Target>,
    project_roots: Vec<PathBuf>,
    clock: u64,
    next_id: u32,
}

impl Workspace {
    /// Create a workspace with a single empty view.
    #[must_use]
    pub fn new() -> Self {
        let mut ws = Self::default();
        let view = ws.fresh_id();
        ws.views.push(View {
            id: ViewId(view),
            shown: None,
        });
        ws.active_view = view;
        ws
    }

    fn fresh_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    // --- views ---

    /// Add another view and return its id.
    pub fn add_view(&mut self) -> ViewId {
        let id = ViewId(self.fresh_id());
        self.views.push(View { id, shown: None });
        id
    }

    /// The currently active view.
    #[must_use]
    pub const fn active_view(&self) -> ViewId {
        ViewId(self.active_view)
    }

    /// Some view other than the active one, if any exists.
    #[must_use]
    pub fn other_view(&self) -> Option<ViewId> {
        self.views
            .iter()
            .map(|v| v.id)
            .find(|&id| id != self.active_view())
    }

    /// The resource shown in the given view.
    #[must_use]
    pub fn shown_in(&self, view: ViewId) -> Option<Target> {
        self.views.iter().find(|v| v.id == view)?.shown
    }

    // --- documents ---

    /// Open a document, disambiguating its name with a `<N>` suffix if the
    /// requested name is already taken.
    pub fn open_document(&mut self, name: &str, kind: &str, path: Option<PathBuf>) -> DocId {
        let name = if self.find_document(name).is_some() {
            free_numbered_name(name, |candidate| self.find_document(candidate).is_some())
        } else {
            name.to_string()
        };
        let id = DocId(self.fresh_id());
        self.docs.push(Document {
            id,
            name,
            kind: kind.to_string(),
            path,
        });
        id
    }

    /// Look up a live document by id.
    #[must_use]
    pub fn document(&self, id: DocId) -> Option<&Document> {
        self.docs.iter().find(|d| d.id == id)
    }

    /// Look up a live document id by exact display name.
    #[must_use]
    pub fn find_document(&self, name: &str) -> Option<DocId> {
        self.docs.iter().find(|d| d.name == name).map(|d| d.id)
    }

    /// All live documents, in opening order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.docs.iter()
    }

    /// Destroy a document, scrubbing it from views and history.
    pub fn kill_document(&mut self, id: DocId) {
        self.docs.retain(|d| d.id != id);
        self.scrub(Target::Doc(id));
    }

    // --- consoles ---

    /// Open a console, disambiguating its name like `open_document`.
    pub fn open_console(&mut self, name: &str, cwd: &Path) -> ConsoleId {
        let name = if self.find_console(name).is_some() {
            free_numbered_name(name, |candidate| self.find_console(candidate).is_some())
        } else {
            name.to_string()
        };
        let id = ConsoleId(self.fresh_id());
        self.clock += 1;
        self.consoles.push(Console {
            id,
            name,
            cwd: cwd.to_path_buf(),
            last_used: self.clock,
            process_alive: true,
            foreign_process: false,
            narrowed: false,
            pending_input: false,
        });
        id
    }

    /// Look up a live console by id.
    #[must_use]
    pub fn console(&self, id: ConsoleId) -> Option<&Console> {
        self.consoles.iter().find(|c| c.id == id)
    }

    /// Mutable access to a live console (busy flags, process state).
    pub fn console_mut(&mut self, id: ConsoleId) -> Option<&mut Console> {
        self.consoles.iter_mut().find(|c| c.id == id)
    }

    /// Look up a live console id by exact display name.
    #[must_use]
    pub fn find_console(&self, name: &str) -> Option<ConsoleId> {
        self.consoles.iter().find(|c| c.name == name).map(|c| c.id)
    }

    /// All live consoles, most recently used first.
    #[must_use]
    pub fn consoles_by_recency(&self) -> Vec<&Console> {
        let mut consoles: Vec<&Console> = self.consoles.iter().collect();
        consoles.sort_by(|a, b| b.last_used.cmp(&a.last_used));
        consoles
    }

    /// Destroy a console, scrubbing it from views and history.
    pub fn kill_console(&mut self, id: ConsoleId) {
        self.consoles.retain(|c| c.id != id);
        self.scrub(Target::Console(id));
    }

    /// Rename a console. The caller is responsible for picking a free name
    /// (see `free_console_name`).
    pub fn rename_console(&mut self, id: ConsoleId, name: &str) -> Result<()> {
        match self.console_mut(id) {
            Some(console) => {
                console.name = name.to_string();
                Ok(())
            }
            None => bail!("No such console"),
        }
    }

    /// Lowest free `base<N>` name (N ≥ 2) among live consoles.
    #[must_use]
    pub fn free_console_name(&self, base: &str) -> String {
        free_numbered_name(base, |candidate| self.find_console(candidate).is_some())
    }

    /// Command a console to change its working directory.
    ///
    /// # Errors
    /// A user error if the console is gone or its process has exited.
    pub fn set_cwd(&mut self, id: ConsoleId, dir: &Path) -> Result<()> {
        let Some(console) = self.console_mut(id) else {
            bail!("No such console");
        };
        if !console.process_alive {
            bail!("Console '{}' has no live process", console.name);
        }
        console.cwd = dir.to_path_buf();
        Ok(())
    }

    // --- projects ---

    /// Register a project root for same-project console matching.
    pub fn add_project_root(&mut self, root: &Path) {
        self.project_roots.push(root.to_path_buf());
    }

    /// The longest registered project root containing `dir`, if any.
    #[must_use]
    pub fn project_root_of(&self, dir: &Path) -> Option<&Path> {
        self.project_roots
            .iter()
            .filter(|root| dir.starts_with(root))
            .max_by_key(|root| root.as_os_str().len())
            .map(PathBuf::as_path)
    }

    // --- selection and history ---

    /// Whether a target still refers to a live resource.
    #[must_use]
    pub fn is_live(&self, target: Target) -> bool {
        match target {
            Target::Doc(id) => self.document(id).is_some(),
            Target::Console(id) => self.console(id).is_some(),
        }
    }

    /// Display name for a target, if it is still live.
    #[must_use]
    pub fn target_name(&self, target: Target) -> Option<&str> {
        match target {
            Target::Doc(id) => self.document(id).map(|d| d.name.as_str()),
            Target::Console(id) => self.console(id).map(|c| c.name.as_str()),
        }
    }

    /// Make `target` the selection in the given context, stamping recency
    /// and recording the visit in the history.
    ///
    /// # Errors
    /// A user error if the target or the requested view no longer exists.
    pub fn apply(&mut self, target: Target, context: SelectContext) -> Result<()> {
        if !self.is_live(target) {
            match target {
                Target::Doc(_) => bail!("No such document"),
                Target::Console(_) => bail!("No such console"),
            }
        }
        let view = match context {
            SelectContext::Focus => self.active_view(),
            SelectContext::Display(view) => view,
        };
        let Some(slot) = self.views.iter_mut().find(|v| v.id == view) else {
            bail!("No such view");
        };
        slot.shown = Some(target);
        self.clock += 1;
        let stamp = self.clock;
        if let Target::Console(id) = target {
            if let Some(console) = self.console_mut(id) {
                console.last_used = stamp;
            }
        }
        self.record_visit(target);
        Ok(())
    }

    /// Move `target` to the front of the history without touching views.
    pub fn record_visit(&mut self, target: Target) {
        self.history.retain(|&t| t != target);
        self.history.insert(0, target);
    }

    /// The selection history, most recent first.
    #[must_use]
    pub fn history(&self) -> &[Target] {
        &self.history
    }

    /// A snapshot of the history for later reconciliation.
    #[must_use]
    pub fn history_snapshot(&self) -> Vec<Target> {
        self.history.clone()
    }

    /// Replace the history with a saved snapshot, silently dropping
    /// entries whose resources have since been destroyed.
    pub fn history_commit(&mut self, saved: Vec<Target>) {
        let kept: Vec<Target> = saved
            .into_iter()
            .filter(|&target| self.is_live(target))
            .collect();
        self.history = kept;
    }

    fn scrub(&mut self, target: Target) {
        self.history.retain(|&t| t != target);
        for view in &mut self.views {
            if view.shown == Some(target) {
                view.shown = None;
            }
        }
    }
}

/// Lowest `base<N>` (N ≥ 2) for which `taken` answers false.
fn free_numbered_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut n = 2;
    loop {
        let candidate = format!("{base}<{n}>");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
