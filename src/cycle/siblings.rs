//! Sibling grouping heuristic
//!
//! Given a seed document, computes the ordered set of related documents to
//! cycle over: first the seed's clone family (names differing only by a
//! `<N>` suffix), then every other live document of the family's inferred
//! kind. A previous ring can be folded back in so that resuming cycling
//! continues where it stopped instead of starting over from the seed.

use anyhow::{Context, Result};
use regex::Regex;

use crate::cycle::config::OverrideTable;
use crate::cycle::ring::Ring;
use crate::workspace::{DocId, Target, Workspace};

/// A ring remembered from an earlier cycling session, keyed by the document
/// that was finally selected. `items[cursor]` is that document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiblingMemory {
    /// The ring's candidates in insertion order.
    pub items: Vec<Target>,
    /// Cursor position at session exit.
    pub cursor: usize,
}

/// Strip one trailing `<N>` disambiguation suffix from a display name.
#[must_use]
pub fn root_name(name: &str) -> &str {
    if let Some(start) = name.rfind('<') {
        if let Some(inner) = name[start..].strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
            if name.ends_with('>') && !inner.is_empty() && inner.bytes().all(|b| b.is_ascii_digit())
            {
                return &name[..start];
            }
        }
    }
    name
}

/// Derive the pattern matching a root name and its numbered clones.
fn family_pattern(root: &str) -> Result<Regex> {
    Regex::new(&format!("^{}(<[0-9]+>)?$", regex::escape(root)))
        .with_context(|| format!("Failed to derive family pattern for '{root}'"))
}

/// All live documents in the clone family of `root`, in opening order.
pub fn clone_family(ws: &Workspace, root: &str) -> Result<Vec<DocId>> {
    let pattern = family_pattern(root)?;
    Ok(ws
        .documents()
        .filter(|d| pattern.is_match(&d.name))
        .map(|d| d.id)
        .collect())
}

/// Infer the kind shared by a clone family.
///
/// Ordered fallback chain, first match wins; later guards are intentionally
/// weaker than earlier ones:
/// 1. the configured override table, matched against the root name;
/// 2. a sole clone with persistent storage;
/// 3. a clone literally named the root, with persistent storage;
/// 4. a clone whose kind is a case-insensitive substring of the trimmed
///    root name;
/// 5. the seed's own kind.
#[must_use]
pub fn infer_kind(
    ws: &Workspace,
    overrides: &OverrideTable,
    root: &str,
    family: &[DocId],
    seed: DocId,
) -> String {
    if let Some(kind) = overrides.kind_for(root) {
        return kind.to_string();
    }

    if let [only] = family {
        if let Some(doc) = ws.document(*only) {
            if doc.path.is_some() {
                return doc.kind.clone();
            }
        }
    }

    if let Some(doc) = family
        .iter()
        .filter_map(|&id| ws.document(id))
        .find(|d| d.name == root && d.path.is_some())
    {
        return doc.kind.clone();
    }

    let haystack = root.trim().to_lowercase();
    if let Some(doc) = family
        .iter()
        .filter_map(|&id| ws.document(id))
        .find(|d| !d.kind.is_empty() && haystack.contains(&d.kind.to_lowercase()))
    {
        return doc.kind.clone();
    }

    ws.document(seed).map(|d| d.kind.clone()).unwrap_or_default()
}

/// Build the sibling ring for `seed`.
///
/// A fresh ring orders the seed first, then the rest of its clone family,
/// then other live documents of the inferred kind. With `previous` set, the
/// old ring is reconstructed around its cursor — candidates from the cursor
/// onward first, newly discovered siblings in the middle, candidates before
/// the cursor last — with killed documents dropped silently.
///
/// Returns `None` when the seed is gone or no alternative exists, in which
/// case no cycling session should start.
pub fn sibling_ring(
    ws: &Workspace,
    overrides: &OverrideTable,
    seed: DocId,
    previous: Option<&SiblingMemory>,
) -> Result<Option<Ring<Target>>> {
    let Some(seed_doc) = ws.document(seed) else {
        return Ok(None);
    };
    let root = root_name(&seed_doc.name).to_string();
    let family = clone_family(ws, &root)?;
    let kind = infer_kind(ws, overrides, &root, &family, seed);

    let mut fresh = vec![Target::Doc(seed)];
    fresh.extend(
        family
            .iter()
            .filter(|&&id| id != seed)
            .map(|&id| Target::Doc(id)),
    );
    fresh.extend(
        ws.documents()
            .filter(|d| d.kind == kind && !family.contains(&d.id))
            .map(|d| Target::Doc(d.id)),
    );

    let (head, tail): (Vec<Target>, Vec<Target>) =
        previous.map_or((Vec::new(), Vec::new()), |memory| {
            let cursor = memory.cursor.min(memory.items.len());
            let live = |t: &&Target| ws.is_live(**t);
            (
                memory.items[cursor..].iter().filter(live).copied().collect(),
                memory.items[..cursor].iter().filter(live).copied().collect(),
            )
        });

    let mut items: Vec<Target> = head.clone();
    items.extend(
        fresh
            .into_iter()
            .filter(|t| !head.contains(t) && !tail.contains(t)),
    );
    items.extend(tail);

    if items.len() < 2 {
        return Ok(None);
    }

    let mut ring = Ring::new(items.len())?;
    for item in items {
        ring.insert(item)?;
    }
    Ok(Some(ring))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::config::Config;

    fn no_overrides() -> OverrideTable {
        Config::default().override_table().unwrap()
    }

    fn overrides_from(toml: &str) -> OverrideTable {
        Config::parse(toml).unwrap().override_table().unwrap()
    }

    // --- root_name ---

    #[test]
    fn test_root_name_without_suffix() {
        assert_eq!(root_name("report"), "report");
    }

    #[test]
    fn test_root_name_strips_numeric_suffix() {
        assert_eq!(root_name("report<2>"), "report");
        assert_eq!(root_name("report<13>"), "report");
    }

    #[test]
    fn test_root_name_ignores_non_numeric_suffix() {
        assert_eq!(root_name("report<a>"), "report<a>");
        assert_eq!(root_name("report<>"), "report<>");
    }

    #[test]
    fn test_root_name_only_strips_trailing_suffix() {
        assert_eq!(root_name("a<2>b"), "a<2>b");
        assert_eq!(root_name("a<2><3>"), "a<2>");
    }

    #[test]
    fn test_root_name_of_bare_suffix_is_empty() {
        assert_eq!(root_name("<2>"), "");
    }

    // --- clone_family ---

    #[test]
    fn test_clone_family_collects_root_and_clones() {
        let mut ws = Workspace::new();
        let a = ws.open_document("report", "article", None);
        let b = ws.open_document("report", "article", None);
        let c = ws.open_document("report", "article", None);
        ws.open_document("reporter", "article", None);
        ws.open_document("scratch", "article", None);

        let family = clone_family(&ws, "report").unwrap();
        assert_eq!(family, vec![a, b, c]);
    }

    #[test]
    fn test_clone_family_escapes_regex_metacharacters() {
        let mut ws = Workspace::new();
        let a = ws.open_document("notes.txt", "text", None);
        ws.open_document("notesxtxt", "text", None);

        let family = clone_family(&ws, "notes.txt").unwrap();
        assert_eq!(family, vec![a]);
    }

    // --- infer_kind ---

    #[test]
    fn test_infer_kind_override_table_wins() {
        let mut ws = Workspace::new();
        let seed = ws.open_document("notes", "text", Some("/f/notes".into()));
        let family = vec![seed];
        let overrides = overrides_from("[[kind_override]]\npattern = \"^notes\"\nkind = \"markdown\"\n");

        let kind = infer_kind(&ws, &overrides, "notes", &family, seed);
        assert_eq!(kind, "markdown");
    }

    #[test]
    fn test_infer_kind_sole_clone_with_storage() {
        let mut ws = Workspace::new();
        let seed = ws.open_document("draft", "article", Some("/f/draft".into()));
        let family = vec![seed];

        let kind = infer_kind(&ws, &no_overrides(), "draft", &family, seed);
        assert_eq!(kind, "article");
    }

    #[test]
    fn test_infer_kind_sole_clone_without_storage_skipped() {
        let mut ws = Workspace::new();
        // No storage, and "scratch" does not contain the kind "article", so
        // the chain falls through to the seed's own kind.
        let seed = ws.open_document("scratch", "article", None);
        let family = vec![seed];

        let kind = infer_kind(&ws, &no_overrides(), "scratch", &family, seed);
        assert_eq!(kind, "article");
    }

    #[test]
    fn test_infer_kind_root_named_clone_with_storage() {
        let mut ws = Workspace::new();
        let root_doc = ws.open_document("draft", "article", Some("/f/draft".into()));
        let seed = ws.open_document("draft", "scratchpad", None); // becomes draft<2>
        let family = vec![root_doc, seed];

        let kind = infer_kind(&ws, &no_overrides(), "draft", &family, seed);
        assert_eq!(kind, "article");
    }

    #[test]
    fn test_infer_kind_substring_match_case_insensitive() {
        let mut ws = Workspace::new();
        let a = ws.open_document("build Log", "plain", None);
        let seed = ws.open_document("build Log", "log", None); // build Log<2>
        let family = vec![a, seed];

        // Neither storage guard applies; "log" is a substring of "build log".
        let kind = infer_kind(&ws, &no_overrides(), "build Log", &family, a);
        assert_eq!(kind, "log");
    }

    #[test]
    fn test_infer_kind_falls_back_to_seed_kind() {
        let mut ws = Workspace::new();
        let a = ws.open_document("misc", "alpha", None);
        let seed = ws.open_document("misc", "beta", None); // misc<2>
        let family = vec![a, seed];

        let kind = infer_kind(&ws, &no_overrides(), "misc", &family, seed);
        assert_eq!(kind, "beta");
    }

    #[test]
    fn test_infer_kind_storage_beats_substring() {
        let mut ws = Workspace::new();
        let root_doc = ws.open_document("log", "plain", Some("/f/log".into()));
        let seed = ws.open_document("log", "log", None); // log<2>
        let family = vec![root_doc, seed];

        let kind = infer_kind(&ws, &no_overrides(), "log", &family, seed);
        assert_eq!(kind, "plain");
    }

    // --- sibling_ring, fresh ---

    #[test]
    fn test_fresh_ring_orders_seed_family_then_same_kind() {
        let mut ws = Workspace::new();
        let r1 = ws.open_document("report", "article", None);
        let r2 = ws.open_document("report", "article", None);
        let r3 = ws.open_document("report", "article", None);
        let scratch = ws.open_document("scratch", "article", None);

        let ring = sibling_ring(&ws, &no_overrides(), r2, None)
            .unwrap()
            .unwrap();
        assert_eq!(
            ring.items(),
            &[
                Target::Doc(r2),
                Target::Doc(r1),
                Target::Doc(r3),
                Target::Doc(scratch),
            ]
        );
        assert_eq!(*ring.get(0), Target::Doc(r2));
    }

    #[test]
    fn test_fresh_ring_has_no_duplicates() {
        let mut ws = Workspace::new();
        let r1 = ws.open_document("report", "article", None);
        let r2 = ws.open_document("report", "article", None);

        let ring = sibling_ring(&ws, &no_overrides(), r1, None)
            .unwrap()
            .unwrap();
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.items(), &[Target::Doc(r1), Target::Doc(r2)]);
    }

    #[test]
    fn test_fresh_ring_excludes_other_kinds() {
        let mut ws = Workspace::new();
        let r1 = ws.open_document("report", "article", None);
        let r2 = ws.open_document("report", "article", None);
        ws.open_document("todo", "list", None);

        let ring = sibling_ring(&ws, &no_overrides(), r1, None)
            .unwrap()
            .unwrap();
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.items(), &[Target::Doc(r1), Target::Doc(r2)]);
    }

    #[test]
    fn test_solo_document_yields_no_ring() {
        let mut ws = Workspace::new();
        let only = ws.open_document("alone", "article", None);
        ws.open_document("other", "list", None);

        assert!(sibling_ring(&ws, &no_overrides(), only, None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_dead_seed_yields_no_ring() {
        let mut ws = Workspace::new();
        let seed = ws.open_document("report", "article", None);
        ws.open_document("report", "article", None);
        ws.kill_document(seed);

        assert!(sibling_ring(&ws, &no_overrides(), seed, None)
            .unwrap()
            .is_none());
    }

    // --- sibling_ring, restart ---

    #[test]
    fn test_restart_reorders_around_previous_cursor() {
        let mut ws = Workspace::new();
        let a = ws.open_document("report", "article", None);
        let b = ws.open_document("report", "article", None);
        let c = ws.open_document("report", "article", None);

        let memory = SiblingMemory {
            items: vec![Target::Doc(a), Target::Doc(b), Target::Doc(c)],
            cursor: 1,
        };
        let ring = sibling_ring(&ws, &no_overrides(), b, Some(&memory))
            .unwrap()
            .unwrap();
        assert_eq!(
            ring.items(),
            &[Target::Doc(b), Target::Doc(c), Target::Doc(a)]
        );
    }

    #[test]
    fn test_restart_drops_killed_documents() {
        let mut ws = Workspace::new();
        let a = ws.open_document("report", "article", None);
        let b = ws.open_document("report", "article", None);
        let c = ws.open_document("report", "article", None);
        let memory = SiblingMemory {
            items: vec![Target::Doc(a), Target::Doc(b), Target::Doc(c)],
            cursor: 1,
        };

        ws.kill_document(a);
        let ring = sibling_ring(&ws, &no_overrides(), b, Some(&memory))
            .unwrap()
            .unwrap();
        assert_eq!(ring.items(), &[Target::Doc(b), Target::Doc(c)]);
        assert_eq!(*ring.get(0), Target::Doc(b));
    }

    #[test]
    fn test_restart_inserts_new_siblings_before_old_tail() {
        let mut ws = Workspace::new();
        let a = ws.open_document("report", "article", None);
        let b = ws.open_document("report", "article", None);
        let c = ws.open_document("report", "article", None);
        let memory = SiblingMemory {
            items: vec![Target::Doc(a), Target::Doc(b), Target::Doc(c)],
            cursor: 1,
        };

        let d = ws.open_document("report", "article", None);
        let ring = sibling_ring(&ws, &no_overrides(), b, Some(&memory))
            .unwrap()
            .unwrap();
        assert_eq!(
            ring.items(),
            &[Target::Doc(b), Target::Doc(c), Target::Doc(d), Target::Doc(a)]
        );
    }

    #[test]
    fn test_restart_does_not_duplicate_survivors() {
        let mut ws = Workspace::new();
        let a = ws.open_document("report", "article", None);
        let b = ws.open_document("report", "article", None);
        let memory = SiblingMemory {
            items: vec![Target::Doc(a), Target::Doc(b)],
            cursor: 0,
        };

        let ring = sibling_ring(&ws, &no_overrides(), a, Some(&memory))
            .unwrap()
            .unwrap();
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn test_restart_with_stale_cursor_is_safe() {
        let mut ws = Workspace::new();
        let a = ws.open_document("report", "article", None);
        let b = ws.open_document("report", "article", None);
        let memory = SiblingMemory {
            items: vec![Target::Doc(a), Target::Doc(b)],
            cursor: 9,
        };

        let ring = sibling_ring(&ws, &no_overrides(), a, Some(&memory))
            .unwrap()
            .unwrap();
        assert_eq!(ring.len(), 2);
    }
}
