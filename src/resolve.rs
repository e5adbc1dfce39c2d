//! Input resolution: typed text to a command handle.
//!
//! Only the leading command word(s) are inspected; everything after them is
//! handed back untouched as the argument string. Matching runs in stages:
//!
//! 1. exact key match, longest run of leading words first (keys may contain spaces)
//! 2. exact alias match, same rule
//! 3. numbered pick `N-word` among the candidates `word` would produce
//! 4. unambiguous prefix of any key or alias
//!
//! Commands the actor fails the access rule for are invisible to every stage,
//! including ambiguity counting and suggestions. All access checks run once,
//! up front, before any matching.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::actor::{ActorId, PermissionOracle};
use crate::cmdset::{CommandSet, SetEntry};
use crate::command::{normalize_name, CommandDescriptor};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Resolver tuning, usually read from the `[resolver]` table of a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Allow unambiguous prefixes (`lo` for `look`).
    pub prefix_matching: bool,
    /// Command words shorter than this never prefix-match.
    pub min_prefix_len: usize,
    /// Separator for numbered disambiguation (`2-lo`); `None` disables it.
    pub multimatch_separator: Option<char>,
    /// Maximum number of did-you-mean suggestions.
    pub max_suggestions: usize,
    /// Maximum edit distance for a suggestion.
    pub suggestion_distance: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            prefix_matching: true,
            min_prefix_len: 1,
            multimatch_separator: Some('-'),
            max_suggestions: 3,
            suggestion_distance: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Which stage produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    Key,
    Alias,
    Numbered,
    Prefix,
}

/// A successful resolution.
#[derive(Debug, Clone)]
pub struct Match {
    pub command: Arc<CommandDescriptor>,
    /// The normalized text that matched (a key, an alias or a prefix).
    pub matched: String,
    pub kind: MatchKind,
    /// Input after the matched command words, leading whitespace removed.
    pub args: String,
}

/// Outcome of resolving one line of input.
#[derive(Debug, Clone)]
pub enum Resolution {
    Matched(Match),
    NoMatch,
    /// Candidate keys in merged-set order.
    Ambiguous(Vec<String>),
}

impl Resolution {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched(_))
    }

    /// The matched command, if any.
    pub fn command(&self) -> Option<&Arc<CommandDescriptor>> {
        match self {
            Self::Matched(m) => Some(&m.command),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Visibility
// ---------------------------------------------------------------------------

/// Entries of `set` the actor passes the access rule for, in merged order.
///
/// The oracle is consulted exactly once per entry.
pub fn visible<'a, O>(set: &'a CommandSet, actor: ActorId, oracle: &O) -> Vec<&'a SetEntry>
where
    O: PermissionOracle + ?Sized,
{
    set.entries()
        .iter()
        .filter(|entry| oracle.permits(actor, entry.command().access()))
        .collect()
}

/// Visible, auto-help commands grouped by help category, keys in merged order.
pub fn help_index<O>(set: &CommandSet, actor: ActorId, oracle: &O) -> BTreeMap<String, Vec<String>>
where
    O: PermissionOracle + ?Sized,
{
    let mut index: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for entry in visible(set, actor, oracle) {
        let command = entry.command();
        if command.auto_help() {
            index
                .entry(command.help_category().to_owned())
                .or_default()
                .push(command.key().to_owned());
        }
    }
    index
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Resolves typed input against a merged command set.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `input` for `actor` against `merged`.
    ///
    /// Blank input is a plain [`Resolution::NoMatch`].
    pub fn resolve<O>(
        &self,
        input: &str,
        merged: &CommandSet,
        actor: ActorId,
        oracle: &O,
    ) -> Resolution
    where
        O: PermissionOracle + ?Sized,
    {
        let visible = visible(merged, actor, oracle);
        let resolution = self.resolve_visible(input, &visible);
        tracing::trace!(
            %actor,
            input,
            outcome = match &resolution {
                Resolution::Matched(_) => "matched",
                Resolution::NoMatch => "no-match",
                Resolution::Ambiguous(_) => "ambiguous",
            },
            "input resolved"
        );
        resolution
    }

    fn resolve_visible(&self, input: &str, visible: &[&SetEntry]) -> Resolution {
        let words: Vec<&str> = input.split_whitespace().collect();
        let Some(&first) = words.first() else {
            return Resolution::NoMatch;
        };

        let longest = visible
            .iter()
            .flat_map(|entry| entry.command().names())
            .map(|name| name.split(' ').count())
            .max()
            .unwrap_or(1)
            .min(words.len());

        // Every key span is tried before any alias span.
        for kind in [MatchKind::Key, MatchKind::Alias] {
            for span in (1..=longest).rev() {
                let name = normalize_name(&words[..span].join(" "));
                let hit = match kind {
                    MatchKind::Key => exact_key(visible, &name),
                    _ => exact_alias(visible, &name),
                };
                if let Some(entry) = hit {
                    return matched(entry, name, kind, remainder_after(input, span));
                }
            }
        }

        let word = normalize_name(first);
        let args = remainder_after(input, 1);

        if let Some(resolution) = self.numbered(visible, &word, &args) {
            return resolution;
        }

        let candidates = self.prefix_candidates(visible, &word);
        match candidates.as_slice() {
            [] => Resolution::NoMatch,
            [only] => matched(only, word, MatchKind::Prefix, args),
            many => Resolution::Ambiguous(many.iter().map(|e| e.key().to_owned()).collect()),
        }
    }

    /// `N-word`: pick the N-th (1-based) candidate `word` would produce.
    fn numbered(&self, visible: &[&SetEntry], word: &str, args: &str) -> Option<Resolution> {
        let separator = self.config.multimatch_separator?;
        let (index, name) = word.split_once(separator)?;
        let index: usize = index.parse().ok()?;
        if name.is_empty() {
            return None;
        }

        let mut candidates = self.prefix_candidates(visible, name);
        if let Some(entry) = exact(visible, name) {
            candidates = vec![entry];
        }

        let resolution = match index.checked_sub(1).and_then(|i| candidates.get(i)) {
            Some(entry) => matched(entry, name.to_owned(), MatchKind::Numbered, args.to_owned()),
            None => Resolution::NoMatch,
        };
        Some(resolution)
    }

    fn prefix_candidates<'a>(&self, visible: &[&'a SetEntry], word: &str) -> Vec<&'a SetEntry> {
        if !self.config.prefix_matching || word.chars().count() < self.config.min_prefix_len {
            return Vec::new();
        }
        visible
            .iter()
            .copied()
            .filter(|entry| entry.command().names().any(|name| name.starts_with(word)))
            .collect()
    }

    /// Visible names close to the command word, closest first.
    pub fn suggest<O>(
        &self,
        input: &str,
        merged: &CommandSet,
        actor: ActorId,
        oracle: &O,
    ) -> Vec<String>
    where
        O: PermissionOracle + ?Sized,
    {
        let Some(first) = input.split_whitespace().next() else {
            return Vec::new();
        };
        let word = normalize_name(first);

        let mut scored: Vec<(usize, usize, &str)> = Vec::new();
        for (pos, entry) in visible(merged, actor, oracle).into_iter().enumerate() {
            let best = entry
                .command()
                .names()
                .map(|name| (edit_distance(&word, name), name))
                .min_by_key(|(distance, _)| *distance);
            if let Some((distance, name)) = best {
                if distance > 0 && distance <= self.config.suggestion_distance {
                    scored.push((distance, pos, name));
                }
            }
        }

        scored.sort_unstable();
        scored
            .into_iter()
            .take(self.config.max_suggestions)
            .map(|(_, _, name)| name.to_owned())
            .collect()
    }
}

fn exact_key<'a>(visible: &[&'a SetEntry], name: &str) -> Option<&'a SetEntry> {
    visible.iter().copied().find(|entry| entry.key() == name)
}

fn exact_alias<'a>(visible: &[&'a SetEntry], name: &str) -> Option<&'a SetEntry> {
    visible
        .iter()
        .copied()
        .find(|entry| entry.command().aliases().any(|alias| alias == name))
}

fn exact<'a>(visible: &[&'a SetEntry], name: &str) -> Option<&'a SetEntry> {
    exact_key(visible, name).or_else(|| exact_alias(visible, name))
}

fn matched(entry: &SetEntry, matched: String, kind: MatchKind, args: String) -> Resolution {
    Resolution::Matched(Match {
        command: Arc::clone(entry.command()),
        matched,
        kind,
        args,
    })
}

/// What follows the first `words` whitespace-separated words of `input`.
fn remainder_after(input: &str, words: usize) -> String {
    let mut rest = input.trim_start();
    for _ in 0..words {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest = rest[end..].trim_start();
    }
    rest.to_owned()
}

/// Levenshtein distance over chars.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{AccessRule, AllowAll};

    fn merged(commands: Vec<CommandDescriptor>) -> CommandSet {
        commands
            .into_iter()
            .fold(CommandSet::builder("merged"), |b, c| b.command(c))
            .build()
            .unwrap()
    }

    fn actor() -> ActorId {
        ActorId::new(1)
    }

    fn resolve(set: &CommandSet, input: &str) -> Resolution {
        Resolver::default().resolve(input, set, actor(), &AllowAll)
    }

    fn key_of(resolution: &Resolution) -> Option<&str> {
        resolution.command().map(|c| c.key())
    }

    #[test]
    fn exact_key_alias_and_args() {
        let set = merged(vec![
            CommandDescriptor::new("look").with_alias("l"),
            CommandDescriptor::new("get"),
        ]);

        match resolve(&set, "  LOOK   at the  sky ") {
            Resolution::Matched(m) => {
                assert_eq!(m.command.key(), "look");
                assert_eq!(m.kind, MatchKind::Key);
                assert_eq!(m.args, "at the  sky ");
            }
            other => panic!("expected match, got {other:?}"),
        }

        match resolve(&set, "l") {
            Resolution::Matched(m) => {
                assert_eq!(m.command.key(), "look");
                assert_eq!(m.kind, MatchKind::Alias);
                assert_eq!(m.args, "");
            }
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[test]
    fn exact_beats_prefix() {
        let set = merged(vec![CommandDescriptor::new("go"), CommandDescriptor::new("gossip")]);
        assert_eq!(key_of(&resolve(&set, "go north")), Some("go"));
    }

    #[test]
    fn ambiguous_prefix_lists_candidates_in_merged_order() {
        let set = merged(vec![CommandDescriptor::new("look"), CommandDescriptor::new("locate")]);
        match resolve(&set, "lo") {
            Resolution::Ambiguous(keys) => assert_eq!(keys, vec!["locate", "look"]),
            other => panic!("expected ambiguity, got {other:?}"),
        }
        assert_eq!(key_of(&resolve(&set, "loo")), Some("look"));
    }

    #[test]
    fn blank_and_unknown_input_is_no_match() {
        let set = merged(vec![CommandDescriptor::new("look")]);
        assert!(matches!(resolve(&set, ""), Resolution::NoMatch));
        assert!(matches!(resolve(&set, "   \t "), Resolution::NoMatch));
        assert!(matches!(resolve(&set, "dance"), Resolution::NoMatch));
    }

    #[test]
    fn multi_word_keys_prefer_longest() {
        let set = merged(vec![
            CommandDescriptor::new("look"),
            CommandDescriptor::new("look at"),
        ]);
        match resolve(&set, "look at fountain") {
            Resolution::Matched(m) => {
                assert_eq!(m.command.key(), "look at");
                assert_eq!(m.args, "fountain");
            }
            other => panic!("expected match, got {other:?}"),
        }
        assert_eq!(key_of(&resolve(&set, "look around")), Some("look"));
    }

    #[test]
    fn short_key_beats_longer_alias() {
        let set = merged(vec![
            CommandDescriptor::new("look"),
            CommandDescriptor::new("examine").with_alias("look at"),
        ]);
        match resolve(&set, "look at me") {
            Resolution::Matched(m) => {
                assert_eq!(m.command.key(), "look");
                assert_eq!(m.kind, MatchKind::Key);
                assert_eq!(m.args, "at me");
            }
            other => panic!("expected match, got {other:?}"),
        }
        assert_eq!(key_of(&resolve(&set, "examine me")), Some("examine"));
    }

    #[test]
    fn numbered_disambiguation() {
        let set = merged(vec![CommandDescriptor::new("look"), CommandDescriptor::new("locate")]);
        assert_eq!(key_of(&resolve(&set, "1-lo")), Some("locate"));
        assert_eq!(key_of(&resolve(&set, "2-lo here")), Some("look"));
        assert!(matches!(resolve(&set, "3-lo"), Resolution::NoMatch));
        assert!(matches!(resolve(&set, "0-lo"), Resolution::NoMatch));
    }

    #[test]
    fn literal_key_with_separator_wins_over_numbering() {
        let set = merged(vec![CommandDescriptor::new("1-up"), CommandDescriptor::new("up")]);
        assert_eq!(key_of(&resolve(&set, "1-up")), Some("1-up"));
    }

    #[test]
    fn numbering_disabled_by_config() {
        let set = merged(vec![CommandDescriptor::new("look"), CommandDescriptor::new("locate")]);
        let resolver = Resolver::new(ResolverConfig {
            multimatch_separator: None,
            ..Default::default()
        });
        assert!(matches!(
            resolver.resolve("1-lo", &set, actor(), &AllowAll),
            Resolution::NoMatch
        ));
    }

    #[test]
    fn prefix_limits_respected() {
        let set = merged(vec![CommandDescriptor::new("inventory")]);
        let strict = Resolver::new(ResolverConfig {
            min_prefix_len: 3,
            ..Default::default()
        });
        assert!(matches!(strict.resolve("in", &set, actor(), &AllowAll), Resolution::NoMatch));
        assert!(strict.resolve("inv", &set, actor(), &AllowAll).is_match());

        let exact_only = Resolver::new(ResolverConfig {
            prefix_matching: false,
            ..Default::default()
        });
        assert!(matches!(exact_only.resolve("inv", &set, actor(), &AllowAll), Resolution::NoMatch));
    }

    #[test]
    fn locked_commands_are_invisible() {
        let set = merged(vec![
            CommandDescriptor::new("look"),
            CommandDescriptor::new("locate").with_access(AccessRule::new("perm(builder)")),
        ]);
        let players = |_: ActorId, rule: &AccessRule| rule.is_open();

        let resolver = Resolver::default();
        let res = resolver.resolve("lo", &set, actor(), &players);
        assert_eq!(key_of(&res), Some("look"));
        assert!(matches!(
            resolver.resolve("locate", &set, actor(), &players),
            Resolution::NoMatch
        ));
        // Still present in the raw set.
        assert!(set.contains("locate"));
    }

    #[test]
    fn oracle_consulted_once_per_command() {
        use std::cell::Cell;

        let set = merged(vec![
            CommandDescriptor::new("look"),
            CommandDescriptor::new("locate"),
            CommandDescriptor::new("get"),
        ]);
        let calls = Cell::new(0);
        let counting = |_: ActorId, _: &AccessRule| {
            calls.set(calls.get() + 1);
            true
        };
        let _ = Resolver::default().resolve("lo", &set, actor(), &counting);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn suggestions_exclude_invisible_and_exact() {
        let set = merged(vec![
            CommandDescriptor::new("look"),
            CommandDescriptor::new("lock").with_access(AccessRule::new("perm(builder)")),
            CommandDescriptor::new("book"),
        ]);
        let players = |_: ActorId, rule: &AccessRule| rule.is_open();
        let suggestions = Resolver::default().suggest("lok", &set, actor(), &players);
        assert_eq!(suggestions, vec!["look", "book"]);
    }

    #[test]
    fn help_index_groups_by_category() {
        let set = merged(vec![
            CommandDescriptor::new("look"),
            CommandDescriptor::new("say").with_help_category("comms"),
            CommandDescriptor::new("debug").without_auto_help(),
        ]);
        let index = help_index(&set, actor(), &AllowAll);
        assert_eq!(index["general"], vec!["look"]);
        assert_eq!(index["comms"], vec!["say"]);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn edit_distance_basics() {
        assert_eq!(edit_distance("look", "look"), 0);
        assert_eq!(edit_distance("lok", "look"), 1);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
    }
}
