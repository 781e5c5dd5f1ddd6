//! SLR(1) and LALR(1) look-ahead computation.
//!
//! The LALR(1) sets follow DeRemer and Pennello, "Efficient Computation of
//! LALR(1) Look-Ahead Sets" <https://dl.acm.org/doi/10.1145/69622.357187>.
//! For a nonterminal transition `(p,A)`:
//!
//! - `DirectRead(p,A) := { t | p --(A)--> r --(t)--> ... }`
//! - `(p,A) reads (r,C)    <=> p --(A)--> r --(C)--> ... && C =>* ε`
//! - `(p,A) includes (p',B) <=> B -> β A γ, γ =>* ε, p' --(β)--> p`
//! - `(q, A -> ω .) lookback (p,A) <=> p --(ω)--> q`
//!
//! `Read` is the closure of `DirectRead` under *reads*, `Follow` the closure
//! of `Read` under *includes*, and the look-ahead set of a reduction is the
//! union of `Follow` over its *lookback* transitions. The cheaper SLR(1)
//! approximation collapses the per-transition `Follow` into one set per
//! nonterminal and is attempted first; only the states it leaves unresolved
//! pay for the exact computation.

use crate::automaton::{Automaton, ConflictMap, Item, NtTransId, StateId, TransitionLabel};
use crate::grammar::{Grammar, SymbolId};
use crate::nullable::all_nullable;
use crate::sets::BitSet;
use crate::util::Set;
use crate::{digraph, Diagnostic, DiagnosticKind, Options, Severity};

/// The stage at which a state's conflicts were resolved.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No conflict potential; every reduction is unconditional.
    Lr0,
    /// Resolved by the SLR(1) follow sets.
    Slr1,
    /// Resolved by the LALR(1) follow sets.
    Lalr1,
    /// Genuinely conflicting under LALR(1) look-ahead.
    Unresolved,
}

/// The look-ahead sets of one conflict-bearing state, parallel to the
/// state's final items.
#[derive(Debug)]
pub struct LookaheadEntry {
    pub state: StateId,
    pub items: Vec<Item>,
    pub sets: Vec<BitSet>,
}

/// Everything the look-ahead stage computed, kept for the table emitter and
/// for external conflict reporters.
#[derive(Debug)]
pub struct LookaheadData {
    entries: Vec<LookaheadEntry>,
    direct_read: Vec<BitSet>,
    read: Vec<BitSet>,
    follow: Option<Vec<BitSet>>,
    profile: Vec<Resolution>,
}

impl LookaheadData {
    /// Per-state resolution stages, indexed by state number.
    pub fn profile(&self) -> &[Resolution] {
        &self.profile
    }

    /// The per-conflict-state look-ahead entries, in slot order.
    pub fn entries(&self) -> &[LookaheadEntry] {
        &self.entries
    }

    pub fn entry(&self, slot: usize) -> &LookaheadEntry {
        &self.entries[slot]
    }

    /// `DirectRead` per nonterminal transition. Empty when the grammar had no
    /// conflict potential and the stage was skipped.
    pub fn direct_read(&self) -> &[BitSet] {
        &self.direct_read
    }

    /// `Read` per nonterminal transition. Empty when the stage was skipped.
    pub fn read(&self) -> &[BitSet] {
        &self.read
    }

    /// `Follow` per nonterminal transition, when the LALR(1) pass ran.
    pub fn follow(&self) -> Option<&[BitSet]> {
        self.follow.as_deref()
    }
}

/// Compute look-ahead sets for every conflict-bearing state and classify
/// whatever conflicts remain.
#[tracing::instrument(skip_all)]
pub(crate) fn compute(
    grammar: &Grammar,
    automaton: &Automaton,
    nullable: &BitSet,
    conflicts: &ConflictMap,
    options: &Options,
) -> (LookaheadData, Vec<Diagnostic>) {
    let mut profile = vec![Resolution::Lr0; automaton.num_states()];
    for &state in conflicts.states() {
        profile[state.index()] = Resolution::Unresolved;
    }

    let mut entries: Vec<LookaheadEntry> = conflicts
        .states()
        .iter()
        .map(|&state| LookaheadEntry {
            state,
            items: automaton.state(state).final_items.clone(),
            sets: Vec::new(),
        })
        .collect();

    // A conflict-free grammar never pays for look-ahead computation.
    if entries.is_empty() && !options.force_lalr1 {
        return (
            LookaheadData {
                entries,
                direct_read: Vec::new(),
                read: Vec::new(),
                follow: None,
                profile,
            },
            Vec::new(),
        );
    }

    let num_transitions = automaton.num_nt_transitions();
    let direct_read: Vec<BitSet> = (0..num_transitions)
        .map(|t| direct_read_of(grammar, automaton, t))
        .collect();

    // Read(p,A) = DirectRead(p,A) ∪ ⋃ { Read(r,C) | (p,A) reads (r,C) }
    let read = digraph::digraph(
        num_transitions,
        |t| direct_read[t].clone(),
        |t| reads_successors(grammar, automaton, nullable, t),
    );

    let mut resolved = vec![false; entries.len()];

    if !options.force_lalr1 {
        // SLRFollow(B) = ⋃ { Read(p,B) } ∪ ⋃ { SLRFollow(X) | B slr-follows X }
        let edges = slr_follows_edges(grammar, nullable);
        let slr_follow = digraph::digraph(
            grammar.num_nonterminals(),
            |n| {
                let mut set = BitSet::new(grammar.num_terminals());
                for &t in automaton.transitions_labeled(n) {
                    set.union_with(&read[t.index()]);
                }
                set
            },
            |n| edges[n].clone(),
        );

        for (slot, entry) in entries.iter_mut().enumerate() {
            entry.sets = entry
                .items
                .iter()
                .map(|&item| {
                    let lhs = grammar.production(item.production).lhs;
                    slr_follow[grammar.nonterminal_index(lhs)].clone()
                })
                .collect();
            if entry_is_consistent(grammar, automaton, entry) {
                resolved[slot] = true;
                profile[entry.state.index()] = Resolution::Slr1;
            }
        }
        tracing::debug!(
            resolved = resolved.iter().filter(|r| **r).count(),
            conflicting = entries.len(),
            "SLR(1) pass",
        );
    }

    let mut follow = None;
    if options.force_lalr1 || resolved.iter().any(|r| !r) {
        // Follow(p,A) = Read(p,A) ∪ ⋃ { Follow(p',B) | (p,A) includes (p',B) }
        let includes = includes_edges(grammar, automaton, nullable);
        let follow_sets = digraph::digraph(
            num_transitions,
            |t| read[t].clone(),
            |t| includes[t].clone(),
        );

        for (slot, entry) in entries.iter_mut().enumerate() {
            if resolved[slot] {
                continue;
            }
            // LA(q, A -> ω .) = ⋃ { Follow(p,A) | (q, A -> ω .) lookback (p,A) }
            entry.sets = entry
                .items
                .iter()
                .map(|&item| {
                    let mut set = BitSet::new(grammar.num_terminals());
                    for t in lookback(grammar, automaton, entry.state, item) {
                        set.union_with(&follow_sets[t.index()]);
                    }
                    set
                })
                .collect();
            if entry_is_consistent(grammar, automaton, entry) {
                resolved[slot] = true;
                profile[entry.state.index()] = Resolution::Lalr1;
            }
        }
        tracing::debug!(
            unresolved = resolved.iter().filter(|r| !**r).count(),
            "LALR(1) pass",
        );
        follow = Some(follow_sets);
    }

    let mut diagnostics = Vec::new();
    for (slot, entry) in entries.iter().enumerate() {
        if !resolved[slot] {
            diagnose(grammar, automaton, entry, &mut diagnostics);
        }
    }

    (
        LookaheadData {
            entries,
            direct_read,
            read,
            follow,
            profile,
        },
        diagnostics,
    )
}

/// The terminals shifted out of `state`.
fn shift_terminals(grammar: &Grammar, automaton: &Automaton, state: StateId) -> BitSet {
    let mut set = BitSet::new(grammar.num_terminals());
    for t in &automaton.state(state).transitions {
        if let TransitionLabel::Terminal(sym) = t.label {
            set.insert(sym.index());
        }
    }
    set
}

/// A state is consistent when its look-ahead sets are pairwise disjoint and
/// disjoint from its shift terminals.
fn entry_is_consistent(grammar: &Grammar, automaton: &Automaton, entry: &LookaheadEntry) -> bool {
    let shifts = shift_terminals(grammar, automaton, entry.state);
    for (i, set) in entry.sets.iter().enumerate() {
        if !set.is_disjoint(&shifts) {
            return false;
        }
        for other in &entry.sets[i + 1..] {
            if !set.is_disjoint(other) {
                return false;
            }
        }
    }
    true
}

fn direct_read_of(grammar: &Grammar, automaton: &Automaton, t: usize) -> BitSet {
    let target = automaton.nt_transitions()[t].target;
    shift_terminals(grammar, automaton, target)
}

/// `(p,A) reads (r,C)`: the goto transitions over a nullable `C` leaving the
/// target of `(p,A)`.
fn reads_successors(
    grammar: &Grammar,
    automaton: &Automaton,
    nullable: &BitSet,
    t: usize,
) -> Vec<usize> {
    let target = automaton.nt_transitions()[t].target;
    automaton
        .state(target)
        .transitions
        .iter()
        .filter_map(|tr| match tr.label {
            TransitionLabel::Nonterminal(sym, id)
                if nullable.contains(grammar.nonterminal_index(sym)) =>
            {
                Some(id.index())
            }
            _ => None,
        })
        .collect()
}

/// `B slr-follows X` for every production `X -> α B γ` with `γ =>* ε`.
///
/// Walking each right-hand side from its end keeps a running suffix
/// nullability flag; checking any one occurrence with a nullable suffix is
/// enough, the rightmost such occurrence subsumes the others.
fn slr_follows_edges(grammar: &Grammar, nullable: &BitSet) -> Vec<Vec<usize>> {
    let mut edges = vec![Vec::new(); grammar.num_nonterminals()];
    for (_, p) in grammar.productions() {
        let lhs = grammar.nonterminal_index(p.lhs);
        let mut suffix_nullable = true;
        for &sym in p.rhs.iter().rev() {
            if grammar.is_terminal(sym) {
                suffix_nullable = false;
                continue;
            }
            let n = grammar.nonterminal_index(sym);
            if suffix_nullable && n != lhs && !edges[n].contains(&lhs) {
                edges[n].push(lhs);
            }
            suffix_nullable = suffix_nullable && nullable.contains(n);
        }
    }
    edges
}

/// The *includes* relation as an adjacency list over nonterminal transitions.
///
/// For `(p,X)`, every item `B -> β . X γ` of `p` with a nullable `γ` asks for
/// the transitions labeled `B` reachable `|β|` steps backward from `p`. The
/// walks are batched: sorted by distance, the backward frontier is expanded
/// once per distance and matches are collected along the way.
fn includes_edges(grammar: &Grammar, automaton: &Automaton, nullable: &BitSet) -> Vec<Vec<usize>> {
    let mut edges = vec![Vec::new(); automaton.num_nt_transitions()];
    for (t, transition) in automaton.nt_transitions().iter().enumerate() {
        let mut walks: Vec<(usize, SymbolId)> = Vec::new();
        for item in &automaton.state(transition.source).items {
            if item.dot_symbol(grammar) != Some(transition.symbol) {
                continue;
            }
            let production = grammar.production(item.production);
            if !all_nullable(grammar, nullable, &production.rhs[item.dot as usize + 1..]) {
                continue;
            }
            walks.push((item.dot as usize, production.lhs));
        }
        walks.sort_unstable();
        walks.dedup();

        let mut frontier = vec![transition.source];
        let mut distance = 0;
        for (d, lhs) in walks {
            while distance < d {
                frontier = step_back(automaton, &frontier);
                distance += 1;
            }
            for &state in &frontier {
                if let Some(id) = automaton.nt_transition_over(state, lhs) {
                    edges[t].push(id.index());
                }
            }
        }
        edges[t].sort_unstable();
        edges[t].dedup();
    }
    edges
}

/// The transitions `(p,A)` with `p --(ω)--> state` for a final item
/// `A -> ω .` of `state`.
///
/// Every edge into a state carries that state's single entry symbol, so
/// walking `|ω|` steps backward over predecessor edges retraces exactly the
/// paths spelling `ω`.
pub fn lookback(
    grammar: &Grammar,
    automaton: &Automaton,
    state: StateId,
    item: Item,
) -> Vec<NtTransId> {
    let production = grammar.production(item.production);
    debug_assert_eq!(item.dot as usize, production.rhs.len());
    let mut frontier = vec![state];
    for _ in 0..production.rhs.len() {
        frontier = step_back(automaton, &frontier);
    }
    frontier
        .iter()
        .filter_map(|&p| automaton.nt_transition_over(p, production.lhs))
        .collect()
}

fn step_back(automaton: &Automaton, frontier: &[StateId]) -> Vec<StateId> {
    let mut next: Set<StateId> = Set::default();
    for &state in frontier {
        next.extend(automaton.state(state).predecessors.iter().copied());
    }
    next.into_iter().collect()
}

/// Report the conflicts surviving look-ahead refinement: overlapping
/// reductions are fatal, shift overlaps only warn because the shift wins.
fn diagnose(
    grammar: &Grammar,
    automaton: &Automaton,
    entry: &LookaheadEntry,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let mut overlapping = Vec::new();
    for (i, a) in entry.sets.iter().enumerate() {
        for (j, b) in entry.sets.iter().enumerate().skip(i + 1) {
            if !a.is_disjoint(b) {
                for &k in &[i, j] {
                    if !overlapping.contains(&entry.items[k]) {
                        overlapping.push(entry.items[k]);
                    }
                }
            }
        }
    }
    if !overlapping.is_empty() {
        let described = overlapping
            .iter()
            .map(|item| format!("`{}`", item.display(grammar)))
            .collect::<Vec<_>>()
            .join(" and ");
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            kind: DiagnosticKind::ReduceReduce,
            state: entry.state,
            message: format!("reduce/reduce conflict between {}", described),
            items: overlapping,
        });
    }

    let shifts = shift_terminals(grammar, automaton, entry.state);
    for terminal in shifts.iter() {
        let involved: Vec<Item> = entry
            .items
            .iter()
            .zip(&entry.sets)
            .filter(|(_, set)| set.contains(terminal))
            .map(|(&item, _)| item)
            .collect();
        if involved.is_empty() {
            continue;
        }
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            kind: DiagnosticKind::ShiftReduce,
            state: entry.state,
            message: format!(
                "shift/reduce conflict on `{}` (the shift wins)",
                grammar.symbol_name(SymbolId::from_raw(terminal as u16)),
            ),
            items: involved,
        });
    }
}
