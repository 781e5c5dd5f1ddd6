//! LR(0) characteristic automaton construction and conflict classification.

use crate::grammar::{Grammar, ProductionId, SymbolId};
use crate::util::{display_fn, Map, Set};
use std::collections::VecDeque;
use std::fmt;

/// A state number. State 0 is the start state.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(u32);

impl StateId {
    pub const START: Self = Self(0);

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S#{:03}", self.0)
    }
}

/// A production with a marked position in its right-hand side.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Item {
    pub production: ProductionId,
    pub dot: u16,
}

impl Item {
    /// The symbol right after the dot, if any.
    pub fn dot_symbol(&self, grammar: &Grammar) -> Option<SymbolId> {
        grammar
            .production(self.production)
            .rhs
            .get(self.dot as usize)
            .copied()
    }

    /// `true` when the dot sits at the end of the right-hand side.
    pub fn is_final(&self, grammar: &Grammar) -> bool {
        grammar.production(self.production).rhs.len() == self.dot as usize
    }

    fn advanced(self) -> Self {
        Self {
            dot: self.dot + 1,
            ..self
        }
    }

    pub fn display<'g>(&self, grammar: &'g Grammar) -> impl fmt::Display + 'g {
        let item = *self;
        display_fn(move |f| {
            let production = grammar.production(item.production);
            write!(f, "{} ->", grammar.symbol_name(production.lhs))?;
            for (i, &sym) in production.rhs.iter().enumerate() {
                if i == item.dot as usize {
                    f.write_str(" .")?;
                }
                write!(f, " {}", grammar.symbol_name(sym))?;
            }
            if item.dot as usize == production.rhs.len() {
                f.write_str(" .")?;
            }
            Ok(())
        })
    }
}

/// Dense ordinal of a nonterminal transition, used to index the look-ahead
/// arrays.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct NtTransId(u32);

impl NtTransId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NtTransId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NT#{:03}", self.0)
    }
}

/// An edge of the automaton.
#[derive(Debug, Copy, Clone)]
pub struct Transition {
    pub source: StateId,
    pub target: StateId,
    pub label: TransitionLabel,
}

#[derive(Debug, Copy, Clone)]
pub enum TransitionLabel {
    /// A shift over a terminal.
    Terminal(SymbolId),
    /// A goto over a nonterminal.
    Nonterminal(SymbolId, NtTransId),
}

impl Transition {
    pub fn symbol(&self) -> SymbolId {
        match self.label {
            TransitionLabel::Terminal(sym) => sym,
            TransitionLabel::Nonterminal(sym, _) => sym,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.label, TransitionLabel::Terminal(_))
    }
}

/// A nonterminal transition, addressed by its [`NtTransId`].
#[derive(Debug, Copy, Clone)]
pub struct NtTransition {
    pub source: StateId,
    pub symbol: SymbolId,
    pub target: StateId,
}

/// One parser configuration: a closed item set plus its edges.
#[derive(Debug)]
pub struct State {
    pub id: StateId,
    /// The closed item set, kernel items first.
    pub items: Vec<Item>,
    /// Outgoing edges; at most one per symbol.
    pub transitions: Vec<Transition>,
    /// States with an edge into this one. Every such edge carries the same
    /// symbol, which makes backward walks over the right-hand side possible.
    pub predecessors: Vec<StateId>,
    /// The dot-at-end items of this state.
    pub final_items: Vec<Item>,
}

impl State {
    pub fn display<'g>(&'g self, grammar: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            writeln!(f, "{:?}:", self.id)?;
            for item in &self.items {
                writeln!(f, "  {}", item.display(grammar))?;
            }
            for t in &self.transitions {
                writeln!(
                    f,
                    "  {} => {:?}",
                    grammar.symbol_name(t.symbol()),
                    t.target
                )?;
            }
            Ok(())
        })
    }
}

/// The LR(0) automaton of a grammar.
#[derive(Debug)]
pub struct Automaton {
    states: Vec<State>,
    nt_transitions: Vec<NtTransition>,
    /// Per nonterminal ordinal, the transitions labeled with it.
    by_nonterminal: Vec<Vec<NtTransId>>,
}

impl Automaton {
    /// Build the automaton from the closure of `{$start -> . S $end}`,
    /// numbering states in discovery order.
    #[tracing::instrument(skip_all)]
    pub fn build(grammar: &Grammar) -> Self {
        let mut automaton = Automaton {
            states: Vec::new(),
            nt_transitions: Vec::new(),
            by_nonterminal: vec![Vec::new(); grammar.num_nonterminals()],
        };
        let mut interned: Map<Vec<Item>, StateId> = Map::default();
        let mut pending = VecDeque::new();

        let start_kernel = vec![Item {
            production: ProductionId::ACCEPT,
            dot: 0,
        }];
        interned.insert(start_kernel.clone(), StateId::START);
        pending.push_back(automaton.add_state(grammar, start_kernel));

        while let Some(current) = pending.pop_front() {
            // Group the advanceable items by their dot symbol, in item order.
            let mut successors: Map<SymbolId, Vec<Item>> = Map::default();
            for item in &automaton.states[current.index()].items {
                if let Some(sym) = item.dot_symbol(grammar) {
                    successors.entry(sym).or_default().push(item.advanced());
                }
            }

            for (sym, mut kernel) in successors {
                kernel.sort_unstable();
                let target = match interned.get(&kernel) {
                    Some(&known) => known,
                    None => {
                        let id = automaton.add_state(grammar, kernel.clone());
                        interned.insert(kernel, id);
                        pending.push_back(id);
                        id
                    }
                };

                let label = if grammar.is_terminal(sym) {
                    TransitionLabel::Terminal(sym)
                } else {
                    let id = NtTransId(automaton.nt_transitions.len() as u32);
                    automaton.nt_transitions.push(NtTransition {
                        source: current,
                        symbol: sym,
                        target,
                    });
                    automaton.by_nonterminal[grammar.nonterminal_index(sym)].push(id);
                    TransitionLabel::Nonterminal(sym, id)
                };
                automaton.states[current.index()].transitions.push(Transition {
                    source: current,
                    target,
                    label,
                });

                let predecessors = &mut automaton.states[target.index()].predecessors;
                if !predecessors.contains(&current) {
                    predecessors.push(current);
                }
            }
        }

        tracing::debug!(
            states = automaton.states.len(),
            nt_transitions = automaton.nt_transitions.len(),
            "built LR(0) automaton",
        );
        automaton
    }

    fn add_state(&mut self, grammar: &Grammar, kernel: Vec<Item>) -> StateId {
        let id = StateId(self.states.len() as u32);
        let items = closure(grammar, kernel);
        let final_items = items.iter().filter(|i| i.is_final(grammar)).copied().collect();
        self.states.push(State {
            id,
            items,
            transitions: Vec::new(),
            predecessors: Vec::new(),
            final_items,
        });
        id
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn state(&self, id: StateId) -> &State {
        &self.states[id.index()]
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn num_nt_transitions(&self) -> usize {
        self.nt_transitions.len()
    }

    pub fn nt_transition(&self, id: NtTransId) -> &NtTransition {
        &self.nt_transitions[id.index()]
    }

    pub fn nt_transitions(&self) -> &[NtTransition] {
        &self.nt_transitions
    }

    /// The nonterminal transitions labeled with the nonterminal of ordinal
    /// `nt_index`.
    pub fn transitions_labeled(&self, nt_index: usize) -> &[NtTransId] {
        &self.by_nonterminal[nt_index]
    }

    /// The nonterminal transition leaving `state` over `nt`, if present.
    pub fn nt_transition_over(&self, state: StateId, nt: SymbolId) -> Option<NtTransId> {
        self.state(state).transitions.iter().find_map(|t| match t.label {
            TransitionLabel::Nonterminal(sym, id) if sym == nt => Some(id),
            _ => None,
        })
    }
}

/// Complete an item set with the predictions of every dot-before-nonterminal
/// item. Idempotent.
pub(crate) fn closure(grammar: &Grammar, kernel: Vec<Item>) -> Vec<Item> {
    let mut items: Set<Item> = kernel.into_iter().collect();
    let mut i = 0;
    while i < items.len() {
        let item = *items.get_index(i).expect("index within bounds");
        if let Some(sym) = item.dot_symbol(grammar) {
            if !grammar.is_terminal(sym) {
                for (id, _) in grammar.productions_of(sym) {
                    items.insert(Item {
                        production: id,
                        dot: 0,
                    });
                }
            }
        }
        i += 1;
    }
    items.into_iter().collect()
}

/// Classification of the automaton states by their conflict potential: a
/// state needs look-ahead refinement when it has several final items, or one
/// final item next to at least one shift.
#[derive(Debug)]
pub struct ConflictMap {
    slots: Vec<Option<u32>>,
    conflict_states: Vec<StateId>,
}

/// Classify every state of the automaton.
pub fn classify(automaton: &Automaton) -> ConflictMap {
    let mut slots = vec![None; automaton.num_states()];
    let mut conflict_states = Vec::new();
    for state in automaton.states() {
        let has_shift = state.transitions.iter().any(Transition::is_terminal);
        let conflicting =
            state.final_items.len() > 1 || (state.final_items.len() == 1 && has_shift);
        if conflicting {
            slots[state.id.index()] = Some(conflict_states.len() as u32);
            conflict_states.push(state.id);
        }
    }
    ConflictMap {
        slots,
        conflict_states,
    }
}

impl ConflictMap {
    /// The look-ahead store slot of a conflict-bearing state.
    pub fn slot(&self, id: StateId) -> Option<usize> {
        self.slots[id.index()].map(|slot| slot as usize)
    }

    pub fn len(&self) -> usize {
        self.conflict_states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conflict_states.is_empty()
    }

    /// The conflict-bearing states, in slot order.
    pub fn states(&self) -> &[StateId] {
        &self.conflict_states
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn two_arms() -> Grammar {
        // S -> a | b
        Grammar::define(|g| {
            let a = g.terminal("A")?;
            let b = g.terminal("B")?;
            let s = g.nonterminal("S")?;
            g.rule(s, [a])?;
            g.rule(s, [b])?;
            Ok(())
        })
        .unwrap()
    }

    #[test]
    fn closure_is_idempotent() {
        let g = two_arms();
        let kernel = vec![Item {
            production: ProductionId::ACCEPT,
            dot: 0,
        }];
        let once = closure(&g, kernel);
        let mut twice = closure(&g, once.clone());
        let mut once = once;
        once.sort_unstable();
        twice.sort_unstable();
        assert_eq!(once, twice);
    }

    #[test]
    fn discovers_all_states() {
        let g = two_arms();
        let automaton = Automaton::build(&g);
        // start, S->a., S->b., $start->S.$end, $start->S$end.
        assert_eq!(automaton.num_states(), 5);
        assert_eq!(automaton.state(StateId::START).items.len(), 3);
        // exactly one goto (over S)
        assert_eq!(automaton.num_nt_transitions(), 1);
        let goto = automaton.nt_transition(automaton.transitions_labeled(1)[0]);
        assert_eq!(goto.source, StateId::START);
        assert_eq!(g.symbol_name(goto.symbol), "S");
    }

    #[test]
    fn shifts_are_deterministic() {
        let g = two_arms();
        let automaton = Automaton::build(&g);
        for state in automaton.states() {
            let mut seen = Vec::new();
            for t in &state.transitions {
                assert!(!seen.contains(&t.symbol()), "duplicate edge in {:?}", state.id);
                seen.push(t.symbol());
            }
        }
    }

    #[test]
    fn predecessors_mirror_transitions() {
        let g = two_arms();
        let automaton = Automaton::build(&g);
        for state in automaton.states() {
            for t in &state.transitions {
                assert!(automaton
                    .state(t.target)
                    .predecessors
                    .contains(&state.id));
            }
        }
    }

    #[test]
    fn classifies_reduce_states_as_clean() {
        let g = two_arms();
        let automaton = Automaton::build(&g);
        let conflicts = classify(&automaton);
        assert!(conflicts.is_empty());
    }

    #[test]
    fn classifies_shift_reduce_potential() {
        // S -> A a | d c ; A -> d : the state after `d` holds a final item
        // next to a shift over `c`.
        let g = Grammar::define(|g| {
            let a = g.terminal("a")?;
            let c = g.terminal("c")?;
            let d = g.terminal("d")?;
            let s = g.nonterminal("S")?;
            let nt_a = g.nonterminal("A")?;
            g.rule(s, [nt_a, a])?;
            g.rule(s, [d, c])?;
            g.rule(nt_a, [d])?;
            Ok(())
        })
        .unwrap();
        let automaton = Automaton::build(&g);
        let conflicts = classify(&automaton);
        assert_eq!(conflicts.len(), 1);
        let state = automaton.state(conflicts.states()[0]);
        assert_eq!(state.final_items.len(), 1);
        assert!(state.transitions.iter().any(Transition::is_terminal));
    }
}
