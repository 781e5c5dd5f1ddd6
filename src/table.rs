//! ACTION/GOTO table emission.

use crate::automaton::{Automaton, ConflictMap, StateId, TransitionLabel};
use crate::grammar::{Grammar, ProductionId, SymbolId};
use crate::lookahead::LookaheadData;

/// The move of the generated parser on one `(state, terminal)` cell.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    /// Reject the look-ahead terminal.
    Fail,
    /// Consume the terminal and enter the state.
    Shift(StateId),
    /// Reduce by the production.
    Reduce(ProductionId),
}

/// Dense `state × terminal` dispatch table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionTable {
    num_terminals: usize,
    cells: Vec<Action>,
}

impl ActionTable {
    fn new(num_states: usize, num_terminals: usize) -> Self {
        Self {
            num_terminals,
            cells: vec![Action::Fail; num_states * num_terminals],
        }
    }

    pub fn get(&self, state: StateId, terminal: SymbolId) -> Action {
        assert!(
            terminal.index() < self.num_terminals,
            "symbol {:?} is not a terminal",
            terminal,
        );
        self.cells[state.index() * self.num_terminals + terminal.index()]
    }

    /// The row of a state, indexed by terminal code.
    pub fn row(&self, state: StateId) -> &[Action] {
        let offset = state.index() * self.num_terminals;
        &self.cells[offset..offset + self.num_terminals]
    }

    fn set(&mut self, state: StateId, terminal: usize, action: Action) {
        self.cells[state.index() * self.num_terminals + terminal] = action;
    }
}

/// Dense `state × nonterminal` successor table; empty cells mean the
/// nonterminal can never be reduced in that state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GotoTable {
    num_terminals: usize,
    num_nonterminals: usize,
    cells: Vec<Option<StateId>>,
}

impl GotoTable {
    fn new(num_states: usize, num_terminals: usize, num_nonterminals: usize) -> Self {
        Self {
            num_terminals,
            num_nonterminals,
            cells: vec![None; num_states * num_nonterminals],
        }
    }

    pub fn get(&self, state: StateId, nonterminal: SymbolId) -> Option<StateId> {
        assert!(
            nonterminal.index() >= self.num_terminals,
            "symbol {:?} is not a nonterminal",
            nonterminal,
        );
        let n = nonterminal.index() - self.num_terminals;
        self.cells[state.index() * self.num_nonterminals + n]
    }

    fn set(&mut self, state: StateId, nt_index: usize, target: StateId) {
        self.cells[state.index() * self.num_nonterminals + nt_index] = Some(target);
    }
}

/// Materialize both tables.
///
/// Reduce cells are written first; terminal transitions then overwrite them,
/// which implements the shift-wins policy for the surviving shift/reduce
/// conflicts. A state without conflict potential reduces its sole final item
/// on every terminal.
#[tracing::instrument(skip_all)]
pub(crate) fn generate(
    grammar: &Grammar,
    automaton: &Automaton,
    conflicts: &ConflictMap,
    lookaheads: &LookaheadData,
) -> (ActionTable, GotoTable) {
    let mut actions = ActionTable::new(automaton.num_states(), grammar.num_terminals());
    let mut gotos = GotoTable::new(
        automaton.num_states(),
        grammar.num_terminals(),
        grammar.num_nonterminals(),
    );

    for state in automaton.states() {
        match conflicts.slot(state.id) {
            Some(slot) => {
                let entry = lookaheads.entry(slot);
                for (item, set) in entry.items.iter().zip(&entry.sets) {
                    for terminal in set.iter() {
                        actions.set(state.id, terminal, Action::Reduce(item.production));
                    }
                }
            }
            None => {
                if let Some(item) = state.final_items.first() {
                    for terminal in 0..grammar.num_terminals() {
                        actions.set(state.id, terminal, Action::Reduce(item.production));
                    }
                }
            }
        }

        for transition in &state.transitions {
            match transition.label {
                TransitionLabel::Terminal(sym) => {
                    actions.set(state.id, sym.index(), Action::Shift(transition.target));
                }
                TransitionLabel::Nonterminal(sym, _) => {
                    gotos.set(
                        state.id,
                        grammar.nonterminal_index(sym),
                        transition.target,
                    );
                }
            }
        }
    }

    (actions, gotos)
}
