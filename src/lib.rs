//! An LALR(1) parser table generator.
//!
//! Starting from a context-free [`Grammar`](grammar::Grammar), the processor
//! builds the LR(0) characteristic automaton, classifies the states that
//! need look-ahead refinement, resolves them hierarchically (SLR(1) first,
//! LALR(1) where that is not enough) and emits the dense ACTION/GOTO tables
//! of a deterministic bottom-up parser.
//!
//! ```
//! use lalrkit::{grammar::Grammar, Options};
//!
//! let grammar = Grammar::define(|g| {
//!     let plus = g.terminal("PLUS")?;
//!     let num = g.terminal("NUM")?;
//!     let expr = g.nonterminal("EXPR")?;
//!     g.rule(expr, [expr, plus, num])?;
//!     g.rule(expr, [num])?;
//!     Ok(())
//! })?;
//!
//! let analysis = lalrkit::process(&grammar, &Options::default())?;
//! assert!(analysis.diagnostics().is_empty());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod automaton;
pub mod digraph;
pub mod grammar;
pub mod lookahead;
pub mod nullable;
pub mod sets;
pub mod table;
mod util;

use crate::automaton::{Automaton, ConflictMap, Item, StateId};
use crate::grammar::Grammar;
use crate::lookahead::{LookaheadData, Resolution};
use crate::sets::BitSet;
use crate::table::{Action, ActionTable, GotoTable};
use std::fmt;

/// Options of a processor run.
#[derive(Debug, Default, Copy, Clone)]
pub struct Options {
    /// Skip the SLR(1) pass and compute LALR(1) look-ahead sets for every
    /// state with conflict potential. Slower, but the reported conflicts are
    /// the sharpest ones available.
    pub force_lalr1: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    ShiftReduce,
    ReduceReduce,
}

/// A conflict report attached to one automaton state.
#[derive(Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub state: StateId,
    pub message: String,
    /// The final items taking part in the conflict.
    pub items: Vec<Item>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}: {} in {:?}", severity, self.message, self.state)
    }
}

/// Fatal processing failure. Warnings never abort; the only fatal condition
/// is a reduce/reduce conflict surviving LALR(1) refinement.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("grammar is not LALR(1): reduce/reduce conflicts remain")]
    ReduceReduce { diagnostics: Vec<Diagnostic> },
}

impl ProcessError {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::ReduceReduce { diagnostics } => diagnostics,
        }
    }
}

/// The complete, read-only result of one processor run.
#[derive(Debug)]
pub struct Analysis {
    automaton: Automaton,
    conflicts: ConflictMap,
    nullable: BitSet,
    lookaheads: LookaheadData,
    actions: ActionTable,
    gotos: GotoTable,
    diagnostics: Vec<Diagnostic>,
}

impl Analysis {
    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    pub fn conflicts(&self) -> &ConflictMap {
        &self.conflicts
    }

    /// The nullable nonterminals, as a set over the nonterminal ordinals.
    pub fn nullable(&self) -> &BitSet {
        &self.nullable
    }

    pub fn lookaheads(&self) -> &LookaheadData {
        &self.lookaheads
    }

    pub fn actions(&self) -> &ActionTable {
        &self.actions
    }

    pub fn gotos(&self) -> &GotoTable {
        &self.gotos
    }

    /// The warnings collected during the run.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Per-state resolution stages, indexed by state number.
    pub fn profile(&self) -> &[Resolution] {
        self.lookaheads.profile()
    }

    /// Render the tables state by state, for debugging and conflict reports.
    pub fn display<'a>(&'a self, grammar: &'a Grammar) -> impl fmt::Display + 'a {
        util::display_fn(move |f| {
            for state in self.automaton.states() {
                writeln!(
                    f,
                    "#### {:?} ({:?})",
                    state.id,
                    self.profile()[state.id.index()]
                )?;
                for terminal in grammar.terminals() {
                    match self.actions.get(state.id, terminal) {
                        Action::Fail => {}
                        Action::Shift(target) => writeln!(
                            f,
                            "- {} => shift({:?})",
                            grammar.symbol_name(terminal),
                            target
                        )?,
                        Action::Reduce(p) => writeln!(
                            f,
                            "- {} => reduce({})",
                            grammar.symbol_name(terminal),
                            grammar.production(p).display(grammar)
                        )?,
                    }
                }
                for nonterminal in grammar.nonterminals() {
                    if let Some(target) = self.gotos.get(state.id, nonterminal) {
                        writeln!(
                            f,
                            "- {} => goto({:?})",
                            grammar.symbol_name(nonterminal),
                            target
                        )?;
                    }
                }
            }
            Ok(())
        })
    }
}

/// Run the whole pipeline over `grammar`.
///
/// On success the returned [`Analysis`] carries the tables together with the
/// shift/reduce warnings; a reduce/reduce conflict aborts before table
/// emission and no partial tables escape.
#[tracing::instrument(skip_all)]
pub fn process(grammar: &Grammar, options: &Options) -> Result<Analysis, ProcessError> {
    let automaton = Automaton::build(grammar);

    let conflicts = automaton::classify(&automaton);
    tracing::debug!(
        "{} of {} states need look-ahead refinement",
        conflicts.len(),
        automaton.num_states(),
    );

    let nullable = nullable::nullable_set(grammar);

    let (lookaheads, diagnostics) =
        lookahead::compute(grammar, &automaton, &nullable, &conflicts, options);
    if diagnostics.iter().any(|d| d.severity == Severity::Error) {
        return Err(ProcessError::ReduceReduce { diagnostics });
    }

    let (actions, gotos) = table::generate(grammar, &automaton, &conflicts, &lookaheads);

    Ok(Analysis {
        automaton,
        conflicts,
        nullable,
        lookaheads,
        actions,
        gotos,
        diagnostics,
    })
}
