//! Grammar definitions.
//!
//! A [`Grammar`] is the read-only input of the processor: a packed symbol
//! space, the production list grouped by left-hand side, and the start
//! symbol. Symbol codes index a single space where the terminals come first:
//! code `0` is the end-of-input marker `$end`, the codes below
//! `num_terminals` are the terminals, the code `num_terminals` is the
//! synthetic start symbol `$start` and the remaining codes are the
//! nonterminals.

use crate::util::display_fn;
use std::fmt;

/// A symbol code.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u16);

impl SymbolId {
    /// The end-of-input marker `$end`.
    pub const END: Self = Self(0);

    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn into_raw(self) -> u16 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            &Self::END => f.write_str("$end"),
            Self(raw) => write!(f, "Sym#{:03}", raw),
        }
    }
}

/// A production code. Codes follow the packed production order, so
/// [`ProductionId::ACCEPT`] always refers to `$start -> S $end`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductionId(u16);

impl ProductionId {
    /// The synthetic start production.
    pub const ACCEPT: Self = Self(0);

    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ProductionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            &Self::ACCEPT => f.write_str("P#Accept"),
            Self(raw) => write!(f, "P#{:03}", raw),
        }
    }
}

/// A single production rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    pub lhs: SymbolId,
    pub rhs: Vec<SymbolId>,
}

impl Production {
    pub fn display<'g>(&'g self, grammar: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            write!(f, "{} ->", grammar.symbol_name(self.lhs))?;
            if self.rhs.is_empty() {
                f.write_str(" ε")?;
            }
            for &sym in &self.rhs {
                write!(f, " {}", grammar.symbol_name(sym))?;
            }
            Ok(())
        })
    }
}

/// A context-free grammar in packed form.
#[derive(Debug)]
pub struct Grammar {
    symbol_names: Vec<String>,
    num_terminals: usize,
    start_symbol: SymbolId,
    /// Grouped by left-hand side; `productions[0]` is `$start -> S $end`.
    productions: Vec<Production>,
    /// `first_production[n]..first_production[n + 1]` is the production range
    /// of the nonterminal with ordinal `n`.
    first_production: Vec<u32>,
}

impl Grammar {
    /// Define a grammar using the specified function.
    ///
    /// All terminals must be declared before the first nonterminal so that
    /// every handed-out [`SymbolId`] is already its final code.
    pub fn define<F>(f: F) -> Result<Self, GrammarDefError>
    where
        F: FnOnce(&mut GrammarDef) -> Result<(), GrammarDefError>,
    {
        let mut def = GrammarDef {
            names: vec!["$end".to_owned()],
            num_terminals: None,
            rules: Vec::new(),
            start: None,
        };
        f(&mut def)?;
        def.end()
    }

    pub fn num_terminals(&self) -> usize {
        self.num_terminals
    }

    pub fn num_symbols(&self) -> usize {
        self.symbol_names.len()
    }

    pub fn num_nonterminals(&self) -> usize {
        self.num_symbols() - self.num_terminals
    }

    pub fn num_productions(&self) -> usize {
        self.productions.len()
    }

    pub fn is_terminal(&self, sym: SymbolId) -> bool {
        sym.index() < self.num_terminals
    }

    /// The dense ordinal of a nonterminal; `$start` has ordinal 0.
    pub fn nonterminal_index(&self, sym: SymbolId) -> usize {
        debug_assert!(!self.is_terminal(sym));
        sym.index() - self.num_terminals
    }

    pub fn nonterminal_at(&self, index: usize) -> SymbolId {
        debug_assert!(index < self.num_nonterminals());
        SymbolId((self.num_terminals + index) as u16)
    }

    /// The user-declared start symbol.
    pub fn start_symbol(&self) -> SymbolId {
        self.start_symbol
    }

    pub fn symbol_name(&self, sym: SymbolId) -> &str {
        &self.symbol_names[sym.index()]
    }

    pub fn terminals(&self) -> impl Iterator<Item = SymbolId> + '_ {
        (0..self.num_terminals).map(|i| SymbolId(i as u16))
    }

    pub fn nonterminals(&self) -> impl Iterator<Item = SymbolId> + '_ {
        (self.num_terminals..self.num_symbols()).map(|i| SymbolId(i as u16))
    }

    pub fn production(&self, id: ProductionId) -> &Production {
        &self.productions[id.index()]
    }

    pub fn productions(&self) -> impl Iterator<Item = (ProductionId, &Production)> + '_ {
        self.productions
            .iter()
            .enumerate()
            .map(|(i, p)| (ProductionId(i as u16), p))
    }

    /// The productions whose left-hand side is `nt`, in declaration order.
    pub fn productions_of(
        &self,
        nt: SymbolId,
    ) -> impl Iterator<Item = (ProductionId, &Production)> + '_ {
        let n = self.nonterminal_index(nt);
        let range = self.first_production[n] as usize..self.first_production[n + 1] as usize;
        range.map(|i| (ProductionId(i as u16), &self.productions[i]))
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "terminals:")?;
        for t in self.terminals() {
            write!(f, " {}", self.symbol_name(t))?;
        }
        write!(f, "\nnonterminals:")?;
        for n in self.nonterminals() {
            write!(f, " {}", self.symbol_name(n))?;
        }
        writeln!(f, "\nstart: {}", self.symbol_name(self.start_symbol))?;
        writeln!(f, "productions:")?;
        for (id, p) in self.productions() {
            writeln!(f, "  [{:?}] {}", id, p.display(self))?;
        }
        Ok(())
    }
}

/// The contextual values for building a [`Grammar`].
#[derive(Debug)]
pub struct GrammarDef {
    names: Vec<String>,
    /// Set once the first nonterminal is declared; freezes the terminal space.
    num_terminals: Option<usize>,
    rules: Vec<(SymbolId, Vec<SymbolId>)>,
    start: Option<SymbolId>,
}

impl GrammarDef {
    /// Declare a terminal symbol.
    pub fn terminal(&mut self, name: &str) -> Result<SymbolId, GrammarDefError> {
        if self.num_terminals.is_some() {
            return Err(GrammarDefError::TerminalAfterNonterminal(name.to_owned()));
        }
        self.declare(name)
    }

    /// Declare a nonterminal symbol.
    pub fn nonterminal(&mut self, name: &str) -> Result<SymbolId, GrammarDefError> {
        if self.num_terminals.is_none() {
            self.num_terminals = Some(self.names.len());
            self.names.push("$start".to_owned());
        }
        self.declare(name)
    }

    /// Add a production rule.
    pub fn rule<I>(&mut self, lhs: SymbolId, rhs: I) -> Result<(), GrammarDefError>
    where
        I: IntoIterator<Item = SymbolId>,
    {
        self.check_nonterminal(lhs)?;
        let rhs: Vec<SymbolId> = rhs.into_iter().collect();
        for &sym in &rhs {
            if sym.index() >= self.names.len() {
                return Err(GrammarDefError::UnknownSymbol(sym));
            }
        }
        if self.rules.iter().any(|(l, r)| *l == lhs && *r == rhs) {
            return Err(GrammarDefError::DuplicateRule(
                self.names[lhs.index()].clone(),
            ));
        }
        self.rules.push((lhs, rhs));
        Ok(())
    }

    /// Select the start symbol. Defaults to the first declared nonterminal.
    pub fn start_symbol(&mut self, sym: SymbolId) -> Result<(), GrammarDefError> {
        self.check_nonterminal(sym)?;
        self.start.replace(sym);
        Ok(())
    }

    fn declare(&mut self, name: &str) -> Result<SymbolId, GrammarDefError> {
        if self.names.iter().any(|n| n == name) {
            return Err(GrammarDefError::DuplicateSymbol(name.to_owned()));
        }
        assert!(self.names.len() < u16::MAX as usize, "too many symbols");
        let id = SymbolId(self.names.len() as u16);
        self.names.push(name.to_owned());
        Ok(id)
    }

    fn check_nonterminal(&self, sym: SymbolId) -> Result<(), GrammarDefError> {
        let user_nonterminal = self
            .num_terminals
            .map_or(false, |nt| sym.index() > nt && sym.index() < self.names.len());
        if !user_nonterminal {
            return Err(GrammarDefError::NotANonterminal(sym));
        }
        Ok(())
    }

    fn end(self) -> Result<Grammar, GrammarDefError> {
        let num_terminals = self
            .num_terminals
            .ok_or(GrammarDefError::NoNonterminals)?;
        let num_nonterminals = self.names.len() - num_terminals;
        let start = match self.start {
            Some(start) => start,
            None => SymbolId((num_terminals + 1) as u16),
        };

        let mut productions = vec![Production {
            lhs: SymbolId(num_terminals as u16),
            rhs: vec![start, SymbolId::END],
        }];
        let mut first_production = vec![0u32; num_nonterminals + 1];
        first_production[1] = 1;
        for n in 1..num_nonterminals {
            let lhs = SymbolId((num_terminals + n) as u16);
            for (l, r) in &self.rules {
                if *l == lhs {
                    productions.push(Production {
                        lhs,
                        rhs: r.clone(),
                    });
                }
            }
            if productions.len() == first_production[n] as usize {
                return Err(GrammarDefError::MissingProduction(
                    self.names[lhs.index()].clone(),
                ));
            }
            first_production[n + 1] = productions.len() as u32;
        }
        assert!(productions.len() < u16::MAX as usize, "too many productions");

        Ok(Grammar {
            symbol_names: self.names,
            num_terminals,
            start_symbol: start,
            productions,
            first_production,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GrammarDefError {
    #[error("symbol `{0}` is declared twice")]
    DuplicateSymbol(String),

    #[error("terminal `{0}` is declared after the first nonterminal")]
    TerminalAfterNonterminal(String),

    #[error("symbol code {0:?} does not belong to this grammar")]
    UnknownSymbol(SymbolId),

    #[error("symbol {0:?} is not a declared nonterminal")]
    NotANonterminal(SymbolId),

    #[error("the rules for `{0}` are duplicated")]
    DuplicateRule(String),

    #[error("nonterminal `{0}` has no production")]
    MissingProduction(String),

    #[error("the grammar declares no nonterminal")]
    NoNonterminals,
}
