//! End-to-end runs over small grammars with known automata and tables.

use lalrkit::{
    automaton::StateId,
    grammar::{Grammar, ProductionId, SymbolId},
    lookahead::Resolution,
    table::Action,
    Analysis, DiagnosticKind, Options, ProcessError, Severity,
};
use pretty_assertions::assert_eq;

fn run(grammar: &Grammar) -> Analysis {
    lalrkit::process(grammar, &Options::default()).unwrap()
}

/// The target of a shift out of `state` over `terminal`.
fn shifted(analysis: &Analysis, state: StateId, terminal: SymbolId) -> StateId {
    match analysis.actions().get(state, terminal) {
        Action::Shift(target) => target,
        other => panic!("expected a shift on {:?}, found {:?}", terminal, other),
    }
}

/// The production id of the `index`-th rule of `nt`, in declaration order.
fn production_of(grammar: &Grammar, nt: SymbolId, index: usize) -> ProductionId {
    grammar
        .productions_of(nt)
        .nth(index)
        .map(|(id, _)| id)
        .unwrap()
}

/// Cross-check the emitted tables against the automaton they came from.
fn check_tables(grammar: &Grammar, analysis: &Analysis) {
    for state in analysis.automaton().states() {
        for terminal in grammar.terminals() {
            match analysis.actions().get(state.id, terminal) {
                Action::Fail => {}
                Action::Shift(target) => {
                    assert!(state
                        .transitions
                        .iter()
                        .any(|t| t.symbol() == terminal && t.target == target));
                }
                Action::Reduce(p) => {
                    assert!(state.final_items.iter().any(|item| item.production == p));
                }
            }
        }
        for nonterminal in grammar.nonterminals() {
            if let Some(target) = analysis.gotos().get(state.id, nonterminal) {
                assert!(state
                    .transitions
                    .iter()
                    .any(|t| t.symbol() == nonterminal && t.target == target));
            }
        }
        // resolved states never keep overlapping reduce look-aheads
        if let Some(slot) = analysis.conflicts().slot(state.id) {
            let entry = analysis.lookaheads().entry(slot);
            if analysis.profile()[state.id.index()] != Resolution::Unresolved {
                for (i, a) in entry.sets.iter().enumerate() {
                    for b in &entry.sets[i + 1..] {
                        assert!(a.is_disjoint(b));
                    }
                }
            }
        }
    }
}

#[test]
fn lr0_grammar_skips_lookahead_entirely() {
    // S -> a | b
    let mut ids = None;
    let grammar = Grammar::define(|g| {
        let a = g.terminal("a")?;
        let b = g.terminal("b")?;
        let s = g.nonterminal("S")?;
        g.rule(s, [a])?;
        g.rule(s, [b])?;
        ids = Some((a, b, s));
        Ok(())
    })
    .unwrap();
    let (a, b, s) = ids.unwrap();

    let analysis = run(&grammar);
    check_tables(&grammar, &analysis);

    assert!(analysis.conflicts().is_empty());
    assert!(analysis.diagnostics().is_empty());
    assert!(analysis.profile().iter().all(|&r| r == Resolution::Lr0));
    // the look-ahead stage never ran
    assert!(analysis.lookaheads().read().is_empty());
    assert!(analysis.lookaheads().follow().is_none());

    let s_a = shifted(&analysis, StateId::START, a);
    let s_b = shifted(&analysis, StateId::START, b);
    // both arms reduce unconditionally, on every terminal
    for terminal in grammar.terminals() {
        assert_eq!(
            analysis.actions().get(s_a, terminal),
            Action::Reduce(production_of(&grammar, s, 0)),
        );
        assert_eq!(
            analysis.actions().get(s_b, terminal),
            Action::Reduce(production_of(&grammar, s, 1)),
        );
    }
    // accepting path: goto over S, shift $end, reduce the start production
    let s_top = analysis.gotos().get(StateId::START, s).unwrap();
    let s_done = shifted(&analysis, s_top, SymbolId::END);
    assert_eq!(
        analysis.actions().get(s_done, SymbolId::END),
        Action::Reduce(ProductionId::ACCEPT),
    );
}

#[test]
fn slr_follow_resolves_single_context_conflicts() {
    // S -> A a | d c ; A -> d
    let mut ids = None;
    let grammar = Grammar::define(|g| {
        let a = g.terminal("a")?;
        let c = g.terminal("c")?;
        let d = g.terminal("d")?;
        let s = g.nonterminal("S")?;
        let nt_a = g.nonterminal("A")?;
        g.rule(s, [nt_a, a])?;
        g.rule(s, [d, c])?;
        g.rule(nt_a, [d])?;
        ids = Some((a, c, d, nt_a));
        Ok(())
    })
    .unwrap();
    let (a, c, d, nt_a) = ids.unwrap();

    let analysis = run(&grammar);
    check_tables(&grammar, &analysis);
    assert!(analysis.diagnostics().is_empty());

    let s_d = shifted(&analysis, StateId::START, d);
    assert_eq!(analysis.profile()[s_d.index()], Resolution::Slr1);

    let reduce_a = Action::Reduce(production_of(&grammar, nt_a, 0));
    assert_eq!(analysis.actions().get(s_d, a), reduce_a);
    assert!(matches!(analysis.actions().get(s_d, c), Action::Shift(_)));
    assert_eq!(analysis.actions().get(s_d, SymbolId::END), Action::Fail);
}

#[test]
fn lalr_follow_splits_what_slr_merges() {
    // S -> A a | b A c | d c | b d a ; A -> d
    //
    // SLR merges the two contexts of `A -> d .` into Follow(A) = {a, c},
    // clashing with a shift in both conflicting states; the per-transition
    // LALR(1) sets keep them apart.
    let mut ids = None;
    let grammar = Grammar::define(|g| {
        let a = g.terminal("a")?;
        let b = g.terminal("b")?;
        let c = g.terminal("c")?;
        let d = g.terminal("d")?;
        let s = g.nonterminal("S")?;
        let nt_a = g.nonterminal("A")?;
        g.rule(s, [nt_a, a])?;
        g.rule(s, [b, nt_a, c])?;
        g.rule(s, [d, c])?;
        g.rule(s, [b, d, a])?;
        g.rule(nt_a, [d])?;
        ids = Some((a, b, c, d, nt_a));
        Ok(())
    })
    .unwrap();
    let (a, b, c, d, nt_a) = ids.unwrap();

    let analysis = run(&grammar);
    check_tables(&grammar, &analysis);
    assert!(analysis.diagnostics().is_empty());

    let reduce_a = Action::Reduce(production_of(&grammar, nt_a, 0));

    // after `d`: reduce A -> d only before `a`, unlike the SLR set {a, c}
    let s_d = shifted(&analysis, StateId::START, d);
    assert_eq!(analysis.profile()[s_d.index()], Resolution::Lalr1);
    assert_eq!(analysis.actions().get(s_d, a), reduce_a);
    assert!(matches!(analysis.actions().get(s_d, c), Action::Shift(_)));

    // after `b d`: the mirrored context, reduce only before `c`
    let s_b = shifted(&analysis, StateId::START, b);
    let s_bd = shifted(&analysis, s_b, d);
    assert_eq!(analysis.profile()[s_bd.index()], Resolution::Lalr1);
    assert_eq!(analysis.actions().get(s_bd, c), reduce_a);
    assert!(matches!(analysis.actions().get(s_bd, a), Action::Shift(_)));

    // forcing the LALR(1) path from the start changes nothing in the tables
    let forced = lalrkit::process(&grammar, &Options { force_lalr1: true }).unwrap();
    assert_eq!(forced.actions(), analysis.actions());
    assert_eq!(forced.gotos(), analysis.gotos());
}

#[test]
fn dangling_else_shifts_and_warns() {
    // S -> if E then S | if E then S else S | x ; E -> x
    let mut ids = None;
    let grammar = Grammar::define(|g| {
        let r#if = g.terminal("IF")?;
        let then = g.terminal("THEN")?;
        let r#else = g.terminal("ELSE")?;
        let x = g.terminal("X")?;
        let s = g.nonterminal("S")?;
        let e = g.nonterminal("E")?;
        g.rule(s, [r#if, e, then, s])?;
        g.rule(s, [r#if, e, then, s, r#else, s])?;
        g.rule(s, [x])?;
        g.rule(e, [x])?;
        ids = Some((r#if, then, r#else, s, e));
        Ok(())
    })
    .unwrap();
    let (r#if, then, r#else, s, e) = ids.unwrap();

    let analysis = run(&grammar);
    check_tables(&grammar, &analysis);

    // navigate to the state holding `S -> if E then S .` and
    // `S -> if E then S . else S`
    let s_if = shifted(&analysis, StateId::START, r#if);
    let s_e = analysis.gotos().get(s_if, e).unwrap();
    let s_then = shifted(&analysis, s_e, then);
    let s_body = analysis.gotos().get(s_then, s).unwrap();

    assert_eq!(analysis.profile()[s_body.index()], Resolution::Unresolved);
    assert_eq!(analysis.diagnostics().len(), 1);
    let warning = &analysis.diagnostics()[0];
    assert_eq!(warning.severity, Severity::Warning);
    assert_eq!(warning.kind, DiagnosticKind::ShiftReduce);
    assert_eq!(warning.state, s_body);

    // the shift won, the reduction survives on the rest of its look-ahead
    assert!(matches!(
        analysis.actions().get(s_body, r#else),
        Action::Shift(_)
    ));
    assert_eq!(
        analysis.actions().get(s_body, SymbolId::END),
        Action::Reduce(production_of(&grammar, s, 0)),
    );
}

#[test]
fn reduce_reduce_conflicts_are_fatal() {
    // S -> A | B ; A -> x ; B -> x
    let grammar = Grammar::define(|g| {
        let x = g.terminal("X")?;
        let s = g.nonterminal("S")?;
        let a = g.nonterminal("A")?;
        let b = g.nonterminal("B")?;
        g.rule(s, [a])?;
        g.rule(s, [b])?;
        g.rule(a, [x])?;
        g.rule(b, [x])?;
        Ok(())
    })
    .unwrap();

    let err = lalrkit::process(&grammar, &Options::default()).unwrap_err();
    let ProcessError::ReduceReduce { diagnostics } = err;
    assert!(diagnostics
        .iter()
        .any(|d| d.severity == Severity::Error && d.kind == DiagnosticKind::ReduceReduce));
    let fatal = diagnostics
        .iter()
        .find(|d| d.kind == DiagnosticKind::ReduceReduce)
        .unwrap();
    assert_eq!(fatal.items.len(), 2);
}

#[test]
fn empty_productions_reduce_through_nullable_chain() {
    // S -> A B ; A -> ε ; B -> ε | c
    let mut ids = None;
    let grammar = Grammar::define(|g| {
        let c = g.terminal("c")?;
        let s = g.nonterminal("S")?;
        let a = g.nonterminal("A")?;
        let b = g.nonterminal("B")?;
        g.rule(s, [a, b])?;
        g.rule(a, [])?;
        g.rule(b, [])?;
        g.rule(b, [c])?;
        ids = Some((c, s, a, b));
        Ok(())
    })
    .unwrap();
    let (c, s, a, b) = ids.unwrap();

    let analysis = run(&grammar);
    check_tables(&grammar, &analysis);
    assert!(analysis.diagnostics().is_empty());

    // nullable: S, A and B, but never $start
    let nullable = analysis.nullable();
    for nt in grammar.nonterminals() {
        let expected = grammar.symbol_name(nt) != "$start";
        assert_eq!(nullable.contains(grammar.nonterminal_index(nt)), expected);
    }

    // parsing "" : reduce A -> ε unconditionally, then B -> ε on $end
    let reduce_empty_a = Action::Reduce(production_of(&grammar, a, 0));
    assert_eq!(
        analysis.actions().get(StateId::START, SymbolId::END),
        reduce_empty_a,
    );
    assert_eq!(analysis.actions().get(StateId::START, c), reduce_empty_a);

    let s_a = analysis.gotos().get(StateId::START, a).unwrap();
    assert_eq!(
        analysis.actions().get(s_a, SymbolId::END),
        Action::Reduce(production_of(&grammar, b, 0)),
    );
    assert!(matches!(analysis.actions().get(s_a, c), Action::Shift(_)));

    let s_ab = analysis.gotos().get(s_a, b).unwrap();
    assert_eq!(
        analysis.actions().get(s_ab, SymbolId::END),
        Action::Reduce(production_of(&grammar, s, 0)),
    );
}

#[test]
fn identical_runs_emit_identical_tables() {
    let build = || {
        Grammar::define(|g| {
            let plus = g.terminal("PLUS")?;
            let star = g.terminal("STAR")?;
            let lparen = g.terminal("LPAREN")?;
            let rparen = g.terminal("RPAREN")?;
            let num = g.terminal("NUM")?;
            let expr = g.nonterminal("EXPR")?;
            let term = g.nonterminal("TERM")?;
            let factor = g.nonterminal("FACTOR")?;
            g.rule(expr, [expr, plus, term])?;
            g.rule(expr, [term])?;
            g.rule(term, [term, star, factor])?;
            g.rule(term, [factor])?;
            g.rule(factor, [num])?;
            g.rule(factor, [lparen, expr, rparen])?;
            Ok(())
        })
        .unwrap()
    };

    let first = run(&build());
    let second = run(&build());
    assert_eq!(first.actions(), second.actions());
    assert_eq!(first.gotos(), second.gotos());
    assert_eq!(first.profile(), second.profile());
    check_tables(&build(), &first);
}

#[test]
fn force_lalr1_leaves_clean_grammars_untouched() {
    let grammar = Grammar::define(|g| {
        let a = g.terminal("a")?;
        let b = g.terminal("b")?;
        let s = g.nonterminal("S")?;
        g.rule(s, [a])?;
        g.rule(s, [b])?;
        Ok(())
    })
    .unwrap();

    let default = run(&grammar);
    let forced = lalrkit::process(&grammar, &Options { force_lalr1: true }).unwrap();
    assert_eq!(forced.actions(), default.actions());
    assert_eq!(forced.gotos(), default.gotos());
    // the forced run did exercise the LALR machinery
    assert!(!forced.lookaheads().read().is_empty());
    assert!(forced.lookaheads().follow().is_some());
}
