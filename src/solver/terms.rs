//! Solver-agnostic term representation.
//!
//! Integer-valued expressions and boolean formulas over named integer
//! unknowns. Backends translate terms into their own input language; the
//! native backend requires them to be linear.

use std::fmt;

/// Abstract term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// Integer variable reference by name.
    Var(String),
    /// Integer literal.
    Int(i64),
    /// Boolean literal.
    Bool(bool),

    // Arithmetic
    Add(Box<Term>, Box<Term>),
    Sub(Box<Term>, Box<Term>),
    Mul(Box<Term>, Box<Term>),
    Neg(Box<Term>),

    // Comparison
    Eq(Box<Term>, Box<Term>),
    Le(Box<Term>, Box<Term>),
    Lt(Box<Term>, Box<Term>),
    Ge(Box<Term>, Box<Term>),
    Gt(Box<Term>, Box<Term>),

    // Boolean logic
    And(Vec<Term>),
    Or(Vec<Term>),
    Not(Box<Term>),
    Implies(Box<Term>, Box<Term>),
}

#[allow(clippy::should_implement_trait)]
impl Term {
    pub fn var(name: impl Into<String>) -> Self {
        Term::Var(name.into())
    }

    pub fn int(n: i64) -> Self {
        Term::Int(n)
    }

    pub fn bool(b: bool) -> Self {
        Term::Bool(b)
    }

    pub fn add(self, other: Term) -> Self {
        Term::Add(Box::new(self), Box::new(other))
    }

    pub fn sub(self, other: Term) -> Self {
        Term::Sub(Box::new(self), Box::new(other))
    }

    pub fn mul(self, other: Term) -> Self {
        Term::Mul(Box::new(self), Box::new(other))
    }

    pub fn neg(self) -> Self {
        Term::Neg(Box::new(self))
    }

    pub fn eq(self, other: Term) -> Self {
        Term::Eq(Box::new(self), Box::new(other))
    }

    pub fn le(self, other: Term) -> Self {
        Term::Le(Box::new(self), Box::new(other))
    }

    pub fn lt(self, other: Term) -> Self {
        Term::Lt(Box::new(self), Box::new(other))
    }

    pub fn ge(self, other: Term) -> Self {
        Term::Ge(Box::new(self), Box::new(other))
    }

    pub fn gt(self, other: Term) -> Self {
        Term::Gt(Box::new(self), Box::new(other))
    }

    pub fn and(terms: Vec<Term>) -> Self {
        Term::And(terms)
    }

    pub fn or(terms: Vec<Term>) -> Self {
        Term::Or(terms)
    }

    pub fn not(self) -> Self {
        Term::Not(Box::new(self))
    }

    pub fn implies(self, other: Term) -> Self {
        Term::Implies(Box::new(self), Box::new(other))
    }

    /// Sum of terms; `0` when empty.
    pub fn sum(terms: Vec<Term>) -> Self {
        terms
            .into_iter()
            .reduce(Term::add)
            .unwrap_or(Term::Int(0))
    }

    /// `lo ≤ self ≤ hi`.
    pub fn between(self, lo: Term, hi: Term) -> Self {
        Term::and(vec![self.clone().ge(lo), self.le(hi)])
    }

    /// Evaluates an integer-valued term under an assignment.
    ///
    /// Returns `None` for boolean terms, unassigned variables, or overflow.
    pub fn eval_int(&self, lookup: &dyn Fn(&str) -> Option<i64>) -> Option<i64> {
        match self {
            Term::Var(name) => lookup(name),
            Term::Int(n) => Some(*n),
            Term::Add(a, b) => a.eval_int(lookup)?.checked_add(b.eval_int(lookup)?),
            Term::Sub(a, b) => a.eval_int(lookup)?.checked_sub(b.eval_int(lookup)?),
            Term::Mul(a, b) => a.eval_int(lookup)?.checked_mul(b.eval_int(lookup)?),
            Term::Neg(a) => a.eval_int(lookup)?.checked_neg(),
            _ => None,
        }
    }

    /// Evaluates a boolean term under an assignment.
    ///
    /// Returns `None` for integer terms or unassigned variables.
    pub fn eval_bool(&self, lookup: &dyn Fn(&str) -> Option<i64>) -> Option<bool> {
        let cmp = |a: &Term, b: &Term| Some((a.eval_int(lookup)?, b.eval_int(lookup)?));
        match self {
            Term::Bool(b) => Some(*b),
            Term::Eq(a, b) => cmp(a, b).map(|(x, y)| x == y),
            Term::Le(a, b) => cmp(a, b).map(|(x, y)| x <= y),
            Term::Lt(a, b) => cmp(a, b).map(|(x, y)| x < y),
            Term::Ge(a, b) => cmp(a, b).map(|(x, y)| x >= y),
            Term::Gt(a, b) => cmp(a, b).map(|(x, y)| x > y),
            Term::And(ts) => ts.iter().try_fold(true, |acc, t| Some(acc & t.eval_bool(lookup)?)),
            Term::Or(ts) => ts.iter().try_fold(false, |acc, t| Some(acc | t.eval_bool(lookup)?)),
            Term::Not(t) => t.eval_bool(lookup).map(|b| !b),
            Term::Implies(a, b) => Some(!a.eval_bool(lookup)? || b.eval_bool(lookup)?),
            _ => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&super::smtlib::to_smtlib(self))
    }
}
