//! Linear normal form.
//!
//! Lowers [`Term`] formulas into conjunctive normal form over linear
//! integer atoms `Σ aᵢ·xᵢ + c ≤ 0`. Strict and negated comparisons are
//! tightened using integrality (`a < b` ⇔ `a − b + 1 ≤ 0`).

use std::collections::{BTreeMap, HashMap};

use super::terms::Term;
use crate::error::SolverError;

/// Upper bound on the number of clauses produced by distributing a single
/// assertion.
pub const MAX_CLAUSES_PER_ASSERTION: usize = 4096;

/// Linear expression `Σ aᵢ·xᵢ + c` over variable indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinExpr {
    /// Non-zero coefficients, sorted by variable index.
    pub coeffs: Vec<(usize, i64)>,
    /// Constant term.
    pub constant: i64,
}

/// Linear atom `expr ≤ 0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    pub expr: LinExpr,
}

/// Disjunction of atoms. An empty clause is unsatisfiable.
pub type Clause = Vec<Atom>;

impl LinExpr {
    /// A constant expression.
    pub fn constant(c: i64) -> Self {
        Self {
            coeffs: Vec::new(),
            constant: c,
        }
    }

    /// A single variable.
    pub fn var(index: usize) -> Self {
        Self {
            coeffs: vec![(index, 1)],
            constant: 0,
        }
    }

    /// Whether the expression has no variables.
    pub fn is_constant(&self) -> bool {
        self.coeffs.is_empty()
    }

    fn combine(&self, other: &LinExpr, sign: i64) -> Result<LinExpr, SolverError> {
        let mut map: BTreeMap<usize, i64> = self.coeffs.iter().copied().collect();
        for &(v, a) in &other.coeffs {
            let scaled = a.checked_mul(sign).ok_or_else(overflow)?;
            let entry = map.entry(v).or_insert(0);
            *entry = entry.checked_add(scaled).ok_or_else(overflow)?;
        }
        let constant = other
            .constant
            .checked_mul(sign)
            .and_then(|c| self.constant.checked_add(c))
            .ok_or_else(overflow)?;
        Ok(LinExpr {
            coeffs: map.into_iter().filter(|&(_, a)| a != 0).collect(),
            constant,
        })
    }

    /// `self + other`.
    pub fn plus(&self, other: &LinExpr) -> Result<LinExpr, SolverError> {
        self.combine(other, 1)
    }

    /// `self − other`.
    pub fn minus(&self, other: &LinExpr) -> Result<LinExpr, SolverError> {
        self.combine(other, -1)
    }

    /// `k · self`.
    pub fn scale(&self, k: i64) -> Result<LinExpr, SolverError> {
        if k == 0 {
            return Ok(LinExpr::constant(0));
        }
        let coeffs = self
            .coeffs
            .iter()
            .map(|&(v, a)| a.checked_mul(k).map(|s| (v, s)).ok_or_else(overflow))
            .collect::<Result<Vec<_>, _>>()?;
        let constant = self.constant.checked_mul(k).ok_or_else(overflow)?;
        Ok(LinExpr { coeffs, constant })
    }

    /// `self + c`.
    pub fn offset(&self, c: i64) -> Result<LinExpr, SolverError> {
        let constant = self.constant.checked_add(c).ok_or_else(overflow)?;
        Ok(LinExpr {
            coeffs: self.coeffs.clone(),
            constant,
        })
    }

    /// Evaluates under a full assignment, in 128-bit arithmetic.
    pub fn eval(&self, values: &[i64]) -> i128 {
        self.coeffs
            .iter()
            .map(|&(v, a)| a as i128 * values[v] as i128)
            .sum::<i128>()
            + self.constant as i128
    }
}

impl Atom {
    /// `expr ≤ 0`.
    pub fn le_zero(expr: LinExpr) -> Self {
        Self { expr }
    }

    /// Integer negation: `¬(e ≤ 0)` ⇔ `−e + 1 ≤ 0`.
    pub fn negate(&self) -> Result<Atom, SolverError> {
        Ok(Atom {
            expr: self.expr.scale(-1)?.offset(1)?,
        })
    }

    /// Whether the atom holds under a full assignment.
    pub fn holds(&self, values: &[i64]) -> bool {
        self.expr.eval(values) <= 0
    }
}

fn overflow() -> SolverError {
    SolverError::Overflow("coefficient arithmetic".into())
}

/// Lowers an integer-valued term to a linear expression.
pub fn linearize(term: &Term, index: &HashMap<String, usize>) -> Result<LinExpr, SolverError> {
    match term {
        Term::Var(name) => index
            .get(name)
            .map(|&i| LinExpr::var(i))
            .ok_or_else(|| SolverError::UnknownVariable(name.clone())),
        Term::Int(n) => Ok(LinExpr::constant(*n)),
        Term::Add(a, b) => linearize(a, index)?.plus(&linearize(b, index)?),
        Term::Sub(a, b) => linearize(a, index)?.minus(&linearize(b, index)?),
        Term::Neg(a) => linearize(a, index)?.scale(-1),
        Term::Mul(a, b) => {
            let l = linearize(a, index)?;
            let r = linearize(b, index)?;
            if l.is_constant() {
                r.scale(l.constant)
            } else if r.is_constant() {
                l.scale(r.constant)
            } else {
                Err(SolverError::NonLinear(term.to_string()))
            }
        }
        _ => Err(SolverError::SortMismatch(format!(
            "expected Int, got Bool: {term}"
        ))),
    }
}

/// Lowers a boolean term into CNF clauses over linear atoms.
///
/// `positive == false` lowers the negation of `term`.
pub fn to_clauses(
    term: &Term,
    positive: bool,
    index: &HashMap<String, usize>,
) -> Result<Vec<Clause>, SolverError> {
    let le = |a: &Term, b: &Term, strict: bool| -> Result<Vec<Clause>, SolverError> {
        // a ≤ b  →  a − b ≤ 0 ;  a < b  →  a − b + 1 ≤ 0
        let diff = linearize(a, index)?.minus(&linearize(b, index)?)?;
        let atom = Atom::le_zero(if strict { diff.offset(1)? } else { diff });
        Ok(vec![vec![atom]])
    };

    match (term, positive) {
        (Term::Bool(b), pos) => Ok(if *b == pos { Vec::new() } else { vec![Vec::new()] }),

        (Term::Le(a, b), true) => le(a, b, false),
        (Term::Le(a, b), false) => le(b, a, true),
        (Term::Lt(a, b), true) => le(a, b, true),
        (Term::Lt(a, b), false) => le(b, a, false),
        (Term::Ge(a, b), true) => le(b, a, false),
        (Term::Ge(a, b), false) => le(a, b, true),
        (Term::Gt(a, b), true) => le(b, a, true),
        (Term::Gt(a, b), false) => le(a, b, false),

        (Term::Eq(a, b), true) => {
            let mut clauses = le(a, b, false)?;
            clauses.extend(le(b, a, false)?);
            Ok(clauses)
        }
        (Term::Eq(a, b), false) => {
            let mut lt = le(a, b, true)?;
            let gt = le(b, a, true)?;
            lt[0].extend(gt.into_iter().flatten());
            Ok(lt)
        }

        (Term::Not(inner), pos) => to_clauses(inner, !pos, index),

        (Term::And(ts), true) | (Term::Or(ts), false) => {
            let mut clauses = Vec::new();
            for t in ts {
                clauses.extend(to_clauses(t, positive, index)?);
            }
            Ok(clauses)
        }
        (Term::Or(ts), true) | (Term::And(ts), false) => {
            let mut acc: Vec<Clause> = vec![Vec::new()];
            for t in ts {
                let part = to_clauses(t, positive, index)?;
                acc = distribute(&acc, &part)?;
            }
            Ok(acc)
        }

        (Term::Implies(a, b), true) => {
            to_clauses(&Term::or(vec![a.as_ref().clone().not(), b.as_ref().clone()]), true, index)
        }
        (Term::Implies(a, b), false) => {
            let mut clauses = to_clauses(a, true, index)?;
            clauses.extend(to_clauses(b, false, index)?);
            Ok(clauses)
        }

        _ => Err(SolverError::SortMismatch(format!(
            "expected Bool, got Int: {term}"
        ))),
    }
}

/// `(∧ left) ∨ (∧ right)` as CNF: the pairwise union of clauses.
fn distribute(left: &[Clause], right: &[Clause]) -> Result<Vec<Clause>, SolverError> {
    if left.len().saturating_mul(right.len()) > MAX_CLAUSES_PER_ASSERTION {
        return Err(SolverError::Unsupported(format!(
            "disjunction expands to more than {MAX_CLAUSES_PER_ASSERTION} clauses"
        )));
    }
    let mut out = Vec::with_capacity(left.len() * right.len());
    for l in left {
        for r in right {
            let mut clause = l.clone();
            clause.extend(r.iter().cloned());
            out.push(clause);
        }
    }
    Ok(out)
}
