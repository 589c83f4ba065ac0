//! SMT-LIB2 printing and the external-process backend.
//!
//! [`SmtLibProcessSolver`] buffers declarations and assertions, and on
//! `check()` runs one solver process over stdin/stdout:
//!
//! ```text
//! (set-option :produce-models true)
//! (set-option :timeout <ms>)        ; when a deadline is set
//! (declare-const r_0 Int) ...
//! (assert ...) ...
//! (minimize ...) ...                ; optimization mode only
//! (check-sat)
//! (get-value (r_0 ...))
//! ```
//!
//! An `unknown` verdict still reads `(get-value)` so that a best-effort
//! candidate model can be inspected.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{Model, ObjectiveId, OptimizationPriority, SatResult, Solver, Term};
use crate::error::SolverError;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Print a term as SMT-LIB2.
pub fn to_smtlib(term: &Term) -> String {
    match term {
        Term::Var(name) => quote_symbol(name),
        Term::Int(n) => {
            if *n < 0 {
                format!("(- {})", n.unsigned_abs())
            } else {
                n.to_string()
            }
        }
        Term::Bool(b) => {
            if *b {
                "true".to_string()
            } else {
                "false".to_string()
            }
        }
        Term::Add(lhs, rhs) => format!("(+ {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        Term::Sub(lhs, rhs) => format!("(- {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        Term::Mul(lhs, rhs) => format!("(* {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        Term::Neg(inner) => format!("(- {})", to_smtlib(inner)),
        Term::Eq(lhs, rhs) => format!("(= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        Term::Lt(lhs, rhs) => format!("(< {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        Term::Le(lhs, rhs) => format!("(<= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        Term::Gt(lhs, rhs) => format!("(> {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        Term::Ge(lhs, rhs) => format!("(>= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        Term::And(terms) => nary("and", "true", terms),
        Term::Or(terms) => nary("or", "false", terms),
        Term::Not(inner) => format!("(not {})", to_smtlib(inner)),
        Term::Implies(lhs, rhs) => format!("(=> {} {})", to_smtlib(lhs), to_smtlib(rhs)),
    }
}

fn nary(op: &str, unit: &str, terms: &[Term]) -> String {
    match terms {
        [] => unit.to_string(),
        [single] => to_smtlib(single),
        _ => {
            let inner: Vec<String> = terms.iter().map(to_smtlib).collect();
            format!("({op} {})", inner.join(" "))
        }
    }
}

/// Quotes a symbol with `|...|` unless it is a simple SMT-LIB symbol.
pub fn quote_symbol(name: &str) -> String {
    const EXTRA: &str = "~!@$%^&*_-+=<>.?/";
    let simple = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || EXTRA.contains(c));
    if simple {
        name.to_string()
    } else {
        format!("|{name}|")
    }
}

/// Problem transcript: declarations, assertions, objectives.
pub fn script(names: &[String], assertions: &[Term], objectives: &[&Term]) -> Vec<String> {
    let mut lines = Vec::with_capacity(names.len() + assertions.len() + objectives.len());
    lines.extend(
        names
            .iter()
            .map(|n| format!("(declare-const {} Int)", quote_symbol(n))),
    );
    lines.extend(assertions.iter().map(|t| format!("(assert {})", to_smtlib(t))));
    lines.extend(objectives.iter().map(|t| format!("(minimize {})", to_smtlib(t))));
    lines
}

/// Backend driving an external SMT-LIB2 solver process.
#[derive(Debug, Clone)]
pub struct SmtLibProcessSolver {
    command: String,
    args: Vec<String>,
    names: Vec<String>,
    declared: HashSet<String>,
    terms: Vec<Term>,
    objectives: Vec<Term>,
    priority: OptimizationPriority,
    deadline: Option<Instant>,
    model: Option<HashMap<String, i64>>,
}

impl SmtLibProcessSolver {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            names: Vec::new(),
            declared: HashSet::new(),
            terms: Vec::new(),
            objectives: Vec::new(),
            priority: OptimizationPriority::default(),
            deadline: None,
            model: None,
        }
    }

    /// Full input sent to the solver process.
    pub fn input(&self, timeout: Option<Duration>) -> String {
        let mut lines = vec!["(set-option :produce-models true)".to_string()];
        if let Some(t) = timeout {
            lines.push(format!("(set-option :timeout {})", t.as_millis().max(1)));
        }
        if self.objectives.len() > 1 {
            let priority = match self.priority {
                OptimizationPriority::Lexicographic => "lex",
                OptimizationPriority::Pareto => "pareto",
            };
            lines.push(format!("(set-option :opt.priority {priority})"));
        }
        let objectives: Vec<&Term> = self.objectives.iter().collect();
        lines.extend(script(&self.names, &self.terms, &objectives));
        lines.push("(check-sat)".to_string());
        if !self.names.is_empty() {
            let symbols: Vec<String> = self.names.iter().map(|n| quote_symbol(n)).collect();
            lines.push(format!("(get-value ({}))", symbols.join(" ")));
        }
        lines.push("(exit)".to_string());
        let mut input = lines.join("\n");
        input.push('\n');
        input
    }

    /// Runs the process; `None` when the deadline expired first.
    fn run(&self, input: &str) -> Result<Option<String>, SolverError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| SolverError::Process("failed to capture solver stdout".into()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| SolverError::Process("failed to capture solver stderr".into()))?;
        let out_reader = thread::spawn(move || {
            let mut buf = String::new();
            stdout.read_to_string(&mut buf).map(|_| buf)
        });
        let err_reader = thread::spawn(move || {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf);
            buf
        });

        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| SolverError::Process("failed to capture solver stdin".into()))?;
            stdin.write_all(input.as_bytes())?;
            stdin.flush()?;
        }

        if !self.wait(&mut child)? {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }

        let stdout = out_reader
            .join()
            .map_err(|_| SolverError::Process("stdout reader panicked".into()))??;
        let stderr = err_reader.join().unwrap_or_default();
        if !stderr.trim().is_empty() {
            debug!(command = %self.command, stderr = %stderr.trim(), "solver stderr");
        }
        Ok(Some(stdout))
    }

    /// Waits for exit. Returns `false` when the deadline expired.
    fn wait(&self, child: &mut Child) -> Result<bool, SolverError> {
        loop {
            if child.try_wait()?.is_some() {
                return Ok(true);
            }
            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(false);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn collect_vars<'t>(term: &'t Term, out: &mut Vec<&'t str>) {
    match term {
        Term::Var(name) => out.push(name),
        Term::Int(_) | Term::Bool(_) => {}
        Term::Add(a, b)
        | Term::Sub(a, b)
        | Term::Mul(a, b)
        | Term::Eq(a, b)
        | Term::Le(a, b)
        | Term::Lt(a, b)
        | Term::Ge(a, b)
        | Term::Gt(a, b)
        | Term::Implies(a, b) => {
            collect_vars(a, out);
            collect_vars(b, out);
        }
        Term::Neg(a) | Term::Not(a) => collect_vars(a, out),
        Term::And(ts) | Term::Or(ts) => ts.iter().for_each(|t| collect_vars(t, out)),
    }
}

impl SmtLibProcessSolver {
    fn ensure_declared(&self, term: &Term) -> Result<(), SolverError> {
        let mut vars = Vec::new();
        collect_vars(term, &mut vars);
        match vars.into_iter().find(|v| !self.declared.contains(*v)) {
            Some(v) => Err(SolverError::UnknownVariable(v.to_string())),
            None => Ok(()),
        }
    }
}

impl Solver for SmtLibProcessSolver {
    fn backend_name(&self) -> &'static str {
        "smtlib"
    }

    fn declare_int(&mut self, name: &str) -> Result<(), SolverError> {
        if !self.declared.insert(name.to_string()) {
            return Err(SolverError::DuplicateVariable(name.to_string()));
        }
        self.names.push(name.to_string());
        Ok(())
    }

    fn assert(&mut self, term: &Term) -> Result<(), SolverError> {
        self.ensure_declared(term)?;
        self.terms.push(term.clone());
        Ok(())
    }

    fn minimize(&mut self, objective: &Term) -> Result<ObjectiveId, SolverError> {
        self.ensure_declared(objective)?;
        self.objectives.push(objective.clone());
        Ok(ObjectiveId(self.objectives.len() - 1))
    }

    fn set_priority(&mut self, priority: OptimizationPriority) {
        self.priority = priority;
    }

    fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    fn check(&mut self) -> Result<SatResult, SolverError> {
        self.model = None;

        let timeout = match self.deadline {
            Some(d) => match d.checked_duration_since(Instant::now()) {
                Some(left) if !left.is_zero() => Some(left),
                _ => return Ok(SatResult::Unknown("deadline exceeded".into())),
            },
            None => None,
        };

        let input = self.input(timeout);
        let Some(output) = self.run(&input)? else {
            warn!(command = %self.command, "solver process killed at deadline");
            return Ok(SatResult::Unknown("deadline exceeded".into()));
        };

        let (verdict, model) = parse_response(&output)?;
        if matches!(verdict, SatResult::Sat | SatResult::Unknown(_)) {
            self.model = model;
        }
        if verdict.is_sat() && self.model.is_none() && !self.names.is_empty() {
            return Err(SolverError::Parse("sat verdict without a model".into()));
        }
        Ok(verdict)
    }

    fn has_model(&self) -> bool {
        self.model.is_some()
    }

    fn evaluate(&self, name: &str) -> Result<i64, SolverError> {
        if !self.declared.contains(name) {
            return Err(SolverError::UnknownVariable(name.to_string()));
        }
        self.model
            .as_ref()
            .and_then(|m| m.get(name).copied())
            .ok_or(SolverError::NoModel)
    }

    fn model(&self) -> Option<Model> {
        let model = self.model.as_ref()?;
        Some(Model {
            values: model.clone(),
        })
    }

    fn objective_value(&self, id: ObjectiveId) -> Option<i64> {
        let model = self.model.as_ref()?;
        self.objectives
            .get(id.0)?
            .eval_int(&|name| model.get(name).copied())
    }

    fn assertions(&self) -> Vec<String> {
        let objectives: Vec<&Term> = self.objectives.iter().collect();
        script(&self.names, &self.terms, &objectives)
    }
}

// ======================== Response parsing ========================

/// S-expression of solver output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sexp {
    Atom(String),
    List(Vec<Sexp>),
}

/// Parses a sequence of s-expressions. `|quoted|` symbols are unquoted;
/// string literals keep their quotes.
pub fn parse_sexps(input: &str) -> Result<Vec<Sexp>, SolverError> {
    let mut stack: Vec<Vec<Sexp>> = vec![Vec::new()];
    let mut chars = input.chars().peekable();
    let mut atom = String::new();

    fn flush(atom: &mut String, stack: &mut [Vec<Sexp>]) {
        if !atom.is_empty() {
            if let Some(top) = stack.last_mut() {
                top.push(Sexp::Atom(std::mem::take(atom)));
            }
        }
    }

    while let Some(c) = chars.next() {
        match c {
            '(' => {
                flush(&mut atom, &mut stack);
                stack.push(Vec::new());
            }
            ')' => {
                flush(&mut atom, &mut stack);
                let list = stack
                    .pop()
                    .filter(|_| !stack.is_empty())
                    .ok_or_else(|| SolverError::Parse("unbalanced ')'".into()))?;
                if let Some(top) = stack.last_mut() {
                    top.push(Sexp::List(list));
                }
            }
            '|' => {
                let mut symbol = String::new();
                loop {
                    match chars.next() {
                        Some('|') => break,
                        Some(ch) => symbol.push(ch),
                        None => return Err(SolverError::Parse("unterminated |symbol|".into())),
                    }
                }
                flush(&mut atom, &mut stack);
                if let Some(top) = stack.last_mut() {
                    top.push(Sexp::Atom(symbol));
                }
            }
            '"' => {
                atom.push('"');
                loop {
                    match chars.next() {
                        Some('"') if chars.peek() == Some(&'"') => {
                            chars.next();
                            atom.push_str("\"\"");
                        }
                        Some('"') => {
                            atom.push('"');
                            break;
                        }
                        Some(ch) => atom.push(ch),
                        None => return Err(SolverError::Parse("unterminated string".into())),
                    }
                }
            }
            ';' => {
                flush(&mut atom, &mut stack);
                for ch in chars.by_ref() {
                    if ch == '\n' {
                        break;
                    }
                }
            }
            c if c.is_whitespace() => flush(&mut atom, &mut stack),
            c => atom.push(c),
        }
    }
    flush(&mut atom, &mut stack);

    match (stack.pop(), stack.is_empty()) {
        (Some(top), true) => Ok(top),
        _ => Err(SolverError::Parse("unbalanced '('".into())),
    }
}

fn sexp_int(value: &Sexp) -> Option<i64> {
    match value {
        Sexp::Atom(a) => a.parse().ok(),
        Sexp::List(items) => match items.as_slice() {
            [Sexp::Atom(op), inner] if op == "-" => sexp_int(inner)?.checked_neg(),
            _ => None,
        },
    }
}

fn model_pairs(items: &[Sexp]) -> Option<HashMap<String, i64>> {
    if items.is_empty() {
        return None;
    }
    items
        .iter()
        .map(|item| match item {
            Sexp::List(pair) => match pair.as_slice() {
                [Sexp::Atom(name), value] => Some((name.clone(), sexp_int(value)?)),
                _ => None,
            },
            Sexp::Atom(_) => None,
        })
        .collect()
}

/// Extracts the verdict and the `(get-value)` model from solver output.
///
/// `success`/`unsupported` acknowledgements are skipped. An `(error ...)`
/// before the verdict is a process error; after it, it is ignored (e.g.
/// `get-value` after `unsat`).
pub fn parse_response(output: &str) -> Result<(SatResult, Option<HashMap<String, i64>>), SolverError> {
    let sexps = parse_sexps(output)?;
    let mut verdict = None;
    let mut model = None;

    for sexp in &sexps {
        match (sexp, &verdict) {
            (Sexp::Atom(a), None) => match a.as_str() {
                "sat" => verdict = Some(SatResult::Sat),
                "unsat" => verdict = Some(SatResult::Unsat),
                "unknown" => verdict = Some(SatResult::Unknown("solver returned unknown".into())),
                "success" | "unsupported" => {}
                other => return Err(SolverError::Parse(format!("unexpected output `{other}`"))),
            },
            (Sexp::List(items), None) => {
                if let [Sexp::Atom(head), rest @ ..] = items.as_slice() {
                    if head == "error" {
                        let msg: Vec<String> = rest.iter().map(sexp_text).collect();
                        return Err(SolverError::Process(msg.join(" ")));
                    }
                }
            }
            (Sexp::List(items), Some(_)) if model.is_none() => {
                model = model_pairs(items);
            }
            _ => {}
        }
    }

    let verdict = verdict.ok_or_else(|| SolverError::Parse("no check-sat verdict in output".into()))?;
    Ok((verdict, model))
}

fn sexp_text(sexp: &Sexp) -> String {
    match sexp {
        Sexp::Atom(a) => a.trim_matches('"').to_string(),
        Sexp::List(items) => {
            let inner: Vec<String> = items.iter().map(sexp_text).collect();
            format!("({})", inner.join(" "))
        }
    }
}
