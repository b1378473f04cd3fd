//! In-memory Datalog evaluation
//!
//! Evaluates the query dialect produced by [`crate::query`] over an
//! entity/attribute/value index. Clauses run left to right against a set of
//! partial bindings, so a clause may only rely on variables bound by earlier
//! clauses (or by the outer query, for `not` and `or-join`).
//!
//! Supported clause shapes:
//! - `[e :attr v]` data patterns (`_` is a wildcard)
//! - `[(pred args...)]` predicates
//! - `[(fn args...) ?out]` function bindings
//! - `(not ...)`, `(not-join [vars] ...)`, `(or ...)`, `(or-join [vars] ...)`,
//!   `(and ...)`

use crate::db::edn::{self, Edn};
use crate::db::BackendError;
use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub type EntityId = u64;

/// A value flowing through query evaluation
#[derive(Debug, Clone)]
pub enum Datum {
    Entity(EntityId),
    Str(String),
    Int(i64),
    Bool(bool),
    Pattern(Arc<Regex>),
    Set(Arc<Vec<Datum>>),
}

impl PartialEq for Datum {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Datum::Entity(a), Datum::Entity(b)) => a == b,
            (Datum::Str(a), Datum::Str(b)) => a == b,
            (Datum::Int(a), Datum::Int(b)) => a == b,
            (Datum::Bool(a), Datum::Bool(b)) => a == b,
            (Datum::Pattern(a), Datum::Pattern(b)) => a.as_str() == b.as_str(),
            (Datum::Set(a), Datum::Set(b)) => a == b,
            _ => false,
        }
    }
}

impl Datum {
    fn truthy(&self) -> bool {
        !matches!(self, Datum::Bool(false))
    }

    pub fn to_json(&self) -> Value {
        match self {
            Datum::Entity(id) => Value::from(*id),
            Datum::Str(s) => Value::String(s.clone()),
            Datum::Int(i) => Value::from(*i),
            Datum::Bool(b) => Value::Bool(*b),
            Datum::Pattern(re) => Value::String(re.as_str().to_string()),
            Datum::Set(items) => Value::Array(items.iter().map(Datum::to_json).collect()),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Datum::Entity(_) => "entity",
            Datum::Str(_) => "string",
            Datum::Int(_) => "integer",
            Datum::Bool(_) => "boolean",
            Datum::Pattern(_) => "regex",
            Datum::Set(_) => "set",
        }
    }
}

/// Entity/attribute/value facts with lookups in both directions
#[derive(Debug, Default, Clone)]
pub struct FactIndex {
    eav: HashMap<EntityId, HashMap<String, Vec<Datum>>>,
    ave: HashMap<String, Vec<(EntityId, Datum)>>,
}

impl FactIndex {
    pub fn insert(&mut self, entity: EntityId, attribute: &str, value: Datum) {
        self.eav
            .entry(entity)
            .or_default()
            .entry(attribute.to_string())
            .or_default()
            .push(value.clone());
        self.ave
            .entry(attribute.to_string())
            .or_default()
            .push((entity, value));
    }

    /// Replace every value of `attribute` on `entity` with `value`
    pub fn replace(&mut self, entity: EntityId, attribute: &str, value: Datum) {
        if let Some(attrs) = self.eav.get_mut(&entity) {
            attrs.remove(attribute);
        }
        if let Some(facts) = self.ave.get_mut(attribute) {
            facts.retain(|(e, _)| *e != entity);
        }
        self.insert(entity, attribute, value);
    }

    pub fn values(&self, entity: EntityId, attribute: &str) -> &[Datum] {
        self.eav
            .get(&entity)
            .and_then(|attrs| attrs.get(attribute))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn facts(&self, attribute: &str) -> &[(EntityId, Datum)] {
        self.ave.get(attribute).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Term {
    Var(String),
    Const(Datum),
    Blank,
}

#[derive(Debug, Clone)]
enum Clause {
    Pattern {
        entity: Term,
        attribute: String,
        value: Term,
    },
    Predicate {
        name: String,
        args: Vec<Term>,
    },
    Function {
        name: String,
        args: Vec<Term>,
        output: String,
    },
    Not {
        join: Option<Vec<String>>,
        body: Vec<Clause>,
    },
    Or {
        join: Option<Vec<String>>,
        branches: Vec<Vec<Clause>>,
    },
    And(Vec<Clause>),
}

/// A parsed `[:find ... :where ...]` query
#[derive(Debug, Clone)]
pub struct Query {
    find: Vec<String>,
    clauses: Vec<Clause>,
}

type Binding = HashMap<String, Datum>;

impl Query {
    pub fn parse(text: &str) -> Result<Self, BackendError> {
        let form = edn::read(text)?;
        let Edn::Vector(items) = form else {
            return Err(BackendError::invalid_clause("query must be a vector"));
        };

        let mut find = Vec::new();
        let mut clauses = Vec::new();
        let mut section = None;
        for item in items {
            if let Some(keyword) = item.as_keyword() {
                section = match keyword {
                    "find" => Some("find"),
                    "where" => Some("where"),
                    other => {
                        return Err(BackendError::invalid_clause(format!(
                            "unsupported query section :{}",
                            other
                        )))
                    }
                };
                continue;
            }
            match section {
                Some("find") => match item {
                    Edn::Symbol(var) if var.starts_with('?') => find.push(var),
                    other => {
                        return Err(BackendError::invalid_clause(format!(
                            "unsupported find element {:?}",
                            other
                        )))
                    }
                },
                Some(_) => clauses.push(parse_clause(&item)?),
                None => {
                    return Err(BackendError::invalid_clause(
                        "query must start with :find",
                    ))
                }
            }
        }

        if find.is_empty() {
            return Err(BackendError::invalid_clause("query has no :find variables"));
        }
        Ok(Self { find, clauses })
    }

    /// Distinct result tuples in `:find` order
    pub fn evaluate(&self, index: &FactIndex) -> Result<Vec<Vec<Value>>, BackendError> {
        let bindings = eval_clauses(&self.clauses, vec![Binding::new()], index)?;

        let mut seen = HashSet::new();
        let mut rows = Vec::new();
        for binding in bindings {
            let mut row = Vec::with_capacity(self.find.len());
            for var in &self.find {
                let datum = binding
                    .get(var)
                    .ok_or_else(|| BackendError::UnboundVariable(var.clone()))?;
                row.push(datum.to_json());
            }
            if seen.insert(Value::Array(row.clone()).to_string()) {
                rows.push(row);
            }
        }
        Ok(rows)
    }
}

fn parse_term(form: &Edn) -> Result<Term, BackendError> {
    Ok(match form {
        Edn::Symbol(s) if s == "_" => Term::Blank,
        Edn::Symbol(s) if s.starts_with('?') => Term::Var(s.clone()),
        Edn::Str(s) => Term::Const(Datum::Str(s.clone())),
        Edn::Integer(i) => Term::Const(Datum::Int(*i)),
        Edn::Bool(b) => Term::Const(Datum::Bool(*b)),
        other => {
            return Err(BackendError::invalid_clause(format!(
                "unsupported term {:?}",
                other
            )))
        }
    })
}

fn parse_call(form: &Edn) -> Result<(String, Vec<Term>), BackendError> {
    let Edn::List(items) = form else {
        return Err(BackendError::invalid_clause("expected a function call"));
    };
    let (head, args) = items
        .split_first()
        .ok_or_else(|| BackendError::invalid_clause("empty function call"))?;
    let name = head
        .as_symbol()
        .ok_or_else(|| BackendError::invalid_clause("function name must be a symbol"))?;
    let args = args.iter().map(parse_term).collect::<Result<Vec<_>, _>>()?;
    Ok((name.to_string(), args))
}

fn parse_join_vars(form: &Edn) -> Result<Vec<String>, BackendError> {
    let Edn::Vector(items) = form else {
        return Err(BackendError::invalid_clause("join variables must be a vector"));
    };
    let mut vars = Vec::new();
    for item in items {
        match item {
            Edn::Symbol(s) if s.starts_with('?') => vars.push(s.clone()),
            Edn::Vector(required) => {
                for var in required {
                    match var {
                        Edn::Symbol(s) if s.starts_with('?') => vars.push(s.clone()),
                        other => {
                            return Err(BackendError::invalid_clause(format!(
                                "bad join variable {:?}",
                                other
                            )))
                        }
                    }
                }
            }
            other => {
                return Err(BackendError::invalid_clause(format!(
                    "bad join variable {:?}",
                    other
                )))
            }
        }
    }
    Ok(vars)
}

fn parse_clause(form: &Edn) -> Result<Clause, BackendError> {
    match form {
        Edn::Vector(items) => match items.as_slice() {
            [call @ Edn::List(_)] => {
                let (name, args) = parse_call(call)?;
                Ok(Clause::Predicate { name, args })
            }
            [call @ Edn::List(_), Edn::Symbol(output)] if output.starts_with('?') => {
                let (name, args) = parse_call(call)?;
                Ok(Clause::Function {
                    name,
                    args,
                    output: output.clone(),
                })
            }
            [entity, Edn::Keyword(attribute), value] => Ok(Clause::Pattern {
                entity: parse_term(entity)?,
                attribute: attribute.clone(),
                value: parse_term(value)?,
            }),
            [entity, Edn::Keyword(attribute)] => Ok(Clause::Pattern {
                entity: parse_term(entity)?,
                attribute: attribute.clone(),
                value: Term::Blank,
            }),
            _ => Err(BackendError::invalid_clause(format!(
                "unsupported clause {:?}",
                form
            ))),
        },
        Edn::List(items) => {
            let (head, rest) = items
                .split_first()
                .ok_or_else(|| BackendError::invalid_clause("empty list clause"))?;
            match head.as_symbol() {
                Some("not") => Ok(Clause::Not {
                    join: None,
                    body: parse_body(rest)?,
                }),
                Some("not-join") => {
                    let (vars, body) = split_join(rest)?;
                    Ok(Clause::Not {
                        join: Some(vars),
                        body: parse_body(body)?,
                    })
                }
                Some("or") => Ok(Clause::Or {
                    join: None,
                    branches: parse_branches(rest)?,
                }),
                Some("or-join") => {
                    let (vars, body) = split_join(rest)?;
                    Ok(Clause::Or {
                        join: Some(vars),
                        branches: parse_branches(body)?,
                    })
                }
                Some("and") => Ok(Clause::And(parse_body(rest)?)),
                _ => Err(BackendError::invalid_clause(format!(
                    "unsupported list clause {:?}",
                    head
                ))),
            }
        }
        other => Err(BackendError::invalid_clause(format!(
            "unsupported clause {:?}",
            other
        ))),
    }
}

fn split_join(rest: &[Edn]) -> Result<(Vec<String>, &[Edn]), BackendError> {
    let (vars, body) = rest
        .split_first()
        .ok_or_else(|| BackendError::invalid_clause("join clause without variables"))?;
    Ok((parse_join_vars(vars)?, body))
}

fn parse_body(forms: &[Edn]) -> Result<Vec<Clause>, BackendError> {
    if forms.is_empty() {
        return Err(BackendError::invalid_clause("empty clause body"));
    }
    forms.iter().map(parse_clause).collect()
}

fn parse_branches(forms: &[Edn]) -> Result<Vec<Vec<Clause>>, BackendError> {
    if forms.is_empty() {
        return Err(BackendError::invalid_clause("or clause without branches"));
    }
    forms
        .iter()
        .map(|form| match parse_clause(form)? {
            Clause::And(body) => Ok(body),
            single => Ok(vec![single]),
        })
        .collect()
}

fn resolve<'a>(term: &'a Term, binding: &'a Binding) -> Option<&'a Datum> {
    match term {
        Term::Const(datum) => Some(datum),
        Term::Var(var) => binding.get(var),
        Term::Blank => None,
    }
}

/// Bind `term` to `datum`, failing when it is already bound to something else
fn unify(term: &Term, datum: &Datum, binding: &mut Binding) -> bool {
    match term {
        Term::Blank => true,
        Term::Const(expected) => expected == datum,
        Term::Var(var) => match binding.get(var) {
            Some(bound) => bound == datum,
            None => {
                binding.insert(var.clone(), datum.clone());
                true
            }
        },
    }
}

fn eval_clauses(
    clauses: &[Clause],
    mut bindings: Vec<Binding>,
    index: &FactIndex,
) -> Result<Vec<Binding>, BackendError> {
    for clause in clauses {
        if bindings.is_empty() {
            break;
        }
        bindings = eval_clause(clause, bindings, index)?;
    }
    Ok(bindings)
}

fn restrict(binding: &Binding, vars: &[String]) -> Binding {
    vars.iter()
        .filter_map(|var| binding.get(var).map(|d| (var.clone(), d.clone())))
        .collect()
}

fn eval_clause(
    clause: &Clause,
    bindings: Vec<Binding>,
    index: &FactIndex,
) -> Result<Vec<Binding>, BackendError> {
    let mut out = Vec::new();
    match clause {
        Clause::Pattern {
            entity,
            attribute,
            value,
        } => {
            for binding in bindings {
                match resolve(entity, &binding) {
                    Some(Datum::Entity(e)) => {
                        for candidate in index.values(*e, attribute) {
                            let mut next = binding.clone();
                            if unify(value, candidate, &mut next) {
                                out.push(next);
                            }
                        }
                    }
                    Some(_) => {}
                    None => {
                        let expected = resolve(value, &binding).cloned();
                        for (e, candidate) in index.facts(attribute) {
                            if expected.as_ref().is_some_and(|v| v != candidate) {
                                continue;
                            }
                            let mut next = binding.clone();
                            if unify(entity, &Datum::Entity(*e), &mut next)
                                && unify(value, candidate, &mut next)
                            {
                                out.push(next);
                            }
                        }
                    }
                }
            }
        }
        Clause::Predicate { name, args } => {
            for binding in bindings {
                let values = bound_args(args, &binding)?;
                if call(name, &values)?.truthy() {
                    out.push(binding);
                }
            }
        }
        Clause::Function { name, args, output } => {
            for mut binding in bindings {
                let values = bound_args(args, &binding)?;
                let result = call(name, &values)?;
                // a regex miss binds nothing
                if name == "re-find" && matches!(result, Datum::Bool(false)) {
                    continue;
                }
                if unify(&Term::Var(output.clone()), &result, &mut binding) {
                    out.push(binding);
                }
            }
        }
        Clause::Not { join, body } => {
            for binding in bindings {
                let seed = match join {
                    Some(vars) => restrict(&binding, vars),
                    None => binding.clone(),
                };
                if eval_clauses(body, vec![seed], index)?.is_empty() {
                    out.push(binding);
                }
            }
        }
        Clause::Or { join, branches } => {
            for binding in bindings {
                let mut seen = HashSet::new();
                for branch in branches {
                    let seed = match join {
                        Some(vars) => restrict(&binding, vars),
                        None => binding.clone(),
                    };
                    for result in eval_clauses(branch, vec![seed], index)? {
                        let mut merged = binding.clone();
                        let exported = match join {
                            Some(vars) => restrict(&result, vars),
                            None => result,
                        };
                        let mut consistent = true;
                        for (var, datum) in &exported {
                            if !unify(&Term::Var(var.clone()), datum, &mut merged) {
                                consistent = false;
                                break;
                            }
                        }
                        if consistent && seen.insert(binding_key(&merged)) {
                            out.push(merged);
                        }
                    }
                }
            }
        }
        Clause::And(body) => return eval_clauses(body, bindings, index),
    }
    Ok(out)
}

fn binding_key(binding: &Binding) -> String {
    let mut entries: Vec<String> = binding
        .iter()
        .map(|(var, datum)| format!("{}={}", var, datum.to_json()))
        .collect();
    entries.sort();
    entries.join(";")
}

fn bound_args(args: &[Term], binding: &Binding) -> Result<Vec<Datum>, BackendError> {
    args.iter()
        .map(|term| match term {
            Term::Var(var) => binding
                .get(var)
                .cloned()
                .ok_or_else(|| BackendError::UnboundVariable(var.clone())),
            Term::Const(datum) => Ok(datum.clone()),
            Term::Blank => Err(BackendError::invalid_clause("'_' is not a valid argument")),
        })
        .collect()
}

fn arity(name: &str, args: &[Datum], expected: usize) -> Result<(), BackendError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(BackendError::execution(format!(
            "{} expects {} arguments, got {}",
            name,
            expected,
            args.len()
        )))
    }
}

fn type_error(name: &str, args: &[Datum]) -> BackendError {
    let types: Vec<&str> = args.iter().map(Datum::type_name).collect();
    BackendError::execution(format!(
        "{} cannot be applied to ({})",
        name,
        types.join(", ")
    ))
}

fn call(name: &str, args: &[Datum]) -> Result<Datum, BackendError> {
    match name {
        "re-pattern" => {
            arity(name, args, 1)?;
            match &args[0] {
                Datum::Str(pattern) => Regex::new(pattern)
                    .map(|re| Datum::Pattern(Arc::new(re)))
                    .map_err(|e| BackendError::execution(format!("invalid regex: {}", e))),
                Datum::Pattern(re) => Ok(Datum::Pattern(re.clone())),
                _ => Err(type_error(name, args)),
            }
        }
        "re-find" => {
            arity(name, args, 2)?;
            match (&args[0], &args[1]) {
                (Datum::Pattern(re), Datum::Str(text)) => Ok(re
                    .find(text)
                    .map(|m| Datum::Str(m.as_str().to_string()))
                    .unwrap_or(Datum::Bool(false))),
                _ => Err(type_error(name, args)),
            }
        }
        "hash-set" => {
            let mut items: Vec<Datum> = Vec::with_capacity(args.len());
            for arg in args {
                if !items.contains(arg) {
                    items.push(arg.clone());
                }
            }
            Ok(Datum::Set(Arc::new(items)))
        }
        "contains?" => {
            arity(name, args, 2)?;
            match &args[0] {
                Datum::Set(items) => Ok(Datum::Bool(items.contains(&args[1]))),
                _ => Err(type_error(name, args)),
            }
        }
        "=" => Ok(Datum::Bool(args.windows(2).all(|w| w[0] == w[1]))),
        "not=" => Ok(Datum::Bool(!args.windows(2).all(|w| w[0] == w[1]))),
        "<" | ">" | "<=" | ">=" => {
            arity(name, args, 2)?;
            let ordering = match (&args[0], &args[1]) {
                (Datum::Int(a), Datum::Int(b)) => a.cmp(b),
                (Datum::Str(a), Datum::Str(b)) => a.cmp(b),
                _ => return Err(type_error(name, args)),
            };
            let holds = match name {
                "<" => ordering.is_lt(),
                ">" => ordering.is_gt(),
                "<=" => ordering.is_le(),
                _ => ordering.is_ge(),
            };
            Ok(Datum::Bool(holds))
        }
        "clojure.string/includes?" | "clojure.string/starts-with?" | "clojure.string/ends-with?" => {
            arity(name, args, 2)?;
            match (&args[0], &args[1]) {
                (Datum::Str(s), Datum::Str(part)) => Ok(Datum::Bool(match name {
                    "clojure.string/includes?" => s.contains(part.as_str()),
                    "clojure.string/starts-with?" => s.starts_with(part.as_str()),
                    _ => s.ends_with(part.as_str()),
                })),
                _ => Err(type_error(name, args)),
            }
        }
        "clojure.string/lower-case" => {
            arity(name, args, 1)?;
            match &args[0] {
                Datum::Str(s) => Ok(Datum::Str(s.to_lowercase())),
                _ => Err(type_error(name, args)),
            }
        }
        other => Err(BackendError::UnknownFunction(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FactIndex {
        let mut index = FactIndex::default();
        index.insert(1, "node/title", Datum::Str("Home".into()));
        index.insert(1, "block/uid", Datum::Str("p1".into()));
        for (e, uid, text) in [(2, "b1", "Project Alpha"), (3, "b2", "status: done")] {
            index.insert(e, "block/uid", Datum::Str(uid.into()));
            index.insert(e, "block/string", Datum::Str(text.into()));
            index.insert(e, "block/page", Datum::Entity(1));
        }
        index.insert(2, "block/children", Datum::Entity(3));
        index.insert(3, "block/refs", Datum::Entity(1));
        index
    }

    fn run(query: &str) -> Vec<Vec<Value>> {
        Query::parse(query).unwrap().evaluate(&sample()).unwrap()
    }

    #[test]
    fn test_data_patterns_and_predicates() {
        let rows = run(
            r#"[:find ?uid :where [(re-pattern "(?i)alpha") ?re] [?b :block/string ?s] [(re-find ?re ?s)] [?b :block/uid ?uid]]"#,
        );
        assert_eq!(rows, vec![vec![Value::from("b1")]]);
    }

    #[test]
    fn test_join_through_children() {
        let rows = run(
            r#"[:find ?pu ?cu :where [?p :block/children ?c] [?p :block/uid ?pu] [?c :block/uid ?cu]]"#,
        );
        assert_eq!(rows, vec![vec![Value::from("b1"), Value::from("b2")]]);
    }

    #[test]
    fn test_not_and_or_join() {
        let rows = run(
            r#"[:find ?uid :where [?b :block/page ?pg] (not [?b :block/refs ?r]) [?b :block/uid ?uid]]"#,
        );
        assert_eq!(rows, vec![vec![Value::from("b1")]]);

        let rows = run(
            r#"[:find ?uid :where [(hash-set "Home") ?set] [?b :block/page _]
               (or-join [[?set] ?b]
                 (and [?b :block/refs ?r] [?r :node/title ?t] [(contains? ?set ?t)])
                 [?b :block/string "Project Alpha"])
               [?b :block/uid ?uid]]"#,
        );
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_results_are_distinct() {
        let rows = run(r#"[:find ?pg :where [?b :block/page ?pg]]"#);
        assert_eq!(rows, vec![vec![Value::from(1u64)]]);
    }

    #[test]
    fn test_errors() {
        let index = sample();
        let unbound = Query::parse(r#"[:find ?b :where [?b :block/string ?s] [(re-find ?re ?s)]]"#)
            .unwrap()
            .evaluate(&index);
        assert!(matches!(unbound, Err(BackendError::UnboundVariable(v)) if v == "?re"));

        let unknown = Query::parse(r#"[:find ?b :where [?b :block/string ?s] [(frobnicate ?s)]]"#)
            .unwrap()
            .evaluate(&index);
        assert!(matches!(unknown, Err(BackendError::UnknownFunction(_))));

        assert!(Query::parse("[:find :where [?b :block/uid ?u]]").is_err());
        assert!(Query::parse("[:find ?u :in $ :where [?b :block/uid ?u]]").is_err());
    }
}
