//! Condition tree to Datalog clause compiler
//!
//! Compilation yields two clause lists:
//! - `definitions` - function bindings (`re-pattern`, `hash-set`) that must
//!   appear before any clause using the variables they bind
//! - `matches` - one fragment per operand of the compiled list
//!
//! Leaves compile independently under AND, except that a list mixing
//! positive and negated leaves collapses its positive leaves into one
//! alternation (opt out with `collapse_alternatives: false`). Contains-mode
//! text leaves of an OR list merge into a single case-insensitive
//! alternation; raw regex leaves never join that merge. Other OR operands
//! become branches of an `or-join` over the binding variable with every
//! definition lifted out of the `or` and listed as a required join variable.

use crate::models::{CombineMode, Condition, ConditionKind, MatchMode, SearchCondition, SearchScope};
use crate::query::literal::{regex_literal, string_literal};
use crate::services::error::{Result, SearchError};

/// Compiler switches derived from `SearchConfig`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Prefix contains-style patterns with `(?i)`
    pub case_insensitive: bool,
    /// Collapse mixed-polarity AND lists into one alternation plus exclusions
    pub collapse_alternatives: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            collapse_alternatives: true,
        }
    }
}

/// Output of compiling one condition list against one binding variable
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledClauses {
    pub definitions: Vec<String>,
    pub matches: Vec<String>,
}

impl CompiledClauses {
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty() && self.matches.is_empty()
    }

    pub fn append(&mut self, other: CompiledClauses) {
        self.definitions.extend(other.definitions);
        self.matches.extend(other.matches);
    }

    /// Whether the binding variable is left unbound by the first fragment
    ///
    /// `not` and `or-join` fragments need the variable bound beforehand.
    pub fn needs_anchor(&self) -> bool {
        !self
            .matches
            .first()
            .map(|fragment| fragment.starts_with('['))
            .unwrap_or(false)
    }

    /// Definitions followed by match fragments, space separated
    pub fn where_clauses(&self) -> String {
        self.definitions
            .iter()
            .chain(self.matches.iter())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Fresh variable names scoped to one binding variable
struct VarAllocator<'a> {
    var: &'a str,
    next: usize,
}

impl<'a> VarAllocator<'a> {
    fn new(var: &'a str) -> Self {
        Self { var, next: 0 }
    }

    fn fresh(&mut self, tag: &str) -> String {
        let name = format!("{}-{}-{}", self.var, tag, self.next);
        self.next += 1;
        name
    }
}

/// Translates condition trees into query clauses
#[derive(Debug, Clone, Default)]
pub struct QueryCompiler {
    options: CompileOptions,
}

impl QueryCompiler {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> CompileOptions {
        self.options
    }

    /// Compile a canonical condition tree against `var`
    pub fn compile(&self, condition: &Condition, var: &str) -> Result<CompiledClauses> {
        check_variable(var)?;
        let mut alloc = VarAllocator::new(var);
        self.compile_node(condition, &mut alloc)
    }

    /// Compile an operand list combined with `combine` against `var`
    pub fn compile_conditions(
        &self,
        conditions: &[Condition],
        combine: CombineMode,
        var: &str,
    ) -> Result<CompiledClauses> {
        check_variable(var)?;
        let mut alloc = VarAllocator::new(var);
        self.compile_list(conditions, combine, &mut alloc)
    }

    /// Clauses restricting `var` to the pages and nodes named by `scope`
    pub fn compile_scope(&self, scope: &SearchScope, var: &str) -> Result<CompiledClauses> {
        check_variable(var)?;
        let mut out = CompiledClauses::default();
        if !scope.node_ids.is_empty() {
            let set = format!("{}-scope-nodes", var);
            let uid = format!("{}-scope-uid", var);
            out.definitions.push(hash_set(&scope.node_ids, &set));
            out.matches.push(format!(
                "[{} :block/uid {}] [(contains? {} {})]",
                var, uid, set, uid
            ));
        }
        if !scope.page_ids.is_empty() {
            let set = format!("{}-scope-pages", var);
            let page = format!("{}-scope-pg", var);
            let page_uid = format!("{}-scope-pg-uid", var);
            out.definitions.push(hash_set(&scope.page_ids, &set));
            out.matches.push(format!(
                "[{} :block/page {}] [{} :block/uid {}] [(contains? {} {})]",
                var, page, page, page_uid, set, page_uid
            ));
        }
        Ok(out)
    }

    fn compile_node(&self, condition: &Condition, alloc: &mut VarAllocator) -> Result<CompiledClauses> {
        match condition {
            Condition::Leaf(leaf) => Ok(self.compile_leaf(leaf, alloc)),
            Condition::Compound(compound) => {
                self.compile_list(&compound.operands, compound.operator, alloc)
            }
        }
    }

    fn compile_list(
        &self,
        operands: &[Condition],
        combine: CombineMode,
        alloc: &mut VarAllocator,
    ) -> Result<CompiledClauses> {
        match operands {
            [] => Err(SearchError::query_compilation(
                "cannot compile an empty condition list",
            )),
            [single] => self.compile_node(single, alloc),
            _ => match combine {
                CombineMode::And => {
                    if self.options.collapse_alternatives && has_mixed_polarity(operands) {
                        tracing::debug!("Collapsing mixed-polarity AND list into alternation");
                        return self.collapse_alternatives(operands, alloc);
                    }
                    let mut out = CompiledClauses::default();
                    for operand in operands {
                        out.append(self.compile_node(operand, alloc)?);
                    }
                    Ok(out)
                }
                CombineMode::Or => {
                    if operands.iter().any(is_negated_leaf) {
                        tracing::debug!("Collapsing OR list with negated operands into alternation");
                        return self.collapse_alternatives(operands, alloc);
                    }
                    self.compile_or(operands, alloc)
                }
            },
        }
    }

    fn compile_or(&self, operands: &[Condition], alloc: &mut VarAllocator) -> Result<CompiledClauses> {
        let (mergeable, rest): (Vec<&Condition>, Vec<&Condition>) = operands
            .iter()
            .partition(|operand| matches!(operand, Condition::Leaf(leaf) if leaf.is_contains_text()));

        let merged: Vec<&SearchCondition> = mergeable
            .iter()
            .filter_map(|operand| match operand {
                Condition::Leaf(leaf) => Some(leaf),
                Condition::Compound(_) => None,
            })
            .collect();

        if rest.is_empty() {
            return Ok(self.merged_text_clauses(&merged, alloc));
        }

        let mut out = CompiledClauses::default();
        let mut branches = Vec::new();
        if !merged.is_empty() {
            let compiled = self.merged_text_clauses(&merged, alloc);
            out.definitions.extend(compiled.definitions);
            branches.push(compiled.matches);
        }
        for operand in rest {
            let compiled = self.compile_node(operand, alloc)?;
            out.definitions.extend(compiled.definitions);
            branches.push(compiled.matches);
        }

        let body: Vec<String> = branches
            .into_iter()
            .map(|fragments| format!("(and {})", fragments.join(" ")))
            .collect();
        let required: Vec<&str> = out
            .definitions
            .iter()
            .filter_map(|definition| definition_var(definition))
            .collect();
        let join_vars = if required.is_empty() {
            format!("[{}]", alloc.var)
        } else {
            format!("[[{}] {}]", required.join(" "), alloc.var)
        };
        out.matches
            .push(format!("(or-join {} {})", join_vars, body.join(" ")));
        Ok(out)
    }

    /// One regex definition and one match for a set of text leaves
    fn merged_text_clauses(
        &self,
        leaves: &[&SearchCondition],
        alloc: &mut VarAllocator,
    ) -> CompiledClauses {
        if let [leaf] = leaves {
            return self.compile_leaf(leaf, alloc);
        }
        let alternatives: Vec<String> = leaves.iter().map(|leaf| text_alternative(leaf)).collect();
        let pattern = format!("{}({})", self.case_flag(), alternatives.join("|"));
        self.text_regex_clauses(&pattern, false, alloc)
    }

    /// Positive operands merge into one alternation; negated leaves stay
    /// separate exclusions.
    fn collapse_alternatives(
        &self,
        operands: &[Condition],
        alloc: &mut VarAllocator,
    ) -> Result<CompiledClauses> {
        let mut alternatives = Vec::new();
        let mut kept = Vec::new();
        let mut exclusions = Vec::new();

        for operand in operands {
            match operand {
                Condition::Leaf(leaf) if leaf.negate => exclusions.push(leaf),
                Condition::Leaf(leaf) => alternatives.extend(leaf_alternatives(leaf)),
                Condition::Compound(_) => kept.push(operand),
            }
        }

        let mut out = CompiledClauses::default();
        if !alternatives.is_empty() {
            let pattern = format!("{}({})", self.case_flag(), alternatives.join("|"));
            out.append(self.text_regex_clauses(&pattern, false, alloc));
        }
        for operand in kept {
            out.append(self.compile_node(operand, alloc)?);
        }
        for leaf in exclusions {
            out.append(self.compile_leaf(leaf, alloc));
        }
        Ok(out)
    }

    fn compile_leaf(&self, leaf: &SearchCondition, alloc: &mut VarAllocator) -> CompiledClauses {
        let var = alloc.var;
        match leaf.kind {
            ConditionKind::Text => match leaf.match_mode {
                MatchMode::Exact => {
                    let text = alloc.fresh("s");
                    let fragment = format!(
                        "[{} :block/string {}] [(= {} {})]",
                        var,
                        text,
                        text,
                        string_literal(&leaf.pattern)
                    );
                    single_match(fragment, leaf.negate)
                }
                MatchMode::Contains => {
                    let pattern = format!("{}{}", self.case_flag(), regex_literal(&leaf.pattern));
                    self.text_regex_clauses(&pattern, leaf.negate, alloc)
                }
                MatchMode::Regex => self.text_regex_clauses(&leaf.pattern, leaf.negate, alloc),
            },
            ConditionKind::Regex => self.text_regex_clauses(&leaf.pattern, leaf.negate, alloc),
            ConditionKind::PageRef => {
                let reference = alloc.fresh("ref");
                match leaf.match_mode {
                    MatchMode::Exact => {
                        let fragment = format!(
                            "[{} :block/refs {}] [{} :node/title {}]",
                            var,
                            reference,
                            reference,
                            string_literal(&leaf.pattern)
                        );
                        single_match(fragment, leaf.negate)
                    }
                    mode => {
                        let pattern = if mode == MatchMode::Regex {
                            leaf.pattern.clone()
                        } else {
                            format!("{}{}", self.case_flag(), regex_literal(&leaf.pattern))
                        };
                        let re = alloc.fresh("re");
                        let title = alloc.fresh("ref-title");
                        let fragment = format!(
                            "[{} :block/refs {}] [{} :node/title {}] [(re-find {} {})]",
                            var, reference, reference, title, re, title
                        );
                        CompiledClauses {
                            definitions: vec![re_pattern(&pattern, &re)],
                            matches: vec![negate_fragment(fragment, leaf.negate)],
                        }
                    }
                }
            }
            ConditionKind::BlockRef => {
                let reference = alloc.fresh("ref");
                let fragment = format!(
                    "[{} :block/refs {}] [{} :block/uid {}]",
                    var,
                    reference,
                    reference,
                    string_literal(leaf.pattern.trim())
                );
                single_match(fragment, leaf.negate)
            }
            ConditionKind::PageRefOr => {
                let titles: Vec<String> = leaf.titles().into_iter().map(str::to_string).collect();
                let set = alloc.fresh("set");
                let reference = alloc.fresh("ref");
                let title = alloc.fresh("ref-title");
                let fragment = format!(
                    "[{} :block/refs {}] [{} :node/title {}] [(contains? {} {})]",
                    var, reference, reference, title, set, title
                );
                CompiledClauses {
                    definitions: vec![hash_set(&titles, &set)],
                    matches: vec![negate_fragment(fragment, leaf.negate)],
                }
            }
        }
    }

    fn text_regex_clauses(
        &self,
        pattern: &str,
        negate: bool,
        alloc: &mut VarAllocator,
    ) -> CompiledClauses {
        let re = alloc.fresh("re");
        let text = alloc.fresh("s");
        let fragment = format!(
            "[{} :block/string {}] [(re-find {} {})]",
            alloc.var, text, re, text
        );
        CompiledClauses {
            definitions: vec![re_pattern(pattern, &re)],
            matches: vec![negate_fragment(fragment, negate)],
        }
    }

    fn case_flag(&self) -> &'static str {
        if self.options.case_insensitive {
            "(?i)"
        } else {
            ""
        }
    }
}

fn check_variable(var: &str) -> Result<()> {
    let valid = var.len() > 1
        && var.starts_with('?')
        && var[1..]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SearchError::query_compilation(format!(
            "invalid binding variable '{}'",
            var
        )))
    }
}

fn is_negated_leaf(condition: &Condition) -> bool {
    matches!(condition, Condition::Leaf(leaf) if leaf.negate)
}

fn has_mixed_polarity(operands: &[Condition]) -> bool {
    let negated = operands.iter().filter(|operand| is_negated_leaf(operand)).count();
    let positive = operands
        .iter()
        .filter(|operand| matches!(operand, Condition::Leaf(leaf) if !leaf.negate))
        .count();
    negated > 0 && positive > 0
}

fn single_match(fragment: String, negate: bool) -> CompiledClauses {
    CompiledClauses {
        definitions: Vec::new(),
        matches: vec![negate_fragment(fragment, negate)],
    }
}

fn negate_fragment(fragment: String, negate: bool) -> String {
    if negate {
        format!("(not {})", fragment)
    } else {
        fragment
    }
}

/// Variable bound by a `[(f ...) ?var]` definition
fn definition_var(definition: &str) -> Option<&str> {
    definition
        .trim_end_matches(']')
        .rsplit(' ')
        .next()
        .filter(|var| var.starts_with('?'))
}

fn re_pattern(pattern: &str, var: &str) -> String {
    format!("[(re-pattern {}) {}]", string_literal(pattern), var)
}

fn hash_set(values: &[String], var: &str) -> String {
    let literals: Vec<String> = values.iter().map(|v| string_literal(v)).collect();
    format!("[(hash-set {}) {}]", literals.join(" "), var)
}

/// Regex alternative for a text leaf inside a merged `(?i)` pattern
///
/// Raw regexes are case-sensitive on their own, so they clear the flag.
fn text_alternative(leaf: &SearchCondition) -> String {
    if leaf.is_raw_regex() {
        format!("(?-i:{})", leaf.pattern)
    } else {
        regex_literal(&leaf.pattern)
    }
}

/// Regex alternatives approximating a leaf over node text
fn leaf_alternatives(leaf: &SearchCondition) -> Vec<String> {
    match leaf.kind {
        ConditionKind::Text | ConditionKind::Regex => match leaf.match_mode {
            MatchMode::Exact if leaf.kind == ConditionKind::Text => {
                vec![format!("^{}$", regex_literal(&leaf.pattern))]
            }
            _ => vec![text_alternative(leaf)],
        },
        ConditionKind::PageRef => vec![page_ref_alternative(&leaf.pattern)],
        ConditionKind::PageRefOr => leaf
            .titles()
            .into_iter()
            .map(page_ref_alternative)
            .collect(),
        ConditionKind::BlockRef => vec![format!(r"\(\({}\)\)", regex_literal(leaf.pattern.trim()))],
    }
}

fn page_ref_alternative(title: &str) -> String {
    let t = regex_literal(title);
    format!(r"(?:\[\[{t}\]\]|#{t}|{t}::)", t = t)
}
