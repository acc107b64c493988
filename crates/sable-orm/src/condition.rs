//! Condition compiler.
//!
//! [`Conditions`] is an ordered mix of named equalities, raw SQL fragments and
//! sibling bindings. [`Conditions::compile`] turns it into one boolean
//! fragment joined with ` AND ` plus a [`BindParams`] map:
//!
//! - `eq("u.id", 3)` renders `` `u`.`id` = :_WHERE_u_id ``
//! - `raw("id IN (:ids)")` with `:ids` bound to a list (or a comma-separated
//!   string) explodes into `id IN (:ids_0, :ids_1, ...)`; an empty list
//!   renders `IN (NULL)`
//! - `raw("name LIKE '%:n%'")` moves the wildcards onto the bound value and
//!   leaves a bare `name LIKE :n`
//!
//! List values are only legal as the source of an `IN` rewrite; anywhere else
//! they are rejected with a field error naming the key.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use sable_core::{BindParams, OrmError, Result, Value};

use crate::dialect::quote_path;

static IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+(\.[A-Za-z0-9_]+)*$").unwrap());
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^:?\w+$").unwrap());
static IN_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bin\s*\(\s*(:\w+)\s*\)").unwrap());
static LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\b(like)\s+(['"])?(%)?(:\w+)(%)?(['"])?"#).unwrap());

/// Whether `name` is a plain or dotted identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENT.is_match(name)
}

/// Validate an identifier, naming it in the error.
pub fn validate_identifier(name: &str) -> Result<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(OrmError::field(name, "disallowed field name"))
    }
}

/// A scalar or list condition value.
#[derive(Clone, Debug, PartialEq)]
pub enum CondValue {
    /// One value.
    Scalar(Value),
    /// Several values; only valid as the source of an `IN (...)` rewrite.
    List(Vec<Value>),
}

macro_rules! cond_value_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for CondValue {
                fn from(v: $t) -> Self {
                    Self::Scalar(v.into())
                }
            }

            impl From<Vec<$t>> for CondValue {
                fn from(v: Vec<$t>) -> Self {
                    Self::List(v.into_iter().map(Into::into).collect())
                }
            }
        )*
    };
}

cond_value_from!(bool, i32, i64, u32, f64, &str, String);

impl From<Value> for CondValue {
    fn from(v: Value) -> Self {
        Self::Scalar(v)
    }
}

impl From<Vec<Value>> for CondValue {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Entry {
    Eq(String, CondValue),
    Raw(String),
}

/// Ordered WHERE conditions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Conditions {
    entries: Vec<Entry>,
    bindings: Vec<(String, CondValue)>,
}

/// A compiled WHERE fragment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompiledCondition {
    /// Boolean SQL, without the `WHERE` keyword. Empty when unconditional.
    pub fragment: String,
    /// Placeholder bindings referenced by `fragment`.
    pub binds: BindParams,
}

impl Conditions {
    /// No conditions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Named equality `` `field` = :_WHERE_field ``.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<CondValue>) -> Self {
        self.entries.push(Entry::Eq(field.into(), value.into()));
        self
    }

    /// Raw boolean fragment, passed through after the IN / LIKE rewrites.
    #[must_use]
    pub fn raw(mut self, sql: impl Into<String>) -> Self {
        self.entries.push(Entry::Raw(sql.into()));
        self
    }

    /// Bind a placeholder used by a raw fragment. The leading `:` is optional.
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<CondValue>) -> Self {
        let name = name.into();
        let name = if name.starts_with(':') { name } else { format!(":{name}") };
        self.bindings.push((name, value.into()));
        self
    }

    /// Bind a list placeholder for an `IN (:name)` fragment.
    #[must_use]
    pub fn bind_list<I, V>(self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let list = CondValue::List(values.into_iter().map(Into::into).collect());
        self.bind(name, list)
    }

    /// Whether there is nothing to compile.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compile into a fragment and bind map.
    pub fn compile(&self) -> Result<CompiledCondition> {
        let mut binds = BindParams::new();
        let mut lists: Vec<(String, Vec<Value>)> = Vec::new();
        for (name, value) in &self.bindings {
            if !PLACEHOLDER.is_match(name) {
                return Err(OrmError::field(name.clone(), "disallowed placeholder name"));
            }
            match value {
                CondValue::Scalar(v) => binds.insert(name.clone(), v.clone()),
                CondValue::List(vs) => lists.push((name.clone(), vs.clone())),
            }
        }

        let mut consumed: HashSet<String> = HashSet::new();
        let mut liked: HashSet<String> = HashSet::new();
        let mut fragments = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            match entry {
                Entry::Eq(field, CondValue::Scalar(v)) => {
                    validate_identifier(field)?;
                    let placeholder = fresh_placeholder(&format!(":_WHERE_{}", field.replace('.', "_")), &binds);
                    fragments.push(format!("{} = {placeholder}", quote_path(field)));
                    binds.insert(placeholder, v.clone());
                }
                Entry::Eq(field, CondValue::List(_)) => {
                    return Err(OrmError::field(
                        field.clone(),
                        "list value under a named key; use a raw `IN (:name)` fragment",
                    ));
                }
                Entry::Raw(sql) => {
                    let sql = rewrite_in(sql, &mut binds, &lists, &mut consumed);
                    let sql = rewrite_like(&sql, &mut binds, &mut liked);
                    fragments.push(sql);
                }
            }
        }

        if let Some((name, _)) = lists.iter().find(|(n, _)| !consumed.contains(n)) {
            return Err(OrmError::field(
                name.clone(),
                "list binding not consumed by an `IN (...)` fragment",
            ));
        }
        for name in &consumed {
            let _ = binds.remove(name);
        }

        Ok(CompiledCondition {
            fragment: fragments.join(" AND "),
            binds,
        })
    }
}

/// `base`, or `base_2`, `base_3`, ... when `base` is already bound.
pub(crate) fn fresh_placeholder(base: &str, binds: &BindParams) -> String {
    if !binds.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}_{n}"))
        .find(|p| !binds.contains(p))
        .unwrap_or_else(|| base.to_string())
}

/// Elements an `IN` placeholder expands to, if it is bound at all.
fn in_values(name: &str, binds: &BindParams, lists: &[(String, Vec<Value>)]) -> Option<Vec<Value>> {
    if let Some((_, values)) = lists.iter().find(|(n, _)| n == name) {
        return Some(values.clone());
    }
    match binds.get(name)? {
        Value::Text(s) if s.trim().is_empty() => Some(Vec::new()),
        Value::Text(s) => Some(s.split(',').map(|p| Value::from(p.trim())).collect()),
        other => Some(vec![other.clone()]),
    }
}

fn rewrite_in(
    sql: &str,
    binds: &mut BindParams,
    lists: &[(String, Vec<Value>)],
    consumed: &mut HashSet<String>,
) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut last = 0;
    for caps in IN_LIST.captures_iter(sql) {
        let Some(ph) = caps.get(1) else { continue };
        let name = ph.as_str();
        let Some(values) = in_values(name, binds, lists) else {
            continue;
        };

        let expanded = if values.is_empty() {
            "NULL".to_string()
        } else {
            let mut fresh = Vec::with_capacity(values.len());
            for (i, v) in values.into_iter().enumerate() {
                let p = format!("{name}_{i}");
                binds.insert(p.clone(), v);
                fresh.push(p);
            }
            fresh.join(", ")
        };

        out.push_str(&sql[last..ph.start()]);
        out.push_str(&expanded);
        last = ph.end();
        let _ = consumed.insert(name.to_string());
    }
    out.push_str(&sql[last..]);
    out
}

fn rewrite_like(sql: &str, binds: &mut BindParams, liked: &mut HashSet<String>) -> String {
    LIKE.replace_all(sql, |caps: &regex::Captures<'_>| {
        let name = &caps[4];
        let Some(bound) = binds.get(name) else {
            return caps[0].to_string();
        };
        if liked.insert(name.to_string()) {
            let lead = if caps.get(3).is_some() { "%" } else { "" };
            let tail = if caps.get(5).is_some() { "%" } else { "" };
            let value = format!("{lead}{bound}{tail}");
            binds.insert(name.to_string(), value);
        }
        format!("{} {name}", &caps[1])
    })
    .into_owned()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
