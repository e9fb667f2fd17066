//! isolation::eval
//!
//! Evaluator and helper-function library for marker expressions.
//!
//! # Undefined
//!
//! A path that does not resolve yields *undefined* rather than failing
//! immediately, so `$exists(...)` and ternary conditions can test for it.
//! Any other use of undefined, including a final result that is undefined,
//! is an evaluation error. `and` and `or` short-circuit, so
//! `$exists(x) and x = 'y'` is safe when `x` is missing.
//!
//! # Functions
//!
//! | Function | Result |
//! |----------|--------|
//! | `$string(x)` | `x` coerced to a string |
//! | `$exists(x)` | whether `x` is defined |
//! | `$not(x)` | boolean negation of `x` |
//! | `$lowercase(s)`, `$uppercase(s)`, `$trim(s)` | string helpers |
//! | `$lookup(obj, key)` | member `key` of `obj` |
//! | `$dependencyTag(name)` | `env.dependencyTags[name]`, else `env.tag` |
//! | `$emptyIfDefault(tag)` | `""` when `tag` is the default tag, else `tag` |
//! | `$tagSuffix(tag)` | `""` when `tag` is the default tag, else `"-" & tag` |

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

use super::expr::{self, BinaryOp, Expr, ParseError};

/// An evaluation failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct EvalError {
    pub message: String,
}

impl EvalError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Variables and settings an expression is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    /// Variable root, e.g. `{"env": {...}, "sys": {...}}`.
    pub vars: &'a Value,
    /// Tag value that `$emptyIfDefault` and `$tagSuffix` reduce to `""`.
    pub default_tag: &'a str,
}

/// Compiled expressions, keyed by their source text.
///
/// One cache lives for one isolation run.
#[derive(Debug, Default)]
pub struct ExpressionCache {
    compiled: HashMap<String, Expr>,
}

impl ExpressionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `source`, reusing an earlier compilation of the same text.
    pub fn compile(&mut self, source: &str) -> Result<&Expr, ParseError> {
        if !self.compiled.contains_key(source) {
            let expr = expr::parse(source)?;
            self.compiled.insert(source.to_string(), expr);
        }
        self.compiled.get(source).ok_or_else(|| ParseError {
            message: "expression cache lost an entry".to_string(),
        })
    }

    /// Number of distinct compiled expressions.
    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    /// Whether nothing has been compiled yet.
    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

/// Evaluate `expr` and stringify the result.
///
/// # Errors
///
/// Returns an error if evaluation fails or the result is undefined.
pub fn evaluate_to_string(expr: &Expr, scope: Scope<'_>) -> Result<String, EvalError> {
    match evaluate(expr, scope)? {
        Some(value) => Ok(stringify(&value)),
        None => Err(EvalError::new("expression did not resolve to a value")),
    }
}

/// Evaluate `expr`. `Ok(None)` means undefined.
pub fn evaluate(expr: &Expr, scope: Scope<'_>) -> Result<Option<Value>, EvalError> {
    match expr {
        Expr::Literal(v) => Ok(Some(v.clone())),
        Expr::Path(segments) => Ok(lookup_path(scope.vars, segments).cloned()),
        Expr::Call { name, args } => {
            let args = args
                .iter()
                .map(|a| evaluate(a, scope))
                .collect::<Result<Vec<_>, _>>()?;
            call(name, args, scope)
        }
        Expr::Binary {
            op: op @ (BinaryOp::And | BinaryOp::Or),
            lhs,
            rhs,
        } => {
            let lhs = truthy(Some(&operand(*op, evaluate(lhs, scope)?)?));
            let decided = match op {
                BinaryOp::And => !lhs,
                _ => lhs,
            };
            if decided {
                return Ok(Some(Value::Bool(lhs)));
            }
            let rhs = operand(*op, evaluate(rhs, scope)?)?;
            Ok(Some(Value::Bool(truthy(Some(&rhs)))))
        }
        Expr::Binary { op, lhs, rhs } => {
            let lhs = operand(*op, evaluate(lhs, scope)?)?;
            let rhs = operand(*op, evaluate(rhs, scope)?)?;
            Ok(Some(binary(*op, lhs, rhs)))
        }
        Expr::Not(inner) => {
            let value = evaluate(inner, scope)?
                .ok_or_else(|| EvalError::new("operand of 'not' is undefined"))?;
            Ok(Some(Value::Bool(!truthy(Some(&value)))))
        }
        Expr::Conditional {
            condition,
            then,
            otherwise,
        } => {
            if truthy(evaluate(condition, scope)?.as_ref()) {
                evaluate(then, scope)
            } else if let Some(otherwise) = otherwise {
                evaluate(otherwise, scope)
            } else {
                Ok(None)
            }
        }
    }
}

fn lookup_path<'v>(root: &'v Value, segments: &[String]) -> Option<&'v Value> {
    segments
        .iter()
        .try_fold(root, |current, segment| current.as_object()?.get(segment))
}

/// Require a defined operand for `op`.
fn operand(op: BinaryOp, value: Option<Value>) -> Result<Value, EvalError> {
    value.ok_or_else(|| EvalError::new(format!("operand of '{}' is undefined", op.symbol())))
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Value {
    match op {
        BinaryOp::Concat => Value::String(stringify(&lhs) + &stringify(&rhs)),
        BinaryOp::Eq => Value::Bool(lhs == rhs),
        BinaryOp::Ne => Value::Bool(lhs != rhs),
        BinaryOp::And => Value::Bool(truthy(Some(&lhs)) && truthy(Some(&rhs))),
        BinaryOp::Or => Value::Bool(truthy(Some(&lhs)) || truthy(Some(&rhs))),
    }
}

/// Boolean interpretation of a value.
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => a.iter().any(|v| truthy(Some(v))),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// Render a value as marker replacement text.
///
/// Strings are inserted verbatim; everything else as compact JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn call(name: &str, args: Vec<Option<Value>>, scope: Scope<'_>) -> Result<Option<Value>, EvalError> {
    let arity = |expected: usize| {
        if args.len() == expected {
            Ok(())
        } else {
            Err(EvalError::new(format!(
                "${name} expects {expected} argument(s), got {}",
                args.len()
            )))
        }
    };

    match name {
        "exists" => {
            arity(1)?;
            Ok(Some(Value::Bool(args[0].is_some())))
        }
        "not" => {
            arity(1)?;
            let value = defined(name, &args[0])?;
            Ok(Some(Value::Bool(!truthy(Some(value)))))
        }
        "string" => {
            arity(1)?;
            let value = defined(name, &args[0])?;
            Ok(Some(Value::String(stringify(value))))
        }
        "lowercase" => {
            arity(1)?;
            Ok(Some(Value::String(string_arg(name, &args[0])?.to_lowercase())))
        }
        "uppercase" => {
            arity(1)?;
            Ok(Some(Value::String(string_arg(name, &args[0])?.to_uppercase())))
        }
        "trim" => {
            arity(1)?;
            Ok(Some(Value::String(string_arg(name, &args[0])?.trim().to_string())))
        }
        "lookup" => {
            arity(2)?;
            let key = string_arg(name, &args[1])?;
            match defined(name, &args[0])? {
                Value::Object(map) => Ok(map.get(key).cloned()),
                _ => Err(EvalError::new("$lookup expects an object")),
            }
        }
        "dependencyTag" => {
            arity(1)?;
            let dependency = string_arg(name, &args[0])?;
            let env = scope.vars.get("env");
            let tag = env
                .and_then(|e| e.get("dependencyTags"))
                .and_then(|tags| tags.get(dependency))
                .or_else(|| env.and_then(|e| e.get("tag")));
            Ok(tag.cloned())
        }
        "emptyIfDefault" => {
            arity(1)?;
            let tag = string_arg(name, &args[0])?;
            let reduced = if tag == scope.default_tag { "" } else { tag };
            Ok(Some(Value::String(reduced.to_string())))
        }
        "tagSuffix" => {
            arity(1)?;
            let tag = string_arg(name, &args[0])?;
            let suffix = if tag == scope.default_tag || tag.is_empty() {
                String::new()
            } else {
                format!("-{tag}")
            };
            Ok(Some(Value::String(suffix)))
        }
        _ => Err(EvalError::new(format!("unknown function ${name}"))),
    }
}

fn defined<'v>(function: &str, arg: &'v Option<Value>) -> Result<&'v Value, EvalError> {
    arg.as_ref()
        .ok_or_else(|| EvalError::new(format!("argument of ${function} is undefined")))
}

fn string_arg<'v>(function: &str, arg: &'v Option<Value>) -> Result<&'v str, EvalError> {
    match defined(function, arg)? {
        Value::String(s) => Ok(s),
        other => Err(EvalError::new(format!(
            "${function} expects a string, got {other}"
        ))),
    }
}
