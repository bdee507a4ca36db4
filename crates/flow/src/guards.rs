//! The guard library (C1): pure, total predicates over `(answers, event,
//! args)`. Guards never fail at evaluation time — an unregistered guard
//! name is rejected by the compiler (§4.2), never at runtime.

use serde_json::Value;
use std::collections::HashMap;

/// The full set of registered guard names. The compiler rejects any
/// `GuardRef::function` not in this list.
pub const REGISTERED_GUARDS: &[&str] = &[
    "always",
    "answers_has",
    "answers_equals",
    "deps_missing",
    "path_locked",
];

pub fn is_registered(name: &str) -> bool {
    REGISTERED_GUARDS.contains(&name)
}

/// Read-only view a guard is evaluated against. Borrowed from the
/// runtime context; guards never see a mutable reference.
#[derive(Debug, Clone, Copy)]
pub struct GuardContext<'a> {
    pub answers: &'a HashMap<String, Value>,
    pub pending_field: Option<&'a str>,
    pub active_path: Option<&'a str>,
    pub path_locked: bool,
    pub event: Option<&'a str>,
}

pub(crate) fn value_is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn arg_str<'a>(args: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

fn arg_str_list(args: &HashMap<String, Value>, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn guard_always(_ctx: &GuardContext, _args: &HashMap<String, Value>) -> bool {
    true
}

fn guard_answers_has(ctx: &GuardContext, args: &HashMap<String, Value>) -> bool {
    let Some(key) = arg_str(args, "key") else {
        return false;
    };
    match ctx.answers.get(key) {
        Some(value) => !value_is_empty(value),
        None => false,
    }
}

fn guard_answers_equals(ctx: &GuardContext, args: &HashMap<String, Value>) -> bool {
    let (Some(key), Some(expected)) = (arg_str(args, "key"), arg_str(args, "value")) else {
        return false;
    };
    let Some(actual_value) = ctx.answers.get(key) else {
        return false;
    };

    if actual_value == &Value::String(expected.to_string()) {
        return true;
    }

    let Some(actual) = actual_value.as_str() else {
        return false;
    };
    let allowed_values = arg_str_list(args, "allowed_values");
    if allowed_values.is_empty() {
        return false;
    }

    match choose_option(actual, &allowed_values) {
        Some(chosen) => chosen == expected,
        None => false,
    }
}

fn guard_deps_missing(ctx: &GuardContext, args: &HashMap<String, Value>) -> bool {
    let Some(key) = arg_str(args, "key") else {
        return false;
    };
    let dependencies = arg_str_list(args, "dependencies");
    let key_absent = ctx
        .answers
        .get(key)
        .map(value_is_empty)
        .unwrap_or(true);
    let deps_present = dependencies.iter().all(|dep| {
        ctx.answers
            .get(dep.as_str())
            .map(|v| !value_is_empty(v))
            .unwrap_or(false)
    });
    key_absent && deps_present
}

fn guard_path_locked(ctx: &GuardContext, _args: &HashMap<String, Value>) -> bool {
    ctx.path_locked && ctx.active_path.map(|p| !p.is_empty()).unwrap_or(false)
}

/// Evaluate a registered guard by name. Returns `None` for an
/// unregistered name — callers that reach this point should already have
/// gone through compilation, where unregistered names are rejected.
pub fn evaluate(name: &str, args: &HashMap<String, Value>, ctx: &GuardContext) -> Option<bool> {
    let result = match name {
        "always" => guard_always(ctx, args),
        "answers_has" => guard_answers_has(ctx, args),
        "answers_equals" => guard_answers_equals(ctx, args),
        "deps_missing" => guard_deps_missing(ctx, args),
        "path_locked" => guard_path_locked(ctx, args),
        _ => return None,
    };
    Some(result)
}

/// Fuzzy best-option match against a set of allowed values: casefold,
/// collapse whitespace, underscore-to-space per candidate, +3 for
/// substring containment, +1 per matched whitespace-token, highest score
/// wins, ties broken by the first-declared candidate.
pub fn choose_option(user_message: &str, allowed_values: &[String]) -> Option<String> {
    let normalized_message = normalize(user_message);
    if normalized_message.is_empty() || allowed_values.is_empty() {
        return None;
    }
    let message_tokens: Vec<&str> = normalized_message.split_whitespace().collect();

    let mut best: Option<(i64, &String)> = None;
    for candidate in allowed_values {
        let normalized_candidate = normalize(&candidate.replace('_', " "));
        if normalized_candidate.is_empty() {
            continue;
        }

        let mut score: i64 = 0;
        if normalized_message.contains(&normalized_candidate)
            || normalized_candidate.contains(&normalized_message)
        {
            score += 3;
        }
        for token in normalized_candidate.split_whitespace() {
            if message_tokens.contains(&token) {
                score += 1;
            }
        }

        if score > 0 {
            match &best {
                Some((best_score, _)) if *best_score >= score => {}
                _ => best = Some((score, candidate)),
            }
        }
    }

    best.map(|(_, candidate)| candidate.clone())
}

fn normalize(s: &str) -> String {
    s.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}
