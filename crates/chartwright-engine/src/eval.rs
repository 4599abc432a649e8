//! Path expression evaluation
//!
//! Every intermediate result remembers where it came from in the input
//! document (when it came from the input at all), which is what lets
//! assignments and `del` write back into the document.

use regex::Regex;
use serde_json::Value as JsonValue;
use std::cmp::Ordering;

use crate::ast::{AssignOp, BinaryOp, Expr, Suffix};
use crate::error::ExprError;

type Result<T> = std::result::Result<T, ExprError>;

/// One step of a location inside a document
#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    Key(String),
    Index(usize),
}

/// A value plus its location in the input, if it has one
#[derive(Debug, Clone)]
struct Node {
    value: JsonValue,
    path: Option<Vec<PathSegment>>,
}

impl Node {
    fn root(value: JsonValue) -> Self {
        Self {
            value,
            path: Some(Vec::new()),
        }
    }

    fn detached(value: JsonValue) -> Self {
        Self { value, path: None }
    }

    fn child(&self, segment: PathSegment, value: JsonValue) -> Self {
        let path = self.path.as_ref().map(|p| {
            let mut p = p.clone();
            p.push(segment);
            p
        });
        Self { value, path }
    }
}

/// Evaluate an expression against a document, returning every output
pub fn evaluate(expr: &Expr, input: &JsonValue) -> Result<Vec<JsonValue>> {
    let outputs = eval(expr, &Node::root(input.clone()))?;
    Ok(outputs.into_iter().map(|n| n.value).collect())
}

fn eval(expr: &Expr, input: &Node) -> Result<Vec<Node>> {
    match expr {
        Expr::Identity => Ok(vec![input.clone()]),
        Expr::Literal(value) => Ok(vec![Node::detached(value.clone())]),
        Expr::Postfix(base, suffixes) => {
            let mut current = eval(base, input)?;
            for suffix in suffixes {
                let mut next = Vec::new();
                for node in &current {
                    next.extend(apply_suffix(suffix, node, input)?);
                }
                current = next;
            }
            Ok(current)
        }
        Expr::Array(None) => Ok(vec![Node::detached(JsonValue::Array(Vec::new()))]),
        Expr::Array(Some(inner)) => {
            let items = eval(inner, input)?.into_iter().map(|n| n.value).collect();
            Ok(vec![Node::detached(JsonValue::Array(items))])
        }
        Expr::Object(entries) => eval_object(entries, input),
        Expr::Call { name, args } => call(name, args, input),
        Expr::Pipe(lhs, rhs) => {
            let mut out = Vec::new();
            for node in eval(lhs, input)? {
                out.extend(eval(rhs, &node)?);
            }
            Ok(out)
        }
        Expr::Comma(lhs, rhs) => {
            let mut out = eval(lhs, input)?;
            out.extend(eval(rhs, input)?);
            Ok(out)
        }
        Expr::Binary { op, lhs, rhs } => eval_binary(*op, lhs, rhs, input),
        Expr::Assign { op, target, value } => eval_assign(*op, target, value, input),
    }
}

fn apply_suffix(suffix: &Suffix, node: &Node, context: &Node) -> Result<Vec<Node>> {
    match suffix {
        Suffix::Field(name) => Ok(vec![field(node, name)?]),
        Suffix::Iterate => iterate(node),
        Suffix::Index(index) => {
            let mut out = Vec::new();
            for key in eval(index, context)? {
                out.push(match &key.value {
                    JsonValue::String(name) => field(node, name)?,
                    JsonValue::Number(n) => element(node, n)?,
                    other => {
                        return Err(ExprError::eval(format!(
                            "cannot index {} with {}",
                            type_name(&node.value),
                            type_name(other)
                        )));
                    }
                });
            }
            Ok(out)
        }
    }
}

fn field(node: &Node, name: &str) -> Result<Node> {
    let segment = PathSegment::Key(name.to_string());
    match &node.value {
        JsonValue::Object(map) => Ok(node.child(segment, map.get(name).cloned().unwrap_or_default())),
        JsonValue::Null => Ok(node.child(segment, JsonValue::Null)),
        other => Err(ExprError::eval(format!(
            "cannot index {} with \"{name}\"",
            type_name(other)
        ))),
    }
}

fn element(node: &Node, number: &serde_json::Number) -> Result<Node> {
    let raw = number
        .as_i64()
        .ok_or_else(|| ExprError::eval(format!("array index {number} is not an integer")))?;

    match &node.value {
        JsonValue::Array(items) => {
            let len = items.len() as i64;
            let idx = if raw < 0 { len + raw } else { raw };
            if idx < 0 {
                return Ok(Node::detached(JsonValue::Null));
            }
            let idx = idx as usize;
            Ok(node.child(
                PathSegment::Index(idx),
                items.get(idx).cloned().unwrap_or_default(),
            ))
        }
        JsonValue::Null if raw >= 0 => {
            Ok(node.child(PathSegment::Index(raw as usize), JsonValue::Null))
        }
        JsonValue::Null => Ok(Node::detached(JsonValue::Null)),
        other => Err(ExprError::eval(format!(
            "cannot index {} with number",
            type_name(other)
        ))),
    }
}

fn iterate(node: &Node) -> Result<Vec<Node>> {
    match &node.value {
        JsonValue::Array(items) => Ok(items
            .iter()
            .enumerate()
            .map(|(i, v)| node.child(PathSegment::Index(i), v.clone()))
            .collect()),
        JsonValue::Object(map) => Ok(map
            .iter()
            .map(|(k, v)| node.child(PathSegment::Key(k.clone()), v.clone()))
            .collect()),
        // missing collections iterate as empty
        JsonValue::Null => Ok(Vec::new()),
        other => Err(ExprError::eval(format!(
            "cannot iterate over {}",
            type_name(other)
        ))),
    }
}

fn eval_object(entries: &[(String, Expr)], input: &Node) -> Result<Vec<Node>> {
    let mut results = vec![serde_json::Map::new()];

    for (key, expr) in entries {
        let values = eval(expr, input)?;
        let mut next = Vec::with_capacity(results.len() * values.len());
        for partial in &results {
            for value in &values {
                let mut map = partial.clone();
                map.insert(key.clone(), value.value.clone());
                next.push(map);
            }
        }
        results = next;
    }

    Ok(results
        .into_iter()
        .map(|m| Node::detached(JsonValue::Object(m)))
        .collect())
}

fn eval_binary(op: BinaryOp, lhs: &Expr, rhs: &Expr, input: &Node) -> Result<Vec<Node>> {
    match op {
        BinaryOp::Alternative => {
            let truthy: Vec<Node> = eval(lhs, input)?
                .into_iter()
                .filter(|n| is_truthy(&n.value))
                .collect();
            if truthy.is_empty() {
                eval(rhs, input)
            } else {
                Ok(truthy)
            }
        }
        BinaryOp::And | BinaryOp::Or => {
            let mut out = Vec::new();
            for left in eval(lhs, input)? {
                let left = is_truthy(&left.value);
                match (op, left) {
                    (BinaryOp::Or, true) => out.push(bool_node(true)),
                    (BinaryOp::And, false) => out.push(bool_node(false)),
                    _ => {
                        for right in eval(rhs, input)? {
                            out.push(bool_node(is_truthy(&right.value)));
                        }
                    }
                }
            }
            Ok(out)
        }
        _ => {
            let rights = eval(rhs, input)?;
            let mut out = Vec::new();
            for left in eval(lhs, input)? {
                for right in &rights {
                    out.push(Node::detached(apply_operator(op, &left.value, &right.value)?));
                }
            }
            Ok(out)
        }
    }
}

fn apply_operator(op: BinaryOp, lhs: &JsonValue, rhs: &JsonValue) -> Result<JsonValue> {
    let ordering = || compare(lhs, rhs);
    Ok(match op {
        BinaryOp::Eq => JsonValue::Bool(ordering() == Ordering::Equal),
        BinaryOp::Ne => JsonValue::Bool(ordering() != Ordering::Equal),
        BinaryOp::Lt => JsonValue::Bool(ordering() == Ordering::Less),
        BinaryOp::Le => JsonValue::Bool(ordering() != Ordering::Greater),
        BinaryOp::Gt => JsonValue::Bool(ordering() == Ordering::Greater),
        BinaryOp::Ge => JsonValue::Bool(ordering() != Ordering::Less),
        BinaryOp::Add => add(lhs, rhs)?,
        BinaryOp::Sub => subtract(lhs, rhs)?,
        BinaryOp::Alternative | BinaryOp::And | BinaryOp::Or => {
            return Err(ExprError::eval(format!("{} is not a value operator", op.symbol())));
        }
    })
}

fn add(lhs: &JsonValue, rhs: &JsonValue) -> Result<JsonValue> {
    match (lhs, rhs) {
        (JsonValue::Null, other) | (other, JsonValue::Null) => Ok(other.clone()),
        (JsonValue::Number(a), JsonValue::Number(b)) => Ok(number_result(
            a.as_i64().zip(b.as_i64()).and_then(|(a, b)| a.checked_add(b)),
            a.as_f64().unwrap_or_default() + b.as_f64().unwrap_or_default(),
        )),
        (JsonValue::String(a), JsonValue::String(b)) => Ok(JsonValue::String(format!("{a}{b}"))),
        (JsonValue::Array(a), JsonValue::Array(b)) => {
            Ok(JsonValue::Array(a.iter().chain(b).cloned().collect()))
        }
        (JsonValue::Object(a), JsonValue::Object(b)) => {
            let mut merged = a.clone();
            for (k, v) in b {
                merged.insert(k.clone(), v.clone());
            }
            Ok(JsonValue::Object(merged))
        }
        (a, b) => Err(ExprError::eval(format!(
            "{} and {} cannot be added",
            type_name(a),
            type_name(b)
        ))),
    }
}

fn subtract(lhs: &JsonValue, rhs: &JsonValue) -> Result<JsonValue> {
    match (lhs, rhs) {
        (JsonValue::Number(a), JsonValue::Number(b)) => Ok(number_result(
            a.as_i64().zip(b.as_i64()).and_then(|(a, b)| a.checked_sub(b)),
            a.as_f64().unwrap_or_default() - b.as_f64().unwrap_or_default(),
        )),
        (JsonValue::Array(a), JsonValue::Array(b)) => Ok(JsonValue::Array(
            a.iter()
                .filter(|item| !b.iter().any(|r| compare(item, r) == Ordering::Equal))
                .cloned()
                .collect(),
        )),
        (a, b) => Err(ExprError::eval(format!(
            "{} and {} cannot be subtracted",
            type_name(a),
            type_name(b)
        ))),
    }
}

fn number_result(int: Option<i64>, float: f64) -> JsonValue {
    match int {
        Some(i) => JsonValue::from(i),
        None => serde_json::Number::from_f64(float)
            .map(JsonValue::Number)
            .unwrap_or_default(),
    }
}

fn eval_assign(op: AssignOp, target: &Expr, value: &Expr, input: &Node) -> Result<Vec<Node>> {
    // targets are resolved relative to the current input, which may itself
    // sit anywhere inside the document
    let local = Node::root(input.value.clone());
    let targets = collect_paths(target, &local)?;

    let rebuild = |value: JsonValue| Node {
        value,
        path: input.path.clone(),
    };

    match op {
        AssignOp::Set | AssignOp::Add => {
            let mut out = Vec::new();
            for replacement in eval(value, input)? {
                let mut doc = input.value.clone();
                for path in &targets {
                    let new_value = if op == AssignOp::Add {
                        add(&get_path(&doc, path), &replacement.value)?
                    } else {
                        replacement.value.clone()
                    };
                    set_path(&mut doc, path, new_value)?;
                }
                out.push(rebuild(doc));
            }
            Ok(out)
        }
        AssignOp::Update => {
            let mut doc = input.value.clone();
            for path in &targets {
                let current = Node::detached(get_path(&doc, path));
                // an update yielding nothing leaves the target as it was
                if let Some(first) = eval(value, &current)?.into_iter().next() {
                    set_path(&mut doc, path, first.value)?;
                }
            }
            Ok(vec![rebuild(doc)])
        }
    }
}

fn collect_paths(expr: &Expr, input: &Node) -> Result<Vec<Vec<PathSegment>>> {
    eval(expr, input)?
        .into_iter()
        .map(|node| {
            node.path.ok_or_else(|| {
                ExprError::eval(format!("'{expr}' is not a path expression"))
            })
        })
        .collect()
}

fn call(name: &str, args: &[Expr], input: &Node) -> Result<Vec<Node>> {
    match (name, args) {
        ("empty", []) => Ok(Vec::new()),
        ("not", []) => Ok(vec![bool_node(!is_truthy(&input.value))]),
        ("length", []) => Ok(vec![Node::detached(length(&input.value)?)]),
        ("keys", []) => Ok(vec![Node::detached(keys(&input.value)?)]),
        ("select", [cond]) => {
            let keep = eval(cond, input)?.iter().any(|n| is_truthy(&n.value));
            Ok(if keep { vec![input.clone()] } else { Vec::new() })
        }
        ("map", [f]) => {
            let items = iterate(input)?;
            let mut mapped = Vec::new();
            for item in &items {
                mapped.extend(eval(f, item)?.into_iter().map(|n| n.value));
            }
            Ok(vec![Node::detached(JsonValue::Array(mapped))])
        }
        ("has", [key]) => {
            let mut out = Vec::new();
            for key in eval(key, input)? {
                out.push(bool_node(has(&input.value, &key.value)?));
            }
            Ok(out)
        }
        ("del", [target]) => {
            let mut targets = collect_paths(target, &Node::root(input.value.clone()))?;
            // deepest and highest indices first so earlier removals do not shift later ones
            targets.sort_by(|a, b| compare_paths(b, a));
            targets.dedup();
            let mut doc = input.value.clone();
            for path in &targets {
                delete_path(&mut doc, path);
            }
            Ok(vec![Node {
                value: doc,
                path: input.path.clone(),
            }])
        }
        ("test", [pattern]) | ("startswith", [pattern]) | ("endswith", [pattern]) => {
            let JsonValue::String(subject) = &input.value else {
                return Err(ExprError::eval(format!(
                    "{name} requires string input, got {}",
                    type_name(&input.value)
                )));
            };
            let mut out = Vec::new();
            for pattern in eval(pattern, input)? {
                let JsonValue::String(pattern) = &pattern.value else {
                    return Err(ExprError::eval(format!("{name} requires a string argument")));
                };
                let matched = match name {
                    "test" => Regex::new(pattern)
                        .map_err(|e| ExprError::eval(format!("invalid regex '{pattern}': {e}")))?
                        .is_match(subject),
                    "startswith" => subject.starts_with(pattern.as_str()),
                    _ => subject.ends_with(pattern.as_str()),
                };
                out.push(bool_node(matched));
            }
            Ok(out)
        }
        _ => Err(ExprError::UnknownFunction {
            name: name.to_string(),
            arity: args.len(),
        }),
    }
}

fn length(value: &JsonValue) -> Result<JsonValue> {
    Ok(match value {
        JsonValue::Null => JsonValue::from(0),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => JsonValue::from(i.unsigned_abs()),
            None => number_result(None, n.as_f64().unwrap_or_default().abs()),
        },
        JsonValue::String(s) => JsonValue::from(s.chars().count()),
        JsonValue::Array(items) => JsonValue::from(items.len()),
        JsonValue::Object(map) => JsonValue::from(map.len()),
        JsonValue::Bool(_) => return Err(ExprError::eval("boolean has no length")),
    })
}

fn keys(value: &JsonValue) -> Result<JsonValue> {
    match value {
        JsonValue::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            Ok(JsonValue::Array(
                keys.into_iter().map(|k| JsonValue::String(k.clone())).collect(),
            ))
        }
        JsonValue::Array(items) => Ok(JsonValue::Array(
            (0..items.len()).map(JsonValue::from).collect(),
        )),
        other => Err(ExprError::eval(format!("{} has no keys", type_name(other)))),
    }
}

fn has(value: &JsonValue, key: &JsonValue) -> Result<bool> {
    match (value, key) {
        (JsonValue::Object(map), JsonValue::String(k)) => Ok(map.contains_key(k)),
        (JsonValue::Array(items), JsonValue::Number(n)) => {
            Ok(n.as_u64().is_some_and(|i| (i as usize) < items.len()))
        }
        (v, k) => Err(ExprError::eval(format!(
            "cannot check whether {} has a {} key",
            type_name(v),
            type_name(k)
        ))),
    }
}

fn get_path(doc: &JsonValue, path: &[PathSegment]) -> JsonValue {
    path.iter()
        .try_fold(doc, |current, segment| match (segment, current) {
            (PathSegment::Key(k), JsonValue::Object(map)) => map.get(k),
            (PathSegment::Index(i), JsonValue::Array(items)) => items.get(*i),
            _ => None,
        })
        .cloned()
        .unwrap_or_default()
}

/// Assignments may pad an array with nulls by at most this many slots
const MAX_INDEX_GROWTH: usize = 1024;

fn set_path(doc: &mut JsonValue, path: &[PathSegment], value: JsonValue) -> Result<()> {
    let Some((segment, rest)) = path.split_first() else {
        *doc = value;
        return Ok(());
    };

    match segment {
        PathSegment::Key(key) => {
            if doc.is_null() {
                *doc = JsonValue::Object(serde_json::Map::new());
            }
            let JsonValue::Object(map) = doc else {
                return Err(ExprError::eval(format!(
                    "cannot set \"{key}\" on {}",
                    type_name(doc)
                )));
            };
            let child = map.entry(key.clone()).or_insert(JsonValue::Null);
            set_path(child, rest, value)
        }
        PathSegment::Index(idx) => {
            if doc.is_null() {
                *doc = JsonValue::Array(Vec::new());
            }
            let JsonValue::Array(items) = doc else {
                return Err(ExprError::eval(format!(
                    "cannot set index {idx} on {}",
                    type_name(doc)
                )));
            };
            if *idx > items.len().saturating_add(MAX_INDEX_GROWTH) {
                return Err(ExprError::eval(format!(
                    "index {idx} is too far past the end of an array of {}",
                    items.len()
                )));
            }
            if items.len() <= *idx {
                items.resize(idx + 1, JsonValue::Null);
            }
            set_path(&mut items[*idx], rest, value)
        }
    }
}

fn delete_path(doc: &mut JsonValue, path: &[PathSegment]) {
    let Some((last, parents)) = path.split_last() else {
        *doc = JsonValue::Null;
        return;
    };

    let parent = parents.iter().try_fold(doc, |current, segment| match (segment, current) {
        (PathSegment::Key(k), JsonValue::Object(map)) => map.get_mut(k),
        (PathSegment::Index(i), JsonValue::Array(items)) => items.get_mut(*i),
        _ => None,
    });

    match (last, parent) {
        (PathSegment::Key(k), Some(JsonValue::Object(map))) => {
            map.shift_remove(k);
        }
        (PathSegment::Index(i), Some(JsonValue::Array(items))) if *i < items.len() => {
            items.remove(*i);
        }
        _ => {}
    }
}

fn compare_paths(a: &[PathSegment], b: &[PathSegment]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        let ord = match (x, y) {
            (PathSegment::Index(x), PathSegment::Index(y)) => x.cmp(y),
            (PathSegment::Key(x), PathSegment::Key(y)) => x.cmp(y),
            (PathSegment::Index(_), PathSegment::Key(_)) => Ordering::Less,
            (PathSegment::Key(_), PathSegment::Index(_)) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

fn bool_node(value: bool) -> Node {
    Node::detached(JsonValue::Bool(value))
}

fn is_truthy(value: &JsonValue) -> bool {
    !matches!(value, JsonValue::Null | JsonValue::Bool(false))
}

fn type_rank(value: &JsonValue) -> u8 {
    match value {
        JsonValue::Null => 0,
        JsonValue::Bool(false) => 1,
        JsonValue::Bool(true) => 2,
        JsonValue::Number(_) => 3,
        JsonValue::String(_) => 4,
        JsonValue::Array(_) => 5,
        JsonValue::Object(_) => 6,
    }
}

/// Total order over values: null < false < true < numbers < strings < arrays < objects
fn compare(a: &JsonValue, b: &JsonValue) -> Ordering {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or_default(), y.as_f64().unwrap_or_default());
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (JsonValue::String(x), JsonValue::String(y)) => x.cmp(y),
        (JsonValue::Array(x), JsonValue::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(x, y)| compare(x, y))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (JsonValue::Object(x), JsonValue::Object(y)) => {
            let mut xk: Vec<&String> = x.keys().collect();
            let mut yk: Vec<&String> = y.keys().collect();
            xk.sort();
            yk.sort();
            xk.cmp(&yk).then_with(|| {
                xk.iter()
                    .map(|k| compare(&x[k.as_str()], &y[k.as_str()]))
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            })
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use serde_json::json;

    fn run(expression: &str, input: JsonValue) -> Vec<JsonValue> {
        evaluate(&parse(expression).unwrap(), &input).unwrap()
    }

    #[test]
    fn test_field_access_and_missing_keys() {
        let doc = json!({"metadata": {"name": "virt-operator"}});
        assert_eq!(run(".metadata.name", doc.clone()), vec![json!("virt-operator")]);
        assert_eq!(run(".spec.replicas", doc), vec![JsonValue::Null]);
    }

    #[test]
    fn test_iterate_and_select() {
        let doc = json!({"subjects": [
            {"kind": "ServiceAccount", "name": "kubevirt-operator"},
            {"kind": "ServiceAccount", "name": "prometheus"}
        ]});
        let out = run(r#".subjects[] | select(.name == "prometheus") | .kind"#, doc);
        assert_eq!(out, vec![json!("ServiceAccount")]);
    }

    #[test]
    fn test_set_creates_missing_parents() {
        let out = run(r#".metadata.labels.tier = "infra""#, json!({"kind": "Service"}));
        assert_eq!(
            out,
            vec![json!({"kind": "Service", "metadata": {"labels": {"tier": "infra"}}})]
        );
    }

    #[test]
    fn test_set_through_select_only_touches_matches() {
        let doc = json!({"subjects": [
            {"name": "kubevirt-operator", "namespace": "kubevirt"},
            {"name": "prometheus-k8s", "namespace": "monitoring"}
        ]});
        let out = run(
            r#"(.subjects[] | select(.name == "kubevirt-operator") .namespace) = "{{ .Release.Namespace }}""#,
            doc,
        );
        assert_eq!(
            out[0]["subjects"],
            json!([
                {"name": "kubevirt-operator", "namespace": "{{ .Release.Namespace }}"},
                {"name": "prometheus-k8s", "namespace": "monitoring"}
            ])
        );
    }

    #[test]
    fn test_assignment_with_no_targets_is_noop() {
        let doc = json!({"subjects": [{"name": "a"}]});
        let out = run(r#"(.subjects[] | select(.name == "zzz") .namespace) = "x""#, doc.clone());
        assert_eq!(out, vec![doc]);
    }

    #[test]
    fn test_update_and_add_assign() {
        let doc = json!({"spec": {"replicas": 1, "args": ["--v=2"]}});
        assert_eq!(run(".spec.replicas |= . + 2", doc.clone())[0]["spec"]["replicas"], json!(3));
        assert_eq!(
            run(r#".spec.args += ["--logtostderr"]"#, doc)[0]["spec"]["args"],
            json!(["--v=2", "--logtostderr"])
        );
    }

    #[test]
    fn test_length_of_most_negative_integer() {
        assert_eq!(run("length", json!(i64::MIN)), vec![json!(i64::MIN.unsigned_abs())]);
        assert_eq!(run("length", json!(-3)), vec![json!(3)]);
    }

    #[test]
    fn test_index_assignment_pads_within_limit() {
        let out = run(".a[2] = 1", json!({"a": []}));
        assert_eq!(out[0]["a"], json!([null, null, 1]));

        let err = evaluate(&parse(".a[9999999999] = 1").unwrap(), &json!({"a": []})).unwrap_err();
        assert!(err.to_string().contains("too far past the end"));
    }

    #[test]
    fn test_set_rhs_sees_whole_document() {
        let doc = json!({"metadata": {"name": "virt-api"}, "spec": {}});
        let out = run(".spec.serviceName = .metadata.name", doc);
        assert_eq!(out[0]["spec"]["serviceName"], json!("virt-api"));
    }

    #[test]
    fn test_del_removes_keys_and_elements() {
        let doc = json!({"metadata": {"name": "x", "annotations": {"a": "1"}}, "items": [0, 1, 2, 3]});
        let out = run("del(.metadata.annotations, .items[1], .items[2])", doc);
        assert_eq!(out, vec![json!({"metadata": {"name": "x"}, "items": [0, 3]})]);
    }

    #[test]
    fn test_alternative_and_functions() {
        let doc = json!({"metadata": {"labels": {"b": "2", "a": "1"}}, "kind": "ClusterRole"});
        assert_eq!(run(r#".spec // "none""#, doc.clone()), vec![json!("none")]);
        assert_eq!(run(".metadata.labels | keys", doc.clone()), vec![json!(["a", "b"])]);
        assert_eq!(run(".metadata.labels | length", doc.clone()), vec![json!(2)]);
        assert_eq!(run(r#".kind | test("^Cluster")"#, doc.clone()), vec![json!(true)]);
        assert_eq!(run(r#".kind | endswith("Role")"#, doc.clone()), vec![json!(true)]);
        assert_eq!(run(r#".metadata | has("labels")"#, doc.clone()), vec![json!(true)]);
        assert_eq!(run(".missing | not", doc), vec![json!(true)]);
    }

    #[test]
    fn test_map_and_constructors() {
        let doc = json!({"ports": [{"port": 80}, {"port": 443}]});
        assert_eq!(run(".ports | map(.port)", doc.clone()), vec![json!([80, 443])]);
        assert_eq!(run("[.ports[].port]", doc.clone()), vec![json!([80, 443])]);
        assert_eq!(
            run(r#"{"first": .ports[0].port, "count": (.ports | length)}"#, doc),
            vec![json!({"first": 80, "count": 2})]
        );
    }

    #[test]
    fn test_scalar_field_access_fails() {
        let err = evaluate(&parse(".kind.name").unwrap(), &json!({"kind": "Pod"})).unwrap_err();
        assert!(err.to_string().contains("cannot index string"));
    }

    #[test]
    fn test_literal_is_not_a_path() {
        let err = evaluate(&parse(r#""x" = 1"#).unwrap(), &json!({})).unwrap_err();
        assert!(err.to_string().contains("not a path expression"));
    }

    #[test]
    fn test_unknown_function() {
        let err = evaluate(&parse("frobnicate").unwrap(), &json!({})).unwrap_err();
        assert!(matches!(err, ExprError::UnknownFunction { .. }));
    }
}
