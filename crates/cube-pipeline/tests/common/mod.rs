//! In-memory evaluator for the subset of the aggregation language that cube
//! pipelines and their queries use: `$group`, `$project`, `$set`, `$sort`,
//! `$limit` and `$out` (ignored), with `$cond`, `$eq`, `$gt` and `$divide`
//! expressions.

#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::{Map, Value};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Run a JSON pipeline over `docs`.
pub fn run(pipeline: &Value, mut docs: Vec<Value>) -> Vec<Value> {
    for stage in pipeline.as_array().expect("pipeline must be an array") {
        let (kind, body) = stage
            .as_object()
            .and_then(|stage| stage.iter().next())
            .expect("stage must be a single-key object");
        docs = match kind.as_str() {
            "$group" => exec_group(docs, body),
            "$project" => docs.iter().map(|doc| exec_project(doc, body)).collect(),
            "$set" => docs.iter().map(|doc| exec_set(doc, body)).collect(),
            "$sort" => exec_sort(docs, body),
            "$limit" => {
                docs.truncate(body.as_u64().expect("$limit takes a number") as usize);
                docs
            }
            "$out" => docs,
            other => panic!("evaluator does not support {}", other),
        };
    }
    docs
}

/// Order documents by their serialized `_id` so grouping order does not matter.
pub fn sorted_by_id(mut docs: Vec<Value>) -> Vec<Value> {
    docs.sort_by_key(|doc| serde_json::to_string(&doc["_id"]).unwrap());
    docs
}

pub fn resolve_field(doc: &Value, path: &str) -> Value {
    let mut current = doc;
    for part in path.split('.') {
        match current.get(part) {
            Some(value) => current = value,
            None => return Value::Null,
        }
    }
    current.clone()
}

pub fn set_field(doc: &mut Value, path: &str, value: Value) {
    let parts: Vec<&str> = path.split('.').collect();
    let mut current = doc;
    for (i, part) in parts.iter().enumerate() {
        let map = current.as_object_mut().expect("can only set fields on objects");
        if i == parts.len() - 1 {
            map.insert(part.to_string(), value);
            return;
        }
        if !map.get(*part).map(Value::is_object).unwrap_or(false) {
            map.insert(part.to_string(), Value::Object(Map::new()));
        }
        current = map.get_mut(*part).unwrap();
    }
}

fn number_to_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        _ => true,
    }
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn args<'a>(operator: &str, value: &'a Value, n: usize) -> &'a [Value] {
    let items = value
        .as_array()
        .unwrap_or_else(|| panic!("{} takes an array", operator));
    assert_eq!(items.len(), n, "{} takes {} arguments", operator, n);
    items
}

pub fn eval(expr: &Value, doc: &Value) -> Value {
    match expr {
        Value::String(s) if s.starts_with('$') && !s.starts_with("$$") => {
            resolve_field(doc, &s[1..])
        }
        Value::Object(map) if map.keys().any(|k| k.starts_with('$')) => {
            let (operator, operand) = map.iter().next().unwrap();
            match operator.as_str() {
                "$cond" => {
                    let (condition, then, otherwise) = match operand {
                        Value::Array(_) => {
                            let items = args("$cond", operand, 3);
                            (&items[0], &items[1], &items[2])
                        }
                        _ => (&operand["if"], &operand["then"], &operand["else"]),
                    };
                    if truthy(&eval(condition, doc)) {
                        eval(then, doc)
                    } else {
                        eval(otherwise, doc)
                    }
                }
                "$eq" => {
                    let items = args("$eq", operand, 2);
                    let (a, b) = (eval(&items[0], doc), eval(&items[1], doc));
                    Value::Bool(compare(&a, &b) == Ordering::Equal)
                }
                "$gt" => {
                    let items = args("$gt", operand, 2);
                    let (a, b) = (eval(&items[0], doc), eval(&items[1], doc));
                    Value::Bool(compare(&a, &b) == Ordering::Greater)
                }
                "$divide" => {
                    let items = args("$divide", operand, 2);
                    match (eval(&items[0], doc).as_f64(), eval(&items[1], doc).as_f64()) {
                        (Some(a), Some(b)) => {
                            assert!(b != 0.0, "division by zero");
                            number_to_value(a / b)
                        }
                        _ => Value::Null,
                    }
                }
                other => panic!("evaluator does not support {}", other),
            }
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), eval(v, doc)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| eval(v, doc)).collect()),
        literal => literal.clone(),
    }
}

enum State {
    Sum(f64),
    Avg(f64, u64),
    Min(Option<Value>),
    Max(Option<Value>),
}

impl State {
    fn new(operator: &str) -> Self {
        match operator {
            "$sum" => State::Sum(0.0),
            "$avg" => State::Avg(0.0, 0),
            "$min" => State::Min(None),
            "$max" => State::Max(None),
            other => panic!("evaluator does not support {}", other),
        }
    }

    fn add(&mut self, value: Value) {
        match self {
            State::Sum(sum) => {
                if let Some(n) = value.as_f64() {
                    *sum += n;
                }
            }
            State::Avg(sum, count) => {
                if let Some(n) = value.as_f64() {
                    *sum += n;
                    *count += 1;
                }
            }
            State::Min(current) => {
                if !value.is_null()
                    && current
                        .as_ref()
                        .map(|c| compare(&value, c) == Ordering::Less)
                        .unwrap_or(true)
                {
                    *current = Some(value);
                }
            }
            State::Max(current) => {
                if !value.is_null()
                    && current
                        .as_ref()
                        .map(|c| compare(&value, c) == Ordering::Greater)
                        .unwrap_or(true)
                {
                    *current = Some(value);
                }
            }
        }
    }

    fn finish(self) -> Value {
        match self {
            State::Sum(sum) => number_to_value(sum),
            State::Avg(_, 0) => Value::Null,
            State::Avg(sum, count) => number_to_value(sum / count as f64),
            State::Min(value) | State::Max(value) => value.unwrap_or(Value::Null),
        }
    }
}

fn exec_group(docs: Vec<Value>, body: &Value) -> Vec<Value> {
    let body = body.as_object().expect("$group takes an object");
    let id_expr = &body["_id"];
    let accumulators: Vec<(&String, &str, &Value)> = body
        .iter()
        .filter(|(field, _)| field.as_str() != "_id")
        .map(|(field, acc)| {
            let (operator, operand) = acc.as_object().unwrap().iter().next().unwrap();
            (field, operator.as_str(), operand)
        })
        .collect();

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, (Value, Vec<State>)> = HashMap::new();
    for doc in &docs {
        let key = eval(id_expr, doc);
        let key_str = serde_json::to_string(&key).unwrap();
        let (_, states) = groups.entry(key_str.clone()).or_insert_with(|| {
            order.push(key_str.clone());
            let states = accumulators.iter().map(|(_, op, _)| State::new(op)).collect();
            (key, states)
        });
        for (state, (_, _, operand)) in states.iter_mut().zip(&accumulators) {
            state.add(eval(operand, doc));
        }
    }

    order
        .into_iter()
        .map(|key| {
            let (id, states) = groups.remove(&key).unwrap();
            let mut out = Map::new();
            out.insert("_id".to_string(), id);
            for (state, (field, _, _)) in states.into_iter().zip(&accumulators) {
                out.insert(field.to_string(), state.finish());
            }
            Value::Object(out)
        })
        .collect()
}

fn exec_project(doc: &Value, body: &Value) -> Value {
    let body = body.as_object().expect("$project takes an object");
    let mut out = Value::Object(Map::new());
    if body.get("_id") != Some(&Value::from(0)) {
        set_field(&mut out, "_id", resolve_field(doc, "_id"));
    }
    for (field, rule) in body {
        if field == "_id" {
            continue;
        }
        match rule {
            Value::Number(n) if n.as_i64() == Some(0) => {}
            Value::Number(n) if n.as_i64() == Some(1) => {
                let value = resolve_field(doc, field);
                if !value.is_null() {
                    set_field(&mut out, field, value);
                }
            }
            expr => set_field(&mut out, field, eval(expr, doc)),
        }
    }
    out
}

fn exec_set(doc: &Value, body: &Value) -> Value {
    let mut out = doc.clone();
    for (field, expr) in body.as_object().expect("$set takes an object") {
        set_field(&mut out, field, eval(expr, doc));
    }
    out
}

fn exec_sort(mut docs: Vec<Value>, body: &Value) -> Vec<Value> {
    let keys: Vec<(String, i64)> = body
        .as_object()
        .expect("$sort takes an object")
        .iter()
        .map(|(field, dir)| (field.clone(), dir.as_i64().unwrap()))
        .collect();
    docs.sort_by(|a, b| {
        for (field, dir) in &keys {
            let ordering = compare(&resolve_field(a, field), &resolve_field(b, field));
            let ordering = if *dir < 0 { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    docs
}
