//! JSON conversion and snapshots.
//!
//! JSON literals are the most convenient way to build nested raw data, and
//! an untracked JSON snapshot is the most convenient way to compare state in
//! tests and logs. Snapshots see through wrappers and refs and are
//! cycle-safe: an object reached again on the current path renders as
//! `null`.

use std::collections::HashSet;

use serde::{Serialize, Serializer};
use serde_json::{Map as JsonMap, Number, Value as Json};

use super::{Obj, ObjectId, Shape, Value};
use crate::observe::to_raw;
use crate::reactive::untracked;

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::from(s),
            Json::Array(items) => {
                Value::Object(Obj::list(items.into_iter().map(Value::from)))
            }
            Json::Object(props) => Value::Object(Obj::record_from(
                props.into_iter().map(|(k, v)| (k, Value::from(v))),
            )),
        }
    }
}

impl Value {
    /// Untracked JSON snapshot of this value.
    ///
    /// `Undefined` renders as `null`, maps as `[[key, value], ...]`, sets as
    /// arrays and opaque objects as their type name.
    pub fn to_json(&self) -> Json {
        untracked(|| snapshot(self, &mut HashSet::new()))
    }
}

/// Integral numbers render as JSON integers.
fn number(n: f64) -> Json {
    const SAFE: f64 = 9_007_199_254_740_992.0;
    if n.fract() == 0.0 && n.abs() < SAFE {
        return Json::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map_or(Json::Null, Json::Number)
}

fn snapshot(value: &Value, path: &mut HashSet<ObjectId>) -> Json {
    match value {
        Value::Undefined | Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => number(*n),
        Value::String(s) => Json::String(s.to_string()),
        Value::Ref(r) => snapshot(&r.get(), path),
        Value::Reactive(_) => match to_raw(value) {
            Value::Object(obj) => snapshot_object(&obj, path),
            other => snapshot(&other, path),
        },
        Value::Object(obj) => snapshot_object(obj, path),
    }
}

fn snapshot_object(obj: &Obj, path: &mut HashSet<ObjectId>) -> Json {
    if !path.insert(obj.id()) {
        return Json::Null;
    }
    // Clone out before recursing so no borrow is held across user refs.
    let shape = obj.shape().clone();
    let json = match shape {
        Shape::Record(props) => {
            let mut out = JsonMap::new();
            for (key, value) in props {
                out.insert(key.to_string(), snapshot(&value, path));
            }
            Json::Object(out)
        }
        Shape::List(items) => Json::Array(items.iter().map(|v| snapshot(v, path)).collect()),
        Shape::Map { entries, .. } => Json::Array(
            entries
                .iter()
                .map(|(k, v)| Json::Array(vec![snapshot(&k.0, path), snapshot(v, path)]))
                .collect(),
        ),
        Shape::Set { items, .. } => {
            Json::Array(items.iter().map(|k| snapshot(&k.0, path)).collect())
        }
        Shape::Opaque(name) => Json::String(name.to_string()),
    };
    path.remove(&obj.id());
    json
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
