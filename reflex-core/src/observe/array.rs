//! List instrumentation shared by both backends.
//!
//! Length-changing methods run against the raw list with tracking paused,
//! then report the whole mutation as one trigger batch computed by
//! [`rearrange`]: a `length` write when the length changed, followed by one
//! event per index whose slot was added, changed or removed.
//!
//! Search methods track `length` and every index, search the raw items and
//! retry with the raw form of the needle when the first pass misses.

use super::wrapper::{Reactive, Target};
use super::{to_raw, wrap_for};
use crate::diagnostics::{warn, Warning};
use crate::reactive::{
    track, trigger_batch, untracked, TrackKey, TrackOp, TriggerEvent, TriggerOp,
};
use crate::value::{has_changed, same_value_zero, PropKey, Shape, Value};

/// One length-changing list method call.
#[derive(Debug, Clone)]
pub(crate) enum ListEdit {
    Push(Vec<Value>),
    Pop,
    Shift,
    Unshift(Vec<Value>),
    Splice {
        start: isize,
        delete_count: Option<usize>,
        items: Vec<Value>,
    },
    Reverse,
}

impl ListEdit {
    /// Remove exactly the item at `index`.
    pub fn remove_at(index: usize) -> Self {
        Self::Splice {
            start: index as isize,
            delete_count: Some(1),
            items: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Push(_) => "push",
            Self::Pop => "pop",
            Self::Shift => "shift",
            Self::Unshift(_) => "unshift",
            Self::Splice { .. } => "splice",
            Self::Reverse => "reverse",
        }
    }

    fn map_items(self, f: impl Fn(&Value) -> Value) -> Self {
        let map = |items: Vec<Value>| -> Vec<Value> { items.iter().map(&f).collect() };
        match self {
            Self::Push(items) => Self::Push(map(items)),
            Self::Unshift(items) => Self::Unshift(map(items)),
            Self::Splice {
                start,
                delete_count,
                items,
            } => Self::Splice {
                start,
                delete_count,
                items: map(items),
            },
            other => other,
        }
    }

    /// Apply to `items`. Returns the removed items and the first index whose
    /// slot may have changed.
    fn apply(self, items: &mut Vec<Value>) -> (Vec<Value>, usize) {
        let len = items.len();
        match self {
            Self::Push(values) => {
                items.extend(values);
                (Vec::new(), len)
            }
            Self::Pop => match items.pop() {
                Some(last) => (vec![last], len - 1),
                None => (Vec::new(), len),
            },
            Self::Shift => {
                if items.is_empty() {
                    (Vec::new(), 0)
                } else {
                    (vec![items.remove(0)], 0)
                }
            }
            Self::Unshift(values) => {
                items.splice(0..0, values);
                (Vec::new(), 0)
            }
            Self::Splice {
                start,
                delete_count,
                items: values,
            } => {
                let start = resolve_start(start, len);
                let count = delete_count.map_or(len - start, |n| n.min(len - start));
                let removed = items.splice(start..start + count, values).collect();
                (removed, start)
            }
            Self::Reverse => {
                items.reverse();
                (Vec::new(), 0)
            }
        }
    }
}

/// Clamp a possibly negative splice start into `0..=len`.
fn resolve_start(start: isize, len: usize) -> usize {
    if start < 0 {
        len.saturating_sub(start.unsigned_abs())
    } else {
        (start as usize).min(len)
    }
}

/// The trigger events turning `old` into `new`, where nothing before
/// `start` changed.
pub(crate) fn rearrange(old: &[Value], new: &[Value], start: usize) -> Vec<TriggerEvent> {
    let mut events = Vec::new();

    if old.len() != new.len() {
        events.push(
            TriggerEvent::new(TriggerOp::Set, TrackKey::Prop(PropKey::length())).with_values(
                Some(Value::from(new.len())),
                Some(Value::from(old.len())),
            ),
        );
    }

    for i in start..old.len().max(new.len()) {
        let key = TrackKey::Prop(PropKey::from(i));
        match (old.get(i), new.get(i)) {
            (Some(before), Some(after)) => {
                if has_changed(after, before) {
                    events.push(
                        TriggerEvent::new(TriggerOp::Set, key)
                            .with_values(Some(after.clone()), Some(before.clone())),
                    );
                }
            }
            (None, Some(after)) => events.push(
                TriggerEvent::new(TriggerOp::Add, key).with_values(Some(after.clone()), None),
            ),
            (Some(before), None) => events.push(
                TriggerEvent::new(TriggerOp::Delete, key).with_values(None, Some(before.clone())),
            ),
            (None, None) => {}
        }
    }

    events
}

/// Run a length-changing method. Returns the removed items, wrapped like
/// reads through `wrapper`, or `None` when the wrapper is read-only.
pub(crate) fn mutate(wrapper: &Reactive, edit: ListEdit) -> Option<Vec<Value>> {
    let variant = wrapper.variant();
    if variant.is_readonly() {
        warn(Warning::ReadonlyMethod {
            method: edit.name().to_string(),
        });
        return None;
    }

    let edit = if variant.is_shallow() {
        edit
    } else {
        edit.map_items(to_raw)
    };

    let raw = wrapper.raw();
    let name = edit.name();
    let (old, new, removed, start) = untracked(|| {
        let mut shape = raw.shape_mut();
        let Shape::List(items) = &mut *shape else {
            return None;
        };
        let old = items.clone();
        let (removed, start) = edit.apply(items);
        Some((old, items.clone(), removed, start))
    })?;

    wrapper.list_mutated();

    let events = rearrange(&old, &new, start);
    tracing::trace!(method = name, events = events.len(), "list mutation");
    trigger_batch(raw, &events);

    Some(
        removed
            .into_iter()
            .map(|value| wrap_for(variant, value))
            .collect(),
    )
}

/// List search methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SearchMethod {
    /// SameValueZero membership.
    Includes,
    /// Strict equality, first match.
    IndexOf,
    /// Strict equality, last match.
    LastIndexOf,
}

impl SearchMethod {
    fn find(self, items: &[Value], needle: &Value) -> Option<usize> {
        match self {
            Self::Includes => items.iter().position(|item| same_value_zero(item, needle)),
            Self::IndexOf => items.iter().position(|item| strict_equals(item, needle)),
            Self::LastIndexOf => items.iter().rposition(|item| strict_equals(item, needle)),
        }
    }
}

/// Strict equality: SameValueZero except that NaN never matches.
fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y,
        _ => same_value_zero(a, b),
    }
}

/// Search the list behind `wrapper`.
pub(crate) fn search(wrapper: &Reactive, method: SearchMethod, needle: &Value) -> Option<usize> {
    if let Target::Observed(inner) = wrapper.target() {
        return search(inner, method, needle);
    }

    let raw = wrapper.raw();
    let items = raw.list_items();
    if !wrapper.variant().is_readonly() {
        track(raw, TrackOp::Get, TrackKey::Prop(PropKey::length()));
        for i in 0..items.len() {
            track(raw, TrackOp::Get, TrackKey::Prop(PropKey::from(i)));
        }
    }

    method
        .find(&items, needle)
        .or_else(|| method.find(&items, &to_raw(needle)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nums(values: &[i32]) -> Vec<Value> {
        values.iter().map(|&n| Value::from(n)).collect()
    }

    fn ops(events: &[TriggerEvent]) -> Vec<(TriggerOp, String)> {
        events
            .iter()
            .map(|e| (e.op, e.key.as_ref().map(ToString::to_string).unwrap_or_default()))
            .collect()
    }

    #[test]
    fn push_adds_one_index() {
        let events = rearrange(&nums(&[1, 2]), &nums(&[1, 2, 3]), 2);
        assert_eq!(
            ops(&events),
            vec![
                (TriggerOp::Set, "length".to_string()),
                (TriggerOp::Add, "2".to_string()),
            ]
        );
    }

    #[test]
    fn pop_is_a_single_trailing_delete() {
        let events = rearrange(&nums(&[1, 2, 3]), &nums(&[1, 2]), 2);
        assert_eq!(
            ops(&events),
            vec![
                (TriggerOp::Set, "length".to_string()),
                (TriggerOp::Delete, "2".to_string()),
            ]
        );
    }

    #[test]
    fn shift_sets_every_moved_index() {
        let events = rearrange(&nums(&[1, 2, 3]), &nums(&[2, 3]), 0);
        assert_eq!(
            ops(&events),
            vec![
                (TriggerOp::Set, "length".to_string()),
                (TriggerOp::Set, "0".to_string()),
                (TriggerOp::Set, "1".to_string()),
                (TriggerOp::Delete, "2".to_string()),
            ]
        );
    }

    #[test]
    fn unchanged_slots_are_skipped() {
        let events = rearrange(&nums(&[1, 2, 1]), &nums(&[1, 2, 1]), 0);
        assert!(events.is_empty());
    }

    #[test]
    fn splice_resolves_negative_and_open_ranges() {
        let mut items = nums(&[1, 2, 3, 4]);
        let edit = ListEdit::Splice {
            start: -2,
            delete_count: None,
            items: nums(&[9]),
        };
        let (removed, start) = edit.apply(&mut items);
        assert_eq!(removed, nums(&[3, 4]));
        assert_eq!(start, 2);
        assert_eq!(items, nums(&[1, 2, 9]));

        let (removed, _) = ListEdit::remove_at(0).apply(&mut items);
        assert_eq!(removed, nums(&[1]));
        assert_eq!(items, nums(&[2, 9]));
    }

    #[test]
    fn index_of_never_matches_nan() {
        let items = vec![Value::from(f64::NAN)];
        let nan = Value::from(f64::NAN);
        assert_eq!(SearchMethod::Includes.find(&items, &nan), Some(0));
        assert_eq!(SearchMethod::IndexOf.find(&items, &nan), None);
    }
}
