//! JSON tree reads and writes with realtime-database semantics.
//!
//! - `null`, `{}` and `[]` are the same thing: an absent node.
//! - Writing an absent value removes the node and prunes emptied parents.
//! - A numeric segment addresses an array slot. Writing past the end of an
//!   array turns it into an index-keyed object instead of padding it.

use serde_json::{Map, Value};

use super::StorePath;

/// An empty tree.
#[must_use]
pub fn empty_tree() -> Value {
    Value::Object(Map::new())
}

/// True for values that represent "no node".
#[must_use]
pub fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(fields) => fields.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Node at `path`, or `None` when it does not exist.
#[must_use]
pub fn get_at<'a>(root: &'a Value, path: &StorePath) -> Option<&'a Value> {
    let mut node = root;
    for segment in path.segments() {
        node = match node {
            Value::Object(fields) => fields.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if is_absent(node) {
        None
    } else {
        Some(node)
    }
}

/// Replace the node at `path`. `None` removes it.
pub fn set_at(root: &mut Value, path: &StorePath, value: Option<Value>) {
    let value = value.map(prune).filter(|value| !is_absent(value));
    match path.segments().split_first() {
        None => *root = value.unwrap_or_else(empty_tree),
        Some(_) => {
            set_in(root, path.segments(), value);
            if is_absent(root) {
                *root = empty_tree();
            }
        }
    }
}

fn set_in(node: &mut Value, segments: &[String], value: Option<Value>) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value.unwrap_or(Value::Null);
        return;
    };

    if is_absent(node) || !(node.is_object() || node.is_array()) {
        if value.is_none() {
            return;
        }
        *node = empty_tree();
    }

    if let Value::Array(items) = node {
        match head.parse::<usize>() {
            Ok(index) if index < items.len() => {
                set_in(&mut items[index], rest, value);
                trim_trailing_holes(items);
                return;
            }
            Ok(index) if index == items.len() => {
                if value.is_none() {
                    return;
                }
                items.push(Value::Null);
                set_in(&mut items[index], rest, value);
                trim_trailing_holes(items);
                return;
            }
            _ => {
                if value.is_none() {
                    return;
                }
                *node = array_to_object(std::mem::take(items));
            }
        }
    }

    if let Value::Object(fields) = node {
        let removing = value.is_none();
        let child = fields.entry(head.clone()).or_insert(Value::Null);
        set_in(child, rest, value);
        if removing || is_absent(child) {
            let emptied = fields.get(head).is_some_and(is_absent);
            if emptied {
                fields.remove(head);
            }
        }
    }
}

fn trim_trailing_holes(items: &mut Vec<Value>) {
    while items.last().is_some_and(is_absent) {
        items.pop();
    }
    for item in items.iter_mut() {
        if is_absent(item) {
            *item = Value::Null;
        }
    }
}

fn array_to_object(items: Vec<Value>) -> Value {
    let fields = items
        .into_iter()
        .enumerate()
        .filter(|(_, item)| !is_absent(item))
        .map(|(index, item)| (index.to_string(), item))
        .collect::<Map<_, _>>();
    Value::Object(fields)
}

/// Drop absent children recursively so stored values stay canonical.
#[must_use]
pub fn prune(value: Value) -> Value {
    match value {
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, child)| (key, prune(child)))
                .filter(|(_, child)| !is_absent(child))
                .collect(),
        ),
        Value::Array(items) => {
            let mut items = items.into_iter().map(prune).collect::<Vec<_>>();
            trim_trailing_holes(&mut items);
            Value::Array(items)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn path(raw: &str) -> StorePath {
        StorePath::parse(raw).unwrap()
    }

    #[test]
    fn get_missing_paths_is_none() {
        let tree = json!({ "calendar": { "u": { "20240101": { "memo": "hi" } } } });
        assert_eq!(
            get_at(&tree, &path("calendar/u/20240101/memo")),
            Some(&json!("hi"))
        );
        assert_eq!(get_at(&tree, &path("calendar/u/20240102")), None);
        assert_eq!(get_at(&tree, &path("calendar/u/20240101/memo/deeper")), None);
    }

    #[test]
    fn set_creates_intermediate_nodes() {
        let mut tree = empty_tree();
        set_at(&mut tree, &path("calendar/u/20240101/memo"), Some(json!("hello")));
        assert_eq!(
            tree,
            json!({ "calendar": { "u": { "20240101": { "memo": "hello" } } } })
        );
    }

    #[test]
    fn empty_string_is_a_value() {
        let mut tree = empty_tree();
        set_at(&mut tree, &path("a/memo"), Some(json!("")));
        assert_eq!(get_at(&tree, &path("a/memo")), Some(&json!("")));
    }

    #[test]
    fn removing_last_child_prunes_parents() {
        let mut tree = empty_tree();
        set_at(&mut tree, &path("calendar/u/d/memo"), Some(json!("x")));
        set_at(&mut tree, &path("calendar/u/d/memo"), None);
        assert_eq!(tree, empty_tree());
    }

    #[test]
    fn writing_empty_containers_removes_the_node() {
        let mut tree = json!({ "d": { "reminder": ["a"], "memo": "m" } });
        set_at(&mut tree, &path("d/reminder"), Some(json!([])));
        assert_eq!(tree, json!({ "d": { "memo": "m" } }));
    }

    #[test]
    fn array_slots_are_addressable() {
        let mut tree = json!({ "note": [{ "c": "a" }, { "c": "b" }] });
        set_at(&mut tree, &path("note/1"), Some(json!({ "c": "B" })));
        set_at(&mut tree, &path("note/2"), Some(json!({ "c": "C" })));
        assert_eq!(
            tree,
            json!({ "note": [{ "c": "a" }, { "c": "B" }, { "c": "C" }] })
        );
    }

    #[test]
    fn writing_past_the_end_switches_to_keyed_object() {
        let mut tree = json!({ "note": ["a"] });
        set_at(&mut tree, &path("note/3"), Some(json!("d")));
        assert_eq!(tree, json!({ "note": { "0": "a", "3": "d" } }));
    }

    #[test]
    fn writing_index_into_absent_node_creates_keyed_object() {
        let mut tree = empty_tree();
        set_at(&mut tree, &path("day/note/0"), Some(json!("first")));
        assert_eq!(tree, json!({ "day": { "note": { "0": "first" } } }));
    }

    #[test]
    fn removing_array_slot_leaves_a_hole_except_at_the_end() {
        let mut tree = json!({ "r": ["a", "b", "c"] });
        set_at(&mut tree, &path("r/1"), None);
        assert_eq!(tree, json!({ "r": ["a", null, "c"] }));
        set_at(&mut tree, &path("r/2"), None);
        assert_eq!(tree, json!({ "r": ["a"] }));
    }

    #[test]
    fn prune_strips_nulls_inside_objects() {
        let value = prune(json!({ "a": null, "b": { "c": {} }, "d": [1, null, null] }));
        assert_eq!(value, json!({ "d": [1] }));
    }

    #[test]
    fn root_write_replaces_tree() {
        let mut tree = json!({ "a": 1 });
        set_at(&mut tree, &StorePath::root(), None);
        assert_eq!(tree, empty_tree());
    }
}
