use std::collections::HashMap;
use std::hash::Hash;

use serde_json::{Map, Value};

/// Groups in first-seen key order; members keep their input order.
#[derive(Debug, Clone, PartialEq)]
pub struct Grouped<K, T> {
    groups: Vec<(K, Vec<T>)>,
}

impl<K, T> Grouped<K, T> {
    pub fn into_inner(self) -> Vec<(K, Vec<T>)> {
        self.groups
    }
}

/// Partition `items` by `key`.
pub fn group_by<T, K, F>(items: impl IntoIterator<Item = T>, mut key: F) -> Grouped<K, T>
where
    K: Eq + Hash + Clone,
    F: FnMut(&T) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<T>)> = Vec::new();
    for item in items {
        let k = key(&item);
        match index.get(&k) {
            Some(&slot) => groups[slot].1.push(item),
            None => {
                index.insert(k.clone(), groups.len());
                groups.push((k, vec![item]));
            }
        }
    }
    Grouped { groups }
}

/// Text used as the group key for a field value; a missing field groups under `"null"`.
fn key_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "null".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Group shaped JSON items by a dotted field into a JSON object.
pub fn group_values(items: Vec<Value>, field: &str) -> Value {
    let grouped = group_by(items, |item| {
        key_text(field.split('.').try_fold(item, |v, seg| v.get(seg)))
    });
    let out: Map<String, Value> = grouped
        .into_inner()
        .into_iter()
        .map(|(k, members)| (k, Value::Array(members)))
        .collect();
    Value::Object(out)
}
