//! Untyped request parameter bag
//!
//! Decodes a query string into a tree using the bracket conventions list
//! views already send:
//!
//! - `a=1` → scalar
//! - `a[]=1&a[]=2` → list
//! - `a[b]=1`, `a[b][]=1`, `a[b][c]=1` → nested maps
//!
//! Repeating a plain key (`a=1&a=2`) also yields a list. Empty values are
//! treated as absent.

use std::collections::BTreeMap;

/// A nested map of parameters
pub type ParamMap = BTreeMap<String, ParamValue>;

/// A single node of the parameter tree
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Scalar(String),
    List(Vec<ParamValue>),
    Map(ParamMap),
}

impl ParamValue {
    /// The value as a single string, `None` for lists and maps
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Scalar(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// The value as a nested map
    pub fn as_map(&self) -> Option<&ParamMap> {
        match self {
            ParamValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Flatten the value into its scalar members.
    ///
    /// A scalar becomes a one-element list; index-keyed maps (`a[0]=x`) are
    /// read as lists. Empty strings are dropped.
    pub fn scalars(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_scalars(&mut out);
        out
    }

    fn collect_scalars<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            ParamValue::Scalar(s) => {
                let trimmed = s.trim();
                if !trimmed.is_empty() {
                    out.push(trimmed);
                }
            }
            ParamValue::List(items) => items.iter().for_each(|i| i.collect_scalars(out)),
            ParamValue::Map(map) => map.values().for_each(|v| v.collect_scalars(out)),
        }
    }

    /// Whether the value holds anything other than empty strings
    pub fn is_blank(&self) -> bool {
        self.scalars().is_empty()
    }

    /// Comma-separated scalars and list members, flattened and trimmed.
    pub fn comma_list(&self) -> Vec<String> {
        self.scalars()
            .into_iter()
            .flat_map(|s| s.split(','))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}

/// The parameter bag for one request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamBag {
    params: ParamMap,
}

impl ParamBag {
    /// Decode a raw (still percent-encoded) query string
    pub fn from_query(query: &str) -> Self {
        Self::from_pairs(
            url::form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned())),
        )
    }

    /// Build a bag from already-decoded key/value pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = ParamMap::new();
        for (key, value) in pairs {
            let value = value.into();
            if value.trim().is_empty() {
                continue;
            }
            let path = split_key(key.as_ref());
            if path.is_empty() || path[0].is_empty() {
                continue;
            }
            insert(&mut params, &path, value);
        }
        Self { params }
    }

    /// Wrap an existing map (used for nested relation parameters)
    pub fn from_map(params: ParamMap) -> Self {
        Self { params }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }

    /// A trimmed, non-empty scalar parameter
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(ParamValue::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.params.iter()
    }
}

/// Split `a[b][]` into `["a", "b", ""]`. Malformed brackets keep the whole
/// key as a plain name.
fn split_key(key: &str) -> Vec<&str> {
    let Some(open) = key.find('[') else {
        return vec![key];
    };

    let mut path = vec![&key[..open]];
    let mut rest = &key[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            return vec![key];
        };
        path.push(&stripped[..close]);
        rest = &stripped[close + 1..];
    }

    if rest.is_empty() { path } else { vec![key] }
}

fn insert(map: &mut ParamMap, path: &[&str], value: String) {
    let key = path[0].to_string();
    let rest = &path[1..];

    if rest.is_empty() {
        match map.get_mut(&key) {
            None => {
                map.insert(key, ParamValue::Scalar(value));
            }
            Some(ParamValue::List(items)) => items.push(ParamValue::Scalar(value)),
            Some(existing @ ParamValue::Scalar(_)) => {
                let previous = std::mem::replace(existing, ParamValue::List(Vec::new()));
                *existing = ParamValue::List(vec![previous, ParamValue::Scalar(value)]);
            }
            // `a[b]=1&a=2`: the nested form wins
            Some(ParamValue::Map(_)) => {}
        }
        return;
    }

    if rest[0].is_empty() {
        let entry = map
            .entry(key)
            .or_insert_with(|| ParamValue::List(Vec::new()));
        if let ParamValue::Scalar(previous) = entry {
            *entry = ParamValue::List(vec![ParamValue::Scalar(std::mem::take(previous))]);
        }
        if let ParamValue::List(items) = entry {
            if rest.len() == 1 {
                items.push(ParamValue::Scalar(value));
            } else {
                let mut nested = ParamMap::new();
                insert(&mut nested, &rest[1..], value);
                items.push(ParamValue::Map(nested));
            }
        }
        return;
    }

    let entry = map
        .entry(key)
        .or_insert_with(|| ParamValue::Map(ParamMap::new()));
    if !matches!(entry, ParamValue::Map(_)) {
        *entry = ParamValue::Map(ParamMap::new());
    }
    if let ParamValue::Map(nested) = entry {
        insert(nested, rest, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_key() {
        assert_eq!(split_key("search"), vec!["search"]);
        assert_eq!(split_key("ids[]"), vec!["ids", ""]);
        assert_eq!(split_key("column_filters[active]"), vec!["column_filters", "active"]);
        assert_eq!(split_key("a[b][]"), vec!["a", "b", ""]);
        assert_eq!(split_key("broken[key"), vec!["broken[key"]);
        assert_eq!(split_key("trailing[a]x"), vec!["trailing[a]x"]);
    }

    #[test]
    fn test_scalar_and_list_params() {
        let bag = ParamBag::from_query("search=algo&schools%5B%5D=3&schools%5B%5D=7");
        assert_eq!(bag.get_str("search"), Some("algo"));
        assert_eq!(bag.get("schools").unwrap().scalars(), vec!["3", "7"]);
    }

    #[test]
    fn test_repeated_plain_key_becomes_list() {
        let bag = ParamBag::from_pairs([("id", "1"), ("id", "2")]);
        assert_eq!(bag.get("id").unwrap().scalars(), vec!["1", "2"]);
    }

    #[test]
    fn test_nested_maps() {
        let bag = ParamBag::from_pairs([
            ("relation_params[classroom][fields]", "id,name"),
            ("relation_params[classroom][column_filters][active]", "1"),
            ("column_filters[id][]", "4"),
        ]);

        let classroom = bag
            .get("relation_params")
            .and_then(ParamValue::as_map)
            .and_then(|m| m.get("classroom"))
            .and_then(ParamValue::as_map)
            .unwrap();
        assert_eq!(classroom.get("fields").unwrap().as_str(), Some("id,name"));

        let id = bag
            .get("column_filters")
            .and_then(ParamValue::as_map)
            .and_then(|m| m.get("id"))
            .unwrap();
        assert_eq!(id.scalars(), vec!["4"]);
    }

    #[test]
    fn test_empty_values_are_absent() {
        let bag = ParamBag::from_query("search=&page=2");
        assert!(bag.get("search").is_none());
        assert_eq!(bag.get_str("page"), Some("2"));
    }

    #[test]
    fn test_comma_list() {
        let value = ParamValue::List(vec![
            ParamValue::Scalar("a, b".into()),
            ParamValue::Scalar("c".into()),
        ]);
        assert_eq!(value.comma_list(), vec!["a", "b", "c"]);
    }
}
