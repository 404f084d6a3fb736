//! Field decoders for compose service entries
//!
//! Compose lets most fields be written in more than one shape: `command`
//! can be a string or a list, `environment` a map or a list of `KEY=VALUE`
//! strings, `networks` a name, a list or a map. Each decoder here accepts
//! any node and returns the normalized form, ignoring shapes it does not
//! understand.

use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

/// Shape of a YAML node, with tags stripped
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    /// String, number or boolean
    Scalar(&'a Value),
    /// Sequence of nodes
    Sequence(&'a [Value]),
    /// Mapping of nodes
    Mapping(&'a Mapping),
    /// Explicit null or empty value
    Null,
}

impl<'a> Node<'a> {
    /// Classify a YAML value
    pub fn of(value: &'a Value) -> Self {
        match value {
            Value::Null => Node::Null,
            Value::Bool(_) | Value::Number(_) | Value::String(_) => Node::Scalar(value),
            Value::Sequence(seq) => Node::Sequence(seq),
            Value::Mapping(map) => Node::Mapping(map),
            Value::Tagged(tagged) => Node::of(&tagged.value),
        }
    }
}

/// Render a scalar node as text
pub fn scalar_text(value: &Value) -> Option<String> {
    match Node::of(value) {
        Node::Scalar(Value::String(s)) => Some(s.clone()),
        Node::Scalar(Value::Number(n)) => Some(n.to_string()),
        Node::Scalar(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    }
}

/// Decode a single-valued field such as `image`
pub fn decode_scalar(value: &Value) -> Option<String> {
    scalar_text(value)
}

/// Decode `command` / `entrypoint`: a list, or one scalar as a single token
pub fn decode_tokens(value: &Value) -> Vec<String> {
    match Node::of(value) {
        Node::Sequence(items) => items.iter().filter_map(scalar_text).collect(),
        Node::Scalar(_) => scalar_text(value).into_iter().collect(),
        Node::Mapping(_) | Node::Null => Vec::new(),
    }
}

/// Decode `environment` from either map or `KEY=VALUE` list form
pub fn decode_environment(value: &Value) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();

    match Node::of(value) {
        Node::Mapping(map) => {
            for (key, value) in map {
                let Some(key) = scalar_text(key) else {
                    continue;
                };
                if key.is_empty() || key.contains('=') {
                    continue;
                }
                env.insert(key, scalar_text(value).unwrap_or_default());
            }
        }
        Node::Sequence(items) => {
            for item in items.iter().filter_map(scalar_text) {
                if let Some((key, value)) = item.split_once('=') {
                    if !key.is_empty() {
                        env.insert(key.to_string(), value.to_string());
                    }
                }
            }
        }
        Node::Scalar(_) | Node::Null => {}
    }

    env
}

/// Decode `networks`: a name, a list of names, or a map keyed by name
pub fn decode_networks(value: &Value) -> Vec<String> {
    match Node::of(value) {
        Node::Sequence(items) => items.iter().filter_map(scalar_text).collect(),
        Node::Scalar(_) => scalar_text(value).into_iter().collect(),
        Node::Mapping(map) => map.keys().filter_map(scalar_text).collect(),
        Node::Null => Vec::new(),
    }
}

/// Decode `volumes` into `host:container[:mode]` strings
pub fn decode_volumes(value: &Value) -> Vec<String> {
    let Node::Sequence(items) = Node::of(value) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match Node::of(item) {
            Node::Scalar(_) => scalar_text(item),
            Node::Mapping(map) => long_volume(map),
            _ => None,
        })
        .collect()
}

/// Render a long-syntax volume entry as a bind spec
fn long_volume(map: &Mapping) -> Option<String> {
    let target = map.get("target").and_then(scalar_text)?;
    let read_only = map
        .get("read_only")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let mut spec = match map.get("source").and_then(scalar_text) {
        Some(source) => format!("{}:{}", source, target),
        None => target,
    };
    if read_only {
        spec.push_str(":ro");
    }
    Some(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn test_tokens_from_scalar_and_list() {
        assert_eq!(decode_tokens(&yaml("npm start")), vec!["npm start"]);
        assert_eq!(
            decode_tokens(&yaml("[\"sh\", \"-c\", \"echo hi\"]")),
            vec!["sh", "-c", "echo hi"]
        );
        assert!(decode_tokens(&yaml("{a: b}")).is_empty());
    }

    #[test]
    fn test_environment_forms_agree() {
        let from_map = decode_environment(&yaml("{A: \"1\", B: \"2\"}"));
        let from_list = decode_environment(&yaml("[\"A=1\", \"B=2\"]"));
        assert_eq!(from_map, from_list);
        assert_eq!(from_map.get("A").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_environment_list_drops_entries_without_equals() {
        let env = decode_environment(&yaml("[\"NOVALUE\", \"URL=a=b\"]"));
        assert_eq!(env.len(), 1);
        assert_eq!(env.get("URL").map(String::as_str), Some("a=b"));
        assert!(!env.contains_key("NOVALUE"));
    }

    #[test]
    fn test_environment_map_renders_scalars() {
        let env = decode_environment(&yaml("PORT: 8080\nDEBUG: true\nEMPTY:\n"));
        assert_eq!(env.get("PORT").map(String::as_str), Some("8080"));
        assert_eq!(env.get("DEBUG").map(String::as_str), Some("true"));
        assert_eq!(env.get("EMPTY").map(String::as_str), Some(""));
    }

    #[test]
    fn test_networks_shapes() {
        assert_eq!(decode_networks(&yaml("backend")), vec!["backend"]);
        assert_eq!(decode_networks(&yaml("[front, back]")), vec!["front", "back"]);
        assert_eq!(
            decode_networks(&yaml("{front: {}, back: {aliases: [db]}}")),
            vec!["front", "back"]
        );
    }

    #[test]
    fn test_volumes_short_and_long() {
        let volumes = decode_volumes(&yaml(
            "[\"./data:/data:ro\", {type: bind, source: ./src, target: /app, read_only: true}, {source: x}]",
        ));
        assert_eq!(volumes, vec!["./data:/data:ro", "./src:/app:ro"]);
        assert!(decode_volumes(&yaml("./data:/data")).is_empty());
    }
}
