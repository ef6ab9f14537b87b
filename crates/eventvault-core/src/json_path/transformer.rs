//! Structural edits on serialized JSON bodies.

use serde_json::{Map, Value};

use super::token::{Token, extract_tokens};
use crate::error::{PathError, TransformError};

/// Applies path-addressed edits to JSON text.
///
/// Every operation parses the body, edits it, and serializes it again.
/// Objects keep their key order, so untouched members come back exactly
/// where they were.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTransformer;

impl JsonTransformer {
    /// Renames the key at `path` to `new_name`, keeping its position.
    ///
    /// # Errors
    ///
    /// Fails when the body is not JSON, the path is malformed, ends in an
    /// index, does not exist, or when `new_name` is already a sibling.
    pub fn rename_key(body: &str, path: &str, new_name: &str) -> Result<String, TransformError> {
        Self::edit(body, path, |root, tokens| {
            let (parent, leaf) = split_leaf(tokens, path)?;
            let Token::Key(old_name) = leaf else {
                return Err(not_a_key(path));
            };
            let object = resolve_mut(root, parent, path)?
                .as_object_mut()
                .ok_or_else(|| not_a_container(path))?;
            if !object.contains_key(old_name) {
                return Err(not_found(path));
            }
            if old_name == new_name {
                return Ok(());
            }
            if object.contains_key(new_name) {
                return Err(PathError::AlreadyExists {
                    path: path.to_owned(),
                });
            }
            let renamed: Map<String, Value> = std::mem::take(object)
                .into_iter()
                .map(|(key, value)| {
                    if &key == old_name {
                        (new_name.to_owned(), value)
                    } else {
                        (key, value)
                    }
                })
                .collect();
            *object = renamed;
            Ok(())
        })
    }

    /// Inserts `value` at `path`, creating missing intermediate containers.
    ///
    /// Missing steps become an object when the following step is a key and
    /// an array when it is an index. Every index, intermediate or final, may
    /// at most equal the array's length; an index equal to the length
    /// appends.
    ///
    /// # Errors
    ///
    /// Fails when the body is not JSON, the path is malformed, the final key
    /// already exists, or a step crosses a scalar.
    pub fn add_key(body: &str, path: &str, value: Value) -> Result<String, TransformError> {
        Self::edit(body, path, |root, tokens| {
            let (parent, leaf) = split_leaf(tokens, path)?;
            let container = create_path(root, parent, leaf, path)?;
            match (leaf, container) {
                (Token::Key(key), Value::Object(object)) => {
                    if object.contains_key(key) {
                        return Err(PathError::AlreadyExists {
                            path: path.to_owned(),
                        });
                    }
                    object.insert(key.clone(), value);
                    Ok(())
                }
                (Token::Index(index), Value::Array(items)) => {
                    if *index > items.len() {
                        return Err(not_found(path));
                    }
                    items.insert(*index, value);
                    Ok(())
                }
                _ => Err(not_a_container(path)),
            }
        })
    }

    /// Removes the member or element at `path`. Siblings are untouched.
    ///
    /// # Errors
    ///
    /// Fails when the body is not JSON, the path is malformed or does not
    /// exist.
    pub fn remove_key(body: &str, path: &str) -> Result<String, TransformError> {
        Self::edit(body, path, |root, tokens| {
            let (parent, leaf) = split_leaf(tokens, path)?;
            let container = resolve_mut(root, parent, path)?;
            let removed = match (leaf, container) {
                (Token::Key(key), Value::Object(object)) => object.shift_remove(key).is_some(),
                (Token::Index(index), Value::Array(items)) if *index < items.len() => {
                    items.remove(*index);
                    true
                }
                (Token::Index(_), Value::Array(_)) => false,
                _ => return Err(not_a_container(path)),
            };
            if removed { Ok(()) } else { Err(not_found(path)) }
        })
    }

    /// Replaces the value at `path`.
    ///
    /// # Errors
    ///
    /// Fails when the body is not JSON, the path is malformed or does not
    /// exist.
    pub fn set_value(body: &str, path: &str, value: Value) -> Result<String, TransformError> {
        Self::edit(body, path, |root, tokens| {
            *resolve_mut(root, tokens, path)? = value;
            Ok(())
        })
    }

    fn edit(
        body: &str,
        path: &str,
        f: impl FnOnce(&mut Value, &[Token]) -> Result<(), PathError>,
    ) -> Result<String, TransformError> {
        let tokens = extract_tokens(path)?;
        let mut root: Value = serde_json::from_str(body)?;
        f(&mut root, tokens.as_slice())?;
        Ok(serde_json::to_string(&root)?)
    }
}

fn split_leaf<'t>(tokens: &'t [Token], path: &str) -> Result<(&'t [Token], &'t Token), PathError> {
    match tokens.split_last() {
        Some((leaf, parent)) => Ok((parent, leaf)),
        None => Err(PathError::Malformed {
            path: path.to_owned(),
            reason: "path is empty".to_owned(),
        }),
    }
}

fn resolve_mut<'v>(
    root: &'v mut Value,
    tokens: &[Token],
    path: &str,
) -> Result<&'v mut Value, PathError> {
    let mut current = root;
    for token in tokens {
        current = match (token, current) {
            (Token::Key(key), Value::Object(object)) => {
                object.get_mut(key).ok_or_else(|| not_found(path))?
            }
            (Token::Index(index), Value::Array(items)) => {
                items.get_mut(*index).ok_or_else(|| not_found(path))?
            }
            (Token::Key(_), Value::Array(_)) | (Token::Index(_), Value::Object(_)) => {
                return Err(not_found(path));
            }
            _ => return Err(not_a_container(path)),
        };
    }
    Ok(current)
}

/// Walks `tokens`, creating whatever is missing, and returns the container
/// that should receive `leaf`.
fn create_path<'v>(
    root: &'v mut Value,
    tokens: &[Token],
    leaf: &Token,
    path: &str,
) -> Result<&'v mut Value, PathError> {
    let mut current = root;
    for (i, token) in tokens.iter().enumerate() {
        let next = tokens.get(i + 1).unwrap_or(leaf);
        current = match (token, current) {
            (Token::Key(key), Value::Object(object)) => object
                .entry(key.clone())
                .or_insert_with(|| empty_container_for(next)),
            (Token::Index(index), Value::Array(items)) => {
                if *index == items.len() {
                    items.push(empty_container_for(next));
                }
                let Some(slot) = items.get_mut(*index) else {
                    return Err(not_found(path));
                };
                if slot.is_null() {
                    *slot = empty_container_for(next);
                }
                slot
            }
            _ => return Err(not_a_container(path)),
        };
    }
    Ok(current)
}

fn empty_container_for(next: &Token) -> Value {
    match next {
        Token::Key(_) => Value::Object(Map::new()),
        Token::Index(_) => Value::Array(Vec::new()),
    }
}

fn not_found(path: &str) -> PathError {
    PathError::NotFound {
        path: path.to_owned(),
    }
}

fn not_a_key(path: &str) -> PathError {
    PathError::NotAKey {
        path: path.to_owned(),
    }
}

fn not_a_container(path: &str) -> PathError {
    PathError::NotAContainer {
        path: path.to_owned(),
    }
}
