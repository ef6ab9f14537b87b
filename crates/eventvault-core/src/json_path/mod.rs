//! Path expressions and the JSON edits addressed by them.
//!
//! A path such as `user.address[0].city` names a location inside a JSON
//! body. Upgrades use these paths to rename, add, remove, and replace
//! fields without deserializing into a typed payload.

mod token;
mod transformer;

pub use token::{Token, extract_tokens};
pub use transformer::JsonTransformer;
