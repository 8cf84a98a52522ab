//! Shallow merge used by `Reactor::set`.

use serde_json::{Map, Value};

/// A state that accepts a partial value merged over its top level.
pub trait Merge {
    type Partial;

    /// Overwrite the top-level fields named in `partial`, leaving the rest alone.
    fn merge(&mut self, partial: Self::Partial);
}

impl Merge for Value {
    type Partial = Map<String, Value>;

    /// Merge keys into an object. A non-object state is replaced by the partial.
    fn merge(&mut self, partial: Self::Partial) {
        match self {
            Value::Object(obj) => {
                for (key, value) in partial {
                    obj.insert(key, value);
                }
            }
            other => *other = Value::Object(partial),
        }
    }
}
