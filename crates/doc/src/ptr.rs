use serde_json as sj;
use std::fmt::Display;
use std::str::FromStr;

/// Path is a parsed data path, as written by layering actions and
/// substitutions. Paths are rooted at a document's `data`: `.` is the root
/// itself, `.a.b` addresses nested mapping keys, and `.a[2]` a sequence
/// index.
#[derive(Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Path(Vec<Step>);

/// Step is a single parsed traversal step of a Path.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Step {
    /// Mapping key. Never an index.
    Prop(String),
    /// Integer index of a sequence.
    Index(usize),
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("path {path:?} must begin with '.'")]
    MissingRoot { path: String },
    #[error("path {path:?} contains an empty segment")]
    EmptySegment { path: String },
    #[error("path {path:?} has a malformed index: {detail}")]
    BadIndex { path: String, detail: String },
}

impl Path {
    /// Builds an empty Path which references the document root.
    pub fn root() -> Path {
        Path(Vec::new())
    }

    /// True if this Path references the document root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn steps(&self) -> &[Step] {
        &self.0
    }

    pub fn push(&mut self, step: Step) -> &mut Path {
        self.0.push(step);
        self
    }

    /// Query an existing value at the path location within the document.
    /// Returns None if the location (or a parent thereof) does not exist.
    pub fn query<'v>(&self, doc: &'v sj::Value) -> Option<&'v sj::Value> {
        let mut v = doc;

        for step in &self.0 {
            let next = match (v, step) {
                (sj::Value::Object(map), Step::Prop(prop)) => map.get(prop),
                (sj::Value::Object(map), Step::Index(ind)) => map.get(&ind.to_string()),
                (sj::Value::Array(arr), Step::Index(ind)) => arr.get(*ind),
                _ => None,
            };
            match next {
                Some(vv) => v = vv,
                None => return None,
            }
        }
        Some(v)
    }

    /// Query a mutable value at the path location, recursively creating the
    /// location if it doesn't exist. Null parents are instantiated as a
    /// mapping or sequence depending on the Step at that location, and a
    /// sequence is extended with Nulls as required to instantiate an index.
    /// Returns None only if the document structure is incompatible with the
    /// path (a parent is a scalar, or a sequence is stepped by-property).
    pub fn create<'v>(&self, doc: &'v mut sj::Value) -> Option<&'v mut sj::Value> {
        let mut v = doc;

        for step in &self.0 {
            if let sj::Value::Null = v {
                *v = match step {
                    Step::Prop(_) => sj::Value::Object(sj::Map::new()),
                    Step::Index(_) => sj::Value::Array(Vec::new()),
                };
            }

            v = match (v, step) {
                (sj::Value::Object(map), Step::Prop(prop)) => {
                    map.entry(prop.clone()).or_insert(sj::Value::Null)
                }
                (sj::Value::Object(map), Step::Index(ind)) => {
                    map.entry(ind.to_string()).or_insert(sj::Value::Null)
                }
                (sj::Value::Array(arr), Step::Index(ind)) => {
                    if *ind >= arr.len() {
                        arr.extend(std::iter::repeat(sj::Value::Null).take(1 + ind - arr.len()));
                    }
                    arr.get_mut(*ind).unwrap()
                }
                // Cannot match (attempt to step into a scalar, or to take a
                // property of a sequence).
                _ => return None,
            };
        }
        Some(v)
    }

    /// Replace the value at the path location, creating it if needed.
    /// Returns the prior value, or None if the document structure is
    /// incompatible with the path.
    pub fn set(&self, doc: &mut sj::Value, value: sj::Value) -> Option<sj::Value> {
        let target = self.create(doc)?;
        Some(std::mem::replace(target, value))
    }

    /// Remove the key or index at the path location, returning the removed
    /// value, or None if the location does not exist. Removing the root
    /// leaves an empty mapping in its place.
    pub fn remove(&self, doc: &mut sj::Value) -> Option<sj::Value> {
        let Some((last, parent_steps)) = self.0.split_last() else {
            return Some(std::mem::replace(doc, sj::Value::Object(sj::Map::new())));
        };

        let parent = Path(parent_steps.to_vec()).query_mut(doc)?;
        match (parent, last) {
            (sj::Value::Object(map), Step::Prop(prop)) => map.remove(prop),
            (sj::Value::Object(map), Step::Index(ind)) => map.remove(&ind.to_string()),
            (sj::Value::Array(arr), Step::Index(ind)) if *ind < arr.len() => {
                Some(arr.remove(*ind))
            }
            _ => None,
        }
    }

    fn query_mut<'v>(&self, doc: &'v mut sj::Value) -> Option<&'v mut sj::Value> {
        let mut v = doc;

        for step in &self.0 {
            let next = match (v, step) {
                (sj::Value::Object(map), Step::Prop(prop)) => map.get_mut(prop),
                (sj::Value::Object(map), Step::Index(ind)) => map.get_mut(&ind.to_string()),
                (sj::Value::Array(arr), Step::Index(ind)) => arr.get_mut(*ind),
                _ => None,
            };
            match next {
                Some(vv) => v = vv,
                None => return None,
            }
        }
        Some(v)
    }
}

impl FromStr for Path {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Path, ParseError> {
        let Some(rest) = s.strip_prefix('.') else {
            return Err(ParseError::MissingRoot {
                path: s.to_string(),
            });
        };
        let mut steps = Vec::new();

        if rest.is_empty() {
            return Ok(Path(steps));
        }

        for segment in rest.split('.') {
            let (name, mut brackets) = match segment.find('[') {
                Some(ind) => (&segment[..ind], &segment[ind..]),
                None => (segment, ""),
            };

            if name.is_empty() && brackets.is_empty() {
                return Err(ParseError::EmptySegment {
                    path: s.to_string(),
                });
            }
            if !name.is_empty() {
                steps.push(Step::Prop(name.to_string()));
            }

            while !brackets.is_empty() {
                // Leading '[' is established by the find() above or the
                // strip of the prior index.
                let body = &brackets[1..];
                let Some(close) = body.find(']') else {
                    return Err(ParseError::BadIndex {
                        path: s.to_string(),
                        detail: "unterminated '['".to_string(),
                    });
                };
                let digits = &body[..close];
                let ind = usize::from_str(digits).map_err(|_| ParseError::BadIndex {
                    path: s.to_string(),
                    detail: format!("{digits:?} is not an index"),
                })?;
                steps.push(Step::Index(ind));
                brackets = &body[close + 1..];

                if !brackets.is_empty() && !brackets.starts_with('[') {
                    return Err(ParseError::BadIndex {
                        path: s.to_string(),
                        detail: format!("unexpected trailing {brackets:?}"),
                    });
                }
            }
        }

        Ok(Path(steps))
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, ".");
        }
        for step in &self.0 {
            match step {
                Step::Prop(prop) => write!(f, ".{prop}")?,
                Step::Index(ind) => write!(f, "[{ind}]")?,
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}
