//! The position of an element in a render pass: a path of indices
//! written as `3.4.12`.

use std::{fmt::{self, Display}, str::FromStr};

use itertools::Itertools;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ElementId(Vec<u32>);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid element id {0:?}")]
pub struct ElementIdParseError(pub String);

impl ElementId {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_indices(indices: Vec<u32>) -> Self {
        ElementId(indices)
    }

    pub fn indices(&self) -> &[u32] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Descend one level, starting at index 0.
    pub fn push(&mut self) {
        self.0.push(0);
    }

    pub fn pop(&mut self) {
        self.0.pop();
    }

    /// Move on to the next sibling. No-op at the root.
    pub fn increment(&mut self) {
        if let Some(last) = self.0.last_mut() {
            *last += 1;
        }
    }

    pub fn starts_with(&self, prefix: &ElementId) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.iter().join("."))
    }
}

impl FromStr for ElementId {
    type Err = ElementIdParseError;

    /// The empty string is the empty (root) id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(ElementId::new())
        }
        s.split('.')
            .map(|seg| {
                if seg.is_empty() || !seg.chars().all(|c| c.is_ascii_digit()) {
                    return Err(ElementIdParseError(s.into()))
                }
                seg.parse::<u32>().map_err(|_| ElementIdParseError(s.into()))
            })
            .collect::<Result<Vec<u32>, _>>()
            .map(ElementId)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_traversal() {
        let mut id = ElementId::new();
        assert_eq!(id.to_string(), "");
        id.push();
        id.increment();
        id.increment();
        id.push();
        assert_eq!(id.to_string(), "2.0");
        id.increment();
        id.pop();
        id.increment();
        assert_eq!(id.to_string(), "3");
    }

    #[test]
    fn t_parse() {
        assert_eq!("4.12.5".parse::<ElementId>().unwrap().indices(), &[4, 12, 5]);
        assert!("4..5".parse::<ElementId>().is_err());
        assert!("4.a".parse::<ElementId>().is_err());
        assert!("".parse::<ElementId>().unwrap().is_empty());
    }

    #[test]
    fn t_prefix() {
        let a: ElementId = "4.1".parse().unwrap();
        let b: ElementId = "4.1.3".parse().unwrap();
        assert!(b.starts_with(&a));
        assert!(!a.starts_with(&b));
        assert!(a.starts_with(&ElementId::new()));
    }
}
