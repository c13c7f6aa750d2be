//! Component action addresses: `/wo/<contextID>.<senderID>`.

use std::fmt::{self, Display};

use kstring::KString;

use crate::element_id::ElementId;

/// First path segment of component action URLs.
pub const COMPONENT_REQUEST_HANDLER_KEY: &str = "wo";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("expected 2 path segments for a component action, got {0}")]
    WrongSegmentCount(usize),
    #[error("path does not start with the component request handler key: {0:?}")]
    WrongHandlerKey(String),
    #[error("no '.' separating context and sender ids in {0:?}")]
    MissingPeriod(String),
    #[error("component address {0:?} must start and end with a digit")]
    NonDigitBoundary(String),
    #[error("invalid character in component address {0:?}")]
    InvalidCharacter(String),
    #[error("empty element id component in {0:?}")]
    EmptyComponent(String),
}

/// The page instance (`context_id`) and the element in it that
/// triggered an action (`sender_id`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentAddress {
    pub context_id: KString,
    pub sender_id: ElementId,
}

impl ComponentAddress {
    pub fn new(context_id: KString, sender_id: ElementId) -> Self {
        ComponentAddress { context_id, sender_id }
    }

    /// Parse the part after `/wo/`.
    pub fn parse(part: &str) -> Result<Self, AddressError> {
        let bad = |f: fn(String) -> AddressError| f(part.into());
        let first = part.chars().next();
        let last = part.chars().last();
        match (first, last) {
            (Some(a), Some(b)) if a.is_ascii_digit() && b.is_ascii_digit() => (),
            (None, _) | (_, None) => return Err(bad(AddressError::MissingPeriod)),
            _ => return Err(bad(AddressError::NonDigitBoundary)),
        }
        if !part.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return Err(bad(AddressError::InvalidCharacter))
        }
        let (context_id, sender) = part.split_once('.')
            .ok_or_else(|| bad(AddressError::MissingPeriod))?;
        let sender_id = sender.parse::<ElementId>()
            .map_err(|_| bad(AddressError::EmptyComponent))?;
        Ok(ComponentAddress {
            context_id: KString::from_ref(context_id),
            sender_id,
        })
    }

    /// Parse the full list of path segments, `["wo", "3.4.5"]`.
    pub fn from_path_segments<S: AsRef<str>>(segments: &[S]) -> Result<Self, AddressError> {
        if segments.len() != 2 {
            return Err(AddressError::WrongSegmentCount(segments.len()))
        }
        let key = segments[0].as_ref();
        if key != COMPONENT_REQUEST_HANDLER_KEY {
            return Err(AddressError::WrongHandlerKey(key.into()))
        }
        Self::parse(segments[1].as_ref())
    }

    pub fn url(&self) -> String {
        component_action_url(&self.context_id, &self.sender_id)
    }
}

/// `3.4.12.5` for context 3, element 4.12.5.
impl Display for ComponentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.context_id, self.sender_id)
    }
}

pub fn component_action_url(context_id: &str, element_id: &ElementId) -> String {
    format!("/{COMPONENT_REQUEST_HANDLER_KEY}/{context_id}.{element_id}")
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_round_trip() {
        let addr = ComponentAddress::new(
            "3".into(), ElementId::from_indices(vec![4, 12, 5]));
        let encoded = addr.to_string();
        assert_eq!(encoded, "3.4.12.5");
        let decoded = ComponentAddress::parse(&encoded).unwrap();
        assert_eq!(decoded.context_id.as_str(), "3");
        assert_eq!(decoded.sender_id.to_string(), "4.12.5");
        assert_eq!(decoded, addr);
        assert_eq!(addr.url(), "/wo/3.4.12.5");
    }

    #[test]
    fn t_validation() {
        use AddressError::*;
        assert_eq!(ComponentAddress::parse("3."), Err(NonDigitBoundary("3.".into())));
        assert_eq!(ComponentAddress::parse(".4"), Err(NonDigitBoundary(".4".into())));
        assert_eq!(ComponentAddress::parse("3,4"), Err(InvalidCharacter("3,4".into())));
        assert_eq!(ComponentAddress::parse("34"), Err(MissingPeriod("34".into())));
        assert_eq!(ComponentAddress::parse(""), Err(MissingPeriod("".into())));
        assert_eq!(ComponentAddress::parse("3..4"), Err(EmptyComponent("3..4".into())));
        assert!(ComponentAddress::parse("3.4.5").is_ok());
    }

    #[test]
    fn t_segments() {
        assert_eq!(ComponentAddress::from_path_segments(&["wo"]),
                   Err(AddressError::WrongSegmentCount(1)));
        assert_eq!(ComponentAddress::from_path_segments(&["wo", "3.4", "x"]),
                   Err(AddressError::WrongSegmentCount(3)));
        assert!(ComponentAddress::from_path_segments(&["wa", "3.4"]).is_err());
        let addr = ComponentAddress::from_path_segments(&["wo", "3.4"]).unwrap();
        assert_eq!(addr.sender_id.indices(), &[4]);
    }
}
