use pct_str::{PctString, URIReserved, InvalidPctString, PctStr};

pub fn url_encode(s: &str) -> String {
    let p = PctString::encode(s.chars(), URIReserved);
    p.to_string()
}

// Owning the message instead of keeping InvalidPctString, which
// borrows the input and can't travel up in an anyhow::Error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("url decoding error: {0}")]
pub struct UrlDecodingError(Box<String>);

impl From<InvalidPctString<&str>> for UrlDecodingError {
    fn from(e: InvalidPctString<&str>) -> Self {
        Self(Box::new(format!("{}", e)))
    }
}

pub fn url_decode(s: &str) -> Result<String, UrlDecodingError> {
    let p = PctStr::new(s)?;
    Ok(p.decode())
}

/// Decode `application/x-www-form-urlencoded` data (also used for
/// query strings): `+` stands for a space. Pairs without `=` get an
/// empty value, empty pairs are skipped. Order is kept.
pub fn parse_urlencoded(s: &str) -> Result<Vec<(String, String)>, UrlDecodingError> {
    let mut pairs = Vec::new();
    for pair in s.split('&') {
        if pair.is_empty() {
            continue
        }
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        pairs.push((url_decode(&k.replace('+', " "))?,
                    url_decode(&v.replace('+', " "))?));
    }
    Ok(pairs)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_parse_urlencoded() {
        assert_eq!(parse_urlencoded("a=1&b=hello+world&a=%C3%A9&&flag").unwrap(),
                   vec![("a".into(), "1".into()),
                        ("b".into(), "hello world".into()),
                        ("a".into(), "é".into()),
                        ("flag".into(), "".into())]);
        assert!(parse_urlencoded("a=%zz").is_err());
        assert_eq!(parse_urlencoded("").unwrap(), vec![]);
    }

    #[test]
    fn t_encode() {
        assert_eq!(url_decode(&url_encode("a b/c")).unwrap(), "a b/c");
    }
}
