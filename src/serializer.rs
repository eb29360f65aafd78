//! Text encoding of [`ComponentId`] payloads as they are stored in the database.
//!
//! ```text
//! v1\n<owner>\n<element count>\n<element>\n<element>...
//! ```
//!
//! Inside a field, `\` is written as `\\`, a line feed as `\n` and a carriage return as `\r`,
//! so the only raw line feeds in an encoded payload are the field separators.

use crate::component_id::ComponentId;

const VERSION: &str = "v1";
const SEPARATOR: char = '\n';

/// A token or payload that can't be decoded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct FormatError(String);

impl FormatError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub fn serialize(component_id: &ComponentId) -> String {
    let mut encoded = String::from(VERSION);
    encoded.push(SEPARATOR);
    escape_into(&mut encoded, component_id.owner());
    encoded.push(SEPARATOR);
    encoded += &component_id.elements().len().to_string();
    for element in component_id.elements() {
        encoded.push(SEPARATOR);
        escape_into(&mut encoded, element);
    }
    encoded
}

pub fn deserialize(encoded: &str) -> Result<ComponentId, FormatError> {
    let mut fields = encoded.split(SEPARATOR);

    match fields.next() {
        Some(VERSION) => {}
        Some(other) => {
            return Err(FormatError::new(format!(
                "unsupported payload version `{}`",
                other
            )))
        }
        None => return Err(FormatError::new("empty payload")),
    }

    let owner = unescape(fields.next().ok_or("payload has no owner")?)?;

    let count = fields.next().ok_or("payload has no element count")?;
    let count = count
        .parse::<usize>()
        .map_err(|e| FormatError::new(format!("invalid element count `{}`: {}", count, e)))?;

    let elements = fields.map(unescape).collect::<Result<Vec<_>, _>>()?;
    if elements.len() != count {
        return Err(FormatError::new(format!(
            "payload announces {} elements but contains {}",
            count,
            elements.len()
        )));
    }

    Ok(ComponentId::new(owner, elements))
}

impl From<&str> for FormatError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

fn escape_into(buf: &mut String, field: &str) {
    for c in field.chars() {
        match c {
            '\\' => buf.push_str("\\\\"),
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            c => buf.push(c),
        }
    }
}

fn unescape(field: &str) -> Result<String, FormatError> {
    let mut unescaped = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => unescaped.push('\\'),
            Some('n') => unescaped.push('\n'),
            Some('r') => unescaped.push('\r'),
            Some(other) => {
                return Err(FormatError::new(format!(
                    "unknown escape sequence `\\{}`",
                    other
                )))
            }
            None => return Err(FormatError::new("dangling backslash at end of field")),
        }
    }
    Ok(unescaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component_id(owner: &str, elements: &[&str]) -> ComponentId {
        ComponentId::new(owner, elements.iter().map(|&e| e.to_owned()).collect())
    }

    #[test]
    fn check_round_trip() {
        let test_cases = vec![
            component_id("tag", &["foo"]),
            component_id("reminder", &[]),
            component_id("ban", &[""]),
            component_id("ban", &["", "", ""]),
            component_id("multi\nline owner", &["a\nb", "\n", "\n\n"]),
            component_id("tag", &["back\\slash", "\\n", "\\", "trailing\\"]),
            component_id("tag", &["carriage\r\nreturn", "\r"]),
            component_id("scam", &["🦀 unicode", "tab\tseparated", "v1"]),
            component_id("", &[]),
            component_id("", &["", "owner-less"]),
        ];
        for (i, tc) in test_cases.into_iter().enumerate() {
            let encoded = serialize(&tc);
            assert_eq!(deserialize(&encoded), Ok(tc), "test case #{}", i);
        }
    }

    #[test]
    fn check_encoding() {
        struct TestCase {
            input: ComponentId,
            expected: &'static str,
        }
        let test_cases = vec![
            TestCase {
                input: component_id("tag", &["foo"]),
                expected: "v1\ntag\n1\nfoo",
            },
            TestCase {
                input: component_id("reminder", &[]),
                expected: "v1\nreminder\n0",
            },
            TestCase {
                input: component_id("", &[]),
                expected: "v1\n\n0",
            },
            TestCase {
                input: component_id("tag", &["a\nb", "c\\d"]),
                expected: "v1\ntag\n2\na\\nb\nc\\\\d",
            },
        ];
        for (i, tc) in test_cases.into_iter().enumerate() {
            assert_eq!(serialize(&tc.input), tc.expected, "test case #{}", i);
        }
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        let test_cases = [
            "",
            "garbage",
            "v2\ntag\n1\nfoo",
            "v1",
            "v1\ntag",
            "v1\ntag\nmany\nfoo",
            "v1\ntag\n-1",
            "v1\ntag\n2\nfoo",
            "v1\ntag\n0\nfoo",
            "v1\ntag\n1\nfoo\\",
            "v1\ntag\n1\nfoo\\x",
        ];
        for (i, input) in test_cases.iter().enumerate() {
            assert!(deserialize(input).is_err(), "test case #{}: {:?}", i, input);
        }
    }
}
