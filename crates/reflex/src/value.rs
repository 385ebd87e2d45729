//! Typed readings of form fields.

use serde::Serialize;

/// The coerced value of a field.
///
/// Serializes untagged, so a JS caller sees `true`, `42`, `"abc"` or `[..]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Trim `raw` and read it as an integer when it is a plain, optionally
    /// signed run of digits that fits `i64`; otherwise keep the trimmed text.
    pub fn coerce(raw: &str) -> Self {
        let trimmed = raw.trim();
        let digits = trimmed.strip_prefix(['+', '-']).unwrap_or(trimmed);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = trimmed.parse::<i64>() {
                return FieldValue::Int(n);
            }
        }
        FieldValue::Text(trimmed.to_string())
    }

    /// What an empty or absent field reads as.
    pub fn empty() -> Self {
        FieldValue::coerce("")
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Empty text, empty list, or an unchecked checkbox.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Bool(b) => !b,
            FieldValue::Int(_) => false,
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::List(items) => items.is_empty(),
        }
    }

    /// Whether a list reading contains `needle` (or a scalar equals it).
    pub fn contains(&self, needle: &FieldValue) -> bool {
        match self {
            FieldValue::List(items) => items.contains(needle),
            other => other == needle,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Int(n) => write!(f, "{n}"),
            FieldValue::Text(s) => write!(f, "{s}"),
            FieldValue::List(items) => {
                let parts: Vec<_> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Int(n)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

// Strict comparisons, so `value == 1` is false for the text "1 ".
impl PartialEq<i64> for FieldValue {
    fn eq(&self, other: &i64) -> bool {
        self.as_int() == Some(*other)
    }
}

impl PartialEq<bool> for FieldValue {
    fn eq(&self, other: &bool) -> bool {
        self.as_bool() == Some(*other)
    }
}

impl PartialEq<&str> for FieldValue {
    fn eq(&self, other: &&str) -> bool {
        self.as_text() == Some(*other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_literals_become_ints() {
        assert_eq!(FieldValue::coerce("42"), FieldValue::Int(42));
        assert_eq!(FieldValue::coerce("-7"), FieldValue::Int(-7));
        assert_eq!(FieldValue::coerce("+3"), FieldValue::Int(3));
        assert_eq!(FieldValue::coerce("  12 "), FieldValue::Int(12));
        assert_eq!(FieldValue::coerce("007"), FieldValue::Int(7));
    }

    #[test]
    fn test_everything_else_stays_text() {
        assert_eq!(FieldValue::coerce("abc"), FieldValue::Text("abc".into()));
        assert_eq!(FieldValue::coerce(" padded "), FieldValue::Text("padded".into()));
        assert_eq!(FieldValue::coerce("1.5"), FieldValue::Text("1.5".into()));
        assert_eq!(FieldValue::coerce("1e3"), FieldValue::Text("1e3".into()));
        assert_eq!(FieldValue::coerce("-"), FieldValue::Text("-".into()));
        assert_eq!(FieldValue::coerce("--1"), FieldValue::Text("--1".into()));
        assert_eq!(FieldValue::coerce(""), FieldValue::Text(String::new()));
        assert_eq!(
            FieldValue::coerce("99999999999999999999"),
            FieldValue::Text("99999999999999999999".into())
        );
    }

    #[test]
    fn test_scalar_comparisons() {
        assert!(FieldValue::coerce("1") == 1);
        assert!(FieldValue::coerce("1") != 2);
        assert!(FieldValue::coerce("yes") == "yes");
        assert!(FieldValue::Bool(true) == true);
        assert!(FieldValue::Text("1".into()) != 1);
    }

    #[test]
    fn test_blank_and_contains() {
        assert!(FieldValue::empty().is_blank());
        assert!(FieldValue::List(vec![]).is_blank());
        assert!(FieldValue::Bool(false).is_blank());
        assert!(!FieldValue::Int(0).is_blank());

        let picked = FieldValue::List(vec![FieldValue::Int(1), FieldValue::from("b")]);
        assert!(picked.contains(&FieldValue::Int(1)));
        assert!(!picked.contains(&FieldValue::Int(2)));
        assert!(FieldValue::Int(2).contains(&FieldValue::Int(2)));
    }

    #[test]
    fn test_serializes_untagged() {
        let value = FieldValue::List(vec![
            FieldValue::Bool(true),
            FieldValue::Int(-7),
            FieldValue::from("x"),
        ]);
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"[true,-7,"x"]"#);
    }
}
