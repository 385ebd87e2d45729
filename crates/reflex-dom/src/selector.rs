//! CSS selector subset for [`MemoryDom`](crate::MemoryDom).
//!
//! Supported: selector groups (`a, b`), descendant and child (`>`)
//! combinators, and compound steps built from a tag, `*`, `#id`,
//! `.class`, `[attr]` and `[attr=value]` (value bare or quoted, with
//! backslash escapes inside quotes). Everything else is rejected with
//! [`DomError::UnsupportedSelector`].

use crate::DomError;

/// Read access to an element tree, enough to match selectors.
pub trait SelectorHost {
    type Id: Copy;

    fn parent_element(&self, node: Self::Id) -> Option<Self::Id>;
    fn tag(&self, node: Self::Id) -> &str;
    fn attr(&self, node: Self::Id, name: &str) -> Option<&str>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrCondition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Part {
    step: Compound,
    // Relation to the part on the left.
    combinator: Option<Combinator>,
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    groups: Vec<Vec<Part>>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, DomError> {
        let unsupported = || DomError::UnsupportedSelector(source.to_string());
        let groups = split_outside_brackets(source, |ch| ch == ',')
            .ok_or_else(unsupported)?
            .into_iter()
            .map(|group| parse_chain(&group).ok_or_else(unsupported))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { groups })
    }

    pub fn matches<H: SelectorHost>(&self, host: &H, node: H::Id) -> bool {
        self.groups
            .iter()
            .any(|parts| matches_from(host, node, parts, parts.len() - 1))
    }
}

fn matches_from<H: SelectorHost>(host: &H, node: H::Id, parts: &[Part], index: usize) -> bool {
    let part = &parts[index];
    if !part.step.matches(host, node) {
        return false;
    }
    if index == 0 {
        return true;
    }
    match part.combinator.unwrap_or(Combinator::Descendant) {
        Combinator::Child => host
            .parent_element(node)
            .is_some_and(|parent| matches_from(host, parent, parts, index - 1)),
        Combinator::Descendant => {
            let mut ancestor = host.parent_element(node);
            while let Some(current) = ancestor {
                if matches_from(host, current, parts, index - 1) {
                    return true;
                }
                ancestor = host.parent_element(current);
            }
            false
        }
    }
}

impl Compound {
    fn matches<H: SelectorHost>(&self, host: &H, node: H::Id) -> bool {
        if let Some(tag) = &self.tag {
            if !host.tag(node).eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if host.attr(node, "id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class_attr = host.attr(node, "class").unwrap_or("");
            let has_all = self
                .classes
                .iter()
                .all(|class| class_attr.split_ascii_whitespace().any(|c| c == class));
            if !has_all {
                return false;
            }
        }
        self.attrs.iter().all(|condition| match condition {
            AttrCondition::Exists { key } => host.attr(node, key).is_some(),
            AttrCondition::Eq { key, value } => host.attr(node, key) == Some(value.as_str()),
        })
    }
}

/// Splits on `is_separator` where it appears outside `[...]` and quotes.
/// `None` on unbalanced brackets/quotes or an empty piece.
fn split_outside_brackets(source: &str, is_separator: impl Fn(char) -> bool) -> Option<Vec<String>> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut bracket_depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for ch in source.chars() {
        if let Some(open) = quote {
            current.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == open {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' if bracket_depth > 0 => {
                quote = Some(ch);
                current.push(ch);
            }
            '[' => {
                bracket_depth += 1;
                current.push(ch);
            }
            ']' => {
                bracket_depth = bracket_depth.checked_sub(1)?;
                current.push(ch);
            }
            ch if bracket_depth == 0 && is_separator(ch) => {
                let piece = current.trim();
                if piece.is_empty() {
                    return None;
                }
                pieces.push(piece.to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if bracket_depth != 0 || quote.is_some() {
        return None;
    }
    let piece = current.trim();
    if piece.is_empty() {
        return None;
    }
    pieces.push(piece.to_string());
    Some(pieces)
}

fn parse_chain(source: &str) -> Option<Vec<Part>> {
    // Give `>` its own whitespace so tokens fall out of one split.
    let mut spaced = String::with_capacity(source.len() + 4);
    let mut bracket_depth = 0usize;
    for ch in source.chars() {
        match ch {
            '[' => bracket_depth += 1,
            ']' => bracket_depth = bracket_depth.saturating_sub(1),
            _ => {}
        }
        if ch == '>' && bracket_depth == 0 {
            spaced.push_str(" > ");
        } else {
            spaced.push(ch);
        }
    }

    let tokens = tokenize(&spaced)?;
    let mut parts: Vec<Part> = Vec::new();
    let mut pending: Option<Combinator> = None;
    for token in tokens {
        if token == ">" {
            if pending.is_some() || parts.is_empty() {
                return None;
            }
            pending = Some(Combinator::Child);
            continue;
        }
        let step = parse_compound(&token)?;
        let combinator = if parts.is_empty() {
            None
        } else {
            Some(pending.take().unwrap_or(Combinator::Descendant))
        };
        parts.push(Part { step, combinator });
    }
    if parts.is_empty() || pending.is_some() {
        return None;
    }
    Some(parts)
}

fn tokenize(source: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut bracket_depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for ch in source.chars() {
        if let Some(open) = quote {
            current.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == open {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' if bracket_depth > 0 => {
                quote = Some(ch);
                current.push(ch);
            }
            '[' => {
                bracket_depth += 1;
                current.push(ch);
            }
            ']' => {
                bracket_depth = bracket_depth.checked_sub(1)?;
                current.push(ch);
            }
            ch if ch.is_whitespace() && bracket_depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }
    if bracket_depth != 0 || quote.is_some() {
        return None;
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Some(tokens)
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || !ch.is_ascii()
}

fn take_ident(chars: &[char], start: usize) -> Option<(String, usize)> {
    let end = chars[start..]
        .iter()
        .position(|&ch| !is_ident_char(ch))
        .map_or(chars.len(), |offset| start + offset);
    if end == start {
        return None;
    }
    Some((chars[start..end].iter().collect(), end))
}

fn parse_compound(token: &str) -> Option<Compound> {
    let chars: Vec<char> = token.chars().collect();
    let mut step = Compound::default();
    let mut universal = false;
    let mut i = 0usize;

    while i < chars.len() {
        match chars[i] {
            '*' => {
                if universal || i != 0 {
                    return None;
                }
                universal = true;
                i += 1;
            }
            '#' => {
                let (id, next) = take_ident(&chars, i + 1)?;
                if step.id.replace(id).is_some() {
                    return None;
                }
                i = next;
            }
            '.' => {
                let (class, next) = take_ident(&chars, i + 1)?;
                step.classes.push(class);
                i = next;
            }
            '[' => {
                let (condition, next) = parse_attr(&chars, i + 1)?;
                step.attrs.push(condition);
                i = next;
            }
            _ => {
                if i != 0 {
                    return None;
                }
                let (tag, next) = take_ident(&chars, i)?;
                step.tag = Some(tag.to_ascii_lowercase());
                i = next;
            }
        }
    }
    Some(step)
}

fn skip_whitespace(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

/// Parses the inside of `[...]`, starting just after `[`.
/// Returns the condition and the index just after `]`.
fn parse_attr(chars: &[char], start: usize) -> Option<(AttrCondition, usize)> {
    let i = skip_whitespace(chars, start);
    let (key, i) = take_ident(chars, i)?;
    let i = skip_whitespace(chars, i);
    match *chars.get(i)? {
        ']' => Some((AttrCondition::Exists { key }, i + 1)),
        '=' => {
            let i = skip_whitespace(chars, i + 1);
            let (value, i) = match *chars.get(i)? {
                quote @ ('"' | '\'') => parse_quoted(chars, i + 1, quote)?,
                _ => take_ident(chars, i)?,
            };
            let i = skip_whitespace(chars, i);
            (*chars.get(i)? == ']').then_some((AttrCondition::Eq { key, value }, i + 1))
        }
        _ => None,
    }
}

fn parse_quoted(chars: &[char], start: usize, quote: char) -> Option<(String, usize)> {
    let mut value = String::new();
    let mut i = start;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                value.push(*chars.get(i + 1)?);
                i += 2;
            }
            ch if ch == quote => return Some((value, i + 1)),
            ch => {
                value.push(ch);
                i += 1;
            }
        }
    }
    None
}

/// Quotes `value` for use inside `[attr="..."]`.
pub fn quote_attr_value(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    // (parent, tag, attrs)
    struct Tree(Vec<(Option<usize>, &'static str, HashMap<&'static str, &'static str>)>);

    impl SelectorHost for Tree {
        type Id = usize;

        fn parent_element(&self, node: usize) -> Option<usize> {
            self.0[node].0
        }

        fn tag(&self, node: usize) -> &str {
            self.0[node].1
        }

        fn attr(&self, node: usize, name: &str) -> Option<&str> {
            self.0[node].2.get(name).copied()
        }
    }

    fn grid_tree() -> Tree {
        Tree(vec![
            (None, "div", HashMap::from([("class", "repeating-grid wide")])),
            (Some(0), "table", HashMap::new()),
            (Some(1), "tbody", HashMap::new()),
            (Some(2), "tr", HashMap::from([("data-entity-type", "contact")])),
            (Some(3), "td", HashMap::new()),
            (Some(0), "button", HashMap::from([("id", "add"), ("class", "grid-add-button")])),
        ])
    }

    #[test]
    fn test_compound_matching() {
        let tree = grid_tree();
        assert!(Selector::parse(".repeating-grid").unwrap().matches(&tree, 0));
        assert!(Selector::parse("div.wide.repeating-grid").unwrap().matches(&tree, 0));
        assert!(Selector::parse("#add").unwrap().matches(&tree, 5));
        assert!(Selector::parse("button#add.grid-add-button").unwrap().matches(&tree, 5));
        assert!(!Selector::parse("span#add").unwrap().matches(&tree, 5));
        assert!(Selector::parse("*").unwrap().matches(&tree, 4));
        assert!(Selector::parse("TR").unwrap().matches(&tree, 3));
    }

    #[test]
    fn test_attribute_conditions() {
        let tree = grid_tree();
        assert!(Selector::parse("[data-entity-type]").unwrap().matches(&tree, 3));
        assert!(Selector::parse("tr[data-entity-type=contact]").unwrap().matches(&tree, 3));
        assert!(Selector::parse("tr[data-entity-type = \"contact\"]").unwrap().matches(&tree, 3));
        assert!(!Selector::parse("tr[data-entity-type='account']").unwrap().matches(&tree, 3));
    }

    #[test]
    fn test_combinators() {
        let tree = grid_tree();
        assert!(Selector::parse("tbody tr").unwrap().matches(&tree, 3));
        assert!(Selector::parse(".repeating-grid td").unwrap().matches(&tree, 4));
        assert!(Selector::parse("tbody > tr").unwrap().matches(&tree, 3));
        assert!(Selector::parse("tbody>tr").unwrap().matches(&tree, 3));
        assert!(!Selector::parse("table > tr").unwrap().matches(&tree, 3));
        assert!(Selector::parse("span, tr").unwrap().matches(&tree, 3));
    }

    #[test]
    fn test_rejects_unsupported() {
        for source in ["", "div,", "> tr", "tr >", "a:hover", "[x", "tr[x~=y]", "a::before"] {
            assert_eq!(
                Selector::parse(source),
                Err(DomError::UnsupportedSelector(source.to_string())),
                "{source:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_quoted_values_round_trip_through_quote_attr_value() {
        let tree = Tree(vec![(None, "input", HashMap::from([("name", "say \"hi\"\\")]))]);
        let selector = format!("input[name={}]", quote_attr_value("say \"hi\"\\"));
        assert!(Selector::parse(&selector).unwrap().matches(&tree, 0));
    }
}
