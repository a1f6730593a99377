//! Declarative element criteria.
//!
//! Every [`Selector`] compiles to a single XPath 1.0 expression, so a selection rule can be
//! checked as a string without a browser and handed as-is to any WebDriver backend.

use crate::errors::SyncError;

/// Represents ways to locate an element on the console page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Any element whose own text contains the given substring
    Text(String),
    /// Any element whose own text, whitespace-normalized, equals the given string
    ExactText(String),
    /// Any element carrying `name="value"`
    Attribute { name: String, value: String },
    /// Any element whose `name` attribute contains the given substring
    AttributeContains { name: String, value: String },
    /// Restrict a simple selector to one tag name
    Tag { tag: String, inner: Box<Selector> },
    /// Union of the matches of several selectors, in document order
    Or(Vec<Selector>),
    /// The parent node of the first match
    Parent(Box<Selector>),
    /// The nearest `<input>` following the first anchor match in document order,
    /// optionally restricted to inputs whose placeholder contains a substring
    FollowingInput {
        anchor: Box<Selector>,
        placeholder: Option<String>,
    },
    /// Represents an invalid selector, with a reason.
    Invalid(String),
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Selector {
    pub fn text(text: impl Into<String>) -> Self {
        Selector::Text(text.into())
    }

    pub fn exact_text(text: impl Into<String>) -> Self {
        Selector::ExactText(text.into())
    }

    pub fn attr(name: impl Into<String>, value: impl Into<String>) -> Self {
        Selector::Attribute {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn attr_contains(name: impl Into<String>, value: impl Into<String>) -> Self {
        Selector::AttributeContains {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Restrict this selector to elements with the given tag.
    pub fn on(self, tag: impl Into<String>) -> Self {
        Selector::Tag {
            tag: tag.into(),
            inner: Box::new(self),
        }
    }

    /// Union with another selector, flattening nested unions.
    pub fn or(self, other: Selector) -> Self {
        let mut parts = match self {
            Selector::Or(parts) => parts,
            s => vec![s],
        };
        match other {
            Selector::Or(mut more) => parts.append(&mut more),
            s => parts.push(s),
        }
        Selector::Or(parts)
    }

    pub fn parent(self) -> Self {
        Selector::Parent(Box::new(self))
    }

    pub fn following_input(self, placeholder: Option<&str>) -> Self {
        Selector::FollowingInput {
            anchor: Box::new(self),
            placeholder: placeholder.map(str::to_string),
        }
    }

    /// The bracketed condition for simple selectors, `None` for structural ones.
    fn predicate(&self) -> Option<String> {
        match self {
            Selector::Text(t) => Some(format!("contains(text(), {})", xpath_literal(t))),
            Selector::ExactText(t) => Some(format!("normalize-space(text())={}", xpath_literal(t))),
            Selector::Attribute { name, value } if is_xml_name(name) => {
                Some(format!("@{name}={}", xpath_literal(value)))
            }
            Selector::AttributeContains { name, value } if is_xml_name(name) => {
                Some(format!("contains(@{name}, {})", xpath_literal(value)))
            }
            _ => None,
        }
    }

    /// Compile to an absolute XPath expression.
    pub fn to_xpath(&self) -> Result<String, SyncError> {
        match self {
            Selector::Text(_)
            | Selector::ExactText(_)
            | Selector::Attribute { .. }
            | Selector::AttributeContains { .. } => self
                .predicate()
                .map(|p| format!("//*[{p}]"))
                .ok_or_else(|| SyncError::InvalidSelector(format!("bad attribute name in {self}"))),
            Selector::Tag { tag, inner } => {
                if !is_xml_name(tag) {
                    return Err(SyncError::InvalidSelector(format!("bad tag name '{tag}'")));
                }
                let predicate = inner.predicate().ok_or_else(|| {
                    SyncError::InvalidSelector(format!(
                        "tag restriction needs a text or attribute selector, got {inner}"
                    ))
                })?;
                Ok(format!("//{tag}[{predicate}]"))
            }
            Selector::Or(parts) => {
                if parts.is_empty() {
                    return Err(SyncError::InvalidSelector("empty union".to_string()));
                }
                let compiled = parts
                    .iter()
                    .map(Selector::to_xpath)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(compiled.join(" | "))
            }
            Selector::Parent(inner) => Ok(format!("({})[1]/..", inner.to_xpath()?)),
            Selector::FollowingInput {
                anchor,
                placeholder,
            } => {
                let anchor = anchor.to_xpath()?;
                match placeholder {
                    Some(p) => Ok(format!(
                        "({anchor})[1]/following::input[contains(@placeholder, {})][1]",
                        xpath_literal(p)
                    )),
                    None => Ok(format!("({anchor})[1]/following::input[1]")),
                }
            }
            Selector::Invalid(reason) => Err(SyncError::InvalidSelector(reason.clone())),
        }
    }
}

/// Quote a string for XPath 1.0, which has no escape syntax.
pub fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{s}'")
    } else if !s.contains('"') {
        format!("\"{s}\"")
    } else {
        let parts: Vec<String> = s.split('\'').map(|p| format!("'{p}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

fn is_xml_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
}
