//! Label selector expressions
//!
//! Parses the Kubernetes string form of a label selector
//! (`app=web,tier in (api,worker),!legacy`), validates keys and values,
//! renders it back to a canonical string for list calls and evaluates
//! it against a label map.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector as KubeLabelSelector;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MAX_NAME_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SelectorError(String);

impl SelectorError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Exists,
    DoesNotExist,
    Equals,
    NotEquals,
    In,
    NotIn,
    GreaterThan,
    LessThan,
}

/// One comma-separated term of a selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    key: String,
    operator: Operator,
    values: Vec<String>,
}

impl Requirement {
    pub fn new(
        key: impl Into<String>,
        operator: Operator,
        mut values: Vec<String>,
    ) -> Result<Self, SelectorError> {
        let key = key.into();
        validate_key(&key)?;

        match operator {
            Operator::Exists | Operator::DoesNotExist => {
                if !values.is_empty() {
                    return Err(SelectorError::new(format!(
                        "{:?}: existence checks take no values",
                        key
                    )));
                }
            }
            Operator::Equals | Operator::NotEquals => {
                if values.len() != 1 {
                    return Err(SelectorError::new(format!(
                        "{:?}: equality needs exactly one value",
                        key
                    )));
                }
            }
            Operator::In | Operator::NotIn => {
                if values.is_empty() {
                    return Err(SelectorError::new(format!(
                        "{:?}: set membership needs at least one value",
                        key
                    )));
                }
                values.sort();
                values.dedup();
            }
            Operator::GreaterThan | Operator::LessThan => {
                if values.len() != 1 || values[0].parse::<i64>().is_err() {
                    return Err(SelectorError::new(format!(
                        "{:?}: numeric comparison needs one integer value",
                        key
                    )));
                }
            }
        }

        for value in &values {
            if !is_label_value(value) {
                return Err(SelectorError::new(format!(
                    "{:?}: invalid label value {:?}",
                    key, value
                )));
            }
        }

        Ok(Self {
            key,
            operator,
            values,
        })
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let current = labels.get(&self.key);
        match self.operator {
            Operator::Exists => current.is_some(),
            Operator::DoesNotExist => current.is_none(),
            Operator::Equals | Operator::In => current.map_or(false, |v| self.values.contains(v)),
            Operator::NotEquals | Operator::NotIn => {
                current.map_or(true, |v| !self.values.contains(v))
            }
            Operator::GreaterThan | Operator::LessThan => {
                let (Some(current), Ok(bound)) = (
                    current.and_then(|v| v.parse::<i64>().ok()),
                    self.values[0].parse::<i64>(),
                ) else {
                    return false;
                };
                if self.operator == Operator::GreaterThan {
                    current > bound
                } else {
                    current < bound
                }
            }
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
            Operator::Equals => write!(f, "{}={}", self.key, self.values[0]),
            Operator::NotEquals => write!(f, "{}!={}", self.key, self.values[0]),
            Operator::In => write!(f, "{} in ({})", self.key, self.values.join(",")),
            Operator::NotIn => write!(f, "{} notin ({})", self.key, self.values.join(",")),
            Operator::GreaterThan => write!(f, "{}>{}", self.key, self.values[0]),
            Operator::LessThan => write!(f, "{}<{}", self.key, self.values[0]),
        }
    }
}

/// A parsed label selector. The empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    pub fn parse(expression: &str) -> Result<Self, SelectorError> {
        if expression.trim().is_empty() {
            return Ok(Self::default());
        }

        let requirements = split_top_level(expression)?
            .into_iter()
            .map(|term| parse_requirement(term.trim()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { requirements })
    }

    /// Convert a structured `metav1.LabelSelector`
    pub fn from_kube(selector: &KubeLabelSelector) -> Result<Self, SelectorError> {
        let mut requirements = Vec::new();

        if let Some(match_labels) = &selector.match_labels {
            for (key, value) in match_labels {
                requirements.push(Requirement::new(
                    key.clone(),
                    Operator::Equals,
                    vec![value.clone()],
                )?);
            }
        }

        for expr in selector.match_expressions.iter().flatten() {
            let operator = match expr.operator.as_str() {
                "In" => Operator::In,
                "NotIn" => Operator::NotIn,
                "Exists" => Operator::Exists,
                "DoesNotExist" => Operator::DoesNotExist,
                other => {
                    return Err(SelectorError::new(format!(
                        "{:?}: unsupported operator {:?}",
                        expr.key, other
                    )))
                }
            };
            requirements.push(Requirement::new(
                expr.key.clone(),
                operator,
                expr.values.clone().unwrap_or_default(),
            )?);
        }

        Ok(Self { requirements })
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, requirement) in self.requirements.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", requirement)?;
        }
        Ok(())
    }
}

impl FromStr for LabelSelector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Split on commas that are not inside a value list
fn split_top_level(expression: &str) -> Result<Vec<&str>, SelectorError> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in expression.char_indices() {
        match c {
            '(' if depth > 0 => return Err(SelectorError::new("nested parentheses")),
            '(' => depth += 1,
            ')' if depth == 0 => return Err(SelectorError::new("unexpected ')'")),
            ')' => depth -= 1,
            ',' if depth == 0 => {
                terms.push(&expression[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(SelectorError::new("unclosed '('"));
    }
    terms.push(&expression[start..]);
    Ok(terms)
}

fn parse_requirement(term: &str) -> Result<Requirement, SelectorError> {
    if term.is_empty() {
        return Err(SelectorError::new("empty requirement"));
    }

    if let Some(key) = term.strip_prefix('!') {
        return Requirement::new(key.trim(), Operator::DoesNotExist, Vec::new());
    }

    let key_end = term
        .find(|c: char| c.is_whitespace() || matches!(c, '=' | '!' | '<' | '>' | '(' | ')'))
        .unwrap_or(term.len());
    let (key, rest) = term.split_at(key_end);
    let rest = rest.trim();

    if rest.is_empty() {
        return Requirement::new(key, Operator::Exists, Vec::new());
    }

    let single = |operator: Operator, value: &str| {
        Requirement::new(key, operator, vec![value.trim().to_string()])
    };

    if let Some(value) = rest.strip_prefix("==") {
        single(Operator::Equals, value)
    } else if let Some(value) = rest.strip_prefix("!=") {
        single(Operator::NotEquals, value)
    } else if let Some(value) = rest.strip_prefix('=') {
        single(Operator::Equals, value)
    } else if let Some(value) = rest.strip_prefix('>') {
        single(Operator::GreaterThan, value)
    } else if let Some(value) = rest.strip_prefix('<') {
        single(Operator::LessThan, value)
    } else if let Some(list) = strip_keyword(rest, "notin") {
        Requirement::new(key, Operator::NotIn, parse_value_list(key, list)?)
    } else if let Some(list) = strip_keyword(rest, "in") {
        Requirement::new(key, Operator::In, parse_value_list(key, list)?)
    } else {
        Err(SelectorError::new(format!(
            "unexpected {:?} after key {:?}",
            rest, key
        )))
    }
}

fn strip_keyword<'a>(rest: &'a str, keyword: &str) -> Option<&'a str> {
    let after = rest.strip_prefix(keyword)?;
    if after.starts_with(|c: char| c.is_whitespace() || c == '(') {
        Some(after.trim_start())
    } else {
        None
    }
}

fn parse_value_list(key: &str, list: &str) -> Result<Vec<String>, SelectorError> {
    let inner = list
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| {
            SelectorError::new(format!("{:?}: expected a parenthesised value list", key))
        })?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(inner.split(',').map(|v| v.trim().to_string()).collect())
}

fn validate_key(key: &str) -> Result<(), SelectorError> {
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    if let Some(prefix) = prefix {
        if !is_dns_subdomain(prefix) {
            return Err(SelectorError::new(format!(
                "invalid key prefix {:?} in {:?}",
                prefix, key
            )));
        }
    }
    if !is_label_name(name) {
        return Err(SelectorError::new(format!("invalid key {:?}", key)));
    }
    Ok(())
}

fn is_label_name(s: &str) -> bool {
    let bytes = s.as_bytes();
    !bytes.is_empty()
        && bytes.len() <= MAX_NAME_LEN
        && bytes[0].is_ascii_alphanumeric()
        && bytes[bytes.len() - 1].is_ascii_alphanumeric()
        && bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

fn is_label_value(s: &str) -> bool {
    s.is_empty() || is_label_name(s)
}

fn is_dns_subdomain(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_PREFIX_LEN
        && s.split('.').all(|label| {
            let bytes = label.as_bytes();
            !bytes.is_empty()
                && bytes.len() <= MAX_NAME_LEN
                && is_lower_alnum(bytes[0])
                && is_lower_alnum(bytes[bytes.len() - 1])
                && bytes.iter().all(|b| is_lower_alnum(*b) || *b == b'-')
        })
}

fn is_lower_alnum(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit()
}
