//! Declarative per-field body rules (`required|email|min:3`), parsed once at configuration time.

use super::{Flow, Middleware};
use crate::error::{AppError, ConfigError, FieldErrors};
use crate::request::RequestEnvelope;
use crate::response::ResponseEnvelope;
use crate::service::{is_blank, is_numeric};
use async_trait::async_trait;
use axum::http::HeaderMap;
use regex::Regex;
use serde_json::Value;
use std::str::FromStr;
use std::sync::OnceLock;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rule {
    Required,
    Email,
    Numeric,
    MinLen(usize),
    MaxLen(usize),
}

impl FromStr for Rule {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once(':') {
            Some(("min", n)) => n.trim().parse().map(Rule::MinLen).map_err(|_| ()),
            Some(("max", n)) => n.trim().parse().map(Rule::MaxLen).map_err(|_| ()),
            Some(_) => Err(()),
            None => match s {
                "required" => Ok(Rule::Required),
                "email" => Ok(Rule::Email),
                "numeric" => Ok(Rule::Numeric),
                _ => Err(()),
            },
        }
    }
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$")
            .expect("static email regex")
    })
}

/// Length of the value as the client sent it: string characters, or the number's text.
fn text_len(v: &Value) -> usize {
    match v {
        Value::String(s) => s.chars().count(),
        other => other.to_string().chars().count(),
    }
}

impl Rule {
    fn check(&self, v: &Value) -> Option<String> {
        match self {
            Rule::Required => None,
            Rule::Email => {
                let ok = v.as_str().map(|s| email_re().is_match(s)).unwrap_or(false);
                (!ok).then(|| "Invalid email format".to_string())
            }
            Rule::Numeric => (!is_numeric(v)).then(|| "Field must be numeric".to_string()),
            Rule::MinLen(min) => {
                (text_len(v) < *min).then(|| format!("Field must be at least {} characters", min))
            }
            Rule::MaxLen(max) => {
                (text_len(v) > *max).then(|| format!("Field must not exceed {} characters", max))
            }
        }
    }
}

/// Rules for one field, in declaration order.
#[derive(Clone, Debug)]
pub struct FieldRules {
    pub field: String,
    pub rules: Vec<Rule>,
}

impl FieldRules {
    /// Parse a pipe-separated rule string such as `required|min:3`.
    pub fn parse(field: impl Into<String>, raw: &str) -> Result<Self, ConfigError> {
        let field = field.into();
        let rules = raw
            .split('|')
            .filter(|part| !part.trim().is_empty())
            .map(|part| {
                part.parse::<Rule>().map_err(|_| ConfigError::InvalidRule {
                    field: field.clone(),
                    rule: part.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FieldRules { field, rules })
    }

    fn is_required(&self) -> bool {
        self.rules.contains(&Rule::Required)
    }
}

pub struct ValidationMiddleware {
    fields: Vec<FieldRules>,
}

impl ValidationMiddleware {
    pub fn new(fields: Vec<FieldRules>) -> Self {
        ValidationMiddleware { fields }
    }

    /// Build from `(field, "required|email")` pairs.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let fields = pairs
            .into_iter()
            .map(|(field, raw)| FieldRules::parse(field, raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(fields))
    }

    pub fn evaluate(&self, request: &RequestEnvelope) -> FieldErrors {
        let input = request.input();
        let mut errors = FieldErrors::new();
        for field in &self.fields {
            let value = input.get(&field.field);
            if is_blank(value) {
                if field.is_required() {
                    errors.entry(field.field.clone()).or_default().push("Field is required".into());
                }
                continue;
            }
            let Some(value) = value else { continue };
            for rule in &field.rules {
                if let Some(message) = rule.check(value) {
                    errors.entry(field.field.clone()).or_default().push(message);
                }
            }
        }
        errors
    }
}

#[async_trait]
impl Middleware for ValidationMiddleware {
    async fn handle(&self, request: &RequestEnvelope, _response_headers: &mut HeaderMap) -> Result<Flow, AppError> {
        let errors = self.evaluate(request);
        if errors.is_empty() {
            return Ok(Flow::Continue);
        }
        Ok(Flow::Respond(ResponseEnvelope::validation_error(&errors)))
    }
}
