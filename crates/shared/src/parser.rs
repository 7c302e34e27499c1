use serde::de::{self, Deserialize, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, error};

use crate::diagnostics::{DiagnosticsSink, ParseFailure};
use crate::error::ExtractionError;
use crate::fence;

/// Turns free-form model text into a value that is guaranteed to encode as
/// strict JSON.
///
/// Steps: unwrap the first fenced block, strip control characters, parse
/// with the JSON5 grammar (falling back to strict JSON), then reject NaN and
/// Infinity, which strict JSON cannot encode. Syntax and encoding failures
/// are written to the diagnostics sink (when one is configured) before the
/// error is returned.
#[derive(Debug, Clone, Default)]
pub struct StructuredParser {
    diagnostics: Option<DiagnosticsSink>,
}

impl StructuredParser {
    pub fn new(diagnostics: DiagnosticsSink) -> Self {
        Self {
            diagnostics: Some(diagnostics),
        }
    }

    pub fn without_diagnostics() -> Self {
        Self { diagnostics: None }
    }

    pub fn parse(&self, raw: &str, context: &str) -> Result<Value, ExtractionError> {
        let cleaned = sanitize(fence::unwrap(raw));

        let (value, strict): (Value, bool) = match json5::from_str(&cleaned) {
            Ok(value) => (value, false),
            // Strict JSON the JSON5 grammar rejects (integers beyond i64).
            Err(err) => match serde_json::from_str(&cleaned) {
                Ok(value) => (value, true),
                Err(_) => {
                    let (message, line, column) = match &err {
                        json5::Error::Message { msg, location } => (
                            msg.clone(),
                            location.as_ref().map(|l| l.line),
                            location.as_ref().map(|l| l.column),
                        ),
                    };
                    self.report(&ParseFailure {
                        context,
                        original: raw,
                        cleaned: &cleaned,
                        error_kind: "Syntax",
                        message: &message,
                        line,
                        column,
                    });
                    return Err(ExtractionError::Syntax {
                        context: context.to_string(),
                        message,
                        line,
                        column,
                    });
                }
            },
        };

        // `Value` silently maps NaN and Infinity to null, so portability is
        // checked against the source text. Strict JSON cannot hold either.
        let portable = if strict { Ok(()) } else { check_portable(&cleaned) };
        if let Err(message) = portable {
            self.report(&ParseFailure {
                context,
                original: raw,
                cleaned: &cleaned,
                error_kind: "NotPortable",
                message: &message,
                line: None,
                column: None,
            });
            return Err(ExtractionError::NotPortable {
                context: context.to_string(),
                message,
            });
        }

        debug!(context, kind = kind_of(&value), "parsed model output");
        Ok(value)
    }

    pub fn parse_array(&self, raw: &str, context: &str) -> Result<Vec<Value>, ExtractionError> {
        match self.parse(raw, context)? {
            Value::Array(entries) => Ok(entries),
            other => Err(ExtractionError::UnexpectedShape {
                context: context.to_string(),
                expected: "array",
                found: kind_of(&other),
            }),
        }
    }

    pub fn parse_object(
        &self,
        raw: &str,
        context: &str,
    ) -> Result<Map<String, Value>, ExtractionError> {
        match self.parse(raw, context)? {
            Value::Object(map) => Ok(map),
            other => Err(ExtractionError::UnexpectedShape {
                context: context.to_string(),
                expected: "object",
                found: kind_of(&other),
            }),
        }
    }

    fn report(&self, failure: &ParseFailure<'_>) {
        let Some(sink) = &self.diagnostics else {
            return;
        };
        match sink.record_parse_failure(failure) {
            Ok(path) => error!(
                context = failure.context,
                path = %path.display(),
                "JSON parse error logged"
            ),
            Err(e) => error!(
                context = failure.context,
                error = %format!("{e:#}"),
                "could not write parse diagnostics"
            ),
        }
    }
}

/// Reject text holding numbers strict JSON cannot represent.
fn check_portable(text: &str) -> Result<(), String> {
    match json5::from_str::<FiniteNumbers>(text) {
        Ok(_) => Ok(()),
        Err(json5::Error::Message { msg, .. }) => Err(msg),
    }
}

/// Walks a document and fails on the first non-finite float.
struct FiniteNumbers;

impl<'de> Deserialize<'de> for FiniteNumbers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FiniteVisitor)
    }
}

struct FiniteVisitor;

impl<'de> Visitor<'de> for FiniteVisitor {
    type Value = FiniteNumbers;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if v.is_finite() {
            Ok(FiniteNumbers)
        } else {
            Err(E::custom(format!("non-finite number {v} has no JSON encoding")))
        }
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
        Ok(FiniteNumbers)
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Self::Value, E> {
        Ok(FiniteNumbers)
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Self::Value, E> {
        Ok(FiniteNumbers)
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Self::Value, E> {
        Ok(FiniteNumbers)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(FiniteNumbers)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(FiniteNumbers)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        FiniteNumbers::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        while seq.next_element::<FiniteNumbers>()?.is_some() {}
        Ok(FiniteNumbers)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        while map.next_entry::<IgnoredAny, FiniteNumbers>()?.is_some() {}
        Ok(FiniteNumbers)
    }
}

/// Drop ASCII control characters other than tab, LF and CR, and any BOM.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|&c| match c {
            '\t' | '\n' | '\r' => true,
            '\u{FEFF}' => false,
            c => !matches!(c, '\u{00}'..='\u{1F}'),
        })
        .collect()
}

pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
