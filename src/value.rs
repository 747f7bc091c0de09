//! Exported runtime values.
//!
//! A module host reports each export as an [`ExportValue`]. Plain data can be
//! printed back as a structural literal; functions, symbols, cycles and
//! objects that are not plain (a `Date`, a `Map`, a class instance) are
//! carried only so they can be rejected with a precise reason.

use crate::error::{BuildError, Result};
use oxc_syntax::identifier::is_identifier_name;
use oxc_syntax::keyword::is_reserved_keyword;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ExportValue {
    Undefined,
    Null,
    Bool(bool),
    Number(#[serde(with = "js_number")] f64),
    String(String),
    /// Base-10 digits, sign included.
    BigInt(String),
    Array(Vec<ExportValue>),
    /// Entries in property enumeration order.
    Object(Vec<(String, ExportValue)>),
    Function(String),
    Symbol(String),
    Circular,
    /// An object with a prototype other than `Object.prototype` or `null`,
    /// named by its constructor (`Date`, `Map`, a class name).
    Unsupported(String),
}

impl ExportValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ExportValue::Undefined => "undefined",
            ExportValue::Null => "null",
            ExportValue::Bool(_) => "boolean",
            ExportValue::Number(_) => "number",
            ExportValue::String(_) => "string",
            ExportValue::BigInt(_) => "bigint",
            ExportValue::Array(_) => "array",
            ExportValue::Object(_) => "object",
            ExportValue::Function(_) => "function",
            ExportValue::Symbol(_) => "symbol",
            ExportValue::Circular => "circular reference",
            ExportValue::Unsupported(_) => "non-plain object",
        }
    }

    /// JavaScript truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            ExportValue::Undefined | ExportValue::Null => false,
            ExportValue::Bool(b) => *b,
            ExportValue::Number(n) => *n != 0.0 && !n.is_nan(),
            ExportValue::String(s) => !s.is_empty(),
            ExportValue::BigInt(digits) => digits.trim_start_matches('-') != "0",
            _ => true,
        }
    }

    /// Print the value as a JavaScript expression deep-equal to it.
    ///
    /// `name` only labels the error when some part of the value has no
    /// literal form.
    pub fn to_literal(&self, name: &str) -> Result<String> {
        let mut out = String::new();
        self.write_literal(name, "", &mut out)?;
        Ok(out)
    }

    fn write_literal(&self, name: &str, path: &str, out: &mut String) -> Result<()> {
        match self {
            ExportValue::Undefined => out.push_str("undefined"),
            ExportValue::Null => out.push_str("null"),
            ExportValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            ExportValue::Number(n) => write_number(*n, out),
            ExportValue::String(s) => write_string(s, out),
            ExportValue::BigInt(digits) => {
                if let Some(abs) = digits.strip_prefix('-') {
                    let _ = write!(out, "-{}n", abs);
                } else {
                    let _ = write!(out, "{}n", digits);
                }
            }
            ExportValue::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_literal(name, &format!("{}[{}]", path, i), out)?;
                }
                out.push(']');
            }
            ExportValue::Object(entries) => {
                if entries.is_empty() {
                    out.push_str("{}");
                    return Ok(());
                }
                out.push_str("{ ");
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    write_key(key, out);
                    out.push_str(": ");
                    value.write_literal(name, &format!("{}.{}", path, key), out)?;
                }
                out.push_str(" }");
            }
            ExportValue::Function(_)
            | ExportValue::Symbol(_)
            | ExportValue::Circular
            | ExportValue::Unsupported(_) => {
                let at = if path.is_empty() {
                    String::new()
                } else {
                    format!(" at `{}{}`", name, path)
                };
                let what = match self {
                    ExportValue::Unsupported(kind) => format!("{} instances", kind),
                    other => format!("{} values", other.type_name()),
                };
                return Err(BuildError::UnserializableValue {
                    name: name.to_string(),
                    reason: format!("{} have no literal form{}", what, at),
                });
            }
        }
        Ok(())
    }
}

fn write_number(n: f64, out: &mut String) {
    if n.is_nan() {
        out.push_str("NaN");
    } else if n.is_infinite() {
        out.push_str(if n > 0.0 { "Infinity" } else { "-Infinity" });
    } else if n == 0.0 && n.is_sign_negative() {
        out.push_str("-0");
    } else {
        let _ = write!(out, "{}", n);
    }
}

fn write_string(s: &str, out: &mut String) {
    // JSON string syntax is a subset of JavaScript string syntax.
    match serde_json::to_string(s) {
        Ok(quoted) => out.push_str(&quoted),
        Err(_) => out.push_str("\"\""),
    }
}

fn write_key(key: &str, out: &mut String) {
    if key == "__proto__" {
        // A plain `__proto__:` entry would set the prototype instead.
        out.push_str("[\"__proto__\"]");
    } else if is_identifier_name(key) {
        out.push_str(key);
    } else {
        write_string(key, out);
    }
}

/// True when `name` can be the target of a `var` declaration.
pub fn is_declarable_name(name: &str) -> bool {
    is_identifier_name(name)
        && !is_reserved_keyword(name)
        && !matches!(name, "undefined" | "NaN" | "Infinity" | "eval" | "arguments")
}

/// Numbers travel as JSON numbers, with the non-finite ones spelled as strings.
mod js_number {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(n: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if n.is_nan() {
            serializer.serialize_str("NaN")
        } else if n.is_infinite() {
            serializer.serialize_str(if *n > 0.0 { "Infinity" } else { "-Infinity" })
        } else if *n == 0.0 && n.is_sign_negative() {
            serializer.serialize_str("-0")
        } else {
            serializer.serialize_f64(*n)
        }
    }

    struct NumberVisitor;

    impl<'de> Visitor<'de> for NumberVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a number or one of \"NaN\", \"Infinity\", \"-Infinity\", \"-0\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            match v {
                "NaN" => Ok(f64::NAN),
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                "-0" => Ok(-0.0),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        deserializer.deserialize_any(NumberVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(entries: &[(&str, ExportValue)]) -> ExportValue {
        ExportValue::Object(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_object_literal_keeps_key_order() {
        let value = obj(&[
            ("count", ExportValue::Number(3.0)),
            ("label", ExportValue::String("hi \"there\"".into())),
            ("data-id", ExportValue::Null),
            ("__proto__", ExportValue::Bool(true)),
        ]);
        assert_eq!(
            value.to_literal("Widget").unwrap(),
            r#"{ count: 3, label: "hi \"there\"", "data-id": null, ["__proto__"]: true }"#
        );
    }

    #[test]
    fn test_numbers() {
        let cases = [
            (1.5, "1.5"),
            (-2.0, "-2"),
            (f64::NAN, "NaN"),
            (f64::NEG_INFINITY, "-Infinity"),
            (-0.0, "-0"),
        ];
        for (n, expected) in cases {
            assert_eq!(ExportValue::Number(n).to_literal("n").unwrap(), expected);
        }
        assert_eq!(
            ExportValue::BigInt("-12".into()).to_literal("b").unwrap(),
            "-12n"
        );
    }

    #[test]
    fn test_nested_function_is_rejected_with_path() {
        let value = obj(&[(
            "items",
            ExportValue::Array(vec![
                ExportValue::Number(1.0),
                ExportValue::Function("render".into()),
            ]),
        )]);
        let err = value.to_literal("Config").unwrap_err();
        match err {
            BuildError::UnserializableValue { name, reason } => {
                assert_eq!(name, "Config");
                assert!(reason.contains("function"));
                assert!(reason.contains("Config.items[1]"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_symbol_and_cycle_are_rejected() {
        assert!(ExportValue::Symbol("tag".into()).to_literal("s").is_err());
        let cyclic = obj(&[("self", ExportValue::Circular)]);
        assert!(matches!(
            cyclic.to_literal("Node"),
            Err(BuildError::UnserializableValue { .. })
        ));
    }

    #[test]
    fn test_non_plain_object_is_rejected() {
        let value = obj(&[("when", ExportValue::Unsupported("Date".into()))]);
        match value.to_literal("Schedule").unwrap_err() {
            BuildError::UnserializableValue { name, reason } => {
                assert_eq!(name, "Schedule");
                assert!(reason.contains("Date instances"), "{reason}");
                assert!(reason.contains("Schedule.when"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let decoded: ExportValue =
            serde_json::from_str(r#"{"type":"unsupported","value":"Map"}"#).unwrap();
        assert_eq!(decoded, ExportValue::Unsupported("Map".into()));
    }

    #[test]
    fn test_tagged_json_encoding() {
        let value = obj(&[
            ("n", ExportValue::Number(f64::INFINITY)),
            ("list", ExportValue::Array(vec![ExportValue::Undefined])),
        ]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(
            json,
            r#"{"type":"object","value":[["n",{"type":"number","value":"Infinity"}],["list",{"type":"array","value":[{"type":"undefined"}]}]]}"#
        );
        let back: ExportValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_declarable_names() {
        assert!(is_declarable_name("Widget"));
        assert!(is_declarable_name("$store"));
        assert!(!is_declarable_name("class"));
        assert!(!is_declarable_name("undefined"));
        assert!(!is_declarable_name("two words"));
        assert!(!is_declarable_name(""));
    }
}
