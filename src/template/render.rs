//! Substitution of bound values into templates

use std::fmt::Write;

use super::lexer::Piece;
use super::registry::{Template, TemplateError};
use super::value::{PlaceholderClass, Value};
use super::Bindings;
use crate::profile::FormatRules;

/// Part of a rendered base template
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Anchor(String),
}

/// Check that every placeholder has a binding of an acceptable type and
/// value, so that rendering itself cannot fail on a bad binding.
///
/// Coverage is checked before types so that a missing binding is always
/// reported as such, whatever else is wrong with the bindings.
pub fn check_bindings(template: &Template, bindings: &Bindings) -> Result<(), TemplateError> {
    if let Some(missing) = template
        .placeholders()
        .iter()
        .find(|p| !bindings.contains_key(p.as_str()))
    {
        return Err(TemplateError::MissingBinding {
            template: template.id.clone(),
            placeholder: missing.clone(),
        });
    }

    for placeholder in template.placeholders() {
        let class = template.class_of(placeholder);
        let value = &bindings[placeholder.as_str()];
        if !class.accepts(value) {
            return Err(TemplateError::TypeMismatch {
                template: template.id.clone(),
                placeholder: placeholder.clone(),
                expected: class.to_string(),
                found: value.type_name(),
            });
        }
        check_value(class, value).map_err(|reason| TemplateError::InvalidValue {
            template: template.id.clone(),
            placeholder: placeholder.clone(),
            reason,
        })?;
    }
    Ok(())
}

/// Value-level rules for a binding already known to have the right type
fn check_value(class: &PlaceholderClass, value: &Value) -> Result<(), String> {
    match (class, value) {
        (PlaceholderClass::Name, Value::Text(s)) => check_name(s),
        (PlaceholderClass::Float, Value::Float(f)) if !f.is_finite() => {
            Err(format!("{} is not a finite number", f))
        }
        (PlaceholderClass::Token { allowed }, Value::Token(t)) => {
            if !is_bare_word(t) {
                return Err(format!("'{}' is not a bare upper-case word", t));
            }
            if !allowed.is_empty() && !allowed.contains(t) {
                return Err(format!("'{}' is not one of {}", t, allowed.join(", ")));
            }
            Ok(())
        }
        (PlaceholderClass::QuotedList | PlaceholderClass::QuotedLines, Value::List(items)) => {
            items.iter().try_for_each(|s| check_name(s))
        }
        _ => Ok(()),
    }
}

/// Render a fragment to text.
///
/// Bindings for names the template does not use are ignored.
pub fn render(
    template: &Template,
    bindings: &Bindings,
    rules: &FormatRules,
) -> Result<String, TemplateError> {
    if let Some(anchor) = template.anchor_points().first() {
        return Err(TemplateError::AnchorPoint {
            template: template.id.clone(),
            anchor: anchor.clone(),
            reason: "cannot render a template with anchor points as a fragment".to_string(),
        });
    }
    let mut out = String::new();
    for segment in render_skeleton(template, bindings, rules)? {
        if let Segment::Text(text) = segment {
            out.push_str(&text);
        }
    }
    Ok(out)
}

/// Render a template, keeping its anchor points as separate segments
pub fn render_skeleton(
    template: &Template,
    bindings: &Bindings,
    rules: &FormatRules,
) -> Result<Vec<Segment>, TemplateError> {
    check_bindings(template, bindings)?;

    let mut segments = Vec::new();
    let mut current = String::new();
    for (piece, _) in template.pieces() {
        match piece {
            Piece::Literal(text) => current.push_str(text),
            Piece::OpenBrace => current.push('{'),
            Piece::CloseBrace => current.push('}'),
            Piece::Placeholder(name) => {
                let value = &bindings[name.as_str()];
                let formatted = format_value(template, name, value, rules)?;
                current.push_str(&formatted);
            }
            Piece::AnchorPoint(name) => {
                if !current.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut current)));
                }
                segments.push(Segment::Anchor(name.clone()));
            }
        }
    }
    if !current.is_empty() {
        segments.push(Segment::Text(current));
    }
    Ok(segments)
}

fn format_value(
    template: &Template,
    placeholder: &str,
    value: &Value,
    rules: &FormatRules,
) -> Result<String, TemplateError> {
    let invalid = |reason: String| TemplateError::InvalidValue {
        template: template.id.clone(),
        placeholder: placeholder.to_string(),
        reason,
    };

    let precision = rules.float_precision;
    let class = template.class_of(placeholder);
    match (class, value) {
        (PlaceholderClass::Text | PlaceholderClass::Name, Value::Text(s)) => Ok(s.clone()),
        (PlaceholderClass::Integer, Value::Integer(i)) => Ok(i.to_string()),
        (PlaceholderClass::Float, Value::Integer(i)) => Ok(format!("{:.*}", precision, *i as f64)),
        (PlaceholderClass::Float, Value::Float(f)) => Ok(format!("{:.*}", precision, f)),
        (PlaceholderClass::Timestamp, Value::Timestamp(t)) => {
            let mut out = String::new();
            write!(out, "{}", t.format(&rules.timestamp_format))
                .map_err(|_| invalid(format!("cannot format with '{}'", rules.timestamp_format)))?;
            Ok(out)
        }
        (PlaceholderClass::Token { .. }, Value::Token(t)) => Ok(t.clone()),
        (PlaceholderClass::Switch, Value::Bool(b)) => {
            Ok(if *b { "ON" } else { "OFF" }.to_string())
        }
        (PlaceholderClass::QuotedList, Value::List(items)) => Ok(items
            .iter()
            .map(|s| format!("\"{}\"", s))
            .collect::<Vec<_>>()
            .join(" ")),
        (PlaceholderClass::QuotedLines, Value::List(items)) => {
            Ok(items.iter().map(|s| format!("\t\"{}\"\n", s)).collect())
        }
        (class, value) => Err(TemplateError::TypeMismatch {
            template: template.id.clone(),
            placeholder: placeholder.to_string(),
            expected: class.to_string(),
            found: value.type_name(),
        }),
    }
}

fn is_bare_word(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn check_name(name: &str) -> Result<(), String> {
    if name.contains(['"', '\n', '\r']) {
        return Err(format!("name {:?} contains a quote or line break", name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Profile;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn rules() -> FormatRules {
        Profile::default().format
    }

    fn bindings(pairs: &[(&str, Value)]) -> Bindings {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn ground() -> Template {
        Template::parse(
            "ground",
            "platform",
            "DEFINE PLATFORM ECR_FIXED \"{object_name}\"\n\tSTATE {latitude} {longitude} {altitude}\n",
        )
        .expect("Should parse")
        .with_class("object_name", PlaceholderClass::Name)
        .with_class("latitude", PlaceholderClass::Float)
        .with_class("longitude", PlaceholderClass::Float)
        .with_class("altitude", PlaceholderClass::Float)
    }

    #[test]
    fn test_render_ground_station() {
        let b = bindings(&[
            ("object_name", Value::text("GS-1")),
            ("latitude", Value::Float(40.4294056)),
            ("longitude", Value::Float(-3.5)),
            ("altitude", Value::Integer(0)),
        ]);
        let out = render(&ground(), &b, &rules()).expect("Should render");
        assert_eq!(
            out,
            "DEFINE PLATFORM ECR_FIXED \"GS-1\"\n\tSTATE 40.42940560000000261 -3.50000000000000000 0.00000000000000000\n"
        );
    }

    #[test]
    fn test_missing_binding_reported_before_type_errors() {
        let b = bindings(&[
            ("object_name", Value::Integer(7)),
            ("latitude", Value::Float(1.0)),
            ("longitude", Value::Float(1.0)),
        ]);
        let result = render(&ground(), &b, &rules());
        assert!(matches!(
            result,
            Err(TemplateError::MissingBinding { ref placeholder, .. }) if placeholder == "altitude"
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let b = bindings(&[
            ("object_name", Value::text("GS-1")),
            ("latitude", Value::text("north")),
            ("longitude", Value::Float(1.0)),
            ("altitude", Value::Float(1.0)),
        ]);
        let result = render(&ground(), &b, &rules());
        assert!(matches!(
            result,
            Err(TemplateError::TypeMismatch { ref placeholder, found: "text", .. }) if placeholder == "latitude"
        ));
    }

    #[test]
    fn test_extra_bindings_ignored() {
        let t = Template::parse("t", "x", "A {a}\n").expect("Should parse");
        let b = bindings(&[("a", Value::text("1")), ("unused", Value::Integer(2))]);
        assert_eq!(render(&t, &b, &rules()).expect("Should render"), "A 1\n");
    }

    #[test]
    fn test_name_cannot_break_quotes() {
        let t = Template::parse("t", "x", "\"{n}\"")
            .expect("Should parse")
            .with_class("n", PlaceholderClass::Name);
        let b = bindings(&[("n", Value::text("evil\" STATE"))]);
        assert!(matches!(render(&t, &b, &rules()), Err(TemplateError::InvalidValue { .. })));
    }

    #[test]
    fn test_token_allowed_set() {
        let t = Template::parse("t", "x", "TYPE {k}").expect("Should parse").with_class(
            "k",
            PlaceholderClass::Token {
                allowed: vec!["RISE_SET".to_string(), "DELTA".to_string()],
            },
        );
        let ok = bindings(&[("k", Value::token("DELTA"))]);
        assert_eq!(render(&t, &ok, &rules()).expect("Should render"), "TYPE DELTA");
        let bad = bindings(&[("k", Value::token("SOMETIMES"))]);
        assert!(matches!(render(&t, &bad, &rules()), Err(TemplateError::InvalidValue { .. })));
        let lower = bindings(&[("k", Value::token("delta"))]);
        assert!(matches!(render(&t, &lower, &rules()), Err(TemplateError::InvalidValue { .. })));
    }

    #[test]
    fn test_value_checks_run_with_binding_checks() {
        let t = Template::parse("t", "x", "{n}\n{l}")
            .expect("Should parse")
            .with_class("n", PlaceholderClass::Name)
            .with_class("l", PlaceholderClass::QuotedLines);
        let ok = bindings(&[("n", Value::text("A")), ("l", Value::list(["B"]))]);
        assert!(check_bindings(&t, &ok).is_ok());

        let bad = bindings(&[("n", Value::text("A")), ("l", Value::list(["B", "C\nD"]))]);
        assert!(matches!(
            check_bindings(&t, &bad),
            Err(TemplateError::InvalidValue { ref placeholder, .. }) if placeholder == "l"
        ));
    }

    #[test]
    fn test_non_finite_float_rejected() {
        let t = Template::parse("t", "x", "{f}")
            .expect("Should parse")
            .with_class("f", PlaceholderClass::Float);
        let b = bindings(&[("f", Value::Float(f64::NAN))]);
        assert!(matches!(render(&t, &b, &rules()), Err(TemplateError::InvalidValue { .. })));
    }

    #[test]
    fn test_timestamp_switch_and_lists() {
        let t = Template::parse("t", "x", "EPOCH {e}\nBATCH {s}\nARGS {l}\nVARS\n{v}END\n")
            .expect("Should parse")
            .with_class("e", PlaceholderClass::Timestamp)
            .with_class("s", PlaceholderClass::Switch)
            .with_class("l", PlaceholderClass::QuotedList)
            .with_class("v", PlaceholderClass::QuotedLines);
        let epoch = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(6, 30, 0))
            .expect("valid date");
        let b = bindings(&[
            ("e", Value::Timestamp(epoch)),
            ("s", Value::Bool(false)),
            ("l", Value::list([".Earth Cartesian", "SAT-1"])),
            ("v", Value::list(["a", "b"])),
        ]);
        assert_eq!(
            render(&t, &b, &rules()).expect("Should render"),
            "EPOCH 2024 03 01 06 30 00\nBATCH OFF\nARGS \".Earth Cartesian\" \"SAT-1\"\nVARS\n\t\"a\"\n\t\"b\"\nEND\n"
        );
    }

    #[test]
    fn test_escaped_braces_render_literally() {
        let t = Template::parse("t", "x", "{{x}} {y}").expect("Should parse");
        let b = bindings(&[("y", Value::text("1"))]);
        assert_eq!(render(&t, &b, &rules()).expect("Should render"), "{x} 1");
    }

    #[test]
    fn test_skeleton_segments() {
        let t = Template::parse("b", "base", "HEAD {v}\n{@one}\nMID\n{@two}\n").expect("Should parse");
        let b = bindings(&[("v", Value::text("x"))]);
        let segments = render_skeleton(&t, &b, &rules()).expect("Should render");
        assert_eq!(
            segments,
            vec![
                Segment::Text("HEAD x\n".to_string()),
                Segment::Anchor("one".to_string()),
                Segment::Text("MID\n".to_string()),
                Segment::Anchor("two".to_string()),
            ]
        );
        assert!(matches!(render(&t, &b, &rules()), Err(TemplateError::AnchorPoint { .. })));
    }
}
