//! XSS sanitization of inbound JSON bodies.
//!
//! The HTML rules themselves sit behind the [`Sanitizer`] trait; the pipeline
//! only walks the JSON tree and replaces every string with the sanitized
//! value. A field the sanitizer rejects is cleared instead of failing the
//! request.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SanitizeError {
    #[error("input of {len} bytes exceeds limit of {limit}")]
    TooLong { len: usize, limit: usize },
}

pub trait Sanitizer: Send + Sync {
    fn sanitize(&self, input: &str) -> Result<String, SanitizeError>;
}

/// Escapes HTML metacharacters and drops control characters other than
/// tab, newline and carriage return.
#[derive(Debug, Clone, Copy)]
pub struct HtmlEscaper {
    max_len: usize,
}

impl HtmlEscaper {
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }
}

impl Sanitizer for HtmlEscaper {
    fn sanitize(&self, input: &str) -> Result<String, SanitizeError> {
        if input.len() > self.max_len {
            return Err(SanitizeError::TooLong { len: input.len(), limit: self.max_len });
        }
        let mut output = String::with_capacity(input.len());
        for c in input.chars() {
            match c {
                '&' => output.push_str("&amp;"),
                '<' => output.push_str("&lt;"),
                '>' => output.push_str("&gt;"),
                '"' => output.push_str("&quot;"),
                '\'' => output.push_str("&#x27;"),
                '/' => output.push_str("&#x2F;"),
                '\t' | '\n' | '\r' => output.push(c),
                c if c.is_control() => {}
                _ => output.push(c),
            }
        }
        Ok(output)
    }
}

/// Outcome of one [`sanitize_json`] pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SanitizeReport {
    /// Strings whose value changed.
    pub modified: usize,
    /// Strings the sanitizer rejected; these were cleared.
    pub cleared: usize,
}

impl SanitizeReport {
    pub fn changed(&self) -> bool {
        self.modified + self.cleared > 0
    }
}

/// Recursively sanitizes every string value in `value`. Object keys are left alone.
pub fn sanitize_json(value: &mut Value, sanitizer: &dyn Sanitizer) -> SanitizeReport {
    let mut report = SanitizeReport::default();
    walk(value, sanitizer, &mut report);
    report
}

fn walk(value: &mut Value, sanitizer: &dyn Sanitizer, report: &mut SanitizeReport) {
    match value {
        Value::String(s) => match sanitizer.sanitize(s) {
            Ok(clean) => {
                if clean != *s {
                    report.modified += 1;
                    *s = clean;
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "sanitizer rejected field; clearing it");
                report.cleared += 1;
                s.clear();
            }
        },
        Value::Array(items) => {
            for item in items {
                walk(item, sanitizer, report);
            }
        }
        Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                walk(v, sanitizer, report);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escapes_script_tag() {
        let s = HtmlEscaper::new(100);
        assert_eq!(
            s.sanitize("<script>alert('XSS')</script>").unwrap(),
            "&lt;script&gt;alert(&#x27;XSS&#x27;)&lt;&#x2F;script&gt;"
        );
        assert_eq!(s.sanitize("plain text").unwrap(), "plain text");
    }

    #[test]
    fn test_strips_control_characters() {
        let s = HtmlEscaper::new(100);
        assert_eq!(s.sanitize("a\u{0}b\u{7}c\nd").unwrap(), "abc\nd");
    }

    #[test]
    fn test_rejects_oversized_input() {
        let s = HtmlEscaper::new(4);
        assert_eq!(s.sanitize("12345"), Err(SanitizeError::TooLong { len: 5, limit: 4 }));
        assert!(s.sanitize("1234").is_ok());
    }

    #[test]
    fn test_sanitize_json_nested() {
        let mut data = json!({
            "fullName": "<b>John</b>",
            "age": 30,
            "tags": ["<img src=x onerror=alert(1)>", "normal"],
            "profile": { "bio": "\"quoted\"" },
            "active": true
        });

        let report = sanitize_json(&mut data, &HtmlEscaper::new(1000));

        assert_eq!(data["fullName"], "&lt;b&gt;John&lt;&#x2F;b&gt;");
        assert_eq!(data["tags"][0], "&lt;img src=x onerror=alert(1)&gt;");
        assert_eq!(data["tags"][1], "normal");
        assert_eq!(data["profile"]["bio"], "&quot;quoted&quot;");
        assert_eq!(data["age"], 30);
        assert_eq!(report, SanitizeReport { modified: 3, cleared: 0 });
    }

    #[test]
    fn test_failing_field_is_cleared_not_fatal() {
        let mut data = json!({ "short": "ok", "long": "x".repeat(50) });
        let report = sanitize_json(&mut data, &HtmlEscaper::new(10));
        assert_eq!(data["short"], "ok");
        assert_eq!(data["long"], "");
        assert_eq!(report, SanitizeReport { modified: 0, cleared: 1 });
        assert!(report.changed());
    }

    #[test]
    fn test_untouched_document_reports_no_change() {
        let mut data = json!({ "a": "hello", "b": [1, 2, null] });
        assert!(!sanitize_json(&mut data, &HtmlEscaper::new(10)).changed());
    }
}
