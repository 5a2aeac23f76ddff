//! Assertion rendering
//!
//! Turns captured assertion expressions into readable failure descriptions.

use anyhow::Result;

use crate::models::AssertionContext;

/// Renders an assertion capture into a human-readable description
pub trait AssertionFormatter: Send + Sync {
    fn format(&self, context: &AssertionContext) -> Result<String>;
}

/// Default formatter: the asserted source followed by each captured value
pub struct CaptureFormatter;

impl AssertionFormatter for CaptureFormatter {
    fn format(&self, context: &AssertionContext) -> Result<String> {
        if context.source.is_empty() {
            anyhow::bail!("assertion capture has no source expression");
        }

        let mut rendered = context.source.clone();
        for capture in &context.captures {
            rendered.push_str("\n  ");
            rendered.push_str(&capture.expression);
            rendered.push_str(" => ");
            rendered.push_str(&capture.value);
        }
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Capture;

    #[test]
    fn test_renders_source_and_captures() {
        let context = AssertionContext {
            source: "t.is(a + b, 3)".to_string(),
            captures: vec![
                Capture {
                    expression: "a + b".to_string(),
                    value: "4".to_string(),
                },
                Capture {
                    expression: "a".to_string(),
                    value: "2".to_string(),
                },
            ],
        };

        let rendered = CaptureFormatter.format(&context).unwrap();
        assert!(rendered.starts_with("t.is(a + b, 3)"));
        assert!(rendered.contains("a + b => 4"));
        assert!(rendered.contains("a => 2"));
    }

    #[test]
    fn test_source_without_captures() {
        let context = AssertionContext {
            source: "t.truthy(flag)".to_string(),
            captures: Vec::new(),
        };
        assert_eq!(
            CaptureFormatter.format(&context).unwrap(),
            "t.truthy(flag)"
        );
    }

    #[test]
    fn test_empty_source_is_an_error() {
        let context = AssertionContext {
            source: String::new(),
            captures: Vec::new(),
        };
        assert!(CaptureFormatter.format(&context).is_err());
    }
}
