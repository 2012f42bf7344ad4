//! Caret-underlined source excerpts for static errors (lex, parse,
//! loop-labeling). Grounded on `mkerrctx`/`print_offending_line_buf` in
//! `original_source/src/err.c`: N lines of context before the
//! offending line, the offending line itself with carets spanning
//! `[start, end)` (at least one caret even for a zero-width span), then
//! N lines of context after.

use crate::token::Span;

const CONTEXT_LINES: usize = 2;

/// Renders `span`'s line (plus `CONTEXT_LINES` of surrounding context)
/// from `source`, with a caret-underline beneath the offending range.
pub fn render(source: &str, span: Span) -> String {
    let lines: Vec<&str> = source.lines().collect();
    if lines.is_empty() {
        return String::new();
    }
    let offending_idx = span.line.saturating_sub(1).min(lines.len() - 1);

    let before_start = offending_idx.saturating_sub(CONTEXT_LINES);
    let after_end = (offending_idx + CONTEXT_LINES).min(lines.len() - 1);

    let mut out = String::new();
    for idx in before_start..offending_idx {
        out.push_str(lines[idx]);
        out.push('\n');
    }

    let offending = lines[offending_idx];
    out.push_str(offending);
    out.push('\n');

    let col_start = column_on_line(source, span.start, offending_idx, &lines);
    let span_width = span.end.saturating_sub(span.start).max(1);
    for _ in 0..col_start {
        out.push(' ');
    }
    for _ in 0..span_width {
        out.push('^');
    }
    out.push('\n');

    for idx in (offending_idx + 1)..=after_end {
        out.push_str(lines[idx]);
        out.push('\n');
    }

    out
}

/// Byte offset of `byte_offset` relative to the start of `lines[line_idx]`.
fn column_on_line(source: &str, byte_offset: usize, line_idx: usize, lines: &[&str]) -> usize {
    let line_start = lines[..line_idx]
        .iter()
        .map(|l| l.len() + 1)
        .sum::<usize>();
    byte_offset.saturating_sub(line_start).min(
        source
            .get(line_start..)
            .map(|rest| rest.len())
            .unwrap_or(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caret_spans_offending_range() {
        let source = "let x = 1;\nlet y = @;\nprint x;";
        let span = Span::new(19, 20, 2);
        let rendered = render(source, span);
        let lines: Vec<&str> = rendered.lines().collect();
        assert!(lines.contains(&"let y = @;"));
        let caret_line = lines
            .iter()
            .find(|l| l.trim_start() == "^" || l.contains('^'))
            .expect("caret line present");
        assert_eq!(caret_line.matches('^').count(), 1);
    }

    #[test]
    fn test_minimum_one_caret_for_zero_width_span() {
        let source = "break;";
        let span = Span::new(0, 0, 1);
        let rendered = render(source, span);
        assert_eq!(rendered.matches('^').count(), 1);
    }

    #[test]
    fn test_includes_context_lines() {
        let source = "a;\nb;\nc;\nd;\ne;";
        let span = Span::new(6, 7, 3);
        let rendered = render(source, span);
        assert!(rendered.contains("a;"));
        assert!(rendered.contains("e;"));
    }
}
