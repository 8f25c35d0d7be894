use std::ops::Range;

use super::parsers::{is_block_comment_end, is_block_comment_start, is_line_comment_start};

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    Quoted(u8),
    LineComment,
    BlockComment,
}

/// Region of statement text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Span {
    /// Rewritable SQL.
    Code(Range<usize>),
    /// String literal, quoted identifier, or comment; copied verbatim.
    Opaque(Range<usize>),
}

/// Partition `sql` into code and opaque spans covering the whole text in order.
///
/// Quotes run to the matching close quote (a doubled quote closes and reopens, which keeps
/// the escaped form inside the span); line comments stop before the newline. An unterminated
/// literal or comment runs to the end of the text.
pub(crate) fn split_spans(sql: &str) -> Vec<Span> {
    let bytes = sql.as_bytes();
    let mut spans = Vec::new();
    let mut state = State::Normal;
    let mut start = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => {
                let next = match b {
                    b'\'' | b'"' | b'`' => Some(State::Quoted(b)),
                    b'[' => Some(State::Quoted(b']')),
                    _ if is_line_comment_start(bytes, idx) => Some(State::LineComment),
                    _ if is_block_comment_start(bytes, idx) => Some(State::BlockComment),
                    _ => None,
                };
                if let Some(next) = next {
                    push_code(&mut spans, start..idx);
                    start = idx;
                    state = next;
                    idx += if matches!(next, State::Quoted(_)) { 1 } else { 2 };
                    continue;
                }
            }
            State::Quoted(close) => {
                if b == close {
                    spans.push(Span::Opaque(start..idx + 1));
                    start = idx + 1;
                    state = State::Normal;
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    spans.push(Span::Opaque(start..idx));
                    start = idx;
                    state = State::Normal;
                    continue;
                }
            }
            State::BlockComment => {
                if is_block_comment_end(bytes, idx) {
                    spans.push(Span::Opaque(start..idx + 2));
                    start = idx + 2;
                    state = State::Normal;
                    idx += 2;
                    continue;
                }
            }
        }
        idx += 1;
    }

    if start < bytes.len() {
        if state == State::Normal {
            push_code(&mut spans, start..bytes.len());
        } else {
            spans.push(Span::Opaque(start..bytes.len()));
        }
    }
    spans
}

fn push_code(spans: &mut Vec<Span>, range: Range<usize>) {
    if !range.is_empty() {
        spans.push(Span::Code(range));
    }
}
