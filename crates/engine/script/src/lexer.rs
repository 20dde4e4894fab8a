//! Comment stripping and line splitting

use crate::error::CompileErrorKind;

/// A trimmed, non-empty script line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// 1-based line number in the source text
    pub number: usize,
    pub text: String,
}

/// Strip `//` and `/* */` comments and drop blank lines
///
/// On an unterminated block comment, returns the line it was opened on.
pub fn lines(source: &str) -> Result<Vec<SourceLine>, (usize, CompileErrorKind)> {
    let mut out = Vec::new();
    let mut comment_start: Option<usize> = None;

    for (index, raw) in source.lines().enumerate() {
        let number = index + 1;
        let mut text = String::with_capacity(raw.len());
        let mut rest = raw;

        loop {
            if comment_start.is_some() {
                match rest.find("*/") {
                    Some(end) => {
                        comment_start = None;
                        rest = &rest[end + 2..];
                    }
                    None => break,
                }
                continue;
            }

            let line_comment = rest.find("//");
            let block_comment = rest.find("/*");
            match (line_comment, block_comment) {
                (Some(l), Some(b)) if b < l => {
                    text.push_str(&rest[..b]);
                    text.push(' ');
                    comment_start = Some(number);
                    rest = &rest[b + 2..];
                }
                (Some(l), _) => {
                    text.push_str(&rest[..l]);
                    break;
                }
                (None, Some(b)) => {
                    text.push_str(&rest[..b]);
                    text.push(' ');
                    comment_start = Some(number);
                    rest = &rest[b + 2..];
                }
                (None, None) => {
                    text.push_str(rest);
                    break;
                }
            }
        }

        let trimmed = text.trim();
        if !trimmed.is_empty() {
            out.push(SourceLine {
                number,
                text: trimmed.to_string(),
            });
        }
    }

    match comment_start {
        Some(line) => Err((line, CompileErrorKind::UnterminatedComment)),
        None => Ok(out),
    }
}
