//! SPICE library grammar.
//!
//! The format is line oriented. A logical statement is one physical line plus
//! any `+` continuation lines that follow it; comment and blank lines may sit
//! between continuations.
//!
//! ```text
//! source        = { statement | comment_line | blank_line }
//! statement     = line { { comment_line | blank_line } continuation }
//! continuation  = ws* '+' { any }
//! comment_line  = ws* '*' { any }
//!
//! model_unit    = dot_model | dot_subckt
//! dot_model     = ".model" ws model_name { any }
//! dot_subckt    = ".subckt" ws model_name { any } { source_line } dot_ends
//! dot_ends      = ".ends" { any }
//! model_name    = ( any - ws - '(' )+
//!
//! dot_include   = (".include" | ".inc") ws include_path [ws] [inline_comment]
//! inline_comment = ( ';' | '$' ) { any }    (* '$' only after ws, never "${" *)
//! include_path  = '"' path_without_quotes '"'
//!               | "'" path_without_apostrophes "'"
//!               | bare_path
//!
//! unknown_line  = any other statement
//! ```
//!
//! A leading byte-order mark is ignored. Keywords are case-insensitive. The
//! grammar does not check model semantics; an unknown device type is the
//! model factory's problem.

/// Every rule of the grammar, structural ones included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    SpiceSource,
    BlankLine,
    CommentLine,
    Continuation,
    DotModel,
    DotSubckt,
    DotEnds,
    ModelUnit,
    ModelName,
    DotInclude,
    DotIncludePathWithoutQuotes,
    DotIncludePathWithoutApostrophes,
    DotIncludePath,
    UnknownLine,
}

/// Rules kept as nodes when a library file is turned into a parse tree.
/// Everything else is structural and elided.
pub fn library_selector(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::ModelUnit
            | Rule::ModelName
            | Rule::DotInclude
            | Rule::DotIncludePathWithoutQuotes
            | Rule::DotIncludePathWithoutApostrophes
            | Rule::DotIncludePath
            | Rule::UnknownLine
    )
}

/// One physical line of input, as byte offsets into the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line {
    /// 1-based line number.
    pub number: usize,
    pub start: usize,
    /// End of the line content, excluding `\r\n` / `\n`.
    pub end: usize,
}

impl Line {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

/// Split `source` into physical lines, keeping byte offsets.
pub fn physical_lines(source: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut number = 1;

    for (idx, ch) in source.char_indices() {
        if ch == '\n' {
            let mut end = idx;
            if end > start && source.as_bytes()[end - 1] == b'\r' {
                end -= 1;
            }
            lines.push(Line { number, start, end });
            start = idx + 1;
            number += 1;
        }
    }

    if start < source.len() {
        let mut end = source.len();
        if source.as_bytes()[end - 1] == b'\r' {
            end -= 1;
        }
        lines.push(Line { number, start, end });
    }

    lines
}

/// Classify a physical line on its own, without looking at its neighbours.
pub fn line_rule(line: &str) -> Rule {
    let trimmed = line.trim_start();
    if trimmed.is_empty() {
        Rule::BlankLine
    } else if trimmed.starts_with('*') {
        Rule::CommentLine
    } else if trimmed.starts_with('+') {
        Rule::Continuation
    } else {
        statement_rule(trimmed)
    }
}

/// Classify the first line of a statement by its leading keyword.
fn statement_rule(line: &str) -> Rule {
    let Some(keyword) = line.split_whitespace().next() else {
        return Rule::UnknownLine;
    };

    if keyword.eq_ignore_ascii_case(".model") {
        if model_name_span(line).is_some() {
            Rule::DotModel
        } else {
            Rule::UnknownLine
        }
    } else if keyword.eq_ignore_ascii_case(".subckt") {
        if model_name_span(line).is_some() {
            Rule::DotSubckt
        } else {
            Rule::UnknownLine
        }
    } else if keyword.eq_ignore_ascii_case(".ends") {
        Rule::DotEnds
    } else if keyword.eq_ignore_ascii_case(".include") || keyword.eq_ignore_ascii_case(".inc") {
        Rule::DotInclude
    } else {
        Rule::UnknownLine
    }
}

/// Whether the line opens a subcircuit block, named or not.
pub fn opens_subckt(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .is_some_and(|keyword| keyword.eq_ignore_ascii_case(".subckt"))
}

/// Byte offset where an inline comment starts: `;`, or a `$` at the start
/// or after whitespace that does not open a `${VAR}` reference.
pub fn inline_comment_start(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    bytes.iter().enumerate().position(|(idx, &b)| {
        b == b';'
            || (b == b'$'
                && (idx == 0 || bytes[idx - 1].is_ascii_whitespace())
                && bytes.get(idx + 1) != Some(&b'{'))
    })
}

/// Byte range of the model name in a `.model` / `.subckt` line.
pub fn model_name_span(line: &str) -> Option<(usize, usize)> {
    let keyword_start = line.len() - line.trim_start().len();
    let keyword_end = line[keyword_start..]
        .find(char::is_whitespace)
        .map(|i| keyword_start + i)?;

    let rest = &line[keyword_end..];
    let name_start = keyword_end + (rest.len() - rest.trim_start().len());
    let name_len = line[name_start..]
        .find(|c: char| c.is_whitespace() || c == '(')
        .unwrap_or(line.len() - name_start);

    if name_len == 0 {
        None
    } else {
        Some((name_start, name_start + name_len))
    }
}

/// The include path of a `.include` line, located by its lexical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncludePathSpan {
    pub rule: Rule,
    pub start: usize,
    pub end: usize,
}

/// Locate the include path in a `.include` line.
///
/// On failure returns the byte offset the problem was found at and a
/// message, both relative to `line`.
pub fn include_path_span(line: &str) -> Result<IncludePathSpan, (usize, &'static str)> {
    let keyword_start = line.len() - line.trim_start().len();
    let keyword_end = line[keyword_start..]
        .find(char::is_whitespace)
        .map(|i| keyword_start + i)
        .unwrap_or(line.len());

    let rest = &line[keyword_end..];
    let path_start = keyword_end + (rest.len() - rest.trim_start().len());
    let tail = &line[path_start..];

    if tail.is_empty() || inline_comment_start(tail) == Some(0) {
        return Err((path_start, "missing include path"));
    }

    let quoted = |delimiter: char, rule: Rule| {
        let body_start = path_start + 1;
        let Some(len) = line[body_start..].find(delimiter) else {
            return Err((path_start, "unterminated include path"));
        };
        if len == 0 {
            return Err((path_start, "empty include path"));
        }
        let body_end = body_start + len;
        let after = line[body_end + 1..].trim_start();
        if !after.is_empty() && inline_comment_start(after) != Some(0) {
            return Err((body_end + 1, "unexpected text after include path"));
        }
        Ok(IncludePathSpan {
            rule,
            start: body_start,
            end: body_end,
        })
    };

    match tail.chars().next() {
        Some('"') => quoted('"', Rule::DotIncludePathWithoutQuotes),
        Some('\'') => quoted('\'', Rule::DotIncludePathWithoutApostrophes),
        _ => {
            let bare = match inline_comment_start(tail) {
                Some(idx) => &tail[..idx],
                None => tail,
            };
            let bare = bare.trim_end();
            Ok(IncludePathSpan {
                rule: Rule::DotIncludePath,
                start: path_start,
                end: path_start + bare.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_physical_lines_handle_crlf_and_missing_newline() {
        let source = "a\r\nbb\n\nccc";
        let lines = physical_lines(source);
        let texts: Vec<_> = lines.iter().map(|l| l.text(source)).collect();
        assert_eq!(texts, vec!["a", "bb", "", "ccc"]);
        assert_eq!(lines[3].number, 4);
    }

    #[test]
    fn test_line_rules() {
        assert_eq!(line_rule("   "), Rule::BlankLine);
        assert_eq!(line_rule("* a comment"), Rule::CommentLine);
        assert_eq!(line_rule("  + IS=1n"), Rule::Continuation);
        assert_eq!(line_rule(".MODEL D1 D(IS=1n)"), Rule::DotModel);
        assert_eq!(line_rule(".model"), Rule::UnknownLine);
        assert_eq!(line_rule(".subckt opamp in+ in- out"), Rule::DotSubckt);
        assert_eq!(line_rule(".ENDS opamp"), Rule::DotEnds);
        assert_eq!(line_rule(".include lib.spi"), Rule::DotInclude);
        assert_eq!(line_rule(".inc lib.spi"), Rule::DotInclude);
        assert_eq!(line_rule("R1 1 2 10k"), Rule::UnknownLine);
        assert_eq!(line_rule(".param x=1"), Rule::UnknownLine);
    }

    #[test]
    fn test_model_name_span_stops_at_paren() {
        let line = ".model Q2N3904(NPN)";
        assert_eq!(model_name_span(line).map(|(s, e)| &line[s..e]), Some("Q2N3904"));

        let line = "  .subckt  LM358 1 2 3";
        assert_eq!(model_name_span(line).map(|(s, e)| &line[s..e]), Some("LM358"));
    }

    #[test]
    fn test_include_path_forms() {
        let line = ".include \"models/a b.lib\"";
        let span = include_path_span(line).unwrap();
        assert_eq!(span.rule, Rule::DotIncludePathWithoutQuotes);
        assert_eq!(&line[span.start..span.end], "models/a b.lib");

        let line = ".include 'models/a.lib' ; vendor";
        let span = include_path_span(line).unwrap();
        assert_eq!(span.rule, Rule::DotIncludePathWithoutApostrophes);
        assert_eq!(&line[span.start..span.end], "models/a.lib");

        let line = ".inc models/a.lib   ";
        let span = include_path_span(line).unwrap();
        assert_eq!(span.rule, Rule::DotIncludePath);
        assert_eq!(&line[span.start..span.end], "models/a.lib");
    }

    #[test]
    fn test_include_path_stops_at_dollar_comment() {
        let line = ".include b.lib $ vendor models";
        let span = include_path_span(line).unwrap();
        assert_eq!(&line[span.start..span.end], "b.lib");

        let line = ".include \"b.lib\" $ vendor models";
        let span = include_path_span(line).unwrap();
        assert_eq!(&line[span.start..span.end], "b.lib");

        let line = ".include ${SPICE_LIB}/b.lib";
        let span = include_path_span(line).unwrap();
        assert_eq!(&line[span.start..span.end], "${SPICE_LIB}/b.lib");

        assert_eq!(
            include_path_span(".include $ nothing here").unwrap_err().1,
            "missing include path"
        );
    }

    #[test]
    fn test_inline_comment_start() {
        assert_eq!(inline_comment_start("IS=1n ; note"), Some(6));
        assert_eq!(inline_comment_start("IS=1n $ note"), Some(6));
        assert_eq!(inline_comment_start("IS=1n$x"), None);
        assert_eq!(inline_comment_start("a ${LIB}"), None);
        assert_eq!(inline_comment_start("plain"), None);
    }

    #[test]
    fn test_opens_subckt() {
        assert!(opens_subckt(".SUBCKT amp a b"));
        assert!(opens_subckt("  .subckt"));
        assert!(!opens_subckt(".subcktx"));
        assert!(!opens_subckt(".ends"));
    }

    #[test]
    fn test_include_path_errors() {
        assert_eq!(include_path_span(".include").unwrap_err().1, "missing include path");
        assert_eq!(
            include_path_span(".include \"open.lib").unwrap_err().1,
            "unterminated include path"
        );
        assert_eq!(include_path_span(".include ''").unwrap_err().1, "empty include path");
        assert_eq!(
            include_path_span(".include \"a.lib\" junk").unwrap_err(),
            (16, "unexpected text after include path")
        );
    }

    #[test]
    fn test_selector_keeps_only_semantic_rules() {
        assert!(library_selector(Rule::ModelUnit));
        assert!(library_selector(Rule::DotIncludePath));
        assert!(library_selector(Rule::UnknownLine));
        assert!(!library_selector(Rule::CommentLine));
        assert!(!library_selector(Rule::DotModel));
        assert!(!library_selector(Rule::SpiceSource));
    }
}
