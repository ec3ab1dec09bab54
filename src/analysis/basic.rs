//! Built-in SystemVerilog analyzer
//!
//! Line-oriented lint checks, a keyword-driven outline of design units,
//! identifier highlighting and whitespace formatting. It does not parse the
//! language; block structure is recovered from `module`/`endmodule` style
//! keyword pairs after comments and string literals are masked out.

use std::sync::LazyLock;

use lsp_types::{
    Diagnostic, DiagnosticSeverity, DocumentSymbol, FormattingOptions, NumberOrString, Position,
    Range, SymbolKind, TextEdit, Url,
};
use regex::Regex;

use crate::analysis::cache::DIAGNOSTIC_SOURCE;
use crate::analysis::{Analysis, Analyzer, AnalyzerError, Finding};
use crate::config::DEFAULT_MAX_LINE_LENGTH;
use crate::document::LineIndex;

/// Tab stop used when the client does not supply one
const TAB_WIDTH: usize = 4;

static BLOCK_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(macromodule|module|interface|package|program|class|function|task|endmodule|endinterface|endpackage|endprogram|endclass|endfunction|endtask)\b",
    )
    .expect("block keyword pattern is valid")
});

static UNIT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+(?:(?:automatic|static|virtual)\s+)*([A-Za-z_][A-Za-z0-9_$]*)")
        .expect("unit name pattern is valid")
});

static SUBROUTINE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^;(]*?([A-Za-z_][A-Za-z0-9_$]*)\s*[(;]")
        .expect("subroutine name pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Module,
    Interface,
    Package,
    Program,
    Class,
    Function,
    Task,
}

impl BlockKind {
    fn from_open(keyword: &str) -> Option<Self> {
        match keyword {
            "module" | "macromodule" => Some(Self::Module),
            "interface" => Some(Self::Interface),
            "package" => Some(Self::Package),
            "program" => Some(Self::Program),
            "class" => Some(Self::Class),
            "function" => Some(Self::Function),
            "task" => Some(Self::Task),
            _ => None,
        }
    }

    fn from_close(keyword: &str) -> Option<Self> {
        keyword.strip_prefix("end").and_then(Self::from_open)
    }

    fn keyword(self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Interface => "interface",
            Self::Package => "package",
            Self::Program => "program",
            Self::Class => "class",
            Self::Function => "function",
            Self::Task => "task",
        }
    }

    fn end_keyword(self) -> &'static str {
        match self {
            Self::Module => "endmodule",
            Self::Interface => "endinterface",
            Self::Package => "endpackage",
            Self::Program => "endprogram",
            Self::Class => "endclass",
            Self::Function => "endfunction",
            Self::Task => "endtask",
        }
    }

    fn symbol_kind(self) -> SymbolKind {
        match self {
            Self::Module | Self::Program => SymbolKind::MODULE,
            Self::Interface => SymbolKind::INTERFACE,
            Self::Package => SymbolKind::PACKAGE,
            Self::Class => SymbolKind::CLASS,
            Self::Function => SymbolKind::FUNCTION,
            Self::Task => SymbolKind::METHOD,
        }
    }

    fn is_subroutine(self) -> bool {
        matches!(self, Self::Function | Self::Task)
    }
}

/// Analyzer used when no external one is configured
#[derive(Debug, Clone)]
pub struct BasicAnalyzer {
    max_line_length: usize,
}

impl BasicAnalyzer {
    pub fn new(max_line_length: usize) -> Self {
        Self { max_line_length }
    }
}

impl Default for BasicAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

impl Analyzer for BasicAnalyzer {
    fn analyze(&self, _uri: &Url, text: &str) -> Result<Box<dyn Analysis>, AnalyzerError> {
        Ok(Box::new(BasicAnalysis::build(text, self.max_line_length)))
    }
}

#[derive(Debug)]
pub struct BasicAnalysis {
    text: String,
    index: LineIndex,
    findings: Vec<Finding>,
    symbols: Vec<DocumentSymbol>,
}

impl BasicAnalysis {
    pub fn build(text: &str, max_line_length: usize) -> Self {
        let index = LineIndex::new(text);
        let mut findings = Vec::new();
        let mut outline = Outline::default();
        let mut masker = Masker::default();

        for line in 0..index.line_count() {
            let content = line_content(text, &index, line);
            lint_line(line as u32, content, max_line_length, &mut findings);
            let masked = masker.mask(content);
            outline.scan_line(line as u32, content, &masked, &mut findings);
        }

        let end = index.position(text, text.len());
        let symbols = outline.finish(end, &mut findings);
        findings.sort_by_key(|finding| {
            let start = finding.diagnostic.range.start;
            (start.line, start.character)
        });

        Self {
            text: text.to_string(),
            index,
            findings,
            symbols,
        }
    }

    fn word_at(&self, offset: usize) -> Option<(usize, usize)> {
        let start = self.text[..offset]
            .char_indices()
            .rev()
            .take_while(|(_, ch)| is_identifier_char(*ch))
            .last()
            .map(|(idx, _)| idx)
            .unwrap_or(offset);
        let end = self.text[offset..]
            .char_indices()
            .find(|(_, ch)| !is_identifier_char(*ch))
            .map(|(idx, _)| offset + idx)
            .unwrap_or(self.text.len());

        let word = &self.text[start..end];
        let first = word.chars().next()?;
        (first.is_ascii_alphabetic() || first == '_').then_some((start, end))
    }
}

impl Analysis for BasicAnalysis {
    fn findings(&self) -> &[Finding] {
        &self.findings
    }

    fn symbols(&self) -> Vec<DocumentSymbol> {
        self.symbols.clone()
    }

    fn highlights(&self, position: Position) -> Vec<Range> {
        let Ok(offset) = self.index.offset(&self.text, position) else {
            return Vec::new();
        };
        let Some((start, end)) = self.word_at(offset) else {
            return Vec::new();
        };
        let word = &self.text[start..end];

        self.text
            .match_indices(word)
            .filter(|(idx, _)| {
                let before = self.text[..*idx].chars().next_back();
                let after = self.text[idx + word.len()..].chars().next();
                !before.is_some_and(is_identifier_char) && !after.is_some_and(is_identifier_char)
            })
            .map(|(idx, _)| {
                Range::new(
                    self.index.position(&self.text, idx),
                    self.index.position(&self.text, idx + word.len()),
                )
            })
            .collect()
    }

    fn format(
        &self,
        range: Option<Range>,
        options: &FormattingOptions,
    ) -> Result<Vec<TextEdit>, AnalyzerError> {
        let last_line = self.index.line_count() - 1;
        let (first, last) = match range {
            None => (0, last_line),
            Some(range) => {
                let mut last = range.end.line as usize;
                // a selection ending at column 0 does not include that line
                if range.end.line > range.start.line && range.end.character == 0 {
                    last -= 1;
                }
                (range.start.line as usize, last.min(last_line))
            }
        };
        if first > last_line {
            return Err(AnalyzerError::Formatting(format!(
                "line {} is past the end of the document",
                first
            )));
        }

        let tab_size = match options.tab_size as usize {
            0 => TAB_WIDTH,
            size => size,
        };

        let mut edits = Vec::new();
        for line in first..=last {
            let content = line_content(&self.text, &self.index, line);
            let body = if options.insert_spaces {
                expand_tabs(content, tab_size)
            } else {
                content.to_string()
            };
            let formatted = body.trim_end_matches([' ', '\t']);
            if formatted != content {
                edits.push(TextEdit::new(
                    line_range(line as u32, content, 0, content.len()),
                    formatted.to_string(),
                ));
            }
        }
        Ok(edits)
    }
}

fn lint_line(line: u32, content: &str, max_line_length: usize, findings: &mut Vec<Finding>) {
    let code_len = content.trim_end_matches([' ', '\t']).len();
    let code = &content[..code_len];

    if code_len < content.len() {
        let range = line_range(line, content, code_len, content.len());
        findings.push(
            Finding::new(diagnostic(
                range,
                DiagnosticSeverity::WARNING,
                "trailing-whitespace",
                "Trailing whitespace".to_string(),
            ))
            .with_fix("Remove trailing whitespace", vec![TextEdit::new(range, String::new())]),
        );
    }

    if let (Some(first), Some(last)) = (code.find('\t'), code.rfind('\t')) {
        let range = line_range(line, content, first, last + 1);
        let whole = line_range(line, content, 0, code_len);
        findings.push(
            Finding::new(diagnostic(
                range,
                DiagnosticSeverity::INFORMATION,
                "no-tabs",
                "Use spaces instead of tab characters".to_string(),
            ))
            .with_fix(
                "Replace tabs with spaces",
                vec![TextEdit::new(whole, expand_tabs(code, TAB_WIDTH))],
            ),
        );
    }

    let width = content.chars().count();
    if width > max_line_length {
        let overflow = content
            .char_indices()
            .nth(max_line_length)
            .map(|(idx, _)| idx)
            .unwrap_or(content.len());
        findings.push(Finding::new(diagnostic(
            line_range(line, content, overflow, content.len()),
            DiagnosticSeverity::WARNING,
            "line-length",
            format!(
                "Line is {} characters long, exceeding the limit of {}",
                width, max_line_length
            ),
        )));
    }
}

struct OpenBlock {
    kind: BlockKind,
    name: String,
    start: Position,
    selection: Range,
    children: Vec<DocumentSymbol>,
}

#[derive(Default)]
struct Outline {
    stack: Vec<OpenBlock>,
    roots: Vec<DocumentSymbol>,
}

impl Outline {
    fn scan_line(&mut self, line: u32, content: &str, masked: &str, findings: &mut Vec<Finding>) {
        for found in BLOCK_KEYWORD.find_iter(masked) {
            let keyword = found.as_str();
            let keyword_range = line_range(line, content, found.start(), found.end());

            if let Some(kind) = BlockKind::from_close(keyword) {
                self.close(kind, keyword_range, findings);
            } else if let Some(kind) = BlockKind::from_open(keyword) {
                if opens_block(&masked[..found.start()], kind) {
                    let (name, selection) = block_name(line, content, masked, found.end(), kind)
                        .unwrap_or_else(|| (kind.keyword().to_string(), keyword_range));
                    self.stack.push(OpenBlock {
                        kind,
                        name,
                        start: keyword_range.start,
                        selection,
                        children: Vec::new(),
                    });
                }
            }
        }
    }

    fn close(&mut self, kind: BlockKind, keyword_range: Range, findings: &mut Vec<Finding>) {
        let Some(depth) = self.stack.iter().rposition(|open| open.kind == kind) else {
            findings.push(Finding::new(diagnostic(
                keyword_range,
                DiagnosticSeverity::ERROR,
                "unbalanced-block",
                format!("`{}` without a matching `{}`", kind.end_keyword(), kind.keyword()),
            )));
            return;
        };

        // blocks opened after the matching one were never closed
        while self.stack.len() > depth + 1 {
            self.close_top(keyword_range.start, findings, true);
        }
        self.close_top(keyword_range.end, findings, false);
    }

    fn close_top(&mut self, end: Position, findings: &mut Vec<Finding>, unclosed: bool) {
        let Some(open) = self.stack.pop() else {
            return;
        };
        if unclosed {
            findings.push(Finding::new(diagnostic(
                open.selection,
                DiagnosticSeverity::ERROR,
                "unbalanced-block",
                format!(
                    "`{} {}` is not closed by `{}`",
                    open.kind.keyword(),
                    open.name,
                    open.kind.end_keyword()
                ),
            )));
        }

        let symbol = document_symbol(&open, end);
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(symbol),
            None => self.roots.push(symbol),
        }
    }

    fn finish(mut self, end: Position, findings: &mut Vec<Finding>) -> Vec<DocumentSymbol> {
        while !self.stack.is_empty() {
            self.close_top(end, findings, true);
        }
        self.roots
    }
}

#[allow(deprecated)]
fn document_symbol(open: &OpenBlock, end: Position) -> DocumentSymbol {
    DocumentSymbol {
        name: open.name.clone(),
        detail: Some(open.kind.keyword().to_string()),
        kind: open.kind.symbol_kind(),
        tags: None,
        deprecated: None,
        range: Range::new(open.start, end),
        selection_range: open.selection,
        children: (!open.children.is_empty()).then(|| open.children.clone()),
    }
}

/// Whether a block keyword preceded by `prefix` starts a body that needs an
/// end keyword. Prototypes, imports and forward declarations do not.
fn opens_block(prefix: &str, kind: BlockKind) -> bool {
    let mut words = prefix.split(|ch: char| !is_identifier_char(ch)).filter(|w| !w.is_empty());
    if words
        .clone()
        .any(|word| matches!(word, "extern" | "pure" | "import" | "export" | "typedef"))
    {
        return false;
    }
    !(kind == BlockKind::Interface && words.next_back() == Some("virtual"))
}

fn block_name(
    line: u32,
    content: &str,
    masked: &str,
    keyword_end: usize,
    kind: BlockKind,
) -> Option<(String, Range)> {
    let rest = &masked[keyword_end..];
    let pattern = if kind.is_subroutine() {
        &*SUBROUTINE_NAME
    } else {
        &*UNIT_NAME
    };
    let name = pattern.captures(rest)?.get(1)?;
    let start = keyword_end + name.start();
    let end = keyword_end + name.end();
    Some((
        content[start..end].to_string(),
        line_range(line, content, start, end),
    ))
}

/// Blanks comments and string literals while keeping byte offsets intact
#[derive(Default)]
struct Masker {
    in_block_comment: bool,
}

impl Masker {
    fn mask(&mut self, line: &str) -> String {
        let mut out = String::with_capacity(line.len());
        let mut chars = line.chars().peekable();
        let mut in_string = false;

        while let Some(ch) = chars.next() {
            if self.in_block_comment {
                if ch == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("  ");
                    self.in_block_comment = false;
                } else {
                    blank(&mut out, ch);
                }
                continue;
            }

            if in_string {
                if ch == '\\' {
                    blank(&mut out, ch);
                    if let Some(escaped) = chars.next() {
                        blank(&mut out, escaped);
                    }
                } else {
                    in_string = ch != '"';
                    blank(&mut out, ch);
                }
                continue;
            }

            match ch {
                '/' if chars.peek() == Some(&'/') => {
                    out.push(' ');
                    for rest in chars.by_ref() {
                        blank(&mut out, rest);
                    }
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    out.push_str("  ");
                    self.in_block_comment = true;
                }
                '"' => {
                    in_string = true;
                    out.push(' ');
                }
                _ => out.push(ch),
            }
        }
        out
    }
}

fn blank(out: &mut String, ch: char) {
    out.extend(std::iter::repeat_n(' ', ch.len_utf8()));
}

fn is_identifier_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
}

fn expand_tabs(content: &str, tab_size: usize) -> String {
    let mut out = String::with_capacity(content.len());
    let mut column = 0;
    for ch in content.chars() {
        if ch == '\t' {
            let spaces = tab_size - column % tab_size;
            out.extend(std::iter::repeat_n(' ', spaces));
            column += spaces;
        } else {
            out.push(ch);
            column += 1;
        }
    }
    out
}

/// Text of `line` without its line terminator
fn line_content<'a>(text: &'a str, index: &LineIndex, line: usize) -> &'a str {
    let (start, end) = index.line_span(line).unwrap_or((text.len(), text.len()));
    &text[start..end]
}

/// Range on `line` covering the byte span `start..end` of `content`
fn line_range(line: u32, content: &str, start: usize, end: usize) -> Range {
    let column = |offset: usize| content[..offset].encode_utf16().count() as u32;
    Range::new(
        Position::new(line, column(start)),
        Position::new(line, column(end)),
    )
}

fn diagnostic(
    range: Range,
    severity: DiagnosticSeverity,
    code: &str,
    message: String,
) -> Diagnostic {
    Diagnostic {
        range,
        severity: Some(severity),
        code: Some(NumberOrString::String(code.to_string())),
        source: Some(DIAGNOSTIC_SOURCE.to_string()),
        message,
        ..Default::default()
    }
}
