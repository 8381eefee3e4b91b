/*!
# Structural module scanner

Line-oriented state machine that turns the text of one module into a
`ModuleTable`. Declaration headers and terminators are recognised with
anchored regexes; everything else goes through the line lexer, so keywords in
strings and comments are ignored.

Two stacks are kept apart:

- the block stack of the open method (`Если`, `Для`/`Пока`, `Попытка`),
- the preprocessor stack (`#Область`, `#Если`), which may wrap several methods.

A procedure terminator always closes the open method, whatever is left on the
block stack, so unbalanced inner blocks never stretch a method's extent.
*/

use std::path::PathBuf;
use std::sync::Arc;

use crate::core::{content_hash, LineIndex, ParseIssue, ParseIssueKind};

use super::declarations::{
    comment_start, match_header, match_terminator, parse_params, scan_param_list, HeaderMatch,
    ParamListEnd,
};
use super::keywords::{is_compilation_directive, keyword, preprocessor_keyword, Keyword, PreprocessorKeyword};
use super::lexer::{is_ident_char, LineLexer, Token, TokenKind};
use super::symbols::{
    Assignment, Directive, DirectiveKind, MethodScope, ModuleTable, Region, SourceRange, Symbol,
    ValueLink,
    SymbolKind,
};
use super::Dialect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    If,
    Loop,
    Try,
}

#[derive(Debug)]
enum PreprocessorFrame {
    Region { name: String, start_line: usize },
    Conditional { line: usize },
}

#[derive(Debug)]
struct OpenMethod {
    symbol: Symbol,
    params: Vec<Symbol>,
    locals: Vec<Symbol>,
    assignments: Vec<Assignment>,
    blocks: Vec<(BlockKind, usize)>,
}

impl OpenMethod {
    fn knows(&self, lower: &str) -> bool {
        self.params.iter().any(|p| p.lower_name() == lower)
            || self.locals.iter().any(|l| l.lower_name() == lower)
    }
}

pub(crate) struct ModuleScanner<'a> {
    file: PathBuf,
    dialect: Dialect,
    text: Arc<str>,
    lines: Vec<&'a str>,
    lexer: LineLexer,
    table: ModuleTable,
    preprocessor: Vec<PreprocessorFrame>,
    doc_lines: Vec<&'a str>,
    pending_directive: Option<String>,
    current: Option<OpenMethod>,
}

impl<'a> ModuleScanner<'a> {
    pub(crate) fn new(file: PathBuf, dialect: Dialect, text: Arc<str>, source: &'a str) -> Self {
        let lines = LineIndex::new(source).lines().to_vec();
        let table = ModuleTable::empty(file.clone(), dialect);
        Self {
            file,
            dialect,
            text,
            lines,
            lexer: LineLexer::new(),
            table,
            preprocessor: Vec::new(),
            doc_lines: Vec::new(),
            pending_directive: None,
            current: None,
        }
    }

    pub(crate) fn run(mut self) -> ModuleTable {
        let mut line_no = 0;
        while line_no < self.lines.len() {
            let line = self.lines[line_no];

            if self.lexer.in_string() {
                let tokens = self.lexer.tokenize(line);
                self.process_tokens(line_no, &tokens);
                line_no += 1;
                continue;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                self.doc_lines.clear();
            } else if trimmed.starts_with("//") {
                self.doc_lines.push(line);
            } else if trimmed.starts_with('&') {
                self.directive_line(line_no, trimmed);
            } else if trimmed.starts_with('#') {
                self.preprocessor_line(line_no, trimmed);
                self.doc_lines.clear();
            } else if let Some(header) = match_header(line) {
                line_no = self.begin_method(line_no, header);
                continue;
            } else {
                let tokens = self.lexer.tokenize(line);
                self.process_tokens(line_no, &tokens);
                self.doc_lines.clear();
                self.pending_directive = None;
            }
            line_no += 1;
        }

        self.finish()
    }

    fn last_line(&self) -> usize {
        self.lines.len().saturating_sub(1)
    }

    fn current_region(&self) -> Option<String> {
        self.preprocessor.iter().rev().find_map(|frame| match frame {
            PreprocessorFrame::Region { name, .. } => Some(name.clone()),
            PreprocessorFrame::Conditional { .. } => None,
        })
    }

    fn take_documentation(&mut self) -> Option<String> {
        if self.doc_lines.is_empty() {
            return None;
        }
        let doc = self.doc_lines.join("\n");
        self.doc_lines.clear();
        Some(doc)
    }

    fn issue(&mut self, line: usize, kind: ParseIssueKind) {
        tracing::trace!("{}: line {}: {}", self.file.display(), line + 1, kind);
        self.table.issues.push(ParseIssue::new(line, kind));
    }

    fn directive_line(&mut self, line_no: usize, trimmed: &str) {
        let text = without_comment(trimmed);
        let name: String = text[1..].chars().take_while(|c| is_ident_char(*c)).collect();
        if is_compilation_directive(&name) {
            self.pending_directive = Some(format!("&{}", name));
        }
        self.table.directives.push(Directive {
            kind: DirectiveKind::Compilation,
            line: line_no,
            text: text.to_string(),
        });
    }

    fn preprocessor_line(&mut self, line_no: usize, trimmed: &str) {
        let text = without_comment(trimmed);
        let word: String = text[1..].chars().take_while(|c| is_ident_char(*c)).collect();
        let argument = text[1 + word.len()..].trim();

        let mut kind = DirectiveKind::Preprocessor;
        match preprocessor_keyword(&word) {
            Some(PreprocessorKeyword::Region) => {
                let name = argument.split_whitespace().next().unwrap_or_default().to_string();
                self.preprocessor.push(PreprocessorFrame::Region {
                    name,
                    start_line: line_no,
                });
            }
            Some(PreprocessorKeyword::EndRegion) => self.close_region(line_no),
            Some(PreprocessorKeyword::If) => {
                self.preprocessor.push(PreprocessorFrame::Conditional { line: line_no });
            }
            Some(PreprocessorKeyword::EndIf) => {
                let position = self
                    .preprocessor
                    .iter()
                    .rposition(|f| matches!(f, PreprocessorFrame::Conditional { .. }));
                match position {
                    Some(idx) => {
                        self.preprocessor.remove(idx);
                    }
                    None => self.issue(line_no, ParseIssueKind::UnexpectedRegionEnd),
                }
            }
            Some(PreprocessorKeyword::Use) => kind = DirectiveKind::Import,
            Some(PreprocessorKeyword::ElseIf) | Some(PreprocessorKeyword::Else) | None => {}
        }

        let directive_text = match kind {
            DirectiveKind::Import => argument.trim_matches('"').to_string(),
            _ => text.to_string(),
        };
        self.table.directives.push(Directive {
            kind,
            line: line_no,
            text: directive_text,
        });
    }

    fn close_region(&mut self, line_no: usize) {
        let position = self
            .preprocessor
            .iter()
            .rposition(|f| matches!(f, PreprocessorFrame::Region { .. }));
        let Some(idx) = position else {
            self.issue(line_no, ParseIssueKind::UnexpectedRegionEnd);
            return;
        };

        let unclosed: Vec<usize> = self.preprocessor[idx + 1..]
            .iter()
            .map(|frame| match frame {
                PreprocessorFrame::Conditional { line } => *line,
                PreprocessorFrame::Region { start_line, .. } => *start_line,
            })
            .collect();
        for line in unclosed {
            self.issue(line, ParseIssueKind::UnclosedRegion);
        }

        let frames = self.preprocessor.split_off(idx);
        if let Some(PreprocessorFrame::Region { name, start_line }) = frames.into_iter().next() {
            self.table.regions.push(Region {
                name,
                start_line,
                end_line: line_no,
            });
        }
    }

    /// Registers a header and returns the index of the next line to scan
    fn begin_method(&mut self, line_no: usize, header: HeaderMatch) -> usize {
        if let Some(open) = &self.current {
            let start = open.symbol.source_range.start_line;
            self.issue(start, ParseIssueKind::UnterminatedMethod);
            self.close_method(line_no.saturating_sub(1).max(start));
        }

        let header_line = self.lines[line_no];
        let after = &header_line[header.params_start..];
        let mut params_text = String::new();
        let mut tail = "";
        let mut close_line = line_no;

        match scan_param_list(after, 1, false) {
            ParamListEnd::Closed(end) => {
                params_text.push_str(&after[..end - 1]);
                tail = &after[end..];
            }
            ParamListEnd::Open {
                mut depth,
                mut in_quote,
            } => {
                params_text.push_str(after);
                let mut closed = false;
                let mut next = line_no + 1;
                while next < self.lines.len() {
                    let line = self.lines[next];
                    if match_header(line).is_some() || match_terminator(line).is_some() {
                        break;
                    }
                    close_line = next;
                    params_text.push('\n');
                    match scan_param_list(line, depth, in_quote) {
                        ParamListEnd::Closed(end) => {
                            params_text.push_str(&line[..end - 1]);
                            tail = &line[end..];
                            closed = true;
                            break;
                        }
                        ParamListEnd::Open {
                            depth: d,
                            in_quote: q,
                        } => {
                            params_text.push_str(line);
                            depth = d;
                            in_quote = q;
                        }
                    }
                    next += 1;
                }
                if !closed {
                    self.issue(line_no, ParseIssueKind::MalformedHeader);
                }
            }
        }

        let params = parse_params(&params_text);
        let param_symbols = params
            .iter()
            .map(|param| {
                let (line, column) = self
                    .find_word_between(line_no, close_line, &param.name)
                    .unwrap_or((line_no, header.name_column));
                Symbol::new(
                    param.name.clone(),
                    SymbolKind::Parameter,
                    self.range(line, line, column),
                )
            })
            .collect();

        let mut symbol = Symbol::new(
            header.name,
            header.kind,
            self.range(line_no, close_line, header.name_column),
        );
        symbol.params = params;
        symbol.documentation = self.take_documentation();
        symbol.compilation_directive = self.pending_directive.take();
        symbol.region = self.current_region();

        let tail_tokens = self.lexer.tokenize(tail);
        let mut first = 0;
        if let Some(token) = tail_tokens.first() {
            if token.kind == TokenKind::Identifier && keyword(token.text) == Some(Keyword::Export) {
                symbol.is_exported = true;
                first = 1;
            }
        }

        self.current = Some(OpenMethod {
            symbol,
            params: param_symbols,
            locals: Vec::new(),
            assignments: Vec::new(),
            blocks: Vec::new(),
        });

        // Однострочные методы: `Процедура А() КонецПроцедуры`
        self.process_tokens(close_line, &tail_tokens[first..]);
        close_line + 1
    }

    fn range(&self, start_line: usize, end_line: usize, name_column: usize) -> SourceRange {
        SourceRange {
            file: self.file.clone(),
            start_line,
            end_line,
            name_column,
        }
    }

    fn find_word_between(&self, from: usize, to: usize, word: &str) -> Option<(usize, usize)> {
        (from..=to).find_map(|line_no| {
            let line = self.lines.get(line_no)?;
            let skip = if line_no == from {
                line.find('(').map(|b| line[..b].chars().count()).unwrap_or(0)
            } else {
                0
            };
            find_word(line, word, skip).map(|column| (line_no, column))
        })
    }

    fn close_method(&mut self, end_line: usize) {
        let Some(open) = self.current.take() else {
            return;
        };
        let mut symbol = open.symbol;
        symbol.source_range.end_line = end_line.max(symbol.source_range.start_line);
        let start_line = symbol.source_range.start_line;
        let end_line = symbol.source_range.end_line;

        let index = self.table.symbols.len();
        self.table.methods_by_name.insert(symbol.lower_name(), index);
        self.table.symbols.push(symbol);
        self.table.method_scopes.push(MethodScope {
            method_index: index,
            start_line,
            end_line,
            params: open.params,
            locals: open.locals,
            assignments: open.assignments,
        });
    }

    fn process_tokens(&mut self, line_no: usize, tokens: &[Token<'_>]) {
        let mut stmt_start = true;
        let mut i = 0;
        while i < tokens.len() {
            let token = tokens[i];
            match token.kind {
                TokenKind::Comment => break,
                TokenKind::Semicolon => {
                    stmt_start = true;
                    i += 1;
                    continue;
                }
                TokenKind::Identifier => {
                    if let Some(kw) = keyword(token.text) {
                        i = self.handle_keyword(line_no, kw, tokens, i);
                        stmt_start = kw.opens_statement();
                        continue;
                    }
                    if stmt_start && tokens.get(i + 1).map(|t| t.kind) == Some(TokenKind::Assign)
                    {
                        self.record_assignment(line_no, token, &tokens[i + 2..]);
                    }
                    stmt_start = false;
                }
                _ => stmt_start = false,
            }
            i += 1;
        }
    }

    /// Handles a keyword at `tokens[i]`; returns the next index to look at
    fn handle_keyword(&mut self, line_no: usize, kw: Keyword, tokens: &[Token<'_>], i: usize) -> usize {
        match kw {
            Keyword::Var => return self.declare_variables(line_no, tokens, i + 1),
            Keyword::EndProcedure => self.terminate(line_no, SymbolKind::Procedure),
            Keyword::EndFunction => self.terminate(line_no, SymbolKind::Function),
            Keyword::If => self.push_block(BlockKind::If, line_no),
            Keyword::EndIf => self.pop_block(BlockKind::If),
            Keyword::While => self.push_block(BlockKind::Loop, line_no),
            Keyword::For => {
                self.push_block(BlockKind::Loop, line_no);
                let mut j = i + 1;
                if tokens.get(j).and_then(|t| keyword(t.text)) == Some(Keyword::Each) {
                    j += 1;
                }
                if let Some(var) = tokens.get(j) {
                    if var.kind == TokenKind::Identifier && keyword(var.text).is_none() {
                        self.declare_implicit_local(line_no, var);
                        return j + 1;
                    }
                }
            }
            Keyword::EndDo => self.pop_block(BlockKind::Loop),
            Keyword::Try => self.push_block(BlockKind::Try, line_no),
            Keyword::EndTry => self.pop_block(BlockKind::Try),
            _ => {}
        }
        i + 1
    }

    fn push_block(&mut self, kind: BlockKind, line_no: usize) {
        if let Some(open) = self.current.as_mut() {
            open.blocks.push((kind, line_no));
        }
    }

    fn pop_block(&mut self, kind: BlockKind) {
        let Some(open) = self.current.as_mut() else {
            return;
        };
        let Some(idx) = open.blocks.iter().rposition(|(k, _)| *k == kind) else {
            return;
        };
        let unclosed: Vec<usize> = open.blocks[idx + 1..].iter().map(|(_, line)| *line).collect();
        open.blocks.truncate(idx);
        for line in unclosed {
            self.issue(line, ParseIssueKind::UnclosedBlock);
        }
    }

    fn terminate(&mut self, line_no: usize, kind: SymbolKind) {
        let Some(open) = self.current.as_ref() else {
            self.issue(line_no, ParseIssueKind::UnexpectedTerminator);
            return;
        };
        let mismatched = open.symbol.kind != kind;
        let unclosed: Vec<usize> = open.blocks.iter().map(|(_, line)| *line).collect();
        if mismatched {
            self.issue(line_no, ParseIssueKind::MismatchedTerminator);
        }
        for line in unclosed {
            self.issue(line, ParseIssueKind::UnclosedBlock);
        }
        self.close_method(line_no);
    }

    /// `Перем А, Б Экспорт;`: module variables outside methods, locals inside
    fn declare_variables(&mut self, line_no: usize, tokens: &[Token<'_>], mut j: usize) -> usize {
        while let Some(token) = tokens.get(j) {
            match token.kind {
                TokenKind::Identifier if keyword(token.text).is_none() => {
                    let exported = tokens
                        .get(j + 1)
                        .map(|t| keyword(t.text) == Some(Keyword::Export))
                        .unwrap_or(false);
                    let mut symbol = Symbol::new(
                        token.text,
                        SymbolKind::Variable,
                        self.range(line_no, line_no, token.column),
                    );
                    match self.current.as_mut() {
                        Some(open) => open.locals.push(symbol),
                        None => {
                            symbol.is_exported = exported;
                            symbol.documentation = self.take_documentation();
                            symbol.region = self.current_region();
                            self.table.module_variables.push(symbol.name.clone());
                            self.table.symbols.push(symbol);
                        }
                    }
                    j += if exported { 2 } else { 1 };
                }
                TokenKind::Comma => j += 1,
                _ => break,
            }
        }
        j
    }

    fn record_assignment(&mut self, line_no: usize, target: Token<'_>, rhs: &[Token<'_>]) {
        let value_type = new_expression_type(rhs);
        let value_chain = if value_type.is_some() {
            Vec::new()
        } else {
            value_chain(rhs)
        };
        let assignment = Assignment {
            name: target.text.to_string(),
            line: line_no,
            value_type,
            value_chain,
        };
        self.declare_implicit_local(line_no, &target);
        match self.current.as_mut() {
            Some(open) => open.assignments.push(assignment),
            None => self.table.module_assignments.push(assignment),
        }
    }

    /// First assignment inside a method declares a local unless the name is
    /// already a parameter, a local or a module variable
    fn declare_implicit_local(&mut self, line_no: usize, token: &Token<'_>) {
        let lower = token.text.to_lowercase();
        let is_module_var = self
            .table
            .module_variables
            .iter()
            .any(|name| name.to_lowercase() == lower);
        let range = self.range(line_no, line_no, token.column);
        if let Some(open) = self.current.as_mut() {
            if !is_module_var && !open.knows(&lower) {
                open.locals.push(Symbol::new(token.text, SymbolKind::Variable, range));
            }
        }
    }

    fn finish(mut self) -> ModuleTable {
        let last_line = self.last_line();
        if let Some(open) = &self.current {
            let start = open.symbol.source_range.start_line;
            self.issue(start, ParseIssueKind::UnterminatedMethod);
            self.close_method(last_line);
        }

        let frames = std::mem::take(&mut self.preprocessor);
        for frame in frames {
            match frame {
                PreprocessorFrame::Region { name, start_line } => {
                    self.issue(start_line, ParseIssueKind::UnclosedRegion);
                    self.table.regions.push(Region {
                        name,
                        start_line,
                        end_line: last_line,
                    });
                }
                PreprocessorFrame::Conditional { line } => {
                    self.issue(line, ParseIssueKind::UnclosedRegion);
                }
            }
        }
        self.table.regions.sort_by_key(|r| r.start_line);

        let mut table = self.table;
        table.dialect = self.dialect;
        table.content_hash = content_hash(&self.text);
        table.text = self.text;
        table
    }
}

/// `Новый Массив`, `Новый Массив(...)`, `Новый("Массив")`
fn new_expression_type(rhs: &[Token<'_>]) -> Option<String> {
    let first = rhs.first()?;
    if keyword(first.text) != Some(Keyword::New) {
        return None;
    }
    match rhs.get(1)? {
        t if t.kind == TokenKind::Identifier => Some(t.text.to_string()),
        t if t.kind == TokenKind::LeftParen => {
            let literal = rhs.get(2)?;
            (literal.kind == TokenKind::StringLiteral)
                .then(|| literal.text.trim_matches('"').to_string())
        }
        _ => None,
    }
}

/// `Объект.Метод(...).Свойство` up to the end of the statement; empty for
/// anything else (operators, literals, indexing, a bare name)
fn value_chain(rhs: &[Token<'_>]) -> Vec<ValueLink> {
    let mut links = Vec::new();
    let mut i = 0;
    loop {
        let Some(name) = rhs.get(i).filter(|t| t.kind == TokenKind::Identifier) else {
            return Vec::new();
        };
        if keyword(name.text).is_some() {
            return Vec::new();
        }
        i += 1;
        let mut is_call = false;
        if rhs.get(i).map(|t| t.kind) == Some(TokenKind::LeftParen) {
            let Some(close) = matching_paren(rhs, i) else {
                return Vec::new();
            };
            i = close + 1;
            is_call = true;
        }
        links.push(ValueLink {
            name: name.text.to_string(),
            is_call,
        });
        match rhs.get(i).map(|t| t.kind) {
            Some(TokenKind::Dot) => i += 1,
            None | Some(TokenKind::Semicolon) | Some(TokenKind::Comment) => break,
            Some(_) => return Vec::new(),
        }
    }
    // a bare `А = Б` copies a value whose type the resolver finds by name
    if links.len() == 1 && !links[0].is_call {
        return Vec::new();
    }
    links
}

/// Index of the `)` closing the `(` at `open`
fn matching_paren(tokens: &[Token<'_>], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, token) in tokens.iter().enumerate().skip(open) {
        match token.kind {
            TokenKind::LeftParen => depth += 1,
            TokenKind::RightParen => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

fn without_comment(line: &str) -> &str {
    match comment_start(line) {
        Some(pos) => line[..pos].trim_end(),
        None => line,
    }
}

/// Char column of `word` as a whole word (case-insensitive), starting at char `skip`
fn find_word(line: &str, word: &str, skip: usize) -> Option<usize> {
    let chars: Vec<char> = line.chars().collect();
    let needle: Vec<char> = word.chars().flat_map(|c| c.to_lowercase()).collect();
    if needle.is_empty() || chars.len() < needle.len() {
        return None;
    }
    (skip..=chars.len() - needle.len()).find(|&start| {
        let before_ok = start == 0 || !is_ident_char(chars[start - 1]);
        let after = start + needle.len();
        let after_ok = after == chars.len() || !is_ident_char(chars[after]);
        before_ok
            && after_ok
            && chars[start..after]
                .iter()
                .zip(&needle)
                .all(|(a, b)| a.to_lowercase().eq(std::iter::once(*b)))
    })
}
