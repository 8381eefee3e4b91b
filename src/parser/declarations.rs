//! Распознавание заголовков методов и разбор списков параметров.

use once_cell::sync::Lazy;
use regex::Regex;

use super::keywords::{keyword, Keyword};
use super::lexer::{LineLexer, TokenKind};
use super::symbols::{ParamDescriptor, SymbolKind};

/// `[Асинх] Процедура|Функция Имя(` at line start, both locales, any case
static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:(?:асинх|async)\s+)?(процедура|функция|procedure|function)\s+([\p{L}_][\p{L}\p{N}_]*)\s*\(",
    )
    .expect("header regex is valid")
});

/// `КонецПроцедуры` / `КонецФункции` at line start
static TERMINATOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(конецпроцедуры|конецфункции|endprocedure|endfunction)(?:[^\p{L}\p{N}_]|$)")
        .expect("terminator regex is valid")
});

/// Заголовок метода, найденный в строке
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMatch {
    pub kind: SymbolKind,
    pub name: String,
    /// Char column of the name
    pub name_column: usize,
    /// Byte offset right after the opening parenthesis
    pub params_start: usize,
}

pub fn match_header(line: &str) -> Option<HeaderMatch> {
    let caps = HEADER_RE.captures(line)?;
    let keyword_text = caps.get(1)?.as_str();
    let name = caps.get(2)?;
    let kind = match keyword(keyword_text) {
        Some(Keyword::Function) => SymbolKind::Function,
        _ => SymbolKind::Procedure,
    };
    Some(HeaderMatch {
        kind,
        name: name.as_str().to_string(),
        name_column: line[..name.start()].chars().count(),
        params_start: caps.get(0)?.end(),
    })
}

/// Kind of method a terminator closes, if the line starts with one
pub fn match_terminator(line: &str) -> Option<SymbolKind> {
    let caps = TERMINATOR_RE.captures(line)?;
    match keyword(caps.get(1)?.as_str()) {
        Some(Keyword::EndFunction) => Some(SymbolKind::Function),
        Some(Keyword::EndProcedure) => Some(SymbolKind::Procedure),
        _ => None,
    }
}

/// Result of scanning for the `)` that closes a parameter list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamListEnd {
    /// Byte offset right after `)` on the scanned text
    Closed(usize),
    /// Still open; carries nesting depth and quote state for the next line
    Open { depth: usize, in_quote: bool },
}

/// Scans `text` for the parenthesis closing a list opened at `depth`
pub fn scan_param_list(text: &str, mut depth: usize, mut in_quote: bool) -> ParamListEnd {
    let mut chars = text.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if in_quote {
            if ch == '"' {
                if matches!(chars.peek(), Some((_, '"'))) {
                    chars.next();
                } else {
                    in_quote = false;
                }
            }
            continue;
        }
        match ch {
            '"' => in_quote = true,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return ParamListEnd::Closed(idx + 1);
                }
            }
            '/' if matches!(chars.peek(), Some((_, '/'))) => {
                return ParamListEnd::Open { depth, in_quote };
            }
            _ => {}
        }
    }
    ParamListEnd::Open { depth, in_quote }
}

/// Splits on commas outside of parentheses and string literals
pub fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut start = 0;

    for (idx, ch) in text.char_indices() {
        match ch {
            '"' => in_quote = !in_quote,
            '(' | '[' if !in_quote => depth += 1,
            ')' | ']' if !in_quote => depth = depth.saturating_sub(1),
            ',' if !in_quote && depth == 0 => {
                parts.push(&text[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Parses the text between the parentheses of a declaration
pub fn parse_params(text: &str) -> Vec<ParamDescriptor> {
    let cleaned = strip_line_comments(text);
    if cleaned.trim().is_empty() {
        return Vec::new();
    }

    split_top_level(&cleaned)
        .into_iter()
        .filter_map(parse_param)
        .collect()
}

fn parse_param(raw: &str) -> Option<ParamDescriptor> {
    let (head, default_value) = match split_default(raw) {
        Some((head, default)) => (head, Some(default.trim().to_string())),
        None => (raw, None),
    };

    let mut lexer = LineLexer::new();
    let mut is_by_value = false;
    let mut name = None;
    let mut skip_parens = 0usize;

    for token in lexer.tokenize(head.trim()) {
        match token.kind {
            // Аннотации параметров OneScript: &Тип("Строка") Имя
            TokenKind::Directive => {}
            TokenKind::LeftParen => skip_parens += 1,
            TokenKind::RightParen => skip_parens = skip_parens.saturating_sub(1),
            TokenKind::Identifier if skip_parens == 0 => {
                if keyword(token.text) == Some(Keyword::Val) && name.is_none() {
                    is_by_value = true;
                } else if name.is_none() {
                    name = Some(token.text.to_string());
                }
            }
            _ => {}
        }
    }

    Some(ParamDescriptor {
        name: name?,
        is_by_value,
        default_value: default_value.filter(|d| !d.is_empty()),
    })
}

/// Splits `Имя = Значение` at the first `=` outside strings and parentheses
fn split_default(raw: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    let mut in_quote = false;
    for (idx, ch) in raw.char_indices() {
        match ch {
            '"' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => depth = depth.saturating_sub(1),
            '=' if !in_quote && depth == 0 => return Some((&raw[..idx], &raw[idx + 1..])),
            _ => {}
        }
    }
    None
}

fn strip_line_comments(text: &str) -> String {
    text.lines()
        .map(|line| match comment_start(line) {
            Some(pos) => &line[..pos],
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Byte offset of a `//` comment outside string literals
pub fn comment_start(line: &str) -> Option<usize> {
    let mut in_quote = false;
    let mut prev_slash = false;
    for (idx, ch) in line.char_indices() {
        match ch {
            '"' => {
                in_quote = !in_quote;
                prev_slash = false;
            }
            '/' if !in_quote => {
                if prev_slash {
                    return Some(idx - 1);
                }
                prev_slash = true;
            }
            _ => prev_slash = false,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_match_header_both_locales() {
        let ru = match_header("Процедура Тест(Парам1)").unwrap();
        let en = match_header("procedure Тест(Парам1)").unwrap();
        assert_eq!(ru.kind, SymbolKind::Procedure);
        assert_eq!(ru.name, en.name);
        assert_eq!(ru.name_column, 10);

        let func = match_header("  Асинх Функция Получить (А)").unwrap();
        assert_eq!(func.kind, SymbolKind::Function);
        assert_eq!(func.name, "Получить");
    }

    #[test]
    fn test_match_header_rejects_calls() {
        assert!(match_header("Процедуры = Новый Массив();").is_none());
        assert!(match_header("// Процедура Тест()").is_none());
    }

    #[test]
    fn test_match_terminator() {
        assert_eq!(match_terminator("КонецПроцедуры"), Some(SymbolKind::Procedure));
        assert_eq!(match_terminator("  EndFunction // end"), Some(SymbolKind::Function));
        assert_eq!(match_terminator("КонецПроцедурыИТак = 1;"), None);
    }

    #[test]
    fn test_scan_param_list() {
        assert_eq!(scan_param_list("А, Б)", 1, false), ParamListEnd::Closed(7));
        assert_eq!(
            scan_param_list("А = \")\", Б", 1, false),
            ParamListEnd::Open { depth: 1, in_quote: false }
        );
        assert_eq!(scan_param_list("Ф(1))", 1, false), ParamListEnd::Closed(6));
    }

    #[test]
    fn test_parse_params() {
        let params = parse_params("Парам1, Знач Парам2 = 5, Парам3 = \"а,б\"");
        assert_eq!(params.len(), 3);
        assert_eq!(params[0].name, "Парам1");
        assert!(!params[0].is_by_value);
        assert_eq!(params[1].name, "Парам2");
        assert!(params[1].is_by_value);
        assert_eq!(params[1].default_value.as_deref(), Some("5"));
        assert_eq!(params[2].default_value.as_deref(), Some("\"а,б\""));
    }

    #[test]
    fn test_comment_start_ignores_strings() {
        assert_eq!(comment_start("А, // комментарий"), Some(4));
        assert_eq!(comment_start("А = \"http://x\""), None);
    }

    #[test]
    fn test_parse_params_empty_and_val_en() {
        assert!(parse_params("  ").is_empty());
        let params = parse_params("Val Name, Other = Undefined");
        assert!(params[0].is_by_value);
        assert_eq!(params[1].default_value.as_deref(), Some("Undefined"));
    }
}
