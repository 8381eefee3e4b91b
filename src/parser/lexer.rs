/*!
# BSL Line Lexer

Line-at-a-time lexical scanner for BSL and OneScript. The structural parser
feeds it one source line at a time; the lexer carries multi-line string state
between lines (`"Текст` ... `|продолжение"`), so block keywords inside string
literals and `//` comments never count toward nesting.

The lexer never fails: characters it cannot classify are skipped.
*/

use logos::Logos;

/// Token types of one source line
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    #[regex(r"[\p{L}_][\p{L}\p{N}_]*")]
    Identifier,

    /// `&НаСервере`, аннотации OneScript
    #[regex(r"&[\p{L}_][\p{L}\p{N}_]*")]
    Directive,

    /// `#Область`, `#Если`, `#Использовать`
    #[regex(r"#[\p{L}_][\p{L}\p{N}_]*")]
    Preprocessor,

    /// Закрытая строка; кавычка экранируется удвоением
    #[regex(r#""([^"\n]|"")*""#)]
    StringLiteral,

    /// Строка, продолжающаяся на следующей строке исходника
    #[regex(r#""([^"\n]|"")*"#)]
    OpenString,

    #[regex(r"'[^'\n]*'")]
    DateLiteral,

    #[regex(r"[0-9]+(\.[0-9]+)?")]
    Number,

    #[regex(r"//[^\n]*")]
    Comment,

    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token("=")]
    Assign,
    #[token("?")]
    Question,
    #[regex(r"<>|<=|>=|[+\-*/%<>]")]
    Operator,

    #[regex(r"[ \t\f\r]+", logos::skip)]
    Whitespace,
}

/// Token with its text and char column within the line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub column: usize,
}

impl<'a> Token<'a> {
    pub fn is_trivia(&self) -> bool {
        matches!(self.kind, TokenKind::Comment)
    }

    pub fn is_string(&self) -> bool {
        matches!(self.kind, TokenKind::StringLiteral | TokenKind::OpenString)
    }
}

/// Stateful line lexer: remembers an unterminated string across lines
#[derive(Debug, Default, Clone)]
pub struct LineLexer {
    in_string: bool,
}

impl LineLexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the previous line ended inside a string literal
    pub fn in_string(&self) -> bool {
        self.in_string
    }

    /// Tokenizes one line (without the line terminator).
    /// A string continuation prefix is consumed silently.
    pub fn tokenize<'a>(&mut self, line: &'a str) -> Vec<Token<'a>> {
        let mut start_byte = 0;
        if self.in_string {
            match find_string_end(line) {
                Some(end) => {
                    self.in_string = false;
                    start_byte = end;
                }
                None => return Vec::new(),
            }
        }

        let rest = &line[start_byte..];
        let mut column = line[..start_byte].chars().count();
        let mut last_byte = 0;
        let mut tokens = Vec::new();
        let mut lexer = TokenKind::lexer(rest);

        while let Some(result) = lexer.next() {
            let span = lexer.span();
            column += rest[last_byte..span.start].chars().count();
            last_byte = span.start;

            let kind = match result {
                Ok(kind) => kind,
                Err(_) => continue,
            };
            if kind == TokenKind::OpenString {
                self.in_string = true;
            }
            tokens.push(Token {
                kind,
                text: lexer.slice(),
                column,
            });
        }

        tokens
    }
}

/// Byte offset right after the closing quote of a continued string, if any
fn find_string_end(line: &str) -> Option<usize> {
    let mut chars = line.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if ch == '"' {
            if matches!(chars.peek(), Some((_, '"'))) {
                chars.next();
                continue;
            }
            return Some(idx + 1);
        }
    }
    None
}

/// True for characters that may form an identifier
pub fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(line: &str) -> Vec<TokenKind> {
        LineLexer::new().tokenize(line).iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_basic_tokenization() {
        let mut lexer = LineLexer::new();
        let tokens = lexer.tokenize("Процедура Тест() Сообщить(\"Привет\"); КонецПроцедуры");
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].text, "Процедура");
        assert_eq!(tokens[1].text, "Тест");
        assert_eq!(tokens[1].column, 10);
        assert!(tokens.iter().any(|t| t.kind == TokenKind::StringLiteral));
        assert!(!lexer.in_string());
    }

    #[test]
    fn test_comment_swallows_rest_of_line() {
        assert_eq!(
            kinds("А = 1; // Если Тогда"),
            vec![
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::Number,
                TokenKind::Semicolon,
                TokenKind::Comment
            ]
        );
    }

    #[test]
    fn test_multiline_string_state() {
        let mut lexer = LineLexer::new();
        let first = lexer.tokenize("Текст = \"ВЫБРАТЬ");
        assert_eq!(first.last().map(|t| t.kind), Some(TokenKind::OpenString));
        assert!(lexer.in_string());

        assert!(lexer.tokenize("|  Если КонецЕсли").is_empty());
        assert!(lexer.in_string());

        let last = lexer.tokenize("|ИЗ Таблица\";");
        assert!(!lexer.in_string());
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].kind, TokenKind::Semicolon);
    }

    #[test]
    fn test_escaped_quotes() {
        let tokens = LineLexer::new().tokenize(r#"А = "он сказал ""да"""; Б"#);
        assert_eq!(tokens[2].kind, TokenKind::StringLiteral);
        assert_eq!(tokens.last().map(|t| t.text), Some("Б"));
    }

    #[test]
    fn test_identifiers_use_any_letters() {
        let tokens = LineLexer::new().tokenize("Іван = Її + café_2;");
        let idents: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Identifier)
            .map(|t| t.text)
            .collect();
        assert_eq!(idents, vec!["Іван", "Її", "café_2"]);
        assert_eq!(kinds("&НаКлієнті"), vec![TokenKind::Directive]);
    }

    #[test]
    fn test_directive_and_preprocessor() {
        assert_eq!(kinds("&НаСервере"), vec![TokenKind::Directive]);
        assert_eq!(
            kinds("#Область Публичные"),
            vec![TokenKind::Preprocessor, TokenKind::Identifier]
        );
    }
}
