//! Форматирование отступов.
//!
//! Каждая строка получает отступ по глубине вложенности блоков
//! `Процедура`/`Функция`, `Если`, `Для`/`Пока` и `Попытка`. Строки внутри
//! многострочных литералов, инструкции препроцессора и пустые строки не
//! трогаются.

use serde::Serialize;

use crate::core::LineIndex;
use crate::parser::{keyword, Keyword, LineLexer, Token, TokenKind};

/// Единица отступа
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    pub tab_size: usize,
    pub insert_spaces: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            tab_size: 4,
            insert_spaces: false,
        }
    }
}

impl FormatOptions {
    fn indent(&self, depth: usize) -> String {
        if self.insert_spaces {
            " ".repeat(depth * self.tab_size)
        } else {
            "\t".repeat(depth)
        }
    }
}

/// Замена ведущих пробелов одной строки
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndentEdit {
    pub line: usize,
    /// Chars of leading whitespace being replaced
    pub old_len: usize,
    pub new_indent: String,
}

/// How a line moves the nesting depth
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct LineShape {
    /// The line itself sits one level out (`КонецЕсли`, `Иначе`)
    outdent: bool,
    opened: usize,
    closed: usize,
}

fn line_shape(tokens: &[Token<'_>]) -> LineShape {
    let mut shape = LineShape::default();
    let mut first = true;
    let mut after_dot = false;
    for token in tokens {
        if token.kind == TokenKind::Comment {
            break;
        }
        let kw = (token.kind == TokenKind::Identifier && !after_dot)
            .then(|| keyword(token.text))
            .flatten();
        match kw {
            Some(Keyword::Procedure | Keyword::Function | Keyword::If | Keyword::For)
            | Some(Keyword::While | Keyword::Try) => shape.opened += 1,
            Some(Keyword::EndProcedure | Keyword::EndFunction | Keyword::EndIf)
            | Some(Keyword::EndDo | Keyword::EndTry) => {
                if first {
                    shape.outdent = true;
                }
                if shape.opened > 0 {
                    shape.opened -= 1;
                } else {
                    shape.closed += 1;
                }
            }
            Some(Keyword::Else | Keyword::ElseIf | Keyword::Except) if first => {
                shape.outdent = true;
            }
            _ => {}
        }
        after_dot = token.kind == TokenKind::Dot;
        first = false;
    }
    shape
}

/// Indentation edits for `lines` (inclusive range, all lines when `None`).
/// Depth is always counted from the top of the text.
pub fn indent_edits(
    text: &str,
    lines: Option<(usize, usize)>,
    options: FormatOptions,
) -> Vec<IndentEdit> {
    let index = LineIndex::new(text);
    let (first, last) = lines.unwrap_or((0, usize::MAX));
    let mut lexer = LineLexer::new();
    let mut depth = 0usize;
    let mut edits = Vec::new();

    for (line_no, line) in index.lines().iter().enumerate() {
        if line_no > last {
            break;
        }
        let continues_string = lexer.in_string();
        let tokens = lexer.tokenize(line);
        if continues_string {
            continue;
        }
        let body = line.trim_start();
        if body.is_empty() || body.starts_with('#') {
            continue;
        }

        let shape = line_shape(&tokens);
        let own_depth = if shape.outdent {
            depth.saturating_sub(1)
        } else {
            depth
        };
        depth = (depth + shape.opened).saturating_sub(shape.closed);

        if line_no < first {
            continue;
        }
        let old_len = line.chars().count() - body.chars().count();
        let new_indent = options.indent(own_depth);
        if line[..line.len() - body.len()] != new_indent {
            edits.push(IndentEdit {
                line: line_no,
                old_len,
                new_indent,
            });
        }
    }
    edits
}

/// `text` with every edit applied
pub fn apply_indent_edits(text: &str, edits: &[IndentEdit]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending = edits.iter().peekable();
    for (line_no, line) in text.split('\n').enumerate() {
        if line_no > 0 {
            out.push('\n');
        }
        match pending.next_if(|edit| edit.line == line_no) {
            Some(edit) => {
                out.push_str(&edit.new_indent);
                out.extend(line.chars().skip(edit.old_len));
            }
            None => out.push_str(line),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn format(text: &str) -> String {
        apply_indent_edits(text, &indent_edits(text, None, FormatOptions::default()))
    }

    #[test]
    fn test_nested_blocks() {
        let code = "Процедура П()\nЕсли А Тогда\nДля Каждого Э Из С Цикл\nСообщить(Э);\nКонецЦикла;\nИначе\nПопытка\nБ = 1;\nИсключение\n  Б = 2;\n        КонецПопытки;\nКонецЕсли;\nКонецПроцедуры\n";
        let expected = "Процедура П()\n\tЕсли А Тогда\n\t\tДля Каждого Э Из С Цикл\n\t\t\tСообщить(Э);\n\t\tКонецЦикла;\n\tИначе\n\t\tПопытка\n\t\t\tБ = 1;\n\t\tИсключение\n\t\t\tБ = 2;\n\t\tКонецПопытки;\n\tКонецЕсли;\nКонецПроцедуры\n";
        assert_eq!(format(code), expected);
    }

    #[test]
    fn test_strings_preprocessor_and_one_liners_untouched() {
        let code = "#Область Служебные\nФункция Ф()\nТекст = \"ВЫБРАТЬ\n|  Если\n|\";\nЕсли А Тогда Б = 1; КонецЕсли;\n#КонецОбласти\nКонецФункции\n";
        let expected = "#Область Служебные\nФункция Ф()\n\tТекст = \"ВЫБРАТЬ\n|  Если\n|\";\n\tЕсли А Тогда Б = 1; КонецЕсли;\n#КонецОбласти\nКонецФункции\n";
        assert_eq!(format(code), expected);
    }

    #[test]
    fn test_members_named_like_keywords_do_not_nest() {
        let code = "Процедура П()\nОбъект.Попытка = 1;\nКонецПроцедуры";
        assert_eq!(
            format(code),
            "Процедура П()\n\tОбъект.Попытка = 1;\nКонецПроцедуры"
        );
    }

    #[test]
    fn test_range_uses_depth_from_the_top() {
        let code = "Procedure P()\nIf A Then\nB = 1;\nEndIf;\nEndProcedure";
        let options = FormatOptions {
            tab_size: 2,
            insert_spaces: true,
        };
        let edits = indent_edits(code, Some((2, 2)), options);
        assert_eq!(
            edits,
            vec![IndentEdit {
                line: 2,
                old_len: 0,
                new_indent: "    ".to_string(),
            }]
        );
    }
}
