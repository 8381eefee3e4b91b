//! Разбор текста вокруг курсора: слово под курсором, цепочка получателя,
//! контекст вызова для подсказки параметров.

use crate::parser::{is_ident_char, keyword, Keyword};

/// Identifier run touching the cursor, in char columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordAt {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Word under (or right before) `column`
pub fn word_at(line: &str, column: usize) -> Option<WordAt> {
    let chars: Vec<char> = line.chars().collect();
    let column = column.min(chars.len());
    let mut start = column;
    while start > 0 && is_ident_char(chars[start - 1]) {
        start -= 1;
    }
    let mut end = column;
    while end < chars.len() && is_ident_char(chars[end]) {
        end += 1;
    }
    if start == end {
        return None;
    }
    Some(WordAt {
        text: chars[start..end].iter().collect(),
        start,
        end,
    })
}

/// Одно звено цепочки `Объект.Метод().Свойство`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLink {
    pub name: String,
    pub is_call: bool,
}

fn skip_whitespace_left(chars: &[char], mut pos: usize) -> usize {
    while pos > 0 && chars[pos - 1].is_whitespace() {
        pos -= 1;
    }
    pos
}

/// Receiver links left of the `.` at char index `dot`, leftmost first.
/// `None` when the receiver is not a plain identifier chain.
pub fn receiver_chain(line: &str, dot: usize) -> Option<Vec<ChainLink>> {
    let chars: Vec<char> = line.chars().collect();
    if chars.get(dot) != Some(&'.') {
        return None;
    }

    let mut links = Vec::new();
    let mut pos = dot;
    loop {
        pos = skip_whitespace_left(&chars, pos);
        let mut is_call = false;
        if pos > 0 && chars[pos - 1] == ')' {
            pos = matching_open_paren(&chars, pos - 1)?;
            pos = skip_whitespace_left(&chars, pos);
            is_call = true;
        }

        let end = pos;
        while pos > 0 && is_ident_char(chars[pos - 1]) {
            pos -= 1;
        }
        if pos == end {
            return None;
        }
        let name: String = chars[pos..end].iter().collect();
        if name.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(true) {
            return None;
        }
        links.push(ChainLink { name, is_call });

        let before = skip_whitespace_left(&chars, pos);
        if before > 0 && chars[before - 1] == '.' {
            pos = before - 1;
        } else {
            break;
        }
    }

    links.reverse();
    Some(links)
}

/// Index of the `(` matching the `)` at `close`
fn matching_open_paren(chars: &[char], close: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut pos = close + 1;
    while pos > 0 {
        pos -= 1;
        match chars[pos] {
            '"' => in_quote = !in_quote,
            ')' if !in_quote => depth += 1,
            '(' if !in_quote => {
                depth -= 1;
                if depth == 0 {
                    return Some(pos);
                }
            }
            _ => {}
        }
    }
    None
}

/// Что находится слева от набираемого идентификатора
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionTrigger {
    /// Plain identifier position
    Name,
    /// Right after `Новый` / `New`
    NewExpression,
    /// After `.`; receiver links leftmost first, `None` when untyped
    Member(Option<Vec<ChainLink>>),
}

/// Completion context for the text before the cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionContext {
    pub prefix: String,
    pub trigger: CompletionTrigger,
}

pub fn completion_context(line_prefix: &str) -> CompletionContext {
    let chars: Vec<char> = line_prefix.chars().collect();
    let mut start = chars.len();
    while start > 0 && is_ident_char(chars[start - 1]) {
        start -= 1;
    }
    let prefix: String = chars[start..].iter().collect();

    let before = skip_whitespace_left(&chars, start);
    let trigger = if before > 0 && chars[before - 1] == '.' {
        let line: String = chars.iter().collect();
        CompletionTrigger::Member(receiver_chain(&line, before - 1))
    } else if previous_word(&chars, before).and_then(|w| keyword(&w)) == Some(Keyword::New) {
        CompletionTrigger::NewExpression
    } else {
        CompletionTrigger::Name
    };

    CompletionContext { prefix, trigger }
}

fn previous_word(chars: &[char], end: usize) -> Option<String> {
    let mut start = end;
    while start > 0 && is_ident_char(chars[start - 1]) {
        start -= 1;
    }
    (start < end).then(|| chars[start..end].iter().collect())
}

/// True when the word starting at char `start` follows `Новый` / `New`
pub fn follows_new_keyword(line: &str, start: usize) -> bool {
    let chars: Vec<char> = line.chars().collect();
    let before = skip_whitespace_left(&chars, start.min(chars.len()));
    previous_word(&chars, before).and_then(|w| keyword(&w)) == Some(Keyword::New)
}

/// Char index of the `.` right before the word starting at `start`
pub fn member_dot_before(line: &str, start: usize) -> Option<usize> {
    let chars: Vec<char> = line.chars().collect();
    let before = skip_whitespace_left(&chars, start.min(chars.len()));
    (before > 0 && chars[before - 1] == '.').then(|| before - 1)
}

/// Innermost unclosed call before the cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    /// Char column right after the callee name
    pub callee_end: usize,
    /// 0-based index of the argument under the cursor
    pub active_parameter: usize,
}

/// Finds the call whose argument list contains the end of `line_prefix`
pub fn call_context(line_prefix: &str) -> Option<CallContext> {
    let chars: Vec<char> = line_prefix.chars().collect();
    // (позиция открывающей скобки, число запятых)
    let mut frames: Vec<(usize, usize)> = Vec::new();
    let mut in_quote = false;
    let mut idx = 0;
    while idx < chars.len() {
        let ch = chars[idx];
        if in_quote {
            if ch == '"' {
                in_quote = false;
            }
            idx += 1;
            continue;
        }
        match ch {
            '"' => in_quote = true,
            '/' if chars.get(idx + 1) == Some(&'/') => return None,
            '(' => frames.push((idx, 0)),
            ')' => {
                frames.pop();
            }
            ',' => {
                if let Some(frame) = frames.last_mut() {
                    frame.1 += 1;
                }
            }
            _ => {}
        }
        idx += 1;
    }

    frames.iter().rev().find_map(|&(open, commas)| {
        let end = skip_whitespace_left(&chars, open);
        let name = previous_word(&chars, end)?;
        if keyword(&name).is_some() {
            return None;
        }
        Some(CallContext {
            callee_end: end,
            active_parameter: commas,
        })
    })
}
