//! BSL Keywords and Language Constructs
//!
//! Двуязычные (русские и английские) ключевые слова BSL/OneScript.
//! Сопоставление всегда регистронезависимое: ключи таблиц хранятся в нижнем регистре.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Ключевые слова, значимые для структурного разбора
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    // Объявления
    Procedure,
    EndProcedure,
    Function,
    EndFunction,
    Async,
    Var,
    Val,
    Export,

    // Управление потоком
    If,
    Then,
    ElseIf,
    Else,
    EndIf,
    For,
    Each,
    In,
    To,
    While,
    Do,
    EndDo,
    Try,
    Except,
    EndTry,
    Raise,
    Return,
    Break,
    Continue,

    // Операторы и литералы
    New,
    And,
    Or,
    Not,
    True,
    False,
    Undefined,
    Null,
}

impl Keyword {
    /// Keywords after which a new statement begins on the same line
    pub fn opens_statement(self) -> bool {
        matches!(
            self,
            Keyword::Then | Keyword::Do | Keyword::Else | Keyword::Try | Keyword::Except
        )
    }
}

static KEYWORDS: Lazy<HashMap<String, Keyword>> = Lazy::new(|| {
    let pairs: &[(&str, &str, Keyword)] = &[
        ("Процедура", "Procedure", Keyword::Procedure),
        ("КонецПроцедуры", "EndProcedure", Keyword::EndProcedure),
        ("Функция", "Function", Keyword::Function),
        ("КонецФункции", "EndFunction", Keyword::EndFunction),
        ("Асинх", "Async", Keyword::Async),
        ("Перем", "Var", Keyword::Var),
        ("Знач", "Val", Keyword::Val),
        ("Экспорт", "Export", Keyword::Export),
        ("Если", "If", Keyword::If),
        ("Тогда", "Then", Keyword::Then),
        ("ИначеЕсли", "ElsIf", Keyword::ElseIf),
        ("Иначе", "Else", Keyword::Else),
        ("КонецЕсли", "EndIf", Keyword::EndIf),
        ("Для", "For", Keyword::For),
        ("Каждого", "Each", Keyword::Each),
        ("Из", "In", Keyword::In),
        ("По", "To", Keyword::To),
        ("Пока", "While", Keyword::While),
        ("Цикл", "Do", Keyword::Do),
        ("КонецЦикла", "EndDo", Keyword::EndDo),
        ("Попытка", "Try", Keyword::Try),
        ("Исключение", "Except", Keyword::Except),
        ("КонецПопытки", "EndTry", Keyword::EndTry),
        ("ВызватьИсключение", "Raise", Keyword::Raise),
        ("Возврат", "Return", Keyword::Return),
        ("Прервать", "Break", Keyword::Break),
        ("Продолжить", "Continue", Keyword::Continue),
        ("Новый", "New", Keyword::New),
        ("И", "And", Keyword::And),
        ("Или", "Or", Keyword::Or),
        ("Не", "Not", Keyword::Not),
        ("Истина", "True", Keyword::True),
        ("Ложь", "False", Keyword::False),
        ("Неопределено", "Undefined", Keyword::Undefined),
        ("Null", "Null", Keyword::Null),
    ];

    let mut map = HashMap::new();
    for (ru, en, keyword) in pairs {
        map.insert(ru.to_lowercase(), *keyword);
        map.insert(en.to_lowercase(), *keyword);
    }
    // "ElseIf" встречается в OneScript наравне с "ElsIf"
    map.insert("elseif".to_string(), Keyword::ElseIf);
    map
});

/// Case-insensitive keyword lookup in both locales
pub fn keyword(word: &str) -> Option<Keyword> {
    KEYWORDS.get(&word.to_lowercase()).copied()
}

pub fn is_keyword(word: &str) -> bool {
    keyword(word).is_some()
}

/// Инструкции препроцессора (`#Область`, `#Если`, `#Использовать`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreprocessorKeyword {
    Region,
    EndRegion,
    If,
    ElseIf,
    Else,
    EndIf,
    Use,
}

static PREPROCESSOR_KEYWORDS: Lazy<HashMap<String, PreprocessorKeyword>> = Lazy::new(|| {
    let pairs: &[(&str, &str, PreprocessorKeyword)] = &[
        ("Область", "Region", PreprocessorKeyword::Region),
        ("КонецОбласти", "EndRegion", PreprocessorKeyword::EndRegion),
        ("Если", "If", PreprocessorKeyword::If),
        ("ИначеЕсли", "ElsIf", PreprocessorKeyword::ElseIf),
        ("Иначе", "Else", PreprocessorKeyword::Else),
        ("КонецЕсли", "EndIf", PreprocessorKeyword::EndIf),
        ("Использовать", "Use", PreprocessorKeyword::Use),
    ];

    let mut map = HashMap::new();
    for (ru, en, keyword) in pairs {
        map.insert(ru.to_lowercase(), *keyword);
        map.insert(en.to_lowercase(), *keyword);
    }
    map
});

/// Lookup of a preprocessor instruction name (without the leading `#`)
pub fn preprocessor_keyword(word: &str) -> Option<PreprocessorKeyword> {
    PREPROCESSOR_KEYWORDS.get(&word.to_lowercase()).copied()
}

/// Директивы компиляции управляемого приложения
pub const COMPILATION_DIRECTIVES: &[(&str, &str)] = &[
    ("НаКлиенте", "AtClient"),
    ("НаСервере", "AtServer"),
    ("НаСервереБезКонтекста", "AtServerNoContext"),
    ("НаКлиентеНаСервереБезКонтекста", "AtClientAtServerNoContext"),
    ("НаКлиентеНаСервере", "AtClientAtServer"),
];

/// True for `&НаСервере`-style directives (annotations in OneScript are not)
pub fn is_compilation_directive(word: &str) -> bool {
    let lower = word.trim_start_matches('&').to_lowercase();
    COMPILATION_DIRECTIVES
        .iter()
        .any(|(ru, en)| ru.to_lowercase() == lower || en.to_lowercase() == lower)
}
