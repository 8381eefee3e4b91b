/*!
# Parser integration tests

Symbol tables built from whole modules: declarations, scopes, locale
independence and recovery from broken structure.
*/

use bsl_intellisense::core::ParseIssueKind;
use bsl_intellisense::parser::{parse, DirectiveKind};
use bsl_intellisense::{parse_file, Dialect, SymbolKind};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

const MODULE_RU: &str = r#"#Область ПрограммныйИнтерфейс

Перем Кэш Экспорт;

// Возвращает сумму элементов.
//
// Параметры:
//   Элементы - Массив - слагаемые
Функция Сумма(Элементы, Знач Начальное = 0) Экспорт
    Итог = Начальное;
    Для Каждого Элемент Из Элементы Цикл
        Если Элемент <> Неопределено Тогда
            Итог = Итог + Элемент;
        КонецЕсли;
    КонецЦикла;
    Возврат Итог;
КонецФункции

#КонецОбласти

&НаСервере
Процедура Служебная()
    Попытка
        Список = Новый СписокЗначений;
    Исключение
        ВызватьИсключение "КонецПроцедуры";
    КонецПопытки;
КонецПроцедуры
"#;

const MODULE_EN: &str = r#"#Region ПрограммныйИнтерфейс

Var Кэш Export;

// Возвращает сумму элементов.
//
// Параметры:
//   Элементы - Массив - слагаемые
Function Сумма(Элементы, Val Начальное = 0) Export
    Итог = Начальное;
    For Each Элемент In Элементы Do
        If Элемент <> Undefined Then
            Итог = Итог + Элемент;
        EndIf;
    EndDo;
    Return Итог;
EndFunction

#EndRegion

&AtServer
Procedure Служебная()
    Try
        Список = New СписокЗначений;
    Except
        Raise "EndProcedure";
    EndTry;
EndProcedure
"#;

#[test]
fn test_procedure_with_default_parameter() {
    let table = parse("Процедура Тест(Парам1, Парам2 = 5)\nКонецПроцедуры", Dialect::Bsl);

    assert_eq!(table.symbols.len(), 1);
    let symbol = &table.symbols[0];
    assert_eq!(symbol.name, "Тест");
    assert_eq!(symbol.kind, SymbolKind::Procedure);
    assert!(!symbol.is_exported);
    assert_eq!(
        (symbol.source_range.start_line, symbol.source_range.end_line),
        (0, 1)
    );
    let params: Vec<(&str, Option<&str>)> = symbol
        .params
        .iter()
        .map(|p| (p.name.as_str(), p.default_value.as_deref()))
        .collect();
    assert_eq!(params, vec![("Парам1", None), ("Парам2", Some("5"))]);
}

#[test]
fn test_full_module_structure() {
    let table = parse(MODULE_RU, Dialect::Bsl);
    assert!(table.issues.is_empty(), "{:?}", table.issues);

    let names: Vec<(&str, SymbolKind)> = table
        .symbols
        .iter()
        .map(|s| (s.name.as_str(), s.kind))
        .collect();
    assert_eq!(
        names,
        vec![
            ("Кэш", SymbolKind::Variable),
            ("Сумма", SymbolKind::Function),
            ("Служебная", SymbolKind::Procedure),
        ]
    );

    let sum = table.method("СУММА").unwrap();
    assert!(sum.is_exported);
    assert_eq!(sum.region.as_deref(), Some("ПрограммныйИнтерфейс"));
    assert_eq!(sum.source_range.start_line, 8);
    assert_eq!(sum.source_range.end_line, 16);
    assert!(sum.params[1].is_by_value);
    assert!(sum
        .documentation_text()
        .unwrap()
        .starts_with("Возвращает сумму элементов."));

    let helper = table.method("Служебная").unwrap();
    assert_eq!(helper.compilation_directive.as_deref(), Some("&НаСервере"));
    assert_eq!(helper.region, None);
    assert_eq!(helper.source_range.end_line, 27);

    let scope = table.scope_at(12).unwrap();
    let locals: Vec<&str> = scope.locals.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(locals, vec!["Итог", "Элемент"]);
}

#[test]
fn test_symbols_do_not_depend_on_keyword_locale() {
    let ru = parse(MODULE_RU, Dialect::Bsl);
    let en = parse(MODULE_EN, Dialect::Bsl);

    let shape = |table: &bsl_intellisense::ModuleTable| {
        table
            .symbols
            .iter()
            .map(|s| {
                (
                    s.name.clone(),
                    s.kind,
                    s.is_exported,
                    s.source_range.start_line,
                    s.source_range.end_line,
                    s.params.len(),
                )
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(shape(&ru), shape(&en));

    // keyword length shifts name columns; names and lines must agree
    let scopes = |table: &bsl_intellisense::ModuleTable| {
        table
            .method_scopes
            .iter()
            .map(|scope| {
                (
                    scope.start_line,
                    scope.end_line,
                    scope.params.iter().map(|p| p.name.clone()).collect::<Vec<_>>(),
                    scope.locals.iter().map(|l| l.name.clone()).collect::<Vec<_>>(),
                    scope.assignments.clone(),
                )
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(scopes(&ru), scopes(&en));
}

#[test]
fn test_parsing_is_idempotent() {
    for code in [MODULE_RU, MODULE_EN, "Процедура Оборвана()\n  А = 1;"] {
        let first = parse(code, Dialect::Bsl);
        let second = parse(code, Dialect::Bsl);
        assert_eq!(first, second);
    }
}

#[test]
fn test_unterminated_procedure_is_registered() {
    let code = "Процедура Первая()\nКонецПроцедуры\n\nПроцедура Незакрытая(А)\n  Б = А;";
    let table = parse(code, Dialect::Bsl);

    let open = table.method("Незакрытая").unwrap();
    assert_eq!(open.source_range.start_line, 3);
    assert_eq!(open.source_range.end_line, 4);
    assert!(table
        .issues
        .iter()
        .any(|issue| issue.kind == ParseIssueKind::UnterminatedMethod && issue.line == 3));
    assert!(table.method("Первая").is_some());
}

#[test]
fn test_onescript_imports_and_file_decoding() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Приложение.os");
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice(
        "#Использовать logos\n\nПроцедура ПриСозданииОбъекта()\nКонецПроцедуры\n".as_bytes(),
    );
    fs::write(&path, bytes).unwrap();

    let table = parse_file(&path).unwrap();
    assert_eq!(table.dialect, Dialect::OneScript);
    assert!(table
        .directives
        .iter()
        .any(|d| d.kind == DirectiveKind::Import && d.line == 0));
    assert_eq!(table.method("ПриСозданииОбъекта").unwrap().source_range.start_line, 2);
    assert_eq!(table.module_name().as_deref(), Some("Приложение"));
}
