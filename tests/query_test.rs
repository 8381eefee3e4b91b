/*!
# Query integration tests

Completion, navigation, search and formatting over an indexed workspace.
*/

use bsl_intellisense::core::normalize_path;
use bsl_intellisense::query::format::apply_indent_edits;
use bsl_intellisense::query::{FormatOptions, MatchRank};
use bsl_intellisense::resolver::CompletionSource;
use bsl_intellisense::{EngineConfig, FileLocation, LanguageEngine, Position, Resolution};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const UTILS: &str = "// Складывает два числа\nФункция Сложить(А, Б) Экспорт\n    Возврат А + Б;\nКонецФункции\n\nФункция СчитатьСтроки(Текст) Экспорт\n    Возврат 0;\nКонецФункции\n";

const MAIN: &str = "Перем СчетчикМодуля;\n\nПроцедура Выполнить(СчетПарам)\n    Сч\n    Итог = Утилиты.Сложить(1, 2);\n    Сооб\nКонецПроцедуры\n";

struct Fixture {
    _dir: TempDir,
    engine: LanguageEngine,
    utils: PathBuf,
    main: PathBuf,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let utils = dir.path().join("Утилиты.bsl");
    let main = dir.path().join("Главный.bsl");
    fs::write(&utils, UTILS).unwrap();
    fs::write(&main, MAIN).unwrap();

    let engine = LanguageEngine::new(EngineConfig::default()).unwrap();
    engine.cache().full_rebuild(dir.path()).unwrap();
    Fixture {
        _dir: dir,
        engine,
        utils: normalize_path(&utils),
        main: normalize_path(&main),
    }
}

#[test]
fn test_completion_buckets_in_order() {
    let f = fixture();
    let items = f.engine.completions_at(&f.main, MAIN, Position::new(3, 6));

    let head: Vec<(&str, CompletionSource)> = items
        .iter()
        .take(3)
        .map(|c| (c.label.as_str(), c.source))
        .collect();
    assert_eq!(
        head,
        vec![
            ("СчетПарам", CompletionSource::Local),
            ("СчетчикМодуля", CompletionSource::Module),
            ("СчитатьСтроки", CompletionSource::Workspace),
        ]
    );
    let sources: Vec<CompletionSource> = items.iter().map(|c| c.source).collect();
    let mut sorted = sources.clone();
    sorted.sort();
    assert_eq!(sources, sorted);
}

#[test]
fn test_completion_prefix_is_case_insensitive() {
    let f = fixture();
    let items = f.engine.completions_at(&f.main, MAIN, Position::new(5, 8));
    assert!(items
        .iter()
        .any(|c| c.label == "Сообщить" && c.source == CompletionSource::Catalog));

    let lower = MAIN.replace("    Сооб\n", "    сооб\n");
    let items = f.engine.completions_at(&f.main, &lower, Position::new(5, 8));
    assert!(items.iter().any(|c| c.label == "Сообщить"));
}

#[test]
fn test_member_completion_of_workspace_module() {
    let f = fixture();
    let text = MAIN.replace("    Сч\n", "    Утилиты.\n");
    let items = f.engine.completions_at(&f.main, &text, Position::new(3, 12));
    let labels: Vec<&str> = items.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["Сложить", "СчитатьСтроки"]);
}

#[test]
fn test_definition_through_module_member() {
    let f = fixture();
    let location = f
        .engine
        .definition_of(&f.main, MAIN, Position::new(4, 21))
        .unwrap();
    assert_eq!(location, FileLocation::new(f.utils.clone(), 1, 8));

    let hover = f.engine.hover_at(&f.main, MAIN, Position::new(4, 21)).unwrap();
    assert!(hover.contents.contains("Складывает два числа"));
}

#[test]
fn test_local_shadows_module_variable() {
    let f = fixture();
    let text = "Перем Имя;\nПроцедура П()\n    Имя = 1;\n    Сообщить(Имя);\nКонецПроцедуры\nПроцедура Д(Имя)\n    Сообщить(Имя);\nКонецПроцедуры\n";
    let path = f.main.with_file_name("Тень.bsl");

    match f.engine.resolve_at(&path, text, Position::new(3, 14)).unwrap() {
        Resolution::Module(symbol) => assert_eq!(symbol.source_range.start_line, 0),
        other => panic!("expected module variable, got {:?}", other),
    }
    match f.engine.resolve_at(&path, text, Position::new(6, 14)).unwrap() {
        Resolution::Local(symbol) => assert_eq!(symbol.source_range.start_line, 5),
        other => panic!("expected parameter, got {:?}", other),
    }
}

#[test]
fn test_local_shadows_catalog_global() {
    let f = fixture();
    let text = "Процедура П()\n    Сообщить = 1;\n    Сообщить = Сообщить + 1;\nКонецПроцедуры\n";
    let path = f.main.with_file_name("Тень.bsl");

    match f.engine.resolve_at(&path, text, Position::new(2, 16)).unwrap() {
        Resolution::Local(symbol) => {
            assert_eq!(symbol.name, "Сообщить");
            assert_eq!(symbol.source_range.start_line, 1);
        }
        other => panic!("expected local variable, got {:?}", other),
    }
    // outside the method the catalog procedure is visible again
    let outside = "Сообщить(1);\n";
    match f.engine.resolve_at(&path, outside, Position::new(0, 3)).unwrap() {
        Resolution::Catalog(entry) => assert_eq!(entry.name, "Сообщить"),
        other => panic!("expected catalog entry, got {:?}", other),
    }
}

#[test]
fn test_member_completion_of_assigned_query_result() {
    let f = fixture();
    let text = "Процедура П()\n    Запрос = Новый Запрос;\n    Результат = Запрос.Выполнить();\n    Результат.\nКонецПроцедуры\n";
    let path = f.main.with_file_name("Отчет.bsl");
    let labels: Vec<String> = f
        .engine
        .completions_at(&path, text, Position::new(3, 14))
        .into_iter()
        .map(|c| c.label)
        .collect();
    assert!(labels.contains(&"Выбрать".to_string()), "{:?}", labels);
    assert!(labels.contains(&"Выгрузить".to_string()), "{:?}", labels);
}

#[test]
fn test_references_across_workspace() {
    let f = fixture();
    let refs = f
        .engine
        .references_to(&f.utils, UTILS, Position::new(1, 10));

    let mut expected = vec![
        FileLocation::new(f.utils.clone(), 1, 8),
        FileLocation::new(f.main.clone(), 4, 19),
    ];
    expected.sort();
    assert_eq!(refs, expected);
}

#[test]
fn test_document_symbols_follow_source_order() {
    let f = fixture();
    let names: Vec<String> = f
        .engine
        .document_symbols(&f.utils, UTILS)
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["Сложить", "СчитатьСтроки"]);
}

#[test]
fn test_workspace_symbol_search_ranking() {
    let f = fixture();
    let matches = f.engine.workspace_symbols("сч");
    let ranked: Vec<(&str, MatchRank)> = matches
        .iter()
        .map(|m| (m.symbol.name.as_str(), m.rank))
        .collect();
    assert_eq!(
        ranked,
        vec![
            ("СчетчикМодуля", MatchRank::Prefix),
            ("СчитатьСтроки", MatchRank::Prefix),
        ]
    );

    let fuzzy = f.engine.workspace_symbols("слж");
    assert_eq!(fuzzy.len(), 1);
    assert_eq!(fuzzy[0].symbol.name, "Сложить");
    assert_eq!(fuzzy[0].rank, MatchRank::Subsequence);
}

#[test]
fn test_signature_of_workspace_function() {
    let f = fixture();
    let signature = f
        .engine
        .signature_of(&f.main, MAIN, Position::new(4, 31))
        .unwrap();
    assert_eq!(signature.label, "Сложить(А, Б)");
    assert_eq!(signature.active_parameter, 1);
}

#[test]
fn test_unknown_file_is_parsed_on_the_fly() {
    let f = fixture();
    let path = Path::new("/nowhere/Черновик.bsl");
    let text = "Процедура Черновик()\n    Сложить(1, 2);\nКонецПроцедуры\n";
    let location = f
        .engine
        .definition_of(path, text, Position::new(1, 6))
        .unwrap();
    assert_eq!(location.file, f.utils);
}

#[test]
fn test_format_edits_reindent_module() {
    let f = fixture();
    let text = "Процедура П()\nЕсли Истина Тогда\n      Сообщить(1);\nКонецЕсли;\nКонецПроцедуры\n";
    let edits = f.engine.format_edits(text, None, FormatOptions::default());
    let lines: Vec<usize> = edits.iter().map(|e| e.line).collect();
    assert_eq!(lines, vec![1, 2, 3]);
    assert_eq!(
        apply_indent_edits(text, &edits),
        "Процедура П()\n\tЕсли Истина Тогда\n\t\tСообщить(1);\n\tКонецЕсли;\nКонецПроцедуры\n"
    );
}
