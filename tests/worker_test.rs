/*!
# Cache worker integration tests

Editor events flowing through the background worker into snapshots that
queries observe.
*/

use bsl_intellisense::core::normalize_path;
use bsl_intellisense::workspace::{spawn_cache_worker, CacheCommand};
use bsl_intellisense::{EngineConfig, LanguageEngine, Position};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn engine(debounce_ms: u64) -> LanguageEngine {
    let config = EngineConfig {
        debounce_ms,
        ..EngineConfig::default()
    };
    LanguageEngine::new(config).unwrap()
}

#[tokio::test]
async fn test_edits_reach_workspace_completion() {
    let dir = TempDir::new().unwrap();
    let lib = dir.path().join("Библиотека.os");
    let app = dir.path().join("Приложение.os");
    fs::write(&lib, "Процедура Старая() Экспорт\nКонецПроцедуры\n").unwrap();
    fs::write(&app, "Ст\n").unwrap();
    let lib = normalize_path(&lib);
    let app = normalize_path(&app);

    let engine = engine(20);
    let worker = spawn_cache_worker(Arc::clone(engine.cache()));
    worker.send(CacheCommand::Rebuild {
        root: Some(dir.path().to_path_buf()),
    });
    worker.flush().await;

    let labels = |engine: &LanguageEngine| -> Vec<String> {
        engine
            .completions_at(&app, "Ст\n", Position::new(0, 2))
            .into_iter()
            .filter(|c| c.source == bsl_intellisense::resolver::CompletionSource::Workspace)
            .map(|c| c.label)
            .collect()
    };
    assert_eq!(labels(&engine), vec!["Старая".to_string()]);

    worker.send(CacheCommand::Opened {
        path: lib.clone(),
        text: "Процедура Старая() Экспорт\nКонецПроцедуры\n".into(),
    });
    worker.send(CacheCommand::Changed {
        path: lib.clone(),
        text: "Процедура Стартовая() Экспорт\nКонецПроцедуры\n".into(),
    });
    worker.send(CacheCommand::Changed {
        path: lib.clone(),
        text: "Процедура Стабильная() Экспорт\nКонецПроцедуры\n".into(),
    });
    tokio::time::sleep(Duration::from_millis(200)).await;
    worker.flush().await;

    assert_eq!(labels(&engine), vec!["Стабильная".to_string()]);
    // the file on disk is untouched, the open buffer wins
    assert!(fs::read_to_string(&lib).unwrap().contains("Старая"));

    worker.send(CacheCommand::Closed { path: lib.clone() });
    worker.flush().await;
    assert_eq!(labels(&engine), vec!["Старая".to_string()]);

    worker.shutdown().await;
}

#[tokio::test]
async fn test_deleted_file_disappears_from_search() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Удаляемый.bsl");
    fs::write(&path, "Функция Временная() Экспорт\nКонецФункции\n").unwrap();

    let engine = engine(1000);
    let worker = spawn_cache_worker(Arc::clone(engine.cache()));
    worker.send(CacheCommand::Rebuild {
        root: Some(dir.path().to_path_buf()),
    });
    worker.flush().await;
    assert_eq!(engine.workspace_symbols("Временная").len(), 1);

    fs::remove_file(&path).unwrap();
    worker.send(CacheCommand::Deleted {
        path: normalize_path(&path),
    });
    worker.flush().await;
    assert!(engine.workspace_symbols("Временная").is_empty());

    worker.shutdown().await;
}

#[tokio::test]
async fn test_flush_applies_debounced_change_immediately() {
    let dir = TempDir::new().unwrap();
    let path = normalize_path(&dir.path().join("Модуль.bsl"));

    // debounce far longer than the test
    let engine = engine(60_000);
    let worker = spawn_cache_worker(Arc::clone(engine.cache()));
    worker.send(CacheCommand::Changed {
        path: path.clone(),
        text: "Процедура Черновик()\nКонецПроцедуры\n".into(),
    });
    assert!(engine.cache().get_module_table(&path).is_none());

    worker.flush().await;
    let table = engine.cache().get_module_table(&path).unwrap();
    assert_eq!(table.symbols[0].name, "Черновик");

    worker.shutdown().await;
}
