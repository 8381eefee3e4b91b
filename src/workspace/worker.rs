/*!
# Cache worker

Фоновая задача, которая применяет события редактора к кэшу рабочей области.

События изменения буфера откладываются на `debounce_ms`: пока пользователь
печатает, файл не разбирается. Открытие, сохранение и закрытие применяются
сразу и отменяют отложенное изменение того же файла. Разбор и пересборка
выполняются на пуле блокирующих задач, цикл обработки команд не блокируется.
*/

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{RebuildOutcome, WorkspaceCache};
use crate::core::EngineResult;

/// Команды фонового обработчика кэша
#[derive(Debug)]
pub enum CacheCommand {
    Opened { path: PathBuf, text: String },
    Changed { path: PathBuf, text: String },
    /// `text` is present when the client sends it with the save notification
    Saved { path: PathBuf, text: Option<String> },
    Closed { path: PathBuf },
    Deleted { path: PathBuf },
    /// Full rebuild; `None` reuses the previous root
    Rebuild { root: Option<PathBuf> },
    /// Applies pending edits, waits for running rebuilds, then replies
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Handle to a running cache worker
#[derive(Debug)]
pub struct CacheWorkerHandle {
    sender: mpsc::UnboundedSender<CacheCommand>,
    task: JoinHandle<()>,
}

impl CacheWorkerHandle {
    /// Queues a command; `false` when the worker is gone
    pub fn send(&self, command: CacheCommand) -> bool {
        self.sender.send(command).is_ok()
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<CacheCommand> {
        self.sender.clone()
    }

    /// Resolves once every command queued before it has been applied
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.send(CacheCommand::Flush(tx)) {
            let _ = rx.await;
        }
    }

    pub async fn shutdown(self) {
        let _ = self.sender.send(CacheCommand::Shutdown);
        if let Err(e) = self.task.await {
            tracing::error!("Cache worker terminated abnormally: {}", e);
        }
    }
}

/// Starts the worker on the current tokio runtime
pub fn spawn_cache_worker(cache: Arc<WorkspaceCache>) -> CacheWorkerHandle {
    let (sender, receiver) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(cache, receiver));
    CacheWorkerHandle { sender, task }
}

struct PendingChange {
    text: String,
    due: Instant,
}

async fn run(cache: Arc<WorkspaceCache>, mut receiver: mpsc::UnboundedReceiver<CacheCommand>) {
    let debounce = Duration::from_millis(cache.config().debounce_ms);
    let mut pending: HashMap<PathBuf, PendingChange> = HashMap::new();
    let mut rebuilds: Vec<JoinHandle<EngineResult<RebuildOutcome>>> = Vec::new();

    tracing::debug!("Cache worker started (debounce {:?})", debounce);

    loop {
        rebuilds.retain(|handle| !handle.is_finished());

        let next_due = pending.values().map(|change| change.due).min();
        let command = match next_due {
            Some(due) => tokio::select! {
                command = receiver.recv() => command,
                _ = tokio::time::sleep_until(due) => {
                    apply_due(&cache, &mut pending, Instant::now()).await;
                    continue;
                }
            },
            None => receiver.recv().await,
        };

        let Some(command) = command else {
            break;
        };

        match command {
            CacheCommand::Opened { path, text } => {
                pending.remove(&path);
                cache.open_buffer(&path, text.clone());
                parse(&cache, path, text).await;
            }
            CacheCommand::Changed { path, text } => {
                cache.open_buffer(&path, text.clone());
                pending.insert(
                    path,
                    PendingChange {
                        text,
                        due: Instant::now() + debounce,
                    },
                );
            }
            CacheCommand::Saved { path, text } => {
                let queued = pending.remove(&path).map(|change| change.text);
                match text.or(queued).or_else(|| cache.buffer_text(&path)) {
                    Some(text) => {
                        cache.open_buffer(&path, text.clone());
                        parse(&cache, path, text).await;
                    }
                    None => reload(&cache, path).await,
                }
            }
            CacheCommand::Closed { path } => {
                pending.remove(&path);
                cache.close_buffer(&path);
                reload(&cache, path).await;
            }
            CacheCommand::Deleted { path } => {
                pending.remove(&path);
                cache.close_buffer(&path);
                cache.evict_file(&path);
            }
            CacheCommand::Rebuild { root } => match root.or_else(|| cache.root()) {
                Some(root) => {
                    let cache = Arc::clone(&cache);
                    rebuilds.push(tokio::task::spawn_blocking(move || cache.full_rebuild(&root)));
                }
                None => tracing::warn!("Rebuild requested before a workspace root is known"),
            },
            CacheCommand::Flush(reply) => {
                apply_due(&cache, &mut pending, far_future()).await;
                for handle in rebuilds.drain(..) {
                    log_rebuild(handle.await);
                }
                let _ = reply.send(());
            }
            CacheCommand::Shutdown => break,
        }
    }

    for handle in rebuilds {
        handle.abort();
    }
    tracing::debug!("Cache worker stopped");
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400)
}

/// Parses every pending change due at or before `now`
async fn apply_due(
    cache: &Arc<WorkspaceCache>,
    pending: &mut HashMap<PathBuf, PendingChange>,
    now: Instant,
) {
    let due: Vec<PathBuf> = pending
        .iter()
        .filter(|(_, change)| change.due <= now)
        .map(|(path, _)| path.clone())
        .collect();
    for path in due {
        if let Some(change) = pending.remove(&path) {
            parse(cache, path, change.text).await;
        }
    }
}

async fn parse(cache: &Arc<WorkspaceCache>, path: PathBuf, text: String) {
    let cache = Arc::clone(cache);
    let result = tokio::task::spawn_blocking(move || {
        cache.update_file(&path, &text);
    })
    .await;
    if let Err(e) = result {
        tracing::error!("Parse task failed: {}", e);
    }
}

async fn reload(cache: &Arc<WorkspaceCache>, path: PathBuf) {
    let cache = Arc::clone(cache);
    let result = tokio::task::spawn_blocking(move || {
        cache.reload_from_disk(&path);
    })
    .await;
    if let Err(e) = result {
        tracing::error!("Reload task failed: {}", e);
    }
}

fn log_rebuild(result: Result<EngineResult<RebuildOutcome>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(outcome)) => tracing::debug!("Rebuild finished: {:?}", outcome),
        Ok(Err(e)) => tracing::error!("Rebuild failed: {}", e),
        Err(e) if e.is_cancelled() => {}
        Err(e) => tracing::error!("Rebuild task panicked: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use std::fs;
    use tempfile::TempDir;

    fn cache_with_debounce(debounce_ms: u64) -> Arc<WorkspaceCache> {
        Arc::new(WorkspaceCache::new(EngineConfig {
            debounce_ms,
            ..EngineConfig::default()
        }))
    }

    #[tokio::test]
    async fn test_changes_are_debounced_until_flush() {
        let cache = cache_with_debounce(60_000);
        let worker = spawn_cache_worker(Arc::clone(&cache));
        let path = PathBuf::from("/w/Модуль.bsl");

        worker.send(CacheCommand::Changed {
            path: path.clone(),
            text: "Процедура Первая()\nКонецПроцедуры".into(),
        });
        worker.send(CacheCommand::Changed {
            path: path.clone(),
            text: "Процедура Вторая()\nКонецПроцедуры".into(),
        });
        tokio::task::yield_now().await;
        assert!(cache.get_module_table(&path).is_none());

        worker.flush().await;
        let table = cache.get_module_table(&path).unwrap();
        assert!(table.method("Вторая").is_some());
        assert!(table.method("Первая").is_none());
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_debounce_elapses() {
        let cache = cache_with_debounce(10);
        let worker = spawn_cache_worker(Arc::clone(&cache));
        let path = PathBuf::from("/w/М.bsl");
        worker.send(CacheCommand::Changed {
            path: path.clone(),
            text: "Перем А;".into(),
        });
        for _ in 0..100 {
            if cache.get_module_table(&path).is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(cache.get_module_table(&path).is_some());
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_open_close_delete_and_rebuild() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Модуль.bsl");
        fs::write(&path, "Процедура СДиска()\nКонецПроцедуры").unwrap();

        let cache = cache_with_debounce(60_000);
        let worker = spawn_cache_worker(Arc::clone(&cache));

        worker.send(CacheCommand::Rebuild {
            root: Some(dir.path().to_path_buf()),
        });
        worker.flush().await;
        assert!(cache.get_module_table(&path).unwrap().method("СДиска").is_some());

        worker.send(CacheCommand::Opened {
            path: path.clone(),
            text: "Процедура ИзРедактора()\nКонецПроцедуры".into(),
        });
        worker.flush().await;
        assert!(cache.get_module_table(&path).unwrap().method("ИзРедактора").is_some());

        // закрытие без сохранения возвращает текст с диска
        worker.send(CacheCommand::Closed { path: path.clone() });
        worker.flush().await;
        assert!(cache.get_module_table(&path).unwrap().method("СДиска").is_some());

        worker.send(CacheCommand::Deleted { path: path.clone() });
        worker.flush().await;
        assert!(cache.get_module_table(&path).is_none());
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_save_applies_pending_change_immediately() {
        let cache = cache_with_debounce(60_000);
        let worker = spawn_cache_worker(Arc::clone(&cache));
        let path = PathBuf::from("/w/Сохранение.bsl");
        worker.send(CacheCommand::Changed {
            path: path.clone(),
            text: "Перем Сохранено;".into(),
        });
        worker.send(CacheCommand::Saved {
            path: path.clone(),
            text: None,
        });
        worker.flush().await;
        assert!(cache
            .get_module_table(&path)
            .unwrap()
            .module_variable("Сохранено")
            .is_some());
        worker.shutdown().await;
    }
}
