use crate::core::ledger::{GuildLedger, LedgerSnapshot, LedgerStore, StoreError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const CASES_FILE: &str = "cases.json";
const WARNINGS_FILE: &str = "warns.json";
const CONFIG_FILE: &str = "config.json";

/// JSON-backed ledger store. Each collection lives in its own file as a map
/// keyed by guild id:
/// cases.json  { guild_id: [Case] }
/// warns.json  { guild_id: { user_id: [Warning] } }
/// config.json { guild_id: GuildConfig }
pub struct JsonLedgerStore {
    dir: PathBuf,
    /// What is currently on disk. Held while writing so saves never interleave.
    committed: Mutex<LedgerSnapshot>,
}

impl JsonLedgerStore {
    /// Open (or create) the data directory and read all three collections.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let mut snapshot = LedgerSnapshot {
            cases: load_collection(&dir.join(CASES_FILE)).await?,
            warnings: load_collection(&dir.join(WARNINGS_FILE)).await?,
            config: load_collection(&dir.join(CONFIG_FILE)).await?,
        };

        // A lost cases.json leaves warnings pointing at nothing.
        for dangling in snapshot.prune_dangling_warnings() {
            tracing::warn!(
                guild_id = dangling.guild_id,
                user_id = dangling.user_id,
                case_id = dangling.case_id,
                "Dropping warning without a matching warn case"
            );
        }

        tracing::debug!(
            path = %dir.display(),
            guilds = snapshot.guild_ids().len(),
            "Opened ledger data directory"
        );

        Ok(Self {
            dir,
            committed: Mutex::new(snapshot),
        })
    }

    async fn write_all(&self, snapshot: &LedgerSnapshot) -> Result<(), StoreError> {
        let staged = self.stage_all(snapshot).await?;
        swap_all(&staged).await
    }

    /// Write every collection to its `.tmp` sibling. Nothing real is touched
    /// until all three are on disk.
    async fn stage_all(&self, snapshot: &LedgerSnapshot) -> Result<Vec<Staged>, StoreError> {
        let collections = [
            (CASES_FILE, serde_json::to_vec_pretty(&snapshot.cases)?),
            (WARNINGS_FILE, serde_json::to_vec_pretty(&snapshot.warnings)?),
            (CONFIG_FILE, serde_json::to_vec_pretty(&snapshot.config)?),
        ];

        let mut staged: Vec<Staged> = Vec::with_capacity(collections.len());
        for (name, bytes) in collections {
            let path = self.dir.join(name);
            let tmp = sibling(&path, "tmp");
            if let Err(e) = tokio::fs::write(&tmp, bytes).await {
                for file in &staged {
                    let _ = tokio::fs::remove_file(&file.tmp).await;
                }
                return Err(e.into());
            }
            staged.push(Staged { tmp, path });
        }
        Ok(staged)
    }
}

/// A collection written to `tmp`, waiting to be renamed over `path`.
struct Staged {
    tmp: PathBuf,
    path: PathBuf,
}

/// Missing file -> empty collection. Unparseable file -> moved aside to
/// `<name>.corrupt` and treated as empty. Any other read error is returned.
async fn load_collection<T>(path: &Path) -> Result<T, StoreError>
where
    T: DeserializeOwned + Default,
{
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_str(&raw) {
        Ok(collection) => Ok(collection),
        Err(e) => {
            let backup = sibling(path, "corrupt");
            tracing::warn!(
                path = %path.display(),
                backup = %backup.display(),
                error = %e,
                "Ledger collection is malformed; starting it empty"
            );
            if let Err(rename_err) = tokio::fs::rename(path, &backup).await {
                tracing::warn!(
                    path = %path.display(),
                    error = %rename_err,
                    "Could not move malformed collection aside"
                );
            }
            Ok(T::default())
        }
    }
}

async fn swap_all(staged: &[Staged]) -> Result<(), StoreError> {
    for file in staged {
        tokio::fs::rename(&file.tmp, &file.path).await?;
    }
    Ok(())
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

#[async_trait]
impl LedgerStore for JsonLedgerStore {
    async fn load(&self) -> Result<LedgerSnapshot, StoreError> {
        Ok(self.committed.lock().await.clone())
    }

    async fn save_guild(&self, guild_id: u64, ledger: &GuildLedger) -> Result<(), StoreError> {
        let mut committed = self.committed.lock().await;
        let previous = committed.guild(guild_id);
        committed.put_guild(guild_id, ledger.clone());

        let staged = match self.stage_all(&committed).await {
            Ok(staged) => staged,
            Err(e) => {
                // Nothing was renamed, so the files still hold `previous`.
                committed.put_guild(guild_id, previous);
                return Err(e);
            }
        };

        if let Err(e) = swap_all(&staged).await {
            // Some files may already hold the new state. Put the old snapshot
            // back so a reload sees the three collections agree.
            committed.put_guild(guild_id, previous);
            if let Err(restore_err) = self.write_all(&committed).await {
                tracing::error!(
                    guild_id,
                    error = %restore_err,
                    "Could not restore ledger files after a failed write"
                );
            }
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ledger::{CaseAction, GuildStateStore, LedgerError, RetryPolicy};
    use chrono::Utc;
    use std::time::Duration;
    use tempfile::tempdir;

    fn sample_ledger() -> GuildLedger {
        let mut ledger = GuildLedger::default();
        let case = ledger.append_case(CaseAction::Warn, 10, 2, Some("spam"), Utc::now());
        ledger
            .add_warning(10, case.case_id, &case.reason, 2, case.created_at)
            .unwrap();
        ledger.append_case(
            CaseAction::Clear {
                channel_id: 77,
                message_count: 15,
            },
            0,
            2,
            None,
            Utc::now(),
        );
        ledger.grant(300, "warn").unwrap();
        ledger.set_log_channel(55);
        ledger
    }

    #[tokio::test]
    async fn test_missing_files_load_empty() {
        let dir = tempdir().unwrap();
        let store = JsonLedgerStore::open(dir.path().join("nested")).await.unwrap();
        assert_eq!(store.load().await.unwrap(), LedgerSnapshot::default());
    }

    #[tokio::test]
    async fn test_saved_guilds_survive_reopen() {
        let dir = tempdir().unwrap();
        let store = JsonLedgerStore::open(dir.path()).await.unwrap();

        let ledger = sample_ledger();
        store.save_guild(1, &ledger).await.unwrap();
        let mut other = GuildLedger::default();
        other.set_report_channel(9);
        store.save_guild(2, &other).await.unwrap();

        let reopened = JsonLedgerStore::open(dir.path()).await.unwrap();
        let snapshot = reopened.load().await.unwrap();
        assert_eq!(snapshot, store.load().await.unwrap());
        assert_eq!(snapshot.guild(1), ledger);
        assert_eq!(snapshot.guild(2), other);

        assert!(!dir.path().join("cases.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_files_use_guild_keyed_layout() {
        let dir = tempdir().unwrap();
        let store = JsonLedgerStore::open(dir.path()).await.unwrap();
        store.save_guild(1, &sample_ledger()).await.unwrap();

        let read = |name: &str| -> serde_json::Value {
            let raw = std::fs::read_to_string(dir.path().join(name)).unwrap();
            serde_json::from_str(&raw).unwrap()
        };

        let cases = read("cases.json");
        assert_eq!(cases["1"][0]["kind"], "warn");
        assert_eq!(cases["1"][1]["kind"], "clear");
        assert_eq!(cases["1"][1]["message_count"], 15);

        let warns = read("warns.json");
        assert_eq!(warns["1"]["10"][0]["case_id"], 1);

        let config = read("config.json");
        assert_eq!(config["1"]["log_channel_id"], 55);
        assert_eq!(config["1"]["permissions"]["300"][0], "warn");
    }

    #[tokio::test]
    async fn test_malformed_collection_is_moved_aside() {
        let dir = tempdir().unwrap();
        {
            let store = JsonLedgerStore::open(dir.path()).await.unwrap();
            store.save_guild(1, &sample_ledger()).await.unwrap();
        }
        std::fs::write(dir.path().join("cases.json"), "{ not json").unwrap();

        let store = JsonLedgerStore::open(dir.path()).await.unwrap();
        let snapshot = store.load().await.unwrap();

        assert!(snapshot.cases.is_empty());
        // The warning lost its case along with cases.json.
        assert!(snapshot.warnings.is_empty());
        assert_eq!(snapshot.config[&1].log_channel_id, Some(55));

        let backup = std::fs::read_to_string(dir.path().join("cases.json.corrupt")).unwrap();
        assert_eq!(backup, "{ not json");
        assert!(!dir.path().join("cases.json").exists());
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_snapshot() {
        let dir = tempdir().unwrap();
        let store = JsonLedgerStore::open(dir.path()).await.unwrap();
        let mut first = GuildLedger::default();
        first.set_log_channel(1);
        store.save_guild(1, &first).await.unwrap();

        // A directory where the temp file should go makes the write fail.
        std::fs::create_dir(dir.path().join("cases.json.tmp")).unwrap();

        let err = store.save_guild(1, &sample_ledger()).await;
        assert!(matches!(err, Err(StoreError::Io(_))));
        assert_eq!(store.load().await.unwrap().guild(1), first);
    }

    #[tokio::test]
    async fn test_failed_second_collection_leaves_files_consistent() {
        let dir = tempdir().unwrap();
        let ledger = {
            let store = JsonLedgerStore::open(dir.path()).await.unwrap();
            let ledger = GuildStateStore::new(store, RetryPolicy::new(2, Duration::ZERO))
                .await
                .unwrap();
            ledger
                .warn(1, 10, 2, Some("spam".to_string()))
                .await
                .unwrap();
            ledger
        };

        // warns.json can't be staged, cases.json can.
        std::fs::create_dir(dir.path().join("warns.json.tmp")).unwrap();

        let err = ledger.remove_warning(1, 10, 1).await.unwrap_err();
        assert!(matches!(err, LedgerError::Persistence { attempts: 2, .. }));
        assert!(ledger.get_case(1, 1).await.unwrap().active);
        assert_eq!(ledger.list_warnings(1, 10).await.len(), 1);

        std::fs::remove_dir(dir.path().join("warns.json.tmp")).unwrap();
        assert!(!dir.path().join("cases.json.tmp").exists());

        let reopened = GuildStateStore::new(
            JsonLedgerStore::open(dir.path()).await.unwrap(),
            RetryPolicy::new(1, Duration::ZERO),
        )
        .await
        .unwrap();
        assert!(reopened.get_case(1, 1).await.unwrap().active);
        assert_eq!(reopened.list_warnings(1, 10).await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_rename_restores_earlier_files() {
        let dir = tempdir().unwrap();
        let store = JsonLedgerStore::open(dir.path()).await.unwrap();
        let before = sample_ledger();
        store.save_guild(1, &before).await.unwrap();

        // cases.json gets renamed into place, warns.json can't be.
        std::fs::remove_file(dir.path().join("warns.json")).unwrap();
        std::fs::create_dir(dir.path().join("warns.json")).unwrap();

        let mut after = before.clone();
        after.remove_warning(10, 1);
        after.set_active(1, false);
        assert!(store.save_guild(1, &after).await.is_err());

        assert_eq!(store.load().await.unwrap().guild(1), before);
        let raw = std::fs::read_to_string(dir.path().join("cases.json")).unwrap();
        let cases: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(cases["1"][0]["active"], true);
    }

    #[tokio::test]
    async fn test_warn_after_losing_cases_starts_clean() {
        let dir = tempdir().unwrap();
        {
            let store = JsonLedgerStore::open(dir.path()).await.unwrap();
            store.save_guild(1, &sample_ledger()).await.unwrap();
        }
        std::fs::write(dir.path().join("cases.json"), "[").unwrap();

        let ledger = GuildStateStore::new(
            JsonLedgerStore::open(dir.path()).await.unwrap(),
            RetryPolicy::new(1, Duration::ZERO),
        )
        .await
        .unwrap();
        assert!(ledger.list_warnings(1, 10).await.is_empty());

        let receipt = ledger
            .warn(1, 10, 2, Some("again".to_string()))
            .await
            .unwrap();
        assert_eq!(receipt.case.case_id, 1);
        assert_eq!(receipt.warn_count, 1);
    }
}
