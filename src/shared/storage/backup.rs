use crate::shared::errors::AppResult;
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Timelike, Utc};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;

/// バックアップファイル名のタイムスタンプ形式（固定幅・コロンなし）
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S-%6fZ";

static TIMESTAMP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2}T\d{2}-\d{2}-\d{2})-(\d{6})Z$")
        .expect("バックアップ名の正規表現は固定値")
});

/// バックアップファイル1件の情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    /// バックアップファイルのパス
    pub path: PathBuf,
    /// ファイル名から取得した作成日時
    pub created_at: DateTime<Utc>,
}

/// ドキュメント単位のバックアップ作成・世代管理・復旧
///
/// 作成したタイムスタンプは同一マネージャー内で狭義単調増加になるよう補正する。
/// ファイル名の辞書順と作成順が一致しなくても、並び替えは解析した日時で行う。
pub struct BackupManager {
    backup_dir: PathBuf,
    retention: usize,
    last_stamp: Mutex<Option<DateTime<Utc>>>,
}

impl BackupManager {
    /// 新しいバックアップマネージャーを作成
    ///
    /// # 引数
    /// * `backup_dir` - バックアップディレクトリ
    /// * `retention` - ドキュメントごとの保持数（最低1）
    pub fn new(backup_dir: PathBuf, retention: usize) -> Self {
        Self {
            backup_dir,
            retention: retention.max(1),
            last_stamp: Mutex::new(None),
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    /// 現在のドキュメントをバックアップする（ベストエフォート）
    ///
    /// 失敗してもエラーは返さず、ログに記録するだけ。元ファイルが存在しない場合は何もしない。
    ///
    /// # 戻り値
    /// 作成したバックアップのパス
    pub async fn create_backup(&self, source: &Path) -> Option<PathBuf> {
        match self.try_create_backup(source).await {
            Ok(path) => path,
            Err(e) => {
                warn!("バックアップの作成に失敗しました（処理は続行します）: {source:?}: {e}");
                None
            }
        }
    }

    async fn try_create_backup(&self, source: &Path) -> AppResult<Option<PathBuf>> {
        let Some(basename) = document_basename(source) else {
            warn!("バックアップ対象のファイル名を解釈できません: {source:?}");
            return Ok(None);
        };

        fs::create_dir_all(&self.backup_dir).await?;

        let stamp = self.next_stamp();
        let backup_path = self.backup_dir.join(backup_file_name(&basename, &stamp));

        match fs::copy(source, &backup_path).await {
            Ok(_) => {
                debug!("バックアップを作成しました: {backup_path:?}");
                Ok(Some(backup_path))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 指定ドキュメントのバックアップ一覧を新しい順で取得
    pub async fn list_backups(&self, basename: &str) -> AppResult<Vec<BackupEntry>> {
        let mut entries = match fs::read_dir(&self.backup_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut backups = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(created_at) = parse_backup_file_name(basename, file_name) {
                backups.push(BackupEntry {
                    path: entry.path(),
                    created_at,
                });
            }
        }

        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(backups)
    }

    /// 保持数を超えた古いバックアップを削除する
    ///
    /// # 戻り値
    /// 削除したファイル数
    pub async fn cleanup_old_backups(&self, basename: &str) -> usize {
        let backups = match self.list_backups(basename).await {
            Ok(backups) => backups,
            Err(e) => {
                warn!("古いバックアップの一覧取得に失敗しました: {basename}: {e}");
                return 0;
            }
        };

        let mut removed = 0;
        for backup in backups.iter().skip(self.retention) {
            match fs::remove_file(&backup.path).await {
                Ok(_) => removed += 1,
                Err(e) => warn!("古いバックアップの削除に失敗しました: {:?}: {e}", backup.path),
            }
        }

        if removed > 0 {
            debug!("古いバックアップを削除しました: {basename} ({removed}件)");
        }
        removed
    }

    /// 新しい順に走査し、最初に解析できたバックアップの内容を返す
    pub async fn recover_latest<T: DeserializeOwned>(&self, basename: &str) -> Option<T> {
        let backups = match self.list_backups(basename).await {
            Ok(backups) => backups,
            Err(e) => {
                warn!("バックアップからの復旧に失敗しました: {basename}: {e}");
                return None;
            }
        };

        for backup in backups {
            let content = match fs::read_to_string(&backup.path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!("バックアップを読み込めません: {:?}: {e}", backup.path);
                    continue;
                }
            };

            match serde_json::from_str::<T>(&content) {
                Ok(value) => {
                    info!("バックアップからデータを復旧しました: {:?}", backup.path);
                    return Some(value);
                }
                Err(e) => {
                    warn!("バックアップが破損しているため次を試します: {:?}: {e}", backup.path);
                }
            }
        }

        None
    }

    /// 単調増加するマイクロ秒精度のタイムスタンプを払い出す
    fn next_stamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        let now = now
            .with_nanosecond(now.nanosecond() / 1_000 * 1_000)
            .unwrap_or(now);

        let mut last = self
            .last_stamp
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let stamp = match *last {
            Some(previous) if now <= previous => previous + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(stamp);
        stamp
    }
}

/// `subscriptions.json` → `subscriptions`
pub fn document_basename(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.to_string())
}

/// `<basename>_<timestamp>.json` 形式のファイル名を生成
pub fn backup_file_name(basename: &str, stamp: &DateTime<Utc>) -> String {
    format!("{basename}_{}.json", stamp.format(TIMESTAMP_FORMAT))
}

/// バックアップファイル名を解析し、作成日時を返す
///
/// 別ドキュメントのバックアップや形式外のファイルはNone
pub fn parse_backup_file_name(basename: &str, file_name: &str) -> Option<DateTime<Utc>> {
    let stamp = file_name
        .strip_prefix(basename)?
        .strip_prefix('_')?
        .strip_suffix(".json")?;

    let captures = TIMESTAMP_PATTERN.captures(stamp)?;
    let naive = NaiveDateTime::parse_from_str(&captures[1], "%Y-%m-%dT%H-%M-%S").ok()?;
    let micros: u32 = captures[2].parse().ok()?;
    let naive = naive.with_nanosecond(micros * 1_000)?;

    Some(Utc.from_utc_datetime(&naive))
}
