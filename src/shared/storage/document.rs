use super::backup::BackupManager;
use crate::shared::errors::{AppError, AppResult};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use uuid::Uuid;

/// ドキュメント読み込みの結果
#[derive(Debug)]
pub enum ReadOutcome<T> {
    /// ファイルが存在しない
    Missing,
    /// 正常に解析できた
    Parsed(T),
    /// ファイルはあるが解析できない（破損）
    Corrupted(String),
}

/// JSONファイル1つ分の永続化（アトミック書き込み＋バックアップ）
pub struct JsonDocument {
    path: PathBuf,
    basename: String,
    backups: Arc<BackupManager>,
}

impl JsonDocument {
    /// データディレクトリ内の `<basename>.json` を対象にする
    pub fn new(data_dir: &Path, basename: &str, backups: Arc<BackupManager>) -> Self {
        Self {
            path: data_dir.join(format!("{basename}.json")),
            basename: basename.to_string(),
            backups,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn basename(&self) -> &str {
        &self.basename
    }

    /// ドキュメントを読み込む
    ///
    /// 存在しない場合と破損している場合はエラーにせず、結果の種類で返す。
    /// それ以外のI/Oエラーはそのまま返す。
    pub async fn read<T: DeserializeOwned>(&self) -> AppResult<ReadOutcome<T>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ReadOutcome::Missing),
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Ok(ReadOutcome::Corrupted(e.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&content) {
            Ok(value) => Ok(ReadOutcome::Parsed(value)),
            Err(e) => Ok(ReadOutcome::Corrupted(e.to_string())),
        }
    }

    /// ドキュメントを書き込む
    ///
    /// # 処理内容
    /// 1. 現在のファイルをバックアップ（失敗しても続行）
    /// 2. 一時ファイルに書いてからリネーム
    /// 3. 保持数を超えた古いバックアップを削除
    pub async fn write<T: Serialize + ?Sized>(&self, value: &T) -> AppResult<()> {
        self.backups.create_backup(&self.path).await;
        write_json_atomic(&self.path, value).await?;
        self.backups.cleanup_old_backups(&self.basename).await;
        Ok(())
    }

    /// ファイルが存在し、期待する形のJSONであることを保証する
    ///
    /// 存在しない・解析できない・形が違う場合はデフォルト値で作り直す（バックアップなし）。
    ///
    /// # 戻り値
    /// デフォルト値を書き込んだ場合はtrue
    pub async fn ensure<T, F>(&self, default: &T, has_expected_shape: F) -> AppResult<bool>
    where
        T: Serialize + ?Sized,
        F: Fn(&serde_json::Value) -> bool,
    {
        match self.read::<serde_json::Value>().await? {
            ReadOutcome::Parsed(value) if has_expected_shape(&value) => return Ok(false),
            ReadOutcome::Parsed(_) => {
                warn!("{}の形式が想定と異なるため初期化します", self.basename);
            }
            ReadOutcome::Corrupted(reason) => {
                warn!("{}が破損しているため初期化します: {reason}", self.basename);
            }
            ReadOutcome::Missing => {
                debug!("{}が存在しないため作成します", self.basename);
            }
        }

        write_json_atomic(&self.path, default).await?;
        Ok(true)
    }

    /// 最新の有効なバックアップから内容を復旧する
    pub async fn recover_from_backup<T: DeserializeOwned>(&self) -> Option<T> {
        self.backups.recover_latest(&self.basename).await
    }
}

/// JSONを整形して一時ファイルに書き込み、対象パスへリネームする
///
/// 書き込み途中で失敗しても既存のファイルは置き換わらない。
pub async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> AppResult<()> {
    let content = serde_json::to_string_pretty(value)?;

    let dir = path
        .parent()
        .ok_or_else(|| AppError::configuration(format!("親ディレクトリがありません: {path:?}")))?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    let tmp_path = dir.join(format!(".{stem}-{}.tmp", Uuid::new_v4()));

    if let Err(e) = fs::write(&tmp_path, content).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e.into());
    }

    Ok(())
}
