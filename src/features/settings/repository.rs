use super::models::SettingsDocument;
use crate::shared::errors::AppResult;
use crate::shared::storage::{write_json_atomic, BackupManager, JsonDocument, ReadOutcome};
use log::{info, warn};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// 設定ドキュメント1つ分のストア
///
/// 存在しない・破損している場合はデフォルト値で作り直す（バックアップからの復旧はしない）。
pub struct SettingsStore<T: SettingsDocument> {
    document: JsonDocument,
    lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: SettingsDocument> SettingsStore<T> {
    pub fn new(data_dir: &Path, backups: Arc<BackupManager>) -> Self {
        Self {
            document: JsonDocument::new(data_dir, T::BASENAME, backups),
            lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        self.document.path()
    }

    /// 設定ファイルが読める状態であることを保証する
    ///
    /// データディレクトリは作成済みであること。
    pub async fn initialize(&self) -> AppResult<()> {
        let _guard = self.lock.lock().await;
        let written = self
            .document
            .ensure(&T::defaults(), |value| {
                serde_json::from_value::<T>(value.clone()).is_ok()
            })
            .await?;
        if written {
            info!("{}をデフォルト値で作成しました", T::BASENAME);
        }
        Ok(())
    }

    /// 設定を読み込む
    ///
    /// # 戻り値
    /// 保存されている設定。存在しない・破損している場合はデフォルト値を書き込んで返す
    pub async fn read(&self) -> AppResult<T> {
        let _guard = self.lock.lock().await;
        match self.document.read::<T>().await? {
            ReadOutcome::Parsed(value) => Ok(value),
            ReadOutcome::Missing => self.reset_to_defaults().await,
            ReadOutcome::Corrupted(reason) => {
                warn!("{}が破損しているためデフォルト値に戻します: {reason}", T::BASENAME);
                self.reset_to_defaults().await
            }
        }
    }

    /// 設定を書き込む（バックアップを取ってから上書き）
    ///
    /// # 戻り値
    /// 書き込んだ設定、またはバリデーションエラー
    pub async fn write(&self, value: T) -> AppResult<T> {
        value.validate()?;

        let _guard = self.lock.lock().await;
        self.document.write(&value).await?;
        info!("{}を保存しました", T::BASENAME);
        Ok(value)
    }

    async fn reset_to_defaults(&self) -> AppResult<T> {
        let defaults = T::defaults();
        write_json_atomic(self.document.path(), &defaults).await?;
        Ok(defaults)
    }
}
