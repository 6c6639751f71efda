use super::models::{CreateSubscriptionDto, Subscription, UpdateSubscriptionDto};
use super::validation::{sanitize_text, validate_subscription, ValidatedSubscription};
use crate::shared::errors::{AppError, AppResult, FieldError};
use crate::shared::storage::{BackupManager, JsonDocument, ReadOutcome};
use chrono::{SecondsFormat, Utc};
use log::{error, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

/// サブスクリプションドキュメントのファイル名（拡張子なし）
pub const SUBSCRIPTIONS_BASENAME: &str = "subscriptions";

/// サブスクリプションの永続化ストア
///
/// `subscriptions.json` の唯一の書き手。ディスク上のドキュメントは常に
/// バリデーション済みレコードの配列になる。
pub struct SubscriptionStore {
    data_dir: PathBuf,
    document: JsonDocument,
    backups: Arc<BackupManager>,
    lock: Mutex<()>,
}

impl SubscriptionStore {
    /// 新しいストアを作成（ファイル操作は `initialize` まで行わない）
    ///
    /// # 引数
    /// * `data_dir` - データディレクトリ
    /// * `backups` - 共有のバックアップマネージャー
    pub fn new(data_dir: &Path, backups: Arc<BackupManager>) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            document: JsonDocument::new(data_dir, SUBSCRIPTIONS_BASENAME, backups.clone()),
            backups,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        self.document.path()
    }

    /// データディレクトリとドキュメントを準備する
    ///
    /// 何度呼んでも同じ結果になる。ドキュメントが存在しない・解析できない・配列でない場合は
    /// 空配列で作り直す。ディレクトリ作成や書き込みの失敗はそのまま返す。
    pub async fn initialize(&self) -> AppResult<()> {
        fs::create_dir_all(&self.data_dir).await?;
        fs::create_dir_all(self.backups.backup_dir()).await?;

        let _guard = self.lock.lock().await;
        let empty: Vec<Subscription> = Vec::new();
        if self.document.ensure(&empty, |value| value.is_array()).await? {
            info!("サブスクリプションデータを初期化しました: {:?}", self.path());
        }
        Ok(())
    }

    /// すべてのサブスクリプションを登録順で取得する
    ///
    /// ファイルが存在しない場合は空配列。破損している場合は最新の有効な
    /// バックアップから復旧し、それもなければ空配列を返す（エラーにはしない）。
    pub async fn read_all(&self) -> AppResult<Vec<Subscription>> {
        self.load().await
    }

    /// IDでサブスクリプションを取得する
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<Subscription>> {
        let records = self.load().await?;
        Ok(records.into_iter().find(|sub| sub.id == id))
    }

    /// ドキュメント全体を書き込む
    ///
    /// 各レコードを再検証し、IDの重複も拒否する。エラーは `[index].field` 形式で返す。
    pub async fn write_all(&self, records: &[Subscription]) -> AppResult<()> {
        let _guard = self.lock.lock().await;
        self.persist(records).await
    }

    /// サブスクリプションを追加する
    ///
    /// # 引数
    /// * `input` - 作成用DTO
    ///
    /// # 戻り値
    /// 作成されたサブスクリプション、またはバリデーションエラー
    pub async fn add(&self, input: CreateSubscriptionDto) -> AppResult<Subscription> {
        let validated = validate_subscription(&sanitize_dto(input))?;

        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;

        let now = current_timestamp();
        let subscription = build_record(Uuid::new_v4().to_string(), validated, now.clone(), now);
        records.push(subscription.clone());
        self.persist(&records).await?;

        info!(
            "サブスクリプションを追加しました: id={}, name={}",
            subscription.id, subscription.name
        );
        Ok(subscription)
    }

    /// サブスクリプションを部分更新する
    ///
    /// 既存値に部分データを重ねた結果を検証するため、部分更新で不正なレコードにはならない。
    /// `id` と `createdAt` は維持し、`updatedAt` を更新する。
    ///
    /// # 引数
    /// * `id` - サブスクリプションID
    /// * `data` - 部分更新データ
    ///
    /// # 戻り値
    /// 更新後のサブスクリプション、またはNotFound/バリデーションエラー
    pub async fn update(&self, id: &str, data: UpdateSubscriptionDto) -> AppResult<Subscription> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;

        let index = records
            .iter()
            .position(|sub| sub.id == id)
            .ok_or_else(|| subscription_not_found(id))?;

        // 既存値はサニタイズ済みなので、サニタイズするのは今回の部分データだけ
        let data = UpdateSubscriptionDto {
            name: data.name.map(|v| sanitize_text(&v)),
            platform: data.platform.map(|v| sanitize_text(&v)),
            payment_method: data.payment_method.map(|v| sanitize_text(&v)),
            ..data
        };
        let merged = data.merged_onto(CreateSubscriptionDto::from(&records[index]));
        let validated = validate_subscription(&merged)?;

        let existing = &records[index];
        let updated = build_record(
            existing.id.clone(),
            validated,
            existing.created_at.clone(),
            current_timestamp(),
        );
        records[index] = updated.clone();
        self.persist(&records).await?;

        info!("サブスクリプションを更新しました: id={id}");
        Ok(updated)
    }

    /// サブスクリプションを削除する
    pub async fn remove(&self, id: &str) -> AppResult<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;

        let index = records
            .iter()
            .position(|sub| sub.id == id)
            .ok_or_else(|| subscription_not_found(id))?;
        records.remove(index);
        self.persist(&records).await?;

        info!("サブスクリプションを削除しました: id={id}");
        Ok(())
    }

    async fn load(&self) -> AppResult<Vec<Subscription>> {
        match self.document.read::<Vec<Subscription>>().await? {
            ReadOutcome::Parsed(records) => Ok(records),
            ReadOutcome::Missing => Ok(Vec::new()),
            ReadOutcome::Corrupted(reason) => {
                error!("サブスクリプションデータが破損しています: {reason}");
                match self.document.recover_from_backup::<Vec<Subscription>>().await {
                    Some(records) => {
                        info!("バックアップから{}件のサブスクリプションを復旧しました", records.len());
                        Ok(records)
                    }
                    None => {
                        warn!("有効なバックアップがないため空のデータとして扱います");
                        Ok(Vec::new())
                    }
                }
            }
        }
    }

    /// ロックは呼び出し側で取得済みであること
    async fn persist(&self, records: &[Subscription]) -> AppResult<()> {
        check_records(records)?;
        self.document.write(records).await
    }
}

/// 自由入力のテキスト項目をエスケープする
fn sanitize_dto(input: CreateSubscriptionDto) -> CreateSubscriptionDto {
    CreateSubscriptionDto {
        name: input.name.map(|v| sanitize_text(&v)),
        platform: input.platform.map(|v| sanitize_text(&v)),
        payment_method: input.payment_method.map(|v| sanitize_text(&v)),
        ..input
    }
}

fn build_record(
    id: String,
    validated: ValidatedSubscription,
    created_at: String,
    updated_at: String,
) -> Subscription {
    Subscription {
        id,
        name: validated.name,
        platform: validated.platform,
        price: validated.price,
        currency: validated.currency,
        period: validated.period,
        next_payment_date: validated.next_payment_date,
        reminder_settings: validated.reminder_settings,
        color: validated.color,
        payment_method: validated.payment_method,
        created_at,
        updated_at,
    }
}

/// 書き込み前の全件チェック（不正なレコードをディスクに載せない）
fn check_records(records: &[Subscription]) -> AppResult<()> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (index, record) in records.iter().enumerate() {
        if record.id.trim().is_empty() {
            errors.push(FieldError::new(format!("[{index}].id"), "IDが空です"));
        } else if !seen.insert(record.id.as_str()) {
            errors.push(FieldError::new(
                format!("[{index}].id"),
                format!("IDが重複しています: {}", record.id),
            ));
        }

        if let Err(AppError::Validation(field_errors)) =
            validate_subscription(&CreateSubscriptionDto::from(record))
        {
            errors.extend(field_errors.into_iter().map(|e| FieldError {
                field: format!("[{index}].{}", e.field),
                message: e.message,
            }));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

fn subscription_not_found(id: &str) -> AppError {
    AppError::not_found(format!("ID {id} のサブスクリプション"))
}

fn current_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
