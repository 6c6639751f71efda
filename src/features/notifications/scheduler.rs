use super::dispatcher::{reminder_body, reminder_title, Notifier};
use super::models::{days_until, ReminderOutcome, ReminderRepeat, ReminderState, ReminderTimezone};
use crate::features::subscriptions::models::ReminderSettings;
use crate::features::subscriptions::repository::SubscriptionStore;
use crate::features::subscriptions::validation::{parse_payment_date, parse_reminder_time};
use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use futures::FutureExt;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// 登録中のジョブ（実行時のみ、永続化しない）
struct ScheduledJob {
    settings: ReminderSettings,
    token: CancellationToken,
}

/// トリガーの評価に必要なものをまとめたもの（各ジョブのタスクと共有）
struct TriggerContext {
    store: Arc<SubscriptionStore>,
    notifier: Arc<dyn Notifier>,
    repeat: ReminderRepeat,
    /// サブスクリプションID → 最後に通知した支払い日
    last_notified: Mutex<HashMap<String, String>>,
}

/// サブスクリプションごとに毎日のリマインダーを管理するスケジューラー
///
/// ジョブはサブスクリプションIDごとに最大1つ。トリガーのたびにストアから
/// 最新の状態を読み直すため、削除・編集されたサブスクリプションにも対応できる。
pub struct ReminderScheduler {
    context: Arc<TriggerContext>,
    timezone: ReminderTimezone,
    jobs: Mutex<HashMap<String, ScheduledJob>>,
}

impl ReminderScheduler {
    /// 新しいスケジューラーを作成
    ///
    /// # 引数
    /// * `store` - サブスクリプションストア
    /// * `notifier` - 通知の送信先
    /// * `timezone` - リマインダー時刻を解釈するタイムゾーン
    /// * `repeat` - 期限が近い間の通知の繰り返し方
    pub fn new(
        store: Arc<SubscriptionStore>,
        notifier: Arc<dyn Notifier>,
        timezone: ReminderTimezone,
        repeat: ReminderRepeat,
    ) -> Self {
        Self {
            context: Arc::new(TriggerContext {
                store,
                notifier,
                repeat,
                last_notified: Mutex::new(HashMap::new()),
            }),
            timezone,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// リマインダーを登録する
    ///
    /// 同じIDの既存ジョブは先に取り消すので、ジョブは常に1つになる。
    /// tokioランタイムの中から呼ぶ必要がある。
    ///
    /// # 引数
    /// * `id` - サブスクリプションID
    /// * `settings` - リマインダー設定（通知日数と時刻）
    ///
    /// # 戻り値
    /// 成功時はOk、設定が不正な場合やランタイム外の場合はエラー
    pub fn schedule_reminder(&self, id: &str, settings: &ReminderSettings) -> AppResult<()> {
        let time = parse_reminder_time(&settings.time).ok_or_else(|| {
            AppError::validation("reminderSettings", "通知時刻はHH:MM形式で入力してください")
        })?;
        if settings.days_before < 0 {
            return Err(AppError::validation(
                "reminderSettings",
                "通知日数は0以上である必要があります",
            ));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            AppError::concurrency("非同期ランタイムの外ではリマインダーを登録できません")
        })?;

        let token = CancellationToken::new();
        let mut jobs = self.lock_jobs();
        if let Some(previous) = jobs.remove(id) {
            previous.token.cancel();
            debug!("既存のリマインダーを置き換えます: id={id}");
        }

        runtime.spawn(run_job(
            self.context.clone(),
            self.timezone,
            id.to_string(),
            settings.clone(),
            time,
            token.clone(),
        ));
        jobs.insert(
            id.to_string(),
            ScheduledJob {
                settings: settings.clone(),
                token,
            },
        );

        info!(
            "リマインダーを登録しました: id={id}, 毎日{}, {}日前から",
            settings.time, settings.days_before
        );
        Ok(())
    }

    /// リマインダーを取り消す（未登録なら何もしない）
    ///
    /// # 戻り値
    /// ジョブが存在した場合はtrue
    pub fn cancel_reminder(&self, id: &str) -> bool {
        let removed = self.lock_jobs().remove(id);
        self.lock_last_notified().remove(id);

        match removed {
            Some(job) => {
                job.token.cancel();
                info!("リマインダーを取り消しました: id={id}");
                true
            }
            None => false,
        }
    }

    /// 起動時にストアの内容からジョブを登録し直す
    ///
    /// # 戻り値
    /// 登録したジョブの数
    pub async fn initialize_from_store(&self) -> AppResult<usize> {
        let subscriptions = self.context.store.read_all().await?;

        let mut scheduled = 0;
        for subscription in &subscriptions {
            let Some(reminder) = subscription.active_reminder() else {
                continue;
            };
            match self.schedule_reminder(&subscription.id, reminder) {
                Ok(()) => scheduled += 1,
                Err(e) => warn!(
                    "リマインダーを復元できませんでした: id={}: {e}",
                    subscription.id
                ),
            }
        }

        info!("リマインダーを復元しました: {scheduled}件");
        Ok(scheduled)
    }

    /// すべてのジョブを停止する
    pub fn shutdown(&self) {
        let jobs: Vec<ScheduledJob> = self.lock_jobs().drain().map(|(_, job)| job).collect();
        for job in &jobs {
            job.token.cancel();
        }
        self.lock_last_notified().clear();
        info!("リマインダースケジューラーを停止しました: {}件のジョブを取り消し", jobs.len());
    }

    pub fn state(&self, id: &str) -> ReminderState {
        if self.lock_jobs().contains_key(id) {
            ReminderState::Scheduled
        } else {
            ReminderState::Unscheduled
        }
    }

    pub fn active_job_count(&self) -> usize {
        self.lock_jobs().len()
    }

    /// 登録済みジョブのトリガーを今すぐ1回評価する
    pub async fn fire_reminder(&self, id: &str) -> AppResult<ReminderOutcome> {
        self.fire_reminder_at(id, Utc::now()).await
    }

    /// 指定した時刻としてトリガーを評価する
    pub async fn fire_reminder_at(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<ReminderOutcome> {
        let settings = self.lock_jobs().get(id).map(|job| job.settings.clone());
        match settings {
            Some(settings) => self.context.evaluate(id, &settings, now).await,
            None => Ok(ReminderOutcome::NotScheduled),
        }
    }

    #[cfg(test)]
    fn job_token(&self, id: &str) -> Option<CancellationToken> {
        self.lock_jobs().get(id).map(|job| job.token.clone())
    }

    fn lock_jobs(&self) -> MutexGuard<'_, HashMap<String, ScheduledJob>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_last_notified(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.context.lock_last_notified()
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        for job in self.lock_jobs().values() {
            job.token.cancel();
        }
    }
}

impl TriggerContext {
    /// 最新のサブスクリプションを読み直し、通知するかどうかを決める
    async fn evaluate(
        &self,
        id: &str,
        settings: &ReminderSettings,
        now: DateTime<Utc>,
    ) -> AppResult<ReminderOutcome> {
        let Some(subscription) = self.store.find_by_id(id).await? else {
            debug!("サブスクリプションが削除済みのため通知しません: id={id}");
            return Ok(ReminderOutcome::Missing);
        };

        let payment = parse_payment_date(&subscription.next_payment_date).ok_or_else(|| {
            AppError::validation("nextPaymentDate", "次回支払い日を解析できません")
        })?;
        let days_until = days_until(payment, now);

        if days_until < 0 || days_until > settings.days_before {
            return Ok(ReminderOutcome::NotDue { days_until });
        }

        if self.repeat == ReminderRepeat::OncePerCycle {
            let mut last_notified = self.lock_last_notified();
            if last_notified.get(id) == Some(&subscription.next_payment_date) {
                return Ok(ReminderOutcome::AlreadyNotified);
            }
            last_notified.insert(id.to_string(), subscription.next_payment_date.clone());
        }

        self.notifier.notify(
            &reminder_title(&subscription.name),
            &reminder_body(&subscription.name, days_until),
        );
        info!("リマインダーを通知しました: id={id}, あと{days_until}日");
        Ok(ReminderOutcome::Notified { days_until })
    }

    fn lock_last_notified(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.last_notified
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// トリガーを1回実行する
///
/// エラーもパニックもここで止めてログに残し、ジョブは次回も動き続ける。
async fn run_trigger(
    context: &TriggerContext,
    id: &str,
    settings: &ReminderSettings,
    now: DateTime<Utc>,
) -> Option<ReminderOutcome> {
    match AssertUnwindSafe(context.evaluate(id, settings, now))
        .catch_unwind()
        .await
    {
        Ok(Ok(outcome)) => {
            debug!("リマインダーを評価しました: id={id}, {outcome:?}");
            Some(outcome)
        }
        Ok(Err(e)) => {
            error!("リマインダーの評価に失敗しました: id={id}: {e}");
            None
        }
        Err(_) => {
            error!("リマインダーの評価中にパニックが発生しました: id={id}");
            None
        }
    }
}

/// 毎日 `time` に起きてトリガーを実行するジョブ本体
async fn run_job(
    context: Arc<TriggerContext>,
    timezone: ReminderTimezone,
    id: String,
    settings: ReminderSettings,
    time: NaiveTime,
    token: CancellationToken,
) {
    let mut after = Utc::now();

    loop {
        let Some(next) = timezone.next_trigger_after(time, after) else {
            error!("次のトリガー時刻を計算できません: id={id}, time={time}");
            break;
        };
        let wait = (next - Utc::now()).to_std().unwrap_or_default();

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        run_trigger(&context, &id, &settings, Utc::now()).await;

        // 同じトリガー時刻で二重に起きないよう、次の計算は少し後ろから
        after = next + Duration::seconds(1);
    }

    debug!("リマインダージョブを終了しました: id={id}");
}
