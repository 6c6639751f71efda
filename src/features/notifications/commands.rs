use super::dispatcher::{TEST_NOTIFICATION_BODY, TEST_NOTIFICATION_TITLE};
use super::models::{ReminderOutcome, ReminderState};
use crate::features::subscriptions::models::CommandAck;
use crate::shared::errors::AppResult;
use crate::AppState;
use log::info;
use serde::Serialize;

/// リマインダーの状態（確認用）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderStatus {
    pub id: String,
    pub state: ReminderState,
    pub active_jobs: usize,
}

/// 固定のテスト通知を送る
pub async fn trigger_test_notification(state: &AppState) -> AppResult<CommandAck> {
    info!("テスト通知を送信します");
    state
        .notifier
        .notify(TEST_NOTIFICATION_TITLE, TEST_NOTIFICATION_BODY);
    Ok(CommandAck::ok())
}

/// サブスクリプションのリマインダー状態を取得する
pub async fn get_reminder_status(state: &AppState, id: &str) -> AppResult<ReminderStatus> {
    Ok(ReminderStatus {
        id: id.to_string(),
        state: state.scheduler.state(id),
        active_jobs: state.scheduler.active_job_count(),
    })
}

/// リマインダーのトリガーを今すぐ1回評価する
pub async fn simulate_reminder(state: &AppState, id: &str) -> AppResult<ReminderOutcome> {
    state.scheduler.fire_reminder(id).await
}
