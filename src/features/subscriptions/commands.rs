use super::models::{
    CalendarEvent, CalendarRange, CommandAck, CreateSubscriptionDto, Subscription,
    UpdateSubscriptionRequest,
};
use super::validation::parse_payment_date;
use crate::shared::errors::{AppError, AppResult, FieldError};
use crate::AppState;
use log::{info, warn};

/// サブスクリプション一覧を登録順で取得する
pub async fn get_subscriptions(state: &AppState) -> AppResult<Vec<Subscription>> {
    state.subscriptions.read_all().await
}

/// サブスクリプションを追加する
///
/// リマインダーが有効な場合はスケジュールも登録する。スケジュール登録の失敗は
/// ログに残すだけで、追加自体は成功として返す。
///
/// # 引数
/// * `state` - アプリケーション状態
/// * `dto` - サブスクリプション作成用DTO
///
/// # 戻り値
/// 作成されたサブスクリプション、またはバリデーションエラー
pub async fn add_subscription(
    state: &AppState,
    dto: CreateSubscriptionDto,
) -> AppResult<Subscription> {
    let created = state.subscriptions.add(dto).await?;

    if let Some(reminder) = created.active_reminder() {
        if let Err(e) = state.scheduler.schedule_reminder(&created.id, reminder) {
            warn!("リマインダーの登録に失敗しました: id={}: {e}", created.id);
        }
    }

    Ok(created)
}

/// サブスクリプションを更新する
///
/// 入力に `reminderSettings` が含まれる場合だけ、既存のジョブを取り消して登録し直す。
///
/// # 引数
/// * `state` - アプリケーション状態
/// * `request` - `{id, data}`
///
/// # 戻り値
/// 更新後のサブスクリプション、またはNotFound/バリデーションエラー
pub async fn update_subscription(
    state: &AppState,
    request: UpdateSubscriptionRequest,
) -> AppResult<Subscription> {
    let reminder_changed = request.data.reminder_settings.is_some();
    let updated = state.subscriptions.update(&request.id, request.data).await?;

    if reminder_changed {
        state.scheduler.cancel_reminder(&updated.id);
        if let Some(reminder) = updated.active_reminder() {
            if let Err(e) = state.scheduler.schedule_reminder(&updated.id, reminder) {
                warn!("リマインダーの再登録に失敗しました: id={}: {e}", updated.id);
            }
        }
    }

    Ok(updated)
}

/// サブスクリプションを削除し、リマインダーを取り消す
pub async fn delete_subscription(state: &AppState, id: &str) -> AppResult<CommandAck> {
    state.subscriptions.remove(id).await?;
    if state.scheduler.cancel_reminder(id) {
        info!("削除したサブスクリプションのリマインダーを取り消しました: id={id}");
    }
    Ok(CommandAck::ok())
}

/// 期間内（両端を含む）に次回支払い日があるサブスクリプションをカレンダーイベントとして返す
///
/// # 引数
/// * `state` - アプリケーション状態
/// * `range` - `{startDate, endDate}`
///
/// # 戻り値
/// カレンダーイベントのリスト、または期間が解析できない場合はバリデーションエラー
pub async fn get_calendar_events(
    state: &AppState,
    range: CalendarRange,
) -> AppResult<Vec<CalendarEvent>> {
    let start = parse_payment_date(&range.start_date);
    let end = parse_payment_date(&range.end_date);

    let (start, end) = match (start, end) {
        (Some(start), Some(end)) => (start, end),
        (start, end) => {
            let mut errors = Vec::new();
            if start.is_none() {
                errors.push(FieldError::new("startDate", "開始日を解析できません"));
            }
            if end.is_none() {
                errors.push(FieldError::new("endDate", "終了日を解析できません"));
            }
            return Err(AppError::Validation(errors));
        }
    };

    let subscriptions = state.subscriptions.read_all().await?;
    Ok(subscriptions
        .iter()
        .filter(|sub| {
            parse_payment_date(&sub.next_payment_date)
                .map(|date| start <= date && date <= end)
                .unwrap_or(false)
        })
        .map(CalendarEvent::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::notifications::models::ReminderState;
    use crate::features::subscriptions::models::{ReminderSettings, UpdateSubscriptionDto};
    use crate::test_utils::create_test_state;

    fn create_test_dto(name: &str, next_payment_date: &str, reminder: bool) -> CreateSubscriptionDto {
        CreateSubscriptionDto {
            name: Some(name.to_string()),
            platform: Some(name.to_string()),
            price: Some(10.0),
            currency: Some("JPY".to_string()),
            period: Some("monthly".to_string()),
            next_payment_date: Some(next_payment_date.to_string()),
            reminder_settings: Some(ReminderSettings {
                enabled: reminder,
                days_before: 3,
                time: "09:00".to_string(),
            }),
            color: None,
            payment_method: None,
        }
    }

    #[tokio::test]
    async fn test_add_schedules_only_enabled_reminders() {
        let (_temp_dir, state, _notifier) = create_test_state().await;

        let enabled = add_subscription(&state, create_test_dto("A", "2024-05-01", true))
            .await
            .unwrap();
        let disabled = add_subscription(&state, create_test_dto("B", "2024-05-01", false))
            .await
            .unwrap();

        assert_eq!(state.scheduler.state(&enabled.id), ReminderState::Scheduled);
        assert_eq!(state.scheduler.state(&disabled.id), ReminderState::Unscheduled);
        assert_eq!(get_subscriptions(&state).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_reschedules_only_when_reminder_given() {
        let (_temp_dir, state, _notifier) = create_test_state().await;
        let created = add_subscription(&state, create_test_dto("A", "2024-05-01", true))
            .await
            .unwrap();

        // reminderSettingsなしの更新ではジョブはそのまま
        update_subscription(
            &state,
            UpdateSubscriptionRequest {
                id: created.id.clone(),
                data: UpdateSubscriptionDto {
                    price: Some(20.0),
                    ..Default::default()
                },
            },
        )
        .await
        .unwrap();
        assert_eq!(state.scheduler.state(&created.id), ReminderState::Scheduled);

        // 無効化するとジョブは消える
        update_subscription(
            &state,
            UpdateSubscriptionRequest {
                id: created.id.clone(),
                data: UpdateSubscriptionDto {
                    reminder_settings: Some(ReminderSettings {
                        enabled: false,
                        days_before: 3,
                        time: "09:00".to_string(),
                    }),
                    ..Default::default()
                },
            },
        )
        .await
        .unwrap();
        assert_eq!(state.scheduler.state(&created.id), ReminderState::Unscheduled);
        assert_eq!(state.scheduler.active_job_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_cancels_job() {
        let (_temp_dir, state, _notifier) = create_test_state().await;
        let created = add_subscription(&state, create_test_dto("A", "2024-05-01", true))
            .await
            .unwrap();

        let ack = delete_subscription(&state, &created.id).await.unwrap();

        assert!(ack.success);
        assert_eq!(state.scheduler.active_job_count(), 0);
        assert!(matches!(
            delete_subscription(&state, &created.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_calendar_events_are_filtered_inclusively() {
        let (_temp_dir, state, _notifier) = create_test_state().await;
        add_subscription(&state, create_test_dto("April", "2024-04-30", false))
            .await
            .unwrap();
        let first = add_subscription(&state, create_test_dto("First", "2024-05-01", false))
            .await
            .unwrap();
        let last = add_subscription(&state, create_test_dto("Last", "2024-05-31", false))
            .await
            .unwrap();

        let events = get_calendar_events(
            &state,
            CalendarRange {
                start_date: "2024-05-01".to_string(),
                end_date: "2024-05-31".to_string(),
            },
        )
        .await
        .unwrap();

        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec![first.id.as_str(), last.id.as_str()]);
        assert_eq!(events[0].title, "First");
    }

    #[tokio::test]
    async fn test_calendar_events_reject_invalid_range() {
        let (_temp_dir, state, _notifier) = create_test_state().await;

        let result = get_calendar_events(
            &state,
            CalendarRange {
                start_date: "yesterday".to_string(),
                end_date: "2024-05-31".to_string(),
            },
        )
        .await;

        let error = result.unwrap_err();
        assert_eq!(error.field_errors().len(), 1);
        assert_eq!(error.field_errors()[0].field, "startDate");
    }
}
