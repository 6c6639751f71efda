//! 追加 → リマインダー登録 → トリガー → 通知 の一連の流れのテスト

use super::models::{ReminderOutcome, ReminderState};
use crate::features::subscriptions::commands::{add_subscription, delete_subscription};
use crate::features::subscriptions::models::{CreateSubscriptionDto, ReminderSettings};
use crate::test_utils::create_test_state;
use chrono::{Duration, Utc};

fn netflix_in(days: i64) -> CreateSubscriptionDto {
    CreateSubscriptionDto {
        name: Some("Netflix".to_string()),
        platform: Some("Netflix".to_string()),
        price: Some(15.99),
        currency: Some("USD".to_string()),
        period: Some("monthly".to_string()),
        next_payment_date: Some((Utc::now() + Duration::days(days)).to_rfc3339()),
        reminder_settings: Some(ReminderSettings {
            enabled: true,
            days_before: 7,
            time: "09:00".to_string(),
        }),
        color: None,
        payment_method: None,
    }
}

#[tokio::test]
async fn test_added_subscription_is_reminded_when_due() {
    let (_temp_dir, state, notifier) = create_test_state().await;

    let created = add_subscription(&state, netflix_in(5)).await.unwrap();

    assert_eq!(state.scheduler.state(&created.id), ReminderState::Scheduled);
    assert_eq!(state.scheduler.active_job_count(), 1);

    let outcome = state.scheduler.fire_reminder(&created.id).await.unwrap();
    assert_eq!(outcome, ReminderOutcome::Notified { days_until: 5 });

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].0.contains("Netflix"));
    assert!(sent[0].1.contains("Netflix"));
}

#[tokio::test]
async fn test_deleted_subscription_is_not_reminded() {
    let (_temp_dir, state, notifier) = create_test_state().await;

    let created = add_subscription(&state, netflix_in(2)).await.unwrap();
    delete_subscription(&state, &created.id).await.unwrap();

    assert_eq!(
        state.scheduler.fire_reminder(&created.id).await.unwrap(),
        ReminderOutcome::NotScheduled
    );
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn test_reminders_are_restored_after_restart() {
    let (temp_dir, state, _notifier) = create_test_state().await;
    let created = add_subscription(&state, netflix_in(5)).await.unwrap();
    state.shutdown();
    assert_eq!(state.scheduler.active_job_count(), 0);

    let (restarted, notifier) = crate::test_utils::reopen_test_state(&temp_dir).await;

    assert_eq!(restarted.scheduler.state(&created.id), ReminderState::Scheduled);
    assert!(matches!(
        restarted.scheduler.fire_reminder(&created.id).await.unwrap(),
        ReminderOutcome::Notified { .. }
    ));
    assert_eq!(notifier.sent().len(), 1);
}
