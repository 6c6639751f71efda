/// 通知機能モジュール
///
/// このモジュールは、リマインダーと通知に関連する機能を提供します：
/// - サブスクリプションごとの毎日のリマインダージョブ管理
/// - 支払い期限の判定と通知の重複抑止
/// - OSのネイティブ通知への送信
pub mod commands;
pub mod dispatcher;
pub mod models;
pub mod scheduler;

#[cfg(test)]
mod integration_tests;

// 公開インターフェース
pub use commands::{get_reminder_status, simulate_reminder, trigger_test_notification, ReminderStatus};
pub use dispatcher::{NativeBackend, Notifier, SystemNotifier};
pub use models::{ReminderOutcome, ReminderRepeat, ReminderState, ReminderTimezone};
pub use scheduler::ReminderScheduler;
