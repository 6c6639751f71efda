/// サブスクリプション機能モジュール
///
/// このモジュールは、サブスクリプション管理に関連するすべての機能を提供します：
/// - サブスクリプションの追加、取得、更新、削除
/// - 入力のバリデーションとサニタイズ
/// - JSONファイルへの永続化と破損時の復旧
/// - カレンダー表示用イベントの生成
pub mod commands;
pub mod models;
pub mod repository;
pub mod validation;

// 公開インターフェース
pub use commands::{
    add_subscription, delete_subscription, get_calendar_events, get_subscriptions,
    update_subscription,
};

pub use models::{
    BillingPeriod, CalendarEvent, CalendarRange, CommandAck, CreateSubscriptionDto, Currency,
    ReminderSettings, Subscription, UpdateSubscriptionDto, UpdateSubscriptionRequest,
};

pub use repository::{SubscriptionStore, SUBSCRIPTIONS_BASENAME};

pub use validation::{parse_payment_date, parse_reminder_time, sanitize_text};
