/// 設定機能モジュール
///
/// 通知設定とアプリケーション設定をそれぞれ独立したJSONファイルで管理する。
pub mod commands;
pub mod models;
pub mod repository;

pub use commands::{
    get_app_settings, get_notification_settings, update_app_settings, update_notification_settings,
};
pub use models::{AppSettings, NotificationSettings, SettingsDocument, Theme};
pub use repository::SettingsStore;
