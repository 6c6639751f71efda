use crate::features::subscriptions::models::Currency;
use crate::features::subscriptions::validation::parse_reminder_time;
use crate::shared::errors::{AppError, AppResult, FieldError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// 設定ドキュメント（1ファイル1インスタンス）
pub trait SettingsDocument: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// ファイル名（拡張子なし）
    const BASENAME: &'static str;

    /// ファイルが存在しない・破損している場合に使う値
    fn defaults() -> Self;

    /// 書き込み前のバリデーション
    fn validate(&self) -> AppResult<()> {
        Ok(())
    }
}

/// 通知設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub enabled: bool,
    pub default_reminder_days: i64,
    pub default_reminder_time: String, // HH:MM形式
}

impl SettingsDocument for NotificationSettings {
    const BASENAME: &'static str = "notificationSettings";

    fn defaults() -> Self {
        Self {
            enabled: true,
            default_reminder_days: 3,
            default_reminder_time: "09:00".to_string(),
        }
    }

    fn validate(&self) -> AppResult<()> {
        let mut errors = Vec::new();
        if self.default_reminder_days < 0 {
            errors.push(FieldError::new(
                "defaultReminderDays",
                "通知日数は0以上である必要があります",
            ));
        }
        if parse_reminder_time(&self.default_reminder_time).is_none() {
            errors.push(FieldError::new(
                "defaultReminderTime",
                "通知時刻はHH:MM形式で入力してください",
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

/// 表示テーマ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    System,
}

/// アプリケーション設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub theme: Theme,
    pub currency: Currency,
    pub first_run: bool,
}

impl SettingsDocument for AppSettings {
    const BASENAME: &'static str = "appSettings";

    fn defaults() -> Self {
        Self {
            theme: Theme::System,
            currency: Currency::Usd,
            first_run: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_wire_format() {
        assert_eq!(
            serde_json::to_value(NotificationSettings::defaults()).unwrap(),
            serde_json::json!({
                "enabled": true,
                "defaultReminderDays": 3,
                "defaultReminderTime": "09:00"
            })
        );
        assert_eq!(
            serde_json::to_value(AppSettings::defaults()).unwrap(),
            serde_json::json!({"theme": "system", "currency": "USD", "firstRun": true})
        );
    }

    #[test]
    fn test_notification_settings_validation() {
        assert!(NotificationSettings::defaults().validate().is_ok());

        let invalid = NotificationSettings {
            enabled: true,
            default_reminder_days: -2,
            default_reminder_time: "7:5".to_string(),
        };
        let error = invalid.validate().unwrap_err();
        let fields: Vec<&str> = error.field_errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["defaultReminderDays", "defaultReminderTime"]);
    }

    #[test]
    fn test_unknown_theme_is_rejected() {
        let result = serde_json::from_str::<AppSettings>(
            r#"{"theme": "neon", "currency": "USD", "firstRun": false}"#,
        );
        assert!(result.is_err());
    }
}
