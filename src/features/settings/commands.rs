use super::models::{AppSettings, NotificationSettings};
use crate::shared::errors::AppResult;
use crate::AppState;

/// 通知設定を取得する
pub async fn get_notification_settings(state: &AppState) -> AppResult<NotificationSettings> {
    state.notification_settings.read().await
}

/// 通知設定を保存する
///
/// # 引数
/// * `state` - アプリケーション状態
/// * `settings` - 保存する通知設定（全体）
///
/// # 戻り値
/// 保存した通知設定、またはバリデーションエラー
pub async fn update_notification_settings(
    state: &AppState,
    settings: NotificationSettings,
) -> AppResult<NotificationSettings> {
    state.notification_settings.write(settings).await
}

/// アプリケーション設定を取得する
pub async fn get_app_settings(state: &AppState) -> AppResult<AppSettings> {
    state.app_settings.read().await
}

/// アプリケーション設定を保存する
pub async fn update_app_settings(state: &AppState, settings: AppSettings) -> AppResult<AppSettings> {
    state.app_settings.write(settings).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::settings::models::{SettingsDocument, Theme};
    use crate::test_utils::create_test_state;

    #[tokio::test]
    async fn test_settings_round_trip_through_state() {
        let (_temp_dir, state, _notifier) = create_test_state().await;

        assert_eq!(
            get_notification_settings(&state).await.unwrap(),
            NotificationSettings::defaults()
        );

        let light = AppSettings {
            theme: Theme::Light,
            ..AppSettings::defaults()
        };
        update_app_settings(&state, light.clone()).await.unwrap();
        assert_eq!(get_app_settings(&state).await.unwrap(), light);

        // 通知設定には影響しない
        assert_eq!(
            get_notification_settings(&state).await.unwrap(),
            NotificationSettings::defaults()
        );
    }
}
