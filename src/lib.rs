pub mod commands;
pub mod features;
pub mod shared;

use features::notifications::{Notifier, ReminderScheduler, SystemNotifier};
use features::settings::{AppSettings, NotificationSettings, SettingsStore};
use features::subscriptions::SubscriptionStore;
use log::{error, info};
use shared::config::{initialize_logging_system, load_environment_variables, EnvironmentConfig};
use shared::errors::AppResult;
use shared::storage::{BackupManager, BACKUP_DIR_NAME};
use std::sync::Arc;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

/// アプリケーション状態（プロセス内の唯一の所有者）
pub struct AppState {
    pub config: EnvironmentConfig,
    pub subscriptions: Arc<SubscriptionStore>,
    pub notification_settings: SettingsStore<NotificationSettings>,
    pub app_settings: SettingsStore<AppSettings>,
    pub scheduler: ReminderScheduler,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    /// OSのネイティブ通知を使ってアプリケーション状態を初期化する
    pub async fn initialize(config: EnvironmentConfig) -> AppResult<Self> {
        Self::initialize_with_notifier(config, Arc::new(SystemNotifier::new())).await
    }

    /// アプリケーション状態を初期化する
    ///
    /// # 処理内容
    /// 1. データディレクトリとドキュメントを準備
    /// 2. 設定ファイルを準備
    /// 3. 保存済みのサブスクリプションからリマインダーを復元
    ///
    /// # 引数
    /// * `config` - 環境設定
    /// * `notifier` - 通知の送信先
    ///
    /// # 戻り値
    /// 初期化済みの状態。ファイルシステムのエラーはそのまま返す
    pub async fn initialize_with_notifier(
        config: EnvironmentConfig,
        notifier: Arc<dyn Notifier>,
    ) -> AppResult<Self> {
        info!("データディレクトリを初期化しています: {:?}", config.data_dir);

        let backups = Arc::new(BackupManager::new(
            config.data_dir.join(BACKUP_DIR_NAME),
            config.backup_retention,
        ));

        let subscriptions = Arc::new(SubscriptionStore::new(&config.data_dir, backups.clone()));
        subscriptions.initialize().await?;

        let notification_settings = SettingsStore::new(&config.data_dir, backups.clone());
        notification_settings.initialize().await?;
        let app_settings = SettingsStore::new(&config.data_dir, backups);
        app_settings.initialize().await?;

        let scheduler = ReminderScheduler::new(
            subscriptions.clone(),
            notifier.clone(),
            config.reminder_timezone,
            config.reminder_repeat,
        );
        scheduler.initialize_from_store().await?;

        info!("アプリケーション初期化が完了しました");
        Ok(Self {
            config,
            subscriptions,
            notification_settings,
            app_settings,
            scheduler,
            notifier,
        })
    }

    /// すべてのリマインダーを停止する（プロセス終了前に呼ぶ）
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }
}

/// アプリケーションを起動し、標準入力のリクエストを処理する
///
/// 標準入力が閉じるかCtrl-Cを受け取ると、リマインダーを停止して終了する。
pub async fn run() -> AppResult<()> {
    load_environment_variables();
    let config = EnvironmentConfig::from_env();
    initialize_logging_system(&config);

    info!("アプリケーション初期化を開始します...");
    let state = AppState::initialize(config).await.map_err(|e| {
        error!("アプリケーションの初期化に失敗しました: {e}");
        e
    })?;

    let shutdown = CancellationToken::new();
    let signal_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("終了シグナルを受け取りました");
                shutdown.cancel();
            }
        }
    });

    let result = commands::serve_lines(
        &state,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        shutdown,
    )
    .await;

    state.shutdown();
    signal_task.abort();
    info!("アプリケーションを終了します");
    result
}
