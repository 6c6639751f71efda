use crate::features::notifications::models::{ReminderRepeat, ReminderTimezone};
use std::path::PathBuf;

/// アプリケーション名（データディレクトリ名に使用）
pub const APP_DIR_NAME: &str = "subtrack";

/// バックアップ保持数のデフォルト値
pub const DEFAULT_BACKUP_RETENTION: usize = 5;

/// アプリケーションの実行環境を表す列挙型
#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    /// 開発環境
    Development,
    /// プロダクション環境
    Production,
}

/// 環境設定を管理する構造体
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    /// 実行環境
    pub environment: String,
    /// デバッグモードの有効/無効
    pub debug_mode: bool,
    /// ログレベル
    pub log_level: String,
    /// データディレクトリ
    pub data_dir: PathBuf,
    /// ドキュメントごとのバックアップ保持数
    pub backup_retention: usize,
    /// リマインダーの時刻を解釈するタイムゾーン
    pub reminder_timezone: ReminderTimezone,
    /// 支払い期限が近い間の通知の繰り返し方
    pub reminder_repeat: ReminderRepeat,
}

impl EnvironmentConfig {
    /// 環境変数から設定を読み込む
    ///
    /// # 戻り値
    /// 環境設定
    pub fn from_env() -> Self {
        Self::from_lookup(get_environment(), |key| std::env::var(key).ok())
    }

    /// 任意の参照関数から設定を組み立てる
    ///
    /// # 引数
    /// * `environment` - 実行環境
    /// * `lookup` - キーから値を取得する関数
    ///
    /// # 戻り値
    /// 環境設定（不正な値はデフォルトにフォールバック）
    pub fn from_lookup<F>(environment: Environment, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let debug_mode = environment == Environment::Development;
        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| {
            if debug_mode {
                "debug".to_string()
            } else {
                "info".to_string()
            }
        });

        let data_dir = lookup("SUBTRACK_DATA_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| default_data_dir(&environment));

        let backup_retention = match lookup("BACKUP_RETENTION") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(value) if value >= 1 => value,
                _ => {
                    log::warn!(
                        "BACKUP_RETENTION が不正なため、デフォルト値を使用: {raw} -> {DEFAULT_BACKUP_RETENTION}"
                    );
                    DEFAULT_BACKUP_RETENTION
                }
            },
            None => DEFAULT_BACKUP_RETENTION,
        };

        let reminder_timezone = match lookup("REMINDER_TIMEZONE") {
            Some(name) => ReminderTimezone::parse(&name).unwrap_or_else(|| {
                log::warn!("REMINDER_TIMEZONE が不正なため、ローカル時刻を使用: {name}");
                ReminderTimezone::Local
            }),
            None => ReminderTimezone::Local,
        };

        let reminder_repeat = match lookup("REMINDER_REPEAT") {
            Some(raw) => ReminderRepeat::parse(&raw).unwrap_or_else(|| {
                log::warn!("REMINDER_REPEAT が不正なため、毎日通知を使用: {raw}");
                ReminderRepeat::Daily
            }),
            None => ReminderRepeat::Daily,
        };

        Self {
            environment: format!("{environment:?}").to_lowercase(),
            debug_mode,
            log_level,
            data_dir,
            backup_retention,
            reminder_timezone,
            reminder_repeat,
        }
    }

    /// プロダクション環境かどうかを判定
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 開発環境かどうかを判定
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

/// 現在の実行環境を判定する
///
/// # 判定ロジック
/// 1. 実行時環境変数 ENVIRONMENT を確認
/// 2. デバッグビルドの場合は Development
/// 3. リリースビルドの場合は Production
pub fn get_environment() -> Environment {
    if let Ok(env_var) = std::env::var("ENVIRONMENT") {
        let env = match env_var.as_str() {
            "production" => Environment::Production,
            _ => Environment::Development,
        };
        log::debug!("環境判定: 実行時環境変数を使用 -> {env_var} -> {env:?}");
        return env;
    }

    // フォールバック: ビルド設定に基づく判定
    let env = if cfg!(debug_assertions) {
        Environment::Development
    } else {
        Environment::Production
    };
    log::debug!(
        "環境判定: ビルド設定を使用 -> debug_assertions={} -> {env:?}",
        cfg!(debug_assertions)
    );
    env
}

/// 環境に応じたデータディレクトリ名を取得する
///
/// # ディレクトリ名の規則
/// - 開発環境: "dev_data"
/// - プロダクション環境: "data"
pub fn get_data_directory_name(env: &Environment) -> &'static str {
    match env {
        Environment::Development => "dev_data",
        Environment::Production => "data",
    }
}

/// OSのユーザーデータディレクトリ配下のデフォルトパス
fn default_data_dir(env: &Environment) -> PathBuf {
    let base = dirs::data_dir().unwrap_or_else(|| {
        log::warn!("ユーザーデータディレクトリを取得できないため、カレントディレクトリを使用します");
        PathBuf::from(".")
    });
    base.join(APP_DIR_NAME).join(get_data_directory_name(env))
}

/// 環境に応じた.envファイルを読み込む
pub fn load_environment_variables() {
    let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

    // 環境に応じた.envファイルのパスを決定
    let env_file = match environment.as_str() {
        "production" => ".env.production",
        _ => ".env",
    };

    log::info!("環境: {environment}, 読み込み対象: {env_file}");

    match dotenv::from_filename(env_file) {
        Ok(_) => {
            log::info!("{env_file}ファイルを読み込みました");
        }
        Err(_) => {
            // 環境固有のファイルがない場合は、デフォルトの.envを試行
            if env_file != ".env" && dotenv::dotenv().is_ok() {
                log::warn!("{env_file}が見つからないため、デフォルトの.envファイルを読み込みました");
            } else {
                log::warn!("環境変数ファイルが見つかりません。直接設定された環境変数を使用します。");
            }
        }
    }
}

/// ログシステムを初期化する
///
/// # 処理内容
/// 1. 環境設定を取得
/// 2. ログレベルを設定
/// 3. env_loggerを初期化（二重初期化は無視）
pub fn initialize_logging_system(env_config: &EnvironmentConfig) {
    let log_level = match env_config.log_level.to_lowercase().as_str() {
        "error" => log::LevelFilter::Error,
        "warn" => log::LevelFilter::Warn,
        "info" => log::LevelFilter::Info,
        "debug" => log::LevelFilter::Debug,
        "trace" => log::LevelFilter::Trace,
        _ => log::LevelFilter::Info,
    };

    let initialized = env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp_secs()
        .format_module_path(false)
        .format_target(false)
        .try_init()
        .is_ok();

    if initialized {
        log::info!(
            "ログシステムを初期化しました: level={}, environment={}",
            env_config.log_level,
            env_config.environment
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_get_data_directory_name() {
        assert_eq!(get_data_directory_name(&Environment::Development), "dev_data");
        assert_eq!(get_data_directory_name(&Environment::Production), "data");
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = EnvironmentConfig::from_lookup(Environment::Development, lookup_from(&[]));

        assert!(config.is_development());
        assert!(config.debug_mode);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.backup_retention, DEFAULT_BACKUP_RETENTION);
        assert_eq!(config.reminder_timezone, ReminderTimezone::Local);
        assert_eq!(config.reminder_repeat, ReminderRepeat::Daily);
        assert!(config.data_dir.ends_with("subtrack/dev_data"));
    }

    #[test]
    fn test_explicit_values_are_used() {
        let config = EnvironmentConfig::from_lookup(
            Environment::Production,
            lookup_from(&[
                ("SUBTRACK_DATA_DIR", "/tmp/subtrack-test"),
                ("BACKUP_RETENTION", "3"),
                ("REMINDER_TIMEZONE", "Asia/Tokyo"),
                ("REMINDER_REPEAT", "once-per-cycle"),
                ("LOG_LEVEL", "warn"),
            ]),
        );

        assert!(config.is_production());
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/subtrack-test"));
        assert_eq!(config.backup_retention, 3);
        assert_eq!(
            config.reminder_timezone,
            ReminderTimezone::Named(chrono_tz::Asia::Tokyo)
        );
        assert_eq!(config.reminder_repeat, ReminderRepeat::OncePerCycle);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = EnvironmentConfig::from_lookup(
            Environment::Production,
            lookup_from(&[
                ("BACKUP_RETENTION", "0"),
                ("REMINDER_TIMEZONE", "Mars/Olympus"),
                ("REMINDER_REPEAT", "hourly"),
            ]),
        );

        assert_eq!(config.log_level, "info");
        assert_eq!(config.backup_retention, DEFAULT_BACKUP_RETENTION);
        assert_eq!(config.reminder_timezone, ReminderTimezone::Local);
        assert_eq!(config.reminder_repeat, ReminderRepeat::Daily);
    }

    #[test]
    fn test_get_environment() {
        let env = get_environment();
        assert!(matches!(
            env,
            Environment::Development | Environment::Production
        ));
    }
}
