/// 環境設定関連のモジュール
pub mod environment;

// 便利な再エクスポート
pub use environment::{
    get_data_directory_name, get_environment, initialize_logging_system,
    load_environment_variables, Environment, EnvironmentConfig, DEFAULT_BACKUP_RETENTION,
};
