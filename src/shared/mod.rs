/// 共有エラー型とエラーハンドリング
pub mod errors;

/// 共有設定管理
pub mod config;

/// JSONファイルによる永続化
pub mod storage;

// 便利な再エクスポート
pub use config::{
    get_environment, initialize_logging_system, load_environment_variables, Environment,
    EnvironmentConfig,
};
pub use errors::{AppError, AppResult, ErrorSeverity, FieldError};
