/// バックアップの作成・世代管理・復旧
pub mod backup;

/// JSONドキュメントの読み書き
pub mod document;

pub use backup::{BackupEntry, BackupManager};
pub use document::{write_json_atomic, JsonDocument, ReadOutcome};

/// データディレクトリ内のバックアップディレクトリ名
pub const BACKUP_DIR_NAME: &str = "backups";
