use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// フィールド単位のバリデーション違反
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// 違反したフィールド名（camelCase）
    pub field: String,
    /// ユーザー向けメッセージ
    pub message: String,
}

impl FieldError {
    pub fn new<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// アプリケーション全体で使用される統一エラー型
///
/// ドキュメントの破損はここには現れない。ストア内部でバックアップから
/// 復旧し、呼び出し元には常に有効な（空の可能性がある）結果を返す。
#[derive(Debug, Error)]
pub enum AppError {
    /// バリデーション関連のエラー（違反したすべてのフィールドを保持）
    #[error("バリデーションエラー: {}", join_field_errors(.0))]
    Validation(Vec<FieldError>),

    /// リソースが見つからない場合のエラー
    #[error("リソースが見つかりません: {0}")]
    NotFound(String),

    /// I/O関連のエラー
    #[error("I/Oエラー: {0}")]
    Io(#[from] std::io::Error),

    /// JSON解析エラー
    #[error("JSON解析エラー: {0}")]
    Json(#[from] serde_json::Error),

    /// 設定関連のエラー
    #[error("設定エラー: {0}")]
    Configuration(String),

    /// 並行処理関連のエラー
    #[error("並行処理エラー: {0}")]
    Concurrency(String),

    /// セキュリティ関連のエラー
    #[error("セキュリティエラー: {0}")]
    Security(String),
}

/// エラーの重要度を表す列挙型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    /// 低重要度（ユーザー入力エラーなど）
    Low,
    /// 中重要度（データ形式エラーなど）
    Medium,
    /// 高重要度（ファイルシステムエラーなど）
    High,
    /// 最重要（セキュリティエラーなど）
    Critical,
}

impl AppError {
    /// ユーザーに表示するためのフレンドリーなメッセージを取得
    ///
    /// # 戻り値
    /// ユーザーに表示可能なエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(errors) => errors
                .iter()
                .map(|e| e.message.clone())
                .collect::<Vec<_>>()
                .join("、"),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Io(_) => "ファイル操作でエラーが発生しました".to_string(),
            AppError::Json(_) => "データ形式の解析でエラーが発生しました".to_string(),
            AppError::Configuration(_) => "設定エラーが発生しました".to_string(),
            AppError::Concurrency(_) => "並行処理でエラーが発生しました".to_string(),
            AppError::Security(_) => "セキュリティエラーが発生しました".to_string(),
        }
    }

    /// エラーの詳細情報を取得
    ///
    /// # 戻り値
    /// エラーの詳細情報（ログ出力用）
    pub fn details(&self) -> String {
        format!("{self}")
    }

    /// エラーの重要度を取得
    ///
    /// # 戻り値
    /// エラーの重要度レベル
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AppError::Validation(_) => ErrorSeverity::Low,
            AppError::NotFound(_) => ErrorSeverity::Low,
            AppError::Io(_) => ErrorSeverity::High,
            AppError::Json(_) => ErrorSeverity::Medium,
            AppError::Configuration(_) => ErrorSeverity::High,
            AppError::Concurrency(_) => ErrorSeverity::High,
            AppError::Security(_) => ErrorSeverity::Critical,
        }
    }

    /// バリデーション違反のフィールド一覧（バリデーションエラー以外は空）
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            AppError::Validation(errors) => errors,
            _ => &[],
        }
    }

    /// 単一フィールドのバリデーションエラーを作成するヘルパー関数
    ///
    /// # 引数
    /// * `field` - フィールド名
    /// * `message` - バリデーションエラーメッセージ
    ///
    /// # 戻り値
    /// バリデーションエラー
    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        AppError::Validation(vec![FieldError::new(field, message)])
    }

    /// リソース未発見エラーを作成するヘルパー関数
    ///
    /// # 引数
    /// * `resource` - 見つからなかったリソース名
    ///
    /// # 戻り値
    /// リソース未発見エラー
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        AppError::NotFound(format!("{}が見つかりません", resource.into()))
    }

    /// 設定エラーを作成するヘルパー関数
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        AppError::Configuration(message.into())
    }

    /// 並行処理エラーを作成するヘルパー関数
    pub fn concurrency<S: Into<String>>(message: S) -> Self {
        AppError::Concurrency(message.into())
    }

    /// セキュリティエラーを作成するヘルパー関数
    pub fn security<S: Into<String>>(message: S) -> Self {
        AppError::Security(message.into())
    }
}

/// AppErrorからStringへの変換（プレゼンテーション層への返却用）
impl From<AppError> for String {
    fn from(error: AppError) -> Self {
        error.user_message()
    }
}

/// Result型のエイリアス（アプリケーション全体で使用）
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity() {
        // 各エラータイプの重要度をテスト
        assert_eq!(
            AppError::validation("name", "テスト").severity(),
            ErrorSeverity::Low
        );
        assert_eq!(
            AppError::not_found("サブスクリプション").severity(),
            ErrorSeverity::Low
        );
        assert_eq!(
            AppError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")).severity(),
            ErrorSeverity::High
        );
        assert_eq!(
            AppError::security("鍵が不正").severity(),
            ErrorSeverity::Critical
        );
    }

    #[test]
    fn test_user_message_lists_every_violation() {
        let error = AppError::Validation(vec![
            FieldError::new("name", "名前を入力してください"),
            FieldError::new("price", "価格は0以上の数値である必要があります"),
        ]);

        assert_eq!(
            error.user_message(),
            "名前を入力してください、価格は0以上の数値である必要があります"
        );
        assert_eq!(error.field_errors().len(), 2);
        assert!(error.details().contains("name"));
        assert!(error.details().contains("price"));
    }

    #[test]
    fn test_not_found_message() {
        let error = AppError::not_found("ID abc のサブスクリプション");
        assert_eq!(
            error.user_message(),
            "ID abc のサブスクリプションが見つかりません"
        );
        assert!(error.field_errors().is_empty());
    }

    #[test]
    fn test_string_conversion() {
        // String変換のテスト
        let error = AppError::validation("currency", "通貨が不正です");
        let error_string: String = error.into();
        assert_eq!(error_string, "通貨が不正です");
    }
}
