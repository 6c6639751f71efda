//! プレゼンテーション層からのコマンドを各機能に振り分けるルーター

use crate::features::notifications;
use crate::features::settings;
use crate::features::subscriptions;
use crate::shared::errors::{AppError, AppResult, ErrorSeverity, FieldError};
use crate::AppState;
use log::{debug, error, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// コマンドの失敗（プレゼンテーション層にそのまま返す形）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandError {
    /// `validation` / `notFound` / `io` など
    pub kind: String,
    /// ユーザー向けメッセージ
    pub message: String,
    /// バリデーション違反のフィールド一覧
    pub fields: Vec<FieldError>,
}

impl From<AppError> for CommandError {
    fn from(error: AppError) -> Self {
        match error.severity() {
            ErrorSeverity::High | ErrorSeverity::Critical => {
                error!("コマンドの実行に失敗しました: {}", error.details())
            }
            ErrorSeverity::Low | ErrorSeverity::Medium => {
                warn!("コマンドの実行に失敗しました: {}", error.details())
            }
        }

        let kind = match &error {
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "notFound",
            AppError::Io(_) => "io",
            AppError::Json(_) => "json",
            AppError::Configuration(_) => "configuration",
            AppError::Concurrency(_) => "concurrency",
            AppError::Security(_) => "security",
        };

        Self {
            kind: kind.to_string(),
            message: error.user_message(),
            fields: error.field_errors().to_vec(),
        }
    }
}

/// IDだけを受け取るコマンドの入力（`"id"` でも `{"id": "..."}` でもよい）
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdPayload {
    Bare(String),
    Wrapped { id: String },
}

impl IdPayload {
    fn into_id(self) -> String {
        match self {
            IdPayload::Bare(id) | IdPayload::Wrapped { id } => id,
        }
    }
}

/// コマンド名で処理を振り分ける
///
/// # 引数
/// * `state` - アプリケーション状態
/// * `command` - コマンド名（例: `add-subscription`）
/// * `payload` - コマンドの入力
///
/// # 戻り値
/// コマンドの結果（JSON）、または失敗内容
pub async fn invoke(state: &AppState, command: &str, payload: Value) -> Result<Value, CommandError> {
    debug!("コマンドを受け付けました: {command}");
    dispatch(state, command, payload).await.map_err(CommandError::from)
}

async fn dispatch(state: &AppState, command: &str, payload: Value) -> AppResult<Value> {
    match command {
        "get-subscriptions" => to_json(subscriptions::get_subscriptions(state).await?),
        "add-subscription" => {
            let dto = parse_payload(payload)?;
            to_json(subscriptions::add_subscription(state, dto).await?)
        }
        "update-subscription" => {
            let request = parse_payload(payload)?;
            to_json(subscriptions::update_subscription(state, request).await?)
        }
        "delete-subscription" => {
            let id = parse_payload::<IdPayload>(payload)?.into_id();
            to_json(subscriptions::delete_subscription(state, &id).await?)
        }
        "get-calendar-events" => {
            let range = parse_payload(payload)?;
            to_json(subscriptions::get_calendar_events(state, range).await?)
        }
        "get-notification-settings" => {
            to_json(settings::get_notification_settings(state).await?)
        }
        "update-notification-settings" => {
            let value = parse_payload(payload)?;
            to_json(settings::update_notification_settings(state, value).await?)
        }
        "get-app-settings" => to_json(settings::get_app_settings(state).await?),
        "update-app-settings" => {
            let value = parse_payload(payload)?;
            to_json(settings::update_app_settings(state, value).await?)
        }
        "trigger-test-notification" => {
            to_json(notifications::trigger_test_notification(state).await?)
        }
        "get-reminder-status" => {
            let id = parse_payload::<IdPayload>(payload)?.into_id();
            to_json(notifications::get_reminder_status(state, &id).await?)
        }
        "simulate-reminder" => {
            let id = parse_payload::<IdPayload>(payload)?.into_id();
            to_json(notifications::simulate_reminder(state, &id).await?)
        }
        other => Err(AppError::validation(
            "command",
            format!("不明なコマンドです: {other}"),
        )),
    }
}

fn parse_payload<T: DeserializeOwned>(payload: Value) -> AppResult<T> {
    serde_json::from_value(payload)
        .map_err(|e| AppError::validation("payload", format!("入力の形式が正しくありません: {e}")))
}

fn to_json<T: Serialize>(value: T) -> AppResult<Value> {
    Ok(serde_json::to_value(value)?)
}

/// 1行1リクエストのJSON
#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Value,
    command: String,
    #[serde(default)]
    payload: Value,
}

/// 1行分のリクエストを処理し、応答のJSONを返す
pub async fn handle_line(state: &AppState, line: &str) -> Value {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => return invalid_request(format!("リクエストを解析できません: {e}")),
    };

    match invoke(state, &request.command, request.payload).await {
        Ok(value) => json!({ "id": request.id, "ok": value }),
        Err(error) => json!({ "id": request.id, "error": error }),
    }
}

/// IDを特定できないリクエストへの応答
fn invalid_request(message: String) -> Value {
    let error = CommandError::from(AppError::validation("request", message));
    json!({ "id": Value::Null, "error": error })
}

/// 入力が終わるか停止要求が来るまで、1行ずつリクエストを処理して応答を書き出す
///
/// # 引数
/// * `state` - アプリケーション状態
/// * `reader` - リクエストの入力（改行区切りJSON）
/// * `writer` - 応答の出力（改行区切りJSON）
/// * `shutdown` - 停止要求
pub async fn serve_lines<R, W>(
    state: &AppState,
    mut reader: R,
    mut writer: W,
    shutdown: CancellationToken,
) -> AppResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = Vec::new();

    loop {
        buffer.clear();
        let read = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            read = reader.read_until(b'\n', &mut buffer) => read?,
        };
        if read == 0 {
            debug!("入力が終了しました");
            break;
        }

        // 不正な1行は応答で返し、後続のリクエストは処理を続ける
        let response = match std::str::from_utf8(&buffer) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => handle_line(state, line.trim()).await,
            Err(e) => invalid_request(format!("リクエストがUTF-8ではありません: {e}")),
        };
        writer.write_all(response.to_string().as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    Ok(())
}
