use log::{debug, info, warn};
use std::process::{Command, Stdio};

/// テスト通知のタイトル
pub const TEST_NOTIFICATION_TITLE: &str = "テスト通知";
/// テスト通知の本文
pub const TEST_NOTIFICATION_BODY: &str = "SubTrack からのテスト通知です";

/// 通知の送信先
///
/// 送信は投げっぱなし。失敗しても呼び出し元には伝えず、ログに残すだけ。
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// リマインダー通知のタイトル
pub fn reminder_title(name: &str) -> String {
    format!("サブスクリプションのリマインダー: {name}")
}

/// リマインダー通知の本文
pub fn reminder_body(name: &str, days_until: i64) -> String {
    if days_until == 0 {
        format!("{name} の更新日は今日です")
    } else {
        format!("{name} の更新まであと{days_until}日です")
    }
}

/// OSごとのネイティブ通知手段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeBackend {
    /// freedesktop の `notify-send`（Linux/BSD）
    NotifySend,
    /// `osascript` の `display notification`（macOS）
    AppleScript,
    /// PowerShell のバルーン通知（Windows）
    PowerShell,
    /// ネイティブ通知なし（フォールバックのみ）
    Unavailable,
}

impl NativeBackend {
    /// 実行中のOSに合わせて選ぶ
    pub fn detect() -> Self {
        if cfg!(target_os = "macos") {
            Self::AppleScript
        } else if cfg!(target_os = "windows") {
            Self::PowerShell
        } else if cfg!(any(
            target_os = "linux",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd",
            target_os = "dragonfly"
        )) {
            Self::NotifySend
        } else {
            Self::Unavailable
        }
    }

    /// 通知を出すコマンドを組み立てる
    pub fn command(&self, title: &str, body: &str) -> Option<Command> {
        match self {
            Self::NotifySend => {
                let mut command = Command::new("notify-send");
                // 名前が `-` で始まってもオプションとして解釈させない
                command.arg("--app-name=SubTrack").arg("--").arg(title).arg(body);
                Some(command)
            }
            Self::AppleScript => {
                let script = format!(
                    "display notification \"{}\" with title \"{}\"",
                    escape_applescript(body),
                    escape_applescript(title)
                );
                let mut command = Command::new("osascript");
                command.arg("-e").arg(script);
                Some(command)
            }
            Self::PowerShell => {
                let script = format!(
                    "Add-Type -AssemblyName System.Windows.Forms; \
                     $n = New-Object System.Windows.Forms.NotifyIcon; \
                     $n.Icon = [System.Drawing.SystemIcons]::Information; \
                     $n.Visible = $true; \
                     $n.ShowBalloonTip(10000, '{}', '{}', 'Info'); \
                     Start-Sleep -Seconds 10; $n.Dispose()",
                    escape_powershell(title),
                    escape_powershell(body)
                );
                let mut command = Command::new("powershell");
                command
                    .arg("-NoProfile")
                    .arg("-NonInteractive")
                    .arg("-Command")
                    .arg(script);
                Some(command)
            }
            Self::Unavailable => None,
        }
    }
}

fn escape_applescript(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn escape_powershell(value: &str) -> String {
    value.replace('\'', "''")
}

/// OSのネイティブ通知を使う通知手段
///
/// ネイティブ通知が使えない・起動できない場合は、ログと標準エラー出力に書き出す。
pub struct SystemNotifier {
    backend: NativeBackend,
}

impl SystemNotifier {
    pub fn new() -> Self {
        Self::with_backend(NativeBackend::detect())
    }

    pub fn with_backend(backend: NativeBackend) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> NativeBackend {
        self.backend
    }
}

impl Default for SystemNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for SystemNotifier {
    fn notify(&self, title: &str, body: &str) {
        let Some(mut command) = self.backend.command(title, body) else {
            fallback_alert(title, body);
            return;
        };

        let spawned = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(mut child) => {
                debug!("通知を送信しました: {:?} {title}", self.backend);
                let backend = self.backend;
                // 終了待ちは別スレッドで行い、呼び出し元は待たせない
                std::thread::spawn(move || match child.wait() {
                    Ok(status) if !status.success() => {
                        warn!("通知コマンドが失敗しました: {backend:?}: {status}");
                    }
                    Ok(_) => {}
                    Err(e) => warn!("通知コマンドの終了待ちに失敗しました: {backend:?}: {e}"),
                });
            }
            Err(e) => {
                warn!("ネイティブ通知を起動できません: {:?}: {e}", self.backend);
                fallback_alert(title, body);
            }
        }
    }
}

/// ネイティブ通知が使えないときの代替表示
fn fallback_alert(title: &str, body: &str) {
    info!("[通知] {title}: {body}");
    eprintln!("[通知] {title}: {body}");
}

/// 送信内容を記録するだけの通知手段（テスト用）
#[cfg(test)]
#[derive(Default)]
pub struct RecordingNotifier {
    sent: std::sync::Mutex<Vec<(String, String)>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, body: &str) {
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_of(command: &Command) -> Vec<String> {
        command
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_reminder_message_contains_name() {
        assert!(reminder_title("Netflix").contains("Netflix"));
        assert_eq!(reminder_body("Netflix", 5), "Netflix の更新まであと5日です");
        assert_eq!(reminder_body("Netflix", 0), "Netflix の更新日は今日です");
    }

    #[test]
    fn test_notify_send_command() {
        let command = NativeBackend::NotifySend.command("題名", "本文").unwrap();

        assert_eq!(command.get_program(), "notify-send");
        assert_eq!(args_of(&command), vec!["--app-name=SubTrack", "--", "題名", "本文"]);
    }

    #[test]
    fn test_notify_send_passes_dash_leading_text_as_positional() {
        let body = reminder_body("-u critical", 3);
        let command = NativeBackend::NotifySend
            .command("--help", &body)
            .unwrap();

        let args = args_of(&command);
        let separator = args.iter().position(|arg| arg == "--").unwrap();
        assert_eq!(&args[separator + 1..], ["--help", body.as_str()]);
    }

    #[test]
    fn test_applescript_escapes_quotes() {
        let command = NativeBackend::AppleScript
            .command(r#"say "hi""#, r"back\slash")
            .unwrap();

        let args = args_of(&command);
        assert_eq!(args[0], "-e");
        assert_eq!(
            args[1],
            r#"display notification "back\\slash" with title "say \"hi\"""#
        );
    }

    #[test]
    fn test_powershell_escapes_single_quotes() {
        let command = NativeBackend::PowerShell
            .command("Tom's", "body")
            .unwrap();

        let script = args_of(&command).pop().unwrap();
        assert!(script.contains("'Tom''s'"));
    }

    #[test]
    fn test_unavailable_backend_falls_back_without_panicking() {
        assert!(NativeBackend::Unavailable.command("t", "b").is_none());
        SystemNotifier::with_backend(NativeBackend::Unavailable).notify("t", "b");
    }

    #[test]
    fn test_recording_notifier_keeps_order() {
        let notifier = RecordingNotifier::default();
        notifier.notify("a", "1");
        notifier.notify("b", "2");

        assert_eq!(
            notifier.sent(),
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string())
            ]
        );
    }
}
