/// 機能モジュール
///
/// 各機能ごとにモデル、リポジトリ、コマンドをまとめる。
pub mod notifications;
pub mod security;
pub mod settings;
pub mod subscriptions;
