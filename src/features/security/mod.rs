/// セキュリティ機能モジュール
///
/// ドキュメントを任意で暗号化するためのヘルパー（AES-256-GCM）。
/// 通常の保存処理では使われない。
pub mod encryption;

pub use encryption::{generate_secure_key, DocumentEncryption, EncryptedData};
