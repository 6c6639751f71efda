use crate::shared::errors::{AppError, AppResult};
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// 使用する暗号化アルゴリズム名
pub const ALGORITHM: &str = "AES-256-GCM";

const NONCE_LENGTH: usize = 12;

/// 暗号化されたデータ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    /// 暗号化されたデータ（Base64エンコード）
    pub ciphertext: String,
    /// ナンス（Base64エンコード）
    pub nonce: String,
    /// 暗号化アルゴリズム
    pub algorithm: String,
}

/// ドキュメント暗号化ヘルパー（AES-256-GCM）
///
/// 保存処理には組み込んでいない。必要な場合に呼び出し側で使う。
#[derive(Clone)]
pub struct DocumentEncryption {
    key: [u8; 32],
}

impl DocumentEncryption {
    /// 32バイトの鍵から作成
    pub fn from_key(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// パスフレーズから作成する（鍵はパスフレーズのSHA-256）
    ///
    /// # 引数
    /// * `passphrase` - 空でないパスフレーズ
    pub fn from_passphrase(passphrase: &str) -> AppResult<Self> {
        if passphrase.is_empty() {
            return Err(AppError::security("パスフレーズが空です"));
        }
        let digest = Sha256::digest(passphrase.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Ok(Self { key })
    }

    /// Base64エンコードされた32バイトの鍵から作成
    pub fn from_base64_key(encoded: &str) -> AppResult<Self> {
        let bytes = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| AppError::security(format!("鍵のデコードに失敗しました: {e}")))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AppError::security("鍵は32バイトである必要があります"))?;
        Ok(Self { key })
    }

    /// 文字列を暗号化する
    ///
    /// # 引数
    /// * `plaintext` - 暗号化するデータ
    ///
    /// # 戻り値
    /// 暗号文とナンス（毎回ランダム）
    pub fn encrypt(&self, plaintext: &str) -> AppResult<EncryptedData> {
        let cipher = self.cipher()?;

        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| AppError::security(format!("暗号化に失敗しました: {e}")))?;

        Ok(EncryptedData {
            ciphertext: general_purpose::STANDARD.encode(&ciphertext),
            nonce: general_purpose::STANDARD.encode(nonce_bytes),
            algorithm: ALGORITHM.to_string(),
        })
    }

    /// 暗号化されたデータを復号化する
    pub fn decrypt(&self, encrypted: &EncryptedData) -> AppResult<String> {
        if encrypted.algorithm != ALGORITHM {
            return Err(AppError::security(format!(
                "サポートされていないアルゴリズム: {}",
                encrypted.algorithm
            )));
        }

        let ciphertext = general_purpose::STANDARD
            .decode(&encrypted.ciphertext)
            .map_err(|e| AppError::security(format!("暗号文デコードエラー: {e}")))?;
        let nonce_bytes = general_purpose::STANDARD
            .decode(&encrypted.nonce)
            .map_err(|e| AppError::security(format!("ナンスデコードエラー: {e}")))?;
        if nonce_bytes.len() != NONCE_LENGTH {
            return Err(AppError::security("ナンスのサイズが正しくありません"));
        }

        let plaintext = self
            .cipher()?
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|e| AppError::security(format!("復号化に失敗しました: {e}")))?;

        String::from_utf8(plaintext)
            .map_err(|e| AppError::security(format!("UTF-8変換エラー: {e}")))
    }

    /// 値をJSONにして暗号化し、1つのBase64文字列にまとめる
    pub fn encrypt_document<T: Serialize + ?Sized>(&self, value: &T) -> AppResult<String> {
        let json = serde_json::to_string(value)?;
        let envelope = serde_json::to_string(&self.encrypt(&json)?)?;
        Ok(general_purpose::STANDARD.encode(envelope.as_bytes()))
    }

    /// `encrypt_document` で作った文字列を復号化して値に戻す
    pub fn decrypt_document<T: DeserializeOwned>(&self, encoded: &str) -> AppResult<T> {
        let envelope = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| AppError::security(format!("Base64デコードエラー: {e}")))?;
        let encrypted: EncryptedData = serde_json::from_slice(&envelope)?;
        let json = self.decrypt(&encrypted)?;
        Ok(serde_json::from_str(&json)?)
    }

    fn cipher(&self) -> AppResult<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| AppError::security(format!("鍵の初期化に失敗しました: {e}")))
    }
}

/// セキュアなランダムキーを生成する
///
/// # 引数
/// * `length` - キーの長さ（バイト）
///
/// # 戻り値
/// Base64エンコードされたランダムキー
pub fn generate_secure_key(length: usize) -> String {
    let mut key_bytes = vec![0u8; length];
    OsRng.fill_bytes(&mut key_bytes);
    general_purpose::STANDARD.encode(&key_bytes)
}
