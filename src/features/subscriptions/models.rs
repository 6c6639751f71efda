use serde::{Deserialize, Serialize};
use std::fmt;

/// 対応通貨
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "EUR")]
    Eur,
    #[serde(rename = "GBP")]
    Gbp,
    #[serde(rename = "JPY")]
    Jpy,
    #[serde(rename = "CNY")]
    Cny,
}

impl Currency {
    pub const ALL: [Currency; 5] = [
        Currency::Usd,
        Currency::Eur,
        Currency::Gbp,
        Currency::Jpy,
        Currency::Cny,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
            Currency::Cny => "CNY",
        }
    }

    /// 通貨コードを解析する（大文字小文字は区別する）
    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == code)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 支払いサイクル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingPeriod {
    Monthly,
    Quarterly,
    Yearly,
}

impl BillingPeriod {
    pub const ALL: [BillingPeriod; 3] = [
        BillingPeriod::Monthly,
        BillingPeriod::Quarterly,
        BillingPeriod::Yearly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BillingPeriod::Monthly => "monthly",
            BillingPeriod::Quarterly => "quarterly",
            BillingPeriod::Yearly => "yearly",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == value)
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// サブスクリプションごとのリマインダー設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderSettings {
    pub enabled: bool,
    pub days_before: i64, // 支払い日の何日前から通知するか（0以上）
    pub time: String,     // HH:MM形式（24時間）
}

/// サブスクリプションデータモデル
///
/// ディスク上の `subscriptions.json` とプレゼンテーション層の両方でこの形を使う。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,                 // UUID v4、作成後は不変
    pub name: String,               // サービス名（サニタイズ済み）
    pub platform: String,           // 提供元（サニタイズ済み）
    pub price: f64,                 // 0以上の有限値
    pub currency: Currency,
    pub period: BillingPeriod,
    pub next_payment_date: String,  // 解析可能な日付文字列（YYYY-MM-DD または RFC3339）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_settings: Option<ReminderSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub payment_method: String,     // サニタイズ済み
    pub created_at: String,         // RFC3339形式（UTC）
    pub updated_at: String,         // RFC3339形式（UTC）
}

impl Subscription {
    /// 有効なリマインダー設定（無効・未設定の場合はNone）
    pub fn active_reminder(&self) -> Option<&ReminderSettings> {
        self.reminder_settings.as_ref().filter(|r| r.enabled)
    }
}

/// サブスクリプション作成用DTO
///
/// 型の不一致以外はすべてバリデーションで検出できるよう、値はすべて任意で受け取る。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateSubscriptionDto {
    pub name: Option<String>,
    pub platform: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub period: Option<String>,
    pub next_payment_date: Option<String>,
    pub reminder_settings: Option<ReminderSettings>,
    pub color: Option<String>,
    pub payment_method: Option<String>,
}

impl From<&Subscription> for CreateSubscriptionDto {
    fn from(sub: &Subscription) -> Self {
        Self {
            name: Some(sub.name.clone()),
            platform: Some(sub.platform.clone()),
            price: Some(sub.price),
            currency: Some(sub.currency.as_str().to_string()),
            period: Some(sub.period.as_str().to_string()),
            next_payment_date: Some(sub.next_payment_date.clone()),
            reminder_settings: sub.reminder_settings.clone(),
            color: sub.color.clone(),
            payment_method: Some(sub.payment_method.clone()),
        }
    }
}

/// サブスクリプション更新用DTO（部分更新、未指定は既存値を維持）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateSubscriptionDto {
    pub name: Option<String>,
    pub platform: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub period: Option<String>,
    pub next_payment_date: Option<String>,
    pub reminder_settings: Option<ReminderSettings>,
    pub color: Option<String>,
    pub payment_method: Option<String>,
}

impl UpdateSubscriptionDto {
    /// 既存値に部分更新を重ねた作成用DTOを返す（バリデーション用）
    pub fn merged_onto(&self, base: CreateSubscriptionDto) -> CreateSubscriptionDto {
        CreateSubscriptionDto {
            name: self.name.clone().or(base.name),
            platform: self.platform.clone().or(base.platform),
            price: self.price.or(base.price),
            currency: self.currency.clone().or(base.currency),
            period: self.period.clone().or(base.period),
            next_payment_date: self.next_payment_date.clone().or(base.next_payment_date),
            reminder_settings: self.reminder_settings.clone().or(base.reminder_settings),
            color: self.color.clone().or(base.color),
            payment_method: self.payment_method.clone().or(base.payment_method),
        }
    }
}

/// update-subscription コマンドの入力
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSubscriptionRequest {
    pub id: String,
    #[serde(default)]
    pub data: UpdateSubscriptionDto,
}

/// delete-subscription などの成功応答
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommandAck {
    pub success: bool,
}

impl CommandAck {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// カレンダー表示期間（両端を含む）
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarRange {
    pub start_date: String,
    pub end_date: String,
}

/// カレンダーイベントの付加情報
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarEventProps {
    pub platform: String,
    pub price: f64,
    pub period: BillingPeriod,
}

/// カレンダーイベント（支払い予定日1件）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: String,
    pub end: String,
    pub color: Option<String>,
    pub extended_props: CalendarEventProps,
}

impl From<&Subscription> for CalendarEvent {
    fn from(sub: &Subscription) -> Self {
        Self {
            id: sub.id.clone(),
            title: sub.name.clone(),
            start: sub.next_payment_date.clone(),
            end: sub.next_payment_date.clone(),
            color: sub.color.clone(),
            extended_props: CalendarEventProps {
                platform: sub.platform.clone(),
                price: sub.price,
                period: sub.period,
            },
        }
    }
}
