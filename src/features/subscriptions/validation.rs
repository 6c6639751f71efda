use super::models::{BillingPeriod, CreateSubscriptionDto, Currency, ReminderSettings};
use crate::shared::errors::{AppError, FieldError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static TIME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([01]\d|2[0-3]):([0-5]\d)$").expect("時刻の正規表現は固定値")
});

/// バリデーション済みのサブスクリプション項目
///
/// テキスト項目はまだサニタイズしていない。
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSubscription {
    pub name: String,
    pub platform: String,
    pub price: f64,
    pub currency: Currency,
    pub period: BillingPeriod,
    pub next_payment_date: String,
    pub reminder_settings: Option<ReminderSettings>,
    pub color: Option<String>,
    pub payment_method: String,
}

/// サブスクリプション入力のバリデーション
///
/// 最初の違反で止めず、違反したすべてのフィールドを集めて返す。
///
/// # 引数
/// * `input` - 作成用DTO（更新時は既存値とマージ済みのもの）
///
/// # 戻り値
/// バリデーション済みの項目、または違反一覧を持つバリデーションエラー
pub fn validate_subscription(input: &CreateSubscriptionDto) -> Result<ValidatedSubscription, AppError> {
    let mut errors = Vec::new();

    let name = required_text(&input.name);
    if name.is_none() {
        errors.push(FieldError::new("name", "名前を入力してください"));
    }

    let platform = required_text(&input.platform);
    if platform.is_none() {
        errors.push(FieldError::new("platform", "プラットフォームを入力してください"));
    }

    let price = input.price.filter(|p| p.is_finite() && *p >= 0.0);
    if price.is_none() {
        errors.push(FieldError::new("price", "価格は0以上の数値である必要があります"));
    }

    let currency = input.currency.as_deref().and_then(Currency::parse);
    if currency.is_none() {
        errors.push(FieldError::new(
            "currency",
            "通貨は USD, EUR, GBP, JPY, CNY のいずれかである必要があります",
        ));
    }

    let period = input.period.as_deref().and_then(BillingPeriod::parse);
    if period.is_none() {
        errors.push(FieldError::new(
            "period",
            "支払いサイクルは monthly, quarterly, yearly のいずれかである必要があります",
        ));
    }

    let next_payment_date = input
        .next_payment_date
        .as_deref()
        .filter(|d| parse_payment_date(d).is_some());
    if next_payment_date.is_none() {
        errors.push(FieldError::new(
            "nextPaymentDate",
            "有効な次回支払い日を入力してください",
        ));
    }

    if let Some(reminder) = &input.reminder_settings {
        if let Err(message) = validate_reminder_settings(reminder) {
            errors.push(FieldError::new("reminderSettings", message));
        }
    }

    match (name, platform, price, currency, period, next_payment_date) {
        (Some(name), Some(platform), Some(price), Some(currency), Some(period), Some(date))
            if errors.is_empty() =>
        {
            Ok(ValidatedSubscription {
                name: name.to_string(),
                platform: platform.to_string(),
                price,
                currency,
                period,
                next_payment_date: date.to_string(),
                reminder_settings: input.reminder_settings.clone(),
                color: input.color.clone(),
                payment_method: input.payment_method.clone().unwrap_or_default(),
            })
        }
        _ => Err(AppError::Validation(errors)),
    }
}

/// リマインダー設定のバリデーション
pub fn validate_reminder_settings(reminder: &ReminderSettings) -> Result<(), String> {
    if reminder.days_before < 0 {
        return Err("通知日数は0以上である必要があります".to_string());
    }
    if parse_reminder_time(&reminder.time).is_none() {
        return Err("通知時刻はHH:MM形式で入力してください".to_string());
    }
    Ok(())
}

/// 空白のみの文字列は未入力として扱う
fn required_text(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// マークアップ・スクリプト混入を防ぐため `& < > " '` をエスケープする
pub fn sanitize_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// `HH:MM` 形式の時刻を解析する
pub fn parse_reminder_time(value: &str) -> Option<NaiveTime> {
    let captures = TIME_PATTERN.captures(value)?;
    let hours: u32 = captures[1].parse().ok()?;
    let minutes: u32 = captures[2].parse().ok()?;
    NaiveTime::from_hms_opt(hours, minutes, 0)
}

/// 支払い日を解析する
///
/// 受け付ける形式:
/// - `YYYY-MM-DD`（UTCの0時）
/// - RFC3339（`2024-05-01T09:00:00+09:00` など）
/// - タイムゾーンなしの日時 `YYYY-MM-DDTHH:MM[:SS]`（UTCとして扱う）
pub fn parse_payment_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|dt| Utc.from_utc_datetime(&dt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn valid_input() -> CreateSubscriptionDto {
        CreateSubscriptionDto {
            name: Some("Netflix".to_string()),
            platform: Some("Netflix".to_string()),
            price: Some(15.99),
            currency: Some("USD".to_string()),
            period: Some("monthly".to_string()),
            next_payment_date: Some("2024-05-01".to_string()),
            reminder_settings: Some(ReminderSettings {
                enabled: true,
                days_before: 7,
                time: "09:00".to_string(),
            }),
            color: Some("#e50914".to_string()),
            payment_method: Some("Visa".to_string()),
        }
    }

    fn violated_fields(input: &CreateSubscriptionDto) -> Vec<String> {
        match validate_subscription(input) {
            Err(AppError::Validation(errors)) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("バリデーションエラーを想定: {other:?}"),
        }
    }

    #[test]
    fn test_valid_input_passes() {
        let validated = validate_subscription(&valid_input()).unwrap();

        assert_eq!(validated.name, "Netflix");
        assert_eq!(validated.currency, Currency::Usd);
        assert_eq!(validated.period, BillingPeriod::Monthly);
        assert_eq!(validated.payment_method, "Visa");
    }

    #[test]
    fn test_every_violation_is_reported() {
        let input = CreateSubscriptionDto {
            name: Some("   ".to_string()),
            platform: None,
            price: Some(-1.0),
            currency: Some("BTC".to_string()),
            period: Some("weekly".to_string()),
            next_payment_date: Some("not a date".to_string()),
            reminder_settings: Some(ReminderSettings {
                enabled: true,
                days_before: 3,
                time: "25:00".to_string(),
            }),
            color: None,
            payment_method: None,
        };

        assert_eq!(
            violated_fields(&input),
            vec![
                "name",
                "platform",
                "price",
                "currency",
                "period",
                "nextPaymentDate",
                "reminderSettings"
            ]
        );
    }

    #[test]
    fn test_single_violation() {
        let mut input = valid_input();
        input.price = Some(f64::NAN);
        assert_eq!(violated_fields(&input), vec!["price"]);

        let mut input = valid_input();
        input.price = Some(f64::INFINITY);
        assert_eq!(violated_fields(&input), vec!["price"]);

        let mut input = valid_input();
        input.next_payment_date = Some("2024-02-30".to_string());
        assert_eq!(violated_fields(&input), vec!["nextPaymentDate"]);
    }

    #[test]
    fn test_zero_price_is_allowed() {
        let mut input = valid_input();
        input.price = Some(0.0);
        assert!(validate_subscription(&input).is_ok());
    }

    #[test]
    fn test_negative_days_before_is_rejected() {
        let reminder = ReminderSettings {
            enabled: true,
            days_before: -1,
            time: "09:00".to_string(),
        };
        assert!(validate_reminder_settings(&reminder).is_err());
    }

    #[test]
    fn test_sanitize_text() {
        assert_eq!(
            sanitize_text(r#"<script>alert("x's")</script> & co"#),
            "&lt;script&gt;alert(&quot;x&#x27;s&quot;)&lt;/script&gt; &amp; co"
        );
        assert_eq!(sanitize_text("Disney+"), "Disney+");
    }

    #[quickcheck]
    fn prop_sanitized_text_has_no_markup_characters(input: String) -> bool {
        let sanitized = sanitize_text(&input);
        !sanitized.contains(['<', '>', '"', '\''])
    }

    #[quickcheck]
    fn prop_sanitize_is_reversible(input: String) -> bool {
        let restored = sanitize_text(&input)
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#x27;", "'")
            .replace("&amp;", "&");
        restored == input
    }

    #[test]
    fn test_parse_reminder_time() {
        assert_eq!(
            parse_reminder_time("09:05"),
            NaiveTime::from_hms_opt(9, 5, 0)
        );
        assert_eq!(
            parse_reminder_time("23:59"),
            NaiveTime::from_hms_opt(23, 59, 0)
        );
        assert!(parse_reminder_time("9:05").is_none());
        assert!(parse_reminder_time("24:00").is_none());
        assert!(parse_reminder_time("12:60").is_none());
    }

    #[test]
    fn test_parse_payment_date_formats() {
        let midnight = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

        assert_eq!(parse_payment_date("2024-05-01"), Some(midnight));
        assert_eq!(parse_payment_date("2024-05-01T00:00:00Z"), Some(midnight));
        assert_eq!(
            parse_payment_date("2024-05-01T09:00:00+09:00"),
            Some(midnight)
        );
        assert_eq!(parse_payment_date("2024-05-01T00:00"), Some(midnight));
        assert!(parse_payment_date("").is_none());
        assert!(parse_payment_date("05/01/2024").is_none());
    }
}
