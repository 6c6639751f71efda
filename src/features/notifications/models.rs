use chrono::{DateTime, Duration, LocalResult, Local, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;

/// DSTの切り替えで存在しない時刻を前に進める上限（分）
const MAX_GAP_MINUTES: i64 = 180;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// リマインダー時刻（HH:MM）を解釈するタイムゾーン
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReminderTimezone {
    /// OSのローカル時刻
    #[default]
    Local,
    /// IANAタイムゾーン名で指定したもの
    Named(Tz),
}

impl ReminderTimezone {
    /// `local` またはIANAタイムゾーン名（例: `Asia/Tokyo`）を解析する
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("local") {
            return Some(Self::Local);
        }
        value.parse::<Tz>().ok().map(Self::Named)
    }

    /// `after` より後で、最初に壁時計が `time` になる時刻を返す
    ///
    /// DSTで存在しない時刻は切り替え後の最初の時刻に、重複する時刻は早い方にする。
    pub fn next_trigger_after(&self, time: NaiveTime, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Local => next_trigger_in(&Local, time, after),
            Self::Named(tz) => next_trigger_in(tz, time, after),
        }
    }
}

fn next_trigger_in<Z: TimeZone>(
    zone: &Z,
    time: NaiveTime,
    after: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let mut date = after.with_timezone(zone).date_naive();

    // 当日・翌日で足りるが、DSTの境界をまたぐ場合に備えて翌々日まで見る
    for _ in 0..3 {
        if let Some(candidate) = resolve_wall_clock(zone, date.and_time(time)) {
            if candidate > after {
                return Some(candidate);
            }
        }
        date = date.succ_opt()?;
    }
    None
}

fn resolve_wall_clock<Z: TimeZone>(zone: &Z, wall_clock: NaiveDateTime) -> Option<DateTime<Utc>> {
    for minutes in 0..=MAX_GAP_MINUTES {
        match zone.from_local_datetime(&(wall_clock + Duration::minutes(minutes))) {
            LocalResult::Single(dt) => return Some(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => return Some(earliest.with_timezone(&Utc)),
            LocalResult::None => continue,
        }
    }
    None
}

/// 支払い日までの日数（切り上げ）
///
/// 支払い日を過ぎている場合は0以下になる。
pub fn days_until(payment: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (payment - now).num_milliseconds();
    let days = millis.div_euclid(MILLIS_PER_DAY);
    if millis.rem_euclid(MILLIS_PER_DAY) > 0 {
        days + 1
    } else {
        days
    }
}

/// 支払い期限が近い間の通知の繰り返し方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReminderRepeat {
    /// 期限まで毎日通知する
    #[default]
    Daily,
    /// 同じ支払い日については1回だけ通知する
    OncePerCycle,
}

impl ReminderRepeat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "daily" => Some(Self::Daily),
            "once-per-cycle" | "once_per_cycle" | "once" => Some(Self::OncePerCycle),
            _ => None,
        }
    }
}

/// サブスクリプションごとのリマインダー状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderState {
    Unscheduled,
    Scheduled,
}

/// トリガー1回分の評価結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ReminderOutcome {
    /// 通知を送った
    Notified {
        #[serde(rename = "daysUntil")]
        days_until: i64,
    },
    /// 通知期間外
    NotDue {
        #[serde(rename = "daysUntil")]
        days_until: i64,
    },
    /// サブスクリプションが削除済み
    Missing,
    /// この支払い日については通知済み
    AlreadyNotified,
    /// ジョブが登録されていない
    NotScheduled,
}
