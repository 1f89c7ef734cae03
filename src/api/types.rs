use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

// ── Lenient field helpers ──
//
// The backend is loosely typed: numbers arrive as strings, sides arrive as
// null. A bad field must never fail the whole payload.

/// Coerce a JSON value to a finite number, falling back to 0.
pub fn coerce_f64(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        Some(_) => None,
    })
}

/// Counts: integral floats and numeric strings are accepted.
fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let as_count = |v: f64| (v.is_finite() && v >= 0.0 && v.fract() == 0.0).then(|| v as u64);
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().or_else(|| n.as_f64().and_then(as_count)),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<u64>().ok().or_else(|| s.parse::<f64>().ok().and_then(as_count))
        }
        _ => None,
    })
}

/// Null or non-array becomes empty; elements that fail to parse are skipped.
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// First non-empty of `side` / `positionSide`.
fn first_side<'a>(side: &'a Option<String>, position_side: &'a Option<String>) -> Option<&'a str> {
    side.as_deref()
        .filter(|s| !s.is_empty())
        .or_else(|| position_side.as_deref().filter(|s| !s.is_empty()))
}

// ── Direction ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Case-insensitive substring match; "long" wins if both appear.
    pub fn classify(raw: &str) -> Option<Self> {
        let lower = raw.to_lowercase();
        if lower.contains("long") {
            Some(Self::Long)
        } else if lower.contains("short") {
            Some(Self::Short)
        } else {
            None
        }
    }
}

// ── Closed operation ──

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeRecord {
    #[serde(default)]
    pub pnl: Value,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub side: Option<String>,
    #[serde(
        default,
        rename = "positionSide",
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub position_side: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<Value>,
    #[serde(default, rename = "closeTime", skip_serializing_if = "Option::is_none")]
    pub close_time: Option<Value>,
    /// Fields the aggregation never reads, passed through to the renderer.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TradeRecord {
    #[inline]
    pub fn pnl_value(&self) -> f64 {
        coerce_f64(&self.pnl)
    }

    #[inline]
    pub fn direction(&self) -> Option<Direction> {
        first_side(&self.side, &self.position_side).and_then(Direction::classify)
    }
}

// ── Open trade ──

/// Identity of an open position across polls.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TradeKey {
    pub symbol: String,
    pub side: String,
}

impl fmt::Display for TradeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.symbol, self.side)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenTrade {
    #[serde(default, deserialize_with = "lenient_string")]
    pub symbol: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub side: Option<String>,
    #[serde(
        default,
        rename = "positionSide",
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub position_side: Option<String>,
    #[serde(default, rename = "unrealizedProfit", deserialize_with = "lenient_f64")]
    pub unrealized_profit: Option<f64>,
    #[serde(default, rename = "entryPrice", deserialize_with = "lenient_f64")]
    pub entry_price: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OpenTrade {
    pub fn key(&self) -> TradeKey {
        TradeKey {
            symbol: self.symbol.clone().unwrap_or_default(),
            side: first_side(&self.side, &self.position_side)
                .unwrap_or_default()
                .to_string(),
        }
    }
}

// ── Stats ──

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsResponse {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub winrate: Option<f64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_trades: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub wins: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub losses: Option<u64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub average_pnl: Option<f64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub max_win_streak: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub max_loss_streak: Option<u64>,
    #[serde(default)]
    pub winrates: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Momentum scanner ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentumPair {
    #[serde(default, deserialize_with = "lenient_string")]
    pub symbol: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub change: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub volume: Option<f64>,
    #[serde(default, rename = "type", deserialize_with = "lenient_string")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub scanner: Option<String>,
}

// ── Cooldowns ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cooldown {
    #[serde(default, deserialize_with = "lenient_string")]
    pub symbol: Option<String>,
    /// Remaining time as "HH:MM".
    #[serde(default, deserialize_with = "lenient_string")]
    pub time_remaining: Option<String>,
}

impl Cooldown {
    pub fn remaining(&self) -> Option<chrono::Duration> {
        let (h, m) = self.time_remaining.as_deref()?.trim().split_once(':')?;
        let hours: i64 = h.parse().ok()?;
        let minutes: i64 = m.parse().ok()?;
        if hours < 0 || !(0..60).contains(&minutes) {
            return None;
        }
        Some(chrono::Duration::hours(hours) + chrono::Duration::minutes(minutes))
    }
}

// ── Response envelopes ──

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenTradesResponse {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub open_trades: Vec<OpenTrade>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationsResponse {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub closed: Vec<TradeRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MomentumPairsResponse {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub momentum_pairs: Vec<MomentumPair>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CapitalResponse {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_capital: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CooldownsResponse {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub cooldowns: Vec<Cooldown>,
}

// ── Closed-operations bound ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationsLimit {
    Count(u32),
    #[default]
    All,
}

impl OperationsLimit {
    #[inline]
    pub fn query_param(&self) -> Option<u32> {
        match self {
            Self::Count(n) => Some(*n),
            Self::All => None,
        }
    }
}

impl fmt::Display for OperationsLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::All => write!(f, "all"),
        }
    }
}

impl FromStr for OperationsLimit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        match s.parse::<u32>() {
            Ok(0) => Err("limit must be > 0".into()),
            Ok(n) => Ok(Self::Count(n)),
            Err(_) => Err(format!("expected \"all\" or a positive integer, got {s:?}")),
        }
    }
}

impl Serialize for OperationsLimit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Count(n) => serializer.serialize_u32(*n),
            Self::All => serializer.serialize_str("all"),
        }
    }
}

impl<'de> Deserialize<'de> for OperationsLimit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n > 0)
                .map(Self::Count)
                .ok_or_else(|| serde::de::Error::custom("limit must be a positive integer")),
            Value::String(s) => s.parse().map_err(serde::de::Error::custom),
            other => Err(serde::de::Error::custom(format!("invalid operations limit: {other}"))),
        }
    }
}
