use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AssetError;

/// Setpoint used when an asset has no readable Setpoint value.
pub const DEFAULT_SETPOINT: f64 = 1000.0;

// --- Furnace operating state ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FurnaceState {
    Idle,
    Heating,
    Holding,
    Cooling,
}

impl FurnaceState {
    /// One full cycle, in transition order.
    pub const CYCLE: [FurnaceState; 4] = [
        FurnaceState::Idle,
        FurnaceState::Heating,
        FurnaceState::Holding,
        FurnaceState::Cooling,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FurnaceState::Idle => "IDLE",
            FurnaceState::Heating => "HEATING",
            FurnaceState::Holding => "HOLDING",
            FurnaceState::Cooling => "COOLING",
        }
    }

    pub fn parse(s: &str) -> Option<FurnaceState> {
        FurnaceState::CYCLE.into_iter().find(|state| state.as_str() == s)
    }
}

impl fmt::Display for FurnaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Property values and writes ---

/// A single property value; exactly one variant is populated.
/// Serializes in the platform's shape, e.g. `{"doubleValue": 1001.0}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    #[serde(rename = "doubleValue")]
    Double(f64),
    #[serde(rename = "integerValue")]
    Integer(i64),
    #[serde(rename = "booleanValue")]
    Boolean(bool),
    #[serde(rename = "stringValue")]
    String(String),
}

impl PropertyValue {
    /// Numeric view of the value; integers widen to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Double(v) => Some(*v),
            PropertyValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Double(v) => write!(f, "{:.2}", v),
            PropertyValue::Integer(v) => write!(f, "{}", v),
            PropertyValue::Boolean(v) => write!(f, "{}", v),
            PropertyValue::String(v) => f.write_str(v),
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Double(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Integer(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Boolean(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}

impl From<FurnaceState> for PropertyValue {
    fn from(state: FurnaceState) -> Self {
        PropertyValue::String(state.as_str().to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Quality {
    #[default]
    Good,
}

/// One timestamped value for one asset property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyWrite {
    pub entry_id: Uuid,
    pub asset_id: String,
    pub property_id: String,
    pub value: PropertyValue,
    pub time_in_seconds: i64,
    pub quality: Quality,
}

impl PropertyWrite {
    pub fn new(
        asset_id: impl Into<String>,
        property_id: impl Into<String>,
        value: impl Into<PropertyValue>,
        time_in_seconds: i64,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            asset_id: asset_id.into(),
            property_id: property_id.into(),
            value: value.into(),
            time_in_seconds,
            quality: Quality::Good,
        }
    }
}

// --- Catalog records ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPage {
    pub summaries: Vec<AssetSummary>,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDetail {
    pub asset_id: String,
    pub asset_name: String,
    pub channels: Vec<Channel>,
}

impl AssetDetail {
    pub fn channel(&self, kind: ChannelKind) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == kind.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Temperature,
    Power,
    State,
    Setpoint,
}

impl ChannelKind {
    /// Property name the channel is bound by in an asset description.
    pub fn name(self) -> &'static str {
        match self {
            ChannelKind::Temperature => "Temperature",
            ChannelKind::Power => "Power",
            ChannelKind::State => "State",
            ChannelKind::Setpoint => "Setpoint",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// --- Simulated asset ---

/// A furnace with its telemetry channels bound. Channel ids never change
/// after binding; the setpoint is fixed once with [`Asset::with_setpoint`].
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    id: String,
    name: String,
    temperature: String,
    power: String,
    state: String,
    setpoint_channel: Option<String>,
    setpoint: f64,
}

impl Asset {
    /// Bind channels by name. Temperature, Power and State are required;
    /// Setpoint is optional and the setpoint starts at [`DEFAULT_SETPOINT`].
    pub fn from_detail(detail: &AssetDetail) -> Result<Self, AssetError> {
        let required = |kind: ChannelKind| {
            detail
                .channel(kind)
                .map(|c| c.id.clone())
                .ok_or_else(|| AssetError::MissingChannel {
                    asset_id: detail.asset_id.clone(),
                    channel: kind.name(),
                })
        };
        Ok(Self {
            id: detail.asset_id.clone(),
            name: detail.asset_name.clone(),
            temperature: required(ChannelKind::Temperature)?,
            power: required(ChannelKind::Power)?,
            state: required(ChannelKind::State)?,
            setpoint_channel: detail.channel(ChannelKind::Setpoint).map(|c| c.id.clone()),
            setpoint: DEFAULT_SETPOINT,
        })
    }

    pub fn with_setpoint(mut self, setpoint: f64) -> Self {
        self.setpoint = setpoint;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn temperature_channel(&self) -> &str {
        &self.temperature
    }

    pub fn power_channel(&self) -> &str {
        &self.power
    }

    pub fn state_channel(&self) -> &str {
        &self.state
    }

    pub fn setpoint_channel(&self) -> Option<&str> {
        self.setpoint_channel.as_deref()
    }
}
