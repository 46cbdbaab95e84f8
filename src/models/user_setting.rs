//! # User Setting Model
//!
//! Channel preferences: one row per (user, channel type, external identity).

use std::fmt;
use std::str::FromStr;

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Channel preference entity
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_settings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub user_id: String,

    /// Channel type tag, see [`ChannelType`]
    #[sea_orm(column_name = "type")]
    pub channel_type: String,

    /// External identity on the channel (e.g. a Telegram chat id)
    pub nid: String,

    pub enabled: bool,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Delivery channels a user can link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelType {
    #[serde(rename = "TELEGRAM")]
    Telegram,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Telegram => "TELEGRAM",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "TELEGRAM" => Ok(ChannelType::Telegram),
            other => Err(format!("unknown channel type '{other}'")),
        }
    }
}

/// Input for creating a channel preference row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChannelSetting {
    pub user_id: String,
    pub channel_type: ChannelType,
    pub nid: String,
}
