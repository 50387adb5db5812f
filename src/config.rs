//! Guild configuration module
//!
//! Parses guild limits and prices from YAML files.
//!
//! Uses serde_yaml for automatic parsing - just define the struct and serde
//! handles all the parsing, defaulting, and type conversion!

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Hard ceiling on purchasable bank tabs.
pub const GUILD_BANK_MAX_TABS: usize = 6;

/// Tunable guild limits and prices.
///
/// This struct is automatically parsed from YAML by serde.
/// Every key has a default, so an empty file is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildConfig {
    // ============================================
    // Audit Logs
    // ============================================
    /// Retained roster event log entries per guild
    #[serde(default = "default_event_log_count")]
    pub event_log_count: u32,

    /// Retained bank event log entries per tab (and per money log)
    #[serde(default = "default_bank_event_log_count")]
    pub bank_event_log_count: u32,

    // ============================================
    // Membership
    // ============================================
    /// Maximum members per guild (0 = unlimited)
    #[serde(default)]
    pub member_limit: u32,

    /// Toggle allowing more than one member at guildmaster rank
    #[serde(default)]
    pub allow_multiple_guildmasters: bool,

    // ============================================
    // Bank
    // ============================================
    /// Tabs a freshly created guild starts with
    #[serde(default)]
    pub initial_bank_tabs: u8,

    /// Purchase price in copper for each successive bank tab
    #[serde(default = "default_bank_tab_costs")]
    pub bank_tab_costs: Vec<u64>,

    /// Cap on the guild bank balance in copper
    #[serde(default = "default_bank_money_limit")]
    pub bank_money_limit: u64,

    /// Price in copper charged to the leader for changing the emblem
    #[serde(default = "default_emblem_cost")]
    pub emblem_cost: u64,
}

fn default_event_log_count() -> u32 {
    100
}

fn default_bank_event_log_count() -> u32 {
    25
}

fn default_bank_tab_costs() -> Vec<u64> {
    vec![
        1_000_000, 2_500_000, 5_000_000, 10_000_000, 25_000_000, 50_000_000,
    ]
}

fn default_bank_money_limit() -> u64 {
    u64::MAX
}

fn default_emblem_cost() -> u64 {
    100_000
}

impl Default for GuildConfig {
    fn default() -> Self {
        Self {
            event_log_count: default_event_log_count(),
            bank_event_log_count: default_bank_event_log_count(),
            member_limit: 0,
            allow_multiple_guildmasters: false,
            initial_bank_tabs: 0,
            bank_tab_costs: default_bank_tab_costs(),
            bank_money_limit: default_bank_money_limit(),
            emblem_cost: default_emblem_cost(),
        }
    }
}

impl GuildConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&contents)
    }

    /// Parse configuration from a YAML string
    pub fn from_str(contents: &str) -> Result<Self> {
        let config: GuildConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.event_log_count == 0 {
            anyhow::bail!("event_log_count must be at least 1");
        }
        if self.bank_event_log_count == 0 {
            anyhow::bail!("bank_event_log_count must be at least 1");
        }
        if self.initial_bank_tabs as usize > GUILD_BANK_MAX_TABS {
            anyhow::bail!(
                "initial_bank_tabs cannot exceed {} (got {})",
                GUILD_BANK_MAX_TABS,
                self.initial_bank_tabs
            );
        }
        if self.bank_tab_costs.len() != GUILD_BANK_MAX_TABS {
            anyhow::bail!(
                "bank_tab_costs must list exactly {} prices (got {})",
                GUILD_BANK_MAX_TABS,
                self.bank_tab_costs.len()
            );
        }
        Ok(())
    }

    /// Price of tab `tab_id`, or None when all tabs are purchased.
    pub fn tab_cost(&self, tab_id: u8) -> Option<u64> {
        self.bank_tab_costs.get(tab_id as usize).copied()
    }
}
