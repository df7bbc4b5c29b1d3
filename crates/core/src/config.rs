use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the state files and the PID file.
    pub data_dir: PathBuf,
    /// Exchanges the paper backend should expose.
    pub exchanges: Vec<String>,
    /// Per-strategy-name defaults, keyed by strategy name (`grid`, `dca`, ...).
    pub strategies: BTreeMap<String, StrategyConfig>,
    pub risk: RiskConfig,
    pub daemon: DaemonConfig,
    pub notifications: NotificationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            exchanges: vec!["binance".to_string()],
            strategies: BTreeMap::new(),
            risk: RiskConfig::default(),
            daemon: DaemonConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl AppConfig {
    #[must_use]
    pub fn risk_state_path(&self) -> PathBuf {
        self.data_dir.join("risk_state.json")
    }

    #[must_use]
    pub fn strategy_state_path(&self) -> PathBuf {
        self.data_dir.join("strategy_state.json")
    }

    #[must_use]
    pub fn daemon_state_path(&self) -> PathBuf {
        self.data_dir.join("daemon_state.json")
    }

    #[must_use]
    pub fn pid_path(&self) -> PathBuf {
        self.data_dir.join("daemon.pid")
    }
}

// =============================================================================
// Strategies
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub enabled: bool,
    /// Default parameters, overridden key-by-key by the caller at start time.
    pub params: Map<String, Value>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            params: Map::new(),
        }
    }
}

// =============================================================================
// Risk
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub max_order_size_usd: Decimal,
    pub max_open_orders: usize,
    pub max_position_size_pct: Decimal,
    pub max_daily_loss_pct: Decimal,
    pub max_drawdown_pct: Decimal,
    pub stop_loss: ThresholdRule,
    pub trailing_stop: ThresholdRule,
    pub take_profit: ThresholdRule,
    pub partial_take_profit: PartialTakeProfitConfig,
    /// Limit overrides keyed by strategy name.
    pub strategy_overrides: BTreeMap<String, RiskOverrides>,
    /// Number of trades retained in the persisted trade log.
    pub trade_log_limit: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_order_size_usd: Decimal::from(1000),
            max_open_orders: 10,
            max_position_size_pct: Decimal::from(20),
            max_daily_loss_pct: Decimal::from(5),
            max_drawdown_pct: Decimal::from(15),
            stop_loss: ThresholdRule {
                enabled: true,
                pct: Decimal::from(5),
            },
            trailing_stop: ThresholdRule {
                enabled: false,
                pct: Decimal::from(3),
            },
            take_profit: ThresholdRule {
                enabled: true,
                pct: Decimal::from(10),
            },
            partial_take_profit: PartialTakeProfitConfig::default(),
            strategy_overrides: BTreeMap::new(),
            trade_log_limit: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub enabled: bool,
    pub pct: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialTakeProfitConfig {
    pub enabled: bool,
    pub levels: Vec<TakeProfitLevel>,
}

impl Default for PartialTakeProfitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            levels: vec![
                TakeProfitLevel {
                    gain_pct: Decimal::from(5),
                    fraction: Decimal::new(25, 2),
                },
                TakeProfitLevel {
                    gain_pct: Decimal::from(10),
                    fraction: Decimal::new(50, 2),
                },
                TakeProfitLevel {
                    gain_pct: Decimal::from(20),
                    fraction: Decimal::ONE,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakeProfitLevel {
    pub gain_pct: Decimal,
    /// Fraction of the position to exit at this level, in `(0, 1]`.
    pub fraction: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskOverrides {
    pub max_order_size_usd: Option<Decimal>,
    pub max_open_orders: Option<usize>,
    pub max_position_size_pct: Option<Decimal>,
    pub max_daily_loss_pct: Option<Decimal>,
    pub max_drawdown_pct: Option<Decimal>,
}

// =============================================================================
// Daemon
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub open_orders_secs: u64,
    pub portfolio_secs: u64,
    pub risk_check_secs: u64,
    pub strategy_secs: u64,
    pub sentiment_secs: u64,
    /// Progress is written to disk every this many passes.
    pub persist_every_passes: u64,
    pub max_errors: usize,
    /// Deadline applied to every exchange and sentiment call.
    pub call_timeout_secs: u64,
    /// Fraction of a loss ceiling at which an early warning is sent.
    pub risk_warning_ratio: Decimal,
    pub sentiment_symbols: Vec<String>,
    pub sentiment_alert_threshold: f64,
    /// Assets valued at par when summing the portfolio.
    pub quote_assets: Vec<String>,
    /// Quote used to price non-quote assets (`ASSET/<valuation_quote>`).
    pub valuation_quote: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            open_orders_secs: 10,
            portfolio_secs: 60,
            risk_check_secs: 60,
            strategy_secs: 300,
            sentiment_secs: 1800,
            persist_every_passes: 10,
            max_errors: 50,
            call_timeout_secs: 15,
            risk_warning_ratio: Decimal::new(8, 1),
            sentiment_symbols: vec!["BTC/USDT".to_string()],
            sentiment_alert_threshold: 0.6,
            quote_assets: vec!["USDT".to_string(), "USDC".to_string(), "USD".to_string()],
            valuation_quote: "USDT".to_string(),
        }
    }
}

// =============================================================================
// Notifications
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Telegram,
    Webhook,
    Email,
}

impl ChannelKind {
    pub const ALL: [Self; 3] = [Self::Telegram, Self::Webhook, Self::Email];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Webhook => "webhook",
            Self::Email => "email",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl fmt::Display for AlertPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => f.write_str("low"),
            Self::Normal => f.write_str("normal"),
            Self::High => f.write_str("high"),
            Self::Critical => f.write_str("critical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRuleConfig {
    pub alert_type: String,
    pub channels: Vec<ChannelKind>,
    #[serde(default)]
    pub priority: AlertPriority,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub max_alerts_per_minute: u32,
    /// Window over which `max_alerts_per_minute` sends are allowed.
    pub cooldown_secs: u64,
    pub send_timeout_secs: u64,
    pub default_channel: ChannelKind,
    /// Rules that replace the built-in mapping for the same alert type.
    pub rules: Vec<AlertRuleConfig>,
    pub telegram: TelegramConfig,
    pub webhook: WebhookConfig,
    pub email: EmailConfig,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_alerts_per_minute: 10,
            cooldown_secs: 60,
            send_timeout_secs: 10,
            default_channel: ChannelKind::Telegram,
            rules: Vec::new(),
            telegram: TelegramConfig::default(),
            webhook: WebhookConfig::default(),
            email: EmailConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub enabled: bool,
    pub bot_token: String,
    pub chat_id: String,
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: "https://api.telegram.org".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub enabled: bool,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_server: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            username: String::new(),
            password: String::new(),
            from: String::new(),
            to: String::new(),
        }
    }
}
