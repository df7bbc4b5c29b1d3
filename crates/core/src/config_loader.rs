use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads application configuration by layering built-in defaults, the
    /// TOML file (if present) and `AUTOTRADER_`-prefixed environment variables.
    ///
    /// Nested keys use `__` in variable names, e.g. `AUTOTRADER_RISK__MAX_OPEN_ORDERS=5`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<AppConfig> {
        let config: AppConfig = Self::figment(path.as_ref()).extract()?;

        Ok(config)
    }

    /// Loads application configuration with a profile file layered over the base file.
    ///
    /// For `config/autotrader.toml` and profile `paper`, also reads
    /// `config/autotrader.paper.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_with_profile(path: impl AsRef<Path>, profile: &str) -> Result<AppConfig> {
        let path = path.as_ref();
        let stem = path
            .file_stem()
            .map_or_else(|| "autotrader".into(), |s| s.to_string_lossy());
        let profile_path = path.with_file_name(format!("{stem}.{profile}.toml"));

        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Toml::file(profile_path))
            .merge(Env::prefixed("AUTOTRADER_").split("__"))
            .extract()?;

        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("AUTOTRADER_").split("__"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConfigLoader::load(dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.risk.max_open_orders, 10);
        assert_eq!(config.daemon.open_orders_secs, 10);
        assert_eq!(config.notifications.max_alerts_per_minute, 10);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("autotrader.toml");
        fs::write(
            &path,
            r#"
data_dir = "/var/lib/autotrader"

[risk]
max_drawdown_pct = 12.5

[risk.strategy_overrides.grid]
max_open_orders = 30

[strategies.grid]
enabled = true
params = { num_grids = 20, symbol = "ETH/USDT" }

[strategies.scalping]
enabled = false
"#,
        )
        .unwrap();

        let config = ConfigLoader::load(&path).unwrap();

        assert_eq!(config.data_dir, std::path::PathBuf::from("/var/lib/autotrader"));
        assert_eq!(config.risk.max_drawdown_pct, dec!(12.5));
        assert_eq!(config.risk.max_daily_loss_pct, dec!(5));
        assert_eq!(
            config.risk.strategy_overrides["grid"].max_open_orders,
            Some(30)
        );
        assert_eq!(config.strategies["grid"].params["num_grids"], 20);
        assert!(!config.strategies["scalping"].enabled);
    }

    #[test]
    fn test_profile_layer_wins() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("autotrader.toml");
        fs::write(&base, "[daemon]\nstrategy_secs = 300\n").unwrap();
        fs::write(
            dir.path().join("autotrader.paper.toml"),
            "[daemon]\nstrategy_secs = 30\n",
        )
        .unwrap();

        let config = ConfigLoader::load_with_profile(&base, "paper").unwrap();
        assert_eq!(config.daemon.strategy_secs, 30);
    }
}
