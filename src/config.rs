use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use clap::builder::RangedU64ValueParser;

use crate::background_services::{
    departure_fetcher::DEFAULT_ENDPOINT, display_controller::RefreshPeriods,
};

/// Display real time information of Wiener Linien stations
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// RBL numbers of the stations
    #[arg(required = true, num_args = 1..)]
    pub rbl: Vec<u32>,

    /// Key for the Wiener Linien API, only needed by older API versions
    #[arg(long, env = "WIENER_LINIEN_API_KEY")]
    pub api_key: Option<String>,

    /// Monitor endpoint of the realtime API
    #[arg(long, env = "WIENER_LINIEN_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: u64,

    /// Refresh period in seconds in slow mode
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub slow_secs: u64,

    /// Refresh period in seconds in fast mode
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub fast_secs: u64,

    /// Characters per display row
    #[arg(
        long,
        default_value_t = 16,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub columns: usize,

    /// Rows of the display
    #[arg(
        long,
        default_value_t = 2,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub rows: usize,

    /// Where the daily log files go
    #[arg(long, env = "LOG_DIR", default_value = "./logs")]
    pub log_dir: PathBuf,
}

impl Args {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn refresh_periods(&self) -> RefreshPeriods {
        RefreshPeriods {
            slow: Duration::from_secs(self.slow_secs),
            fast: Duration::from_secs(self.fast_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_command() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() -> Result<(), anyhow::Error> {
        let args = Args::try_parse_from(["wiener_linien_board", "4111", "4118"])?;

        assert_eq!(args.rbl, [4111, 4118]);
        assert_eq!(args.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(args.refresh_periods(), RefreshPeriods::default());
        assert_eq!(args.timeout(), Duration::from_secs(10));
        assert_eq!((args.columns, args.rows), (16, 2));

        Ok(())
    }

    #[test]
    fn test_api_key() -> Result<(), anyhow::Error> {
        let args =
            Args::try_parse_from(["wiener_linien_board", "--api-key", "secret", "4111"])?;

        assert_eq!(args.api_key.as_deref(), Some("secret"));

        Ok(())
    }

    #[test]
    fn test_zero_rejected() {
        for flag in ["--slow-secs", "--fast-secs", "--timeout-secs", "--columns", "--rows"] {
            assert!(
                Args::try_parse_from(["wiener_linien_board", flag, "0", "4111"]).is_err(),
                "{flag} accepted 0"
            );
        }

        let args = Args::try_parse_from(["wiener_linien_board", "--fast-secs", "1", "4111"]);
        assert!(args.is_ok());
    }

    #[test]
    fn test_rbl_required() {
        assert!(Args::try_parse_from(["wiener_linien_board"]).is_err());
        assert!(Args::try_parse_from(["wiener_linien_board", "Stephansplatz"]).is_err());
    }
}
