//! Minimal CLI parsing for run mode overrides.

use std::env;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CliOptions {
    /// Run a single sync pass and exit
    pub once: bool,
    /// Cron expression overriding `SYNC_CRON`
    pub cron_override: Option<String>,
}

impl CliOptions {
    pub fn from_args() -> Self {
        Self::parse(env::args().skip(1))
    }

    fn parse(args: impl IntoIterator<Item = String>) -> Self {
        let mut options = CliOptions::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--once" => options.once = true,
                "--cron" => {
                    if let Some(value) = args.next() {
                        options.cron_override = Some(value);
                    }
                }
                _ if arg.starts_with("--cron=") => {
                    if let Some(value) = arg.split_once('=').map(|(_, v)| v) {
                        options.cron_override = Some(value.to_string());
                    }
                }
                _ => {}
            }
        }
        options
    }
}
