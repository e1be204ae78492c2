use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "docpack")]
#[command(version)]
#[command(about = "List, test and extract document packages, damaged ones included", long_about = None)]
#[command(after_help = "Examples:\n  \
  docpack report.odt -x Thumbnails      extract everything but the thumbnails\n  \
  docpack -p report.odt content.xml     print content.xml to stdout\n  \
  docpack -r -l broken.odt              list entries found by a recovery scan")]
pub struct Cli {
    /// Package file path
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Entries to extract (default: all)
    #[arg(value_name = "ENTRIES")]
    pub files: Vec<String>,

    /// List entries (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Extract entries to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract entries into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Exclude entries that follow
    #[arg(short = 'x', value_name = "PATTERN", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Test entries: decode each one and verify its CRC
    #[arg(short = 't')]
    pub test: bool,

    /// Ignore the central directory and scan for local headers
    #[arg(short = 'r')]
    pub force_recovery: bool,

    /// Retry with a recovery scan when the central directory is broken
    #[arg(long)]
    pub fallback_recovery: bool,

    /// Log filter, e.g. `debug` or `docpack::zip=trace` (overrides RUST_LOG)
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Filter handed to the subscriber; `-qq` silences everything but errors.
    pub fn log_filter(&self) -> Option<&str> {
        match &self.log_level {
            Some(level) => Some(level),
            None if self.is_very_quiet() => Some("error"),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_flags() {
        let cli = Cli::parse_from(["docpack", "-r", "--fallback-recovery", "a.odt", "content.xml"]);
        assert!(cli.force_recovery);
        assert!(cli.fallback_recovery);
        assert_eq!(cli.files, vec!["content.xml"]);
    }

    #[test]
    fn test_log_filter() {
        let cli = Cli::parse_from(["docpack", "-qq", "a.odt"]);
        assert_eq!(cli.log_filter(), Some("error"));
        let cli = Cli::parse_from(["docpack", "--log-level", "debug", "-q", "a.odt"]);
        assert_eq!(cli.log_filter(), Some("debug"));
        assert!(cli.is_quiet());
        let cli = Cli::parse_from(["docpack", "-p", "a.odt"]);
        assert_eq!(cli.log_filter(), None);
        assert!(cli.is_quiet());
    }
}
