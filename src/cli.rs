use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "zipread")]
#[command(version)]
#[command(about = "Index and extract ZIP archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipread data1.zip -d out       extract everything from data1.zip into out/\n  \
  zipread -p foo.zip readme.txt  send readme.txt from foo.zip to stdout\n  \
  zipread -v foo.zip             list entries with sizes and methods")]
pub struct Cli {
    /// ZIP file path
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Entries to write with -p (default: all files)
    #[arg(value_name = "ENTRIES")]
    pub entries: Vec<String>,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR", default_value = ".")]
    pub extract_dir: String,

    /// Keep going when an entry fails to extract
    #[arg(short = 'k')]
    pub keep_going: bool,

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

    /// Default log filter when `RUST_LOG` is not set.
    pub fn default_log_filter(&self) -> &'static str {
        if self.is_very_quiet() {
            "error"
        } else if self.is_quiet() {
            "warn"
        } else {
            "info"
        }
    }
}
