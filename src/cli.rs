use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "razip")]
#[command(version)]
#[command(about = "Random-access ZIP reader with HTTP URL support", long_about = None)]
#[command(after_help = "Examples:\n  \
  razip data1.zip -x joe        extract all files except joe from data1.zip\n  \
  razip -p foo.zip | more       send contents of foo.zip via pipe into more\n  \
  razip -t foo.zip              check every entry's CRC-32\n  \
  razip -l https://example.com/archive.zip   list files from remote ZIP")]
pub struct Cli {
    /// ZIP file path or HTTP URL
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Entries to extract (default: all); a name ending in '/' selects a directory
    #[arg(value_name = "ENTRIES")]
    pub entries: Vec<String>,

    /// List entries (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely: sizes, ratio, timestamp, encryption
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Test archive integrity by decoding every entry
    #[arg(short = 't')]
    pub test: bool,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Exclude entries whose names contain any of these
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

    /// Quiet mode
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    /// Whether an entry passes the positional selection and `-x` exclusions.
    pub fn selects(&self, name: &str) -> bool {
        let basename = name.trim_end_matches('/').rsplit('/').next().unwrap_or(name);
        let requested = self.entries.is_empty()
            || self.entries.iter().any(|wanted| {
                name == wanted
                    || basename == wanted
                    || (wanted.ends_with('/') && name.starts_with(wanted.as_str()))
            });
        requested && !self.exclude.iter().any(|x| name.contains(x.as_str()))
    }

    /// Why an already existing output file is skipped, or `None` when `-o`
    /// allows overwriting it. `-n` takes precedence over `-o`.
    pub fn skip_existing(&self) -> Option<&'static str> {
        if self.never_overwrite {
            Some("file exists")
        } else if !self.overwrite {
            Some("use -o to overwrite")
        } else {
            None
        }
    }
}
