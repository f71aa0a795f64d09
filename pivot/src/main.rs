//! Survey Pivot CLI - Reshape long-format survey exports into wide spreadsheets
//!
//! # Main Commands
//!
//! ```bash
//! survey-pivot pivot export.csv                    # Pivot to export_pivot.xlsx
//! survey-pivot pivot export.csv -p market-visit    # Use a specific profile
//! survey-pivot profile list                        # Manage profiles
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! survey-pivot parse export.csv                    # Dump flat records as JSON
//! survey-pivot questions export.csv                # Show the question column order
//! survey-pivot normalize "['a', 'b']"              # Show how one cell normalizes
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use survey_pivot::logs::{self, log_error, log_info, log_success, log_warning, LogStyle};
use survey_pivot::{
    default_output_path, join_tokens, normalize_cell, parse_response, question_order,
    read_flat_records, read_headers, run, JoinStyle, NormalizeMode, PivotProfile, ProfileRegistry,
    ProfileSource, UnparsedPolicy, DEFAULT_PROFILE,
};

#[derive(Parser)]
#[command(name = "survey-pivot")]
#[command(about = "Pivot long-format survey exports into one row per visit", long_about = None)]
struct Cli {
    /// Only print warnings and errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Print log entries as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Directory of stored profiles (default: .survey-pivot/profiles)
    #[arg(long, global = true)]
    profile_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full run: read, pivot, order, write
    Pivot {
        /// Input CSV file
        input: PathBuf,

        /// Output file, .xlsx or .csv (default: <input>_pivot.xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Profile name or profile JSON file (auto-detect if not specified)
        #[arg(short, long)]
        profile: Option<String>,

        /// Separator between answers of one question
        #[arg(long, value_enum)]
        join: Option<JoinArg>,

        /// Rows per read batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Drop rows whose timestamp cannot be parsed instead of placing them last
        #[arg(long)]
        drop_unparsed: bool,
    },

    /// Parse a CSV file and output the flat records as JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Profile name or profile JSON file (auto-detect if not specified)
        #[arg(short, long)]
        profile: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the question columns in output order
    Questions {
        /// Input CSV file
        input: PathBuf,

        /// Profile name or profile JSON file (auto-detect if not specified)
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Show the tokens one response cell normalizes to
    Normalize {
        /// Raw cell value
        value: String,

        /// Trim brackets and quotes instead of parsing a list
        #[arg(long)]
        strip_brackets: bool,

        /// Separator between tokens
        #[arg(long, value_enum, default_value = "comma-space")]
        join: JoinArg,
    },

    /// Manage pivot profiles
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// List built-in and stored profiles
    List,

    /// Print a profile as JSON
    Show {
        /// Profile name
        name: String,
    },

    /// Import a profile JSON file
    Import {
        /// Profile JSON file to import
        file: PathBuf,
        /// Name for the profile (default: the name in the file)
        #[arg(short, long)]
        name: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum JoinArg {
    /// ","
    Comma,
    /// ", "
    CommaSpace,
}

impl From<JoinArg> for JoinStyle {
    fn from(arg: JoinArg) -> Self {
        match arg {
            JoinArg::Comma => JoinStyle::Comma,
            JoinArg::CommaSpace => JoinStyle::CommaSpace,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    logs::set_style(if cli.json_logs {
        LogStyle::Json
    } else if cli.quiet {
        LogStyle::Quiet
    } else {
        LogStyle::Pretty
    });

    let registry = match &cli.profile_dir {
        Some(dir) => ProfileRegistry::with_dir(dir),
        None => ProfileRegistry::new(),
    };

    let result = match cli.command {
        Commands::Pivot {
            input,
            output,
            profile,
            join,
            batch_size,
            delimiter,
            drop_unparsed,
        } => {
            let overrides = Overrides {
                join: join.map(JoinStyle::from),
                batch_size,
                delimiter,
                drop_unparsed,
            };
            cmd_pivot(&registry, &input, output.as_deref(), profile.as_deref(), overrides)
        }

        Commands::Parse {
            input,
            profile,
            output,
        } => cmd_parse(&registry, &input, profile.as_deref(), output.as_deref()),

        Commands::Questions { input, profile } => {
            cmd_questions(&registry, &input, profile.as_deref())
        }

        Commands::Normalize {
            value,
            strip_brackets,
            join,
        } => cmd_normalize(&value, strip_brackets, join.into()),

        Commands::Profile { action } => cmd_profile(registry, action),
    };

    if let Err(e) = result {
        log_error(format!("Error: {}", e));
        std::process::exit(1);
    }
}

/// Command-line settings that win over the profile.
struct Overrides {
    join: Option<JoinStyle>,
    batch_size: Option<usize>,
    delimiter: Option<char>,
    drop_unparsed: bool,
}

impl Overrides {
    fn apply(&self, profile: &mut PivotProfile) {
        if let Some(join) = self.join {
            profile.join = join;
        }
        if let Some(batch_size) = self.batch_size {
            profile.batch_size = batch_size;
        }
        if self.delimiter.is_some() {
            profile.delimiter = self.delimiter;
        }
        if self.drop_unparsed {
            match profile.timestamp.as_mut() {
                Some(ts) => ts.unparsed = UnparsedPolicy::Drop,
                None => log_warning("--drop-unparsed has no effect: profile has no timestamp column"),
            }
        }
    }
}

/// Resolve `-p`, or pick the best stored or built-in profile for the
/// input header.
fn select_profile(
    registry: &ProfileRegistry,
    input: &Path,
    requested: Option<&str>,
    delimiter: Option<char>,
) -> Result<PivotProfile, Box<dyn std::error::Error>> {
    if let Some(name) = requested {
        let profile = registry.resolve(name)?;
        log_info(format!("📋 Profile: {}", profile.name));
        return Ok(profile);
    }

    let (headers, _) = read_headers(input, delimiter)?;
    match registry.detect(&headers) {
        Some(profile) => {
            log_success(format!("Auto-detected profile: {}", profile.name));
            Ok(profile)
        }
        None => {
            log_warning(format!(
                "No profile matches the input header, falling back to '{}'",
                DEFAULT_PROFILE
            ));
            registry.resolve(DEFAULT_PROFILE).map_err(Into::into)
        }
    }
}

fn cmd_pivot(
    registry: &ProfileRegistry,
    input: &Path,
    output: Option<&Path>,
    profile: Option<&str>,
    overrides: Overrides,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());

    let mut profile = select_profile(registry, input, profile, overrides.delimiter)?;
    overrides.apply(&mut profile);

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(input));
    let summary = run(input, &output, &profile)?;

    let stats = &summary.stats;
    eprintln!("\n📊 Results:");
    eprintln!("   Input rows: {}", stats.input_rows);
    eprintln!("   Visits: {}", stats.records);
    eprintln!("   Question columns: {}", stats.questions);
    if stats.dropped_rows > 0 {
        eprintln!("   Dropped: {}", stats.dropped_rows);
    }
    eprintln!("   💾 Saved ({}) to: {}", summary.format, summary.output.display());
    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_parse(
    registry: &ProfileRegistry,
    input: &Path,
    profile: Option<&str>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let profile = select_profile(registry, input, profile, None)?;
    profile.validate()?;
    let result = read_flat_records(input, &profile.column_selection(), &profile.read_options())?;

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(result.delimiter));
    eprintln!("   Columns: {}", result.headers.join(", "));
    eprintln!("✅ Parsed {} records", result.records.len());

    let json = serde_json::to_string_pretty(&result.records)?;
    write_output(&json, output)?;
    Ok(())
}

fn cmd_questions(
    registry: &ProfileRegistry,
    input: &Path,
    profile: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let profile = select_profile(registry, input, profile, None)?;
    profile.validate()?;
    let result = read_flat_records(input, &profile.column_selection(), &profile.read_options())?;
    let order = question_order(&result.records);

    eprintln!("📋 {} question column(s):\n", order.len());
    for (i, entry) in order.entries.iter().enumerate() {
        let id = entry
            .id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("[{:3}] {:>8}  {}", i + 1, id, entry.question);
    }
    Ok(())
}

fn cmd_normalize(
    value: &str,
    strip: bool,
    join: JoinStyle,
) -> Result<(), Box<dyn std::error::Error>> {
    let mode = if strip {
        NormalizeMode::StripBrackets
    } else {
        NormalizeMode::LiteralList
    };
    if mode == NormalizeMode::LiteralList && !value.trim().is_empty() {
        eprintln!("   Parsed as: {:?}", parse_response(value));
    }
    let tokens = normalize_cell(Some(value), mode);

    eprintln!("   Tokens: {}", serde_json::to_string(&tokens)?);
    println!("{}", join_tokens(&tokens, join));
    Ok(())
}

fn cmd_profile(
    mut registry: ProfileRegistry,
    action: ProfileAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ProfileAction::List => {
            let profiles = registry.list();
            eprintln!("📋 Profiles ({}):\n", profiles.len());
            for (profile, source) in profiles {
                let source = match source {
                    ProfileSource::BuiltIn => "built-in",
                    ProfileSource::Stored => "stored",
                };
                println!("  📄 {} ({})", profile.name, source);
                if !profile.description.is_empty() {
                    println!("     {}", profile.description);
                }
                println!("     Key: {}", profile.identity_columns.join(", "));
                println!();
            }
        }

        ProfileAction::Show { name } => {
            let profile = registry
                .get(&name)
                .ok_or_else(|| format!("Profile not found: {}", name))?;
            println!("{}", profile.to_json()?);
        }

        ProfileAction::Import { file, name } => {
            eprintln!("📥 Importing profile from: {}", file.display());
            let stored = registry.import(&file, name.as_deref())?;
            eprintln!(
                "✅ Profile '{}' saved to {}",
                stored,
                registry.profile_dir().display()
            );
        }
    }

    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
