use anyhow::{bail, Context, Result};
use chaser_fingerprint::validate::{run_fingerprint_tests, Subject, TestOptions, TestReport};
use chaser_fingerprint::{
    Compiler, FingerprintGenerator, FingerprintProfile, GenerateOptions, NativeWrapper, Window,
    WindowConfig,
};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "chaser-fingerprint")]
#[command(about = "Generate browser fingerprint profiles and compile them into injection scripts")]
struct Cli {
    /// Log debug output to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a profile and print it as JSON
    Generate {
        /// chrome, chrome-120, edge, firefox-121, ...
        #[arg(long)]
        browser: Option<String>,

        /// windows, macos or linux
        #[arg(long)]
        os: Option<String>,

        /// IANA timezone of the proxy exit node
        #[arg(long)]
        timezone: Option<String>,

        /// Primary language of the proxy exit node (BCP 47)
        #[arg(long)]
        language: Option<String>,

        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,

        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,

        /// Generation options as JSON; flags override its fields
        #[arg(long, value_name = "FILE")]
        options: Option<PathBuf>,

        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Copy a saved profile with a fresh noise seed and local IP
    Reseed {
        profile: PathBuf,

        #[arg(long)]
        seed: Option<u64>,

        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Compile a profile into an injection script
    Compile {
        profile: PathBuf,

        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,

        /// Single-line output
        #[arg(long)]
        compact: bool,

        /// Compile even if the profile fails consistency checks
        #[arg(long)]
        force: bool,
    },

    /// Run consistency checks against a profile
    Check {
        profile: PathBuf,

        /// Also install the compiled script into a simulated window and
        /// read it back the way a page would
        #[arg(long)]
        live: bool,

        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    match cli.command {
        Command::Generate {
            browser,
            os,
            timezone,
            language,
            lat,
            lon,
            seed,
            options,
            out,
        } => {
            let mut opts = match options {
                Some(path) => GenerateOptions::from_json(&read(&path)?)
                    .with_context(|| format!("invalid options in {}", path.display()))?,
                None => GenerateOptions::new(),
            };
            if let Some(browser) = browser {
                opts = opts.browser(browser);
            }
            if let Some(os) = os {
                opts = opts.os(os);
            }
            if timezone.is_some() || language.is_some() || lat.is_some() {
                let mut hint = opts.network_hint.take().unwrap_or_default();
                if let Some(zone) = timezone {
                    hint = hint.timezone(zone);
                }
                if let Some(language) = language {
                    hint = hint.language(language);
                }
                if let (Some(lat), Some(lon)) = (lat, lon) {
                    hint = hint.coordinates(lat, lon);
                }
                opts = opts.network_hint(hint);
            }

            let profile = generator(seed)
                .generate(&opts)
                .context("failed to generate profile")?;
            info!(
                browser = %profile.browser.kind,
                os = %profile.os.kind,
                timezone = %profile.timezone.name,
                "generated profile"
            );
            write(out.as_deref(), &profile.to_json_pretty())
        }
        Command::Reseed { profile, seed, out } => {
            let json = read(&profile)?;
            let profile = generator(seed)
                .from_template_json(&json)
                .with_context(|| format!("invalid profile in {}", profile.display()))?;
            write(out.as_deref(), &profile.to_json_pretty())
        }
        Command::Compile {
            profile,
            out,
            compact,
            force,
        } => {
            let profile = load(&profile)?;
            let report = run_fingerprint_tests(Subject::Profile(&profile), TestOptions::default());
            if !report.all_passed() {
                for failure in report.failures() {
                    warn!(rule = %failure.name, expected = %failure.expected, actual = %failure.actual, "inconsistent profile");
                }
                if !force {
                    bail!(
                        "profile failed {} of {} consistency checks (use --force to compile anyway)",
                        report.summary.failed,
                        report.summary.total
                    );
                }
            }
            let compiler = if compact { Compiler::compact() } else { Compiler::new() };
            let script = compiler.compile_script(&profile);
            info!(blocks = ?script.block_names(), "compiled script");
            write(out.as_deref(), script.as_str())
        }
        Command::Check {
            profile,
            live,
            json,
        } => {
            let profile = load(&profile)?;
            let mut report = run_fingerprint_tests(Subject::Profile(&profile), TestOptions::default());
            if live {
                report.merge(check_live(&profile));
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report);
            }
            if !report.all_passed() {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn generator(seed: Option<u64>) -> FingerprintGenerator {
    match seed {
        Some(seed) => FingerprintGenerator::with_seed(seed),
        None => FingerprintGenerator::new(),
    }
}

fn check_live(profile: &FingerprintProfile) -> TestReport {
    let config = if profile.is_chromium() {
        WindowConfig::headless_chrome()
    } else {
        WindowConfig::firefox()
    };
    let window = Window::new(config);
    let script = Compiler::new().compile_script(profile);
    let installed = script.install(&window, &NativeWrapper::isolated());
    for (block, error) in &installed.failed {
        warn!(%block, %error, "override did not install");
    }
    run_fingerprint_tests(Subject::Live(&window), TestOptions::expecting(profile))
}

fn load(path: &Path) -> Result<FingerprintProfile> {
    FingerprintProfile::from_json(&read(path)?)
        .with_context(|| format!("invalid profile in {}", path.display()))
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write(out: Option<&Path>, contents: &str) -> Result<()> {
    match out {
        Some(path) => {
            fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "wrote output");
        }
        None => println!("{}", contents),
    }
    Ok(())
}
