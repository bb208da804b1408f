//! Changelog CLI - release notes from merged pull requests

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use changelog_lib::config::{DEFAULT_API_BASE, DEFAULT_JOBS, DEFAULT_REPO, default_cache_dir};
use changelog_lib::{Auth, ChangelogConfig, generate_changelog};
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "changelog")]
#[command(
    about = "Generate a release changelog from the pull requests merged between two refs",
    long_about = "Generate a release changelog from the pull requests merged between two refs.\n\n\
                  Must be run inside a clone of the repository. Pull request descriptions are \
                  cached on disk, so repeated runs only fetch what changed."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    log_verbosity: u8,

    /// Output logs as JSON
    #[arg(long)]
    json: bool,

    /// Repository on GitHub, as owner/name
    #[arg(long, default_value = DEFAULT_REPO)]
    repo: String,

    /// Project name in the title line [default: name part of --repo]
    #[arg(long)]
    project: Option<String>,

    /// Number of concurrent fetch workers
    #[arg(short, long, default_value_t = DEFAULT_JOBS)]
    jobs: usize,

    /// Do not skip `*-testing` tags when picking the previous release
    #[arg(long)]
    with_testing_tags: bool,

    /// Git ref of the previous release [default: nearest earlier tag]
    #[arg(long = "from", value_name = "FROM_REF")]
    from_ref: Option<String>,

    /// Git ref of the release
    #[arg(value_name = "TO_REF")]
    to_ref: String,

    /// Write the changelog here instead of stdout ("-" is stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Directory for cached pull requests [default: $CHANGELOG_CACHE_DIR, else the user cache dir]
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Seconds to sleep after hitting a GitHub rate limit
    #[arg(long, default_value_t = 20, value_name = "SECONDS")]
    rate_limit_delay: u64,

    /// GitHub API base URL
    #[arg(long, default_value = DEFAULT_API_BASE, value_name = "URL")]
    api_base: String,

    /// GitHub token, or user name when combined with --gh-password
    #[arg(long, value_name = "USER_OR_TOKEN")]
    gh_user_or_token: Option<String>,

    /// GitHub password for --gh-user-or-token
    #[arg(long, requires = "gh_user_or_token")]
    gh_password: Option<String>,

    /// Local clone to run git in
    #[arg(long, default_value = ".", value_name = "DIR")]
    repo_dir: PathBuf,

    /// Skip unshallowing and fetching tags
    #[arg(long)]
    no_fetch: bool,
}

impl Cli {
    fn into_config(self) -> ChangelogConfig {
        ChangelogConfig {
            repo: self.repo,
            project: self.project,
            to_ref: self.to_ref,
            from_ref: self.from_ref,
            with_testing_tags: self.with_testing_tags,
            jobs: self.jobs,
            cache_dir: self.cache_dir.unwrap_or_else(default_cache_dir),
            rate_limit_delay: Duration::from_secs(self.rate_limit_delay),
            api_base: self.api_base,
            auth: Auth::from_parts(self.gh_user_or_token, self.gh_password),
            repo_dir: self.repo_dir,
            fetch: !self.no_fetch,
            ..ChangelogConfig::default()
        }
    }
}

/// Initialize tracing subscriber based on verbosity and output format
fn init_tracing(verbose: u8, json: bool) {
    // RUST_LOG wins over -v flags
    let base_filter = match std::env::var("RUST_LOG") {
        Ok(filter) => filter,
        Err(_) => match verbose {
            0 => "warn".to_string(),
            1 => "warn,changelog_lib=info".to_string(),
            2 => "info,changelog_lib=debug".to_string(),
            _ => "debug,changelog_lib=trace".to_string(),
        },
    };

    let filter = EnvFilter::try_new(&base_filter).unwrap_or_else(|_| EnvFilter::new("warn"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_file(verbose >= 3)
                    .with_line_number(verbose >= 3)
                    .with_writer(io::stderr)
                    .compact(),
            )
            .init();
    }
}

fn write_output(output: Option<&PathBuf>, document: &str) -> io::Result<()> {
    match output {
        Some(path) if path.as_os_str() != "-" => fs::write(path, document),
        _ => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(document.as_bytes())?;
            stdout.flush()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.log_verbosity, cli.json);

    let output = cli.output.clone();
    let config = cli.into_config();
    tracing::debug!(repo = %config.repo, to_ref = %config.to_ref, "Changelog CLI starting");

    let document = match generate_changelog(&config).await {
        Ok(document) => document,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = write_output(output.as_ref(), &document) {
        eprintln!("Error: failed to write changelog: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_map_onto_config() {
        let cli = Cli::try_parse_from([
            "changelog",
            "--repo",
            "owner/tool",
            "--from",
            "v1.0",
            "--jobs",
            "3",
            "--rate-limit-delay",
            "5",
            "--gh-user-or-token",
            "secret",
            "--cache-dir",
            "/tmp/changelog-cache",
            "--no-fetch",
            "v1.1",
        ])
        .unwrap();
        let config = cli.into_config();

        assert_eq!(config.repo, "owner/tool");
        assert_eq!(config.project_name(), "tool");
        assert_eq!(config.from_ref.as_deref(), Some("v1.0"));
        assert_eq!(config.to_ref, "v1.1");
        assert_eq!(config.jobs, 3);
        assert_eq!(config.rate_limit_delay, Duration::from_secs(5));
        assert_eq!(config.auth, Auth::Token("secret".into()));
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/changelog-cache"));
        assert!(!config.fetch);
    }

    #[test]
    fn password_requires_user() {
        assert!(Cli::try_parse_from(["changelog", "--gh-password", "pw", "v1.1"]).is_err());
    }
}
