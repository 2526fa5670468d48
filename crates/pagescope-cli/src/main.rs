use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use pagescope_cli::{CaptureArgs, OutputFormat, commands};
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pagescope")]
#[command(author, version, long_about = None)]
#[command(
    about = "Observe a web page's API traffic, clicks and tracking globals",
    long_about = "pagescope loads a page in headless Chrome and reports the JSON responses it \
                  fetched, the clicks it registered and well-known globals such as user, \
                  dataLayer and ShopifyAnalytics.meta, either one page at a time or over HTTP."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a single page and print its report
    Analyze {
        /// Page to analyze (a bare host gets https://)
        #[arg(value_name = "URL")]
        url: String,

        /// Also write the JSON report to a file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "pretty")]
        format: OutputFormat,

        #[command(flatten)]
        capture: CaptureArgs,
    },

    /// Serve POST /analyze over HTTP
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 3000, env = "PAGESCOPE_PORT")]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1", env = "PAGESCOPE_HOST")]
        host: IpAddr,

        #[command(flatten)]
        capture: CaptureArgs,
    },

    /// Render a previously saved report
    Show {
        /// Report written by `analyze --output`
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "pretty")]
        format: OutputFormat,
    },

    /// Generate shell completion scripts
    #[command(after_help = "SUPPORTED SHELLS:
    bash, zsh, fish, powershell, elvish

INSTALLATION:
    Bash:
        pagescope completion --shell bash > ~/.local/share/bash-completion/completions/pagescope
        (or add `source <(pagescope completion --shell bash)` to ~/.bashrc)

    Zsh:
        pagescope completion --shell zsh > \"${fpath[1]}/_pagescope\"
        (then restart your shell or run `compinit` from ~/.zshrc)

    Fish:
        pagescope completion --shell fish > ~/.config/fish/completions/pagescope.fish")]
    Completion {
        /// Shell to generate completions for
        #[arg(long, value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Analyze {
            url,
            output,
            format,
            capture,
        } => commands::analyze::execute(&url, output.as_deref(), format, &capture),
        Commands::Serve {
            port,
            host,
            capture,
        } => commands::serve::execute(host, port, &capture),
        Commands::Show { file, format } => commands::show::execute(&file, format),
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            commands::completion::execute(shell, &mut cmd)
        }
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new(
            "pagescope=debug,pagescope_cli=debug,pagescope_core=debug,pagescope_browser=debug,pagescope_server=debug",
        )
    } else {
        EnvFilter::new(
            "pagescope=info,pagescope_cli=info,pagescope_core=info,pagescope_browser=info,pagescope_server=info",
        )
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}
