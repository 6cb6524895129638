use clap::Parser;
use pawkv::cli::commands::{self, set::SetOptions};
use pawkv::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

/// Log to stderr; stdout carries command output. `RUST_LOG` overrides `-v`.
fn init_logging(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::List {
            ref filter,
            item_type,
        } => commands::list::execute(&cli, filter.as_deref(), item_type).await,
        Commands::Get { ref name, exact } => commands::get::execute(&cli, name, exact).await,
        Commands::Set {
            ref name,
            item_type,
            ref username,
            ref url,
            ref note,
            icon,
        } => {
            let opts = SetOptions {
                item_type,
                username: username.clone(),
                url: url.clone(),
                note: note.clone(),
                icon,
            };
            commands::set::execute(&cli, name, opts).await
        }
        Commands::Delete { ref name, force } => commands::delete::execute(&cli, name, force).await,
        Commands::Rename { ref old, ref new } => commands::rename::execute(&cli, old, new).await,
        Commands::Audit { ref corpus } => commands::audit_cmd::execute(&cli, corpus.clone()).await,
        Commands::Import { ref file } => commands::import_cmd::execute(&cli, file).await,
        Commands::Export { ref output } => commands::export::execute(&cli, output.clone()).await,
        Commands::Completions { shell } => commands::completions::execute(shell),
    };

    if let Err(e) = result {
        pawkv::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}
