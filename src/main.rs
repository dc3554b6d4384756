use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use clap::Parser;
use log::{info, warn};

use fyers_fetcher::auth::{auth_url, CallbackListener, TokenExchanger};
use fyers_fetcher::cli::{Cli, Commands};
use fyers_fetcher::config::{read_access_token, write_access_token, Credentials, FetchParams};
use fyers_fetcher::error::{AppError, Result};
use fyers_fetcher::fetch::HistoryClient;
use fyers_fetcher::records::{csv_filename, save_candles};
use fyers_fetcher::stream::{stream_url, TickMode, TickStream, STREAM_BASE_URL};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            ref params,
            ref output_dir,
            login_timeout,
        } => run_fetch(&cli, params, output_dir, Duration::from_secs(login_timeout)).await,
        Commands::Login { login_timeout } => {
            run_login(&cli, Duration::from_secs(login_timeout)).await
        }
        Commands::Stream {
            ref symbols,
            ref mode,
        } => run_stream(&cli, symbols, mode).await,
    }
}

async fn run_fetch(
    cli: &Cli,
    params_path: &str,
    output_dir: &str,
    login_timeout: Duration,
) -> Result<()> {
    let credentials = Credentials::load(&cli.credentials)?;
    let params = FetchParams::load(params_path)?;

    let access_token = if prompt_has_token()? {
        read_access_token(&cli.token_file)?
    } else {
        let token = login(&credentials, login_timeout).await?;
        write_access_token(&cli.token_file, &token)?;
        token
    };

    let client = HistoryClient::new(credentials.client_id.clone(), access_token);
    let candles = client
        .fetch(
            &params.script_name,
            &params.resolution,
            params.start()?,
            params.end()?,
        )
        .await?;

    if candles.is_empty() {
        warn!("no data retrieved, nothing to save");
        return Ok(());
    }

    let filename = csv_filename(
        &params.script_name,
        &params.resolution,
        &params.start_date,
        &params.end_date,
    );
    let path = save_candles(&candles, Path::new(output_dir), &filename)?;
    info!("saved {} candles to {}", candles.len(), path.display());
    Ok(())
}

async fn run_login(cli: &Cli, login_timeout: Duration) -> Result<()> {
    let credentials = Credentials::load(&cli.credentials)?;
    let token = login(&credentials, login_timeout).await?;
    write_access_token(&cli.token_file, &token)
}

/// Browser login: print the auth link, capture the redirect, exchange the code.
async fn login(credentials: &Credentials, timeout: Duration) -> Result<String> {
    let link = auth_url(credentials)?;
    info!("open the following link in your browser and authenticate: {link}");

    let port = credentials.redirect_port()?;
    let listener = CallbackListener::bind(port).await?;
    let auth_code = listener.wait_for_code(timeout).await?;

    TokenExchanger::new().exchange(credentials, &auth_code).await
}

async fn run_stream(cli: &Cli, symbols: &[String], mode: &str) -> Result<()> {
    let credentials = Credentials::load(&cli.credentials)?;
    let access_token = read_access_token(&cli.token_file)?;
    let mode = TickMode::parse(mode)
        .ok_or_else(|| AppError::message(format!("unsupported data mode `{mode}`")))?;

    let url = stream_url(STREAM_BASE_URL, &credentials.client_id, &access_token);
    let stream = TickStream::new(url, symbols.to_vec(), mode);

    tokio::select! {
        result = stream.run(|tick| println!("{tick}")) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, closing");
            Ok(())
        }
    }
}

fn prompt_has_token() -> Result<bool> {
    print!("Do you have an access token? (y/n): ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
