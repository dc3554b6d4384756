use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "fyers-fetcher")]
#[command(about = "Fetch historical and realtime market data from the Fyers API")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the API credentials JSON file
    #[arg(short, long, default_value = "api_cred.json")]
    pub credentials: String,

    /// Path to the persisted access token
    #[arg(short, long, default_value = "access_token.txt")]
    pub token_file: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch historical candles and save them to CSV
    Fetch {
        /// Path to the data parameters JSON file
        #[arg(short, long, default_value = "data_parameters.json")]
        params: String,

        /// Directory for the output CSV
        #[arg(short, long, default_value = "downloaded_data")]
        output_dir: String,

        /// Seconds to wait for the browser redirect during login
        #[arg(long, default_value_t = 300)]
        login_timeout: u64,
    },

    /// Run the browser login flow and persist a fresh access token
    Login {
        /// Seconds to wait for the browser redirect
        #[arg(long, default_value_t = 300)]
        login_timeout: u64,
    },

    /// Subscribe to realtime ticks and print them until interrupted
    Stream {
        /// Symbols to subscribe to
        #[arg(default_values_t = [
            String::from("NSE:NIFTY50-INDEX"),
            String::from("NSE:BANKNIFTY-INDEX"),
        ])]
        symbols: Vec<String>,

        /// Data mode: `symbolUpdate` (full OHLCV) or `l2Update` (LTP only)
        #[arg(short, long, default_value = "symbolUpdate")]
        mode: String,
    },
}
