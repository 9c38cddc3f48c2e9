mod history;
mod instagram;
mod oauth;
mod twitter;

use std::{path::PathBuf, process::exit};

use clap::{Parser, Subcommand};
use history::HistoryWriter;
use oauth::Credentials;
use reqwest::Client;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[derive(Parser, Debug)]
#[command(version, about = "Fetches recent social-media posts into local files")]
struct Cli {
    /// Directory the current/history files are written to
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Polls the Instagram Graph API media edge of a user
    Instagram {
        #[arg(long)]
        user_id: String,
        #[arg(long, default_value = instagram::DEFAULT_FIELDS)]
        fields: String,
        #[arg(long, env = "INSTAGRAM_ACCESS_TOKEN", hide_env_values = true)]
        access_token: String,
        #[arg(long, default_value = instagram::DEFAULT_URL)]
        url: String,
    },
    /// Searches recent tweets with OAuth 1.0a user credentials
    Twitter {
        #[arg(long, env = "TWITTER_CONSUMER_KEY", hide_env_values = true)]
        consumer_key: String,
        #[arg(long, env = "TWITTER_CONSUMER_SECRET", hide_env_values = true)]
        consumer_secret: String,
        #[arg(long, env = "TWITTER_ACCESS_TOKEN", hide_env_values = true)]
        access_token: String,
        #[arg(long, env = "TWITTER_ACCESS_TOKEN_SECRET", hide_env_values = true)]
        access_token_secret: String,
        #[arg(long, default_value = twitter::SEARCH_URL)]
        url: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let client = match Client::builder().user_agent(APP_USER_AGENT).build() {
        Ok(ret) => ret,
        Err(error) => {
            eprintln!("Problem while building the HTTP client. {error}");
            exit(1);
        }
    };

    match cli.command {
        Command::Instagram {
            user_id,
            fields,
            access_token,
            url,
        } => {
            let writer = HistoryWriter::new(&cli.out_dir, "instagram");
            match instagram::poll(&client, &writer, &url, &user_id, &fields, &access_token).await
            {
                Ok(data) => println!("{}", serde_json::to_string_pretty(&data).unwrap_or_default()),
                Err(e) => {
                    error!("Instagram poll failed: {e:#}");
                    exit(1);
                }
            }
        }
        Command::Twitter {
            consumer_key,
            consumer_secret,
            access_token,
            access_token_secret,
            url,
        } => {
            let credentials = Credentials {
                consumer_key,
                consumer_secret,
                access_token,
                access_token_secret,
            };
            let writer = HistoryWriter::new(&cli.out_dir, "twitter");
            let tweets = twitter::poll(&client, &writer, &url, &credentials).await;
            if tweets.is_empty() {
                info!("No tweets written to {}", twitter::TWEETS_FILE);
            }
        }
    }
}
