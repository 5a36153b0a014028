use std::collections::BTreeMap;

use clap::{Args, Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use destination_relay::destination::{
    build, AuthToken, DestinationConfig, HttpVerb, ProxyRequestInputs, RuntimeMode,
};

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Operator CLI for the destination relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the outbound request the relay would send, without sending it
    Describe(DescribeArgs),
    /// Call a relay route with a bearer token
    Call {
        /// Relay path, e.g. /sap/opu/odata/sap/ZSA_OPPORTUNITY_ODATA_SRV/
        path: String,
        #[arg(short, long, default_value = "http://localhost:3000")]
        url: String,
        /// Bearer JWT for the relay
        #[arg(short, long)]
        token: Option<String>,
    },
    /// Check relay liveness
    Health {
        #[arg(short, long, default_value = "http://localhost:3000")]
        url: String,
    },
}

#[derive(Args)]
struct DescribeArgs {
    /// Path inside the destination
    path: String,
    /// Destination base URL
    #[arg(long)]
    destination_url: String,
    #[arg(long, default_value = "GET")]
    verb: String,
    /// Destination credential as `TYPE VALUE`, e.g. `Basic dXNlcjpwdw==`
    #[arg(long)]
    auth: Option<String>,
    #[arg(long, default_value = "http://connectivityproxy.internal.cf.eu10.hana.ondemand.com:20003")]
    proxy: String,
    #[arg(long, default_value = "<proxy-token>")]
    proxy_token: String,
    #[arg(long)]
    content_type: Option<String>,
    /// JSON payload
    #[arg(long)]
    payload: Option<String>,
    /// Form field as `name=value`; repeatable
    #[arg(long = "form", value_parser = parse_field)]
    form: Vec<(String, String)>,
    #[arg(long)]
    full_response: bool,
    #[arg(long)]
    tech_error_only: bool,
    #[arg(long)]
    binary: bool,
    /// Build as in local mode (no proxy)
    #[arg(long)]
    local: bool,
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{}'", raw))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Describe(args) => describe(args)?,
        Commands::Call { path, url, token } => {
            let mut headers = HeaderMap::new();
            if let Some(token) = token {
                headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token))?);
            }
            let res = reqwest::Client::new()
                .get(format!("{}{}", url.trim_end_matches('/'), path))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Health { url } => {
            let res = reqwest::get(format!("{}/health", url.trim_end_matches('/'))).await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

fn describe(args: DescribeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let verb: HttpVerb = args.verb.parse()?;
    let payload: Option<Value> = args.payload.as_deref().map(serde_json::from_str).transpose()?;
    let form: Option<BTreeMap<String, String>> =
        (!args.form.is_empty()).then(|| args.form.into_iter().collect());

    let mut destination = DestinationConfig::unauthenticated(args.destination_url);
    if let Some(auth) = &args.auth {
        let (token_type, value) = auth
            .split_once(' ')
            .ok_or("--auth must look like 'TYPE VALUE'")?;
        destination.auth_tokens.push(AuthToken {
            token_type: token_type.to_string(),
            value: value.to_string(),
        });
    }

    let descriptor = build(ProxyRequestInputs {
        path: &args.path,
        destination: &destination,
        proxy_url: Some(&args.proxy),
        proxy_access_token: &args.proxy_token,
        verb,
        content_type: args.content_type.as_deref(),
        payload: payload.as_ref(),
        form_data: form.as_ref(),
        full_response: args.full_response,
        tech_error_only: args.tech_error_only,
        binary: args.binary,
        mode: if args.local { RuntimeMode::Local } else { RuntimeMode::Cloud },
    });

    println!("{}", serde_json::to_string_pretty(&descriptor)?);
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: relay returned status {}", status);
        eprintln!("Response: {}", text);
        return Ok(());
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
