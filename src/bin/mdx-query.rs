use std::io::Read;

use clap::{Parser, ValueEnum};
use serde_json::Value;

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Tsv,
}

#[derive(Parser)]
#[command(name = "mdx-query")]
#[command(about = "Send an MDX query through the MDX query proxy", long_about = None)]
struct Cli {
    /// Proxy base URL.
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Backend server (must be on the proxy's allow-list).
    #[arg(short, long, required_unless_present = "usage")]
    server: Option<String>,

    /// Database (catalog) name.
    #[arg(short, long, required_unless_present = "usage")]
    db: Option<String>,

    /// Backend username.
    #[arg(long, env = "MDX_PROXY_USER", required_unless_present = "usage")]
    user: Option<String>,

    /// Backend password.
    #[arg(long, env = "MDX_PROXY_PASSWORD", hide_env_values = true, required_unless_present = "usage")]
    password: Option<String>,

    #[arg(long)]
    locale: Option<i32>,

    #[arg(long)]
    app_name: Option<String>,

    /// Timeout in seconds, passed to the backend.
    #[arg(long)]
    timeout: Option<i32>,

    /// Query text; read from stdin when omitted.
    #[arg(short, long)]
    query: Option<String>,

    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Print the proxy's usage hint and exit.
    #[arg(long)]
    usage: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    if cli.usage {
        let res = client.get(&cli.url).send().await?;
        println!("{}", res.text().await?);
        return Ok(());
    }

    let query = match cli.query {
        Some(q) => q,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let mut params: Vec<(&str, String)> = vec![
        ("server", cli.server.unwrap_or_default()),
        ("db", cli.db.unwrap_or_default()),
    ];
    if let Some(locale) = cli.locale {
        params.push(("localeIdentifier", locale.to_string()));
    }
    if let Some(app_name) = cli.app_name {
        params.push(("applicationName", app_name));
    }
    if let Some(timeout) = cli.timeout {
        params.push(("timeout", timeout.to_string()));
    }

    let res = client
        .post(&cli.url)
        .query(&params)
        .basic_auth(cli.user.unwrap_or_default(), cli.password)
        .body(query)
        .send()
        .await?;

    let status = res.status();
    let body: Value = res.json().await?;
    if !status.is_success() {
        eprintln!("Error: proxy returned status {}", status);
        eprintln!("{}", serde_json::to_string_pretty(&body)?);
        std::process::exit(1);
    }

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&body)?),
        OutputFormat::Tsv => print_tsv(&body),
    }
    Ok(())
}

fn print_tsv(body: &Value) {
    let empty = Vec::new();
    let columns = body["columns"].as_array().unwrap_or(&empty);
    let header: Vec<&str> = columns.iter().map(|c| c["name"].as_str().unwrap_or("")).collect();
    println!("{}", header.join("\t"));

    for row in body["rows"].as_array().unwrap_or(&empty) {
        let cells: Vec<String> = row
            .as_array()
            .unwrap_or(&empty)
            .iter()
            .map(|v| match v {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        println!("{}", cells.join("\t"));
    }
}
