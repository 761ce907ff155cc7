use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

use form_scout::llm::{provider_from_config, ProviderKind};
use form_scout::scraping::FormParser;
use form_scout::tools::autofill::{answer_form, AutofillOptions};
use form_scout::AppState;

const USAGE: &str = "usage:
  form-scout parse <url> [--out FILE] [--compact]
  form-scout answer <url> [--provider groq|gemini] [--submit] [--lenient] [--delay-ms N]";

#[derive(Debug, PartialEq)]
enum Command {
    Parse {
        url: String,
        out: Option<PathBuf>,
        compact: bool,
    },
    Answer {
        url: String,
        provider: Option<ProviderKind>,
        submit: bool,
        lenient: bool,
        delay_ms: Option<u64>,
    },
}

/// `--flag value` or `--flag=value`.
fn flag_value(
    arg: &str,
    name: &str,
    rest: &mut impl Iterator<Item = String>,
) -> Option<Result<String, String>> {
    if arg == name {
        return Some(rest.next().ok_or_else(|| format!("{} needs a value", name)));
    }
    arg.strip_prefix(name)
        .and_then(|r| r.strip_prefix('='))
        .map(|v| Ok(v.to_string()))
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Command, String> {
    let mut args = args.into_iter();
    let sub = args.next().ok_or("missing command")?;
    let mut url = None;
    let mut out = None;
    let mut compact = false;
    let mut provider = None;
    let mut submit = false;
    let mut lenient = false;
    let mut delay_ms = None;

    while let Some(arg) = args.next() {
        if let Some(v) = flag_value(&arg, "--out", &mut args) {
            out = Some(PathBuf::from(v?));
        } else if let Some(v) = flag_value(&arg, "--provider", &mut args) {
            provider = Some(v?.parse::<ProviderKind>()?);
        } else if let Some(v) = flag_value(&arg, "--delay-ms", &mut args) {
            let v = v?;
            delay_ms = Some(
                v.parse::<u64>()
                    .map_err(|_| format!("invalid --delay-ms '{}'", v))?,
            );
        } else if arg == "--compact" {
            compact = true;
        } else if arg == "--submit" {
            submit = true;
        } else if arg == "--lenient" {
            lenient = true;
        } else if arg.starts_with("--") {
            return Err(format!("unknown option {}", arg));
        } else if url.is_none() {
            url = Some(arg);
        } else {
            return Err(format!("unexpected argument {}", arg));
        }
    }

    let url = url.ok_or("missing form URL")?;
    match sub.as_str() {
        "parse" => Ok(Command::Parse { url, out, compact }),
        "answer" => Ok(Command::Answer {
            url,
            provider,
            submit,
            lenient,
            delay_ms,
        }),
        other => Err(format!("unknown command {}", other)),
    }
}

async fn run(command: Command) -> Result<()> {
    let http_client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()?;
    let state = AppState::new(http_client);

    match command {
        Command::Parse { url, out, compact } => {
            let parser = FormParser::new(
                state.http_client.clone(),
                state.config.resolve_form_timeout(),
            );
            let form = parser.parse(&url).await?;
            let json = if compact {
                serde_json::to_string(&form)?
            } else {
                serde_json::to_string_pretty(&form)?
            };
            match out {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Saved {} questions to {}", form.questions_count, path.display());
                }
                None => println!("{}", json),
            }
        }
        Command::Answer {
            url,
            provider,
            submit,
            lenient,
            delay_ms,
        } => {
            let kind = provider.unwrap_or_else(|| state.config.resolve_provider());
            let provider = provider_from_config(state.http_client.clone(), &state.config, kind)?;
            info!("Answering with {} ({})", provider.name(), provider.model());

            let mut options = AutofillOptions::from_config(&state.config);
            options.submit = submit;
            if lenient {
                options.strict = false;
            }
            if let Some(ms) = delay_ms {
                options.delay = Duration::from_millis(ms);
            }

            let report = answer_form(&state, provider.as_ref(), &url, options).await?;
            println!("POST {}", report.payload.action);
            for (key, value) in report.payload.entry_pairs() {
                println!("{} -> {}", key, value);
            }
            for s in &report.skipped {
                println!(
                    "skipped {}: {}",
                    s.entry_id.as_deref().unwrap_or("-"),
                    s.reason
                );
            }
            if let Some(status) = report.submission_status {
                println!("submitted: HTTP {}", status);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let command = match parse_args(std::env::args().skip(1)) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{}\n{}", msg, USAGE);
            std::process::exit(2);
        }
    };

    if let Err(e) = run(command).await {
        error!("{:#}", e);
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_command_with_flags() {
        assert_eq!(
            parse_args(args(&["parse", "https://f/viewform", "--out=form.json", "--compact"])),
            Ok(Command::Parse {
                url: "https://f/viewform".into(),
                out: Some(PathBuf::from("form.json")),
                compact: true,
            })
        );
    }

    #[test]
    fn answer_command_with_flags() {
        assert_eq!(
            parse_args(args(&[
                "answer",
                "--provider",
                "gemini",
                "https://f/viewform",
                "--submit",
                "--lenient",
                "--delay-ms",
                "0",
            ])),
            Ok(Command::Answer {
                url: "https://f/viewform".into(),
                provider: Some(ProviderKind::Gemini),
                submit: true,
                lenient: true,
                delay_ms: Some(0),
            })
        );
    }

    #[test]
    fn bad_arguments() {
        assert!(parse_args(args(&[])).is_err());
        assert!(parse_args(args(&["parse"])).is_err());
        assert!(parse_args(args(&["answer", "u", "--provider"])).is_err());
        assert!(parse_args(args(&["answer", "u", "--provider", "x"])).is_err());
        assert!(parse_args(args(&["answer", "u", "--nope"])).is_err());
        assert!(parse_args(args(&["fill", "u"])).is_err());
        assert!(parse_args(args(&["parse", "u", "v"])).is_err());
    }
}
