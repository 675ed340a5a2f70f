use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;

mod client;

use client::{Caller, Client};

#[derive(Parser)]
#[command(name = "snapmatch", about = "SnapMatch event photo CLI")]
struct Cli {
    /// snapmatchd base URL
    #[arg(long, env = "SNAPMATCH_SERVER", default_value = "http://localhost:8080", global = true)]
    server: String,

    #[command(flatten)]
    caller: CallerArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CallerArgs {
    /// Email of the signed-in user
    #[arg(long, env = "SNAPMATCH_USER_EMAIL", global = true)]
    email: Option<String>,
    /// Display name, used when no email is given
    #[arg(long, env = "SNAPMATCH_USER_NAME", global = true)]
    name: Option<String>,
    /// Role namespace (default: user)
    #[arg(long, env = "SNAPMATCH_USER_ROLE", global = true)]
    role: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage events
    #[command(subcommand)]
    Events(EventCommands),
    /// Upload images to your gallery or into an event
    Upload {
        /// Event to upload into
        #[arg(short, long)]
        event: Option<String>,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Upload a selfie and find the photos you appear in
    Selfie { file: PathBuf },
    /// Show daemon status
    Status,
}

#[derive(Subcommand)]
enum EventCommands {
    /// List all events
    List,
    /// Create an event
    Create {
        #[arg(long)]
        name: String,
        /// Event date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        #[arg(long)]
        location: String,
    },
    /// Show one event
    Show { id: String },
    /// Consolidate an event's photos into its folder
    Save { id: String },
    /// Detect and group faces in an event's photos
    Faces { id: String },
    /// Download the event's QR code
    Qr {
        id: String,
        /// Output path (default: event-<id>-qr.png)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let caller = Caller {
        email: cli.caller.email,
        name: cli.caller.name,
        role: cli.caller.role,
    };
    tracing::debug!(server = %cli.server, "using snapmatchd");
    let client = Client::new(&cli.server, caller);

    match cli.command {
        Commands::Events(cmd) => events(&client, cmd).await?,
        Commands::Upload { event, files } => {
            let path = match &event {
                Some(id) => format!("/events/{id}/images"),
                None => "/images".to_string(),
            };
            let body = client.upload(&path, "images", &files).await?;
            match event {
                Some(_) => print_event(&body),
                None => {
                    let images = body["images"].as_array().cloned().unwrap_or_default();
                    println!("Uploaded {} image(s):", images.len());
                    for image in images {
                        println!("  {}", image["url"].as_str().unwrap_or_default());
                    }
                }
            }
        }
        Commands::Selfie { file } => {
            let body = client.upload("/selfies", "selfie", &[file]).await?;
            println!("{}", body["message"].as_str().unwrap_or_default());
            for m in body["matches"].as_array().into_iter().flatten() {
                println!(
                    "  {:>6.2}%  {}",
                    m["similarity"].as_f64().unwrap_or_default(),
                    m["url"].as_str().unwrap_or_default()
                );
            }
        }
        Commands::Status => {
            let body = client.get_json("/status").await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}

async fn events(client: &Client, cmd: EventCommands) -> Result<()> {
    match cmd {
        EventCommands::List => {
            let body = client.get_json("/events").await?;
            let events = body.as_array().cloned().unwrap_or_default();
            if events.is_empty() {
                println!("No events");
            }
            for event in events {
                println!(
                    "{}  {}  {}  {}  ({} photos)",
                    event["id"].as_str().unwrap_or_default(),
                    event["date"].as_str().unwrap_or_default(),
                    event["name"].as_str().unwrap_or_default(),
                    event["location"].as_str().unwrap_or_default(),
                    event["photoCount"].as_u64().unwrap_or_default()
                );
            }
        }
        EventCommands::Create {
            name,
            date,
            location,
        } => {
            let body = client
                .post_json(
                    "/events",
                    &json!({ "name": name, "date": date, "location": location }),
                )
                .await?;
            print_event(&body);
        }
        EventCommands::Show { id } => print_event(&client.get_json(&format!("/events/{id}")).await?),
        EventCommands::Save { id } => {
            print_event(&client.post_empty(&format!("/events/{id}/save")).await?)
        }
        EventCommands::Faces { id } => {
            let body = client.get_json(&format!("/events/{id}/faces")).await?;
            let groups = body["groups"].as_array().cloned().unwrap_or_default();
            println!(
                "{} image(s) with faces, {} group(s)",
                body["images"].as_array().map_or(0, Vec::len),
                groups.len()
            );
            for group in groups {
                let images = group["images"].as_array().cloned().unwrap_or_default();
                println!(
                    "{} ({} image(s))",
                    group["faceId"].as_str().unwrap_or_default(),
                    images.len()
                );
                for image in images {
                    println!("  {}", image["url"].as_str().unwrap_or_default());
                }
            }
        }
        EventCommands::Qr { id, output } => {
            let png = client.get_bytes(&format!("/events/{id}/qr")).await?;
            let path = output.unwrap_or_else(|| PathBuf::from(format!("event-{id}-qr.png")));
            tokio::fs::write(&path, png)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("QR code saved to {}", path.display());
        }
    }
    Ok(())
}

fn print_event(event: &Value) {
    println!("Event {}", event["id"].as_str().unwrap_or_default());
    println!("  name:     {}", event["name"].as_str().unwrap_or_default());
    println!("  date:     {}", event["date"].as_str().unwrap_or_default());
    println!("  location: {}", event["location"].as_str().unwrap_or_default());
    println!("  photos:   {}", event["photoCount"].as_u64().unwrap_or_default());
    if let Some(modified) = event["lastModified"].as_str() {
        println!("  modified: {modified}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_create() {
        let cli = Cli::try_parse_from([
            "snapmatch",
            "events",
            "create",
            "--name",
            "Launch Party",
            "--date",
            "2025-06-01",
            "--location",
            "Rooftop",
        ])
        .unwrap();
        match cli.command {
            Commands::Events(EventCommands::Create { name, date, .. }) => {
                assert_eq!(name, "Launch Party");
                assert_eq!(date, "2025-06-01");
            }
            _ => panic!("expected events create"),
        }
    }

    #[test]
    fn test_parse_upload_into_event() {
        let cli = Cli::try_parse_from([
            "snapmatch",
            "--email",
            "ann@example.com",
            "upload",
            "--event",
            "1717",
            "a.jpg",
            "b.png",
        ])
        .unwrap();
        assert_eq!(cli.caller.email.as_deref(), Some("ann@example.com"));
        match cli.command {
            Commands::Upload { event, files } => {
                assert_eq!(event.as_deref(), Some("1717"));
                assert_eq!(files, vec![PathBuf::from("a.jpg"), PathBuf::from("b.png")]);
            }
            _ => panic!("expected upload"),
        }
    }

    #[test]
    fn test_upload_requires_files() {
        assert!(Cli::try_parse_from(["snapmatch", "upload"]).is_err());
    }

    #[test]
    fn test_global_identity_after_subcommand() {
        let cli = Cli::try_parse_from(["snapmatch", "selfie", "me.jpg", "--name", "Ann"]).unwrap();
        assert_eq!(cli.caller.name.as_deref(), Some("Ann"));
        assert!(matches!(cli.command, Commands::Selfie { .. }));
    }
}
