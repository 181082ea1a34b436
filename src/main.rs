//! Command line interface for operating the service. Supports initialization,
//! importing documents, rebuilding the tag index, serving HTTP/WebSocket
//! endpoints, and auditing article quality.

mod ai;
mod config;
mod gate;
mod live;
mod model;
mod seo;
mod server;
mod store;
mod ws;

use std::{
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::bail;
use clap::{Parser, Subcommand};
use config::Settings;
use store::Store;

/// Command line interface entry point.
#[derive(Parser)]
#[command(
    name = "sanctum",
    author,
    version,
    about = "File-backed content service for a spiritual guidance site"
)]
struct Cli {
    /// Path to the `.env` configuration file.
    #[arg(long, default_value = ".env")]
    env: String,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the directory tree at `STORE_ROOT`.
    Init,
    /// Import one or more JSON document files into a collection.
    Import {
        /// Target collection name.
        collection: String,
        /// Paths to JSON document files.
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Rebuild the article tag index from existing documents.
    Reindex,
    /// Launch HTTP and WebSocket services.
    Serve {
        /// Log every handled request to stdout.
        #[arg(long)]
        verbose: bool,
    },
    /// Score stored articles against the content rules.
    Audit {
        /// Audit a single article instead of every article.
        #[arg(long)]
        id: Option<String>,
    },
}

/// Execute the selected CLI subcommand.
async fn run(cli: Cli) -> anyhow::Result<()> {
    ensure_env_file(&cli.env)?;
    let cfg = Settings::from_env(&cli.env)?;
    let store = Store::new(cfg.store_root.clone());
    match cli.command {
        Commands::Init => {
            // Create the on-disk directory structure.
            store.init()?;
        }
        Commands::Import { collection, files } => {
            // Load each JSON file and store it, assigning ids where needed.
            for f in files {
                let data = fs::read_to_string(&f)?;
                let doc: serde_json::Value = serde_json::from_str(&data)?;
                let id = store.import(&collection, doc)?;
                println!("imported {collection}/{id}");
            }
        }
        Commands::Reindex => {
            store.reindex()?;
        }
        Commands::Serve { verbose } => {
            // Initialize storage then start HTTP and WS servers.
            store.init()?;
            let http_addr: SocketAddr = cfg.bind_http.as_str().parse()?;
            let ws_addr: SocketAddr = cfg.bind_ws.as_str().parse()?;
            let ai = ai::AiClient::from_settings(&cfg)?;
            let state = Arc::new(server::AppState::new(store.clone(), &cfg, ai, verbose));
            tokio::try_join!(
                server::serve_http(http_addr, state, std::future::pending()),
                ws::serve_ws(ws_addr, store, std::future::pending())
            )?;
        }
        Commands::Audit { id } => {
            audit(&store, &cfg, id)?;
        }
    }
    Ok(())
}

/// Print a content-score report for one or every stored article.
fn audit(store: &Store, cfg: &Settings, id: Option<String>) -> anyhow::Result<()> {
    let docs = match id {
        Some(id) => match store.get("articles", &id)? {
            Some(doc) => vec![doc],
            None => bail!("article not found: {id}"),
        },
        None => store.list("articles", &store::Query::default())?,
    };
    if docs.is_empty() {
        println!("no articles to audit");
        return Ok(());
    }
    for doc in docs {
        let article: model::Article = serde_json::from_value(doc)?;
        let report = seo::audit_article(&article, &cfg.site_domain);
        println!("{} [{}] {}", article.id, report.score, article.title);
        for issue in &report.issues {
            println!("  - {issue}");
        }
    }
    Ok(())
}

/// Create a default `.env` file if one is not already present at `path`.
fn ensure_env_file(path: &str) -> anyhow::Result<()> {
    let env_path = Path::new(path);
    if env_path.exists() {
        return Ok(());
    }
    if let Some(parent) = env_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let base_dir = match env_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    let store_root = base_dir.join("sanctum-data");
    let mut content = String::new();
    content.push_str(&format!("STORE_ROOT={}\n", display_path(&store_root)));
    content.push_str("BIND_HTTP=127.0.0.1:8090\n");
    content.push_str("BIND_WS=127.0.0.1:8091\n");
    content.push_str("SITE_DOMAIN=\n");
    content.push_str("ADMIN_TOKEN=\n");
    content.push_str("AI_API_URL=\n");
    content.push_str("AI_API_KEY=\n");
    content.push_str("AI_MODEL=gpt-4o-mini\n");
    fs::write(env_path, content)?;
    Ok(())
}

fn display_path(path: &PathBuf) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run(cli).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ENV_MUTEX;
    use std::{fs, time::Duration};
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    const ENV_VARS: &[&str] = &[
        "STORE_ROOT",
        "BIND_HTTP",
        "BIND_WS",
        "SITE_DOMAIN",
        "ADMIN_TOKEN",
        "AI_API_URL",
        "AI_API_KEY",
        "AI_MODEL",
    ];

    fn clear_env() {
        for v in ENV_VARS {
            std::env::remove_var(v);
        }
    }

    fn write_env(dir: &TempDir, extra: &str) -> String {
        let env_path = dir.path().join(".env");
        let content = format!(
            "STORE_ROOT={}\nBIND_HTTP=127.0.0.1:0\nBIND_WS=127.0.0.1:0\n{}",
            dir.path().to_str().unwrap(),
            extra
        );
        fs::write(&env_path, content).unwrap();
        env_path.to_str().unwrap().into()
    }

    #[tokio::test]
    async fn run_init_import_reindex_audit() {
        let _g = ENV_MUTEX.lock().unwrap();
        clear_env();
        let dir = TempDir::new().unwrap();
        let env_file = write_env(&dir, "");

        run(Cli {
            env: env_file.clone(),
            command: Commands::Init,
        })
        .await
        .unwrap();

        let doc_path = dir.path().join("article.json");
        let doc = serde_json::json!({
            "id": "a1",
            "title": "Banho de arruda",
            "excerpt": "e",
            "author": "a",
            "date": "",
            "tags": ["ervas"],
            "imageUrl": "",
            "createdAt": 1,
        });
        fs::write(&doc_path, serde_json::to_string(&doc).unwrap()).unwrap();
        run(Cli {
            env: env_file.clone(),
            command: Commands::Import {
                collection: "articles".into(),
                files: vec![doc_path.to_str().unwrap().into()],
            },
        })
        .await
        .unwrap();
        assert!(dir.path().join("collections/articles/a1.json").exists());

        run(Cli {
            env: env_file.clone(),
            command: Commands::Reindex,
        })
        .await
        .unwrap();
        assert!(dir.path().join("index/by-tag/ervas.txt").exists());

        run(Cli {
            env: env_file.clone(),
            command: Commands::Audit { id: Some("a1".into()) },
        })
        .await
        .unwrap();

        // auditing an unknown article fails loudly
        assert!(run(Cli {
            env: env_file,
            command: Commands::Audit { id: Some("nope".into()) },
        })
        .await
        .is_err());
    }

    #[tokio::test]
    async fn init_creates_default_env() {
        let _g = ENV_MUTEX.lock().unwrap();
        clear_env();
        let dir = TempDir::new().unwrap();
        let env_path = dir.path().join(".env");
        run(Cli {
            env: env_path.to_string_lossy().into_owned(),
            command: Commands::Init,
        })
        .await
        .unwrap();

        let data = fs::read_to_string(&env_path).unwrap();
        let expected_root = dir.path().join("sanctum-data");
        assert!(data.contains(&format!("STORE_ROOT={}", expected_root.to_string_lossy())));
        assert!(data.contains("BIND_HTTP=127.0.0.1:8090"));
        assert!(data.contains("BIND_WS=127.0.0.1:8091"));
        assert!(expected_root.join("collections/articles").exists());
    }

    #[tokio::test]
    async fn run_serve_starts_http() {
        let _g = ENV_MUTEX.lock().unwrap();
        clear_env();
        let dir = TempDir::new().unwrap();
        let http_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let http_port = http_listener.local_addr().unwrap().port();
        drop(http_listener);
        let ws_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let ws_port = ws_listener.local_addr().unwrap().port();
        drop(ws_listener);
        let env_path = dir.path().join(".env");
        let content = format!(
            "STORE_ROOT={}\nBIND_HTTP=127.0.0.1:{}\nBIND_WS=127.0.0.1:{}\n",
            dir.path().to_str().unwrap(),
            http_port,
            ws_port
        );
        fs::write(&env_path, content).unwrap();
        let env_str = env_path.to_str().unwrap().to_string();

        let handle = tokio::task::spawn(run(Cli {
            env: env_str,
            command: Commands::Serve { verbose: false },
        }));
        tokio::time::sleep(Duration::from_millis(200)).await;
        let url = format!("http://127.0.0.1:{}/healthz", http_port);
        let resp = reqwest::get(url).await.unwrap();
        assert!(resp.status().is_success());
        handle.abort();
    }
}
