mod settings;

use std::{fs, path::Path, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use list_query::{
    FormPart, ListQueryController, ListView, MemoryQueryCache, MutationBody,
    MutationError, PageResult, RestResourceApi, SystemClock, LOAD_FAILED_NOTICE,
};
use serde_json::Value;
use shared::domain::{PageSize, RecordId, Resource};
use tracing::info;
use tracing_subscriber::EnvFilter;

type Controller = ListQueryController<Value>;

#[derive(Parser, Debug)]
#[command(about = "Browse and edit LMS resources")]
struct Cli {
    /// Base API url, e.g. http://localhost:5000/api
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long, default_value = "course")]
    resource: Resource,
    #[arg(long, value_parser = parse_page_size)]
    page_size: Option<PageSize>,
    #[arg(long, default_value = "name")]
    sort_field: String,
    #[arg(long)]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Browse {
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Applied in order; repeating a field flips its direction.
        #[arg(long)]
        sort: Vec<String>,
    },
    Search {
        keyword: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    Get {
        id: String,
    },
    Create {
        json: String,
        #[arg(long = "file", value_name = "FIELD=PATH")]
        files: Vec<String>,
    },
    Update {
        id: String,
        json: String,
        #[arg(long = "file", value_name = "FIELD=PATH")]
        files: Vec<String>,
    },
    Delete {
        id: String,
    },
}

fn parse_page_size(raw: &str) -> Result<PageSize, String> {
    let size: u32 = raw.parse().map_err(|_| format!("'{raw}' is not a number"))?;
    PageSize::try_from(size).map_err(|err| err.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let resource = cli.resource;

    let mut settings = settings::load_settings()?;
    if let Some(api_url) = cli.api_url {
        settings.api_url = api_url;
    }
    if let Some(token) = cli.token {
        settings.bearer_token = Some(token);
    }
    if let Some(page_size) = cli.page_size {
        settings.controller.default_page_size = page_size;
    }
    info!(api_url = %settings.api_url, resource = %resource, "console: starting");

    let mut api = RestResourceApi::<Value>::new(&settings.api_url, resource)
        .with_context(|| format!("cannot use api url '{}'", settings.api_url))?;
    if let Some(token) = settings.bearer_token {
        api = api.with_bearer_token(token);
    }
    let controller = Controller::new(
        Arc::new(api),
        MemoryQueryCache::<Value>::shared(),
        Arc::new(SystemClock),
        settings.controller,
        cli.sort_field,
    );

    match cli.command {
        Command::Browse { page, sort } => {
            for field in &sort {
                controller.set_sort(field).await;
            }
            show_page(&controller, page).await?;
        }
        Command::Search { keyword, page } => {
            controller.set_keyword(&keyword).await;
            controller.wait_for_quiet().await;
            show_page(&controller, page).await?;
        }
        Command::Get { id } => {
            let record = controller.fetch_record(&RecordId::new(id)).await?;
            print_json(&record)?;
        }
        Command::Create { json, files } => {
            let record = controller
                .create(mutation_body(&json, &files)?)
                .await
                .map_err(describe_rejection)?;
            print_json(&record)?;
        }
        Command::Update { id, json, files } => {
            let record = controller
                .update(&RecordId::new(id), mutation_body(&json, &files)?)
                .await
                .map_err(describe_rejection)?;
            print_json(&record)?;
        }
        Command::Delete { id } => {
            controller
                .delete(&RecordId::new(id.clone()))
                .await
                .map_err(describe_rejection)?;
            println!("deleted {resource} {id}");
        }
    }

    Ok(())
}

async fn show_page(controller: &Arc<Controller>, page: u32) -> Result<()> {
    let mut result = ready(controller.load().await)?;
    if page != 1 {
        if !controller.set_page(page).await {
            bail!("page {page} is out of range (1..={})", result.total_pages);
        }
        result = ready(controller.load().await)?;
    }

    for item in &result.items {
        print_json(item)?;
    }
    let state = controller.query_state().await;
    println!(
        "page {}/{} ({} total)",
        state.page(),
        result.total_pages,
        result.total_count
    );
    Ok(())
}

fn ready(view: ListView<Value>) -> Result<Arc<PageResult<Value>>> {
    match view {
        ListView::Ready(result) => Ok(result),
        ListView::Failed(err) => Err(err).context(LOAD_FAILED_NOTICE),
        ListView::Loading => bail!("controller shut down before the page loaded"),
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// JSON body, or a multipart form when files are attached.
fn mutation_body(json: &str, files: &[String]) -> Result<MutationBody> {
    let value: Value = serde_json::from_str(json).context("record must be valid JSON")?;
    if files.is_empty() {
        return Ok(MutationBody::Json(value));
    }

    let Value::Object(fields) = value else {
        bail!("a record with attachments must be a JSON object");
    };
    let mut parts: Vec<FormPart> = fields
        .into_iter()
        .map(|(name, value)| match value {
            Value::String(text) => FormPart::text(name, text),
            other => FormPart::text(name, other.to_string()),
        })
        .collect();

    for file in files {
        let (field, path) = file
            .split_once('=')
            .ok_or_else(|| anyhow!("expected FIELD=PATH, got '{file}'"))?;
        let path = Path::new(path);
        let bytes = fs::read(path).with_context(|| format!("failed to read '{}'", path.display()))?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| field.to_string());
        parts.push(FormPart::file(field, filename, None, bytes));
    }
    Ok(MutationBody::Multipart(parts))
}

fn describe_rejection(err: MutationError) -> anyhow::Error {
    if let MutationError::Validation { errors, .. } = &err {
        for (field, messages) in errors {
            for message in messages {
                eprintln!("  {field}: {message}");
            }
        }
    }
    anyhow!(err.general_message())
}

#[cfg(test)]
mod tests {
    use list_query::FetchError;

    use super::*;

    #[test]
    fn failed_page_reports_the_load_notice() {
        let err = ready(ListView::Failed(FetchError::Transport("connection refused".into())))
            .expect_err("failed view");

        assert_eq!(err.to_string(), LOAD_FAILED_NOTICE);
        assert!(format!("{err:#}").contains("connection refused"));
    }

    #[test]
    fn ready_view_yields_its_rows() {
        let page = Arc::new(PageResult {
            items: vec![serde_json::json!({"id": 1})],
            total_pages: 1,
            total_count: 1,
        });
        let result = ready(ListView::Ready(page)).expect("ready");
        assert_eq!(result.total_count, 1);
    }
}
