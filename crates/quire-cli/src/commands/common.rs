use std::env;
use std::io::{self, BufRead, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use quire_core::config::QuireConfig;
use quire_core::db::SqliteDocumentRepository;
use quire_core::remote::{RemoteStore, SupabaseRemoteStore};
use quire_core::{Document, DocumentId, Workspace};
use serde::Serialize;

use crate::cli::PasswordArgs;
use crate::error::CliError;

const ACCESS_TOKEN_ENV: &str = "QUIRE_ACCESS_TOKEN";

/// Resolved global options shared by every command
pub struct Context {
    pub db_path: PathBuf,
    pub config_path: PathBuf,
    pub config: QuireConfig,
    pub owner: Option<String>,
}

impl Context {
    pub fn load(
        db_path: Option<PathBuf>,
        config_path: Option<PathBuf>,
        owner: Option<String>,
    ) -> Result<Self, CliError> {
        let config_path = match config_path {
            Some(path) => path,
            None => default_config_path()?,
        };
        let config = QuireConfig::load_file(&config_path)?.with_env_overrides()?;
        let db_path = match db_path.or_else(|| config.database_path.clone()) {
            Some(path) => path,
            None => default_db_path()?,
        };
        let owner = owner
            .map(|owner| owner.trim().to_string())
            .filter(|owner| !owner.is_empty());

        Ok(Self {
            db_path,
            config_path,
            config,
            owner,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DocumentListItem {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub encrypted: bool,
    pub dirty: bool,
    pub owner_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub relative_time: String,
}

/// Open the workspace, attaching the owner's session when one is given
pub async fn open_workspace(ctx: &Context) -> Result<Workspace, CliError> {
    let local = SqliteDocumentRepository::open(&ctx.db_path)?;
    let workspace =
        Workspace::new(Arc::new(local)).with_sync_interval(ctx.config.sync_interval());

    if let Some(owner) = &ctx.owner {
        let remote = remote_store(ctx)?;
        workspace.connect(owner, remote).await?;
    }
    Ok(workspace)
}

pub fn remote_store(ctx: &Context) -> Result<Arc<dyn RemoteStore>, CliError> {
    let settings = ctx.config.remote()?.ok_or(CliError::SyncNotConfigured)?;
    let access_token = env::var(ACCESS_TOKEN_ENV)
        .ok()
        .filter(|token| !token.trim().is_empty())
        .ok_or(CliError::AccessTokenRequired)?;
    let store = SupabaseRemoteStore::new(settings.url, settings.anon_key, access_token)?;
    Ok(Arc::new(store))
}

pub fn require_owner(ctx: &Context) -> Result<&str, CliError> {
    ctx.owner.as_deref().ok_or(CliError::OwnerRequired)
}

/// Find a live document by full id or unique id prefix
pub async fn resolve_document(
    query: &str,
    workspace: &Workspace,
) -> Result<Document, CliError> {
    let query = normalize_document_identifier(query)?;
    if let Ok(id) = query.parse::<DocumentId>() {
        if let Ok(document) = workspace.get(&id).await {
            return Ok(document);
        }
    }

    let ids = workspace
        .list()
        .await?
        .into_iter()
        .map(|document| document.id)
        .collect::<Vec<_>>();
    let id = match_id_prefix(&query, &ids)?;
    Ok(workspace.get(&id).await?)
}

pub fn match_id_prefix(query: &str, ids: &[DocumentId]) -> Result<DocumentId, CliError> {
    let matching = ids
        .iter()
        .filter(|id| id.as_str().starts_with(query))
        .copied()
        .collect::<Vec<_>>();

    match matching.as_slice() {
        [] => Err(CliError::DocumentNotFound(query.to_string())),
        [id] => Ok(*id),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|id| id.as_str().chars().take(13).collect::<String>())
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousDocumentId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn format_document_lines(documents: &[Document]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    documents
        .iter()
        .map(|document| {
            let id = document.id.to_string();
            let short_id = id.chars().take(13).collect::<String>();
            let title = truncate(&document.title, 30);
            let relative_time = format_relative_time(document.updated_at, now_ms);
            let marker = if document.is_encrypted() {
                "[locked]"
            } else {
                ""
            };

            format!("{short_id:<13}  {title:<30}  {relative_time:<10}  {marker}")
                .trim_end()
                .to_string()
        })
        .collect()
}

pub fn document_to_list_item(document: &Document) -> DocumentListItem {
    let now_ms = Utc::now().timestamp_millis();
    DocumentListItem {
        id: document.id.to_string(),
        title: document.title.clone(),
        preview: content_preview(&document.content, 80),
        encrypted: document.is_encrypted(),
        dirty: document.is_dirty(),
        owner_id: document.owner_id.clone(),
        created_at: document.created_at,
        updated_at: document.updated_at,
        relative_time: format_relative_time(document.updated_at, now_ms),
    }
}

pub fn content_preview(content: &str, max_chars: usize) -> String {
    let first_line = content.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate(&collapsed, max_chars)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = text.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Content from arguments, else piped stdin, else empty
pub fn resolve_content(content_parts: &[String]) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }
    Ok(read_piped_stdin()?.unwrap_or_default())
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_title(title: &str) -> Result<String, CliError> {
    normalize_content(title).ok_or(CliError::EmptyTitle)
}

pub fn normalize_document_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyDocumentId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Password from `--password`/`QUIRE_PASSWORD`, else the first line of stdin
pub fn resolve_password(args: &PasswordArgs) -> Result<String, CliError> {
    let raw = match &args.password {
        Some(password) => password.clone(),
        None => {
            if io::stdin().is_terminal() {
                eprint!("Password: ");
            }
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            line
        }
    };
    normalize_password(&raw)
}

pub fn normalize_password(raw: &str) -> Result<String, CliError> {
    let password = raw.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        Err(CliError::EmptyPassword)
    } else {
        Ok(password.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_document_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(CliError::EditorFailed(format!(
            "`{editor}` exited with status {status}"
        ))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            // EDITOR may carry arguments, e.g. "code --wait"
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let status = Command::new(program).args(parts).arg(file_path).status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

fn create_temp_document_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("quire-doc-{}-{now}.md", std::process::id()))
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("quire").join("quire.db"))
        .ok_or(CliError::NoDataDir)
}

pub fn default_config_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join("quire").join("config.json"))
        .ok_or(CliError::NoDataDir)
}
