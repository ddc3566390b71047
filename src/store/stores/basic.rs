//! `basic` store: one directory per conversation.
//!
//! ```text
//! {work_dir}/conversations/
//! └── {conversation_id}/
//!     ├── meta.json      : { "id", "title", "created_at" }
//!     ├── transcript.md  : Markdown entries headed `### {role} — {timestamp}`
//!     └── artifact.md    : current editor text (absent until first write)
//! ```
//!
//! Each entry is the header line, one blank line, the body, one blank line.
//! The body is split on `\n` only, so indentation, trailing newlines and `\r`
//! survive a round trip. Body lines that would be mistaken for an entry
//! header are escaped with a leading backslash on write and unescaped on read.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::store::{
    ConversationInfo, ConversationStore, Role, StoredMessage, new_conversation_id, now_iso8601,
    title_or_default,
};

const CONVERSATIONS_DIR: &str = "conversations";
const META_FILENAME: &str = "meta.json";
const TRANSCRIPT_FILENAME: &str = "transcript.md";
const ARTIFACT_FILENAME: &str = "artifact.md";
const HEADER_PREFIX: &str = "### ";

pub struct BasicStore {
    root: PathBuf,
}

impl BasicStore {
    /// Create or open the store at `{work_dir}/conversations/`.
    pub fn open(work_dir: &Path) -> Result<Self, AppError> {
        let root = work_dir.join(CONVERSATIONS_DIR);
        fs::create_dir_all(&root)
            .map_err(|e| AppError::Store(format!("cannot create {}: {e}", root.display())))?;
        Ok(Self { root })
    }

    /// Directory for `id`. Ids are opaque, but they must not escape the root.
    fn conversation_dir(&self, id: &str) -> Result<PathBuf, AppError> {
        if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
            return Err(AppError::Store(format!("invalid conversation id: {id:?}")));
        }
        Ok(self.root.join(id))
    }

    /// Directory for an existing conversation.
    fn existing_dir(&self, id: &str) -> Result<PathBuf, AppError> {
        let dir = self.conversation_dir(id)?;
        if !dir.join(META_FILENAME).is_file() {
            return Err(AppError::Store(format!("conversation not found: {id}")));
        }
        Ok(dir)
    }

    fn read_meta(dir: &Path) -> Result<ConversationInfo, AppError> {
        let path = dir.join(META_FILENAME);
        let data = fs::read_to_string(&path)
            .map_err(|e| AppError::Store(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&data)
            .map_err(|e| AppError::Store(format!("malformed {}: {e}", path.display())))
    }

    fn write_meta(dir: &Path, meta: &ConversationInfo) -> Result<(), AppError> {
        let path = dir.join(META_FILENAME);
        let data = serde_json::to_string_pretty(meta)
            .map_err(|e| AppError::Store(format!("serialise meta: {e}")))?;
        fs::write(&path, data)
            .map_err(|e| AppError::Store(format!("cannot write {}: {e}", path.display())))
    }

    fn read_transcript(dir: &Path) -> Result<Vec<StoredMessage>, AppError> {
        let path = dir.join(TRANSCRIPT_FILENAME);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(AppError::Store(format!("cannot read {}: {e}", path.display())));
            }
        };
        parse_transcript(&text)
    }
}

/// Parse transcript.md into messages by splitting on `### ` headers.
fn parse_transcript(text: &str) -> Result<Vec<StoredMessage>, AppError> {
    let mut messages = Vec::new();
    let mut current: Option<(Role, String, Vec<&str>)> = None;

    // The file ends with a newline; its empty tail is not a body line.
    let text = text.strip_suffix('\n').unwrap_or(text);
    for line in text.split('\n') {
        if let Some(header) = line.strip_prefix(HEADER_PREFIX) {
            if let Some((role, ts, lines)) = current.take() {
                messages.push(finish_entry(role, ts, lines));
            }
            let (role, ts) = match header.split_once(" — ") {
                Some((r, t)) => (r.trim(), t.trim()),
                None => (header.trim(), ""),
            };
            current = Some((role.parse()?, ts.to_string(), Vec::new()));
        } else if let Some((_, _, ref mut lines)) = current {
            lines.push(line);
        }
    }
    if let Some((role, ts, lines)) = current {
        messages.push(finish_entry(role, ts, lines));
    }
    Ok(messages)
}

/// Drop the one blank separator line on each side of the body.
fn finish_entry(role: Role, created_at: String, mut lines: Vec<&str>) -> StoredMessage {
    if lines.first() == Some(&"") {
        lines.remove(0);
    }
    if lines.last() == Some(&"") {
        lines.pop();
    }
    let content = lines.into_iter().map(unescape_line).collect::<Vec<_>>().join("\n");
    StoredMessage { role, content, created_at }
}

fn escape_line(line: &str) -> String {
    if line.starts_with(HEADER_PREFIX) || line.starts_with('\\') {
        format!("\\{line}")
    } else {
        line.to_string()
    }
}

fn unescape_line(line: &str) -> &str {
    line.strip_prefix('\\').unwrap_or(line)
}

fn render_entry(message: &StoredMessage) -> String {
    let body = message.content.split('\n').map(escape_line).collect::<Vec<_>>().join("\n");
    format!("{HEADER_PREFIX}{} — {}\n\n{}\n\n", message.role, message.created_at, body)
}

impl ConversationStore for BasicStore {
    fn store_type(&self) -> &str {
        "basic"
    }

    fn create_conversation(&self, title: &str) -> Result<ConversationInfo, AppError> {
        let meta = ConversationInfo {
            id: new_conversation_id(),
            title: title_or_default(title),
            created_at: now_iso8601(),
        };
        let dir = self.conversation_dir(&meta.id)?;
        fs::create_dir_all(&dir)
            .map_err(|e| AppError::Store(format!("cannot create {}: {e}", dir.display())))?;
        Self::write_meta(&dir, &meta)?;
        Ok(meta)
    }

    fn conversation(&self, id: &str) -> Result<Option<ConversationInfo>, AppError> {
        let dir = self.conversation_dir(id)?;
        if !dir.join(META_FILENAME).is_file() {
            return Ok(None);
        }
        Self::read_meta(&dir).map(Some)
    }

    fn set_title(&self, id: &str, title: &str) -> Result<(), AppError> {
        let dir = self.existing_dir(id)?;
        let mut meta = Self::read_meta(&dir)?;
        meta.title = title_or_default(title);
        Self::write_meta(&dir, &meta)
    }

    fn append_message(&self, id: &str, role: Role, content: &str) -> Result<StoredMessage, AppError> {
        use std::io::Write;

        let dir = self.existing_dir(id)?;
        let message = StoredMessage { role, content: content.to_string(), created_at: now_iso8601() };
        let path = dir.join(TRANSCRIPT_FILENAME);
        let mut f = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| AppError::Store(format!("cannot open {}: {e}", path.display())))?;
        f.write_all(render_entry(&message).as_bytes())
            .map_err(|e| AppError::Store(format!("write {}: {e}", path.display())))?;
        Ok(message)
    }

    fn recent_messages(&self, id: &str, n: usize) -> Result<Vec<StoredMessage>, AppError> {
        let dir = self.existing_dir(id)?;
        let mut messages = Self::read_transcript(&dir)?;
        let start = messages.len().saturating_sub(n);
        Ok(messages.split_off(start))
    }

    fn artifact(&self, id: &str) -> Result<Option<String>, AppError> {
        let path = self.conversation_dir(id)?.join(ARTIFACT_FILENAME);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Store(format!("cannot read {}: {e}", path.display()))),
        }
    }

    fn save_artifact(&self, id: &str, text: &str) -> Result<(), AppError> {
        let path = self.existing_dir(id)?.join(ARTIFACT_FILENAME);
        fs::write(&path, text)
            .map_err(|e| AppError::Store(format!("cannot write {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_store() -> (TempDir, BasicStore) {
        let tmp = TempDir::new().expect("tempdir");
        let store = BasicStore::open(tmp.path()).expect("open store");
        (tmp, store)
    }

    #[test]
    fn create_writes_meta_with_default_title() {
        let (tmp, store) = make_store();
        let conv = store.create_conversation("").unwrap();
        assert_eq!(conv.title, "New Chat");
        assert!(tmp.path().join("conversations").join(&conv.id).join("meta.json").exists());
        assert_eq!(store.conversation(&conv.id).unwrap(), Some(conv));
    }

    #[test]
    fn messages_are_chronological_and_windowed() {
        let (_tmp, store) = make_store();
        let conv = store.create_conversation("t").unwrap();
        for i in 0..4 {
            store.append_message(&conv.id, Role::User, &format!("q{i}")).unwrap();
            store.append_message(&conv.id, Role::Assistant, &format!("a{i}")).unwrap();
        }
        let last = store.recent_messages(&conv.id, 3).unwrap();
        let contents: Vec<_> = last.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["a2", "q3", "a3"]);
        assert_eq!(last[1].role, Role::User);
    }

    #[test]
    fn multiline_content_with_header_lookalike_survives() {
        let (_tmp, store) = make_store();
        let conv = store.create_conversation("t").unwrap();
        let tricky = "intro\n### user — fake\n\\escaped\nend";
        store.append_message(&conv.id, Role::User, tricky).unwrap();
        store.append_message(&conv.id, Role::Assistant, "ok").unwrap();
        let msgs = store.recent_messages(&conv.id, 10).unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].content, tricky);
    }

    #[test]
    fn content_round_trips_exactly() {
        let (_tmp, store) = make_store();
        let conv = store.create_conversation("t").unwrap();
        let bodies = [
            "    indented first line\nsecond\n",
            "\n\nleading blank lines",
            "windows\r\nline endings\r\n",
            "",
            "   ",
            "trailing blanks\n\n\n",
        ];
        for body in bodies {
            store.append_message(&conv.id, Role::User, body).unwrap();
        }
        store.append_message(&conv.id, Role::Assistant, "last").unwrap();

        let msgs = store.recent_messages(&conv.id, 10).unwrap();
        let contents: Vec<_> = msgs.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents[..bodies.len()], bodies);
        assert_eq!(contents[bodies.len()], "last");
    }

    #[test]
    fn artifact_absent_then_saved_then_overwritten() {
        let (_tmp, store) = make_store();
        let conv = store.create_conversation("t").unwrap();
        assert_eq!(store.artifact(&conv.id).unwrap(), None);
        store.save_artifact(&conv.id, "Draft A").unwrap();
        store.save_artifact(&conv.id, "Draft B").unwrap();
        assert_eq!(store.artifact(&conv.id).unwrap().as_deref(), Some("Draft B"));
    }

    #[test]
    fn set_title_updates_meta() {
        let (_tmp, store) = make_store();
        let conv = store.create_conversation("old").unwrap();
        store.set_title(&conv.id, "Cover Letter Draft").unwrap();
        assert_eq!(store.conversation(&conv.id).unwrap().unwrap().title, "Cover Letter Draft");
    }

    #[test]
    fn unknown_conversation_errors() {
        let (_tmp, store) = make_store();
        assert!(store.append_message("missing", Role::User, "x").is_err());
        assert!(store.save_artifact("missing", "x").is_err());
        assert_eq!(store.conversation("missing").unwrap(), None);
        assert_eq!(store.artifact("missing").unwrap(), None);
    }

    #[test]
    fn path_like_ids_rejected() {
        let (_tmp, store) = make_store();
        assert!(store.conversation("../etc").is_err());
        assert!(store.artifact("").is_err());
    }
}
