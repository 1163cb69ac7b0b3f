//! Time-windowed, append-only inbox.
//!
//! An inbox is a list of parts, each backed by one file named after the
//! timestamp of its first message. A part accepts appends for `switch_sec`
//! seconds; after that the next message opens a new part. Messages older than
//! `expire_sec` are never delivered, so parts whose whole window lies beyond
//! that horizon are deleted instead of read.
//!
//! Each line of a part file is `timestamp sender type payload`.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use kestrel_types::limits::{EXPIRE_SLACK_SEC, MSG_EXPIRE_SEC, SWITCH_INBOX_SEC};
use kestrel_types::models::Message;
use kestrel_types::time::TimeRange;

use crate::cleanup::remove_file_best_effort;
use crate::error::{StoreError, StoreResult};

const SEPARATORS: &[char] = &[' ', '\n'];

/// Window lengths, in seconds.
#[derive(Debug, Clone, Copy)]
pub struct InboxConfig {
    pub switch_sec: i64,
    pub expire_sec: i64,
    pub slack_sec: i64,
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            switch_sec: SWITCH_INBOX_SEC,
            expire_sec: MSG_EXPIRE_SEC,
            slack_sec: EXPIRE_SLACK_SEC,
        }
    }
}

impl InboxConfig {
    /// Stored timestamps that are still deliverable at `now`.
    fn live_range(&self, now: i64) -> TimeRange {
        TimeRange {
            from: now - self.expire_sec + 1,
            to: now + self.slack_sec,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxPart {
    pub first_timestamp: i64,
    pub file: PathBuf,
}

impl InboxPart {
    fn new(dir: &Path, now: i64) -> Self {
        Self {
            first_timestamp: now,
            file: part_file(dir, now),
        }
    }

    /// Whether a message accepted at `now` may be appended to this part.
    pub fn can_add(&self, now: i64, cfg: &InboxConfig) -> bool {
        TimeRange::new(self.first_timestamp, cfg.switch_sec).contains(now)
    }

    /// Whether any message in this part could still be deliverable at `now`.
    pub fn can_contain_unexpired(&self, now: i64, cfg: &InboxConfig) -> bool {
        let part = TimeRange::new(self.first_timestamp, cfg.switch_sec + 1);
        part.overlaps(&cfg.live_range(now))
    }

    async fn read_live(&self, now: i64, cfg: &InboxConfig, out: &mut Vec<Message>) -> StoreResult<()> {
        let content = match fs::read_to_string(&self.file).await {
            Ok(c) => c,
            // Parts are created lazily by the first append.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let live = cfg.live_range(now);
        // Only '\n' ends a line; a trailing '\r' belongs to the payload.
        for line in content.split('\n').filter(|l| !l.is_empty()) {
            let Some(mut msg) = parse_line(line) else {
                warn!("Skipping corrupt inbox line in {}", self.file.display());
                continue;
            };
            if live.contains(msg.time) {
                msg.time = now - msg.time;
                out.push(msg);
            }
        }
        Ok(())
    }
}

fn part_file(dir: &Path, timestamp: i64) -> PathBuf {
    dir.join(format!("{:020}", timestamp))
}

fn format_line(msg: &Message) -> String {
    format!("{} {} {} {}\n", msg.time, msg.from, msg.kind, msg.msg)
}

fn parse_line(line: &str) -> Option<Message> {
    let mut fields = line.splitn(4, ' ');
    let time = fields.next()?.parse().ok()?;
    let from = fields.next()?.to_string();
    let kind = fields.next()?.to_string();
    let msg = fields.next()?.to_string();
    Some(Message { time, from, kind, msg })
}

/// One account's inbox. Owned and mutated only by that account's actor.
#[derive(Debug)]
pub struct Inbox {
    dir: PathBuf,
    cfg: InboxConfig,
    parts: Vec<InboxPart>,
}

impl Inbox {
    pub fn new(dir: PathBuf, cfg: InboxConfig) -> Self {
        Self {
            dir,
            cfg,
            parts: Vec::new(),
        }
    }

    /// Rebuild the part list from the files already in `dir`.
    pub async fn load(dir: PathBuf, cfg: InboxConfig) -> StoreResult<Self> {
        fs::create_dir_all(&dir).await?;

        let mut parts = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(first_timestamp) = name.to_str().and_then(|n| n.parse::<i64>().ok()) else {
                debug!("Ignoring stray inbox entry {:?}", name);
                continue;
            };
            parts.push(InboxPart {
                first_timestamp,
                file: entry.path(),
            });
        }
        parts.sort_by_key(|p| p.first_timestamp);

        Ok(Self { dir, cfg, parts })
    }

    pub fn parts(&self) -> &[InboxPart] {
        &self.parts
    }

    /// Append a message. `msg.time` is the acceptance time in epoch seconds.
    pub async fn add_message(&mut self, msg: &Message) -> StoreResult<()> {
        if msg.kind.contains(SEPARATORS)
            || msg.msg.contains(SEPARATORS)
            || msg.from.contains(SEPARATORS)
        {
            return Err(StoreError::InvalidMessage);
        }

        let file = self.current_part(msg.time).await.file.clone();

        let mut f = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file)
            .await?;
        f.write_all(format_line(msg).as_bytes()).await?;
        f.flush().await?;
        Ok(())
    }

    /// Return every deliverable message, with `time` rewritten to age in
    /// seconds, and discard everything that was read.
    ///
    /// The last part is kept (emptied) while it can still take appends so the
    /// next message does not force a rotation.
    pub async fn get_messages(&mut self, now: i64) -> StoreResult<Vec<Message>> {
        let mut messages = Vec::new();
        let Some(last) = self.parts.last().cloned() else {
            return Ok(messages);
        };

        // Read everything before deleting anything: a failed read of the
        // active part must not lose the older parts.
        let older = self.parts.len() - 1;
        for part in &self.parts[..older] {
            if !part.can_contain_unexpired(now, &self.cfg) {
                debug!("Not reading expired inbox part {}", part.file.display());
                continue;
            }
            if let Err(e) = part.read_live(now, &self.cfg, &mut messages).await {
                warn!("Failed to read inbox part {}: {}", part.file.display(), e);
            }
        }
        if last.can_contain_unexpired(now, &self.cfg) {
            last.read_live(now, &self.cfg, &mut messages).await?;
        }

        for part in self.parts.drain(..older) {
            remove_file_best_effort(&part.file).await;
        }

        self.parts.clear();
        if last.can_add(now, &self.cfg) && truncate(&last.file).await {
            self.parts.push(last);
        } else {
            remove_file_best_effort(&last.file).await;
        }

        Ok(messages)
    }

    /// Delete every part. Used when the owner's keys rotate.
    pub async fn clear(&mut self) {
        for part in self.parts.drain(..) {
            remove_file_best_effort(&part.file).await;
        }
    }

    async fn current_part(&mut self, now: i64) -> &InboxPart {
        let reuse = match self.parts.last() {
            Some(last) => last.can_add(now, &self.cfg) || now < last.first_timestamp,
            None => false,
        };
        if !reuse {
            self.remove_expired_parts(now).await;
            let part = InboxPart::new(&self.dir, now);
            info!("Opening inbox part {}", part.file.display());
            self.parts.push(part);
        }
        // Non-empty: either reused or just pushed.
        let idx = self.parts.len() - 1;
        &self.parts[idx]
    }

    async fn remove_expired_parts(&mut self, now: i64) {
        // Parts are sorted by start time, so the expired ones form a prefix.
        let expired = self
            .parts
            .iter()
            .position(|p| p.can_contain_unexpired(now, &self.cfg))
            .unwrap_or(self.parts.len());
        for part in self.parts.drain(..expired) {
            remove_file_best_effort(&part.file).await;
        }
    }
}

/// Empty a part file in place. Returns false if it could not be done.
async fn truncate(path: &Path) -> bool {
    let res: std::io::Result<()> = async {
        let f = fs::OpenOptions::new().write(true).open(path).await?;
        f.set_len(0).await
    }
    .await;
    match res {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!("Failed to truncate {}: {}", path.display(), e);
            false
        }
    }
}
