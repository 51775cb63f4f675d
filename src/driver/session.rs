//! Agent session: runs the agent CLI and relays its stream.
//!
//! 1. Spawn the agent CLI in stream-JSON mode
//! 2. Send `initialize`, then the task as the first user turn
//! 3. Read stdout line by line:
//!    - permission requests go to the `ToolPermission` handler (one task each)
//!    - other control traffic is consumed here
//!    - everything else is yielded as an `AgentEvent`
//! 4. After the `result` event, close stdin and reap the child

use crate::approval::types::ToolUseContext;
use crate::approval::ToolPermission;
use crate::audit::{DecisionLogger, DecisionRecord};
use crate::driver::options::{AgentOptions, LoadedImage};
use crate::driver::protocol::{AgentEvent, Inbound, Outbound, PermissionRequest};
use anyhow::{bail, Context, Result};
use futures_util::Stream;
use serde_json::Value;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Agent stdin, shared with permission tasks. `None` once closed.
type SharedStdin = Arc<Mutex<Option<ChildStdin>>>;

pub type SharedPermission = Arc<dyn ToolPermission + Send + Sync>;

/// A running agent conversation.
pub struct AgentSession {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    stdin: SharedStdin,
    permission: SharedPermission,
    decision_log: Option<Arc<Mutex<DecisionLogger>>>,
    /// Announced by the agent in its events; used for decision records
    session_id: Arc<std::sync::Mutex<Option<String>>>,
    pending: Vec<JoinHandle<()>>,
    saw_result: bool,
    finished: bool,
}

impl AgentSession {
    /// Start the agent and hand it the task.
    pub async fn start(
        options: &AgentOptions,
        task: &str,
        images: &[LoadedImage],
        permission: SharedPermission,
        decision_log: Option<DecisionLogger>,
    ) -> Result<Self> {
        tracing::info!(
            "Starting agent: {} (cwd {})",
            options.cli_path.display(),
            options.cwd.display()
        );

        let mut child = Command::new(&options.cli_path)
            .args(options.to_args())
            .current_dir(&options.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| {
                format!("Failed to start agent: {}", options.cli_path.display())
            })?;

        let stdout = child
            .stdout
            .take()
            .context("Agent stdout was not captured")?;
        let stdin = child.stdin.take().context("Agent stdin was not captured")?;

        let session = Self {
            child,
            lines: BufReader::new(stdout).lines(),
            stdin: Arc::new(Mutex::new(Some(stdin))),
            permission,
            decision_log: decision_log.map(|l| Arc::new(Mutex::new(l))),
            session_id: Arc::new(std::sync::Mutex::new(options.resume.clone())),
            pending: Vec::new(),
            saw_result: false,
            finished: false,
        };

        let init_id = format!("req_{}", uuid::Uuid::new_v4().simple());
        send(&session.stdin, &Outbound::initialize(init_id))
            .await
            .context("Failed to initialize agent")?;
        send(&session.stdin, &Outbound::task(task, images))
            .await
            .context("Failed to send task to agent")?;
        tracing::debug!("Task sent ({} bytes, {} image(s))", task.len(), images.len());

        Ok(session)
    }

    /// Next event from the agent, or `None` once the stream is over.
    pub async fn next_event(&mut self) -> Result<Option<AgentEvent>> {
        loop {
            if self.finished {
                return Ok(None);
            }
            self.pending.retain(|handle| !handle.is_finished());

            let line = self
                .lines
                .next_line()
                .await
                .context("Failed to read from agent")?;
            let line = match line {
                Some(line) => line,
                None => {
                    self.finish().await?;
                    return Ok(None);
                }
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match Inbound::parse(line) {
                None => {
                    tracing::warn!("Skipping non-JSON line from agent: {}", truncate(line, 200));
                }
                Some(Inbound::Event(event)) => {
                    self.note_session(&event);
                    if event.is_terminal() {
                        self.saw_result = true;
                        self.close_stdin().await;
                    }
                    return Ok(Some(event));
                }
                Some(Inbound::Permission(request)) => self.spawn_permission(request),
                Some(Inbound::OtherControlRequest {
                    request_id,
                    subtype,
                }) => {
                    tracing::warn!("Unsupported control request from agent: {}", subtype);
                    if let Some(request_id) = request_id {
                        if let Err(e) =
                            send(&self.stdin, &Outbound::unsupported(request_id, &subtype)).await
                        {
                            tracing::error!("Failed to answer control request: {}", e);
                        }
                    }
                }
                Some(Inbound::MalformedPermission { request_id, error }) => {
                    tracing::warn!("Malformed permission request from agent: {}", error);
                    if let Some(request_id) = request_id {
                        if let Err(e) =
                            send(&self.stdin, &Outbound::malformed(request_id, &error)).await
                        {
                            tracing::error!("Failed to answer control request: {}", e);
                        }
                    }
                }
                Some(Inbound::ControlResponse(value)) => {
                    if value.pointer("/response/subtype").and_then(Value::as_str) == Some("error") {
                        tracing::warn!("Agent rejected a control request: {}", value);
                    } else {
                        tracing::debug!("Control response: {}", value);
                    }
                }
                Some(Inbound::ControlCancel(value)) => {
                    tracing::debug!("Control request cancelled: {}", value);
                }
            }
        }
    }

    /// The session as a stream of events. Ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<AgentEvent>> {
        futures_util::stream::unfold(self, |mut session| async move {
            match session.next_event().await {
                Ok(Some(event)) => Some((Ok(event), session)),
                Ok(None) => None,
                Err(e) => {
                    session.finished = true;
                    Some((Err(e), session))
                }
            }
        })
    }

    fn note_session(&self, event: &AgentEvent) {
        if let (Some(id), Ok(mut current)) = (event.session_id(), self.session_id.lock()) {
            if current.as_deref() != Some(id) {
                *current = Some(id.to_string());
            }
        }
    }

    /// Decide one permission request in the background and reply when done.
    fn spawn_permission(&mut self, request: PermissionRequest) {
        let permission = self.permission.clone();
        let stdin = self.stdin.clone();
        let decision_log = self.decision_log.clone();
        let session_id = self.session_id.clone();

        tracing::debug!(
            "Permission request {} for {}",
            request.request_id,
            request.request.tool_name
        );

        let handle = tokio::spawn(async move {
            let tool_name = request.request.tool_name.as_str();
            let context = ToolUseContext {
                tool_use_id: request.tool_use_id().to_string(),
                suggestions: request.request.permission_suggestions.clone(),
            };

            let started = Instant::now();
            let decision = permission
                .can_use_tool(tool_name, request.request.input.clone(), &context)
                .await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            if let Some(log) = decision_log {
                let session = session_id.lock().ok().and_then(|s| s.clone());
                let record =
                    DecisionRecord::new(session, tool_name, &context.tool_use_id, &decision, elapsed_ms);
                if let Err(e) = log.lock().await.log(&record) {
                    tracing::error!("Failed to write decision log: {}", e);
                }
            }

            let reply = Outbound::permission(request.request_id.as_str(), &decision);
            if let Err(e) = send(&stdin, &reply).await {
                tracing::error!(
                    "Failed to send {} decision for {}: {}",
                    decision.label(),
                    tool_name,
                    e
                );
            }
        });
        self.pending.push(handle);
    }

    async fn close_stdin(&self) {
        if self.stdin.lock().await.take().is_some() {
            tracing::debug!("Closed agent stdin");
        }
    }

    /// stdout is at EOF: stop outstanding work and reap the child.
    async fn finish(&mut self) -> Result<()> {
        self.finished = true;
        self.close_stdin().await;
        for handle in self.pending.drain(..) {
            handle.abort();
        }

        let status = self
            .child
            .wait()
            .await
            .context("Failed to wait for agent")?;

        if !self.saw_result {
            if !status.success() {
                bail!("Agent exited with {} before finishing", status);
            }
            tracing::warn!("Agent stream ended without a result event");
        } else if !status.success() {
            tracing::warn!("Agent exited with {} after its result", status);
        }
        Ok(())
    }
}

impl Drop for AgentSession {
    fn drop(&mut self) {
        for handle in &self.pending {
            handle.abort();
        }
    }
}

/// Write one JSON line to the agent.
async fn send(stdin: &SharedStdin, message: &Outbound) -> Result<()> {
    let mut line = serde_json::to_string(message).context("Failed to serialize message")?;
    line.push('\n');

    let mut guard = stdin.lock().await;
    let pipe = guard.as_mut().context("Agent stdin is already closed")?;
    pipe.write_all(line.as_bytes()).await?;
    pipe.flush().await?;
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
