use chatcut_core::ops::{EditOp, EditOutcome};
use chatcut_core::selection::SelectionRange;
use chatcut_core::session::EditorSession;
use chatcut_render::MediaProcessor;
use std::sync::Arc;

use crate::chat::ChatLog;
use crate::client::AssistantEndpoint;
use crate::error::{AssistantError, Result};
use crate::protocol::{AssistantRequest, AssistantResponse, FunctionCall};

/// What one user request ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSummary {
    pub task_id: Option<String>,
    pub outcomes: Vec<EditOutcome>,
    pub reply: String,
}

/// Runs assistant-issued function calls against a session, one at a time.
///
/// Every call, including its media processing, is finished and committed
/// before the next `continue_task` request goes out. The first failing step
/// ends the task.
pub struct CommandLoop {
    session: Arc<EditorSession>,
    assistant: Arc<dyn AssistantEndpoint>,
    processor: Arc<dyn MediaProcessor>,
    max_steps: usize,
}

impl CommandLoop {
    pub fn new(
        session: Arc<EditorSession>,
        assistant: Arc<dyn AssistantEndpoint>,
        processor: Arc<dyn MediaProcessor>,
        max_steps: usize,
    ) -> Self {
        Self {
            session,
            assistant,
            processor,
            max_steps,
        }
    }

    pub fn session(&self) -> &Arc<EditorSession> {
        &self.session
    }

    /// Send `message` with the clips under `range` as context and execute
    /// whatever the assistant asks for.
    ///
    /// On failure an error entry is appended to `log` and the error is
    /// returned; nothing further is sent until the next user message.
    pub async fn submit(
        &self,
        log: &mut ChatLog,
        range: &SelectionRange,
        message: &str,
    ) -> Result<TaskSummary> {
        log.push_user(message);
        match self.run(log, range).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                tracing::error!(error = %e, "Assistant task failed");
                log.push_error(&e);
                Err(e)
            }
        }
    }

    async fn run(&self, log: &mut ChatLog, range: &SelectionRange) -> Result<TaskSummary> {
        let mut request = AssistantRequest::new_chat(log.outbound(), self.clip_contexts(range)?);
        let mut task_id: Option<String> = None;
        let mut outcomes = Vec::new();

        loop {
            let call = match self.assistant.send(&request).await? {
                AssistantResponse::Message { message } => {
                    log.push_assistant(message.clone());
                    return Ok(TaskSummary {
                        task_id,
                        outcomes,
                        reply: message,
                    });
                }
                AssistantResponse::FunctionCall(call) => call,
            };

            if call.task_id.is_some() {
                task_id = call.task_id.clone();
            }
            if outcomes.len() >= self.max_steps {
                return Err(AssistantError::StepLimit {
                    task_id,
                    steps: outcomes.len(),
                });
            }

            let outcome = self.execute_call(&call, task_id.as_deref()).await?;
            log.push_card(call.function_name.clone(), call.arguments()?);
            outcomes.push(outcome);

            request = AssistantRequest::continue_task(
                log.outbound(),
                self.clip_contexts(range)?,
                task_id.clone(),
            );
        }
    }

    async fn execute_call(&self, call: &FunctionCall, task_id: Option<&str>) -> Result<EditOutcome> {
        let op = call.to_op()?;
        tracing::info!(operation = op.name(), clip_id = %op.clip_id(), task_id = ?task_id, "Executing assistant call");
        self.execute(&op).await
    }

    /// Apply one op. Transforms hold the clip lock from before processing
    /// starts until the derived media is committed.
    pub async fn execute(&self, op: &EditOp) -> Result<EditOutcome> {
        let Some(transform) = op.transform() else {
            return Ok(self.session.apply(op)?);
        };

        let lease = self.session.lock_clip(op.clip_id())?;
        let source = self
            .session
            .snapshot()
            .transform_source(lease.clip_id(), transform)?
            .clone();
        let derived = self.processor.process(&source, transform).await?;
        Ok(lease.commit_transform(&self.session, derived)?)
    }

    /// Serialized contexts of the clips currently under `range`.
    fn clip_contexts(&self, range: &SelectionRange) -> Result<Vec<String>> {
        let project = self.session.snapshot();
        let contexts = range.clip_contexts(&project);
        Ok(contexts
            .iter()
            .map(|c| c.to_wire_string())
            .collect::<chatcut_core::Result<Vec<_>>>()?)
    }
}
