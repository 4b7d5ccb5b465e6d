//! The subagent manager: the supervisor's central piece of state. Owns the
//! active/completed registries, resolves an `AgentDefinition` plus a
//! `SpawnInput` down to a `ChildRunConfig`, and drives the drain protocol
//! over whatever `RunLoop` the configured `RunLoopFactory` hands back.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use subagentlaw_core::alias::ModelAliasTable;
use subagentlaw_core::error::{Error, Result};
use subagentlaw_core::traits::{
    ChildRunConfig, HookRunner, ParentToolCatalog, Prompter, RunLoop, RunLoopExit, RunLoopMessage,
};
use subagentlaw_core::types::{
    AgentState, Metrics, PermissionMode, SpawnInput, SpawnResult, TaskResult, TaskRestriction,
};
use subagentlaw_permissions::Arbiter;
use subagentlaw_registry::registry::DefinitionRegistry;
use subagentlaw_registry::resolver::resolve_tools;
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::warn;
use uuid::Uuid;

use crate::background_permissions::BackgroundPermissionChecker;
use crate::memory;
use crate::run_loop_factory::RunLoopFactory;

/// Live instance of a spawned child.
pub struct RunningAgentHandle {
    pub id: Uuid,
    pub subagent_type: String,
    pub name: Option<String>,
    pub started_at: chrono::DateTime<Utc>,
    pub output_file_path: Option<PathBuf>,
    pub transcript_path: Option<PathBuf>,
    pub warnings: Vec<String>,
    state: RwLock<AgentState>,
    output: RwLock<String>,
    result: RwLock<Option<TaskResult>>,
    done: Arc<Notify>,
    done_closed: AtomicBool,
    // Held across `next_message` polls; `interrupt()` only needs a brief
    // lock to reach the loop underneath, and `drain` takes it out entirely
    // once the loop has wound down so `wait()` can consume it by value.
    run_loop: Arc<Mutex<Option<Box<dyn RunLoop>>>>,
}

impl RunningAgentHandle {
    pub async fn state(&self) -> AgentState {
        *self.state.read().await
    }

    pub async fn snapshot_output(&self) -> String {
        self.output.read().await.clone()
    }

    pub async fn result(&self) -> Option<TaskResult> {
        self.result.read().await.clone()
    }

    /// Request cooperative interruption of the live run loop, if it hasn't
    /// already finished and been taken for draining.
    pub async fn interrupt(&self) {
        if let Some(run_loop) = self.run_loop.lock().await.as_ref() {
            run_loop.interrupt();
        }
    }
}

#[derive(Clone)]
pub struct ManagerConfig {
    pub max_active: usize,
    pub max_completed: usize,
    pub output_dir: PathBuf,
    pub transcript_dir: Option<PathBuf>,
    pub cwd: PathBuf,
    pub default_max_turns: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_active: 10,
            max_completed: 100,
            output_dir: PathBuf::from(".claude/agent-output"),
            transcript_dir: None,
            cwd: PathBuf::from("."),
            default_max_turns: 50,
        }
    }
}

/// The subagent manager. Owns the active/completed lifecycle, definition
/// resolution, tool-set and permission-mode composition, and the drain
/// protocol over the external run loop.
pub struct Manager {
    config: ManagerConfig,
    active: Arc<DashMap<Uuid, Arc<RunningAgentHandle>>>,
    completed_order: Arc<RwLock<VecDeque<Uuid>>>,
    completed: Arc<DashMap<Uuid, (Arc<RunningAgentHandle>, TaskResult)>>,
    registry: Arc<RwLock<DefinitionRegistry>>,
    alias_table: Arc<ModelAliasTable>,
    parent_tools: Arc<dyn ParentToolCatalog>,
    run_loop_factory: Arc<dyn RunLoopFactory>,
    hook_runner: Option<Arc<dyn HookRunner>>,
    prompter: Option<Arc<dyn Prompter>>,
}

impl Manager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ManagerConfig,
        registry: Arc<RwLock<DefinitionRegistry>>,
        alias_table: Arc<ModelAliasTable>,
        parent_tools: Arc<dyn ParentToolCatalog>,
        run_loop_factory: Arc<dyn RunLoopFactory>,
        hook_runner: Option<Arc<dyn HookRunner>>,
        prompter: Option<Arc<dyn Prompter>>,
    ) -> Self {
        Self {
            config,
            active: Arc::new(DashMap::new()),
            completed_order: Arc::new(RwLock::new(VecDeque::new())),
            completed: Arc::new(DashMap::new()),
            registry,
            alias_table,
            parent_tools,
            run_loop_factory,
            hook_runner,
            prompter,
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn list(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.active.iter().map(|e| *e.key()).collect();
        ids.extend(self.completed.iter().map(|e| *e.key()));
        ids
    }

    pub async fn spawn(
        &self,
        input: SpawnInput,
        parent_mode: PermissionMode,
        parent_model: &str,
        restriction: &TaskRestriction,
    ) -> Result<SpawnResult> {
        // Step 4: resume handling short-circuits capacity/type checks.
        if let Some(resume_id_str) = &input.resume {
            let resume_id = Uuid::parse_str(resume_id_str)
                .map_err(|_| Error::UnknownResumeId(resume_id_str.clone()))?;
            if let Some(handle) = self.active.get(&resume_id) {
                let output = handle.snapshot_output().await;
                return Ok(SpawnResult {
                    agent_id: resume_id.to_string(),
                    output,
                    error: None,
                    metrics: None,
                    output_file: handle.output_file_path.clone(),
                    warnings: handle.warnings.clone(),
                });
            }
            if let Some((_, (_, prior))) = self.completed.remove(&resume_id) {
                self.completed_order.write().await.retain(|id| *id != resume_id);
                let seeded_prompt = format!(
                    "Previous agent output:\n\n{}\n\n---\n\nNew request: {}",
                    prior.content, input.prompt
                );
                let mut next = input.clone();
                next.prompt = seeded_prompt;
                next.resume = None;
                return self
                    .spawn_with_id(resume_id, next, parent_mode, parent_model, restriction)
                    .await;
            }
            return Err(Error::UnknownResumeId(resume_id_str.clone()));
        }

        if self.active.len() >= self.config.max_active {
            return Err(Error::CapacityExceeded {
                active: self.active.len(),
                max: self.config.max_active,
            });
        }

        let id = Uuid::new_v4();
        self.spawn_with_id(id, input, parent_mode, parent_model, restriction).await
    }

    async fn spawn_with_id(
        &self,
        id: Uuid,
        input: SpawnInput,
        parent_mode: PermissionMode,
        parent_model: &str,
        restriction: &TaskRestriction,
    ) -> Result<SpawnResult> {
        // Step 2.
        let definition = {
            let registry = self.registry.read().await;
            registry
                .get(&input.subagent_type)
                .cloned()
                .ok_or_else(|| Error::UnknownAgentType(input.subagent_type.clone()))?
        };

        // Step 3.
        if !restriction.permits(&input.subagent_type) {
            return Err(Error::task_restricted(input.subagent_type.clone()));
        }

        // Step 5 (best-effort).
        if let Some(hooks) = &self.hook_runner {
            hooks
                .fire_lifecycle(
                    "SubagentStart",
                    serde_json::json!({
                        "agentId": id.to_string(),
                        "agentType": input.subagent_type,
                    }),
                )
                .await;
        }

        // Step 6.
        let raw_model = input
            .model
            .clone()
            .or_else(|| definition.model.clone())
            .unwrap_or_else(|| parent_model.to_string());
        let model = self.alias_table.expand(&raw_model);

        // Step 7.
        let parent_tool_names = self.parent_tools.tool_names();
        let mut warnings = Vec::new();
        for tool in &definition.tools {
            if !self.parent_tools.contains(tool) {
                warn!(tool, agent_id = %id, "definition references unknown tool");
                warnings.push(format!("definition references unknown tool: {tool}"));
            }
        }
        let mut tools = resolve_tools(&definition.tools, &definition.disallowed_tools, &parent_tool_names);

        // Step 8.
        let mode = if parent_mode == PermissionMode::BypassPermissions {
            PermissionMode::BypassPermissions
        } else {
            input.mode.or(definition.permission_mode).unwrap_or(parent_mode)
        };

        // Step 9.
        let mut memory_block = String::new();
        if let Some(scope) = &definition.memory {
            let dir = memory::resolve_memory_dir(scope, &definition.name, &self.config.cwd);
            let _ = memory::ensure_memory_dir(&dir);
            if let Some(block) = memory::read_memory_block(&dir, 200) {
                memory_block = format!("\n\n{block}");
            }
            subagentlaw_registry::resolver::ensure_memory_tools(&mut tools);
        }

        // Step 10.
        let mut system_prompt = definition.prompt.clone();
        system_prompt.push_str(&memory_block);
        if let Some(reminder) = &definition.critical_reminder {
            system_prompt.push_str(&format!("\n\nCRITICAL: {reminder}"));
        }
        system_prompt.push_str(&format!("\n\nTask: {}", definition.description));

        // Step 11.
        let max_turns = input
            .max_turns
            .or(definition.max_turns)
            .unwrap_or(self.config.default_max_turns);

        // Step 12: every agent gets the shared hook runner and prompter so
        // permission hooks and interactive `ask` prompts actually fire;
        // background agents additionally get a pre-approved callback since
        // there's no caller around to answer a prompt.
        let mut arbiter = Arbiter::new(mode).with_tool_catalog(self.parent_tools.clone());
        if let Some(hooks) = &self.hook_runner {
            arbiter = arbiter.with_hook_runner(hooks.clone());
        }
        if let Some(prompter) = &self.prompter {
            arbiter = arbiter.with_prompter(prompter.clone());
        }
        if input.run_in_background {
            arbiter = arbiter.with_callback(Arc::new(BackgroundPermissionChecker::new(tools.clone())));
        }
        let arbiter = Arc::new(arbiter);

        // Scope the definition's own hooks to this agent's lifetime; they're
        // unregistered in `finish_inner` before `SubagentStop` fires.
        if let Some(hooks) = &self.hook_runner {
            hooks.register_scoped(&id.to_string(), &definition.hooks).await;
        }

        // Step 15.
        let transcript_path = self
            .config
            .transcript_dir
            .as_ref()
            .map(|dir| dir.join(format!("agent-{id}.jsonl")));

        let output_file_path = if input.run_in_background {
            Some(self.config.output_dir.join(format!("{id}.output")))
        } else {
            None
        };

        let handle = Arc::new(RunningAgentHandle {
            id,
            subagent_type: input.subagent_type.clone(),
            name: input.name.clone(),
            started_at: Utc::now(),
            output_file_path: output_file_path.clone(),
            transcript_path: transcript_path.clone(),
            warnings: warnings.clone(),
            state: RwLock::new(AgentState::Running),
            output: RwLock::new(String::new()),
            result: RwLock::new(None),
            done: Arc::new(Notify::new()),
            done_closed: AtomicBool::new(false),
            run_loop: Arc::new(Mutex::new(None)),
        });
        self.active.insert(id, handle.clone());

        // Step 16.
        let run_config = ChildRunConfig {
            agent_id: id.to_string(),
            system_prompt,
            user_message: input.prompt.clone(),
            model,
            tools,
            max_turns,
            mode,
        };
        let run_loop = self.run_loop_factory.start(run_config, arbiter).await;
        *handle.run_loop.lock().await = Some(run_loop);

        if input.run_in_background {
            // Step 17: background path returns immediately; a detached task
            // drains the loop and writes the output file on completion.
            self.spawn_background_drain(handle.clone());
            return Ok(SpawnResult {
                agent_id: id.to_string(),
                output: String::new(),
                error: None,
                metrics: None,
                output_file: output_file_path,
                warnings,
            });
        }

        // Foreground: drain synchronously.
        let task_result = Self::drain(&handle).await;
        self.finish(id, handle, task_result.clone()).await;
        Ok(SpawnResult {
            agent_id: id.to_string(),
            output: task_result.content,
            error: task_result.error_message,
            metrics: Some(task_result.metrics),
            output_file: None,
            warnings,
        })
    }

    fn spawn_background_drain(&self, handle: Arc<RunningAgentHandle>) {
        let active = self.active.clone();
        let completed = self.completed.clone();
        let completed_order = self.completed_order.clone();
        let max_completed = self.config.max_completed;
        let hook_runner = self.hook_runner.clone();
        let output_file_path = handle.output_file_path.clone();
        let id = handle.id;

        tokio::spawn(async move {
            let task_result = Manager::drain(&handle).await;

            if let Some(path) = &output_file_path {
                let mut contents = task_result.content.clone();
                if let Some(err) = &task_result.error_message {
                    contents.push_str(&format!("\n\nError: {err}"));
                }
                if let Some(parent) = path.parent() {
                    let _ = tokio::fs::create_dir_all(parent).await;
                }
                if let Err(e) = tokio::fs::write(path, contents).await {
                    warn!(error = %e, "failed to write background output file");
                }
            }

            Manager::finish_inner(
                &active,
                &completed,
                &completed_order,
                max_completed,
                &hook_runner,
                id,
                handle,
                task_result,
            )
            .await;
        });
    }

    async fn drain(handle: &RunningAgentHandle) -> TaskResult {
        let mut error_message: Option<String> = None;
        let mut metrics = Metrics::default();

        {
            // Held across each `next_message` await. `interrupt()` only
            // promises its effect takes hold by "the next `next_message`
            // call," so a concurrent interrupt briefly queuing behind an
            // in-flight poll still honors that contract.
            let mut guard = handle.run_loop.lock().await;
            let run_loop = guard.as_mut().expect("run loop installed before drain starts");
            while let Some(message) = run_loop.next_message().await {
                match message {
                    RunLoopMessage::AssistantText(text) => {
                        handle.output.write().await.push_str(&text);
                    }
                    RunLoopMessage::Result {
                        is_error,
                        error_message: msg,
                        turns,
                        input_tokens,
                        output_tokens,
                        cost_usd,
                    } => {
                        metrics = Metrics {
                            turns,
                            duration_ms: 0,
                            input_tokens,
                            output_tokens,
                            cost_usd,
                        };
                        if is_error {
                            error_message = msg;
                        }
                    }
                    RunLoopMessage::Other => {}
                }
            }
        }

        let run_loop = handle
            .run_loop
            .lock()
            .await
            .take()
            .expect("run loop installed before drain starts");
        let exit = run_loop.wait().await;
        let state = match exit {
            RunLoopExit::Interrupted | RunLoopExit::Aborted => AgentState::Stopped,
            RunLoopExit::Error => AgentState::Failed,
            RunLoopExit::Completed => {
                if error_message.is_some() {
                    AgentState::Failed
                } else {
                    AgentState::Completed
                }
            }
        };

        TaskResult {
            agent_id: handle.id.to_string(),
            content: handle.output.read().await.clone(),
            state,
            metrics,
            error_message,
        }
    }

    async fn finish(&self, id: Uuid, handle: Arc<RunningAgentHandle>, task_result: TaskResult) {
        Manager::finish_inner(
            &self.active,
            &self.completed,
            &self.completed_order,
            self.config.max_completed,
            &self.hook_runner,
            id,
            handle,
            task_result,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish_inner(
        active: &DashMap<Uuid, Arc<RunningAgentHandle>>,
        completed: &DashMap<Uuid, (Arc<RunningAgentHandle>, TaskResult)>,
        completed_order: &RwLock<VecDeque<Uuid>>,
        max_completed: usize,
        hook_runner: &Option<Arc<dyn HookRunner>>,
        id: Uuid,
        handle: Arc<RunningAgentHandle>,
        task_result: TaskResult,
    ) {
        *handle.result.write().await = Some(task_result.clone());
        *handle.state.write().await = task_result.state;

        active.remove(&id);
        completed.insert(id, (handle.clone(), task_result));
        let mut order = completed_order.write().await;
        order.push_back(id);
        while order.len() > max_completed {
            if let Some(oldest) = order.pop_front() {
                completed.remove(&oldest);
            }
        }
        drop(order);

        if !handle.done_closed.swap(true, Ordering::SeqCst) {
            handle.done.notify_waiters();
        }

        if let Some(hooks) = hook_runner {
            hooks.unregister_scoped(&id.to_string()).await;
            hooks
                .fire_lifecycle(
                    "SubagentStop",
                    serde_json::json!({
                        "agentId": id.to_string(),
                        "agentType": handle.subagent_type,
                        "transcriptPath": handle.transcript_path,
                    }),
                )
                .await;
        }
    }

    pub async fn get_output(&self, id: Uuid, block: bool, timeout: Option<std::time::Duration>) -> Result<SpawnResult> {
        let handle = if let Some(h) = self.active.get(&id) {
            h.clone()
        } else if let Some(entry) = self.completed.get(&id) {
            entry.0.clone()
        } else {
            return Err(Error::UnknownAgent(id.to_string()));
        };

        // Register as a waiter before checking the result, so a `finish()`
        // that races in between the check and the wait is never missed.
        let notified = handle.done.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if let Some(result) = handle.result().await {
            return Ok(SpawnResult {
                agent_id: id.to_string(),
                output: result.content,
                error: result.error_message,
                metrics: Some(result.metrics),
                output_file: handle.output_file_path.clone(),
                warnings: handle.warnings.clone(),
            });
        }

        if block {
            if let Some(timeout) = timeout {
                let _ = tokio::time::timeout(timeout, notified).await;
            } else {
                notified.await;
            }
            if let Some(result) = handle.result().await {
                return Ok(SpawnResult {
                    agent_id: id.to_string(),
                    output: result.content,
                    error: result.error_message,
                    metrics: Some(result.metrics),
                    output_file: handle.output_file_path.clone(),
                    warnings: handle.warnings.clone(),
                });
            }
        }

        Ok(SpawnResult {
            agent_id: id.to_string(),
            output: handle.snapshot_output().await,
            error: None,
            metrics: None,
            output_file: handle.output_file_path.clone(),
            warnings: handle.warnings.clone(),
        })
    }

    pub async fn stop(&self, id: Uuid) -> Result<()> {
        if let Some(handle) = self.active.get(&id) {
            handle.interrupt().await;
            return Ok(());
        }
        if self.completed.contains_key(&id) {
            return Ok(());
        }
        Err(Error::UnknownAgent(id.to_string()))
    }
}
