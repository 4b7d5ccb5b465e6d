use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use subagentlaw_core::alias::ModelAliasTable;
use subagentlaw_core::error::Error;
use subagentlaw_core::traits::{ChildRunConfig, HookRunner, ParentToolCatalog, RunLoop, RunLoopExit, RunLoopMessage};
use subagentlaw_core::types::{AgentDefinition, AgentState, PermissionMode, SpawnInput, TaskRestriction};
use subagentlaw_permissions::Arbiter;
use subagentlaw_registry::registry::DefinitionRegistry;
use subagentlaw_supervisor::{Manager, ManagerConfig};
use subagentlaw_supervisor::run_loop_factory::RunLoopFactory;
use tokio::sync::RwLock;

struct StubParentTools;
impl ParentToolCatalog for StubParentTools {
    fn tool_names(&self) -> Vec<String> {
        vec!["Read".to_string(), "Write".to_string(), "Bash".to_string()]
    }
    fn contains(&self, name: &str) -> bool {
        self.tool_names().iter().any(|t| t == name)
    }
}

struct ScriptedRunLoop {
    texts: Vec<String>,
    idx: usize,
    emitted_result: bool,
}

#[async_trait]
impl RunLoop for ScriptedRunLoop {
    async fn next_message(&mut self) -> Option<RunLoopMessage> {
        if self.idx < self.texts.len() {
            let text = self.texts[self.idx].clone();
            self.idx += 1;
            return Some(RunLoopMessage::AssistantText(text));
        }
        if !self.emitted_result {
            self.emitted_result = true;
            return Some(RunLoopMessage::Result {
                is_error: false,
                error_message: None,
                turns: 1,
                input_tokens: 10,
                output_tokens: 20,
                cost_usd: 0.01,
            });
        }
        None
    }

    fn interrupt(&self) {}

    async fn wait(self: Box<Self>) -> RunLoopExit {
        RunLoopExit::Completed
    }
}

struct RecordingRunLoopFactory {
    pub last_user_message: Mutex<Option<String>>,
    pub calls: AtomicUsize,
}

impl RecordingRunLoopFactory {
    fn new() -> Self {
        Self {
            last_user_message: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RunLoopFactory for RecordingRunLoopFactory {
    async fn start(&self, config: ChildRunConfig, _arbiter: Arc<Arbiter>) -> Box<dyn RunLoop> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_user_message.lock().unwrap() = Some(config.user_message.clone());
        Box::new(ScriptedRunLoop {
            texts: vec!["Hello from child".to_string()],
            idx: 0,
            emitted_result: false,
        })
    }
}

struct NoopHooks {
    pub started: AtomicUsize,
    pub stopped: AtomicUsize,
    pub scoped_registered: AtomicUsize,
    pub scoped_unregistered: AtomicUsize,
}

#[async_trait]
impl HookRunner for NoopHooks {
    async fn fire_permission_request(&self, _tool_name: &str, _input: &serde_json::Value) -> Vec<subagentlaw_core::traits::HookDecision> {
        Vec::new()
    }

    async fn fire_lifecycle(&self, event: &str, _payload: serde_json::Value) {
        match event {
            "SubagentStart" => {
                self.started.fetch_add(1, Ordering::SeqCst);
            }
            "SubagentStop" => {
                self.stopped.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
    }

    async fn register_scoped(
        &self,
        _agent_id: &str,
        _hooks: &std::collections::HashMap<String, Vec<subagentlaw_core::types::HookMatcher>>,
    ) {
        self.scoped_registered.fetch_add(1, Ordering::SeqCst);
    }

    async fn unregister_scoped(&self, _agent_id: &str) {
        self.scoped_unregistered.fetch_add(1, Ordering::SeqCst);
    }
}

fn make_registry() -> Arc<RwLock<DefinitionRegistry>> {
    let mut registry = DefinitionRegistry::new();
    registry.resolve(
        vec![AgentDefinition::new("Explorer", "explores the codebase", "You explore.")],
        vec![],
        vec![],
    );
    Arc::new(RwLock::new(registry))
}

fn make_manager(factory: Arc<RecordingRunLoopFactory>, max_active: usize) -> Manager {
    Manager::new(
        ManagerConfig {
            max_active,
            max_completed: 100,
            output_dir: std::env::temp_dir().join("subagentlaw-test-output"),
            transcript_dir: None,
            cwd: std::env::temp_dir(),
            default_max_turns: 50,
        },
        make_registry(),
        Arc::new(ModelAliasTable::new()),
        Arc::new(StubParentTools),
        factory,
        None,
        None,
    )
}

fn spawn_input() -> SpawnInput {
    SpawnInput {
        description: "explore".to_string(),
        prompt: "Look around.".to_string(),
        subagent_type: "Explorer".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn foreground_spawn_completes_and_drains_text() {
    let factory = Arc::new(RecordingRunLoopFactory::new());
    let manager = make_manager(factory, 10);
    let result = manager
        .spawn(spawn_input(), PermissionMode::Default, "claude-sonnet-4-5", &TaskRestriction::Unrestricted)
        .await
        .unwrap();
    assert_eq!(result.output, "Hello from child");
    assert_eq!(manager.active_count(), 0);
    assert_eq!(manager.completed_count(), 1);
}

#[tokio::test]
async fn unknown_agent_type_is_rejected() {
    let factory = Arc::new(RecordingRunLoopFactory::new());
    let manager = make_manager(factory, 10);
    let mut input = spawn_input();
    input.subagent_type = "DoesNotExist".to_string();
    let err = manager
        .spawn(input, PermissionMode::Default, "claude-sonnet-4-5", &TaskRestriction::Unrestricted)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownAgentType(_)));
}

#[tokio::test]
async fn task_restriction_blocks_disallowed_type() {
    let factory = Arc::new(RecordingRunLoopFactory::new());
    let manager = make_manager(factory, 10);
    let restriction = TaskRestriction::AllowedTypes(vec!["OnlyThis".to_string()]);
    let err = manager
        .spawn(spawn_input(), PermissionMode::Default, "claude-sonnet-4-5", &restriction)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TaskRestricted { .. }));
}

#[tokio::test]
async fn capacity_exceeded_when_active_at_max() {
    // A run loop that never finishes, so the slot stays occupied.
    struct HangingFactory;
    #[async_trait]
    impl RunLoopFactory for HangingFactory {
        async fn start(&self, _config: ChildRunConfig, _arbiter: Arc<Arbiter>) -> Box<dyn RunLoop> {
            struct Hang;
            #[async_trait]
            impl RunLoop for Hang {
                async fn next_message(&mut self) -> Option<RunLoopMessage> {
                    std::future::pending::<()>().await;
                    None
                }
                fn interrupt(&self) {}
                async fn wait(self: Box<Self>) -> RunLoopExit {
                    RunLoopExit::Completed
                }
            }
            Box::new(Hang)
        }
    }

    let manager = make_manager_with(Arc::new(HangingFactory), 1);

    let mut background_input = spawn_input();
    background_input.run_in_background = true;
    manager
        .spawn(background_input, PermissionMode::Default, "claude-sonnet-4-5", &TaskRestriction::Unrestricted)
        .await
        .unwrap();

    // Give the background task a moment to register in `active`.
    tokio::task::yield_now().await;

    let err = manager
        .spawn(spawn_input(), PermissionMode::Default, "claude-sonnet-4-5", &TaskRestriction::Unrestricted)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CapacityExceeded { .. }));
}

fn make_manager_with(factory: Arc<dyn RunLoopFactory>, max_active: usize) -> Manager {
    Manager::new(
        ManagerConfig {
            max_active,
            max_completed: 100,
            output_dir: std::env::temp_dir().join("subagentlaw-test-output"),
            transcript_dir: None,
            cwd: std::env::temp_dir(),
            default_max_turns: 50,
        },
        make_registry(),
        Arc::new(ModelAliasTable::new()),
        Arc::new(StubParentTools),
        factory,
        None,
        None,
    )
}

#[tokio::test]
async fn background_spawn_writes_output_file() {
    let factory = Arc::new(RecordingRunLoopFactory::new());
    let manager = make_manager(factory, 10);
    let mut input = spawn_input();
    input.run_in_background = true;
    let result = manager
        .spawn(input, PermissionMode::Default, "claude-sonnet-4-5", &TaskRestriction::Unrestricted)
        .await
        .unwrap();
    assert!(result.output_file.is_some());

    let id = uuid::Uuid::parse_str(&result.agent_id).unwrap();
    let got = manager
        .get_output(id, true, Some(std::time::Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(got.output, "Hello from child");

    let contents = tokio::fs::read_to_string(result.output_file.unwrap()).await.unwrap();
    assert_eq!(contents, "Hello from child");
}

#[tokio::test]
async fn resume_seeds_prior_output_into_new_prompt() {
    let factory = Arc::new(RecordingRunLoopFactory::new());
    let manager = make_manager(factory.clone(), 10);
    let first = manager
        .spawn(spawn_input(), PermissionMode::Default, "claude-sonnet-4-5", &TaskRestriction::Unrestricted)
        .await
        .unwrap();

    let mut resume_input = spawn_input();
    resume_input.prompt = "Continue.".to_string();
    resume_input.resume = Some(first.agent_id.clone());
    let resumed = manager
        .spawn(resume_input, PermissionMode::Default, "claude-sonnet-4-5", &TaskRestriction::Unrestricted)
        .await
        .unwrap();

    assert_eq!(resumed.agent_id, first.agent_id);
    let seeded = factory.last_user_message.lock().unwrap().clone().unwrap();
    assert!(seeded.starts_with("Previous agent output:\n\nHello from child"));
    assert!(seeded.ends_with("New request: Continue."));
}

#[tokio::test]
async fn unknown_resume_id_is_rejected() {
    let factory = Arc::new(RecordingRunLoopFactory::new());
    let manager = make_manager(factory, 10);
    let mut input = spawn_input();
    input.resume = Some(uuid::Uuid::new_v4().to_string());
    let err = manager
        .spawn(input, PermissionMode::Default, "claude-sonnet-4-5", &TaskRestriction::Unrestricted)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownResumeId(_)));
}

#[tokio::test]
async fn stop_is_idempotent_on_completed_agent() {
    let factory = Arc::new(RecordingRunLoopFactory::new());
    let manager = make_manager(factory, 10);
    let result = manager
        .spawn(spawn_input(), PermissionMode::Default, "claude-sonnet-4-5", &TaskRestriction::Unrestricted)
        .await
        .unwrap();
    let id = uuid::Uuid::parse_str(&result.agent_id).unwrap();
    manager.stop(id).await.unwrap();
    manager.stop(id).await.unwrap();
}

#[tokio::test]
async fn unknown_agent_stop_and_get_output_fail() {
    let factory = Arc::new(RecordingRunLoopFactory::new());
    let manager = make_manager(factory, 10);
    let bogus = uuid::Uuid::new_v4();
    assert!(matches!(manager.stop(bogus).await, Err(Error::UnknownAgent(_))));
    assert!(matches!(manager.get_output(bogus, false, None).await, Err(Error::UnknownAgent(_))));
}

#[tokio::test]
async fn lifecycle_hooks_fire_exactly_once() {
    let hooks = Arc::new(NoopHooks {
        started: AtomicUsize::new(0),
        stopped: AtomicUsize::new(0),
        scoped_registered: AtomicUsize::new(0),
        scoped_unregistered: AtomicUsize::new(0),
    });
    let manager = Manager::new(
        ManagerConfig::default(),
        make_registry(),
        Arc::new(ModelAliasTable::new()),
        Arc::new(StubParentTools),
        Arc::new(RecordingRunLoopFactory::new()),
        Some(hooks.clone() as Arc<dyn HookRunner>),
        None,
    );
    manager
        .spawn(spawn_input(), PermissionMode::Default, "claude-sonnet-4-5", &TaskRestriction::Unrestricted)
        .await
        .unwrap();
    assert_eq!(hooks.started.load(Ordering::SeqCst), 1);
    assert_eq!(hooks.stopped.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn scoped_hooks_register_and_unregister_exactly_once() {
    let hooks = Arc::new(NoopHooks {
        started: AtomicUsize::new(0),
        stopped: AtomicUsize::new(0),
        scoped_registered: AtomicUsize::new(0),
        scoped_unregistered: AtomicUsize::new(0),
    });
    let mut registry = DefinitionRegistry::new();
    let mut definition = AgentDefinition::new("Explorer", "explores the codebase", "You explore.");
    definition.hooks.insert(
        "PreToolUse".to_string(),
        vec![subagentlaw_core::types::HookMatcher {
            matcher: "Bash".to_string(),
            command: "echo hi".to_string(),
        }],
    );
    registry.resolve(vec![definition], vec![], vec![]);

    let manager = Manager::new(
        ManagerConfig::default(),
        Arc::new(RwLock::new(registry)),
        Arc::new(ModelAliasTable::new()),
        Arc::new(StubParentTools),
        Arc::new(RecordingRunLoopFactory::new()),
        Some(hooks.clone() as Arc<dyn HookRunner>),
        None,
    );
    manager
        .spawn(spawn_input(), PermissionMode::Default, "claude-sonnet-4-5", &TaskRestriction::Unrestricted)
        .await
        .unwrap();
    assert_eq!(hooks.scoped_registered.load(Ordering::SeqCst), 1);
    assert_eq!(hooks.scoped_unregistered.load(Ordering::SeqCst), 1);
}

#[test]
fn agent_state_terminal_variants_are_distinct() {
    assert_ne!(AgentState::Completed, AgentState::Failed);
    assert_ne!(AgentState::Stopped, AgentState::Running);
}
