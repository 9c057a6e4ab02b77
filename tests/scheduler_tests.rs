use async_trait::async_trait;
use convoy::prompt::ScriptedPrompt;
use convoy::tasks::{
    Component, HostPolicy, TaskContext, TaskDescriptor, TaskError, TaskRegistry, TaskScheduler,
};
use convoy::types::{DeployConfig, Host, Inventory};
use std::sync::{Arc, Mutex};

/// Component recording every operation invocation, in order.
struct SimpleComponent {
    log: Arc<Mutex<Vec<String>>>,
}

const SIMPLE_TASKS: &[TaskDescriptor] = &[
    TaskDescriptor::new("example"),
    TaskDescriptor::new("somehook")
        .before(&["somehook_before"])
        .after(&["somehook_after"]),
    TaskDescriptor::new("some_other_hook")
        .before(&["somehook_before"])
        .after(&["somehook_after"]),
    TaskDescriptor::new("bad_hooked").before(&["failing_before"]),
    TaskDescriptor::new("local_echo").policy(HostPolicy::None),
];

#[async_trait]
impl Component for SimpleComponent {
    fn namespace(&self) -> &str {
        "simple"
    }

    fn descriptors(&self) -> &[TaskDescriptor] {
        SIMPLE_TASKS
    }

    async fn run(
        &self,
        name: &str,
        ctx: &mut TaskContext,
    ) -> Result<Option<String>, TaskError> {
        self.log.lock().unwrap().push(name.to_string());
        match name {
            "example" => {
                let sum: i64 = ctx
                    .args
                    .iter()
                    .map(|arg| arg.parse::<i64>().unwrap_or(0))
                    .sum();
                Ok(Some((sum * 2 + 2).to_string()))
            }
            "somehook" => Ok(Some("4".to_string())),
            "some_other_hook" => Ok(Some("6".to_string())),
            "somehook_before" | "somehook_after" | "bad_hooked" => Ok(None),
            "failing_before" => Err(TaskError::Failed {
                namespace: "simple".to_string(),
                task: name.to_string(),
                reason: "hook exploded".to_string(),
            }),
            "local_echo" => Ok(Some(ctx.session.run("echo test").await?)),
            other => Err(TaskError::UnknownTask {
                namespace: "simple".to_string(),
                task: other.to_string(),
            }),
        }
    }
}

fn config() -> Arc<DeployConfig> {
    Arc::new(serde_json::from_value(serde_json::json!({"env": "test"})).unwrap())
}

fn inventory() -> Arc<Inventory> {
    let host = Host {
        name: "box".to_string(),
        public_ip: None,
        private_ip: None,
        ssh_port: 0,
        provider: None,
        components: [("simple".to_string(), serde_json::json!({}))]
            .into_iter()
            .collect(),
    };
    Arc::new(Inventory::from_hosts([&host]))
}

fn scheduler(log: Arc<Mutex<Vec<String>>>) -> TaskScheduler {
    let mut registry = TaskRegistry::new();
    registry
        .register(Arc::new(SimpleComponent { log }))
        .unwrap();
    TaskScheduler::new(
        registry,
        config(),
        inventory(),
        Arc::new(ScriptedPrompt::default()),
        false,
    )
}

#[test]
fn duplicate_namespace_is_a_configuration_error() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = TaskRegistry::new();
    registry
        .register(Arc::new(SimpleComponent { log: log.clone() }))
        .unwrap();
    let err = registry
        .register(Arc::new(SimpleComponent { log }))
        .unwrap_err();
    assert!(matches!(err, TaskError::DuplicateNamespace { .. }));
}

#[tokio::test]
async fn runs_task_with_arguments_and_returns_last_result() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let scheduler = scheduler(log);

    let result = scheduler
        .run(&["simple.example:2".to_string()])
        .await
        .unwrap();
    assert_eq!(result.as_deref(), Some("6"));

    let result = scheduler
        .run(&[
            "simple.example".to_string(),
            "simple.example:2,4".to_string(),
        ])
        .await
        .unwrap();
    assert_eq!(result.as_deref(), Some("14"));
}

#[tokio::test]
async fn unknown_task_is_skipped_and_batch_continues() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let scheduler = scheduler(log.clone());

    let result = scheduler
        .run(&[
            "simple.missing".to_string(),
            "simple.example:1".to_string(),
        ])
        .await
        .unwrap();

    assert_eq!(result.as_deref(), Some("4"));
    assert_eq!(log.lock().unwrap().as_slice(), ["example"]);
}

#[tokio::test]
async fn unknown_namespace_aborts_before_anything_executes() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let scheduler = scheduler(log.clone());

    let err = scheduler
        .run(&["simple.example".to_string(), "ghost.example".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(err, TaskError::UnknownNamespace { .. }));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn hooks_run_behind_phase_barriers() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let scheduler = scheduler(log.clone());

    let result = scheduler
        .run(&[
            "simple.somehook".to_string(),
            "simple.example".to_string(),
            "simple.some_other_hook".to_string(),
        ])
        .await
        .unwrap();

    assert_eq!(result.as_deref(), Some("6"));
    assert_eq!(
        log.lock().unwrap().as_slice(),
        [
            "somehook_before",
            "somehook_before",
            "somehook",
            "example",
            "some_other_hook",
            "somehook_after",
            "somehook_after",
        ]
    );
}

#[tokio::test]
async fn failing_before_hook_aborts_remaining_phases() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let scheduler = scheduler(log.clone());

    let err = scheduler
        .run(&["simple.bad_hooked".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(err, TaskError::Failed { .. }));
    assert_eq!(log.lock().unwrap().as_slice(), ["failing_before"]);
}

#[tokio::test]
async fn nohost_task_runs_against_local_shell() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let scheduler = scheduler(log);

    let result = scheduler
        .run(&["simple.local_echo".to_string()])
        .await
        .unwrap();
    assert_eq!(result.as_deref(), Some("test"));
}
