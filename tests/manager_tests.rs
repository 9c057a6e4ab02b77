use async_trait::async_trait;
use convoy::prompt::ScriptedPrompt;
use convoy::tasks::{Component, TaskContext, TaskDescriptor, TaskError};
use convoy::types::DeployConfig;
use convoy::DeployManager;
use std::path::Path;
use std::sync::Arc;

struct EchoComponent;

const ECHO_TASKS: &[TaskDescriptor] = &[TaskDescriptor::new("say")];

#[async_trait]
impl Component for EchoComponent {
    fn namespace(&self) -> &str {
        "echo"
    }

    fn descriptors(&self) -> &[TaskDescriptor] {
        ECHO_TASKS
    }

    async fn run(
        &self,
        _name: &str,
        ctx: &mut TaskContext,
    ) -> Result<Option<String>, TaskError> {
        let line = ctx.args.join(" ");
        Ok(Some(ctx.session.run(&format!("echo {line}")).await?))
    }
}

fn config(cache_dir: &Path) -> DeployConfig {
    serde_json::from_value(serde_json::json!({
        "env": "test",
        "cache_dir": cache_dir,
        "hosts": [
            {"name": "box", "components": {"echo": {}}}
        ]
    }))
    .unwrap()
}

#[tokio::test]
async fn runs_a_batch_end_to_end_and_persists_the_inventory() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = DeployManager::new(config(dir.path()))
        .with_prompt(Arc::new(ScriptedPrompt::default()));

    manager.register_component(Arc::new(EchoComponent)).unwrap();

    let result = manager
        .run(&["echo.say:hello,there".to_string()])
        .await
        .unwrap();
    assert_eq!(result.as_deref(), Some("hello there"));
    assert!(dir.path().join("test.json").exists());
}

#[tokio::test]
async fn inline_flags_are_consumed_instead_of_parsed_as_commands() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = DeployManager::new(config(dir.path()))
        .with_prompt(Arc::new(ScriptedPrompt::default()));

    manager.register_component(Arc::new(EchoComponent)).unwrap();

    // "-f" and "-v" would fail command parsing if they reached the scheduler
    let result = manager
        .run(&[
            "-f".to_string(),
            "-v".to_string(),
            "echo.say:ok".to_string(),
        ])
        .await
        .unwrap();
    assert_eq!(result.as_deref(), Some("ok"));
}

#[tokio::test]
async fn malformed_command_is_a_typed_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = DeployManager::new(config(dir.path()))
        .with_prompt(Arc::new(ScriptedPrompt::default()));

    manager.register_component(Arc::new(EchoComponent)).unwrap();

    let err = manager.run(&["no-dot-here".to_string()]).await.unwrap_err();
    assert!(matches!(
        err,
        convoy::DeployError::Task(TaskError::InvalidCommand { .. })
    ));
}
