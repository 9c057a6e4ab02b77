//! Command-surface parsing: `"namespace.task[:arg,arg,...]"`.

use std::str::FromStr;

use crate::tasks::error::TaskError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub namespace: String,
    pub task: String,
    pub args: Vec<String>,
}

impl FromStr for Command {
    type Err = TaskError;

    fn from_str(raw: &str) -> Result<Self, TaskError> {
        let (namespace, rest) = raw.split_once('.').ok_or_else(|| TaskError::InvalidCommand {
            command: raw.to_string(),
        })?;
        let (task, args) = match rest.split_once(':') {
            Some((task, args)) => (
                task,
                args.split(',').map(str::to_string).collect::<Vec<_>>(),
            ),
            None => (rest, Vec::new()),
        };
        if namespace.is_empty() || task.is_empty() {
            return Err(TaskError::InvalidCommand {
                command: raw.to_string(),
            });
        }
        Ok(Self {
            namespace: namespace.to_string(),
            task: task.to_string(),
            args,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_argument_forms() {
        let plain: Command = "nginx.setup".parse().unwrap();
        assert_eq!(plain.namespace, "nginx");
        assert_eq!(plain.task, "setup");
        assert!(plain.args.is_empty());

        let with_args: Command = "postgres.query:select 1,main".parse().unwrap();
        assert_eq!(with_args.task, "query");
        assert_eq!(with_args.args, vec!["select 1", "main"]);
    }

    #[test]
    fn rejects_malformed_commands() {
        for raw in ["nginx", ".setup", "nginx.", ""] {
            assert!(matches!(
                raw.parse::<Command>(),
                Err(TaskError::InvalidCommand { .. })
            ));
        }
    }
}
