/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! In-memory command executor for adapter tests

use crate::domain::CommandError;
use crate::ports::{CommandExecutor, CommandOutput, SystemCommand};
use async_trait::async_trait;
use std::sync::Mutex;

/// Answers commands from a script instead of running them
///
/// A command matches a rule when its rendered form contains the rule's
/// pattern; the first matching rule wins. Every executed command is recorded.
#[derive(Default)]
pub struct ScriptedCommandExecutor {
    rules: Vec<(String, Result<CommandOutput, CommandError>)>,
    missing: Vec<String>,
    executed: Mutex<Vec<SystemCommand>>,
}

impl ScriptedCommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Succeed with `stdout` for commands containing `pattern`
    pub fn on(self, pattern: &str, stdout: &str) -> Self {
        self.respond(
            pattern,
            Ok(CommandOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                exit_code: Some(0),
                success: true,
            }),
        )
    }

    /// Exit with `exit_code` for commands containing `pattern`
    pub fn fail(self, pattern: &str, exit_code: i32, stdout: &str, stderr: &str) -> Self {
        self.respond(
            pattern,
            Ok(CommandOutput {
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                exit_code: Some(exit_code),
                success: false,
            }),
        )
    }

    pub fn respond(mut self, pattern: &str, result: Result<CommandOutput, CommandError>) -> Self {
        self.rules.push((pattern.to_string(), result));
        self
    }

    /// Report `program` as not installed
    pub fn without(mut self, program: &str) -> Self {
        self.missing.push(program.to_string());
        self
    }

    pub fn executed(&self) -> Vec<SystemCommand> {
        self.executed.lock().unwrap().clone()
    }

    pub fn executed_lines(&self) -> Vec<String> {
        self.executed().iter().map(ToString::to_string).collect()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedCommandExecutor {
    async fn execute(&self, command: &SystemCommand) -> Result<CommandOutput, CommandError> {
        self.executed.lock().unwrap().push(command.clone());
        let line = command.to_string();
        self.rules
            .iter()
            .find(|(pattern, _)| line.contains(pattern.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| {
                Err(CommandError::ExecutionFailed(format!(
                    "No scripted response for '{line}'"
                )))
            })
    }

    async fn is_command_available(&self, command_name: &str) -> Result<bool, CommandError> {
        Ok(!self.missing.iter().any(|m| m == command_name))
    }
}
