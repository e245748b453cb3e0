//! Test doubles for the external command boundary.

use std::{cell::RefCell, collections::BTreeMap};

use crate::{
    error::AppError,
    exec::{CommandOutput, CommandRunner, EnvOverrides},
};

/// One recorded invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Program and arguments joined by spaces
    pub command: String,
    pub env: EnvOverrides,
}

/// Canned reply for a command key
#[derive(Debug, Clone)]
pub enum FakeReply {
    Output(CommandOutput),
    Timeout,
}

/// Returns preconfigured replies keyed by `"program arg1 arg2"`
///
/// An exact key wins; otherwise the longest registered prefix is used.
/// Unmatched commands fail as if the program were missing.
#[derive(Debug, Default)]
pub struct FakeRunner {
    replies: BTreeMap<String, FakeReply>,
    calls: RefCell<Vec<RecordedCall>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a successful reply
    pub fn ok(mut self, key: &str, stdout: &str) -> Self {
        self.replies
            .insert(key.to_string(), FakeReply::Output(CommandOutput::ok(stdout)));
        self
    }

    /// Registers a failing reply
    pub fn fail(mut self, key: &str, code: i32, stderr: &str) -> Self {
        self.replies.insert(
            key.to_string(),
            FakeReply::Output(CommandOutput::failed(code, stderr)),
        );
        self
    }

    /// Registers a reply that times out
    pub fn timeout(mut self, key: &str) -> Self {
        self.replies.insert(key.to_string(), FakeReply::Timeout);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    /// Commands that ran, without environment
    pub fn commands(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|call| call.command.clone()).collect()
    }

    fn reply_for(&self, command: &str) -> Option<&FakeReply> {
        if let Some(reply) = self.replies.get(command) {
            return Some(reply);
        }
        self.replies
            .iter()
            .filter(|(key, _)| command.starts_with(key.as_str()))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, reply)| reply)
    }
}

impl CommandRunner for FakeRunner {
    fn run_with_env(
        &self,
        program: &str,
        args: &[&str],
        env: &EnvOverrides,
    ) -> Result<CommandOutput, AppError> {
        let command = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.borrow_mut().push(RecordedCall {
            command: command.clone(),
            env: env.clone(),
        });

        match self.reply_for(&command) {
            Some(FakeReply::Output(output)) => Ok(output.clone()),
            Some(FakeReply::Timeout) => Err(AppError::Timeout {
                program: program.to_string(),
                secs: 0,
            }),
            None => Err(AppError::Command {
                program: program.to_string(),
                message: format!("no fake reply registered for '{command}'"),
            }),
        }
    }
}
