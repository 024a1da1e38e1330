//! Test-only scripted agent backends.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{Result, anyhow};

use crate::io::agent::{AgentCli, InvokeRequest, Invocation};

/// One predetermined agent response.
#[derive(Debug, Clone)]
pub struct ScriptedInvocation {
    pub exit_code: i32,
    pub output: String,
}

impl ScriptedInvocation {
    /// Clean exit with the given captured output.
    pub fn clean(output: &str) -> Self {
        Self {
            exit_code: 0,
            output: output.to_string(),
        }
    }

    /// Nonzero exit with the given captured output.
    pub fn failed(exit_code: i32, output: &str) -> Self {
        Self {
            exit_code,
            output: output.to_string(),
        }
    }
}

/// Agent backend that replays a script instead of spawning processes.
///
/// Records every prompt it receives so tests can assert on what the
/// supervisor fed it. Running past the end of the script is an error.
pub struct ScriptedAgent {
    script: Mutex<VecDeque<ScriptedInvocation>>,
    prompts: Mutex<Vec<String>>,
    invocations: Mutex<u32>,
}

impl ScriptedAgent {
    pub fn new(script: Vec<ScriptedInvocation>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
            invocations: Mutex::new(0),
        }
    }

    /// Number of invocations performed so far.
    pub fn invocations(&self) -> u32 {
        *self.invocations.lock().expect("invocations lock")
    }

    /// Prompts received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }
}

impl AgentCli for ScriptedAgent {
    fn invoke(&self, request: &InvokeRequest) -> Result<Invocation> {
        *self.invocations.lock().expect("invocations lock") += 1;
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(request.prompt.clone());
        let scripted = self
            .script
            .lock()
            .expect("script lock")
            .pop_front()
            .ok_or_else(|| anyhow!("scripted agent exhausted"))?;
        Ok(Invocation {
            exit_ok: scripted.exit_code == 0,
            exit_code: Some(scripted.exit_code),
            output: scripted.output,
        })
    }

    fn name(&self) -> String {
        "scripted".to_string()
    }
}
