//! Scripted guest runtime for tests that should not need an interpreter.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use guesthost_env::Environment;

use crate::alias::GuestAlias;
use crate::error::InvocationError;
use crate::runtime::{BridgeRequirement, GuestRuntime, GuestRuntimeFactory};
use crate::value::GuestValue;

type Handler = Arc<dyn Fn(&[GuestValue]) -> GuestValue + Send + Sync>;

#[derive(Clone)]
enum Behavior {
    Return(Handler),
    Raise { kind: String, message: String },
}

/// One call the runtime received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeCall {
    Exec(String),
    Import { module: String, alias: String },
    Invoke { callable: String, args: Vec<GuestValue> },
}

/// Hands out [`ScriptedRuntime`]s that answer invocations from registered
/// handlers keyed by bare callable name (the alias prefix is ignored). An
/// unregistered callable raises `AttributeError`, as the guest would.
/// All runtimes from one factory share its call log.
#[derive(Clone, Default)]
pub struct ScriptedRuntimeFactory {
    behaviors: HashMap<String, Behavior>,
    calls: Arc<Mutex<Vec<RuntimeCall>>>,
    bridge: Option<BridgeRequirement>,
}

impl ScriptedRuntimeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(mut self, callable: &str, f: F) -> Self
    where
        F: Fn(&[GuestValue]) -> GuestValue + Send + Sync + 'static,
    {
        self.behaviors
            .insert(callable.to_string(), Behavior::Return(Arc::new(f)));
        self
    }

    /// Make `callable` raise a guest exception of class `kind`.
    pub fn raises(mut self, callable: &str, kind: &str, message: &str) -> Self {
        self.behaviors.insert(
            callable.to_string(),
            Behavior::Raise {
                kind: kind.to_string(),
                message: message.to_string(),
            },
        );
        self
    }

    pub fn with_bridge_requirement(mut self, prefix: &str, specifier: &str) -> Self {
        self.bridge = Some(BridgeRequirement {
            prefix: prefix.to_string(),
            specifier: specifier.to_string(),
        });
        self
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Invocations only, as `(bare callable name, args)`.
    pub fn invocations(&self) -> Vec<(String, Vec<GuestValue>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RuntimeCall::Invoke { callable, args } => Some((bare_name(&callable).to_string(), args)),
                _ => None,
            })
            .collect()
    }
}

impl GuestRuntimeFactory for ScriptedRuntimeFactory {
    fn start(
        &self,
        _env: &Environment,
        _scripts_dir: &Path,
    ) -> Result<Box<dyn GuestRuntime>, InvocationError> {
        Ok(Box::new(ScriptedRuntime {
            behaviors: self.behaviors.clone(),
            calls: Arc::clone(&self.calls),
        }))
    }

    fn bridge_requirement(&self) -> Option<BridgeRequirement> {
        self.bridge.clone()
    }
}

pub struct ScriptedRuntime {
    behaviors: HashMap<String, Behavior>,
    calls: Arc<Mutex<Vec<RuntimeCall>>>,
}

impl ScriptedRuntime {
    fn record(&self, call: RuntimeCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

fn bare_name(callable: &str) -> &str {
    callable.rsplit_once('.').map(|(_, n)| n).unwrap_or(callable)
}

impl GuestRuntime for ScriptedRuntime {
    fn exec(&mut self, statement: &str) -> Result<(), InvocationError> {
        self.record(RuntimeCall::Exec(statement.to_string()));
        Ok(())
    }

    fn import(&mut self, module: &str, alias: &GuestAlias) -> Result<(), InvocationError> {
        self.record(RuntimeCall::Import {
            module: module.to_string(),
            alias: alias.to_string(),
        });
        Ok(())
    }

    fn invoke(&mut self, callable: &str, args: &[GuestValue]) -> Result<GuestValue, InvocationError> {
        self.record(RuntimeCall::Invoke {
            callable: callable.to_string(),
            args: args.to_vec(),
        });
        let name = bare_name(callable);
        match self.behaviors.get(name) {
            Some(Behavior::Return(f)) => Ok(f(args)),
            Some(Behavior::Raise { kind, message }) => Err(InvocationError::GuestRaised {
                kind: kind.clone(),
                message: message.clone(),
                traceback: None,
            }),
            None => Err(InvocationError::GuestRaised {
                kind: "AttributeError".into(),
                message: format!("module has no attribute '{}'", name),
                traceback: None,
            }),
        }
    }
}
