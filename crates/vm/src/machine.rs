//! Engine state and the host embedding API.
//!
//! One engine instance owns its operand stack, call stack, scope registry,
//! and program counter outright; embedding in a multi-threaded host
//! requires external synchronization around `step`/`run`.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{RuntimeError, RuntimeErrorKind, StackTrace, TraceFrame, TypeError};
use crate::function::Function;
use crate::scope::{Scope, ScopeRef};
use crate::script::Script;
use crate::stack::FixedStack;
use crate::value::Value;

/// Signature of a host-registered builtin callable. Results are pushed
/// back onto the operand stack by the callback.
pub type BuiltinFn = dyn Fn(&mut VirtualMachine, &[Value]) -> Result<(), RuntimeError>;

/// Host hook invoked by the `run` opcode.
pub type RunCommandHandler = dyn Fn(Value, &mut VirtualMachine) -> Result<(), RuntimeError>;

/// Saved caller state, pushed on `call`/`callDirect` and popped on `return`.
#[derive(Debug, Clone)]
pub struct CallFrame {
    /// Instruction index to resume at.
    pub return_counter: usize,
    /// Function to resume in.
    pub function: Rc<Function>,
    /// Scope to restore.
    pub scope: ScopeRef,
}

/// The Skald virtual machine.
pub struct VirtualMachine {
    /// Capacity of the operand stack and the call stack.
    pub stack_size: usize,

    pub(crate) stack: FixedStack<Value>,
    pub(crate) call_stack: FixedStack<CallFrame>,

    pub(crate) scopes: HashMap<String, ScopeRef>,
    pub(crate) builtin_scope: Option<ScopeRef>,
    pub(crate) current_scope: ScopeRef,
    pub(crate) current_function: Option<Rc<Function>>,

    pub(crate) program_counter: usize,
    pub(crate) running: bool,
    pub(crate) paused: bool,

    pub(crate) run_command: Option<Rc<RunCommandHandler>>,
}

impl VirtualMachine {
    /// Create an engine with a fixed operand/call stack capacity.
    pub fn new(stack_size: usize) -> Self {
        Self {
            stack_size,
            stack: FixedStack::new(stack_size),
            call_stack: FixedStack::new(stack_size),
            scopes: HashMap::new(),
            builtin_scope: None,
            current_scope: Scope::new("global").into_ref(),
            current_function: None,
            program_counter: 0,
            running: false,
            paused: false,
            run_command: None,
        }
    }

    // ---- Scope registry ----

    /// Register a named scope for cross-scope jumps and `run(start_scope)`.
    pub fn add_scope(&mut self, scope: Scope) {
        let name = scope.name.clone();
        self.scopes.insert(name, scope.into_ref());
    }

    pub fn add_scopes(&mut self, scopes: impl IntoIterator<Item = Scope>) {
        for scope in scopes {
            self.add_scope(scope);
        }
    }

    /// The host-owned scope of builtin callables. `get` falls back to it
    /// after the current scope chain; user code never mutates it.
    pub fn set_builtin_scope(&mut self, scope: Scope) {
        self.builtin_scope = Some(scope.into_ref());
    }

    pub fn current_scope(&self) -> ScopeRef {
        self.current_scope.clone()
    }

    // ---- Host hooks ----

    /// Register the hook invoked by the `run` opcode.
    pub fn on_run_command<F>(&mut self, handler: F)
    where
        F: Fn(Value, &mut VirtualMachine) -> Result<(), RuntimeError> + 'static,
    {
        self.run_command = Some(Rc::new(handler));
    }

    // ---- Lifecycle ----

    /// Clear the stacks and counters. Registered scopes, the builtin scope,
    /// and the run-command hook survive a reset.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.call_stack.clear();
        self.program_counter = 0;
        self.running = false;
        self.paused = false;
    }

    /// Make a script current without running it.
    pub fn load(&mut self, script: &Script) {
        self.reset();
        self.current_function = Some(script.function.clone());
        self.current_scope = script.scope.clone();
    }

    /// Load a script and run it to completion.
    pub fn execute(&mut self, script: &Script) -> Result<(), RuntimeError> {
        self.load(script);
        self.run(None)
    }

    /// Run from the current position until stopped or paused.
    ///
    /// A start scope name, when given, becomes the current scope first.
    /// Without a loaded script the call fails; the engine has nothing to
    /// fetch instructions from.
    pub fn run(&mut self, start_scope: Option<&str>) -> Result<(), RuntimeError> {
        if let Some(name) = start_scope {
            match self.scopes.get(name) {
                Some(scope) => self.current_scope = scope.clone(),
                None => {
                    return Err(self.error(RuntimeErrorKind::UndefinedScope(name.to_string())))
                }
            }
        }
        if self.current_function.is_none() {
            return Err(self.error(RuntimeErrorKind::NoScriptLoaded));
        }

        self.running = true;
        self.paused = false;
        while self.running && !self.paused {
            self.step()?;
        }
        Ok(())
    }

    /// Stop at the next instruction boundary. Callable from inside a
    /// builtin; the current instruction always completes first.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Pause or resume; takes effect at the next instruction boundary.
    pub fn set_pause(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn program_counter(&self) -> usize {
        self.program_counter
    }

    /// Active call depth.
    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }

    // ---- Operand stack ----

    pub fn push_stack(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack.push(value) {
            Ok(())
        } else {
            Err(self.error(RuntimeErrorKind::StackOverflow))
        }
    }

    pub fn pop_stack(&mut self) -> Result<Value, RuntimeError> {
        match self.stack.pop() {
            Some(value) => Ok(value),
            None => Err(self.error(RuntimeErrorKind::StackUnderflow)),
        }
    }

    pub fn peek_stack(&self) -> Result<Value, RuntimeError> {
        match self.stack.peek() {
            Some(value) => Ok(value.clone()),
            None => Err(self.error(RuntimeErrorKind::StackUnderflow)),
        }
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Typed pop: peek, cast, and only consume the element when the cast
    /// succeeds. A failed cast leaves the stack untouched.
    pub fn pop_stack_number(&mut self) -> Result<f64, RuntimeError> {
        let result = match self.stack.peek() {
            Some(value) => value.as_number(),
            None => return Err(self.error(RuntimeErrorKind::StackUnderflow)),
        };
        match result {
            Ok(n) => {
                self.stack.pop();
                Ok(n)
            }
            Err(e) => Err(self.error(e.into())),
        }
    }

    /// Typed pop for bools; see `pop_stack_number` for the cast contract.
    pub fn pop_stack_bool(&mut self) -> Result<bool, RuntimeError> {
        let result = match self.stack.peek() {
            Some(value) => value.as_bool(),
            None => return Err(self.error(RuntimeErrorKind::StackUnderflow)),
        };
        match result {
            Ok(b) => {
                self.stack.pop();
                Ok(b)
            }
            Err(e) => Err(self.error(e.into())),
        }
    }

    /// Typed pop for strings; see `pop_stack_number` for the cast contract.
    pub fn pop_stack_string(&mut self) -> Result<String, RuntimeError> {
        let result = match self.stack.peek() {
            Some(value) => value.as_string().map(str::to_string),
            None => return Err(self.error(RuntimeErrorKind::StackUnderflow)),
        };
        match result {
            Ok(s) => {
                self.stack.pop();
                Ok(s)
            }
            Err(e) => Err(self.error(e.into())),
        }
    }

    // ---- Cast helpers for builtins ----

    /// Attach the current stack trace to a cast failure.
    pub fn type_error<T>(&self, error: TypeError) -> Result<T, RuntimeError> {
        Err(self.error(error.into()))
    }

    pub fn cast_number(&self, value: &Value) -> Result<f64, RuntimeError> {
        value.as_number().or_else(|e| self.type_error(e))
    }

    pub fn cast_index(&self, value: &Value) -> Result<usize, RuntimeError> {
        value.as_index().or_else(|e| self.type_error(e))
    }

    pub fn cast_string(&self, value: &Value) -> Result<String, RuntimeError> {
        value
            .as_string()
            .map(str::to_string)
            .or_else(|e| self.type_error(e))
    }

    // ---- Errors and traces ----

    /// Build a runtime error carrying the current stack trace.
    pub fn error(&self, kind: RuntimeErrorKind) -> RuntimeError {
        RuntimeError::new(kind, self.create_stack_trace())
    }

    /// Capture the call chain: the current frame first, then each saved
    /// frame from most to least recent.
    pub fn create_stack_trace(&self) -> StackTrace {
        let mut frames = Vec::with_capacity(self.call_stack.len() + 1);

        if let Some(func) = &self.current_function {
            let index = self.program_counter.saturating_sub(1);
            let description = func
                .instructions
                .get(index)
                .map(|i| i.describe())
                .unwrap_or_else(|| "<end>".to_string());
            frames.push(TraceFrame {
                function: func.name.clone(),
                index,
                description,
            });
        }

        for frame in self.call_stack.iter().rev() {
            let index = frame.return_counter.saturating_sub(1);
            let description = frame
                .function
                .instructions
                .get(index)
                .map(|i| i.describe())
                .unwrap_or_else(|| "<end>".to_string());
            frames.push(TraceFrame {
                function: frame.function.name.clone(),
                index,
                description,
            });
        }

        StackTrace { frames }
    }
}
