//! The fetch-decode-execute loop.
//!
//! `step` executes exactly one instruction. An instruction either fully
//! completes its stack effect or raises before mutating the stack; there is
//! no partial-instruction rollback. Pause and stop requests take effect at
//! the instruction boundary, never mid-instruction.

use crate::error::{RuntimeError, RuntimeErrorKind, TypeError};
use crate::instruction::Instruction;
use crate::machine::{CallFrame, VirtualMachine};
use crate::operator::Operator;
use crate::scope::Scope;
use crate::value::Value;

impl VirtualMachine {
    /// Execute one instruction.
    ///
    /// Past the end of the current function this performs an implicit
    /// return when a call frame is waiting, and stops the engine otherwise.
    pub fn step(&mut self) -> Result<(), RuntimeError> {
        let function = match &self.current_function {
            Some(f) => f.clone(),
            None => {
                self.running = false;
                return Ok(());
            }
        };

        if self.program_counter >= function.instructions.len() {
            if self.call_stack.is_empty() {
                self.running = false;
                return Ok(());
            }
            return self.do_return();
        }

        let instruction = function.instructions[self.program_counter].clone();
        self.program_counter += 1;

        match instruction.operator {
            Operator::Push => {
                let value = self.operand_required(&instruction)?;
                self.push_stack(value)
            }
            Operator::Pop => {
                self.pop_stack()?;
                Ok(())
            }
            Operator::Swap => {
                let offset_value = self.operand_or_pop(&instruction)?;
                let offset = self.cast_index(&offset_value)?;
                if self.stack.swap(offset) {
                    Ok(())
                } else {
                    Err(self.error(RuntimeErrorKind::InvalidOffset(offset)))
                }
            }
            Operator::Copy => {
                let top = self.peek_stack()?;
                self.push_stack(top)
            }

            Operator::Define => {
                let name_value = self.operand_or_pop(&instruction)?;
                let name = self.cast_string(&name_value)?;
                let value = self.pop_stack()?;
                self.current_scope.borrow_mut().define(&name, value);
                Ok(())
            }
            Operator::Get => {
                let name_value = self.operand_or_pop(&instruction)?;
                let name = self.cast_string(&name_value)?;
                match self.get_variable(&name) {
                    Some(value) => self.push_stack(value),
                    None => Err(self.error(RuntimeErrorKind::UndefinedVariable(name))),
                }
            }
            Operator::Set => {
                let name_value = self.operand_or_pop(&instruction)?;
                let name = self.cast_string(&name_value)?;
                let value = self.pop_stack()?;
                if self.current_scope.borrow_mut().try_set(&name, value) {
                    Ok(())
                } else {
                    Err(self.error(RuntimeErrorKind::UndefinedVariable(name)))
                }
            }

            Operator::AddTo => {
                let name_value = self.operand_or_pop(&instruction)?;
                let name = self.cast_string(&name_value)?;
                let amount = self.pop_stack_number()?;
                self.modify_number(&name, amount)
            }
            Operator::Inc => {
                let name_value = self.operand_or_pop(&instruction)?;
                let name = self.cast_string(&name_value)?;
                self.modify_number(&name, 1.0)
            }
            Operator::Dec => {
                let name_value = self.operand_or_pop(&instruction)?;
                let name = self.cast_string(&name_value)?;
                self.modify_number(&name, -1.0)
            }

            Operator::Add => self.binary_op(&instruction, Value::add),
            Operator::Subtract => self.binary_op(&instruction, Value::subtract),
            Operator::Multiply => self.binary_op(&instruction, Value::multiply),
            Operator::Divide => self.binary_op(&instruction, Value::divide),
            Operator::LessThan => self.binary_cmp(&instruction, Value::less_than),
            Operator::GreaterThan => self.binary_cmp(&instruction, Value::greater_than),
            Operator::Equals => self.binary_cmp(&instruction, Value::equals),
            Operator::NotEquals => self.binary_cmp(&instruction, Value::not_equals),
            Operator::Not => {
                let value = self.pop_stack()?;
                let result = value.not().or_else(|e| self.type_error(e))?;
                self.push_stack(result)
            }

            Operator::Jump => {
                let target = self.operand_or_pop(&instruction)?;
                self.jump_to_value(&target)
            }
            Operator::JumpTrue => {
                let target = self.operand_or_pop(&instruction)?;
                let condition = self.pop_stack()?;
                if condition == Value::Bool(true) {
                    self.jump_to_value(&target)
                } else {
                    Ok(())
                }
            }
            Operator::JumpFalse => {
                let target = self.operand_or_pop(&instruction)?;
                let condition = self.pop_stack()?;
                if condition == Value::Bool(false) {
                    self.jump_to_value(&target)
                } else {
                    Ok(())
                }
            }

            Operator::Call => {
                let target = self.operand_or_pop(&instruction)?;
                match &target {
                    // Numeric operand: argument count. The callable sits
                    // below its arguments on the stack.
                    Value::Number(_) => {
                        let num_args = self.cast_index(&target)?;
                        let args = self.collect_args(num_args)?;
                        let callee = self.pop_stack()?;
                        self.call_value_with_args(&callee, args, true)
                    }
                    // Label operand: push a frame and transfer control.
                    Value::String(_) | Value::Array(_) => {
                        self.push_call_frame()?;
                        self.jump_to_value(&target)
                    }
                    other => Err(self.error(
                        TypeError::new("label or argument count", other.type_name()).into(),
                    )),
                }
            }
            Operator::CallDirect => {
                let operand = self.operand_required(&instruction)?;
                let pair = operand
                    .as_array()
                    .or_else(|e| self.type_error(e))?
                    .to_vec();
                if pair.len() != 2 {
                    return Err(self
                        .error(TypeError::new("[callable, argCount] pair", "array").into()));
                }
                let num_args = self.cast_index(&pair[1])?;
                self.call_value(&pair[0], num_args, true)
            }
            Operator::Return => self.do_return(),

            Operator::Run => {
                let command = self.operand_or_pop(&instruction)?;
                let handler = match &self.run_command {
                    Some(handler) => handler.clone(),
                    None => return Err(self.error(RuntimeErrorKind::NoRunHandler)),
                };
                handler(command, self)
            }
        }
    }

    /// Invoke a callable with `num_args` values taken from the stack.
    ///
    /// For script functions a call frame is pushed when `push_frame` is set
    /// and control transfers into the callee; builtins run to completion
    /// inline without a frame.
    pub fn call_value(
        &mut self,
        callee: &Value,
        num_args: usize,
        push_frame: bool,
    ) -> Result<(), RuntimeError> {
        let args = self.collect_args(num_args)?;
        self.call_value_with_args(callee, args, push_frame)
    }

    fn call_value_with_args(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        push_frame: bool,
    ) -> Result<(), RuntimeError> {
        match callee {
            Value::Builtin(builtin) => {
                let func = builtin.func();
                func(self, &args)
            }
            Value::Function(function) => {
                if push_frame {
                    self.push_call_frame()?;
                }

                let mut scope =
                    Scope::with_parent(&function.name, self.current_scope.clone());
                for (parameter, arg) in function.parameters.iter().zip(args) {
                    scope.define(parameter, arg);
                }

                self.current_function = Some(function.clone());
                self.current_scope = scope.into_ref();
                self.program_counter = 0;
                Ok(())
            }
            other => Err(self.error(TypeError::new("function", other.type_name()).into())),
        }
    }

    fn do_return(&mut self) -> Result<(), RuntimeError> {
        let frame = match self.call_stack.pop() {
            Some(frame) => frame,
            None => return Err(self.error(RuntimeErrorKind::CallStackUnderflow)),
        };
        self.program_counter = frame.return_counter;
        self.current_function = Some(frame.function);
        self.current_scope = frame.scope;
        Ok(())
    }

    fn push_call_frame(&mut self) -> Result<(), RuntimeError> {
        let function = match &self.current_function {
            Some(f) => f.clone(),
            None => return Err(self.error(RuntimeErrorKind::NoScriptLoaded)),
        };
        let frame = CallFrame {
            return_counter: self.program_counter,
            function,
            scope: self.current_scope.clone(),
        };
        if self.call_stack.push(frame) {
            Ok(())
        } else {
            Err(self.error(RuntimeErrorKind::CallStackOverflow))
        }
    }

    /// Pop `num_args` values, restoring call order.
    fn collect_args(&mut self, num_args: usize) -> Result<Vec<Value>, RuntimeError> {
        let mut args = Vec::with_capacity(num_args);
        for _ in 0..num_args {
            args.push(self.pop_stack()?);
        }
        args.reverse();
        Ok(args)
    }

    /// Resolve a jump target: a number is a resolved instruction index, a
    /// string is a label in the current function, and a `[label, scope]`
    /// pair switches to a registered scope first. An empty label resets the
    /// counter to the start of the function.
    fn jump_to_value(&mut self, target: &Value) -> Result<(), RuntimeError> {
        match target {
            Value::Number(_) => {
                self.program_counter = self.cast_index(target)?;
                Ok(())
            }
            Value::String(label) => {
                let label = label.to_string();
                self.jump_to_label(&label, None)
            }
            Value::Array(pair) => {
                if pair.is_empty() {
                    return Err(self.error(TypeError::new("label", "array").into()));
                }
                let label = self.cast_string(&pair[0])?;
                let scope_name = match pair.get(1) {
                    Some(value) => Some(self.cast_string(value)?),
                    None => None,
                };
                self.jump_to_label(&label, scope_name.as_deref())
            }
            other => Err(self.error(TypeError::new("label", other.type_name()).into())),
        }
    }

    fn jump_to_label(
        &mut self,
        label: &str,
        scope_name: Option<&str>,
    ) -> Result<(), RuntimeError> {
        if let Some(name) = scope_name {
            if !name.is_empty() {
                match self.scopes.get(name) {
                    Some(scope) => self.current_scope = scope.clone(),
                    None => {
                        return Err(
                            self.error(RuntimeErrorKind::UndefinedScope(name.to_string()))
                        )
                    }
                }
            }
        }

        if label.is_empty() {
            self.program_counter = 0;
            return Ok(());
        }

        let function = match &self.current_function {
            Some(f) => f.clone(),
            None => return Err(self.error(RuntimeErrorKind::NoScriptLoaded)),
        };
        match function.labels.get(label) {
            Some(&index) => {
                self.program_counter = index;
                Ok(())
            }
            None => Err(self.error(RuntimeErrorKind::UndefinedLabel(label.to_string()))),
        }
    }

    /// Lookup through the current scope chain, then the builtin scope.
    fn get_variable(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.current_scope.borrow().try_get(name) {
            return Some(value);
        }
        self.builtin_scope
            .as_ref()
            .and_then(|scope| scope.borrow().try_get(name))
    }

    /// In-place adjustment of a named number binding, used by the
    /// read-modify-write opcodes.
    fn modify_number(&mut self, name: &str, amount: f64) -> Result<(), RuntimeError> {
        let current = match self.current_scope.borrow().try_get(name) {
            Some(value) => value,
            None => {
                return Err(self.error(RuntimeErrorKind::UndefinedVariable(name.to_string())))
            }
        };
        let n = self.cast_number(&current)?;
        // try_get above proved the binding exists on this chain.
        if !self
            .current_scope
            .borrow_mut()
            .try_set(name, Value::Number(n + amount))
        {
            return Err(self.error(RuntimeErrorKind::UndefinedVariable(name.to_string())));
        }
        Ok(())
    }

    fn binary_op(
        &mut self,
        instruction: &Instruction,
        op: fn(&Value, &Value) -> Result<Value, TypeError>,
    ) -> Result<(), RuntimeError> {
        let right = self.operand_or_pop(instruction)?;
        let left = self.pop_stack()?;
        let result = op(&left, &right).or_else(|e| self.type_error(e))?;
        self.push_stack(result)
    }

    fn binary_cmp(
        &mut self,
        instruction: &Instruction,
        op: fn(&Value, &Value) -> Value,
    ) -> Result<(), RuntimeError> {
        let right = self.operand_or_pop(instruction)?;
        let left = self.pop_stack()?;
        self.push_stack(op(&left, &right))
    }

    /// The instruction's embedded operand, or the top of the stack.
    fn operand_or_pop(&mut self, instruction: &Instruction) -> Result<Value, RuntimeError> {
        match &instruction.operand {
            Some(value) => Ok(value.clone()),
            None => self.pop_stack(),
        }
    }

    /// The instruction's embedded operand; absence is a bytecode defect.
    fn operand_required(&self, instruction: &Instruction) -> Result<Value, RuntimeError> {
        match &instruction.operand {
            Some(value) => Ok(value.clone()),
            None => Err(self.error(RuntimeErrorKind::MissingOperand(instruction.operator))),
        }
    }

    /// Run a builtin or script function to completion from host code.
    ///
    /// Arguments are pushed for the callee; for a script function the
    /// engine runs until the matching return. Used by hosts and stdlib
    /// code to invoke function values outside the instruction stream.
    pub fn invoke(&mut self, callee: &Value, args: &[Value]) -> Result<(), RuntimeError> {
        for arg in args {
            self.push_stack(arg.clone())?;
        }
        let base_depth = self.call_stack.len();
        self.call_value(callee, args.len(), true)?;

        if matches!(callee, Value::Function(_)) {
            self.running = true;
            while self.running && !self.paused && self.call_stack.len() > base_depth {
                self.step()?;
            }
        }
        Ok(())
    }
}
