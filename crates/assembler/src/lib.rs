//! Skald assembler — compiles s-expression source text to bytecode.
//!
//! Compilation is a single recursive walk over the expression tree followed
//! by a label-resolution pass per function. Known callables from the
//! builtin scope compile to `callDirect` with the callable embedded in the
//! operand; everything else goes through a scope lookup and a dynamic call.
//!
//! # Usage
//!
//! ```
//! use skald_assembler::assemble;
//! use skald_vm::{Value, VirtualMachine};
//!
//! let script = assemble("(define x 2) (define y (+ x 3))").unwrap();
//! let mut vm = VirtualMachine::new(64);
//! vm.execute(&script).unwrap();
//! assert_eq!(vm.current_scope().borrow().try_get("y"), Some(Value::Number(5.0)));
//! ```

pub mod disassembler;
pub mod error;

mod lexer;
mod parser;

pub use disassembler::disassemble;
pub use error::AssemblyError;

use skald_vm::{Function, Instruction, Operator, Scope, Script, Value};

use lexer::tokenize;
use parser::{parse, Expr};

/// A function body under construction: instructions interleaved with label
/// markers, before label resolution.
///
/// Labels the compiler generates for `if`/`loop` control flow are kept
/// apart from user-declared ones so the two can never shadow each other.
enum Line {
    Label(String),
    Synthetic(String),
    Instr(Instruction),
}

/// Compiles source text into [`Script`]s.
///
/// The builtin scope, when provided, is only consulted at compile time for
/// the `callDirect` optimization and dotted property paths; it is not
/// merged into the produced script's scope.
pub struct Assembler {
    builtin_scope: Scope,
    label_count: usize,
}

/// Assemble with no builtin scope. Named calls all compile to dynamic
/// lookups resolved at run time.
pub fn assemble(source: &str) -> Result<Script, AssemblyError> {
    Assembler::new().assemble(source)
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    pub fn new() -> Self {
        Self {
            builtin_scope: Scope::new("builtin"),
            label_count: 0,
        }
    }

    pub fn with_builtins(scope: Scope) -> Self {
        Self {
            builtin_scope: scope,
            label_count: 0,
        }
    }

    /// Compile a whole source text into a script.
    ///
    /// Top-level `(function name ...)` forms become bindings in the
    /// script's initial scope; everything else forms the global function
    /// body, executed in order.
    pub fn assemble(&mut self, source: &str) -> Result<Script, AssemblyError> {
        self.label_count = 0;
        let tokens = tokenize(source)?;
        let expressions = parse(&tokens)?;

        let mut scope = Scope::new("global");
        let mut body = Vec::new();
        for expr in expressions {
            match self.try_named_function(&expr)? {
                Some((name, function)) => scope.define(&name, Value::from(function)),
                None => body.push(expr),
            }
        }

        let function = self.compile_function("global", Vec::new(), &body)?;
        Ok(Script::new(function, scope))
    }

    /// A top-level `(function name (params) body...)`, if that is what
    /// this expression is.
    fn try_named_function(
        &mut self,
        expr: &Expr,
    ) -> Result<Option<(String, Function)>, AssemblyError> {
        let Expr::List { items, .. } = expr else {
            return Ok(None);
        };
        let Some(Expr::Symbol { name: head, .. }) = items.first() else {
            return Ok(None);
        };
        if head != "function" {
            return Ok(None);
        }
        let Some(Expr::Symbol { name, line }) = items.get(1) else {
            return Ok(None);
        };

        let params = match items.get(2) {
            Some(expr) => self.parse_parameters(expr)?,
            None => {
                return Err(AssemblyError::MissingArgument {
                    line: *line,
                    form: "function".to_string(),
                    expected: "a parameter list",
                })
            }
        };
        let function = self.compile_function(name, params, &items[3..])?;
        Ok(Some((name.clone(), function)))
    }

    fn compile_function(
        &mut self,
        name: &str,
        parameters: Vec<String>,
        body: &[Expr],
    ) -> Result<Function, AssemblyError> {
        let mut lines = Vec::new();
        let mut loops = Vec::new();
        for expr in body {
            self.compile_statement(expr, &mut lines, &mut loops)?;
        }
        finalize(name, parameters, lines)
    }

    fn compile_statement(
        &mut self,
        expr: &Expr,
        lines: &mut Vec<Line>,
        loops: &mut Vec<(String, String)>,
    ) -> Result<(), AssemblyError> {
        if let Expr::Symbol { name, .. } = expr {
            if name.starts_with(':') {
                lines.push(Line::Label(name.clone()));
                return Ok(());
            }
        }
        self.compile_expr(expr, lines, loops)
    }

    fn compile_expr(
        &mut self,
        expr: &Expr,
        lines: &mut Vec<Line>,
        loops: &mut Vec<(String, String)>,
    ) -> Result<(), AssemblyError> {
        match expr {
            Expr::Literal { value, .. } => {
                emit(lines, Instruction::new(Operator::Push, value.clone()));
                Ok(())
            }
            Expr::Symbol { name, line } => {
                match name.strip_prefix('{').and_then(|n| n.strip_suffix('}')) {
                    // The value is already on the operand stack.
                    Some("TOP") => Ok(()),
                    Some(path) => self.compile_read(path, *line, lines),
                    None => self.compile_read(name, *line, lines),
                }
            }
            Expr::List { items, line } => {
                let Some(head) = items.first() else {
                    return Err(AssemblyError::MalformedForm {
                        line: *line,
                        form: "()".to_string(),
                        message: "empty form".to_string(),
                    });
                };
                if let Expr::Symbol { name, .. } = head {
                    if let Some(result) = self.compile_keyword(name, items, *line, lines, loops)
                    {
                        return result;
                    }
                }
                self.compile_call(items, lines, loops)
            }
        }
    }

    /// A read in value position: a label reference, a dotted builtin path,
    /// or a plain variable name.
    fn compile_read(
        &mut self,
        name: &str,
        line: usize,
        lines: &mut Vec<Line>,
    ) -> Result<(), AssemblyError> {
        if name.starts_with(':') {
            // Label reference as a value, e.g. a jump target.
            emit(lines, Instruction::new(Operator::Push, Value::string(name)));
        } else if name.contains('.') {
            let value =
                self.resolve_builtin(name)
                    .ok_or_else(|| AssemblyError::UnknownProperty {
                        line,
                        path: name.to_string(),
                    })?;
            emit(lines, Instruction::new(Operator::Push, value));
        } else {
            emit(lines, Instruction::new(Operator::Get, Value::string(name)));
        }
        Ok(())
    }

    /// Dispatch on a special-form keyword; `None` means the head is not a
    /// keyword and the list is an ordinary call.
    fn compile_keyword(
        &mut self,
        keyword: &str,
        items: &[Expr],
        line: usize,
        lines: &mut Vec<Line>,
        loops: &mut Vec<(String, String)>,
    ) -> Option<Result<(), AssemblyError>> {
        let result = match keyword {
            "define" => self.compile_binding(Operator::Define, items, line, lines, loops),
            "set" => self.compile_binding(Operator::Set, items, line, lines, loops),
            "+=" => self.compile_binding(Operator::AddTo, items, line, lines, loops),
            "++" | "inc" => self.compile_adjust(Operator::Inc, keyword, items, line, lines),
            "--" | "dec" => self.compile_adjust(Operator::Dec, keyword, items, line, lines),
            "if" => self.compile_branch(false, items, line, lines, loops),
            "unless" => self.compile_branch(true, items, line, lines, loops),
            "loop" => self.compile_loop(items, line, lines, loops),
            "continue" | "break" => self.compile_loop_control(keyword, line, lines, loops),
            "pop" => self.compile_bare(Operator::Pop, keyword, items, line, lines),
            "copy" => self.compile_bare(Operator::Copy, keyword, items, line, lines),
            "swap" => self.compile_swap(items, line, lines, loops),
            "jump" => self.compile_jump(items, line, lines, loops),
            "return" => self.compile_return(items, lines, loops),
            "run" => self.compile_run(items, line, lines, loops),
            "function" => self.compile_function_form(items, line, lines),
            "+" => self.compile_fold(Operator::Add, keyword, items, line, lines, loops),
            "-" => self.compile_fold(Operator::Subtract, keyword, items, line, lines, loops),
            "*" => self.compile_fold(Operator::Multiply, keyword, items, line, lines, loops),
            "/" => self.compile_fold(Operator::Divide, keyword, items, line, lines, loops),
            "<" => self.compile_compare(Operator::LessThan, keyword, items, line, lines, loops),
            ">" => {
                self.compile_compare(Operator::GreaterThan, keyword, items, line, lines, loops)
            }
            "==" => self.compile_compare(Operator::Equals, keyword, items, line, lines, loops),
            "!=" => {
                self.compile_compare(Operator::NotEquals, keyword, items, line, lines, loops)
            }
            "!" => self.compile_not(items, line, lines, loops),
            _ => return None,
        };
        Some(result)
    }

    /// `(define name value)`, `(set name value)`, `(+= name value)`.
    fn compile_binding(
        &mut self,
        operator: Operator,
        items: &[Expr],
        line: usize,
        lines: &mut Vec<Line>,
        loops: &mut Vec<(String, String)>,
    ) -> Result<(), AssemblyError> {
        if items.len() != 3 {
            return Err(AssemblyError::MissingArgument {
                line,
                form: form_name(items),
                expected: "a name and a value",
            });
        }
        let name = binding_name(&items[1], line, &form_name(items))?;
        self.compile_expr(&items[2], lines, loops)?;
        emit(lines, Instruction::new(operator, Value::string(&name)));
        Ok(())
    }

    /// `(++ name)` / `(-- name)`.
    fn compile_adjust(
        &mut self,
        operator: Operator,
        keyword: &str,
        items: &[Expr],
        line: usize,
        lines: &mut Vec<Line>,
    ) -> Result<(), AssemblyError> {
        if items.len() != 2 {
            return Err(AssemblyError::MissingArgument {
                line,
                form: keyword.to_string(),
                expected: "a variable name",
            });
        }
        let name = binding_name(&items[1], line, keyword)?;
        emit(lines, Instruction::new(operator, Value::string(&name)));
        Ok(())
    }

    /// `(if cond then else?)` and `(unless cond then else?)`.
    fn compile_branch(
        &mut self,
        invert: bool,
        items: &[Expr],
        line: usize,
        lines: &mut Vec<Line>,
        loops: &mut Vec<(String, String)>,
    ) -> Result<(), AssemblyError> {
        if items.len() < 3 || items.len() > 4 {
            return Err(AssemblyError::MissingArgument {
                line,
                form: form_name(items),
                expected: "a condition and one or two branches",
            });
        }
        let skip_op = if invert {
            Operator::JumpTrue
        } else {
            Operator::JumpFalse
        };

        self.compile_expr(&items[1], lines, loops)?;
        let skip_label = self.unique_label("else");
        emit(lines, Instruction::new(skip_op, Value::string(&skip_label)));
        self.compile_statement(&items[2], lines, loops)?;

        if let Some(else_branch) = items.get(3) {
            let end_label = self.unique_label("end");
            emit(
                lines,
                Instruction::new(Operator::Jump, Value::string(&end_label)),
            );
            lines.push(Line::Synthetic(skip_label));
            self.compile_statement(else_branch, lines, loops)?;
            lines.push(Line::Synthetic(end_label));
        } else {
            lines.push(Line::Synthetic(skip_label));
        }
        Ok(())
    }

    /// `(loop cond body...)`: re-test the condition before every pass.
    fn compile_loop(
        &mut self,
        items: &[Expr],
        line: usize,
        lines: &mut Vec<Line>,
        loops: &mut Vec<(String, String)>,
    ) -> Result<(), AssemblyError> {
        if items.len() < 3 {
            return Err(AssemblyError::MissingArgument {
                line,
                form: "loop".to_string(),
                expected: "a condition and a body",
            });
        }
        let start = self.unique_label("loop-start");
        let end = self.unique_label("loop-end");

        lines.push(Line::Synthetic(start.clone()));
        self.compile_expr(&items[1], lines, loops)?;
        emit(
            lines,
            Instruction::new(Operator::JumpFalse, Value::string(&end)),
        );

        loops.push((start.clone(), end.clone()));
        let body_result: Result<(), AssemblyError> = items[2..]
            .iter()
            .try_for_each(|stmt| self.compile_statement(stmt, lines, loops));
        loops.pop();
        body_result?;

        emit(lines, Instruction::new(Operator::Jump, Value::string(&start)));
        lines.push(Line::Synthetic(end));
        Ok(())
    }

    fn compile_loop_control(
        &mut self,
        keyword: &str,
        line: usize,
        lines: &mut Vec<Line>,
        loops: &mut Vec<(String, String)>,
    ) -> Result<(), AssemblyError> {
        let Some((start, end)) = loops.last() else {
            return Err(AssemblyError::OutsideLoop {
                line,
                keyword: if keyword == "continue" {
                    "continue"
                } else {
                    "break"
                },
            });
        };
        let target = if keyword == "continue" { start } else { end };
        emit(lines, Instruction::new(Operator::Jump, Value::string(target)));
        Ok(())
    }

    /// `(pop)` and `(copy)`: explicit stack manipulation.
    fn compile_bare(
        &mut self,
        operator: Operator,
        keyword: &str,
        items: &[Expr],
        line: usize,
        lines: &mut Vec<Line>,
    ) -> Result<(), AssemblyError> {
        if items.len() != 1 {
            return Err(AssemblyError::MalformedForm {
                line,
                form: keyword.to_string(),
                message: "takes no arguments".to_string(),
            });
        }
        emit(lines, Instruction::bare(operator));
        Ok(())
    }

    /// `(swap offset)`: exchange the top with the element `offset` below.
    fn compile_swap(
        &mut self,
        items: &[Expr],
        line: usize,
        lines: &mut Vec<Line>,
        loops: &mut Vec<(String, String)>,
    ) -> Result<(), AssemblyError> {
        if items.len() != 2 {
            return Err(AssemblyError::MissingArgument {
                line,
                form: "swap".to_string(),
                expected: "a stack offset",
            });
        }
        self.compile_operand(Operator::Swap, &items[1], lines, loops)
    }

    /// `(jump :label)`, `(jump :label scopeName)`, or `(jump expr)`.
    fn compile_jump(
        &mut self,
        items: &[Expr],
        line: usize,
        lines: &mut Vec<Line>,
        loops: &mut Vec<(String, String)>,
    ) -> Result<(), AssemblyError> {
        match items.get(1) {
            None => Err(AssemblyError::MissingArgument {
                line,
                form: "jump".to_string(),
                expected: "a label",
            }),
            Some(Expr::Symbol { name, .. }) if name.starts_with(':') => {
                let operand = match items.get(2) {
                    // Cross-scope jumps stay symbolic; the engine resolves
                    // them after switching scope.
                    Some(scope_expr) => {
                        let scope = binding_name(scope_expr, line, "jump")?;
                        Value::array(vec![Value::string(name), Value::string(&scope)])
                    }
                    None => Value::string(name),
                };
                emit(lines, Instruction::new(Operator::Jump, operand));
                Ok(())
            }
            Some(target) => {
                self.compile_expr(target, lines, loops)?;
                emit(lines, Instruction::bare(Operator::Jump));
                Ok(())
            }
        }
    }

    /// `(return values...)`.
    fn compile_return(
        &mut self,
        items: &[Expr],
        lines: &mut Vec<Line>,
        loops: &mut Vec<(String, String)>,
    ) -> Result<(), AssemblyError> {
        for value in &items[1..] {
            self.compile_expr(value, lines, loops)?;
        }
        emit(lines, Instruction::bare(Operator::Return));
        Ok(())
    }

    /// `(run command)`.
    fn compile_run(
        &mut self,
        items: &[Expr],
        line: usize,
        lines: &mut Vec<Line>,
        loops: &mut Vec<(String, String)>,
    ) -> Result<(), AssemblyError> {
        if items.len() != 2 {
            return Err(AssemblyError::MissingArgument {
                line,
                form: "run".to_string(),
                expected: "a command value",
            });
        }
        self.compile_expr(&items[1], lines, loops)?;
        emit(lines, Instruction::bare(Operator::Run));
        Ok(())
    }

    /// A `function` form in expression position: named forms define
    /// themselves, anonymous forms leave the value on the stack.
    fn compile_function_form(
        &mut self,
        items: &[Expr],
        line: usize,
        lines: &mut Vec<Line>,
    ) -> Result<(), AssemblyError> {
        match items.get(1) {
            Some(Expr::Symbol { name, .. }) => {
                let name = name.clone();
                let params = match items.get(2) {
                    Some(expr) => self.parse_parameters(expr)?,
                    None => {
                        return Err(AssemblyError::MissingArgument {
                            line,
                            form: "function".to_string(),
                            expected: "a parameter list",
                        })
                    }
                };
                let function = self.compile_function(&name, params, &items[3..])?;
                emit(
                    lines,
                    Instruction::new(Operator::Push, Value::from(function)),
                );
                emit(
                    lines,
                    Instruction::new(Operator::Define, Value::string(&name)),
                );
                Ok(())
            }
            Some(params_expr @ Expr::List { .. }) => {
                let params = self.parse_parameters(params_expr)?;
                let function = self.compile_function("anonymous", params, &items[2..])?;
                emit(
                    lines,
                    Instruction::new(Operator::Push, Value::from(function)),
                );
                Ok(())
            }
            _ => Err(AssemblyError::MissingArgument {
                line,
                form: "function".to_string(),
                expected: "a parameter list",
            }),
        }
    }

    /// `(+ a b ...)` left-fold; literal operands embed into the opcode.
    fn compile_fold(
        &mut self,
        operator: Operator,
        keyword: &str,
        items: &[Expr],
        line: usize,
        lines: &mut Vec<Line>,
        loops: &mut Vec<(String, String)>,
    ) -> Result<(), AssemblyError> {
        if items.len() < 3 {
            return Err(AssemblyError::MissingArgument {
                line,
                form: keyword.to_string(),
                expected: "at least two operands",
            });
        }
        self.compile_expr(&items[1], lines, loops)?;
        for arg in &items[2..] {
            self.compile_operand(operator, arg, lines, loops)?;
        }
        Ok(())
    }

    /// `(< a b)` and friends; exactly two operands.
    fn compile_compare(
        &mut self,
        operator: Operator,
        keyword: &str,
        items: &[Expr],
        line: usize,
        lines: &mut Vec<Line>,
        loops: &mut Vec<(String, String)>,
    ) -> Result<(), AssemblyError> {
        if items.len() != 3 {
            return Err(AssemblyError::MissingArgument {
                line,
                form: keyword.to_string(),
                expected: "two operands",
            });
        }
        self.compile_expr(&items[1], lines, loops)?;
        self.compile_operand(operator, &items[2], lines, loops)
    }

    fn compile_not(
        &mut self,
        items: &[Expr],
        line: usize,
        lines: &mut Vec<Line>,
        loops: &mut Vec<(String, String)>,
    ) -> Result<(), AssemblyError> {
        if items.len() != 2 {
            return Err(AssemblyError::MissingArgument {
                line,
                form: "!".to_string(),
                expected: "one operand",
            });
        }
        self.compile_expr(&items[1], lines, loops)?;
        emit(lines, Instruction::bare(Operator::Not));
        Ok(())
    }

    /// Emit `operator` consuming `arg`: literals ride along as the operand,
    /// anything else is computed onto the stack first.
    fn compile_operand(
        &mut self,
        operator: Operator,
        arg: &Expr,
        lines: &mut Vec<Line>,
        loops: &mut Vec<(String, String)>,
    ) -> Result<(), AssemblyError> {
        if let Expr::Literal { value, .. } = arg {
            emit(lines, Instruction::new(operator, value.clone()));
        } else {
            self.compile_expr(arg, lines, loops)?;
            emit(lines, Instruction::bare(operator));
        }
        Ok(())
    }

    /// An ordinary call: `(callee args...)`.
    fn compile_call(
        &mut self,
        items: &[Expr],
        lines: &mut Vec<Line>,
        loops: &mut Vec<(String, String)>,
    ) -> Result<(), AssemblyError> {
        let (head, args) = (&items[0], &items[1..]);
        let arg_count = Value::from(args.len());

        // Callables known at compile time skip the scope lookup entirely.
        if let Expr::Symbol { name, line } = head {
            if !name.starts_with(':') {
                match self.resolve_builtin(name) {
                    Some(callable) if callable.is_callable() => {
                        for arg in args {
                            self.compile_expr(arg, lines, loops)?;
                        }
                        emit(
                            lines,
                            Instruction::new(
                                Operator::CallDirect,
                                Value::array(vec![callable, arg_count]),
                            ),
                        );
                        return Ok(());
                    }
                    Some(_) | None if name.contains('.') => {
                        return Err(AssemblyError::UnknownProperty {
                            line: *line,
                            path: name.clone(),
                        })
                    }
                    _ => {}
                }
            }
        }

        self.compile_expr(head, lines, loops)?;
        for arg in args {
            self.compile_expr(arg, lines, loops)?;
        }
        emit(lines, Instruction::new(Operator::Call, arg_count));
        Ok(())
    }

    fn parse_parameters(&self, expr: &Expr) -> Result<Vec<String>, AssemblyError> {
        let Expr::List { items, line } = expr else {
            return Err(AssemblyError::MalformedForm {
                line: expr.line(),
                form: "function".to_string(),
                message: "expected a parameter list".to_string(),
            });
        };
        items
            .iter()
            .map(|item| match item {
                Expr::Symbol { name, .. } => Ok(name.clone()),
                _ => Err(AssemblyError::MalformedForm {
                    line: *line,
                    form: "function".to_string(),
                    message: "parameters must be plain names".to_string(),
                }),
            })
            .collect()
    }

    /// Walk a dotted path through the builtin scope's objects.
    fn resolve_builtin(&self, path: &str) -> Option<Value> {
        let mut parts = path.split('.');
        let root = parts.next()?;
        let mut value = self.builtin_scope.try_get(root)?;
        for part in parts {
            let next = value.as_object().ok()?.get(part)?.clone();
            value = next;
        }
        Some(value)
    }

    /// A fresh control-flow label. The `;` in the name cannot appear in a
    /// source atom (it starts a comment), so no user label can match it.
    fn unique_label(&mut self, hint: &str) -> String {
        let label = format!(":{};{}", hint, self.label_count);
        self.label_count += 1;
        label
    }
}

fn emit(lines: &mut Vec<Line>, instruction: Instruction) {
    lines.push(Line::Instr(instruction));
}

fn form_name(items: &[Expr]) -> String {
    match items.first() {
        Some(Expr::Symbol { name, .. }) => name.clone(),
        _ => "?".to_string(),
    }
}

/// A binding target: a bare symbol or a string literal.
fn binding_name(expr: &Expr, line: usize, form: &str) -> Result<String, AssemblyError> {
    match expr {
        Expr::Symbol { name, .. } => Ok(name.clone()),
        Expr::Literal {
            value: Value::String(s),
            ..
        } => Ok(s.to_string()),
        _ => Err(AssemblyError::MalformedForm {
            line,
            form: form.to_string(),
            message: "expected a name".to_string(),
        }),
    }
}

/// Two-pass label resolution.
///
/// Pass one records each label's instruction index, keeping user-declared
/// and compiler-generated labels in separate tables; only the user table
/// survives into the Function. Pass two rewrites direct jump targets to
/// resolved indices. Call labels are validated but kept symbolic, since a
/// numeric call operand means an argument count. Cross-scope
/// `[label, scope]` operands are left for runtime resolution.
fn finalize(
    name: &str,
    parameters: Vec<String>,
    lines: Vec<Line>,
) -> Result<Function, AssemblyError> {
    let mut labels = std::collections::HashMap::new();
    let mut synthetic = std::collections::HashMap::new();
    let mut index = 0usize;
    for line in &lines {
        match line {
            Line::Label(label) => {
                labels.insert(label.clone(), index);
            }
            Line::Synthetic(label) => {
                synthetic.insert(label.clone(), index);
            }
            Line::Instr(_) => index += 1,
        }
    }

    let mut instructions = Vec::with_capacity(index);
    for line in lines {
        let Line::Instr(mut instruction) = line else {
            continue;
        };
        if instruction.operator.is_jump_family() {
            if let Some(Value::String(label)) = &instruction.operand {
                if label.starts_with(':') {
                    let target = synthetic
                        .get(label.as_ref())
                        .or_else(|| labels.get(label.as_ref()));
                    match target {
                        Some(&target) if instruction.operator != Operator::Call => {
                            instruction.operand = Some(Value::Number(target as f64));
                        }
                        Some(_) => {}
                        None => {
                            return Err(AssemblyError::UnresolvedLabel {
                                label: label.to_string(),
                                function: name.to_string(),
                            })
                        }
                    }
                }
            }
        }
        instructions.push(instruction);
    }

    Ok(Function::new(instructions, parameters, labels, name))
}
