//! The evaluator kernel.
//!
//! A single iterative loop drives the whole machine: the top frame's
//! control stack yields the next statement, calls push frames onto an
//! explicit `Vec`, and returns pop them. Guest recursion therefore never
//! consumes native stack, and calls in tail position replace the calling
//! frame outright, so tail recursion runs in constant frame count at any
//! guest depth.

use crate::EvalError;
use crate::context::{Frame, NextStep};
use crate::heap::Heap;
use crate::sealing;
use crate::value::{Capability, ObjectId, ProcId, Target, Value};
use capstan_ir::{BinaryOp, Operand, Procedure, Program, RelationOp, Statement, Test, Word};
use std::collections::HashMap;
use tracing::{debug, trace};

/// A capability machine executing one program.
pub struct Machine<'p> {
    program: &'p Program,
    /// Flat name → index table resolved once at load; call sites hold
    /// indices, never procedure bodies.
    procedures: HashMap<&'p str, ProcId>,
    heap: Heap,
    frames: Vec<Frame<'p>>,
}

/// What executing one statement asks the driver loop to do.
enum Flow {
    /// Keep stepping.
    Continue,
    /// The top-level block returned; the program is done.
    Finished(Value),
}

impl<'p> Machine<'p> {
    /// Prepares a machine for a validated program tree.
    pub fn new(program: &'p Program) -> Self {
        let procedures = program
            .procedures
            .iter()
            .enumerate()
            .map(|(index, procedure)| (procedure.name.as_str(), ProcId(index)))
            .collect();
        Machine {
            program,
            procedures,
            heap: Heap::new(),
            frames: Vec::new(),
        }
    }

    /// Evaluates the top-level block to its return value.
    pub fn run(&mut self) -> Result<Value, EvalError> {
        debug!(procedures = self.program.procedures.len(), "program start");
        self.frames.push(Frame::new(None, &self.program.body, None));
        let result = self.drive();
        match &result {
            Ok(value) => debug!(%value, "program finished"),
            Err(error) => debug!(%error, "program trapped"),
        }
        result
    }

    fn drive(&mut self) -> Result<Value, EvalError> {
        loop {
            match self.top_mut().next_step() {
                Some(NextStep::Statement(statement)) => {
                    if let Flow::Finished(value) = self.execute(statement)? {
                        return Ok(value);
                    }
                }
                Some(NextStep::Branch {
                    test,
                    then_branch,
                    else_branch,
                }) => {
                    let branch = if self.eval_test(test)? {
                        then_branch
                    } else {
                        else_branch
                    };
                    self.top_mut().push_block(branch);
                }
                None => {
                    let procedure = self
                        .top()
                        .procedure
                        .unwrap_or("the top-level block")
                        .to_string();
                    return Err(EvalError::MissingReturn { procedure });
                }
            }
        }
    }

    fn execute(&mut self, statement: &'p Statement) -> Result<Flow, EvalError> {
        match statement {
            Statement::Block(body) => {
                self.top_mut().push_block(body);
            }

            Statement::Set { name, value } => {
                let value = self.eval_operand(value, "set")?;
                self.top_mut().bind(name, value);
            }

            Statement::Compute { to, lhs, op, rhs } => {
                let lhs = self.eval_word(lhs, "compute")?;
                let rhs = self.eval_word(rhs, "compute")?;
                let result = apply_binary(*op, lhs, rhs)?;
                self.top_mut().bind(to, Value::Word(result));
            }

            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.top_mut().push_conditional(
                    &condition.setup,
                    &condition.test,
                    then_branch,
                    else_branch,
                );
            }

            Statement::Return { value } => {
                let value = self.eval_operand(value, "return")?;
                if let Some(result) = self.finish_frame(value) {
                    return Ok(Flow::Finished(result));
                }
            }

            Statement::Call {
                target,
                arguments,
                result,
            } => {
                self.call(target, arguments, result)?;
            }

            Statement::CreateSeal { into } => {
                let seal = self.heap.create_seal();
                trace!(name = %into, "createSeal");
                self.top_mut().bind(into, Value::Seal(seal));
            }

            Statement::Seal { into, source, seal } => {
                let source_value = self.top().lookup(source, "seal")?;
                let seal_value = self.top().lookup(seal, "seal")?;
                let sealed = sealing::seal_value(source_value, &seal_value, source, seal)?;
                self.top_mut().bind(into, sealed);
            }

            Statement::CreateRecord {
                fields,
                capability,
                scoped,
            } => {
                let id = self.heap.allocate_record(fields, *scoped);
                trace!(name = %capability, fields = fields.len(), scoped, "createRecord");
                self.register_allocation(id, *scoped);
                self.top_mut()
                    .bind(capability, Value::Capability(Capability::object(id)));
            }

            Statement::GetField { field, record, to } => {
                let id = self.object_target(record, "getField")?;
                let value = self.heap.record_field(id, field, record)?;
                self.top_mut().bind(to, value);
            }

            Statement::SetField {
                field,
                record,
                value,
            } => {
                let id = self.object_target(record, "setField")?;
                let value = self.eval_operand(value, "setField")?;
                self.heap.set_record_field(id, field, value, record)?;
            }

            Statement::CreateVector {
                element_type,
                count,
                capability,
                scoped,
            } => {
                let id = self.heap.allocate_vector(*element_type, *count, *scoped);
                trace!(name = %capability, count, scoped, "createVector");
                self.register_allocation(id, *scoped);
                self.top_mut()
                    .bind(capability, Value::Capability(Capability::object(id)));
            }

            Statement::GetElement { vector, index, to } => {
                let id = self.object_target(vector, "getElement")?;
                let index = self.eval_word(index, "getElement")?;
                let value = self.heap.vector_element(id, index, vector)?;
                self.top_mut().bind(to, value);
            }

            Statement::SetElement {
                vector,
                index,
                value,
            } => {
                let id = self.object_target(vector, "setElement")?;
                let index = self.eval_word(index, "setElement")?;
                let value = self.eval_operand(value, "setElement")?;
                self.heap.set_vector_element(id, index, value, vector)?;
            }

            Statement::DestroyScoped { capability } => {
                self.destroy_scoped(capability)?;
            }
        }
        Ok(Flow::Continue)
    }

    /// The call protocol: resolve the target, check arity, bind (and
    /// unseal) arguments, then push a frame, or replace the calling
    /// frame for a call in tail position.
    fn call(
        &mut self,
        target: &'p Operand,
        arguments: &'p [Operand],
        result: &'p str,
    ) -> Result<(), EvalError> {
        let program = self.program;

        let target_value = self.eval_operand(target, "call")?;
        let (invocation_seal, capability) = sealing::split_target(target_value)?;
        let procedure: &'p Procedure = match capability.target {
            Target::Procedure(ProcId(index)) => &program.procedures[index],
            Target::Null => {
                return Err(EvalError::CapabilityViolation {
                    operation: "call",
                    detail: "target is a null capability".into(),
                });
            }
            Target::Object(_) => {
                return Err(EvalError::TypeMismatch {
                    operation: "call",
                    detail: "target is not a procedure capability".into(),
                });
            }
        };

        if procedure.parameters.len() != arguments.len() {
            return Err(EvalError::TypeMismatch {
                operation: "call",
                detail: format!(
                    "{} takes {} arguments, got {}",
                    procedure.name,
                    procedure.parameters.len(),
                    arguments.len()
                ),
            });
        }

        let mut bound: Vec<(&'p str, Value)> = Vec::with_capacity(arguments.len());
        for (parameter, argument) in procedure.parameters.iter().zip(arguments) {
            let value = self.eval_operand(argument, "call")?;
            let value = sealing::bind_argument(parameter, value, invocation_seal)?;
            bound.push((parameter.name.as_str(), value));
        }

        let tail = self.top().pending_is_return_of(result);
        trace!(procedure = %procedure.name, tail, depth = self.frames.len(), "call");

        let mut frame = if tail {
            // Tail position: the caller's continuation is exactly
            // `return(result)`, so its frame can be replaced. Its scoped
            // allocations are popped without revocation and stay live as
            // inherited allocations of the replacement frame.
            let caller = self
                .frames
                .pop()
                .expect("the drive loop always keeps an active frame");
            let mut frame =
                Frame::new(Some(procedure.name.as_str()), &procedure.body, caller.result_name);
            frame.inherited = caller.inherited;
            frame.inherited.extend(caller.scoped);
            frame
        } else {
            Frame::new(Some(procedure.name.as_str()), &procedure.body, Some(result))
        };
        for (name, value) in bound {
            frame.bind(name, value);
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Pops the returning frame, revokes its scoped allocations, and
    /// binds the return value in the caller. `Some` means the top-level
    /// block returned and the program is finished.
    fn finish_frame(&mut self, value: Value) -> Option<Value> {
        let frame = self.pop_frame();
        trace!(
            procedure = frame.procedure.unwrap_or("top-level"),
            depth = self.frames.len(),
            "return"
        );
        match frame.result_name {
            Some(name) => {
                self.top_mut().bind(name, value);
                None
            }
            None => Some(value),
        }
    }

    /// Pops on the return path: scoped allocations created by the frame
    /// and those inherited through tail calls are revoked together.
    fn pop_frame(&mut self) -> Frame<'p> {
        let frame = self
            .frames
            .pop()
            .expect("the drive loop always keeps an active frame");
        for id in frame.scoped.iter().rev().chain(frame.inherited.iter().rev()) {
            self.heap.revoke(*id);
        }
        frame
    }

    fn register_allocation(&mut self, id: ObjectId, scoped: bool) {
        if scoped {
            self.top_mut().scoped.push(id);
        }
    }

    /// `destroyScopedValue`: early revocation of a scoped allocation
    /// created by the current frame. Inherited allocations are not
    /// destroyable; their creating frame is gone and nobody else gets
    /// its authority.
    fn destroy_scoped(&mut self, capability: &'p Operand) -> Result<(), EvalError> {
        let value = self.eval_operand(capability, "destroyScopedValue")?;
        let Value::Capability(Capability {
            target: Target::Object(id),
        }) = value
        else {
            return Err(EvalError::TypeMismatch {
                operation: "destroyScopedValue",
                detail: format!("expected an object capability, got {}", value.kind()),
            });
        };
        if !self.heap.is_scoped(id) {
            return Err(EvalError::CapabilityViolation {
                operation: "destroyScopedValue",
                detail: "the allocation is heap-allocated, not scoped".into(),
            });
        }
        let frame = self.top_mut();
        let Some(position) = frame.scoped.iter().position(|owned| *owned == id) else {
            return Err(EvalError::CapabilityViolation {
                operation: "destroyScopedValue",
                detail: "the allocation is not owned by the current frame".into(),
            });
        };
        frame.scoped.remove(position);
        self.heap.revoke(id);
        Ok(())
    }

    fn eval_operand(
        &self,
        operand: &'p Operand,
        operation: &'static str,
    ) -> Result<Value, EvalError> {
        match operand {
            Operand::Constant(word) => Ok(Value::Word(*word)),
            Operand::Location(name) => self.top().lookup(name, operation),
            Operand::Procedure(name) => {
                let id = self
                    .procedures
                    .get(name.as_str())
                    .copied()
                    .ok_or_else(|| EvalError::UnboundName {
                        operation,
                        name: name.clone(),
                    })?;
                Ok(Value::Capability(Capability::procedure(id)))
            }
        }
    }

    fn eval_word(&self, operand: &'p Operand, operation: &'static str) -> Result<Word, EvalError> {
        match self.eval_operand(operand, operation)? {
            Value::Word(word) => Ok(word),
            other => Err(EvalError::TypeMismatch {
                operation,
                detail: format!("expected a word, got {}", other.kind()),
            }),
        }
    }

    /// Resolves a binding to the object it must address for data access.
    /// Sealed capabilities have no data access; null and revoked ones
    /// trap in the heap.
    fn object_target(&self, name: &str, operation: &'static str) -> Result<ObjectId, EvalError> {
        match self.top().lookup(name, operation)? {
            Value::Capability(Capability {
                target: Target::Object(id),
            }) => Ok(id),
            Value::Capability(Capability { target: Target::Null }) => {
                Err(EvalError::CapabilityViolation {
                    operation,
                    detail: format!("{name} is a null capability"),
                })
            }
            Value::Sealed(_) => Err(EvalError::CapabilityViolation {
                operation,
                detail: format!("{name} is sealed; no data access without unsealing"),
            }),
            other => Err(EvalError::TypeMismatch {
                operation,
                detail: format!("{name} is {}, not an object capability", other.kind()),
            }),
        }
    }

    fn eval_test(&self, test: &'p Test) -> Result<bool, EvalError> {
        match test {
            Test::Constant(holds) => Ok(*holds),
            Test::Relation { lhs, op, rhs } => {
                let lhs = self.eval_operand(lhs, "relation")?;
                let rhs = self.eval_operand(rhs, "relation")?;
                match op {
                    // Identity predicates are defined on every value kind.
                    RelationOp::Eq => Ok(lhs == rhs),
                    RelationOp::Ne => Ok(lhs != rhs),
                    ordering => {
                        let (Value::Word(lhs), Value::Word(rhs)) = (&lhs, &rhs) else {
                            return Err(EvalError::TypeMismatch {
                                operation: "relation",
                                detail: format!(
                                    "{ordering:?} is defined on words, got {} and {}",
                                    lhs.kind(),
                                    rhs.kind()
                                ),
                            });
                        };
                        Ok(match ordering {
                            RelationOp::Lt => lhs < rhs,
                            RelationOp::Le => lhs <= rhs,
                            RelationOp::Gt => lhs > rhs,
                            RelationOp::Ge => lhs >= rhs,
                            RelationOp::Eq | RelationOp::Ne => unreachable!(),
                        })
                    }
                }
            }
        }
    }

    fn top(&self) -> &Frame<'p> {
        self.frames
            .last()
            .expect("the drive loop always keeps an active frame")
    }

    fn top_mut(&mut self) -> &mut Frame<'p> {
        self.frames
            .last_mut()
            .expect("the drive loop always keeps an active frame")
    }
}

fn apply_binary(op: BinaryOp, lhs: Word, rhs: Word) -> Result<Word, EvalError> {
    // Shift amounts are masked to 5 bits, RV32I-style.
    let shift = (rhs as u32) & 31;
    match op {
        BinaryOp::Add => lhs.checked_add(rhs).ok_or(EvalError::Arithmetic {
            op: "add",
            lhs,
            rhs,
        }),
        BinaryOp::Sub => lhs.checked_sub(rhs).ok_or(EvalError::Arithmetic {
            op: "sub",
            lhs,
            rhs,
        }),
        BinaryOp::And => Ok(lhs & rhs),
        BinaryOp::Or => Ok(lhs | rhs),
        BinaryOp::Xor => Ok(lhs ^ rhs),
        BinaryOp::ShiftLeft => Ok(((lhs as u32) << shift) as Word),
        BinaryOp::ShiftRight => Ok(((lhs as u32) >> shift) as Word),
        BinaryOp::ShiftRightArithmetic => Ok(lhs >> shift),
    }
}
