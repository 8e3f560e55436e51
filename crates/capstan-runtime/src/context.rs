//! Activation frames and per-frame control state.
//!
//! A frame owns the bindings of one activation, the scoped allocations
//! it has made, and an explicit control stack of block cursors and
//! pending branch tests. The kernel never recurses into guest code, so
//! guest call depth is decoupled from the native stack.

use crate::EvalError;
use crate::value::{ObjectId, Value};
use capstan_ir::{Operand, Statement, Test};
use std::collections::HashMap;

/// One entry of a frame's control stack.
pub(crate) enum Task<'p> {
    /// A block of statements being executed in order.
    Block {
        statements: &'p [Statement],
        pc: usize,
    },
    /// A conditional whose setup block has been scheduled; once the
    /// setup completes this task is on top and the test decides the
    /// branch.
    Branch {
        test: &'p Test,
        then_branch: &'p [Statement],
        else_branch: &'p [Statement],
    },
}

/// A per-call activation: bindings plus the scoped allocations it owns.
pub(crate) struct Frame<'p> {
    /// Procedure name, or `None` for the top-level block. Diagnostics only.
    pub procedure: Option<&'p str>,
    /// Where the caller wants the return value bound, or `None` for the
    /// top-level block, whose return value is the program result.
    pub result_name: Option<&'p str>,
    /// Scoped allocations created by this frame, revoked when it
    /// returns. Only these may be destroyed early.
    pub scoped: Vec<ObjectId>,
    /// Scoped allocations taken over from frames replaced by tail
    /// calls. Revoked on return like `scoped`, but this frame did not
    /// create them and may not destroy them.
    pub inherited: Vec<ObjectId>,
    /// Explicit control stack; empty means the body was exhausted
    /// without `return`.
    pub control: Vec<Task<'p>>,
    bindings: HashMap<&'p str, Value>,
}

impl<'p> Frame<'p> {
    pub fn new(
        procedure: Option<&'p str>,
        body: &'p [Statement],
        result_name: Option<&'p str>,
    ) -> Self {
        Frame {
            procedure,
            result_name,
            scoped: Vec::new(),
            inherited: Vec::new(),
            control: vec![Task::Block {
                statements: body,
                pc: 0,
            }],
            bindings: HashMap::new(),
        }
    }

    /// Binds `name` in this frame. Names are unique per binding site, so
    /// a rebind can only be the front-end re-emitting the same site.
    pub fn bind(&mut self, name: &'p str, value: Value) {
        self.bindings.insert(name, value);
    }

    /// Resolves a name in this frame.
    pub fn lookup(&self, name: &str, operation: &'static str) -> Result<Value, EvalError> {
        self.bindings
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnboundName {
                operation,
                name: name.to_string(),
            })
    }

    /// Pops the next step to execute, unwinding exhausted cursors.
    /// `None` means the frame ran out of statements without returning.
    pub fn next_step(&mut self) -> Option<NextStep<'p>> {
        while let Some(task) = self.control.pop() {
            match task {
                Task::Block { statements, pc } => {
                    if pc < statements.len() {
                        self.control.push(Task::Block {
                            statements,
                            pc: pc + 1,
                        });
                        return Some(NextStep::Statement(&statements[pc]));
                    }
                }
                Task::Branch {
                    test,
                    then_branch,
                    else_branch,
                } => {
                    return Some(NextStep::Branch {
                        test,
                        then_branch,
                        else_branch,
                    });
                }
            }
        }
        None
    }

    /// Schedules a nested block on top of the current control stack.
    pub fn push_block(&mut self, statements: &'p [Statement]) {
        self.control.push(Task::Block { statements, pc: 0 });
    }

    /// Schedules a conditional: the setup block runs first, then the
    /// test picks a branch.
    pub fn push_conditional(
        &mut self,
        setup: &'p [Statement],
        test: &'p Test,
        then_branch: &'p [Statement],
        else_branch: &'p [Statement],
    ) {
        self.control.push(Task::Branch {
            test,
            then_branch,
            else_branch,
        });
        self.push_block(setup);
    }

    /// Whether the next pending statement is a `return` of exactly
    /// `name`, meaning a call binding `name` is in tail position.
    pub fn pending_is_return_of(&self, name: &str) -> bool {
        for task in self.control.iter().rev() {
            match task {
                Task::Block { statements, pc } => {
                    if *pc >= statements.len() {
                        continue;
                    }
                    return matches!(
                        &statements[*pc],
                        Statement::Return {
                            value: Operand::Location(returned)
                        } if returned == name
                    );
                }
                Task::Branch { .. } => return false,
            }
        }
        false
    }
}

/// What the kernel should do next within a frame.
pub(crate) enum NextStep<'p> {
    Statement(&'p Statement),
    Branch {
        test: &'p Test,
        then_branch: &'p [Statement],
        else_branch: &'p [Statement],
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use capstan_ir::builders::{constant, location, ret, set};

    #[test]
    fn lookup_reports_unbound_names() {
        let body = [ret(constant(0))];
        let frame = Frame::new(None, &body, None);
        let err = frame.lookup("ghost", "set").unwrap_err();
        assert!(matches!(err, EvalError::UnboundName { name, .. } if name == "ghost"));
    }

    #[test]
    fn statements_come_back_in_order() {
        let body = [set("a", constant(1)), set("b", constant(2))];
        let mut frame = Frame::new(None, &body, None);
        assert!(matches!(
            frame.next_step(),
            Some(NextStep::Statement(Statement::Set { name, .. })) if name == "a"
        ));
        assert!(matches!(
            frame.next_step(),
            Some(NextStep::Statement(Statement::Set { name, .. })) if name == "b"
        ));
        assert!(frame.next_step().is_none());
    }

    #[test]
    fn tail_position_is_detected_through_exhausted_blocks() {
        let body = [ret(location("out"))];
        let frame = Frame::new(None, &body, None);
        assert!(frame.pending_is_return_of("out"));
        assert!(!frame.pending_is_return_of("other"));
    }
}
