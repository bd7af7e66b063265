use crate::error::ExecutionError;
use crate::lexer::PlaceInCode;

use super::value::{ArrayRef, ObjectRef};

/// The receiver bound to a function activation: absent, an object, or an
/// array (array method calls bind their array).
#[derive(Debug, Clone, Default)]
pub enum ThisBinding {
    #[default]
    Empty,
    Object(ObjectRef),
    Array(ArrayRef),
}

impl ThisBinding {
    pub fn object(&self) -> Option<&ObjectRef> {
        match self {
            ThisBinding::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn array(&self) -> Option<&ArrayRef> {
        match self {
            ThisBinding::Array(array) => Some(array),
            _ => None,
        }
    }
}

/// Recursion is bounded; exceeding this many activations is a
/// stack-overflow error at the offending call.
pub const LOCAL_SCOPE_STACK_MAX_SIZE: usize = 100;

/// Mutable state of one execution: the global scope, the activation
/// stacks, and the output sink. The local-scope stack and the this stack
/// always have equal depth.
#[derive(Debug)]
pub struct ExecuteContext<'a> {
    pub global_scope: ObjectRef,
    local_scopes: Vec<ObjectRef>,
    this_stack: Vec<ThisBinding>,
    output: &'a mut String,
}

impl<'a> ExecuteContext<'a> {
    pub fn new(global_scope: ObjectRef, output: &'a mut String) -> Self {
        Self {
            global_scope,
            local_scopes: vec![],
            this_stack: vec![],
            output,
        }
    }

    pub fn is_local(&self) -> bool {
        !self.local_scopes.is_empty()
    }

    pub fn push_local(
        &mut self,
        scope: ObjectRef,
        this: ThisBinding,
        place: PlaceInCode,
    ) -> Result<(), ExecutionError> {
        if self.local_scopes.len() == LOCAL_SCOPE_STACK_MAX_SIZE {
            return Err(ExecutionError::new(place, "Stack overflow."));
        }
        self.local_scopes.push(scope);
        self.this_stack.push(this);
        Ok(())
    }

    pub fn pop_local(&mut self) {
        self.this_stack.pop();
        self.local_scopes.pop();
    }

    pub fn current_local_scope(&self) -> Option<&ObjectRef> {
        self.local_scopes.last()
    }

    pub fn current_this(&self) -> Option<&ThisBinding> {
        self.this_stack.last()
    }

    /// The current local scope if inside a call, else the global scope.
    pub fn innermost_scope(&self) -> ObjectRef {
        self.local_scopes
            .last()
            .unwrap_or(&self.global_scope)
            .clone()
    }

    pub fn print(&mut self, text: &str) {
        self.output.push_str(text);
    }

    #[cfg(test)]
    pub fn depths(&self) -> (usize, usize) {
        (self.local_scopes.len(), self.this_stack.len())
    }
}
