//! Lexical scope tree.
//!
//! Frames are appended to a flat arena and never destroyed, so a
//! [`ScopeId`] captured while registering a function signature still
//! resolves identically when the body is type-checked later. Each frame
//! carries three independent name tables: variables, types, and function
//! overload lists.

use std::collections::HashMap;

use pfx_ir::{FunctionDecl, Handle, Type, VariableDecl};

/// Index of a frame in the scope tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

/// What a frame is collecting declarations for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScopeKind {
    /// Ordinary lexical scope: module root, function, or statement block.
    #[default]
    Default,
    /// The member list of a struct body.
    Struct,
    /// The metadata entries of an annotation block.
    Annotation,
}

/// Why a declaration was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclareError {
    /// The name is already taken in the same frame.
    Redeclared,
    /// Strict mode only: the name hides one from an enclosing frame.
    Shadows,
}

#[derive(Debug, Default)]
struct Frame {
    kind: ScopeKind,
    parent: Option<ScopeId>,
    variables: HashMap<String, Handle<VariableDecl>>,
    types: HashMap<String, Handle<Type>>,
    functions: HashMap<String, Vec<Handle<FunctionDecl>>>,
}

/// The whole-compile scope structure.
///
/// In strict mode, declaring a variable whose name is visible in an
/// enclosing frame is refused; otherwise inner declarations shadow outer
/// ones the usual way.
#[derive(Debug)]
pub struct ScopeTree {
    frames: Vec<Frame>,
    strict: bool,
}

impl ScopeTree {
    /// Creates a tree holding only the root frame.
    pub fn new(strict: bool) -> Self {
        Self {
            frames: vec![Frame::default()],
            strict,
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn strict(&self) -> bool {
        self.strict
    }

    /// Appends a child frame and returns its id.
    pub fn push(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.frames.len() as u32);
        self.frames.push(Frame {
            kind,
            parent: Some(parent),
            ..Frame::default()
        });
        id
    }

    pub fn kind(&self, scope: ScopeId) -> ScopeKind {
        self.frames[scope.0 as usize].kind
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.frames[scope.0 as usize].parent
    }

    pub fn declare_variable(
        &mut self,
        scope: ScopeId,
        name: &str,
        var: Handle<VariableDecl>,
    ) -> Result<(), DeclareError> {
        if self.frames[scope.0 as usize].variables.contains_key(name) {
            return Err(DeclareError::Redeclared);
        }
        // Struct members and annotation entries live in their own
        // namespace and never shadow anything.
        if self.strict && self.kind(scope) == ScopeKind::Default {
            let mut cursor = self.parent(scope);
            while let Some(frame) = cursor {
                if self.frames[frame.0 as usize].variables.contains_key(name) {
                    return Err(DeclareError::Shadows);
                }
                cursor = self.parent(frame);
            }
        }
        self.frames[scope.0 as usize]
            .variables
            .insert(name.to_string(), var);
        Ok(())
    }

    pub fn declare_type(
        &mut self,
        scope: ScopeId,
        name: &str,
        ty: Handle<Type>,
    ) -> Result<(), DeclareError> {
        let frame = &mut self.frames[scope.0 as usize];
        if frame.types.contains_key(name) {
            return Err(DeclareError::Redeclared);
        }
        frame.types.insert(name.to_string(), ty);
        Ok(())
    }

    /// Registers a function overload. Several declarations may share a
    /// name; resolution walks the list in declaration order.
    pub fn declare_function(&mut self, scope: ScopeId, name: &str, func: Handle<FunctionDecl>) {
        self.frames[scope.0 as usize]
            .functions
            .entry(name.to_string())
            .or_default()
            .push(func);
    }

    /// Innermost-first variable lookup.
    pub fn find_variable(&self, scope: ScopeId, name: &str) -> Option<Handle<VariableDecl>> {
        self.walk(scope, |frame| frame.variables.get(name).copied())
    }

    /// Innermost-first type lookup.
    pub fn find_type(&self, scope: ScopeId, name: &str) -> Option<Handle<Type>> {
        self.walk(scope, |frame| frame.types.get(name).copied())
    }

    /// Overload candidates from the innermost frame that knows the name.
    pub fn find_functions(&self, scope: ScopeId, name: &str) -> Option<&[Handle<FunctionDecl>]> {
        self.walk(scope, |frame| {
            frame.functions.get(name).map(|list| list.as_slice())
        })
    }

    /// The variables declared directly in one frame, for annotation and
    /// struct reflection. Iteration order is unspecified.
    pub fn frame_variables(
        &self,
        scope: ScopeId,
    ) -> impl Iterator<Item = (&str, Handle<VariableDecl>)> {
        self.frames[scope.0 as usize]
            .variables
            .iter()
            .map(|(name, handle)| (name.as_str(), *handle))
    }

    fn walk<'a, T>(&'a self, scope: ScopeId, mut visit: impl FnMut(&'a Frame) -> Option<T>) -> Option<T> {
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            let frame = &self.frames[id.0 as usize];
            if let Some(found) = visit(frame) {
                return Some(found);
            }
            cursor = frame.parent;
        }
        None
    }
}
