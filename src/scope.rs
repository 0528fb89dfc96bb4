use crate::parser::locations::Pos;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjKind {
    Var,
    Fun,
}

/// Handle of an [`Object`] inside its [`Objects`] arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjId(usize);

/// A named binding. The parser leaves `data` empty, the interpreter fills it.
#[derive(Clone, Debug)]
pub struct Object {
    pub kind: ObjKind,
    pub name: String,
    pub decl: Pos,
    pub data: Option<Value>,
}

impl Object {
    pub fn new(kind: ObjKind, name: &str, decl: Pos) -> Self {
        Self {
            kind,
            name: name.to_string(),
            decl,
            data: None,
        }
    }
}

/// Owns the objects of one parse or one interpreter session.
#[derive(Clone, Debug, Default)]
pub struct Objects(Vec<Object>);

impl Objects {
    pub fn push(&mut self, obj: Object) -> ObjId {
        self.0.push(obj);
        ObjId(self.0.len() - 1)
    }

    pub fn get(&self, id: ObjId) -> &Object {
        &self.0[id.0]
    }

    pub fn get_mut(&mut self, id: ObjId) -> &mut Object {
        &mut self.0[id.0]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Result of evaluating an expression. A `Ref` only ever appears as an
/// intermediate result; objects store plain values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(String),
    Ref(ObjId),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
            Self::Str(_) => "string",
            Self::Ref(_) => "reference",
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::Ref(id) => write!(f, "<object {}>", id.0),
        }
    }
}

/// One lexical level of name bindings, linked to the enclosing level.
#[derive(Debug, Default)]
pub struct Scope {
    objects: HashMap<String, ObjId>,
    outer: Option<Box<Scope>>,
}

impl Scope {
    pub fn new(outer: Option<Box<Scope>>) -> Self {
        Self {
            objects: HashMap::new(),
            outer,
        }
    }

    /// Looks `name` up in this scope and then in every enclosing one.
    pub fn lookup(&self, name: &str) -> Option<ObjId> {
        let mut scope = Some(self);
        while let Some(s) = scope {
            if let Some(&id) = s.objects.get(name) {
                return Some(id);
            }
            scope = s.outer.as_deref();
        }
        None
    }

    pub fn lookup_local(&self, name: &str) -> Option<ObjId> {
        self.objects.get(name).copied()
    }

    /// Binds `name` to `id` unless this scope already binds it, in which case
    /// the existing handle is returned and nothing changes.
    pub fn insert(&mut self, name: &str, id: ObjId) -> Option<ObjId> {
        if let Some(&existing) = self.objects.get(name) {
            return Some(existing);
        }
        self.objects.insert(name.to_string(), id);
        None
    }

    pub fn take_outer(&mut self) -> Option<Box<Scope>> {
        self.outer.take()
    }

    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut scope = self.outer.as_deref();
        while let Some(s) = scope {
            depth += 1;
            scope = s.outer.as_deref();
        }
        depth
    }
}

/// Enters a fresh scope nested in `scope`.
pub fn open_scope(scope: &mut Scope) {
    let outer = std::mem::take(scope);
    *scope = Scope::new(Some(Box::new(outer)));
}

/// Leaves the innermost scope, dropping its bindings.
pub fn close_scope(scope: &mut Scope) {
    if let Some(outer) = scope.take_outer() {
        *scope = *outer;
    }
}
