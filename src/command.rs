use crate::types::SqlValue;

/// Whether the command text is raw SQL or the name of a stored procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Text,
    StoredProcedure,
}

/// Semantic data type of a parameter, as declared by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Bool,
    Int32,
    Int64,
    Double,
    Text,
    Bytes,
}

/// Direction of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDirection {
    Input,
    Output,
    InputOutput,
}

/// A named command parameter.
///
/// Construction defaults to input direction and zero size; `with_size`
/// and `with_direction` override them.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    value: SqlValue,
    ty: SqlType,
    size: u32,
    direction: ParamDirection,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<SqlValue>, ty: SqlType) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ty,
            size: 0,
            direction: ParamDirection::Input,
        }
    }

    /// Sets the maximum size of the parameter.
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    /// Sets the direction of the parameter.
    pub fn with_direction(mut self, direction: ParamDirection) -> Self {
        self.direction = direction;
        self
    }

    /// The parameter name, without any driver-specific prefix.
    pub fn name(&self) -> &str {
        self.name.trim_start_matches('@')
    }

    pub fn value(&self) -> &SqlValue {
        &self.value
    }

    pub fn ty(&self) -> SqlType {
        self.ty
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn direction(&self) -> ParamDirection {
        self.direction
    }
}

/// A command to execute: text, kind, and an ordered set of named parameters.
///
/// Transient; built, handed to an execution method, and discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    text: String,
    kind: CommandKind,
    params: Vec<Parameter>,
}

impl Command {
    /// A raw SQL text command. Parameters are referenced as `@name`.
    pub fn text(sql: impl Into<String>) -> Self {
        Self {
            text: sql.into(),
            kind: CommandKind::Text,
            params: Vec::new(),
        }
    }

    /// A stored-procedure command. The text is the procedure name;
    /// parameters are passed in declaration order.
    pub fn stored_procedure(name: impl Into<String>) -> Self {
        Self {
            text: name.into(),
            kind: CommandKind::StoredProcedure,
            params: Vec::new(),
        }
    }

    /// Adds a parameter to the command.
    pub fn param(mut self, parameter: Parameter) -> Self {
        self.params.push(parameter);
        self
    }

    /// Adds several parameters to the command.
    pub fn params(mut self, parameters: impl IntoIterator<Item = Parameter>) -> Self {
        self.params.extend(parameters);
        self
    }

    pub fn command_text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.params
    }
}
