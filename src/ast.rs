/// Name given to the function synthesized around a bare top-level expression.
pub const ANON_FN_NAME: &str = "__anon_expr";

#[derive(Debug, PartialEq, Clone)]
pub struct Prototype {
    pub name: String,
    pub args: Vec<String>,
}

impl Prototype {
    pub fn anonymous() -> Self {
        Prototype {
            name: ANON_FN_NAME.to_string(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Literal(f64),
    Variable(String),
    Binary(char, Box<Expression>, Box<Expression>),
    Call(String, Vec<Expression>),
}

#[derive(Debug, PartialEq, Clone)]
pub struct Function {
    pub prototype: Prototype,
    pub body: Expression,
}

/// A single top-level form.
#[derive(Debug, PartialEq, Clone)]
pub enum ASTNode {
    Extern(Prototype),
    Function(Function),
    /// A bare expression wrapped in an anonymous zero-argument function
    Expression(Function),
}

impl ASTNode {
    pub fn name(&self) -> &str {
        match self {
            ASTNode::Extern(proto) => &proto.name,
            ASTNode::Function(func) | ASTNode::Expression(func) => &func.prototype.name,
        }
    }
}
