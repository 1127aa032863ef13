//! Builtin functions callable from programs

use std::fmt;

use crate::error::{Error, Result};
use crate::lang::Type;

/// A builtin function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// `print_int(int) -> int`
    PrintInt,
    /// `print_string(string) -> int`
    PrintString,
    /// `rand(min, max) -> int`, uniform in `[min, max)`
    Rand,
}

impl Builtin {
    pub const ALL: [Builtin; 3] = [Builtin::PrintInt, Builtin::PrintString, Builtin::Rand];

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::PrintInt => "print_int",
            Builtin::PrintString => "print_string",
            Builtin::Rand => "rand",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    pub fn parameters(&self) -> Vec<Type> {
        match self {
            Builtin::PrintInt => vec![Type::integer()],
            Builtin::PrintString => vec![Type::string()],
            Builtin::Rand => vec![Type::integer(), Type::integer()],
        }
    }

    pub fn return_type(&self) -> Type {
        Type::integer()
    }

    /// Check argument types against the parameter list
    pub fn check_arguments(&self, args: &[Type]) -> Result<()> {
        let params = self.parameters();
        if params.len() == args.len() && params.iter().zip(args).all(|(p, a)| a == p) {
            return Ok(());
        }

        let render = |types: &[Type]| {
            let list = types
                .iter()
                .map(Type::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            format!("({})", list)
        };
        Err(Error::ArgumentMismatch {
            function: self.name().to_string(),
            expected: render(&params),
            found: render(args),
        })
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
