use crate::{
    core::{log, LogLevel},
    domain::Identifier,
    parser::types::Expr,
    sanitizer::{NodeShape, RewriteRule, REGISTRATION_INTERCEPTOR},
};

/// Redirects `setup(...)` and `module.setup(...)` to the capture interceptor with the arguments
/// exactly as written.
pub struct RegistrationRule {
    names: Vec<String>,
}

impl RegistrationRule {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl RewriteRule for RegistrationRule {
    fn name(&self) -> &'static str {
        "registration"
    }

    fn applies_to(&self, shape: NodeShape<'_>) -> bool {
        match shape {
            NodeShape::CallOf(target) => self.names.iter().any(|n| n == target.name()),
            _ => false,
        }
    }

    fn rewrite_expr(&self, expr: Expr) -> Expr {
        match expr {
            Expr::FunctionCall { args, .. } => {
                log(LogLevel::Debug, || {
                    format!(
                        "Intercepting registration call with {} argument(s)",
                        args.args.len()
                    )
                });
                Expr::call(
                    Expr::Variable(Identifier::internal(REGISTRATION_INTERCEPTOR)),
                    args,
                )
            }
            other => other,
        }
    }
}
