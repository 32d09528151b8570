mod import;
mod open;
mod registration;

pub use import::ImportRule;
pub use open::ReadOpenRule;
pub use registration::RegistrationRule;

use crate::{
    parser::types::{Expr, Statement},
    sanitizer::NodeShape,
};

/// One neutralization. A rule claims the shapes it handles and rewrites nodes of those shapes,
/// returning them unchanged when the finer checks do not match.
pub trait RewriteRule {
    fn name(&self) -> &'static str;

    fn applies_to(&self, shape: NodeShape<'_>) -> bool;

    fn rewrite_statement(&self, stmt: Statement) -> Statement {
        stmt
    }

    fn rewrite_expr(&self, expr: Expr) -> Expr {
        expr
    }
}
