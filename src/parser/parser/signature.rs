use crate::{
    lexer::Token,
    parser::{
        types::{Param, Params},
        Parser, ParserError,
    },
};

impl Parser<'_> {
    /// Parse a parameter list up to (not including) `end_token`. Functions end on `)`, lambdas on
    /// `:`, and only function parameters may carry annotations.
    pub fn parse_function_def_args(&mut self, end_token: &Token) -> Result<Params, ParserError> {
        let allow_annotations = end_token != &Token::Colon;
        let mut params = Params::default();
        let mut seen_star = false;

        while self.current_token() != end_token {
            // Positional-only marker (PEP 570). Everything before it is an ordinary positional
            // parameter for our purposes.
            if self.consume_optional(&Token::Slash) {
                if !self.consume_optional(&Token::Comma) {
                    break;
                }
                continue;
            }

            if self.consume_optional(&Token::Asterisk) {
                if seen_star {
                    return Err(self.syntax_error("* argument may appear only once"));
                }
                seen_star = true;

                // A bare `*` only introduces keyword-only parameters (PEP 3102).
                if matches!(self.current_token(), Token::Identifier(_)) {
                    params.args_var = Some(self.parse_identifier()?);
                    self.skip_annotation(allow_annotations)?;
                }

                if !self.consume_optional(&Token::Comma) {
                    break;
                }
                continue;
            }

            if self.consume_optional(&Token::DoubleAsterisk) {
                params.kwargs_var = Some(self.parse_identifier()?);
                self.skip_annotation(allow_annotations)?;
                self.consume_optional(&Token::Comma);
                break;
            }

            let arg = self.parse_identifier()?;
            self.skip_annotation(allow_annotations)?;
            let default = if self.consume_optional(&Token::Assign) {
                Some(self.parse_simple_expr()?)
            } else {
                None
            };

            let param = Param { arg, default };
            if seen_star {
                params.kwonly_args.push(param);
            } else {
                if param.default.is_none() && params.args.iter().any(|p| p.default.is_some()) {
                    return Err(self.syntax_error(
                        "non-default argument follows default argument",
                    ));
                }
                params.args.push(param);
            }

            if !self.consume_optional(&Token::Comma) {
                break;
            }
        }

        Ok(params)
    }

    fn skip_annotation(&mut self, allow_annotations: bool) -> Result<(), ParserError> {
        if allow_annotations && self.consume_optional(&Token::Colon) {
            let _ = self.parse_simple_expr()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::{
        test_utils::*,
        types::{Expr, Param, Params, StatementKind},
        ParserError,
    };

    fn params_of(input: &str) -> Params {
        match parse!(input).remove(0).kind {
            StatementKind::FunctionDef { args, .. } => args,
            other => panic!("expected function, found {other:?}"),
        }
    }

    #[test]
    fn defaults_and_annotations() {
        let params = params_of("def f(a: int, b: str = 'x', /, c=1): pass");
        assert_eq!(
            params.args,
            vec![
                Param {
                    arg: ident!("a"),
                    default: None,
                },
                Param {
                    arg: ident!("b"),
                    default: Some(str!("x")),
                },
                Param {
                    arg: ident!("c"),
                    default: Some(int!(1)),
                },
            ]
        );
    }

    #[test]
    fn keyword_only_after_bare_star() {
        let params = params_of("def f(a, *, key=None, **rest): pass");
        assert_eq!(params.args_var, None);
        assert_eq!(
            params.kwonly_args,
            vec![Param {
                arg: ident!("key"),
                default: Some(Expr::None),
            }]
        );
        assert_eq!(params.kwargs_var, Some(ident!("rest")));
    }

    #[test]
    fn lambda_params() {
        let expr = parse_expr!("lambda x, y=2: x");
        let Expr::Lambda { args, .. } = expr else {
            panic!("expected lambda");
        };
        assert_eq!(args.args.len(), 2);
    }

    #[test]
    fn non_default_after_default() {
        assert!(matches!(
            expect_error!("def f(a=1, b): pass"),
            ParserError::SyntaxError { .. }
        ));
    }
}
