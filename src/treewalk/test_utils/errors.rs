/// Assert that a `RaisedException` carries the given exception kind and, optionally, the given
/// message as its single argument.
macro_rules! assert_raises {
    ($raised:expr, $kind:ident) => {{
        let raised = &$raised;
        assert_eq!(
            raised.exception.kind,
            $crate::domain::ExceptionKind::$kind,
            "Expected {}, got: {:?}",
            stringify!($kind),
            raised.exception
        );
    }};
    ($raised:expr, $kind:ident, $expected_message:expr) => {{
        let raised = &$raised;
        assert_raises!(raised, $kind);
        match raised.exception.payload.as_slice() {
            [$crate::treewalk::TreewalkValue::Str(message)] => {
                assert_eq!(
                    message.as_str(),
                    $expected_message,
                    "Unexpected {} message",
                    stringify!($kind)
                );
            }
            payload => panic!(
                "Expected {} with one string argument, got payload: {:?}",
                stringify!($kind),
                payload
            ),
        }
    }};
}

pub(crate) use assert_raises;
