//! Unit tests for JsError and ErrorKind

use core_types::{ErrorKind, JsError, Value};

#[cfg(test)]
mod error_kind_tests {
    use super::*;

    #[test]
    fn test_error_kind_tags_are_stable() {
        let expected = [
            (ErrorKind::Error, "Error"),
            (ErrorKind::TypeError, "TypeError"),
            (ErrorKind::RangeError, "RangeError"),
            (ErrorKind::RuntimeError, "RuntimeError"),
            (ErrorKind::TimeoutError, "TimeoutError"),
            (ErrorKind::InternalError, "InternalError"),
            (ErrorKind::Stopped, "stopped"),
        ];
        for (kind, tag) in expected {
            assert_eq!(kind.as_str(), tag);
            assert_eq!(kind.to_string(), tag);
        }
    }
}

#[cfg(test)]
mod js_error_tests {
    use super::*;

    #[test]
    fn test_new_carries_message() {
        let error = JsError::new(ErrorKind::RuntimeError, "test error");
        assert_eq!(error.kind, ErrorKind::RuntimeError);
        assert_eq!(error.message.as_deref(), Some("test error"));
        assert!(!error.is_stopped());
    }

    #[test]
    fn test_stopped_has_no_message() {
        let error = JsError::stopped();
        assert!(error.is_stopped());
        assert_eq!(error.message, None);
    }

    #[test]
    fn test_display_with_and_without_message() {
        assert_eq!(
            JsError::new(ErrorKind::TimeoutError, "timed out after 5 ms").to_string(),
            "TimeoutError: timed out after 5 ms"
        );
        assert_eq!(JsError::stopped().to_string(), "stopped");
    }

    #[test]
    fn test_error_converts_into_value() {
        let value: Value = JsError::stopped().into();
        assert_eq!(value.as_error(), Some(&JsError::stopped()));
        assert_eq!(value.type_of(), "object");
    }

    #[test]
    fn test_js_error_is_std_error() {
        fn takes_error(_: &dyn std::error::Error) {}
        takes_error(&JsError::bare(ErrorKind::Error));
    }
}
