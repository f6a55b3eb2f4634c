//! Unit tests for Value enum

use core_types::Value;

#[cfg(test)]
mod value_creation_tests {
    use super::*;

    #[test]
    fn test_value_smi_extremes() {
        assert!(matches!(Value::Smi(i32::MAX), Value::Smi(n) if n == i32::MAX));
        assert!(matches!(Value::Smi(i32::MIN), Value::Smi(n) if n == i32::MIN));
    }

    #[test]
    fn test_value_string() {
        let val = Value::String("hello".to_string());
        assert!(matches!(&val, Value::String(s) if s == "hello"));
    }
}

#[cfg(test)]
mod truthiness_tests {
    use super::*;

    #[test]
    fn test_falsy_values() {
        for value in [
            Value::Undefined,
            Value::Null,
            Value::Boolean(false),
            Value::Smi(0),
            Value::Double(0.0),
            Value::Double(f64::NAN),
            Value::String(String::new()),
        ] {
            assert!(!value.is_truthy(), "{:?} should be falsy", value);
        }
    }

    #[test]
    fn test_truthy_values() {
        for value in [
            Value::Boolean(true),
            Value::Smi(-1),
            Value::Double(0.5),
            Value::String("0".to_string()),
        ] {
            assert!(value.is_truthy(), "{:?} should be truthy", value);
        }
    }
}

#[cfg(test)]
mod type_of_tests {
    use super::*;

    #[test]
    fn test_type_of() {
        assert_eq!(Value::Undefined.type_of(), "undefined");
        assert_eq!(Value::Null.type_of(), "object");
        assert_eq!(Value::Boolean(false).type_of(), "boolean");
        assert_eq!(Value::Smi(1).type_of(), "number");
        assert_eq!(Value::Double(1.5).type_of(), "number");
        assert_eq!(Value::String("s".into()).type_of(), "string");
    }
}

#[cfg(test)]
mod display_tests {
    use super::*;

    #[test]
    fn test_number_display() {
        assert_eq!(Value::Smi(42).to_string(), "42");
        assert_eq!(Value::Double(2.5).to_string(), "2.5");
        assert_eq!(Value::Double(f64::INFINITY).to_string(), "Infinity");
        assert_eq!(Value::Double(f64::NAN).to_string(), "NaN");
    }

    #[test]
    fn test_primitive_display() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Boolean(true).to_string(), "true");
        assert_eq!(Value::String("abc".into()).to_string(), "abc");
    }
}
