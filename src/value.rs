use jni_sys::{jbyte, jchar, jdouble, jfloat, jint, jlong, jshort};
use log::trace;
use paste::paste;

use crate::{
    errors::*,
    refs::ObjectHandle,
    signature::{JavaType, Primitive},
};

/// A value crossing the bridge, tagged with its native type.
///
/// Marshalling is exact: an `Int` only fills an `int` slot, never a `long`
/// or `short` one. Reference slots (objects and arrays) take an
/// [`ObjectHandle`] or null.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Object(Option<ObjectHandle>),
    Bool(bool),
    Byte(jbyte),
    Char(jchar),
    Short(jshort),
    Int(jint),
    Long(jlong),
    Float(jfloat),
    Double(jdouble),
    Void,
}

impl Value {
    /// The null reference.
    pub const NULL: Value = Value::Object(None);

    /// Name of the value's type, as used in error messages.
    pub fn type_name(&self) -> &'static str {
        match *self {
            Value::Void => "void",
            Value::Object(_) => "object",
            Value::Byte(_) => "byte",
            Value::Char(_) => "char",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Bool(_) => "boolean",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
        }
    }

    /// The value a native call site sees when a call of type `ty` fails.
    pub fn default_for(ty: JavaType) -> Value {
        match ty {
            JavaType::Object | JavaType::Array => Value::NULL,
            JavaType::Primitive(p) => match p {
                Primitive::Boolean => Value::Bool(false),
                Primitive::Byte => Value::Byte(0),
                Primitive::Char => Value::Char(0),
                Primitive::Short => Value::Short(0),
                Primitive::Int => Value::Int(0),
                Primitive::Long => Value::Long(0),
                Primitive::Float => Value::Float(0.0),
                Primitive::Double => Value::Double(0.0),
                Primitive::Void => Value::Void,
            },
        }
    }

    /// Whether this value can fill a slot of type `ty` without conversion.
    pub fn fits(&self, ty: JavaType) -> bool {
        matches!(
            (self, ty),
            (Value::Object(_), JavaType::Object | JavaType::Array)
                | (Value::Bool(_), JavaType::Primitive(Primitive::Boolean))
                | (Value::Byte(_), JavaType::Primitive(Primitive::Byte))
                | (Value::Char(_), JavaType::Primitive(Primitive::Char))
                | (Value::Short(_), JavaType::Primitive(Primitive::Short))
                | (Value::Int(_), JavaType::Primitive(Primitive::Int))
                | (Value::Long(_), JavaType::Primitive(Primitive::Long))
                | (Value::Float(_), JavaType::Primitive(Primitive::Float))
                | (Value::Double(_), JavaType::Primitive(Primitive::Double))
                | (Value::Void, JavaType::Primitive(Primitive::Void))
        )
    }

    /// Checks that this value fits a slot of type `ty`.
    pub fn check(&self, ty: JavaType) -> Result<()> {
        if self.fits(ty) {
            Ok(())
        } else {
            trace!("rejecting {} for {} slot", self.type_name(), ty.name());
            Err(Error::WrongValueType {
                expected: ty.name(),
                actual: self.type_name(),
            })
        }
    }

    /// Try to unwrap to an Object reference (which may be null).
    pub fn l(&self) -> Result<Option<&ObjectHandle>> {
        match self {
            Value::Object(obj) => Ok(obj.as_ref()),
            _ => Err(Error::WrongValueType {
                expected: "object",
                actual: self.type_name(),
            }),
        }
    }

    /// Try to unwrap to a void result.
    pub fn v(&self) -> Result<()> {
        match self {
            Value::Void => Ok(()),
            _ => Err(Error::WrongValueType {
                expected: "void",
                actual: self.type_name(),
            }),
        }
    }
}

macro_rules! value_primitive {
    ($variant:ident, $accessor:ident, $ty:ty, $name:literal) => {
        paste! {
            impl Value {
                #[doc = "Try to unwrap to a Java `" $name "`."]
                pub fn $accessor(&self) -> Result<$ty> {
                    match *self {
                        Value::$variant(v) => Ok(v),
                        _ => Err(Error::WrongValueType {
                            expected: $name,
                            actual: self.type_name(),
                        }),
                    }
                }
            }

            impl From<$ty> for Value {
                fn from(other: $ty) -> Self {
                    Value::$variant(other)
                }
            }
        }
    };
}

value_primitive!(Bool, z, bool, "boolean");
value_primitive!(Byte, b, jbyte, "byte");
value_primitive!(Char, c, jchar, "char");
value_primitive!(Short, s, jshort, "short");
value_primitive!(Int, i, jint, "int");
value_primitive!(Long, j, jlong, "long");
value_primitive!(Float, f, jfloat, "float");
value_primitive!(Double, d, jdouble, "double");

impl From<ObjectHandle> for Value {
    fn from(other: ObjectHandle) -> Self {
        Value::Object(Some(other))
    }
}

impl From<Option<ObjectHandle>> for Value {
    fn from(other: Option<ObjectHandle>) -> Self {
        Value::Object(other)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Void
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn exact_types_only() {
        assert!(Value::Int(1).fits(JavaType::Primitive(Primitive::Int)));
        assert!(!Value::Int(1).fits(JavaType::Primitive(Primitive::Long)));
        assert!(!Value::Short(1).fits(JavaType::Primitive(Primitive::Int)));
        assert!(!Value::Float(1.0).fits(JavaType::Primitive(Primitive::Double)));
        assert!(Value::NULL.fits(JavaType::Object));
        assert!(Value::NULL.fits(JavaType::Array));
        assert!(!Value::NULL.fits(JavaType::Primitive(Primitive::Int)));
        assert_matches!(
            Value::Long(1).check(JavaType::Primitive(Primitive::Int)),
            Err(Error::WrongValueType {
                expected: "int",
                actual: "long"
            })
        );
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::from(7i32).i().unwrap(), 7);
        assert!(Value::from(true).z().unwrap());
        assert_matches!(Value::from(7i64).i(), Err(Error::WrongValueType { .. }));
        let obj = ObjectHandle::string("x");
        let v = Value::from(obj.clone());
        assert_eq!(v.l().unwrap(), Some(&obj));
        assert_eq!(Value::NULL.l().unwrap(), None);
        assert!(Value::from(()).v().is_ok());
    }

    #[test]
    fn defaults_match_return_types() {
        assert_eq!(
            Value::default_for(JavaType::Primitive(Primitive::Boolean)),
            Value::Bool(false)
        );
        assert_eq!(Value::default_for(JavaType::Array), Value::NULL);
        assert_eq!(
            Value::default_for(JavaType::Primitive(Primitive::Void)),
            Value::Void
        );
    }
}
