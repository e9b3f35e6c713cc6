//! Parser for JNI type and method signatures, e.g. `(Ljava/lang/String;)V`.

use std::{fmt, str::FromStr};

use combine::{
    between, many, parser, parser::range::recognize, satisfy, skip_many, skip_many1, token,
    ParseError, Parser, RangeStream, StdParseResult, Stream,
};

use crate::errors::*;

/// A primitive native type, encoded as a single letter in signatures.
#[allow(missing_docs)]
#[derive(Eq, PartialEq, Hash, Debug, Clone, Copy)]
pub enum Primitive {
    Boolean, // Z
    Byte,    // B
    Char,    // C
    Double,  // D
    Float,   // F
    Int,     // I
    Long,    // J
    Short,   // S
    Void,    // V
}

impl Primitive {
    const CODES: [(char, Primitive); 9] = [
        ('Z', Primitive::Boolean),
        ('B', Primitive::Byte),
        ('C', Primitive::Char),
        ('D', Primitive::Double),
        ('F', Primitive::Float),
        ('I', Primitive::Int),
        ('J', Primitive::Long),
        ('S', Primitive::Short),
        ('V', Primitive::Void),
    ];

    fn from_code(c: char) -> Option<Primitive> {
        Self::CODES.iter().find(|(code, _)| *code == c).map(|(_, p)| *p)
    }

    fn code(self) -> char {
        Self::CODES
            .iter()
            .find(|(_, p)| *p == self)
            .map(|(code, _)| *code)
            .unwrap_or('V')
    }

    /// The native spelling of the type, e.g. `int`.
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Boolean => "boolean",
            Primitive::Byte => "byte",
            Primitive::Char => "char",
            Primitive::Double => "double",
            Primitive::Float => "float",
            Primitive::Int => "int",
            Primitive::Long => "long",
            Primitive::Short => "short",
            Primitive::Void => "void",
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Any native type that can appear in a signature.
///
/// Reference types are not distinguished by class: they are marshalled as
/// opaque handles, so all the bridge needs to know is that a slot holds a
/// reference.
#[allow(missing_docs)]
#[derive(Eq, PartialEq, Hash, Debug, Clone, Copy)]
pub enum JavaType {
    Primitive(Primitive),
    Object,
    Array,
}

impl JavaType {
    /// Whether this is the `void` return type.
    pub fn is_void(self) -> bool {
        self == JavaType::Primitive(Primitive::Void)
    }

    /// Human readable name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            JavaType::Primitive(p) => p.name(),
            JavaType::Object => "object",
            JavaType::Array => "array",
        }
    }
}

impl FromStr for JavaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_complete(s, parser(parse_type))
    }
}

impl fmt::Display for JavaType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            JavaType::Primitive(ref ty) => ty.fmt(f),
            JavaType::Object => write!(f, "L;"),
            JavaType::Array => write!(f, "["),
        }
    }
}

/// A parsed method signature such as `(ILjava/lang/String;)Z`.
///
/// The original string is kept: registry lookups key on it, and two
/// signatures that decompose to the same types (e.g. differing only in
/// class names) are still different methods.
#[derive(Eq, PartialEq, Hash, Debug, Clone)]
pub struct MethodSignature {
    sig: String,
    args: Vec<JavaType>,
    ret: JavaType,
}

impl MethodSignature {
    /// Parses a method signature.
    ///
    /// The empty string is accepted as shorthand for `()V`, which is how
    /// default constructors are described in activation requests.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str<S: AsRef<str>>(s: S) -> Result<MethodSignature> {
        let s = s.as_ref();
        if s.is_empty() {
            return Ok(Self::void());
        }
        let (args, ret) = parse_complete(s, parser(parse_method_sig))?;
        Ok(MethodSignature {
            sig: s.to_owned(),
            args,
            ret,
        })
    }

    /// The `()V` signature.
    pub fn void() -> MethodSignature {
        MethodSignature {
            sig: "()V".to_owned(),
            args: Vec::new(),
            ret: JavaType::Primitive(Primitive::Void),
        }
    }

    /// The signature string.
    pub fn sig(&self) -> &str {
        &self.sig
    }

    /// Argument types, in order.
    pub fn args(&self) -> &[JavaType] {
        &self.args
    }

    /// Return type.
    pub fn ret(&self) -> JavaType {
        self.ret
    }
}

impl FromStr for MethodSignature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        MethodSignature::from_str(s)
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.sig)
    }
}

fn parse_complete<'a, P>(s: &'a str, mut p: P) -> Result<P::Output>
where
    P: Parser<&'a str>,
{
    match p.parse(s) {
        Ok((res, "")) => Ok(res),
        Ok((_, tail)) => Err(Error::ParseFailed(format!(
            "Trailing input: '{tail}' while parsing '{s}'"
        ))),
        Err(e) => Err(Error::ParseFailed(format!("Failed to parse '{s}': {e}"))),
    }
}

fn parse_primitive<S: Stream<Token = char>>(input: &mut S) -> StdParseResult<Primitive, S>
where
    S::Error: ParseError<char, S::Range, S::Position>,
{
    satisfy(|c| Primitive::from_code(c).is_some())
        .map(|c| Primitive::from_code(c).unwrap_or(Primitive::Void))
        .parse_stream(input)
        .into()
}

fn parse_non_void_primitive<S: Stream<Token = char>>(input: &mut S) -> StdParseResult<Primitive, S>
where
    S::Error: ParseError<char, S::Range, S::Position>,
{
    satisfy(|c| c != 'V' && Primitive::from_code(c).is_some())
        .map(|c| Primitive::from_code(c).unwrap_or(Primitive::Void))
        .parse_stream(input)
        .into()
}

fn parse_array<'a, S>(input: &mut S) -> StdParseResult<JavaType, S>
where
    S: RangeStream<Token = char, Range = &'a str>,
    S::Error: ParseError<char, S::Range, S::Position>,
{
    (token('['), parser(parse_non_void_type))
        .map(|_| JavaType::Array)
        .parse_stream(input)
        .into()
}

fn parse_object<'a, S>(input: &mut S) -> StdParseResult<JavaType, S>
where
    S: RangeStream<Token = char, Range = &'a str>,
    S::Error: ParseError<char, &'a str, S::Position>,
{
    fn is_unqualified(c: char) -> bool {
        // JVMS §4.2.2: '.', ';', '[' and '/' are disallowed in an unqualified name
        !matches!(c, '.' | ';' | '[' | '/')
    }

    // One or more segments separated by '/', never starting or ending with '/'
    let class_body = recognize((
        skip_many1(satisfy(is_unqualified)),
        skip_many(token('/').with(skip_many1(satisfy(is_unqualified)))),
    ));

    (token('L'), class_body.map(|_: &'a str| ()), token(';'))
        .map(|_| JavaType::Object)
        .parse_stream(input)
        .into()
}

fn parse_type<'a, S>(input: &mut S) -> StdParseResult<JavaType, S>
where
    S: RangeStream<Token = char, Range = &'a str>,
    S::Error: ParseError<char, &'a str, S::Position>,
{
    parser(parse_primitive)
        .map(JavaType::Primitive)
        .or(parser(parse_array))
        .or(parser(parse_object))
        .parse_stream(input)
        .into()
}

fn parse_non_void_type<'a, S>(input: &mut S) -> StdParseResult<JavaType, S>
where
    S: RangeStream<Token = char, Range = &'a str>,
    S::Error: ParseError<char, &'a str, S::Position>,
{
    parser(parse_non_void_primitive)
        .map(JavaType::Primitive)
        .or(parser(parse_array))
        .or(parser(parse_object))
        .parse_stream(input)
        .into()
}

fn parse_method_sig<'a, S>(input: &mut S) -> StdParseResult<(Vec<JavaType>, JavaType), S>
where
    S: RangeStream<Token = char, Range = &'a str>,
    S::Error: ParseError<char, S::Range, S::Position>,
{
    (
        between(token('('), token(')'), many(parser(parse_non_void_type))),
        parser(parse_type),
    )
        .parse_stream(input)
        .into()
}
