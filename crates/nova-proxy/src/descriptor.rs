//! Canonical JVM method descriptors.
//!
//! The character grammar produced here is shared with the proxy bytecode generator, so it must
//! stay byte-for-byte identical to the JVM's: `(` params `)` return, with `L<name>;` for
//! references and one `[` per array dimension.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ProxyError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Void,
    Int,
    Byte,
    Long,
    Double,
    Float,
    Char,
    Short,
    Boolean,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 9] = [
        PrimitiveKind::Void,
        PrimitiveKind::Int,
        PrimitiveKind::Byte,
        PrimitiveKind::Long,
        PrimitiveKind::Double,
        PrimitiveKind::Float,
        PrimitiveKind::Char,
        PrimitiveKind::Short,
        PrimitiveKind::Boolean,
    ];

    /// Source-level keyword, e.g. `int`.
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Void => "void",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Boolean => "boolean",
        }
    }

    pub fn descriptor_char(self) -> char {
        match self {
            PrimitiveKind::Void => 'V',
            PrimitiveKind::Int => 'I',
            PrimitiveKind::Byte => 'B',
            PrimitiveKind::Long => 'J',
            PrimitiveKind::Double => 'D',
            PrimitiveKind::Float => 'F',
            PrimitiveKind::Char => 'C',
            PrimitiveKind::Short => 'S',
            PrimitiveKind::Boolean => 'Z',
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        PrimitiveKind::ALL.into_iter().find(|kind| kind.name() == name)
    }

    fn from_descriptor_char(c: u8) -> Option<Self> {
        PrimitiveKind::ALL
            .into_iter()
            .find(|kind| kind.descriptor_char() as u32 == c as u32)
    }
}

/// The shape of a single type as reported by the introspection facility.
///
/// Primitive types carry the tag the facility reported rather than a [`PrimitiveKind`]; an
/// unrecognized tag is rejected when the type is encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TypeShape {
    Primitive(String),
    Array(Box<TypeShape>),
    /// Qualified (binary) name, e.g. `java.lang.String`.
    Reference(String),
}

impl TypeShape {
    pub fn primitive(kind: PrimitiveKind) -> Self {
        TypeShape::Primitive(kind.name().to_string())
    }

    pub fn reference(name: impl Into<String>) -> Self {
        TypeShape::Reference(name.into())
    }

    pub fn array_of(element: TypeShape) -> Self {
        TypeShape::Array(Box::new(element))
    }

    /// Parses a Java source-style name such as `int`, `java.lang.String` or `byte[][]`.
    ///
    /// The nine primitive keywords become primitives; anything else is a reference.
    pub fn from_source_name(name: &str) -> Self {
        let mut base = name.trim();
        let mut dims = 0usize;
        while let Some(rest) = base.strip_suffix("[]") {
            base = rest.trim_end();
            dims += 1;
        }

        let mut ty = match PrimitiveKind::from_name(base) {
            Some(kind) => TypeShape::primitive(kind),
            None => TypeShape::Reference(base.to_string()),
        };
        for _ in 0..dims {
            ty = TypeShape::array_of(ty);
        }
        ty
    }

    pub fn source_name(&self) -> String {
        match self {
            TypeShape::Primitive(tag) => tag.clone(),
            TypeShape::Reference(name) => name.clone(),
            TypeShape::Array(element) => format!("{}[]", element.source_name()),
        }
    }

    pub fn dimensions(&self) -> usize {
        let mut dims = 0;
        let mut ty = self;
        while let TypeShape::Array(element) = ty {
            dims += 1;
            ty = element;
        }
        dims
    }
}

impl From<String> for TypeShape {
    fn from(name: String) -> Self {
        TypeShape::from_source_name(&name)
    }
}

impl From<TypeShape> for String {
    fn from(ty: TypeShape) -> Self {
        ty.source_name()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReturnShape {
    Void,
    Type(TypeShape),
}

impl ReturnShape {
    pub fn source_name(&self) -> String {
        match self {
            ReturnShape::Void => PrimitiveKind::Void.name().to_string(),
            ReturnShape::Type(ty) => ty.source_name(),
        }
    }
}

impl From<TypeShape> for ReturnShape {
    fn from(ty: TypeShape) -> Self {
        ReturnShape::Type(ty)
    }
}

impl From<String> for ReturnShape {
    fn from(name: String) -> Self {
        if name.trim() == PrimitiveKind::Void.name() {
            ReturnShape::Void
        } else {
            ReturnShape::Type(TypeShape::from_source_name(&name))
        }
    }
}

impl From<ReturnShape> for String {
    fn from(ret: ReturnShape) -> Self {
        ret.source_name()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodShape {
    pub params: Vec<TypeShape>,
    pub return_type: ReturnShape,
}

impl MethodShape {
    pub fn new(params: Vec<TypeShape>, return_type: ReturnShape) -> Self {
        Self {
            params,
            return_type,
        }
    }

    pub fn descriptor(&self) -> Result<Descriptor> {
        encode(&self.params, &self.return_type)
    }
}

/// A canonical method descriptor. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Descriptor(String);

impl Descriptor {
    /// Validates `desc` against the method descriptor grammar.
    pub fn parse(desc: &str) -> Result<Self> {
        decode_method(desc)?;
        Ok(Descriptor(desc.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Decodes the descriptor back into parameter and return shapes.
    pub fn shape(&self) -> Result<MethodShape> {
        decode_method(&self.0)
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Descriptor {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Descriptor {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Descriptor {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl TryFrom<String> for Descriptor {
    type Error = ProxyError;

    fn try_from(desc: String) -> Result<Self> {
        decode_method(&desc)?;
        Ok(Descriptor(desc))
    }
}

impl From<Descriptor> for String {
    fn from(desc: Descriptor) -> Self {
        desc.0
    }
}

/// Encodes a method's parameter types and return type.
pub fn encode(params: &[TypeShape], return_type: &ReturnShape) -> Result<Descriptor> {
    let mut out = String::from("(");
    for param in params {
        encode_type(&mut out, param)?;
    }
    out.push(')');
    encode_return(&mut out, return_type)?;
    Ok(Descriptor(out))
}

/// Appends an encoded return type to an already encoded parameter list such as `"(I)"`.
///
/// The prefix must be a complete parameter list; anything else fails with
/// [`ProxyError::InvalidDescriptor`].
pub fn encode_with_prefix(params: &str, return_type: &ReturnShape) -> Result<Descriptor> {
    let mut out = String::with_capacity(params.len() + 1);
    out.push_str(params);
    encode_return(&mut out, return_type)?;
    decode_method(&out)?;
    Ok(Descriptor(out))
}

fn encode_return(out: &mut String, return_type: &ReturnShape) -> Result<()> {
    match return_type {
        ReturnShape::Void => {
            out.push(PrimitiveKind::Void.descriptor_char());
            Ok(())
        }
        ReturnShape::Type(ty) => encode_type(out, ty),
    }
}

fn encode_type(out: &mut String, ty: &TypeShape) -> Result<()> {
    match ty {
        TypeShape::Array(element) => {
            out.push('[');
            encode_type(out, element)
        }
        TypeShape::Primitive(tag) => {
            let kind = PrimitiveKind::from_name(tag).ok_or_else(|| ProxyError::BadType {
                type_name: tag.clone(),
            })?;
            out.push(kind.descriptor_char());
            Ok(())
        }
        TypeShape::Reference(name) => {
            out.push('L');
            out.extend(name.chars().map(|c| if c == '.' { '/' } else { c }));
            out.push(';');
            Ok(())
        }
    }
}

fn decode_method(desc: &str) -> Result<MethodShape> {
    let invalid = || ProxyError::InvalidDescriptor(desc.to_string());

    let mut rest = desc.strip_prefix('(').ok_or_else(invalid)?;
    let mut params = Vec::new();
    loop {
        if let Some(after) = rest.strip_prefix(')') {
            rest = after;
            break;
        }
        if rest.is_empty() {
            return Err(invalid());
        }
        let (param, after) = decode_field(rest).ok_or_else(invalid)?;
        params.push(param);
        rest = after;
    }

    let return_type = if rest == "V" {
        ReturnShape::Void
    } else {
        match decode_field(rest) {
            Some((ty, "")) => ReturnShape::Type(ty),
            _ => return Err(invalid()),
        }
    };

    Ok(MethodShape {
        params,
        return_type,
    })
}

fn decode_field(input: &str) -> Option<(TypeShape, &str)> {
    let first = *input.as_bytes().first()?;
    match first {
        b'[' => {
            let (element, rest) = decode_field(&input[1..])?;
            Some((TypeShape::array_of(element), rest))
        }
        b'L' => {
            let end = input.find(';')?;
            let name = &input[1..end];
            if name.is_empty() {
                return None;
            }
            Some((TypeShape::Reference(name.replace('/', ".")), &input[end + 1..]))
        }
        // `V` is only legal as a return type.
        b'V' => None,
        c => {
            let kind = PrimitiveKind::from_descriptor_char(c)?;
            Some((TypeShape::primitive(kind), &input[1..]))
        }
    }
}
