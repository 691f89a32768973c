use std::fmt;

use inkwell::AddressSpace;
use inkwell::context::Context;
use inkwell::types::{BasicType, BasicTypeEnum, StructType};

/// Width class of a floating-point kernel parameter.
///
/// `Extended` covers anything wider than 64 bits; it is lowered to the
/// target's `x86_fp80` and materialized from a decimal rendering of the
/// host value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatKind {
    Single,
    Double,
    Extended,
}

/// The kernel-parameter type algebra.
///
/// This is the internal, structural description of a kernel's formal
/// parameters. LLVM function signatures cannot carry the distinctions the
/// runtime needs (charspan vs. vector, tuple vs. struct, state handles), so
/// kernels spell their parameter list in this algebra via the
/// `cudaq-kernel-signature` function attribute and [`parse_signature`]
/// reconstructs it at substitution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelType {
    /// Integer with a declared bit width; 1-bit is boolean. Widths other
    /// than 1/8/16/32/64 parse but are never materialized.
    Int(u32),
    Float(FloatKind),
    Complex(FloatKind),
    /// Length-prefixed byte sequence with a NUL-terminated backing store.
    Charspan,
    /// The opaque quantum-state handle; only meaningful behind `Pointer`.
    State,
    Pointer(Box<KernelType>),
    /// Variable-length sequence laid out as `{begin, end, capacity}`
    /// pointers in host memory.
    Stdvec(Box<KernelType>),
    /// Fixed-size array; `None` means the size is unknown and the value is
    /// not materializable.
    Array(Box<KernelType>, Option<u64>),
    Struct(Vec<KernelType>),
    /// Ordered semantically but laid out in reverse declaration order in
    /// host memory.
    Tuple(Vec<KernelType>),
}

impl KernelType {
    /// The LLVM type describing how a value of this type is laid out in
    /// *host* memory. All size and offset queries against the data layout
    /// go through this lowering.
    ///
    /// Returns `None` when the layout is unknowable (bare state handles,
    /// arrays of unknown size).
    pub fn host_type<'ctx>(&self, ctx: &'ctx Context) -> Option<BasicTypeEnum<'ctx>> {
        let byte_ptr = ctx.i8_type().ptr_type(AddressSpace::default());
        match self {
            Self::Int(bits) => Some(ctx.custom_width_int_type(*bits).into()),
            Self::Float(FloatKind::Single) => Some(ctx.f32_type().into()),
            Self::Float(FloatKind::Double) => Some(ctx.f64_type().into()),
            Self::Float(FloatKind::Extended) => Some(ctx.x86_f80_type().into()),
            Self::Complex(FloatKind::Single) => {
                Some(complex_struct(ctx, ctx.f32_type().into()).into())
            }
            Self::Complex(FloatKind::Double) => {
                Some(complex_struct(ctx, ctx.f64_type().into()).into())
            }
            Self::Complex(FloatKind::Extended) => None,
            Self::Charspan => Some(
                ctx.struct_type(&[byte_ptr.into(), ctx.i64_type().into()], false)
                    .into(),
            ),
            Self::State => None,
            Self::Pointer(_) => Some(byte_ptr.into()),
            Self::Stdvec(_) => Some(
                ctx.struct_type(&[byte_ptr.into(), byte_ptr.into(), byte_ptr.into()], false)
                    .into(),
            ),
            Self::Array(element, Some(size)) => {
                let len = u32::try_from(*size).ok()?;
                Some(element.host_type(ctx)?.array_type(len).into())
            }
            Self::Array(_, None) => None,
            Self::Struct(members) => {
                let fields = members
                    .iter()
                    .map(|m| m.host_type(ctx))
                    .collect::<Option<Vec<_>>>()?;
                Some(ctx.struct_type(&fields, false).into())
            }
            Self::Tuple(members) => {
                // Tuples are stored back to front.
                let fields = members
                    .iter()
                    .rev()
                    .map(|m| m.host_type(ctx))
                    .collect::<Option<Vec<_>>>()?;
                Some(ctx.struct_type(&fields, false).into())
            }
        }
    }

    /// The LLVM type of the IR constant produced for this type. Differs
    /// from [`Self::host_type`] for spans and vectors (materialized as
    /// `{data, length}` pairs), tuples (forward field order), and state
    /// pointers (typed against the opaque state struct).
    pub fn constant_type<'ctx>(
        &self,
        ctx: &'ctx Context,
        state_ty: StructType<'ctx>,
    ) -> Option<BasicTypeEnum<'ctx>> {
        match self {
            Self::Charspan => {
                let byte_ptr = ctx.i8_type().ptr_type(AddressSpace::default());
                Some(
                    ctx.struct_type(&[byte_ptr.into(), ctx.i64_type().into()], false)
                        .into(),
                )
            }
            Self::Pointer(element) => match element.as_ref() {
                Self::State => Some(state_ty.ptr_type(AddressSpace::default()).into()),
                _ => None,
            },
            Self::Stdvec(element) => {
                let ele = element.constant_type(ctx, state_ty)?;
                Some(
                    ctx.struct_type(
                        &[
                            ele.ptr_type(AddressSpace::default()).into(),
                            ctx.i64_type().into(),
                        ],
                        false,
                    )
                    .into(),
                )
            }
            Self::Array(element, Some(size)) => {
                let len = u32::try_from(*size).ok()?;
                Some(element.constant_type(ctx, state_ty)?.array_type(len).into())
            }
            Self::Struct(members) => {
                let fields = members
                    .iter()
                    .map(|m| member_slot_type(m, ctx, state_ty))
                    .collect::<Option<Vec<_>>>()?;
                Some(ctx.struct_type(&fields, false).into())
            }
            Self::Tuple(members) => {
                let fields = members
                    .iter()
                    .map(|m| member_slot_type(m, ctx, state_ty))
                    .collect::<Option<Vec<_>>>()?;
                Some(ctx.struct_type(&fields, false).into())
            }
            _ => self.host_type(ctx),
        }
    }
}

/// Aggregate slot type for a record or tuple member. Members that are never
/// materialized (for example a non-state pointer) still occupy a slot in
/// the aggregate; they fall back to their host layout type and stay undef.
pub(crate) fn member_slot_type<'ctx>(
    member: &KernelType,
    ctx: &'ctx Context,
    state_ty: StructType<'ctx>,
) -> Option<BasicTypeEnum<'ctx>> {
    member
        .constant_type(ctx, state_ty)
        .or_else(|| member.host_type(ctx))
}

fn complex_struct<'ctx>(ctx: &'ctx Context, part: BasicTypeEnum<'ctx>) -> StructType<'ctx> {
    ctx.struct_type(&[part, part], false)
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(bits) => write!(f, "i{bits}"),
            Self::Float(FloatKind::Single) => write!(f, "f32"),
            Self::Float(FloatKind::Double) => write!(f, "f64"),
            Self::Float(FloatKind::Extended) => write!(f, "f80"),
            Self::Complex(FloatKind::Single) => write!(f, "complex<f32>"),
            Self::Complex(FloatKind::Double) => write!(f, "complex<f64>"),
            Self::Complex(FloatKind::Extended) => write!(f, "complex<f80>"),
            Self::Charspan => write!(f, "charspan"),
            Self::State => write!(f, "state"),
            Self::Pointer(element) => write!(f, "ptr<{element}>"),
            Self::Stdvec(element) => write!(f, "stdvec<{element}>"),
            Self::Array(element, Some(size)) => write!(f, "array<{element} x {size}>"),
            Self::Array(element, None) => write!(f, "array<{element} x ?>"),
            Self::Struct(members) => write_member_list(f, "struct", members),
            Self::Tuple(members) => write_member_list(f, "tuple", members),
        }
    }
}

fn write_member_list(f: &mut fmt::Formatter<'_>, tag: &str, members: &[KernelType]) -> fmt::Result {
    write!(f, "{tag}<")?;
    for (i, member) in members.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{member}")?;
    }
    write!(f, ">")
}

/// Parses a comma-separated kernel signature, e.g.
/// `"i32, stdvec<f64>, tuple<i8, i32>"`.
///
/// # Errors
/// Returns an error describing the first malformed token.
pub fn parse_signature(input: &str) -> Result<Vec<KernelType>, String> {
    let mut parser = TypeParser::new(input);
    parser.skip_ws();
    if parser.at_end() {
        return Ok(Vec::new());
    }
    let mut types = vec![parser.parse_type()?];
    parser.skip_ws();
    while parser.eat(b',') {
        types.push(parser.parse_type()?);
        parser.skip_ws();
    }
    if parser.at_end() {
        Ok(types)
    } else {
        Err(parser.error("trailing input after signature"))
    }
}

struct TypeParser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> TypeParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, c: u8) -> bool {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: u8) -> Result<(), String> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(&format!("expected `{}`", char::from(c))))
        }
    }

    fn error(&self, msg: &str) -> String {
        format!("invalid kernel signature at byte {}: {msg}", self.pos)
    }

    fn parse_ident(&mut self) -> Result<&'a str, String> {
        self.skip_ws();
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_')
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected a type name"));
        }
        std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|e| self.error(&format!("non-UTF-8 type name: {e}")))
    }

    fn parse_type(&mut self) -> Result<KernelType, String> {
        let ident = self.parse_ident()?;
        match ident {
            "f32" => Ok(KernelType::Float(FloatKind::Single)),
            "f64" => Ok(KernelType::Float(FloatKind::Double)),
            "f80" => Ok(KernelType::Float(FloatKind::Extended)),
            "charspan" => Ok(KernelType::Charspan),
            "state" => Ok(KernelType::State),
            "complex" => {
                self.expect(b'<')?;
                let element = self.parse_type()?;
                self.expect(b'>')?;
                match element {
                    KernelType::Float(kind) => Ok(KernelType::Complex(kind)),
                    other => Err(self.error(&format!("complex element must be a float, got `{other}`"))),
                }
            }
            "ptr" => {
                self.expect(b'<')?;
                let element = self.parse_type()?;
                self.expect(b'>')?;
                Ok(KernelType::Pointer(Box::new(element)))
            }
            "stdvec" => {
                self.expect(b'<')?;
                let element = self.parse_type()?;
                self.expect(b'>')?;
                Ok(KernelType::Stdvec(Box::new(element)))
            }
            "array" => {
                self.expect(b'<')?;
                let element = self.parse_type()?;
                self.skip_ws();
                let sep = self.parse_ident()?;
                if sep != "x" {
                    return Err(self.error("expected `x` between array element and size"));
                }
                let size = self.parse_array_size()?;
                self.expect(b'>')?;
                Ok(KernelType::Array(Box::new(element), size))
            }
            "struct" => Ok(KernelType::Struct(self.parse_member_list()?)),
            "tuple" => Ok(KernelType::Tuple(self.parse_member_list()?)),
            other => {
                if let Some(width) = other.strip_prefix('i')
                    && let Ok(bits) = width.parse::<u32>()
                    && bits > 0
                {
                    return Ok(KernelType::Int(bits));
                }
                Err(self.error(&format!("unknown type `{other}`")))
            }
        }
    }

    fn parse_array_size(&mut self) -> Result<Option<u64>, String> {
        self.skip_ws();
        if self.eat(b'?') {
            return Ok(None);
        }
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected an array size or `?`"));
        }
        let digits = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|e| self.error(&format!("non-UTF-8 array size: {e}")))?;
        let size = digits
            .parse::<u64>()
            .map_err(|e| self.error(&format!("bad array size `{digits}`: {e}")))?;
        Ok(Some(size))
    }

    fn parse_member_list(&mut self) -> Result<Vec<KernelType>, String> {
        self.expect(b'<')?;
        self.skip_ws();
        if self.eat(b'>') {
            return Ok(Vec::new());
        }
        let mut members = vec![self.parse_type()?];
        while self.eat(b',') {
            members.push(self.parse_type()?);
        }
        self.expect(b'>')?;
        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    #![allow(clippy::unwrap_used)]

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("i1")]
    #[case("i8")]
    #[case("i32")]
    #[case("f32")]
    #[case("f64")]
    #[case("f80")]
    #[case("charspan")]
    #[case("complex<f32>")]
    #[case("complex<f64>")]
    #[case("ptr<state>")]
    #[case("stdvec<f64>")]
    #[case("array<i64 x 3>")]
    #[case("array<i32 x ?>")]
    #[case("struct<i32, f64>")]
    #[case("tuple<i8, i32>")]
    #[case("stdvec<struct<i16, stdvec<complex<f64>>>>")]
    fn parse_display_round_trip(#[case] spelled: &str) {
        let parsed = parse_signature(spelled).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].to_string(), spelled);
    }

    #[test]
    fn parse_full_signature() {
        let sig = parse_signature("i32, f64, tuple<i8, i32>, stdvec<f32>").unwrap();
        assert_eq!(
            sig,
            vec![
                KernelType::Int(32),
                KernelType::Float(FloatKind::Double),
                KernelType::Tuple(vec![KernelType::Int(8), KernelType::Int(32)]),
                KernelType::Stdvec(Box::new(KernelType::Float(FloatKind::Single))),
            ]
        );
    }

    #[test]
    fn parse_empty_signature() {
        assert_eq!(parse_signature("").unwrap(), Vec::new());
        assert_eq!(parse_signature("   ").unwrap(), Vec::new());
    }

    #[test]
    fn parse_empty_tuple() {
        assert_eq!(parse_signature("tuple<>").unwrap(), vec![KernelType::Tuple(Vec::new())]);
    }

    #[rstest]
    #[case("i32 i64")]
    #[case("frob")]
    #[case("stdvec<")]
    #[case("array<i32 x >")]
    #[case("complex<i32>")]
    #[case("i32,")]
    fn parse_rejects_malformed(#[case] spelled: &str) {
        assert!(parse_signature(spelled).is_err(), "accepted `{spelled}`");
    }

    #[test]
    fn tuple_host_layout_is_reversed() {
        let ctx = inkwell::context::Context::create();
        let tuple = parse_signature("tuple<i8, i32>").unwrap().remove(0);
        let host = tuple.host_type(&ctx).unwrap().into_struct_type();
        assert_eq!(host.count_fields(), 2);
        assert_eq!(host.get_field_type_at_index(0).unwrap(), ctx.i32_type().into());
        assert_eq!(host.get_field_type_at_index(1).unwrap(), ctx.i8_type().into());
    }

    #[test]
    fn unknown_array_has_no_layout() {
        let ctx = inkwell::context::Context::create();
        let arr = parse_signature("array<i32 x ?>").unwrap().remove(0);
        assert!(arr.host_type(&ctx).is_none());
    }

    #[test]
    fn stdvec_constant_type_is_a_span() {
        let ctx = inkwell::context::Context::create();
        let state_ty = ctx.opaque_struct_type("quantum.state");
        let vec = parse_signature("stdvec<f32>").unwrap().remove(0);
        let span = vec.constant_type(&ctx, state_ty).unwrap().into_struct_type();
        assert_eq!(span.count_fields(), 2);
        assert!(span.get_field_type_at_index(0).unwrap().is_pointer_type());
        assert_eq!(span.get_field_type_at_index(1).unwrap(), ctx.i64_type().into());
    }
}
