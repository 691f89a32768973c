use inkwell::module::Module;
use inkwell::targets::TargetData;
use inkwell::types::{BasicTypeEnum, StructType};
use inkwell::values::{AggregateValueEnum, BasicValueEnum, InstructionValue};

/// Builds the data-layout oracle for a module from its data-layout string.
/// A module without one gets the empty string, i.e. layout-agnostic
/// defaults.
///
/// # Errors
/// Returns an error if the module's data-layout string is not valid UTF-8.
pub fn module_target_data(module: &Module) -> Result<TargetData, String> {
    let data_layout = module.get_data_layout();
    let spec = data_layout
        .as_str()
        .to_str()
        .map_err(|e| format!("Invalid UTF-8 in module data layout: {e}"))?;
    Ok(TargetData::create(spec))
}

/// Number of bytes a value of `ty` occupies in host memory, padding
/// included.
#[must_use]
pub fn data_size(layout: &TargetData, ty: BasicTypeEnum) -> u64 {
    layout.get_abi_size(&ty)
}

/// Byte offset of field `index` within the host layout of `struct_ty`.
///
/// # Errors
/// Returns an error if the layout has no offset for that field.
pub fn data_offset(layout: &TargetData, struct_ty: StructType, index: u32) -> Result<u64, String> {
    layout
        .offset_of_element(&struct_ty, index)
        .ok_or_else(|| {
            format!(
                "No layout offset for field {index} of `{}`",
                struct_ty.print_to_string()
            )
        })
}

/// Returns operand `index` of an instruction as a basic value.
///
/// # Errors
/// Returns an error if the operand is missing or is a basic block.
pub fn operand_value<'a>(
    instr: &InstructionValue<'a>,
    index: u32,
) -> Result<BasicValueEnum<'a>, String> {
    match instr.get_operand(index) {
        Some(inkwell::Either::Left(bv)) => Ok(bv),
        Some(inkwell::Either::Right(_)) => {
            Err(format!("Operand {index} is a block, not a value"))
        }
        None => Err(format!("Failed to get operand at index {index}")),
    }
}

pub(crate) fn aggregate_to_basic(agg: AggregateValueEnum) -> BasicValueEnum {
    match agg {
        AggregateValueEnum::ArrayValue(v) => v.into(),
        AggregateValueEnum::StructValue(v) => v.into(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    #![allow(clippy::unwrap_used)]

    use inkwell::context::Context;

    use super::*;

    #[test]
    fn default_layout_sizes() {
        let ctx = Context::create();
        let layout = TargetData::create("");
        assert_eq!(data_size(&layout, ctx.i64_type().into()), 8);
        assert_eq!(data_size(&layout, ctx.f32_type().into()), 4);
        let complex = ctx.struct_type(&[ctx.f64_type().into(), ctx.f64_type().into()], false);
        assert_eq!(data_size(&layout, complex.into()), 16);
    }

    #[test]
    fn struct_offsets_respect_alignment() {
        let ctx = Context::create();
        let layout = TargetData::create("");
        let mixed = ctx.struct_type(&[ctx.i32_type().into(), ctx.f64_type().into()], false);
        assert_eq!(data_offset(&layout, mixed, 0).unwrap(), 0);
        assert_eq!(data_offset(&layout, mixed, 1).unwrap(), 8);
        let padded = ctx.struct_type(&[ctx.i8_type().into(), ctx.i32_type().into()], false);
        assert_eq!(data_offset(&layout, padded, 1).unwrap(), 4);
    }

    #[test]
    fn module_without_layout_uses_defaults() {
        let ctx = Context::create();
        let module = ctx.create_module("bare");
        let layout = module_target_data(&module).unwrap();
        assert_eq!(data_size(&layout, ctx.i32_type().into()), 4);
    }
}
