use std::collections::hash_map::DefaultHasher;
use std::ffi::c_void;
use std::hash::{Hash, Hasher};
use std::mem;
use std::ptr;

use inkwell::AddressSpace;
use inkwell::attributes::AttributeLoc;
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::targets::TargetData;
use inkwell::types::BasicType;
use inkwell::values::{
    AggregateValueEnum, BasicValueEnum, FunctionValue, GlobalValue, IntValue, PointerValue,
};

use crate::state::{QuantumState, StateData};
use crate::types::{FloatKind, KernelType, member_slot_type, parse_signature};
use crate::utils::{aggregate_to_basic, data_offset, data_size, module_target_data, operand_value};

/// Prefix a kernel's logical name carries on its generated IR symbol.
pub const KERNEL_GEN_PREFIX: &str = "__nvqpp__mlirgen__";

/// Function attribute spelling the kernel's formal parameter types in the
/// [`crate::types`] grammar.
pub const KERNEL_SIGNATURE_ATTR: &str = "cudaq-kernel-signature";

/// Function attribute recording which parameter a substitution record
/// replaces.
pub const ARG_INDEX_ATTR: &str = "cudaq-arg-index";

/// Name of the opaque struct standing for the quantum-state handle in IR.
const STATE_TYPE_NAME: &str = "cudaq.state";

/// Where the substituted kernel will run. The combination selects the
/// materialization strategy for quantum-state arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformSettings {
    pub is_simulator: bool,
    pub is_remote: bool,
}

/// Host-side view of a character-span argument: data pointer plus byte
/// length. The pointed-to text must outlive the `generate` call reading it.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CharSpanRef {
    pub data: *const u8,
    pub len: usize,
}

impl CharSpanRef {
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self {
            data: text.as_ptr(),
            len: text.len(),
        }
    }
}

/// Host-side triple for a variable-length sequence argument, in the vendor
/// layout `{begin, end, capacity}`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VectorRef {
    pub begin: *const u8,
    pub end: *const u8,
    pub capacity: *const u8,
}

impl VectorRef {
    /// Views a slice as a full (capacity == length) sequence. The slice
    /// must outlive the `generate` call reading it.
    #[must_use]
    pub fn from_slice<T>(values: &[T]) -> Self {
        let begin = values.as_ptr().cast::<u8>();
        // One-past-the-end of the same allocation.
        let end = unsafe { begin.add(mem::size_of_val(values)) };
        Self {
            begin,
            end,
            capacity: end,
        }
    }
}

/// One argument-substitution record: a function in the substitution module
/// whose single block emits the constant chain and returns the terminal
/// constant for the parameter at `index`.
pub struct ArgumentSubstitution<'ctx> {
    index: usize,
    body: FunctionValue<'ctx>,
}

impl<'ctx> ArgumentSubstitution<'ctx> {
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn body(&self) -> FunctionValue<'ctx> {
        self.body
    }

    /// The terminal constant of the substitution block.
    #[must_use]
    pub fn constant(&self) -> Option<BasicValueEnum<'ctx>> {
        let terminator = self.body.get_first_basic_block()?.get_terminator()?;
        operand_value(&terminator, 0).ok()
    }
}

/// Replaces a kernel's formal parameters with constants synthesized from
/// live host-memory argument buffers.
///
/// The converter owns a substitution module that accumulates one record per
/// materialized parameter across [`ArgumentConverter::generate`] calls. The
/// source module is only ever read.
pub struct ArgumentConverter<'ctx, 'm> {
    context: &'ctx Context,
    source_module: &'m Module<'ctx>,
    subst_module: Module<'ctx>,
    kernel_name: String,
    platform: PlatformSettings,
    state_type: inkwell::types::StructType<'ctx>,
    substitutions: Vec<ArgumentSubstitution<'ctx>>,
    record_count: usize,
}

impl<'ctx, 'm> ArgumentConverter<'ctx, 'm> {
    #[must_use]
    pub fn new(
        context: &'ctx Context,
        kernel_name: &str,
        source_module: &'m Module<'ctx>,
        platform: PlatformSettings,
    ) -> Self {
        let subst_module = context.create_module(&format!("{kernel_name}.substitutions"));
        let state_type = context.opaque_struct_type(STATE_TYPE_NAME);
        Self {
            context,
            source_module,
            subst_module,
            kernel_name: kernel_name.to_string(),
            platform,
            state_type,
            substitutions: Vec::new(),
            record_count: 0,
        }
    }

    #[must_use]
    pub fn substitution_module(&self) -> &Module<'ctx> {
        &self.subst_module
    }

    /// Records appended so far, in emission order; within one `generate` call
    /// the parameter indices are strictly increasing.
    #[must_use]
    pub fn substitutions(&self) -> &[ArgumentSubstitution<'ctx>] {
        &self.substitutions
    }

    /// Generates one substitution record per `(formal type, host pointer)`
    /// pair of the kernel's parameter list. Parameters whose value cannot
    /// be materialized are dropped; the consumer treats missing indices as
    /// "argument retained as-is".
    ///
    /// # Errors
    /// Returns an error if the kernel symbol or its signature attribute is
    /// missing or malformed, if IR emission fails, or if a state argument
    /// is requested on a non-simulator target.
    ///
    /// # Safety
    /// Every pointer in `arguments` must reference a live host value of the
    /// corresponding formal parameter type, laid out according to the
    /// source module's data layout, and must remain valid for the duration
    /// of the call.
    pub unsafe fn generate(&mut self, arguments: &[*const c_void]) -> Result<(), String> {
        let symbol = format!("{KERNEL_GEN_PREFIX}{}", self.kernel_name);
        let function = self.source_module.get_function(&symbol).ok_or_else(|| {
            format!(
                "Kernel `{}` has no `{symbol}` symbol in the source module",
                self.kernel_name
            )
        })?;
        let signature = kernel_signature(function)?;
        let layout = module_target_data(self.source_module)?;

        for (index, (arg_ty, &arg_ptr)) in signature.iter().zip(arguments.iter()).enumerate() {
            let record =
                unsafe { self.build_substitution(index, arg_ty, arg_ptr.cast::<u8>(), &layout) }?;
            match record {
                Some(record) => self.substitutions.push(record),
                None => log::debug!(
                    "parameter {index} of `{}` not substituted ({arg_ty})",
                    self.kernel_name
                ),
            }
        }
        Ok(())
    }

    /// Opens a fresh record for parameter `index` and dispatches on the
    /// type. The record is discarded again when emission is skipped.
    unsafe fn build_substitution(
        &mut self,
        index: usize,
        ty: &KernelType,
        p: *const u8,
        layout: &TargetData,
    ) -> Result<Option<ArgumentSubstitution<'ctx>>, String> {
        // A remote simulator materializes a state argument as its amplitude
        // array, whose type is only known after reading the state. Rewrite
        // the record type up front; every other case keeps the declared one.
        if let KernelType::Pointer(element) = ty
            && matches!(element.as_ref(), KernelType::State)
            && self.platform.is_simulator
            && self.platform.is_remote
        {
            return unsafe {
                self.build_remote_state_substitution(index, p.cast::<QuantumState>(), layout)
            };
        }
        let Some(ret_ty) = ty.constant_type(self.context, self.state_type) else {
            return Ok(None);
        };
        let name = format!(
            "{KERNEL_GEN_PREFIX}{}.argsubst.{}",
            self.kernel_name, self.record_count
        );
        let function = self
            .subst_module
            .add_function(&name, ret_ty.fn_type(&[], false), None);
        let attr = self
            .context
            .create_string_attribute(ARG_INDEX_ATTR, &index.to_string());
        function.add_attribute(AttributeLoc::Function, attr);
        let block = self.context.append_basic_block(function, "entry");
        let builder = self.context.create_builder();
        builder.position_at_end(block);

        match unsafe { self.dispatch_subtype(&builder, ty, p, layout) }? {
            Some(value) => {
                builder
                    .build_return(Some(&value))
                    .map_err(|e| format!("Failed to terminate substitution block: {e}"))?;
                self.record_count += 1;
                Ok(Some(ArgumentSubstitution {
                    index,
                    body: function,
                }))
            }
            None => {
                unsafe { function.delete() };
                Ok(None)
            }
        }
    }

    /// Pins the state's amplitudes in host memory and records them as a
    /// complex-array constant. The element type follows the backend's
    /// element size; the host copy stays alive until the array has been
    /// fully emitted.
    unsafe fn build_remote_state_substitution(
        &mut self,
        index: usize,
        state: *const QuantumState,
        layout: &TargetData,
    ) -> Result<Option<ArgumentSubstitution<'ctx>>, String> {
        let state = unsafe { &*state };
        let data = StateData::read_state(state);
        let amplitudes = KernelType::Array(
            Box::new(KernelType::Complex(amplitude_element(&data))),
            Some(data.size() as u64),
        );
        unsafe { self.build_substitution(index, &amplitudes, data.data().cast::<u8>(), layout) }
    }

    /// Recursive dispatch over the type algebra. `Ok(None)` means the value
    /// is not materializable; aggregate callers leave the slot undef.
    unsafe fn dispatch_subtype(
        &mut self,
        builder: &Builder<'ctx>,
        ty: &KernelType,
        p: *const u8,
        layout: &TargetData,
    ) -> Result<Option<BasicValueEnum<'ctx>>, String> {
        match ty {
            KernelType::Int(bits) => Ok(unsafe { self.gen_integer_constant(*bits, p) }),
            KernelType::Float(kind) => Ok(Some(unsafe { self.gen_float_constant(*kind, p) })),
            KernelType::Complex(kind) => Ok(unsafe { self.gen_complex_constant(*kind, p) }),
            KernelType::Charspan => unsafe { self.gen_charspan_constant(builder, p).map(Some) },
            KernelType::Pointer(element) => match element.as_ref() {
                KernelType::State => unsafe {
                    self.gen_state_constant(builder, p.cast::<QuantumState>(), layout)
                        .map(Some)
                },
                other => {
                    log::debug!("cannot materialize a pointer to `{other}`");
                    Ok(None)
                }
            },
            KernelType::Stdvec(element) => unsafe {
                self.gen_stdvec_constant(builder, element, p, layout)
            },
            KernelType::Struct(members) => unsafe {
                self.gen_struct_constant(builder, members, p, layout)
            },
            KernelType::Tuple(members) => unsafe {
                self.gen_tuple_constant(builder, members, p, layout)
            },
            KernelType::Array(element, size) => unsafe {
                self.gen_array_constant(builder, element, *size, p, layout)
            },
            KernelType::State => Ok(None),
        }
    }

    unsafe fn gen_integer_constant(&self, bits: u32, p: *const u8) -> Option<BasicValueEnum<'ctx>> {
        let raw: i64 = match bits {
            1 => i64::from(unsafe { ptr::read_unaligned(p) } != 0),
            8 => i64::from(unsafe { ptr::read_unaligned(p.cast::<i8>()) }),
            16 => i64::from(unsafe { ptr::read_unaligned(p.cast::<i16>()) }),
            32 => i64::from(unsafe { ptr::read_unaligned(p.cast::<i32>()) }),
            64 => unsafe { ptr::read_unaligned(p.cast::<i64>()) },
            other => {
                log::debug!("no emitter for integer width i{other}");
                return None;
            }
        };
        let ty = self.context.custom_width_int_type(bits);
        Some(ty.const_int(raw as u64, true).into())
    }

    unsafe fn gen_float_constant(&self, kind: FloatKind, p: *const u8) -> BasicValueEnum<'ctx> {
        match kind {
            FloatKind::Single => {
                let v = unsafe { ptr::read_unaligned(p.cast::<f32>()) };
                self.context.f32_type().const_float(f64::from(v)).into()
            }
            FloatKind::Double => {
                let v = unsafe { ptr::read_unaligned(p.cast::<f64>()) };
                self.context.f64_type().const_float(v).into()
            }
            FloatKind::Extended => {
                let mut bytes = [0_u8; 10];
                unsafe { ptr::copy_nonoverlapping(p, bytes.as_mut_ptr(), bytes.len()) };
                let value = extended_to_double(bytes);
                let ty = self.context.x86_f80_type();
                if value.is_finite() {
                    // The wide value travels as its decimal rendering and is
                    // re-parsed under the target's extended semantics.
                    unsafe { ty.const_float_from_string(&format!("{value}")) }.into()
                } else {
                    ty.const_float(value).into()
                }
            }
        }
    }

    unsafe fn gen_complex_constant(
        &self,
        kind: FloatKind,
        p: *const u8,
    ) -> Option<BasicValueEnum<'ctx>> {
        match kind {
            FloatKind::Single => {
                let parts = unsafe { ptr::read_unaligned(p.cast::<[f32; 2]>()) };
                let fty = self.context.f32_type();
                Some(
                    self.context
                        .const_struct(
                            &[
                                fty.const_float(f64::from(parts[0])).into(),
                                fty.const_float(f64::from(parts[1])).into(),
                            ],
                            false,
                        )
                        .into(),
                )
            }
            FloatKind::Double => {
                let parts = unsafe { ptr::read_unaligned(p.cast::<[f64; 2]>()) };
                let fty = self.context.f64_type();
                Some(
                    self.context
                        .const_struct(
                            &[
                                fty.const_float(parts[0]).into(),
                                fty.const_float(parts[1]).into(),
                            ],
                            false,
                        )
                        .into(),
                )
            }
            FloatKind::Extended => None,
        }
    }

    /// Emits a NUL-terminated byte literal into the substitution module and
    /// pairs its address with the pre-NUL length. The terminator keeps the
    /// literal usable through C string APIs without changing the span size.
    unsafe fn gen_charspan_constant(
        &mut self,
        builder: &Builder<'ctx>,
        p: *const u8,
    ) -> Result<BasicValueEnum<'ctx>, String> {
        let span = unsafe { ptr::read_unaligned(p.cast::<CharSpanRef>()) };
        let text = unsafe { std::slice::from_raw_parts(span.data, span.len) };
        let global = self.intern_cstring(text);
        let byte_ptr_ty = self.context.i8_type().ptr_type(AddressSpace::default());
        let addr = builder
            .build_pointer_cast(global.as_pointer_value(), byte_ptr_ty, "cstr")
            .map_err(|e| format!("Failed to cast string literal address: {e}"))?;
        let length = self.context.i64_type().const_int(span.len as u64, false);
        self.gen_span_init(builder, addr, length)
    }

    /// Returns the interned global for a byte literal, creating it (with a
    /// trailing NUL) on first use.
    fn intern_cstring(&mut self, text: &[u8]) -> GlobalValue<'ctx> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let name = format!("cstr.{:016x}", hasher.finish());
        let existing = self
            .subst_module
            .get_globals()
            .find(|g| g.get_name().to_str() == Ok(name.as_str()));
        if let Some(global) = existing {
            return global;
        }
        let literal = self.context.const_string(text, true);
        let global = self
            .subst_module
            .add_global(literal.get_type(), None, &name);
        global.set_initializer(&literal);
        global.set_linkage(Linkage::Private);
        global.set_constant(true);
        global
    }

    /// Pairs a data pointer with a 64-bit length in a span aggregate.
    fn gen_span_init(
        &self,
        builder: &Builder<'ctx>,
        data: PointerValue<'ctx>,
        length: IntValue<'ctx>,
    ) -> Result<BasicValueEnum<'ctx>, String> {
        let span_ty = self.context.struct_type(
            &[data.get_type().into(), self.context.i64_type().into()],
            false,
        );
        let empty = AggregateValueEnum::StructValue(span_ty.get_undef());
        let with_data = builder
            .build_insert_value(empty, data, 0, "span")
            .map_err(|e| format!("Failed to init span data: {e}"))?;
        let with_length = builder
            .build_insert_value(with_data, length, 1, "span")
            .map_err(|e| format!("Failed to init span length: {e}"))?;
        Ok(aggregate_to_basic(with_length))
    }

    unsafe fn gen_state_constant(
        &mut self,
        builder: &Builder<'ctx>,
        state: *const QuantumState,
        layout: &TargetData,
    ) -> Result<BasicValueEnum<'ctx>, String> {
        let state_ptr_ty = self.state_type.ptr_type(AddressSpace::default());
        if self.platform.is_simulator && !self.platform.is_remote {
            // Kernel and runtime share an address space; the raw address is
            // legal. The constant width must match the host pointer width.
            let int_ty = self.context.ptr_sized_int_type(layout, None);
            let addr = int_ty.const_int(state as usize as u64, false);
            let cast = builder
                .build_int_to_ptr(addr, state_ptr_ty, "state")
                .map_err(|e| format!("Failed to cast state address: {e}"))?;
            return Ok(cast.into());
        }
        if self.platform.is_simulator && self.platform.is_remote {
            // Remote execution cannot share memory; ship the amplitudes as
            // an array constant instead. A later pass constant-folds qubit
            // count queries over the array.
            let state = unsafe { &*state };
            let data = StateData::read_state(state);
            let element = KernelType::Complex(amplitude_element(&data));
            let value = unsafe {
                self.gen_array_constant(
                    builder,
                    &element,
                    Some(data.size() as u64),
                    data.data().cast::<u8>(),
                    layout,
                )
            }?;
            return value.ok_or_else(|| "State amplitude array produced no value".to_string());
        }
        Err(format!(
            "not implemented: state argument synthesis for quantum hardware (kernel `{}`)",
            self.kernel_name
        ))
    }

    unsafe fn gen_struct_constant(
        &mut self,
        builder: &Builder<'ctx>,
        members: &[KernelType],
        p: *const u8,
        layout: &TargetData,
    ) -> Result<Option<BasicValueEnum<'ctx>>, String> {
        if members.is_empty() {
            return Ok(None);
        }
        let host_fields = members
            .iter()
            .map(|m| m.host_type(self.context))
            .collect::<Option<Vec<_>>>();
        let slot_fields = members
            .iter()
            .map(|m| member_slot_type(m, self.context, self.state_type))
            .collect::<Option<Vec<_>>>();
        let (Some(host_fields), Some(slot_fields)) = (host_fields, slot_fields) else {
            return Ok(None);
        };
        let host_struct = self.context.struct_type(&host_fields, false);
        let value_struct = self.context.struct_type(&slot_fields, false);

        let mut aggie = AggregateValueEnum::StructValue(value_struct.get_undef());
        for (i, member) in members.iter().enumerate() {
            let index = u32::try_from(i).map_err(|e| format!("Field index overflow: {e}"))?;
            let offset = data_offset(layout, host_struct, index)?;
            let field_ptr = unsafe { p.add(offset as usize) };
            if let Some(value) =
                unsafe { self.dispatch_subtype(builder, member, field_ptr, layout) }?
            {
                aggie = builder
                    .build_insert_value(aggie, value, index, "")
                    .map_err(|e| format!("Failed to insert field {i}: {e}"))?;
            }
        }
        Ok(Some(aggregate_to_basic(aggie)))
    }

    /// Tuples are stored back to front in host memory: walk a synthetic
    /// record with the fields reversed, then rebuild the forward-ordered
    /// aggregate by cross-indexed extraction.
    unsafe fn gen_tuple_constant(
        &mut self,
        builder: &Builder<'ctx>,
        members: &[KernelType],
        p: *const u8,
        layout: &TargetData,
    ) -> Result<Option<BasicValueEnum<'ctx>>, String> {
        if members.is_empty() {
            return Ok(None);
        }
        let reversed: Vec<KernelType> = members.iter().rev().cloned().collect();
        let Some(rev_value) = unsafe { self.gen_struct_constant(builder, &reversed, p, layout) }?
        else {
            return Ok(None);
        };
        let rev_struct = rev_value.into_struct_value();

        let slot_fields = members
            .iter()
            .map(|m| member_slot_type(m, self.context, self.state_type))
            .collect::<Option<Vec<_>>>();
        let Some(slot_fields) = slot_fields else {
            return Ok(None);
        };
        let forward_struct = self.context.struct_type(&slot_fields, false);
        let count = members.len();
        let mut aggie = AggregateValueEnum::StructValue(forward_struct.get_undef());
        for i in 0..count {
            let src =
                u32::try_from(count - 1 - i).map_err(|e| format!("Field index overflow: {e}"))?;
            let dst = u32::try_from(i).map_err(|e| format!("Field index overflow: {e}"))?;
            let field = builder
                .build_extract_value(rev_struct, src, "")
                .map_err(|e| format!("Failed to extract tuple field {i}: {e}"))?;
            aggie = builder
                .build_insert_value(aggie, field, dst, "")
                .map_err(|e| format!("Failed to insert tuple field {i}: {e}"))?;
        }
        Ok(Some(aggregate_to_basic(aggie)))
    }

    unsafe fn gen_array_constant(
        &mut self,
        builder: &Builder<'ctx>,
        element: &KernelType,
        size: Option<u64>,
        p: *const u8,
        layout: &TargetData,
    ) -> Result<Option<BasicValueEnum<'ctx>>, String> {
        let Some(size) = size else {
            log::debug!("array of unknown size skipped");
            return Ok(None);
        };
        let (Some(host_ele), Some(slot_ele)) = (
            element.host_type(self.context),
            member_slot_type(element, self.context, self.state_type),
        ) else {
            return Ok(None);
        };
        let count = u32::try_from(size).map_err(|e| format!("Array size {size} too large: {e}"))?;
        let stride = data_size(layout, host_ele) as usize;
        let array_ty = slot_ele.array_type(count);
        let mut aggie = AggregateValueEnum::ArrayValue(array_ty.get_undef());
        let mut cursor = p;
        for i in 0..count {
            if let Some(value) = unsafe { self.dispatch_subtype(builder, element, cursor, layout) }?
            {
                aggie = builder
                    .build_insert_value(aggie, value, i, "")
                    .map_err(|e| format!("Failed to insert array element {i}: {e}"))?;
            }
            cursor = unsafe { cursor.add(stride) };
        }
        Ok(Some(aggregate_to_basic(aggie)))
    }

    /// Unlike records and arrays, a vector is variable-length and therefore
    /// materializes into memory: an allocation plus stores, wrapped in a
    /// span of the element pointer and the 64-bit length.
    unsafe fn gen_stdvec_constant(
        &mut self,
        builder: &Builder<'ctx>,
        element: &KernelType,
        p: *const u8,
        layout: &TargetData,
    ) -> Result<Option<BasicValueEnum<'ctx>>, String> {
        let vec = unsafe { ptr::read_unaligned(p.cast::<VectorRef>()) };
        let delta = (vec.end as usize).wrapping_sub(vec.begin as usize);
        if delta == 0 {
            return Ok(None);
        }
        // The buffer holds emitted element values, so the element must have
        // a constant type of its own; otherwise the vector is skipped.
        let (Some(host_ele), Some(slot_ele)) = (
            element.host_type(self.context),
            element.constant_type(self.context, self.state_type),
        ) else {
            return Ok(None);
        };
        let stride = data_size(layout, host_ele) as usize;
        assert!(stride > 0, "vector element must have a size");
        if delta % stride != 0 {
            log::warn!(
                "vector byte span {delta} is not a multiple of the element size {stride}; \
                 trailing bytes ignored"
            );
        }
        let count = delta / stride;
        let count_u32 =
            u32::try_from(count).map_err(|e| format!("Vector length {count} too large: {e}"))?;

        let i64_ty = self.context.i64_type();
        let buffer = builder
            .build_alloca(slot_ele.array_type(count_u32), "vec")
            .map_err(|e| format!("Failed to allocate vector storage: {e}"))?;
        let mut cursor = vec.begin;
        for i in 0..count {
            if let Some(value) = unsafe { self.dispatch_subtype(builder, element, cursor, layout) }?
            {
                let index = i64_ty.const_int(i as u64, false);
                let slot = unsafe { builder.build_gep(buffer, &[i64_ty.const_zero(), index], "") }
                    .map_err(|e| format!("Failed to address vector element {i}: {e}"))?;
                builder
                    .build_store(slot, value)
                    .map_err(|e| format!("Failed to store vector element {i}: {e}"))?;
            }
            cursor = unsafe { cursor.add(stride) };
        }
        let data = builder
            .build_pointer_cast(
                buffer,
                slot_ele.ptr_type(AddressSpace::default()),
                "vecdata",
            )
            .map_err(|e| format!("Failed to cast vector storage: {e}"))?;
        let length = i64_ty.const_int(count as u64, false);
        self.gen_span_init(builder, data, length).map(Some)
    }
}

/// Reads and parses the formal parameter list off a kernel function.
///
/// # Errors
/// Returns an error if the signature attribute is missing or malformed.
pub fn kernel_signature(function: FunctionValue) -> Result<Vec<KernelType>, String> {
    let attr = function
        .get_string_attribute(AttributeLoc::Function, KERNEL_SIGNATURE_ATTR)
        .ok_or_else(|| {
            format!(
                "Missing `{KERNEL_SIGNATURE_ATTR}` attribute on `{}`",
                function.get_name().to_str().unwrap_or("<invalid utf8>")
            )
        })?;
    let spelled = attr
        .get_string_value()
        .to_str()
        .map_err(|e| format!("Invalid UTF-8 in kernel signature: {e}"))?;
    parse_signature(spelled)
}

/// Complex element kind matching a state backend's reported element size.
fn amplitude_element(data: &StateData) -> FloatKind {
    if data.element_size() == mem::size_of::<[f64; 2]>() {
        FloatKind::Double
    } else {
        FloatKind::Single
    }
}

/// Decodes an x87 80-bit extended float (sign, 15-bit biased exponent,
/// 64-bit mantissa with explicit integer bit) to the nearest double.
fn extended_to_double(bytes: [u8; 10]) -> f64 {
    let mut mantissa_bytes = [0_u8; 8];
    mantissa_bytes.copy_from_slice(&bytes[..8]);
    let mantissa = u64::from_le_bytes(mantissa_bytes);
    let sign_exponent = u16::from_le_bytes([bytes[8], bytes[9]]);
    let sign = if sign_exponent & 0x8000 != 0 { -1.0 } else { 1.0 };
    let biased = i32::from(sign_exponent & 0x7fff);
    if biased == 0x7fff {
        return if mantissa << 1 == 0 {
            sign * f64::INFINITY
        } else {
            f64::NAN
        };
    }
    // Denormals use the minimum exponent with no implicit integer bit.
    let exponent = if biased == 0 { -16382 } else { biased - 16383 };
    sign * (mantissa as f64) * 2.0_f64.powi(exponent - 63)
}
