use std::ffi::c_void;
use std::mem;

/// Floating-point precision a simulation backend runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Fp32,
    Fp64,
}

/// Raw description of a backend's amplitude tensor.
#[derive(Debug, Clone, Copy)]
pub struct TensorData {
    pub data: *const c_void,
    pub num_elements: usize,
    /// Size in bytes of one element; `2 * 4` for complex single precision,
    /// `2 * 8` for complex double precision.
    pub element_size: usize,
}

/// Contract implemented by simulator backends holding a state vector.
pub trait SimulationState {
    /// Whether the amplitudes live in device memory and must be copied out
    /// before the host can read them.
    fn is_on_gpu(&self) -> bool;

    fn precision(&self) -> Precision;

    /// The backend's amplitude tensor. For GPU-resident states the `data`
    /// pointer is a device address and must not be dereferenced on the host.
    fn tensor(&self) -> TensorData;

    /// Copies `num_elements` amplitudes into the host buffer at `dst`.
    fn to_host(&self, dst: *mut c_void, num_elements: usize);
}

/// Host-side quantum-state handle. Kernel callers pass a pointer to one of
/// these wherever a formal parameter has type `ptr<state>`.
pub struct QuantumState {
    backend: Box<dyn SimulationState>,
}

impl QuantumState {
    #[must_use]
    pub fn new(backend: Box<dyn SimulationState>) -> Self {
        Self { backend }
    }

    #[must_use]
    pub fn is_on_gpu(&self) -> bool {
        self.backend.is_on_gpu()
    }

    #[must_use]
    pub fn precision(&self) -> Precision {
        self.backend.precision()
    }

    #[must_use]
    pub fn tensor(&self) -> TensorData {
        self.backend.tensor()
    }

    pub fn to_host(&self, dst: *mut c_void, num_elements: usize) {
        self.backend.to_host(dst, num_elements);
    }
}

/// A state vector pinned in host memory, ready for the IR emitter to walk.
///
/// For GPU-resident states the amplitudes are copied into an owned buffer
/// that is released when the `StateData` is dropped; for host-resident
/// states the pointer aliases the backend's own tensor and dropping is a
/// no-op. The emitter must fully consume the buffer before dropping.
pub struct StateData {
    data: *const c_void,
    size: usize,
    element_size: usize,
    // Keeps the GPU read-out alive; `None` when aliasing backend memory.
    owned: Option<Vec<u8>>,
}

impl StateData {
    /// Reads the state's amplitudes into host-addressable memory.
    ///
    /// # Panics
    /// Panics when the backend reports an element size that disagrees with
    /// its declared precision; that is a backend programming error and the
    /// compilation cannot proceed.
    #[must_use]
    pub fn read_state(state: &QuantumState) -> Self {
        let tensor = state.tensor();
        if state.is_on_gpu() {
            let expected = match state.precision() {
                Precision::Fp32 => mem::size_of::<[f32; 2]>(),
                Precision::Fp64 => mem::size_of::<[f64; 2]>(),
            };
            assert_eq!(
                tensor.element_size, expected,
                "state element size {} does not match declared precision ({expected} bytes)",
                tensor.element_size
            );
            let mut buffer = vec![0_u8; tensor.num_elements * tensor.element_size];
            state.to_host(buffer.as_mut_ptr().cast::<c_void>(), tensor.num_elements);
            log::debug!(
                "copied {} amplitudes ({} bytes) from device to host",
                tensor.num_elements,
                buffer.len()
            );
            Self {
                data: buffer.as_ptr().cast::<c_void>(),
                size: tensor.num_elements,
                element_size: tensor.element_size,
                owned: Some(buffer),
            }
        } else {
            Self {
                data: tensor.data,
                size: tensor.num_elements,
                element_size: tensor.element_size,
                owned: None,
            }
        }
    }

    #[must_use]
    pub fn data(&self) -> *const c_void {
        self.data
    }

    /// Number of amplitudes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    #[must_use]
    pub fn owns_buffer(&self) -> bool {
        self.owned.is_some()
    }
}
