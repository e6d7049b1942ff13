use std::collections::HashMap;

use glow::HasContext;

use crate::error::{Result, TensorError};

/// Identifies one of the fixed compute programs compiled at startup.
///
/// Binding layout and uniform names for each kernel are documented next to
/// its shader source below; the catalog looks up uniform locations once at
/// link time and caches them, rather than on every dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kernel {
    MatMul,
    Accum,
    Rope,
    SiluAndMul,
    TemperatureScale,
    SquaresAndSum,
    Sum,
    Max,
    ArgmaxSetIndex,
    Argmax,
    RmsnormScaleInPlace,
    RmsnormScaleOutOfPlace,
    CopyIntoReduceStream,
    ExpAndSum,
    Normalize,
    GetQueryVector,
    BuildAttMat,
    GatherAttRows,
    ScatterAttRows,
}

impl Kernel {
    /// All kernels, compiled once at catalog construction.
    pub const ALL: &'static [Kernel] = &[
        Kernel::MatMul,
        Kernel::Accum,
        Kernel::Rope,
        Kernel::SiluAndMul,
        Kernel::TemperatureScale,
        Kernel::SquaresAndSum,
        Kernel::Sum,
        Kernel::Max,
        Kernel::ArgmaxSetIndex,
        Kernel::Argmax,
        Kernel::RmsnormScaleInPlace,
        Kernel::RmsnormScaleOutOfPlace,
        Kernel::CopyIntoReduceStream,
        Kernel::ExpAndSum,
        Kernel::Normalize,
        Kernel::GetQueryVector,
        Kernel::BuildAttMat,
        Kernel::GatherAttRows,
        Kernel::ScatterAttRows,
    ];

    fn source(self) -> &'static str {
        match self {
            Kernel::MatMul => SRC_MATMUL,
            Kernel::Accum => SRC_ACCUM,
            Kernel::Rope => SRC_ROPE,
            Kernel::SiluAndMul => SRC_SILU_AND_MUL,
            Kernel::TemperatureScale => SRC_TEMPERATURE_SCALE,
            Kernel::SquaresAndSum => SRC_SQUARES_AND_SUM,
            Kernel::Sum => SRC_SUM,
            Kernel::Max => SRC_MAX,
            Kernel::ArgmaxSetIndex => SRC_ARGMAX_SET_INDEX,
            Kernel::Argmax => SRC_ARGMAX,
            Kernel::RmsnormScaleInPlace => SRC_RMSNORM_SCALE_INPLACE,
            Kernel::RmsnormScaleOutOfPlace => SRC_RMSNORM_SCALE_OUTOFPLACE,
            Kernel::CopyIntoReduceStream => SRC_COPY_INTO_REDUCE_STREAM,
            Kernel::ExpAndSum => SRC_EXP_AND_SUM,
            Kernel::Normalize => SRC_NORMALIZE,
            Kernel::GetQueryVector => SRC_GET_QUERY_VECTOR,
            Kernel::BuildAttMat => SRC_BUILD_ATT_MAT,
            Kernel::GatherAttRows => SRC_GATHER_ATT_ROWS,
            Kernel::ScatterAttRows => SRC_SCATTER_ATT_ROWS,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Kernel::MatMul => "matmul",
            Kernel::Accum => "accum",
            Kernel::Rope => "rope",
            Kernel::SiluAndMul => "silu_and_mul",
            Kernel::TemperatureScale => "temperature_scale",
            Kernel::SquaresAndSum => "squares_and_sum",
            Kernel::Sum => "sum",
            Kernel::Max => "max",
            Kernel::ArgmaxSetIndex => "argmax_set_index",
            Kernel::Argmax => "argmax",
            Kernel::RmsnormScaleInPlace => "rmsnorm_scale_inplace",
            Kernel::RmsnormScaleOutOfPlace => "rmsnorm_scale_outofplace",
            Kernel::CopyIntoReduceStream => "copy_into_reduce_stream",
            Kernel::ExpAndSum => "exp_and_sum",
            Kernel::Normalize => "normalize",
            Kernel::GetQueryVector => "get_query_vector",
            Kernel::BuildAttMat => "build_att_mat",
            Kernel::GatherAttRows => "gather_att_rows",
            Kernel::ScatterAttRows => "scatter_att_rows",
        }
    }
}

struct CompiledKernel {
    program: glow::NativeProgram,
    uniforms: HashMap<&'static str, glow::NativeUniformLocation>,
}

/// Compiles and owns every compute program, keyed by `Kernel`.
///
/// A compile or link failure is fatal to catalog construction (see ยง7 of the
/// design notes: shader compile/link errors are a latent fault in a running
/// process, but at startup -- before any token has been emitted -- they abort
/// the run).
pub struct KernelCatalog {
    programs: HashMap<Kernel, CompiledKernel>,
}

impl KernelCatalog {
    pub fn compile(gl: &glow::Context) -> Result<Self> {
        let mut programs = HashMap::new();
        for &kernel in Kernel::ALL {
            let compiled = compile_one(gl, kernel)?;
            programs.insert(kernel, compiled);
        }
        Ok(KernelCatalog { programs })
    }

    pub fn program(&self, kernel: Kernel) -> glow::NativeProgram {
        self.programs
            .get(&kernel)
            .expect("all Kernel::ALL variants are compiled at construction")
            .program
    }

    pub fn uniform_location(&self, kernel: Kernel, name: &'static str) -> Option<glow::NativeUniformLocation> {
        self.programs.get(&kernel).and_then(|k| k.uniforms.get(name)).copied()
    }

    pub fn destroy(&self, gl: &glow::Context) {
        for compiled in self.programs.values() {
            unsafe { gl.delete_program(compiled.program) };
        }
    }
}

/// Scalar uniforms referenced by each kernel's shader source, looked up once
/// at link time.
fn uniform_names(kernel: Kernel) -> &'static [&'static str] {
    match kernel {
        Kernel::MatMul => &["d", "n", "x_off", "w_off"],
        Kernel::Accum => &["size"],
        Kernel::Rope => &["pos", "dim", "head_size"],
        Kernel::SiluAndMul => &[],
        Kernel::TemperatureScale => &["temperature"],
        Kernel::SquaresAndSum => &["size"],
        Kernel::Sum | Kernel::Max | Kernel::Argmax => &["insize", "shape0"],
        Kernel::ArgmaxSetIndex => &["size"],
        Kernel::RmsnormScaleInPlace | Kernel::RmsnormScaleOutOfPlace => &["size", "weight_off", "eps"],
        Kernel::CopyIntoReduceStream => &["size"],
        Kernel::ExpAndSum => &["n", "insize", "shape0"],
        Kernel::Normalize => &["n"],
        Kernel::GetQueryVector => &["pos", "head_size", "dim", "seq_len", "layer_kv_off"],
        Kernel::BuildAttMat => &["pos", "head_size", "seq_len", "n_heads", "layer_kv_off"],
        Kernel::GatherAttRows | Kernel::ScatterAttRows => &["pos", "seq_len", "n_heads"],
    }
}

fn compile_one(gl: &glow::Context, kernel: Kernel) -> Result<CompiledKernel> {
    unsafe {
        let shader = gl.create_shader(glow::COMPUTE_SHADER).map_err(TensorError::ShaderCompile)?;
        let source = format!("{}{}", HEADER, kernel.source());
        gl.shader_source(shader, &source);
        gl.compile_shader(shader);
        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            return Err(TensorError::ShaderCompile(format!("{}: {}", kernel.name(), log)));
        }

        let program = gl.create_program().map_err(TensorError::ShaderCompile)?;
        gl.attach_shader(program, shader);
        gl.link_program(program);
        gl.delete_shader(shader);
        if !gl.get_program_link_status(program) {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            return Err(TensorError::ShaderCompile(format!("{}: link: {}", kernel.name(), log)));
        }

        let mut uniforms = HashMap::new();
        for &name in uniform_names(kernel) {
            if let Some(loc) = gl.get_uniform_location(program, name) {
                uniforms.insert(name, loc);
            }
        }

        Ok(CompiledKernel { program, uniforms })
    }
}

const HEADER: &str = "#version 320 es\nlayout(local_size_x = 1, local_size_y = 1, local_size_z = 1) in;\nprecision highp float;\n";

const SRC_MATMUL: &str = r#"
layout(std430, binding = 0) readonly buffer X { float x[]; };
layout(std430, binding = 1) readonly buffer W { float w[]; };
layout(std430, binding = 2) writeonly buffer XOut { float xout[]; };
uniform int d;
uniform int n;
uniform int x_off;
uniform int w_off;
void main() {
    int i = int(gl_GlobalInvocationID.x);
    if (i >= d) return;
    float sum = 0.0;
    for (int j = 0; j < n; j++) {
        sum += w[w_off + i * n + j] * x[x_off + j];
    }
    xout[i] = sum;
}
"#;

const SRC_ACCUM: &str = r#"
layout(std430, binding = 0) buffer A { float a[]; };
layout(std430, binding = 1) readonly buffer B { float b[]; };
uniform int size;
void main() {
    int i = int(gl_GlobalInvocationID.x);
    if (i >= size) return;
    a[i] += b[i];
}
"#;

const SRC_ROPE: &str = r#"
layout(std430, binding = 0) readonly buffer FreqR { float freq_real[]; };
layout(std430, binding = 1) readonly buffer FreqI { float freq_imag[]; };
layout(std430, binding = 2) buffer Q { float q[]; };
layout(std430, binding = 3) buffer K { float k[]; };
uniform int pos;
uniform int dim;
uniform int head_size;
void main() {
    int i = int(gl_GlobalInvocationID.x);
    if (i >= dim / 2) return;
    int head_half = head_size / 2;
    int delta = pos * head_half;
    int fidx = delta + (i % head_half);
    float fcr = freq_real[fidx];
    float fci = freq_imag[fidx];
    float q0 = q[2 * i];
    float q1 = q[2 * i + 1];
    q[2 * i] = q0 * fcr - q1 * fci;
    q[2 * i + 1] = q0 * fci + q1 * fcr;
    float k0 = k[2 * i];
    float k1 = k[2 * i + 1];
    k[2 * i] = k0 * fcr - k1 * fci;
    k[2 * i + 1] = k0 * fci + k1 * fcr;
}
"#;

const SRC_SILU_AND_MUL: &str = r#"
layout(std430, binding = 0) buffer Hb { float hb[]; };
layout(std430, binding = 1) readonly buffer Hb2 { float hb2[]; };
void main() {
    int i = int(gl_GlobalInvocationID.x);
    float v = hb[i];
    float sigma = 1.0 / (1.0 + exp(-v));
    hb[i] = (v * sigma) * hb2[i];
}
"#;

const SRC_TEMPERATURE_SCALE: &str = r#"
layout(std430, binding = 0) buffer Logits { float logits[]; };
uniform float temperature;
void main() {
    int i = int(gl_GlobalInvocationID.x);
    logits[i] /= temperature;
}
"#;

const SRC_SQUARES_AND_SUM: &str = r#"
layout(std430, binding = 0) readonly buffer X { float x[]; };
layout(std430, binding = 1) writeonly buffer Out { float out_[]; };
uniform int size;
void main() {
    int idx = int(gl_GlobalInvocationID.x);
    int next = (size + 1) / 2;
    if (idx >= next) return;
    int i0 = 2 * idx;
    float v = x[i0] * x[i0];
    if (i0 + 1 < size) v += x[i0 + 1] * x[i0 + 1];
    out_[idx] = v;
}
"#;

const SRC_SUM: &str = r#"
layout(std430, binding = 0) readonly buffer A { float a[]; };
layout(std430, binding = 1) writeonly buffer B { float b[]; };
uniform int insize;
uniform int shape0;
void main() {
    int idx = int(gl_GlobalInvocationID.x);
    int idy = int(gl_GlobalInvocationID.y);
    if (idx >= shape0) return;
    int base = insize * idy;
    int i0 = 2 * idx;
    float v = a[base + i0];
    if (i0 + 1 < insize) v += a[base + i0 + 1];
    b[idy * shape0 + idx] = v;
}
"#;

const SRC_MAX: &str = r#"
layout(std430, binding = 0) readonly buffer A { float a[]; };
layout(std430, binding = 1) writeonly buffer B { float b[]; };
uniform int insize;
uniform int shape0;
void main() {
    int idx = int(gl_GlobalInvocationID.x);
    int idy = int(gl_GlobalInvocationID.y);
    if (idx >= shape0) return;
    int base = insize * idy;
    int i0 = 2 * idx;
    float v = a[base + i0];
    if (i0 + 1 < insize) v = max(v, a[base + i0 + 1]);
    b[idy * shape0 + idx] = v;
}
"#;

const SRC_ARGMAX_SET_INDEX: &str = r#"
layout(std430, binding = 0) writeonly buffer Idx { float idx_out[]; };
uniform int size;
void main() {
    int i = int(gl_GlobalInvocationID.x);
    if (i >= size) return;
    idx_out[i] = float(i);
}
"#;

// Carries {value, index} pairs through the tree together so the final
// single-element result's index is the argmax of the original input.
const SRC_ARGMAX: &str = r#"
layout(std430, binding = 0) readonly buffer AVal { float a_val[]; };
layout(std430, binding = 1) readonly buffer AIdx { float a_idx[]; };
layout(std430, binding = 2) writeonly buffer BVal { float b_val[]; };
layout(std430, binding = 3) writeonly buffer BIdx { float b_idx[]; };
uniform int insize;
uniform int shape0;
void main() {
    int idx = int(gl_GlobalInvocationID.x);
    if (idx >= shape0) return;
    int i0 = 2 * idx;
    float v = a_val[i0];
    float vi = a_idx[i0];
    if (i0 + 1 < insize && a_val[i0 + 1] > v) {
        v = a_val[i0 + 1];
        vi = a_idx[i0 + 1];
    }
    b_val[idx] = v;
    b_idx[idx] = vi;
}
"#;

const SRC_RMSNORM_SCALE_INPLACE: &str = r#"
layout(std430, binding = 0) buffer X { float x[]; };
layout(std430, binding = 1) readonly buffer SS { float ss[]; };
layout(std430, binding = 2) readonly buffer W { float weight[]; };
uniform int size;
uniform int weight_off;
uniform float eps;
void main() {
    int i = int(gl_GlobalInvocationID.x);
    if (i >= size) return;
    float scale = 1.0 / sqrt(ss[0] / float(size) + eps);
    x[i] = weight[weight_off + i] * (scale * x[i]);
}
"#;

const SRC_RMSNORM_SCALE_OUTOFPLACE: &str = r#"
layout(std430, binding = 0) readonly buffer X { float x[]; };
layout(std430, binding = 1) readonly buffer SS { float ss[]; };
layout(std430, binding = 2) readonly buffer W { float weight[]; };
layout(std430, binding = 3) writeonly buffer O { float o[]; };
uniform int size;
uniform int weight_off;
uniform float eps;
void main() {
    int i = int(gl_GlobalInvocationID.x);
    if (i >= size) return;
    float scale = 1.0 / sqrt(ss[0] / float(size) + eps);
    o[i] = weight[weight_off + i] * (scale * x[i]);
}
"#;

const SRC_COPY_INTO_REDUCE_STREAM: &str = r#"
layout(std430, binding = 0) readonly buffer X { float x[]; };
layout(std430, binding = 1) writeonly buffer Out { float out_[]; };
uniform int size;
void main() {
    int i = int(gl_GlobalInvocationID.x);
    if (i >= size) return;
    out_[i] = x[i];
}
"#;

const SRC_EXP_AND_SUM: &str = r#"
layout(std430, binding = 0) readonly buffer X { float x[]; };
layout(std430, binding = 1) readonly buffer RowMax { float row_max[]; };
layout(std430, binding = 2) writeonly buffer Out { float out_[]; };
uniform int n;
uniform int insize;
uniform int shape0;
void main() {
    int idx = int(gl_GlobalInvocationID.x);
    int idy = int(gl_GlobalInvocationID.y);
    if (idx >= shape0) return;
    int base = n * idy;
    int i0 = 2 * idx;
    float m = row_max[idy];
    float v = exp(x[base + i0] - m);
    if (i0 + 1 < insize) v += exp(x[base + i0 + 1] - m);
    out_[idy * shape0 + idx] = v;
}
"#;

const SRC_NORMALIZE: &str = r#"
layout(std430, binding = 0) buffer X { float x[]; };
layout(std430, binding = 1) readonly buffer RowSum { float row_sum[]; };
uniform int n;
void main() {
    int idx = int(gl_GlobalInvocationID.x);
    int idy = int(gl_GlobalInvocationID.y);
    x[idy * n + idx] /= row_sum[idy];
}
"#;

const SRC_GET_QUERY_VECTOR: &str = r#"
layout(std430, binding = 0) readonly buffer Q { float q[]; };
layout(std430, binding = 1) readonly buffer K { float key_cache[]; };
layout(std430, binding = 2) writeonly buffer Att { float att[]; };
uniform int pos;
uniform int head_size;
uniform int dim;
uniform int seq_len;
uniform int layer_kv_off;
void main() {
    int h = int(gl_GlobalInvocationID.x);
    int t = int(gl_GlobalInvocationID.y);
    if (t > pos) return;
    int q_off = h * head_size;
    int k_off = layer_kv_off + t * dim + h * head_size;
    float dot = 0.0;
    for (int i = 0; i < head_size; i++) {
        dot += q[q_off + i] * key_cache[k_off + i];
    }
    att[h * seq_len + t] = dot / sqrt(float(head_size));
}
"#;

const SRC_BUILD_ATT_MAT: &str = r#"
layout(std430, binding = 0) readonly buffer Att { float att[]; };
layout(std430, binding = 1) readonly buffer V { float value_cache[]; };
layout(std430, binding = 2) writeonly buffer M { float m[]; };
uniform int pos;
uniform int head_size;
uniform int seq_len;
uniform int n_heads;
uniform int layer_kv_off;
void main() {
    int h = int(gl_GlobalInvocationID.x);
    int i = int(gl_GlobalInvocationID.y);
    int t = int(gl_GlobalInvocationID.z);
    if (t > pos) return;
    int dim = head_size * n_heads;
    int v_off = layer_kv_off + t * dim + h * head_size + i;
    int row = h * head_size + i;
    m[row * (pos + 1) + t] = att[h * seq_len + t] * value_cache[v_off];
}
"#;

const SRC_GATHER_ATT_ROWS: &str = r#"
layout(std430, binding = 0) readonly buffer Att { float att[]; };
layout(std430, binding = 1) writeonly buffer Tile { float tile[]; };
uniform int pos;
uniform int seq_len;
uniform int n_heads;
void main() {
    int h = int(gl_GlobalInvocationID.x);
    int t = int(gl_GlobalInvocationID.y);
    if (h >= n_heads || t > pos) return;
    tile[h * (pos + 1) + t] = att[h * seq_len + t];
}
"#;

const SRC_SCATTER_ATT_ROWS: &str = r#"
layout(std430, binding = 0) readonly buffer Tile { float tile[]; };
layout(std430, binding = 1) buffer Att { float att[]; };
uniform int pos;
uniform int seq_len;
uniform int n_heads;
void main() {
    int h = int(gl_GlobalInvocationID.x);
    int t = int(gl_GlobalInvocationID.y);
    if (h >= n_heads || t > pos) return;
    att[h * seq_len + t] = tile[h * (pos + 1) + t];
}
"#;
