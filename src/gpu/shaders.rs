/// WGSL compute kernels for the development pipeline
///
/// Every module is `COMMON` plus one stage body. `COMMON` declares the
/// `Uniforms` and `StageParams` structs, which must match
/// `state::uniforms::Uniforms` and `gpu::pipeline::StageParams` byte for byte.
///
/// Stages, in pipeline order:
/// 1. `INGEST_SHADER` - Rgba16Uint RAW to Rgba16Float working copy, optionally Lanczos-3 downscaled
/// 2. `ROTATE_SHADER` - quarter-turn remap or arbitrary-angle bilinear resample
/// 3. `GRAIN_SHADER` - film grain field, regenerated only when its parameters change
/// 4. `DEVELOP_SHADER` - tone, color, HSL, local contrast, denoise, sharpen, vignette, grain
/// 5. `HISTOGRAM_SHADER` / `RAW_HISTOGRAM_SHADER` - atomic bin accumulation

pub const COMMON: &str = r#"
const PI: f32 = 3.14159265;

struct Uniforms {
    exposure: f32,
    contrast: f32,
    highlights: f32,
    shadows: f32,
    whites: f32,
    blacks: f32,
    saturation: f32,
    vibrance: f32,
    hue_offset: f32,
    temperature: f32,
    tint: f32,
    vignette_strength: f32,
    vignette_feather: f32,
    vignette_size: f32,
    grain_amount: f32,
    grain_size: f32,
    clarity: f32,
    denoise_luma: f32,
    denoise_chroma: f32,
    sharpen_intensity: f32,
    base_exposure: f32,
    contrast_pivot: f32,
    blacks_scale: f32,
    whites_scale: f32,
    hsl_enabled: i32,
    // 12 bytes of implicit padding: the array aligns to 16
    hsl_adjustments: array<vec4<f32>, 15>,
    padding: vec3<f32>,
}

struct StageParams {
    src_size: vec2<u32>,
    dst_size: vec2<u32>,
    scale: vec2<f32>,
    quarter_turns: u32,
    angle: f32,
    grain_size: f32,
    grain_seed: u32,
    pad: vec2<u32>,
}

fn luma(c: vec3<f32>) -> f32 {
    return dot(c, vec3<f32>(0.2126, 0.7152, 0.0722));
}
"#;

pub const INGEST_SHADER: &str = r#"
@group(0) @binding(0) var raw_tex: texture_2d<u32>;
@group(0) @binding(1) var dst_tex: texture_storage_2d<rgba16float, write>;
@group(0) @binding(2) var<uniform> params: StageParams;

const MAX_TAPS: i32 = 12;

fn load_raw(p: vec2<i32>) -> vec4<f32> {
    let max_p = vec2<i32>(params.src_size) - vec2<i32>(1);
    let v = textureLoad(raw_tex, clamp(p, vec2<i32>(0), max_p), 0);
    return vec4<f32>(v) / 65535.0;
}

fn sinc(x: f32) -> f32 {
    if (abs(x) < 1e-5) {
        return 1.0;
    }
    let px = PI * x;
    return sin(px) / px;
}

fn lanczos3(x: f32) -> f32 {
    if (abs(x) >= 3.0) {
        return 0.0;
    }
    return sinc(x) * sinc(x / 3.0);
}

@compute @workgroup_size(16, 16, 1)
fn copy_main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= params.dst_size.x || gid.y >= params.dst_size.y) {
        return;
    }
    textureStore(dst_tex, vec2<i32>(gid.xy), load_raw(vec2<i32>(gid.xy)));
}

// Lanczos-3 with the kernel stretched by the downscale factor
@compute @workgroup_size(16, 16, 1)
fn lanczos_main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= params.dst_size.x || gid.y >= params.dst_size.y) {
        return;
    }
    let scale = max(params.scale, vec2<f32>(1.0));
    let center = (vec2<f32>(gid.xy) + 0.5) * scale - 0.5;
    let radius = min(vec2<i32>(ceil(3.0 * scale)), vec2<i32>(MAX_TAPS));
    let base = vec2<i32>(floor(center));

    var sum = vec4<f32>(0.0);
    var weight_sum = 0.0;
    for (var dy = -radius.y; dy <= radius.y; dy = dy + 1) {
        let sy = base.y + dy;
        let wy = lanczos3((f32(sy) - center.y) / scale.y);
        if (wy == 0.0) {
            continue;
        }
        for (var dx = -radius.x; dx <= radius.x; dx = dx + 1) {
            let sx = base.x + dx;
            let w = lanczos3((f32(sx) - center.x) / scale.x) * wy;
            sum += load_raw(vec2<i32>(sx, sy)) * w;
            weight_sum += w;
        }
    }

    // Negative lobes can ring below zero
    var c = max(sum / max(weight_sum, 1e-6), vec4<f32>(0.0));
    c.a = 1.0;
    textureStore(dst_tex, vec2<i32>(gid.xy), c);
}
"#;

pub const ROTATE_SHADER: &str = r#"
@group(0) @binding(0) var src_tex: texture_2d<f32>;
@group(0) @binding(1) var dst_tex: texture_storage_2d<rgba16float, write>;
@group(0) @binding(2) var<uniform> params: StageParams;

fn load_src(p: vec2<i32>) -> vec4<f32> {
    let max_p = vec2<i32>(params.src_size) - vec2<i32>(1);
    return textureLoad(src_tex, clamp(p, vec2<i32>(0), max_p), 0);
}

@compute @workgroup_size(16, 16, 1)
fn quarter_main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= params.dst_size.x || gid.y >= params.dst_size.y) {
        return;
    }
    let w = i32(params.src_size.x);
    let h = i32(params.src_size.y);
    let x = i32(gid.x);
    let y = i32(gid.y);

    var s: vec2<i32>;
    switch (params.quarter_turns % 4u) {
        case 1u: { s = vec2<i32>(y, h - 1 - x); }
        case 2u: { s = vec2<i32>(w - 1 - x, h - 1 - y); }
        case 3u: { s = vec2<i32>(w - 1 - y, x); }
        default: { s = vec2<i32>(x, y); }
    }
    textureStore(dst_tex, vec2<i32>(gid.xy), load_src(s));
}

// Clockwise rotation, output already cropped to the inscribed rectangle
@compute @workgroup_size(16, 16, 1)
fn arbitrary_main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= params.dst_size.x || gid.y >= params.dst_size.y) {
        return;
    }
    let theta = radians(params.angle);
    let c = cos(theta);
    let s = sin(theta);
    let src_center = vec2<f32>(params.src_size) * 0.5;
    let dst_center = vec2<f32>(params.dst_size) * 0.5;

    let u = f32(gid.x) + 0.5 - dst_center.x;
    let v = f32(gid.y) + 0.5 - dst_center.y;
    let max_p = vec2<f32>(params.src_size) - vec2<f32>(1.0);
    let sp = clamp(
        vec2<f32>(u * c + v * s, -u * s + v * c) + src_center - vec2<f32>(0.5),
        vec2<f32>(0.0),
        max_p,
    );

    let p0 = vec2<i32>(floor(sp));
    let f = sp - floor(sp);
    let top = mix(load_src(p0), load_src(p0 + vec2<i32>(1, 0)), f.x);
    let bottom = mix(load_src(p0 + vec2<i32>(0, 1)), load_src(p0 + vec2<i32>(1, 1)), f.x);
    textureStore(dst_tex, vec2<i32>(gid.xy), mix(top, bottom, f.y));
}
"#;

pub const GRAIN_SHADER: &str = r#"
@group(0) @binding(0) var grain_tex: texture_storage_2d<r32float, write>;
@group(0) @binding(1) var<uniform> params: StageParams;

fn hash(p: vec2<u32>, seed: u32) -> f32 {
    var h = p.x * 374761393u + p.y * 668265263u + seed * 2246822519u;
    h = (h ^ (h >> 13u)) * 1274126177u;
    h = h ^ (h >> 16u);
    return f32(h) / 4294967295.0;
}

fn value_noise(p: vec2<f32>, seed: u32) -> f32 {
    let i = floor(p);
    let f = fract(p);
    let t = f * f * (3.0 - 2.0 * f);
    let ip = vec2<u32>(vec2<i32>(i) + vec2<i32>(65536));
    let a = hash(ip, seed);
    let b = hash(ip + vec2<u32>(1u, 0u), seed);
    let c = hash(ip + vec2<u32>(0u, 1u), seed);
    let d = hash(ip + vec2<u32>(1u, 1u), seed);
    return mix(mix(a, b, t.x), mix(c, d, t.x), t.y);
}

@compute @workgroup_size(16, 16, 1)
fn grain_main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= params.dst_size.x || gid.y >= params.dst_size.y) {
        return;
    }
    let p = (vec2<f32>(gid.xy) + 0.5) / max(params.grain_size, 0.25);
    let n = value_noise(p, params.grain_seed) * 0.6
        + value_noise(p * 2.13 + vec2<f32>(17.0), params.grain_seed + 1u) * 0.4;
    textureStore(grain_tex, vec2<i32>(gid.xy), vec4<f32>(n * 2.0 - 1.0, 0.0, 0.0, 1.0));
}
"#;

pub const DEVELOP_SHADER: &str = r#"
@group(0) @binding(0) var src_tex: texture_2d<f32>;
@group(0) @binding(1) var dst_tex: texture_storage_2d<rgba16float, write>;
@group(0) @binding(2) var<uniform> adj: Uniforms;
@group(0) @binding(3) var grain_tex: texture_2d<f32>;
@group(0) @binding(4) var<uniform> params: StageParams;

fn load_px(p: vec2<i32>) -> vec3<f32> {
    let max_p = vec2<i32>(params.src_size) - vec2<i32>(1);
    return textureLoad(src_tex, clamp(p, vec2<i32>(0), max_p), 0).rgb;
}

fn box3(p: vec2<i32>) -> vec3<f32> {
    var sum = vec3<f32>(0.0);
    for (var dy = -1; dy <= 1; dy = dy + 1) {
        for (var dx = -1; dx <= 1; dx = dx + 1) {
            sum += load_px(p + vec2<i32>(dx, dy));
        }
    }
    return sum / 9.0;
}

// Sparse 5x5 taps three pixels apart for mid-frequency detail
fn wide_blur(p: vec2<i32>) -> vec3<f32> {
    var sum = vec3<f32>(0.0);
    for (var dy = -2; dy <= 2; dy = dy + 1) {
        for (var dx = -2; dx <= 2; dx = dx + 1) {
            sum += load_px(p + vec2<i32>(dx, dy) * 3);
        }
    }
    return sum / 25.0;
}

fn srgb_encode(c: vec3<f32>) -> vec3<f32> {
    let lo = c * 12.92;
    let hi = 1.055 * pow(max(c, vec3<f32>(0.0)), vec3<f32>(1.0 / 2.4)) - 0.055;
    return select(hi, lo, c <= vec3<f32>(0.0031308));
}

fn rgb_to_hsl(c: vec3<f32>) -> vec3<f32> {
    let mx = max(c.r, max(c.g, c.b));
    let mn = min(c.r, min(c.g, c.b));
    let l = (mx + mn) * 0.5;
    let d = mx - mn;
    if (d < 1e-6) {
        return vec3<f32>(0.0, 0.0, l);
    }
    let s = d / (1.0 - abs(2.0 * l - 1.0) + 1e-6);
    var h: f32;
    if (mx == c.r) {
        h = (c.g - c.b) / d;
        if (h < 0.0) {
            h += 6.0;
        }
    } else if (mx == c.g) {
        h = (c.b - c.r) / d + 2.0;
    } else {
        h = (c.r - c.g) / d + 4.0;
    }
    return vec3<f32>(h * 60.0, clamp(s, 0.0, 1.0), l);
}

fn hsl_to_rgb(hsl: vec3<f32>) -> vec3<f32> {
    let c = (1.0 - abs(2.0 * hsl.z - 1.0)) * hsl.y;
    let hp = hsl.x / 60.0;
    let x = c * (1.0 - abs(hp % 2.0 - 1.0));
    var rgb: vec3<f32>;
    if (hp < 1.0) {
        rgb = vec3<f32>(c, x, 0.0);
    } else if (hp < 2.0) {
        rgb = vec3<f32>(x, c, 0.0);
    } else if (hp < 3.0) {
        rgb = vec3<f32>(0.0, c, x);
    } else if (hp < 4.0) {
        rgb = vec3<f32>(0.0, x, c);
    } else if (hp < 5.0) {
        rgb = vec3<f32>(x, 0.0, c);
    } else {
        rgb = vec3<f32>(c, 0.0, x);
    }
    return rgb + vec3<f32>(hsl.z - c * 0.5);
}

@compute @workgroup_size(16, 16, 1)
fn develop_main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= params.dst_size.x || gid.y >= params.dst_size.y) {
        return;
    }
    let p = vec2<i32>(gid.xy);
    var c = load_px(p);

    // ---- Denoise and sharpen (3x3) ----
    if (adj.denoise_luma > 0.0 || adj.denoise_chroma > 0.0 || adj.sharpen_intensity > 0.0) {
        let b = box3(p);
        let lc = luma(c);
        let lb = luma(b);
        let l = mix(lc, lb, adj.denoise_luma);
        let chroma = mix(c - vec3<f32>(lc), b - vec3<f32>(lb), adj.denoise_chroma);
        c = vec3<f32>(l) + chroma;
        c = max(c + (c - b) * adj.sharpen_intensity, vec3<f32>(0.0));
    }

    // ---- Clarity, weighted toward midtones ----
    if (adj.clarity != 0.0) {
        let lc = luma(c);
        let detail = lc - luma(wide_blur(p));
        let mid = 1.0 - abs(2.0 * clamp(lc / (lc + adj.contrast_pivot), 0.0, 1.0) - 1.0);
        c = max(c + vec3<f32>(detail * adj.clarity * mid), vec3<f32>(0.0));
    }

    // ---- White balance offsets ----
    c = c * vec3<f32>(
        1.0 + 0.2 * adj.temperature,
        1.0 - 0.2 * adj.tint,
        1.0 - 0.2 * adj.temperature,
    );

    // ---- Exposure ----
    c = c * exp2(adj.exposure + adj.base_exposure);

    // ---- Tone in log space around the pivot ----
    let pivot = adj.contrast_pivot;
    let l0 = max(luma(c), 1e-6);
    var ev = log2(l0 / pivot);
    let highlight_mask = smoothstep(0.0, 3.0, ev);
    let shadow_mask = 1.0 - smoothstep(-5.0, 0.0, ev);
    ev = ev + adj.highlights * highlight_mask * 1.5 + adj.shadows * shadow_mask * 1.5;
    ev = ev * exp2(adj.contrast);
    c = c * (pivot * exp2(ev) / l0);

    // ---- Black point ----
    let bp = -adj.blacks * adj.blacks_scale * pivot;
    c = max(c - vec3<f32>(bp), vec3<f32>(0.0)) / (1.0 - bp);

    // ---- Extended Reinhard on luminance, white point from `whites` ----
    let white = 4.0 * exp2(-2.0 * adj.whites * adj.whites_scale);
    let l1 = max(luma(c), 1e-6);
    let lt = l1 * (1.0 + l1 / (white * white)) / (1.0 + l1);
    c = clamp(c * (lt / l1), vec3<f32>(0.0), vec3<f32>(1.0));

    // ---- Display encoding ----
    c = srgb_encode(c);

    // ---- Saturation and vibrance ----
    let ld = luma(c);
    let chroma_range = max(c.r, max(c.g, c.b)) - min(c.r, min(c.g, c.b));
    c = mix(vec3<f32>(ld), c, 1.0 + adj.saturation);
    c = mix(vec3<f32>(ld), c, 1.0 + adj.vibrance * (1.0 - chroma_range));
    c = clamp(c, vec3<f32>(0.0), vec3<f32>(1.0));

    // ---- Hue offset and per-band HSL ----
    if (adj.hsl_enabled != 0 || adj.hue_offset != 0.0) {
        var hsl = rgb_to_hsl(c);
        if (adj.hsl_enabled != 0) {
            var shift = 0.0;
            var sat_scale = 0.0;
            var lum_shift = 0.0;
            for (var i = 0u; i < 15u; i = i + 1u) {
                var d = abs(hsl.x - f32(i) * 24.0);
                d = min(d, 360.0 - d);
                let w = max(0.0, 1.0 - d / 24.0);
                let a = adj.hsl_adjustments[i];
                shift += a.x * w;
                sat_scale += a.y * w;
                lum_shift += a.z * w;
            }
            hsl.x = hsl.x + shift * 30.0;
            hsl.y = clamp(hsl.y * (1.0 + sat_scale), 0.0, 1.0);
            // Grays have no hue, so luminance shifts fade with saturation
            hsl.z = clamp(hsl.z + lum_shift * 0.25 * hsl.y, 0.0, 1.0);
        }
        hsl.x = hsl.x + adj.hue_offset;
        hsl.x = hsl.x - 360.0 * floor(hsl.x / 360.0);
        c = hsl_to_rgb(hsl);
    }

    // ---- Vignette ----
    if (adj.vignette_strength != 0.0) {
        let dims = vec2<f32>(params.dst_size);
        let aspect = dims.x / max(dims.y, 1.0);
        let uv = (vec2<f32>(gid.xy) + 0.5) / dims - vec2<f32>(0.5);
        let d = length(uv * vec2<f32>(aspect, 1.0)) / length(vec2<f32>(aspect, 1.0) * 0.5);
        let edge0 = adj.vignette_size * (1.0 - adj.vignette_feather);
        let edge1 = adj.vignette_size + (1.0 - adj.vignette_size) * adj.vignette_feather + 0.001;
        c = c * (1.0 - adj.vignette_strength * smoothstep(edge0, edge1, d));
    }

    // ---- Grain ----
    if (adj.grain_amount > 0.0) {
        let g = textureLoad(grain_tex, p, 0).r;
        let lg = luma(c);
        c = c + vec3<f32>(g * adj.grain_amount * (1.0 - abs(2.0 * lg - 1.0) * 0.5));
    }

    textureStore(dst_tex, p, vec4<f32>(clamp(c, vec3<f32>(0.0), vec3<f32>(1.0)), 1.0));
}
"#;

pub const HISTOGRAM_SHADER: &str = r#"
@group(0) @binding(0) var src_tex: texture_2d<f32>;
@group(0) @binding(1) var<storage, read_write> bins: array<atomic<u32>, 1024>;

fn bin_of(v: f32) -> u32 {
    return min(u32(clamp(v, 0.0, 1.0) * 256.0), 255u);
}

// R, G, B, luma: 256 bins each
@compute @workgroup_size(16, 16, 1)
fn processed_main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let size = textureDimensions(src_tex);
    if (gid.x >= size.x || gid.y >= size.y) {
        return;
    }
    let c = textureLoad(src_tex, vec2<i32>(gid.xy), 0).rgb;
    atomicAdd(&bins[bin_of(c.r)], 1u);
    atomicAdd(&bins[256u + bin_of(c.g)], 1u);
    atomicAdd(&bins[512u + bin_of(c.b)], 1u);
    atomicAdd(&bins[768u + bin_of(luma(c))], 1u);
}
"#;

pub const RAW_HISTOGRAM_SHADER: &str = r#"
@group(0) @binding(0) var raw_tex: texture_2d<u32>;
@group(0) @binding(1) var<storage, read_write> raw_bins: array<atomic<u32>, 256>;

const EV_MIN: f32 = -12.0;
const EV_MAX: f32 = 0.0;

// Linear luma binned by stops
@compute @workgroup_size(16, 16, 1)
fn raw_main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let size = textureDimensions(raw_tex);
    if (gid.x >= size.x || gid.y >= size.y) {
        return;
    }
    let c = vec3<f32>(textureLoad(raw_tex, vec2<i32>(gid.xy), 0).rgb) / 65535.0;
    let l = luma(c);
    var bin = 0u;
    if (l > 0.0) {
        let t = (log2(l) - EV_MIN) / (EV_MAX - EV_MIN);
        bin = min(u32(max(t, 0.0) * 256.0), 255u);
    }
    atomicAdd(&raw_bins[bin], 1u);
}
"#;

/// Full module source for one stage
pub fn stage_source(body: &str) -> String {
    format!("{COMMON}\n{body}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_struct_lists_every_field() {
        use crate::state::uniforms::Field;
        for field in Field::SCALARS {
            let decl = format!("    {}: f32,", field.key());
            assert!(COMMON.contains(&decl), "WGSL Uniforms is missing {}", field.key());
        }
        assert!(COMMON.contains("hsl_adjustments: array<vec4<f32>, 15>"));
    }

    #[test]
    fn test_stage_source_includes_common() {
        let src = stage_source(DEVELOP_SHADER);
        assert!(src.contains("struct Uniforms"));
        assert!(src.contains("fn develop_main"));
    }
}
