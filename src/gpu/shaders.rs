//! WGSL sources for every pass.
//!
//! Kernel shaders share [`COMMON`] (constants, the uniform and agent layouts,
//! the PCG hash) and, where they index the field grid, [`GRID`]. The struct
//! layouts here must match [`StepParams`](crate::kernels::StepParams),
//! [`DofParams`](crate::kernels::dof::DofParams) and
//! [`Agent`](crate::agents::Agent) byte for byte.

/// Constants, `SimParams`, `Agent` and the hash RNG.
pub const COMMON: &str = r#"
const TAU: f32 = 6.283185307;
const PI: f32 = 3.141592654;
const HALF_PI: f32 = 1.570796327;
const UNPAIRED: u32 = 0xffffffffu;

struct SimParams {
    width: u32,
    height: u32,
    depth: u32,
    agent_count: u32,
    sense_spread: f32,
    sense_distance: f32,
    turn_angle: f32,
    move_distance: f32,
    deposit_value: f32,
    decay_factor: f32,
    diffusion: f32,
    center_attraction: f32,
    sense_coupling: f32,
    move_coupling: f32,
    jitter: f32,
    collision: u32,
    occupancy_threshold: u32,
    frame_seed: u32,
    three_d: u32,
    break_distance: f32,
};

struct Agent {
    position: vec3<f32>,
    theta: f32,
    phi: f32,
    info: f32,
    partner: u32,
    _pad: u32,
};

fn pcg_hash(input: u32) -> u32 {
    let state = input * 747796405u + 2891336453u;
    let word = ((state >> ((state >> 28u) + 4u)) ^ state) * 277803737u;
    return (word >> 22u) ^ word;
}

fn seed_rng(index: u32, frame_seed: u32) -> u32 {
    return pcg_hash(index ^ pcg_hash(frame_seed));
}

fn next_rand(state: ptr<function, u32>) -> f32 {
    *state = pcg_hash(*state);
    return f32(*state) / 4294967295.0;
}
"#;

/// Grid helpers. Expects a `params: SimParams` binding.
pub const GRID: &str = r#"
fn world_extent() -> vec3<f32> {
    return vec3<f32>(f32(params.width), f32(params.height), f32(params.depth));
}

fn in_world(p: vec3<f32>) -> bool {
    return all(p >= vec3<f32>(0.0)) && all(p < world_extent());
}

fn cell_index(p: vec3<f32>) -> u32 {
    let max_cell = world_extent() - vec3<f32>(1.0);
    let c = vec3<u32>(clamp(floor(p), vec3<f32>(0.0), max_cell));
    return c.x + c.y * params.width + c.z * params.width * params.height;
}

fn world_center() -> vec3<f32> {
    let c = world_extent() * 0.5;
    if (params.three_d != 0u) {
        return c;
    }
    return vec3<f32>(c.xy, 0.0);
}

fn world_radius() -> f32 {
    var e = world_extent();
    if (params.three_d == 0u) {
        e.z = 0.0;
    }
    return max(length(e) * 0.5, 1.0);
}
"#;

const AGENT_UPDATE_BODY: &str = r#"
@group(0) @binding(0) var<uniform> params: SimParams;
@group(0) @binding(1) var<storage, read_write> agents: array<Agent>;
@group(0) @binding(2) var<storage, read> field: array<f32>;
@group(0) @binding(3) var<storage, read_write> occupancy: array<atomic<u32>>;
@group(0) @binding(4) var<storage, read_write> deposits: array<atomic<u32>>;
@group(0) @binding(5) var<storage, read_write> claims: array<atomic<u32>>;

// Deposits are f32 stored as raw bits, added by compare-and-swap.
fn deposit_trail(cell: u32, amount: f32) {
    var current = atomicLoad(&deposits[cell]);
    loop {
        let next = bitcast<u32>(bitcast<f32>(current) + amount);
        let result = atomicCompareExchangeWeak(&deposits[cell], current, next);
        if (result.exchanged) {
            break;
        }
        current = result.old_value;
    }
}

fn sample_field(p: vec3<f32>) -> f32 {
    if (!in_world(p)) {
        return 0.0;
    }
    return field[cell_index(p)];
}

fn wrap_angle(theta: f32) -> f32 {
    let t = theta - floor(theta / TAU) * TAU;
    return select(t, 0.0, t >= TAU);
}

fn coupling(strength: f32, local: f32) -> f32 {
    return max(1.0 + strength * local / (1.0 + local), 0.0);
}

// Trail strength penalized by distance from the world center.
fn score(p: vec3<f32>) -> f32 {
    return sample_field(p) - params.center_attraction * distance(p, world_center()) / world_radius();
}

fn unit_direction(theta: f32, phi: f32) -> vec3<f32> {
    return vec3<f32>(sin(phi) * cos(theta), sin(phi) * sin(theta), cos(phi));
}

fn heading(theta: f32, phi: f32) -> vec3<f32> {
    if (params.three_d != 0u) {
        return unit_direction(theta, phi);
    }
    return vec3<f32>(cos(theta), sin(theta), 0.0);
}

fn angles_of(d: vec3<f32>) -> vec2<f32> {
    return vec2<f32>(wrap_angle(atan2(d.y, d.x)), acos(clamp(d.z, -1.0, 1.0)));
}

fn steer_flat(agent: ptr<function, Agent>, pos: vec3<f32>, sd: f32, rng: ptr<function, u32>) {
    let half_spread = params.sense_spread * 0.5;
    let turn = params.turn_angle;
    let theta0 = (*agent).theta;
    let choice = next_rand(rng);

    let f = score(pos + vec3<f32>(cos(theta0), sin(theta0), 0.0) * sd);
    let l = score(pos + vec3<f32>(cos(theta0 + half_spread), sin(theta0 + half_spread), 0.0) * sd);
    let r = score(pos + vec3<f32>(cos(theta0 - half_spread), sin(theta0 - half_spread), 0.0) * sd);

    var theta = theta0;
    if (f < l && f < r) {
        theta += select(-turn, turn, choice < 0.5);
    } else if (!(f > l && f > r)) {
        if (l > r) {
            theta += turn;
        } else if (r > l) {
            theta -= turn;
        }
    }
    theta += (next_rand(rng) * 2.0 - 1.0) * params.jitter * turn;
    (*agent).theta = wrap_angle(theta);
}

fn steer_volume(agent: ptr<function, Agent>, pos: vec3<f32>, sd: f32, rng: ptr<function, u32>) {
    let half_spread = params.sense_spread * 0.5;
    let turn = params.turn_angle;
    let choice = next_rand(rng);

    let d = unit_direction((*agent).theta, (*agent).phi);
    var helper = vec3<f32>(0.0, 0.0, 1.0);
    if (abs(d.z) >= 0.9) {
        helper = vec3<f32>(1.0, 0.0, 0.0);
    }
    let u = normalize(cross(d, helper));
    let v = cross(d, u);
    let forward = score(pos + d * sd);

    var sides: array<vec3<f32>, 4>;
    var scores: array<f32, 4>;
    var best = 0u;
    var beats_all = true;
    var loses_all = true;
    for (var k = 0u; k < 4u; k++) {
        let a = f32(k) * HALF_PI;
        sides[k] = u * cos(a) + v * sin(a);
        let probe = d * cos(half_spread) + sides[k] * sin(half_spread);
        scores[k] = score(pos + probe * sd);
        if (scores[k] > scores[best]) {
            best = k;
        }
        beats_all = beats_all && forward > scores[k];
        loses_all = loses_all && forward < scores[k];
    }

    var dir = d;
    if (!beats_all) {
        var pick = best;
        if (loses_all) {
            pick = min(u32(choice * 4.0), 3u);
        }
        dir = normalize(d * cos(turn) + sides[pick] * sin(turn));
    }

    let angles = angles_of(dir);
    var theta = angles.x + (next_rand(rng) * 2.0 - 1.0) * params.jitter * turn;
    var phi = angles.y + (next_rand(rng) * 2.0 - 1.0) * params.jitter * turn;
    if (phi < 0.0) {
        phi = -phi;
        theta += PI;
    } else if (phi > PI) {
        phi = TAU - phi;
        theta += PI;
    }
    (*agent).theta = wrap_angle(theta);
    (*agent).phi = clamp(phi, 0.0, PI);
}

@compute @workgroup_size(256)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let index = gid.x;
    if (index >= params.agent_count) {
        return;
    }

    var agent = agents[index];
    var rng = seed_rng(index, params.frame_seed);
    let pos = agent.position;
    let local = sample_field(pos);
    let sd = params.sense_distance * coupling(params.sense_coupling, local);

    if (params.three_d != 0u) {
        steer_volume(&agent, pos, sd, &rng);
    } else {
        steer_flat(&agent, pos, sd, &rng);
    }

    // Move and reflect off the walls.
    let travel = params.move_distance * coupling(params.move_coupling, local);
    var dir = heading(agent.theta, agent.phi);
    var next = pos + dir * travel;
    let e = world_extent();
    let axes = select(2u, 3u, params.three_d != 0u);
    var reflected = false;
    for (var a = 0u; a < axes; a++) {
        if (next[a] < 0.0) {
            next[a] = -next[a];
            dir[a] = -dir[a];
            reflected = true;
        } else if (next[a] >= e[a]) {
            next[a] = 2.0 * e[a] - next[a];
            dir[a] = -dir[a];
            reflected = true;
        }
        next[a] = clamp(next[a], 0.0, e[a] - 0.001);
    }
    if (params.three_d == 0u) {
        next.z = 0.0;
    }
    if (reflected) {
        let angles = angles_of(dir);
        agent.theta = angles.x;
        if (params.three_d != 0u) {
            agent.phi = angles.y;
        }
    }

    let cell = cell_index(next);
    let prev = atomicAdd(&occupancy[cell], 1u);
    if (params.collision != 0u && prev >= params.occupancy_threshold) {
        atomicSub(&occupancy[cell], 1u);
        agent.theta = wrap_angle(next_rand(&rng) * TAU);
        if (params.three_d != 0u) {
            agent.phi = acos(clamp(1.0 - 2.0 * next_rand(&rng), -1.0, 1.0));
        }
        agents[index] = agent;
        return;
    }

    agent.position = next;
    deposit_trail(cell, params.deposit_value);
    atomicMax(&claims[cell], index + 1u);
    agents[index] = agent;
}
"#;

const PAIR_BODY: &str = r#"
@group(0) @binding(0) var<uniform> params: SimParams;
@group(0) @binding(1) var<storage, read_write> agents: array<Agent>;
@group(0) @binding(2) var<storage, read> claims: array<u32>;

@compute @workgroup_size(256)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let index = gid.x;
    if (index >= params.agent_count) {
        return;
    }

    let pos = agents[index].position;
    var partner = agents[index].partner;
    if (partner != UNPAIRED) {
        if (partner >= params.agent_count || partner == index
            || distance(agents[partner].position, pos) > params.break_distance) {
            partner = UNPAIRED;
        }
    }
    if (partner == UNPAIRED) {
        let claimant = claims[cell_index(pos)];
        if (claimant != 0u && claimant - 1u != index) {
            partner = claimant - 1u;
        }
    }
    agents[index].partner = partner;
}
"#;

const DIFFUSE_BODY: &str = r#"
@group(0) @binding(0) var<uniform> params: SimParams;
@group(0) @binding(1) var<storage, read> src: array<f32>;
@group(0) @binding(2) var<storage, read> deposits: array<u32>;
@group(0) @binding(3) var<storage, read_write> dst: array<f32>;

fn source_value(i: u32) -> f32 {
    return src[i] + bitcast<f32>(deposits[i]);
}

@compute @workgroup_size(256)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let total = params.width * params.height * params.depth;
    let index = gid.x;
    if (index >= total) {
        return;
    }

    let w = i32(params.width);
    let h = i32(params.height);
    let d = i32(params.depth);
    let plane = w * h;
    let cx = i32(index) % w;
    let cy = (i32(index) % plane) / w;
    let cz = i32(index) / plane;
    let zr = select(0i, 1i, d > 1);

    var sum = 0.0;
    var weight_sum = 0.0;
    for (var dz = -zr; dz <= zr; dz++) {
        for (var dy = -1; dy <= 1; dy++) {
            for (var dx = -1; dx <= 1; dx++) {
                let x = cx + dx;
                let y = cy + dy;
                let z = cz + dz;
                if (x < 0 || y < 0 || z < 0 || x >= w || y >= h || z >= d) {
                    continue;
                }
                let wt = select(params.diffusion, 1.0, dx == 0 && dy == 0 && dz == 0);
                sum += wt * source_value(u32(x + y * w + z * plane));
                weight_sum += wt;
            }
        }
    }

    dst[index] = sum / weight_sum * params.decay_factor;
}
"#;

/// Palette lookup shared by the render shaders. Expects a `palette` array.
const PALETTE_FN: &str = r#"
fn palette_color(t: f32) -> vec3<f32> {
    let x = clamp(t, 0.0, 1.0) * 4.0;
    let i = min(u32(floor(x)), 3u);
    return mix(palette_entry(i), palette_entry(i + 1u), x - f32(i));
}
"#;

const SLICE_BODY: &str = r#"
struct SliceParams {
    view_proj: mat4x4<f32>,
    model: mat4x4<f32>,
    palette: array<vec4<f32>, 5>,
    extent: vec3<f32>,
    intensity: f32,
    slice_count: u32,
    width: u32,
    height: u32,
    depth: u32,
    gain: f32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
};

@group(0) @binding(0) var<uniform> slices: SliceParams;
@group(0) @binding(1) var<storage, read> field: array<f32>;

fn palette_entry(i: u32) -> vec3<f32> {
    return slices.palette[i].rgb;
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
};

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    @builtin(instance_index) instance_index: u32,
) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(0.0, 0.0),
        vec2<f32>(1.0, 0.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(0.0, 0.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(0.0, 1.0),
    );
    let ab = corners[vertex_index];
    let c = (f32(instance_index) + 0.5) / f32(slices.slice_count);
    let world = (slices.model * vec4<f32>(ab, c, 1.0)).xyz;

    var out: VertexOutput;
    out.clip_position = slices.view_proj * vec4<f32>(world, 1.0);
    out.world_pos = world;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let max_cell = slices.extent - vec3<f32>(1.0);
    let c = vec3<u32>(clamp(floor(in.world_pos), vec3<f32>(0.0), max_cell));
    let value = field[c.x + c.y * slices.width + c.z * slices.width * slices.height];
    let t = 1.0 - exp(-max(value, 0.0) * slices.intensity);
    return vec4<f32>(palette_color(t) * t * slices.gain, 1.0);
}
"#;

/// `DofParams`, the accumulation buffer and the splat helper.
const DOF_COMMON: &str = r#"
const ACCUM_SCALE: f32 = 256.0;
const LENS_RADIUS_PER_APERTURE: f32 = 10.0;

struct DofParams {
    view_proj: mat4x4<f32>,
    inv_view_proj: mat4x4<f32>,
    camera_pos: vec3<f32>,
    aperture: f32,
    world_extent: vec3<f32>,
    focal_distance: f32,
    screen_width: u32,
    screen_height: u32,
    focal_depth: f32,
    sample_weight: f32,
    iterations: u32,
    break_distance: f32,
    mode: u32,
    frame_seed: u32,
    agent_count: u32,
    field_depth: u32,
    _pad0: u32,
    _pad1: u32,
};

fn pixel_count() -> u32 {
    return dof.screen_width * dof.screen_height;
}

// Largest f32 below 2^32.
const MAX_FIXED: f32 = 4294967040.0;

fn to_fixed(weight: f32) -> u32 {
    return u32(clamp(round(weight * ACCUM_SCALE), 0.0, MAX_FIXED));
}

// The last accumulator cell tracks the running maximum.
fn accumulate(pixel: vec2<f32>, value: u32) {
    let screen = vec2<f32>(f32(dof.screen_width), f32(dof.screen_height));
    if (pixel.x < 0.0 || pixel.y < 0.0 || pixel.x >= screen.x || pixel.y >= screen.y) {
        return;
    }
    let index = u32(pixel.y) * dof.screen_width + u32(pixel.x);
    // Saturating add: the pixel pins at the u32 maximum instead of wrapping.
    var current = atomicLoad(&accum[index]);
    loop {
        let next = select(current + value, 0xffffffffu, current > 0xffffffffu - value);
        let result = atomicCompareExchangeWeak(&accum[index], current, next);
        if (result.exchanged) {
            atomicMax(&accum[pixel_count()], next);
            break;
        }
        current = result.old_value;
    }
}
"#;

const DOF_SPLAT_BODY: &str = r#"
@group(0) @binding(0) var<uniform> dof: DofParams;
@group(0) @binding(1) var<storage, read> agents: array<Agent>;
@group(0) @binding(2) var<storage, read_write> accum: array<atomic<u32>>;

fn splat(p: vec3<f32>, samples: u32, scale: f32, rng: ptr<function, u32>) {
    let clip = dof.view_proj * vec4<f32>(p, 1.0);
    if (clip.w <= 0.000001) {
        return;
    }
    let ndc = clip.xy / clip.w;
    let screen = vec2<f32>(f32(dof.screen_width), f32(dof.screen_height));
    let center = vec2<f32>((ndc.x * 0.5 + 0.5) * screen.x, (0.5 - ndc.y * 0.5) * screen.y);
    let depth = distance(p, dof.camera_pos);
    let coc = max(abs(depth - dof.focal_distance) - dof.focal_depth, 0.0) * dof.aperture;
    let value = to_fixed(dof.sample_weight / (1.0 + coc * coc) * scale);
    if (value == 0u) {
        return;
    }
    for (var k = 0u; k < samples; k++) {
        let angle = next_rand(rng) * TAU;
        let r = sqrt(next_rand(rng)) * coc;
        accumulate(center + vec2<f32>(cos(angle), sin(angle)) * r, value);
    }
}

@compute @workgroup_size(256)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let index = gid.x;
    if (index >= dof.agent_count) {
        return;
    }

    var rng = seed_rng(index, dof.frame_seed);
    let agent = agents[index];
    splat(agent.position, dof.iterations, 1.0, &rng);

    // Each pair is drawn once, by its lower index.
    let partner = agent.partner;
    if (dof.mode == 2u && partner != UNPAIRED && partner < dof.agent_count && partner > index) {
        let other = agents[partner].position;
        if (distance(other, agent.position) <= dof.break_distance) {
            for (var k = 0u; k < dof.iterations; k++) {
                let t = next_rand(&rng);
                splat(mix(agent.position, other, vec3<f32>(t)), 1u, 0.5, &rng);
            }
        }
    }
}
"#;

const DOF_TRAIL_BODY: &str = r#"
@group(0) @binding(0) var<uniform> dof: DofParams;
@group(0) @binding(1) var<storage, read> field: array<f32>;
@group(0) @binding(2) var<storage, read_write> accum: array<atomic<u32>>;

fn field_at(p: vec3<f32>) -> f32 {
    let e = dof.world_extent;
    if (any(p < vec3<f32>(0.0)) || any(p >= e)) {
        return 0.0;
    }
    let c = vec3<u32>(clamp(floor(p), vec3<f32>(0.0), e - vec3<f32>(1.0)));
    let w = u32(e.x);
    let h = u32(e.y);
    return field[c.x + c.y * w + c.z * w * h];
}

// Slab test; returns (t_near, t_far), a miss when t_near > t_far.
fn intersect_box(origin: vec3<f32>, dir: vec3<f32>, box_min: vec3<f32>, box_max: vec3<f32>) -> vec2<f32> {
    let inv_dir = 1.0 / dir;
    let t_min = (box_min - origin) * inv_dir;
    let t_max = (box_max - origin) * inv_dir;
    let t1 = min(t_min, t_max);
    let t2 = max(t_min, t_max);
    let t_near = max(max(t1.x, t1.y), t1.z);
    let t_far = min(min(t2.x, t2.y), t2.z);
    return vec2<f32>(max(t_near, 0.0), t_far);
}

@compute @workgroup_size(16, 16)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= dof.screen_width || gid.y >= dof.screen_height) {
        return;
    }
    let index = gid.y * dof.screen_width + gid.x;
    var rng = seed_rng(index, dof.frame_seed);

    let screen = vec2<f32>(f32(dof.screen_width), f32(dof.screen_height));
    let ndc = vec2<f32>(
        (f32(gid.x) + 0.5) / screen.x * 2.0 - 1.0,
        1.0 - (f32(gid.y) + 0.5) / screen.y * 2.0,
    );
    let near_h = dof.inv_view_proj * vec4<f32>(ndc, 0.0, 1.0);
    let far_h = dof.inv_view_proj * vec4<f32>(ndc, 1.0, 1.0);
    let origin = near_h.xyz / near_h.w;
    let dir = normalize(far_h.xyz / far_h.w - origin);

    // Thin lens: jitter the origin over the aperture, aim at the focal point.
    var helper = vec3<f32>(0.0, 0.0, 1.0);
    if (abs(dir.z) >= 0.9) {
        helper = vec3<f32>(1.0, 0.0, 0.0);
    }
    let u = normalize(cross(dir, helper));
    let v = cross(dir, u);
    let angle = next_rand(&rng) * TAU;
    let radius = sqrt(next_rand(&rng)) * dof.aperture * LENS_RADIUS_PER_APERTURE;
    let lens = origin + (u * cos(angle) + v * sin(angle)) * radius;
    let focus = origin + dir * dof.focal_distance;
    let ray = normalize(focus - lens);

    let hit = intersect_box(lens, ray, vec3<f32>(0.0), dof.world_extent);
    var acc = 0.0;
    if (hit.x <= hit.y && dof.iterations > 0u) {
        let step_len = (hit.y - hit.x) / f32(dof.iterations);
        for (var k = 0u; k < dof.iterations; k++) {
            let t = hit.x + (f32(k) + 0.5) * step_len;
            let outside = max(abs(t - dof.focal_distance) - dof.focal_depth, 0.0);
            acc += field_at(lens + ray * t) * dof.sample_weight / (1.0 + outside);
            if (acc >= dof.break_distance) {
                break;
            }
        }
    }

    let value = to_fixed(acc);
    atomicStore(&accum[index], value);
    atomicMax(&accum[pixel_count()], value);
}
"#;

const DOF_BLIT_BODY: &str = r#"
struct BlitParams {
    palette: array<vec4<f32>, 5>,
    screen_width: u32,
    screen_height: u32,
    exposure: f32,
    _pad: u32,
};

@group(0) @binding(0) var<uniform> blit: BlitParams;
@group(0) @binding(1) var<storage, read> accum: array<u32>;

fn palette_entry(i: u32) -> vec3<f32> {
    return blit.palette[i].rgb;
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    // Fullscreen triangle
    var positions = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(3.0, -1.0),
        vec2<f32>(-1.0, 3.0),
    );
    var out: VertexOutput;
    out.clip_position = vec4<f32>(positions[vertex_index], 0.0, 1.0);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let x = min(u32(in.clip_position.x), blit.screen_width - 1u);
    let y = min(u32(in.clip_position.y), blit.screen_height - 1u);
    let peak = accum[blit.screen_width * blit.screen_height];
    let value = accum[y * blit.screen_width + x];
    if (peak == 0u || value == 0u) {
        return vec4<f32>(0.0);
    }
    let n = clamp(f32(value) / f32(peak) * blit.exposure, 0.0, 1.0);
    let t = pow(n, 0.4545);
    return vec4<f32>(palette_color(t) * t, 1.0);
}
"#;

pub fn agent_update() -> String {
    [COMMON, GRID, AGENT_UPDATE_BODY].concat()
}

pub fn pair() -> String {
    [COMMON, GRID, PAIR_BODY].concat()
}

pub fn diffuse() -> String {
    [COMMON, DIFFUSE_BODY].concat()
}

pub fn slice_render() -> String {
    [SLICE_BODY, PALETTE_FN].concat()
}

pub fn dof_splat() -> String {
    [COMMON, DOF_COMMON, DOF_SPLAT_BODY].concat()
}

pub fn dof_trail() -> String {
    [COMMON, DOF_COMMON, DOF_TRAIL_BODY].concat()
}

pub fn dof_blit() -> String {
    [DOF_BLIT_BODY, PALETTE_FN].concat()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates WGSL code using naga.
    fn validate(name: &str, code: &str) -> naga::Module {
        let module = naga::front::wgsl::parse_str(code)
            .unwrap_or_else(|e| panic!("{name} failed to parse:\n{}", e.emit_to_string(code)));
        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        validator
            .validate(&module)
            .unwrap_or_else(|e| panic!("{name} failed validation: {e:?}"));
        module
    }

    fn struct_size(module: &naga::Module, name: &str) -> u32 {
        module
            .types
            .iter()
            .find(|(_, ty)| ty.name.as_deref() == Some(name))
            .map(|(_, ty)| ty.inner.size(module.to_ctx()))
            .unwrap_or_else(|| panic!("no struct {name}"))
    }

    // ========== Validation Tests ==========

    #[test]
    fn test_kernels_validate() {
        validate("agent_update", &agent_update());
        validate("pair", &pair());
        validate("diffuse", &diffuse());
    }

    #[test]
    fn test_render_shaders_validate() {
        validate("slice_render", &slice_render());
        validate("dof_splat", &dof_splat());
        validate("dof_trail", &dof_trail());
        validate("dof_blit", &dof_blit());
    }

    // ========== Accumulator Tests ==========

    #[test]
    fn test_accumulators_never_wrap() {
        // Deposits are float adds by compare-and-swap, DoF pixels saturate.
        let update = agent_update();
        assert!(update.contains("array<atomic<u32>>"));
        assert!(update.contains("bitcast<f32>(current) + amount"));
        assert!(!update.contains("atomicAdd(&deposits"));
        assert!(diffuse().contains("bitcast<f32>(deposits[i])"));

        for source in [dof_splat(), dof_trail()] {
            assert!(!source.contains("old + value"));
            assert!(source.contains("current > 0xffffffffu - value"));
        }
    }

    // ========== Layout Tests ==========

    #[test]
    fn test_struct_sizes_match_host() {
        let module = validate("agent_update", &agent_update());
        assert_eq!(
            struct_size(&module, "SimParams") as usize,
            std::mem::size_of::<crate::kernels::StepParams>()
        );
        assert_eq!(
            struct_size(&module, "Agent") as usize,
            std::mem::size_of::<crate::agents::Agent>()
        );

        let module = validate("dof_splat", &dof_splat());
        assert_eq!(
            struct_size(&module, "DofParams") as usize,
            std::mem::size_of::<crate::kernels::dof::DofParams>()
        );
    }

    #[test]
    fn test_slice_params_size() {
        let module = validate("slice_render", &slice_render());
        assert_eq!(struct_size(&module, "SliceParams"), 256);
    }
}
