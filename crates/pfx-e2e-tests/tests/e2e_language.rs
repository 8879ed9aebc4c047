//! Language surface, end to end: effect source in, register values out.

mod common;

#[test]
fn swizzles_reorder_components() {
    let source = r#"
        [pixel] float2 main(float x) {
            float4 c = float4(x, 2.0, 3.0, 4.0);
            return c.wy;
        }
    "#;
    let window = common::evaluate_window(source, "main", &[&[1.0f32.to_bits()]]);
    let floats: Vec<f32> = window.iter().map(|&w| f32::from_bits(w)).collect();
    assert_eq!(floats, [4.0, 2.0]);
}

#[test]
fn struct_fields_compose() {
    let source = r#"
        struct Particle {
            float3 pos;
            float age;
        };

        [pixel] float main(float z, float age) {
            Particle p;
            p.pos = float3(1.0, 2.0, z);
            p.age = age;
            return p.pos.z * p.age;
        }
    "#;
    assert_eq!(common::evaluate_f32(source, "main", &[1.5, 2.0]), 3.0);
}

#[test]
fn for_loops_accumulate() {
    let source = r#"
        [pixel] int main(int n) {
            int total = 0;
            for (int i = 0; i < n; i += 1) {
                total += i;
            }
            return total;
        }
    "#;
    assert_eq!(common::evaluate(source, "main", &[&[8]]), 28);
}

#[test]
fn while_loops_run_to_the_bound() {
    let source = r#"
        [pixel] int main(int seed) {
            int v = seed;
            while (v < 100) {
                v = v * 2;
            }
            return v;
        }
    "#;
    assert_eq!(common::evaluate(source, "main", &[&[1]]), 128);
}

#[test]
fn early_returns_pick_the_live_branch() {
    let source = r#"
        int sign_of(int v) {
            if (v > 0) {
                return 1;
            }
            if (v < 0) {
                return -1;
            }
            return 0;
        }

        [pixel] int main(int v) {
            return sign_of(v);
        }
    "#;
    let got = common::evaluate(source, "main", &[&[(-17i32) as u32]]);
    assert_eq!(got, (-1i32) as u32);
}

#[test]
fn inout_arguments_write_back() {
    let source = r#"
        void swap(inout int a, inout int b) {
            int t = a;
            a = b;
            b = t;
        }

        [pixel] int main(int x, int y) {
            swap(x, y);
            return x * 10 + y;
        }
    "#;
    assert_eq!(common::evaluate(source, "main", &[&[3], &[9]]), 93);
}

#[test]
fn nested_calls_compose_through_inlining() {
    let source = r#"
        float grade(float s) {
            if (s > 0.75) {
                return 5.0;
            }
            if (s > 0.5) {
                return 4.0;
            }
            return 3.0;
        }

        [pixel] float main(float a, float b) {
            return grade(a) - grade(b);
        }
    "#;
    assert_eq!(common::evaluate_f32(source, "main", &[0.9, 0.6]), 1.0);
}

#[test]
fn float_to_int_casts_truncate_toward_zero() {
    let source = r#"
        [pixel] int main(float x) {
            return int(x);
        }
    "#;
    assert_eq!(common::evaluate(source, "main", &[&[2.9f32.to_bits()]]), 2);
    let got = common::evaluate(source, "main", &[&[(-2.9f32).to_bits()]]);
    assert_eq!(got, (-2i32) as u32);
}

#[test]
fn int_to_float_casts_widen() {
    let source = r#"
        [pixel] float main(int n) {
            return float(n) * 0.5;
        }
    "#;
    let got = f32::from_bits(common::evaluate(source, "main", &[&[9]]));
    assert_eq!(got, 4.5);
}

#[test]
fn matrix_vector_products_multiply_rows() {
    let source = r#"
        [pixel] float2 main(float s) {
            float2x2 m = float2x2(1.0, 2.0, 3.0, 4.0);
            float2 v = float2(s, 1.0);
            return m * v;
        }
    "#;
    let window = common::evaluate_window(source, "main", &[&[1.0f32.to_bits()]]);
    let floats: Vec<f32> = window.iter().map(|&w| f32::from_bits(w)).collect();
    assert_eq!(floats, [3.0, 7.0]);
}

#[test]
fn vector_matrix_products_multiply_columns() {
    let source = r#"
        [pixel] float2 main(float s) {
            float2x2 m = float2x2(1.0, 2.0, 3.0, 4.0);
            float2 v = float2(s, 1.0);
            return v * m;
        }
    "#;
    let window = common::evaluate_window(source, "main", &[&[1.0f32.to_bits()]]);
    let floats: Vec<f32> = window.iter().map(|&w| f32::from_bits(w)).collect();
    assert_eq!(floats, [4.0, 6.0]);
}

#[test]
fn dot_products_accumulate() {
    let source = r#"
        [pixel] float main(float s) {
            return dot(float3(s, 2.0, 3.0), float3(4.0, 0.5, 2.0));
        }
    "#;
    assert_eq!(common::evaluate_f32(source, "main", &[1.0]), 11.0);
}

#[test]
fn lerp_blends_between_endpoints() {
    let source = r#"
        [pixel] float main(float t) {
            return lerp(10.0, 20.0, t);
        }
    "#;
    assert_eq!(common::evaluate_f32(source, "main", &[0.25]), 12.5);
}

#[test]
fn frac_is_non_negative_for_negative_inputs() {
    let source = r#"
        [pixel] float main(float x) {
            return frac(x);
        }
    "#;
    assert_eq!(common::evaluate_f32(source, "main", &[-0.25]), 0.75);
}

#[test]
fn intrinsics_chain_through_registers() {
    let source = r#"
        [pixel] float main(float x) {
            return min(abs(x), 2.0) + max(floor(x), -3.0);
        }
    "#;
    assert_eq!(common::evaluate_f32(source, "main", &[-2.5]), -1.0);
}

#[test]
fn scalar_constructors_broadcast() {
    let source = r#"
        [pixel] float4 main(float h) {
            return float4(h);
        }
    "#;
    let window = common::evaluate_window(source, "main", &[&[0.5f32.to_bits()]]);
    let floats: Vec<f32> = window.iter().map(|&w| f32::from_bits(w)).collect();
    assert_eq!(floats, [0.5, 0.5, 0.5, 0.5]);
}

#[test]
fn uniform_defaults_participate() {
    let source = r#"
        uniform float3 wind = float3(1.0, 2.0, 3.0);

        [pixel] float main(float s) {
            return wind.z * s;
        }
    "#;
    assert_eq!(common::evaluate_f32(source, "main", &[2.0]), 6.0);
}

#[test]
fn local_arrays_index_statically() {
    let source = r#"
        [pixel] float main(float x) {
            float samples[3];
            samples[0] = x;
            samples[1] = x * 2.0;
            samples[2] = x * 4.0;
            return samples[1] + samples[2];
        }
    "#;
    assert_eq!(common::evaluate_f32(source, "main", &[1.5]), 9.0);
}

#[test]
fn vector_equality_compares_every_lane() {
    let source = r#"
        [pixel] int main(float x) {
            float2 a = float2(x, 2.0);
            float2 b = float2(1.0, 2.0);
            if (a == b) {
                return 1;
            }
            return 0;
        }
    "#;
    assert_eq!(common::evaluate(source, "main", &[&[1.0f32.to_bits()]]), 1);
    assert_eq!(common::evaluate(source, "main", &[&[9.0f32.to_bits()]]), 0);
}

#[test]
fn logical_operators_gate_branches() {
    let source = r#"
        [pixel] int main(int a, int b) {
            if (a < 3 && b > 3) {
                return 1;
            }
            return 0;
        }
    "#;
    assert_eq!(common::evaluate(source, "main", &[&[2], &[5]]), 1);
    assert_eq!(common::evaluate(source, "main", &[&[5], &[5]]), 0);
}

#[test]
fn overloads_resolve_in_declaration_order() {
    let source = r#"
        float pick(float v) {
            return v * 2.0;
        }

        float pick(int v) {
            return 1000.0;
        }

        [pixel] float main(float x) {
            return pick(x);
        }
    "#;
    assert_eq!(common::evaluate_f32(source, "main", &[3.0]), 6.0);
}
