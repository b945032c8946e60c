//! Offline validation of every WGSL module the renderer ships, including the
//! large-bucket sort variant generated by constant substitution.

use naga::valid::{Capabilities, ValidationFlags, Validator};

fn validate(label: &str, source: &str) -> naga::Module {
    let module = naga::front::wgsl::parse_str(source)
        .unwrap_or_else(|e| panic!("{label} failed to parse: {}", e.emit_to_string(source)));
    Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .unwrap_or_else(|e| panic!("{label} failed validation: {e:?}"));
    module
}

#[test]
fn sort_shaders_validate() {
    validate("sort_unordered.wgsl", include_str!("../src/shaders/sort_unordered.wgsl"));

    let small = include_str!("../src/shaders/sort.wgsl");
    validate("sort.wgsl (small)", small);

    let large = small.replace(
        "const MAX_TRIS: u32 = 512u;",
        "const MAX_TRIS: u32 = 4096u;",
    );
    assert_ne!(small, large, "bucket size substitution must take effect");
    validate("sort.wgsl (large)", &large);
}

#[test]
fn render_shaders_validate() {
    validate("scene.wgsl", include_str!("../src/shaders/scene.wgsl"));
    validate("shadow.wgsl", include_str!("../src/shaders/shadow.wgsl"));
    validate("ui.wgsl", include_str!("../src/shaders/ui.wgsl"));
}

#[test]
fn sort_shaders_match_dispatch_constants() {
    let expected = format!(
        "const WORKGROUP_SIZE: u32 = {}u;",
        tilescape::constants::SORT_WORKGROUP_SIZE
    );
    for source in [
        include_str!("../src/shaders/sort.wgsl"),
        include_str!("../src/shaders/sort_unordered.wgsl"),
    ] {
        assert!(source.contains(&expected));
    }
}

#[test]
fn scene_shader_fades_shadow_with_distance() {
    // The shadow term must be attenuated by the distance-fade curve before
    // it darkens the fragment, driven by the falloff in shadow_params.w.
    let source = include_str!("../src/shaders/scene.wgsl");
    validate("scene.wgsl", source);
    assert!(source.contains("shadow_occlusion(in.world_position) * shadow_distance_fade(range)"));
    assert!(source.contains("uniforms.shadow_params.w"));
}

#[test]
fn sort_shaders_expose_main_entry() {
    for source in [
        include_str!("../src/shaders/sort.wgsl"),
        include_str!("../src/shaders/sort_unordered.wgsl"),
    ] {
        let module = validate("sort entry check", source);
        assert!(module.entry_points.iter().any(|ep| ep.name == "main"));
    }
}
